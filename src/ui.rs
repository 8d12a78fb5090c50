//! Interface de terminal do VibeFlow: barra de progresso e saída colorida.
//!
//! Usa as crates `indicatif` para a barra de progresso e `console` para
//! estilização com cores. O [`RenderProgress`] acompanha visualmente a
//! renderização e também recebe os avisos da sessão via [`RenderNotifier`].

use console::Style;
use indicatif::{ProgressBar, ProgressStyle};

use crate::render::{
    Notice, RenderNotifier, RenderReport, RenderSnapshot, RenderState, Severity,
};

/// Indicador visual de progresso para uma renderização no terminal.
///
/// A porcentagem exibida é a estimativa da sessão, não o progresso real
/// do toolkit.
#[derive(Clone)]
pub struct RenderProgress {
    // Barra de progresso do indicatif (compartilhada entre clones).
    pb: ProgressBar,
    // Estilo verde para sucesso.
    green: Style,
    // Estilo vermelho para falhas.
    red: Style,
    // Estilo amarelo para avisos.
    yellow: Style,
    // Estilo ciano para mensagens informativas.
    cyan: Style,
}

impl RenderProgress {
    /// Cria a barra com o nome do arquivo sendo renderizado.
    pub fn start(label: &str) -> Self {
        let pb = ProgressBar::new(100);
        let style = ProgressStyle::default_bar()
            .template("{spinner:.cyan} [{bar:30.cyan/blue}] {pos:>3}% {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=> ");
        pb.set_style(style);
        pb.set_message(label.to_string());
        pb.enable_steady_tick(std::time::Duration::from_millis(120));

        Self {
            pb,
            green: Style::new().green().bold(),
            red: Style::new().red().bold(),
            yellow: Style::new().yellow(),
            cyan: Style::new().cyan(),
        }
    }

    /// Atualiza a barra a partir de um snapshot da sessão.
    pub fn update(&self, snapshot: &RenderSnapshot) {
        self.pb.set_position(snapshot.progress_estimate.round() as u64);
        let attempts = if snapshot.state == RenderState::Polling {
            format!(" ({} polls)", snapshot.attempt_count)
        } else {
            String::new()
        };
        self.pb.set_message(format!("{}{attempts}", snapshot.last_message));
    }

    /// Finaliza a barra e exibe o resultado final.
    pub fn finish(&self, snapshot: &RenderSnapshot) {
        self.pb.finish_and_clear();
        match snapshot.state {
            RenderState::Completed => match snapshot.result_url.as_deref() {
                Some(url) if snapshot.has_usable_output() => {
                    println!("  {} Video ready: {url}", self.green.apply_to("✓"));
                }
                _ => println!("  {} {}", self.yellow.apply_to("!"), snapshot.last_message),
            },
            RenderState::Idle => println!("  {} Render cancelled", self.yellow.apply_to("↺")),
            _ => println!("  {} {}", self.red.apply_to("✗"), snapshot.last_message),
        }
    }

    /// Imprime o relatório final formatado em JSON com estilo colorido.
    pub fn print_report(&self, snapshot: &RenderSnapshot) {
        let style = if snapshot.has_usable_output() {
            &self.green
        } else if matches!(snapshot.state, RenderState::Completed | RenderState::Idle) {
            &self.yellow
        } else {
            &self.red
        };
        let report = RenderReport::from_snapshot(snapshot);
        println!();
        println!("{}", style.apply_to("─── Render Report ───"));
        println!("{}", serde_json::to_string_pretty(&report).unwrap_or_default());
    }
}

impl RenderNotifier for RenderProgress {
    fn notify(&self, notice: &Notice) {
        let (icon, style) = match notice.severity {
            Severity::Info => ("•", &self.cyan),
            Severity::Success => ("✓", &self.green),
            Severity::Warning => ("!", &self.yellow),
            Severity::Error => ("✗", &self.red),
        };
        self.pb.println(format!(
            "  {} {}: {}",
            style.apply_to(icon),
            style.apply_to(notice.title),
            notice.description
        ));
    }
}
