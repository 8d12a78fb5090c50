//! Interface de linha de comando do VibeFlow baseada em clap.
//!
//! Define a struct [`Cli`] com subcomandos [`Command`] (render, render --watch,
//! status, convert, ping, format) e flags globais (--interval-ms,
//! --max-attempts, --wait-first, --verbose).

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// VibeFlow: envia composições de vídeo em JSON ao toolkit e acompanha a renderização.
#[derive(Debug, Parser)]
#[command(name = "vibeflow", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Intervalo entre consultas de status, em milissegundos.
    #[arg(long, global = true)]
    pub interval_ms: Option<u64>,

    /// Número máximo de consultas antes de desistir.
    #[arg(long, global = true)]
    pub max_attempts: Option<u32>,

    /// Espera um intervalo completo antes da primeira consulta.
    #[arg(long, global = true, default_value_t = false)]
    pub wait_first: bool,

    /// Habilita saída detalhada (verbose).
    #[arg(long, short, global = true, default_value_t = false)]
    pub verbose: bool,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Envia a definição de vídeo para renderização e acompanha até o fim.
    Render {
        /// Arquivo JSON com a definição do vídeo.
        file: PathBuf,

        /// Renderiza de novo a cada vez que o arquivo é salvo.
        #[arg(long)]
        watch: bool,
    },

    /// Consulta uma única vez o status de um job já enviado.
    Status {
        /// Identificador retornado pelo toolkit.
        job_id: String,
    },

    /// Envia um pedido de conversão de mídia e imprime a resposta.
    Convert {
        /// Arquivo JSON com os parâmetros da conversão.
        file: PathBuf,
    },

    /// Testa a conexão com o toolkit.
    Ping,

    /// Reformata o JSON da definição de vídeo.
    Format {
        /// Arquivo JSON com a definição do vídeo.
        file: PathBuf,

        /// Sobrescreve o arquivo em vez de imprimir no stdout.
        #[arg(long)]
        write: bool,
    },
}
