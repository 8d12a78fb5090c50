//! Configuração do VibeFlow carregada a partir de `vibeflow.toml`.
//!
//! A struct [`VibeflowConfig`] contém o endereço do toolkit de renderização,
//! a chave de API e a política de polling. Valores ausentes no arquivo usam
//! defaults sensíveis. As variáveis de ambiente `TOOLKIT_API_BASE_URL` e
//! `TOOLKIT_API_KEY` têm precedência sobre o arquivo.

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::error::VibeflowError;
use crate::render::{FirstPoll, PollPolicy};

pub const CONFIG_FILE: &str = "vibeflow.toml";

/// Configuração de nível superior carregada de `vibeflow.toml`.
#[derive(Debug, Clone, Deserialize)]
pub struct VibeflowConfig {
    /// URL base do toolkit (ex.: `https://toolkit.example.com`).
    #[serde(default)]
    pub base_url: String,

    /// Chave enviada no cabeçalho `X-API-Key`.
    #[serde(default)]
    pub api_key: String,

    /// Intervalo entre consultas de status, em milissegundos.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Máximo de consultas antes de o job ser marcado como expirado.
    #[serde(default = "default_max_poll_attempts")]
    pub max_poll_attempts: u32,

    /// Quando acontece a primeira consulta: "immediate" ou "after_interval".
    #[serde(default)]
    pub first_poll: FirstPoll,
}

// Valor padrão para o intervalo de polling: 3000ms.
fn default_poll_interval_ms() -> u64 {
    3000
}

// Valor padrão para o limite de consultas: 20 (cerca de um minuto).
fn default_max_poll_attempts() -> u32 {
    20
}

impl Default for VibeflowConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            api_key: String::new(),
            poll_interval_ms: default_poll_interval_ms(),
            max_poll_attempts: default_max_poll_attempts(),
            first_poll: FirstPoll::default(),
        }
    }
}

impl VibeflowConfig {
    /// Carrega `vibeflow.toml` do diretório atual e aplica as variáveis de ambiente.
    pub fn load() -> Result<Self, VibeflowError> {
        let mut config = Self::load_from(Path::new(CONFIG_FILE))?;
        config.apply_overrides(
            std::env::var("TOOLKIT_API_BASE_URL").ok(),
            std::env::var("TOOLKIT_API_KEY").ok(),
        );
        Ok(config)
    }

    /// Carrega a configuração de um caminho específico.
    /// Usa valores padrão se o arquivo não existir.
    pub fn load_from(path: &Path) -> Result<Self, VibeflowError> {
        let config = if path.exists() {
            let contents = std::fs::read_to_string(path)?;
            toml::from_str::<VibeflowConfig>(&contents)?
        } else {
            Self::default()
        };
        config.validate()?;
        Ok(config)
    }

    /// Valores não vazios substituem os do arquivo.
    pub fn apply_overrides(&mut self, base_url: Option<String>, api_key: Option<String>) {
        if let Some(url) = base_url.filter(|v| !v.is_empty()) {
            self.base_url = url;
        }
        if let Some(key) = api_key.filter(|v| !v.is_empty()) {
            self.api_key = key;
        }
    }

    /// Rejeita políticas que não fazem sentido (intervalo zero, nenhuma tentativa).
    pub fn validate(&self) -> Result<(), VibeflowError> {
        if self.poll_interval_ms == 0 {
            return Err(VibeflowError::Config(
                "poll_interval_ms must be greater than 0".into(),
            ));
        }
        if self.max_poll_attempts == 0 {
            return Err(VibeflowError::Config(
                "max_poll_attempts must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// Garante que o toolkit está configurado antes de qualquer chamada de rede.
    ///
    /// Um toolkit local (`localhost`/`127.0.0.1`) pode rodar sem chave.
    pub fn require_toolkit(&self) -> Result<(&str, &str), VibeflowError> {
        let base_url = self.base_url.trim();
        let is_local = base_url.contains("://localhost") || base_url.contains("://127.0.0.1");
        if base_url.is_empty() || (self.api_key.is_empty() && !is_local) {
            return Err(VibeflowError::Config(
                "Toolkit API environment variables not configured.".into(),
            ));
        }
        Ok((base_url, &self.api_key))
    }

    pub fn poll_policy(&self) -> PollPolicy {
        PollPolicy {
            interval: Duration::from_millis(self.poll_interval_ms),
            max_attempts: self.max_poll_attempts,
            first_poll: self.first_poll,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn default_config_values() {
        let config = VibeflowConfig::default();
        assert_eq!(config.poll_interval_ms, 3000);
        assert_eq!(config.max_poll_attempts, 20);
        assert_eq!(config.first_poll, FirstPoll::Immediate);
        assert!(config.base_url.is_empty());
        assert!(config.api_key.is_empty());
    }

    #[test]
    fn deserialize_partial_toml() {
        let toml_str = r#"
            base_url = "https://toolkit.example.com"
            max_poll_attempts = 40
            first_poll = "after_interval"
        "#;
        let config: VibeflowConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.base_url, "https://toolkit.example.com");
        assert_eq!(config.max_poll_attempts, 40);
        assert_eq!(config.first_poll, FirstPoll::AfterInterval);
        assert_eq!(config.poll_interval_ms, 3000);
    }

    #[test]
    fn load_from_missing_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = VibeflowConfig::load_from(&dir.path().join(CONFIG_FILE)).unwrap();
        assert_eq!(config.max_poll_attempts, 20);
    }

    #[test]
    fn load_from_file_on_disk() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "api_key = \"k-123\"\npoll_interval_ms = 500").unwrap();

        let config = VibeflowConfig::load_from(file.path()).unwrap();
        assert_eq!(config.api_key, "k-123");
        assert_eq!(config.poll_policy().interval, Duration::from_millis(500));
    }

    #[test]
    fn load_rejects_zero_attempts() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "max_poll_attempts = 0").unwrap();

        let err = VibeflowConfig::load_from(file.path()).unwrap_err();
        assert!(matches!(err, VibeflowError::Config(_)));
    }

    #[test]
    fn load_rejects_malformed_toml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "poll_interval_ms = \"soon\"").unwrap();

        let err = VibeflowConfig::load_from(file.path()).unwrap_err();
        assert!(matches!(err, VibeflowError::Toml(_)));
    }

    #[test]
    fn overrides_take_precedence_when_non_empty() {
        let mut config = VibeflowConfig {
            base_url: "https://from-file".into(),
            api_key: "file-key".into(),
            ..Default::default()
        };
        config.apply_overrides(Some("https://from-env".into()), Some(String::new()));
        assert_eq!(config.base_url, "https://from-env");
        assert_eq!(config.api_key, "file-key");
    }

    #[test]
    fn require_toolkit_needs_url_and_key() {
        let config = VibeflowConfig::default();
        assert!(config.require_toolkit().is_err());

        let no_key = VibeflowConfig {
            base_url: "https://toolkit.example.com".into(),
            ..Default::default()
        };
        assert!(no_key.require_toolkit().is_err());

        let local = VibeflowConfig {
            base_url: "http://localhost:8000".into(),
            ..Default::default()
        };
        assert_eq!(local.require_toolkit().unwrap(), ("http://localhost:8000", ""));
    }

    #[test]
    fn poll_policy_from_config() {
        let config = VibeflowConfig {
            max_poll_attempts: 5,
            first_poll: FirstPoll::AfterInterval,
            ..Default::default()
        };
        let policy = config.poll_policy();
        assert_eq!(policy.max_attempts, 5);
        assert_eq!(policy.first_poll, FirstPoll::AfterInterval);
        assert_eq!(policy.interval, Duration::from_secs(3));
    }
}
