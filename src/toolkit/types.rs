//! Tipos de dados trocados com os endpoints do toolkit de renderização.
//!
//! Os campos seguem o formato camelCase da API (`jobId`, `outputUrl`).
//! Campos desconhecidos da resposta de status são preservados em
//! [`JobStatusResponse::extra`] e repassados sem alteração.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Corpo da resposta de `POST /v1/ffmpeg/compose`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ComposeResponse {
    /// Identificador opaco do job. Pode faltar em respostas malformadas.
    #[serde(rename = "jobId", default)]
    pub job_id: Option<String>,
}

impl ComposeResponse {
    /// Retorna o `jobId` apenas se presente e não vazio.
    pub fn usable_job_id(self) -> Option<String> {
        self.job_id.filter(|id| !id.trim().is_empty())
    }
}

/// Corpo da resposta de `GET /v1/toolkit/job/status/{jobId}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobStatusResponse {
    /// "processing", "completed", "failed" ou qualquer outro valor do servidor.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    /// Local do vídeo renderizado, presente apenas quando concluído.
    #[serde(rename = "outputUrl", default, skip_serializing_if = "Option::is_none")]
    pub output_url: Option<String>,
    /// Mensagem de erro fornecida pelo servidor em caso de falha.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Demais campos, repassados literalmente.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Interpretação do campo `status` para a máquina de estados.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobPhase {
    Processing,
    Completed,
    Failed,
}

#[cfg(test)]
impl JobStatusResponse {
    pub fn processing() -> Self {
        Self::with_status("processing")
    }

    pub fn completed(output_url: Option<&str>) -> Self {
        Self {
            output_url: output_url.map(str::to_string),
            ..Self::with_status("completed")
        }
    }

    pub fn failed(error: Option<&str>) -> Self {
        Self {
            error: error.map(str::to_string),
            ..Self::with_status("failed")
        }
    }

    fn with_status(status: &str) -> Self {
        Self {
            status: Some(status.to_string()),
            ..Default::default()
        }
    }
}

impl JobStatusResponse {
    /// Qualquer status além de "completed" e "failed" conta como em andamento.
    pub fn phase(&self) -> JobPhase {
        match self.status.as_deref() {
            Some("completed") => JobPhase::Completed,
            Some("failed") => JobPhase::Failed,
            _ => JobPhase::Processing,
        }
    }

    /// Texto de status exibido enquanto o job está em andamento.
    pub fn status_label(&self) -> &str {
        match self.status.as_deref() {
            Some(s) if !s.trim().is_empty() => s,
            _ => "Processing...",
        }
    }
}
