//! Tipos de erro para o cliente da API do toolkit de renderização.
//!
//! Define [`ToolkitError`] com variantes para respostas HTTP sem sucesso,
//! respostas de composição sem `jobId` e falhas de rede. Usa `thiserror`
//! para derivar `Display` e `Error` a partir dos atributos `#[error(...)]`.

use thiserror::Error;

/// Erros que podem ocorrer ao falar com o toolkit.
#[derive(Debug, Error)]
pub enum ToolkitError {
    /// O toolkit respondeu com status HTTP fora da faixa 2xx.
    /// `message` traz o corpo da resposta ou, se vazio, o motivo do status.
    #[error("Toolkit API error (status {status}): {message}")]
    Api { status: u16, message: String },

    /// A composição foi aceita mas o corpo não trouxe um `jobId` utilizável.
    #[error("No jobId received from the render API.")]
    MissingJobId,

    /// Falha de rede subjacente (DNS, conexão recusada, timeout, corpo inválido).
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
}
