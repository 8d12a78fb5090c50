//! Ciclo de vida de uma renderização: envio, polling e invalidação.
//!
//! A [`RenderSession`] é a única porta de entrada. Ela aplica eventos à
//! máquina de estados, mantém no máximo um loop de polling vivo e publica
//! snapshots para a interface.

mod controller;
mod job;
mod machine;
mod notice;
mod scheduler;
mod session;

pub use job::{FirstPoll, PollPolicy, RenderReport, RenderSnapshot};
pub use machine::RenderState;
pub use notice::{Notice, RenderNotifier, Severity};
pub use session::RenderSession;
