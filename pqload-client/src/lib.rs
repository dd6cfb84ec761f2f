pub mod command;
pub mod metric;
pub mod trace;
pub mod transport;
pub mod writeout;

pub use crate::command::{ClientCommand, Invocation};
pub use crate::metric::Metric;
pub use crate::trace::{TraceParser, TraceSummary};
pub use crate::transport::{ProcessTransport, Transport, TransportError, TransportOutput};
pub use crate::writeout::{WriteOut, WriteOutError};

pub type FutureResponse<T, E> = futures::future::BoxFuture<'static, Result<T, E>>;
