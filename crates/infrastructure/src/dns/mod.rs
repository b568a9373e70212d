pub mod dispatcher;
pub mod framing;
pub mod server;
pub mod session;
pub mod stats;
pub mod transport;
pub mod writer;

pub use dispatcher::QueryDispatcher;
pub use server::{DotServer, DrainHandle};
pub use session::{ConnectionSession, SessionSettings};
pub use stats::{RelayStats, RelayStatsSnapshot};
pub use writer::ResponseWriter;
