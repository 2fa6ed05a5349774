//! Oracle Driver Module (Layer 3: Async I/O)
//!
//! The driver is split so the protocol logic stays testable without sockets:
//! - `state.rs` - Connection state machine (events in, actions out)
//! - `task.rs` - Queued client requests and their completion handles
//! - `statement.rs` - LRU cache of open server cursors
//! - `row.rs` - Query results and typed row access
//! - `config.rs` - Descriptor, TLS settings and the connection builder
//! - `stream.rs` - TCP / TCPS transport
//! - `connection.rs` - Client handle and the background driver task

mod config;
mod connection;
mod row;
mod state;
mod statement;
mod stream;
mod task;

pub use config::{
    ConnectOptions, DEFAULT_CONNECT_TIMEOUT, DEFAULT_PORT, Descriptor, OraDriverBuilder, TlsConfig,
    Transport,
};
pub use connection::{OraConnection, PendingTask};
pub use row::{OraRow, QueryResult};
pub use state::{
    AuthPhase, ConnectionAction, ConnectionState, ConnectionStateMachine,
    DEFAULT_STATEMENT_CACHE_SIZE,
};
pub use statement::{CachedStatement, StatementCache};
pub use stream::OraStream;
pub use task::{Completion, Task, TaskId, TaskQueue};
