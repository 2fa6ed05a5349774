//! Oracle client driver speaking the TNS/TTC wire protocol natively.
//!
//! **Features:** O5LOGON authentication (11g and 12c verifiers), TCPS,
//! statement caching, LOB operations, ping collapsing.
//!
//! ```ignore
//! let conn = OraConnection::builder()
//!     .host("localhost")
//!     .service_name("FREEPDB1")
//!     .user("scott")
//!     .password("tiger")
//!     .connect()
//!     .await?;
//! let rows = conn.query("select ename from emp", vec![]).await?;
//! ```
//!
//! Layering:
//! - `protocol` encodes requests and decodes server messages, no I/O
//! - `types` converts column values to and from Rust types
//! - `driver` runs the connection on tokio

pub mod driver;
pub mod error;
pub mod protocol;
pub mod types;

pub use driver::{
    ConnectOptions, Descriptor, OraConnection, OraDriverBuilder, OraRow, PendingTask, QueryResult,
    TlsConfig, Transport,
};
pub use error::{OraError, OraResult};
pub use protocol::{
    AuthenticationMode, BackendError, Bind, ExecuteOptions, LobLocator, LobOperation, LobRequest,
    LobResult, Purity, StatementRequest,
};
pub use types::{DataType, FromOracle, Numeric, TimeZoneOffset, Timestamp, ToOracle, TypeError};
