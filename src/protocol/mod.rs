//! Oracle TNS/TTC Wire Protocol (Layer 2: Pure, Sync)
//!
//! No async, no I/O, no tokio - just requests → bytes and bytes → messages.

pub mod auth;
pub mod backend;
pub mod capabilities;
pub mod constants;
pub mod describe;
pub mod encoder;
pub mod error;
pub mod error_info;
pub mod frame;
pub mod request;
pub mod ub;

pub use auth::{
    AuthContext, AuthError, AuthenticationMode, ClientIdentity, ObfuscatedPassword, Purity,
    SessionData, VerifierGeneration, VerifierResponse, generate_verifier,
};
pub use backend::{Accept, BackendMessage, LobParameters, Parameter, ProtocolInfo, Refuse, ServerPiggyback, Status};
pub use capabilities::Capabilities;
pub use describe::{ColumnMetadata, ColumnValue, LobLocator};
pub use encoder::RequestEncoder;
pub use error::{DecodeError, DecodeResult};
pub use error_info::BackendError;
pub use frame::{FrameDecoder, PacketHeader, ResponseContext};
pub use request::{
    Bind, CleanupContext, ExecuteOptions, LobOperation, LobRequest, LobResult, StatementKind,
    StatementRequest,
};
pub use ub::{UbReader, UbWriter};
