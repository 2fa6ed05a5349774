//! Connection configuration.
//!
//! `Descriptor` is the resolved address of one listener. It renders the
//! `(DESCRIPTION=...)` connect data sent in the CONNECT packet.
//! `OraDriverBuilder` collects descriptor, credentials and connection options.

use std::fmt;
use std::time::Duration;

use super::connection::OraConnection;
use super::state::DEFAULT_STATEMENT_CACHE_SIZE;
use crate::error::{OraError, OraResult};
use crate::protocol::constants::DEFAULT_SDU;
use crate::protocol::{AuthContext, AuthenticationMode, ClientIdentity, ObfuscatedPassword, Purity};

pub const DEFAULT_PORT: u16 = 1521;
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(20);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Transport {
    #[default]
    Tcp,
    /// TLS from the first byte.
    Tcps,
}

impl Transport {
    fn as_str(self) -> &'static str {
        match self {
            Transport::Tcp => "tcp",
            Transport::Tcps => "tcps",
        }
    }
}

/// TLS configuration for TCPS, optionally with a client certificate (mutual TLS).
#[derive(Clone, Default)]
pub struct TlsConfig {
    /// CA certificate for server verification (uses system certs if None)
    pub ca_cert_pem: Option<Vec<u8>>,
    /// Client certificate in PEM format
    pub client_cert_pem: Option<Vec<u8>>,
    /// Client private key in PEM format
    pub client_key_pem: Option<Vec<u8>>,
    /// Name to verify the server certificate against (defaults to the host)
    pub server_name: Option<String>,
}

impl TlsConfig {
    /// Create a new TLS config from file paths.
    pub fn from_files(
        ca_path: Option<impl AsRef<std::path::Path>>,
        client: Option<(impl AsRef<std::path::Path>, impl AsRef<std::path::Path>)>,
    ) -> std::io::Result<Self> {
        let (client_cert_pem, client_key_pem) = match client {
            Some((cert, key)) => (Some(std::fs::read(cert)?), Some(std::fs::read(key)?)),
            None => (None, None),
        };
        Ok(Self {
            ca_cert_pem: ca_path.map(std::fs::read).transpose()?,
            client_cert_pem,
            client_key_pem,
            server_name: None,
        })
    }
}

impl fmt::Debug for TlsConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TlsConfig")
            .field("ca_cert", &self.ca_cert_pem.is_some())
            .field("client_cert", &self.client_cert_pem.is_some())
            .field("server_name", &self.server_name)
            .finish_non_exhaustive()
    }
}

/// Resolved listener address and service.
#[derive(Debug, Clone)]
pub struct Descriptor {
    pub transport: Transport,
    pub host: String,
    pub port: u16,
    pub service_name: String,
    pub purity: Purity,
    pub connect_timeout: Duration,
    pub sdu: u32,
    pub tls: Option<TlsConfig>,
}

impl Descriptor {
    pub fn new(host: impl Into<String>, port: u16, service_name: impl Into<String>) -> Self {
        Self {
            transport: Transport::Tcp,
            host: host.into(),
            port,
            service_name: service_name.into(),
            purity: Purity::Default,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            sdu: DEFAULT_SDU,
            tls: None,
        }
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Connect data for the CONNECT packet.
    pub fn connect_data(&self, identity: &ClientIdentity) -> String {
        let purity = match self.purity {
            Purity::Default => "",
            Purity::New => "(POOL_PURITY=NEW)",
            Purity::Reuse => "(POOL_PURITY=SELF)",
        };
        format!(
            "(DESCRIPTION=(ADDRESS=(PROTOCOL={})(HOST={})(PORT={}))\
             (CONNECT_DATA=(SERVICE_NAME={}){}(CID=(PROGRAM={})(HOST={})(USER={}))))",
            self.transport.as_str(),
            self.host,
            self.port,
            self.service_name,
            purity,
            identity.program,
            identity.machine,
            identity.os_user,
        )
    }
}

/// Everything `OraConnection::connect` needs.
#[derive(Debug, Clone)]
pub struct ConnectOptions {
    pub descriptor: Descriptor,
    pub auth: AuthContext,
    pub statement_cache_size: usize,
}

/// Builder for Oracle connections.
///
/// # Example
/// ```ignore
/// let conn = OraDriverBuilder::new()
///     .host("localhost")
///     .port(1521)
///     .service_name("FREEPDB1")
///     .user("scott")
///     .password("tiger")
///     .connect()
///     .await?;
/// ```
#[derive(Default)]
pub struct OraDriverBuilder {
    host: Option<String>,
    port: Option<u16>,
    service_name: Option<String>,
    user: Option<String>,
    password: Option<ObfuscatedPassword>,
    new_password: Option<ObfuscatedPassword>,
    mode: AuthenticationMode,
    purity: Purity,
    timeout: Option<Duration>,
    sdu: Option<u32>,
    tls: Option<TlsConfig>,
    statement_cache_size: Option<usize>,
}

impl OraDriverBuilder {
    /// Create a new builder with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the host (default: "127.0.0.1").
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    /// Set the port (default: 1521).
    pub fn port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Set the service name (required).
    pub fn service_name(mut self, service_name: impl Into<String>) -> Self {
        self.service_name = Some(service_name.into());
        self
    }

    /// Set the username (required).
    pub fn user(mut self, user: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self
    }

    pub fn password(mut self, password: &str) -> Self {
        self.password = Some(ObfuscatedPassword::new(password));
        self
    }

    /// Change the password while logging on.
    pub fn new_password(mut self, password: &str) -> Self {
        self.new_password = Some(ObfuscatedPassword::new(password));
        self
    }

    /// Request an administrative privilege such as SYSDBA.
    pub fn privilege(mut self, mode: AuthenticationMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn purity(mut self, purity: Purity) -> Self {
        self.purity = purity;
        self
    }

    /// Set connection timeout (default: 20s).
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn sdu(mut self, sdu: u32) -> Self {
        self.sdu = Some(sdu);
        self
    }

    /// Connect over TCPS.
    pub fn tls(mut self, tls: TlsConfig) -> Self {
        self.tls = Some(tls);
        self
    }

    /// Number of server cursors kept open for reuse; 0 disables the cache.
    pub fn statement_cache_size(mut self, size: usize) -> Self {
        self.statement_cache_size = Some(size);
        self
    }

    /// Validate and assemble the connect options.
    pub fn build(self) -> OraResult<ConnectOptions> {
        let user = self
            .user
            .ok_or_else(|| OraError::Connection("User is required".to_string()))?;
        let service_name = self
            .service_name
            .ok_or_else(|| OraError::Connection("Service name is required".to_string()))?;

        let mut descriptor = Descriptor::new(
            self.host.unwrap_or_else(|| "127.0.0.1".to_string()),
            self.port.unwrap_or(DEFAULT_PORT),
            service_name,
        );
        descriptor.purity = self.purity;
        descriptor.connect_timeout = self.timeout.unwrap_or(DEFAULT_CONNECT_TIMEOUT);
        descriptor.sdu = self.sdu.unwrap_or(DEFAULT_SDU);
        if self.tls.is_some() {
            descriptor.transport = Transport::Tcps;
        }
        descriptor.tls = self.tls;

        let mut auth = AuthContext::new(user, "");
        if let Some(password) = self.password {
            auth.password = password;
        }
        auth.new_password = self.new_password;
        auth.mode = self.mode;
        auth.purity = self.purity;

        Ok(ConnectOptions {
            descriptor,
            auth,
            statement_cache_size: self
                .statement_cache_size
                .unwrap_or(DEFAULT_STATEMENT_CACHE_SIZE),
        })
    }

    /// Connect to Oracle using the configured parameters.
    pub async fn connect(self) -> OraResult<OraConnection> {
        OraConnection::connect(self.build()?).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn identity() -> ClientIdentity {
        ClientIdentity {
            terminal: "unknown".into(),
            program: "app".into(),
            machine: "box".into(),
            pid: 1,
            os_user: "me".into(),
        }
    }

    #[test]
    fn test_connect_data() {
        let descriptor = Descriptor::new("db.local", 1521, "FREEPDB1");
        assert_eq!(
            descriptor.connect_data(&identity()),
            "(DESCRIPTION=(ADDRESS=(PROTOCOL=tcp)(HOST=db.local)(PORT=1521))\
             (CONNECT_DATA=(SERVICE_NAME=FREEPDB1)(CID=(PROGRAM=app)(HOST=box)(USER=me))))"
        );
    }

    #[test]
    fn test_connect_data_with_purity() {
        let mut descriptor = Descriptor::new("h", 1, "s");
        descriptor.purity = Purity::Reuse;
        assert!(descriptor.connect_data(&identity()).contains("(POOL_PURITY=SELF)"));
    }

    #[test]
    fn test_builder_requires_user_and_service() {
        assert!(OraDriverBuilder::new().service_name("s").build().is_err());
        assert!(OraDriverBuilder::new().user("u").build().is_err());
    }

    #[test]
    fn test_builder_defaults() {
        let options = OraDriverBuilder::new()
            .user("scott")
            .password("tiger")
            .service_name("XE")
            .tls(TlsConfig::default())
            .build()
            .unwrap();
        assert_eq!(options.descriptor.address(), "127.0.0.1:1521");
        assert_eq!(options.descriptor.transport, Transport::Tcps);
        assert_eq!(options.descriptor.sdu, DEFAULT_SDU);
        assert_eq!(options.auth.password.reveal(), b"tiger".to_vec());
        assert_eq!(options.statement_cache_size, DEFAULT_STATEMENT_CACHE_SIZE);
    }
}
