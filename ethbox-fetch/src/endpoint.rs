use std::time::Duration;

use serde_derive::Deserialize;
use url::Url;

use crate::FetchError;

/// Path of the block retrieval API on the remote node.
pub const BLOCK_GET_PATH: &str = "/api/v0/block/get";

const DEFAULT_PROTOCOL: &str = "http";
const DEFAULT_HOST: &str = "localhost";
const DEFAULT_PORT: u16 = 5001;

/// Location of the remote node serving blocks. Read once at startup.
#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct RemoteEndpoint {
    #[serde(default = "default_protocol")]
    pub protocol: String,
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Per request timeout. No timeout besides the transport's own when unset.
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    /// Recompute the keccak-256 digest of every fetched body and compare it
    /// with the requested identifier.
    #[serde(default)]
    pub verify_digest: bool,
}

fn default_protocol() -> String {
    DEFAULT_PROTOCOL.to_string()
}

fn default_host() -> String {
    DEFAULT_HOST.to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

impl Default for RemoteEndpoint {
    fn default() -> Self {
        Self {
            protocol: default_protocol(),
            host: default_host(),
            port: default_port(),
            timeout_secs: None,
            verify_digest: false,
        }
    }
}

impl RemoteEndpoint {
    pub fn validate(&self) {
        assert!(!self.protocol.is_empty(), "Remote protocol is required");
        assert!(!self.host.is_empty(), "Remote host is required");
        assert!(
            self.timeout_secs != Some(0),
            "Remote timeout must be positive when set"
        );
    }

    pub fn base_url(&self) -> Result<Url, FetchError> {
        Ok(Url::parse(&format!(
            "{}://{}:{}",
            self.protocol, self.host, self.port
        ))?)
    }

    /// e.g. `http://localhost:5001/api/v0/block/get`
    pub fn block_get_url(&self) -> Result<Url, FetchError> {
        Ok(self.base_url()?.join(BLOCK_GET_PATH)?)
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}
