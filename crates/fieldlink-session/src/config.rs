use std::time::Duration;

use fieldlink_frame::{FrameConfig, DEFAULT_MAX_CONTENT};
use fieldlink_transport::SocketKind;
use serde::{Deserialize, Serialize};

/// Default connect timeout: 10 seconds.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default number of socket acquisition attempts per exchange.
pub const DEFAULT_CONNECT_RETRIES: u32 = 1;

/// Default listen backlog.
pub const DEFAULT_LISTEN_BACKLOG: i32 = 500;

/// Client-side connection settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionConfig {
    pub host: String,
    pub port: u16,
    pub socket_kind: SocketKind,
    /// `None` blocks until the OS gives up.
    #[serde(rename = "connect_timeout_ms", with = "duration_ms")]
    pub connect_timeout: Option<Duration>,
    /// Keep the socket open across exchanges. Default: true.
    pub persistent: bool,
    /// Acquisition attempts per exchange; some devices only answer after a
    /// second connect.
    pub connect_retries: u32,
    pub max_content_length: usize,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 0,
            socket_kind: SocketKind::Tcp,
            connect_timeout: Some(DEFAULT_CONNECT_TIMEOUT),
            persistent: true,
            connect_retries: DEFAULT_CONNECT_RETRIES,
            max_content_length: DEFAULT_MAX_CONTENT,
        }
    }
}

impl ConnectionConfig {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            ..Self::default()
        }
    }

    pub fn with_socket_kind(mut self, kind: SocketKind) -> Self {
        self.socket_kind = kind;
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_persistent(mut self, persistent: bool) -> Self {
        self.persistent = persistent;
        self
    }

    pub fn with_connect_retries(mut self, retries: u32) -> Self {
        self.connect_retries = retries;
        self
    }

    pub fn with_max_content_length(mut self, max: usize) -> Self {
        self.max_content_length = max;
        self
    }

    pub fn frame_config(&self) -> FrameConfig {
        FrameConfig::default().with_max_content_length(self.max_content_length)
    }

    /// `host:port`, for logs.
    pub fn endpoint(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Server-side listener settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ListenerConfig {
    pub host: String,
    pub port: u16,
    pub backlog: i32,
    pub max_content_length: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 0,
            backlog: DEFAULT_LISTEN_BACKLOG,
            max_content_length: DEFAULT_MAX_CONTENT,
        }
    }
}

impl ListenerConfig {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            ..Self::default()
        }
    }

    pub fn with_backlog(mut self, backlog: i32) -> Self {
        self.backlog = backlog;
        self
    }

    pub fn with_max_content_length(mut self, max: usize) -> Self {
        self.max_content_length = max;
        self
    }

    pub fn frame_config(&self) -> FrameConfig {
        FrameConfig::default().with_max_content_length(self.max_content_length)
    }
}

mod duration_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Option<Duration>, s: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(d) => s.serialize_some(&(d.as_millis() as u64)),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Duration>, D::Error> {
        Ok(Option::<u64>::deserialize(d)?.map(Duration::from_millis))
    }
}
