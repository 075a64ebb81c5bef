//! Forwarding configuration.
//!
//! A [`ForwardConfig`] is built once by the caller and passed by value into the
//! forwarder; it never changes during a run. Addresses are not validated here: a
//! malformed address surfaces later as a listen, dial or channel-open error.
//!
//! [`ForwardConfig::resolve`] builds a configuration from [`ConfigOverrides`],
//! resolving every field with a three-tier priority:
//!
//! 1. **Override** - Explicitly provided value (highest priority)
//! 2. **Environment Variable** - Value from environment variable
//! 3. **Default** - Built-in default value (lowest priority)
//!
//! # Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `SSH_FORWARD_USER` | `root` | Username to authenticate as |
//! | `SSH_FORWARD_SERVER` | `192.168.1.100:22` | SSH server address |
//! | `SSH_FORWARD_LOCAL` | `localhost:9000` | Local listen address |
//! | `SSH_FORWARD_REMOTE` | `localhost:9999` | Destination, as seen from the server |
//! | `SSH_FORWARD_KEY` | `$HOME/.ssh/id_rsa` | Private key file |
//! | `SSH_COMPRESSION` | true | Enable zlib compression |

use std::env;
use std::path::PathBuf;

/// Default username
pub(crate) const DEFAULT_USERNAME: &str = "root";

/// Default SSH server address
pub(crate) const DEFAULT_SERVER_ADDRESS: &str = "192.168.1.100:22";

/// Default local listen address
pub(crate) const DEFAULT_LOCAL_ADDRESS: &str = "localhost:9000";

/// Default destination address
pub(crate) const DEFAULT_REMOTE_ADDRESS: &str = "localhost:9999";

/// Default key file, relative to the home directory
pub(crate) const DEFAULT_KEY_FILE: &str = ".ssh/id_rsa";

/// Environment variable name for the username
pub(crate) const USERNAME_ENV_VAR: &str = "SSH_FORWARD_USER";

/// Environment variable name for the SSH server address
pub(crate) const SERVER_ADDRESS_ENV_VAR: &str = "SSH_FORWARD_SERVER";

/// Environment variable name for the local listen address
pub(crate) const LOCAL_ADDRESS_ENV_VAR: &str = "SSH_FORWARD_LOCAL";

/// Environment variable name for the destination address
pub(crate) const REMOTE_ADDRESS_ENV_VAR: &str = "SSH_FORWARD_REMOTE";

/// Environment variable name for the private key path
pub(crate) const KEY_PATH_ENV_VAR: &str = "SSH_FORWARD_KEY";

/// Environment variable name for SSH compression
pub(crate) const COMPRESSION_ENV_VAR: &str = "SSH_COMPRESSION";

/// Explicit values that take precedence over the environment.
///
/// Unset fields fall back to their environment variable, then to the default.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub username: Option<String>,
    pub server_address: Option<String>,
    pub remote_address: Option<String>,
    pub local_address: Option<String>,
    pub private_key_path: Option<PathBuf>,
    pub compression: Option<bool>,
}

/// Addresses and credentials for one forwarding run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForwardConfig {
    /// Username to authenticate as on the SSH server.
    pub username: String,
    /// SSH server address (`host[:port]`, port 22 by default).
    pub server_address: String,
    /// Destination reached through the session (`host:port`, resolved by the server).
    pub remote_address: String,
    /// Local address to listen on (`host:port`).
    pub local_address: String,
    /// Private key file used to authenticate.
    pub private_key_path: PathBuf,
    /// Whether to negotiate zlib compression.
    pub compression: bool,
}

impl ForwardConfig {
    /// Create a configuration with compression enabled.
    pub fn new(
        username: impl Into<String>,
        server_address: impl Into<String>,
        remote_address: impl Into<String>,
        local_address: impl Into<String>,
        private_key_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            username: username.into(),
            server_address: server_address.into(),
            remote_address: remote_address.into(),
            local_address: local_address.into(),
            private_key_path: private_key_path.into(),
            compression: true,
        }
    }

    /// Enable or disable compression.
    pub fn with_compression(mut self, compression: bool) -> Self {
        self.compression = compression;
        self
    }

    /// Resolve every field from the environment, falling back to defaults.
    pub fn from_env() -> Self {
        Self::resolve(ConfigOverrides::default())
    }

    /// Resolve every field: override, then environment variable, then default.
    pub fn resolve(overrides: ConfigOverrides) -> Self {
        Self {
            username: resolve_string(
                overrides.username.as_deref(),
                USERNAME_ENV_VAR,
                DEFAULT_USERNAME,
            ),
            server_address: resolve_string(
                overrides.server_address.as_deref(),
                SERVER_ADDRESS_ENV_VAR,
                DEFAULT_SERVER_ADDRESS,
            ),
            remote_address: resolve_string(
                overrides.remote_address.as_deref(),
                REMOTE_ADDRESS_ENV_VAR,
                DEFAULT_REMOTE_ADDRESS,
            ),
            local_address: resolve_string(
                overrides.local_address.as_deref(),
                LOCAL_ADDRESS_ENV_VAR,
                DEFAULT_LOCAL_ADDRESS,
            ),
            private_key_path: resolve_key_path(overrides.private_key_path),
            compression: resolve_compression(overrides.compression),
        }
    }
}

/// Resolve a string setting with priority: parameter -> env var -> default.
///
/// Empty environment values are ignored.
pub(crate) fn resolve_string(param: Option<&str>, env_var: &str, default: &str) -> String {
    // Priority 1: Use parameter if provided
    if let Some(value) = param {
        return value.to_string();
    }

    // Priority 2: Use environment variable if set
    if let Ok(value) = env::var(env_var)
        && !value.trim().is_empty()
    {
        return value;
    }

    // Priority 3: Default value
    default.to_string()
}

/// Resolve the private key path with priority: parameter -> env var -> `$HOME/.ssh/id_rsa`
pub(crate) fn resolve_key_path(path_param: Option<PathBuf>) -> PathBuf {
    // Priority 1: Use parameter if provided
    if let Some(path) = path_param {
        return path;
    }

    // Priority 2: Use environment variable if set
    if let Ok(path) = env::var(KEY_PATH_ENV_VAR)
        && !path.trim().is_empty()
    {
        return PathBuf::from(path);
    }

    // Priority 3: Default key in the home directory
    default_key_path()
}

/// `$HOME/.ssh/id_rsa`, or `.ssh/id_rsa` relative to the working directory when
/// `HOME` is unset.
pub(crate) fn default_key_path() -> PathBuf {
    match env::var_os("HOME") {
        Some(home) => PathBuf::from(home).join(DEFAULT_KEY_FILE),
        None => PathBuf::from(DEFAULT_KEY_FILE),
    }
}

/// Resolve the compression setting with priority: parameter -> env var -> default (true)
pub(crate) fn resolve_compression(compress_param: Option<bool>) -> bool {
    // Priority 1: Use parameter if provided
    if let Some(compress) = compress_param {
        return compress;
    }

    // Priority 2: Use environment variable if set
    if let Ok(env_compress) = env::var(COMPRESSION_ENV_VAR) {
        return env_compress.eq_ignore_ascii_case("true") || env_compress == "1";
    }

    // Priority 3: Default value (enabled)
    true
}
