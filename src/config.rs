//! Startup configuration.
//!
//! Every setting is resolved once, before the image is loaded, with the
//! precedence **flag > environment > built-in default**:
//!
//! | Setting     | Env var       | Flag    | Default      |
//! |-------------|---------------|---------|--------------|
//! | image file  | `IMAGE_FILE`  | `-file` | `image.png`  |
//! | crop path   | `URL_PATH`    | `-url`  | `/testimage` |
//! | listen port | `LISTEN_PORT` | `-port` | `8080`       |
//!
//! Flags are single-dash long names: `-port 9000` or `-port=9000`; a `--`
//! prefix is accepted as well.
//! Parsing stops at the first non-flag argument or at a bare `--`.

use std::collections::HashMap;
use std::ffi::OsString;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::path::PathBuf;

use thiserror::Error;

/// Environment variable naming the source image.
pub const IMAGE_FILE_ENV: &str = "IMAGE_FILE";
/// Environment variable naming the crop endpoint path.
pub const URL_PATH_ENV: &str = "URL_PATH";
/// Environment variable naming the TCP listen port.
pub const LISTEN_PORT_ENV: &str = "LISTEN_PORT";

pub const DEFAULT_IMAGE_FILE: &str = "image.png";
pub const DEFAULT_URL_PATH: &str = "/testimage";
pub const DEFAULT_PORT: u16 = 8080;

/// Errors raised while resolving the configuration.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// `-h` / `-help` was passed; the caller should print [`ServerConfig::usage`].
    #[error("help requested")]
    HelpRequested,

    /// A flag that this program does not define.
    #[error("flag provided but not defined: -{0}")]
    UnknownFlag(String),

    /// A flag appeared as the last argument without a value.
    #[error("flag needs an argument: -{0}")]
    MissingValue(String),

    /// The port (from a flag or `LISTEN_PORT`) is not a valid TCP port.
    #[error("invalid port {value:?} from {source_name}")]
    InvalidPort { value: String, source_name: String },

    /// An argument or environment value is not valid UTF-8.
    #[error("{source_name} is not valid UTF-8: {value:?}")]
    NonUnicode { value: String, source_name: String },

    /// The crop path must be an absolute URL path.
    #[error("url path {0:?} must start with '/'")]
    RelativeUrlPath(String),

    /// The crop path is matched literally; route captures are not allowed.
    #[error("url path {0:?} may not contain ':' or '*'")]
    PatternUrlPath(String),

    /// The crop path may not shadow the liveness check.
    #[error("url path {0:?} collides with the health check route")]
    ReservedUrlPath(String),
}

/// Immutable process-wide configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// TCP port to listen on (all interfaces).
    pub port: u16,
    /// Path of the image decoded at startup and checked by `/healthz`.
    pub image_file: PathBuf,
    /// Route that serves crops.
    pub url_path: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            image_file: PathBuf::from(DEFAULT_IMAGE_FILE),
            url_path: DEFAULT_URL_PATH.to_string(),
        }
    }
}

impl ServerConfig {
    /// Resolve from the real process arguments and environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        let args = std::env::args_os()
            .skip(1)
            .map(|arg| unicode_value(arg, "command-line argument"))
            .collect::<Result<Vec<_>, _>>()?;

        let mut vars = HashMap::new();
        for key in [IMAGE_FILE_ENV, URL_PATH_ENV, LISTEN_PORT_ENV] {
            if let Some(value) = std::env::var_os(key) {
                vars.insert(key, unicode_value(value, key)?);
            }
        }

        Self::resolve(args, |key| vars.get(key).cloned())
    }

    /// Resolve from explicit arguments (program name already stripped) and an
    /// environment lookup.
    pub fn resolve<I, S, F>(args: I, env: F) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(file) = env(IMAGE_FILE_ENV) {
            config.image_file = PathBuf::from(file);
        }
        if let Some(url) = env(URL_PATH_ENV) {
            config.url_path = url;
        }
        if let Some(port) = env(LISTEN_PORT_ENV) {
            config.port = parse_port(&port, LISTEN_PORT_ENV)?;
        }

        let mut args = args.into_iter().map(Into::<String>::into);
        while let Some(arg) = args.next() {
            let Some(flag) = strip_flag_prefix(&arg) else {
                break;
            };
            if flag.is_empty() {
                // bare "--" terminates flag parsing
                break;
            }

            let (name, inline_value) = match flag.split_once('=') {
                Some((name, value)) => (name.to_string(), Some(value.to_string())),
                None => (flag.to_string(), None),
            };

            if matches!(name.as_str(), "h" | "help") {
                return Err(ConfigError::HelpRequested);
            }
            if !matches!(name.as_str(), "file" | "url" | "port") {
                return Err(ConfigError::UnknownFlag(name));
            }

            let value = match inline_value {
                Some(value) => value,
                None => args
                    .next()
                    .ok_or_else(|| ConfigError::MissingValue(name.clone()))?,
            };

            match name.as_str() {
                "file" => config.image_file = PathBuf::from(value),
                "url" => config.url_path = value,
                "port" => config.port = parse_port(&value, "-port")?,
                _ => unreachable!("flag names are checked above"),
            }
        }

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if !self.url_path.starts_with('/') {
            return Err(ConfigError::RelativeUrlPath(self.url_path.clone()));
        }
        if self.url_path.contains([':', '*']) {
            return Err(ConfigError::PatternUrlPath(self.url_path.clone()));
        }
        if self.url_path == crate::server::HEALTH_PATH {
            return Err(ConfigError::ReservedUrlPath(self.url_path.clone()));
        }
        Ok(())
    }

    /// Address the listener binds to.
    pub fn listen_addr(&self) -> SocketAddr {
        SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, self.port))
    }

    /// Help text printed for `-help` and on configuration errors.
    pub fn usage(program: &str) -> String {
        format!(
            "Usage of {program}:\n  \
             -file string\n    \
             \tthe path to the file to crop (env {IMAGE_FILE_ENV}, default \"{DEFAULT_IMAGE_FILE}\")\n  \
             -port int\n    \
             \tport to listen on (env {LISTEN_PORT_ENV}, default {DEFAULT_PORT})\n  \
             -url string\n    \
             \tthe url path for the crop method (env {URL_PATH_ENV}, default \"{DEFAULT_URL_PATH}\")\n"
        )
    }
}

fn strip_flag_prefix(arg: &str) -> Option<&str> {
    if arg == "-" {
        return None;
    }
    arg.strip_prefix("--").or_else(|| arg.strip_prefix('-'))
}

fn unicode_value(value: OsString, source_name: &str) -> Result<String, ConfigError> {
    value.into_string().map_err(|raw| ConfigError::NonUnicode {
        value: raw.to_string_lossy().into_owned(),
        source_name: source_name.to_string(),
    })
}

fn parse_port(value: &str, source_name: &str) -> Result<u16, ConfigError> {
    value.trim().parse::<u16>().map_err(|_| ConfigError::InvalidPort {
        value: value.to_string(),
        source_name: source_name.to_string(),
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
