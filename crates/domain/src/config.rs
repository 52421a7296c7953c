//! Environment-driven configuration for the API server and the provisioning
//! binary. Values are trimmed and blank values count as unset.

use std::{env, io};

use thiserror::Error;

use crate::model::{CounterId, CounterIdError, ResponseHeaders, DEFAULT_CORS_ALLOW_ORIGIN};

const SKIP_DOTENV: &str = "VIEWCOUNT_SKIP_DOTENV";
const CORS_OFF: &str = "none";

/// One HTTP listener. A Unix socket takes precedence over the TCP address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListenerConfig {
    address: Option<String>,
    unix_socket: Option<String>,
}

impl ListenerConfig {
    pub fn new(address: Option<String>, unix_socket: Option<String>) -> Self {
        Self {
            address,
            unix_socket,
        }
    }

    pub fn address(&self) -> Option<&str> {
        self.address.as_deref()
    }

    pub fn unix_socket(&self) -> Option<&str> {
        self.unix_socket.as_deref()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiConfig {
    database_url: String,
    public: ListenerConfig,
    internal: Option<ListenerConfig>,
    cors_allow_origin: Option<String>,
    counter_id: CounterId,
}

impl ApiConfig {
    /// Reads `DATABASE_URL`, `API_BIND_ADDRESS`, `API_UNIX_SOCKET`, the
    /// `API_INTERNAL_*` pair, `API_CORS_ALLOW_ORIGIN` and `COUNTER_ID`.
    pub fn load_from_env() -> Result<Self, ConfigError> {
        load_dotenv()?;

        let public = ListenerConfig::new(
            Some(require_var("API_BIND_ADDRESS")?),
            read_var("API_UNIX_SOCKET"),
        );
        let internal = match (
            read_var("API_INTERNAL_BIND_ADDRESS"),
            read_var("API_INTERNAL_UNIX_SOCKET"),
        ) {
            (None, None) => None,
            (address, unix_socket) => Some(ListenerConfig::new(address, unix_socket)),
        };

        Ok(Self {
            database_url: require_var("DATABASE_URL")?,
            public,
            internal,
            cors_allow_origin: cors_origin()?,
            counter_id: counter_id()?,
        })
    }

    pub fn database_url(&self) -> &str {
        &self.database_url
    }

    pub fn public_listener(&self) -> &ListenerConfig {
        &self.public
    }

    /// Metrics move here, off the public listener, when configured.
    pub fn internal_listener(&self) -> Option<&ListenerConfig> {
        self.internal.as_ref()
    }

    pub fn counter_id(&self) -> &CounterId {
        &self.counter_id
    }

    pub fn response_headers(&self) -> ResponseHeaders {
        ResponseHeaders::new(self.cors_allow_origin.clone())
    }
}

/// Database access only; used by `seed_counter`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageConfig {
    database_url: String,
    counter_id: CounterId,
}

impl StorageConfig {
    pub fn load_from_env() -> Result<Self, ConfigError> {
        load_dotenv()?;
        Ok(Self {
            database_url: require_var("DATABASE_URL")?,
            counter_id: counter_id()?,
        })
    }

    pub fn database_url(&self) -> &str {
        &self.database_url
    }

    pub fn counter_id(&self) -> &CounterId {
        &self.counter_id
    }
}

/// Loads `.env` from the working directory unless `VIEWCOUNT_SKIP_DOTENV` is
/// set. A missing file is fine.
pub fn load_dotenv() -> Result<(), ConfigError> {
    if env::var_os(SKIP_DOTENV).is_some() {
        return Ok(());
    }
    match dotenvy::dotenv() {
        Err(dotenvy::Error::Io(err)) if err.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(source) => Err(ConfigError::Dotenv { source }),
        Ok(_) => Ok(()),
    }
}

pub(crate) fn read_var(key: &str) -> Option<String> {
    let value = env::var(key).ok()?;
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_owned())
}

fn require_var(key: &'static str) -> Result<String, ConfigError> {
    read_var(key).ok_or(ConfigError::MissingVar { key })
}

fn counter_id() -> Result<CounterId, ConfigError> {
    let Some(raw) = read_var("COUNTER_ID") else {
        return Ok(CounterId::default());
    };
    CounterId::parse(&raw).map_err(|source| ConfigError::InvalidCounterId {
        key: "COUNTER_ID",
        source,
    })
}

/// Unset means any origin; `none` switches CORS headers off.
fn cors_origin() -> Result<Option<String>, ConfigError> {
    match read_var("API_CORS_ALLOW_ORIGIN") {
        None => Ok(Some(DEFAULT_CORS_ALLOW_ORIGIN.to_owned())),
        Some(value) if value.eq_ignore_ascii_case(CORS_OFF) => Ok(None),
        Some(value) if value.chars().all(|c| c.is_ascii_graphic()) => Ok(Some(value)),
        Some(value) => Err(ConfigError::InvalidHeaderValue {
            key: "API_CORS_ALLOW_ORIGIN",
            value,
        }),
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable `{key}`")]
    MissingVar { key: &'static str },
    #[error("invalid counter id in `{key}`: {source}")]
    InvalidCounterId {
        key: &'static str,
        #[source]
        source: CounterIdError,
    },
    #[error("`{key}` is not a valid header value: {value:?}")]
    InvalidHeaderValue { key: &'static str, value: String },
    #[error("failed to load .env file: {source}")]
    Dotenv {
        #[from]
        source: dotenvy::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Mutex, MutexGuard};

    const SERVICE_VARS: [&str; 8] = [
        "DATABASE_URL",
        "API_BIND_ADDRESS",
        "API_UNIX_SOCKET",
        "API_INTERNAL_BIND_ADDRESS",
        "API_INTERNAL_UNIX_SOCKET",
        "API_CORS_ALLOW_ORIGIN",
        "COUNTER_ID",
        SKIP_DOTENV,
    ];

    static ENV_LOCK: Mutex<()> = Mutex::new(());

    /// Holds the process environment to exactly `vars` (plus the dotenv skip
    /// flag) until dropped.
    struct ScopedEnv<'a> {
        _lock: MutexGuard<'a, ()>,
    }

    impl ScopedEnv<'_> {
        fn with(vars: &[(&str, &str)]) -> Self {
            let lock = ENV_LOCK.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            for key in SERVICE_VARS {
                env::remove_var(key);
            }
            env::set_var(SKIP_DOTENV, "1");
            for (key, value) in vars {
                env::set_var(key, value);
            }
            Self { _lock: lock }
        }
    }

    impl Drop for ScopedEnv<'_> {
        fn drop(&mut self) {
            for key in SERVICE_VARS {
                env::remove_var(key);
            }
        }
    }

    const MINIMAL_API: [(&str, &str); 2] = [
        ("DATABASE_URL", "sqlite://views.db"),
        ("API_BIND_ADDRESS", "127.0.0.1:8080"),
    ];

    #[test]
    fn minimal_api_config_uses_defaults() {
        let _env = ScopedEnv::with(&MINIMAL_API);

        let config = ApiConfig::load_from_env().unwrap();
        assert_eq!(config.database_url(), "sqlite://views.db");
        assert_eq!(
            config.public_listener(),
            &ListenerConfig::new(Some("127.0.0.1:8080".into()), None)
        );
        assert_eq!(config.internal_listener(), None);
        assert_eq!(config.counter_id(), &CounterId::default());
        assert_eq!(config.response_headers(), ResponseHeaders::default());
        assert_eq!(config.response_headers().cors_allow_origin(), Some("*"));
    }

    #[test]
    fn unix_sockets_and_internal_listener_are_read() {
        let _env = ScopedEnv::with(&[
            MINIMAL_API[0],
            MINIMAL_API[1],
            ("API_UNIX_SOCKET", "/run/viewcount/api.sock"),
            ("API_INTERNAL_UNIX_SOCKET", "/run/viewcount/metrics.sock"),
        ]);

        let config = ApiConfig::load_from_env().unwrap();
        assert_eq!(
            config.public_listener().unix_socket(),
            Some("/run/viewcount/api.sock")
        );
        let internal = config.internal_listener().expect("internal listener");
        assert_eq!(internal.address(), None);
        assert_eq!(internal.unix_socket(), Some("/run/viewcount/metrics.sock"));
    }

    #[test]
    fn internal_tcp_address_alone_enables_internal_listener() {
        let _env = ScopedEnv::with(&[
            MINIMAL_API[0],
            MINIMAL_API[1],
            ("API_INTERNAL_BIND_ADDRESS", "127.0.0.1:9100"),
        ]);

        let config = ApiConfig::load_from_env().unwrap();
        assert_eq!(
            config.internal_listener().and_then(ListenerConfig::address),
            Some("127.0.0.1:9100")
        );
    }

    #[test]
    fn counter_id_and_cors_origin_can_be_overridden() {
        let _env = ScopedEnv::with(&[
            MINIMAL_API[0],
            MINIMAL_API[1],
            ("COUNTER_ID", " resume-views "),
            ("API_CORS_ALLOW_ORIGIN", "https://resume.example.com"),
        ]);

        let config = ApiConfig::load_from_env().unwrap();
        assert_eq!(config.counter_id().as_str(), "resume-views");
        assert_eq!(
            config.response_headers().cors_allow_origin(),
            Some("https://resume.example.com")
        );
    }

    #[test]
    fn cors_can_be_switched_off() {
        let _env = ScopedEnv::with(&[
            MINIMAL_API[0],
            MINIMAL_API[1],
            ("API_CORS_ALLOW_ORIGIN", "NONE"),
        ]);

        let config = ApiConfig::load_from_env().unwrap();
        assert!(config.response_headers().cors_pairs().is_empty());
    }

    #[test]
    fn cors_origin_must_be_a_header_token() {
        let _env = ScopedEnv::with(&[
            MINIMAL_API[0],
            MINIMAL_API[1],
            ("API_CORS_ALLOW_ORIGIN", "https://a.example https://b.example"),
        ]);

        let err = ApiConfig::load_from_env().unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidHeaderValue {
                key: "API_CORS_ALLOW_ORIGIN",
                ..
            }
        ));
    }

    #[test]
    fn blank_database_url_counts_as_missing() {
        let _env = ScopedEnv::with(&[("DATABASE_URL", "  "), MINIMAL_API[1]]);

        let err = ApiConfig::load_from_env().unwrap_err();
        assert!(matches!(err, ConfigError::MissingVar { key: "DATABASE_URL" }));
    }

    #[test]
    fn api_requires_a_bind_address_but_seeding_does_not() {
        let _env = ScopedEnv::with(&[("DATABASE_URL", " sqlite://seed.db ")]);

        let err = ApiConfig::load_from_env().unwrap_err();
        assert!(matches!(err, ConfigError::MissingVar { key: "API_BIND_ADDRESS" }));

        let config = StorageConfig::load_from_env().unwrap();
        assert_eq!(config.database_url(), "sqlite://seed.db");
        assert_eq!(config.counter_id().as_str(), "counter");
    }

    #[test]
    fn malformed_counter_id_is_rejected() {
        let _env = ScopedEnv::with(&[MINIMAL_API[0], ("COUNTER_ID", "resume views")]);

        let err = StorageConfig::load_from_env().unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidCounterId {
                key: "COUNTER_ID",
                source: CounterIdError::InvalidCharacter,
            }
        ));
    }
}
