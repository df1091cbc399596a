//! [`Config`]-related definitions.

use std::time;

use config::{builder::DefaultState, ConfigBuilder, ConfigError};
use serde::Deserialize;
use smart_default::SmartDefault;

/// Application configuration.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct Config {
    /// Server configuration.
    #[serde(default)]
    pub server: Server,

    /// Service configuration.
    #[serde(default)]
    pub service: Service,

    /// Postgres configuration.
    #[serde(default)]
    pub postgres: Postgres,

    /// Log configuration.
    #[serde(default)]
    pub log: Log,
}

impl Config {
    /// Creates a new [`Config`] by:
    /// - loading it from the provided `path` (if any);
    /// - merging it with the environment variables (if any);
    /// - using default values for missing fields.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn new(path: impl AsRef<str>) -> Result<Self, ConfigError> {
        Self::from_builder(
            ConfigBuilder::<DefaultState>::default()
                .add_source(
                    config::File::with_name(path.as_ref()).required(false),
                )
                .add_source(
                    config::Environment::with_prefix("CONF").separator("."),
                ),
        )
    }

    /// Builds and validates a [`Config`] out of the provided sources.
    fn from_builder(
        builder: ConfigBuilder<DefaultState>,
    ) -> Result<Self, ConfigError> {
        let conf: Self = builder.build()?.try_deserialize()?;
        conf.service.session.validate()?;
        Ok(conf)
    }
}

/// Server configuration.
#[derive(Clone, Debug, Deserialize, SmartDefault)]
#[serde(default)]
pub struct Server {
    /// Host to bind the server to.
    #[default("0.0.0.0".to_owned())]
    pub host: String,

    /// Port to bind the server to.
    #[default(8080)]
    pub port: u16,

    /// [CORS] configuration.
    ///
    /// [CORS]: https://developer.mozilla.org/en-US/docs/Web/HTTP/CORS
    pub cors: Cors,
}

/// [CORS] configuration.
///
/// [CORS]: https://developer.mozilla.org/en-US/docs/Web/HTTP/CORS
#[derive(Clone, Debug, Deserialize, SmartDefault)]
#[serde(default)]
pub struct Cors {
    /// List of allowed origins.
    #[default(vec!["*".to_owned()])]
    pub origins: Vec<String>,
}

/// Service configuration.
#[derive(Clone, Copy, Debug, Default, Deserialize)]
#[serde(default)]
pub struct Service {
    /// User sessions configuration.
    pub session: Session,

    /// Service tasks configuration.
    pub tasks: Tasks,
}

impl From<Service> for service::Config {
    fn from(value: Service) -> Self {
        let Service {
            session: Session { timeout },
            tasks: Tasks {
                purge_expired_sessions,
            },
        } = value;
        Self {
            session_timeout: timeout,
            purge_expired_sessions:
                service::task::purge_expired_sessions::Config {
                    interval: purge_expired_sessions.interval,
                },
        }
    }
}

/// User sessions configuration.
#[derive(Clone, Copy, Debug, Deserialize, SmartDefault)]
#[serde(default)]
pub struct Session {
    /// Idle time after which a session expires.
    #[default(time::Duration::from_secs(60 * 60))]
    #[serde(with = "humantime_serde")]
    pub timeout: time::Duration,
}

impl Session {
    /// Longest accepted [`Session::timeout`].
    pub const MAX_TIMEOUT: time::Duration =
        time::Duration::from_secs(366 * 24 * 60 * 60);

    /// Checks that [`Session::timeout`] is within `(0s, MAX_TIMEOUT]`.
    ///
    /// # Errors
    ///
    /// If the timeout is zero or exceeds [`Session::MAX_TIMEOUT`].
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.timeout.is_zero() || self.timeout > Self::MAX_TIMEOUT {
            return Err(ConfigError::Message(format!(
                "`service.session.timeout` must be positive and not longer \
                 than {} days, got {}s",
                Self::MAX_TIMEOUT.as_secs() / (24 * 60 * 60),
                self.timeout.as_secs(),
            )));
        }
        Ok(())
    }
}

/// Service tasks configuration.
#[derive(Clone, Copy, Debug, Default, Deserialize)]
#[serde(default)]
pub struct Tasks {
    /// `PurgeExpiredSessions` task configuration.
    pub purge_expired_sessions: Task,
}

/// Service task configuration.
#[derive(Clone, Copy, Debug, Deserialize, SmartDefault)]
#[serde(default)]
pub struct Task {
    /// Task execution interval.
    ///
    /// Zero disables the task.
    #[default(time::Duration::from_secs(15 * 60))]
    #[serde(with = "humantime_serde")]
    pub interval: time::Duration,
}

/// Postgres configuration.
#[derive(Clone, Debug, Deserialize, SmartDefault)]
#[serde(default)]
pub struct Postgres {
    /// Host to connect to.
    #[default("127.0.0.1".to_owned())]
    pub host: String,

    /// Port to connect to.
    #[default(5432)]
    pub port: u16,

    /// User to connect as.
    #[default("postgres".to_owned())]
    pub user: String,

    /// Password to connect with.
    #[default("postgres".to_owned())]
    pub password: String,

    /// Database name to connect to.
    #[default("postgres".to_owned())]
    pub dbname: String,
}

impl From<Postgres> for service::infra::postgres::Config {
    fn from(value: Postgres) -> Self {
        let Postgres {
            host,
            port,
            user,
            password,
            dbname,
        } = value;

        Self {
            host: Some(host),
            port: Some(port),
            user: Some(user),
            password: Some(password),
            dbname: Some(dbname),
            ..Self::default()
        }
    }
}

/// Log configuration.
#[derive(Clone, Copy, Debug, Default, Deserialize)]
#[serde(default)]
pub struct Log {
    /// Log level.
    pub level: LogLevel,
}

/// Log level.
#[derive(Clone, Copy, Debug, Default, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LogLevel {
    /// Designates very low priority, often extremely verbose, information.
    Trace,

    /// Designates lower priority information.
    Debug,

    /// Designates useful information.
    #[default]
    Info,

    /// Designates hazardous situations.
    Warn,

    /// Designates very serious errors.
    Error,
}

impl From<LogLevel> for tracing::Level {
    fn from(value: LogLevel) -> Self {
        match value {
            LogLevel::Trace => Self::TRACE,
            LogLevel::Debug => Self::DEBUG,
            LogLevel::Info => Self::INFO,
            LogLevel::Warn => Self::WARN,
            LogLevel::Error => Self::ERROR,
        }
    }
}

#[cfg(test)]
mod spec {
    use std::time::Duration;

    use config::{builder::DefaultState, ConfigBuilder, File, FileFormat};

    use super::Config;

    fn try_from_toml(toml: &str) -> Result<Config, config::ConfigError> {
        Config::from_builder(
            ConfigBuilder::<DefaultState>::default()
                .add_source(File::from_str(toml, FileFormat::Toml)),
        )
    }

    fn from_toml(toml: &str) -> Config {
        try_from_toml(toml).unwrap()
    }

    #[test]
    fn defaults() {
        let conf = from_toml("");

        assert_eq!(conf.service.session.timeout, Duration::from_secs(3600));
        assert_eq!(
            conf.service.tasks.purge_expired_sessions.interval,
            Duration::from_secs(900),
        );
        assert_eq!(conf.server.port, 8080);
        assert_eq!(conf.server.cors.origins, ["*"]);

        let svc = service::Config::from(conf.service);
        assert_eq!(svc.session_timeout, Duration::from_secs(3600));
    }

    #[test]
    fn parses_human_durations() {
        let conf = from_toml(
            r#"
            [service.session]
            timeout = "30m"

            [service.tasks.purge_expired_sessions]
            interval = "1h 30m"

            [log]
            level = "DEBUG"
            "#,
        );

        assert_eq!(conf.service.session.timeout, Duration::from_secs(1800));
        assert_eq!(
            conf.service.tasks.purge_expired_sessions.interval,
            Duration::from_secs(5400),
        );
        assert_eq!(tracing::Level::from(conf.log.level), tracing::Level::DEBUG);
    }

    #[test]
    fn rejects_out_of_range_session_timeout() {
        for timeout in ["0s", "300000y", "367days"] {
            let res = try_from_toml(&format!(
                "[service.session]\ntimeout = \"{timeout}\"",
            ));

            assert!(res.is_err(), "timeout `{timeout}` is accepted");
        }

        let conf = from_toml("[service.session]\ntimeout = \"366days\"");
        assert_eq!(conf.service.session.timeout, super::Session::MAX_TIMEOUT);
    }
}
