//! Client configuration.
//!
//! Everything is passed explicitly into constructors. [`HuefyConfig::from_env`]
//! is the only place that reads the environment.

use anyhow::{Context, Result, bail};
use log::debug;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::http::{ClientOptions, DEFAULT_RETRY_ATTEMPTS};
use crate::runtime::Runtime;

pub const DEFAULT_BASE_URL: &str = "https://api.huefy.com/api/v1/sdk";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_PROVIDER: &str = "ses";

pub const ENV_API_KEY: &str = "HUEFY_API_KEY";
pub const ENV_BASE_URL: &str = "HUEFY_BASE_URL";
pub const ENV_TIMEOUT: &str = "HUEFY_TIMEOUT";
pub const ENV_RETRY_ATTEMPTS: &str = "HUEFY_RETRY_ATTEMPTS";
pub const ENV_DEFAULT_PROVIDER: &str = "HUEFY_DEFAULT_PROVIDER";
const ENV_DEFAULT_TEMPLATE_KEY: &str = "HUEFY_DEFAULT_TEMPLATE_KEY";
const ENV_NOTIFICATION_TEMPLATE_KEY: &str = "HUEFY_NOTIFICATION_TEMPLATE_KEY";
const ENV_INCLUDE_NOTIFICATION_DATA: &str = "HUEFY_INCLUDE_NOTIFICATION_DATA";
const ENV_LOG_SUCCESS: &str = "HUEFY_LOG_SUCCESS";
const ENV_LOG_FAILURES: &str = "HUEFY_LOG_FAILURES";

/// Secret presented in the `X-API-Key` header. Never printed.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiKey(String);

impl ApiKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiKey(<redacted>)")
    }
}

/// Settings for the mail transport adapter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MailSettings {
    /// Template used when a message carries no `X-Template-Key` header.
    pub default_template_key: Option<String>,
}

/// Settings for the notification channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationSettings {
    pub default_template_key: Option<String>,
    /// Merge notification metadata into the template data.
    pub include_notification_data: bool,
}

impl Default for NotificationSettings {
    fn default() -> Self {
        Self {
            default_template_key: None,
            include_notification_data: true,
        }
    }
}

/// Which adapter sends get a log line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogSettings {
    pub log_successful_sends: bool,
    pub log_failed_sends: bool,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            log_successful_sends: false,
            log_failed_sends: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HuefyConfig {
    pub api_key: ApiKey,
    pub base_url: String,
    /// Per-attempt timeout; zero disables it.
    pub timeout: Duration,
    pub retry_attempts: u32,
    pub default_provider: Option<String>,
    pub mail: MailSettings,
    pub notifications: NotificationSettings,
    pub logging: LogSettings,
}

impl HuefyConfig {
    /// Configuration with every setting at its default.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: ApiKey::new(api_key),
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            retry_attempts: DEFAULT_RETRY_ATTEMPTS,
            default_provider: Some(DEFAULT_PROVIDER.to_string()),
            mail: MailSettings::default(),
            notifications: NotificationSettings::default(),
            logging: LogSettings::default(),
        }
    }

    /// Reads `HUEFY_*` environment variables, falling back to defaults.
    pub fn from_env<R: Runtime + ?Sized>(runtime: &R) -> Result<Self> {
        Self::from_env_with_api_key(runtime, None)
    }

    /// Like [`from_env`](Self::from_env), but an explicit `api_key` wins over
    /// `HUEFY_API_KEY`.
    #[tracing::instrument(skip(runtime, api_key))]
    pub fn from_env_with_api_key<R: Runtime + ?Sized>(
        runtime: &R,
        api_key: Option<String>,
    ) -> Result<Self> {
        let api_key = api_key
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
            .or_else(|| read_var(runtime, ENV_API_KEY));
        let Some(api_key) = api_key else {
            bail!("{} is not set", ENV_API_KEY);
        };

        let mut config = Self::new(api_key);

        if let Some(url) = read_var(runtime, ENV_BASE_URL) {
            config.base_url = url;
        }
        config.base_url = config.base_url.trim_end_matches('/').to_string();

        if let Some(secs) = parse_var::<u64, _>(runtime, ENV_TIMEOUT)? {
            config.timeout = Duration::from_secs(secs);
        }
        if let Some(attempts) = parse_var::<u32, _>(runtime, ENV_RETRY_ATTEMPTS)? {
            config.retry_attempts = attempts;
        }
        if let Ok(provider) = runtime.env_var(ENV_DEFAULT_PROVIDER) {
            // Set but empty disables the default provider
            config.default_provider = Some(provider.trim().to_string()).filter(|p| !p.is_empty());
        }

        config.mail.default_template_key = read_var(runtime, ENV_DEFAULT_TEMPLATE_KEY);
        config.notifications.default_template_key =
            read_var(runtime, ENV_NOTIFICATION_TEMPLATE_KEY);
        if let Some(include) = parse_bool_var(runtime, ENV_INCLUDE_NOTIFICATION_DATA)? {
            config.notifications.include_notification_data = include;
        }
        if let Some(log_success) = parse_bool_var(runtime, ENV_LOG_SUCCESS)? {
            config.logging.log_successful_sends = log_success;
        }
        if let Some(log_failures) = parse_bool_var(runtime, ENV_LOG_FAILURES)? {
            config.logging.log_failed_sends = log_failures;
        }

        debug!(
            "Loaded config: base_url={}, timeout={:?}, retry_attempts={}, default_provider={:?}",
            config.base_url, config.timeout, config.retry_attempts, config.default_provider
        );

        Ok(config)
    }

    /// Connection options for [`HttpClient`](crate::http::HttpClient).
    pub fn client_options(&self) -> ClientOptions {
        ClientOptions::new(&self.base_url)
            .timeout(self.timeout)
            .retry_attempts(self.retry_attempts)
    }
}

fn read_var<R: Runtime + ?Sized>(runtime: &R, key: &str) -> Option<String> {
    runtime
        .env_var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_var<T, R>(runtime: &R, key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
    R: Runtime + ?Sized,
{
    read_var(runtime, key)
        .map(|v| v.parse::<T>().with_context(|| format!("Invalid value for {}: {:?}", key, v)))
        .transpose()
}

fn parse_bool_var<R: Runtime + ?Sized>(runtime: &R, key: &str) -> Result<Option<bool>> {
    let Some(value) = read_var(runtime, key) else {
        return Ok(None);
    };
    match value.to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(Some(true)),
        "0" | "false" | "no" | "off" => Ok(Some(false)),
        _ => bail!("Invalid value for {}: {:?} (expected true or false)", key, value),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::MockRuntime;
    use std::collections::HashMap;

    fn runtime_with(vars: &[(&str, &str)]) -> MockRuntime {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        let mut runtime = MockRuntime::new();
        runtime.expect_env_var().returning(move |key| {
            vars.get(key)
                .cloned()
                .ok_or(std::env::VarError::NotPresent)
        });
        runtime
    }

    #[test]
    fn test_from_env_defaults() {
        let runtime = runtime_with(&[(ENV_API_KEY, "secret")]);
        let config = HuefyConfig::from_env(&runtime).unwrap();

        assert_eq!(config.api_key.expose(), "secret");
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert_eq!(config.retry_attempts, 3);
        assert_eq!(config.default_provider.as_deref(), Some("ses"));
        assert_eq!(config.mail.default_template_key, None);
        assert!(config.notifications.include_notification_data);
        assert!(!config.logging.log_successful_sends);
        assert!(config.logging.log_failed_sends);
    }

    #[test]
    fn test_from_env_overrides() {
        let runtime = runtime_with(&[
            (ENV_API_KEY, "secret"),
            (ENV_BASE_URL, "http://localhost:8080/api/"),
            (ENV_TIMEOUT, "5"),
            (ENV_RETRY_ATTEMPTS, "0"),
            (ENV_DEFAULT_PROVIDER, "sendgrid"),
            ("HUEFY_DEFAULT_TEMPLATE_KEY", "generic"),
            ("HUEFY_NOTIFICATION_TEMPLATE_KEY", "notice"),
            ("HUEFY_INCLUDE_NOTIFICATION_DATA", "false"),
            ("HUEFY_LOG_SUCCESS", "yes"),
            ("HUEFY_LOG_FAILURES", "0"),
        ]);
        let config = HuefyConfig::from_env(&runtime).unwrap();

        assert_eq!(config.base_url, "http://localhost:8080/api");
        assert_eq!(config.timeout, Duration::from_secs(5));
        assert_eq!(config.retry_attempts, 0);
        assert_eq!(config.default_provider.as_deref(), Some("sendgrid"));
        assert_eq!(config.mail.default_template_key.as_deref(), Some("generic"));
        assert_eq!(
            config.notifications.default_template_key.as_deref(),
            Some("notice")
        );
        assert!(!config.notifications.include_notification_data);
        assert!(config.logging.log_successful_sends);
        assert!(!config.logging.log_failed_sends);
    }

    #[test]
    fn test_from_env_missing_api_key() {
        let runtime = runtime_with(&[]);
        let err = HuefyConfig::from_env(&runtime).unwrap_err();
        assert!(err.to_string().contains(ENV_API_KEY));
    }

    #[test]
    fn test_explicit_api_key_wins() {
        let runtime = runtime_with(&[(ENV_API_KEY, "from-env")]);
        let config =
            HuefyConfig::from_env_with_api_key(&runtime, Some("from-flag".to_string())).unwrap();
        assert_eq!(config.api_key.expose(), "from-flag");

        let runtime = runtime_with(&[]);
        let config =
            HuefyConfig::from_env_with_api_key(&runtime, Some("from-flag".to_string())).unwrap();
        assert_eq!(config.api_key.expose(), "from-flag");
    }

    #[test]
    fn test_from_env_invalid_number() {
        let runtime = runtime_with(&[(ENV_API_KEY, "secret"), (ENV_TIMEOUT, "soon")]);
        let err = HuefyConfig::from_env(&runtime).unwrap_err();
        assert!(err.to_string().contains(ENV_TIMEOUT));
    }

    #[test]
    fn test_zero_timeout_is_kept() {
        let runtime = runtime_with(&[(ENV_API_KEY, "secret"), (ENV_TIMEOUT, "0")]);
        let config = HuefyConfig::from_env(&runtime).unwrap();
        assert_eq!(config.timeout, Duration::ZERO);

        // The executor reads zero as no timeout
        let options = config.client_options();
        assert_eq!(options.timeout, Duration::ZERO);
        assert!(crate::http::HttpClient::new(&config.api_key, &options).is_ok());
    }

    #[test]
    fn test_from_env_invalid_bool() {
        let runtime = runtime_with(&[(ENV_API_KEY, "secret"), (ENV_LOG_SUCCESS, "maybe")]);
        let err = HuefyConfig::from_env(&runtime).unwrap_err();
        assert!(err.to_string().contains(ENV_LOG_SUCCESS));
    }

    #[test]
    fn test_empty_default_provider_disables_it() {
        let runtime = runtime_with(&[(ENV_API_KEY, "secret"), (ENV_DEFAULT_PROVIDER, "")]);
        let config = HuefyConfig::from_env(&runtime).unwrap();
        assert_eq!(config.default_provider, None);
    }

    #[test]
    fn test_api_key_debug_is_redacted() {
        let config = HuefyConfig::new("super-secret-key");
        let debug = format!("{:?}", config);
        assert!(!debug.contains("super-secret-key"));
        assert!(debug.contains("<redacted>"));
    }

    #[test]
    fn test_client_options() {
        let mut config = HuefyConfig::new("secret");
        config.base_url = "http://localhost:1234".to_string();
        config.retry_attempts = 5;
        config.timeout = Duration::from_secs(2);

        let options = config.client_options();
        assert_eq!(options.base_url(), "http://localhost:1234");
        assert_eq!(options.timeout, Duration::from_secs(2));
        assert_eq!(options.retry.max_attempts, 5);
    }
}
