use std::env;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

use crate::features::rate_limits::models::{EnforcementMode, RecordUsageOn, Window};

/// Source of configuration values, keyed by environment variable name.
pub type Lookup<'a> = &'a dyn Fn(&str) -> Option<String>;

/// A single problem found while loading configuration
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("{0} environment variable is not set")]
    Missing(&'static str),

    #[error("{var} environment variable is invalid: {reason}")]
    Invalid { var: &'static str, reason: String },
}

/// Every critical problem found during the startup check
#[derive(Debug, Error)]
#[error("{}", join_errors(.0))]
pub struct ConfigErrors(pub Vec<ConfigError>);

fn join_errors(errors: &[ConfigError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

#[derive(Debug, Clone)]
pub struct Config {
    pub app: AppConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    pub openai: OpenAIConfig,
    pub rate_limit: RateLimitConfig,
    pub usage: UsageConfig,
    pub webhook: WebhookConfig,
    pub swagger: SwaggerConfig,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub cors_allowed_origins: Vec<String>,
    /// Expose upstream error details to clients
    pub insecure_debug: bool,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub acquire_timeout_secs: u64,
    pub busy_timeout_secs: u64,
}

#[derive(Clone)]
pub struct AuthConfig {
    /// Shared secret callers present as a bearer token
    pub api_key: String,
}

// Keep the key out of logs.
impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("api_key", &"***")
            .finish()
    }
}

/// Upstream chat completion settings
#[derive(Clone)]
pub struct OpenAIConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub top_p: f32,
    pub frequency_penalty: f32,
    pub presence_penalty: f32,
    pub timeout: Duration,
}

impl std::fmt::Debug for OpenAIConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAIConfig")
            .field("api_key", &"***")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("top_p", &self.top_p)
            .field("frequency_penalty", &self.frequency_penalty)
            .field("presence_penalty", &self.presence_penalty)
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Validated rate limit settings. A window is enabled iff its limit is `Some`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitConfig {
    pub hourly_limit: Option<u64>,
    pub daily_limit: Option<u64>,
    pub mode: EnforcementMode,
    pub record_on: RecordUsageOn,
}

#[derive(Debug, Clone)]
pub struct UsageConfig {
    /// How often old usage records are pruned. Zero disables pruning.
    pub prune_interval: Duration,
}

#[derive(Debug, Clone, Default)]
pub struct WebhookConfig {
    pub discord_url: Option<String>,
}

#[derive(Debug, Clone)]
pub struct SwaggerConfig {
    pub title: String,
    pub version: String,
    pub description: String,
}

impl Config {
    /// Read the process environment. `.env` is loaded by `main` before the
    /// logger starts, so its values are already visible here.
    pub fn from_env() -> Result<Self, ConfigErrors> {
        Self::from_lookup(&|key| env::var(key).ok())
    }

    /// Build the configuration, reporting every critical problem at once.
    pub fn from_lookup(lookup: Lookup<'_>) -> Result<Self, ConfigErrors> {
        let mut errors = Vec::new();

        let app = collect(AppConfig::from_lookup(lookup), &mut errors);
        let database = collect(DatabaseConfig::from_lookup(lookup), &mut errors);
        let auth = collect(AuthConfig::from_lookup(lookup), &mut errors);
        let openai = collect(OpenAIConfig::from_lookup(lookup), &mut errors);
        let rate_limit = RateLimitConfig::from_lookup(lookup)
            .map_err(|e| errors.extend(e))
            .ok();
        let usage = collect(UsageConfig::from_lookup(lookup), &mut errors);
        let webhook = WebhookConfig::from_lookup(lookup);
        let swagger = SwaggerConfig::from_lookup(lookup);

        match (app, database, auth, openai, rate_limit, usage) {
            (Some(app), Some(database), Some(auth), Some(openai), Some(rate_limit), Some(usage)) => {
                Ok(Config {
                    app,
                    database,
                    auth,
                    openai,
                    rate_limit,
                    usage,
                    webhook,
                    swagger,
                })
            }
            _ => Err(ConfigErrors(errors)),
        }
    }
}

fn collect<T>(result: Result<T, ConfigError>, errors: &mut Vec<ConfigError>) -> Option<T> {
    result.map_err(|e| errors.push(e)).ok()
}

/// Parse `var` with `FromStr`, falling back to `default` when unset.
fn parse_or<T: FromStr>(lookup: Lookup<'_>, var: &'static str, default: T) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match lookup(var) {
        Some(raw) => raw.trim().parse::<T>().map_err(|e| ConfigError::Invalid {
            var,
            reason: e.to_string(),
        }),
        None => Ok(default),
    }
}

fn parse_bool(lookup: Lookup<'_>, var: &'static str, default: bool) -> Result<bool, ConfigError> {
    let Some(raw) = lookup(var) else {
        return Ok(default);
    };

    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" | "" => Ok(false),
        other => Err(ConfigError::Invalid {
            var,
            reason: format!("expected a boolean, got '{}'", other),
        }),
    }
}

/// A limit is required when its window is enabled and must be written as
/// plain decimal digits with no surrounding whitespace: `+5`, `-1`, `1.5`
/// and ` 5` are all rejected. Values beyond `u64::MAX` saturate, since no
/// usage count can reach them.
fn parse_limit(lookup: Lookup<'_>, var: &'static str) -> Result<u64, ConfigError> {
    let raw = lookup(var).ok_or(ConfigError::Missing(var))?;

    if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ConfigError::Invalid {
            var,
            reason: format!("'{}' is not a valid non-negative integer", raw),
        });
    }

    Ok(raw.parse::<u64>().unwrap_or(u64::MAX))
}

impl AppConfig {
    const DEFAULT_PORT: u16 = 8000;

    pub fn from_lookup(lookup: Lookup<'_>) -> Result<Self, ConfigError> {
        let host = lookup("HOST").unwrap_or_else(|| "127.0.0.1".to_string());
        let port = parse_or(lookup, "PORT", Self::DEFAULT_PORT)?;

        // Parse CORS allowed origins from comma-separated string
        let cors_allowed_origins = lookup("CORS_ALLOWED_ORIGINS")
            .unwrap_or_else(|| "*".to_string())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let insecure_debug = parse_bool(lookup, "INSECURE_DEBUG", false)?;

        Ok(Self {
            host,
            port,
            cors_allowed_origins,
            insecure_debug,
        })
    }

    pub fn server_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl DatabaseConfig {
    const DEFAULT_URL: &'static str = "sqlite://proxygpt.db";
    const DEFAULT_MAX_CONNECTIONS: u32 = 5;
    const DEFAULT_ACQUIRE_TIMEOUT_SECS: u64 = 5;
    const DEFAULT_BUSY_TIMEOUT_SECS: u64 = 5;

    pub fn from_lookup(lookup: Lookup<'_>) -> Result<Self, ConfigError> {
        let url = lookup("DATABASE_URL").unwrap_or_else(|| Self::DEFAULT_URL.to_string());
        let max_connections = parse_or(lookup, "DB_MAX_CONNECTIONS", Self::DEFAULT_MAX_CONNECTIONS)?;
        let acquire_timeout_secs = parse_or(
            lookup,
            "DB_ACQUIRE_TIMEOUT_SECS",
            Self::DEFAULT_ACQUIRE_TIMEOUT_SECS,
        )?;
        let busy_timeout_secs =
            parse_or(lookup, "DB_BUSY_TIMEOUT_SECS", Self::DEFAULT_BUSY_TIMEOUT_SECS)?;

        if max_connections == 0 {
            return Err(ConfigError::Invalid {
                var: "DB_MAX_CONNECTIONS",
                reason: "must be at least 1".to_string(),
            });
        }

        Ok(Self {
            url,
            max_connections,
            acquire_timeout_secs,
            busy_timeout_secs,
        })
    }
}

impl AuthConfig {
    const MIN_SECURE_KEY_LEN: usize = 5;

    pub fn from_lookup(lookup: Lookup<'_>) -> Result<Self, ConfigError> {
        let api_key = lookup("PROXYGPT_API_KEY").ok_or(ConfigError::Missing("PROXYGPT_API_KEY"))?;

        if api_key.len() < Self::MIN_SECURE_KEY_LEN {
            tracing::warn!("PROXYGPT_API_KEY environment variable is too short to be secure");
        }

        Ok(Self { api_key })
    }
}

impl OpenAIConfig {
    const MIN_KEY_LEN: usize = 5;
    const DEFAULT_BASE_URL: &'static str = "https://api.openai.com/v1";
    const DEFAULT_MODEL: &'static str = "gpt-4";
    const DEFAULT_TEMPERATURE: f32 = 0.2;
    const DEFAULT_MAX_TOKENS: u32 = 1642;
    const DEFAULT_TIMEOUT_SECS: u64 = 60;

    pub fn from_lookup(lookup: Lookup<'_>) -> Result<Self, ConfigError> {
        let api_key = lookup("OPENAI_API_KEY").ok_or(ConfigError::Missing("OPENAI_API_KEY"))?;

        if api_key.len() < Self::MIN_KEY_LEN {
            return Err(ConfigError::Invalid {
                var: "OPENAI_API_KEY",
                reason: "too short to be a working key".to_string(),
            });
        }
        if !api_key.starts_with("sk-") {
            return Err(ConfigError::Invalid {
                var: "OPENAI_API_KEY",
                reason: "not a valid secret key".to_string(),
            });
        }

        let base_url = lookup("OPENAI_BASE_URL")
            .unwrap_or_else(|| Self::DEFAULT_BASE_URL.to_string())
            .trim_end_matches('/')
            .to_string();
        let model = lookup("OPENAI_MODEL").unwrap_or_else(|| Self::DEFAULT_MODEL.to_string());
        let timeout_secs = parse_or(lookup, "OPENAI_TIMEOUT_SECS", Self::DEFAULT_TIMEOUT_SECS)?;

        Ok(Self {
            api_key,
            base_url,
            model,
            temperature: parse_or(lookup, "OPENAI_TEMPERATURE", Self::DEFAULT_TEMPERATURE)?,
            max_tokens: parse_or(lookup, "OPENAI_MAX_TOKENS", Self::DEFAULT_MAX_TOKENS)?,
            top_p: parse_or(lookup, "OPENAI_TOP_P", 1.0)?,
            frequency_penalty: parse_or(lookup, "OPENAI_FREQUENCY_PENALTY", 0.0)?,
            presence_penalty: parse_or(lookup, "OPENAI_PRESENCE_PENALTY", 0.0)?,
            timeout: Duration::from_secs(timeout_secs),
        })
    }
}

impl RateLimitConfig {
    /// Both windows are checked before returning so that every problem is
    /// reported together.
    pub fn from_lookup(lookup: Lookup<'_>) -> Result<Self, Vec<ConfigError>> {
        let mut errors = Vec::new();

        let hourly_limit = collect(
            window_limit(
                lookup,
                "PROXYGPT_USE_HOURLY_RATE_LIMIT",
                "PROXYGPT_HOURLY_RATE_LIMIT",
            ),
            &mut errors,
        );
        let daily_limit = collect(
            window_limit(
                lookup,
                "PROXYGPT_USE_DAILY_RATE_LIMIT",
                "PROXYGPT_DAILY_RATE_LIMIT",
            ),
            &mut errors,
        );
        let mode = collect(
            parse_or(lookup, "PROXYGPT_RATE_LIMIT_MODE", EnforcementMode::Soft),
            &mut errors,
        );
        let record_on = collect(
            parse_or(lookup, "PROXYGPT_RECORD_USAGE_ON", RecordUsageOn::Success),
            &mut errors,
        );

        match (hourly_limit, daily_limit, mode, record_on) {
            (Some(hourly_limit), Some(daily_limit), Some(mode), Some(record_on)) => Ok(Self {
                hourly_limit,
                daily_limit,
                mode,
                record_on,
            }),
            _ => Err(errors),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.hourly_limit.is_some() || self.daily_limit.is_some()
    }

    pub fn limit_for(&self, window: Window) -> Option<u64> {
        match window {
            Window::Hourly => self.hourly_limit,
            Window::Daily => self.daily_limit,
        }
    }

    /// Enabled windows with their limits, hourly first.
    pub fn enabled_windows(&self) -> impl Iterator<Item = (Window, u64)> + '_ {
        Window::ALL
            .into_iter()
            .filter_map(|window| self.limit_for(window).map(|limit| (window, limit)))
    }
}

fn window_limit(
    lookup: Lookup<'_>,
    enabled_var: &'static str,
    limit_var: &'static str,
) -> Result<Option<u64>, ConfigError> {
    if parse_bool(lookup, enabled_var, false)? {
        parse_limit(lookup, limit_var).map(Some)
    } else {
        Ok(None)
    }
}

impl UsageConfig {
    const DEFAULT_PRUNE_INTERVAL_SECS: u64 = 3600;

    pub fn from_lookup(lookup: Lookup<'_>) -> Result<Self, ConfigError> {
        let secs = parse_or(
            lookup,
            "PROXYGPT_USAGE_PRUNE_INTERVAL_SECS",
            Self::DEFAULT_PRUNE_INTERVAL_SECS,
        )?;

        Ok(Self {
            prune_interval: Duration::from_secs(secs),
        })
    }
}

impl WebhookConfig {
    pub fn from_lookup(lookup: Lookup<'_>) -> Self {
        Self {
            discord_url: lookup("DISCORD_WEBHOOK").filter(|s| !s.trim().is_empty()),
        }
    }
}

impl SwaggerConfig {
    pub fn from_lookup(lookup: Lookup<'_>) -> Self {
        Self {
            title: lookup("SWAGGER_TITLE").unwrap_or_else(|| "ProxyGPT API".to_string()),
            version: lookup("SWAGGER_VERSION")
                .unwrap_or_else(|| env!("CARGO_PKG_VERSION").to_string()),
            description: lookup("SWAGGER_DESCRIPTION").unwrap_or_else(|| {
                "Rate-limited proxy for templated chat completions".to_string()
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    const REQUIRED: [(&str, &str); 2] = [
        ("OPENAI_API_KEY", "sk-test-key"),
        ("PROXYGPT_API_KEY", "proxy-secret"),
    ];

    fn with_required(extra: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let mut pairs: Vec<(&str, &str)> = REQUIRED.to_vec();
        pairs.extend_from_slice(extra);
        lookup_from(&pairs)
    }

    #[test]
    fn test_defaults_leave_rate_limiting_disabled() {
        let config = Config::from_lookup(&with_required(&[])).unwrap();

        assert!(!config.rate_limit.is_enabled());
        assert_eq!(config.rate_limit.mode, EnforcementMode::Soft);
        assert_eq!(config.rate_limit.record_on, RecordUsageOn::Success);
        assert_eq!(config.app.port, 8000);
        assert_eq!(config.openai.model, "gpt-4");
        assert_eq!(config.openai.max_tokens, 1642);
        assert_eq!(config.usage.prune_interval, Duration::from_secs(3600));
        assert!(config.webhook.discord_url.is_none());
    }

    #[test]
    fn test_enabled_windows_parse_limits() {
        let config = Config::from_lookup(&with_required(&[
            ("PROXYGPT_USE_HOURLY_RATE_LIMIT", "true"),
            ("PROXYGPT_HOURLY_RATE_LIMIT", "3"),
            ("PROXYGPT_USE_DAILY_RATE_LIMIT", "1"),
            ("PROXYGPT_DAILY_RATE_LIMIT", "100"),
        ]))
        .unwrap();

        assert_eq!(config.rate_limit.hourly_limit, Some(3));
        assert_eq!(config.rate_limit.daily_limit, Some(100));
        let windows: Vec<_> = config.rate_limit.enabled_windows().collect();
        assert_eq!(windows, vec![(Window::Hourly, 3), (Window::Daily, 100)]);
    }

    #[test]
    fn test_zero_limit_is_accepted() {
        let lookup = lookup_from(&[
            ("PROXYGPT_USE_DAILY_RATE_LIMIT", "true"),
            ("PROXYGPT_DAILY_RATE_LIMIT", "0"),
        ]);
        let config = RateLimitConfig::from_lookup(&lookup).unwrap();
        assert_eq!(config.daily_limit, Some(0));
    }

    #[test]
    fn test_enabled_window_without_limit_is_fatal() {
        let lookup = lookup_from(&[("PROXYGPT_USE_HOURLY_RATE_LIMIT", "true")]);
        assert_eq!(
            RateLimitConfig::from_lookup(&lookup),
            Err(vec![ConfigError::Missing("PROXYGPT_HOURLY_RATE_LIMIT")])
        );
    }

    #[test]
    fn test_limit_must_be_plain_digits() {
        for bad in ["-1", "+5", "1.5", "ten", "", " 5", "5\n"] {
            let lookup = lookup_from(&[
                ("PROXYGPT_USE_DAILY_RATE_LIMIT", "true"),
                ("PROXYGPT_DAILY_RATE_LIMIT", bad),
            ]);
            let result = RateLimitConfig::from_lookup(&lookup);
            assert!(
                matches!(
                    result.as_ref().map_err(Vec::as_slice),
                    Err([ConfigError::Invalid {
                        var: "PROXYGPT_DAILY_RATE_LIMIT",
                        ..
                    }])
                ),
                "limit {:?} should be rejected",
                bad
            );
        }
    }

    #[test]
    fn test_limits_beyond_u32_are_accepted() {
        let lookup = lookup_from(&[
            ("PROXYGPT_USE_DAILY_RATE_LIMIT", "true"),
            ("PROXYGPT_DAILY_RATE_LIMIT", "5000000000"),
            ("PROXYGPT_USE_HOURLY_RATE_LIMIT", "true"),
            ("PROXYGPT_HOURLY_RATE_LIMIT", "99999999999999999999999"),
        ]);
        let config = RateLimitConfig::from_lookup(&lookup).unwrap();
        assert_eq!(config.daily_limit, Some(5_000_000_000));
        assert_eq!(config.hourly_limit, Some(u64::MAX));
    }

    #[test]
    fn test_both_misconfigured_windows_are_reported() {
        let lookup = with_required(&[
            ("PROXYGPT_USE_HOURLY_RATE_LIMIT", "true"),
            ("PROXYGPT_USE_DAILY_RATE_LIMIT", "true"),
            ("PROXYGPT_DAILY_RATE_LIMIT", "x"),
        ]);
        let errors = Config::from_lookup(&lookup).unwrap_err();

        assert_eq!(errors.0.len(), 2);
        assert_eq!(
            errors.0[0],
            ConfigError::Missing("PROXYGPT_HOURLY_RATE_LIMIT")
        );
        assert!(matches!(
            errors.0[1],
            ConfigError::Invalid {
                var: "PROXYGPT_DAILY_RATE_LIMIT",
                ..
            }
        ));
    }

    #[test]
    fn test_disabled_window_ignores_bad_limit() {
        let lookup = lookup_from(&[
            ("PROXYGPT_USE_HOURLY_RATE_LIMIT", "false"),
            ("PROXYGPT_HOURLY_RATE_LIMIT", "garbage"),
        ]);
        let config = RateLimitConfig::from_lookup(&lookup).unwrap();
        assert_eq!(config.hourly_limit, None);
    }

    #[test]
    fn test_openai_key_checks() {
        let missing = OpenAIConfig::from_lookup(&lookup_from(&[]));
        assert!(matches!(missing, Err(ConfigError::Missing("OPENAI_API_KEY"))));

        let short = OpenAIConfig::from_lookup(&lookup_from(&[("OPENAI_API_KEY", "sk-")]));
        assert!(matches!(short, Err(ConfigError::Invalid { .. })));

        let wrong_prefix =
            OpenAIConfig::from_lookup(&lookup_from(&[("OPENAI_API_KEY", "pk-1234567")]));
        assert!(matches!(wrong_prefix, Err(ConfigError::Invalid { .. })));
    }

    #[test]
    fn test_all_critical_errors_are_reported() {
        let lookup = lookup_from(&[
            ("PROXYGPT_USE_HOURLY_RATE_LIMIT", "true"),
            ("PROXYGPT_HOURLY_RATE_LIMIT", "1.5"),
        ]);
        let errors = Config::from_lookup(&lookup).unwrap_err();

        assert_eq!(errors.0.len(), 3);
        assert!(errors.0.contains(&ConfigError::Missing("PROXYGPT_API_KEY")));
        assert!(errors.0.contains(&ConfigError::Missing("OPENAI_API_KEY")));
        let message = errors.to_string();
        assert!(message.contains("PROXYGPT_HOURLY_RATE_LIMIT"));
    }

    #[test]
    fn test_mode_and_record_on_parse() {
        let lookup = lookup_from(&[
            ("PROXYGPT_RATE_LIMIT_MODE", "strict"),
            ("PROXYGPT_RECORD_USAGE_ON", "attempt"),
        ]);
        let config = RateLimitConfig::from_lookup(&lookup).unwrap();
        assert_eq!(config.mode, EnforcementMode::Strict);
        assert_eq!(config.record_on, RecordUsageOn::Attempt);

        let bad = lookup_from(&[("PROXYGPT_RATE_LIMIT_MODE", "sometimes")]);
        assert!(RateLimitConfig::from_lookup(&bad).is_err());
    }

    #[test]
    fn test_cors_origins_are_split() {
        let lookup = with_required(&[(
            "CORS_ALLOWED_ORIGINS",
            "https://a.example, https://b.example,,",
        )]);
        let config = Config::from_lookup(&lookup).unwrap();
        assert_eq!(
            config.app.cors_allowed_origins,
            vec!["https://a.example", "https://b.example"]
        );
    }
}
