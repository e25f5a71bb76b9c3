use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub llm: LlmConfig,
    pub catalog: CatalogConfig,
    pub session: SessionConfig,
    pub recommendation: RecommendationConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
    pub graceful_shutdown_secs: u64,
}

#[derive(Clone, Debug)]
pub struct LlmConfig {
    pub primary: ProviderKind,
    pub secondary: ProviderKind,
    pub gemini_api_key: Option<SecretString>,
    pub gemini_model: String,
    pub gemini_base_url: String,
    pub ollama_base_url: String,
    pub ollama_model: String,
    pub timeout_secs: u64,
    pub max_retries: u32,
    pub failover_enabled: bool,
    pub error_threshold: u32,
    pub health_check_interval_secs: u64,
}

#[derive(Clone, Debug)]
pub struct CatalogConfig {
    pub menu_data_path: PathBuf,
}

#[derive(Clone, Debug)]
pub struct SessionConfig {
    pub idle_timeout_minutes: u64,
    pub max_active_sessions: usize,
}

#[derive(Clone, Debug)]
pub struct RecommendationConfig {
    pub max_recommendations: usize,
    pub required_facets: usize,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    Gemini,
    Ollama,
}

impl ProviderKind {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Gemini => "gemini",
            Self::Ollama => "ollama",
        }
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub menu_data_path: Option<PathBuf>,
    pub log_level: Option<String>,
    pub gemini_api_key: Option<String>,
    pub bind_address: Option<String>,
    pub port: Option<u16>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                bind_address: "127.0.0.1".to_string(),
                port: 8000,
                graceful_shutdown_secs: 15,
            },
            llm: LlmConfig {
                primary: ProviderKind::Gemini,
                secondary: ProviderKind::Ollama,
                gemini_api_key: None,
                gemini_model: "gemini-1.5-flash".to_string(),
                gemini_base_url: "https://generativelanguage.googleapis.com".to_string(),
                ollama_base_url: "http://localhost:11434".to_string(),
                ollama_model: "llama2".to_string(),
                timeout_secs: 30,
                max_retries: 3,
                failover_enabled: true,
                error_threshold: 2,
                health_check_interval_secs: 300,
            },
            catalog: CatalogConfig { menu_data_path: PathBuf::from("data/menu_data.json") },
            session: SessionConfig { idle_timeout_minutes: 30, max_active_sessions: 1000 },
            recommendation: RecommendationConfig { max_recommendations: 5, required_facets: 3 },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

fn secret_value(value: String) -> SecretString {
    value.into()
}

impl std::str::FromStr for ProviderKind {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "gemini" => Ok(Self::Gemini),
            "ollama" => Ok(Self::Ollama),
            other => Err(ConfigError::Validation(format!(
                "unsupported generation provider `{other}` (expected gemini|ollama)"
            ))),
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("menuwise.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(server) = patch.server {
            if let Some(bind_address) = server.bind_address {
                self.server.bind_address = bind_address;
            }
            if let Some(port) = server.port {
                self.server.port = port;
            }
            if let Some(graceful_shutdown_secs) = server.graceful_shutdown_secs {
                self.server.graceful_shutdown_secs = graceful_shutdown_secs;
            }
        }

        if let Some(llm) = patch.llm {
            if let Some(primary) = llm.primary {
                self.llm.primary = primary;
            }
            if let Some(secondary) = llm.secondary {
                self.llm.secondary = secondary;
            }
            if let Some(gemini_api_key_value) = llm.gemini_api_key {
                self.llm.gemini_api_key = Some(secret_value(gemini_api_key_value));
            }
            if let Some(gemini_model) = llm.gemini_model {
                self.llm.gemini_model = gemini_model;
            }
            if let Some(gemini_base_url) = llm.gemini_base_url {
                self.llm.gemini_base_url = gemini_base_url;
            }
            if let Some(ollama_base_url) = llm.ollama_base_url {
                self.llm.ollama_base_url = ollama_base_url;
            }
            if let Some(ollama_model) = llm.ollama_model {
                self.llm.ollama_model = ollama_model;
            }
            if let Some(timeout_secs) = llm.timeout_secs {
                self.llm.timeout_secs = timeout_secs;
            }
            if let Some(max_retries) = llm.max_retries {
                self.llm.max_retries = max_retries;
            }
            if let Some(failover_enabled) = llm.failover_enabled {
                self.llm.failover_enabled = failover_enabled;
            }
            if let Some(error_threshold) = llm.error_threshold {
                self.llm.error_threshold = error_threshold;
            }
            if let Some(health_check_interval_secs) = llm.health_check_interval_secs {
                self.llm.health_check_interval_secs = health_check_interval_secs;
            }
        }

        if let Some(catalog) = patch.catalog {
            if let Some(menu_data_path) = catalog.menu_data_path {
                self.catalog.menu_data_path = menu_data_path;
            }
        }

        if let Some(session) = patch.session {
            if let Some(idle_timeout_minutes) = session.idle_timeout_minutes {
                self.session.idle_timeout_minutes = idle_timeout_minutes;
            }
            if let Some(max_active_sessions) = session.max_active_sessions {
                self.session.max_active_sessions = max_active_sessions;
            }
        }

        if let Some(recommendation) = patch.recommendation {
            if let Some(max_recommendations) = recommendation.max_recommendations {
                self.recommendation.max_recommendations = max_recommendations;
            }
            if let Some(required_facets) = recommendation.required_facets {
                self.recommendation.required_facets = required_facets;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("MENUWISE_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        if let Some(value) = read_env("MENUWISE_SERVER_PORT") {
            self.server.port = parse_u16("MENUWISE_SERVER_PORT", &value)?;
        }
        if let Some(value) = read_env("MENUWISE_SERVER_GRACEFUL_SHUTDOWN_SECS") {
            self.server.graceful_shutdown_secs =
                parse_u64("MENUWISE_SERVER_GRACEFUL_SHUTDOWN_SECS", &value)?;
        }

        if let Some(value) = read_env("MENUWISE_LLM_PRIMARY") {
            self.llm.primary = value.parse()?;
        }
        if let Some(value) = read_env("MENUWISE_LLM_SECONDARY") {
            self.llm.secondary = value.parse()?;
        }
        if let Some(value) = read_env("MENUWISE_GEMINI_API_KEY") {
            self.llm.gemini_api_key = Some(secret_value(value));
        }
        if let Some(value) = read_env("MENUWISE_GEMINI_MODEL") {
            self.llm.gemini_model = value;
        }
        if let Some(value) = read_env("MENUWISE_GEMINI_BASE_URL") {
            self.llm.gemini_base_url = value;
        }
        if let Some(value) = read_env("MENUWISE_OLLAMA_BASE_URL") {
            self.llm.ollama_base_url = value;
        }
        if let Some(value) = read_env("MENUWISE_OLLAMA_MODEL") {
            self.llm.ollama_model = value;
        }
        if let Some(value) = read_env("MENUWISE_LLM_TIMEOUT_SECS") {
            self.llm.timeout_secs = parse_u64("MENUWISE_LLM_TIMEOUT_SECS", &value)?;
        }
        if let Some(value) = read_env("MENUWISE_LLM_MAX_RETRIES") {
            self.llm.max_retries = parse_u32("MENUWISE_LLM_MAX_RETRIES", &value)?;
        }
        if let Some(value) = read_env("MENUWISE_LLM_FAILOVER_ENABLED") {
            self.llm.failover_enabled = parse_bool("MENUWISE_LLM_FAILOVER_ENABLED", &value)?;
        }
        if let Some(value) = read_env("MENUWISE_LLM_ERROR_THRESHOLD") {
            self.llm.error_threshold = parse_u32("MENUWISE_LLM_ERROR_THRESHOLD", &value)?;
        }
        if let Some(value) = read_env("MENUWISE_LLM_HEALTH_CHECK_INTERVAL_SECS") {
            self.llm.health_check_interval_secs =
                parse_u64("MENUWISE_LLM_HEALTH_CHECK_INTERVAL_SECS", &value)?;
        }

        if let Some(value) = read_env("MENUWISE_MENU_DATA_PATH") {
            self.catalog.menu_data_path = PathBuf::from(value);
        }

        if let Some(value) = read_env("MENUWISE_SESSION_IDLE_TIMEOUT_MINUTES") {
            self.session.idle_timeout_minutes =
                parse_u64("MENUWISE_SESSION_IDLE_TIMEOUT_MINUTES", &value)?;
        }
        if let Some(value) = read_env("MENUWISE_SESSION_MAX_ACTIVE_SESSIONS") {
            self.session.max_active_sessions =
                parse_u32("MENUWISE_SESSION_MAX_ACTIVE_SESSIONS", &value)? as usize;
        }

        if let Some(value) = read_env("MENUWISE_MAX_RECOMMENDATIONS") {
            self.recommendation.max_recommendations =
                parse_u32("MENUWISE_MAX_RECOMMENDATIONS", &value)? as usize;
        }
        if let Some(value) = read_env("MENUWISE_REQUIRED_FACETS") {
            self.recommendation.required_facets =
                parse_u32("MENUWISE_REQUIRED_FACETS", &value)? as usize;
        }

        let log_level =
            read_env("MENUWISE_LOGGING_LEVEL").or_else(|| read_env("MENUWISE_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("MENUWISE_LOGGING_FORMAT").or_else(|| read_env("MENUWISE_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(menu_data_path) = overrides.menu_data_path {
            self.catalog.menu_data_path = menu_data_path;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(gemini_api_key) = overrides.gemini_api_key {
            self.llm.gemini_api_key = Some(secret_value(gemini_api_key));
        }
        if let Some(bind_address) = overrides.bind_address {
            self.server.bind_address = bind_address;
        }
        if let Some(port) = overrides.port {
            self.server.port = port;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_server(&self.server)?;
        validate_llm(&self.llm)?;
        validate_session(&self.session)?;
        validate_recommendation(&self.recommendation)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("menuwise.toml"), PathBuf::from("config/menuwise.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_server(server: &ServerConfig) -> Result<(), ConfigError> {
    if server.bind_address.trim().is_empty() {
        return Err(ConfigError::Validation("server.bind_address must not be empty".to_string()));
    }
    if server.port == 0 {
        return Err(ConfigError::Validation("server.port must be non-zero".to_string()));
    }
    if server.graceful_shutdown_secs == 0 || server.graceful_shutdown_secs > 300 {
        return Err(ConfigError::Validation(
            "server.graceful_shutdown_secs must be in range 1..=300".to_string(),
        ));
    }
    Ok(())
}

fn validate_llm(llm: &LlmConfig) -> Result<(), ConfigError> {
    if llm.primary == llm.secondary {
        return Err(ConfigError::Validation(
            "llm.primary and llm.secondary must name different providers".to_string(),
        ));
    }
    let needs_gemini_key = llm.primary == ProviderKind::Gemini
        || (llm.failover_enabled && llm.secondary == ProviderKind::Gemini);
    if needs_gemini_key {
        let key_present = llm
            .gemini_api_key
            .as_ref()
            .is_some_and(|key| !key.expose_secret().trim().is_empty());
        if !key_present {
            return Err(ConfigError::Validation(
                "llm.gemini_api_key is required when gemini is an active provider".to_string(),
            ));
        }
    }
    if llm.timeout_secs == 0 || llm.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "llm.timeout_secs must be in range 1..=300".to_string(),
        ));
    }
    if llm.max_retries == 0 || llm.max_retries > 10 {
        return Err(ConfigError::Validation("llm.max_retries must be in range 1..=10".to_string()));
    }
    if llm.error_threshold == 0 {
        return Err(ConfigError::Validation(
            "llm.error_threshold must be greater than zero".to_string(),
        ));
    }
    if llm.health_check_interval_secs == 0 {
        return Err(ConfigError::Validation(
            "llm.health_check_interval_secs must be greater than zero".to_string(),
        ));
    }
    Ok(())
}

fn validate_session(session: &SessionConfig) -> Result<(), ConfigError> {
    if session.idle_timeout_minutes == 0 {
        return Err(ConfigError::Validation(
            "session.idle_timeout_minutes must be greater than zero".to_string(),
        ));
    }
    if session.max_active_sessions == 0 {
        return Err(ConfigError::Validation(
            "session.max_active_sessions must be greater than zero".to_string(),
        ));
    }
    Ok(())
}

fn validate_recommendation(recommendation: &RecommendationConfig) -> Result<(), ConfigError> {
    if recommendation.max_recommendations == 0 {
        return Err(ConfigError::Validation(
            "recommendation.max_recommendations must be greater than zero".to_string(),
        ));
    }
    if recommendation.required_facets == 0 || recommendation.required_facets > 6 {
        return Err(ConfigError::Validation(
            "recommendation.required_facets must be in range 1..=6".to_string(),
        ));
    }
    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let known_level = matches!(
        logging.level.trim().to_ascii_lowercase().as_str(),
        "trace" | "debug" | "info" | "warn" | "error"
    );
    if !known_level {
        return Err(ConfigError::Validation(format!(
            "logging.level `{}` is not one of trace|debug|info|warn|error",
            logging.level
        )));
    }
    Ok(())
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().map(|value| value.trim().to_string()).filter(|value| !value.is_empty())
}

fn parse_u16(key: &str, value: &str) -> Result<u16, ConfigError> {
    value
        .parse()
        .map_err(|_| ConfigError::InvalidEnvOverride { key: key.to_string(), value: value.to_string() })
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value
        .parse()
        .map_err(|_| ConfigError::InvalidEnvOverride { key: key.to_string(), value: value.to_string() })
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value
        .parse()
        .map_err(|_| ConfigError::InvalidEnvOverride { key: key.to_string(), value: value.to_string() })
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidEnvOverride {
            key: key.to_string(),
            value: value.to_string(),
        }),
    }
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    server: Option<ServerPatch>,
    llm: Option<LlmPatch>,
    catalog: Option<CatalogPatch>,
    session: Option<SessionPatch>,
    recommendation: Option<RecommendationPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    port: Option<u16>,
    graceful_shutdown_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LlmPatch {
    primary: Option<ProviderKind>,
    secondary: Option<ProviderKind>,
    gemini_api_key: Option<String>,
    gemini_model: Option<String>,
    gemini_base_url: Option<String>,
    ollama_base_url: Option<String>,
    ollama_model: Option<String>,
    timeout_secs: Option<u64>,
    max_retries: Option<u32>,
    failover_enabled: Option<bool>,
    error_threshold: Option<u32>,
    health_check_interval_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct CatalogPatch {
    menu_data_path: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
struct SessionPatch {
    idle_timeout_minutes: Option<u64>,
    max_active_sessions: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
struct RecommendationPatch {
    max_recommendations: Option<usize>,
    required_facets: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}

#[cfg(test)]
mod tests {
    use std::env;
    use std::io::Write;
    use std::path::PathBuf;
    use std::sync::{Mutex, OnceLock};

    use secrecy::ExposeSecret;

    use super::{AppConfig, ConfigError, ConfigOverrides, LoadOptions, LogFormat, ProviderKind};

    // Environment mutation is process-wide, so every test that loads a
    // config serializes on this lock.
    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

    fn env_lock() -> std::sync::MutexGuard<'static, ()> {
        ENV_LOCK
            .get_or_init(|| Mutex::new(()))
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn clear_vars(vars: &[&str]) {
        for var in vars {
            env::remove_var(var);
        }
    }

    fn ensure(condition: bool, message: &'static str) -> Result<(), String> {
        if condition {
            Ok(())
        } else {
            Err(message.to_string())
        }
    }

    #[test]
    fn defaults_validate_with_an_api_key_override() {
        let _guard = env_lock();
        let options = LoadOptions {
            overrides: ConfigOverrides {
                gemini_api_key: Some("test-key".to_string()),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        };
        let config = AppConfig::load(options).expect("defaults should validate");
        assert_eq!(config.llm.primary, ProviderKind::Gemini);
        assert_eq!(config.llm.secondary, ProviderKind::Ollama);
        assert_eq!(config.llm.error_threshold, 2);
        assert_eq!(config.recommendation.required_facets, 3);
    }

    #[test]
    fn missing_gemini_key_fails_validation_when_gemini_is_primary() {
        let _guard = env_lock();
        clear_vars(&["MENUWISE_GEMINI_API_KEY"]);
        let error = AppConfig::load(LoadOptions::default()).expect_err("key is required");
        assert!(matches!(error, ConfigError::Validation(_)));
    }

    #[test]
    fn config_file_patch_overrides_defaults() {
        let _guard = env_lock();
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        write!(
            file,
            r#"
[server]
port = 9100

[llm]
primary = "ollama"
secondary = "gemini"
failover_enabled = false
error_threshold = 4

[recommendation]
required_facets = 2

[logging]
level = "debug"
format = "json"
"#
        )
        .expect("write config");

        let options = LoadOptions {
            config_path: Some(file.path().to_path_buf()),
            require_file: true,
            ..LoadOptions::default()
        };
        let config = AppConfig::load(options).expect("file config should load");
        assert_eq!(config.server.port, 9100);
        assert_eq!(config.llm.primary, ProviderKind::Ollama);
        // Failover disabled, so the gemini secondary does not force a key.
        assert!(!config.llm.failover_enabled);
        assert_eq!(config.llm.error_threshold, 4);
        assert_eq!(config.recommendation.required_facets, 2);
        assert_eq!(config.logging.format, LogFormat::Json);
    }

    #[test]
    fn require_file_reports_missing_path() {
        let _guard = env_lock();
        let options = LoadOptions {
            config_path: Some(PathBuf::from("definitely-missing.toml")),
            require_file: true,
            ..LoadOptions::default()
        };
        assert!(matches!(
            AppConfig::load(options),
            Err(ConfigError::MissingConfigFile(path)) if path.ends_with("definitely-missing.toml")
        ));
    }

    #[test]
    fn same_primary_and_secondary_is_rejected() {
        let mut config = AppConfig::default();
        config.llm.secondary = ProviderKind::Gemini;
        config.llm.gemini_api_key = Some("key".to_string().into());
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn programmatic_overrides_win_over_defaults() {
        let _guard = env_lock();
        let options = LoadOptions {
            overrides: ConfigOverrides {
                gemini_api_key: Some("override-key".to_string()),
                menu_data_path: Some(PathBuf::from("fixtures/menu.json")),
                log_level: Some("warn".to_string()),
                bind_address: Some("0.0.0.0".to_string()),
                port: Some(8088),
            },
            ..LoadOptions::default()
        };
        let config = AppConfig::load(options).expect("overrides should apply");
        assert_eq!(config.catalog.menu_data_path, PathBuf::from("fixtures/menu.json"));
        assert_eq!(config.logging.level, "warn");
        assert_eq!(config.server.bind_address, "0.0.0.0");
        assert_eq!(config.server.port, 8088);
        assert_eq!(
            config.llm.gemini_api_key.expect("key set").expose_secret(),
            "override-key"
        );
    }

    #[test]
    fn env_overrides_cover_provider_and_failover_settings() -> Result<(), String> {
        let _guard = env_lock();
        env::set_var("MENUWISE_LLM_PRIMARY", "ollama");
        env::set_var("MENUWISE_LLM_SECONDARY", "gemini");
        env::set_var("MENUWISE_LLM_FAILOVER_ENABLED", "off");
        env::set_var("MENUWISE_LLM_ERROR_THRESHOLD", "5");
        env::set_var("MENUWISE_SESSION_MAX_ACTIVE_SESSIONS", "50");

        let result = (|| -> Result<(), String> {
            let config = AppConfig::load(LoadOptions::default())
                .map_err(|err| format!("config load failed: {err}"))?;

            ensure(config.llm.primary == ProviderKind::Ollama, "primary should come from env")?;
            ensure(config.llm.secondary == ProviderKind::Gemini, "secondary should come from env")?;
            ensure(!config.llm.failover_enabled, "`off` should parse as a false toggle")?;
            ensure(config.llm.error_threshold == 5, "error threshold should come from env")?;
            ensure(config.session.max_active_sessions == 50, "session cap should come from env")
        })();

        clear_vars(&[
            "MENUWISE_LLM_PRIMARY",
            "MENUWISE_LLM_SECONDARY",
            "MENUWISE_LLM_FAILOVER_ENABLED",
            "MENUWISE_LLM_ERROR_THRESHOLD",
            "MENUWISE_SESSION_MAX_ACTIVE_SESSIONS",
        ]);
        result
    }

    #[test]
    fn logging_env_aliases_are_supported() -> Result<(), String> {
        let _guard = env_lock();
        env::set_var("MENUWISE_GEMINI_API_KEY", "env-key");
        env::set_var("MENUWISE_LOG_LEVEL", "warn");
        env::set_var("MENUWISE_LOG_FORMAT", "pretty");

        let result = (|| -> Result<(), String> {
            let config = AppConfig::load(LoadOptions::default())
                .map_err(|err| format!("config load failed: {err}"))?;

            ensure(config.logging.level == "warn", "short alias should set the log level")?;
            ensure(
                matches!(config.logging.format, LogFormat::Pretty),
                "short alias should set the log format",
            )
        })();

        clear_vars(&["MENUWISE_GEMINI_API_KEY", "MENUWISE_LOG_LEVEL", "MENUWISE_LOG_FORMAT"]);
        result
    }

    #[test]
    fn malformed_env_value_is_reported_with_its_key() -> Result<(), String> {
        let _guard = env_lock();
        env::set_var("MENUWISE_SERVER_PORT", "not-a-port");

        let result = (|| -> Result<(), String> {
            let error = match AppConfig::load(LoadOptions::default()) {
                Ok(_) => return Err("expected env parse failure".to_string()),
                Err(error) => error,
            };
            ensure(
                matches!(
                    error,
                    ConfigError::InvalidEnvOverride { ref key, .. }
                        if key == "MENUWISE_SERVER_PORT"
                ),
                "error should name the offending variable",
            )
        })();

        clear_vars(&["MENUWISE_SERVER_PORT"]);
        result
    }

    #[test]
    fn file_load_supports_env_interpolation() -> Result<(), String> {
        let _guard = env_lock();
        env::set_var("TEST_MENUWISE_GEMINI_KEY", "interpolated-key");

        let result = (|| -> Result<(), String> {
            let mut file = tempfile::NamedTempFile::new().map_err(|err| err.to_string())?;
            write!(
                file,
                r#"
[llm]
gemini_api_key = "${{TEST_MENUWISE_GEMINI_KEY}}"
"#
            )
            .map_err(|err| err.to_string())?;

            let config = AppConfig::load(LoadOptions {
                config_path: Some(file.path().to_path_buf()),
                require_file: true,
                ..LoadOptions::default()
            })
            .map_err(|err| format!("config load failed: {err}"))?;

            ensure(
                config
                    .llm
                    .gemini_api_key
                    .as_ref()
                    .is_some_and(|key| key.expose_secret() == "interpolated-key"),
                "api key should be read from the interpolated variable",
            )
        })();

        clear_vars(&["TEST_MENUWISE_GEMINI_KEY"]);
        result
    }

    #[test]
    fn missing_interpolation_var_is_an_error() -> Result<(), String> {
        let _guard = env_lock();
        clear_vars(&["TEST_MENUWISE_UNSET_VAR"]);

        let mut file = tempfile::NamedTempFile::new().map_err(|err| err.to_string())?;
        write!(
            file,
            r#"
[llm]
gemini_api_key = "${{TEST_MENUWISE_UNSET_VAR}}"
"#
        )
        .map_err(|err| err.to_string())?;

        let error = match AppConfig::load(LoadOptions {
            config_path: Some(file.path().to_path_buf()),
            require_file: true,
            ..LoadOptions::default()
        }) {
            Ok(_) => return Err("expected interpolation failure".to_string()),
            Err(error) => error,
        };
        ensure(
            matches!(
                error,
                ConfigError::MissingEnvInterpolation { ref var } if var == "TEST_MENUWISE_UNSET_VAR"
            ),
            "error should name the unset variable",
        )
    }

    #[test]
    fn unterminated_interpolation_is_an_error() -> Result<(), String> {
        let _guard = env_lock();

        let mut file = tempfile::NamedTempFile::new().map_err(|err| err.to_string())?;
        write!(
            file,
            r#"
[llm]
gemini_model = "${{NEVER_CLOSED"
"#
        )
        .map_err(|err| err.to_string())?;

        let result = AppConfig::load(LoadOptions {
            config_path: Some(file.path().to_path_buf()),
            require_file: true,
            ..LoadOptions::default()
        });
        ensure(
            matches!(result, Err(ConfigError::UnterminatedInterpolation)),
            "an interpolation without a closing brace should fail the load",
        )
    }

    #[test]
    fn precedence_runs_defaults_file_env_then_overrides() -> Result<(), String> {
        let _guard = env_lock();
        env::set_var("MENUWISE_SERVER_PORT", "9200");
        env::set_var("MENUWISE_GEMINI_API_KEY", "key-from-env");
        env::set_var("MENUWISE_LOGGING_LEVEL", "warn");

        let result = (|| -> Result<(), String> {
            let mut file = tempfile::NamedTempFile::new().map_err(|err| err.to_string())?;
            write!(
                file,
                r#"
[server]
port = 9100

[logging]
level = "error"
"#
            )
            .map_err(|err| err.to_string())?;

            let config = AppConfig::load(LoadOptions {
                config_path: Some(file.path().to_path_buf()),
                require_file: true,
                overrides: ConfigOverrides {
                    log_level: Some("debug".to_string()),
                    ..ConfigOverrides::default()
                },
            })
            .map_err(|err| format!("config load failed: {err}"))?;

            ensure(config.server.port == 9200, "env port should win over the file value")?;
            ensure(
                config.logging.level == "debug",
                "programmatic override should win over env and file",
            )?;
            ensure(
                config
                    .llm
                    .gemini_api_key
                    .as_ref()
                    .is_some_and(|key| key.expose_secret() == "key-from-env"),
                "gemini key should come from env",
            )
        })();

        clear_vars(&["MENUWISE_SERVER_PORT", "MENUWISE_GEMINI_API_KEY", "MENUWISE_LOGGING_LEVEL"]);
        result
    }
}
