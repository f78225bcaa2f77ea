use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub crm: CrmConfig,
    pub reference: ReferenceConfig,
    pub audit: AuditConfig,
    pub operator: OperatorConfig,
    pub logging: LoggingConfig,
}

/// Bitrix inbound-webhook endpoint. The URL embeds the access token, so it
/// is held as a secret end to end.
#[derive(Clone, Debug)]
pub struct CrmConfig {
    pub webhook_url: SecretString,
    pub timeout_secs: u64,
}

/// Reference-data API serving the product catalog and employee directory.
#[derive(Clone, Debug)]
pub struct ReferenceConfig {
    pub base_url: String,
    pub page_size: u32,
}

#[derive(Clone, Debug)]
pub struct AuditConfig {
    pub base_url: String,
}

#[derive(Clone, Debug)]
pub struct OperatorConfig {
    pub name: String,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
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
    pub crm_webhook_url: Option<String>,
    pub reference_base_url: Option<String>,
    pub audit_base_url: Option<String>,
    pub operator_name: Option<String>,
    pub log_level: Option<String>,
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
            crm: CrmConfig { webhook_url: String::new().into(), timeout_secs: 30 },
            reference: ReferenceConfig {
                base_url: "http://localhost:3001".to_string(),
                page_size: 500,
            },
            audit: AuditConfig { base_url: "http://localhost:3001".to_string() },
            operator: OperatorConfig { name: "operator".to_string() },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

fn secret_value(value: String) -> SecretString {
    value.into()
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
            let expected =
                options.config_path.unwrap_or_else(|| PathBuf::from("quotebridge.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(crm) = patch.crm {
            if let Some(webhook_url) = crm.webhook_url {
                self.crm.webhook_url = secret_value(webhook_url);
            }
            if let Some(timeout_secs) = crm.timeout_secs {
                self.crm.timeout_secs = timeout_secs;
            }
        }

        if let Some(reference) = patch.reference {
            if let Some(base_url) = reference.base_url {
                self.reference.base_url = base_url;
            }
            if let Some(page_size) = reference.page_size {
                self.reference.page_size = page_size;
            }
        }

        if let Some(audit) = patch.audit {
            if let Some(base_url) = audit.base_url {
                self.audit.base_url = base_url;
            }
        }

        if let Some(operator) = patch.operator {
            if let Some(name) = operator.name {
                self.operator.name = name;
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
        if let Some(value) = read_env("QUOTEBRIDGE_CRM_WEBHOOK_URL") {
            self.crm.webhook_url = secret_value(value);
        }
        if let Some(value) = read_env("QUOTEBRIDGE_CRM_TIMEOUT_SECS") {
            self.crm.timeout_secs = parse_u64("QUOTEBRIDGE_CRM_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("QUOTEBRIDGE_REFERENCE_BASE_URL") {
            self.reference.base_url = value;
        }
        if let Some(value) = read_env("QUOTEBRIDGE_REFERENCE_PAGE_SIZE") {
            self.reference.page_size = parse_u32("QUOTEBRIDGE_REFERENCE_PAGE_SIZE", &value)?;
        }

        if let Some(value) = read_env("QUOTEBRIDGE_AUDIT_BASE_URL") {
            self.audit.base_url = value;
        }

        if let Some(value) = read_env("QUOTEBRIDGE_OPERATOR_NAME") {
            self.operator.name = value;
        }

        let log_level =
            read_env("QUOTEBRIDGE_LOGGING_LEVEL").or_else(|| read_env("QUOTEBRIDGE_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("QUOTEBRIDGE_LOGGING_FORMAT").or_else(|| read_env("QUOTEBRIDGE_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(webhook_url) = overrides.crm_webhook_url {
            self.crm.webhook_url = secret_value(webhook_url);
        }
        if let Some(base_url) = overrides.reference_base_url {
            self.reference.base_url = base_url;
        }
        if let Some(base_url) = overrides.audit_base_url {
            self.audit.base_url = base_url;
        }
        if let Some(name) = overrides.operator_name {
            self.operator.name = name;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_crm(&self.crm)?;
        validate_reference(&self.reference)?;
        validate_audit(&self.audit)?;
        validate_operator(&self.operator)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("quotebridge.toml"), PathBuf::from("config/quotebridge.toml")]
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

fn validate_http_url(label: &str, url: &str) -> Result<(), ConfigError> {
    if !url.starts_with("http://") && !url.starts_with("https://") {
        return Err(ConfigError::Validation(format!(
            "{label} must start with http:// or https://"
        )));
    }
    Ok(())
}

fn validate_crm(crm: &CrmConfig) -> Result<(), ConfigError> {
    let webhook_url = crm.webhook_url.expose_secret();
    if webhook_url.trim().is_empty() {
        return Err(ConfigError::Validation(
            "crm.webhook_url is required. Create an inbound webhook in Bitrix24 under Applications > Webhooks".to_string(),
        ));
    }
    validate_http_url("crm.webhook_url", webhook_url.trim())?;

    if crm.timeout_secs == 0 || crm.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "crm.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    Ok(())
}

fn validate_reference(reference: &ReferenceConfig) -> Result<(), ConfigError> {
    validate_http_url("reference.base_url", reference.base_url.trim())?;

    if reference.page_size == 0 || reference.page_size > 1000 {
        return Err(ConfigError::Validation(
            "reference.page_size must be in range 1..=1000".to_string(),
        ));
    }

    Ok(())
}

fn validate_audit(audit: &AuditConfig) -> Result<(), ConfigError> {
    validate_http_url("audit.base_url", audit.base_url.trim())
}

fn validate_operator(operator: &OperatorConfig) -> Result<(), ConfigError> {
    if operator.name.trim().is_empty() {
        return Err(ConfigError::Validation("operator.name must not be empty".to_string()));
    }
    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.parse::<u32>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    crm: Option<CrmPatch>,
    reference: Option<ReferencePatch>,
    audit: Option<AuditPatch>,
    operator: Option<OperatorPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct CrmPatch {
    webhook_url: Option<String>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct ReferencePatch {
    base_url: Option<String>,
    page_size: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct AuditPatch {
    base_url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct OperatorPatch {
    name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}
