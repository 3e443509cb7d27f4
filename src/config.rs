use thiserror::Error;

use crate::domain::DEFAULT_PLATFORM_DOMAIN;
use crate::tokens::token::TOKEN_DELIMITER;

/// Shortest secret length accepted from configuration
pub const MIN_SECRET_LENGTH: usize = 8;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

#[derive(Debug, Clone)]
pub struct Config {
    /// Directory holding the database opened by `ConnectionManager::open`
    pub data_dir: String,
    pub domain: DomainConfig,
    pub secrets: SecretConfig,
    pub tokens: TokenConfig,
}

#[derive(Debug, Clone, Default)]
pub struct TokenConfig {
    /// Site tokens defined outside the store, in configuration order
    pub defined_blog_tokens: Vec<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub enum GeneratorKind {
    Hex,
    #[default]
    Password,
}

#[derive(Debug, Clone)]
pub struct SecretConfig {
    pub generator: GeneratorKind,
    /// Characters per generated secret, for either generator
    pub length: usize,
    pub ttl_seconds: u64,
}

impl Default for SecretConfig {
    fn default() -> Self {
        Self {
            generator: GeneratorKind::Password,
            length: 12,
            ttl_seconds: 600, // 10 minutes
        }
    }
}

#[derive(Debug, Clone)]
pub struct DomainConfig {
    pub platform_domain: String,
    /// Admit any non-empty domain
    pub skip_check: bool,
}

impl Default for DomainConfig {
    fn default() -> Self {
        Self {
            platform_domain: DEFAULT_PLATFORM_DOMAIN.to_string(),
            skip_check: false,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: "./data".to_string(),
            domain: DomainConfig::default(),
            secrets: SecretConfig::default(),
            tokens: TokenConfig::default(),
        }
    }
}

/// Split a comma-separated token list, dropping blank entries
pub fn parse_token_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

impl Config {
    /// Load configuration from environment variables.
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration from any variable source
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Config::default();

        let data_dir = lookup("DATA_DIR").unwrap_or(defaults.data_dir);

        let defined_blog_tokens = lookup("BLOG_TOKEN")
            .map(|raw| parse_token_list(&raw))
            .unwrap_or_default();

        let ttl_seconds = lookup("SECRET_TTL_SECONDS")
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults.secrets.ttl_seconds);

        let length = lookup("SECRET_LENGTH")
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults.secrets.length);

        let generator = lookup("SECRET_GENERATOR")
            .map(|s| match s.to_lowercase().as_str() {
                "hex" => GeneratorKind::Hex,
                _ => GeneratorKind::Password,
            })
            .unwrap_or_default();

        let platform_domain = lookup("PLATFORM_DOMAIN")
            .map(|s| s.trim().to_string())
            .unwrap_or(defaults.domain.platform_domain);

        let skip_check = lookup("SKIP_USABLE_DOMAIN_CHECK")
            .map(|v| v == "true" || v == "1")
            .unwrap_or(false);

        let config = Config {
            data_dir,
            domain: DomainConfig {
                platform_domain,
                skip_check,
            },
            secrets: SecretConfig {
                generator,
                length,
                ttl_seconds,
            },
            tokens: TokenConfig {
                defined_blog_tokens,
            },
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.domain.platform_domain.is_empty() {
            return Err(ConfigError::ValidationError(
                "PLATFORM_DOMAIN cannot be empty".to_string(),
            ));
        }

        if self.secrets.length < MIN_SECRET_LENGTH {
            return Err(ConfigError::ValidationError(format!(
                "SECRET_LENGTH must be at least {MIN_SECRET_LENGTH}"
            )));
        }

        for (index, token) in self.tokens.defined_blog_tokens.iter().enumerate() {
            if !token.contains(TOKEN_DELIMITER) {
                tracing::warn!(
                    index,
                    "Defined blog token has no key delimiter and will never match a token key"
                );
            }
        }

        Ok(())
    }
}
