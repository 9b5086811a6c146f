use anyhow::{Context, Result};
use std::{fmt, str::FromStr, time::Duration};

/// Límite de opciones de un menú de selección de Discord
const MAX_SEARCH_LIMIT: usize = 25;

#[derive(Clone)]
pub struct Config {
    // Discord
    pub discord_token: String,
    pub command_prefix: String,

    // Reproducción
    pub idle_timeout: Duration,
    pub max_track_duration: Duration,

    // Búsqueda
    pub search_limit: usize,
    pub selection_timeout: Duration,

    // Extractor
    pub extractor_concurrency: usize,
    pub ytdlp_path: String,
}

impl Config {
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Construye la configuración a partir de una fuente de variables
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = Self::default();
        let var = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let config = Self {
            // Discord
            discord_token: var("DISCORD_TOKEN").context("DISCORD_TOKEN no está definido")?,
            command_prefix: var("COMMAND_PREFIX").unwrap_or(defaults.command_prefix),

            // Reproducción
            idle_timeout: seconds(var("IDLE_TIMEOUT_SECS"), "IDLE_TIMEOUT_SECS", defaults.idle_timeout)?,
            max_track_duration: seconds(
                var("MAX_TRACK_DURATION_SECS"),
                "MAX_TRACK_DURATION_SECS",
                defaults.max_track_duration,
            )?,

            // Búsqueda
            search_limit: parse(var("SEARCH_LIMIT"), "SEARCH_LIMIT", defaults.search_limit)?,
            selection_timeout: seconds(
                var("SELECTION_TIMEOUT_SECS"),
                "SELECTION_TIMEOUT_SECS",
                defaults.selection_timeout,
            )?,

            // Extractor
            extractor_concurrency: parse(
                var("EXTRACTOR_CONCURRENCY"),
                "EXTRACTOR_CONCURRENCY",
                defaults.extractor_concurrency,
            )?,
            ytdlp_path: var("YTDLP_PATH").unwrap_or(defaults.ytdlp_path),
        };

        // Validate configuration before returning
        config.validate()?;

        Ok(config)
    }

    /// Validates configuration values for correctness.
    ///
    /// # Validation Rules
    ///
    /// - The Discord token and command prefix must not be empty
    /// - Timeouts and the duration limit must be greater than 0
    /// - The search limit must fit in a select menu (1 to 25)
    pub fn validate(&self) -> Result<()> {
        if self.discord_token.trim().is_empty() {
            anyhow::bail!("Discord token must not be empty");
        }

        if self.command_prefix.is_empty() {
            anyhow::bail!("Command prefix must not be empty");
        }

        if self.idle_timeout.is_zero() {
            anyhow::bail!("Idle timeout must be greater than 0");
        }

        if self.max_track_duration.is_zero() {
            anyhow::bail!("Max track duration must be greater than 0");
        }

        if self.selection_timeout.is_zero() {
            anyhow::bail!("Selection timeout must be greater than 0");
        }

        if self.search_limit == 0 || self.search_limit > MAX_SEARCH_LIMIT {
            anyhow::bail!(
                "Search limit must be between 1 and {}, got: {}",
                MAX_SEARCH_LIMIT,
                self.search_limit
            );
        }

        if self.extractor_concurrency == 0 {
            anyhow::bail!("Extractor concurrency must be greater than 0");
        }

        Ok(())
    }

    /// Returns a summary of the current configuration for logging.
    ///
    /// The Discord token is never included.
    pub fn summary(&self) -> String {
        format!(
            "Config Summary:\n  \
            Commands: prefix `{}`\n  \
            Playback: idle disconnect after {}, tracks under {}\n  \
            Search: {} results, selection open for {}\n  \
            Extractor: `{}` with {} concurrent processes",
            self.command_prefix,
            humantime::format_duration(self.idle_timeout),
            humantime::format_duration(self.max_track_duration),
            self.search_limit,
            humantime::format_duration(self.selection_timeout),
            self.ytdlp_path,
            self.extractor_concurrency,
        )
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("discord_token", &"<redacted>")
            .field("command_prefix", &self.command_prefix)
            .field("idle_timeout", &self.idle_timeout)
            .field("max_track_duration", &self.max_track_duration)
            .field("search_limit", &self.search_limit)
            .field("selection_timeout", &self.selection_timeout)
            .field("extractor_concurrency", &self.extractor_concurrency)
            .field("ytdlp_path", &self.ytdlp_path)
            .finish()
    }
}

/// Default configuration values.
///
/// Used as fallbacks when environment variables are not provided.
impl Default for Config {
    fn default() -> Self {
        Self {
            // Discord (el token no tiene default)
            discord_token: String::new(),
            command_prefix: "!".to_string(),

            idle_timeout: Duration::from_secs(300),      // 5 minutos
            max_track_duration: Duration::from_secs(900), // 15 minutos

            search_limit: 5,
            selection_timeout: Duration::from_secs(180),

            extractor_concurrency: 3,
            ytdlp_path: "yt-dlp".to_string(),
        }
    }
}

fn parse<T>(value: Option<String>, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match value {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{} inválido: `{}`", key, raw)),
        None => Ok(default),
    }
}

fn seconds(value: Option<String>, key: &str, default: Duration) -> Result<Duration> {
    parse(value, key, default.as_secs()).map(Duration::from_secs)
}
