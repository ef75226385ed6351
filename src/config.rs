use serde::Deserialize;
use std::path::PathBuf;
use tracing::info;

/// Top-level configuration loaded from TOML.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ConfideConfig {
    pub gateway: GatewayConfig,
    pub telegram: TelegramConfig,
    pub provider: ProviderConfig,
    pub memory: MemoryConfig,
    pub retry: RetryConfig,
}

#[derive(Debug, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            bind: default_bind(),
        }
    }
}

fn default_port() -> u16 {
    8080
}
fn default_bind() -> String {
    "127.0.0.1".into()
}

#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct TelegramConfig {
    pub bot_token: Option<String>,
    /// Secret echoed back by Telegram in the webhook header and verified
    /// at the gateway.
    pub webhook_secret: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProviderConfig {
    pub api_key: Option<String>,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_analysis_model")]
    pub analysis_model: String,
    #[serde(default = "default_summary_model")]
    pub summary_model: String,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_base_url(),
            model: default_model(),
            analysis_model: default_analysis_model(),
            summary_model: default_summary_model(),
        }
    }
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".into()
}
fn default_model() -> String {
    "gpt-4o".into()
}
fn default_analysis_model() -> String {
    "gpt-4o-mini".into()
}
fn default_summary_model() -> String {
    "gpt-4o-mini".into()
}

#[derive(Debug, Clone, Deserialize)]
pub struct MemoryConfig {
    /// Rotation triggers once this many messages sit in complete
    /// user+assistant pairs.
    #[serde(default = "default_history_threshold")]
    pub history_threshold_messages: u32,
    /// Size of the oldest block summarized and trimmed per rotation.
    #[serde(default = "default_messages_to_summarize")]
    pub messages_to_summarize: u32,
    /// FIFO cap on stored summaries per user.
    #[serde(default = "default_max_summaries")]
    pub max_summaries: u32,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            history_threshold_messages: default_history_threshold(),
            messages_to_summarize: default_messages_to_summarize(),
            max_summaries: default_max_summaries(),
        }
    }
}

fn default_history_threshold() -> u32 {
    30
}
fn default_messages_to_summarize() -> u32 {
    20
}
fn default_max_summaries() -> u32 {
    3
}

#[derive(Debug, Clone, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_retry_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_retry_base_delay_ms")]
    pub base_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_retry_attempts(),
            base_delay_ms: default_retry_base_delay_ms(),
        }
    }
}

fn default_retry_attempts() -> u32 {
    3
}
fn default_retry_base_delay_ms() -> u64 {
    1000
}

/// Load configuration from file or use defaults.
///
/// Search order:
/// 1. `CONFIDE_CONFIG` env var
/// 2. `~/.confide/config.toml`
/// 3. Zero-config defaults (no file needed)
pub fn load() -> anyhow::Result<ConfideConfig> {
    let path = config_path();

    let mut config = if path.exists() {
        let content = std::fs::read_to_string(&path)
            .map_err(|e| anyhow::anyhow!("failed to read {}: {e}", path.display()))?;
        let config: ConfideConfig = toml::from_str(&content)
            .map_err(|e| anyhow::anyhow!("invalid config at {}: {e}", path.display()))?;
        info!("loaded config from {}", path.display());
        config
    } else {
        info!("no config file found, using zero-config defaults");
        ConfideConfig::default()
    };

    resolve_credentials(&mut config);
    validate(&config)?;
    Ok(config)
}

fn config_path() -> PathBuf {
    if let Ok(path) = std::env::var("CONFIDE_CONFIG") {
        return PathBuf::from(path);
    }
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".into());
    PathBuf::from(home).join(".confide").join("config.toml")
}

/// Fill in credentials not present in the file: environment first, then
/// the credentials directory. Runs once at startup, never as a side
/// effect of touching the module.
fn resolve_credentials(config: &mut ConfideConfig) {
    if config.telegram.bot_token.is_none() {
        config.telegram.bot_token = std::env::var("TELEGRAM_BOT_TOKEN")
            .ok()
            .or_else(|| crate::secrets::load_api_key("telegram"));
    }
    if config.provider.api_key.is_none() {
        config.provider.api_key = std::env::var("OPENAI_API_KEY")
            .ok()
            .or_else(|| crate::secrets::load_api_key("openai"));
    }
    if config.telegram.webhook_secret.is_none() {
        config.telegram.webhook_secret = std::env::var("CONFIDE_WEBHOOK_SECRET").ok();
    }
}

/// Validate the config and return clear error messages.
fn validate(config: &ConfideConfig) -> anyhow::Result<()> {
    if config.memory.history_threshold_messages < 2 {
        anyhow::bail!("memory.history_threshold_messages must be at least 2 (one pair)");
    }
    if config.memory.messages_to_summarize == 0 {
        anyhow::bail!("memory.messages_to_summarize must be > 0");
    }
    if config.memory.max_summaries == 0 {
        anyhow::bail!("memory.max_summaries must be > 0");
    }
    if config.retry.max_attempts == 0 {
        anyhow::bail!("retry.max_attempts must be > 0");
    }
    Ok(())
}

impl RetryConfig {
    pub fn policy(&self) -> crate::inference::retry::RetryPolicy {
        crate::inference::retry::RetryPolicy::new(
            self.max_attempts,
            std::time::Duration::from_millis(self.base_delay_ms),
        )
    }
}
