use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use confide::channel::TelegramClient;
use confide::{config, gateway, secrets};

#[derive(Parser)]
#[command(name = "confide")]
#[command(about = "Telegram therapy-companion backend with long-term memory")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the webhook gateway
    Serve {
        /// Port to bind to (overrides config)
        #[arg(short, long)]
        port: Option<u16>,

        /// Bind address (overrides config)
        #[arg(short, long)]
        bind: Option<String>,
    },

    /// Register the public webhook URL with Telegram
    SetWebhook {
        /// Public HTTPS base URL, e.g. https://bot.example.com
        url: String,
    },

    /// Manage stored API keys
    Key {
        #[command(subcommand)]
        action: KeyAction,
    },

    /// Show runtime status
    Status,
}

#[derive(Subcommand)]
enum KeyAction {
    /// Store an API key ("openai" or "telegram"), prompted without echo
    Set { provider: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { port, bind } => {
            let mut config = config::load()?;
            if let Some(port) = port {
                config.gateway.port = port;
            }
            if let Some(bind) = bind {
                config.gateway.bind = bind;
            }
            gateway::run(config).await
        }

        Commands::SetWebhook { url } => {
            let config = config::load()?;
            let base = url::Url::parse(&url)
                .map_err(|e| anyhow::anyhow!("invalid webhook url {url:?}: {e}"))?;
            if base.scheme() != "https" {
                anyhow::bail!("telegram requires an https webhook url, got {}", base.scheme());
            }
            let token = config
                .telegram
                .bot_token
                .as_deref()
                .ok_or_else(|| anyhow::anyhow!("telegram.bot_token is not configured"))?;

            let webhook_url = base.join("/webhook")?;
            let client = TelegramClient::new(token, config.retry.policy());
            client
                .set_webhook(webhook_url.as_str(), config.telegram.webhook_secret.as_deref())
                .await?;
            println!("webhook registered at {webhook_url}");
            Ok(())
        }

        Commands::Key { action } => match action {
            KeyAction::Set { provider } => {
                let key = rpassword::prompt_password(format!("API key for {provider}: "))?;
                let path = secrets::store_api_key(&provider, &key)?;
                println!("stored key at {}", path.display());
                Ok(())
            }
        },

        Commands::Status => {
            let config = config::load()?;
            println!("confide v{}", env!("CARGO_PKG_VERSION"));
            println!(
                "gateway: {}:{}",
                config.gateway.bind, config.gateway.port
            );
            println!(
                "telegram token: {}",
                if config.telegram.bot_token.is_some() { "configured" } else { "missing" }
            );
            println!(
                "provider key: {}",
                if config.provider.api_key.is_some() { "configured" } else { "missing" }
            );
            println!(
                "memory: threshold={} summarize={} max_summaries={}",
                config.memory.history_threshold_messages,
                config.memory.messages_to_summarize,
                config.memory.max_summaries
            );
            Ok(())
        }
    }
}
