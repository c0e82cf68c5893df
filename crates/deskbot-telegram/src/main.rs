//! Deskbot Telegram Bot binary.
//!
//! Start the bot with:
//! ```bash
//! TELEGRAM_BOT_TOKEN=xxx cargo run -p deskbot-telegram
//! ```

use clap::Parser;
use deskbot_core::{config, DeskbotConfig};
use deskbot_telegram::TelegramBot;
use tracing_subscriber::EnvFilter;

/// Deskbot Telegram Bot - file service desk requests from Telegram
#[derive(Parser, Debug)]
#[command(name = "deskbot-telegram")]
#[command(about = "Telegram bot for Jira Service Management requests")]
struct Args {
    /// Override the request idle timeout in seconds
    #[arg(long, env = "ITSM_STATE_TTL_SECS")]
    state_ttl: Option<u64>,

    /// Verbose logging (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load before parsing so clap sees env-provided defaults
    config::load_env();
    let args = Args::parse();

    let filter = match args.verbose {
        0 => "deskbot_telegram=info,deskbot_itsm=info,deskbot_core=info,teloxide=warn",
        1 => "deskbot_telegram=debug,deskbot_itsm=debug,deskbot_core=debug,teloxide=info",
        2 => "deskbot_telegram=trace,deskbot_itsm=trace,deskbot_core=trace,teloxide=debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_new(filter).unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let mut config = DeskbotConfig::from_env()?;
    if let Some(secs) = args.state_ttl {
        config.state_ttl = std::time::Duration::from_secs(secs);
    }

    let bot = TelegramBot::new(&config)?;

    match bot.get_me().await {
        Ok(username) => {
            tracing::info!(username = %username, "Bot initialized successfully");
            println!("\n[robot] Deskbot Telegram Bot");
            println!("   Bot: @{}", username);
            println!("   Jira: {}", config.jira_base_url);
            let forms = if config.jira_cloud_id.is_some() {
                "enabled"
            } else {
                "disabled (set JIRA_CLOUD_ID)"
            };
            println!("   Forms: {}", forms);
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to get bot info");
            return Err(e.into());
        }
    }

    println!("\n[phone] Open Telegram and send /start to begin");
    println!("   Press Ctrl+C to stop\n");

    bot.start_polling().await?;

    Ok(())
}
