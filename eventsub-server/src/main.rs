use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

mod server;

#[derive(Parser, Debug, Clone)]
#[command(name = "eventsub-server")]
#[command(author, version, about = "Twitch EventSub webhook receiver")]
pub struct Args {
    /// Public host Twitch will deliver to (no scheme)
    #[arg(long)]
    pub host: String,

    /// Public port, if not the https default
    #[arg(long)]
    pub port: Option<u16>,

    /// Callback path
    #[arg(long, default_value = "/webhooks/callback")]
    pub path: String,

    /// Local address the HTTP listener binds to
    #[arg(long, default_value = "0.0.0.0:8080")]
    pub bind: String,

    /// Subscription to create on startup, as `type:broadcaster_id`. Repeatable.
    #[arg(long = "subscribe", value_name = "TYPE:BROADCASTER_ID")]
    pub subscribe: Vec<String>,

    /// Refresh interval for the app access token, in hours (1 to 8760)
    #[arg(long, default_value_t = 24 * 14, value_parser = clap::value_parser!(u64).range(1..=24 * 365))]
    pub refresh_hours: u64,
}

fn init_tracing() {
    let filter = EnvFilter::from_default_env()
        .add_directive("eventsub=info".parse().unwrap_or_default());
    let sub = fmt().with_env_filter(filter).finish();
    tracing::subscriber::set_global_default(sub)
        .expect("Failed to set global subscriber");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    init_tracing();
    let args = Args::parse();
    info!("eventsub-server starting. host={}, path={}, bind={}", args.host, args.path, args.bind);

    if let Err(e) = server::run(args).await {
        error!("Server error: {:?}", e);
        return Err(e);
    }
    info!("Main finished. Goodbye!");
    Ok(())
}
