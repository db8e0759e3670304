use anyhow::Result;
use clap::Parser;
use colored::*;
use events::{Event, Role};
use live_client::{Bridge, ClientOptions, EventFilter, Handler, LiveClient, SubscribeOptions};
use std::time::Duration;

#[derive(Parser)]
#[command(name = "live-client")]
#[command(about = "Connects to the live update stream and prints what arrives")]
struct Cli {
    /// Base URL of the backend (e.g., http://localhost:4000)
    #[arg(long, default_value = "http://127.0.0.1:4000")]
    base_url: String,

    /// User id sent in the identity header
    #[arg(long)]
    user_id: String,

    /// Role sent in the role header (ADMIN, BARBER or CLIENT)
    #[arg(long)]
    role: Option<Role>,

    /// Event types to print: "*" or a comma separated list
    #[arg(long, default_value = "*")]
    events: EventFilter,

    /// Header carrying the user id
    #[arg(long, default_value = "x-user-id")]
    user_header: String,

    /// Header carrying the role
    #[arg(long, default_value = "x-user-role")]
    role_header: String,

    /// Consecutive failures before falling back
    #[arg(long, default_value_t = live_client::transport::DEFAULT_FALLBACK_AFTER)]
    fallback_after: u32,

    /// Seconds of silence that count as a failure
    #[arg(long, default_value_t = 45)]
    stale_after_secs: u64,

    /// Enable verbose output
    #[arg(long, short)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.verbose {
        env_logger::Builder::from_default_env()
            .filter_level(log::LevelFilter::Debug)
            .init();
    }

    let bridge = Bridge::new();
    let _subscription = bridge.subscribe(
        SubscribeOptions::new(cli.events.clone(), Handler::each(print_event)).on_fallback(|| {
            println!(
                "{} Live updates unavailable, refresh data manually",
                "!".yellow().bold()
            );
        }),
    );

    let options = ClientOptions {
        role: cli.role,
        user_header: cli.user_header,
        role_header: cli.role_header,
        fallback_after: cli.fallback_after,
        stale_after: Duration::from_secs(cli.stale_after_secs),
        ..ClientOptions::new(cli.base_url, cli.user_id)
    };

    println!("{} Connecting...", "→".blue());
    LiveClient::new(options, bridge).run().await?;
    println!("{} Stream closed", "✓".green());

    Ok(())
}

fn print_event(event: &Event) {
    let payload = serde_json::to_value(event.kind())
        .ok()
        .and_then(|kind| kind.get("payload").cloned())
        .unwrap_or_default();

    println!(
        "{} {} {}",
        event.created_at().to_string().dimmed(),
        event.event_type().to_string().cyan().bold(),
        payload
    );
}
