use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use dotenv::dotenv;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, EnvFilter};

use svetlana_core::platforms::discord::DiscordPlatform;
use svetlana_core::platforms::{PlatformAuth, PlatformIntegration};
use svetlana_core::repositories::SqliteFollowRepository;
use svetlana_core::services::{CommandService, NotificationEngine};
use svetlana_core::tasks::{GamePollScheduler, PollConfig};
use svetlana_core::webdiplomacy::{BackoffPolicy, BoardFetcher, BoardLinks, DEFAULT_BASE_URL};
use svetlana_core::{Database, DefaultHttpClient, Error};

#[derive(Parser, Debug, Clone)]
#[command(name = "svetlana")]
#[command(author, version, about = "Svetlana - follows WebDiplomacy games and reports to Discord")]
struct Args {
    /// Path to the SQLite database holding follows.
    #[arg(long, default_value = "svetlana.db")]
    db_path: String,

    /// WebDiplomacy instance to poll.
    #[arg(long, default_value = DEFAULT_BASE_URL)]
    base_url: String,

    /// Seconds between polling passes.
    #[arg(long, default_value_t = 60)]
    poll_interval_secs: u64,

    /// First retry delay for a failed board request.
    #[arg(long, default_value_t = 1)]
    backoff_base_secs: u64,

    /// Give up on a board request once the next delay would exceed this.
    #[arg(long, default_value_t = 300)]
    backoff_threshold_secs: u64,

    /// Verbose logging.
    #[arg(short, long, default_value_t = false)]
    debug: bool,
}

fn init_tracing(debug: bool) {
    let level = if debug { "svetlana=debug" } else { "svetlana=info" };
    let filter = EnvFilter::from_default_env()
        .add_directive(level.parse().unwrap_or_default());
    let sub = fmt().with_env_filter(filter).finish();
    if let Err(e) = tracing::subscriber::set_global_default(sub) {
        eprintln!("Failed to set global subscriber: {e}");
    }
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    dotenv().ok();
    let args = Args::parse();
    init_tracing(args.debug);
    info!("Svetlana starting. db_path={}, base_url={}", args.db_path, args.base_url);

    if let Err(e) = run(args).await {
        error!("Svetlana stopped with an error: {:?}", e);
        return Err(e);
    }
    Ok(())
}

async fn run(args: Args) -> Result<(), Error> {
    let token = std::env::var("DISCORD_TOKEN")
        .map_err(|_| Error::Config("DISCORD_TOKEN is not set".into()))?;

    // 1) Storage
    let db = Database::new(&args.db_path).await?;
    db.migrate().await?;
    let registry = Arc::new(SqliteFollowRepository::new(db.pool().clone()));

    // 2) WebDiplomacy access
    let links = BoardLinks::new(&args.base_url)?;
    let backoff = BackoffPolicy::new(
        Duration::from_secs(args.backoff_base_secs),
        Duration::from_secs(args.backoff_threshold_secs),
    );
    let http = Arc::new(DefaultHttpClient::new()?);
    let fetcher = BoardFetcher::new(http, links.clone(), backoff);

    // 3) Discord
    let mut discord = DiscordPlatform::new(token);
    discord.authenticate().await?;
    discord.connect().await?;
    let discord = Arc::new(discord);

    // 4) Poller
    let engine = Arc::new(NotificationEngine::new(fetcher, registry.clone(), discord.clone()));
    let config = PollConfig {
        interval: Duration::from_secs(args.poll_interval_secs),
        ..PollConfig::default()
    };
    let scheduler = Arc::new(GamePollScheduler::new(engine, config));
    let sched_clone = scheduler.clone();
    let poll_handle = tokio::spawn(async move { sched_clone.run().await });

    // 5) Chat loop; Ctrl-C flips the shutdown flag
    let commands = CommandService::new(registry, links);
    let mut shutdown_rx = scheduler.shutdown_rx.clone();
    loop {
        tokio::select! {
            maybe_event = discord.next_message_event() => {
                let Some(event) = maybe_event else {
                    warn!("Discord event stream closed; shutting down.");
                    scheduler.shutdown();
                    break;
                };
                match commands.handle_chat_line(event.channel_id, &event.username, &event.text).await {
                    Ok(Some(reply)) => {
                        let channel = reply.channel_id.to_string();
                        if let Err(e) = discord.send_message(&channel, &reply.text).await {
                            error!("Could not reply in channel {}: {:?}", channel, e);
                        }
                    }
                    Ok(None) => {}
                    Err(e) => {
                        error!("Command from {} in channel {} failed: {:?}", event.username, event.channel_id, e);
                    }
                }
            }
            res = tokio::signal::ctrl_c() => {
                if let Err(e) = res {
                    error!("Failed to listen for Ctrl-C: {:?}", e);
                }
                info!("Ctrl-C detected; shutting down...");
                scheduler.shutdown();
                break;
            }
            Ok(_) = shutdown_rx.changed() => {
                if *shutdown_rx.borrow() {
                    info!("Shutdown signaled; exiting chat loop.");
                    break;
                }
            }
        }
    }

    // 6) Let the poller drain, then close everything down
    let poll_result = match poll_handle.await {
        Ok(result) => result,
        Err(e) => Err(Error::Platform(format!("poller task panicked: {e}"))),
    };

    drop(scheduler);
    drop(commands);
    match Arc::into_inner(discord) {
        Some(mut discord) => discord.disconnect().await?,
        None => warn!("Discord platform still shared at shutdown; skipping clean disconnect"),
    }
    db.close().await;

    poll_result
}
