use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, trace, warn};

use twilight_gateway::{
    self as gateway,
    CloseFrame,
    Config,
    Event,
    EventTypeFlags,
    Intents,
    Shard,
    MessageSender,
    StreamExt,
};
use twilight_http::Client as HttpClient;
use twilight_http::client::ClientBuilder;
use twilight_model::gateway::payload::incoming::Ready as ReadyPayload;
use twilight_model::id::marker::ChannelMarker;
use twilight_model::id::Id;

use svetlana_common::models::NotificationMessage;
use svetlana_common::traits::sink_traits::NotificationSink;

use crate::platforms::{ConnectionStatus, PlatformAuth, PlatformIntegration};
use crate::Error;

/// Discord caps message content at 2000 characters.
const MAX_MESSAGE_LEN: usize = 2000;

#[derive(Debug, Clone)]
pub struct DiscordMessageEvent {
    pub channel_id: u64,
    pub user_id: u64,
    pub username: String,
    pub text: String,
}

/// Reads gateway events for one shard and forwards human-written messages to `tx`.
async fn shard_runner(mut shard: Shard, tx: UnboundedSender<DiscordMessageEvent>) {
    let shard_id = shard.id().number();
    info!("(ShardRunner) Shard {shard_id} started. Listening for events.");

    while let Some(item) = shard.next_event(EventTypeFlags::READY | EventTypeFlags::MESSAGE_CREATE).await {
        match item {
            Ok(Event::Ready(ready)) => {
                let data: &ReadyPayload = ready.as_ref();
                info!("Shard {shard_id} => READY as {} (ID={})", data.user.name, data.user.id);
            }
            Ok(Event::MessageCreate(msg)) => {
                if msg.author.bot {
                    trace!("Ignoring bot message from {}", msg.author.name);
                    continue;
                }
                let _ = tx.send(DiscordMessageEvent {
                    channel_id: msg.channel_id.get(),
                    user_id: msg.author.id.get(),
                    username: msg.author.name.clone(),
                    text: msg.content.clone(),
                });
            }
            Ok(event) => {
                trace!("Shard {shard_id} => unhandled event: {:?}", event.kind());
            }
            Err(err) => {
                error!("Shard {shard_id} => error receiving event: {err:?}");
            }
        }
    }

    warn!("(ShardRunner) Shard {shard_id} event loop ended.");
}

/// Discord connection used both for reading chat commands and for posting
/// notifications.
pub struct DiscordPlatform {
    pub token: String,
    pub connection_status: ConnectionStatus,

    pub rx: Mutex<Option<UnboundedReceiver<DiscordMessageEvent>>>,

    pub shard_tasks: Vec<JoinHandle<()>>,
    pub shard_senders: Vec<MessageSender>,

    pub http: Option<Arc<HttpClient>>,
}

impl DiscordPlatform {
    pub fn new(token: String) -> Self {
        Self {
            token,
            connection_status: ConnectionStatus::Disconnected,
            rx: Mutex::new(None),
            shard_tasks: Vec::new(),
            shard_senders: Vec::new(),
            http: None,
        }
    }

    /// Waits for the next inbound chat message. `None` once disconnected.
    pub async fn next_message_event(&self) -> Option<DiscordMessageEvent> {
        let mut guard = self.rx.lock().await;
        match guard.as_mut() {
            Some(r) => r.recv().await,
            None => None,
        }
    }

    async fn post(&self, channel_id: u64, content: &str) -> Result<(), Error> {
        let Some(channel_id) = Id::<ChannelMarker>::new_checked(channel_id) else {
            return Err(Error::Platform(format!("Invalid channel ID: {channel_id}")));
        };
        let Some(http) = &self.http else {
            return Err(Error::Platform("Discord HTTP client not available (not connected)".into()));
        };

        let content = truncate(content, MAX_MESSAGE_LEN);
        http.create_message(channel_id)
            .content(&content)
            .await
            .map_err(|e| Error::Platform(format!("Error sending Discord message: {e:?}")))?;
        debug!("Posted {} chars to channel {}", content.len(), channel_id);
        Ok(())
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut out: String = text.chars().take(max_chars - 1).collect();
    out.push('…');
    out
}

#[async_trait]
impl PlatformAuth for DiscordPlatform {
    async fn authenticate(&mut self) -> Result<(), Error> {
        if self.token.trim().is_empty() {
            return Err(Error::Config("Discord token is empty".into()));
        }
        Ok(())
    }

    async fn is_authenticated(&self) -> Result<bool, Error> {
        Ok(!self.token.trim().is_empty())
    }
}

#[async_trait]
impl PlatformIntegration for DiscordPlatform {
    async fn connect(&mut self) -> Result<(), Error> {
        if matches!(self.connection_status, ConnectionStatus::Connected) {
            info!("(DiscordPlatform) Already connected => skipping");
            return Ok(());
        }

        let (tx, rx) = unbounded_channel::<DiscordMessageEvent>();
        {
            let mut guard = self.rx.lock().await;
            *guard = Some(rx);
        }

        let http_client = Arc::new(
            ClientBuilder::new()
                .token(self.token.clone())
                .timeout(Duration::from_secs(30))
                .build()
        );
        self.http = Some(http_client.clone());

        let config = Config::new(
            self.token.clone(),
            Intents::GUILD_MESSAGES | Intents::DIRECT_MESSAGES | Intents::MESSAGE_CONTENT,
        );

        let shards = gateway::create_recommended(&http_client, config, |_, b| b.build())
            .await
            .map_err(|e| Error::Platform(format!("create_recommended error: {e}")))?;

        for shard in shards {
            self.shard_senders.push(shard.sender());
            let tx_for_shard = tx.clone();
            let handle = tokio::spawn(async move {
                shard_runner(shard, tx_for_shard).await;
            });
            self.shard_tasks.push(handle);
        }

        self.connection_status = ConnectionStatus::Connected;
        info!("(DiscordPlatform) Connected with {} shard(s)", self.shard_tasks.len());
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<(), Error> {
        self.connection_status = ConnectionStatus::Disconnected;

        for sender in &self.shard_senders {
            let _ = sender.close(CloseFrame::NORMAL);
        }
        for task in &mut self.shard_tasks {
            let _ = task.await;
        }

        self.shard_senders.clear();
        self.shard_tasks.clear();

        {
            let mut guard = self.rx.lock().await;
            *guard = None;
        }

        Ok(())
    }

    async fn send_message(&self, channel: &str, message: &str) -> Result<(), Error> {
        let channel_id: u64 = channel.parse().map_err(|_| {
            Error::Platform(format!("Invalid channel ID: {channel}"))
        })?;
        self.post(channel_id, message).await
    }

    async fn get_connection_status(&self) -> Result<ConnectionStatus, Error> {
        Ok(self.connection_status.clone())
    }
}

#[async_trait]
impl NotificationSink for DiscordPlatform {
    async fn deliver(&self, notification: &NotificationMessage) -> Result<(), Error> {
        let content = format!("{}\n{}", notification.text, notification.game_url);
        self.post(notification.channel_id, &content).await
    }
}
