//! services/api/src/adapters/discord.rs
//!
//! The Discord side of the service, built on `serenity`.
//!
//! `DiscordGateway` implements the `MessageGateway` port used by the HTTP
//! handlers. `DiscordHandler` receives gateway events: DMs are fed to the survey
//! engine and relay-channel traffic is fanned out to waiting chat requests.

use crate::web::{relay::RelayMessage, state::AppState};
use async_trait::async_trait;
use serenity::all::{
    ChannelId, ChannelType, Context, EventHandler, GatewayIntents, Http, Message, Ready,
    ResumedEvent, UserId,
};
use serenity::gateway::{ConnectionStage, ShardStageUpdateEvent};
use std::sync::{Arc, RwLock};
use survey_core::engine::OutboundAction;
use survey_core::ports::{GatewayStatus, MessageGateway, PortError, PortResult, RelayChannel};
use tracing::{debug, error, info, warn};

/// Discord rejects messages longer than this many characters.
pub const DISCORD_MESSAGE_LIMIT: usize = 2000;

//=========================================================================================
// Outbound: the MessageGateway port
//=========================================================================================

pub struct DiscordGateway {
    http: Arc<Http>,
    relay_channel_name: String,
    status: RwLock<GatewayStatus>,
}

impl DiscordGateway {
    pub fn new(http: Arc<Http>, relay_channel_name: impl Into<String>) -> Self {
        Self {
            http,
            relay_channel_name: relay_channel_name.into(),
            status: RwLock::new(GatewayStatus::default()),
        }
    }

    pub fn relay_channel_name(&self) -> &str {
        &self.relay_channel_name
    }

    fn update_status(&self, apply: impl FnOnce(&mut GatewayStatus)) {
        let mut status = self.status.write().unwrap_or_else(|p| p.into_inner());
        apply(&mut status);
    }

    fn set_connected(&self, connected: bool) {
        self.update_status(|status| status.connected = connected);
    }

    fn ensure_connected(&self) -> PortResult<()> {
        if self.status().connected {
            Ok(())
        } else {
            Err(PortError::Unavailable(
                "Discord bot is not connected".to_string(),
            ))
        }
    }

    async fn say_chunked(&self, channel_id: ChannelId, text: &str) -> serenity::Result<()> {
        for chunk in split_message(text, DISCORD_MESSAGE_LIMIT) {
            channel_id.say(&*self.http, chunk).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl MessageGateway for DiscordGateway {
    async fn send_direct_message(&self, owner_id: &str, text: &str) -> PortResult<()> {
        self.ensure_connected()?;
        let user_id = parse_user_id(owner_id)?;

        let channel = user_id
            .create_dm_channel(&*self.http)
            .await
            .map_err(|e| {
                warn!("Could not open a DM channel with {}: {}", owner_id, e);
                PortError::NotFound(format!("Discord user {} could not be resolved", owner_id))
            })?;

        self.say_chunked(channel.id, text).await.map_err(|e| {
            error!("Failed to send DM to {}: {}", owner_id, e);
            PortError::Unavailable(format!("Failed to deliver message: {}", e))
        })
    }

    async fn send_relay_message(&self, text: &str) -> PortResult<()> {
        self.ensure_connected()?;
        let relay = self.status().relay_channel.ok_or_else(|| {
            PortError::NotFound(format!("Channel {} not found", self.relay_channel_name))
        })?;
        let channel_id = relay
            .id
            .parse::<u64>()
            .ok()
            .filter(|id| *id != 0)
            .map(ChannelId::new)
            .ok_or_else(|| PortError::Unexpected(format!("Bad relay channel id {}", relay.id)))?;

        self.say_chunked(channel_id, text).await.map_err(|e| {
            error!("Failed to post to relay channel: {}", e);
            PortError::Unavailable(format!("Failed to deliver message: {}", e))
        })
    }

    fn status(&self) -> GatewayStatus {
        self.status.read().unwrap_or_else(|p| p.into_inner()).clone()
    }
}

fn parse_user_id(owner_id: &str) -> PortResult<UserId> {
    owner_id
        .trim()
        .parse::<u64>()
        .ok()
        .filter(|id| *id != 0)
        .map(UserId::new)
        .ok_or_else(|| PortError::NotFound(format!("'{}' is not a Discord user id", owner_id)))
}

/// Splits `text` into pieces of at most `limit` characters, preferring line breaks.
pub fn split_message(text: &str, limit: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    for line in text.split_inclusive('\n') {
        let line_len = line.chars().count();
        if current_len + line_len > limit && !current.is_empty() {
            chunks.push(std::mem::take(&mut current));
            current_len = 0;
        }
        if line_len > limit {
            let chars: Vec<char> = line.chars().collect();
            for piece in chars.chunks(limit) {
                chunks.push(piece.iter().collect());
            }
            continue;
        }
        current.push_str(line);
        current_len += line_len;
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

//=========================================================================================
// Inbound: the serenity event handler
//=========================================================================================

pub struct DiscordHandler {
    gateway: Arc<DiscordGateway>,
    app_state: Arc<AppState>,
}

impl DiscordHandler {
    pub fn new(gateway: Arc<DiscordGateway>, app_state: Arc<AppState>) -> Self {
        Self { gateway, app_state }
    }

    pub fn intents() -> GatewayIntents {
        GatewayIntents::GUILDS
            | GatewayIntents::GUILD_MESSAGES
            | GatewayIntents::DIRECT_MESSAGES
            | GatewayIntents::MESSAGE_CONTENT
    }

    async fn find_relay_channel(&self, ctx: &Context, ready: &Ready) -> Option<RelayChannel> {
        for guild in &ready.guilds {
            let channels = match guild.id.channels(&ctx.http).await {
                Ok(channels) => channels,
                Err(e) => {
                    warn!("Could not list channels of guild {}: {}", guild.id, e);
                    continue;
                }
            };
            for (id, channel) in channels {
                debug!("Guild {} channel: {} ({})", guild.id, channel.name, id);
                if channel.kind == ChannelType::Text && channel.name == self.gateway.relay_channel_name {
                    return Some(RelayChannel {
                        id: id.get().to_string(),
                        name: channel.name,
                    });
                }
            }
        }
        None
    }

    async fn handle_direct_message(&self, ctx: &Context, msg: &Message) {
        let owner_id = msg.author.id.to_string();
        let Some(action) = self.app_state.engine.advance(&owner_id, &msg.content) else {
            debug!("Ignoring DM from {}: no active survey", owner_id);
            return;
        };

        match &action {
            OutboundAction::SendValidationError { failure, .. } => {
                info!("Survey answer from {} rejected: {:?}", owner_id, failure.kind);
            }
            OutboundAction::SendNextPrompt(prompt) => {
                info!(
                    "Survey for {} advanced to question {}/{}",
                    owner_id,
                    prompt.position + 1,
                    prompt.total
                );
            }
            OutboundAction::SendCompletionSummary(completed) => {
                info!("Survey for {} completed", owner_id);
                if let Err(e) = self.app_state.repository.save_completed_survey(completed).await {
                    error!("Failed to store completed survey for {}: {:?}", owner_id, e);
                }
            }
        }

        for chunk in split_message(&action.message(), DISCORD_MESSAGE_LIMIT) {
            if let Err(e) = msg.channel_id.say(&ctx.http, chunk).await {
                error!("Failed to reply to {}: {}", owner_id, e);
                return;
            }
        }
    }
}

#[async_trait]
impl EventHandler for DiscordHandler {
    async fn ready(&self, ctx: Context, ready: Ready) {
        info!("Discord bot logged in as {}", ready.user.tag());

        let relay_channel = self.find_relay_channel(&ctx, &ready).await;
        match &relay_channel {
            Some(channel) => info!("Relaying web-form messages via #{} ({})", channel.name, channel.id),
            None => warn!("{} channel not found, chat relay disabled", self.gateway.relay_channel_name),
        }

        self.gateway.update_status(|status| {
            status.connected = true;
            status.bot_tag = Some(ready.user.tag());
            status.bot_id = Some(ready.user.id.to_string());
            status.relay_channel = relay_channel;
        });
    }

    async fn resume(&self, _ctx: Context, _event: ResumedEvent) {
        info!("Discord connection resumed");
        self.gateway.set_connected(true);
    }

    async fn shard_stage_update(&self, _ctx: Context, event: ShardStageUpdateEvent) {
        debug!("Shard stage {:?} -> {:?}", event.old, event.new);
        self.gateway.set_connected(event.new == ConnectionStage::Connected);
    }

    async fn message(&self, ctx: Context, msg: Message) {
        let status = self.gateway.status();
        if status.bot_id.as_deref() == Some(msg.author.id.to_string().as_str()) {
            return;
        }

        if msg.guild_id.is_none() {
            if !msg.author.bot {
                self.handle_direct_message(&ctx, &msg).await;
            }
            return;
        }

        let is_relay = status
            .relay_channel
            .as_ref()
            .is_some_and(|relay| relay.id == msg.channel_id.get().to_string());
        if is_relay {
            debug!("Relay channel message from {}", msg.author.tag());
            self.app_state.relay.publish(RelayMessage {
                author: msg.author.tag(),
                content: msg.content.clone(),
                is_bot: msg.author.bot,
            });
        }
    }
}
