//! # Bot Module
//!
//! Discord surface of the jukebox.
//!
//! This module contains:
//! - Prefix commands (`!play`, `!stop`) read from guild messages
//! - Button controls on the now-playing message
//! - The track selection menu shown after a search
//! - Cleanup when the bot is disconnected from voice
//!
//! ## Architecture
//!
//! [`JukeboxBot`] implements Serenity's [`EventHandler`] and routes every
//! event to the [`Scheduler`], which owns all playback decisions.

use anyhow::Result;
use serenity::{
    all::{
        ActivityData, ComponentInteraction, Context, EventHandler, Interaction, Message,
        OnlineStatus, Ready, VoiceState,
    },
    async_trait,
    builder::{CreateInteractionResponse, CreateInteractionResponseMessage},
};
use std::sync::Arc;
use tracing::{debug, error, info};

pub mod commands;
pub mod controls;
pub mod selection;

use crate::{
    audio::{scheduler::Scheduler, voice::SongbirdVoice},
    config::Config,
    sources::TrackResolver,
    ui::buttons::button_ids,
};
use commands::Command;
use selection::SelectionBridge;

/// Main Discord event handler.
///
/// Holds shared handles only; per-guild state lives in the scheduler's
/// registry.
pub struct JukeboxBot {
    config: Arc<Config>,
    scheduler: Arc<Scheduler>,
    resolver: TrackResolver,
    voice: Arc<SongbirdVoice>,
    selections: Arc<SelectionBridge>,
}

impl JukeboxBot {
    pub fn new(
        config: Arc<Config>,
        scheduler: Arc<Scheduler>,
        resolver: TrackResolver,
        voice: Arc<SongbirdVoice>,
    ) -> Self {
        Self {
            config,
            scheduler,
            resolver,
            voice,
            selections: Arc::new(SelectionBridge::new()),
        }
    }
}

#[async_trait]
impl EventHandler for JukeboxBot {
    async fn ready(&self, ctx: Context, ready: Ready) {
        info!("🤖 {} está en línea!", ready.user.name);
        info!("📊 Conectado a {} servidores", ready.guilds.len());

        ctx.set_presence(Some(ActivityData::playing("Music")), OnlineStatus::Idle);
    }

    async fn message(&self, ctx: Context, msg: Message) {
        if msg.author.bot || msg.guild_id.is_none() {
            return;
        }

        let Some(command) = commands::parse_command(&msg.content, &self.config.command_prefix) else {
            return;
        };

        let result = match command {
            Command::Play(query) => commands::play(&ctx, &msg, query, self).await,
            Command::Stop => commands::stop(&ctx, &msg, self).await,
        };

        if let Err(e) = result {
            error!("Error manejando comando {:?}: {:?}", command, e);
        }
    }

    async fn interaction_create(&self, ctx: Context, interaction: Interaction) {
        let Interaction::Component(component) = interaction else {
            return;
        };

        let result = if component.data.custom_id == button_ids::TRACK_SELECT {
            selection::handle_choice(&ctx, &component, self).await
        } else {
            controls::handle(&ctx, &component, self).await
        };

        if let Err(e) = result {
            error!("Error manejando componente: {:?}", e);
        }
    }

    /// Si el bot fue desconectado de la voz, el estado de la guild se descarta
    async fn voice_state_update(&self, ctx: Context, old: Option<VoiceState>, new: VoiceState) {
        let current_user_id = ctx.cache.current_user().id;
        if new.user_id != current_user_id || old.is_none() || new.channel_id.is_some() {
            return;
        }

        if let Some(guild_id) = new.guild_id {
            info!("🔌 Bot desconectado en guild {}", guild_id);
            self.scheduler.forget(guild_id);
        } else {
            debug!("Desconexión de voz sin guild");
        }
    }
}

/// Respuesta visible solo para quien pulsó el componente
pub(crate) async fn reply_ephemeral(
    ctx: &Context,
    interaction: &ComponentInteraction,
    content: &str,
) -> Result<()> {
    interaction
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Message(
                CreateInteractionResponseMessage::new()
                    .content(content)
                    .ephemeral(true),
            ),
        )
        .await?;
    Ok(())
}
