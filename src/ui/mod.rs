//! # UI Module
//!
//! Everything the bot shows in a text channel: embeds, the control buttons
//! attached to the now-playing message and the track selection menu.
//!
//! The scheduler talks to the chat platform only through [`ChatSurface`], so
//! it can be driven without a Discord connection.

pub mod buttons;
pub mod chat;
pub mod embeds;

use anyhow::Result;
use async_trait::async_trait;
use serenity::model::id::{ChannelId, MessageId};

use crate::sources::Track;

pub use chat::DiscordChat;

/// Superficie de chat que usa el scheduler para notificar
#[async_trait]
pub trait ChatSurface: Send + Sync {
    /// Publica un "now playing" nuevo con sus controles
    async fn send_now_playing(&self, channel: ChannelId, track: &Track) -> Result<MessageId>;

    /// Reemplaza el contenido de un "now playing" anterior
    async fn edit_now_playing(&self, channel: ChannelId, message: MessageId, track: &Track) -> Result<()>;

    async fn send_notice(&self, channel: ChannelId, content: &str) -> Result<()>;
}
