use anyhow::{Context, Result};
use async_trait::async_trait;
use serenity::{
    builder::{CreateMessage, EditMessage},
    http::Http,
    model::id::{ChannelId, MessageId},
};
use std::sync::Arc;
use tracing::debug;

use super::{buttons, embeds, ChatSurface};
use crate::sources::Track;

/// [`ChatSurface`] sobre la API HTTP de Discord
pub struct DiscordChat {
    http: Arc<Http>,
}

impl DiscordChat {
    pub fn new(http: Arc<Http>) -> Self {
        Self { http }
    }
}

#[async_trait]
impl ChatSurface for DiscordChat {
    async fn send_now_playing(&self, channel: ChannelId, track: &Track) -> Result<MessageId> {
        let message = channel
            .send_message(
                &self.http,
                CreateMessage::new()
                    .embed(embeds::now_playing(track))
                    .components(buttons::player_controls()),
            )
            .await
            .context("Error al enviar now playing")?;

        debug!("📨 Now playing publicado como mensaje {}", message.id);
        Ok(message.id)
    }

    async fn edit_now_playing(&self, channel: ChannelId, message: MessageId, track: &Track) -> Result<()> {
        channel
            .edit_message(
                &self.http,
                message,
                EditMessage::new()
                    .embed(embeds::now_playing(track))
                    .components(buttons::player_controls()),
            )
            .await
            .context("Error al editar now playing")?;
        Ok(())
    }

    async fn send_notice(&self, channel: ChannelId, content: &str) -> Result<()> {
        channel
            .say(&self.http, content)
            .await
            .context("Error al enviar aviso")?;
        Ok(())
    }
}
