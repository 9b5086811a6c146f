use anyhow::Result;
use serenity::{
    all::{ComponentInteraction, Context},
    builder::{CreateInteractionResponse, CreateInteractionResponseMessage},
};
use std::time::Duration;
use tracing::{debug, info};

use super::{reply_ephemeral, JukeboxBot};
use crate::{
    audio::queue::PauseState,
    ui::{buttons::button_ids, embeds},
};

/// Tiempo que la vista de cola permanece en el canal
const QUEUE_VIEW_LIFETIME: Duration = Duration::from_secs(180);

/// Maneja los botones del mensaje "now playing"
pub async fn handle(ctx: &Context, interaction: &ComponentInteraction, bot: &JukeboxBot) -> Result<()> {
    let guild_id = interaction
        .guild_id
        .ok_or_else(|| anyhow::anyhow!("Interacción fuera de un servidor"))?;

    match interaction.data.custom_id.as_str() {
        button_ids::PAUSE_RESUME => {
            let notice = match bot.scheduler.toggle_pause(guild_id) {
                Ok(state) => pause_notice(state),
                Err(e) => e.user_message(),
            };
            reply_ephemeral(ctx, interaction, notice).await
        }
        button_ids::REPEAT => {
            let enabled = bot.scheduler.toggle_repeat(guild_id);
            reply_ephemeral(ctx, interaction, repeat_notice(enabled)).await
        }
        button_ids::SKIP => {
            let notice = match bot.scheduler.skip(guild_id) {
                Ok(_) => "⏭ Track skipped.",
                Err(e) => e.user_message(),
            };
            info!("⏭️ Skip pedido por {} en guild {}", interaction.user.name, guild_id);
            reply_ephemeral(ctx, interaction, notice).await
        }
        button_ids::QUEUE => show_queue(ctx, interaction, bot).await,
        other => {
            debug!("Componente desconocido: {}", other);
            Ok(())
        }
    }
}

async fn show_queue(ctx: &Context, interaction: &ComponentInteraction, bot: &JukeboxBot) -> Result<()> {
    let Some(guild_id) = interaction.guild_id else {
        return Ok(());
    };

    let tracks = bot.scheduler.queue_snapshot(guild_id);
    if tracks.is_empty() {
        return reply_ephemeral(ctx, interaction, "📭 The queue is empty.").await;
    }

    interaction
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Message(
                CreateInteractionResponseMessage::new().embed(embeds::queue_view(&tracks)),
            ),
        )
        .await?;

    let http = ctx.http.clone();
    let interaction = interaction.clone();
    tokio::spawn(async move {
        tokio::time::sleep(QUEUE_VIEW_LIFETIME).await;
        if let Err(e) = interaction.delete_response(&http).await {
            debug!("No se pudo borrar la vista de cola: {:?}", e);
        }
    });

    Ok(())
}

fn pause_notice(state: PauseState) -> &'static str {
    match state {
        PauseState::Paused => "⏸ Pause",
        PauseState::Resumed => "▶ Continued",
    }
}

fn repeat_notice(enabled: bool) -> &'static str {
    if enabled {
        "🔁 Repeat enabled"
    } else {
        "🔁 Repeat turned off"
    }
}
