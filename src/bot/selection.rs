use anyhow::Result;
use dashmap::DashMap;
use serenity::{
    all::{ComponentInteraction, ComponentInteractionDataKind, Context},
    builder::{CreateMessage, EditMessage},
    model::id::{ChannelId, GuildId, MessageId, UserId},
};
use std::{sync::Arc, time::Duration};
use thiserror::Error;
use tracing::{debug, info};

use super::{commands, reply_ephemeral, JukeboxBot};
use crate::{
    sources::{Requester, Track},
    ui::{
        buttons::{self, MenuOption},
        embeds,
    },
};

/// Tiempo que el prompt sigue visible tras una elección
const PROMPT_CLEANUP_DELAY: Duration = Duration::from_secs(2);

/// Candidatos que esperan la elección del usuario
#[derive(Debug, Clone)]
pub struct PendingSelection {
    pub guild_id: GuildId,
    /// Canal donde se invocó `!play`; ahí van las notificaciones
    pub channel_id: ChannelId,
    /// Quien escribió `!play`; el menú lo puede usar cualquiera
    pub requester: Requester,
    pub candidates: Vec<Track>,
}

/// Track elegido, ya con su solicitante
#[derive(Debug, Clone, PartialEq)]
pub struct Choice {
    pub guild_id: GuildId,
    pub channel_id: ChannelId,
    pub track: Track,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SelectionError {
    #[error("la selección del mensaje {0} expiró o ya fue usada")]
    Expired(MessageId),

    #[error("opción inválida `{0}`")]
    InvalidOption(String),
}

/// Puente entre los candidatos de una búsqueda y la elección del usuario.
///
/// Cada prompt admite una sola elección: el primer `choose` válido lo consume.
#[derive(Default)]
pub struct SelectionBridge {
    pending: DashMap<MessageId, PendingSelection>,
}

impl SelectionBridge {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn open(&self, message: MessageId, selection: PendingSelection) {
        debug!(
            "📝 Selección abierta en mensaje {} con {} candidatos",
            message,
            selection.candidates.len()
        );
        self.pending.insert(message, selection);
        debug!("{} selecciones pendientes", self.len());
    }

    /// Opciones numeradas `"0".."n"` con etiquetas recortadas
    pub fn options(candidates: &[Track]) -> Vec<MenuOption> {
        candidates
            .iter()
            .enumerate()
            .map(|(i, track)| MenuOption {
                label: buttons::truncate_label(track.title()),
                value: i.to_string(),
            })
            .collect()
    }

    /// El track queda a nombre de quien invocó `!play`, no de `chooser`
    pub fn choose(&self, message: MessageId, value: &str, chooser: UserId) -> Result<Choice, SelectionError> {
        let index: usize = value
            .parse()
            .map_err(|_| SelectionError::InvalidOption(value.to_string()))?;

        let Some((_, selection)) = self
            .pending
            .remove_if(&message, |_, selection| index < selection.candidates.len())
        else {
            return Err(if self.pending.contains_key(&message) {
                SelectionError::InvalidOption(value.to_string())
            } else {
                SelectionError::Expired(message)
            });
        };

        let PendingSelection {
            guild_id,
            channel_id,
            requester,
            mut candidates,
        } = selection;
        debug!(
            "Selección del mensaje {} elegida por {} (pedida por {})",
            message, chooser, requester.display_name
        );
        let track = candidates.swap_remove(index).with_requester(requester);

        Ok(Choice {
            guild_id,
            channel_id,
            track,
        })
    }

    /// Descarta un prompt vencido; `false` si ya se había elegido
    pub fn expire(&self, message: MessageId) -> bool {
        self.pending.remove(&message).is_some()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }
}

/// Publica el prompt de selección y programa su vencimiento
pub async fn prompt(
    ctx: &Context,
    bot: &JukeboxBot,
    guild_id: GuildId,
    channel_id: ChannelId,
    requester: Requester,
    candidates: Vec<Track>,
) -> Result<()> {
    let options = SelectionBridge::options(&candidates);
    let message = channel_id
        .send_message(
            &ctx.http,
            CreateMessage::new()
                .embed(embeds::search_prompt())
                .components(vec![buttons::track_select_menu(&options)]),
        )
        .await?;

    bot.selections.open(
        message.id,
        PendingSelection {
            guild_id,
            channel_id,
            requester,
            candidates,
        },
    );

    let selections = bot.selections.clone();
    let http = ctx.http.clone();
    let timeout = bot.config.selection_timeout;
    tokio::spawn(async move {
        tokio::time::sleep(timeout).await;
        if !selections.expire(message.id) {
            return;
        }

        debug!("⌛ Selección del mensaje {} expirada", message.id);
        // El menú deja de responder: se retira del mensaje
        if let Err(e) = channel_id
            .edit_message(&http, message.id, EditMessage::new().components(vec![]))
            .await
        {
            debug!("No se pudo retirar el menú vencido: {:?}", e);
        }
    });

    Ok(())
}

/// Maneja la opción elegida en el menú de selección
pub async fn handle_choice(ctx: &Context, interaction: &ComponentInteraction, bot: &JukeboxBot) -> Result<()> {
    let ComponentInteractionDataKind::StringSelect { values } = &interaction.data.kind else {
        return Ok(());
    };
    let value = values.first().map(String::as_str).unwrap_or_default();

    let choice = match bot.selections.choose(interaction.message.id, value, interaction.user.id) {
        Ok(choice) => choice,
        Err(e) => {
            debug!("Selección rechazada: {}", e);
            return reply_ephemeral(ctx, interaction, "⌛ This selection is no longer available.").await;
        }
    };

    if !commands::ensure_voice(ctx, bot, choice.guild_id, interaction.user.id).await {
        return reply_ephemeral(ctx, interaction, "⚠️ You must be in the voice channel!").await;
    }

    info!(
        "✅ Canción seleccionada por {}: {}",
        interaction.user.name,
        choice.track.title()
    );
    reply_ephemeral(ctx, interaction, "🎶 Track selected, loading...").await?;

    let http = ctx.http.clone();
    let channel = interaction.channel_id;
    let message = interaction.message.id;
    tokio::spawn(async move {
        tokio::time::sleep(PROMPT_CLEANUP_DELAY).await;
        if let Err(e) = channel.delete_message(&http, message).await {
            debug!("No se pudo borrar el prompt de selección: {:?}", e);
        }
    });

    let result = bot
        .scheduler
        .enqueue(choice.guild_id, choice.channel_id, choice.track)
        .await;
    commands::log_enqueued(choice.guild_id, result);

    Ok(())
}
