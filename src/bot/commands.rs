use anyhow::Result;
use serenity::{
    all::{Context, Message, User},
    http::HttpError,
    model::{
        id::{ChannelId, GuildId, UserId},
        ModelError,
    },
};
use tracing::{debug, error, info, warn};

use super::{selection, JukeboxBot};
use crate::{
    audio::{scheduler::Enqueued, voice::VoiceBackend},
    error::PlaybackError,
    sources::{is_direct_link, Requester, Resolved},
};

const NOT_IN_VOICE: &str = "⚠️ You must be in the voice channel!";

/// Comandos de texto reconocidos
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command<'a> {
    Play(&'a str),
    Stop,
}

/// Interpreta un mensaje como comando con el prefijo dado
pub fn parse_command<'a>(content: &'a str, prefix: &str) -> Option<Command<'a>> {
    let rest = content.trim_start().strip_prefix(prefix)?;
    let (name, args) = match rest.split_once(char::is_whitespace) {
        Some((name, args)) => (name, args.trim()),
        None => (rest, ""),
    };

    match name {
        "play" => Some(Command::Play(args)),
        "stop" => Some(Command::Stop),
        _ => None,
    }
}

/// `!play <búsqueda o enlace>`
pub async fn play(ctx: &Context, msg: &Message, query: &str, bot: &JukeboxBot) -> Result<()> {
    let guild_id = msg
        .guild_id
        .ok_or_else(|| anyhow::anyhow!("Comando usado fuera de un servidor"))?;

    delete_invocation(ctx, msg).await;

    if query.is_empty() {
        msg.channel_id
            .say(
                &ctx.http,
                format!("⚠️ Usage: `{}play <query or link>`", bot.config.command_prefix),
            )
            .await?;
        return Ok(());
    }

    if !ensure_voice(ctx, bot, guild_id, msg.author.id).await {
        msg.channel_id.say(&ctx.http, NOT_IN_VOICE).await?;
        return Ok(());
    }

    info!("🎵 {} pidió: {}", msg.author.name, query);

    let nick = msg.member.as_ref().and_then(|m| m.nick.as_deref());
    let requester = requester(&msg.author, nick);

    match bot.resolver.resolve(query).await {
        Ok(Resolved::Direct(track)) => {
            let track = track.with_requester(requester);
            let result = bot.scheduler.enqueue(guild_id, msg.channel_id, track).await;
            log_enqueued(guild_id, result);
        }
        Ok(Resolved::Candidates(candidates)) => {
            selection::prompt(ctx, bot, guild_id, msg.channel_id, requester, candidates).await?;
        }
        Err(e) => {
            debug!("Resolución fallida para '{}': {}", query, e);
            let notice = match &e {
                // Un extractor caído en una búsqueda se ve igual que "sin resultados"
                PlaybackError::Resolution(_) if !is_direct_link(query) => "⚠️ Nothing found.",
                _ => e.user_message(),
            };
            msg.channel_id.say(&ctx.http, notice).await?;
        }
    }

    Ok(())
}

/// `!stop`: detiene todo y sale del canal de voz
pub async fn stop(ctx: &Context, msg: &Message, bot: &JukeboxBot) -> Result<()> {
    let guild_id = msg
        .guild_id
        .ok_or_else(|| anyhow::anyhow!("Comando usado fuera de un servidor"))?;

    if !bot.voice.is_connected(guild_id) {
        debug!("!stop sin conexión de voz en guild {}", guild_id);
        return Ok(());
    }

    bot.scheduler.stop(guild_id).await?;
    msg.channel_id.say(&ctx.http, "🛑 Stopped and disabled.").await?;
    Ok(())
}

/// Conecta al canal de voz del usuario si el bot no está conectado.
///
/// `false` si el usuario no está en un canal de voz o la conexión falló.
pub async fn ensure_voice(ctx: &Context, bot: &JukeboxBot, guild_id: GuildId, user_id: UserId) -> bool {
    if bot.voice.is_connected(guild_id) {
        return true;
    }

    let Some(channel_id) = user_voice_channel(ctx, guild_id, user_id) else {
        return false;
    };

    match bot.voice.join(guild_id, channel_id).await {
        Ok(()) => true,
        Err(e) => {
            error!("Error al conectar al canal de voz {}: {}", channel_id, e);
            false
        }
    }
}

/// Los fallos ya se avisaron en el canal desde el scheduler
pub fn log_enqueued(guild_id: GuildId, result: Result<Enqueued, PlaybackError>) {
    match result {
        Ok(Enqueued::Started(track)) => debug!("▶️ {} empezó a sonar en guild {}", track.title(), guild_id),
        Ok(Enqueued::Queued { position }) => info!("📋 En cola en la posición {} (guild {})", position, guild_id),
        Err(e) => warn!("No se pudo iniciar la reproducción en guild {}: {}", guild_id, e),
    }
}

pub fn requester(user: &User, nick: Option<&str>) -> Requester {
    let display_name = nick
        .or(user.global_name.as_deref())
        .unwrap_or(&user.name)
        .to_string();

    Requester {
        id: user.id,
        display_name,
        avatar_url: Some(user.face()),
    }
}

/// Obtiene el canal de voz del usuario
fn user_voice_channel(ctx: &Context, guild_id: GuildId, user_id: UserId) -> Option<ChannelId> {
    let guild = guild_id.to_guild_cached(&ctx.cache)?;
    guild
        .voice_states
        .get(&user_id)
        .and_then(|voice_state| voice_state.channel_id)
}

/// Borra el mensaje del comando; sin permiso solo se avisa en el log
async fn delete_invocation(ctx: &Context, msg: &Message) {
    let Err(e) = msg.delete(ctx).await else {
        return;
    };

    if is_forbidden(&e) {
        let error = PlaybackError::Permission(format!("borrar mensajes en {}", msg.channel_id));
        warn!("⚠️ {}", error);
    } else {
        error!("Error al borrar el mensaje del comando: {:?}", e);
    }
}

fn is_forbidden(error: &serenity::Error) -> bool {
    match error {
        serenity::Error::Http(HttpError::UnsuccessfulRequest(response)) => {
            response.status_code.as_u16() == 403
        }
        serenity::Error::Model(ModelError::InvalidPermissions { .. }) => true,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_play_with_query() {
        assert_eq!(
            parse_command("!play  never gonna give you up ", "!"),
            Some(Command::Play("never gonna give you up"))
        );
        assert_eq!(
            parse_command("!play https://youtu.be/abc123", "!"),
            Some(Command::Play("https://youtu.be/abc123"))
        );
        assert_eq!(parse_command("!play", "!"), Some(Command::Play("")));
    }

    #[test]
    fn test_parse_respects_prefix() {
        assert_eq!(parse_command("!stop", "!"), Some(Command::Stop));
        assert_eq!(parse_command("?stop", "?"), Some(Command::Stop));
        assert_eq!(parse_command("stop", "!"), None);
        assert_eq!(parse_command("!stopp", "!"), None);
        assert_eq!(parse_command("!skip", "!"), None);
    }
}
