use async_trait::async_trait;
use serenity::model::id::{ChannelId, GuildId};
use songbird::{
    error::JoinError, input::HttpRequest, tracks::TrackHandle, Event, EventContext,
    EventHandler as VoiceEventHandler, Songbird, TrackEvent,
};
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, info, warn};

use crate::{audio::scheduler::SchedulerEvent, error::PlaybackError};

/// Identificador de una sesión de reproducción (un track sonando)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(pub u64);

/// Señal de fin de track.
///
/// Se dispara desde el contexto de eventos del driver de voz y solo publica
/// un [`SchedulerEvent::TrackEnded`] en la cola del scheduler; nunca llama al
/// scheduler directamente.
#[derive(Debug, Clone)]
pub struct TrackEndSignal {
    guild_id: GuildId,
    session: SessionId,
    events: UnboundedSender<SchedulerEvent>,
}

impl TrackEndSignal {
    pub fn new(guild_id: GuildId, session: SessionId, events: UnboundedSender<SchedulerEvent>) -> Self {
        Self {
            guild_id,
            session,
            events,
        }
    }

    pub fn session(&self) -> SessionId {
        self.session
    }

    pub fn fire(&self) {
        let event = SchedulerEvent::TrackEnded {
            guild_id: self.guild_id,
            session: self.session,
        };
        if self.events.send(event).is_err() {
            debug!("Scheduler detenido, fin de track descartado en guild {}", self.guild_id);
        }
    }
}

/// Control de una sesión de audio activa
pub trait PlaybackHandle: Send + Sync {
    fn pause(&self) -> Result<(), PlaybackError>;
    fn resume(&self) -> Result<(), PlaybackError>;
    /// Termina la sesión; la señal de fin se dispara igual que en un final natural
    fn stop(&self) -> Result<(), PlaybackError>;
}

/// Transporte de voz consumido por el scheduler
#[async_trait]
pub trait VoiceBackend: Send + Sync {
    async fn play(
        &self,
        guild_id: GuildId,
        stream_url: String,
        on_end: TrackEndSignal,
    ) -> Result<Box<dyn PlaybackHandle>, PlaybackError>;

    async fn leave(&self, guild_id: GuildId) -> Result<(), PlaybackError>;

    fn is_connected(&self, guild_id: GuildId) -> bool;
}

impl PlaybackHandle for TrackHandle {
    fn pause(&self) -> Result<(), PlaybackError> {
        TrackHandle::pause(self).map_err(|e| PlaybackError::Transport(e.to_string()))
    }

    fn resume(&self) -> Result<(), PlaybackError> {
        TrackHandle::play(self).map_err(|e| PlaybackError::Transport(e.to_string()))
    }

    fn stop(&self) -> Result<(), PlaybackError> {
        TrackHandle::stop(self).map_err(|e| PlaybackError::Transport(e.to_string()))
    }
}

/// Backend de voz sobre Songbird
pub struct SongbirdVoice {
    manager: Arc<Songbird>,
    http: reqwest::Client,
}

impl SongbirdVoice {
    pub fn new(manager: Arc<Songbird>) -> Self {
        Self {
            manager,
            http: reqwest::Client::new(),
        }
    }

    /// Conecta al canal de voz (ensordecido)
    pub async fn join(&self, guild_id: GuildId, channel_id: ChannelId) -> Result<(), PlaybackError> {
        let call = self
            .manager
            .join(guild_id, channel_id)
            .await
            .map_err(|e| PlaybackError::Transport(format!("no se pudo entrar al canal: {}", e)))?;

        let mut handler = call.lock().await;
        if let Err(e) = handler.deafen(true).await {
            warn!("No se pudo ensordecer al bot en guild {}: {:?}", guild_id, e);
        }

        info!("🔊 Conectado al canal de voz {} en guild {}", channel_id, guild_id);
        Ok(())
    }
}

#[async_trait]
impl VoiceBackend for SongbirdVoice {
    async fn play(
        &self,
        guild_id: GuildId,
        stream_url: String,
        on_end: TrackEndSignal,
    ) -> Result<Box<dyn PlaybackHandle>, PlaybackError> {
        let call = self.manager.get(guild_id).ok_or(PlaybackError::NotConnected)?;

        let input = HttpRequest::new(self.http.clone(), stream_url);
        let track_handle = {
            let mut handler = call.lock().await;
            handler.play_only_input(input.into())
        };

        // Un error de reproducción también libera la sesión
        for event in [TrackEvent::End, TrackEvent::Error] {
            track_handle
                .add_event(Event::Track(event), TrackEndNotifier(on_end.clone()))
                .map_err(|e| PlaybackError::Transport(format!("event handler: {}", e)))?;
        }

        Ok(Box::new(track_handle))
    }

    async fn leave(&self, guild_id: GuildId) -> Result<(), PlaybackError> {
        match self.manager.remove(guild_id).await {
            Ok(()) => {
                info!("👋 Desconectado del canal de voz en guild {}", guild_id);
                Ok(())
            }
            Err(JoinError::NoCall) => Ok(()),
            Err(e) => Err(PlaybackError::Transport(e.to_string())),
        }
    }

    fn is_connected(&self, guild_id: GuildId) -> bool {
        self.manager.get(guild_id).is_some()
    }
}

/// Handler de Songbird que reenvía el fin de track al scheduler
struct TrackEndNotifier(TrackEndSignal);

#[async_trait]
impl VoiceEventHandler for TrackEndNotifier {
    async fn act(&self, ctx: &EventContext<'_>) -> Option<Event> {
        if let EventContext::Track(track_list) = ctx {
            for (state, _handle) in *track_list {
                debug!(
                    "Track de la sesión {} terminó con estado {:?}",
                    self.0.session().0,
                    state.playing
                );
            }
        }

        self.0.fire();
        None
    }
}
