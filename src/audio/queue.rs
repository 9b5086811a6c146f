use serenity::model::id::{ChannelId, MessageId};
use std::collections::VecDeque;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::{
    audio::voice::{PlaybackHandle, SessionId},
    error::PlaybackError,
    sources::Track,
};

/// Sesión de audio activa en una guild
pub struct NowPlaying {
    pub session: SessionId,
    pub track: Track,
    handle: Box<dyn PlaybackHandle>,
    paused: bool,
}

impl NowPlaying {
    pub fn new(session: SessionId, track: Track, handle: Box<dyn PlaybackHandle>) -> Self {
        Self {
            session,
            track,
            handle,
            paused: false,
        }
    }

    /// Pausa o reanuda según el estado actual
    pub fn toggle_pause(&mut self) -> Result<PauseState, PlaybackError> {
        if self.paused {
            self.handle.resume()?;
            self.paused = false;
            Ok(PauseState::Resumed)
        } else {
            self.handle.pause()?;
            self.paused = true;
            Ok(PauseState::Paused)
        }
    }

    pub fn stop(&self) -> Result<(), PlaybackError> {
        self.handle.stop()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PauseState {
    Paused,
    Resumed,
}

/// Temporizador de desconexión por inactividad. Soltarlo lo cancela.
pub struct IdleTimer {
    generation: u64,
    handle: JoinHandle<()>,
}

impl IdleTimer {
    pub fn new(generation: u64, handle: JoinHandle<()>) -> Self {
        Self { generation, handle }
    }
}

impl Drop for IdleTimer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Qué debe sonar a continuación
#[derive(Debug, Clone, PartialEq)]
pub enum Selection {
    /// Repetición del último track
    Repeat(Track),
    /// Cabeza de la cola, ya retirada
    Dequeued(Track),
    /// Repetición activa pero nunca sonó nada
    NothingToRepeat,
    Empty,
}

/// Resultado de cerrar una sesión
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Finished {
    /// La sesión terminó por un skip explícito
    pub skipped: bool,
}

/// Estado de reproducción de una guild.
///
/// Vive dentro de un `parking_lot::Mutex` en [`GuildSlot`](super::registry::GuildSlot);
/// todas las operaciones son síncronas y cortas.
#[derive(Default)]
pub struct GuildPlayback {
    queue: VecDeque<Track>,
    repeat: bool,
    last_track: Option<Track>,
    now_playing: Option<NowPlaying>,
    idle_timer: Option<IdleTimer>,
    skip_requested: Option<SessionId>,
    text_channel: Option<ChannelId>,
    now_playing_message: Option<MessageId>,
}

impl GuildPlayback {
    pub fn new() -> Self {
        Self::default()
    }

    /// Agrega un track al final; devuelve su posición (1 = siguiente)
    pub fn enqueue(&mut self, track: Track) -> usize {
        info!("➕ Agregado a la cola: {}", track.title());
        self.queue.push_back(track);
        self.queue.len()
    }

    /// Elige el siguiente track.
    ///
    /// Con repetición activa (y `honor_repeat`) vuelve a sonar el último track
    /// sin tocar la cola; si no, se retira la cabeza de la cola (FIFO).
    /// El track elegido queda como `last_track`.
    pub fn select_next(&mut self, honor_repeat: bool) -> Selection {
        if honor_repeat && self.repeat {
            return match &self.last_track {
                Some(track) => {
                    info!("🔂 Repitiendo track: {}", track.title());
                    Selection::Repeat(track.clone())
                }
                None => Selection::NothingToRepeat,
            };
        }

        match self.queue.pop_front() {
            Some(track) => {
                info!("➡️ Siguiente en cola: {}", track.title());
                self.last_track = Some(track.clone());
                Selection::Dequeued(track)
            }
            None => {
                info!("📭 Cola vacía, no hay siguiente track");
                Selection::Empty
            }
        }
    }

    pub fn toggle_repeat(&mut self) -> bool {
        self.repeat = !self.repeat;
        if self.repeat {
            info!("🔂 Repetir canción activado");
        } else {
            info!("➡️ Repetición desactivada");
        }
        self.repeat
    }

    pub fn repeat_enabled(&self) -> bool {
        self.repeat
    }

    #[allow(dead_code)]
    pub fn last_track(&self) -> Option<&Track> {
        self.last_track.as_ref()
    }

    /// Copia de solo lectura de la cola pendiente
    pub fn snapshot(&self) -> Vec<Track> {
        self.queue.iter().cloned().collect()
    }

    #[allow(dead_code)]
    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_playing(&self) -> bool {
        self.now_playing.is_some()
    }

    #[allow(dead_code)]
    pub fn now_playing(&self) -> Option<&NowPlaying> {
        self.now_playing.as_ref()
    }

    pub fn now_playing_mut(&mut self) -> Option<&mut NowPlaying> {
        self.now_playing.as_mut()
    }

    /// Registra la sesión que empezó a sonar; cancela cualquier desconexión pendiente
    pub fn begin(&mut self, now_playing: NowPlaying) {
        debug_assert!(self.now_playing.is_none(), "dos sesiones activas en la misma guild");
        self.cancel_idle_timer();
        self.skip_requested = None;
        self.now_playing = Some(now_playing);
    }

    /// Cierra la sesión `session` si es la actual. `None` si el evento es viejo.
    pub fn finish(&mut self, session: SessionId) -> Option<Finished> {
        if self.now_playing.as_ref().map(|np| np.session) != Some(session) {
            return None;
        }
        self.now_playing = None;
        let skipped = self.skip_requested.take() == Some(session);
        Some(Finished { skipped })
    }

    /// Suelta la sesión actual sin avanzar (stop)
    pub fn abandon(&mut self) -> Option<NowPlaying> {
        self.skip_requested = None;
        self.now_playing.take()
    }

    /// Marca la sesión actual como saltada y la detiene
    pub fn request_skip(&mut self) -> Result<bool, PlaybackError> {
        let Some(now_playing) = self.now_playing.as_ref() else {
            return Ok(false);
        };
        self.skip_requested = Some(now_playing.session);
        now_playing.stop()?;
        debug!("⏭️ Skip solicitado para la sesión {:?}", now_playing.session);
        Ok(true)
    }

    pub fn arm_idle_timer(&mut self, timer: IdleTimer) {
        debug_assert!(self.now_playing.is_none(), "timer de inactividad con audio sonando");
        self.idle_timer = Some(timer);
    }

    pub fn cancel_idle_timer(&mut self) -> bool {
        let cancelled = self.idle_timer.take().is_some();
        if cancelled {
            debug!("⏳ Desconexión por inactividad cancelada");
        }
        cancelled
    }

    /// Consume el timer si `generation` sigue siendo el vigente
    pub fn take_idle_timer(&mut self, generation: u64) -> bool {
        match &self.idle_timer {
            Some(timer) if timer.generation == generation => {
                self.idle_timer = None;
                true
            }
            _ => false,
        }
    }

    pub fn has_idle_timer(&self) -> bool {
        self.idle_timer.is_some()
    }

    pub fn text_channel(&self) -> Option<ChannelId> {
        self.text_channel
    }

    pub fn set_text_channel(&mut self, channel_id: ChannelId) {
        self.text_channel = Some(channel_id);
    }

    pub fn now_playing_message(&self) -> Option<MessageId> {
        self.now_playing_message
    }

    pub fn set_now_playing_message(&mut self, message_id: MessageId) {
        self.now_playing_message = Some(message_id);
    }
}
