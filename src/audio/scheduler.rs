use serenity::model::id::{ChannelId, GuildId};
use std::{sync::Arc, time::Duration};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{debug, info, warn};

use crate::{
    audio::{
        queue::{IdleTimer, NowPlaying, PauseState, Selection},
        registry::{GuildRegistry, GuildSlot},
        voice::{SessionId, TrackEndSignal, VoiceBackend},
    },
    error::PlaybackError,
    sources::{Track, TrackResolver},
    ui::ChatSurface,
};

const QUEUE_EMPTY: &str = "📭 The queue is empty.";

/// Eventos que llegan desde fuera del flujo normal (driver de voz, timers)
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchedulerEvent {
    TrackEnded { guild_id: GuildId, session: SessionId },
    IdleExpired { guild_id: GuildId, generation: u64 },
}

/// Qué provocó un avance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    /// Arranque explícito tras encolar
    Start,
    /// Continuación automática al terminar la sesión indicada
    TrackEnded(SessionId),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Advance {
    Started(Track),
    /// Cola vacía: desconexión por inactividad programada
    Idle,
    /// Ya había algo sonando
    Busy,
    /// Evento de una sesión que ya no es la actual
    Stale,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Enqueued {
    Started(Track),
    Queued { position: usize },
}

/// Máquina de estados de reproducción por guild.
///
/// Estados: `Idle`, `Playing` y `PendingIdleDisconnect`. Los avances de una
/// misma guild se serializan con su turno; guilds distintas avanzan en
/// paralelo. Los fines de track y los timers de inactividad entran como
/// [`SchedulerEvent`] por la cola que consume [`Scheduler::run`].
pub struct Scheduler {
    registry: Arc<GuildRegistry>,
    resolver: TrackResolver,
    voice: Arc<dyn VoiceBackend>,
    chat: Arc<dyn ChatSurface>,
    events: UnboundedSender<SchedulerEvent>,
    idle_timeout: Duration,
}

impl Scheduler {
    pub fn new(
        registry: Arc<GuildRegistry>,
        resolver: TrackResolver,
        voice: Arc<dyn VoiceBackend>,
        chat: Arc<dyn ChatSurface>,
        idle_timeout: Duration,
    ) -> (Arc<Self>, UnboundedReceiver<SchedulerEvent>) {
        let (events, receiver) = mpsc::unbounded_channel();
        let scheduler = Arc::new(Self {
            registry,
            resolver,
            voice,
            chat,
            events,
            idle_timeout,
        });
        (scheduler, receiver)
    }

    #[allow(dead_code)]
    pub fn registry(&self) -> &Arc<GuildRegistry> {
        &self.registry
    }

    /// Consume la cola de eventos; cada evento se atiende en su propia tarea
    pub async fn run(self: Arc<Self>, mut events: UnboundedReceiver<SchedulerEvent>) {
        info!("🎛️ Scheduler de reproducción iniciado");

        while let Some(event) = events.recv().await {
            let scheduler = self.clone();
            tokio::spawn(async move {
                scheduler.dispatch(event).await;
            });
        }

        debug!("Cola de eventos del scheduler cerrada");
    }

    pub async fn dispatch(&self, event: SchedulerEvent) {
        match event {
            SchedulerEvent::TrackEnded { guild_id, session } => {
                if let Err(e) = self.advance(guild_id, Trigger::TrackEnded(session)).await {
                    debug!("Avance tras fin de track falló en guild {}: {}", guild_id, e);
                }
            }
            SchedulerEvent::IdleExpired {
                guild_id,
                generation,
            } => self.on_idle_expired(guild_id, generation).await,
        }
    }

    /// Encola un track y arranca la reproducción si no suena nada.
    ///
    /// Los errores devueltos ya fueron avisados en el canal.
    pub async fn enqueue(
        &self,
        guild_id: GuildId,
        channel_id: ChannelId,
        track: Track,
    ) -> Result<Enqueued, PlaybackError> {
        let slot = self.registry.get_or_create(guild_id);
        let (position, playing) = {
            let mut state = slot.state();
            state.set_text_channel(channel_id);
            state.cancel_idle_timer();
            let position = state.enqueue(track);
            (position, state.is_playing())
        };

        if playing {
            return Ok(Enqueued::Queued { position });
        }

        match self.advance(guild_id, Trigger::Start).await? {
            Advance::Started(track) => Ok(Enqueued::Started(track)),
            _ => Ok(Enqueued::Queued { position }),
        }
    }

    /// Transición de avance: elige el siguiente track (repetición o cola) y lo
    /// pone a sonar. Si falla la carga, sigue con el próximo.
    pub async fn advance(&self, guild_id: GuildId, trigger: Trigger) -> Result<Advance, PlaybackError> {
        let slot = match trigger {
            Trigger::Start => self.registry.get_or_create(guild_id),
            Trigger::TrackEnded(_) => match self.registry.get(guild_id) {
                Some(slot) => slot,
                None => return Ok(Advance::Stale),
            },
        };
        let _turn = slot.turn().await;

        let mut honor_repeat = true;
        {
            let mut state = slot.state();
            match trigger {
                Trigger::Start if state.is_playing() => return Ok(Advance::Busy),
                Trigger::Start => {}
                Trigger::TrackEnded(session) => match state.finish(session) {
                    // Un skip termina el track de verdad: no se repite
                    Some(finished) => honor_repeat = !finished.skipped,
                    None => return Ok(Advance::Stale),
                },
            }
        }

        loop {
            // Sin conexión no se retira nada de la cola
            if !self.voice.is_connected(guild_id) {
                warn!("Sin conexión de voz en guild {}, avance abortado", guild_id);
                return Err(PlaybackError::NotConnected);
            }

            let selection = slot.state().select_next(honor_repeat);
            honor_repeat = true;

            let (track, repeated) = match selection {
                Selection::Repeat(track) => (track, true),
                Selection::Dequeued(track) => (track, false),
                Selection::NothingToRepeat => {
                    let error = PlaybackError::NothingToRepeat;
                    self.notify(&slot, error.user_message()).await;
                    self.arm_idle_timer(guild_id, &slot);
                    return Err(error);
                }
                Selection::Empty => {
                    self.notify(&slot, QUEUE_EMPTY).await;
                    self.arm_idle_timer(guild_id, &slot);
                    return Ok(Advance::Idle);
                }
            };

            match self.start(guild_id, &slot, &track).await {
                Ok(()) => {
                    self.announce(&slot, &track).await;
                    return Ok(Advance::Started(track));
                }
                Err(PlaybackError::NotConnected) => {
                    warn!("Sin conexión de voz en guild {}, avance abortado", guild_id);
                    return Err(PlaybackError::NotConnected);
                }
                Err(e) => {
                    warn!(
                        "❌ No se pudo reproducir '{}' ({:?}): {}",
                        track.title(),
                        e.kind(),
                        e
                    );
                    self.notify(&slot, &format!("⚠️ Failed to load track: {}", track.title()))
                        .await;
                    // Una repetición rota no se reintenta en bucle
                    if repeated {
                        self.arm_idle_timer(guild_id, &slot);
                        return Err(e);
                    }
                    // El track roto quedó como último: se sigue por la cola
                    honor_repeat = false;
                }
            }
        }
    }

    /// Salta el track actual. El avance lo dispara la señal de fin.
    pub fn skip(&self, guild_id: GuildId) -> Result<bool, PlaybackError> {
        let Some(slot) = self.registry.get(guild_id) else {
            return Ok(false);
        };
        // Un timer vivo implica que no suena nada: el skip no lo toca
        let mut state = slot.state();
        state.request_skip()
    }

    /// Detiene todo y sale del canal de voz, sin avanzar
    pub async fn stop(&self, guild_id: GuildId) -> Result<(), PlaybackError> {
        if let Some(slot) = self.registry.get(guild_id) {
            let _turn = slot.turn().await;
            let abandoned = {
                let mut state = slot.state();
                state.cancel_idle_timer();
                state.abandon()
            };
            if let Some(now_playing) = abandoned {
                if let Err(e) = now_playing.stop() {
                    debug!("El track ya había terminado: {}", e);
                }
                info!("⏹️ Reproducción detenida: {}", now_playing.track.title());
            }
        }

        self.registry.evict(guild_id);
        self.voice.leave(guild_id).await
    }

    /// El bot salió del canal por fuera (kick, desconexión): se descarta el estado
    pub fn forget(&self, guild_id: GuildId) {
        let Some(slot) = self.registry.evict(guild_id) else {
            return;
        };
        let abandoned = slot.state().abandon();
        if let Some(now_playing) = abandoned {
            let _ = now_playing.stop();
        }
        info!("🔌 Estado de guild {} descartado tras desconexión", guild_id);
    }

    pub fn toggle_pause(&self, guild_id: GuildId) -> Result<PauseState, PlaybackError> {
        let slot = self
            .registry
            .get(guild_id)
            .ok_or(PlaybackError::NothingPlaying)?;
        let mut state = slot.state();
        let now_playing = state.now_playing_mut().ok_or(PlaybackError::NothingPlaying)?;
        let paused = now_playing.toggle_pause()?;
        info!("⏯️ {:?} en guild {}", paused, guild_id);
        Ok(paused)
    }

    pub fn toggle_repeat(&self, guild_id: GuildId) -> bool {
        self.registry.toggle_repeat(guild_id)
    }

    pub fn queue_snapshot(&self, guild_id: GuildId) -> Vec<Track> {
        self.registry.queue_snapshot(guild_id)
    }

    #[allow(dead_code)]
    pub fn is_playing(&self, guild_id: GuildId) -> bool {
        self.registry.is_playing(guild_id)
    }

    async fn start(&self, guild_id: GuildId, slot: &GuildSlot, track: &Track) -> Result<(), PlaybackError> {
        // La URL de stream caduca: se pide en cada intento, repeticiones incluidas
        let stream_url = self.resolver.resolve_stream_url(track).await?;
        let session = self.registry.next_session();
        let signal = TrackEndSignal::new(guild_id, session, self.events.clone());
        let handle = self.voice.play(guild_id, stream_url, signal).await?;

        slot.state()
            .begin(NowPlaying::new(session, track.clone(), handle));
        info!("🎵 Reproduciendo: {} en guild {}", track.title(), guild_id);
        if let Some(requester) = track.requester() {
            debug!("Pedido por {} ({})", requester.display_name, requester.id);
        }
        Ok(())
    }

    /// Publica el "now playing", editando el mensaje anterior si existe
    async fn announce(&self, slot: &GuildSlot, track: &Track) {
        let (channel, previous) = {
            let state = slot.state();
            (state.text_channel(), state.now_playing_message())
        };
        let Some(channel) = channel else {
            return;
        };

        let posted = match previous {
            Some(message) => match self.chat.edit_now_playing(channel, message, track).await {
                Ok(()) => Ok(message),
                Err(e) => {
                    debug!("No se pudo editar el mensaje {}, publicando uno nuevo: {:#}", message, e);
                    self.chat.send_now_playing(channel, track).await
                }
            },
            None => self.chat.send_now_playing(channel, track).await,
        };

        match posted {
            Ok(message) => slot.state().set_now_playing_message(message),
            Err(e) => warn!("Error al enviar mensaje now playing: {:#}", e),
        }
    }

    async fn notify(&self, slot: &GuildSlot, content: &str) {
        let channel = slot.state().text_channel();
        if let Some(channel) = channel {
            if let Err(e) = self.chat.send_notice(channel, content).await {
                warn!("Error al enviar aviso a {}: {:#}", channel, e);
            }
        }
    }

    fn arm_idle_timer(&self, guild_id: GuildId, slot: &GuildSlot) {
        let generation = self.registry.next_generation();
        let events = self.events.clone();
        let timeout = self.idle_timeout;

        let handle = tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            let _ = events.send(SchedulerEvent::IdleExpired {
                guild_id,
                generation,
            });
        });

        slot.state().arm_idle_timer(IdleTimer::new(generation, handle));
        info!(
            "⏳ Desconexión por inactividad en {} para guild {}",
            humantime::format_duration(timeout),
            guild_id
        );
    }

    async fn on_idle_expired(&self, guild_id: GuildId, generation: u64) {
        let Some(slot) = self.registry.get(guild_id) else {
            return;
        };
        let _turn = slot.turn().await;

        let should_leave = {
            let mut state = slot.state();
            state.take_idle_timer(generation) && !state.is_playing()
        };
        if !should_leave {
            debug!("Timer de inactividad {} obsoleto en guild {}", generation, guild_id);
            return;
        }

        info!("⏹ Bot desconectado por inactividad en guild {}", guild_id);
        self.registry.evict(guild_id);
        if let Err(e) = self.voice.leave(guild_id).await {
            warn!("Error al salir del canal de voz en guild {}: {}", guild_id, e);
        }
    }
}
