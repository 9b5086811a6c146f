//! Dobles de prueba para el scheduler: voz y chat en memoria.

use anyhow::Result;
use async_trait::async_trait;
use parking_lot::Mutex;
use serenity::model::id::{ChannelId, GuildId, MessageId};
use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};

use crate::{
    audio::{
        registry::GuildRegistry,
        scheduler::Scheduler,
        voice::{PlaybackHandle, TrackEndSignal, VoiceBackend},
    },
    error::PlaybackError,
    sources::{watch_url, MockCatalog, Track, TrackResolver},
    ui::ChatSurface,
};

pub fn track(id: &str) -> Track {
    Track::new(id, watch_url(id), 60)
}

/// Cede el control hasta que se cumpla la condición
pub async fn wait_until(mut condition: impl FnMut() -> bool) {
    for _ in 0..1000 {
        if condition() {
            return;
        }
        tokio::task::yield_now().await;
    }
    panic!("la condición no se cumplió a tiempo");
}

#[derive(Default)]
struct VoiceLog {
    played: Vec<String>,
    active: HashMap<GuildId, usize>,
    max_active: HashMap<GuildId, usize>,
    leaves: usize,
}

struct FakeSession {
    guild_id: GuildId,
    signal: TrackEndSignal,
    ended: AtomicBool,
    log: Arc<Mutex<VoiceLog>>,
}

impl FakeSession {
    fn end(&self) {
        if self.ended.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Some(active) = self.log.lock().active.get_mut(&self.guild_id) {
            *active -= 1;
        }
        self.signal.fire();
    }
}

struct SessionHandle(Arc<FakeSession>);

impl PlaybackHandle for SessionHandle {
    fn pause(&self) -> Result<(), PlaybackError> {
        Ok(())
    }

    fn resume(&self) -> Result<(), PlaybackError> {
        Ok(())
    }

    fn stop(&self) -> Result<(), PlaybackError> {
        self.0.end();
        Ok(())
    }
}

/// Transporte de voz en memoria. Detener una sesión dispara su señal de fin,
/// igual que el driver real.
pub struct FakeVoice {
    log: Arc<Mutex<VoiceLog>>,
    sessions: Mutex<Vec<Arc<FakeSession>>>,
    connected: AtomicBool,
    fail_next: AtomicBool,
}

impl FakeVoice {
    fn new() -> Self {
        Self {
            log: Arc::default(),
            sessions: Mutex::default(),
            connected: AtomicBool::new(true),
            fail_next: AtomicBool::new(false),
        }
    }

    pub fn played(&self) -> Vec<String> {
        self.log.lock().played.clone()
    }

    pub fn play_count(&self) -> usize {
        self.log.lock().played.len()
    }

    pub fn leave_count(&self) -> usize {
        self.log.lock().leaves
    }

    pub fn max_active(&self, guild_id: GuildId) -> usize {
        self.log.lock().max_active.get(&guild_id).copied().unwrap_or(0)
    }

    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }

    pub fn fail_next_play(&self) {
        self.fail_next.store(true, Ordering::SeqCst);
    }

    /// Final natural de la última sesión que sigue sonando
    pub fn finish_current(&self) {
        let current = self
            .sessions
            .lock()
            .iter()
            .rev()
            .find(|session| !session.ended.load(Ordering::SeqCst))
            .cloned();
        current.expect("no hay ninguna sesión sonando").end();
    }
}

#[async_trait]
impl VoiceBackend for FakeVoice {
    async fn play(
        &self,
        guild_id: GuildId,
        stream_url: String,
        on_end: TrackEndSignal,
    ) -> Result<Box<dyn PlaybackHandle>, PlaybackError> {
        if self.fail_next.swap(false, Ordering::SeqCst) {
            return Err(PlaybackError::Transport("ffmpeg exited".to_string()));
        }

        {
            let mut log = self.log.lock();
            log.played.push(stream_url);
            let active = {
                let active = log.active.entry(guild_id).or_insert(0);
                *active += 1;
                *active
            };
            let max = log.max_active.entry(guild_id).or_insert(0);
            *max = (*max).max(active);
        }

        let session = Arc::new(FakeSession {
            guild_id,
            signal: on_end,
            ended: AtomicBool::new(false),
            log: self.log.clone(),
        });
        self.sessions.lock().push(session.clone());
        Ok(Box::new(SessionHandle(session)))
    }

    async fn leave(&self, _guild_id: GuildId) -> Result<(), PlaybackError> {
        self.log.lock().leaves += 1;
        Ok(())
    }

    fn is_connected(&self, _guild_id: GuildId) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatCall {
    Sent(String),
    Edited(String),
    Notice(String),
}

pub struct FakeChat {
    calls: Mutex<Vec<ChatCall>>,
    next_message: AtomicU64,
    fail_edits: AtomicBool,
}

impl FakeChat {
    fn new() -> Self {
        Self {
            calls: Mutex::default(),
            next_message: AtomicU64::new(1),
            fail_edits: AtomicBool::new(false),
        }
    }

    pub fn calls(&self) -> Vec<ChatCall> {
        self.calls.lock().clone()
    }

    /// El mensaje anterior "fue borrado": las ediciones fallan
    pub fn fail_edits(&self) {
        self.fail_edits.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl ChatSurface for FakeChat {
    async fn send_now_playing(&self, _channel: ChannelId, track: &Track) -> Result<MessageId> {
        self.calls.lock().push(ChatCall::Sent(track.title().to_string()));
        Ok(MessageId::new(self.next_message.fetch_add(1, Ordering::SeqCst)))
    }

    async fn edit_now_playing(&self, _channel: ChannelId, _message: MessageId, track: &Track) -> Result<()> {
        if self.fail_edits.load(Ordering::SeqCst) {
            anyhow::bail!("Unknown Message");
        }
        self.calls.lock().push(ChatCall::Edited(track.title().to_string()));
        Ok(())
    }

    async fn send_notice(&self, _channel: ChannelId, content: &str) -> Result<()> {
        self.calls.lock().push(ChatCall::Notice(content.to_string()));
        Ok(())
    }
}

pub struct Harness {
    pub scheduler: Arc<Scheduler>,
    pub voice: Arc<FakeVoice>,
    pub chat: Arc<FakeChat>,
    pub catalog_calls: Arc<AtomicUsize>,
}

/// Scheduler con catálogo simulado y su cola de eventos corriendo.
///
/// El catálogo entrega `stream://<id>`; el id `broken` falla.
pub fn harness() -> Harness {
    let catalog_calls = Arc::new(AtomicUsize::new(0));
    let mut catalog = MockCatalog::new();
    let counter = catalog_calls.clone();
    catalog.expect_stream_url().returning(move |url| {
        counter.fetch_add(1, Ordering::SeqCst);
        let id = url.rsplit("v=").next().unwrap_or(url);
        if id == "broken" {
            anyhow::bail!("Video unavailable");
        }
        Ok(format!("stream://{}", id))
    });

    let resolver = TrackResolver::new(Arc::new(catalog), Duration::from_secs(900), 5);
    let voice = Arc::new(FakeVoice::new());
    let chat = Arc::new(FakeChat::new());
    let (scheduler, events) = Scheduler::new(
        Arc::new(GuildRegistry::new()),
        resolver,
        voice.clone(),
        chat.clone(),
        Duration::from_secs(300),
    );
    tokio::spawn(scheduler.clone().run(events));

    Harness {
        scheduler,
        voice,
        chat,
        catalog_calls,
    }
}
