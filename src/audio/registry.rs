use dashmap::DashMap;
use parking_lot::{Mutex, MutexGuard};
use serenity::model::id::GuildId;
use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};
use tracing::debug;

use crate::{
    audio::{queue::GuildPlayback, voice::SessionId},
    sources::Track,
};

/// Estado de una guild más el turno que serializa sus avances
pub struct GuildSlot {
    state: Mutex<GuildPlayback>,
    turn: tokio::sync::Mutex<()>,
}

impl GuildSlot {
    fn new() -> Self {
        Self {
            state: Mutex::new(GuildPlayback::new()),
            turn: tokio::sync::Mutex::new(()),
        }
    }

    /// Acceso exclusivo al estado. Nunca mantener el guard a través de un `.await`.
    pub fn state(&self) -> MutexGuard<'_, GuildPlayback> {
        self.state.lock()
    }

    /// Turno de avance: solo un avance por guild a la vez
    pub async fn turn(&self) -> tokio::sync::MutexGuard<'_, ()> {
        self.turn.lock().await
    }
}

/// Registro de estados por guild, inyectado en todos los componentes.
///
/// Las guilds son independientes entre sí: no hay ningún lock global.
#[derive(Default)]
pub struct GuildRegistry {
    guilds: DashMap<GuildId, Arc<GuildSlot>>,
    sessions: AtomicU64,
    generations: AtomicU64,
}

impl GuildRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Obtiene (o crea) el estado de la guild
    pub fn get_or_create(&self, guild_id: GuildId) -> Arc<GuildSlot> {
        self.guilds
            .entry(guild_id)
            .or_insert_with(|| {
                debug!("Nuevo estado de reproducción para guild {}", guild_id);
                Arc::new(GuildSlot::new())
            })
            .clone()
    }

    pub fn get(&self, guild_id: GuildId) -> Option<Arc<GuildSlot>> {
        self.guilds.get(&guild_id).map(|slot| slot.clone())
    }

    /// `false` por defecto, sin crear estado
    #[allow(dead_code)]
    pub fn repeat_enabled(&self, guild_id: GuildId) -> bool {
        self.get(guild_id)
            .map(|slot| slot.state().repeat_enabled())
            .unwrap_or(false)
    }

    pub fn toggle_repeat(&self, guild_id: GuildId) -> bool {
        self.get_or_create(guild_id).state().toggle_repeat()
    }

    pub fn queue_snapshot(&self, guild_id: GuildId) -> Vec<Track> {
        self.get(guild_id)
            .map(|slot| slot.state().snapshot())
            .unwrap_or_default()
    }

    pub fn is_playing(&self, guild_id: GuildId) -> bool {
        self.get(guild_id)
            .map(|slot| slot.state().is_playing())
            .unwrap_or(false)
    }

    /// Saca la guild del registro; el próximo uso empieza de cero
    pub fn evict(&self, guild_id: GuildId) -> Option<Arc<GuildSlot>> {
        let (_, slot) = self.guilds.remove(&guild_id)?;
        slot.state().cancel_idle_timer();
        debug!("🗑️ Estado de reproducción descartado para guild {}", guild_id);
        Some(slot)
    }

    pub fn next_session(&self) -> SessionId {
        SessionId(self.sessions.fetch_add(1, Ordering::Relaxed) + 1)
    }

    pub fn next_generation(&self) -> u64 {
        self.generations.fetch_add(1, Ordering::Relaxed) + 1
    }

    #[allow(dead_code)]
    pub fn len(&self) -> usize {
        self.guilds.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn track(id: &str) -> Track {
        Track::new(id, format!("https://www.youtube.com/watch?v={}", id), 60)
    }

    #[test]
    fn test_lazy_creation_and_defaults() {
        let registry = GuildRegistry::new();
        let guild = GuildId::new(1);

        assert!(!registry.repeat_enabled(guild));
        assert!(registry.queue_snapshot(guild).is_empty());
        assert_eq!(registry.len(), 0);

        assert!(registry.toggle_repeat(guild));
        assert!(registry.repeat_enabled(guild));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_guilds_are_isolated() {
        let registry = GuildRegistry::new();
        registry.get_or_create(GuildId::new(1)).state().enqueue(track("a"));

        assert_eq!(registry.queue_snapshot(GuildId::new(1)).len(), 1);
        assert!(registry.queue_snapshot(GuildId::new(2)).is_empty());
    }

    #[test]
    fn test_evicted_guild_is_recreated_fresh() {
        let registry = GuildRegistry::new();
        let guild = GuildId::new(3);
        registry.get_or_create(guild).state().enqueue(track("a"));
        registry.toggle_repeat(guild);

        assert!(registry.evict(guild).is_some());
        assert!(registry.evict(guild).is_none());
        assert!(!registry.repeat_enabled(guild));
        assert!(registry.get_or_create(guild).state().snapshot().is_empty());
    }

    #[test]
    fn test_ids_are_unique() {
        let registry = GuildRegistry::new();
        assert_ne!(registry.next_session(), registry.next_session());
        assert_ne!(registry.next_generation(), registry.next_generation());
    }

    #[test]
    fn test_concurrent_toggles_do_not_lose_updates() {
        let registry = Arc::new(GuildRegistry::new());
        let guild = GuildId::new(9);

        let threads: Vec<_> = (0..8)
            .map(|_| {
                let registry = registry.clone();
                std::thread::spawn(move || {
                    for _ in 0..100 {
                        registry.toggle_repeat(guild);
                        registry.get_or_create(guild).state().enqueue(track("x"));
                    }
                })
            })
            .collect();
        for thread in threads {
            thread.join().unwrap();
        }

        // 800 toggles: vuelve al valor inicial
        assert!(!registry.repeat_enabled(guild));
        assert_eq!(registry.queue_snapshot(guild).len(), 800);
    }
}
