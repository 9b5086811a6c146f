//! # Audio Module
//!
//! Per-guild playback orchestration for the jukebox.
//!
//! ## Architecture
//!
//! ### [`queue`] - Guild Playback State
//! - FIFO queue, repeat flag and last selected track
//! - The single now-playing session and the idle timer handle
//!
//! ### [`registry`] - Guild Registry
//! - Lazily created state per guild, evicted when the bot leaves voice
//! - A short `parking_lot` lock per guild plus an async turn that
//!   serializes advances
//!
//! ### [`scheduler`] - Playback Scheduler
//! - The advance state machine (`Idle`, `Playing`, `PendingIdleDisconnect`)
//! - Skip, stop, pause and idle auto-disconnect
//! - Track end and idle events arrive through a run queue, never as
//!   nested callbacks
//!
//! ### [`voice`] - Voice Transport
//! - Songbird backend behind the [`voice::VoiceBackend`] trait
//!
//! ## Example Usage
//!
//! ```rust,ignore
//! let (scheduler, events) = Scheduler::new(registry, resolver, voice, chat, idle_timeout);
//! tokio::spawn(scheduler.clone().run(events));
//!
//! scheduler.enqueue(guild_id, channel_id, track).await?;
//! scheduler.skip(guild_id)?;
//! scheduler.stop(guild_id).await?;
//! ```

pub mod queue;
pub mod registry;
pub mod scheduler;
pub mod voice;

#[cfg(test)]
pub mod testing;
