//! # mimic-rs: Movement Recording and Proxy Playback
//!
//! Captures an actor's per-tick movement and input inside a fixed-tick
//! simulation and replays it deterministically onto a proxy actor, with
//! sparse corrective snapshots, named bookmarks and item switches.
//!
//! ## Architecture
//!
//! - **Codec**: Versioned little-endian record format (header, frames, corrections)
//! - **Catalog**: Path-indexed cache of record headers and bodies
//! - **Session**: Per-actor recording and playback state machines
//! - **Host**: The [`SimulationHost`] trait the core drives the simulation through
//! - **App**: [`MimicApp`] facade with lifecycle hooks and an event channel
//!
//! ## Configuration
//!
//! Configuration is read from `mimic.toml` in the platform-appropriate data
//! directory under `dev.mimic-rs`:
//!
//! - **Linux**: `~/.local/share/dev.mimic-rs/`
//! - **macOS**: `~/Library/Application Support/dev.mimic-rs/`
//! - **Windows**: `%APPDATA%\dev.mimic-rs\`
//!
//! ## Example
//!
//! ```ignore
//! use mimic_rs::{config::MimicConfig, host::MockHost, ActorId, MimicApp};
//!
//! let mut host = MockHost::new("de_dust2");
//! host.add_player(ActorId(1));
//!
//! let mut app = MimicApp::new(MimicConfig::load_or_default())?;
//! app.start_recording(&host, ActorId(1), "mid-rush", "", None)?;
//! for _ in 0..640 {
//!     host.step(1.0 / 64.0);
//!     app.on_tick(&mut host, &[]);
//! }
//! let path = app.stop_recording(&mut host, ActorId(1), true)?;
//! ```

pub mod app;
pub mod catalog;
pub mod codec;
pub mod config;
pub mod error;
pub mod host;
pub mod session;
pub mod types;

// Re-export commonly used types
pub use app::{MimicApp, TickInput};
pub use catalog::Catalog;
pub use config::MimicConfig;
pub use error::{MimicError, Result, ResultExt};
pub use host::SimulationHost;
pub use session::{MimicEvent, PlaybackManager, PlaybackTick, RecordManager};
pub use types::{
    ActorId, Angles, Bookmark, CorrectionEntry, CorrectionFlags, Frame, Record, RecordHeader, Vec3,
};
