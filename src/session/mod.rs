//! Session recording and playback module
//!
//! This module provides the per-actor state machines that turn live ticks
//! into records and drive proxies from them.
//!
//! # Features
//!
//! - Record actor movement with periodic and on-demand corrections
//! - Pause, resume and bookmark while recording
//! - Save inline or through a background writer thread
//! - Loop playback with drift correction, item switches and bookmark seeking
//! - Assign records to proxies that spawn later

pub mod player;
pub mod proxy;
pub mod recorder;
pub mod save_worker;
pub mod types;

pub use player::PlaybackManager;
pub use proxy::{AssignmentPoll, ProxyAssignment};
pub use recorder::RecordManager;
pub use save_worker::{SaveCompletion, SaveJob, SaveWorker};
pub use types::{
    MimicEvent, PendingBookmark, PlaybackSession, PlaybackTick, RecordingSession, RecordingState,
};
