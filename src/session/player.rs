//! Playback manager for driving proxies from recorded movement
//!
//! Each proxy actor has at most one playback session holding an
//! `Arc<Record>` from the catalog. Every host tick applies one frame:
//!
//! 1. Wrap to the start once the cursor runs past the last frame
//! 2. Teleport to the initial pose on frame 0, otherwise to the frame's
//!    origin, view angles and velocity
//! 3. Apply the next correction entry when the frame is flagged
//! 4. Give and select the recorded item on item switches
//! 5. Report a bookmark when the cursor reaches the pending one
//!
//! Playback loops until stopped. Button input is returned to the caller in
//! [`PlaybackTick::frame`]; the host applies it to the proxy.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::catalog::Catalog;
use crate::config::{PlaybackSettings, DEFAULT_CATEGORY};
use crate::error::{MimicError, Result};
use crate::host::SimulationHost;
use crate::types::{ActorId, Angles, CorrectionFlags, Record};

use super::types::{PendingBookmark, PlaybackSession, PlaybackTick};

/// Per-actor playback state machine
#[derive(Debug, Default)]
pub struct PlaybackManager {
    sessions: HashMap<ActorId, PlaybackSession>,
    settings: PlaybackSettings,
}

impl PlaybackManager {
    /// Create a new playback manager
    pub fn new(settings: PlaybackSettings) -> Self {
        Self {
            sessions: HashMap::new(),
            settings,
        }
    }

    /// Check if the actor is driven by a record
    pub fn is_mimicking(&self, actor: ActorId) -> bool {
        self.sessions.contains_key(&actor)
    }

    /// Path of the record the actor is mimicking
    pub fn record_path_of(&self, actor: ActorId) -> Option<&Path> {
        self.sessions.get(&actor).map(|s| s.path.as_path())
    }

    /// Index of the next frame the actor will apply
    pub fn current_tick(&self, actor: ActorId) -> Option<usize> {
        self.sessions.get(&actor).map(|s| s.cursor)
    }

    pub fn session(&self, actor: ActorId) -> Option<&PlaybackSession> {
        self.sessions.get(&actor)
    }

    /// Actors with a session, in no particular order
    pub fn actors(&self) -> Vec<ActorId> {
        self.sessions.keys().copied().collect()
    }

    /// Start playing `record` on `actor`, replacing any current session
    pub fn play(
        &mut self,
        host: &dyn SimulationHost,
        actor: ActorId,
        path: PathBuf,
        record: Arc<Record>,
    ) -> Result<()> {
        if !host.can_drive_as_proxy(actor) {
            return Err(MimicError::NotControllable(actor));
        }
        if record.frames.is_empty() {
            return Err(MimicError::EmptyRecord);
        }

        tracing::info!(
            "{} started mimicking '{}' from {} ({} frames, {} bookmarks)",
            actor,
            record.header.name,
            path.display(),
            record.header.frame_count,
            record.header.bookmarks.len()
        );

        self.sessions
            .insert(actor, PlaybackSession::new(record, path));
        Ok(())
    }

    /// Load the full record at `path` through the catalog and play it
    pub fn play_from_path(
        &mut self,
        host: &dyn SimulationHost,
        catalog: &mut Catalog,
        actor: ActorId,
        path: &Path,
        force_reload: bool,
    ) -> Result<()> {
        if !host.can_drive_as_proxy(actor) {
            return Err(MimicError::NotControllable(actor));
        }

        let category = catalog
            .category(path)
            .unwrap_or(DEFAULT_CATEGORY)
            .to_string();
        let record = catalog.load(path, &category, false, force_reload)?;
        self.play(host, actor, path.to_path_buf(), record)
    }

    /// Play the newest record named `name` (case-insensitive)
    pub fn play_by_name(
        &mut self,
        host: &dyn SimulationHost,
        catalog: &mut Catalog,
        actor: ActorId,
        name: &str,
    ) -> Result<()> {
        let path = catalog
            .find_latest_by_name(name)
            .map(Path::to_path_buf)
            .ok_or_else(|| MimicError::FileNotFound(PathBuf::from(name)))?;
        self.play_from_path(host, catalog, actor, &path, false)
    }

    /// Apply the next frame to the actor
    ///
    /// Returns `None` when the actor is not mimicking or has no body this
    /// tick. A flagged frame without a correction entry left means the
    /// record is out of lockstep; the session is stopped.
    pub fn tick(&mut self, host: &mut dyn SimulationHost, actor: ActorId) -> Option<PlaybackTick> {
        let session = self.sessions.get_mut(&actor)?;
        if !host.is_controllable(actor) {
            return None;
        }

        let record = Arc::clone(&session.record);
        let mut looped = false;
        if session.cursor >= record.frames.len() {
            tracing::debug!("{} reached end of '{}', looping", actor, record.header.name);
            session.cursor = 0;
            session.correction_cursor = 0;
            looped = true;
        }

        let tick = session.cursor;
        let frame = &record.frames[tick];

        if tick == 0 {
            host.teleport(
                actor,
                Some(record.header.initial_position),
                Some(record.header.initial_angles),
                Some(frame.actual_velocity),
            );
        } else {
            let roll = host.actor_state(actor).map_or(0.0, |s| s.angles.roll);
            let angles = Angles {
                roll,
                ..frame.predicted_angles
            };
            host.teleport(
                actor,
                Some(frame.origin),
                Some(angles),
                Some(frame.actual_velocity),
            );
        }

        if frame.correction.has_correction() {
            let Some(entry) = record.corrections.get(session.correction_cursor) else {
                tracing::error!(
                    "{} desynced on '{}': frame {} is flagged but correction {} does not exist",
                    actor,
                    record.header.name,
                    tick,
                    session.correction_cursor
                );
                self.sessions.remove(&actor);
                return None;
            };
            let flags = frame.correction;
            host.teleport(
                actor,
                entry.origin.filter(|_| flags.contains(CorrectionFlags::ORIGIN)),
                entry.angles.filter(|_| flags.contains(CorrectionFlags::ANGLES)),
                entry
                    .velocity
                    .filter(|_| flags.contains(CorrectionFlags::VELOCITY)),
            );
            session.correction_cursor += 1;
        }

        if let Some(item) = frame.new_weapon.as_deref().filter(|w| !w.is_empty()) {
            if !host.has_item(actor, item) {
                host.give_item(actor, item);
            }
            if !host.select_item(actor, item) {
                tracing::warn!("{} could not select {} at frame {}", actor, item, tick);
            }
            session.last_item = Some(item.to_string());
        }

        let mut bookmark_reached = None;
        if let Some(pending) = session.pending_bookmark {
            if pending.frame as usize == tick {
                if let Some(bookmark) = record.header.bookmarks.get(pending.index) {
                    tracing::debug!("{} reached bookmark '{}'", actor, bookmark.name);
                    bookmark_reached = Some(bookmark.name.clone());
                }
                session.advance_bookmark();
            }
        }

        let interval = self.settings.progress_log_interval as usize;
        if interval > 0 && tick % interval == 0 {
            tracing::trace!("{} playing tick {}/{}", actor, tick, record.frames.len());
        }

        session.cursor += 1;
        Some(PlaybackTick {
            tick,
            frame: frame.clone(),
            bookmark_reached,
            looped,
        })
    }

    /// Rewind the actor's playback to the first frame
    pub fn reset(&mut self, actor: ActorId) -> Result<()> {
        let session = self
            .sessions
            .get_mut(&actor)
            .ok_or(MimicError::NotMimicking(actor))?;
        session.rewind();
        tracing::debug!("Reset playback for {}", actor);
        Ok(())
    }

    /// Jump to a bookmark (case-insensitive)
    ///
    /// The next tick applies the bookmarked frame, consumes its correction
    /// entry and reports the bookmark. Returns the bookmarked frame index.
    pub fn seek_to_bookmark(&mut self, actor: ActorId, name: &str) -> Result<u32> {
        let session = self
            .sessions
            .get_mut(&actor)
            .ok_or(MimicError::NotMimicking(actor))?;

        let (index, bookmark) = session
            .record
            .header
            .find_bookmark(name)
            .ok_or_else(|| MimicError::BookmarkNotFound(name.to_string()))?;
        let frame = bookmark.frame;

        session.cursor = frame as usize;
        session.correction_cursor = bookmark.correction_index as usize;
        session.pending_bookmark = Some(PendingBookmark { frame, index });

        tracing::debug!("{} jumped to bookmark '{}' (frame {})", actor, name, frame);
        Ok(frame)
    }

    /// Stop the actor's playback. Returns whether a session existed.
    pub fn stop(&mut self, actor: ActorId) -> bool {
        let stopped = self.sessions.remove(&actor).is_some();
        if stopped {
            tracing::info!("{} stopped mimicking", actor);
        }
        stopped
    }

    /// Drop every session
    pub fn clear_all(&mut self) {
        self.sessions.clear();
    }
}
