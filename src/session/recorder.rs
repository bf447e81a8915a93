//! Record manager for capturing actor movement
//!
//! Each actor has at most one recording session. Sessions move through
//! `Recording ⇄ Paused` and end with [`RecordManager::stop`], which either
//! discards the buffer or persists it through the codec and registers the
//! new file with the catalog.
//!
//! # Corrections
//!
//! Frames are predicted input and drift over time, so the recorder attaches
//! correction entries to some frames:
//!
//! - a full snapshot (origin, angles, velocity) on the first frame after a
//!   resume and on the first frame after a bookmark
//! - an origin-only snapshot whenever more than `snapshot_interval` frames
//!   have passed since the previous periodic snapshot
//! - a full snapshot on the bookmarked frame itself

use std::collections::HashMap;
use std::path::PathBuf;

use crate::catalog::Catalog;
use crate::codec::{self, truncate_utf8};
use crate::config::{RecordingSettings, SaveMode, DEFAULT_CATEGORY};
use crate::error::{MimicError, Result};
use crate::host::SimulationHost;
use crate::types::{ActorId, Angles, Bookmark, CorrectionEntry, CorrectionFlags, Frame, Vec3};

use super::save_worker::{SaveCompletion, SaveJob, SaveWorker};
use super::types::{RecordingSession, RecordingState};

/// Per-actor recording state machine
#[derive(Debug)]
pub struct RecordManager {
    sessions: HashMap<ActorId, RecordingSession>,
    settings: RecordingSettings,
    default_category: String,
    save_worker: Option<SaveWorker>,
}

impl Default for RecordManager {
    fn default() -> Self {
        Self::new(RecordingSettings::default(), DEFAULT_CATEGORY)
    }
}

impl RecordManager {
    /// Create a record manager
    ///
    /// With [`SaveMode::Background`] a writer thread is spawned. If that
    /// fails, records are written inline.
    pub fn new(settings: RecordingSettings, default_category: impl Into<String>) -> Self {
        let save_worker = match settings.save_mode {
            SaveMode::Inline => None,
            SaveMode::Background => match SaveWorker::spawn() {
                Ok(worker) => Some(worker),
                Err(e) => {
                    tracing::warn!("Failed to spawn save worker, saving inline: {}", e);
                    None
                }
            },
        };

        Self {
            sessions: HashMap::new(),
            settings,
            default_category: default_category.into(),
            save_worker,
        }
    }

    /// Whether saves are handed to the writer thread
    pub fn saves_in_background(&self) -> bool {
        self.save_worker.is_some()
    }

    /// Check if the actor has a session (recording or paused)
    pub fn is_recording(&self, actor: ActorId) -> bool {
        self.sessions.contains_key(&actor)
    }

    /// Check if the actor's session is paused
    pub fn is_paused(&self, actor: ActorId) -> bool {
        self.sessions
            .get(&actor)
            .is_some_and(|s| s.state.is_paused())
    }

    pub fn session(&self, actor: ActorId) -> Option<&RecordingSession> {
        self.sessions.get(&actor)
    }

    /// Number of frames captured by the actor's session
    pub fn recorded_frames(&self, actor: ActorId) -> Option<usize> {
        self.sessions.get(&actor).map(RecordingSession::frame_count)
    }

    /// Actors with a session, in no particular order
    pub fn actors(&self) -> Vec<ActorId> {
        self.sessions.keys().copied().collect()
    }

    /// Start recording
    ///
    /// An empty `category` uses the configured default.
    pub fn start(
        &mut self,
        host: &dyn SimulationHost,
        actor: ActorId,
        name: &str,
        category: &str,
        subdir: Option<&str>,
    ) -> Result<()> {
        if self.sessions.contains_key(&actor) {
            return Err(MimicError::AlreadyRecording(actor));
        }

        let state = host
            .actor_state(actor)
            .filter(|_| host.is_controllable(actor))
            .ok_or(MimicError::NotControllable(actor))?;

        let category = if category.is_empty() {
            self.default_category.clone()
        } else {
            category.to_string()
        };
        let name = truncate_utf8(name, self.settings.max_name_length).to_string();
        let subdir = subdir.filter(|s| !s.is_empty()).map(str::to_string);

        tracing::info!(
            "Started recording '{}' for {} at {} (category '{}')",
            name,
            actor,
            state.origin,
            category
        );

        self.sessions.insert(
            actor,
            RecordingSession::new(name, category, subdir, state.origin, state.angles),
        );
        Ok(())
    }

    /// Capture one tick of the actor's state
    ///
    /// `predicted_velocity` and `predicted_angles` come from the input
    /// pipeline; origin, velocity and the active item are read from the
    /// host. Returns whether a frame was appended (false while paused or
    /// when the actor is not recording).
    pub fn capture_frame(
        &mut self,
        host: &dyn SimulationHost,
        actor: ActorId,
        buttons: u64,
        predicted_velocity: Vec3,
        predicted_angles: Angles,
    ) -> bool {
        let Some(session) = self.sessions.get_mut(&actor) else {
            return false;
        };
        let RecordingState::Recording {
            force_full_snapshot,
        } = session.state
        else {
            return false;
        };
        let Some(state) = host.actor_state(actor) else {
            return false;
        };

        let mut frame = Frame {
            buttons,
            actual_velocity: state.velocity,
            predicted_velocity,
            predicted_angles: predicted_angles.without_roll(),
            origin: state.origin,
            ..Default::default()
        };

        let interval = self.settings.snapshot_interval;
        if force_full_snapshot {
            session
                .corrections
                .push(CorrectionEntry::full(state.origin, state.angles, state.velocity));
            frame.correction = CorrectionFlags::ALL;
            session.state = RecordingState::Recording {
                force_full_snapshot: false,
            };
        } else if interval > 0 && session.snapshot_counter > interval {
            session
                .corrections
                .push(CorrectionEntry::origin_only(state.origin));
            frame.correction = CorrectionFlags::ORIGIN;
            session.snapshot_counter = 0;
        }
        session.snapshot_counter += 1;

        if let Some(item) = host.active_item(actor) {
            let changed = session.frames.is_empty() || session.previous_item != Some(item.id);
            if changed && !item.identifier.is_empty() {
                tracing::debug!(
                    "{} switched to {} at frame {}",
                    actor,
                    item.identifier,
                    session.frames.len()
                );
                frame.new_weapon = Some(item.identifier);
                session.previous_item = Some(item.id);
            }
        }

        session.frames.push(frame);
        true
    }

    /// Pause capturing
    pub fn pause(&mut self, actor: ActorId) -> Result<()> {
        let session = self
            .sessions
            .get_mut(&actor)
            .ok_or(MimicError::NotRecording(actor))?;
        if session.state.is_paused() {
            return Err(MimicError::AlreadyPaused(actor));
        }
        session.state = RecordingState::Paused;
        tracing::info!("Paused recording for {}", actor);
        Ok(())
    }

    /// Resume capturing. The next frame carries a full snapshot.
    pub fn resume(&mut self, actor: ActorId) -> Result<()> {
        let session = self
            .sessions
            .get_mut(&actor)
            .ok_or(MimicError::NotRecording(actor))?;
        if !session.state.is_paused() {
            return Err(MimicError::NotPaused(actor));
        }
        session.state = RecordingState::Recording {
            force_full_snapshot: true,
        };
        tracing::info!("Resumed recording for {}", actor);
        Ok(())
    }

    /// Mark the last captured frame as a named bookmark
    ///
    /// Returns the bookmarked frame index.
    pub fn save_bookmark(
        &mut self,
        host: &dyn SimulationHost,
        actor: ActorId,
        name: &str,
    ) -> Result<u32> {
        let session = self
            .sessions
            .get_mut(&actor)
            .ok_or(MimicError::NotRecording(actor))?;

        let name = truncate_utf8(name, self.settings.max_bookmark_name_length);
        if session.bookmarks.iter().any(|b| b.is_named(name)) {
            return Err(MimicError::DuplicateBookmarkName(name.to_string()));
        }

        let Some(last) = session.frames.len().checked_sub(1) else {
            return Err(MimicError::EmptyRecord);
        };
        let state = host
            .actor_state(actor)
            .ok_or(MimicError::NotControllable(actor))?;

        let entry = CorrectionEntry::full(state.origin, state.angles, state.velocity);
        let frame = &mut session.frames[last];

        // A flagged last frame owns the newest entry
        let correction_index = if frame.correction.has_correction() {
            let idx = session.corrections.len() - 1;
            session.corrections[idx] = entry;
            idx
        } else {
            session.corrections.push(entry);
            session.corrections.len() - 1
        };
        frame.correction |= CorrectionFlags::ALL;

        if frame.new_weapon.is_none() {
            frame.new_weapon = host
                .active_item(actor)
                .map(|item| item.identifier)
                .filter(|id| !id.is_empty());
        }

        session.bookmarks.push(Bookmark {
            frame: last as u32,
            correction_index: correction_index as u32,
            name: name.to_string(),
        });

        if session.state.is_recording() {
            session.state = RecordingState::Recording {
                force_full_snapshot: true,
            };
        }

        tracing::info!("Saved bookmark '{}' for {} at frame {}", name, actor, last);
        Ok(last as u32)
    }

    /// End the actor's session
    ///
    /// With `save` the record is written to
    /// `<category>/<map>[/<subdir>]/<end_time>.<ext>` under the catalog's
    /// base directory and header-loaded into the catalog. Returns the path,
    /// or `None` when discarding. In background mode the returned path is
    /// where the record will appear once [`poll_saves`](Self::poll_saves)
    /// reports it.
    pub fn stop(
        &mut self,
        host: &dyn SimulationHost,
        catalog: &mut Catalog,
        actor: ActorId,
        save: bool,
    ) -> Result<Option<PathBuf>> {
        let session = self
            .sessions
            .remove(&actor)
            .ok_or(MimicError::NotRecording(actor))?;

        if !save {
            tracing::info!(
                "Discarded recording '{}' for {} ({} frames)",
                session.name,
                actor,
                session.frame_count()
            );
            return Ok(None);
        }

        let end_time = host.now();
        let category = session.category.clone();
        let path = catalog.record_path(
            &category,
            &host.map_name(),
            session.subdir.as_deref(),
            end_time,
        );
        let record = session.into_record(end_time);

        let record = match &self.save_worker {
            Some(worker) => {
                let job = SaveJob {
                    actor,
                    path: path.clone(),
                    category: category.clone(),
                    record,
                };
                match worker.submit(job) {
                    Ok(()) => {
                        tracing::debug!("Queued {} for background save", path.display());
                        catalog.reserve(path.clone());
                        return Ok(Some(path));
                    }
                    Err(job) => {
                        tracing::warn!("Save worker unavailable, saving inline");
                        job.record
                    }
                }
            }
            None => record,
        };

        if let Err(e) = codec::write_file(&path, &record) {
            tracing::error!("Failed to save recording for {}: {}", actor, e);
            return Err(e);
        }

        if let Err(e) = catalog.load(&path, &category, true, false) {
            tracing::warn!("Saved {} but could not index it: {}", path.display(), e);
        }

        tracing::info!(
            "Saved recording '{}' for {} to {} ({} frames, {} bookmarks)",
            record.header.name,
            actor,
            path.display(),
            record.header.frame_count,
            record.header.bookmarks.len()
        );
        Ok(Some(path))
    }

    /// Collect finished background saves and register them with the catalog
    pub fn poll_saves(&mut self, catalog: &mut Catalog) -> Vec<SaveCompletion> {
        let Some(worker) = &self.save_worker else {
            return Vec::new();
        };

        let completions = worker.drain();
        for done in &completions {
            catalog.release(&done.path);
            if done.result.is_err() {
                continue;
            }
            if let Err(e) = catalog.load(&done.path, &done.category, true, false) {
                tracing::warn!("Saved {} but could not index it: {}", done.path.display(), e);
            }
        }
        completions
    }

    /// Drop every session without saving
    pub fn clear_all(&mut self) {
        if !self.sessions.is_empty() {
            tracing::debug!("Clearing {} recording sessions", self.sessions.len());
        }
        self.sessions.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{ActiveItem, ActorState, MockHost, MockSimulationHost};
    use tempfile::TempDir;

    const P: ActorId = ActorId(1);

    fn host_with_player() -> MockHost {
        let mut host = MockHost::new("map");
        host.add_player(P).set_origin(Vec3::new(1.0, 2.0, 3.0));
        host
    }

    fn capture(manager: &mut RecordManager, host: &MockHost, n: usize) {
        for _ in 0..n {
            assert!(manager.capture_frame(host, P, 0, Vec3::ZERO, Angles::default()));
        }
    }

    #[test]
    fn test_recorder_lifecycle() {
        let host = host_with_player();
        let mut manager = RecordManager::default();

        manager.start(&host, P, "run", "", None).unwrap();
        assert!(manager.is_recording(P));
        assert_eq!(manager.session(P).unwrap().category, "default");
        assert!(matches!(
            manager.start(&host, P, "again", "", None),
            Err(MimicError::AlreadyRecording(_))
        ));

        manager.pause(P).unwrap();
        assert!(manager.is_paused(P));
        assert!(matches!(manager.pause(P), Err(MimicError::AlreadyPaused(_))));
        assert!(!manager.capture_frame(&host, P, 0, Vec3::ZERO, Angles::default()));

        manager.resume(P).unwrap();
        assert!(matches!(manager.resume(P), Err(MimicError::NotPaused(_))));
        assert!(matches!(
            manager.pause(ActorId(9)),
            Err(MimicError::NotRecording(_))
        ));
    }

    #[test]
    fn test_start_requires_controllable_actor() {
        let mut host = MockSimulationHost::new();
        host.expect_is_controllable().return_const(false);
        host.expect_actor_state()
            .return_const(Some(ActorState::default()));

        let mut manager = RecordManager::default();
        let err = manager.start(&host, P, "run", "", None).unwrap_err();
        assert!(matches!(err, MimicError::NotControllable(_)));
        assert!(!manager.is_recording(P));
    }

    #[test]
    fn test_name_truncated() {
        let host = host_with_player();
        let mut manager = RecordManager::default();
        manager.start(&host, P, &"n".repeat(300), "", None).unwrap();
        assert_eq!(
            manager.session(P).unwrap().name.len(),
            crate::config::MAX_RECORD_NAME_LENGTH
        );
    }

    #[test]
    fn test_periodic_origin_snapshot() {
        let host = host_with_player();
        let settings = RecordingSettings {
            snapshot_interval: 3,
            ..Default::default()
        };
        let mut manager = RecordManager::new(settings, "default");
        manager.start(&host, P, "run", "", None).unwrap();
        capture(&mut manager, &host, 10);

        let session = manager.session(P).unwrap();
        let flagged: Vec<usize> = session
            .frames
            .iter()
            .enumerate()
            .filter(|(_, f)| f.correction.has_correction())
            .map(|(i, _)| i)
            .collect();
        // Counter must exceed the interval: snapshot on the 5th sample, then every 4th
        assert_eq!(flagged, vec![4, 8]);
        assert_eq!(session.corrections.len(), 2);
        assert!(session
            .corrections
            .iter()
            .all(|c| c.flags() == CorrectionFlags::ORIGIN));
    }

    #[test]
    fn test_zero_interval_disables_snapshots() {
        let host = host_with_player();
        let settings = RecordingSettings {
            snapshot_interval: 0,
            ..Default::default()
        };
        let mut manager = RecordManager::new(settings, "default");
        manager.start(&host, P, "run", "", None).unwrap();
        capture(&mut manager, &host, 50);
        assert!(manager.session(P).unwrap().corrections.is_empty());
    }

    #[test]
    fn test_bookmark_errors() {
        let host = host_with_player();
        let mut manager = RecordManager::default();

        assert!(matches!(
            manager.save_bookmark(&host, P, "a"),
            Err(MimicError::NotRecording(_))
        ));

        manager.start(&host, P, "run", "", None).unwrap();
        assert!(matches!(
            manager.save_bookmark(&host, P, "a"),
            Err(MimicError::EmptyRecord)
        ));

        capture(&mut manager, &host, 2);
        assert_eq!(manager.save_bookmark(&host, P, "Spot").unwrap(), 1);
        assert!(matches!(
            manager.save_bookmark(&host, P, "SPOT"),
            Err(MimicError::DuplicateBookmarkName(_))
        ));
    }

    #[test]
    fn test_bookmark_replaces_existing_correction() {
        let host = host_with_player();
        let mut manager = RecordManager::default();
        manager.start(&host, P, "run", "", None).unwrap();
        capture(&mut manager, &host, 2);

        manager.pause(P).unwrap();
        manager.resume(P).unwrap();
        capture(&mut manager, &host, 1);
        assert_eq!(manager.session(P).unwrap().corrections.len(), 1);

        // Last frame already carries the resume snapshot
        manager.save_bookmark(&host, P, "here").unwrap();
        let session = manager.session(P).unwrap();
        assert_eq!(session.corrections.len(), 1);
        assert_eq!(session.bookmarks[0].correction_index, 0);
        assert_eq!(session.bookmarks[0].frame, 2);

        // The sample after a bookmark is a full resync
        capture(&mut manager, &host, 2);
        let session = manager.session(P).unwrap();
        assert_eq!(session.frames[3].correction, CorrectionFlags::ALL);
        assert!(!session.frames[4].correction.has_correction());
        assert_eq!(session.corrections.len(), 2);
    }

    #[test]
    fn test_bookmark_backfills_weapon() {
        let mut host = MockSimulationHost::new();
        host.expect_is_controllable().return_const(true);
        host.expect_actor_state()
            .return_const(Some(ActorState::default()));
        host.expect_active_item().return_const(None::<ActiveItem>);

        let mut manager = RecordManager::default();
        manager.start(&host, P, "run", "", None).unwrap();
        assert!(manager.capture_frame(&host, P, 0, Vec3::ZERO, Angles::default()));

        host.checkpoint();
        host.expect_actor_state()
            .return_const(Some(ActorState::default()));
        host.expect_active_item().return_const(Some(ActiveItem {
            id: 7,
            identifier: "weapon_knife".to_string(),
        }));

        manager.save_bookmark(&host, P, "b").unwrap();
        let frame = &manager.session(P).unwrap().frames[0];
        assert_eq!(frame.new_weapon.as_deref(), Some("weapon_knife"));
    }

    #[test]
    fn test_stop_discard_and_save() {
        let dir = TempDir::new().unwrap();
        let mut catalog = Catalog::new(dir.path(), "rec");
        let host = host_with_player().with_clock(1234);
        let mut manager = RecordManager::default();

        assert!(matches!(
            manager.stop(&host, &mut catalog, P, true),
            Err(MimicError::NotRecording(_))
        ));

        manager.start(&host, P, "tossed", "", None).unwrap();
        assert_eq!(manager.stop(&host, &mut catalog, P, false).unwrap(), None);
        assert!(!manager.is_recording(P));

        manager.start(&host, P, "kept", "routes", Some("a")).unwrap();
        capture(&mut manager, &host, 3);
        let path = manager.stop(&host, &mut catalog, P, true).unwrap().unwrap();

        assert_eq!(path, dir.path().join("routes/map/a/1234.rec"));
        assert_eq!(catalog.header(&path).unwrap().name, "kept");
        assert_eq!(catalog.header(&path).unwrap().frame_count, 3);
        assert_eq!(catalog.category(&path), Some("routes"));
    }

    #[test]
    fn test_failed_save_frees_session() {
        let dir = TempDir::new().unwrap();
        // A file where the category directory should be
        std::fs::write(dir.path().join("default"), b"x").unwrap();
        let mut catalog = Catalog::new(dir.path(), "rec");
        let host = host_with_player();
        let mut manager = RecordManager::default();

        manager.start(&host, P, "run", "", None).unwrap();
        capture(&mut manager, &host, 1);
        let err = manager.stop(&host, &mut catalog, P, true).unwrap_err();
        assert!(matches!(err, MimicError::BadFile(_)));
        assert!(!manager.is_recording(P));
        assert!(catalog.is_empty());
    }

    #[test]
    fn test_background_save() {
        let dir = TempDir::new().unwrap();
        let mut catalog = Catalog::new(dir.path(), "rec");
        let host = host_with_player().with_clock(99);
        let settings = RecordingSettings {
            save_mode: SaveMode::Background,
            ..Default::default()
        };
        let mut manager = RecordManager::new(settings, "default");
        assert!(manager.saves_in_background());

        manager.start(&host, P, "bg", "", None).unwrap();
        capture(&mut manager, &host, 2);
        let path = manager.stop(&host, &mut catalog, P, true).unwrap().unwrap();

        let mut completions = Vec::new();
        for _ in 0..200 {
            completions.extend(manager.poll_saves(&mut catalog));
            if !completions.is_empty() {
                break;
            }
            std::thread::sleep(std::time::Duration::from_millis(10));
        }

        assert_eq!(completions.len(), 1);
        assert!(completions[0].result.is_ok());
        assert_eq!(catalog.header(&path).unwrap().name, "bg");
    }

    #[test]
    fn test_background_saves_in_one_second_get_distinct_paths() {
        let dir = TempDir::new().unwrap();
        let mut catalog = Catalog::new(dir.path(), "rec");
        let host = host_with_player().with_clock(99);
        let settings = RecordingSettings {
            save_mode: SaveMode::Background,
            ..Default::default()
        };
        let mut manager = RecordManager::new(settings, "default");

        let mut paths = Vec::new();
        for name in ["one", "two"] {
            manager.start(&host, P, name, "", None).unwrap();
            capture(&mut manager, &host, 2);
            paths.push(manager.stop(&host, &mut catalog, P, true).unwrap().unwrap());
        }
        assert_ne!(paths[0], paths[1]);

        let mut completions = Vec::new();
        for _ in 0..200 {
            completions.extend(manager.poll_saves(&mut catalog));
            if completions.len() == 2 {
                break;
            }
            std::thread::sleep(std::time::Duration::from_millis(10));
        }

        assert_eq!(completions.len(), 2);
        assert_eq!(catalog.header(&paths[0]).unwrap().name, "one");
        assert_eq!(catalog.header(&paths[1]).unwrap().name, "two");
        // Both writes landed, so the base name is only skipped because the file exists
        assert_eq!(
            catalog.record_path("default", "map", None, 99),
            dir.path().join("default/map/99_2.rec")
        );
    }
}
