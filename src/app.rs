//! Application module
//!
//! [`MimicApp`] owns the catalog, both session managers and the pending
//! proxy assignments, and is the single entry point a host binding talks to:
//! the public record/playback operations plus lifecycle hooks (tick, spawn,
//! death, disconnect, map start).
//!
//! Notifications are published as [`MimicEvent`]s on a crossbeam channel
//! obtained from [`MimicApp::subscribe`].
//!
//! # Example
//!
//! ```ignore
//! let mut app = MimicApp::new(MimicConfig::load_or_default())?;
//! let events = app.subscribe();
//!
//! app.on_map_start(&host);
//! app.start_recording(&host, player, "a-long", "", None)?;
//!
//! // every simulation tick
//! for (bot, tick) in app.on_tick(&mut host, &inputs) {
//!     host.set_buttons(bot, tick.frame.buttons);
//! }
//! ```

use std::path::{Path, PathBuf};

use crossbeam_channel::{unbounded, Receiver, Sender};

use crate::catalog::Catalog;
use crate::config::MimicConfig;
use crate::error::{MimicError, Result};
use crate::host::SimulationHost;
use crate::session::{
    AssignmentPoll, MimicEvent, PlaybackManager, PlaybackTick, ProxyAssignment, RecordManager,
};
use crate::types::{ActorId, Angles, Vec3};

/// Input sampled for one actor on one tick
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TickInput {
    pub actor: ActorId,
    pub buttons: u64,
    pub predicted_velocity: Vec3,
    pub predicted_angles: Angles,
}

/// Recording and playback facade
#[derive(Debug)]
pub struct MimicApp {
    config: MimicConfig,
    catalog: Catalog,
    recorder: RecordManager,
    player: PlaybackManager,
    assignments: Vec<ProxyAssignment>,
    events: Option<Sender<MimicEvent>>,
}

impl MimicApp {
    /// Create the app from a configuration
    pub fn new(config: MimicConfig) -> Result<Self> {
        let record_dir = config.record_dir()?;
        tracing::info!("Using record directory {}", record_dir.display());

        let catalog = Catalog::new(record_dir, config.storage.extension.clone());
        let recorder = RecordManager::new(
            config.recording.clone(),
            config.storage.default_category.clone(),
        );
        let player = PlaybackManager::new(config.playback.clone());

        Ok(Self {
            config,
            catalog,
            recorder,
            player,
            assignments: Vec::new(),
            events: None,
        })
    }

    /// Receive events from now on. A new subscription replaces the previous one.
    pub fn subscribe(&mut self) -> Receiver<MimicEvent> {
        let (tx, rx) = unbounded();
        self.events = Some(tx);
        rx
    }

    pub fn config(&self) -> &MimicConfig {
        &self.config
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn catalog_mut(&mut self) -> &mut Catalog {
        &mut self.catalog
    }

    pub fn recorder(&self) -> &RecordManager {
        &self.recorder
    }

    pub fn player(&self) -> &PlaybackManager {
        &self.player
    }

    /// Direct access, e.g. to play a record that only exists in memory
    pub fn player_mut(&mut self) -> &mut PlaybackManager {
        &mut self.player
    }

    /// Proxy assignments still waiting for a proxy
    pub fn pending_assignments(&self) -> &[ProxyAssignment] {
        &self.assignments
    }

    fn emit(&self, event: MimicEvent) {
        if let Some(tx) = &self.events {
            // A dropped receiver just means nobody is listening
            let _ = tx.send(event);
        }
    }

    // ==================== Recording ====================

    pub fn start_recording(
        &mut self,
        host: &dyn SimulationHost,
        actor: ActorId,
        name: &str,
        category: &str,
        subdir: Option<&str>,
    ) -> Result<()> {
        self.recorder.start(host, actor, name, category, subdir)?;
        let name = self
            .recorder
            .session(actor)
            .map(|s| s.name.clone())
            .unwrap_or_default();
        self.emit(MimicEvent::RecordingStarted { actor, name });
        Ok(())
    }

    pub fn pause_recording(&mut self, actor: ActorId) -> Result<()> {
        self.recorder.pause(actor)
    }

    pub fn resume_recording(&mut self, actor: ActorId) -> Result<()> {
        self.recorder.resume(actor)
    }

    pub fn save_bookmark(
        &mut self,
        host: &dyn SimulationHost,
        actor: ActorId,
        name: &str,
    ) -> Result<u32> {
        let frame = self.recorder.save_bookmark(host, actor, name)?;
        let name = self
            .recorder
            .session(actor)
            .and_then(|s| s.bookmarks.last())
            .map(|b| b.name.clone())
            .unwrap_or_default();
        self.emit(MimicEvent::BookmarkSaved { actor, name, frame });
        Ok(frame)
    }

    /// Stop recording, saving or discarding the buffer
    ///
    /// In background save mode `RecordingSaved` is emitted from a later
    /// [`on_tick`](Self::on_tick) once the write completes.
    pub fn stop_recording(
        &mut self,
        host: &mut dyn SimulationHost,
        actor: ActorId,
        save: bool,
    ) -> Result<Option<PathBuf>> {
        match self.recorder.stop(&*host, &mut self.catalog, actor, save) {
            Ok(None) => {
                self.emit(MimicEvent::RecordingDiscarded { actor });
                Ok(None)
            }
            Ok(Some(path)) => {
                if !self.recorder.saves_in_background() {
                    host.print(Some(actor), "Recording saved!");
                    self.emit(MimicEvent::RecordingSaved {
                        actor,
                        path: path.clone(),
                    });
                }
                Ok(Some(path))
            }
            Err(e @ MimicError::NotRecording(_)) => Err(e),
            Err(e) => {
                host.print(Some(actor), &format!("Failed to save recording: {}", e));
                self.emit(MimicEvent::SaveFailed {
                    actor,
                    error: e.to_string(),
                });
                Err(e)
            }
        }
    }

    // ==================== Playback ====================

    pub fn play_from_path(
        &mut self,
        host: &dyn SimulationHost,
        actor: ActorId,
        path: &Path,
        force_reload: bool,
    ) -> Result<()> {
        self.player
            .play_from_path(host, &mut self.catalog, actor, path, force_reload)?;
        self.emit(MimicEvent::PlaybackStarted {
            actor,
            path: path.to_path_buf(),
        });
        Ok(())
    }

    /// Play the newest record with this name
    pub fn play_by_name(
        &mut self,
        host: &dyn SimulationHost,
        actor: ActorId,
        name: &str,
    ) -> Result<()> {
        self.player
            .play_by_name(host, &mut self.catalog, actor, name)?;
        if let Some(path) = self.player.record_path_of(actor) {
            self.emit(MimicEvent::PlaybackStarted {
                actor,
                path: path.to_path_buf(),
            });
        }
        Ok(())
    }

    pub fn stop_mimic(&mut self, actor: ActorId) -> bool {
        let stopped = self.player.stop(actor);
        if stopped {
            self.emit(MimicEvent::PlaybackStopped { actor });
        }
        stopped
    }

    pub fn reset_playback(&mut self, actor: ActorId) -> Result<()> {
        self.player.reset(actor)
    }

    pub fn seek_to_bookmark(&mut self, actor: ActorId, name: &str) -> Result<u32> {
        self.player.seek_to_bookmark(actor, name)
    }

    /// Queue playback of `path` on the next idle proxy of `group`
    ///
    /// `None` uses the configured proxy group.
    pub fn assign_to_new_proxy(&mut self, path: PathBuf, group: Option<&str>) {
        let group = group.unwrap_or(&self.config.proxy.group).to_string();
        tracing::info!(
            "Waiting for a '{}' proxy to play {}",
            group,
            path.display()
        );
        self.assignments
            .push(ProxyAssignment::new(path, group, &self.config.proxy));
    }

    // ==================== Catalog ====================

    /// Delete a record file and evict it from the catalog
    pub fn delete_record(&mut self, path: &Path) -> bool {
        self.catalog.delete(path)
    }

    pub fn list_categories(&self) -> &[String] {
        self.catalog.list_categories()
    }

    pub fn list_records(&self, category: &str) -> Vec<&Path> {
        self.catalog.list_records(category)
    }

    // ==================== Lifecycle Hooks ====================

    /// Reload the catalog for the host's current map
    pub fn on_map_start(&mut self, host: &dyn SimulationHost) -> usize {
        let map = host.map_name();
        tracing::info!("Map started: {}, loading records", map);
        self.catalog.clear();
        self.catalog.scan(&map)
    }

    /// A proxy that respawns while mimicking starts over
    pub fn on_actor_spawn(&mut self, actor: ActorId) {
        if self.player.is_mimicking(actor) {
            let _ = self.player.reset(actor);
        }
    }

    /// Dying ends a recording (saved) and any playback
    pub fn on_actor_death(&mut self, host: &mut dyn SimulationHost, actor: ActorId) {
        if self.recorder.is_recording(actor)
            && self.stop_recording(host, actor, true).is_ok()
        {
            host.print(Some(actor), "Recording stopped due to death.");
        }
        self.stop_mimic(actor);
    }

    /// Leaving discards a recording and ends any playback
    pub fn on_actor_disconnect(&mut self, host: &mut dyn SimulationHost, actor: ActorId) {
        if self.recorder.is_recording(actor) {
            let _ = self.stop_recording(host, actor, false);
        }
        self.stop_mimic(actor);
    }

    /// Advance everything by one simulation tick
    ///
    /// Captures a frame for every recording actor (using its entry in
    /// `inputs`, or the host's current velocity and angles when absent),
    /// applies one playback frame to every mimicking actor, advances proxy
    /// assignments and collects finished background saves. Returns the
    /// applied playback frames; the caller feeds their buttons to the
    /// proxies.
    pub fn on_tick(
        &mut self,
        host: &mut dyn SimulationHost,
        inputs: &[TickInput],
    ) -> Vec<(ActorId, PlaybackTick)> {
        for actor in self.recorder.actors() {
            let input = inputs.iter().find(|i| i.actor == actor).copied().or_else(|| {
                host.actor_state(actor).map(|s| TickInput {
                    actor,
                    buttons: 0,
                    predicted_velocity: s.velocity,
                    predicted_angles: s.angles,
                })
            });
            if let Some(input) = input {
                self.recorder.capture_frame(
                    &*host,
                    actor,
                    input.buttons,
                    input.predicted_velocity,
                    input.predicted_angles,
                );
            }
        }

        let mut applied = Vec::new();
        for actor in self.player.actors() {
            match self.player.tick(host, actor) {
                Some(tick) => {
                    if tick.looped {
                        self.emit(MimicEvent::Looped { actor });
                    }
                    if let Some(name) = &tick.bookmark_reached {
                        if self.config.playback.announce_bookmarks {
                            host.print(None, &format!("{} reached bookmark '{}'", actor, name));
                        }
                        self.emit(MimicEvent::BookmarkReached {
                            actor,
                            name: name.clone(),
                            tick: tick.tick,
                        });
                    }
                    applied.push((actor, tick));
                }
                None if !self.player.is_mimicking(actor) => {
                    self.emit(MimicEvent::PlaybackStopped { actor });
                }
                None => {}
            }
        }

        self.poll_assignments(&*host);
        self.poll_saves(host);
        applied
    }

    fn poll_assignments(&mut self, host: &dyn SimulationHost) {
        let mut waiting = Vec::with_capacity(self.assignments.len());

        for mut assignment in std::mem::take(&mut self.assignments) {
            match assignment.poll(host, &mut self.catalog, &mut self.player) {
                AssignmentPoll::Waiting => waiting.push(assignment),
                AssignmentPoll::Assigned(actor) => {
                    tracing::info!(
                        "Assigned {} to {}",
                        assignment.record_path.display(),
                        actor
                    );
                    self.emit(MimicEvent::PlaybackStarted {
                        actor,
                        path: assignment.record_path.clone(),
                    });
                    self.emit(MimicEvent::ProxyAssigned {
                        actor,
                        path: assignment.record_path,
                    });
                }
                AssignmentPoll::Exhausted => {
                    tracing::warn!(
                        "No '{}' proxy became available for {} after {} attempts",
                        assignment.group,
                        assignment.record_path.display(),
                        assignment.attempts()
                    );
                    self.emit(MimicEvent::ProxyAssignmentFailed {
                        attempts: assignment.attempts(),
                        path: assignment.record_path,
                    });
                }
                AssignmentPoll::Failed(e) => {
                    tracing::error!(
                        "Cannot assign {}: {}",
                        assignment.record_path.display(),
                        e
                    );
                    self.emit(MimicEvent::ProxyAssignmentFailed {
                        attempts: assignment.attempts(),
                        path: assignment.record_path,
                    });
                }
            }
        }

        self.assignments = waiting;
    }

    fn poll_saves(&mut self, host: &mut dyn SimulationHost) {
        for done in self.recorder.poll_saves(&mut self.catalog) {
            match done.result {
                Ok(()) => {
                    host.print(Some(done.actor), "Recording saved!");
                    self.emit(MimicEvent::RecordingSaved {
                        actor: done.actor,
                        path: done.path,
                    });
                }
                Err(e) => {
                    host.print(Some(done.actor), &format!("Failed to save recording: {}", e));
                    self.emit(MimicEvent::SaveFailed {
                        actor: done.actor,
                        error: e.to_string(),
                    });
                }
            }
        }
    }

    /// Drop all sessions and pending assignments
    pub fn clear_all(&mut self) {
        self.recorder.clear_all();
        self.player.clear_all();
        self.assignments.clear();
    }
}
