//! Tick-driven proxy assignment
//!
//! A freshly requested proxy usually does not exist yet, or has no body for
//! a few ticks after spawning. A [`ProxyAssignment`] waits an initial delay,
//! then tries the host's idle proxies of a group every few ticks until one
//! accepts the record or the attempt budget runs out. It is advanced from
//! the host tick; there are no timers.

use std::path::PathBuf;

use crate::catalog::Catalog;
use crate::config::ProxySettings;
use crate::error::MimicError;
use crate::host::SimulationHost;
use crate::types::ActorId;

use super::player::PlaybackManager;

/// Result of advancing an assignment by one tick
#[derive(Debug)]
pub enum AssignmentPoll {
    /// Not attempted this tick, or no proxy was ready
    Waiting,
    /// Playback started on this proxy
    Assigned(ActorId),
    /// Attempt budget used up without a usable proxy
    Exhausted,
    /// The record itself cannot be played; retrying will not help
    Failed(MimicError),
}

/// A pending request to play a record on the next available proxy
#[derive(Debug, Clone)]
pub struct ProxyAssignment {
    pub record_path: PathBuf,
    pub group: String,
    countdown: u32,
    retry_interval_ticks: u32,
    attempts: u32,
    max_attempts: u32,
}

impl ProxyAssignment {
    pub fn new(record_path: PathBuf, group: impl Into<String>, settings: &ProxySettings) -> Self {
        Self {
            record_path,
            group: group.into(),
            countdown: settings.initial_delay_ticks,
            retry_interval_ticks: settings.retry_interval_ticks,
            attempts: 0,
            max_attempts: settings.max_attempts.max(1),
        }
    }

    /// Attempts made so far
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Advance one tick
    pub fn poll(
        &mut self,
        host: &dyn SimulationHost,
        catalog: &mut Catalog,
        player: &mut PlaybackManager,
    ) -> AssignmentPoll {
        if self.countdown > 0 {
            self.countdown -= 1;
            return AssignmentPoll::Waiting;
        }

        self.attempts += 1;
        tracing::debug!(
            "Attempt {}/{} to assign {} to a '{}' proxy",
            self.attempts,
            self.max_attempts,
            self.record_path.display(),
            self.group
        );

        let candidates: Vec<ActorId> = host
            .idle_proxies(&self.group)
            .into_iter()
            .filter(|actor| !player.is_mimicking(*actor))
            .collect();

        for actor in candidates {
            match player.play_from_path(host, catalog, actor, &self.record_path, true) {
                Ok(()) => return AssignmentPoll::Assigned(actor),
                Err(MimicError::NotControllable(_)) => {
                    tracing::debug!("{} not ready yet, will retry", actor);
                }
                Err(e) => return AssignmentPoll::Failed(e),
            }
        }

        if self.attempts >= self.max_attempts {
            return AssignmentPoll::Exhausted;
        }
        self.countdown = self.retry_interval_ticks;
        AssignmentPoll::Waiting
    }
}
