//! SimulationHost trait for the host simulation interface
//!
//! The recorder and player never touch the simulation directly. Everything
//! they need (reading and forcing actor state, inventory queries, the clock,
//! operator feedback) goes through this trait, so a game-server binding and
//! the in-memory [`MockHost`](super::MockHost) are interchangeable.

use crate::types::{ActorId, Angles, Vec3};

/// Ground-truth kinematic state of an actor
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ActorState {
    pub origin: Vec3,
    /// Eye angles
    pub angles: Angles,
    pub velocity: Vec3,
}

/// The item an actor currently holds
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveItem {
    /// Stable per-instance id, used to detect item switches
    pub id: u32,
    /// Identifier stored in records and used to give/select the item on a proxy
    pub identifier: String,
}

/// Capabilities the core requires from the host simulation
///
/// All calls happen synchronously from the host's tick callback.
///
/// # Example
///
/// ```ignore
/// fn snap_to_spawn(host: &mut dyn SimulationHost, actor: ActorId, spawn: Vec3) {
///     host.teleport(actor, Some(spawn), None, Some(Vec3::ZERO));
/// }
/// ```
#[cfg_attr(test, mockall::automock)]
pub trait SimulationHost {
    /// Whether the actor is alive and has a body that can be sampled
    fn is_controllable(&self, actor: ActorId) -> bool;

    /// Whether the actor may be driven as a proxy (e.g. it is a bot)
    fn can_drive_as_proxy(&self, actor: ActorId) -> bool;

    /// Current origin, eye angles and velocity, or `None` without a body
    fn actor_state(&self, actor: ActorId) -> Option<ActorState>;

    /// Atomically overwrite any subset of origin, angles and velocity
    fn teleport(
        &mut self,
        actor: ActorId,
        origin: Option<Vec3>,
        angles: Option<Angles>,
        velocity: Option<Vec3>,
    );

    /// The item the actor currently holds
    fn active_item(&self, actor: ActorId) -> Option<ActiveItem>;

    /// Whether the actor's inventory contains an item with this identifier
    fn has_item(&self, actor: ActorId, identifier: &str) -> bool;

    /// Add an item to the actor's inventory
    fn give_item(&mut self, actor: ActorId, identifier: &str);

    /// Make an owned item active. Returns false if the actor does not own it.
    fn select_item(&mut self, actor: ActorId, identifier: &str) -> bool;

    /// Name of the currently loaded map, used in record paths
    fn map_name(&self) -> String;

    /// Proxies in `group` that exist, have a body and can be driven
    fn idle_proxies(&self, group: &str) -> Vec<ActorId>;

    /// Wall clock in Unix seconds, used as the record end time
    fn now(&self) -> i32 {
        chrono::Utc::now().timestamp() as i32
    }

    /// Text channel for operator feedback
    fn print(&mut self, _actor: Option<ActorId>, _message: &str) {}
}
