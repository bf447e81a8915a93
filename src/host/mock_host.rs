//! Mock Host Implementation for Testing
//!
//! This module provides an in-memory simulation host that can be used to
//! exercise recording and playback without a game server. Actors are plain
//! structs with a kinematic state and an inventory.
//!
//! # Features
//!
//! - **Players and proxies**: Players can be recorded, proxies can be driven
//! - **Inventories**: Items get stable ids, so switches are detectable
//! - **Scripted motion**: [`MockHost::step`] integrates velocity into origin
//! - **Inspection**: Teleport counters and an operator message log
//!
//! # Example
//!
//! ```ignore
//! use mimic_rs::host::MockHost;
//! use mimic_rs::types::{ActorId, Vec3};
//!
//! let mut host = MockHost::new("de_dust2");
//! host.add_player(ActorId(1)).set_velocity(Vec3::new(250.0, 0.0, 0.0));
//! host.add_proxy(ActorId(2), "t");
//!
//! host.step(1.0 / 64.0);
//! ```

use std::collections::BTreeMap;

use super::host_trait::{ActiveItem, ActorState, SimulationHost};
use crate::types::{ActorId, Angles, Vec3};

/// An item owned by a mock actor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockItem {
    pub id: u32,
    pub identifier: String,
}

/// A simulated actor
#[derive(Debug, Clone, Default)]
pub struct MockActor {
    pub state: ActorState,
    pub alive: bool,
    pub proxy: bool,
    /// Proxy group (e.g. a team) used by [`SimulationHost::idle_proxies`]
    pub group: String,
    pub inventory: Vec<MockItem>,
    active: Option<u32>,
    /// Number of teleport calls received
    pub teleports: usize,
}

impl MockActor {
    pub fn set_origin(&mut self, origin: Vec3) -> &mut Self {
        self.state.origin = origin;
        self
    }

    pub fn set_velocity(&mut self, velocity: Vec3) -> &mut Self {
        self.state.velocity = velocity;
        self
    }

    pub fn set_angles(&mut self, angles: Angles) -> &mut Self {
        self.state.angles = angles;
        self
    }

    pub fn set_alive(&mut self, alive: bool) -> &mut Self {
        self.alive = alive;
        self
    }

    /// Identifier of the active item
    pub fn active_identifier(&self) -> Option<&str> {
        let id = self.active?;
        self.inventory
            .iter()
            .find(|item| item.id == id)
            .map(|item| item.identifier.as_str())
    }

    pub fn owns(&self, identifier: &str) -> bool {
        self.inventory
            .iter()
            .any(|item| item.identifier.eq_ignore_ascii_case(identifier))
    }
}

/// In-memory [`SimulationHost`]
#[derive(Debug)]
pub struct MockHost {
    actors: BTreeMap<ActorId, MockActor>,
    map_name: String,
    clock: i32,
    next_item_id: u32,
    /// Messages sent through [`SimulationHost::print`]
    pub messages: Vec<(Option<ActorId>, String)>,
}

impl MockHost {
    /// Create a new mock host on `map_name`
    pub fn new(map_name: impl Into<String>) -> Self {
        Self {
            actors: BTreeMap::new(),
            map_name: map_name.into(),
            clock: 1_700_000_000,
            next_item_id: 1,
            messages: Vec::new(),
        }
    }

    /// Set the clock returned by [`SimulationHost::now`]
    pub fn with_clock(mut self, now: i32) -> Self {
        self.clock = now;
        self
    }

    pub fn advance_clock(&mut self, secs: i32) {
        self.clock += secs;
    }

    /// Add a living human-controlled actor
    pub fn add_player(&mut self, id: ActorId) -> &mut MockActor {
        self.actors.insert(
            id,
            MockActor {
                alive: true,
                ..Default::default()
            },
        );
        self.actors.entry(id).or_default()
    }

    /// Add a living proxy (bot) actor in `group`
    pub fn add_proxy(&mut self, id: ActorId, group: &str) -> &mut MockActor {
        self.actors.insert(
            id,
            MockActor {
                alive: true,
                proxy: true,
                group: group.to_string(),
                ..Default::default()
            },
        );
        self.actors.entry(id).or_default()
    }

    pub fn actor(&self, id: ActorId) -> Option<&MockActor> {
        self.actors.get(&id)
    }

    pub fn actor_mut(&mut self, id: ActorId) -> Option<&mut MockActor> {
        self.actors.get_mut(&id)
    }

    /// Give an item and make it active, as a player picking it up would
    pub fn equip(&mut self, id: ActorId, identifier: &str) {
        self.give_item(id, identifier);
        self.select_item(id, identifier);
    }

    /// Integrate every living actor's velocity over `dt` seconds
    pub fn step(&mut self, dt: f32) {
        for actor in self.actors.values_mut().filter(|a| a.alive) {
            let v = actor.state.velocity;
            actor.state.origin.x += v.x * dt;
            actor.state.origin.y += v.y * dt;
            actor.state.origin.z += v.z * dt;
        }
    }
}

impl SimulationHost for MockHost {
    fn is_controllable(&self, actor: ActorId) -> bool {
        self.actors.get(&actor).is_some_and(|a| a.alive)
    }

    fn can_drive_as_proxy(&self, actor: ActorId) -> bool {
        self.actors.get(&actor).is_some_and(|a| a.alive && a.proxy)
    }

    fn actor_state(&self, actor: ActorId) -> Option<ActorState> {
        self.actors
            .get(&actor)
            .filter(|a| a.alive)
            .map(|a| a.state)
    }

    fn teleport(
        &mut self,
        actor: ActorId,
        origin: Option<Vec3>,
        angles: Option<Angles>,
        velocity: Option<Vec3>,
    ) {
        let Some(a) = self.actors.get_mut(&actor) else {
            return;
        };
        if let Some(origin) = origin {
            a.state.origin = origin;
        }
        if let Some(angles) = angles {
            a.state.angles = angles;
        }
        if let Some(velocity) = velocity {
            a.state.velocity = velocity;
        }
        a.teleports += 1;
    }

    fn active_item(&self, actor: ActorId) -> Option<ActiveItem> {
        let a = self.actors.get(&actor)?;
        let id = a.active?;
        a.inventory
            .iter()
            .find(|item| item.id == id)
            .map(|item| ActiveItem {
                id: item.id,
                identifier: item.identifier.clone(),
            })
    }

    fn has_item(&self, actor: ActorId, identifier: &str) -> bool {
        self.actors.get(&actor).is_some_and(|a| a.owns(identifier))
    }

    fn give_item(&mut self, actor: ActorId, identifier: &str) {
        let id = self.next_item_id;
        if let Some(a) = self.actors.get_mut(&actor) {
            a.inventory.push(MockItem {
                id,
                identifier: identifier.to_string(),
            });
            self.next_item_id += 1;
        }
    }

    fn select_item(&mut self, actor: ActorId, identifier: &str) -> bool {
        let Some(a) = self.actors.get_mut(&actor) else {
            return false;
        };
        match a
            .inventory
            .iter()
            .find(|item| item.identifier.eq_ignore_ascii_case(identifier))
        {
            Some(item) => {
                a.active = Some(item.id);
                true
            }
            None => false,
        }
    }

    fn map_name(&self) -> String {
        self.map_name.clone()
    }

    fn idle_proxies(&self, group: &str) -> Vec<ActorId> {
        self.actors
            .iter()
            .filter(|(_, a)| a.alive && a.proxy && a.group.eq_ignore_ascii_case(group))
            .map(|(id, _)| *id)
            .collect()
    }

    fn now(&self) -> i32 {
        self.clock
    }

    fn print(&mut self, actor: Option<ActorId>, message: &str) {
        self.messages.push((actor, message.to_string()));
    }
}
