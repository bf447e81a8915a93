//! Host simulation interface
//!
//! The simulation that owns the actors is an external collaborator. This
//! module defines the [`SimulationHost`] trait the core talks to, and a
//! [`MockHost`] implementation used by tests, benches and the CLI.

pub mod host_trait;
pub mod mock_host;

pub use host_trait::{ActiveItem, ActorState, SimulationHost};
pub use mock_host::{MockActor, MockHost, MockItem};

#[cfg(test)]
pub use host_trait::MockSimulationHost;
