//! The host simulation seen from the engine.
//!
//! Physics, ray casting, placement and body lifecycle belong to the host. The
//! engine reaches them only through the [`World`] trait, once per agent per
//! tick, and learns about removals by asking whether a handle is still present.

use serde::{Deserialize, Serialize};
use slotmap::new_key_type;

use crate::agent::MotorCommand;

new_key_type! {
    /// Handle of an agent's body in the host world.
    ///
    /// A slotmap key, so hosts can keep bodies in a `SlotMap<AgentHandle, _>`
    /// and answer presence queries with `contains_key`.
    pub struct AgentHandle;
}

/// A collision reported by the host for one agent since the last tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Contact {
    /// The agent consumed a resource. Respawning it is up to the host.
    Reward,
    /// The agent touched a hazard such as a wall.
    Hazard,
}

/// Collaborator interface implemented by the host simulation.
pub trait World {
    /// Place a new body for the agent at `population_index` and return its handle.
    fn spawn(&mut self, population_index: usize) -> AgentHandle;

    /// Whether the body behind `handle` still exists.
    fn is_present(&self, handle: AgentHandle) -> bool;

    /// Remove the body behind `handle`. Unknown handles are ignored.
    fn despawn(&mut self, handle: AgentHandle);

    /// Cast one ray per entry of `offsets` (radians relative to the body's
    /// heading) and write the hit distance, or `None` when nothing lies within
    /// `max_distance`, into the matching slot of `hits`.
    fn cast_rays(
        &mut self,
        handle: AgentHandle,
        offsets: &[f32],
        max_distance: f32,
        hits: &mut [Option<f32>],
    );

    /// Hand this tick's motor command to the movement integrator.
    fn apply_motor(&mut self, handle: AgentHandle, command: MotorCommand);

    /// Collisions the body experienced since the previous call.
    fn take_contacts(&mut self, handle: AgentHandle) -> Vec<Contact>;
}
