//! Evaluation-phase analysis for genomes.
//!
//! Networks are evaluated in three fixed phases (inputs, then hidden nodes in
//! genome order, then outputs) without any topological sort. An enabled
//! connection only carries a fresh value when its source is evaluated before
//! its target in that order and its source actually propagates. Every other
//! edge reads the zero left by the previous reset. This module finds those
//! edges so construction can report them; evaluation never consults it.

use std::collections::HashMap;

use crate::gene::{ConnectionGene, NodeId, NodeRole};
use crate::genome::Genome;

/// Evaluation phase of a node, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Phase {
    Input,
    Hidden,
    Output,
}

impl From<NodeRole> for Phase {
    fn from(role: NodeRole) -> Self {
        match role {
            NodeRole::Input => Self::Input,
            NodeRole::Hidden => Self::Hidden,
            NodeRole::Output => Self::Output,
        }
    }
}

/// Position of a node in the three-phase pass. Ordering follows execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EvalSlot {
    /// Phase the node is evaluated in.
    pub phase: Phase,
    /// Index within the phase's node list.
    pub position: usize,
}

/// Why an enabled connection never transports a live value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeDefect {
    /// The target is evaluated before (or together with) the source, or the
    /// source is an output node, which never propagates.
    Stale,
    /// The target is an input node; inputs ignore incoming connections.
    Unread,
}

/// An enabled connection the three-phase pass cannot honour.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhaseViolation {
    /// Innovation number of the offending connection.
    pub innovation: u64,
    pub source: NodeId,
    pub target: NodeId,
    pub defect: EdgeDefect,
}

/// Evaluation slot of every node of one genome.
#[derive(Debug, Clone, Default)]
pub struct PhaseOrder {
    slots: HashMap<NodeId, EvalSlot>,
}

impl PhaseOrder {
    /// Assign slots in genome order, counting positions per phase.
    #[must_use]
    pub fn from_genome(genome: &Genome) -> Self {
        let mut counts: HashMap<Phase, usize> = HashMap::with_capacity(3);
        let slots = genome
            .nodes
            .iter()
            .map(|node| {
                let phase = Phase::from(node.role);
                let position = counts.entry(phase).or_insert(0);
                let slot = EvalSlot {
                    phase,
                    position: *position,
                };
                *position += 1;
                (node.id, slot)
            })
            .collect();
        Self { slots }
    }

    /// Slot of a node, if the node exists.
    #[must_use]
    pub fn slot(&self, id: NodeId) -> Option<EvalSlot> {
        self.slots.get(&id).copied()
    }

    /// Classify one connection. `None` means the edge carries a live value
    /// (or names a node this order does not know).
    #[must_use]
    pub fn defect(&self, conn: &ConnectionGene) -> Option<EdgeDefect> {
        let source = self.slot(conn.source)?;
        let target = self.slot(conn.target)?;

        if target.phase == Phase::Input {
            Some(EdgeDefect::Unread)
        } else if conn.is_self_loop() || source.phase == Phase::Output || source > target {
            Some(EdgeDefect::Stale)
        } else {
            None
        }
    }

    /// All enabled connections of `genome` that the pass reads stale or not at all.
    #[must_use]
    pub fn violations(&self, genome: &Genome) -> Vec<PhaseViolation> {
        genome
            .connections
            .iter()
            .filter(|c| c.enabled)
            .filter_map(|c| {
                self.defect(c).map(|defect| PhaseViolation {
                    innovation: c.innovation,
                    source: c.source,
                    target: c.target,
                    defect,
                })
            })
            .collect()
    }
}

/// True when every enabled connection of `genome` is honoured by the
/// three-phase pass.
#[must_use]
pub fn is_phase_ordered(genome: &Genome) -> bool {
    PhaseOrder::from_genome(genome).violations(genome).is_empty()
}
