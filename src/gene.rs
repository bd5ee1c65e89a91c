//! Gene types for genomes.
//!
//! This module defines the declarative building blocks of a network:
//! - [`NodeGene`]: identity and role of one neuron
//! - [`ConnectionGene`]: a weighted edge between two node ids

use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifier of a node within one genome.
///
/// Connections refer to their endpoints by id rather than by reference, so a
/// genome can be cloned and serialized independently of any runtime network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub u32);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// The role of a node in the network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeRole {
    /// Receives one sensor reading per forward pass.
    Input,
    /// Produces one network output per forward pass.
    Output,
    /// Internal node between inputs and outputs.
    Hidden,
}

/// A node gene: an id and the role that decides its evaluation phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeGene {
    /// Unique id within the owning genome.
    pub id: NodeId,
    /// Role of this node.
    pub role: NodeRole,
}

impl NodeGene {
    /// Create a new input node.
    #[must_use]
    pub const fn input(id: u32) -> Self {
        Self {
            id: NodeId(id),
            role: NodeRole::Input,
        }
    }

    /// Create a new output node.
    #[must_use]
    pub const fn output(id: u32) -> Self {
        Self {
            id: NodeId(id),
            role: NodeRole::Output,
        }
    }

    /// Create a new hidden node.
    #[must_use]
    pub const fn hidden(id: u32) -> Self {
        Self {
            id: NodeId(id),
            role: NodeRole::Hidden,
        }
    }
}

/// A connection gene representing a weighted link between two nodes.
///
/// The connection does not own its endpoints; `source` and `target` must name
/// nodes of the same genome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionGene {
    /// Node feeding this connection.
    pub source: NodeId,
    /// Node this connection feeds.
    pub target: NodeId,
    /// The connection weight.
    pub weight: f32,
    /// Whether this connection is expressed.
    /// Disabled connections stay in the genome but are never built into a network.
    pub enabled: bool,
    /// Historical marker recording when this edge first appeared.
    /// Kept for genome alignment; evaluation never reads it.
    pub innovation: u64,
}

impl ConnectionGene {
    /// Create a new enabled connection.
    #[must_use]
    pub const fn new(source: NodeId, target: NodeId, weight: f32, innovation: u64) -> Self {
        Self {
            source,
            target,
            weight,
            enabled: true,
            innovation,
        }
    }

    /// Same connection with `enabled` cleared.
    #[must_use]
    pub const fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    /// True when source and target are the same node.
    #[must_use]
    pub fn is_self_loop(&self) -> bool {
        self.source == self.target
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_gene_creation() {
        let input = NodeGene::input(0);
        assert_eq!(input.role, NodeRole::Input);
        assert_eq!(input.id, NodeId(0));

        let output = NodeGene::output(3);
        assert_eq!(output.role, NodeRole::Output);

        let hidden = NodeGene::hidden(5);
        assert_eq!(hidden.role, NodeRole::Hidden);
        assert_eq!(hidden.id.to_string(), "#5");
    }

    #[test]
    fn test_connection_gene_creation() {
        let conn = ConnectionGene::new(NodeId(0), NodeId(3), 0.5, 7);
        assert_eq!(conn.source, NodeId(0));
        assert_eq!(conn.target, NodeId(3));
        assert!((conn.weight - 0.5).abs() < 1e-6);
        assert!(conn.enabled);
        assert_eq!(conn.innovation, 7);
        assert!(!conn.is_self_loop());

        let off = conn.disabled();
        assert!(!off.enabled);
        assert_eq!(off.innovation, 7);
    }

    #[test]
    fn test_node_id_serializes_as_integer() {
        let json = serde_json::to_string(&NodeGene::output(4)).unwrap();
        assert_eq!(json, r#"{"id":4,"role":"Output"}"#);
    }
}
