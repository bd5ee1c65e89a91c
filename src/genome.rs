//! Genome representation and initial genome construction.
//!
//! A [`Genome`] is plain data: an ordered list of node genes and a list of
//! connection genes that refer to nodes by [`NodeId`]. It holds no runtime
//! state and is never mutated by network construction or evaluation.

use std::collections::HashSet;

use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::gene::{ConnectionGene, NodeGene, NodeId, NodeRole};
use crate::innovation::InnovationCounter;

/// Number of random connections seeded into an initial genome.
pub const DEFAULT_INITIAL_CONNECTIONS: usize = 3;

/// Errors raised when building or validating genomes.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GenomeError {
    #[error("genome needs at least one input node")]
    EmptyInputs,
    #[error("genome needs at least one output node")]
    EmptyOutputs,
    #[error("requested {requested} nodes, more than a genome can number")]
    TooManyNodes { requested: usize },
    #[error("node id {id} appears more than once")]
    DuplicateNodeId { id: NodeId },
    #[error("connection {innovation} references missing node {missing}")]
    DanglingConnection { innovation: u64, missing: NodeId },
}

/// Shape of the genomes a population starts from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenomeConfig {
    /// Number of input nodes; must match the sensor count of the agents.
    pub input_count: usize,
    /// Number of output nodes.
    pub output_count: usize,
    /// Number of hidden nodes created up front.
    pub hidden_count: usize,
    /// Number of random input → output connections seeded per genome.
    pub initial_connections: usize,
}

impl Default for GenomeConfig {
    fn default() -> Self {
        Self {
            input_count: 3,
            output_count: 2,
            hidden_count: 0,
            initial_connections: DEFAULT_INITIAL_CONNECTIONS,
        }
    }
}

impl GenomeConfig {
    /// Config with the given node counts and the default seeding.
    #[must_use]
    pub fn new(input_count: usize, output_count: usize, hidden_count: usize) -> Self {
        Self {
            input_count,
            output_count,
            hidden_count,
            ..Self::default()
        }
    }
}

/// Declarative description of a network's nodes and weighted connections.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Genome {
    /// Node genes: inputs first, then outputs, then hidden.
    pub nodes: Vec<NodeGene>,
    /// Connection genes, enabled or not.
    pub connections: Vec<ConnectionGene>,
}

impl Genome {
    /// Build a genome from parts, rejecting structurally invalid input.
    ///
    /// # Errors
    ///
    /// Fails on duplicate node ids or on connections naming missing nodes.
    pub fn new(nodes: Vec<NodeGene>, connections: Vec<ConnectionGene>) -> Result<Self, GenomeError> {
        let genome = Self { nodes, connections };
        genome.validate()?;
        Ok(genome)
    }

    /// Create a genome with the configured node blocks and a few random
    /// input → output connections.
    ///
    /// Ids `0..inputs` are inputs, the next `outputs` ids are outputs and the
    /// remaining ids are hidden nodes, so later hidden nodes can be appended
    /// without renumbering. Seeded pairs are not deduplicated; the same
    /// (source, target) pair may appear twice.
    ///
    /// # Errors
    ///
    /// Fails when there are no inputs or outputs to connect, or when the node
    /// count does not fit the id space.
    pub fn initial<R: Rng>(config: &GenomeConfig, rng: &mut R) -> Result<Self, GenomeError> {
        if config.input_count == 0 {
            return Err(GenomeError::EmptyInputs);
        }
        if config.output_count == 0 {
            return Err(GenomeError::EmptyOutputs);
        }

        let requested = config
            .input_count
            .checked_add(config.output_count)
            .and_then(|n| n.checked_add(config.hidden_count))
            .ok_or(GenomeError::TooManyNodes {
                requested: usize::MAX,
            })?;
        let too_many = || GenomeError::TooManyNodes { requested };
        let total = u32::try_from(requested).map_err(|_| too_many())?;
        let inputs = u32::try_from(config.input_count).map_err(|_| too_many())?;
        let outputs = u32::try_from(config.output_count).map_err(|_| too_many())?;
        let output_end = inputs + outputs;

        let mut nodes = Vec::with_capacity(requested);
        nodes.extend((0..inputs).map(NodeGene::input));
        nodes.extend((inputs..output_end).map(NodeGene::output));
        nodes.extend((output_end..total).map(NodeGene::hidden));

        let mut innovations = InnovationCounter::new();
        let connections = (0..config.initial_connections)
            .map(|_| {
                let source = NodeId(rng.random_range(0..inputs));
                let target = NodeId(rng.random_range(inputs..output_end));
                let weight = rng.random::<f32>();
                ConnectionGene::new(source, target, weight, innovations.next_innovation())
            })
            .collect();

        Ok(Self { nodes, connections })
    }

    /// Check the structural invariants: unique node ids and connections that
    /// only reference existing nodes.
    ///
    /// # Errors
    ///
    /// Returns the first violation found.
    pub fn validate(&self) -> Result<(), GenomeError> {
        let mut seen = HashSet::with_capacity(self.nodes.len());
        for node in &self.nodes {
            if !seen.insert(node.id) {
                return Err(GenomeError::DuplicateNodeId { id: node.id });
            }
        }

        for conn in &self.connections {
            for endpoint in [conn.source, conn.target] {
                if !seen.contains(&endpoint) {
                    return Err(GenomeError::DanglingConnection {
                        innovation: conn.innovation,
                        missing: endpoint,
                    });
                }
            }
        }

        Ok(())
    }

    /// Append an enabled connection numbered after every existing innovation.
    ///
    /// # Errors
    ///
    /// Fails if either endpoint is not a node of this genome.
    pub fn add_connection(
        &mut self,
        source: NodeId,
        target: NodeId,
        weight: f32,
    ) -> Result<u64, GenomeError> {
        let innovation = InnovationCounter::after(&self.connections).next_innovation();
        for endpoint in [source, target] {
            if self.node(endpoint).is_none() {
                return Err(GenomeError::DanglingConnection {
                    innovation,
                    missing: endpoint,
                });
            }
        }
        self.connections
            .push(ConnectionGene::new(source, target, weight, innovation));
        Ok(innovation)
    }

    /// Look up a node gene by id.
    #[must_use]
    pub fn node(&self, id: NodeId) -> Option<&NodeGene> {
        self.nodes.iter().find(|n| n.id == id)
    }

    /// Ids of all nodes with the given role, in genome order.
    pub fn ids_with_role(&self, role: NodeRole) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes
            .iter()
            .filter(move |n| n.role == role)
            .map(|n| n.id)
    }

    /// Get the ids of input nodes, in order.
    #[must_use]
    pub fn input_ids(&self) -> Vec<NodeId> {
        self.ids_with_role(NodeRole::Input).collect()
    }

    /// Get the ids of output nodes, in order.
    #[must_use]
    pub fn output_ids(&self) -> Vec<NodeId> {
        self.ids_with_role(NodeRole::Output).collect()
    }

    /// Get the ids of hidden nodes, in order.
    #[must_use]
    pub fn hidden_ids(&self) -> Vec<NodeId> {
        self.ids_with_role(NodeRole::Hidden).collect()
    }

    /// Count enabled connections.
    #[must_use]
    pub fn num_enabled_connections(&self) -> usize {
        self.connections.iter().filter(|c| c.enabled).count()
    }

    /// Find a connection by its innovation number.
    #[must_use]
    pub fn find_connection_by_innovation(&self, innovation: u64) -> Option<&ConnectionGene> {
        self.connections.iter().find(|c| c.innovation == innovation)
    }
}

/// Create an initial genome with `input_count` inputs, `output_count`
/// outputs, `hidden_count` hidden nodes and the default three seeded
/// connections.
///
/// # Errors
///
/// See [`Genome::initial`].
pub fn create_initial_genome<R: Rng>(
    input_count: usize,
    output_count: usize,
    hidden_count: usize,
    rng: &mut R,
) -> Result<Genome, GenomeError> {
    Genome::initial(
        &GenomeConfig::new(input_count, output_count, hidden_count),
        rng,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn test_rng() -> ChaCha8Rng {
        ChaCha8Rng::seed_from_u64(42)
    }

    #[test]
    fn test_initial_genome_node_blocks() {
        let mut rng = test_rng();
        let genome = create_initial_genome(3, 2, 0, &mut rng).unwrap();

        assert_eq!(genome.input_ids(), vec![NodeId(0), NodeId(1), NodeId(2)]);
        assert_eq!(genome.output_ids(), vec![NodeId(3), NodeId(4)]);
        assert!(genome.hidden_ids().is_empty());
    }

    #[test]
    fn test_initial_genome_seeded_connections() {
        let mut rng = test_rng();
        for _ in 0..50 {
            let genome = create_initial_genome(3, 2, 0, &mut rng).unwrap();
            assert_eq!(genome.connections.len(), DEFAULT_INITIAL_CONNECTIONS);

            for (i, conn) in genome.connections.iter().enumerate() {
                assert!((0..3).contains(&conn.source.0), "source {}", conn.source);
                assert!((3..5).contains(&conn.target.0), "target {}", conn.target);
                assert!((0.0..1.0).contains(&conn.weight));
                assert!(conn.enabled);
                assert_eq!(conn.innovation, i as u64);
            }
            assert!(genome.validate().is_ok());
        }
    }

    #[test]
    fn test_initial_genome_hidden_after_outputs() {
        let mut rng = test_rng();
        let genome = create_initial_genome(2, 1, 2, &mut rng).unwrap();

        assert_eq!(genome.hidden_ids(), vec![NodeId(3), NodeId(4)]);
        // seeded edges never touch hidden nodes
        for conn in &genome.connections {
            assert_ne!(genome.node(conn.source).unwrap().role, NodeRole::Hidden);
            assert_eq!(genome.node(conn.target).unwrap().role, NodeRole::Output);
        }
    }

    #[test]
    fn test_initial_genome_custom_seed_count() {
        let mut rng = test_rng();
        let config = GenomeConfig {
            initial_connections: 8,
            ..GenomeConfig::new(4, 2, 0)
        };
        let genome = Genome::initial(&config, &mut rng).unwrap();
        assert_eq!(genome.connections.len(), 8);
        assert_eq!(genome.num_enabled_connections(), 8);
    }

    #[test]
    fn test_initial_genome_rejects_empty_blocks() {
        let mut rng = test_rng();
        assert_eq!(
            create_initial_genome(0, 2, 0, &mut rng),
            Err(GenomeError::EmptyInputs)
        );
        assert_eq!(
            create_initial_genome(3, 0, 0, &mut rng),
            Err(GenomeError::EmptyOutputs)
        );
    }

    #[test]
    fn test_initial_genome_is_reproducible() {
        let a = create_initial_genome(3, 2, 1, &mut test_rng()).unwrap();
        let b = create_initial_genome(3, 2, 1, &mut test_rng()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_validate_duplicate_id() {
        let result = Genome::new(vec![NodeGene::input(0), NodeGene::output(0)], vec![]);
        assert_eq!(
            result,
            Err(GenomeError::DuplicateNodeId { id: NodeId(0) })
        );
    }

    #[test]
    fn test_validate_dangling_connection() {
        let result = Genome::new(
            vec![NodeGene::input(0), NodeGene::output(1)],
            vec![ConnectionGene::new(NodeId(0), NodeId(9), 1.0, 0)],
        );
        assert_eq!(
            result,
            Err(GenomeError::DanglingConnection {
                innovation: 0,
                missing: NodeId(9)
            })
        );
    }

    #[test]
    fn test_add_connection_numbers_after_existing() {
        let mut rng = test_rng();
        let mut genome = create_initial_genome(3, 2, 1, &mut rng).unwrap();

        let innovation = genome.add_connection(NodeId(0), NodeId(5), 0.5).unwrap();
        assert_eq!(innovation, 3);
        assert_eq!(
            genome.find_connection_by_innovation(3).map(|c| c.target),
            Some(NodeId(5))
        );

        let err = genome.add_connection(NodeId(0), NodeId(42), 0.5);
        assert!(matches!(
            err,
            Err(GenomeError::DanglingConnection { missing: NodeId(42), .. })
        ));
    }

    #[test]
    fn test_genome_serialization_roundtrip() {
        let mut rng = test_rng();
        let genome = create_initial_genome(3, 2, 1, &mut rng).unwrap();

        let json = serde_json::to_string(&genome).expect("Serialization failed");
        let restored: Genome = serde_json::from_str(&json).expect("Deserialization failed");

        assert_eq!(genome, restored);
    }
}
