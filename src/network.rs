//! Runtime network built from a genome.
//!
//! A [`Network`] is an arena: runtime nodes live in one `Vec`, runtime
//! connections in another, and both refer to each other by index. Building
//! resolves the genome's [`NodeId`] references once; evaluation then touches
//! only indices.
//!
//! Evaluation runs in three phases in genome order (inputs, hidden, outputs)
//! with no topological sort. Edges that feed backwards read zero; see
//! [`crate::topology`] for the analysis that reports them at build time.

use std::collections::HashMap;

use thiserror::Error;
use tracing::{debug, warn};

use crate::activation::Activation;
use crate::gene::{NodeId, NodeRole};
use crate::genome::Genome;
use crate::topology::PhaseOrder;

/// Errors raised while building or evaluating a network.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum NetworkError {
    /// A connection gene, enabled or not, names a node the genome does not have.
    #[error("connection {innovation} references missing node {missing}")]
    StructuralIntegrity { innovation: u64, missing: NodeId },
    /// Two node genes share an id.
    #[error("node id {id} appears more than once")]
    DuplicateNode { id: NodeId },
    /// The input slice does not match the number of input nodes.
    #[error("expected {expected} inputs, got {actual}")]
    InvalidInput { expected: usize, actual: usize },
    /// The output buffer does not match the number of output nodes.
    #[error("expected an output buffer of {expected}, got {actual}")]
    OutputBufferMismatch { expected: usize, actual: usize },
}

/// One neuron of a built network.
#[derive(Debug, Clone)]
pub struct RuntimeNode {
    /// Id of the node gene this node was built from.
    pub id: NodeId,
    /// Role of that gene; decides the phase and the activation.
    pub role: NodeRole,
    activation: Activation,
    /// Working value; zero between passes.
    value: f32,
    /// Indices of connections feeding this node.
    incoming: Vec<usize>,
    /// Indices of connections this node feeds.
    outgoing: Vec<usize>,
}

impl RuntimeNode {
    fn new(id: NodeId, role: NodeRole) -> Self {
        Self {
            id,
            role,
            activation: Activation::for_role(role),
            value: 0.0,
            incoming: Vec::new(),
            outgoing: Vec::new(),
        }
    }

    /// Working value. A node clears it as soon as it has fired, so outside a
    /// pass this always reads 0.
    #[must_use]
    pub fn value(&self) -> f32 {
        self.value
    }

    /// Indices into [`Network::connections`] of the edges feeding this node.
    #[must_use]
    pub fn incoming(&self) -> &[usize] {
        &self.incoming
    }

    /// Indices into [`Network::connections`] of the edges this node feeds.
    #[must_use]
    pub fn outgoing(&self) -> &[usize] {
        &self.outgoing
    }
}

/// One enabled edge of a built network.
#[derive(Debug, Clone)]
pub struct RuntimeConnection {
    /// Index of the source node in the arena.
    pub source: usize,
    /// Index of the target node in the arena.
    pub target: usize,
    /// Weight copied from the connection gene.
    pub weight: f32,
    /// Innovation number of the connection gene.
    pub innovation: u64,
    /// Value pushed by the source during the current pass.
    carried: f32,
}

impl RuntimeConnection {
    /// Value left on this edge by the most recent pass.
    #[must_use]
    pub fn carried(&self) -> f32 {
        self.carried
    }
}

/// Executable graph built once from a genome.
#[derive(Debug, Clone)]
pub struct Network {
    genome: Genome,
    nodes: Vec<RuntimeNode>,
    connections: Vec<RuntimeConnection>,
    input_nodes: Vec<usize>,
    hidden_nodes: Vec<usize>,
    output_nodes: Vec<usize>,
    /// Score assigned by the population after the owning agent dies.
    pub fitness: f32,
}

impl Network {
    /// Build a network from a genome.
    ///
    /// Every node gene becomes a runtime node; only enabled connection genes
    /// become runtime connections. Adjacency is resolved by scanning every
    /// connection against every node. The genome is copied, never modified.
    ///
    /// Each connection the three-phase pass cannot honour is logged at `warn`
    /// level. Cloning a built network repeats none of this work.
    ///
    /// # Errors
    ///
    /// Returns [`NetworkError::StructuralIntegrity`] when any connection gene
    /// names a missing node and [`NetworkError::DuplicateNode`] when ids
    /// collide. No partial network is produced.
    pub fn from_genome(genome: &Genome) -> Result<Self, NetworkError> {
        let mut nodes = Vec::with_capacity(genome.nodes.len());
        let mut input_nodes = Vec::new();
        let mut hidden_nodes = Vec::new();
        let mut output_nodes = Vec::new();
        let mut id_to_idx: HashMap<NodeId, usize> = HashMap::with_capacity(genome.nodes.len());

        for gene in &genome.nodes {
            let idx = nodes.len();
            if id_to_idx.insert(gene.id, idx).is_some() {
                return Err(NetworkError::DuplicateNode { id: gene.id });
            }
            nodes.push(RuntimeNode::new(gene.id, gene.role));
            match gene.role {
                NodeRole::Input => input_nodes.push(idx),
                NodeRole::Hidden => hidden_nodes.push(idx),
                NodeRole::Output => output_nodes.push(idx),
            }
        }

        let resolve = |innovation: u64, id: NodeId| {
            id_to_idx
                .get(&id)
                .copied()
                .ok_or(NetworkError::StructuralIntegrity {
                    innovation,
                    missing: id,
                })
        };

        // disabled genes never run, but they still have to name real nodes
        let mut connections = Vec::with_capacity(genome.connections.len());
        for c in &genome.connections {
            let source = resolve(c.innovation, c.source)?;
            let target = resolve(c.innovation, c.target)?;
            if c.enabled {
                connections.push(RuntimeConnection {
                    source,
                    target,
                    weight: c.weight,
                    innovation: c.innovation,
                    carried: 0.0,
                });
            }
        }

        for (node_idx, node) in nodes.iter_mut().enumerate() {
            for (conn_idx, conn) in connections.iter().enumerate() {
                if conn.source == node_idx {
                    node.outgoing.push(conn_idx);
                }
                if conn.target == node_idx {
                    node.incoming.push(conn_idx);
                }
            }
        }

        for violation in PhaseOrder::from_genome(genome).violations(genome) {
            warn!(
                innovation = violation.innovation,
                source = %violation.source,
                target = %violation.target,
                defect = ?violation.defect,
                "connection is not honoured by the three-phase pass"
            );
        }

        debug!(
            inputs = input_nodes.len(),
            hidden = hidden_nodes.len(),
            outputs = output_nodes.len(),
            connections = connections.len(),
            "built network"
        );

        Ok(Self {
            genome: genome.clone(),
            nodes,
            connections,
            input_nodes,
            hidden_nodes,
            output_nodes,
            fitness: 0.0,
        })
    }

    /// Run one forward pass, writing results to a provided buffer.
    ///
    /// Carried values are cleared first so every pass sees the same state;
    /// node values are reset as each node finishes.
    ///
    /// # Errors
    ///
    /// Fails without touching any state if `inputs` or `outputs` have the
    /// wrong length.
    pub fn evaluate_into(&mut self, inputs: &[f32], outputs: &mut [f32]) -> Result<(), NetworkError> {
        if inputs.len() != self.input_nodes.len() {
            return Err(NetworkError::InvalidInput {
                expected: self.input_nodes.len(),
                actual: inputs.len(),
            });
        }
        if outputs.len() != self.output_nodes.len() {
            return Err(NetworkError::OutputBufferMismatch {
                expected: self.output_nodes.len(),
                actual: outputs.len(),
            });
        }

        for conn in &mut self.connections {
            conn.carried = 0.0;
        }

        // Input phase
        for (&idx, &input) in self.input_nodes.iter().zip(inputs) {
            let node = &mut self.nodes[idx];
            node.value = node.activation.apply(input);
            for &c in &node.outgoing {
                self.connections[c].carried = node.value;
            }
            node.value = 0.0;
        }

        // Hidden phase
        for &idx in &self.hidden_nodes {
            let node = &mut self.nodes[idx];
            let raw = weighted_sum(&node.incoming, &self.connections);
            node.value = node.activation.apply(raw);
            for &c in &node.outgoing {
                self.connections[c].carried = node.value;
            }
            node.value = 0.0;
        }

        // Output phase
        for (slot, &idx) in outputs.iter_mut().zip(&self.output_nodes) {
            let node = &mut self.nodes[idx];
            let raw = weighted_sum(&node.incoming, &self.connections);
            node.value = node.activation.apply(raw);
            *slot = node.value;
            node.value = 0.0;
        }

        Ok(())
    }

    /// Run one forward pass.
    ///
    /// # Errors
    ///
    /// Returns [`NetworkError::InvalidInput`] if `inputs.len()` differs from
    /// the number of input nodes.
    pub fn evaluate(&mut self, inputs: &[f32]) -> Result<Vec<f32>, NetworkError> {
        let mut outputs = vec![0.0; self.output_nodes.len()];
        self.evaluate_into(inputs, &mut outputs)?;
        Ok(outputs)
    }

    /// The genome this network was built from.
    #[must_use]
    pub fn genome(&self) -> &Genome {
        &self.genome
    }

    #[must_use]
    pub fn num_inputs(&self) -> usize {
        self.input_nodes.len()
    }

    #[must_use]
    pub fn num_hidden(&self) -> usize {
        self.hidden_nodes.len()
    }

    #[must_use]
    pub fn num_outputs(&self) -> usize {
        self.output_nodes.len()
    }

    /// All runtime nodes, in genome order.
    #[must_use]
    pub fn nodes(&self) -> &[RuntimeNode] {
        &self.nodes
    }

    /// All runtime connections, one per enabled connection gene.
    #[must_use]
    pub fn connections(&self) -> &[RuntimeConnection] {
        &self.connections
    }
}

#[inline]
fn weighted_sum(incoming: &[usize], connections: &[RuntimeConnection]) -> f32 {
    incoming
        .iter()
        .map(|&c| connections[c].weight * connections[c].carried)
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gene::{ConnectionGene, NodeGene};
    use crate::genome::create_initial_genome;
    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaCha8Rng;

    fn test_rng() -> ChaCha8Rng {
        ChaCha8Rng::seed_from_u64(42)
    }

    fn single_edge(weight: f32, enabled: bool) -> Genome {
        let mut conn = ConnectionGene::new(NodeId(0), NodeId(1), weight, 0);
        conn.enabled = enabled;
        Genome::new(vec![NodeGene::input(0), NodeGene::output(1)], vec![conn]).unwrap()
    }

    #[test]
    fn test_network_basic() {
        let mut rng = test_rng();
        let genome = create_initial_genome(3, 2, 1, &mut rng).unwrap();
        let mut network = Network::from_genome(&genome).unwrap();

        assert_eq!(network.num_inputs(), 3);
        assert_eq!(network.num_outputs(), 2);
        assert_eq!(network.num_hidden(), 1);
        assert_eq!(network.nodes().len(), 6);
        assert_eq!(network.connections().len(), 3);

        let outputs = network.evaluate(&[0.5, 1.0, 2.0]).unwrap();
        assert_eq!(outputs.len(), 2);
    }

    #[test]
    fn test_single_edge_scenario() {
        let mut network = Network::from_genome(&single_edge(2.0, true)).unwrap();
        let outputs = network.evaluate(&[0.0]).unwrap();

        // tanh(2.0 * sigmoid(0.0)) = tanh(1.0)
        assert!((outputs[0] - 1.0_f32.tanh()).abs() < 1e-5);
        assert!((outputs[0] - 0.7616).abs() < 1e-4);
    }

    #[test]
    fn test_disabled_connection_excluded() {
        let mut network = Network::from_genome(&single_edge(2.0, false)).unwrap();
        assert!(network.connections().is_empty());

        for input in [-5.0, 0.0, 0.3, 100.0] {
            assert_eq!(network.evaluate(&[input]).unwrap(), vec![0.0]);
        }
    }

    #[test]
    fn test_unconnected_output_is_exactly_zero() {
        let mut rng = test_rng();
        let mut genome = create_initial_genome(3, 2, 0, &mut rng).unwrap();
        genome.connections.retain(|c| c.target == NodeId(3));
        genome.add_connection(NodeId(0), NodeId(3), 0.7).unwrap();

        let mut network = Network::from_genome(&genome).unwrap();
        let outputs = network.evaluate(&[1.0, 2.0, 3.0]).unwrap();

        assert!(outputs[0] > 0.0 && outputs[0] < 1.0);
        assert_eq!(outputs[1], 0.0);
    }

    #[test]
    fn test_evaluation_is_idempotent() {
        let mut rng = test_rng();
        let genome = create_initial_genome(3, 2, 2, &mut rng).unwrap();
        let mut network = Network::from_genome(&genome).unwrap();

        let first = network.evaluate(&[0.5, -0.5, 2.0]).unwrap();
        let second = network.evaluate(&[0.5, -0.5, 2.0]).unwrap();
        assert_eq!(first, second, "Evaluation should be idempotent");

        // transient state is back to zero
        assert!(network.nodes().iter().all(|n| n.value() == 0.0));
    }

    #[test]
    fn test_outputs_bounded() {
        let mut rng = test_rng();
        for _ in 0..20 {
            let genome = create_initial_genome(4, 3, 1, &mut rng).unwrap();
            let mut network = Network::from_genome(&genome).unwrap();
            let inputs: Vec<f32> = (0..4).map(|_| rng.random_range(0.0..5.0)).collect();

            for value in network.evaluate(&inputs).unwrap() {
                assert!(value > -1.0 && value < 1.0, "Value out of range: {}", value);
            }
        }
    }

    #[test]
    fn test_hidden_chain() {
        // input 0 -> hidden 2 -> output 1
        let genome = Genome::new(
            vec![NodeGene::input(0), NodeGene::output(1), NodeGene::hidden(2)],
            vec![
                ConnectionGene::new(NodeId(0), NodeId(2), 1.5, 0),
                ConnectionGene::new(NodeId(2), NodeId(1), -0.8, 1),
            ],
        )
        .unwrap();
        let mut network = Network::from_genome(&genome).unwrap();

        let hidden = (1.5 * Activation::Sigmoid.apply(0.4)).tanh();
        let expected = (-0.8 * hidden).tanh();
        let outputs = network.evaluate(&[0.4]).unwrap();
        assert!((outputs[0] - expected).abs() < 1e-5);
    }

    #[test]
    fn test_backward_edge_reads_zero() {
        // output 1 -> hidden 2 is evaluated before the output exists
        let genome = Genome::new(
            vec![NodeGene::input(0), NodeGene::output(1), NodeGene::hidden(2)],
            vec![
                ConnectionGene::new(NodeId(0), NodeId(1), 1.0, 0),
                ConnectionGene::new(NodeId(1), NodeId(2), 1.0, 1),
                ConnectionGene::new(NodeId(2), NodeId(1), 1.0, 2),
            ],
        )
        .unwrap();
        let mut network = Network::from_genome(&genome).unwrap();

        let expected = Activation::Sigmoid.apply(1.0).tanh();
        let first = network.evaluate(&[1.0]).unwrap();
        let second = network.evaluate(&[1.0]).unwrap();
        assert!((first[0] - expected).abs() < 1e-5);
        assert_eq!(first, second);
    }

    #[test]
    fn test_self_loop_in_both_adjacency_lists() {
        let genome = Genome::new(
            vec![NodeGene::input(0), NodeGene::output(1), NodeGene::hidden(2)],
            vec![ConnectionGene::new(NodeId(2), NodeId(2), 1.0, 0)],
        )
        .unwrap();
        let network = Network::from_genome(&genome).unwrap();

        let hidden = &network.nodes()[2];
        assert_eq!(hidden.incoming(), &[0]);
        assert_eq!(hidden.outgoing(), &[0]);
    }

    #[test]
    fn test_duplicate_pairs_both_contribute() {
        let genome = Genome::new(
            vec![NodeGene::input(0), NodeGene::output(1)],
            vec![
                ConnectionGene::new(NodeId(0), NodeId(1), 0.5, 0),
                ConnectionGene::new(NodeId(0), NodeId(1), 0.5, 1),
            ],
        )
        .unwrap();
        let mut network = Network::from_genome(&genome).unwrap();

        let expected = Activation::Sigmoid.apply(0.0).tanh(); // 0.5*s + 0.5*s
        assert!((network.evaluate(&[0.0]).unwrap()[0] - expected).abs() < 1e-5);
    }

    #[test]
    fn test_input_mismatch() {
        let mut network = Network::from_genome(&single_edge(1.0, true)).unwrap();
        assert_eq!(
            network.evaluate(&[1.0, 2.0]),
            Err(NetworkError::InvalidInput {
                expected: 1,
                actual: 2
            })
        );

        let mut buffer = [0.0; 3];
        assert!(matches!(
            network.evaluate_into(&[1.0], &mut buffer),
            Err(NetworkError::OutputBufferMismatch { .. })
        ));
    }

    #[test]
    fn test_missing_node_is_fatal() {
        let genome = Genome {
            nodes: vec![NodeGene::input(0), NodeGene::output(1)],
            connections: vec![ConnectionGene::new(NodeId(0), NodeId(7), 1.0, 4)],
        };
        assert_eq!(
            Network::from_genome(&genome).unwrap_err(),
            NetworkError::StructuralIntegrity {
                innovation: 4,
                missing: NodeId(7)
            }
        );
    }

    #[test]
    fn test_disabled_dangling_connection_is_fatal() {
        let genome = Genome {
            nodes: vec![NodeGene::input(0), NodeGene::output(1)],
            connections: vec![
                ConnectionGene::new(NodeId(0), NodeId(1), 1.0, 0),
                ConnectionGene::new(NodeId(0), NodeId(7), 1.0, 4).disabled(),
            ],
        };
        assert!(genome.validate().is_err());
        assert_eq!(
            Network::from_genome(&genome).unwrap_err(),
            NetworkError::StructuralIntegrity {
                innovation: 4,
                missing: NodeId(7)
            }
        );
    }

    #[test]
    fn test_duplicate_node_is_fatal() {
        let genome = Genome {
            nodes: vec![NodeGene::input(0), NodeGene::output(0)],
            connections: vec![],
        };
        assert_eq!(
            Network::from_genome(&genome).unwrap_err(),
            NetworkError::DuplicateNode { id: NodeId(0) }
        );
    }

    #[test]
    fn test_genome_is_preserved() {
        let mut rng = test_rng();
        let genome = create_initial_genome(3, 2, 0, &mut rng).unwrap();
        let mut network = Network::from_genome(&genome).unwrap();
        network.evaluate(&[1.0, 1.0, 1.0]).unwrap();

        assert_eq!(network.genome(), &genome);
        assert_eq!(network.fitness, 0.0);
    }
}
