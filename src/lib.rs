//! # Forage NEAT
//!
//! A minimal `NeuroEvolution` of Augmenting Topologies (NEAT) engine driving
//! foraging agents through a tick-based survival loop.
//!
//! ## Features
//!
//! - **Id-Linked Genomes**: connection genes reference nodes by integer id, so
//!   genomes clone and serialize independently of any runtime network
//! - **Arena Networks**: runtime nodes and connections live in flat buffers and
//!   refer to each other by index
//! - **Three-Phase Evaluation**: inputs, hidden nodes, then outputs in genome
//!   order; edges the pass cannot honour are reported when the network is built
//! - **Population Lifecycle**: energy-limited agents, once-only death reports,
//!   and single-flight generational replacement
//!
//! ## Quick Start
//!
//! ```rust
//! use forage_neat::{create_initial_genome, Network};
//! use rand::SeedableRng;
//! use rand_chacha::ChaCha8Rng;
//!
//! let mut rng = ChaCha8Rng::seed_from_u64(42);
//! let genome = create_initial_genome(3, 2, 0, &mut rng).unwrap();
//!
//! let mut network = Network::from_genome(&genome).unwrap();
//! let outputs = network.evaluate(&[0.5, 1.0, 2.5]).unwrap();
//! assert_eq!(outputs.len(), 2);
//! ```
//!
//! ## Driving a Population
//!
//! The host simulation implements [`World`] (ray casting, movement, contacts,
//! body lifecycle) and calls [`Population::tick`] once per step:
//!
//! ```rust,ignore
//! let mut population = Population::initialize(PopulationConfig::default(), &mut world)?;
//! loop {
//!     let summary = population.tick(&mut world, dt)?;
//!     if summary.repopulated {
//!         println!("generation {}", summary.generation);
//!     }
//! }
//! ```
//!
//! ## Architecture
//!
//! ### Evaluation order
//!
//! Networks are not topologically sorted. Each pass pushes sigmoid-squashed
//! inputs onto their outgoing connections, then evaluates hidden nodes and
//! finally outputs with tanh, each in genome order. A connection that feeds an
//! earlier node reads zero. [`topology::PhaseOrder`] finds such connections.
//!
//! ### Death reporting
//!
//! Agents do not look the population up. Each one receives a [`DeathReporter`]
//! at construction and sends exactly one [`DeathReport`] when it dies. The
//! population applies reports only after every agent has stepped.

pub mod activation;
pub mod agent;
pub mod gene;
pub mod genome;
pub mod innovation;
pub mod network;
pub mod population;
pub mod topology;
pub mod world;

// Re-exports for convenience
pub use activation::Activation;
pub use agent::{
    Agent, AgentConfig, AgentStatus, DeathCause, DeathReport, DeathReporter, MotorCommand,
    SensorConfig,
};
pub use gene::{ConnectionGene, NodeGene, NodeId, NodeRole};
pub use genome::{create_initial_genome, Genome, GenomeConfig, GenomeError};
pub use innovation::InnovationCounter;
pub use network::{Network, NetworkError};
pub use population::{
    ConfigError, GenerationSummary, Population, PopulationConfig, PopulationError,
    RepopulationGuard, TickSummary,
};
pub use topology::{is_phase_ordered, PhaseOrder};
pub use world::{AgentHandle, Contact, World};
