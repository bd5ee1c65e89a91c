//! Population lifecycle: spawn, tick, death bookkeeping and generational
//! replacement.
//!
//! The population owns every network of the current generation together with
//! the agent that drives it. Each tick steps all live agents, then (after every
//! agent has stepped) applies the death reports they sent and rescans the world
//! for survivors. When nobody is left, the next generation replaces the current
//! one under a single-flight latch.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Receiver;
use std::sync::Arc;

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::agent::{Agent, AgentConfig, DeathReport, DeathReporter};
use crate::genome::{Genome, GenomeConfig, GenomeError};
use crate::network::{Network, NetworkError};
use crate::world::{AgentHandle, World};

/// Invalid population configuration.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ConfigError {
    #[error("population size must be at least 1")]
    ZeroPopulation,
    #[error("keep_best ({keep_best}) + leave_worst ({leave_worst}) exceeds population size {size}")]
    RetentionExceedsPopulation {
        keep_best: usize,
        leave_worst: usize,
        size: usize,
    },
    #[error("agents cast {rays} rays but genomes have {inputs} inputs")]
    SensorArityMismatch { rays: usize, inputs: usize },
    #[error("agents need 2 outputs (thrust, turn), genomes have {outputs}")]
    TooFewOutputs { outputs: usize },
    #[error("sensor hit divider must be positive, got {0}")]
    NonPositiveDivider(f32),
    #[error("{field} must be finite, got {value}")]
    NonFinite { field: &'static str, value: f32 },
}

/// Errors raised by population bookkeeping.
#[derive(Debug, Error)]
pub enum PopulationError {
    #[error("agent {index} already reported its death this generation")]
    DuplicateDeathReport { index: usize },
    #[error("no population slot {index} (size {size})")]
    UnknownIndex { index: usize, size: usize },
    #[error("repopulation is already in progress")]
    ReentrantRepopulation,
    #[error("tick length must be finite and non-negative, got {0}")]
    InvalidTimeStep(f32),
    #[error("invalid configuration: {0}")]
    InvalidConfig(#[from] ConfigError),
    #[error(transparent)]
    Genome(#[from] GenomeError),
    #[error(transparent)]
    Network(#[from] NetworkError),
}

/// Static configuration of a population run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PopulationConfig {
    /// Number of agents per generation.
    pub size: usize,
    /// Top genomes carried into the next generation unmodified.
    pub keep_best: usize,
    /// Bottom slots refilled with fresh random genomes.
    pub leave_worst: usize,
    /// Shape of freshly created genomes.
    pub genome: GenomeConfig,
    /// Survival and sensing parameters of every agent.
    pub agent: AgentConfig,
    /// Seed for reproducible runs; `None` seeds from the thread RNG.
    pub rng_seed: Option<u64>,
}

impl Default for PopulationConfig {
    fn default() -> Self {
        Self {
            size: 20,
            keep_best: 4,
            leave_worst: 4,
            genome: GenomeConfig::default(),
            agent: AgentConfig::default(),
            rng_seed: None,
        }
    }
}

impl PopulationConfig {
    /// Check the settings against each other.
    ///
    /// # Errors
    ///
    /// Returns the first inconsistency found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.size == 0 {
            return Err(ConfigError::ZeroPopulation);
        }
        if self.keep_best + self.leave_worst > self.size {
            return Err(ConfigError::RetentionExceedsPopulation {
                keep_best: self.keep_best,
                leave_worst: self.leave_worst,
                size: self.size,
            });
        }
        let rays = self.agent.sensors.ray_count();
        if rays != self.genome.input_count {
            return Err(ConfigError::SensorArityMismatch {
                rays,
                inputs: self.genome.input_count,
            });
        }
        if self.genome.output_count < 2 {
            return Err(ConfigError::TooFewOutputs {
                outputs: self.genome.output_count,
            });
        }
        let agent = &self.agent;
        let fields = [
            ("agent.starting_energy", agent.starting_energy),
            ("agent.reward_energy", agent.reward_energy),
            ("agent.fitness_multiplier", agent.fitness_multiplier),
            ("agent.sensors.ray_distance", agent.sensors.ray_distance),
            ("agent.sensors.hit_divider", agent.sensors.hit_divider),
        ];
        let offsets = agent
            .sensors
            .ray_offsets
            .iter()
            .map(|&offset| ("agent.sensors.ray_offsets", offset));
        if let Some((field, value)) = fields
            .into_iter()
            .chain(offsets)
            .find(|(_, value)| !value.is_finite())
        {
            return Err(ConfigError::NonFinite { field, value });
        }
        if self.agent.sensors.hit_divider <= 0.0 {
            return Err(ConfigError::NonPositiveDivider(
                self.agent.sensors.hit_divider,
            ));
        }
        Ok(())
    }
}

/// Fitness statistics of a finished generation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GenerationSummary {
    /// The generation that finished.
    pub generation: u32,
    /// Highest fitness any of its networks reached.
    pub best_fitness: f32,
    /// Fitness averaged over the whole population.
    pub mean_fitness: f32,
    /// Population index of the best network; ties go to the lower index.
    pub best_index: usize,
}

/// What happened during one call to [`Population::tick`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickSummary {
    /// Generation counter after the tick.
    pub generation: u32,
    /// Agents still present after the tick's liveness scan.
    pub alive: usize,
    /// Agents whose forward pass failed this tick.
    pub evaluation_failures: usize,
    /// Whether the tick ended the generation and spawned the next one.
    pub repopulated: bool,
}

/// Proof that the holder is the only repopulation in flight. Releases the
/// latch when dropped, including on early return.
#[derive(Debug)]
pub struct RepopulationGuard {
    latch: Arc<AtomicBool>,
}

impl Drop for RepopulationGuard {
    fn drop(&mut self) {
        self.latch.store(false, Ordering::Release);
    }
}

#[derive(Debug)]
struct Member {
    handle: AgentHandle,
    agent: Agent,
    network: Network,
    reported: bool,
}

/// Fixed-size roster of agents and their networks for one generation.
#[derive(Debug)]
pub struct Population {
    config: PopulationConfig,
    members: Vec<Member>,
    generation: u32,
    alive_count: usize,
    reporter: DeathReporter,
    reports: Receiver<DeathReport>,
    repopulating: Arc<AtomicBool>,
    rng: ChaCha8Rng,
    history: Vec<GenerationSummary>,
}

impl Population {
    /// Build `config.size` genomes and networks, spawn one agent per network
    /// with indices `0..size`, and start generation 1.
    ///
    /// # Errors
    ///
    /// Fails on an invalid config or if a genome cannot be built; nothing is
    /// spawned in that case.
    pub fn initialize<W: World + ?Sized>(
        config: PopulationConfig,
        world: &mut W,
    ) -> Result<Self, PopulationError> {
        config.validate()?;

        let mut rng = match config.rng_seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_rng(&mut rand::rng()),
        };
        let networks = (0..config.size)
            .map(|_| -> Result<Network, PopulationError> {
                let genome = Genome::initial(&config.genome, &mut rng)?;
                Ok(Network::from_genome(&genome)?)
            })
            .collect::<Result<Vec<_>, PopulationError>>()?;

        let (reporter, reports) = DeathReporter::channel();
        let mut population = Self {
            config,
            members: Vec::new(),
            generation: 0,
            alive_count: 0,
            reporter,
            reports,
            repopulating: Arc::new(AtomicBool::new(false)),
            rng,
            history: Vec::new(),
        };
        population.spawn_generation(world, networks);
        population.generation += 1;

        info!(
            size = population.config.size,
            generation = population.generation,
            "population initialized"
        );
        Ok(population)
    }

    /// Advance the simulation by one tick of length `dt`.
    ///
    /// Every agent whose body is present takes one step; a failing forward
    /// pass is logged and counted but never stops the others. Once all agents
    /// have stepped, pending death reports are applied and liveness is
    /// rescanned, possibly ending the generation.
    ///
    /// # Errors
    ///
    /// Rejects a negative or non-finite `dt` before any agent moves.
    /// Otherwise only replacement of an exhausted generation can fail.
    pub fn tick<W: World + ?Sized>(
        &mut self,
        world: &mut W,
        dt: f32,
    ) -> Result<TickSummary, PopulationError> {
        if !dt.is_finite() || dt < 0.0 {
            return Err(PopulationError::InvalidTimeStep(dt));
        }

        let mut evaluation_failures = 0;
        for member in &mut self.members {
            if !world.is_present(member.handle) {
                continue;
            }
            if let Err(err) = member
                .agent
                .step(member.handle, &mut member.network, world, dt)
            {
                warn!(
                    index = member.agent.population_index(),
                    error = %err,
                    "forward pass failed; motor command skipped"
                );
                evaluation_failures += 1;
            }
        }

        self.drain_reports();
        let repopulated = self.check_exhaustion(world)?;

        Ok(TickSummary {
            generation: self.generation,
            alive: self.alive_count,
            evaluation_failures,
            repopulated,
        })
    }

    /// Record the final fitness of the agent at `index`.
    ///
    /// # Errors
    ///
    /// A second report for the same index within one generation is rejected
    /// and leaves the first value in place.
    pub fn report_death(&mut self, fitness: f32, index: usize) -> Result<(), PopulationError> {
        let size = self.members.len();
        let member = self
            .members
            .get_mut(index)
            .ok_or(PopulationError::UnknownIndex { index, size })?;
        if member.reported {
            return Err(PopulationError::DuplicateDeathReport { index });
        }
        member.network.fitness = fitness;
        member.reported = true;
        debug!(index, fitness, "death reported");
        Ok(())
    }

    /// Count members whose body is still present in `world`.
    pub fn scan_alive<W: World + ?Sized>(&mut self, world: &W) -> usize {
        self.alive_count = self
            .members
            .iter()
            .filter(|m| world.is_present(m.handle))
            .count();
        self.alive_count
    }

    /// Rescan liveness and replace the generation if nobody is left.
    ///
    /// Calling this again right after a replacement finds the new generation
    /// alive and does nothing.
    ///
    /// # Errors
    ///
    /// See [`on_population_exhausted`](Self::on_population_exhausted).
    pub fn check_exhaustion<W: World + ?Sized>(
        &mut self,
        world: &mut W,
    ) -> Result<bool, PopulationError> {
        if self.scan_alive(&*world) > 0 {
            return Ok(false);
        }
        self.on_population_exhausted(world)?;
        Ok(true)
    }

    /// Take the repopulation latch.
    ///
    /// # Errors
    ///
    /// Returns [`PopulationError::ReentrantRepopulation`] while another guard
    /// is alive.
    pub fn try_begin_repopulation(&self) -> Result<RepopulationGuard, PopulationError> {
        self.repopulating
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| PopulationError::ReentrantRepopulation)?;
        Ok(RepopulationGuard {
            latch: Arc::clone(&self.repopulating),
        })
    }

    /// End the current generation and spawn the next.
    ///
    /// Networks are ranked by fitness (descending, ties by index). The top
    /// `keep_best` genomes survive unmodified, the last `leave_worst` slots get
    /// fresh random genomes, and the slots in between are copies of the
    /// survivors taken round-robin from the best. Survivors are cloned from
    /// their built networks rather than rebuilt, so construction warnings for
    /// a genome are logged once, when it first enters the population.
    ///
    /// # Errors
    ///
    /// Rejects re-entry while a replacement holds the latch. The current
    /// generation is left untouched if a new network cannot be built.
    pub fn on_population_exhausted<W: World + ?Sized>(
        &mut self,
        world: &mut W,
    ) -> Result<(), PopulationError> {
        let _guard = self.try_begin_repopulation()?;

        self.drain_reports();
        let ranking = self.ranking();
        let summary = self.summarize(&ranking);
        let networks = self.next_generation(&ranking)?;

        for member in &self.members {
            world.despawn(member.handle);
        }
        self.spawn_generation(world, networks);
        self.generation += 1;
        self.history.push(summary);

        info!(
            generation = self.generation,
            previous_best = summary.best_fitness,
            previous_mean = summary.mean_fitness,
            "generation replaced"
        );
        Ok(())
    }

    /// Current generation; 1 after initialization.
    #[must_use]
    pub fn generation(&self) -> u32 {
        self.generation
    }

    /// Agents present at the last liveness scan.
    #[must_use]
    pub fn alive_count(&self) -> usize {
        self.alive_count
    }

    #[must_use]
    pub fn size(&self) -> usize {
        self.members.len()
    }

    #[must_use]
    pub fn config(&self) -> &PopulationConfig {
        &self.config
    }

    #[must_use]
    pub fn network(&self, index: usize) -> Option<&Network> {
        self.members.get(index).map(|m| &m.network)
    }

    #[must_use]
    pub fn agent(&self, index: usize) -> Option<&Agent> {
        self.members.get(index).map(|m| &m.agent)
    }

    #[must_use]
    pub fn handle(&self, index: usize) -> Option<AgentHandle> {
        self.members.get(index).map(|m| m.handle)
    }

    /// Networks of the current generation in population order.
    pub fn networks(&self) -> impl Iterator<Item = &Network> {
        self.members.iter().map(|m| &m.network)
    }

    /// Summaries of every finished generation, oldest first.
    #[must_use]
    pub fn history(&self) -> &[GenerationSummary] {
        &self.history
    }

    fn drain_reports(&mut self) {
        while let Ok(report) = self.reports.try_recv() {
            if let Err(err) = self.report_death(report.overall_fitness, report.population_index) {
                error!(
                    index = report.population_index,
                    error = %err,
                    "rejected death report"
                );
            }
        }
    }

    /// Member indices by fitness, best first. Stable, so ties keep index order.
    fn ranking(&self) -> Vec<usize> {
        let mut ranking: Vec<usize> = (0..self.members.len()).collect();
        ranking.sort_by(|&a, &b| {
            self.members[b]
                .network
                .fitness
                .total_cmp(&self.members[a].network.fitness)
        });
        ranking
    }

    fn summarize(&self, ranking: &[usize]) -> GenerationSummary {
        let total: f32 = self.members.iter().map(|m| m.network.fitness).sum();
        let best_index = ranking.first().copied().unwrap_or(0);
        GenerationSummary {
            generation: self.generation,
            best_fitness: self
                .members
                .get(best_index)
                .map_or(0.0, |m| m.network.fitness),
            mean_fitness: total / self.members.len().max(1) as f32,
            best_index,
        }
    }

    fn next_generation(&mut self, ranking: &[usize]) -> Result<Vec<Network>, PopulationError> {
        let size = self.config.size;
        let keep_best = self.config.keep_best.min(ranking.len());
        let fresh_from = size - self.config.leave_worst;

        let retained: Vec<Network> = ranking[..keep_best]
            .iter()
            .map(|&i| self.members[i].network.clone())
            .collect();

        (0..size)
            .map(|slot| -> Result<Network, PopulationError> {
                let mut network = if slot < keep_best {
                    retained[slot].clone()
                } else if slot >= fresh_from || retained.is_empty() {
                    let genome = Genome::initial(&self.config.genome, &mut self.rng)?;
                    Network::from_genome(&genome)?
                } else {
                    retained[(slot - keep_best) % keep_best].clone()
                };
                network.fitness = 0.0;
                Ok(network)
            })
            .collect()
    }

    fn spawn_generation<W: World + ?Sized>(&mut self, world: &mut W, networks: Vec<Network>) {
        self.members = networks
            .into_iter()
            .enumerate()
            .map(|(index, network)| Member {
                handle: world.spawn(index),
                agent: Agent::new(
                    index,
                    &self.config.agent,
                    network.num_outputs(),
                    self.reporter.clone(),
                ),
                network,
                reported: false,
            })
            .collect();
        self.alive_count = self.members.len();
    }
}
