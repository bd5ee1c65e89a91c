//! Agents: one network bound to one body and its survival state.
//!
//! An agent turns ray hits into network inputs, network outputs into a
//! [`MotorCommand`], and contacts into energy and fitness. It lives until its
//! energy runs out or it touches a hazard, and then reports its fitness once
//! through the [`DeathReporter`] it was built with.

use std::f32::consts::FRAC_PI_4;
use std::sync::mpsc::{self, Receiver, Sender};

use serde::{Deserialize, Serialize};

use crate::network::{Network, NetworkError};
use crate::world::{AgentHandle, Contact, World};

/// How an agent perceives obstacles.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SensorConfig {
    /// Ray directions in radians relative to the heading; one network input each.
    pub ray_offsets: Vec<f32>,
    /// Rays report nothing beyond this distance.
    pub ray_distance: f32,
    /// Hit distances are divided by this before entering the network.
    pub hit_divider: f32,
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            ray_offsets: vec![0.0, FRAC_PI_4, -FRAC_PI_4],
            ray_distance: 50.0,
            hit_divider: 20.0,
        }
    }
}

impl SensorConfig {
    /// Number of readings produced per tick.
    #[must_use]
    pub fn ray_count(&self) -> usize {
        self.ray_offsets.len()
    }

    /// Normalized reading for one ray. A miss reads as open space at full range.
    #[must_use]
    pub fn reading(&self, hit: Option<f32>) -> f32 {
        hit.unwrap_or(self.ray_distance) / self.hit_divider
    }
}

/// Survival and scoring parameters shared by every agent of a population.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Energy an agent is born with.
    pub starting_energy: f32,
    /// Energy gained per consumed resource.
    pub reward_energy: f32,
    /// Fitness earned per consumed resource.
    pub fitness_multiplier: f32,
    /// Ray layout and normalization.
    pub sensors: SensorConfig,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            starting_energy: 10.0,
            reward_energy: 5.0,
            fitness_multiplier: 1.0,
            sensors: SensorConfig::default(),
        }
    }
}

/// Movement request for one tick, straight from the network's tanh outputs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MotorCommand {
    /// Forward (+) or backward (-) thrust in `[-1, 1]`.
    pub forward_thrust: f32,
    /// Turn rate in `[-1, 1]`.
    pub turn: f32,
}

impl MotorCommand {
    /// Read thrust from output 0 and turn from output 1; absent outputs read 0.
    #[must_use]
    pub fn from_outputs(outputs: &[f32]) -> Self {
        Self {
            forward_thrust: outputs.first().copied().unwrap_or(0.0),
            turn: outputs.get(1).copied().unwrap_or(0.0),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AgentStatus {
    Alive,
    Dead,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeathCause {
    /// Energy reached zero.
    Starvation,
    /// Touched a hazard; fitness is forfeited.
    Hazard,
}

/// Final score of one agent, sent once when it dies.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DeathReport {
    /// Slot of the agent in its population.
    pub population_index: usize,
    /// Fitness at the moment of death.
    pub overall_fitness: f32,
    pub cause: DeathCause,
}

/// Sending half of the death-report channel, handed to each agent at
/// construction. The population keeps the receiving half.
#[derive(Debug, Clone)]
pub struct DeathReporter {
    tx: Sender<DeathReport>,
}

impl DeathReporter {
    /// Create a reporter and the receiver its reports arrive on.
    #[must_use]
    pub fn channel() -> (Self, Receiver<DeathReport>) {
        let (tx, rx) = mpsc::channel();
        (Self { tx }, rx)
    }

    /// Send a report. Returns `false` if nobody is listening anymore.
    pub fn report(&self, report: DeathReport) -> bool {
        self.tx.send(report).is_ok()
    }
}

/// Sensing and control unit for one member of the population.
#[derive(Debug)]
pub struct Agent {
    population_index: usize,
    energy: f32,
    fitness_counter: u32,
    overall_fitness: f32,
    status: AgentStatus,
    config: AgentConfig,
    hits: Vec<Option<f32>>,
    readings: Vec<f32>,
    outputs: Vec<f32>,
    reporter: DeathReporter,
}

impl Agent {
    /// Create a live agent for slot `population_index`.
    ///
    /// `output_count` sizes the buffer the network writes into; it must match
    /// the network this agent will drive.
    #[must_use]
    pub fn new(
        population_index: usize,
        config: &AgentConfig,
        output_count: usize,
        reporter: DeathReporter,
    ) -> Self {
        let rays = config.sensors.ray_count();
        Self {
            population_index,
            energy: config.starting_energy,
            fitness_counter: 0,
            overall_fitness: 0.0,
            status: AgentStatus::Alive,
            config: config.clone(),
            hits: vec![None; rays],
            readings: vec![0.0; rays],
            outputs: vec![0.0; output_count],
            reporter,
        }
    }

    /// Convert raw ray hits into network inputs.
    pub fn sense(&mut self, hits: &[Option<f32>]) {
        let sensors = &self.config.sensors;
        for (reading, &hit) in self.readings.iter_mut().zip(hits) {
            *reading = sensors.reading(hit);
        }
    }

    /// Run the network on the current readings and derive a motor command.
    ///
    /// # Errors
    ///
    /// Propagates evaluation errors; the agent's state is left unchanged.
    pub fn control(&mut self, network: &mut Network) -> Result<MotorCommand, NetworkError> {
        network.evaluate_into(&self.readings, &mut self.outputs)?;
        Ok(MotorCommand::from_outputs(&self.outputs))
    }

    /// A resource was consumed.
    pub fn consume_reward(&mut self) {
        if self.is_alive() {
            self.energy += self.config.reward_energy;
            self.fitness_counter += 1;
        }
    }

    /// A hazard was touched: fitness drops to zero and the agent dies.
    pub fn hit_hazard(&mut self) {
        if self.is_alive() {
            self.overall_fitness = 0.0;
            self.die(DeathCause::Hazard);
        }
    }

    /// Burn `dt` energy, refresh fitness, and die once energy is gone.
    pub fn tick(&mut self, dt: f32) {
        if !self.is_alive() {
            return;
        }
        self.energy -= dt;
        self.overall_fitness = self.fitness_counter as f32 * self.config.fitness_multiplier;
        if self.energy <= 0.0 {
            self.die(DeathCause::Starvation);
        }
    }

    /// One full simulation step against the host world.
    ///
    /// Senses, evaluates, moves, applies contacts, then burns energy. A
    /// failed evaluation skips the motor command but not the rest of the
    /// step, so a broken network still starves. The body is despawned the
    /// moment the agent dies.
    ///
    /// # Errors
    ///
    /// Returns the evaluation error after the step has completed.
    pub fn step<W: World + ?Sized>(
        &mut self,
        handle: AgentHandle,
        network: &mut Network,
        world: &mut W,
        dt: f32,
    ) -> Result<(), NetworkError> {
        if !self.is_alive() {
            return Ok(());
        }

        let sensors = &self.config.sensors;
        world.cast_rays(handle, &sensors.ray_offsets, sensors.ray_distance, &mut self.hits);
        let hits = std::mem::take(&mut self.hits);
        self.sense(&hits);
        self.hits = hits;

        let evaluated = self.control(network);
        if let Ok(command) = evaluated {
            world.apply_motor(handle, command);
        }

        for contact in world.take_contacts(handle) {
            match contact {
                Contact::Reward => self.consume_reward(),
                Contact::Hazard => self.hit_hazard(),
            }
        }

        self.tick(dt);

        if !self.is_alive() {
            world.despawn(handle);
        }

        evaluated.map(|_| ())
    }

    fn die(&mut self, cause: DeathCause) {
        self.status = AgentStatus::Dead;
        // a closed channel means the population is gone; nothing left to tell
        let _ = self.reporter.report(DeathReport {
            population_index: self.population_index,
            overall_fitness: self.overall_fitness,
            cause,
        });
    }

    #[must_use]
    pub fn is_alive(&self) -> bool {
        self.status == AgentStatus::Alive
    }

    #[must_use]
    pub fn status(&self) -> AgentStatus {
        self.status
    }

    #[must_use]
    pub fn population_index(&self) -> usize {
        self.population_index
    }

    #[must_use]
    pub fn energy(&self) -> f32 {
        self.energy
    }

    /// Resources consumed so far.
    #[must_use]
    pub fn fitness_counter(&self) -> u32 {
        self.fitness_counter
    }

    #[must_use]
    pub fn overall_fitness(&self) -> f32 {
        self.overall_fitness
    }

    /// Inputs fed to the network on the last step.
    #[must_use]
    pub fn readings(&self) -> &[f32] {
        &self.readings
    }
}
