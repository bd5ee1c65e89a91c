//! Foraging survival run in a toy square arena.
//!
//! Agents feel the walls with three rays, steer with two tanh outputs, and
//! gain energy by driving over plants. Touching a wall is fatal. Fitness is
//! the number of plants eaten before dying.
//!
//! Run with: `RUST_LOG=forage_neat=info cargo run --example survival`

use std::f32::consts::TAU;

use forage_neat::{
    AgentHandle, Contact, MotorCommand, Population, PopulationConfig, PopulationError, World,
};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use slotmap::SlotMap;
use tracing::info;
use tracing_subscriber::EnvFilter;

const ARENA_SIZE: f32 = 100.0;
const PLANT_COUNT: usize = 30;
const PLANT_RADIUS: f32 = 3.0;
const MAX_SPEED: f32 = 12.0;
const MAX_TURN_RATE: f32 = 3.0;
const DT: f32 = 0.1;
const GENERATIONS: u32 = 25;

#[derive(Debug, Clone, Copy)]
struct Point {
    x: f32,
    y: f32,
}

impl Point {
    fn random(rng: &mut ChaCha8Rng) -> Self {
        let margin = PLANT_RADIUS * 2.0;
        Self {
            x: rng.random_range(margin..ARENA_SIZE - margin),
            y: rng.random_range(margin..ARENA_SIZE - margin),
        }
    }

    fn distance(self, other: Self) -> f32 {
        (self.x - other.x).hypot(self.y - other.y)
    }

    fn inside_arena(self) -> bool {
        (0.0..=ARENA_SIZE).contains(&self.x) && (0.0..=ARENA_SIZE).contains(&self.y)
    }
}

#[derive(Debug)]
struct Body {
    position: Point,
    heading: f32,
    contacts: Vec<Contact>,
}

struct Arena {
    bodies: SlotMap<AgentHandle, Body>,
    plants: Vec<Point>,
    rng: ChaCha8Rng,
}

impl Arena {
    fn new(seed: u64) -> Self {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let plants = (0..PLANT_COUNT).map(|_| Point::random(&mut rng)).collect();
        Self {
            bodies: SlotMap::with_key(),
            plants,
            rng,
        }
    }

    /// Distance from `origin` along `angle` to the nearest wall.
    fn wall_distance(origin: Point, angle: f32) -> f32 {
        let (dy, dx) = angle.sin_cos();
        let along = |pos: f32, dir: f32| {
            if dir > f32::EPSILON {
                (ARENA_SIZE - pos) / dir
            } else if dir < -f32::EPSILON {
                -pos / dir
            } else {
                f32::INFINITY
            }
        };
        along(origin.x, dx).min(along(origin.y, dy)).max(0.0)
    }
}

impl World for Arena {
    fn spawn(&mut self, _population_index: usize) -> AgentHandle {
        let body = Body {
            position: Point {
                x: ARENA_SIZE / 2.0,
                y: ARENA_SIZE / 2.0,
            },
            heading: self.rng.random_range(0.0..TAU),
            contacts: Vec::new(),
        };
        self.bodies.insert(body)
    }

    fn is_present(&self, handle: AgentHandle) -> bool {
        self.bodies.contains_key(handle)
    }

    fn despawn(&mut self, handle: AgentHandle) {
        self.bodies.remove(handle);
    }

    fn cast_rays(
        &mut self,
        handle: AgentHandle,
        offsets: &[f32],
        max_distance: f32,
        hits: &mut [Option<f32>],
    ) {
        let Some(body) = self.bodies.get(handle) else {
            hits.fill(None);
            return;
        };
        for (hit, offset) in hits.iter_mut().zip(offsets) {
            let distance = Self::wall_distance(body.position, body.heading + offset);
            *hit = (distance <= max_distance).then_some(distance);
        }
    }

    fn apply_motor(&mut self, handle: AgentHandle, command: MotorCommand) {
        let Some(body) = self.bodies.get_mut(handle) else {
            return;
        };
        body.heading = (body.heading + command.turn * MAX_TURN_RATE * DT).rem_euclid(TAU);
        let (dy, dx) = body.heading.sin_cos();
        let step = command.forward_thrust * MAX_SPEED * DT;
        body.position.x += dx * step;
        body.position.y += dy * step;

        if !body.position.inside_arena() {
            body.contacts.push(Contact::Hazard);
            return;
        }
        for plant in &mut self.plants {
            if plant.distance(body.position) <= PLANT_RADIUS {
                body.contacts.push(Contact::Reward);
                *plant = Point::random(&mut self.rng);
            }
        }
    }

    fn take_contacts(&mut self, handle: AgentHandle) -> Vec<Contact> {
        self.bodies
            .get_mut(handle)
            .map(|b| std::mem::take(&mut b.contacts))
            .unwrap_or_default()
    }
}

fn main() -> Result<(), PopulationError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = PopulationConfig {
        size: 30,
        keep_best: 6,
        leave_worst: 6,
        rng_seed: Some(42),
        ..PopulationConfig::default()
    };

    let mut arena = Arena::new(7);
    let mut population = Population::initialize(config, &mut arena)?;

    let mut ticks = 0_u64;
    while population.generation() <= GENERATIONS {
        let summary = population.tick(&mut arena, DT)?;
        ticks += 1;
        if summary.repopulated {
            if let Some(last) = population.history().last() {
                info!(
                    generation = last.generation,
                    best = last.best_fitness,
                    mean = last.mean_fitness,
                    ticks,
                    "generation finished"
                );
            }
            ticks = 0;
        }
    }

    let best = population
        .history()
        .iter()
        .map(|s| s.best_fitness)
        .fold(0.0_f32, f32::max);
    println!("Best fitness over {GENERATIONS} generations: {best}");
    Ok(())
}
