// Evolutionary search over chord sequences.
//
// A `Population` holds `population_size` chromosomes with their fitness.
// Each generation:
// 1. Breed `population_size` offspring by crossing uniformly drawn parent
//    pairs (with replacement, from the whole population).
// 2. Clone every member and mutate all of the clone's chords.
// 3. Pool members, offspring and mutants (3x population size), score the new
//    candidates, stable-sort by fitness descending, and keep the top
//    `population_size`.
//
// Truncation is elitist: the current members are part of the pool, so the
// best fitness never decreases. Ties keep pool order (members, then
// offspring, then mutants), which together with the seeded `SearchRng` makes
// runs reproducible.
//
// Fitness is pure, so the pool is scored with rayon when
// `parallel_fitness` is set; `collect` keeps results in pool order.

use crate::chord::Chord;
use crate::chromosome::Chromosome;
use crate::config::AccompanimentConfig;
use crate::error::AccompanimentError;
use crate::key::DetectedKey;
use crate::melody::BarSegmentation;
use accompanist_prng::SearchRng;
use rayon::prelude::*;
use std::cmp::Reverse;
use tracing::{debug, info};

/// Outcome of a full run.
#[derive(Debug, Clone)]
pub struct EvolutionResult {
    /// The rank-0 chromosome of the final generation.
    pub best: Chromosome,
    pub best_fitness: i32,
    pub generations: usize,
    /// Best fitness after initialization, then after each generation.
    pub best_fitness_history: Vec<i32>,
}

pub struct Population<'a> {
    segmentation: &'a BarSegmentation,
    key: &'a DetectedKey,
    config: &'a AccompanimentConfig,
    rng: SearchRng,
    members: Vec<Chromosome>,
    /// Fitness of `members[i]`, kept alongside so members are scored once.
    fitness: Vec<i32>,
    generation: usize,
}

impl<'a> Population<'a> {
    /// Seed a random population: every bar slot of every chromosome is an
    /// independent uniform draw from the key's seven-chord alphabet.
    ///
    /// Fails if `config` does not validate (e.g. an empty population).
    pub fn initialize(
        segmentation: &'a BarSegmentation,
        key: &'a DetectedKey,
        config: &'a AccompanimentConfig,
        mut rng: SearchRng,
    ) -> Result<Self, AccompanimentError> {
        config.validate()?;
        let alphabet = key.alphabet();
        let num_bars = segmentation.num_bars();

        let members: Vec<Chromosome> = (0..config.population_size)
            .map(|_| {
                let chords = (0..num_bars)
                    .map(|_| {
                        let entry = &alphabet[rng.index(alphabet.len())];
                        Chord::from_entry(entry, key.mode())
                    })
                    .collect();
                Chromosome::new(chords)
            })
            .collect();

        let mut population = Population {
            segmentation,
            key,
            config,
            rng,
            members: Vec::new(),
            fitness: Vec::new(),
            generation: 0,
        };
        population.fitness = population.score(&members);
        population.members = members;
        Ok(population)
    }

    pub fn members(&self) -> &[Chromosome] {
        &self.members
    }

    pub fn fitness(&self) -> &[i32] {
        &self.fitness
    }

    pub fn generation(&self) -> usize {
        self.generation
    }

    pub fn key(&self) -> &DetectedKey {
        self.key
    }

    /// Child takes even slots from `a` and odd slots from `b`.
    pub fn crossover(a: &Chromosome, b: &Chromosome) -> Chromosome {
        debug_assert_eq!(a.len(), b.len(), "parents must have equal length");
        let chords = a
            .chords()
            .iter()
            .zip(b.chords())
            .enumerate()
            .map(|(i, (&from_a, &from_b))| if i % 2 == 0 { from_a } else { from_b })
            .collect();
        Chromosome::new(chords)
    }

    /// Index and fitness of the best member. Earliest wins ties.
    fn best_index(&self) -> (usize, i32) {
        self.fitness
            .iter()
            .copied()
            .enumerate()
            .fold((0, i32::MIN), |best, (i, f)| if f > best.1 { (i, f) } else { best })
    }

    pub fn best(&self) -> &Chromosome {
        &self.members[self.best_index().0]
    }

    pub fn best_fitness(&self) -> i32 {
        self.best_index().1
    }

    fn score(&self, candidates: &[Chromosome]) -> Vec<i32> {
        let segmentation = self.segmentation;
        let weights = &self.config.fitness;
        if self.config.parallel_fitness {
            candidates
                .par_iter()
                .map(|c| c.fitness(segmentation, weights))
                .collect()
        } else {
            candidates
                .iter()
                .map(|c| c.fitness(segmentation, weights))
                .collect()
        }
    }

    /// Stable sort of (chromosome, fitness) pairs, best first.
    fn rank(members: Vec<Chromosome>, fitness: Vec<i32>) -> (Vec<Chromosome>, Vec<i32>) {
        let mut scored: Vec<(Chromosome, i32)> = members.into_iter().zip(fitness).collect();
        scored.sort_by_key(|&(_, f)| Reverse(f));
        scored.into_iter().unzip()
    }

    /// Advance one generation.
    pub fn evolve(&mut self) {
        let size = self.config.population_size;

        if self.config.presort_parents {
            let (members, fitness) = Self::rank(
                std::mem::take(&mut self.members),
                std::mem::take(&mut self.fitness),
            );
            self.members = members;
            self.fitness = fitness;
        }

        let mut candidates = Vec::with_capacity(size * 2);
        for _ in 0..size {
            let a = self.rng.index(self.members.len());
            let b = self.rng.index(self.members.len());
            candidates.push(Self::crossover(&self.members[a], &self.members[b]));
        }
        for member in &self.members {
            let mut mutant = member.clone();
            mutant.mutate_all(&mut self.rng, self.config.mutation_table);
            candidates.push(mutant);
        }

        let candidate_fitness = self.score(&candidates);

        let mut pool = std::mem::take(&mut self.members);
        let mut pool_fitness = std::mem::take(&mut self.fitness);
        pool.extend(candidates);
        pool_fitness.extend(candidate_fitness);

        let (mut members, mut fitness) = Self::rank(pool, pool_fitness);
        members.truncate(size);
        fitness.truncate(size);
        self.members = members;
        self.fitness = fitness;
        self.generation += 1;

        debug!(
            generation = self.generation,
            best = self.fitness[0],
            worst = self.fitness[self.fitness.len() - 1],
            "evolved generation"
        );
    }

    /// Evolve for `config.iterations` generations and return the best chromosome.
    pub fn run(mut self) -> EvolutionResult {
        let mut history = Vec::with_capacity(self.config.iterations + 1);
        history.push(self.best_fitness());
        for _ in 0..self.config.iterations {
            self.evolve();
            history.push(self.best_fitness());
        }

        let (index, best_fitness) = self.best_index();
        info!(
            generations = self.generation,
            best_fitness, "evolution finished in {}", self.key.name()
        );
        EvolutionResult {
            best: self.members.swap_remove(index),
            best_fitness,
            generations: self.generation,
            best_fitness_history: history,
        }
    }
}
