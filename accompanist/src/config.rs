// Data-driven run configuration.
//
// Every tunable of a run lives in `AccompanimentConfig`: search size,
// random seed, which mutation table and fitness variant to use, and the
// rendering parameters. It deserializes from JSON with every field optional
// (missing fields take their defaults), and CLI flags in main.rs override
// individual fields on top of a loaded file.
//
// **Determinism.** With `seed` set, the config plus the melody fully
// determine the output.

use crate::chord::MutationTable;
use crate::chromosome::FitnessWeights;
use crate::error::AccompanimentError;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AccompanimentConfig {
    /// Chromosomes kept per generation.
    pub population_size: usize,
    /// Generations to evolve.
    pub iterations: usize,
    /// RNG seed. `None` picks one from the system clock.
    pub seed: Option<u64>,
    pub mutation_table: MutationTable,
    pub fitness: FitnessWeights,
    /// Sort the population by fitness before breeding offspring.
    pub presort_parents: bool,
    /// Score the candidate pool on the rayon thread pool.
    pub parallel_fitness: bool,
    /// Bar length in ticks. `None` reads it from the MIDI time signature.
    pub bar_ticks: Option<u32>,
    /// General MIDI program for the accompaniment track (4 = electric piano).
    pub program: u8,
}

impl Default for AccompanimentConfig {
    fn default() -> Self {
        AccompanimentConfig {
            population_size: 100,
            iterations: 200,
            seed: None,
            mutation_table: MutationTable::Gated,
            fitness: FitnessWeights::default(),
            presort_parents: false,
            parallel_fitness: true,
            bar_ticks: None,
            program: 4,
        }
    }
}

impl AccompanimentConfig {
    pub fn load(path: &Path) -> Result<Self, AccompanimentError> {
        let data = std::fs::read_to_string(path)?;
        let config: AccompanimentConfig = serde_json::from_str(&data)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), AccompanimentError> {
        if self.population_size == 0 {
            return Err(AccompanimentError::InvalidConfig(
                "population_size must be at least 1".into(),
            ));
        }
        if self.bar_ticks == Some(0) {
            return Err(AccompanimentError::InvalidConfig(
                "bar_ticks must be at least 1".into(),
            ));
        }
        if self.program > 127 {
            return Err(AccompanimentError::InvalidConfig(
                "program must be in 0..=127".into(),
            ));
        }
        Ok(())
    }

    /// The configured seed, or one derived from the current time.
    pub fn resolve_seed(&self) -> u64 {
        self.seed.unwrap_or_else(|| {
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .map(|d| d.as_nanos() as u64)
                .unwrap_or(0)
        })
    }
}
