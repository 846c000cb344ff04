// End-to-end harmonization of a melody.
//
// melody → key detection → bar segmentation → evolutionary search → chords.
// The segmentation and the detected key are built once here and lent
// read-only to the population for the whole run.

use crate::chromosome::Chromosome;
use crate::config::AccompanimentConfig;
use crate::error::AccompanimentError;
use crate::key::{DetectedKey, KeyDetector};
use crate::melody::{BarSegmentation, Melody};
use crate::population::{EvolutionResult, Population};
use accompanist_prng::SearchRng;
use tracing::info;

/// A finished accompaniment and how it was found.
#[derive(Debug, Clone)]
pub struct Accompaniment {
    pub key: DetectedKey,
    pub segmentation: BarSegmentation,
    pub seed: u64,
    pub evolution: EvolutionResult,
}

impl Accompaniment {
    pub fn chords(&self) -> &Chromosome {
        &self.evolution.best
    }

    /// Unfolded chord tones, one triple per bar.
    pub fn tones(&self) -> Vec<[u8; 3]> {
        self.evolution.best.tones()
    }
}

pub fn harmonize(
    melody: &Melody,
    config: &AccompanimentConfig,
) -> Result<Accompaniment, AccompanimentError> {
    config.validate()?;

    let key = KeyDetector::new().detect(
        &melody.unique_pitch_classes(),
        &melody.ordered_pitch_classes(),
    )?;
    let segmentation = melody.bar_segmentation();
    let seed = config.resolve_seed();
    info!(
        bars = segmentation.num_bars(),
        population = config.population_size,
        iterations = config.iterations,
        seed,
        "harmonizing in {}",
        key.name()
    );

    let evolution =
        Population::initialize(&segmentation, &key, config, SearchRng::new(seed))?.run();

    Ok(Accompaniment {
        key,
        segmentation,
        seed,
        evolution,
    })
}
