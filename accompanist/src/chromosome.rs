// Chromosomes (candidate accompaniments) and their fitness.
//
// A chromosome is one chord per bar. Fitness is an integer sum of two terms,
// accumulated per chord slot:
//
// - Stability: each chord scores `stable_chord` (+10), or `unstable_chord`
//   (-20) when its voicing is diminished or suspended.
// - Metrical alignment: bars fall into repeating 4-bar cycles. Every bar is
//   checked against the chromosome's *opening* material (the root of chord 0
//   and the pitch classes of chords 1 and 2), not against the bar's own chord.
//   This rewards an opening progression that keeps recurring across the
//   metrical grid. The whole-piece alignment is added once per chord slot.
//
// An optional tonic-framing bonus (+9) rewards chords rooted on the melody's
// first or last pitch class. It is off by default.
//
// Fitness is a pure function of the chromosome and the segmentation, so the
// population can score candidates in any order (or in parallel).

use crate::chord::{Chord, MutationTable};
use crate::melody::BarSegmentation;
use crate::pitch::PitchClassSet;
use accompanist_prng::SearchRng;
use serde::{Deserialize, Serialize};

/// Rewards for one position of the 4-bar metrical cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CycleWeights {
    /// Added when the opening chord's root sounds in the bar.
    pub root_match: i32,
    /// Added when any tone of chords 1 or 2 sounds in the bar.
    pub tone_match: i32,
    /// Added otherwise.
    pub tone_miss: i32,
}

/// All fitness constants. Tunable parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FitnessWeights {
    pub stable_chord: i32,
    pub unstable_chord: i32,
    /// Indexed by `bar % 4`.
    pub cycle: [CycleWeights; 4],
    /// Enables the tonic-framing bonus.
    pub tonic_framing: bool,
    pub tonic_framing_bonus: i32,
}

impl Default for FitnessWeights {
    fn default() -> Self {
        let strong = CycleWeights {
            root_match: 10,
            tone_match: 5,
            tone_miss: -10,
        };
        FitnessWeights {
            stable_chord: 10,
            unstable_chord: -20,
            cycle: [
                // Downbeat of the cycle.
                CycleWeights {
                    root_match: 20,
                    tone_match: 5,
                    tone_miss: -10,
                },
                // Weak position: a mismatch is tolerated.
                CycleWeights {
                    root_match: 8,
                    tone_match: 5,
                    tone_miss: 1,
                },
                strong,
                strong,
            ],
            tonic_framing: false,
            tonic_framing_bonus: 9,
        }
    }
}

/// A candidate accompaniment: one chord per bar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chromosome {
    chords: Vec<Chord>,
}

impl Chromosome {
    pub fn new(chords: Vec<Chord>) -> Self {
        Chromosome { chords }
    }

    pub fn chords(&self) -> &[Chord] {
        &self.chords
    }

    pub fn len(&self) -> usize {
        self.chords.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chords.is_empty()
    }

    /// Mutate every chord independently, in place.
    pub fn mutate_all(&mut self, rng: &mut SearchRng, table: MutationTable) {
        for chord in &mut self.chords {
            chord.mutate(rng, table);
        }
    }

    /// Unfolded chord tones per bar, ready for rendering.
    pub fn tones(&self) -> Vec<[u8; 3]> {
        self.chords.iter().map(Chord::tones).collect()
    }

    pub fn fitness(&self, segmentation: &BarSegmentation, weights: &FitnessWeights) -> i32 {
        debug_assert_eq!(
            self.chords.len(),
            segmentation.num_bars(),
            "chromosome length must equal the melody's bar count"
        );

        let alignment = self.metrical_alignment(segmentation, weights);
        let first = segmentation.first_pitch_class();
        let last = segmentation.last_pitch_class();

        self.chords
            .iter()
            .map(|chord| {
                let mut score = if chord.is_unstable() {
                    weights.unstable_chord
                } else {
                    weights.stable_chord
                };
                score += alignment;
                if weights.tonic_framing && (chord.root() == first || chord.root() == last) {
                    score += weights.tonic_framing_bonus;
                }
                score
            })
            .sum()
    }

    /// How well the opening chords recur across the bars of the melody.
    pub fn metrical_alignment(
        &self,
        segmentation: &BarSegmentation,
        weights: &FitnessWeights,
    ) -> i32 {
        let Some(opening) = self.chords.first() else {
            return 0;
        };
        let support: PitchClassSet = self
            .chords
            .iter()
            .skip(1)
            .take(2)
            .flat_map(|c| c.pitch_classes())
            .collect();

        segmentation
            .bars()
            .iter()
            .enumerate()
            .map(|(bar_index, bar)| {
                let w = &weights.cycle[bar_index % 4];
                let mut score = 0;
                if bar.contains(opening.root()) {
                    score += w.root_match;
                }
                score += if bar.intersects(&support) {
                    w.tone_match
                } else {
                    w.tone_miss
                };
                score
            })
            .sum()
    }
}
