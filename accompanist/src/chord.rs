// Chords and their voicing mutations.
//
// A `Chord` is a diatonic triad from the detected key's alphabet: a fixed
// root and scale degree, plus a mutable voicing shape. Voicing tones are
// `root + offset` and are not folded into one octave, so an inversion keeps
// its upward stacking when rendered (a C major second inversion is G-C-E as
// tones 7, 12, 16).
//
// Mutation proposes one alternate shape from a priority-ordered list:
// first inversion, second inversion, sus2, sus4. Suspended shapes are gated
// by scale degree so unstable chords never land on degrees where they sound
// wrong; a gated draw leaves the chord as it was.
//
// `Chord` is `Copy`: a chromosome owns its chords by value, so cloning a
// chromosome before mutating it can never alias another individual's chords.

use crate::key::{DIMINISHED_TRIAD, DiatonicEntry, Mode};
use crate::pitch::{PitchClass, pitch_class, pitch_name};
use accompanist_prng::SearchRng;
use serde::{Deserialize, Serialize};

/// Arrangement of a chord's three tones relative to its root.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Voicing {
    RootPosition,
    FirstInversion,
    SecondInversion,
    Sus2,
    Sus4,
    /// Only ever the starting shape of the key's diminished degree.
    Diminished,
}

impl Voicing {
    /// Semitone offsets from the root. Inversion offsets depend on whether the
    /// key is major or minor.
    pub fn offsets(self, mode: Mode) -> [u8; 3] {
        match (self, mode) {
            (Voicing::RootPosition, _) => mode.triad(),
            (Voicing::FirstInversion, Mode::Major) => [4, 7, 12],
            (Voicing::FirstInversion, Mode::Minor) => [3, 7, 12],
            (Voicing::SecondInversion, Mode::Major) => [7, 12, 16],
            (Voicing::SecondInversion, Mode::Minor) => [7, 12, 15],
            (Voicing::Sus2, _) => [0, 2, 7],
            (Voicing::Sus4, _) => [0, 5, 7],
            (Voicing::Diminished, _) => DIMINISHED_TRIAD,
        }
    }

    /// Diminished and suspended shapes are penalized by fitness.
    pub fn is_unstable(self) -> bool {
        matches!(self, Voicing::Diminished | Voicing::Sus2 | Voicing::Sus4)
    }
}

/// How `Chord::mutate` turns random draws into a voicing proposal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MutationTable {
    /// One draw decides to skip (50%); a second draw splits the remainder
    /// 30/30/20/20 across first inversion, second inversion, sus2, sus4.
    #[default]
    Gated,
    /// A single draw: 25% no-op, then 25/25/12.5/12.5 across the same shapes.
    Flat,
}

const GATED_SKIP_PROBABILITY: f64 = 0.5;

const GATED_SPLIT: [(f64, Voicing); 4] = [
    (0.3, Voicing::FirstInversion),
    (0.6, Voicing::SecondInversion),
    (0.8, Voicing::Sus2),
    (1.0, Voicing::Sus4),
];

const FLAT_SPLIT: [(f64, Option<Voicing>); 5] = [
    (0.25, None),
    (0.5, Some(Voicing::FirstInversion)),
    (0.75, Some(Voicing::SecondInversion)),
    (0.875, Some(Voicing::Sus2)),
    (1.0, Some(Voicing::Sus4)),
];

impl MutationTable {
    /// Draw the voicing a mutation proposes, or `None` for a no-op.
    pub fn draw(self, rng: &mut SearchRng) -> Option<Voicing> {
        match self {
            MutationTable::Gated => {
                if rng.chance(GATED_SKIP_PROBABILITY) {
                    return None;
                }
                let n = rng.unit();
                GATED_SPLIT
                    .iter()
                    .find(|(upper, _)| n < *upper)
                    .map(|&(_, v)| v)
            }
            MutationTable::Flat => {
                let n = rng.unit();
                FLAT_SPLIT
                    .iter()
                    .find(|(upper, _)| n < *upper)
                    .and_then(|&(_, v)| v)
            }
        }
    }
}

/// A diatonic chord with a mutable voicing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chord {
    root: PitchClass,
    /// Scale degree within the key, 1-7.
    degree: u8,
    mode: Mode,
    voicing: Voicing,
}

impl Chord {
    /// A root-position chord, or the diminished shape on the key's
    /// diminished degree.
    pub fn new(root: PitchClass, degree: u8, mode: Mode) -> Self {
        let voicing = if degree == mode.diminished_degree() {
            Voicing::Diminished
        } else {
            Voicing::RootPosition
        };
        Chord {
            root: root % 12,
            degree,
            mode,
            voicing,
        }
    }

    pub fn from_entry(entry: &DiatonicEntry, mode: Mode) -> Self {
        Chord::new(entry.root(), entry.degree, mode)
    }

    pub fn root(&self) -> PitchClass {
        self.root
    }

    pub fn degree(&self) -> u8 {
        self.degree
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn voicing(&self) -> Voicing {
        self.voicing
    }

    /// Whether this chord's degree and mode permit `voicing`.
    pub fn allows(&self, voicing: Voicing) -> bool {
        let forbidden: &[u8] = match (voicing, self.mode) {
            (Voicing::Sus2, Mode::Major) => &[3, 7],
            (Voicing::Sus2, Mode::Minor) => &[2, 5],
            (Voicing::Sus4, Mode::Major) => &[4, 7],
            (Voicing::Sus4, Mode::Minor) => &[2, 6],
            (Voicing::Diminished, mode) => {
                return self.degree == mode.diminished_degree();
            }
            _ => &[],
        };
        !forbidden.contains(&self.degree)
    }

    /// Switch to `voicing` if allowed. Returns whether the chord changed shape.
    pub fn try_revoice(&mut self, voicing: Voicing) -> bool {
        if !self.allows(voicing) {
            return false;
        }
        self.voicing = voicing;
        true
    }

    /// Maybe move to an alternate voicing, as drawn from `table`.
    pub fn mutate(&mut self, rng: &mut SearchRng, table: MutationTable) {
        if let Some(voicing) = table.draw(rng) {
            self.try_revoice(voicing);
        }
    }

    pub fn is_unstable(&self) -> bool {
        self.voicing.is_unstable()
    }

    /// The three tones as `root + offset`, unfolded (may exceed 11).
    pub fn tones(&self) -> [u8; 3] {
        self.voicing.offsets(self.mode).map(|offset| self.root + offset)
    }

    pub fn pitch_classes(&self) -> [PitchClass; 3] {
        self.tones().map(pitch_class)
    }

    /// Short display name, e.g. `C`, `Am`, `Bdim`, `Dsus4`, `G/2`.
    pub fn name(&self) -> String {
        let root = pitch_name(self.root);
        let quality = match self.mode {
            Mode::Major => "",
            Mode::Minor => "m",
        };
        match self.voicing {
            Voicing::RootPosition => format!("{root}{quality}"),
            Voicing::FirstInversion => format!("{root}{quality}/1"),
            Voicing::SecondInversion => format!("{root}{quality}/2"),
            Voicing::Sus2 => format!("{root}sus2"),
            Voicing::Sus4 => format!("{root}sus4"),
            Voicing::Diminished => format!("{root}dim"),
        }
    }
}
