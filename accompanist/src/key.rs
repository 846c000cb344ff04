// Key detection: choose a (tonic, mode) for the melody and its chord alphabet.
//
// For each of the 24 major/minor keys a `DiatonicTable` holds the seven
// triads built on the scale degrees. The triad quality is deliberately
// uniform per mode rather than full tonal harmony:
// - major keys: major triads on every degree, diminished on degree 7;
// - minor keys: minor triads on every degree, diminished on degree 2.
//
// Detection runs in three steps:
// 1. Build all 24 tables (owned by the `KeyDetector`, never shared globally).
// 2. Keep the keys whose seven roots cover every pitch class in the melody.
// 3. Pick one by looking at the melody's last note. In priority order, the
//    first candidate whose tonic, then mediant/dominant, then any other
//    degree equals the last note wins. Minor candidates are checked before
//    major ones at every tier; within a mode, tonics ascend from C.
//
// The winning table's seven entries become the alphabet population.rs
// samples chords from.

use crate::error::{AccompanimentError, KeyDetectionError};
use crate::pitch::{PitchClass, PitchClassSet, pitch_name};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, info};

/// Key quality. Minor means natural minor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Mode {
    Major,
    Minor,
}

impl Mode {
    /// Both modes in cascade order: minor first.
    pub const CASCADE_ORDER: [Mode; 2] = [Mode::Minor, Mode::Major];

    /// Semitone offsets from the tonic to each scale degree (degrees 1-7).
    pub fn intervals(self) -> [u8; 7] {
        match self {
            Mode::Major => [0, 2, 4, 5, 7, 9, 11],
            Mode::Minor => [0, 2, 3, 5, 7, 8, 10],
        }
    }

    /// The scale degree (1-7) that carries the diminished triad.
    pub fn diminished_degree(self) -> u8 {
        match self {
            Mode::Major => 7,
            Mode::Minor => 2,
        }
    }

    /// Root-position triad offsets for the mode's regular chords.
    pub fn triad(self) -> [u8; 3] {
        match self {
            Mode::Major => [0, 4, 7],
            Mode::Minor => [0, 3, 7],
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Major => write!(f, "major"),
            Mode::Minor => write!(f, "minor"),
        }
    }
}

/// Diminished triad offsets.
pub const DIMINISHED_TRIAD: [u8; 3] = [0, 3, 6];

/// One row of a diatonic table: a triad on a scale degree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiatonicEntry {
    /// Scale degree, 1-7.
    pub degree: u8,
    /// Root-position triad as pitch classes; `triad[0]` is the root.
    pub triad: [PitchClass; 3],
    pub diminished: bool,
}

impl DiatonicEntry {
    pub fn root(&self) -> PitchClass {
        self.triad[0]
    }
}

/// The seven diatonic triads of one key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiatonicTable {
    tonic: PitchClass,
    mode: Mode,
    entries: [DiatonicEntry; 7],
}

impl DiatonicTable {
    pub fn new(tonic: PitchClass, mode: Mode) -> Self {
        let tonic = tonic % 12;
        let entries = std::array::from_fn(|i| {
            let degree = i as u8 + 1;
            let root = (tonic + mode.intervals()[i]) % 12;
            let diminished = degree == mode.diminished_degree();
            let shape = if diminished {
                DIMINISHED_TRIAD
            } else {
                mode.triad()
            };
            DiatonicEntry {
                degree,
                triad: shape.map(|offset| (root + offset) % 12),
                diminished,
            }
        });
        DiatonicTable {
            tonic,
            mode,
            entries,
        }
    }

    pub fn tonic(&self) -> PitchClass {
        self.tonic
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn entries(&self) -> &[DiatonicEntry; 7] {
        &self.entries
    }

    /// Root of the given scale degree (1-7).
    pub fn root_of(&self, degree: u8) -> PitchClass {
        self.entries[(degree - 1) as usize].root()
    }

    /// The seven roots as a set.
    pub fn key_pitch_classes(&self) -> PitchClassSet {
        self.entries.iter().map(DiatonicEntry::root).collect()
    }
}

/// The key chosen for a melody, with the chord alphabet it implies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetectedKey {
    table: DiatonicTable,
}

impl DetectedKey {
    pub fn tonic(&self) -> PitchClass {
        self.table.tonic()
    }

    pub fn mode(&self) -> Mode {
        self.table.mode()
    }

    pub fn table(&self) -> &DiatonicTable {
        &self.table
    }

    /// The seven chords to choose from, each tagged with its scale degree.
    pub fn alphabet(&self) -> &[DiatonicEntry] {
        self.table.entries()
    }

    pub fn name(&self) -> String {
        format!("{} {}", pitch_name(self.tonic()), self.mode())
    }
}

/// Tie-break tiers, checked in order. Each lists the scale degrees whose root
/// the melody's last note must equal.
const CASCADE_TIERS: [&[u8]; 3] = [&[1], &[3, 5], &[2, 4, 6, 7]];

/// Holds the diatonic tables for all 24 keys.
#[derive(Debug, Clone)]
pub struct KeyDetector {
    major: Vec<DiatonicTable>,
    minor: Vec<DiatonicTable>,
}

impl Default for KeyDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyDetector {
    pub fn new() -> Self {
        KeyDetector {
            major: (0..12).map(|t| DiatonicTable::new(t, Mode::Major)).collect(),
            minor: (0..12).map(|t| DiatonicTable::new(t, Mode::Minor)).collect(),
        }
    }

    pub fn table(&self, tonic: PitchClass, mode: Mode) -> &DiatonicTable {
        match mode {
            Mode::Major => &self.major[(tonic % 12) as usize],
            Mode::Minor => &self.minor[(tonic % 12) as usize],
        }
    }

    /// Keys (ascending tonic) of the given mode whose roots cover `melody_pcs`.
    pub fn candidates(&self, melody_pcs: &PitchClassSet, mode: Mode) -> Vec<&DiatonicTable> {
        let tables = match mode {
            Mode::Major => &self.major,
            Mode::Minor => &self.minor,
        };
        tables
            .iter()
            .filter(|t| t.key_pitch_classes().is_superset(melody_pcs))
            .collect()
    }

    /// Detect the key of a melody from its unique pitch classes and its
    /// pitch classes in performance order.
    pub fn detect(
        &self,
        unique: &PitchClassSet,
        ordered: &[PitchClass],
    ) -> Result<DetectedKey, AccompanimentError> {
        let last_note = *ordered.last().ok_or(AccompanimentError::EmptyMelody)? % 12;

        let minor = self.candidates(unique, Mode::Minor);
        let major = self.candidates(unique, Mode::Major);
        debug!(
            minor = minor.len(),
            major = major.len(),
            "candidate keys for {unique}"
        );
        if minor.is_empty() && major.is_empty() {
            return Err(KeyDetectionError::NoCandidateKey {
                pitch_classes: *unique,
            }
            .into());
        }

        for (tier, degrees) in CASCADE_TIERS.iter().enumerate() {
            for mode in Mode::CASCADE_ORDER {
                let candidates = match mode {
                    Mode::Minor => &minor,
                    Mode::Major => &major,
                };
                let hit = candidates
                    .iter()
                    .find(|t| degrees.iter().any(|&d| t.root_of(d) == last_note));
                if let Some(table) = hit {
                    let key = DetectedKey {
                        table: (*table).clone(),
                    };
                    info!(tier = tier + 1, "detected key {}", key.name());
                    return Ok(key);
                }
            }
        }

        Err(KeyDetectionError::NoCascadeMatch.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(pcs: &[u8]) -> PitchClassSet {
        pcs.iter().copied().collect()
    }

    #[test]
    fn table_roots_follow_mode_offsets() {
        for tonic in 0..12 {
            for mode in [Mode::Major, Mode::Minor] {
                let table = DiatonicTable::new(tonic, mode);
                for (i, entry) in table.entries().iter().enumerate() {
                    assert_eq!(entry.degree, i as u8 + 1);
                    assert_eq!(entry.root(), (tonic + mode.intervals()[i]) % 12);
                }
            }
        }
    }

    #[test]
    fn triad_quality_is_uniform_per_mode() {
        let c_major = DiatonicTable::new(0, Mode::Major);
        // D gets a major triad here (D F# A), not the conventional D minor.
        assert_eq!(c_major.entries()[1].triad, [2, 6, 9]);
        // B diminished: B D F.
        assert_eq!(c_major.entries()[6].triad, [11, 2, 5]);
        assert!(c_major.entries()[6].diminished);

        let a_minor = DiatonicTable::new(9, Mode::Minor);
        // B diminished on degree 2.
        assert_eq!(a_minor.entries()[1].triad, [11, 2, 5]);
        assert!(a_minor.entries()[1].diminished);
        // C gets a minor triad (C Eb G).
        assert_eq!(a_minor.entries()[2].triad, [0, 3, 7]);
    }

    #[test]
    fn c_major_scale_ending_on_c_is_c_major() {
        let detector = KeyDetector::new();
        let unique = set(&[0, 2, 4, 5, 7, 9, 11]);
        let key = detector.detect(&unique, &[4, 2, 11, 0]).unwrap();
        assert_eq!(key.tonic(), 0);
        assert_eq!(key.mode(), Mode::Major);
        assert_eq!(key.name(), "C major");
    }

    #[test]
    fn minor_wins_tier_one_over_major() {
        // The C major scale ending on A: A minor's tonic matches at tier 1.
        let detector = KeyDetector::new();
        let unique = set(&[0, 2, 4, 5, 7, 9, 11]);
        let key = detector.detect(&unique, &[0, 9]).unwrap();
        assert_eq!((key.tonic(), key.mode()), (9, Mode::Minor));
    }

    #[test]
    fn tier_one_major_beats_tier_two_minor() {
        // {C, E, G} ending on G. E minor has G as its mediant (tier 2), but
        // G minor lacks E, so G major wins at tier 1.
        let detector = KeyDetector::new();
        let unique = set(&[0, 4, 7]);
        assert!(
            detector
                .candidates(&unique, Mode::Minor)
                .iter()
                .any(|t| t.tonic() == 4)
        );
        let key = detector.detect(&unique, &[0, 4, 7]).unwrap();
        assert_eq!((key.tonic(), key.mode()), (7, Mode::Major));
    }

    #[test]
    fn dominant_decides_at_tier_two() {
        // Candidates: B minor, E minor, D major, G major. No tonic is A; only
        // D major has A as mediant or dominant.
        let detector = KeyDetector::new();
        let key = detector.detect(&set(&[2, 4, 6, 7, 9]), &[2, 6, 9]).unwrap();
        assert_eq!((key.tonic(), key.mode()), (2, Mode::Major));
    }

    #[test]
    fn minor_wins_tier_two_tie() {
        // E is the dominant of A minor and the mediant of C major.
        let detector = KeyDetector::new();
        let unique = set(&[0, 2, 4, 5, 7, 9, 11]);
        let key = detector.detect(&unique, &[0, 4]).unwrap();
        assert_eq!((key.tonic(), key.mode()), (9, Mode::Minor));
    }

    #[test]
    fn remaining_degrees_decide_at_tier_three() {
        // Only C major and A minor cover the white keys. D, F and B are none
        // of their tonics, mediants or dominants, so tier three decides, and
        // the minor key is checked first.
        let detector = KeyDetector::new();
        let unique = set(&[0, 2, 4, 5, 7, 9, 11]);
        let minor = detector.candidates(&unique, Mode::Minor);
        let major = detector.candidates(&unique, Mode::Major);
        assert_eq!(minor.iter().map(|t| t.tonic()).collect::<Vec<_>>(), vec![9]);
        assert_eq!(major.iter().map(|t| t.tonic()).collect::<Vec<_>>(), vec![0]);

        for last in [2, 5, 11] {
            let key = detector.detect(&unique, &[0, last]).unwrap();
            assert_eq!((key.tonic(), key.mode()), (9, Mode::Minor), "ending on {last}");
        }
    }

    #[test]
    fn detected_key_always_covers_melody() {
        let detector = KeyDetector::new();
        let melodies: [&[u8]; 4] = [
            &[2, 4, 6, 7, 9],
            &[0, 3, 7, 10],
            &[1, 3, 5],
            &[9, 11, 0, 4, 9],
        ];
        for ordered in melodies {
            let unique: PitchClassSet = ordered.iter().copied().collect();
            let key = detector.detect(&unique, ordered).unwrap();
            assert!(
                key.table().key_pitch_classes().is_superset(&unique),
                "{} does not cover {unique}",
                key.name()
            );
        }
    }

    #[test]
    fn chromatic_melody_has_no_key() {
        let detector = KeyDetector::new();
        let unique = set(&[0, 1, 2, 3]);
        let err = detector.detect(&unique, &[0, 1, 2, 3]).unwrap_err();
        assert!(matches!(
            err,
            AccompanimentError::KeyDetection(KeyDetectionError::NoCandidateKey { .. })
        ));
    }

    #[test]
    fn empty_sequence_is_empty_melody() {
        let detector = KeyDetector::new();
        let err = detector.detect(&PitchClassSet::new(), &[]).unwrap_err();
        assert!(matches!(err, AccompanimentError::EmptyMelody));
    }

    #[test]
    fn alphabet_pairs_entries_with_degrees() {
        let detector = KeyDetector::new();
        let key = detector.detect(&set(&[0, 4, 7]), &[0]).unwrap();
        let degrees: Vec<u8> = key.alphabet().iter().map(|e| e.degree).collect();
        assert_eq!(degrees, vec![1, 2, 3, 4, 5, 6, 7]);
    }
}
