// Pitch classes and compact pitch-class sets.
//
// A pitch class is a note identity modulo the octave (0 = C, 1 = C#, ...,
// 11 = B). Almost every comparison in key detection and fitness scoring is a
// set-membership test over pitch classes, so sets are stored as a 12-bit mask:
// cheap to copy, compare, and intersect.
//
// Used by melody.rs (unique pitch classes, bar segmentation), key.rs (key
// pitch-class sets and the superset filter), and chord.rs (folded voicings).

use serde::{Deserialize, Serialize};
use std::fmt;

/// A note identity modulo 12, in `0..=11`.
pub type PitchClass = u8;

/// Fold any MIDI note number or unfolded chord tone into a pitch class.
pub fn pitch_class(note: u8) -> PitchClass {
    note % 12
}

/// Human-readable name for a pitch class (sharps for black keys except Eb/Bb/Ab).
pub fn pitch_name(pc: PitchClass) -> &'static str {
    match pc % 12 {
        0 => "C",
        1 => "C#",
        2 => "D",
        3 => "Eb",
        4 => "E",
        5 => "F",
        6 => "F#",
        7 => "G",
        8 => "Ab",
        9 => "A",
        10 => "Bb",
        11 => "B",
        _ => unreachable!(),
    }
}

/// A set of pitch classes, one bit per class.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PitchClassSet(u16);

impl PitchClassSet {
    const MASK: u16 = 0x0fff;

    pub fn new() -> Self {
        PitchClassSet(0)
    }

    /// Insert a pitch class. Values outside 0..11 are folded first.
    pub fn insert(&mut self, pc: PitchClass) {
        self.0 |= 1 << (pc % 12);
    }

    pub fn contains(&self, pc: PitchClass) -> bool {
        self.0 & (1 << (pc % 12)) != 0
    }

    pub fn is_empty(&self) -> bool {
        self.0 & Self::MASK == 0
    }

    pub fn len(&self) -> usize {
        (self.0 & Self::MASK).count_ones() as usize
    }

    /// True if every member of `self` is also in `other`.
    pub fn is_subset(&self, other: &PitchClassSet) -> bool {
        self.0 & !other.0 & Self::MASK == 0
    }

    pub fn is_superset(&self, other: &PitchClassSet) -> bool {
        other.is_subset(self)
    }

    /// True if the two sets share at least one pitch class.
    pub fn intersects(&self, other: &PitchClassSet) -> bool {
        self.0 & other.0 & Self::MASK != 0
    }

    /// Members in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = PitchClass> + '_ {
        (0u8..12).filter(move |&pc| self.contains(pc))
    }
}

impl FromIterator<PitchClass> for PitchClassSet {
    fn from_iter<I: IntoIterator<Item = PitchClass>>(iter: I) -> Self {
        let mut set = PitchClassSet::new();
        for pc in iter {
            set.insert(pc);
        }
        set
    }
}

impl fmt::Display for PitchClassSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.iter().map(pitch_name).collect();
        write!(f, "{{{}}}", names.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_folds_octaves() {
        let mut set = PitchClassSet::new();
        set.insert(16); // E an octave up
        assert!(set.contains(4));
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn subset_and_superset() {
        let c_major: PitchClassSet = [0, 2, 4, 5, 7, 9, 11].into_iter().collect();
        let triad: PitchClassSet = [0, 4, 7].into_iter().collect();
        let with_f_sharp: PitchClassSet = [0, 6].into_iter().collect();

        assert!(triad.is_subset(&c_major));
        assert!(c_major.is_superset(&triad));
        assert!(!with_f_sharp.is_subset(&c_major));
        assert!(PitchClassSet::new().is_subset(&triad));
    }

    #[test]
    fn intersects_and_iter_order() {
        let a: PitchClassSet = [11, 2, 7].into_iter().collect();
        let b: PitchClassSet = [7].into_iter().collect();
        let c: PitchClassSet = [1].into_iter().collect();
        assert!(a.intersects(&b));
        assert!(!a.intersects(&c));
        assert_eq!(a.iter().collect::<Vec<_>>(), vec![2, 7, 11]);
    }

    #[test]
    fn display_uses_note_names() {
        let set: PitchClassSet = [9, 0, 4].into_iter().collect();
        assert_eq!(set.to_string(), "{C, E, A}");
    }
}
