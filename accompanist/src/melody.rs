// The melody model: timed note events and the views the search needs.
//
// A `Melody` is an onset-ordered list of note events plus the bar length in
// ticks. From it the pipeline derives:
// - the unique pitch-class set and ordered pitch-class sequence (key.rs),
// - the bar count, which fixes every chromosome's length (population.rs),
// - the per-bar segmentation scored by fitness (chromosome.rs),
// - average velocity and register, used only when rendering (midi.rs).
//
// The segmentation is built once per run and shared read-only by every
// fitness evaluation.

use crate::error::AccompanimentError;
use crate::pitch::{PitchClass, PitchClassSet, pitch_class};
use serde::{Deserialize, Serialize};

/// One melody note, positioned in MIDI ticks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteEvent {
    /// MIDI note number (0-127).
    pub pitch: u8,
    /// Absolute start tick.
    pub onset: u32,
    /// Length in ticks. Zero-length notes still count toward their onset bar.
    pub duration: u32,
    /// Note-on velocity.
    pub velocity: u8,
}

impl NoteEvent {
    pub fn end(&self) -> u32 {
        self.onset + self.duration
    }
}

/// A monophonic melody in performance order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Melody {
    notes: Vec<NoteEvent>,
    bar_ticks: u32,
}

impl Melody {
    /// Build a melody from note events. Events are stably sorted by onset so
    /// simultaneous notes keep their input order.
    ///
    /// Fails with `EmptyMelody` if there are no notes: the last note and the
    /// averages are undefined without one.
    pub fn new(mut notes: Vec<NoteEvent>, bar_ticks: u32) -> Result<Self, AccompanimentError> {
        if notes.is_empty() {
            return Err(AccompanimentError::EmptyMelody);
        }
        if bar_ticks == 0 {
            return Err(AccompanimentError::InvalidConfig(
                "bar length must be at least one tick".into(),
            ));
        }
        notes.sort_by_key(|n| n.onset);
        Ok(Melody { notes, bar_ticks })
    }

    pub fn notes(&self) -> &[NoteEvent] {
        &self.notes
    }

    pub fn bar_ticks(&self) -> u32 {
        self.bar_ticks
    }

    pub fn unique_pitch_classes(&self) -> PitchClassSet {
        self.notes.iter().map(|n| pitch_class(n.pitch)).collect()
    }

    pub fn ordered_pitch_classes(&self) -> Vec<PitchClass> {
        self.notes.iter().map(|n| pitch_class(n.pitch)).collect()
    }

    pub fn first_pitch_class(&self) -> PitchClass {
        pitch_class(self.notes[0].pitch)
    }

    pub fn last_pitch_class(&self) -> PitchClass {
        pitch_class(self.notes[self.notes.len() - 1].pitch)
    }

    /// Tick at which the last sounding note ends.
    pub fn end_tick(&self) -> u32 {
        self.notes.iter().map(NoteEvent::end).max().unwrap_or(0)
    }

    /// Indices of the first and last bar a note sounds in.
    fn bar_span(&self, note: &NoteEvent) -> (usize, usize) {
        let first = (note.onset / self.bar_ticks) as usize;
        let last = if note.duration == 0 {
            first
        } else {
            ((note.end() - 1) / self.bar_ticks) as usize
        };
        (first, last)
    }

    /// Melody length in whole bars. A trailing partial bar counts as a full
    /// bar so that every note lands in some bar.
    pub fn duration_in_bars(&self) -> usize {
        self.notes
            .iter()
            .map(|n| self.bar_span(n).1 + 1)
            .max()
            .unwrap_or(1)
    }

    /// Pitch classes sounding in each bar. A note contributes to every bar
    /// whose window overlaps `[onset, onset + duration)`.
    pub fn bar_segmentation(&self) -> BarSegmentation {
        let num_bars = self.duration_in_bars();
        let mut bars = vec![PitchClassSet::new(); num_bars];

        for note in &self.notes {
            let (first_bar, last_bar) = self.bar_span(note);
            for bar in bars
                .iter_mut()
                .take(last_bar + 1)
                .skip(first_bar)
            {
                bar.insert(pitch_class(note.pitch));
            }
        }

        BarSegmentation {
            bars,
            first_pc: self.first_pitch_class(),
            last_pc: self.last_pitch_class(),
        }
    }

    /// Mean note-on velocity, rounded down.
    pub fn average_velocity(&self) -> u8 {
        let sum: u32 = self.notes.iter().map(|n| n.velocity as u32).sum();
        (sum / self.notes.len() as u32) as u8
    }

    /// Mean octave number (`pitch / 12`), rounded down.
    pub fn average_register(&self) -> u8 {
        let sum: u32 = self.notes.iter().map(|n| (n.pitch / 12) as u32).sum();
        (sum / self.notes.len() as u32) as u8
    }
}

/// The melody as fitness sees it: one pitch-class set per bar, plus the
/// melody's first and last pitch class for the tonic-framing bonus.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BarSegmentation {
    bars: Vec<PitchClassSet>,
    first_pc: PitchClass,
    last_pc: PitchClass,
}

impl BarSegmentation {
    /// Build a segmentation directly from bar contents. The first and last
    /// pitch classes are those of the melody the bars came from.
    pub fn from_bars(bars: Vec<PitchClassSet>, first_pc: PitchClass, last_pc: PitchClass) -> Self {
        BarSegmentation {
            bars,
            first_pc: first_pc % 12,
            last_pc: last_pc % 12,
        }
    }

    pub fn bars(&self) -> &[PitchClassSet] {
        &self.bars
    }

    pub fn num_bars(&self) -> usize {
        self.bars.len()
    }

    pub fn first_pitch_class(&self) -> PitchClass {
        self.first_pc
    }

    pub fn last_pitch_class(&self) -> PitchClass {
        self.last_pc
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BAR: u32 = 1920; // 4/4 at 480 ticks per quarter

    fn note(pitch: u8, onset: u32, duration: u32) -> NoteEvent {
        NoteEvent {
            pitch,
            onset,
            duration,
            velocity: 80,
        }
    }

    #[test]
    fn empty_melody_is_rejected() {
        let err = Melody::new(Vec::new(), BAR).unwrap_err();
        assert!(matches!(err, AccompanimentError::EmptyMelody));
    }

    #[test]
    fn notes_sorted_by_onset_and_last_note_is_latest() {
        let melody = Melody::new(vec![note(67, 960, 480), note(60, 0, 480)], BAR).unwrap();
        assert_eq!(melody.ordered_pitch_classes(), vec![0, 7]);
        assert_eq!(melody.first_pitch_class(), 0);
        assert_eq!(melody.last_pitch_class(), 7);
    }

    #[test]
    fn unique_pitch_classes_fold_octaves() {
        let melody = Melody::new(
            vec![note(60, 0, 480), note(72, 480, 480), note(64, 960, 480)],
            BAR,
        )
        .unwrap();
        let unique = melody.unique_pitch_classes();
        assert_eq!(unique.iter().collect::<Vec<_>>(), vec![0, 4]);
    }

    #[test]
    fn duration_rounds_partial_bar_up() {
        let exact = Melody::new(vec![note(60, 0, BAR * 2)], BAR).unwrap();
        assert_eq!(exact.duration_in_bars(), 2);

        let partial = Melody::new(vec![note(60, 0, BAR * 2 + 1)], BAR).unwrap();
        assert_eq!(partial.duration_in_bars(), 3);
    }

    #[test]
    fn long_note_appears_in_every_overlapped_bar() {
        // Starts late in bar 0 and ends just inside bar 2.
        let melody = Melody::new(
            vec![note(62, BAR - 10, BAR + 20), note(65, BAR * 3, BAR)],
            BAR,
        )
        .unwrap();
        let seg = melody.bar_segmentation();
        assert_eq!(seg.num_bars(), 4);
        assert!(seg.bars()[0].contains(2));
        assert!(seg.bars()[1].contains(2));
        assert!(seg.bars()[2].contains(2));
        assert!(!seg.bars()[3].contains(2));
        assert!(seg.bars()[3].contains(5));
    }

    #[test]
    fn note_ending_on_barline_does_not_leak() {
        let melody = Melody::new(vec![note(60, 0, BAR), note(67, BAR, BAR)], BAR).unwrap();
        let seg = melody.bar_segmentation();
        assert!(!seg.bars()[1].contains(0));
        assert!(seg.bars()[1].contains(7));
    }

    #[test]
    fn averages_round_down() {
        let melody = Melody::new(
            vec![
                NoteEvent {
                    pitch: 60,
                    onset: 0,
                    duration: 10,
                    velocity: 90,
                },
                NoteEvent {
                    pitch: 75,
                    onset: 10,
                    duration: 10,
                    velocity: 71,
                },
            ],
            BAR,
        )
        .unwrap();
        assert_eq!(melody.average_velocity(), 80);
        // Octaves 5 and 6 average to 5.
        assert_eq!(melody.average_register(), 5);
    }
}
