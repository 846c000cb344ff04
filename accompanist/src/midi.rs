// MIDI input and output.
//
// Input: every track of a Standard MIDI File is scanned for note events.
// Deltas are summed into absolute ticks; a NoteOn with non-zero velocity
// opens a note for its (channel, key) and the next NoteOff (or NoteOn with
// velocity 0) on the same pair closes it. The percussion channel is
// ignored. The bar length comes from the first time-signature event (4/4
// if there is none) unless the config overrides it.
//
// Output: the source file is copied and one accompaniment track is
// appended. Each chord's three tones start together at its bar's onset and
// are released together exactly one bar later. Notes are placed in the
// melody's average octave at its average velocity.
//
// Uses the `midly` crate for parsing and writing.

use crate::error::AccompanimentError;
use crate::melody::{Melody, NoteEvent};
use midly::{
    Format, MetaMessage, MidiMessage, Smf, Timing, Track, TrackEvent, TrackEventKind,
    num::{u4, u7, u28},
};
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, warn};

/// General MIDI percussion channel (channel 10, zero-based 9).
const DRUM_CHANNEL: u8 = 9;

const TRACK_NAME: &[u8] = b"Accompaniment";

pub fn parse(bytes: &[u8]) -> Result<Smf<'_>, AccompanimentError> {
    Ok(Smf::parse(bytes)?)
}

pub fn ticks_per_quarter(smf: &Smf) -> Result<u32, AccompanimentError> {
    match smf.header.timing {
        Timing::Metrical(tpq) => Ok(tpq.as_int() as u32),
        Timing::Timecode(..) => Err(AccompanimentError::UnsupportedTiming),
    }
}

/// Bar length in ticks from the first time signature, defaulting to 4/4.
pub fn bar_ticks(smf: &Smf) -> Result<u32, AccompanimentError> {
    let tpq = ticks_per_quarter(smf)?;
    let signature = smf
        .tracks
        .iter()
        .flat_map(|track| track.iter())
        .find_map(|event| match event.kind {
            TrackEventKind::Meta(MetaMessage::TimeSignature(num, den_pow, _, _)) => {
                Some((num, den_pow))
            }
            _ => None,
        });

    let whole_note = tpq * 4;
    let ticks = signature
        .and_then(|(num, den_pow)| {
            let denominator = 1u32.checked_shl(den_pow as u32)?;
            Some(whole_note * num as u32 / denominator)
        })
        .filter(|&t| t > 0)
        .unwrap_or(whole_note);
    Ok(ticks)
}

/// Extract the melody's note events from a parsed file.
///
/// Notes on the GM percussion channel are skipped: drum keys are instruments,
/// not pitches.
pub fn melody_from_smf(
    smf: &Smf,
    bar_ticks_override: Option<u32>,
) -> Result<Melody, AccompanimentError> {
    let bar = match bar_ticks_override {
        Some(ticks) => ticks,
        None => bar_ticks(smf)?,
    };

    // (sequence number, note): the sequence number records note-on order so
    // simultaneous onsets keep file order.
    let mut notes: Vec<(usize, NoteEvent)> = Vec::new();
    let mut sequence = 0usize;

    for (track_index, track) in smf.tracks.iter().enumerate() {
        let mut tick: u32 = 0;
        let mut open: HashMap<(u8, u8), (usize, u32, u8)> = HashMap::new();

        for event in track {
            tick = tick
                .checked_add(event.delta.as_int())
                .ok_or(AccompanimentError::TrackTooLong { track: track_index })?;
            let TrackEventKind::Midi { channel, message } = event.kind else {
                continue;
            };
            let channel = channel.as_int();
            if channel == DRUM_CHANNEL {
                continue;
            }
            match message {
                MidiMessage::NoteOn { key, vel } if vel.as_int() > 0 => {
                    let key = key.as_int();
                    let opened = (sequence, tick, vel.as_int());
                    sequence += 1;
                    if let Some((seq, onset, velocity)) = open.insert((channel, key), opened) {
                        // Retriggered before release: end the earlier note here.
                        notes.push((seq, note_event(key, onset, tick, velocity)));
                    }
                }
                MidiMessage::NoteOn { key, .. } | MidiMessage::NoteOff { key, .. } => {
                    let key = key.as_int();
                    match open.remove(&(channel, key)) {
                        Some((seq, onset, velocity)) => {
                            notes.push((seq, note_event(key, onset, tick, velocity)));
                        }
                        None => {
                            warn!(track_index, tick, key, "note-off without a matching note-on")
                        }
                    }
                }
                _ => {}
            }
        }

        // Notes never released end with their track.
        let mut dangling: Vec<_> = open.into_iter().collect();
        dangling.sort_by_key(|&(_, (seq, _, _))| seq);
        for ((_, key), (seq, onset, velocity)) in dangling {
            warn!(track_index, key, "note still sounding at end of track");
            notes.push((seq, note_event(key, onset, tick, velocity)));
        }
    }

    notes.sort_by_key(|&(seq, note)| (note.onset, seq));
    debug!(notes = notes.len(), bar_ticks = bar, "read melody");
    Melody::new(notes.into_iter().map(|(_, n)| n).collect(), bar)
}

fn note_event(pitch: u8, onset: u32, end: u32, velocity: u8) -> NoteEvent {
    NoteEvent {
        pitch,
        onset,
        duration: end - onset,
        velocity,
    }
}

/// How to place chord tones in the rendered track.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderParams {
    pub velocity: u8,
    /// Octave number; tone `t` becomes MIDI note `octave * 12 + t`.
    pub octave: u8,
    pub bar_ticks: u32,
    pub program: u8,
}

impl RenderParams {
    pub fn for_melody(melody: &Melody, program: u8) -> Self {
        RenderParams {
            velocity: melody.average_velocity(),
            octave: melody.average_register(),
            bar_ticks: melody.bar_ticks(),
            program,
        }
    }
}

/// Lowest non-percussion channel the source file does not use.
fn free_channel(smf: &Smf) -> u8 {
    let mut used = [false; 16];
    for event in smf.tracks.iter().flat_map(|t| t.iter()) {
        if let TrackEventKind::Midi { channel, .. } = event.kind {
            used[channel.as_int() as usize] = true;
        }
    }
    (0u8..16)
        .find(|&ch| ch != DRUM_CHANNEL && !used[ch as usize])
        .unwrap_or(0)
}

fn midi_event<'a>(delta: u32, channel: u4, message: MidiMessage) -> TrackEvent<'a> {
    TrackEvent {
        delta: u28::new(delta),
        kind: TrackEventKind::Midi { channel, message },
    }
}

/// Build the accompaniment track: one block chord per bar.
pub fn accompaniment_track<'a>(
    chords: &[[u8; 3]],
    params: &RenderParams,
    channel: u8,
) -> Track<'a> {
    let channel = u4::new(channel);
    let velocity = u7::new(params.velocity.min(127));
    let base = params.octave as u16 * 12;
    let key_of = |tone: u8| u7::new((base + tone as u16).min(127) as u8);

    let mut track: Track<'a> = Vec::with_capacity(chords.len() * 6 + 3);
    track.push(TrackEvent {
        delta: u28::new(0),
        kind: TrackEventKind::Meta(MetaMessage::TrackName(TRACK_NAME)),
    });
    track.push(midi_event(
        0,
        channel,
        MidiMessage::ProgramChange {
            program: u7::new(params.program.min(127)),
        },
    ));

    for chord in chords {
        for &tone in chord {
            track.push(midi_event(
                0,
                channel,
                MidiMessage::NoteOn {
                    key: key_of(tone),
                    vel: velocity,
                },
            ));
        }
        for (i, &tone) in chord.iter().enumerate() {
            let delta = if i == 0 { params.bar_ticks } else { 0 };
            track.push(midi_event(
                delta,
                channel,
                MidiMessage::NoteOff {
                    key: key_of(tone),
                    vel: velocity,
                },
            ));
        }
    }

    track.push(TrackEvent {
        delta: u28::new(0),
        kind: TrackEventKind::Meta(MetaMessage::EndOfTrack),
    });
    track
}

/// Copy `source` and append the accompaniment track.
pub fn render_accompaniment<'a>(
    source: &Smf<'a>,
    chords: &[[u8; 3]],
    params: &RenderParams,
) -> Smf<'a> {
    let mut smf = source.clone();
    if smf.header.format == Format::SingleTrack {
        smf.header.format = Format::Parallel;
    }
    let channel = free_channel(source);
    smf.tracks.push(accompaniment_track(chords, params, channel));
    smf
}

pub fn write_smf(smf: &Smf, path: &Path) -> Result<(), AccompanimentError> {
    let mut buf = Vec::new();
    smf.write_std(&mut buf)?;
    std::fs::write(path, &buf)?;
    Ok(())
}

/// `song.mid` -> `song_with_accompaniment.mid`, next to the input.
pub fn default_output_path(input: &Path) -> std::path::PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "melody".into());
    input.with_file_name(format!("{stem}_with_accompaniment.mid"))
}
