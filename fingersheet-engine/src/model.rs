//! Music model: pitches, notes and chords
//!
//! Pitches are spelled with `#`/`b` accidentals (`C4`, `D#5`, `Bb3`) and map
//! to MIDI numbers with middle C = `C4` = 60.

use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Pitch text that cannot be read as step, accidentals and octave
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid pitch: {0}")]
pub struct InvalidPitch(pub String);

/// Step letter, chromatic alteration and octave
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Pitch {
    step: char,
    alter: i8,
    octave: i8,
}

impl Pitch {
    /// Build a pitch; `step` must be A-G (any case) and `alter` within -2..=2
    pub fn new(step: char, alter: i8, octave: i8) -> Result<Self, InvalidPitch> {
        let step = step.to_ascii_uppercase();
        if !matches!(step, 'A'..='G') || !(-2..=2).contains(&alter) {
            return Err(InvalidPitch(format!("{}{}{}", step, accidental(alter), octave)));
        }
        Ok(Self { step, alter, octave })
    }

    pub fn step(&self) -> char {
        self.step
    }

    pub fn alter(&self) -> i8 {
        self.alter
    }

    pub fn octave(&self) -> i8 {
        self.octave
    }

    /// MIDI note number (may fall outside 0..=127 for extreme spellings)
    pub fn midi(&self) -> i32 {
        (self.octave as i32 + 1) * 12 + pitch_class(self.step) + self.alter as i32
    }

    /// Step plus accidental, e.g. `F#`
    pub fn name(&self) -> String {
        format!("{}{}", self.step, accidental(self.alter))
    }

    /// Step, accidental and octave, e.g. `F#4`
    pub fn name_with_octave(&self) -> String {
        format!("{}{}", self.name(), self.octave)
    }
}

impl fmt::Display for Pitch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name_with_octave())
    }
}

impl FromStr for Pitch {
    type Err = InvalidPitch;

    /// Parse `C4`, `D#5`, `Bb3`, `F##2`, `Cb-1`. Spellings above G9 or
    /// below C-1 are kept; their MIDI number simply leaves 0..=127.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || InvalidPitch(s.to_string());
        let mut chars = s.chars();
        let step = chars.next().ok_or_else(invalid)?;

        let rest = chars.as_str();
        let accidentals: String = rest.chars().take_while(|c| *c == '#' || *c == 'b').collect();
        let alter = if accidentals.chars().all(|c| c == '#') {
            accidentals.len() as i8
        } else if accidentals.chars().all(|c| c == 'b') {
            -(accidentals.len() as i8)
        } else {
            return Err(invalid());
        };

        let octave: i8 = rest[accidentals.len()..].parse().map_err(|_| invalid())?;
        Pitch::new(step, alter, octave).map_err(|_| invalid())
    }
}

fn pitch_class(step: char) -> i32 {
    match step {
        'C' => 0,
        'D' => 2,
        'E' => 4,
        'F' => 5,
        'G' => 7,
        'A' => 9,
        'B' => 11,
        _ => 0,
    }
}

fn accidental(alter: i8) -> &'static str {
    match alter {
        2 => "##",
        1 => "#",
        -1 => "b",
        -2 => "bb",
        _ => "",
    }
}

/// A single sounding note
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Note {
    pub pitch: Pitch,
}

impl Note {
    pub fn new(pitch: Pitch) -> Self {
        Self { pitch }
    }

    pub fn midi(&self) -> i32 {
        self.pitch.midi()
    }

    pub fn name_with_octave(&self) -> String {
        self.pitch.name_with_octave()
    }
}

/// Notes struck together, in source order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chord {
    pub notes: Vec<Note>,
}

impl Chord {
    pub fn new(notes: Vec<Note>) -> Self {
        Self { notes }
    }

    /// Key used in fingering maps, e.g. `Chord {C4 | E4 | G4}`
    pub fn name(&self) -> String {
        let names: Vec<String> = self.notes.iter().map(Note::name_with_octave).collect();
        format!("Chord {{{}}}", names.join(" | "))
    }
}

/// Leaf element of a score: a note or a chord
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MusicElement {
    Note(Note),
    Chord(Chord),
}

impl MusicElement {
    /// Identifier used as the fingering map key
    pub fn key(&self) -> String {
        match self {
            MusicElement::Note(note) => note.name_with_octave(),
            MusicElement::Chord(chord) => chord.name(),
        }
    }
}
