//! Fingering assignment
//!
//! A note's finger comes from `(midi mod 4) + 1` looked up in one of three
//! fixed tables selected by skill level. Chords get one label per
//! constituent note, in chord order.

use crate::error::{EngineError, Result};
use crate::model::{MusicElement, Note};
use std::fmt;
use std::str::FromStr;

/// Label returned for an index missing from a table
pub const UNKNOWN_FINGER: &str = "Unknown";

const BEGINNER: [(i32, &str); 4] = [
    (1, "Index finger"),
    (2, "Middle finger"),
    (3, "Ring finger"),
    (4, "Pinky finger"),
];

const INTERMEDIATE: [(i32, &str); 4] = [
    (1, "Thumb"),
    (2, "Index finger"),
    (3, "Middle finger"),
    (4, "Ring finger"),
];

const ADVANCED: [(i32, &str); 4] = [
    (1, "Thumb"),
    (2, "Index finger"),
    (3, "Middle finger"),
    (4, "Pinky finger"),
];

/// Player skill level selecting the fingering table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkillLevel {
    Beginner,
    Intermediate,
    Advanced,
}

impl SkillLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            SkillLevel::Beginner => "beginner",
            SkillLevel::Intermediate => "intermediate",
            SkillLevel::Advanced => "advanced",
        }
    }

    fn table(&self) -> &'static [(i32, &'static str); 4] {
        match self {
            SkillLevel::Beginner => &BEGINNER,
            SkillLevel::Intermediate => &INTERMEDIATE,
            SkillLevel::Advanced => &ADVANCED,
        }
    }

    /// Finger label for a 1-based table index
    pub fn finger_label(&self, index: i32) -> &'static str {
        self.table()
            .iter()
            .find(|(i, _)| *i == index)
            .map(|(_, label)| *label)
            .unwrap_or(UNKNOWN_FINGER)
    }
}

impl FromStr for SkillLevel {
    type Err = EngineError;

    /// Exact tags only; no default for unknown input
    fn from_str(s: &str) -> Result<Self> {
        match s {
            "beginner" => Ok(SkillLevel::Beginner),
            "intermediate" => Ok(SkillLevel::Intermediate),
            "advanced" => Ok(SkillLevel::Advanced),
            other => Err(EngineError::UnknownSkillLevel(other.to_string())),
        }
    }
}

impl fmt::Display for SkillLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Table index for a MIDI pitch: `(midi mod 4) + 1`
pub fn finger_index(midi: i32) -> i32 {
    midi.rem_euclid(4) + 1
}

/// Recommended finger for one note
pub fn fingering_for_note(note: &Note, level: SkillLevel) -> &'static str {
    level.finger_label(finger_index(note.midi()))
}

/// Recommendation for a note or a chord
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fingering {
    Single(String),
    /// One label per chord note, in chord order
    Chord(Vec<String>),
}

impl fmt::Display for Fingering {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Fingering::Single(label) => f.write_str(label),
            Fingering::Chord(labels) => write!(f, "[{}]", labels.join(", ")),
        }
    }
}

/// Insertion-ordered map from element key to fingering
///
/// Re-inserting a key replaces its value but keeps its original position.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FingeringMap {
    entries: Vec<(String, Fingering)>,
}

impl FingeringMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, fingering: Fingering) {
        let key = key.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = fingering,
            None => self.entries.push((key, fingering)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&Fingering> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, f)| f)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Fingering)> {
        self.entries.iter().map(|(k, f)| (k.as_str(), f))
    }

    /// `"<key>: <fingering>"` lines in map order, as drawn on images
    pub fn display_lines(&self) -> Vec<String> {
        self.iter().map(|(k, f)| format!("{}: {}", k, f)).collect()
    }
}

impl<K: Into<String>> FromIterator<(K, Fingering)> for FingeringMap {
    fn from_iter<I: IntoIterator<Item = (K, Fingering)>>(iter: I) -> Self {
        let mut map = FingeringMap::new();
        for (key, fingering) in iter {
            map.insert(key, fingering);
        }
        map
    }
}

/// Compute fingerings for every extracted element
pub fn assign_fingerings(elements: &[MusicElement], level: SkillLevel) -> FingeringMap {
    let mut map = FingeringMap::new();
    for element in elements {
        let fingering = match element {
            MusicElement::Note(note) => Fingering::Single(fingering_for_note(note, level).to_string()),
            MusicElement::Chord(chord) => Fingering::Chord(
                chord
                    .notes
                    .iter()
                    .map(|n| fingering_for_note(n, level).to_string())
                    .collect(),
            ),
        };
        map.insert(element.key(), fingering);
    }
    map
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Chord, Pitch};

    fn note(name: &str) -> Note {
        Note::new(name.parse::<Pitch>().unwrap())
    }

    fn note_with_midi(midi: i32) -> Note {
        const STEPS: [(char, i8); 12] = [
            ('C', 0), ('C', 1), ('D', 0), ('D', 1), ('E', 0), ('F', 0),
            ('F', 1), ('G', 0), ('G', 1), ('A', 0), ('A', 1), ('B', 0),
        ];
        let (step, alter) = STEPS[(midi % 12) as usize];
        Note::new(Pitch::new(step, alter, (midi / 12) as i8 - 1).unwrap())
    }

    #[test]
    fn test_every_pitch_follows_the_modulo_law() {
        let beginner = ["Index finger", "Middle finger", "Ring finger", "Pinky finger"];
        let intermediate = ["Thumb", "Index finger", "Middle finger", "Ring finger"];
        let advanced = ["Thumb", "Index finger", "Middle finger", "Pinky finger"];

        for p in 0..=127 {
            let n = note_with_midi(p);
            assert_eq!(n.midi(), p);

            let slot = (p % 4) as usize;
            assert_eq!(fingering_for_note(&n, SkillLevel::Beginner), beginner[slot]);
            assert_eq!(fingering_for_note(&n, SkillLevel::Intermediate), intermediate[slot]);
            assert_eq!(fingering_for_note(&n, SkillLevel::Advanced), advanced[slot]);
        }
    }

    #[test]
    fn test_known_values() {
        // C4 = 60 -> index 1
        assert_eq!(fingering_for_note(&note("C4"), SkillLevel::Beginner), "Index finger");
        assert_eq!(fingering_for_note(&note("C4"), SkillLevel::Intermediate), "Thumb");
        // D#5 = 75 -> index 4
        assert_eq!(fingering_for_note(&note("D#5"), SkillLevel::Beginner), "Pinky finger");
        assert_eq!(fingering_for_note(&note("D#5"), SkillLevel::Intermediate), "Ring finger");
        assert_eq!(fingering_for_note(&note("D#5"), SkillLevel::Advanced), "Pinky finger");
        // Bb3 = 58 -> index 3
        assert_eq!(fingering_for_note(&note("Bb3"), SkillLevel::Advanced), "Middle finger");
    }

    #[test]
    fn test_index_outside_table_is_unknown() {
        assert_eq!(SkillLevel::Beginner.finger_label(0), UNKNOWN_FINGER);
        assert_eq!(SkillLevel::Advanced.finger_label(5), UNKNOWN_FINGER);
    }

    #[test]
    fn test_finger_index_is_never_negative() {
        assert_eq!(finger_index(-1), 4);
        assert_eq!(finger_index(0), 1);
        assert_eq!(finger_index(7), 4);
    }

    #[test]
    fn test_unknown_skill_level_fails_closed() {
        let err = "expert".parse::<SkillLevel>().unwrap_err();
        assert!(matches!(err, EngineError::UnknownSkillLevel(ref s) if s == "expert"));
        assert!("".parse::<SkillLevel>().is_err());
        assert!("Beginner".parse::<SkillLevel>().is_err());
        assert_eq!("advanced".parse::<SkillLevel>().unwrap(), SkillLevel::Advanced);
    }

    #[test]
    fn test_chord_fingering_matches_note_order() {
        let chord = Chord::new(vec![note("C4"), note("E4"), note("G4")]);
        let map = assign_fingerings(&[MusicElement::Chord(chord)], SkillLevel::Beginner);

        // C4=60 ->1, E4=64 ->1, G4=67 ->4
        assert_eq!(
            map.get("Chord {C4 | E4 | G4}"),
            Some(&Fingering::Chord(vec![
                "Index finger".to_string(),
                "Index finger".to_string(),
                "Pinky finger".to_string(),
            ]))
        );
    }

    #[test]
    fn test_map_keeps_first_position_on_repeat() {
        let elements = vec![
            MusicElement::Note(note("C4")),
            MusicElement::Note(note("D4")),
            MusicElement::Note(note("C4")),
        ];
        let map = assign_fingerings(&elements, SkillLevel::Intermediate);

        let keys: Vec<&str> = map.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["C4", "D4"]);
        assert_eq!(map.len(), 2);
    }

    #[test]
    fn test_display() {
        assert_eq!(Fingering::Single("Thumb".into()).to_string(), "Thumb");
        assert_eq!(
            Fingering::Chord(vec!["Thumb".into(), "Index finger".into()]).to_string(),
            "[Thumb, Index finger]"
        );

        let map: FingeringMap = vec![("C4", Fingering::Single("Thumb".into()))].into_iter().collect();
        assert_eq!(map.display_lines(), vec!["C4: Thumb".to_string()]);
    }
}
