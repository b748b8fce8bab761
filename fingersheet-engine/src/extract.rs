//! Note extraction from OCR text or a parsed MusicXML document

use crate::model::{MusicElement, Note, Pitch};
use crate::musicxml::ScoreDocument;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, warn};

/// Letter A-G, optional `#`/`b`, one octave digit
static NOTE_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[A-G][#b]?[0-9]").expect("note pattern is valid"));

/// Where the notes of a sheet come from
#[derive(Debug, Clone)]
pub enum SheetSource {
    /// Text recognized from an image or PDF
    Text(String),
    /// Parsed MusicXML
    Document(ScoreDocument),
}

/// Notes and chords of a sheet, in source order
pub fn extract_notes(source: &SheetSource) -> Vec<MusicElement> {
    match source {
        SheetSource::Text(text) => extract_notes_from_text(text),
        SheetSource::Document(document) => document.elements().to_vec(),
    }
}

/// Scan text for note names such as `C4`, `D#5`, `Bb3`
///
/// Every match yields one note; repeats are kept. Pitches above G9 are kept
/// as spelled; only text that cannot be read as a pitch is skipped.
pub fn extract_notes_from_text(text: &str) -> Vec<MusicElement> {
    let mut notes = Vec::new();
    for m in NOTE_PATTERN.find_iter(text) {
        match m.as_str().parse::<Pitch>() {
            Ok(pitch) => notes.push(MusicElement::Note(Note::new(pitch))),
            Err(e) => warn!(candidate = m.as_str(), error = %e, "Skipping malformed note"),
        }
    }
    debug!(count = notes.len(), "Extracted notes from text");
    notes
}
