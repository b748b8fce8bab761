//! MusicXML reading and lyric annotation
//!
//! Both directions stream the document with `quick-xml`. Reading flattens all
//! parts into note/chord elements in document order; consecutive `<note>`s
//! carrying `<chord/>` join the preceding note. Rests and unpitched notes are
//! skipped.
//!
//! Annotation re-streams the original events unchanged and inserts a
//! `<lyric>` right before `</note>` of every element whose key has a
//! fingering. A chord's lyric goes on its first note.

use crate::error::{EngineError, Result};
use crate::fingering::FingeringMap;
use crate::model::{Chord, MusicElement, Note, Pitch};
use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use std::collections::HashMap;
use std::path::Path;
use tracing::debug;

/// Flattened notes and chords of a MusicXML score
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScoreDocument {
    elements: Vec<MusicElement>,
    /// Per element, the ordinal of the `<note>` that carries its lyric
    anchors: Vec<usize>,
}

impl ScoreDocument {
    pub fn elements(&self) -> &[MusicElement] {
        &self.elements
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }
}

#[derive(Debug, Clone, Copy)]
enum PitchField {
    Step,
    Alter,
    Octave,
}

/// Accumulates one `<note>` while it is being read
#[derive(Debug)]
struct NoteState {
    ordinal: usize,
    is_chord: bool,
    is_rest: bool,
    step: Option<char>,
    alter: i8,
    octave: Option<i8>,
}

impl NoteState {
    fn new(ordinal: usize) -> Self {
        Self {
            ordinal,
            is_chord: false,
            is_rest: false,
            step: None,
            alter: 0,
            octave: None,
        }
    }

    fn set(&mut self, field: PitchField, value: &str) -> Result<()> {
        let bad = || {
            EngineError::MusicXml(format!("invalid pitch value '{}' in note {}", value, self.ordinal + 1))
        };
        match field {
            PitchField::Step => self.step = Some(value.chars().next().ok_or_else(bad)?),
            // Microtonal alterations round to the nearest semitone
            PitchField::Alter => self.alter = value.parse::<f32>().map_err(|_| bad())?.round() as i8,
            PitchField::Octave => self.octave = Some(value.parse().map_err(|_| bad())?),
        }
        Ok(())
    }

    fn pitch(&self) -> Result<Option<Pitch>> {
        match (self.step, self.octave) {
            (Some(step), Some(octave)) => Pitch::new(step, self.alter, octave)
                .map(Some)
                .map_err(|e| EngineError::MusicXml(format!("{} in note {}", e, self.ordinal + 1))),
            _ => Ok(None),
        }
    }
}

/// Parse MusicXML text into its note/chord elements
pub fn parse_musicxml_str(xml: &str) -> Result<ScoreDocument> {
    let mut reader = Reader::from_str(xml);
    let mut document = ScoreDocument {
        elements: Vec::new(),
        anchors: Vec::new(),
    };

    let mut saw_score_root = false;
    let mut note_ordinal = 0usize;
    let mut current: Option<NoteState> = None;
    let mut in_pitch = false;
    let mut field: Option<PitchField> = None;
    let mut last_pitched: Option<usize> = None;

    loop {
        match reader.read_event()? {
            Event::Start(e) => match e.local_name().as_ref() {
                b"score-partwise" | b"score-timewise" => saw_score_root = true,
                b"note" => {
                    current = Some(NoteState::new(note_ordinal));
                    note_ordinal += 1;
                }
                b"pitch" if current.is_some() => in_pitch = true,
                b"step" if in_pitch => field = Some(PitchField::Step),
                b"alter" if in_pitch => field = Some(PitchField::Alter),
                b"octave" if in_pitch => field = Some(PitchField::Octave),
                b"chord" => mark(&mut current, |n| n.is_chord = true),
                b"rest" => mark(&mut current, |n| n.is_rest = true),
                _ => {}
            },
            Event::Empty(e) => match e.local_name().as_ref() {
                b"note" => note_ordinal += 1,
                b"chord" => mark(&mut current, |n| n.is_chord = true),
                b"rest" => mark(&mut current, |n| n.is_rest = true),
                _ => {}
            },
            Event::Text(t) => {
                if let (Some(f), Some(note)) = (field, current.as_mut()) {
                    let value = t.unescape()?;
                    note.set(f, value.trim())?;
                }
            }
            Event::End(e) => match e.local_name().as_ref() {
                b"step" | b"alter" | b"octave" => field = None,
                b"pitch" => in_pitch = false,
                b"note" => {
                    if let Some(state) = current.take() {
                        push_note(&mut document, state, &mut last_pitched)?;
                    }
                    in_pitch = false;
                    field = None;
                }
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
    }

    if !saw_score_root {
        return Err(EngineError::MusicXml(
            "not a MusicXML score (no score-partwise or score-timewise root)".to_string(),
        ));
    }

    debug!(elements = document.len(), notes = note_ordinal, "Parsed MusicXML");
    Ok(document)
}

fn mark(current: &mut Option<NoteState>, f: impl FnOnce(&mut NoteState)) {
    if let Some(note) = current.as_mut() {
        f(note);
    }
}

fn push_note(
    document: &mut ScoreDocument,
    state: NoteState,
    last_pitched: &mut Option<usize>,
) -> Result<()> {
    if state.is_rest {
        return Ok(());
    }
    let pitch = match state.pitch()? {
        Some(pitch) => pitch,
        None => return Ok(()),
    };
    let note = Note::new(pitch);

    let continues_chord = state.is_chord
        && state.ordinal > 0
        && *last_pitched == Some(state.ordinal - 1)
        && !document.elements.is_empty();

    if continues_chord {
        if let Some(last) = document.elements.last_mut() {
            match last {
                MusicElement::Note(prev) => {
                    *last = MusicElement::Chord(Chord::new(vec![prev.clone(), note]));
                }
                MusicElement::Chord(chord) => chord.notes.push(note),
            }
        }
    } else {
        document.elements.push(MusicElement::Note(note));
        document.anchors.push(state.ordinal);
    }

    *last_pitched = Some(state.ordinal);
    Ok(())
}

/// Read and parse a MusicXML file
pub fn parse_musicxml_path(path: &Path) -> Result<ScoreDocument> {
    let xml = std::fs::read_to_string(path)?;
    parse_musicxml_str(&xml)
}

/// Insert `Fingering: <value>` lyrics for every element found in `fingerings`
pub fn annotate_musicxml_str(xml: &str, fingerings: &FingeringMap) -> Result<String> {
    let document = parse_musicxml_str(xml)?;

    let mut lyrics: HashMap<usize, String> = HashMap::new();
    for (element, anchor) in document.elements.iter().zip(&document.anchors) {
        if let Some(fingering) = fingerings.get(&element.key()) {
            lyrics.insert(*anchor, format!("Fingering: {}", fingering));
        }
    }

    let mut reader = Reader::from_str(xml);
    let mut writer = Writer::new(Vec::with_capacity(xml.len() + lyrics.len() * 96));
    let mut note_ordinal = 0usize;
    let mut current: Option<usize> = None;
    let mut lyric_count = 0u32;

    loop {
        let event = reader.read_event()?;
        match &event {
            Event::Start(e) if e.local_name().as_ref() == b"note" => {
                current = Some(note_ordinal);
                note_ordinal += 1;
                lyric_count = 0;
            }
            Event::Empty(e) if e.local_name().as_ref() == b"note" => note_ordinal += 1,
            Event::Start(e) | Event::Empty(e)
                if e.local_name().as_ref() == b"lyric" && current.is_some() =>
            {
                lyric_count += 1;
            }
            // Lyrics must precede <play> and <listen> inside a note
            Event::Start(e) | Event::Empty(e)
                if matches!(e.local_name().as_ref(), b"play" | b"listen") && current.is_some() =>
            {
                if let Some(text) = current.take().and_then(|ordinal| lyrics.get(&ordinal)) {
                    write_lyric(&mut writer, lyric_count + 1, text)?;
                }
            }
            Event::End(e) if e.local_name().as_ref() == b"note" => {
                if let Some(text) = current.take().and_then(|ordinal| lyrics.get(&ordinal)) {
                    write_lyric(&mut writer, lyric_count + 1, text)?;
                }
            }
            Event::Eof => break,
            _ => {}
        }
        writer.write_event(event)?;
    }

    debug!(lyrics = lyrics.len(), "Annotated MusicXML");
    String::from_utf8(writer.into_inner())
        .map_err(|e| EngineError::MusicXml(format!("annotated document is not UTF-8: {}", e)))
}

fn write_lyric(writer: &mut Writer<Vec<u8>>, number: u32, text: &str) -> Result<()> {
    let number = number.to_string();
    let mut lyric = BytesStart::new("lyric");
    lyric.push_attribute(("number", number.as_str()));

    writer.write_event(Event::Start(lyric))?;
    writer.write_event(Event::Start(BytesStart::new("syllabic")))?;
    writer.write_event(Event::Text(BytesText::new("single")))?;
    writer.write_event(Event::End(BytesEnd::new("syllabic")))?;
    writer.write_event(Event::Start(BytesStart::new("text")))?;
    writer.write_event(Event::Text(BytesText::new(text)))?;
    writer.write_event(Event::End(BytesEnd::new("text")))?;
    writer.write_event(Event::End(BytesEnd::new("lyric")))?;
    Ok(())
}
