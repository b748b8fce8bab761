//! # Fingersheet Engine
//!
//! Everything between a stored upload and its annotated copy:
//! - Music model (pitches, notes, chords)
//! - Note extraction from OCR text or MusicXML
//! - Skill-level fingering tables
//! - Tesseract/pdftoppm adapters
//! - Image, PDF and MusicXML annotation
//!
//! No HTTP types appear here; the web crate drives [`SheetProcessor`].

pub mod annotate;
pub mod error;
pub mod extract;
pub mod fingering;
pub mod model;
pub mod musicxml;
pub mod ocr;
pub mod pipeline;

pub use error::{EngineError, Result};
pub use extract::{extract_notes, SheetSource};
pub use fingering::{assign_fingerings, Fingering, FingeringMap, SkillLevel};
pub use model::{Chord, MusicElement, Note, Pitch};
pub use pipeline::{content_type, FileKind, ProcessedSheet, SheetProcessor};
