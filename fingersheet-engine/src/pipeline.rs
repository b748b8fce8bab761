//! Sheet pipeline: source resolution, extraction, assignment, annotation
//!
//! The [`SheetSource`] is resolved exactly once per file: OCR text for
//! images and PDFs, a parsed [`ScoreDocument`] for MusicXML.
//!
//! [`ScoreDocument`]: crate::musicxml::ScoreDocument

use crate::annotate::{AnnotationFont, Annotator};
use crate::error::{EngineError, Result};
use crate::extract::{extract_notes, SheetSource};
use crate::fingering::{assign_fingerings, FingeringMap, SkillLevel};
use crate::musicxml::parse_musicxml_path;
use crate::ocr::{OcrAdapter, PageRasterizer, PdftoppmCli, TesseractCli, TextRecognizer};
use fingersheet_common::AppConfig;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

/// Processing route chosen from the file extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    /// jpg, jpeg, png
    Image,
    Pdf,
    /// xml, musicxml
    MusicXml,
}

impl FileKind {
    pub fn from_path(path: &Path) -> Result<Self> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();

        match extension.as_str() {
            "jpg" | "jpeg" | "png" => Ok(FileKind::Image),
            "pdf" => Ok(FileKind::Pdf),
            "xml" | "musicxml" => Ok(FileKind::MusicXml),
            other => Err(EngineError::UnsupportedFormat(format!("'{}'", other))),
        }
    }

    /// True when notes come from text recognition
    pub fn uses_ocr(&self) -> bool {
        !matches!(self, FileKind::MusicXml)
    }
}

/// MIME type for a processed file
pub fn content_type(path: &Path) -> &'static str {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();

    match extension.as_str() {
        "pdf" => "application/pdf",
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "xml" => "application/xml",
        "musicxml" => "application/vnd.recordare.musicxml+xml",
        _ => "application/octet-stream",
    }
}

/// Result of one successful run
#[derive(Debug, Clone)]
pub struct ProcessedSheet {
    pub output_path: PathBuf,
    pub kind: FileKind,
    pub fingerings: FingeringMap,
}

/// Runs uploaded sheets through OCR/parsing, fingering and annotation
pub struct SheetProcessor {
    ocr: OcrAdapter,
    annotator: Annotator,
}

impl SheetProcessor {
    pub fn new(
        recognizer: Arc<dyn TextRecognizer>,
        rasterizer: Arc<dyn PageRasterizer>,
        font: AnnotationFont,
        scratch_root: PathBuf,
        pdf_dpi: u32,
    ) -> Self {
        let ocr = OcrAdapter::new(recognizer, Arc::clone(&rasterizer), scratch_root.clone());
        let annotator = Annotator::new(font, rasterizer, scratch_root, pdf_dpi);
        Self { ocr, annotator }
    }

    /// Tesseract and pdftoppm as configured; scratch space under the
    /// upload folder
    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(
            Arc::new(TesseractCli::new(config.tesseract_cmd.clone())),
            Arc::new(PdftoppmCli::new(config.pdftoppm_cmd.clone(), config.pdf_dpi)),
            AnnotationFont::load(config.font_path.as_deref()),
            config.upload_folder.clone(),
            config.pdf_dpi,
        )
    }

    /// OCR text or parsed document, depending on `kind`
    pub fn resolve_source(&self, path: &Path, kind: FileKind) -> Result<SheetSource> {
        if kind.uses_ocr() {
            Ok(SheetSource::Text(self.ocr.ocr_process_file(path)?))
        } else {
            Ok(SheetSource::Document(parse_musicxml_path(path)?))
        }
    }

    /// Process one stored upload
    ///
    /// The skill level is checked before any file work starts.
    pub fn process(&self, path: &Path, skill_level: &str) -> Result<ProcessedSheet> {
        let started = Instant::now();
        let level: SkillLevel = skill_level.parse()?;
        let kind = FileKind::from_path(path)?;

        let source = self.resolve_source(path, kind)?;
        let elements = extract_notes(&source);
        let fingerings = assign_fingerings(&elements, level);
        let output_path = self.annotator.modify_sheet_music(path, &fingerings)?;

        info!(
            input = %path.display(),
            output = %output_path.display(),
            skill_level = %level,
            elements = elements.len(),
            fingerings = fingerings.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Processed sheet"
        );

        Ok(ProcessedSheet {
            output_path,
            kind,
            fingerings,
        })
    }
}
