//! End-to-end pipeline tests with stubbed OCR and rasterization
//!
//! Covers the MusicXML, image and PDF routes plus the failure cases that
//! must abort before any output is written.

use fingersheet_engine::annotate::AnnotationFont;
use fingersheet_engine::ocr::{PageRasterizer, TextRecognizer};
use fingersheet_engine::{EngineError, FileKind, Fingering, SheetProcessor};
use image::{Rgb, RgbImage};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

const SCORE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<score-partwise version="3.1">
  <part-list><score-part id="P1"><part-name>Piano</part-name></score-part></part-list>
  <part id="P1">
    <measure number="1">
      <note><pitch><step>C</step><octave>4</octave></pitch><duration>1</duration></note>
      <note><pitch><step>D</step><octave>4</octave></pitch><duration>1</duration></note>
      <note><chord/><pitch><step>F</step><octave>4</octave></pitch><duration>1</duration></note>
    </measure>
  </part>
</score-partwise>
"#;

/// Recognizer returning the same text for every image
struct FixedText(&'static str);

impl TextRecognizer for FixedText {
    fn image_to_string(&self, _image_path: &Path) -> fingersheet_engine::Result<String> {
        Ok(self.0.to_string())
    }
}

/// Rasterizer producing `count` blank white pages
struct BlankPages(usize);

impl PageRasterizer for BlankPages {
    fn rasterize(&self, _pdf_path: &Path, output_dir: &Path) -> fingersheet_engine::Result<Vec<PathBuf>> {
        let mut pages = Vec::new();
        for n in 1..=self.0 {
            let path = output_dir.join(format!("page-{}.png", n));
            RgbImage::from_pixel(200, 150, Rgb([255, 255, 255])).save(&path)?;
            pages.push(path);
        }
        Ok(pages)
    }
}

/// Recognizer that always fails
struct BrokenOcr;

impl TextRecognizer for BrokenOcr {
    fn image_to_string(&self, _image_path: &Path) -> fingersheet_engine::Result<String> {
        Err(EngineError::Ocr("tesseract exited with status 1".to_string()))
    }
}

fn processor(recognizer: Arc<dyn TextRecognizer>, pages: usize, root: &Path) -> SheetProcessor {
    SheetProcessor::new(
        recognizer,
        Arc::new(BlankPages(pages)),
        AnnotationFont::Bitmap,
        root.to_path_buf(),
        72,
    )
}

/// Files directly under `dir`, sorted by name
fn file_names(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

#[test]
fn test_musicxml_upload_gets_lyrics() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("etude.musicxml");
    fs::write(&input, SCORE).unwrap();

    let result = processor(Arc::new(FixedText("")), 0, dir.path())
        .process(&input, "intermediate")
        .unwrap();

    assert_eq!(result.kind, FileKind::MusicXml);
    assert_eq!(result.output_path, dir.path().join("etude_modified.musicxml"));
    // C4=60 -> Thumb; D4=62, F4=65 -> Middle finger, Index finger
    assert_eq!(result.fingerings.get("C4"), Some(&Fingering::Single("Thumb".into())));
    assert_eq!(
        result.fingerings.get("Chord {D4 | F4}"),
        Some(&Fingering::Chord(vec!["Middle finger".into(), "Index finger".into()]))
    );

    let annotated = fs::read_to_string(&result.output_path).unwrap();
    assert!(annotated.contains("<text>Fingering: Thumb</text>"));
    assert!(annotated.contains("<text>Fingering: [Middle finger, Index finger]</text>"));
    assert_eq!(annotated.matches("<lyric").count(), 2);

    // Upload itself is left untouched
    assert_eq!(fs::read_to_string(&input).unwrap(), SCORE);
}

#[test]
fn test_image_upload_is_annotated_from_ocr_text() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("scan.jpg");
    RgbImage::from_pixel(320, 200, Rgb([255, 255, 255])).save(&input).unwrap();

    let result = processor(Arc::new(FixedText("C4 D#5 Xb9 Bb3")), 0, dir.path())
        .process(&input, "beginner")
        .unwrap();

    assert_eq!(result.kind, FileKind::Image);
    let keys: Vec<&str> = result.fingerings.iter().map(|(k, _)| k).collect();
    assert_eq!(keys, vec!["C4", "D#5", "Bb3"]);

    let annotated = image::open(&result.output_path).unwrap().to_rgb8();
    assert_eq!(annotated.dimensions(), (320, 200));
    // JPEG is lossy; look for clearly dark pixels
    assert!(annotated.pixels().any(|p| p.0.iter().all(|c| *c < 64)));
}

#[test]
fn test_pdf_upload_keeps_page_count() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("sonata.pdf");
    fs::write(&input, b"%PDF-1.5 stub").unwrap();

    let result = processor(Arc::new(FixedText("E4")), 3, dir.path())
        .process(&input, "advanced")
        .unwrap();

    assert_eq!(result.output_path, dir.path().join("sonata_modified.pdf"));
    let document = lopdf::Document::load(&result.output_path).unwrap();
    assert_eq!(document.get_pages().len(), 3);

    // Scratch page directories are gone
    assert_eq!(file_names(dir.path()), vec!["sonata.pdf", "sonata_modified.pdf"]);
}

#[test]
fn test_unknown_skill_level_writes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("etude.xml");
    fs::write(&input, SCORE).unwrap();

    let err = processor(Arc::new(FixedText("")), 0, dir.path())
        .process(&input, "expert")
        .unwrap_err();

    assert_eq!(err.to_string(), "Unknown skill level: expert");
    assert_eq!(file_names(dir.path()), vec!["etude.xml"]);
}

#[test]
fn test_ocr_failure_propagates() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("scan.jpeg");
    RgbImage::from_pixel(10, 10, Rgb([255, 255, 255])).save(&input).unwrap();

    let err = processor(Arc::new(BrokenOcr), 0, dir.path())
        .process(&input, "beginner")
        .unwrap_err();

    assert!(matches!(err, EngineError::Ocr(_)));
    assert_eq!(file_names(dir.path()), vec!["scan.jpeg"]);
}

#[test]
fn test_malformed_musicxml_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("broken.xml");
    fs::write(&input, "<score-partwise><part><note></part>").unwrap();

    let err = processor(Arc::new(FixedText("")), 0, dir.path())
        .process(&input, "beginner")
        .unwrap_err();

    assert!(matches!(err, EngineError::MusicXml(_)));
}
