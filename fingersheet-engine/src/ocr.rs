//! OCR and PDF rasterization adapters
//!
//! Both external tools are run as child processes: Tesseract for text
//! recognition and Poppler's `pdftoppm` for turning PDF pages into PNGs.
//! Commands are plain configuration handed to the adapters at construction.

use crate::error::{EngineError, Result};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Image to text
pub trait TextRecognizer: Send + Sync {
    fn image_to_string(&self, image_path: &Path) -> Result<String>;
}

/// PDF to one raster image per page, in page order
pub trait PageRasterizer: Send + Sync {
    fn rasterize(&self, pdf_path: &Path, output_dir: &Path) -> Result<Vec<PathBuf>>;
}

/// Tesseract command-line recognizer
pub struct TesseractCli {
    command: String,
}

impl TesseractCli {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
        }
    }
}

impl TextRecognizer for TesseractCli {
    fn image_to_string(&self, image_path: &Path) -> Result<String> {
        debug!(command = %self.command, image = %image_path.display(), "Running tesseract");
        let output = Command::new(&self.command)
            .arg(image_path)
            .arg("stdout")
            .output()
            .map_err(|e| EngineError::Ocr(format!("cannot run '{}': {}", self.command, e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(EngineError::Ocr(stderr.trim().to_string()));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

/// Poppler `pdftoppm` rasterizer
pub struct PdftoppmCli {
    command: String,
    dpi: u32,
}

impl PdftoppmCli {
    pub fn new(command: impl Into<String>, dpi: u32) -> Self {
        Self {
            command: command.into(),
            dpi,
        }
    }
}

const PAGE_PREFIX: &str = "page";

impl PageRasterizer for PdftoppmCli {
    fn rasterize(&self, pdf_path: &Path, output_dir: &Path) -> Result<Vec<PathBuf>> {
        debug!(command = %self.command, pdf = %pdf_path.display(), dpi = self.dpi, "Running pdftoppm");
        let output = Command::new(&self.command)
            .arg("-r")
            .arg(self.dpi.to_string())
            .arg("-png")
            .arg(pdf_path)
            .arg(output_dir.join(PAGE_PREFIX))
            .output()
            .map_err(|e| EngineError::Rasterize(format!("cannot run '{}': {}", self.command, e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(EngineError::Rasterize(stderr.trim().to_string()));
        }

        let pages = collect_page_images(output_dir)?;
        if pages.is_empty() {
            return Err(EngineError::Rasterize("no pages produced".to_string()));
        }
        Ok(pages)
    }
}

/// `page-1.png`, `page-02.png`, ... sorted by page number
///
/// pdftoppm zero-pads page numbers to the width of the page count.
pub fn collect_page_images(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut pages: Vec<(u32, PathBuf)> = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        let number = path
            .file_stem()
            .and_then(|s| s.to_str())
            .and_then(|s| s.strip_prefix(PAGE_PREFIX))
            .and_then(|s| s.strip_prefix('-'))
            .and_then(|s| s.parse::<u32>().ok());
        let is_png = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("png"));
        if let (Some(number), true) = (number, is_png) {
            pages.push((number, path));
        }
    }
    pages.sort_by_key(|(number, _)| *number);
    Ok(pages.into_iter().map(|(_, path)| path).collect())
}

/// Uniquely named temporary directory, removed on drop
pub struct ScratchDir {
    path: PathBuf,
}

impl ScratchDir {
    pub fn create(root: &Path, label: &str) -> Result<Self> {
        let path = root.join(format!("{}-{}", label, Uuid::new_v4()));
        fs::create_dir_all(&path)?;
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ScratchDir {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_dir_all(&self.path) {
            warn!(path = %self.path.display(), error = %e, "Failed to remove scratch directory");
        }
    }
}

/// Collapse doubled newlines and trim
pub fn clean_ocr_text(text: &str) -> String {
    text.replace("\n\n", "\n").trim().to_string()
}

/// Text extraction for images and PDFs
#[derive(Clone)]
pub struct OcrAdapter {
    recognizer: Arc<dyn TextRecognizer>,
    rasterizer: Arc<dyn PageRasterizer>,
    scratch_root: PathBuf,
}

impl OcrAdapter {
    pub fn new(
        recognizer: Arc<dyn TextRecognizer>,
        rasterizer: Arc<dyn PageRasterizer>,
        scratch_root: PathBuf,
    ) -> Self {
        Self {
            recognizer,
            rasterizer,
            scratch_root,
        }
    }

    /// OCR one image
    pub fn ocr_from_image(&self, image_path: &Path) -> Result<String> {
        self.recognizer.image_to_string(image_path)
    }

    /// OCR every page of a PDF; pages are separated by `--- Page N ---`
    pub fn ocr_from_pdf(&self, pdf_path: &Path) -> Result<String> {
        let scratch = ScratchDir::create(&self.scratch_root, "ocr-pages")?;
        let pages = self.rasterizer.rasterize(pdf_path, scratch.path())?;
        info!(pages = pages.len(), pdf = %pdf_path.display(), "Rasterized PDF for OCR");

        let mut text = String::new();
        for (index, page) in pages.iter().enumerate() {
            let page_text = self.recognizer.image_to_string(page)?;
            text.push_str(&format!("\n\n--- Page {} ---\n\n", index + 1));
            text.push_str(&page_text);
        }
        Ok(text)
    }

    /// Dispatch on extension: jpg/jpeg/png as images, pdf page by page
    pub fn ocr_process_file(&self, path: &Path) -> Result<String> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();

        let text = match extension.as_str() {
            "jpg" | "jpeg" | "png" => self.ocr_from_image(path)?,
            "pdf" => self.ocr_from_pdf(path)?,
            other => {
                return Err(EngineError::UnsupportedFormat(format!(
                    "'{}' for OCR (supported: jpg, jpeg, png, pdf)",
                    other
                )))
            }
        };
        Ok(clean_ocr_text(&text))
    }
}
