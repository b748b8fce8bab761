//! Error types for fingersheet-engine
//!
//! Every variant's message is shown to the uploader verbatim, so messages
//! stay short and free of internal paths where possible.

use thiserror::Error;

/// Sheet processing error
#[derive(Debug, Error)]
pub enum EngineError {
    /// Skill level outside beginner/intermediate/advanced
    #[error("Unknown skill level: {0}")]
    UnknownSkillLevel(String),

    /// File extension the pipeline cannot handle
    #[error("Unsupported file format: {0}")]
    UnsupportedFormat(String),

    /// Text recognition failed or could not be started
    #[error("OCR failed: {0}")]
    Ocr(String),

    /// PDF page rasterization failed
    #[error("PDF conversion failed: {0}")]
    Rasterize(String),

    /// MusicXML could not be read or rewritten
    #[error("MusicXML error: {0}")]
    MusicXml(String),

    /// Image decode/encode error
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    /// PDF assembly error
    #[error("PDF error: {0}")]
    Pdf(String),

    /// File I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<quick_xml::Error> for EngineError {
    fn from(err: quick_xml::Error) -> Self {
        EngineError::MusicXml(err.to_string())
    }
}

impl From<lopdf::Error> for EngineError {
    fn from(err: lopdf::Error) -> Self {
        EngineError::Pdf(err.to_string())
    }
}

/// Result type for engine operations
pub type Result<T> = std::result::Result<T, EngineError>;
