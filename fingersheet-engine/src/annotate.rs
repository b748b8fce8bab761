//! Writing fingerings back into a copy of the uploaded sheet
//!
//! Raster images and PDF pages get one `"<key>: <fingering>"` line per map
//! entry, drawn in black from (50, 50) downwards. PDFs are rasterized,
//! annotated page by page (every page receives the full list) and
//! reassembled. MusicXML gets lyrics (see [`crate::musicxml`]).
//!
//! Output files sit next to the input with `_modified` inserted before the
//! first `.` of the file name.

use crate::error::{EngineError, Result};
use crate::fingering::FingeringMap;
use crate::musicxml::annotate_musicxml_str;
use crate::ocr::{PageRasterizer, ScratchDir};
use ab_glyph::{FontVec, PxScale};
use font8x8::{UnicodeFonts, BASIC_FONTS};
use image::codecs::jpeg::JpegEncoder;
use image::{Rgb, RgbImage};
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Top-left corner of the first annotation line
pub const TEXT_ORIGIN: (i32, i32) = (50, 50);

/// Vertical distance between annotation lines
pub const LINE_SPACING: i32 = 30;

const FONT_SIZE: f32 = 20.0;
const BITMAP_SCALE: i32 = 2;
const INK: Rgb<u8> = Rgb([0, 0, 0]);

/// Font used for image and PDF annotations
pub enum AnnotationFont {
    TrueType(FontVec),
    /// Built-in 8x8 glyphs, scaled up
    Bitmap,
}

impl AnnotationFont {
    /// Load a TrueType/OpenType font, falling back to the bitmap font
    pub fn load(path: Option<&Path>) -> Self {
        let Some(path) = path else {
            return AnnotationFont::Bitmap;
        };

        let loaded = std::fs::read(path)
            .map_err(|e| e.to_string())
            .and_then(|bytes| FontVec::try_from_vec(bytes).map_err(|e| e.to_string()));

        match loaded {
            Ok(font) => {
                info!(font = %path.display(), "Loaded annotation font");
                AnnotationFont::TrueType(font)
            }
            Err(e) => {
                warn!(font = %path.display(), error = %e, "Cannot load font, using built-in bitmap font");
                AnnotationFont::Bitmap
            }
        }
    }

    fn draw_line(&self, image: &mut RgbImage, x: i32, y: i32, text: &str) {
        match self {
            AnnotationFont::TrueType(font) => {
                imageproc::drawing::draw_text_mut(image, INK, x, y, PxScale::from(FONT_SIZE), font, text)
            }
            AnnotationFont::Bitmap => draw_bitmap_text(image, x, y, text),
        }
    }
}

fn draw_bitmap_text(image: &mut RgbImage, x: i32, y: i32, text: &str) {
    let (width, height) = (image.width() as i32, image.height() as i32);
    let mut cursor = x;

    for ch in text.chars() {
        let glyph = BASIC_FONTS
            .get(ch)
            .or_else(|| BASIC_FONTS.get('?'))
            .unwrap_or([0; 8]);

        for (row, bits) in glyph.iter().enumerate() {
            for col in 0..8 {
                if bits & (1u8 << col) == 0 {
                    continue;
                }
                let left = cursor + col * BITMAP_SCALE;
                let top = y + row as i32 * BITMAP_SCALE;
                for py in top..top + BITMAP_SCALE {
                    for px in left..left + BITMAP_SCALE {
                        if (0..width).contains(&px) && (0..height).contains(&py) {
                            image.put_pixel(px as u32, py as u32, INK);
                        }
                    }
                }
            }
        }
        cursor += 8 * BITMAP_SCALE;
    }
}

/// `dir/score.pdf` → `dir/score_modified.pdf`
pub fn modified_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let modified = match name.split_once('.') {
        Some((stem, rest)) => format!("{}_modified.{}", stem, rest),
        None => format!("{}_modified", name),
    };
    path.with_file_name(modified)
}

/// Writes annotated copies of sheets
pub struct Annotator {
    font: AnnotationFont,
    rasterizer: Arc<dyn PageRasterizer>,
    scratch_root: PathBuf,
    pdf_dpi: u32,
}

impl Annotator {
    pub fn new(
        font: AnnotationFont,
        rasterizer: Arc<dyn PageRasterizer>,
        scratch_root: PathBuf,
        pdf_dpi: u32,
    ) -> Self {
        Self {
            font,
            rasterizer,
            scratch_root,
            pdf_dpi,
        }
    }

    /// Annotate `path` according to its extension; returns the new file
    pub fn modify_sheet_music(&self, path: &Path, fingerings: &FingeringMap) -> Result<PathBuf> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();

        match extension.as_str() {
            "jpg" | "jpeg" | "png" => self.modify_image(path, fingerings),
            "pdf" => self.modify_pdf(path, fingerings),
            "xml" | "musicxml" => self.modify_musicxml(path, fingerings),
            other => Err(EngineError::UnsupportedFormat(format!("'{}' cannot be annotated", other))),
        }
    }

    /// Draw every fingering line onto `image`
    pub fn draw_fingerings(&self, image: &mut RgbImage, fingerings: &FingeringMap) {
        let (x, mut y) = TEXT_ORIGIN;
        for line in fingerings.display_lines() {
            self.font.draw_line(image, x, y, &line);
            y += LINE_SPACING;
        }
    }

    pub fn modify_image(&self, path: &Path, fingerings: &FingeringMap) -> Result<PathBuf> {
        let mut image = image::open(path)?.to_rgb8();
        self.draw_fingerings(&mut image, fingerings);

        let output = modified_path(path);
        image.save(&output)?;
        debug!(output = %output.display(), lines = fingerings.len(), "Annotated image");
        Ok(output)
    }

    /// Every page gets the complete fingering list; notes are not tied to
    /// the page they were read from.
    pub fn modify_pdf(&self, path: &Path, fingerings: &FingeringMap) -> Result<PathBuf> {
        let scratch = ScratchDir::create(&self.scratch_root, "annotate-pages")?;
        let page_files = self.rasterizer.rasterize(path, scratch.path())?;

        let mut pages = Vec::with_capacity(page_files.len());
        for page_file in &page_files {
            let mut page = image::open(page_file)?.to_rgb8();
            self.draw_fingerings(&mut page, fingerings);
            pages.push(page);
        }

        let output = modified_path(path);
        write_image_pdf(&pages, self.pdf_dpi, &output)?;
        debug!(output = %output.display(), pages = pages.len(), "Annotated PDF");
        Ok(output)
    }

    pub fn modify_musicxml(&self, path: &Path, fingerings: &FingeringMap) -> Result<PathBuf> {
        let xml = std::fs::read_to_string(path)?;
        let annotated = annotate_musicxml_str(&xml, fingerings)?;

        let output = modified_path(path);
        std::fs::write(&output, annotated)?;
        debug!(output = %output.display(), "Annotated MusicXML");
        Ok(output)
    }
}

/// Write one JPEG-backed page per image; page size follows `dpi`
pub fn write_image_pdf(pages: &[RgbImage], dpi: u32, path: &Path) -> Result<()> {
    if pages.is_empty() {
        return Err(EngineError::Pdf("document has no pages".to_string()));
    }

    let points_per_pixel = 72.0 / dpi.max(1) as f32;
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let mut kids: Vec<Object> = Vec::with_capacity(pages.len());

    for page in pages {
        let (width, height) = page.dimensions();
        let mut jpeg = Vec::new();
        JpegEncoder::new_with_quality(&mut jpeg, 90).encode_image(page)?;

        let image_id = doc.add_object(Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => width as i64,
                "Height" => height as i64,
                "ColorSpace" => "DeviceRGB",
                "BitsPerComponent" => 8,
                "Filter" => "DCTDecode",
            },
            jpeg,
        ));

        let page_width = width as f32 * points_per_pixel;
        let page_height = height as f32 * points_per_pixel;
        let content = Content {
            operations: vec![
                Operation::new("q", vec![]),
                Operation::new(
                    "cm",
                    vec![
                        page_width.into(),
                        0.into(),
                        0.into(),
                        page_height.into(),
                        0.into(),
                        0.into(),
                    ],
                ),
                Operation::new("Do", vec!["Im0".into()]),
                Operation::new("Q", vec![]),
            ],
        };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode()?));

        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "Resources" => dictionary! {
                "XObject" => dictionary! { "Im0" => image_id },
            },
            "MediaBox" => vec![0.into(), 0.into(), page_width.into(), page_height.into()],
        });
        kids.push(page_id.into());
    }

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    doc.save(path)?;
    Ok(())
}
