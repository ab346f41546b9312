use std::path::{Path, PathBuf};

use ab_glyph::{FontVec, PxScale};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_text_mut, text_size};
use tracing::{debug, info, warn};

use crate::error::{Result, StripError};
use crate::scanner::scan_checkpoints;
use crate::types::{checkpoint_label, output_image_name, StripOutcome};

/// Draws label text onto the strip.
pub trait Labeler {
    /// Rendered width of `text` in pixels.
    fn text_width(&self, text: &str) -> u32;

    /// Draw `text` with its top-left corner at (`x`, `y`).
    fn draw(&self, canvas: &mut RgbImage, x: i32, y: i32, text: &str);
}

impl<L: Labeler + ?Sized> Labeler for &L {
    fn text_width(&self, text: &str) -> u32 {
        (**self).text_width(text)
    }

    fn draw(&self, canvas: &mut RgbImage, x: i32, y: i32, text: &str) {
        (**self).draw(canvas, x, y, text)
    }
}

/// [`Labeler`] backed by a TrueType/OpenType font file.
pub struct FontLabeler {
    font: FontVec,
    scale: PxScale,
    color: Rgb<u8>,
}

impl FontLabeler {
    /// Load a font file and render labels at `size` pixels.
    pub fn from_file(path: &Path, size: f32) -> Result<Self> {
        let data = std::fs::read(path).map_err(|e| StripError::Font {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        Self::from_bytes(data, size).map_err(|e| match e {
            StripError::Font { reason, .. } => StripError::Font {
                path: path.to_path_buf(),
                reason,
            },
            other => other,
        })
    }

    /// Use in-memory font data.
    pub fn from_bytes(data: Vec<u8>, size: f32) -> Result<Self> {
        let font = FontVec::try_from_vec(data).map_err(|e| StripError::Font {
            path: PathBuf::new(),
            reason: e.to_string(),
        })?;
        Ok(Self {
            font,
            scale: PxScale::from(size),
            color: Rgb([0, 0, 0]),
        })
    }
}

impl Labeler for FontLabeler {
    fn text_width(&self, text: &str) -> u32 {
        text_size(self.scale, &self.font, text).0
    }

    fn draw(&self, canvas: &mut RgbImage, x: i32, y: i32, text: &str) {
        draw_text_mut(canvas, self.color, x, y, self.scale, &self.font, text);
    }
}

/// Geometry of the label band above the images.
#[derive(Debug, Clone, Copy)]
pub struct StripLayout {
    pub band_height: u32,
    /// Vertical offset of the label inside the band.
    pub label_top: i32,
    pub background: Rgb<u8>,
}

impl Default for StripLayout {
    fn default() -> Self {
        Self {
            band_height: 50,
            label_top: 10,
            background: Rgb([255, 255, 255]),
        }
    }
}

impl StripLayout {
    /// Default layout with a custom band height.
    pub fn with_band_height(band_height: u32) -> Self {
        Self {
            band_height,
            ..Self::default()
        }
    }
}

/// One loaded output image and the checkpoint it belongs to.
#[derive(Debug, Clone)]
pub struct Panel {
    pub index: u64,
    pub image: RgbImage,
}

/// Lay out `panels` left to right under a label band.
///
/// All panels are assumed to share the first panel's size; callers
/// validate that beforehand. Returns `None` for an empty slice.
pub fn compose<L: Labeler>(
    panels: &[Panel],
    layout: &StripLayout,
    labeler: &L,
) -> Option<RgbImage> {
    let first = panels.first()?;
    let (panel_width, panel_height) = first.image.dimensions();
    let width = panels.iter().map(|p| p.image.width()).sum();
    let height = panel_height + layout.band_height;

    let mut canvas = RgbImage::from_pixel(width, height, layout.background);
    let mut x: u32 = 0;
    for panel in panels {
        image::imageops::overlay(
            &mut canvas,
            &panel.image,
            i64::from(x),
            i64::from(layout.band_height),
        );

        let label = checkpoint_label(panel.index);
        let label_width = labeler.text_width(&label);
        let label_x = x + panel_width.saturating_sub(label_width) / 2;
        labeler.draw(&mut canvas, label_x as i32, layout.label_top, &label);

        x += panel.image.width();
    }
    Some(canvas)
}

/// Build the comparison strip for every checkpoint in `checkpoint_dir`.
///
/// Checkpoint order is re-derived from the directory, not taken from the
/// submission step. Checkpoints whose `checkpoint-<N>_0001.png` is absent or
/// unreadable are skipped unless `strict` is set. When nothing is usable the
/// result is [`StripOutcome::NoImages`] and no file is written.
pub fn build_strip<L: Labeler>(
    checkpoint_dir: &Path,
    image_dir: &Path,
    output: &Path,
    layout: &StripLayout,
    labeler: &L,
    strict: bool,
) -> Result<StripOutcome> {
    let checkpoints = scan_checkpoints(checkpoint_dir)?;

    let mut panels: Vec<Panel> = Vec::new();
    let mut missing = Vec::new();
    for artifact in &checkpoints {
        let path = image_dir.join(output_image_name(artifact.index));
        if !path.is_file() {
            debug!(path = %path.display(), "No output image for checkpoint, skipping");
            missing.push(artifact.index);
            continue;
        }

        let image = match image::open(&path) {
            Ok(img) => img.to_rgb8(),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Cannot open image");
                missing.push(artifact.index);
                continue;
            }
        };

        if let Some(first) = panels.first() {
            if image.dimensions() != first.image.dimensions() {
                let (expected_width, expected_height) = first.image.dimensions();
                let (actual_width, actual_height) = image.dimensions();
                return Err(StripError::SizeMismatch {
                    path,
                    expected_width,
                    expected_height,
                    actual_width,
                    actual_height,
                });
            }
        }

        panels.push(Panel {
            index: artifact.index,
            image,
        });
    }

    if strict && !missing.is_empty() {
        return Err(StripError::MissingImages(missing));
    }
    if !missing.is_empty() {
        info!(skipped = ?missing, "Checkpoints without output images left out of the strip");
    }

    let Some(canvas) = compose(&panels, layout, labeler) else {
        warn!(dir = %image_dir.display(), "No valid images found");
        return Ok(StripOutcome::NoImages);
    };

    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| {
            StripError::io(format!("Cannot create strip directory {}", parent.display()), e)
        })?;
    }
    canvas.save(output).map_err(|e| StripError::Image {
        path: output.to_path_buf(),
        source: e,
    })?;

    info!(path = %output.display(), panels = panels.len(), "Image strip saved");
    Ok(StripOutcome::Written {
        path: output.to_path_buf(),
        panels: panels.iter().map(|p| p.index).collect(),
        width: canvas.width(),
        height: canvas.height(),
    })
}
