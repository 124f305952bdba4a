//! Image backends.
//!
//! Composition only needs to decode sprite PNGs to RGBA and to encode sheet
//! rasters; [`ImageBackend`] is that seam. [`PngBackend`] talks to the file
//! system, [`MemoryBackend`] fabricates rasters for tests and benchmarks.

use std::collections::{BTreeMap, HashMap};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use image::codecs::png::PngDecoder;
use image::{DynamicImage, ImageDecoder, Rgba, RgbaImage};
use moxcms::{CmsError, ColorProfile, DataColorSpace, Layout, TransformExecutor, TransformOptions};

use crate::error::{ComposeError, Result};

use super::png::{quantize, write_indexed, write_rgba};

/// A decoded sprite.
#[derive(Debug, Clone)]
pub struct DecodedSprite {
    pub image: RgbaImage,
    /// Whether the source had an alpha channel before conversion.
    pub had_alpha: bool,
    /// Embedded ICC profile, if any.
    pub icc_profile: Option<Vec<u8>>,
    /// Whether `image` was converted from `icc_profile` to sRGB.
    pub converted: bool,
}

/// How a sheet raster is written.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EncodeOptions {
    /// Write an indexed (palette) PNG instead of RGBA.
    pub indexed: bool,
}

impl EncodeOptions {
    pub fn rgba() -> Self {
        Self { indexed: false }
    }

    pub fn indexed() -> Self {
        Self { indexed: true }
    }
}

/// Decode and encode operations used during composition.
pub trait ImageBackend {
    fn decode(&self, path: &Path) -> Result<DecodedSprite>;

    fn encode(&self, image: &RgbaImage, path: &Path, options: &EncodeOptions) -> Result<()>;
}

/// File-backed PNG codec.
#[derive(Debug, Clone, Copy, Default)]
pub struct PngBackend;

impl PngBackend {
    pub fn new() -> Self {
        Self
    }
}

impl ImageBackend for PngBackend {
    fn decode(&self, path: &Path) -> Result<DecodedSprite> {
        let failed = |message: String| ComposeError::ImageDecodeFailed {
            path: path.to_path_buf(),
            message,
        };

        let file = File::open(path).map_err(|e| failed(e.to_string()))?;
        let mut decoder =
            PngDecoder::new(BufReader::new(file)).map_err(|e| failed(e.to_string()))?;

        let icc_profile = decoder.icc_profile().map_err(|e| failed(e.to_string()))?;
        let had_alpha = decoder.color_type().has_alpha();

        let mut image = DynamicImage::from_decoder(decoder)
            .map_err(|e| failed(e.to_string()))?
            .into_rgba8();

        let converted = match &icc_profile {
            Some(profile) => to_srgb(&mut image, profile).unwrap_or_else(|e| {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "unusable ICC profile, pixels taken as sRGB"
                );
                false
            }),
            None => false,
        };

        Ok(DecodedSprite {
            image,
            had_alpha,
            icc_profile,
            converted,
        })
    }

    fn encode(&self, image: &RgbaImage, path: &Path, options: &EncodeOptions) -> Result<()> {
        let failed = |message: String| ComposeError::ImageEncodeFailed {
            path: path.to_path_buf(),
            message,
        };

        let file = File::create(path).map_err(|e| ComposeError::Io {
            path: path.to_path_buf(),
            message: format!("Failed to create sheet: {}", e),
        })?;
        let mut writer = BufWriter::new(file);

        if options.indexed {
            write_indexed(&quantize(image), &mut writer).map_err(|e| failed(e.to_string()))?;
        } else {
            write_rgba(image, &mut writer).map_err(|e| failed(e.to_string()))?;
        }

        writer.flush().map_err(|e| ComposeError::Io {
            path: path.to_path_buf(),
            message: format!("Failed to write sheet: {}", e),
        })
    }
}

/// Convert an RGBA raster from an embedded ICC profile to sRGB in place.
///
/// Returns `Ok(false)` for profiles that do not describe RGB data (a grey
/// profile on an image already expanded to RGBA); those pixels are kept.
fn to_srgb(image: &mut RgbaImage, icc_profile: &[u8]) -> std::result::Result<bool, CmsError> {
    let source = ColorProfile::new_from_slice(icc_profile)?;
    if source.color_space != DataColorSpace::Rgb {
        return Ok(false);
    }

    let transform = source.create_transform_8bit(
        Layout::Rgba,
        &ColorProfile::new_srgb(),
        Layout::Rgba,
        TransformOptions::default(),
    )?;
    let pixels = image.as_raw().clone();
    transform.transform(&pixels, image)?;
    Ok(true)
}

/// In-memory backend producing deterministic rasters.
///
/// Every decoded sprite is a solid colour derived from its file stem, at
/// the configured size unless an explicit raster was registered for the
/// path. Encodes are recorded instead of written.
#[derive(Debug)]
pub struct MemoryBackend {
    width: u32,
    height: u32,
    sprites: HashMap<PathBuf, RgbaImage>,
    written: Mutex<BTreeMap<PathBuf, (RgbaImage, EncodeOptions)>>,
}

impl MemoryBackend {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            sprites: HashMap::new(),
            written: Mutex::new(BTreeMap::new()),
        }
    }

    /// Decode `path` to the given raster instead of a generated one.
    pub fn with_sprite(mut self, path: impl Into<PathBuf>, image: RgbaImage) -> Self {
        self.sprites.insert(path.into(), image);
        self
    }

    /// The colour generated for a sprite stem.
    pub fn colour_for(stem: &str) -> Rgba<u8> {
        // FNV-1a
        let mut hash: u32 = 0x811c_9dc5;
        for byte in stem.bytes() {
            hash ^= byte as u32;
            hash = hash.wrapping_mul(0x0100_0193);
        }
        let [r, g, b, _] = hash.to_le_bytes();
        Rgba([r, g, b, 255])
    }

    /// Raster recorded for an encoded path.
    pub fn written(&self, path: &Path) -> Option<RgbaImage> {
        self.written
            .lock()
            .ok()
            .and_then(|w| w.get(path).map(|(image, _)| image.clone()))
    }

    /// Paths encoded so far, sorted.
    pub fn written_paths(&self) -> Vec<PathBuf> {
        self.written
            .lock()
            .map(|w| w.keys().cloned().collect())
            .unwrap_or_default()
    }
}

impl ImageBackend for MemoryBackend {
    fn decode(&self, path: &Path) -> Result<DecodedSprite> {
        if let Some(image) = self.sprites.get(path) {
            return Ok(DecodedSprite {
                image: image.clone(),
                had_alpha: true,
                icc_profile: None,
                converted: false,
            });
        }

        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy())
            .unwrap_or_default();
        let colour = Self::colour_for(&stem);
        Ok(DecodedSprite {
            image: RgbaImage::from_pixel(self.width, self.height, colour),
            had_alpha: true,
            icc_profile: None,
            converted: false,
        })
    }

    fn encode(&self, image: &RgbaImage, path: &Path, options: &EncodeOptions) -> Result<()> {
        let mut written = self.written.lock().map_err(|e| ComposeError::Io {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        written.insert(path.to_path_buf(), (image.clone(), *options));
        Ok(())
    }
}
