//! Deterministic PNG encoding for composed sheets.
//!
//! RGBA sheets go through the `image` crate's encoder with maximum
//! compression and no ancillary chunks. Palette sheets are quantized here
//! and written as indexed PNGs with the `png` crate.

use std::collections::HashMap;
use std::io::Write;

use image::codecs::png::{CompressionType, FilterType, PngEncoder};
use image::{ExtendedColorType, ImageEncoder, ImageResult, RgbaImage};
use palette::{IntoColor, Oklab, Srgb};

/// Largest palette an indexed PNG can carry.
pub const MAX_PALETTE: usize = 256;

const TRANSPARENT: [u8; 4] = [0, 0, 0, 0];

/// Encode an RGBA image with the fixed, reproducible encoder settings.
pub fn write_rgba<W: Write>(image: &RgbaImage, writer: W) -> ImageResult<()> {
    let encoder = PngEncoder::new_with_quality(writer, CompressionType::Best, FilterType::Adaptive);
    encoder.write_image(
        image.as_raw(),
        image.width(),
        image.height(),
        ExtendedColorType::Rgba8,
    )
}

/// A palette image: one byte per pixel indexing into `palette`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexedImage {
    pub width: u32,
    pub height: u32,
    pub palette: Vec<[u8; 4]>,
    pub indices: Vec<u8>,
}

impl IndexedImage {
    /// Colour of a pixel after palette lookup.
    pub fn colour_at(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        let i = (y as usize)
            .checked_mul(self.width as usize)?
            .checked_add(x as usize)?;
        self.indices
            .get(i)
            .and_then(|&p| self.palette.get(p as usize))
            .copied()
    }
}

/// Reduce an RGBA image to at most 256 colours.
///
/// Exact when the image already fits. Otherwise the most frequent colours
/// (ties broken by colour value) form the palette and every other colour
/// maps to its nearest palette entry in Oklab, with alpha as a fourth axis.
/// All fully transparent pixels share one entry.
pub fn quantize(image: &RgbaImage) -> IndexedImage {
    let mut counts: HashMap<[u8; 4], u64> = HashMap::new();
    for pixel in image.pixels() {
        *counts.entry(normalize(pixel.0)).or_insert(0) += 1;
    }

    let mut by_frequency: Vec<([u8; 4], u64)> = counts.into_iter().collect();
    by_frequency.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

    let mut palette: Vec<[u8; 4]> = Vec::with_capacity(MAX_PALETTE);
    if by_frequency.iter().any(|(c, _)| *c == TRANSPARENT) {
        palette.push(TRANSPARENT);
    }
    palette.extend(
        by_frequency
            .iter()
            .map(|(c, _)| *c)
            .filter(|c| *c != TRANSPARENT)
            .take(MAX_PALETTE - palette.len()),
    );

    let keys: Vec<Key> = palette.iter().map(|c| Key::new(*c)).collect();
    let mut lookup: HashMap<[u8; 4], u8> = palette
        .iter()
        .enumerate()
        .map(|(i, c)| (*c, i as u8))
        .collect();

    let mut indices = Vec::with_capacity((image.width() * image.height()) as usize);
    for pixel in image.pixels() {
        let colour = normalize(pixel.0);
        let index = *lookup
            .entry(colour)
            .or_insert_with(|| nearest(&keys, Key::new(colour)));
        indices.push(index);
    }

    IndexedImage {
        width: image.width(),
        height: image.height(),
        palette,
        indices,
    }
}

/// Encode an indexed image with a PLTE chunk and, when needed, tRNS.
pub fn write_indexed<W: Write>(
    image: &IndexedImage,
    writer: W,
) -> std::result::Result<(), ::png::EncodingError> {
    let mut encoder = ::png::Encoder::new(writer, image.width, image.height);
    encoder.set_color(::png::ColorType::Indexed);
    encoder.set_depth(::png::BitDepth::Eight);
    encoder.set_compression(::png::Compression::Best);
    encoder.set_adaptive_filter(::png::AdaptiveFilterType::Adaptive);

    let plte: Vec<u8> = image
        .palette
        .iter()
        .flat_map(|c| [c[0], c[1], c[2]])
        .collect();
    encoder.set_palette(plte);

    // tRNS may stop at the last non-opaque entry.
    if let Some(last) = image.palette.iter().rposition(|c| c[3] != 255) {
        let trns: Vec<u8> = image.palette[..=last].iter().map(|c| c[3]).collect();
        encoder.set_trns(trns);
    }

    let mut writer = encoder.write_header()?;
    writer.write_image_data(&image.indices)?;
    writer.finish()
}

fn normalize(colour: [u8; 4]) -> [u8; 4] {
    if colour[3] == 0 {
        TRANSPARENT
    } else {
        colour
    }
}

/// A colour in Oklab plus alpha, for distance comparisons.
#[derive(Debug, Clone, Copy)]
struct Key {
    l: f32,
    a: f32,
    b: f32,
    alpha: f32,
}

impl Key {
    fn new(c: [u8; 4]) -> Self {
        let rgb: Srgb<f32> = Srgb::new(
            c[0] as f32 / 255.0,
            c[1] as f32 / 255.0,
            c[2] as f32 / 255.0,
        );
        let lab: Oklab = rgb.into_color();
        Self {
            l: lab.l,
            a: lab.a,
            b: lab.b,
            alpha: c[3] as f32 / 255.0,
        }
    }

    fn distance(&self, other: &Key) -> f32 {
        let dl = self.l - other.l;
        let da = self.a - other.a;
        let db = self.b - other.b;
        let dalpha = self.alpha - other.alpha;
        dl * dl + da * da + db * db + dalpha * dalpha
    }
}

fn nearest(keys: &[Key], target: Key) -> u8 {
    let mut best = 0usize;
    let mut best_distance = f32::INFINITY;
    for (i, key) in keys.iter().enumerate() {
        let d = key.distance(&target);
        if d < best_distance {
            best = i;
            best_distance = d;
        }
    }
    best as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;
    use tempfile::tempdir;

    fn checker(w: u32, h: u32) -> RgbaImage {
        RgbaImage::from_fn(w, h, |x, y| {
            if (x + y) % 2 == 0 {
                Rgba([255, 0, 0, 255])
            } else {
                Rgba([0, 0, 0, 0])
            }
        })
    }

    #[test]
    fn test_write_rgba_round_trip() {
        let image = checker(4, 2);
        let dir = tempdir().unwrap();
        let path = dir.path().join("sheet.png");

        write_rgba(&image, std::fs::File::create(&path).unwrap()).unwrap();

        let back = image::open(&path).unwrap().to_rgba8();
        assert_eq!(back, image);
    }

    #[test]
    fn test_write_rgba_is_deterministic() {
        let image = checker(16, 16);
        let mut a = Vec::new();
        let mut b = Vec::new();
        write_rgba(&image, &mut a).unwrap();
        write_rgba(&image, &mut b).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_quantize_exact() {
        let mut image = checker(4, 4);
        image.put_pixel(1, 0, Rgba([9, 9, 9, 0]));
        let indexed = quantize(&image);

        assert_eq!(indexed.palette, vec![[0, 0, 0, 0], [255, 0, 0, 255]]);
        for (x, y, p) in image.enumerate_pixels() {
            assert_eq!(indexed.colour_at(x, y).unwrap(), normalize(p.0));
        }
    }

    #[test]
    fn test_quantize_caps_palette() {
        // 300 distinct opaque colours plus a dominant one.
        let image = RgbaImage::from_fn(400, 1, |x, _| {
            if x < 300 {
                Rgba([x as u8, (x / 256) as u8 * 200, 50, 255])
            } else {
                Rgba([10, 20, 30, 255])
            }
        });
        let indexed = quantize(&image);

        assert_eq!(indexed.palette.len(), MAX_PALETTE);
        assert_eq!(indexed.palette[0], [10, 20, 30, 255]);
        assert_eq!(indexed.colour_at(399, 0), Some([10, 20, 30, 255]));
        assert_eq!(indexed.indices.len(), 400);
    }

    #[test]
    fn test_nearest_prefers_similar_colour() {
        let keys = vec![
            Key::new([0, 0, 0, 255]),
            Key::new([250, 250, 250, 255]),
            Key::new([200, 0, 0, 255]),
        ];
        assert_eq!(nearest(&keys, Key::new([240, 10, 10, 255])), 2);
        assert_eq!(nearest(&keys, Key::new([230, 230, 235, 255])), 1);
    }

    #[test]
    fn test_write_indexed_decodes_to_same_pixels() {
        let image = checker(8, 8);
        let indexed = quantize(&image);
        let dir = tempdir().unwrap();
        let path = dir.path().join("tiles.png8");

        write_indexed(&indexed, std::fs::File::create(&path).unwrap()).unwrap();

        let decoder = ::png::Decoder::new(std::fs::File::open(&path).unwrap());
        let reader = decoder.read_info().unwrap();
        assert_eq!(reader.info().color_type, ::png::ColorType::Indexed);
        assert_eq!(reader.info().palette.as_ref().unwrap().len(), 6);
        assert_eq!(reader.info().trns.as_ref().unwrap().len(), 1);
    }
}
