//! Dominant color extraction from artwork files.

use anyhow::{Result, bail};
use image::{GenericImageView, ImageReader};
use log::debug;
use std::collections::HashMap;
use std::path::Path;

use crate::utils::config::ExtractConsts;

/// 8-bit RGB color.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// HSL hue in degrees, `[0, 360)`. Greys have hue 0.
    pub fn hue(&self) -> f32 {
        let r = self.r as f32 / 255.0;
        let g = self.g as f32 / 255.0;
        let b = self.b as f32 / 255.0;
        let max = r.max(g).max(b);
        let min = r.min(g).min(b);
        let delta = max - min;
        if delta == 0.0 {
            return 0.0;
        }
        let h = if max == r {
            ((g - b) / delta).rem_euclid(6.0)
        } else if max == g {
            (b - r) / delta + 2.0
        } else {
            (r - g) / delta + 4.0
        };
        h * 60.0
    }

    /// CSS form stored in the attribute table: `rgb(r, g, b)`.
    pub fn to_css(&self) -> String {
        format!("rgb({}, {}, {})", self.r, self.g, self.b)
    }

    /// Parse the CSS form written by [`Rgb::to_css`]. Whitespace around components is ignored.
    pub fn parse_css(s: &str) -> Option<Rgb> {
        let inner = s.trim().strip_prefix("rgb(")?.strip_suffix(')')?;
        let mut parts = inner.split(',').map(|p| p.trim().parse::<u8>());
        let r = parts.next()?.ok()?;
        let g = parts.next()?.ok()?;
        let b = parts.next()?.ok()?;
        if parts.next().is_some() {
            return None;
        }
        Some(Rgb::new(r, g, b))
    }
}

/// Sort colors by ascending hue (stable, so equal hues keep dominance order).
pub fn sort_by_hue(colors: &mut [Rgb]) {
    colors.sort_by(|a, b| a.hue().total_cmp(&b.hue()));
}

/// Extracts up to `count` dominant colors from an image file.
///
/// An empty result means the image could not be decoded or had no usable pixels.
/// `should_stop` is polled between sampling passes; when it returns true the extractor
/// gives up with an error.
pub trait ColorExtractor: Send + Sync {
    fn extract(&self, path: &Path, count: usize, should_stop: &dyn Fn() -> bool)
    -> Result<Vec<Rgb>>;
}

/// [`ColorExtractor`] built on the `image` crate: downscale, bucket pixels by quantized
/// color, average the most populated buckets, then sort by hue.
#[derive(Clone, Copy, Debug, Default)]
pub struct ImageColorExtractor;

/// Running sums for one quantization bucket.
#[derive(Default, Clone, Copy)]
struct Bucket {
    count: u64,
    r: u64,
    g: u64,
    b: u64,
}

impl Bucket {
    fn mean(&self) -> Rgb {
        let n = self.count.max(1);
        Rgb::new((self.r / n) as u8, (self.g / n) as u8, (self.b / n) as u8)
    }
}

fn bucket_key(r: u8, g: u8, b: u8) -> u16 {
    let bits = ExtractConsts::QUANT_BITS;
    let shift = 8 - bits;
    ((r as u16 >> shift) << (2 * bits)) | ((g as u16 >> shift) << bits) | (b as u16 >> shift)
}

impl ColorExtractor for ImageColorExtractor {
    fn extract(
        &self,
        path: &Path,
        count: usize,
        should_stop: &dyn Fn() -> bool,
    ) -> Result<Vec<Rgb>> {
        let decoded = ImageReader::open(path)
            .and_then(|r| r.with_guessed_format())
            .map_err(image::ImageError::IoError)
            .and_then(|r| r.decode());
        let img = match decoded {
            Ok(img) => img,
            Err(e) => {
                debug!("decode {}: {}", path.display(), e);
                return Ok(Vec::new());
            }
        };
        if should_stop() {
            bail!("extraction interrupted after decode");
        }

        let edge = ExtractConsts::SAMPLE_EDGE_PX;
        let sample = if img.width() > edge || img.height() > edge {
            img.thumbnail(edge, edge)
        } else {
            img
        };
        let (width, height) = sample.dimensions();
        let rgba = sample.to_rgba8();

        let mut buckets: HashMap<u16, Bucket> = HashMap::new();
        for y in 0..height {
            if should_stop() {
                bail!("extraction interrupted while sampling");
            }
            for x in 0..width {
                let [r, g, b, a] = rgba.get_pixel(x, y).0;
                if a < ExtractConsts::MIN_ALPHA {
                    continue;
                }
                let bucket = buckets.entry(bucket_key(r, g, b)).or_default();
                bucket.count += 1;
                bucket.r += r as u64;
                bucket.g += g as u64;
                bucket.b += b as u64;
            }
        }

        let mut ranked: Vec<(u16, Bucket)> = buckets.into_iter().collect();
        ranked.sort_by(|(ka, a), (kb, b)| b.count.cmp(&a.count).then(ka.cmp(kb)));
        let mut colors: Vec<Rgb> = ranked
            .into_iter()
            .take(count)
            .map(|(_, bucket)| bucket.mean())
            .collect();
        sort_by_hue(&mut colors);
        Ok(colors)
    }
}
