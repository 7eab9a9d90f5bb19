//! Image helpers: decoding, downscaling, perceptual hashing, blur scoring.

use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, GrayImage, ImageResult};

const PERCEPTUAL_HASH_SIZE: u32 = 8;

/// Hashes within this Hamming distance are treated as the same picture.
pub const PERCEPTUAL_HASH_MAX_DISTANCE: u32 = 5;

pub fn decode(bytes: &[u8]) -> ImageResult<DynamicImage> {
    image::load_from_memory(bytes)
}

/// Shrink so the longest edge is at most `max_side`. Never upscales.
pub fn downscale(image: DynamicImage, max_side: u32) -> DynamicImage {
    let (w, h) = image.dimensions();
    let longest = w.max(h);
    if max_side == 0 || longest <= max_side {
        return image;
    }
    let scale = max_side as f64 / longest as f64;
    let nw = ((w as f64 * scale).round() as u32).max(1);
    let nh = ((h as f64 * scale).round() as u32).max(1);
    image.resize_exact(nw, nh, FilterType::Triangle)
}

/// 64-bit average hash of the 8x8 luma thumbnail, as 16 hex chars.
pub fn perceptual_hash(image: &DynamicImage) -> String {
    let gray = image.to_luma8();
    let resized = image::imageops::resize(
        &gray,
        PERCEPTUAL_HASH_SIZE,
        PERCEPTUAL_HASH_SIZE,
        FilterType::Triangle,
    );
    let total: u32 = resized.pixels().map(|p| p[0] as u32).sum();
    let avg = total / (PERCEPTUAL_HASH_SIZE * PERCEPTUAL_HASH_SIZE);
    let mut hash: u64 = 0;
    for (idx, pixel) in resized.pixels().enumerate() {
        if pixel[0] as u32 >= avg {
            hash |= 1u64 << idx;
        }
    }
    format!("{:016x}", hash)
}

pub fn parse_hash(hex: &str) -> Option<u64> {
    u64::from_str_radix(hex.trim(), 16).ok()
}

pub fn hamming_distance(a: u64, b: u64) -> u32 {
    (a ^ b).count_ones()
}

/// True when `hash` is near any reference hash. Unparseable references are ignored.
pub fn is_perceptual_duplicate(hash: &str, seen: &[String]) -> bool {
    let Some(hash) = parse_hash(hash) else {
        return false;
    };
    seen.iter()
        .filter_map(|s| parse_hash(s))
        .any(|seen_hash| hamming_distance(seen_hash, hash) <= PERCEPTUAL_HASH_MAX_DISTANCE)
}

/// Variance of the 4-neighbour Laplacian over the luma channel.
///
/// Sharp images have strong edges and a high variance; blurry ones score low.
pub fn blur_score(image: &DynamicImage) -> f64 {
    laplacian_variance(&image.to_luma8())
}

fn laplacian_variance(gray: &GrayImage) -> f64 {
    let (w, h) = gray.dimensions();
    if w < 3 || h < 3 {
        return 0.0;
    }
    let px = |x: u32, y: u32| gray.get_pixel(x, y)[0] as f64;
    let mut sum = 0.0;
    let mut sum_sq = 0.0;
    let mut n = 0.0;
    for y in 1..h - 1 {
        for x in 1..w - 1 {
            let lap = px(x - 1, y) + px(x + 1, y) + px(x, y - 1) + px(x, y + 1) - 4.0 * px(x, y);
            sum += lap;
            sum_sq += lap * lap;
            n += 1.0;
        }
    }
    let mean = sum / n;
    (sum_sq / n - mean * mean).max(0.0)
}

#[cfg(test)]
pub(crate) mod test_images {
    use image::{DynamicImage, ImageFormat, Luma, RgbImage};
    use std::io::Cursor;

    /// Checkerboard: lots of edges, scores as sharp.
    pub fn checkerboard(size: u32, cell: u32) -> DynamicImage {
        let img = image::GrayImage::from_fn(size, size, |x, y| {
            if ((x / cell) + (y / cell)) % 2 == 0 {
                Luma([255])
            } else {
                Luma([0])
            }
        });
        DynamicImage::ImageLuma8(img)
    }

    /// Flat grey image: no edges at all.
    pub fn flat(size: u32) -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_pixel(size, size, image::Rgb([128, 128, 128])))
    }

    pub fn png_bytes(img: &DynamicImage) -> Vec<u8> {
        let mut buf = Cursor::new(Vec::new());
        img.write_to(&mut buf, ImageFormat::Png).unwrap();
        buf.into_inner()
    }
}
