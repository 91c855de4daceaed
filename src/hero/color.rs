//! Hue/saturation histograms and their comparison.
//!
//! HSV values use the 8-bit convention common to vision libraries:
//! hue in [0, 180), saturation and value in [0, 255].

use image::RgbImage;

use crate::config::HeroMatcherConfig;

/// A normalized 2D hue x saturation histogram, row-major by hue.
#[derive(Clone, Debug, PartialEq)]
pub struct HsHistogram {
    pub hue_bins: usize,
    pub saturation_bins: usize,
    pub bins: Vec<f32>,
}

/// Converts one RGB pixel to HSV with hue in [0, 180).
pub fn rgb_to_hsv(r: u8, g: u8, b: u8) -> (u8, u8, u8) {
    let (rf, gf, bf) = (r as f32, g as f32, b as f32);
    let max = rf.max(gf).max(bf);
    let min = rf.min(gf).min(bf);
    let delta = max - min;

    let v = max;
    let s = if max > 0.0 { delta * 255.0 / max } else { 0.0 };

    let mut h = if delta == 0.0 {
        0.0
    } else if max == rf {
        60.0 * (gf - bf) / delta
    } else if max == gf {
        120.0 + 60.0 * (bf - rf) / delta
    } else {
        240.0 + 60.0 * (rf - gf) / delta
    };
    if h < 0.0 {
        h += 360.0;
    }

    let h = ((h / 2.0).round() as u32 % 180) as u8;
    (h, s.round().min(255.0) as u8, v as u8)
}

/// Builds the hue x saturation histogram of `image`, min-max normalized to [0, 1].
pub fn hs_histogram(image: &RgbImage, cfg: &HeroMatcherConfig) -> HsHistogram {
    let hue_bins = cfg.hue_bins.max(1);
    let saturation_bins = cfg.saturation_bins.max(1);
    let mut bins = vec![0f32; hue_bins * saturation_bins];

    for pixel in image.pixels() {
        let (h, s, _) = rgb_to_hsv(pixel[0], pixel[1], pixel[2]);
        let hi = (h as usize * hue_bins / 180).min(hue_bins - 1);
        let si = (s as usize * saturation_bins / 256).min(saturation_bins - 1);
        bins[hi * saturation_bins + si] += 1.0;
    }

    let max = bins.iter().copied().fold(0f32, f32::max);
    let min = bins.iter().copied().fold(f32::INFINITY, f32::min);
    let range = max - min;
    if range > 0.0 {
        for bin in &mut bins {
            *bin = (*bin - min) / range;
        }
    }

    HsHistogram {
        hue_bins,
        saturation_bins,
        bins,
    }
}

/// Pearson correlation of two histograms, clamped to [0, 1].
///
/// Histograms of different shapes, or with no variance, score 0.
pub fn color_score(query: &HsHistogram, reference: &HsHistogram) -> f32 {
    if query.bins.len() != reference.bins.len() || query.bins.is_empty() {
        return 0.0;
    }

    let n = query.bins.len() as f64;
    let mean_q = query.bins.iter().map(|&v| v as f64).sum::<f64>() / n;
    let mean_r = reference.bins.iter().map(|&v| v as f64).sum::<f64>() / n;

    let mut cov = 0f64;
    let mut var_q = 0f64;
    let mut var_r = 0f64;
    for (&q, &r) in query.bins.iter().zip(&reference.bins) {
        let dq = q as f64 - mean_q;
        let dr = r as f64 - mean_r;
        cov += dq * dr;
        var_q += dq * dq;
        var_r += dr * dr;
    }

    let denom = (var_q * var_r).sqrt();
    if denom <= f64::EPSILON {
        return 0.0;
    }
    ((cov / denom) as f32).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Rgb};

    fn make_gradient(width: u32, height: u32) -> RgbImage {
        ImageBuffer::from_fn(width, height, |x, y| {
            Rgb([(x * 7 % 256) as u8, (y * 11 % 256) as u8, ((x + y) * 3 % 256) as u8])
        })
    }

    #[test]
    fn test_rgb_to_hsv_primaries() {
        assert_eq!(rgb_to_hsv(255, 0, 0), (0, 255, 255));
        assert_eq!(rgb_to_hsv(0, 255, 0), (60, 255, 255));
        assert_eq!(rgb_to_hsv(0, 0, 255), (120, 255, 255));
        assert_eq!(rgb_to_hsv(128, 128, 128), (0, 0, 128));
        assert_eq!(rgb_to_hsv(0, 0, 0), (0, 0, 0));
    }

    #[test]
    fn test_histogram_is_normalized() {
        let hist = hs_histogram(&make_gradient(40, 40), &HeroMatcherConfig::default());
        assert_eq!(hist.bins.len(), 50 * 60);
        let max = hist.bins.iter().copied().fold(0f32, f32::max);
        assert!((max - 1.0).abs() < 1e-6);
        assert!(hist.bins.iter().all(|&v| (0.0..=1.0).contains(&v)));
    }

    #[test]
    fn test_identical_images_score_one() {
        let cfg = HeroMatcherConfig::default();
        let hist = hs_histogram(&make_gradient(32, 32), &cfg);
        assert!((color_score(&hist, &hist) - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_disjoint_colors_score_zero() {
        let cfg = HeroMatcherConfig::default();
        let red: RgbImage = ImageBuffer::from_pixel(20, 20, Rgb([220, 20, 20]));
        let blue: RgbImage = ImageBuffer::from_pixel(20, 20, Rgb([20, 20, 220]));
        let score = color_score(&hs_histogram(&red, &cfg), &hs_histogram(&blue, &cfg));
        assert_eq!(score, 0.0);
    }

    #[test]
    fn test_mismatched_shapes_score_zero() {
        let cfg = HeroMatcherConfig::default();
        let coarse = HeroMatcherConfig {
            hue_bins: 10,
            ..HeroMatcherConfig::default()
        };
        let img = make_gradient(16, 16);
        assert_eq!(color_score(&hs_histogram(&img, &cfg), &hs_histogram(&img, &coarse)), 0.0);
    }
}
