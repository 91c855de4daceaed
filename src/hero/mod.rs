//! Hero portrait classification.
//!
//! A cropped portrait is compared with every reference entry by feature
//! matching and by hue/saturation histogram correlation. The two scores are
//! blended, trusting features only when enough of them matched.

pub mod catalog;
pub mod color;
pub mod features;

use image::RgbImage;
use serde::Serialize;

use crate::config::HeroMatcherConfig;
use catalog::ReferenceCatalog;
use color::{color_score, hs_histogram};
use features::{detect_and_compute, match_features};

/// Label reported when no reference is similar enough.
pub const NO_MATCH: &str = "NO_MATCH";

/// Scores of one reference entry for one query.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct MatchCandidate {
    pub hero_name: String,
    pub orb_score: f32,
    pub match_count: usize,
    pub color_score: f32,
    pub combined_score: f32,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct HeroMatchResult {
    pub label: String,
    /// Combined score of the best candidate, in [0, 1]
    pub confidence: f32,
}

impl HeroMatchResult {
    pub fn no_match(confidence: f32) -> Self {
        Self {
            label: NO_MATCH.to_string(),
            confidence,
        }
    }
}

/// Blends the two sub-scores. Feature matching dominates once
/// `match_count` reaches `min_reliable_matches`, colour otherwise.
pub fn combine_scores(
    orb_score: f32,
    match_count: usize,
    color_score: f32,
    cfg: &HeroMatcherConfig,
) -> f32 {
    let orb_weight = if match_count >= cfg.min_reliable_matches {
        cfg.strong_orb_weight
    } else {
        cfg.weak_orb_weight
    };
    let combined = orb_weight * orb_score + (1.0 - orb_weight) * color_score;
    if combined.is_nan() {
        0.0
    } else {
        combined.clamp(0.0, 1.0)
    }
}

/// Scores `region` against every catalog entry, in catalog order.
pub fn score_candidates(
    region: &RgbImage,
    catalog: &ReferenceCatalog,
    cfg: &HeroMatcherConfig,
) -> Vec<MatchCandidate> {
    if catalog.is_empty() {
        return Vec::new();
    }

    let query_features = detect_and_compute(region, cfg);
    let query_histogram = hs_histogram(region, cfg);

    catalog
        .entries()
        .iter()
        .map(|entry| {
            let feature = match_features(&query_features, &entry.features, cfg);
            let color = color_score(&query_histogram, &entry.histogram);
            MatchCandidate {
                hero_name: entry.name.clone(),
                orb_score: feature.orb_score,
                match_count: feature.match_count,
                color_score: color,
                combined_score: combine_scores(
                    feature.orb_score,
                    feature.match_count,
                    color,
                    cfg,
                ),
            }
        })
        .collect()
}

/// Classifies a cropped hero portrait.
///
/// Returns the best entry's name, or `NO_MATCH` when the catalog is empty or
/// the best combined score is below `confidence_threshold`. Ties go to the
/// earlier entry.
pub fn classify(
    region: &RgbImage,
    catalog: &ReferenceCatalog,
    cfg: &HeroMatcherConfig,
) -> HeroMatchResult {
    let candidates = score_candidates(region, catalog, cfg);

    let mut best: Option<&MatchCandidate> = None;
    for candidate in &candidates {
        if best.is_none_or(|b| candidate.combined_score > b.combined_score) {
            best = Some(candidate);
        }
    }

    let Some(best) = best else {
        return HeroMatchResult::no_match(0.0);
    };

    log::debug!(
        "Best hero candidate {} (orb={:.3}, matches={}, color={:.3}, combined={:.3})",
        best.hero_name,
        best.orb_score,
        best.match_count,
        best.color_score,
        best.combined_score
    );

    if best.combined_score < cfg.confidence_threshold {
        HeroMatchResult::no_match(best.combined_score)
    } else {
        HeroMatchResult {
            label: best.hero_name.clone(),
            confidence: best.combined_score,
        }
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use image::{ImageBuffer, Rgb, RgbImage};

    fn hash(x: u32, y: u32, seed: u32) -> u32 {
        let mut h = x.wrapping_mul(0x9E37_79B1)
            ^ y.wrapping_mul(0x85EB_CA77)
            ^ seed.wrapping_mul(0xC2B2_AE3D);
        h ^= h >> 15;
        h = h.wrapping_mul(0x2C1B_3C6D);
        h ^= h >> 12;
        h = h.wrapping_mul(0x297A_2D39);
        h ^= h >> 15;
        h
    }

    /// Per-pixel colour noise, reproducible from `seed`.
    pub fn make_noise_image(width: u32, height: u32, seed: u32) -> RgbImage {
        ImageBuffer::from_fn(width, height, |x, y| {
            let h = hash(x, y, seed);
            Rgb([h as u8, (h >> 8) as u8, (h >> 16) as u8])
        })
    }

    /// Noise with a strong red cast, so no pixel is close to gray.
    pub fn make_red_noise_image(width: u32, height: u32, seed: u32) -> RgbImage {
        ImageBuffer::from_fn(width, height, |x, y| {
            let h = hash(x, y, seed);
            Rgb([200 + (h % 56) as u8, ((h >> 8) % 100) as u8, ((h >> 16) % 100) as u8])
        })
    }

    /// Smooth colour texture: random colours on a lattice of 6 px cells,
    /// blended bilinearly. Unlike per-pixel noise it survives resizing.
    pub fn make_texture_image(width: u32, height: u32, seed: u32) -> RgbImage {
        const CELL: u32 = 6;
        ImageBuffer::from_fn(width, height, |x, y| {
            let (gx, gy) = (x / CELL, y / CELL);
            let fx = (x % CELL) as f32 / CELL as f32;
            let fy = (y % CELL) as f32 / CELL as f32;
            let corners = [
                hash(gx, gy, seed),
                hash(gx + 1, gy, seed),
                hash(gx, gy + 1, seed),
                hash(gx + 1, gy + 1, seed),
            ];
            let mut pixel = [0u8; 3];
            for (channel, value) in pixel.iter_mut().enumerate() {
                let c = |h: u32| ((h >> (8 * channel)) & 0xFF) as f32;
                let top = c(corners[0]) * (1.0 - fx) + c(corners[1]) * fx;
                let bottom = c(corners[2]) * (1.0 - fx) + c(corners[3]) * fx;
                *value = (top * (1.0 - fy) + bottom * fy).round() as u8;
            }
            Rgb(pixel)
        })
    }

    /// Gray-level noise: every pixel has zero saturation.
    pub fn make_gray_noise_image(width: u32, height: u32, seed: u32) -> RgbImage {
        ImageBuffer::from_fn(width, height, |x, y| {
            let v = hash(x, y, seed) as u8;
            Rgb([v, v, v])
        })
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;

    fn make_catalog(cfg: &HeroMatcherConfig) -> (ReferenceCatalog, RgbImage) {
        let minotauro = make_red_noise_image(120, 120, 42);
        let catalog = ReferenceCatalog::from_images(
            [
                ("Tigreal", make_red_noise_image(120, 120, 1)),
                ("Minotauro", minotauro.clone()),
                ("Franco", make_red_noise_image(120, 120, 2)),
            ],
            cfg,
        );
        (catalog, minotauro)
    }

    #[test]
    fn test_cropped_reference_is_recognized() {
        let cfg = HeroMatcherConfig::default();
        let (catalog, minotauro) = make_catalog(&cfg);
        let crop = image::imageops::crop_imm(&minotauro, 10, 12, 100, 96).to_image();

        let result = classify(&crop, &catalog, &cfg);
        assert_eq!(result.label, "Minotauro");
        assert!(result.confidence >= 0.6, "confidence {}", result.confidence);
    }

    #[test]
    fn test_downscaled_reference_is_recognized() {
        use image::imageops::{resize, FilterType};

        let cfg = HeroMatcherConfig::default();
        let estes = make_texture_image(160, 160, 8);
        let catalog = ReferenceCatalog::from_images(
            [
                ("Angela", make_texture_image(160, 160, 5)),
                ("Estes", estes.clone()),
            ],
            &cfg,
        );

        for size in [133, 111] {
            let query = resize(&estes, size, size, FilterType::Triangle);
            let result = classify(&query, &catalog, &cfg);
            assert_eq!(result.label, "Estes", "{}px", size);
            assert!(result.confidence >= 0.6, "{}px: confidence {}", size, result.confidence);
        }
    }

    #[test]
    fn test_gray_noise_is_no_match() {
        let cfg = HeroMatcherConfig::default();
        let (catalog, _) = make_catalog(&cfg);
        let query = make_gray_noise_image(120, 120, 99);

        let result = classify(&query, &catalog, &cfg);
        assert_eq!(result.label, NO_MATCH);
        assert!(result.confidence < 0.20, "confidence {}", result.confidence);
    }

    #[test]
    fn test_empty_catalog_is_always_no_match() {
        let cfg = HeroMatcherConfig::default();
        let catalog = ReferenceCatalog::empty();
        for query in [make_noise_image(64, 64, 1), make_gray_noise_image(3, 3, 2)] {
            let result = classify(&query, &catalog, &cfg);
            assert_eq!(result, HeroMatchResult::no_match(0.0));
        }
    }

    #[test]
    fn test_tie_goes_to_first_entry() {
        let cfg = HeroMatcherConfig::default();
        let image = make_red_noise_image(100, 100, 5);
        let catalog = ReferenceCatalog::from_images(
            [("Alpha", image.clone()), ("Beta", image.clone())],
            &cfg,
        );

        let result = classify(&image, &catalog, &cfg);
        assert_eq!(result.label, "Alpha");
    }

    #[test]
    fn test_tiny_region_is_well_formed() {
        let cfg = HeroMatcherConfig::default();
        let (catalog, _) = make_catalog(&cfg);
        let tiny = make_red_noise_image(4, 4, 42);

        let candidates = score_candidates(&tiny, &catalog, &cfg);
        assert_eq!(candidates.len(), 3);
        assert!(candidates.iter().all(|c| c.orb_score == 0.0 && c.match_count == 0));

        let result = classify(&tiny, &catalog, &cfg);
        assert!((0.0..=1.0).contains(&result.confidence));
    }

    #[test]
    fn test_classify_is_deterministic() {
        let cfg = HeroMatcherConfig::default();
        let (catalog, _) = make_catalog(&cfg);
        let query = make_noise_image(90, 90, 17);

        let first = classify(&query, &catalog, &cfg);
        for _ in 0..3 {
            assert_eq!(classify(&query, &catalog, &cfg), first);
        }
    }

    #[test]
    fn test_confidence_stays_in_unit_range() {
        let cfg = HeroMatcherConfig::default();
        let (catalog, minotauro) = make_catalog(&cfg);
        let queries = [
            minotauro,
            make_noise_image(50, 70, 3),
            make_gray_noise_image(120, 120, 4),
            make_red_noise_image(1, 1, 5),
        ];
        for query in &queries {
            let result = classify(query, &catalog, &cfg);
            assert!((0.0..=1.0).contains(&result.confidence));
        }
    }

    #[test]
    fn test_combined_is_monotonic_in_match_count() {
        let cfg = HeroMatcherConfig::default();
        let color = 0.35;
        let mut previous = 0.0;
        for count in cfg.min_reliable_matches..=60 {
            let orb = features::orb_score(count, 200, 200, &cfg);
            let combined = combine_scores(orb, count, color, &cfg);
            assert!(combined >= previous);
            previous = combined;
        }
    }

    #[test]
    fn test_combine_weights() {
        let cfg = HeroMatcherConfig::default();
        assert!((combine_scores(1.0, 4, 0.0, &cfg) - 0.6).abs() < 1e-6);
        assert!((combine_scores(1.0, 3, 0.0, &cfg) - 0.2).abs() < 1e-6);
        assert!((combine_scores(0.0, 3, 1.0, &cfg) - 0.8).abs() < 1e-6);
        assert_eq!(combine_scores(f32::NAN, 10, 0.5, &cfg), 0.0);
    }

    #[test]
    fn test_threshold_boundary() {
        let cfg = HeroMatcherConfig {
            confidence_threshold: 0.99,
            ..HeroMatcherConfig::default()
        };
        let (catalog, _) = make_catalog(&cfg);
        let query = make_red_noise_image(120, 120, 1000);

        let result = classify(&query, &catalog, &cfg);
        assert_eq!(result.label, NO_MATCH);
        assert!(result.confidence < 0.99);
    }
}
