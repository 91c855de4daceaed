//! Oriented FAST keypoints with rotated BRIEF descriptors, and ratio-test
//! matching by Hamming distance.

use image::imageops::{self, FilterType};
use image::{GrayImage, RgbImage};
use imageproc::corners::{corners_fast9, Corner};
use imageproc::filter::gaussian_blur_f32;
use std::sync::OnceLock;

use crate::config::HeroMatcherConfig;

/// Radius of the patch used for the intensity-centroid orientation.
const PATCH_RADIUS: i32 = 15;
/// Sampling pairs lie in [-PATTERN_RADIUS, PATTERN_RADIUS]^2 before rotation.
const PATTERN_RADIUS: i32 = 12;
/// Keypoints closer than this to an edge are dropped (rotated pattern stays inside).
const BORDER: u32 = 18;
const BLUR_SIGMA: f32 = 2.0;
const DESCRIPTOR_BITS: usize = 256;

pub type Descriptor = [u8; DESCRIPTOR_BITS / 8];

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Keypoint {
    pub x: u32,
    pub y: u32,
    /// Pyramid level the keypoint was found on, 0 being full size
    pub level: usize,
    pub score: f32,
    /// Orientation in radians
    pub angle: f32,
}

/// Keypoints and their descriptors, index-aligned.
#[derive(Clone, Debug, Default)]
pub struct Features {
    pub keypoints: Vec<Keypoint>,
    pub descriptors: Vec<Descriptor>,
}

impl Features {
    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }
}

/// Result of matching a query against one reference.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct FeatureScore {
    /// In [0, 1]
    pub orb_score: f32,
    pub match_count: usize,
}

/// Fixed BRIEF sampling pairs `(px, py, qx, qy)`, generated once from a constant seed.
fn brief_pattern() -> &'static [(i8, i8, i8, i8)] {
    static PATTERN: OnceLock<Vec<(i8, i8, i8, i8)>> = OnceLock::new();
    PATTERN.get_or_init(|| {
        let mut state: u32 = 0x2545_F491;
        let mut next = move || {
            // xorshift32
            state ^= state << 13;
            state ^= state >> 17;
            state ^= state << 5;
            ((state % (2 * PATTERN_RADIUS as u32 + 1)) as i32 - PATTERN_RADIUS) as i8
        };

        let mut pairs = Vec::with_capacity(DESCRIPTOR_BITS);
        while pairs.len() < DESCRIPTOR_BITS {
            let p = (next(), next());
            let q = (next(), next());
            if p != q {
                pairs.push((p.0, p.1, q.0, q.1));
            }
        }
        pairs
    })
}

/// One level of the detection pyramid.
struct PyramidLevel {
    gray: GrayImage,
    /// Full-size pixels per pixel of this level
    scale: f32,
}

/// Downscaled copies of `gray`, each `scale_factor` smaller than the last.
/// Stops before a level too small to hold a keypoint.
fn build_pyramid(gray: GrayImage, cfg: &HeroMatcherConfig) -> Vec<PyramidLevel> {
    let (width, height) = gray.dimensions();
    let levels = if cfg.scale_factor > 1.0 {
        cfg.pyramid_levels.max(1)
    } else {
        1
    };

    let mut pyramid = vec![PyramidLevel { gray, scale: 1.0 }];
    for level in 1..levels {
        let scale = cfg.scale_factor.powi(level as i32);
        let w = (width as f32 / scale).round() as u32;
        let h = (height as f32 / scale).round() as u32;
        if w <= 2 * BORDER || h <= 2 * BORDER {
            break;
        }
        let resized = imageops::resize(&pyramid[0].gray, w, h, FilterType::Triangle);
        pyramid.push(PyramidLevel {
            gray: resized,
            scale,
        });
    }
    pyramid
}

/// Splits `total` keypoints over `levels` so that each level gets
/// `1 / scale_factor` of the one above it. The last level takes the remainder.
fn level_budgets(total: usize, levels: usize, scale_factor: f32) -> Vec<usize> {
    if levels <= 1 || scale_factor <= 1.0 {
        return vec![total];
    }
    let factor = 1.0 / scale_factor;
    let mut share = total as f32 * (1.0 - factor) / (1.0 - factor.powi(levels as i32));
    let mut budgets = Vec::with_capacity(levels);
    let mut assigned = 0;
    for _ in 1..levels {
        let n = (share.round() as usize).min(total - assigned);
        budgets.push(n);
        assigned += n;
        share *= factor;
    }
    budgets.push(total - assigned);
    budgets
}

/// Detects up to `max_keypoints` oriented keypoints over the image pyramid
/// and computes their descriptors. Keypoint coordinates are in full-size pixels.
///
/// Images narrower or shorter than `min_region_size` return no features
/// without running the detector.
pub fn detect_and_compute(image: &RgbImage, cfg: &HeroMatcherConfig) -> Features {
    let (width, height) = image.dimensions();
    if width < cfg.min_region_size || height < cfg.min_region_size {
        return Features::default();
    }
    if width <= 2 * BORDER || height <= 2 * BORDER {
        log::trace!(
            "{}x{} region leaves no room for descriptor patches, skipping features",
            width,
            height
        );
        return Features::default();
    }

    let pyramid = build_pyramid(imageops::grayscale(image), cfg);
    let budgets = level_budgets(cfg.max_keypoints, pyramid.len(), cfg.scale_factor);

    let mut features = Features::default();
    // Budget a level cannot use moves down to the next one.
    let mut unused = 0;
    for (index, (level, budget)) in pyramid.iter().zip(budgets).enumerate() {
        let budget = budget + unused;
        let corners = strongest_corners(&level.gray, cfg.fast_threshold, budget);
        unused = budget - corners.len();

        let blurred = gaussian_blur_f32(&level.gray, BLUR_SIGMA);
        for corner in corners {
            let angle = orientation(&level.gray, corner.x, corner.y);
            features.descriptors.push(describe(&blurred, corner.x, corner.y, angle));
            features.keypoints.push(Keypoint {
                x: ((corner.x as f32 * level.scale) as u32).min(width - 1),
                y: ((corner.y as f32 * level.scale) as u32).min(height - 1),
                level: index,
                score: corner.score,
                angle,
            });
        }
    }
    features
}

/// Non-maximum-suppressed FAST corners at least `BORDER` from every edge,
/// strongest first, at most `budget` of them.
fn strongest_corners(gray: &GrayImage, threshold: u8, budget: usize) -> Vec<Corner> {
    let (width, height) = gray.dimensions();
    let mut corners: Vec<Corner> =
        suppress_non_maxima(corners_fast9(gray, threshold), width, height)
            .into_iter()
            .filter(|c| {
                c.x >= BORDER && c.y >= BORDER && c.x < width - BORDER && c.y < height - BORDER
            })
            .collect();

    corners.sort_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then(a.y.cmp(&b.y))
            .then(a.x.cmp(&b.x))
    });
    corners.truncate(budget);
    corners
}

/// Keeps corners whose score is not beaten by any 8-neighbour.
fn suppress_non_maxima(corners: Vec<Corner>, width: u32, height: u32) -> Vec<Corner> {
    let mut grid = vec![0f32; (width * height) as usize];
    for c in &corners {
        grid[(c.y * width + c.x) as usize] = c.score;
    }

    corners
        .into_iter()
        .filter(|c| {
            for dy in -1i64..=1 {
                for dx in -1i64..=1 {
                    if dx == 0 && dy == 0 {
                        continue;
                    }
                    let nx = c.x as i64 + dx;
                    let ny = c.y as i64 + dy;
                    if nx < 0 || ny < 0 || nx >= width as i64 || ny >= height as i64 {
                        continue;
                    }
                    if grid[(ny as u32 * width + nx as u32) as usize] > c.score {
                        return false;
                    }
                }
            }
            true
        })
        .collect()
}

/// Intensity-centroid angle of the circular patch around `(x, y)`.
fn orientation(gray: &GrayImage, x: u32, y: u32) -> f32 {
    let mut m01 = 0f32;
    let mut m10 = 0f32;
    for dy in -PATCH_RADIUS..=PATCH_RADIUS {
        for dx in -PATCH_RADIUS..=PATCH_RADIUS {
            if dx * dx + dy * dy > PATCH_RADIUS * PATCH_RADIUS {
                continue;
            }
            let v = gray.get_pixel((x as i32 + dx) as u32, (y as i32 + dy) as u32)[0] as f32;
            m10 += dx as f32 * v;
            m01 += dy as f32 * v;
        }
    }
    m01.atan2(m10)
}

fn describe(blurred: &GrayImage, x: u32, y: u32, angle: f32) -> Descriptor {
    let (sin, cos) = angle.sin_cos();
    let sample = |dx: i8, dy: i8| -> u8 {
        let (dx, dy) = (dx as f32, dy as f32);
        let rx = (cos * dx - sin * dy).round() as i32;
        let ry = (sin * dx + cos * dy).round() as i32;
        blurred.get_pixel((x as i32 + rx) as u32, (y as i32 + ry) as u32)[0]
    };

    let mut descriptor = [0u8; DESCRIPTOR_BITS / 8];
    for (i, &(px, py, qx, qy)) in brief_pattern().iter().enumerate() {
        if sample(px, py) < sample(qx, qy) {
            descriptor[i / 8] |= 1 << (i % 8);
        }
    }
    descriptor
}

pub fn hamming_distance(a: &Descriptor, b: &Descriptor) -> u32 {
    a.iter().zip(b.iter()).map(|(x, y)| (x ^ y).count_ones()).sum()
}

/// Counts query descriptors whose nearest reference descriptor passes Lowe's
/// ratio test, and maps the count to a score in [0, 1].
///
/// A query descriptor with no second neighbour is never counted.
pub fn match_features(
    query: &Features,
    reference: &Features,
    cfg: &HeroMatcherConfig,
) -> FeatureScore {
    if query.is_empty() || reference.is_empty() {
        return FeatureScore::default();
    }

    let mut match_count = 0;
    for q in &query.descriptors {
        let mut best = u32::MAX;
        let mut second = u32::MAX;
        for r in &reference.descriptors {
            let d = hamming_distance(q, r);
            if d < best {
                second = best;
                best = d;
            } else if d < second {
                second = d;
            }
        }
        if second != u32::MAX && (best as f32) < cfg.ratio_threshold * second as f32 {
            match_count += 1;
        }
    }

    FeatureScore {
        orb_score: orb_score(match_count, query.len(), reference.len(), cfg),
        match_count,
    }
}

/// `min(1, match_count / expected)` where `expected` is the configured
/// saturation count, capped by the smaller descriptor set.
pub fn orb_score(
    match_count: usize,
    query_len: usize,
    reference_len: usize,
    cfg: &HeroMatcherConfig,
) -> f32 {
    let expected = cfg
        .full_confidence_matches
        .min(query_len.min(reference_len))
        .max(1);
    (match_count as f32 / expected as f32).min(1.0)
}
