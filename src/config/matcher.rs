use serde::{Deserialize, Serialize};

/// Tunables for hero portrait matching.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeroMatcherConfig {
    /// Lowe's ratio: keep a match when nearest < ratio * second nearest
    pub ratio_threshold: f32,
    /// Best combined score below this yields `NO_MATCH`
    pub confidence_threshold: f32,
    /// Keypoint budget per image, split across pyramid levels
    pub max_keypoints: usize,
    /// Number of pyramid levels, the full-size image included
    pub pyramid_levels: usize,
    /// Size ratio between consecutive pyramid levels; must be above 1.0
    pub scale_factor: f32,
    /// FAST intensity threshold
    pub fast_threshold: u8,
    /// Regions narrower or shorter than this (pixels) skip feature detection.
    /// Regions of 36 pixels or less on a side never get features either:
    /// keypoints need an 18 pixel margin for their descriptor patch.
    pub min_region_size: u32,
    /// Match count at which feature matching is trusted over colour
    pub min_reliable_matches: usize,
    /// Match count that saturates the feature score at 1.0
    pub full_confidence_matches: usize,
    pub hue_bins: usize,
    pub saturation_bins: usize,
    /// Feature weight when match count is reliable; colour takes the rest
    pub strong_orb_weight: f32,
    /// Feature weight when match count is not reliable; colour takes the rest
    pub weak_orb_weight: f32,
}

impl Default for HeroMatcherConfig {
    fn default() -> Self {
        Self {
            ratio_threshold: 0.75,
            confidence_threshold: 0.20,
            max_keypoints: 500,
            pyramid_levels: 8,
            scale_factor: 1.2,
            fast_threshold: 20,
            min_region_size: 5,
            min_reliable_matches: 4,
            full_confidence_matches: 20,
            hue_bins: 50,
            saturation_bins: 60,
            strong_orb_weight: 0.6,
            weak_orb_weight: 0.2,
        }
    }
}
