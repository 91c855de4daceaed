use image::RgbImage;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::hero::color::rgb_to_hsv;

/// Fewer matching pixels than this means no medal is shown.
pub const MIN_MEDAL_PIXELS: usize = 50;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Medal {
    Gold,
    Silver,
    Bronze,
    #[default]
    None,
}

impl fmt::Display for Medal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Medal::Gold => "GOLD",
            Medal::Silver => "SILVER",
            Medal::Bronze => "BRONZE",
            Medal::None => "NONE",
        };
        f.write_str(s)
    }
}

/// Inclusive HSV bounds, hue in [0, 180).
struct HsvRange {
    lower: [u8; 3],
    upper: [u8; 3],
}

impl HsvRange {
    fn contains(&self, hsv: (u8, u8, u8)) -> bool {
        let (h, s, v) = hsv;
        (self.lower[0]..=self.upper[0]).contains(&h)
            && (self.lower[1]..=self.upper[1]).contains(&s)
            && (self.lower[2]..=self.upper[2]).contains(&v)
    }
}

const GOLD: HsvRange = HsvRange {
    lower: [15, 80, 120],
    upper: [35, 255, 255],
};
const SILVER: HsvRange = HsvRange {
    lower: [0, 0, 150],
    upper: [180, 50, 255],
};
const BRONZE: HsvRange = HsvRange {
    lower: [8, 80, 80],
    upper: [20, 255, 200],
};

/// Classifies the medal by its dominant colour. Ties prefer gold, then silver.
pub fn detect_medal(region: &RgbImage) -> Medal {
    let (mut gold, mut silver, mut bronze) = (0usize, 0usize, 0usize);
    for pixel in region.pixels() {
        let hsv = rgb_to_hsv(pixel[0], pixel[1], pixel[2]);
        gold += GOLD.contains(hsv) as usize;
        silver += SILVER.contains(hsv) as usize;
        bronze += BRONZE.contains(hsv) as usize;
    }

    let max = gold.max(silver).max(bronze);
    log::trace!("Medal pixels: gold={} silver={} bronze={}", gold, silver, bronze);

    if max < MIN_MEDAL_PIXELS {
        Medal::None
    } else if max == gold {
        Medal::Gold
    } else if max == silver {
        Medal::Silver
    } else {
        Medal::Bronze
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Rgb};

    fn make_region(colors: &[(Rgb<u8>, u32)], width: u32) -> RgbImage {
        let rows: u32 = colors.iter().map(|(_, rows)| rows).sum();
        ImageBuffer::from_fn(width, rows, |_, y| {
            let mut acc = 0;
            for (color, count) in colors {
                acc += count;
                if y < acc {
                    return *color;
                }
            }
            Rgb([0, 0, 0])
        })
    }

    #[test]
    fn test_detects_each_medal() {
        let gold = make_region(&[(Rgb([255, 200, 0]), 10)], 10);
        let silver = make_region(&[(Rgb([200, 200, 205]), 10)], 10);
        let bronze = make_region(&[(Rgb([180, 100, 40]), 10)], 10);

        assert_eq!(detect_medal(&gold), Medal::Gold);
        assert_eq!(detect_medal(&silver), Medal::Silver);
        assert_eq!(detect_medal(&bronze), Medal::Bronze);
    }

    #[test]
    fn test_too_few_pixels_is_none() {
        let small = make_region(&[(Rgb([255, 200, 0]), 4)], 10);
        assert_eq!(detect_medal(&small), Medal::None);
        assert_eq!(detect_medal(&ImageBuffer::new(0, 0)), Medal::None);
    }

    #[test]
    fn test_dark_background_is_none() {
        let dark = make_region(&[(Rgb([20, 30, 90]), 20)], 20);
        assert_eq!(detect_medal(&dark), Medal::None);
    }

    #[test]
    fn test_tie_prefers_gold() {
        let region = make_region(&[(Rgb([255, 200, 0]), 6), (Rgb([200, 200, 205]), 6)], 10);
        assert_eq!(detect_medal(&region), Medal::Gold);
    }

    #[test]
    fn test_majority_wins() {
        let region = make_region(&[(Rgb([255, 200, 0]), 6), (Rgb([200, 200, 205]), 9)], 10);
        assert_eq!(detect_medal(&region), Medal::Silver);
    }

    #[test]
    fn test_display_matches_serde() {
        assert_eq!(Medal::Bronze.to_string(), "BRONZE");
        assert_eq!(serde_json::to_string(&Medal::None).unwrap(), "\"NONE\"");
    }
}
