use serde::{Deserialize, Serialize};

use super::region::Region;

/// Name of the built-in profile. It can never be removed.
pub const DEFAULT_PROFILE_NAME: &str = "default_2400x1080";

/// Regions of one player row on the scoreboard.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PlayerRegions {
    pub nickname: Region,
    /// K/D/A and gold, read as one line of numbers
    pub stats: Region,
    pub medal: Region,
    /// Performance rating below the medal
    pub ratio: Region,
    /// Hero portrait; profiles without it report `NO_MATCH`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hero: Option<Region>,
}

/// All screen regions for screenshots of one aspect ratio.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ResolutionProfile {
    pub name: String,
    pub description: String,
    pub reference_width: u32,
    pub reference_height: u32,
    pub result_region: Region,
    pub my_team_score_region: Region,
    pub adversary_score_region: Region,
    pub duration_region: Region,
    #[serde(default)]
    pub players: Vec<PlayerRegions>,
}

impl ResolutionProfile {
    pub fn aspect_ratio(&self) -> f64 {
        self.reference_width as f64 / self.reference_height.max(1) as f64
    }
}

fn player(
    nickname: Region,
    stats: Region,
    medal: Region,
    ratio: Region,
    hero: Region,
) -> PlayerRegions {
    PlayerRegions {
        nickname,
        stats,
        medal,
        ratio,
        hero: Some(hero),
    }
}

/// Profile calibrated on 2400x1080 (20:9) end-game screenshots.
pub fn default_profile() -> ResolutionProfile {
    ResolutionProfile {
        name: DEFAULT_PROFILE_NAME.to_string(),
        description: "Default profile for 2400x1080 (20:9) screenshots".to_string(),
        reference_width: 2400,
        reference_height: 1080,
        result_region: Region::new(40.02, 3.11, 19.90, 10.68),
        my_team_score_region: Region::new(32.48, 5.09, 4.97, 8.57),
        adversary_score_region: Region::new(62.60, 5.22, 4.81, 7.95),
        duration_region: Region::new(77.25, 11.43, 4.58, 4.10),
        players: vec![
            player(
                Region::new(21.07, 20.80, 10.56, 5.88),
                Region::new(31.13, 21.99, 12.13, 4.22),
                Region::new(43.77, 22.61, 3.86, 7.45),
                Region::new(43.77, 29.32, 3.86, 4.22),
                Region::new(14.195398, 21.827115, 4.894819, 10.726365),
            ),
            player(
                Region::new(20.96, 33.59, 10.56, 5.88),
                Region::new(31.19, 34.53, 12.13, 4.22),
                Region::new(43.82, 35.16, 3.86, 7.58),
                Region::new(43.71, 42.24, 3.86, 4.22),
                Region::new(14.212705, 34.497115, 4.831165, 10.726365),
            ),
            player(
                Region::new(20.96, 46.49, 10.56, 5.64),
                Region::new(31.02, 47.58, 12.13, 4.22),
                Region::new(43.71, 48.20, 3.86, 7.45),
                Region::new(43.71, 54.91, 3.86, 4.22),
                Region::new(14.340013, 47.33, 4.640204, 10.584922),
            ),
            player(
                Region::new(21.02, 59.41, 10.56, 5.64),
                Region::new(30.97, 60.25, 12.13, 4.22),
                Region::new(43.66, 61.37, 3.86, 7.45),
                Region::new(43.77, 67.95, 3.86, 4.22),
                Region::new(14.336359, 59.945672, 4.703857, 10.867808),
            ),
            player(
                Region::new(20.96, 72.21, 10.56, 5.76),
                Region::new(31.02, 73.04, 12.13, 4.22),
                Region::new(43.71, 73.54, 3.86, 7.45),
                Region::new(43.71, 80.62, 3.86, 4.22),
                Region::new(14.340013, 72.745672, 4.767511, 10.867808),
            ),
        ],
    }
}
