use serde::{Deserialize, Serialize};

use super::medal::Medal;
use crate::hero::HeroMatchResult;
use crate::ocr::parse::{MatchResult, StatLine, DEFAULT_DURATION};

/// Match-wide values shown at the top of the scoreboard.
#[derive(Clone, Debug, PartialEq)]
pub struct MatchInfo {
    pub result: MatchResult,
    pub my_team_score: u32,
    pub adversary_team_score: u32,
    /// `mm:ss`
    pub duration: String,
}

impl Default for MatchInfo {
    fn default() -> Self {
        Self {
            result: MatchResult::Unknown,
            my_team_score: 0,
            adversary_team_score: 0,
            duration: DEFAULT_DURATION.to_string(),
        }
    }
}

/// Everything read from one player row.
#[derive(Clone, Debug, PartialEq)]
pub struct PlayerStats {
    /// 1-based row on the scoreboard
    pub position: u8,
    pub nickname: String,
    pub hero: HeroMatchResult,
    pub stats: StatLine,
    pub medal: Medal,
    pub ratio: f64,
}

/// One exported row: a player's stats joined with the match info.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PlayerRecord {
    pub source_image: String,
    pub position: u8,
    pub nickname: String,
    pub hero: String,
    pub hero_confidence: f32,
    pub kills: u32,
    pub deaths: u32,
    pub assists: u32,
    pub gold: u32,
    pub medal: Medal,
    pub ratio: f64,
    pub result: MatchResult,
    pub my_team_score: u32,
    pub adversary_team_score: u32,
    pub duration: String,
}

impl PlayerRecord {
    pub fn new(source_image: impl Into<String>, info: &MatchInfo, player: &PlayerStats) -> Self {
        Self {
            source_image: source_image.into(),
            position: player.position,
            nickname: player.nickname.clone(),
            hero: player.hero.label.clone(),
            hero_confidence: player.hero.confidence,
            kills: player.stats.kills,
            deaths: player.stats.deaths,
            assists: player.stats.assists,
            gold: player.stats.gold,
            medal: player.medal,
            ratio: player.ratio,
            result: info.result,
            my_team_score: info.my_team_score,
            adversary_team_score: info.adversary_team_score,
            duration: info.duration.clone(),
        }
    }
}

impl Default for PlayerRecord {
    fn default() -> Self {
        Self::new(
            "",
            &MatchInfo::default(),
            &PlayerStats {
                position: 0,
                nickname: String::new(),
                hero: HeroMatchResult::no_match(0.0),
                stats: StatLine::default(),
                medal: Medal::None,
                ratio: 0.0,
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hero::NO_MATCH;

    #[test]
    fn test_default_record_has_no_hero() {
        let record = PlayerRecord::default();
        assert_eq!(record.hero, NO_MATCH);
        assert_eq!(record.duration, "00:00");
        assert_eq!(record.result, MatchResult::Unknown);
    }

    #[test]
    fn test_record_serializes_enums_as_text() {
        let record = PlayerRecord {
            nickname: "Shadow".into(),
            medal: Medal::Gold,
            result: MatchResult::Victory,
            ..PlayerRecord::default()
        };
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["medal"], "GOLD");
        assert_eq!(json["result"], "VICTORY");
        assert_eq!(json["hero"], NO_MATCH);
    }
}
