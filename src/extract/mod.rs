//! Per-screenshot extraction.
//!
//! Crops every configured region, preprocesses it for OCR or colour analysis
//! and turns the result into a [`PlayerRecord`] per player row.

pub mod medal;
pub mod nickname;
pub mod record;

use anyhow::{anyhow, Context, Result};
use image::{GrayImage, RgbImage};
use std::path::Path;
use std::sync::Arc;

use crate::config::{ExtractorConfig, PlayerRegions, Region, ResolutionProfile};
use crate::debug::DebugSession;
use crate::hero::catalog::ReferenceCatalog;
use crate::hero::{classify, HeroMatchResult};
use crate::ocr::engine::{DIGITS, DIGITS_AND_SPACE, DURATION_CHARS, RATING_CHARS, UPPERCASE};
use crate::ocr::parse::{
    clean_nickname, extract_numbers, parse_concatenated_stats, parse_duration,
    parse_number, parse_rating, parse_result, split_merged_kills_deaths, stats_from_numbers,
    StatLine,
};
use crate::ocr::preprocess::{crop_region, grayscale_scaled, inverted, threshold_inverted};
use crate::ocr::{OcrOptions, TextRecognizer};

pub use medal::{detect_medal, Medal};
pub use nickname::NicknameMappings;
pub use record::{MatchInfo, PlayerRecord, PlayerStats};

pub struct Extractor {
    config: ExtractorConfig,
    recognizer: Box<dyn TextRecognizer>,
    catalog: Arc<ReferenceCatalog>,
    nicknames: NicknameMappings,
}

impl Extractor {
    pub fn new(
        config: ExtractorConfig,
        recognizer: Box<dyn TextRecognizer>,
        catalog: Arc<ReferenceCatalog>,
        nicknames: NicknameMappings,
    ) -> Self {
        Self {
            config,
            recognizer,
            catalog,
            nicknames,
        }
    }

    fn debug_session(&self, image_path: &Path) -> DebugSession {
        DebugSession::new(self.config.debug_mode, &self.config.debug_dir, image_path)
    }

    /// Runs OCR, logging and swallowing engine failures as empty text.
    fn ocr_text(&self, img: &GrayImage, options: OcrOptions, what: &str) -> String {
        match self.recognizer.recognize_text(img, options) {
            Ok(text) => {
                log::trace!("OCR {}: '{}'", what, text);
                text.trim().to_string()
            }
            Err(e) => {
                log::warn!("OCR failed for {}: {:#}", what, e);
                String::new()
            }
        }
    }

    fn crop(&self, img: &RgbImage, region: &Region, name: &str, debug: &DebugSession) -> RgbImage {
        let cropped = crop_region(img, region);
        debug.save(&cropped, name, "raw");
        cropped
    }

    pub fn extract_match_info(
        &self,
        img: &RgbImage,
        profile: &ResolutionProfile,
        debug: &DebugSession,
    ) -> MatchInfo {
        let region = self.crop(img, &profile.result_region, "result", debug);
        let processed = threshold_inverted(&region, 4);
        debug.save(&processed, "result", "processed");
        let result = parse_result(&self.ocr_text(
            &processed,
            OcrOptions::line(Some(UPPERCASE)),
            "result",
        ));

        let region = self.crop(img, &profile.my_team_score_region, "my_team_score", debug);
        let processed = grayscale_scaled(&region, 3);
        debug.save(&processed, "my_team_score", "processed");
        let my_team_score = parse_number(
            &self.ocr_text(&processed, OcrOptions::line(Some(DIGITS)), "my_team_score"),
            0,
        );

        let region = self.crop(img, &profile.adversary_score_region, "adversary_score", debug);
        let processed = grayscale_scaled(&region, 3);
        debug.save(&processed, "adversary_score", "processed");
        let adversary_team_score = parse_number(
            &self.ocr_text(&processed, OcrOptions::line(Some(DIGITS)), "adversary_score"),
            0,
        );

        let region = self.crop(img, &profile.duration_region, "duration", debug);
        let processed = grayscale_scaled(&region, 2);
        debug.save(&processed, "duration", "processed");
        let duration = parse_duration(&self.ocr_text(
            &processed,
            OcrOptions::line(Some(DURATION_CHARS)),
            "duration",
        ));

        MatchInfo {
            result,
            my_team_score,
            adversary_team_score,
            duration,
        }
    }

    /// Nickname with clan tag joined on one line, after mapping corrections.
    pub fn extract_nickname(
        &self,
        img: &RgbImage,
        regions: &PlayerRegions,
        debug: &DebugSession,
    ) -> String {
        let region = self.crop(img, &regions.nickname, "nickname", debug);
        let processed = grayscale_scaled(&region, 2);
        debug.save(&processed, "nickname", "processed");
        // block mode keeps the clan tag line
        let text = self.ocr_text(&processed, OcrOptions::block(None), "nickname");
        self.nicknames.apply(&clean_nickname(&text))
    }

    /// Kills, deaths, assists and gold. Tries progressively more forgiving
    /// readings of the stats line; all zeros when none works.
    pub fn extract_stats(
        &self,
        img: &RgbImage,
        regions: &PlayerRegions,
        debug: &DebugSession,
    ) -> StatLine {
        let region = self.crop(img, &regions.stats, "stats", debug);
        let digits_block = OcrOptions::block(Some(DIGITS_AND_SPACE));

        let gray = grayscale_scaled(&region, 3);
        debug.save(&gray, "stats", "processed_gray");
        let gray_text = self.ocr_text(&gray, digits_block, "stats");
        if let Some(stats) = stats_from_numbers(&extract_numbers(&gray_text)) {
            return stats;
        }

        let inv = inverted(&region, 3);
        debug.save(&inv, "stats", "processed_inverted");
        let inverted_text = self.ocr_text(&inv, digits_block, "stats (inverted)");
        if let Some(stats) = stats_from_numbers(&extract_numbers(&inverted_text)) {
            return stats;
        }

        let word_numbers: Vec<u32> = match self.recognizer.recognize_lines(&gray, OcrOptions::AUTO)
        {
            Ok(lines) => lines
                .iter()
                .inspect(|line| {
                    log::trace!("OCR stats line: '{}' ({:.0}%)", line.text, line.confidence)
                })
                .flat_map(|line| line.words.iter())
                .filter_map(|word| {
                    let digits: String = word.text.chars().filter(|c| c.is_ascii_digit()).collect();
                    digits.parse().ok()
                })
                .collect(),
            Err(e) => {
                log::warn!("OCR failed for stats words: {:#}", e);
                Vec::new()
            }
        };
        if let Some(stats) = stats_from_numbers(&word_numbers) {
            return stats;
        }

        let best_text = if gray_text.is_empty() {
            &inverted_text
        } else {
            &gray_text
        };
        let all_digits: String = best_text.chars().filter(|c| c.is_ascii_digit()).collect();
        if all_digits.len() >= 7 {
            return parse_concatenated_stats(&all_digits);
        }

        split_merged_kills_deaths(&word_numbers).unwrap_or_else(|| {
            log::debug!("No stats recognized (text: '{}')", best_text);
            StatLine::default()
        })
    }

    /// Performance rating; 0.0 when unreadable.
    pub fn extract_rating(
        &self,
        img: &RgbImage,
        regions: &PlayerRegions,
        debug: &DebugSession,
    ) -> f64 {
        let region = self.crop(img, &regions.ratio, "ratio", debug);
        let options = OcrOptions::word(Some(RATING_CHARS));

        // white text with dark shadow on blue reads best binarised
        let processed = threshold_inverted(&region, 4);
        debug.save(&processed, "ratio", "threshold");
        let rating = parse_rating(&self.ocr_text(&processed, options, "ratio"), 0.0);
        if rating > 0.0 {
            return rating;
        }

        let processed = grayscale_scaled(&region, 6);
        debug.save(&processed, "ratio", "grayscale");
        let rating = parse_rating(&self.ocr_text(&processed, options, "ratio (grayscale)"), 0.0);
        if rating == 0.0 {
            log::debug!("Rating not detected");
        }
        rating
    }

    pub fn extract_medal(
        &self,
        img: &RgbImage,
        regions: &PlayerRegions,
        debug: &DebugSession,
    ) -> Medal {
        detect_medal(&self.crop(img, &regions.medal, "medal", debug))
    }

    /// Classifies the hero portrait; `NO_MATCH` when the profile has no hero region.
    pub fn extract_hero(
        &self,
        img: &RgbImage,
        regions: &PlayerRegions,
        debug: &DebugSession,
    ) -> HeroMatchResult {
        let Some(hero_region) = &regions.hero else {
            return HeroMatchResult::no_match(0.0);
        };
        let region = self.crop(img, hero_region, "hero", debug);
        classify(&region, &self.catalog, &self.config.hero_matcher)
    }

    /// All fields of the player in row `index` (0-based).
    pub fn extract_player(
        &self,
        img: &RgbImage,
        profile: &ResolutionProfile,
        index: usize,
        debug: &DebugSession,
    ) -> Result<PlayerStats> {
        let regions = profile.players.get(index).ok_or_else(|| {
            anyhow!(
                "Profile '{}' has no player {} (has {})",
                profile.name,
                index + 1,
                profile.players.len()
            )
        })?;

        let nickname = self.extract_nickname(img, regions, debug);
        let stats = self.extract_stats(img, regions, debug);
        let ratio = self.extract_rating(img, regions, debug);
        let medal = self.extract_medal(img, regions, debug);
        let hero = self.extract_hero(img, regions, debug);

        log::debug!(
            "Player {}: {} {}/{}/{} gold={} medal={} ratio={} hero={} ({:.2})",
            index + 1,
            nickname,
            stats.kills,
            stats.deaths,
            stats.assists,
            stats.gold,
            medal,
            ratio,
            hero.label,
            hero.confidence
        );

        Ok(PlayerStats {
            position: (index + 1) as u8,
            nickname,
            hero,
            stats,
            medal,
            ratio,
        })
    }

    /// Row index of the player whose nickname matches `target`.
    pub fn find_player(
        &self,
        img: &RgbImage,
        profile: &ResolutionProfile,
        target: &str,
        debug: &DebugSession,
    ) -> Option<usize> {
        profile.players.iter().position(|regions| {
            let nickname = self.extract_nickname(img, regions, debug);
            self.nicknames.matches(target, &nickname)
        })
    }

    fn load_screenshot(&self, path: &Path) -> Result<(RgbImage, &ResolutionProfile)> {
        let img = image::open(path)
            .with_context(|| format!("Failed to open screenshot {}", path.display()))?
            .to_rgb8();
        let profile = self.config.profile_for_image(img.width(), img.height());
        log::debug!(
            "Using profile '{}' for {} ({}x{})",
            profile.name,
            path.display(),
            img.width(),
            img.height()
        );
        Ok((img, profile))
    }

    /// One record per player row of the screenshot.
    pub fn extract_all_players(&self, path: &Path) -> Result<Vec<PlayerRecord>> {
        let debug = self.debug_session(path);
        let (img, profile) = self.load_screenshot(path)?;
        let source = path.display().to_string();

        let info = self.extract_match_info(&img, profile, &debug);
        (0..profile.players.len())
            .map(|index| {
                let player = self.extract_player(&img, profile, index, &debug)?;
                Ok(PlayerRecord::new(source.clone(), &info, &player))
            })
            .collect()
    }

    /// The record of the player named `nickname`, or `None` if nobody matches.
    pub fn extract_player_by_nickname(
        &self,
        path: &Path,
        nickname: &str,
    ) -> Result<Option<PlayerRecord>> {
        let debug = self.debug_session(path);
        let (img, profile) = self.load_screenshot(path)?;

        let Some(index) = self.find_player(&img, profile, nickname, &debug) else {
            log::info!("Player '{}' not found in {}", nickname, path.display());
            return Ok(None);
        };

        let info = self.extract_match_info(&img, profile, &debug);
        let player = self.extract_player(&img, profile, index, &debug)?;
        Ok(Some(PlayerRecord::new(
            path.display().to_string(),
            &info,
            &player,
        )))
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use anyhow::{anyhow, Result};
    use image::GrayImage;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use crate::ocr::engine::{OcrLine, OcrWord};
    use crate::ocr::{OcrOptions, TextRecognizer};

    /// Replays canned OCR answers in call order; empty once exhausted.
    #[derive(Default)]
    pub struct ScriptedRecognizer {
        texts: Mutex<VecDeque<String>>,
        lines: Mutex<VecDeque<Vec<OcrLine>>>,
        pub calls: Mutex<Vec<OcrOptions>>,
        fail: bool,
    }

    impl ScriptedRecognizer {
        pub fn with_texts(texts: &[&str]) -> Self {
            Self {
                texts: Mutex::new(texts.iter().map(|t| t.to_string()).collect()),
                ..Self::default()
            }
        }

        pub fn failing() -> Self {
            Self {
                fail: true,
                ..Self::default()
            }
        }

        pub fn push_words(&self, words: &[&str]) {
            let line = OcrLine {
                text: words.join(" "),
                words: words
                    .iter()
                    .map(|w| OcrWord {
                        text: w.to_string(),
                        confidence: 90.0,
                    })
                    .collect(),
                confidence: 90.0,
            };
            self.lines.lock().unwrap().push_back(vec![line]);
        }
    }

    impl TextRecognizer for ScriptedRecognizer {
        fn recognize_text(&self, _img: &GrayImage, options: OcrOptions) -> Result<String> {
            self.calls.lock().unwrap().push(options);
            if self.fail {
                return Err(anyhow!("engine unavailable"));
            }
            Ok(self.texts.lock().unwrap().pop_front().unwrap_or_default())
        }

        fn recognize_lines(&self, _img: &GrayImage, options: OcrOptions) -> Result<Vec<OcrLine>> {
            self.calls.lock().unwrap().push(options);
            if self.fail {
                return Err(anyhow!("engine unavailable"));
            }
            Ok(self.lines.lock().unwrap().pop_front().unwrap_or_default())
        }
    }
}
