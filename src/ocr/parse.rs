//! Parsers that turn raw OCR text from scoreboard regions into values.
//!
//! OCR on the scoreboard routinely drops separators, so several parsers try
//! to recover structure from plain digit runs.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::sync::OnceLock;

pub const MIN_RATING: f64 = 3.0;
pub const MAX_RATING: f64 = 20.0;
pub const DEFAULT_DURATION: &str = "00:00";

const MAX_KILLS: u32 = 50;
const MAX_DEATHS: u32 = 30;
const MAX_ASSISTS: u32 = 50;

/// Nickname similarity (character-set Jaccard) needed to count as the same player.
pub const NAME_SIMILARITY_THRESHOLD: f64 = 0.6;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MatchResult {
    Victory,
    Defeat,
    #[default]
    Unknown,
}

impl fmt::Display for MatchResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MatchResult::Victory => "VICTORY",
            MatchResult::Defeat => "DEFEAT",
            MatchResult::Unknown => "UNKNOWN",
        };
        f.write_str(s)
    }
}

/// Kills, deaths, assists and gold of one player.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StatLine {
    pub kills: u32,
    pub deaths: u32,
    pub assists: u32,
    pub gold: u32,
}

impl StatLine {
    pub fn new(kills: u32, deaths: u32, assists: u32, gold: u32) -> Self {
        Self {
            kills,
            deaths,
            assists,
            gold,
        }
    }

    fn from_slice(numbers: &[u32]) -> Option<Self> {
        match numbers {
            [k, d, a, g, ..] => Some(Self::new(*k, *d, *a, *g)),
            _ => None,
        }
    }
}

fn number_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\d+").expect("valid regex"))
}

fn duration_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(\d{1,2}):(\d{2})").expect("valid regex"))
}

fn is_nickname_symbol(c: char) -> bool {
    "@#$%^&*()_+=[]{}|\\<>/?`~".contains(c)
}

pub fn parse_result(text: &str) -> MatchResult {
    let upper = text.to_uppercase();
    // "VICTOR" also covers "VICTORY"
    if upper.contains("VICTOR") || upper.contains("WIN") {
        MatchResult::Victory
    } else if upper.contains("DEFEAT") || upper.contains("LOSE") || upper.contains("LOSS") {
        MatchResult::Defeat
    } else {
        MatchResult::Unknown
    }
}

/// All digit runs in `text`, in order. Runs too long for `u32` are skipped.
pub fn extract_numbers(text: &str) -> Vec<u32> {
    number_regex()
        .find_iter(text)
        .filter_map(|m| m.as_str().parse().ok())
        .collect()
}

/// First digit run in `text`, or `default`.
pub fn parse_number(text: &str, default: u32) -> u32 {
    extract_numbers(text).first().copied().unwrap_or(default)
}

/// `mm:ss`; falls back to the first two numbers, then to `00:00`.
pub fn parse_duration(text: &str) -> String {
    if let Some(caps) = duration_regex().captures(text) {
        return format!("{}:{}", &caps[1], &caps[2]);
    }

    let numbers: Vec<&str> = number_regex().find_iter(text).map(|m| m.as_str()).collect();
    if numbers.len() >= 2 {
        return format!("{}:{:0>2}", numbers[0], numbers[1]);
    }

    DEFAULT_DURATION.to_string()
}

fn rating_in_range(value: f64) -> Option<f64> {
    (MIN_RATING..=MAX_RATING).contains(&value).then_some(value)
}

/// `<int>.<dec>` with `dec` a single digit.
fn rating_from(int_part: &str, decimal: &str) -> Option<f64> {
    format!("{}.{}", int_part, decimal).parse().ok()
}

/// Parses a performance rating, always in [3.0, 20.0] with one decimal.
///
/// When the decimal point was lost the last digit is taken as the decimal:
/// `78` is 7.8, `115` is 11.5. Longer digit runs try the middle, trailing and
/// leading digits in that order. Anything out of range yields `default`.
pub fn parse_rating(text: &str, default: f64) -> f64 {
    let digits: String = text.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        return default;
    }

    if text.contains('.') {
        let clean: String = text
            .chars()
            .filter(|c| c.is_ascii_digit() || *c == '.')
            .collect();
        let parts: Vec<&str> = clean.split('.').collect();
        if let [int_part, decimal] = parts.as_slice() {
            let first_decimal = decimal.get(..1).unwrap_or("0");
            if let Some(value) = rating_from(int_part, first_decimal).and_then(rating_in_range) {
                return value;
            }
        }
    }

    let d = digits.as_str();
    let value = match d.len() {
        1 => rating_from(d, "0"),
        2 => rating_from(&d[..1], &d[1..2]),
        3 => rating_from(&d[..2], &d[2..3])
            .and_then(rating_in_range)
            .or_else(|| rating_from(&d[..1], &d[1..2])),
        n => {
            let attempts = [
                (&d[1..2], &d[2..3]),
                (&d[n - 2..n - 1], &d[n - 1..]),
                (&d[n - 3..n - 1], &d[n - 1..]),
                (&d[..1], &d[1..2]),
                (&d[..2], &d[2..3]),
            ];
            attempts
                .iter()
                .find_map(|(int_part, decimal)| {
                    rating_from(int_part, decimal).and_then(rating_in_range)
                })
        }
    };

    value.and_then(rating_in_range).unwrap_or(default)
}

/// Splits a separator-less K/D/A digit string, scoring every plausible split.
///
/// Splits favour deaths below kills + assists, balanced kills and assists,
/// even digit widths and mid-range deaths. Returns `(kills, deaths, assists)`.
pub fn parse_kda_combinations(kda: &str) -> Option<(u32, u32, u32)> {
    let length = kda.len();
    if length < 3 || !kda.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }

    let mut best: Option<(i32, u32, u32, u32)> = None;
    for k_len in 1..3usize.min(length - 1) {
        for d_len in 1..3usize.min(length - k_len) {
            let a_len = length - k_len - d_len;
            if !(1..=3).contains(&a_len) {
                continue;
            }

            let (Ok(k), Ok(d), Ok(a)) = (
                kda[..k_len].parse::<u32>(),
                kda[k_len..k_len + d_len].parse::<u32>(),
                kda[k_len + d_len..].parse::<u32>(),
            ) else {
                continue;
            };
            if k > MAX_KILLS || d > MAX_DEATHS || a > MAX_ASSISTS {
                continue;
            }

            let mut score: i32 = 0;
            if d < k + a {
                score += 10;
            }
            if k > 0 && a > 0 {
                let ratio = k.max(a) as f64 / k.min(a) as f64;
                if ratio < 10.0 {
                    score += 5;
                }
                if ratio < 5.0 {
                    score += 3;
                }
            }
            let digit_variance = (k_len.abs_diff(d_len) + d_len.abs_diff(a_len)) as i32;
            score += (5 - digit_variance * 2).max(0);
            if length == 6 && k_len == 2 && d_len == 2 && a_len == 2 {
                score += 5;
            }
            if length == 5 && k_len == 2 && d_len == 2 && a_len == 1 {
                score += 5;
            }
            if d_len == 1 && d <= 1 && (k >= 10 || a >= 10) {
                score -= 5;
            }
            if (5..=15).contains(&d) {
                score += 3;
            }

            // highest score first, then larger kills, deaths, assists
            let candidate = (score, k, d, a);
            if best.is_none_or(|b| candidate > b) {
                best = Some(candidate);
            }
        }
    }

    best.map(|(_, k, d, a)| (k, d, a))
}

/// Splits a digit run that holds K, D, A and a 4-5 digit gold value.
///
/// Gold must fall in 3000..=40000; values in 8000..=30000 are preferred, then
/// five-digit gold over four-digit gold.
pub fn parse_concatenated_stats(digits: &str) -> StatLine {
    if digits.len() < 7 || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return StatLine::default();
    }

    let mut best = StatLine::default();
    let mut best_score = -1;
    for gold_len in [5, 4] {
        if digits.len() < gold_len + 3 {
            continue;
        }
        let (kda_str, gold_str) = digits.split_at(digits.len() - gold_len);
        let Ok(gold) = gold_str.parse::<u32>() else {
            continue;
        };
        if !(3000..=40000).contains(&gold) {
            continue;
        }

        if let Some((k, d, a)) = parse_kda_combinations(kda_str) {
            let score = if (8000..=30000).contains(&gold) { 10 } else { 5 };
            if score > best_score {
                best_score = score;
                best = StatLine::new(k, d, a, gold);
            }
        }
    }
    best
}

/// First four numbers of a stats line, if there are at least four.
pub fn stats_from_numbers(numbers: &[u32]) -> Option<StatLine> {
    StatLine::from_slice(numbers)
}

/// Recovers a stats line from three words where kills and deaths were merged,
/// e.g. `2410 6 28311` reads as 24/10/6 with 28311 gold.
pub fn split_merged_kills_deaths(words: &[u32]) -> Option<StatLine> {
    let [first, assists, gold] = words else {
        return None;
    };
    let first = first.to_string();
    for split_at in [1, 2] {
        if split_at >= first.len() {
            continue;
        }
        let (Ok(k), Ok(d)) = (first[..split_at].parse::<u32>(), first[split_at..].parse::<u32>())
        else {
            continue;
        };
        if k <= MAX_KILLS && d <= MAX_DEATHS && *assists <= MAX_ASSISTS && *gold >= 1000 {
            return Some(StatLine::new(k, d, *assists, *gold));
        }
    }
    None
}

/// Strips decoration symbols at both ends and joins lines with single spaces.
pub fn clean_nickname(text: &str) -> String {
    let trimmed = text
        .trim()
        .trim_start_matches(is_nickname_symbol)
        .trim_end_matches(is_nickname_symbol);
    trimmed.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Jaccard similarity of the two names' character sets, compared to `threshold`.
pub fn similar_names(a: &str, b: &str, threshold: f64) -> bool {
    if a.is_empty() || b.is_empty() {
        return false;
    }
    let set_a: HashSet<char> = a.chars().collect();
    let set_b: HashSet<char> = b.chars().collect();
    let union = set_a.union(&set_b).count();
    if union == 0 {
        return false;
    }
    let intersection = set_a.intersection(&set_b).count();
    intersection as f64 / union as f64 >= threshold
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_result() {
        assert_eq!(parse_result("VICTORY"), MatchResult::Victory);
        assert_eq!(parse_result("  victor "), MatchResult::Victory);
        assert_eq!(parse_result("IWIN"), MatchResult::Victory);
        assert_eq!(parse_result("DEFEAT"), MatchResult::Defeat);
        assert_eq!(parse_result("YOU LOSE"), MatchResult::Defeat);
        assert_eq!(parse_result("XYZ"), MatchResult::Unknown);
        assert_eq!(parse_result(""), MatchResult::Unknown);
        assert_eq!(MatchResult::Victory.to_string(), "VICTORY");
    }

    #[test]
    fn test_parse_number() {
        assert_eq!(parse_number("Score: 23 - 11", 0), 23);
        assert_eq!(parse_number("abc", 7), 7);
        assert_eq!(parse_number("", 0), 0);
    }

    #[test]
    fn test_extract_numbers_skips_overflow() {
        assert_eq!(extract_numbers("12 99999999999 3"), vec![12, 3]);
    }

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration("12:34"), "12:34");
        assert_eq!(parse_duration("Duration 9:05"), "9:05");
        assert_eq!(parse_duration("12 5"), "12:05");
        assert_eq!(parse_duration("1234"), DEFAULT_DURATION);
        assert_eq!(parse_duration(""), DEFAULT_DURATION);
    }

    #[test]
    fn test_parse_rating_with_point() {
        assert_eq!(parse_rating("7.8", 0.0), 7.8);
        assert_eq!(parse_rating("7.87", 0.0), 7.8);
        assert_eq!(parse_rating("11.", 0.0), 11.0);
        assert_eq!(parse_rating("12.5x", 0.0), 12.5);
    }

    #[test]
    fn test_parse_rating_without_point() {
        assert_eq!(parse_rating("78", 0.0), 7.8);
        assert_eq!(parse_rating("115", 0.0), 11.5);
        assert_eq!(parse_rating("61", 0.0), 6.1);
        assert_eq!(parse_rating("9", 0.0), 9.0);
        // 75.7 is out of range, so 7.5
        assert_eq!(parse_rating("757", 0.0), 7.5);
    }

    #[test]
    fn test_parse_rating_long_digit_runs() {
        // middle two digits first
        assert_eq!(parse_rating("5617", 0.0), 6.1);
        // middle and last two fail, last three give 12.0
        assert_eq!(parse_rating("1120", 0.0), 12.0);
        assert_eq!(parse_rating("4191", 0.0), 9.1);
    }

    #[test]
    fn test_parse_rating_out_of_range() {
        assert_eq!(parse_rating("1", 0.0), 0.0);
        assert_eq!(parse_rating("21", -1.0), -1.0);
        assert_eq!(parse_rating("", 0.0), 0.0);
        assert_eq!(parse_rating("...", 0.0), 0.0);
        assert_eq!(parse_rating("0000", 0.0), 0.0);
    }

    #[test]
    fn test_parse_kda_combinations() {
        assert_eq!(parse_kda_combinations("1025"), Some((10, 2, 5)));
        assert_eq!(parse_kda_combinations("123"), Some((1, 2, 3)));
        assert_eq!(parse_kda_combinations("100815"), Some((10, 8, 15)));
        assert_eq!(parse_kda_combinations("12"), None);
        assert_eq!(parse_kda_combinations("99999"), None);
    }

    #[test]
    fn test_parse_concatenated_stats() {
        assert_eq!(
            parse_concatenated_stats("10081516500"),
            StatLine::new(10, 8, 15, 16500)
        );
        assert_eq!(parse_concatenated_stats("123"), StatLine::default());
        assert_eq!(parse_concatenated_stats("1234999999"), StatLine::default());
    }

    #[test]
    fn test_stats_from_numbers() {
        assert_eq!(
            stats_from_numbers(&[3, 1, 7, 9800, 5]),
            Some(StatLine::new(3, 1, 7, 9800))
        );
        assert_eq!(stats_from_numbers(&[3, 1, 7]), None);
    }

    #[test]
    fn test_split_merged_kills_deaths() {
        assert_eq!(
            split_merged_kills_deaths(&[2410, 6, 28311]),
            Some(StatLine::new(24, 10, 6, 28311))
        );
        assert_eq!(
            split_merged_kills_deaths(&[52, 6, 9000]),
            Some(StatLine::new(5, 2, 6, 9000))
        );
        assert_eq!(split_merged_kills_deaths(&[7, 6, 9000]), None);
        assert_eq!(split_merged_kills_deaths(&[52, 6, 500]), None);
        assert_eq!(split_merged_kills_deaths(&[52, 6]), None);
    }

    #[test]
    fn test_clean_nickname() {
        assert_eq!(clean_nickname("  @@Player_One##  "), "Player_One");
        assert_eq!(clean_nickname("[CLAN]\nNick   Name"), "CLAN] Nick Name");
        assert_eq!(clean_nickname("~~~"), "");
    }

    #[test]
    fn test_similar_names() {
        assert!(similar_names("shadow", "shadovv", NAME_SIMILARITY_THRESHOLD));
        assert!(!similar_names("shadow", "xyz", NAME_SIMILARITY_THRESHOLD));
        assert!(!similar_names("", "xyz", NAME_SIMILARITY_THRESHOLD));
    }
}
