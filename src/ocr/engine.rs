use anyhow::{anyhow, Context, Result};
use image::GrayImage;
use std::path::PathBuf;
use std::process::Command;
use tempfile::NamedTempFile;

use super::setup::{find_tessdata_dir, find_tesseract_executable};

pub const DIGITS: &str = "0123456789";
pub const DIGITS_AND_SPACE: &str = "0123456789 ";
pub const UPPERCASE: &str = "ABCDEFGHIJKLMNOPQRSTUVWXYZ";
pub const DURATION_CHARS: &str = "0123456789:";
pub const RATING_CHARS: &str = "0123456789.";

/// Represents a line of OCR text with confidence score
#[derive(Debug, Clone)]
pub struct OcrLine {
    pub text: String,
    pub words: Vec<OcrWord>,
    pub confidence: f32,
}

/// Represents a single word from OCR with confidence score
#[derive(Debug, Clone)]
pub struct OcrWord {
    pub text: String,
    pub confidence: f32,
}

/// Page segmentation mode and character whitelist for one recognition call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OcrOptions {
    pub psm: u8,
    pub whitelist: Option<&'static str>,
}

impl OcrOptions {
    /// Fully automatic page segmentation, no whitelist.
    pub const AUTO: OcrOptions = OcrOptions {
        psm: 3,
        whitelist: None,
    };

    pub const fn block(whitelist: Option<&'static str>) -> Self {
        Self { psm: 6, whitelist }
    }

    pub const fn line(whitelist: Option<&'static str>) -> Self {
        Self { psm: 7, whitelist }
    }

    pub const fn word(whitelist: Option<&'static str>) -> Self {
        Self { psm: 8, whitelist }
    }
}

/// Text recognition backend. Implementations must be usable from several
/// worker threads at once.
pub trait TextRecognizer: Send + Sync {
    /// Plain text of the whole image.
    fn recognize_text(&self, img: &GrayImage, options: OcrOptions) -> Result<String>;

    /// Lines with per-word confidences.
    fn recognize_lines(&self, img: &GrayImage, options: OcrOptions) -> Result<Vec<OcrLine>>;
}

/// Runs the `tesseract` command line program.
#[derive(Debug, Clone)]
pub struct Tesseract {
    executable: PathBuf,
    tessdata: Option<PathBuf>,
    language: String,
}

impl Tesseract {
    pub fn new(executable: PathBuf, tessdata: Option<PathBuf>) -> Self {
        Self {
            executable,
            tessdata,
            language: "eng".to_string(),
        }
    }

    /// Locates the executable (preferring `explicit`) and tessdata directory.
    ///
    /// A missing tessdata directory is not an error: Tesseract then falls
    /// back to its compiled-in location.
    pub fn locate(explicit: Option<&std::path::Path>) -> Result<Self> {
        let executable = find_tesseract_executable(explicit)?;
        let tessdata = find_tessdata_dir().ok();
        log::debug!(
            "Using tesseract {} (tessdata: {})",
            executable.display(),
            tessdata
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "default".to_string())
        );
        Ok(Self::new(executable, tessdata))
    }

    fn command(&self, input: &std::path::Path, output: &str, options: OcrOptions) -> Command {
        let mut cmd = Command::new(&self.executable);
        cmd.arg(input).arg(output);
        if let Some(tessdata) = &self.tessdata {
            cmd.arg("--tessdata-dir").arg(tessdata);
        }
        cmd.arg("-l")
            .arg(&self.language)
            .arg("--psm")
            .arg(options.psm.to_string());
        if let Some(whitelist) = options.whitelist {
            cmd.arg("-c")
                .arg(format!("tessedit_char_whitelist={}", whitelist));
        }
        cmd
    }
}

impl TextRecognizer for Tesseract {
    fn recognize_text(&self, img: &GrayImage, options: OcrOptions) -> Result<String> {
        let temp_input = NamedTempFile::with_suffix(".png")?;
        img.save(temp_input.path())
            .context("Failed to write OCR input image")?;

        let output = self
            .command(temp_input.path(), "stdout", options)
            .output()
            .with_context(|| format!("Failed to run {}", self.executable.display()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(anyhow!("Tesseract failed: {}", stderr));
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    fn recognize_lines(&self, img: &GrayImage, options: OcrOptions) -> Result<Vec<OcrLine>> {
        let temp_input = NamedTempFile::with_suffix(".png")?;
        img.save(temp_input.path())
            .context("Failed to write OCR input image")?;

        // Tesseract appends .tsv to the output base
        let temp_output = NamedTempFile::new()?;
        let output_base = temp_output.path().to_string_lossy().to_string();

        let mut cmd = self.command(temp_input.path(), &output_base, options);
        let output = cmd
            .arg("tsv")
            .output()
            .with_context(|| format!("Failed to run {}", self.executable.display()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(anyhow!("Tesseract failed: {}", stderr));
        }

        let tsv_path = format!("{}.tsv", output_base);
        let tsv_content = std::fs::read_to_string(&tsv_path)
            .map_err(|e| anyhow!("Failed to read Tesseract output: {}", e))?;
        let _ = std::fs::remove_file(&tsv_path);

        Ok(parse_tsv_output(&tsv_content))
    }
}

/// Parses Tesseract TSV output into lines of words.
///
/// Only word rows (level 5) with text and a non-negative confidence are kept.
/// Lines are keyed by block, paragraph and line number.
pub fn parse_tsv_output(tsv: &str) -> Vec<OcrLine> {
    let mut lines: Vec<OcrLine> = Vec::new();
    let mut current_key: Option<(i32, i32, i32)> = None;
    let mut current_words: Vec<OcrWord> = Vec::new();

    let flush = |words: &mut Vec<OcrWord>, lines: &mut Vec<OcrLine>| {
        if words.is_empty() {
            return;
        }
        let words = std::mem::take(words);
        let confidence = words.iter().map(|w| w.confidence).sum::<f32>() / words.len() as f32;
        let text = words
            .iter()
            .map(|w| w.text.as_str())
            .collect::<Vec<_>>()
            .join(" ");
        lines.push(OcrLine {
            text,
            words,
            confidence,
        });
    };

    for line in tsv.lines().skip(1) {
        // level, page_num, block_num, par_num, line_num, word_num,
        // left, top, width, height, conf, text
        let fields: Vec<&str> = line.split('\t').collect();
        if fields.len() < 12 {
            continue;
        }

        let level: i32 = fields[0].parse().unwrap_or(-1);
        let conf: f32 = fields[10].trim().parse().unwrap_or(-1.0);
        let text = fields[11].trim();
        if level != 5 || text.is_empty() || conf < 0.0 {
            continue;
        }

        let key = (
            fields[2].parse().unwrap_or(-1),
            fields[3].parse().unwrap_or(-1),
            fields[4].parse().unwrap_or(-1),
        );
        if current_key != Some(key) {
            flush(&mut current_words, &mut lines);
            current_key = Some(key);
        }

        current_words.push(OcrWord {
            text: text.to_string(),
            confidence: conf,
        });
    }
    flush(&mut current_words, &mut lines);

    lines
}
