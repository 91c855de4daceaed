//! Extractor configuration.
//!
//! Resolution profiles, file locations and matcher tunables, loaded from a
//! JSON file. A missing optional file falls back to built-in defaults.

pub mod matcher;
pub mod profile;
pub mod region;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub use matcher::HeroMatcherConfig;
pub use profile::{default_profile, PlayerRegions, ResolutionProfile, DEFAULT_PROFILE_NAME};
pub use region::Region;

pub const CONFIG_FILE_NAME: &str = "config.json";

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractorConfig {
    /// Explicit Tesseract executable; searched for when unset
    pub tesseract_cmd: Option<PathBuf>,
    pub output_dir: PathBuf,
    /// Save every crop and preprocessed image to `debug_dir`
    pub debug_mode: bool,
    pub debug_dir: PathBuf,
    pub active_profile: String,
    /// Pick the profile by screenshot aspect ratio; otherwise always use the active one
    pub auto_select_profile: bool,
    pub profiles: Vec<ResolutionProfile>,
    /// `{"mappings": {hero: image_path}}`
    pub heroes_map: PathBuf,
    /// Root for relative hero image paths; defaults to the map's directory
    pub hero_images_dir: Option<PathBuf>,
    /// `{"mappings": {ocr_nickname: real_nickname}}`
    pub nickname_mappings: PathBuf,
    pub hero_matcher: HeroMatcherConfig,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            tesseract_cmd: None,
            output_dir: PathBuf::from("output"),
            debug_mode: false,
            debug_dir: PathBuf::from("debug"),
            active_profile: DEFAULT_PROFILE_NAME.to_string(),
            auto_select_profile: true,
            profiles: vec![default_profile()],
            heroes_map: PathBuf::from("heroes_map.json"),
            hero_images_dir: None,
            nickname_mappings: PathBuf::from("nickname_mappings.json"),
            hero_matcher: HeroMatcherConfig::default(),
        }
    }
}

impl ExtractorConfig {
    /// Loads a configuration file. The file must exist.
    ///
    /// Profiles in the file are merged over the built-in default profile.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let mut config: ExtractorConfig = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        config.normalize();
        Ok(config)
    }

    /// Loads `explicit` if given, otherwise the first `config.json` found in
    /// the working directory or next to the executable, otherwise defaults.
    pub fn load_or_default(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            log::info!("Loading config from {}", path.display());
            return Self::load(path);
        }

        let candidates = [
            PathBuf::from(CONFIG_FILE_NAME),
            crate::paths::get_exe_dir().join(CONFIG_FILE_NAME),
        ];
        for candidate in candidates.iter().filter(|p| p.exists()) {
            match Self::load(candidate) {
                Ok(config) => {
                    log::info!("Config loaded from {}", candidate.display());
                    return Ok(config);
                }
                Err(e) => {
                    log::warn!("{:#}. Using defaults.", e);
                    return Ok(Self::default());
                }
            }
        }

        log::debug!("No config.json found, using default config");
        Ok(Self::default())
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let json = serde_json::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(())
    }

    /// Loads `path` before changing and saving it. An existing file must
    /// parse, so a broken one is reported instead of overwritten; a missing
    /// file starts from `fallback`.
    pub fn load_for_update(path: &Path, fallback: Self) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(fallback)
        }
    }

    /// Puts the default profile first and collapses duplicate names, last one wins.
    fn normalize(&mut self) {
        let mut merged = vec![default_profile()];
        for profile in std::mem::take(&mut self.profiles) {
            upsert(&mut merged, profile);
        }
        self.profiles = merged;

        if self.profile(&self.active_profile).is_none() {
            log::warn!(
                "Active profile '{}' not found, using '{}'",
                self.active_profile,
                DEFAULT_PROFILE_NAME
            );
            self.active_profile = DEFAULT_PROFILE_NAME.to_string();
        }
    }

    pub fn profile(&self, name: &str) -> Option<&ResolutionProfile> {
        self.profiles.iter().find(|p| p.name == name)
    }

    pub fn active_profile(&self) -> &ResolutionProfile {
        self.profile(&self.active_profile)
            .or_else(|| self.profiles.first())
            .unwrap_or_else(|| default_profile_ref())
    }

    pub fn set_active_profile(&mut self, name: &str) -> Result<()> {
        if self.profile(name).is_none() {
            bail!(
                "Profile '{}' not found. Available: {}",
                name,
                self.profile_names().join(", ")
            );
        }
        self.active_profile = name.to_string();
        Ok(())
    }

    /// Adds a profile, replacing one with the same name in place.
    pub fn add_profile(&mut self, profile: ResolutionProfile) {
        upsert(&mut self.profiles, profile);
    }

    pub fn remove_profile(&mut self, name: &str) -> Result<()> {
        if name == DEFAULT_PROFILE_NAME {
            bail!("Cannot remove the default profile");
        }
        if name == self.active_profile {
            bail!("Cannot remove the active profile");
        }
        let before = self.profiles.len();
        self.profiles.retain(|p| p.name != name);
        if self.profiles.len() == before {
            bail!("Profile '{}' not found", name);
        }
        Ok(())
    }

    pub fn profile_names(&self) -> Vec<&str> {
        self.profiles.iter().map(|p| p.name.as_str()).collect()
    }

    /// Picks the profile whose reference aspect ratio is closest to the image's.
    /// Earlier profiles win ties.
    pub fn select_profile(&self, image_width: u32, image_height: u32) -> &ResolutionProfile {
        let image_ratio = image_width as f64 / image_height.max(1) as f64;
        let mut best = self.active_profile();
        let mut best_diff = f64::INFINITY;
        for profile in &self.profiles {
            let diff = (image_ratio - profile.aspect_ratio()).abs();
            if diff < best_diff {
                best_diff = diff;
                best = profile;
            }
        }
        best
    }

    /// Profile for a screenshot of this size: aspect-ratio selection when
    /// `auto_select_profile` is on, the active profile otherwise.
    pub fn profile_for_image(&self, image_width: u32, image_height: u32) -> &ResolutionProfile {
        if self.auto_select_profile {
            self.select_profile(image_width, image_height)
        } else {
            self.active_profile()
        }
    }

    /// Root directory for relative hero image paths.
    pub fn hero_image_root(&self) -> PathBuf {
        match &self.hero_images_dir {
            Some(dir) => dir.clone(),
            None => self
                .heroes_map
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_default(),
        }
    }
}

fn upsert(profiles: &mut Vec<ResolutionProfile>, profile: ResolutionProfile) {
    match profiles.iter_mut().find(|p| p.name == profile.name) {
        Some(existing) => *existing = profile,
        None => profiles.push(profile),
    }
}

fn default_profile_ref() -> &'static ResolutionProfile {
    static DEFAULT: std::sync::OnceLock<ResolutionProfile> = std::sync::OnceLock::new();
    DEFAULT.get_or_init(default_profile)
}
