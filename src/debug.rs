//! Debug image dumps.
//!
//! With debug mode on, every crop and preprocessed image is written to the
//! debug directory as `<timestamp>_<counter>_<image>_<name>_<desc>.png`.

use chrono::Local;
use image::{ImageBuffer, Pixel, PixelWithColorType};
use std::ops::Deref;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};

/// Dump context for one screenshot. The counter restarts for every screenshot.
pub struct DebugSession {
    dir: Option<PathBuf>,
    image_name: String,
    counter: AtomicU32,
}

impl DebugSession {
    /// Starts a session for `image_path`, writing into `dir` when `enabled`.
    pub fn new(enabled: bool, dir: &Path, image_path: &Path) -> Self {
        let image_name = image_path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "image".to_string());
        Self {
            dir: enabled.then(|| dir.to_path_buf()),
            image_name,
            counter: AtomicU32::new(0),
        }
    }

    fn file_name(&self, counter: u32, name: &str, description: &str) -> String {
        let timestamp = Local::now().format("%Y%m%d_%H%M%S");
        let mut parts = vec![
            timestamp.to_string(),
            format!("{:03}", counter),
            self.image_name.clone(),
            name.to_string(),
        ];
        if !description.is_empty() {
            parts.push(description.to_string());
        }
        format!("{}.png", parts.join("_"))
    }

    /// Saves `img`. Failures are logged, never returned.
    pub fn save<P, C>(&self, img: &ImageBuffer<P, C>, name: &str, description: &str)
    where
        P: Pixel + PixelWithColorType,
        [P::Subpixel]: image::EncodableLayout,
        C: Deref<Target = [P::Subpixel]>,
    {
        let Some(dir) = &self.dir else {
            return;
        };
        if img.width() == 0 || img.height() == 0 {
            log::debug!("Skipping empty debug image {}", name);
            return;
        }
        if let Err(e) = std::fs::create_dir_all(dir) {
            log::warn!("Failed to create debug dir {}: {}", dir.display(), e);
            return;
        }

        let counter = self.counter.fetch_add(1, Ordering::Relaxed) + 1;
        let path = dir.join(self.file_name(counter, name, description));
        if let Err(e) = img.save(&path) {
            log::warn!("Failed to save debug image {}: {}", path.display(), e);
        }
    }
}

#[cfg(test)]
impl DebugSession {
    /// A session that writes nothing.
    pub fn disabled() -> Self {
        Self {
            dir: None,
            image_name: String::new(),
            counter: AtomicU32::new(0),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.dir.is_some()
    }
}
