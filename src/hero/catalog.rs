//! Reference hero portraits with precomputed features.
//!
//! Built once at startup and never mutated, so it can be shared across
//! worker threads by reference.

use image::RgbImage;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

use super::color::{hs_histogram, HsHistogram};
use super::features::{detect_and_compute, Features};
use crate::config::HeroMatcherConfig;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("hero mapping file not found: {}", .0.display())]
    MappingNotFound(PathBuf),

    #[error("failed to read hero mapping file {}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("malformed hero mapping file {}: {source}", .path.display())]
    Malformed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("hero '{hero}' in {} must map to an image path string", .path.display())]
    InvalidEntry { hero: String, path: PathBuf },

    #[error("failed to decode reference image for '{hero}' at {}: {source}", .path.display())]
    Decode {
        hero: String,
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
}

#[derive(serde::Deserialize)]
struct MappingFile {
    #[serde(default)]
    mappings: serde_json::Map<String, serde_json::Value>,
}

/// One reference portrait.
#[derive(Clone, Debug)]
pub struct ReferenceEntry {
    pub name: String,
    pub image: RgbImage,
    pub features: Features,
    pub histogram: HsHistogram,
}

impl ReferenceEntry {
    pub fn new(name: impl Into<String>, image: RgbImage, cfg: &HeroMatcherConfig) -> Self {
        let features = detect_and_compute(&image, cfg);
        let histogram = hs_histogram(&image, cfg);
        Self {
            name: name.into(),
            image,
            features,
            histogram,
        }
    }
}

/// Ordered set of reference entries. Order decides ties during classification.
#[derive(Clone, Debug, Default)]
pub struct ReferenceCatalog {
    entries: Vec<ReferenceEntry>,
}

impl ReferenceCatalog {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Builds a catalog from decoded images, keeping the first entry for a repeated name.
    pub fn from_images<I, S>(images: I, cfg: &HeroMatcherConfig) -> Self
    where
        I: IntoIterator<Item = (S, RgbImage)>,
        S: Into<String>,
    {
        let mut catalog = Self::empty();
        for (name, image) in images {
            let name = name.into();
            if catalog.get(&name).is_some() {
                log::warn!("Duplicate hero '{}' ignored", name);
                continue;
            }
            catalog.entries.push(ReferenceEntry::new(name, image, cfg));
        }
        catalog
    }

    /// Loads `{"mappings": {hero: image_path}}`. Relative image paths resolve
    /// against `image_root`.
    ///
    /// Images that fail to decode are logged and skipped.
    pub fn load(
        mapping_path: &Path,
        image_root: &Path,
        cfg: &HeroMatcherConfig,
    ) -> Result<Self, CatalogError> {
        if !mapping_path.exists() {
            return Err(CatalogError::MappingNotFound(mapping_path.to_path_buf()));
        }
        let contents = fs::read_to_string(mapping_path).map_err(|source| CatalogError::Io {
            path: mapping_path.to_path_buf(),
            source,
        })?;
        let file: MappingFile =
            serde_json::from_str(&contents).map_err(|source| CatalogError::Malformed {
                path: mapping_path.to_path_buf(),
                source,
            })?;

        let mut images = Vec::with_capacity(file.mappings.len());
        for (hero, value) in file.mappings {
            let Some(relative) = value.as_str() else {
                return Err(CatalogError::InvalidEntry {
                    hero,
                    path: mapping_path.to_path_buf(),
                });
            };
            match load_image(&hero, &image_root.join(relative)) {
                Ok(image) => images.push((hero, image)),
                Err(e) => log::warn!("{}; skipping", e),
            }
        }

        let catalog = Self::from_images(images, cfg);
        log::info!(
            "Loaded {} hero references from {}",
            catalog.len(),
            mapping_path.display()
        );
        Ok(catalog)
    }

    /// Like [`ReferenceCatalog::load`], but an absent mapping file yields an
    /// empty catalog, so every classification returns `NO_MATCH`.
    pub fn load_or_empty(
        mapping_path: &Path,
        image_root: &Path,
        cfg: &HeroMatcherConfig,
    ) -> Result<Self, CatalogError> {
        match Self::load(mapping_path, image_root, cfg) {
            Err(CatalogError::MappingNotFound(path)) => {
                log::warn!(
                    "Hero mapping file {} not found, hero detection disabled",
                    path.display()
                );
                Ok(Self::empty())
            }
            other => other,
        }
    }

    pub fn entries(&self) -> &[ReferenceEntry] {
        &self.entries
    }

    pub fn get(&self, name: &str) -> Option<&ReferenceEntry> {
        self.entries.iter().find(|e| e.name == name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn load_image(hero: &str, path: &Path) -> Result<RgbImage, CatalogError> {
    image::open(path)
        .map(|img| img.to_rgb8())
        .map_err(|source| CatalogError::Decode {
            hero: hero.to_string(),
            path: path.to_path_buf(),
            source,
        })
}
