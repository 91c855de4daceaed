//! Corrections for nicknames that OCR consistently misreads.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::Path;

use crate::ocr::parse::{similar_names, NAME_SIMILARITY_THRESHOLD};

#[derive(Deserialize)]
struct MappingFile {
    #[serde(default)]
    mappings: HashMap<String, String>,
}

fn read_mapping_file(path: &Path) -> Result<MappingFile> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read nickname mappings {}", path.display()))?;
    serde_json::from_str(&contents)
        .with_context(|| format!("Failed to parse nickname mappings {}", path.display()))
}

/// `ocr_text -> real nickname` replacements.
#[derive(Clone, Debug, Default)]
pub struct NicknameMappings {
    mappings: HashMap<String, String>,
}

impl NicknameMappings {
    /// Loads `{"mappings": {...}}`. A missing or unreadable file yields no mappings.
    pub fn load(path: &Path) -> Self {
        if !path.exists() {
            log::debug!("No nickname mappings at {}", path.display());
            return Self::default();
        }

        match read_mapping_file(path) {
            Ok(file) => {
                let loaded = Self {
                    mappings: file.mappings,
                };
                log::info!(
                    "Loaded {} nickname mappings from {}",
                    loaded.len(),
                    path.display()
                );
                loaded
            }
            Err(e) => {
                log::warn!("{:#}", e);
                Self::default()
            }
        }
    }

    pub fn len(&self) -> usize {
        self.mappings.len()
    }

    /// The mapped nickname, or `nickname` unchanged.
    pub fn apply(&self, nickname: &str) -> String {
        match self.mappings.get(nickname) {
            Some(mapped) => {
                log::debug!("Nickname mapping applied: '{}' -> '{}'", nickname, mapped);
                mapped.clone()
            }
            None => nickname.to_string(),
        }
    }

    /// Lowercased names `target` may appear as, following mappings both ways.
    pub fn candidates(&self, target: &str) -> Vec<String> {
        let target = target.trim().to_lowercase();
        let mut candidates = vec![target.clone()];
        for (original, mapped) in &self.mappings {
            let original = original.trim().to_lowercase();
            let mapped = mapped.trim().to_lowercase();
            if mapped == target {
                candidates.push(original);
            } else if original == target {
                candidates.push(mapped);
            }
        }
        candidates
    }

    /// Whether an OCR'd nickname refers to `target`: containment either way
    /// or similar character sets.
    pub fn matches(&self, target: &str, ocr_nickname: &str) -> bool {
        let nickname = ocr_nickname.trim().to_lowercase();
        if nickname.is_empty() {
            return false;
        }
        self.candidates(target)
            .iter()
            .filter(|c| !c.is_empty())
            .any(|candidate| {
                candidate.contains(&nickname)
                    || nickname.contains(candidate.as_str())
                    || similar_names(candidate, &nickname, NAME_SIMILARITY_THRESHOLD)
            })
    }
}

#[cfg(test)]
impl NicknameMappings {
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            mappings: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}
