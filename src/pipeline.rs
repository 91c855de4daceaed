//! Batch processing of screenshots.
//!
//! Screenshot paths go through an mpsc work queue to a pool of worker threads
//! that share one [`Extractor`]. Each worker sends an [`ImageOutcome`] back;
//! outcomes are put back into input order before they are reported.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::Mutex;
use std::thread;

use crate::extract::{Extractor, PlayerRecord};

const IMAGE_EXTENSIONS: [&str; 3] = ["png", "jpg", "jpeg"];

/// A screenshot waiting to be processed.
#[derive(Debug, Clone)]
pub struct WorkItem {
    /// Position in the input list (0-based)
    pub index: usize,
    pub path: PathBuf,
}

/// Creates the work queue feeding the worker pool.
pub fn create_work_queue() -> (Sender<WorkItem>, Receiver<WorkItem>) {
    channel()
}

/// Result of processing one screenshot.
#[derive(Debug)]
pub struct ImageOutcome {
    pub index: usize,
    pub path: PathBuf,
    pub result: Result<Vec<PlayerRecord>>,
}

/// Everything a batch run produced.
#[derive(Debug, Default)]
pub struct BatchReport {
    /// All records, grouped by screenshot in input order
    pub records: Vec<PlayerRecord>,
    pub processed: usize,
    /// Screenshots that could not be processed, with the reason
    pub failures: Vec<(PathBuf, String)>,
    /// Screenshots where the requested player was not found
    pub not_found: Vec<PathBuf>,
}

/// Image files directly inside `dir`, sorted by path.
pub fn collect_images(dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = std::fs::read_dir(dir)
        .with_context(|| format!("Failed to read directory: {}", dir.display()))?;

    let mut images = Vec::new();
    for entry in entries {
        let path = entry.context("Failed to read directory entry")?.path();
        if path.is_file() && is_image(&path) {
            images.push(path);
        }
    }
    images.sort();
    Ok(images)
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            IMAGE_EXTENSIONS
                .iter()
                .any(|known| ext.eq_ignore_ascii_case(known))
        })
}

/// Worker count when none is given: one per available core.
pub fn default_jobs() -> usize {
    thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

fn process_one(extractor: &Extractor, path: &Path, player: Option<&str>) -> Result<Vec<PlayerRecord>> {
    match player {
        Some(nickname) => Ok(extractor
            .extract_player_by_nickname(path, nickname)?
            .into_iter()
            .collect()),
        None => extractor.extract_all_players(path),
    }
}

/// Processes queued items until the queue is closed and drained.
fn run_worker(
    extractor: &Extractor,
    receiver: &Mutex<Receiver<WorkItem>>,
    results: Sender<ImageOutcome>,
    player: Option<&str>,
) {
    loop {
        // The lock is held only while taking the next item.
        let next = match receiver.lock() {
            Ok(rx) => rx.recv(),
            Err(_) => break,
        };
        let Ok(item) = next else {
            break;
        };

        log::info!("Processing {}", item.path.display());
        let result = process_one(extractor, &item.path, player);
        let outcome = ImageOutcome {
            index: item.index,
            path: item.path,
            result,
        };
        if results.send(outcome).is_err() {
            break;
        }
    }
}

/// Extracts every screenshot in `paths` with up to `jobs` worker threads.
///
/// With `player`, only that player's row is kept per screenshot. A failing
/// screenshot is logged and reported without stopping the batch.
pub fn process_images(
    extractor: &Extractor,
    paths: &[PathBuf],
    player: Option<&str>,
    jobs: usize,
) -> BatchReport {
    let jobs = jobs.clamp(1, paths.len().max(1));
    log::info!("Processing {} screenshots with {} workers", paths.len(), jobs);

    let (work_tx, work_rx) = create_work_queue();
    for (index, path) in paths.iter().enumerate() {
        // The receiver is alive until the end of this function.
        let _ = work_tx.send(WorkItem {
            index,
            path: path.clone(),
        });
    }
    drop(work_tx);

    let work_rx = Mutex::new(work_rx);
    let (result_tx, result_rx) = channel();
    let mut outcomes: Vec<ImageOutcome> = thread::scope(|scope| {
        for _ in 0..jobs {
            let results = result_tx.clone();
            let work_rx = &work_rx;
            scope.spawn(move || run_worker(extractor, work_rx, results, player));
        }
        drop(result_tx);
        result_rx.iter().collect()
    });
    outcomes.sort_by_key(|o| o.index);

    let mut report = BatchReport::default();
    for outcome in outcomes {
        match outcome.result {
            Ok(records) => {
                report.processed += 1;
                if records.is_empty() && player.is_some() {
                    report.not_found.push(outcome.path);
                } else {
                    log::info!(
                        "{}: {} records",
                        outcome.path.display(),
                        records.len()
                    );
                    report.records.extend(records);
                }
            }
            Err(e) => {
                log::error!("Failed to process {}: {:#}", outcome.path.display(), e);
                report.failures.push((outcome.path, format!("{:#}", e)));
            }
        }
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ExtractorConfig;
    use crate::extract::test_support::ScriptedRecognizer;
    use crate::extract::NicknameMappings;
    use crate::hero::catalog::ReferenceCatalog;
    use image::{ImageBuffer, Rgb, RgbImage};
    use std::sync::Arc;
    use tempfile::tempdir;

    fn make_extractor() -> Extractor {
        Extractor::new(
            ExtractorConfig::default(),
            Box::new(ScriptedRecognizer::failing()),
            Arc::new(ReferenceCatalog::empty()),
            NicknameMappings::default(),
        )
    }

    fn save_image(dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        let img: RgbImage = ImageBuffer::from_pixel(48, 24, Rgb([40, 40, 40]));
        img.save(&path).unwrap();
        path
    }

    #[test]
    fn test_work_queue_keeps_order() {
        let (sender, receiver) = create_work_queue();
        for i in 0..3 {
            sender
                .send(WorkItem {
                    index: i,
                    path: PathBuf::from(format!("shot_{}.png", i)),
                })
                .unwrap();
        }
        drop(sender);

        let indices: Vec<usize> = receiver.iter().map(|item| item.index).collect();
        assert_eq!(indices, vec![0, 1, 2]);
    }

    #[test]
    fn test_collect_images_filters_and_sorts() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("b.JPG"), b"").unwrap();
        std::fs::write(dir.path().join("a.png"), b"").unwrap();
        std::fs::write(dir.path().join("c.jpeg"), b"").unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"").unwrap();
        std::fs::write(dir.path().join("noext"), b"").unwrap();
        std::fs::create_dir(dir.path().join("nested.png")).unwrap();

        let images = collect_images(dir.path()).unwrap();
        let names: Vec<String> = images
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.png", "b.JPG", "c.jpeg"]);
    }

    #[test]
    fn test_collect_images_missing_dir_is_error() {
        let dir = tempdir().unwrap();
        assert!(collect_images(&dir.path().join("missing")).is_err());
    }

    #[test]
    fn test_batch_keeps_input_order_and_reports_failures() {
        let dir = tempdir().unwrap();
        let paths = vec![
            save_image(dir.path(), "one.png"),
            dir.path().join("missing.png"),
            save_image(dir.path(), "two.png"),
            save_image(dir.path(), "three.png"),
        ];

        let report = process_images(&make_extractor(), &paths, None, 3);

        assert_eq!(report.processed, 3);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].0, paths[1]);
        assert_eq!(report.records.len(), 15);

        let sources: Vec<&str> = report
            .records
            .iter()
            .step_by(5)
            .map(|r| r.source_image.as_str())
            .collect();
        let expected: Vec<String> = [&paths[0], &paths[2], &paths[3]]
            .iter()
            .map(|p| p.display().to_string())
            .collect();
        assert_eq!(sources, expected);
        assert!(report.records[..5]
            .iter()
            .enumerate()
            .all(|(i, r)| r.position as usize == i + 1));
    }

    #[test]
    fn test_batch_player_not_found() {
        let dir = tempdir().unwrap();
        let paths = vec![save_image(dir.path(), "one.png")];

        let report = process_images(&make_extractor(), &paths, Some("ghost"), 4);

        assert_eq!(report.processed, 1);
        assert!(report.records.is_empty());
        assert_eq!(report.not_found, paths);
    }

    #[test]
    fn test_empty_batch() {
        let report = process_images(&make_extractor(), &[], None, 0);
        assert_eq!(report.processed, 0);
        assert!(report.records.is_empty());
    }
}
