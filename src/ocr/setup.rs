use anyhow::{anyhow, Context, Result};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Command;

const TESSDATA_REPO: &str = "https://github.com/tesseract-ocr/tessdata/raw/main";
const LANGUAGE_FILE: &str = "eng.traineddata";

#[cfg(windows)]
const EXECUTABLE_NAME: &str = "tesseract.exe";
#[cfg(not(windows))]
const EXECUTABLE_NAME: &str = "tesseract";

const COMMON_EXECUTABLE_PATHS: &[&str] = &[
    r"C:\Program Files\Tesseract-OCR\tesseract.exe",
    r"C:\Program Files (x86)\Tesseract-OCR\tesseract.exe",
    "/usr/bin/tesseract",
    "/usr/local/bin/tesseract",
    "/opt/homebrew/bin/tesseract",
];

const SYSTEM_TESSDATA_PATHS: &[&str] = &[
    r"C:\Program Files\Tesseract-OCR\tessdata",
    r"C:\Program Files (x86)\Tesseract-OCR\tessdata",
    "/usr/share/tesseract-ocr/5/tessdata",
    "/usr/share/tesseract-ocr/4.00/tessdata",
    "/usr/share/tessdata",
    "/usr/local/share/tessdata",
    "/opt/homebrew/share/tessdata",
];

pub struct TesseractPaths {
    pub executable: PathBuf,
    pub tessdata: PathBuf,
}

/// Where a downloaded `eng.traineddata` and a portable Tesseract may live.
pub fn get_local_tesseract_dir() -> PathBuf {
    crate::paths::get_data_dir().join("tesseract")
}

/// Finds Tesseract and makes sure English trained data is available,
/// downloading it into the local data directory when no copy exists.
pub fn ensure_tesseract(explicit: Option<&Path>) -> Result<TesseractPaths> {
    let executable = find_tesseract_executable(explicit)?;
    log::info!("Tesseract found at: {}", executable.display());

    if let Ok(tessdata) = find_tessdata_dir() {
        log::info!("Using tessdata at: {}", tessdata.display());
        return Ok(TesseractPaths {
            executable,
            tessdata,
        });
    }

    let tessdata = get_local_tesseract_dir().join("tessdata");
    fs::create_dir_all(&tessdata)
        .with_context(|| format!("Failed to create {}", tessdata.display()))?;
    download_tessdata(&tessdata)?;

    Ok(TesseractPaths {
        executable,
        tessdata,
    })
}

/// Downloads English trained data
fn download_tessdata(tessdata_dir: &Path) -> Result<()> {
    let eng_url = format!("{}/{}", TESSDATA_REPO, LANGUAGE_FILE);
    let eng_path = tessdata_dir.join(LANGUAGE_FILE);

    log::info!("Downloading {}...", LANGUAGE_FILE);

    let client = reqwest::blocking::Client::builder()
        .timeout(std::time::Duration::from_secs(300))
        .build()?;

    let response = client
        .get(&eng_url)
        .header("User-Agent", "mlbb-stats")
        .send()?;

    if !response.status().is_success() {
        return Err(anyhow!(
            "Failed to download {}: HTTP {}",
            LANGUAGE_FILE,
            response.status()
        ));
    }

    let bytes = response.bytes()?;
    let mut file = fs::File::create(&eng_path)?;
    file.write_all(&bytes)?;

    log::info!("Downloaded {} ({} bytes)", LANGUAGE_FILE, bytes.len());
    Ok(())
}

/// Finds the Tesseract executable: `explicit`, then the local data dir,
/// then `PATH`, then common install locations.
pub fn find_tesseract_executable(explicit: Option<&Path>) -> Result<PathBuf> {
    if let Some(path) = explicit {
        if path.exists() || responds_to_version(path) {
            return Ok(path.to_path_buf());
        }
        return Err(anyhow!("Configured Tesseract not found: {}", path.display()));
    }

    let local_exe = get_local_tesseract_dir().join(EXECUTABLE_NAME);
    if local_exe.exists() {
        return Ok(local_exe);
    }

    if responds_to_version(Path::new("tesseract")) {
        return Ok(PathBuf::from("tesseract"));
    }

    COMMON_EXECUTABLE_PATHS
        .iter()
        .map(PathBuf::from)
        .find(|p| p.exists())
        .ok_or_else(|| anyhow!("Tesseract not found. Please install Tesseract-OCR."))
}

fn responds_to_version(program: &Path) -> bool {
    Command::new(program)
        .arg("--version")
        .output()
        .map(|output| output.status.success())
        .unwrap_or(false)
}

/// Finds a tessdata directory containing `eng.traineddata`.
pub fn find_tessdata_dir() -> Result<PathBuf> {
    let mut candidates = vec![get_local_tesseract_dir().join("tessdata")];

    if let Ok(prefix) = std::env::var("TESSDATA_PREFIX") {
        let prefix = PathBuf::from(prefix);
        candidates.push(prefix.join("tessdata"));
        candidates.push(prefix);
    }
    candidates.extend(SYSTEM_TESSDATA_PATHS.iter().map(PathBuf::from));

    first_with_language_file(&candidates).ok_or_else(|| {
        anyhow!(
            "tessdata directory not found. Please ensure {} is available.",
            LANGUAGE_FILE
        )
    })
}

fn first_with_language_file(candidates: &[PathBuf]) -> Option<PathBuf> {
    candidates
        .iter()
        .find(|dir| dir.join(LANGUAGE_FILE).exists())
        .cloned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_first_with_language_file() {
        let dir = tempdir().unwrap();
        let empty = dir.path().join("empty");
        let good = dir.path().join("good");
        fs::create_dir_all(&empty).unwrap();
        fs::create_dir_all(&good).unwrap();
        fs::write(good.join(LANGUAGE_FILE), b"data").unwrap();

        let found = first_with_language_file(&[empty.clone(), good.clone()]);
        assert_eq!(found, Some(good));
        assert_eq!(first_with_language_file(&[empty]), None);
    }

    #[test]
    fn test_explicit_missing_executable_is_error() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join("no-tesseract-here");
        assert!(find_tesseract_executable(Some(&missing)).is_err());
    }

    #[test]
    fn test_explicit_existing_executable_is_used() {
        let dir = tempdir().unwrap();
        let exe = dir.path().join(EXECUTABLE_NAME);
        fs::write(&exe, b"").unwrap();
        assert_eq!(find_tesseract_executable(Some(&exe)).unwrap(), exe);
    }
}
