//! # tesseract-locate
//!
//! Find a working [tesseract](https://github.com/tesseract-ocr/tesseract)
//! executable so that callers can shell out to it without asking users to
//! configure anything when it is installed in a usual place.
//!
//! ## How it works
//!
//! On first call to [`locate_tesseract`] (first match wins):
//!
//! 1. `TESSERACT_CMD`: an explicit path, or a command name looked up on `PATH`.
//! 2. `tesseract` on `PATH` (via the `which` crate, so `PATHEXT` is honoured
//!    on Windows).
//! 3. Well-known install locations, see [`well_known_locations`].
//!
//! The result is cached for the lifetime of the process.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use tesseract_locate::{locate_tesseract, tesseract_version};
//!
//! let path = locate_tesseract().expect("tesseract not installed");
//! let version = tesseract_version(&path).expect("tesseract does not run");
//! println!("tesseract {version} at {}", path.display());
//! ```

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::OnceLock;

use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

// ── Public constants ─────────────────────────────────────────────────────────

/// Environment variable that overrides discovery.
pub const ENV_TESSERACT_CMD: &str = "TESSERACT_CMD";

#[cfg(windows)]
const EXE_NAME: &str = "tesseract.exe";
#[cfg(not(windows))]
const EXE_NAME: &str = "tesseract";

// ── Error type ───────────────────────────────────────────────────────────────

/// Errors returned by tesseract-locate operations.
#[derive(Error, Debug)]
pub enum LocateError {
    /// `TESSERACT_CMD` is set but names nothing executable.
    #[error("TESSERACT_CMD is set to '{path}', which is not an executable file")]
    EnvPathMissing { path: PathBuf },

    /// Nothing found on `PATH` or in any well-known location.
    #[error("tesseract executable not found on PATH or in: {searched}")]
    NotFound { searched: String },

    /// The executable could not be started.
    #[error("Failed to run '{path}': {source}")]
    Spawn {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// `tesseract --version` exited with an error.
    #[error("'{path} --version' exited with {status}")]
    VersionFailed { path: PathBuf, status: String },

    /// The `--version` output had no recognisable version line.
    #[error("Could not find a tesseract version in: {output:?}")]
    UnrecognisedVersion { output: String },
}

// ── Thread-safe singleton path cache ─────────────────────────────────────────

static RESOLVED_PATH: OnceLock<PathBuf> = OnceLock::new();

static RE_VERSION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^\s*tesseract\s+v?(\d+(?:\.\d+)*)").unwrap());

// ── Public API ───────────────────────────────────────────────────────────────

/// Locate tesseract, caching the first successful result.
pub fn locate_tesseract() -> Result<PathBuf, LocateError> {
    if let Some(path) = RESOLVED_PATH.get() {
        return Ok(path.clone());
    }
    let path = find_tesseract()?;
    Ok(RESOLVED_PATH.get_or_init(|| path).clone())
}

/// Locate tesseract without touching the process-wide cache.
pub fn find_tesseract() -> Result<PathBuf, LocateError> {
    resolve(
        std::env::var_os(ENV_TESSERACT_CMD),
        which::which(EXE_NAME).ok(),
        &well_known_locations(),
    )
}

/// `true` when [`locate_tesseract`] succeeds.
pub fn is_tesseract_available() -> bool {
    locate_tesseract().is_ok()
}

/// Install locations checked when tesseract is not on `PATH`.
///
/// - **Linux / macOS**: `/usr/bin`, `/usr/local/bin`, `/opt/homebrew/bin`
///   (Apple Silicon Homebrew), `/opt/local/bin` (MacPorts), `/snap/bin`
/// - **Windows**: `Tesseract-OCR` under `Program Files`, `Program Files (x86)`
///   and `%LOCALAPPDATA%\Programs`
pub fn well_known_locations() -> Vec<PathBuf> {
    #[cfg(windows)]
    {
        let mut dirs: Vec<PathBuf> = ["ProgramFiles", "ProgramFiles(x86)"]
            .iter()
            .filter_map(|var| std::env::var_os(var))
            .map(PathBuf::from)
            .collect();
        if let Some(local) = std::env::var_os("LOCALAPPDATA") {
            dirs.push(PathBuf::from(local).join("Programs"));
        }
        dirs.into_iter()
            .map(|d| d.join("Tesseract-OCR").join(EXE_NAME))
            .collect()
    }
    #[cfg(not(windows))]
    {
        [
            "/usr/bin",
            "/usr/local/bin",
            "/opt/homebrew/bin",
            "/opt/local/bin",
            "/snap/bin",
        ]
        .iter()
        .map(|d| Path::new(d).join(EXE_NAME))
        .collect()
    }
}

/// Run `tesseract --version` and return the version number, e.g. `"5.3.4"`.
///
/// Tesseract 3.x prints its banner to stderr, later releases to stdout; both
/// are searched.
pub fn tesseract_version(path: &Path) -> Result<String, LocateError> {
    let output = Command::new(path)
        .arg("--version")
        .output()
        .map_err(|e| LocateError::Spawn {
            path: path.to_path_buf(),
            source: e,
        })?;

    if !output.status.success() {
        return Err(LocateError::VersionFailed {
            path: path.to_path_buf(),
            status: output.status.to_string(),
        });
    }

    let text = format!(
        "{}\n{}",
        String::from_utf8_lossy(&output.stdout),
        String::from_utf8_lossy(&output.stderr)
    );
    parse_version(&text).ok_or_else(|| LocateError::UnrecognisedVersion {
        output: text.trim().to_string(),
    })
}

/// Extract the version number from `tesseract --version` output.
///
/// Accepts `tesseract 5.3.4` and `tesseract v5.3.0.20221222`; a suffix such
/// as `-rc2` is dropped.
pub fn parse_version(output: &str) -> Option<String> {
    RE_VERSION
        .captures(output)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

// ── Internal ─────────────────────────────────────────────────────────────────

fn resolve(
    env_override: Option<OsString>,
    on_path: Option<PathBuf>,
    candidates: &[PathBuf],
) -> Result<PathBuf, LocateError> {
    if let Some(value) = env_override.filter(|v| !v.is_empty()) {
        let path = PathBuf::from(value);
        if path.is_file() {
            return Ok(path);
        }
        return which::which(&path).map_err(|_| LocateError::EnvPathMissing { path });
    }

    if let Some(path) = on_path {
        return Ok(path);
    }

    candidates
        .iter()
        .find(|p| p.is_file())
        .cloned()
        .ok_or_else(|| LocateError::NotFound {
            searched: candidates
                .iter()
                .map(|p| p.display().to_string())
                .collect::<Vec<_>>()
                .join(", "),
        })
}
