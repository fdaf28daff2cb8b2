// Target log files: tailing and size-based rotation

use std::fs::{self, File};
use std::io::{self, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use tracing::{debug, info};

use crate::application::constants::TAIL_READ_BYTES;
use crate::domain::LogRotation;

/// Log file of a target inside the log directory
pub fn log_path(log_dir: &Path, target_id: &str) -> PathBuf {
    log_dir.join(format!("{}.log", target_id))
}

fn backup_path(path: &Path, n: i64) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(format!(".{}", n));
    PathBuf::from(name)
}

/// Last `n` lines of a growing text file
///
/// Reads at most the final 128 KiB. When the read starts mid-file and the window
/// holds a newline, the (possibly truncated) first line is discarded; a window
/// without any newline is returned as one line. A missing or empty file yields
/// no lines.
pub fn tail_lines(path: &Path, n: usize) -> io::Result<Vec<String>> {
    let mut file = match File::open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e),
    };

    let size = file.metadata()?.len();
    if size == 0 || n == 0 {
        return Ok(Vec::new());
    }

    let offset = size.saturating_sub(TAIL_READ_BYTES);
    file.seek(SeekFrom::Start(offset))?;
    let mut buf = Vec::with_capacity((size - offset) as usize);
    file.read_to_end(&mut buf)?;

    let mut text = String::from_utf8_lossy(&buf).into_owned();
    if offset > 0 {
        if let Some(idx) = text.find('\n') {
            text.drain(..=idx);
        }
    }

    let text = text.trim_end_matches(['\r', '\n']);
    if text.is_empty() {
        return Ok(Vec::new());
    }

    let lines: Vec<&str> = text.split('\n').collect();
    let start = lines.len().saturating_sub(n);
    Ok(lines[start..]
        .iter()
        .map(|line| line.trim_end_matches('\r').to_string())
        .collect())
}

/// Rotate `path` if it has reached the configured size
///
/// Backups are `<path>.1` (newest) .. `<path>.<max_backups>`; the oldest slot is
/// discarded on overflow. Afterwards backups older than `max_age_days` are removed.
/// Must only run while no writer holds the file.
pub fn rotate_log(path: &Path, policy: &LogRotation) -> io::Result<bool> {
    rotate_log_at(path, policy, SystemTime::now())
}

pub fn rotate_log_at(path: &Path, policy: &LogRotation, now: SystemTime) -> io::Result<bool> {
    if !policy.is_enabled() {
        return Ok(false);
    }

    let size = match fs::metadata(path) {
        Ok(meta) => meta.len(),
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(false),
        Err(e) => return Err(e),
    };
    if size < policy.max_size_bytes() {
        return Ok(false);
    }

    let backups = policy.max_backups.max(1);

    let oldest = backup_path(path, backups);
    if oldest.exists() {
        fs::remove_file(&oldest)?;
    }
    for i in (1..backups).rev() {
        let from = backup_path(path, i);
        if from.exists() {
            fs::rename(&from, backup_path(path, i + 1))?;
        }
    }
    fs::rename(path, backup_path(path, 1))?;
    info!(path = %path.display(), size, "Log rotated");

    if policy.max_age_days > 0 {
        let max_age = Duration::from_secs(policy.max_age_days as u64 * 24 * 60 * 60);
        for i in 1..=backups {
            let backup = backup_path(path, i);
            let Ok(modified) = fs::metadata(&backup).and_then(|m| m.modified()) else {
                continue;
            };
            let age = now.duration_since(modified).unwrap_or_default();
            if age > max_age {
                debug!(path = %backup.display(), "Removing expired log backup");
                fs::remove_file(&backup)?;
            }
        }
    }

    Ok(true)
}
