//! A rolling file writer.
//!
//! Records are always appended to the configured path. When a rotation
//! trigger fires — the active file outgrowing a size bound, or a clock
//! period elapsing — the active file is renamed to a timestamp-suffixed
//! sibling and a fresh file is opened at the original path. Rotation is
//! best effort: if the rename or reopen fails, the current file keeps
//! accepting writes and the failure is reported once on stderr.

use chrono::{DateTime, Datelike, TimeZone, Timelike, Utc};
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// When to start a new log file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Rotation(RotationKind);

#[derive(Clone, Debug, PartialEq, Eq)]
enum RotationKind {
    Never,
    Hourly,
    Daily,
    Size(u64),
}

impl Rotation {
    /// Never rotate; the file grows without bound.
    pub const NEVER: Rotation = Rotation(RotationKind::Never);
    /// Rotate at the top of every hour.
    pub const HOURLY: Rotation = Rotation(RotationKind::Hourly);
    /// Rotate at midnight UTC.
    pub const DAILY: Rotation = Rotation(RotationKind::Daily);

    /// Rotate once the active file would exceed `bytes`.
    pub fn size(bytes: u64) -> Rotation {
        Rotation(RotationKind::Size(bytes))
    }

    /// The next period boundary after `now`, for clock-based rotations.
    fn next_boundary(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self.0 {
            RotationKind::Hourly => {
                let next = now + chrono::Duration::hours(1);
                Utc.with_ymd_and_hms(next.year(), next.month(), next.day(), next.hour(), 0, 0)
                    .single()
            }
            RotationKind::Daily => {
                let next = now + chrono::Duration::days(1);
                Utc.with_ymd_and_hms(next.year(), next.month(), next.day(), 0, 0, 0)
                    .single()
            }
            RotationKind::Never | RotationKind::Size(_) => None,
        }
    }

    /// The timestamp suffix given to a file rotated out at `now`.
    fn suffix(&self, now: DateTime<Utc>) -> String {
        match self.0 {
            RotationKind::Hourly => now.format("%Y-%m-%d-%H").to_string(),
            RotationKind::Daily => now.format("%Y-%m-%d").to_string(),
            RotationKind::Size(_) | RotationKind::Never => {
                now.format("%Y%m%dT%H%M%S").to_string()
            }
        }
    }
}

/// A blocking writer that appends to one file and rotates it per a
/// [`Rotation`] policy.
#[derive(Debug)]
pub struct RollingAppender {
    path: PathBuf,
    rotation: Rotation,
    file: File,
    current_size: u64,
    next_boundary: Option<DateTime<Utc>>,
    rotate_failed_once: bool,
}

impl RollingAppender {
    /// Opens (creating directories as needed) the file at `path`.
    pub fn new(path: impl AsRef<Path>, rotation: Rotation) -> io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = open_appending(&path)?;
        let current_size = file.metadata().map(|m| m.len()).unwrap_or(0);
        let next_boundary = rotation.next_boundary(Utc::now());
        Ok(RollingAppender {
            path,
            rotation,
            file,
            current_size,
            next_boundary,
            rotate_failed_once: false,
        })
    }

    /// The path records are appended to.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn should_rotate(&self, now: DateTime<Utc>, incoming: u64) -> bool {
        match self.rotation.0 {
            RotationKind::Never => false,
            RotationKind::Size(limit) => {
                self.current_size > 0 && self.current_size + incoming > limit
            }
            RotationKind::Hourly | RotationKind::Daily => {
                matches!(self.next_boundary, Some(boundary) if now >= boundary)
            }
        }
    }

    /// Renames the active file to its timestamped name and reopens.
    ///
    /// Two rotations within the same second would produce the same suffix;
    /// the first unused numeric counter disambiguates.
    fn rotate(&mut self, now: DateTime<Utc>) -> io::Result<()> {
        self.file.flush()?;
        let rotated = rotated_path(&self.path, &self.rotation.suffix(now));
        fs::rename(&self.path, &rotated)?;
        self.file = open_appending(&self.path)?;
        self.current_size = 0;
        self.next_boundary = self.rotation.next_boundary(now);
        Ok(())
    }

    fn maybe_rotate(&mut self, incoming: u64) {
        let now = Utc::now();
        if !self.should_rotate(now, incoming) {
            return;
        }
        if let Err(err) = self.rotate(now) {
            // Keep writing to the old handle rather than lose records.
            if !self.rotate_failed_once {
                self.rotate_failed_once = true;
                eprintln!("log rotation for {} failed: {}", self.path.display(), err);
            }
            self.next_boundary = self.rotation.next_boundary(now);
        }
    }
}

impl Write for RollingAppender {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.maybe_rotate(buf.len() as u64);
        self.file.write_all(buf)?;
        self.current_size += buf.len() as u64;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()
    }
}

fn open_appending(path: &Path) -> io::Result<File> {
    let mut open_options = OpenOptions::new();
    open_options.append(true).create(true);
    match open_options.open(path) {
        Ok(file) => Ok(file),
        Err(err) => {
            if let Some(parent) = path.parent() {
                if !parent.as_os_str().is_empty() {
                    fs::create_dir_all(parent)?;
                    return open_options.open(path);
                }
            }
            Err(err)
        }
    }
}

fn rotated_path(active: &Path, suffix: &str) -> PathBuf {
    let base = active.with_extension("");
    let stem = base.to_string_lossy().into_owned();
    let extension = active
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();
    let candidate = PathBuf::from(format!("{}.{}{}", stem, suffix, extension));
    if !candidate.exists() {
        return candidate;
    }
    for n in 1u32.. {
        let candidate = PathBuf::from(format!("{}.{}.{}{}", stem, suffix, n, extension));
        if !candidate.exists() {
            return candidate;
        }
    }
    unreachable!("ran out of rotation counters")
}
