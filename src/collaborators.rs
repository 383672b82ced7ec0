//! Outside collaborators: speech output and text persistence.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use time::OffsetDateTime;
use tracing::{debug, info};

/// Text-to-speech sink. Called on the session's speech thread, so an
/// implementation may block until the utterance is done.
pub trait Speaker: Send + Sync {
    fn speak(&self, text: &str);
}

/// Speaker that only logs what would have been said.
#[derive(Debug, Default)]
pub struct LogSpeaker;

impl Speaker for LogSpeaker {
    fn speak(&self, text: &str) {
        info!(chars = text.chars().count(), "speak");
    }
}

pub trait TextStore: Send + Sync {
    fn save(&self, text: &str) -> io::Result<()>;
    /// The most recently saved text, if any.
    fn load(&self) -> io::Result<Option<String>>;
}

const FILE_PREFIX: &str = "scan_text_";
const FILE_SUFFIX: &str = ".txt";

/// Stores each saved document as a timestamped file in one directory.
#[derive(Debug, Clone)]
pub struct FileTextStore {
    dir: PathBuf,
}

impl FileTextStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Atomic write: write to .tmp then rename. Returns the file written.
    pub fn save_file(&self, text: &str) -> io::Result<PathBuf> {
        fs::create_dir_all(&self.dir)?;
        let stamp = timestamp();
        let mut path = self.dir.join(format!("{FILE_PREFIX}{stamp}{FILE_SUFFIX}"));
        let mut n = 1;
        while path.exists() {
            path = self
                .dir
                .join(format!("{FILE_PREFIX}{stamp}_{n}{FILE_SUFFIX}"));
            n += 1;
        }
        let tmp = path.with_extension("tmp");
        fs::write(&tmp, text)?;
        fs::rename(&tmp, &path)?;
        debug!(path = %path.display(), "text saved");
        Ok(path)
    }

    /// Newest saved file by modification time, then by timestamp and
    /// collision counter from its name.
    pub fn latest_file(&self) -> io::Result<Option<PathBuf>> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e),
        };
        let mut newest: Option<((SystemTime, String, u32), PathBuf)> = None;
        for entry in entries {
            let entry = entry?;
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };
            let Some((stamp, n)) = parse_file_name(name) else {
                continue;
            };
            let stamp = stamp.to_string();
            let meta = entry.metadata()?;
            if !meta.is_file() {
                continue;
            }
            let key = (meta.modified()?, stamp, n);
            if newest.as_ref().map_or(true, |(k, _)| key > *k) {
                newest = Some((key, entry.path()));
            }
        }
        Ok(newest.map(|(_, path)| path))
    }
}

impl TextStore for FileTextStore {
    fn save(&self, text: &str) -> io::Result<()> {
        self.save_file(text).map(|_| ())
    }

    fn load(&self) -> io::Result<Option<String>> {
        match self.latest_file()? {
            Some(path) => fs::read_to_string(path).map(Some),
            None => Ok(None),
        }
    }
}

/// Split `scan_text_<stamp>[_<n>].txt` into the stamp and the collision
/// counter, 0 for the first file of a second.
fn parse_file_name(name: &str) -> Option<(&str, u32)> {
    let body = name.strip_prefix(FILE_PREFIX)?.strip_suffix(FILE_SUFFIX)?;
    // The stamp itself holds one underscore.
    match body.match_indices('_').nth(1) {
        Some((i, _)) => Some((&body[..i], body[i + 1..].parse().ok()?)),
        None => Some((body, 0)),
    }
}

/// Local time as `YYYYMMDD_HHMMSS`.
fn timestamp() -> String {
    let now = OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc());
    format!(
        "{:04}{:02}{:02}_{:02}{:02}{:02}",
        now.year(),
        now.month() as u8,
        now.day(),
        now.hour(),
        now.minute(),
        now.second()
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn save_then_load_latest() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileTextStore::new(dir.path().join("texts"));
        assert_eq!(store.load().unwrap(), None);

        let first = store.save_file("first").unwrap();
        let second = store.save_file("second").unwrap();
        assert_ne!(first, second);
        // Within the same second the name suffix breaks the mtime tie.
        assert_eq!(store.latest_file().unwrap(), Some(second));
        assert_eq!(store.load().unwrap().as_deref(), Some("second"));
    }

    #[test]
    fn file_name_format() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileTextStore::new(dir.path());
        let path = store.save_file("x").unwrap();
        let name = path.file_name().unwrap().to_str().unwrap();
        assert!(name.starts_with("scan_text_"));
        assert!(name.ends_with(".txt"));
        // scan_text_YYYYMMDD_HHMMSS.txt
        assert_eq!(name.len(), "scan_text_".len() + 15 + ".txt".len());
        assert!(!path.with_extension("tmp").exists());
    }

    #[test]
    fn counter_orders_numerically_when_mtimes_tie() {
        let dir = tempfile::tempdir().unwrap();
        let when = SystemTime::UNIX_EPOCH + std::time::Duration::from_secs(1_800_000_000);
        for (n, text) in [(9, "ninth"), (10, "tenth"), (2, "second")] {
            let path = dir
                .path()
                .join(format!("scan_text_20270115_080000_{n}.txt"));
            fs::write(&path, text).unwrap();
            fs::File::options()
                .write(true)
                .open(&path)
                .unwrap()
                .set_modified(when)
                .unwrap();
        }
        let store = FileTextStore::new(dir.path());
        assert_eq!(store.load().unwrap().as_deref(), Some("tenth"));
    }

    #[test]
    fn parse_file_name_variants() {
        assert_eq!(
            parse_file_name("scan_text_20270115_080000.txt"),
            Some(("20270115_080000", 0))
        );
        assert_eq!(
            parse_file_name("scan_text_20270115_080000_12.txt"),
            Some(("20270115_080000", 12))
        );
        assert_eq!(parse_file_name("scan_text_20270115_080000_x.txt"), None);
        assert_eq!(parse_file_name("scan_text_20270115_080000.tmp"), None);
    }

    #[test]
    fn foreign_files_ignored() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("notes.txt"), "not mine").unwrap();
        let store = FileTextStore::new(dir.path());
        assert_eq!(store.load().unwrap(), None);
    }
}
