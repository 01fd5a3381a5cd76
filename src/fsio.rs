//! Crash-safe file writes shared by every stage that touches the site tree.
//!
//! All writes go to a sibling temporary file which is flushed, synced and
//! then renamed over the target, so a killed process leaves each file in
//! either its old or its new state.

use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

/// Replace `path` with `bytes` via temp file + rename.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> io::Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)?;
    }

    let tmp = tmp_write_path(path);
    let written = (|| -> io::Result<()> {
        let mut file = File::create(&tmp)?;
        file.write_all(bytes)?;
        file.sync_all()
    })();
    if let Err(e) = written {
        let _ = fs::remove_file(&tmp);
        return Err(e);
    }

    fs::rename(&tmp, path).inspect_err(|_| {
        let _ = fs::remove_file(&tmp);
    })
}

/// Write only when the file is missing or its bytes differ.
///
/// Returns `true` when a write happened. Unchanged files keep their mtime.
pub fn write_if_changed(path: &Path, bytes: &[u8]) -> io::Result<bool> {
    match fs::read(path) {
        Ok(existing) if existing == bytes => Ok(false),
        Ok(_) => write_atomic(path, bytes).map(|_| true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => write_atomic(path, bytes).map(|_| true),
        Err(e) => Err(e),
    }
}

/// Copy `path` to `<path>.bak` unless a backup already exists.
///
/// Returns `true` when a new backup was written.
pub fn backup_once(path: &Path) -> io::Result<bool> {
    let backup = with_suffix(path, ".bak");
    if backup.exists() {
        return Ok(false);
    }
    let original = fs::read(path)?;
    write_atomic(&backup, &original)?;
    Ok(true)
}

/// `path` with `suffix` appended to its final component (`a.html` → `a.html.bak`).
pub fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name: OsString = path.as_os_str().to_os_string();
    name.push(suffix);
    PathBuf::from(name)
}

fn tmp_write_path(path: &Path) -> PathBuf {
    let unique = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    with_suffix(path, &format!(".tmp.{}.{}", std::process::id(), unique))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn write_atomic_creates_parents_and_leaves_no_temp() {
        let tmp = TempDir::new().unwrap();
        let target = tmp.path().join("a").join("b.txt");
        write_atomic(&target, b"hello").unwrap();

        assert_eq!(fs::read_to_string(&target).unwrap(), "hello");
        let leftovers: Vec<_> = fs::read_dir(target.parent().unwrap())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().contains(".tmp."))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn write_if_changed_skips_identical_bytes() {
        let tmp = TempDir::new().unwrap();
        let target = tmp.path().join("page.html");

        assert!(write_if_changed(&target, b"<p>x</p>").unwrap());
        assert!(!write_if_changed(&target, b"<p>x</p>").unwrap());
        assert!(write_if_changed(&target, b"<p>y</p>").unwrap());
        assert_eq!(fs::read_to_string(&target).unwrap(), "<p>y</p>");
    }

    #[test]
    fn backup_is_written_once() {
        let tmp = TempDir::new().unwrap();
        let target = tmp.path().join("page.html");
        fs::write(&target, "first").unwrap();

        assert!(backup_once(&target).unwrap());
        fs::write(&target, "second").unwrap();
        assert!(!backup_once(&target).unwrap());

        let backup = with_suffix(&target, ".bak");
        assert_eq!(fs::read_to_string(backup).unwrap(), "first");
    }

    #[test]
    fn with_suffix_appends_to_file_name() {
        let p = with_suffix(Path::new("/x/used.txt"), ".lock");
        assert_eq!(p, PathBuf::from("/x/used.txt.lock"));
    }
}
