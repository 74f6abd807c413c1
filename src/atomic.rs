//! Crash- and cancellation-safe file publication.
//!
//! Files are written to a uniquely named temporary sibling, flushed to
//! disk, and renamed over the destination. Readers therefore observe either
//! the previous file or the complete new one, never a truncated write.
//!
//! The temporary file is removed on every early exit: I/O errors, and the
//! writing future being dropped mid-way (operation cancellation).

use std::io;
use std::path::{Path, PathBuf};

use tokio::fs;
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

/// Prefix shared by all temporary files. Never a valid blob key.
pub const TMP_PREFIX: &str = ".tmp-";

/// Removes the file at `path` on drop unless disarmed.
struct TempPath {
    path: Option<PathBuf>,
}

impl TempPath {
    fn path(&self) -> &Path {
        self.path.as_deref().unwrap_or(Path::new(""))
    }

    fn disarm(&mut self) {
        self.path = None;
    }
}

impl Drop for TempPath {
    fn drop(&mut self) {
        if let Some(path) = self.path.take() {
            let _ = std::fs::remove_file(path);
        }
    }
}

/// Atomically replace `dest` with `bytes`.
pub async fn write_atomic(dest: &Path, bytes: &[u8]) -> io::Result<()> {
    let dir = match dest.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let file_name = dest
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("file");
    let mut tmp = TempPath {
        path: Some(dir.join(format!(
            "{}{}-{}",
            TMP_PREFIX,
            file_name,
            Uuid::new_v4().simple()
        ))),
    };

    let mut file = fs::File::create(tmp.path()).await?;
    file.write_all(bytes).await?;
    file.flush().await?;
    file.sync_all().await?;
    drop(file);

    fs::rename(tmp.path(), dest).await?;
    tmp.disarm();
    Ok(())
}

/// Delete temporary files left in `dir` by an interrupted process.
///
/// Returns how many were removed.
pub async fn sweep_temp_files(dir: &Path) -> io::Result<usize> {
    let mut removed = 0;
    let mut entries = fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let is_tmp = entry
            .file_name()
            .to_str()
            .is_some_and(|name| name.starts_with(TMP_PREFIX));
        if is_tmp && entry.file_type().await?.is_file() {
            match fs::remove_file(entry.path()).await {
                Ok(()) => removed += 1,
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => return Err(e),
            }
        }
    }
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_write_atomic_replaces_and_leaves_no_temp() {
        let tmp = TempDir::new().unwrap();
        let dest = tmp.path().join("items.json");
        write_atomic(&dest, b"first").await.unwrap();
        write_atomic(&dest, b"second").await.unwrap();
        assert_eq!(std::fs::read(&dest).unwrap(), b"second");
        assert_eq!(std::fs::read_dir(tmp.path()).unwrap().count(), 1);
    }

    #[tokio::test]
    async fn test_failed_write_cleans_up_temp() {
        let tmp = TempDir::new().unwrap();
        // Renaming a file over a non-empty directory fails.
        let dest = tmp.path().join("occupied");
        std::fs::create_dir(&dest).unwrap();
        std::fs::write(dest.join("inner"), b"x").unwrap();

        assert!(write_atomic(&dest, b"data").await.is_err());
        let names: Vec<_> = std::fs::read_dir(tmp.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(names, vec![std::ffi::OsString::from("occupied")]);
    }

    #[tokio::test]
    async fn test_sweep_removes_only_temp_files() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join(".tmp-abc.jpg-123"), b"partial").unwrap();
        std::fs::write(tmp.path().join("keep.jpg"), b"whole").unwrap();
        assert_eq!(sweep_temp_files(tmp.path()).await.unwrap(), 1);
        assert!(tmp.path().join("keep.jpg").exists());
    }
}
