//! Load-lock-mutate-save over a single state file.
//!
//! Every durable mutation funnels through [`with_locked_file`]: take an
//! exclusive OS advisory lock on the file descriptor, read the current
//! content, apply the caller's mutation, rewrite, fsync, release. Holding
//! the lock for the full read-mutate-write cycle is what makes reservations
//! and token consumption linearizable across processes.
//!
//! Platform note: `fs2` maps to `flock` on Unix and `LockFileEx` on
//! Windows, so cross-process exclusion holds on both families. On exotic
//! filesystems without advisory locking the lock call itself fails and the
//! mutation is refused: the guarantee degrades to "no silent corruption",
//! never to unlocked writes.

use std::fs::OpenOptions;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

use fs2::FileExt;

use domainclaw_core::error::{AppError, ErrorKind, Result};

/// Run `mutate` over the file's content while holding an exclusive lock.
///
/// `mutate` receives the current content (empty string for a fresh file) and
/// returns the replacement content plus a value handed back to the caller.
/// The file is created mode 0600 if absent.
pub fn with_locked_file<T>(
    path: &Path,
    mutate: impl FnOnce(&str) -> Result<(String, T)>,
) -> Result<T> {
    let mut options = OpenOptions::new();
    options.create(true).read(true).write(true).truncate(false);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    let mut file = options.open(path).map_err(|e| {
        AppError::wrap(
            ErrorKind::Internal,
            format!("failed opening {}", path.display()),
            e,
        )
    })?;

    file.lock_exclusive().map_err(|e| {
        AppError::wrap(
            ErrorKind::Internal,
            format!("failed locking {}", path.display()),
            e,
        )
    })?;
    let outcome = locked_cycle(&mut file, mutate);
    let _ = FileExt::unlock(&file);
    outcome
}

fn locked_cycle<T>(
    file: &mut std::fs::File,
    mutate: impl FnOnce(&str) -> Result<(String, T)>,
) -> Result<T> {
    file.seek(SeekFrom::Start(0))?;
    let mut current = String::new();
    file.read_to_string(&mut current)?;

    let (next, out) = mutate(&current)?;

    file.set_len(0)?;
    file.seek(SeekFrom::Start(0))?;
    file.write_all(next.as_bytes())?;
    file.sync_all()?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_file_presents_empty_content() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("state.json");
        let seen = with_locked_file(&path, |current| {
            Ok((String::from("hello"), current.to_string()))
        })
        .unwrap();
        assert_eq!(seen, "");
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "hello");
    }

    #[test]
    fn rewrite_replaces_rather_than_appends() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("state.json");
        with_locked_file(&path, |_| Ok(("a longer first body".to_string(), ()))).unwrap();
        with_locked_file(&path, |_| Ok(("short".to_string(), ()))).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "short");
    }

    #[test]
    fn mutation_error_leaves_content_untouched() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("state.json");
        with_locked_file(&path, |_| Ok(("original".to_string(), ()))).unwrap();
        let outcome: Result<()> =
            with_locked_file(&path, |_| Err(AppError::budget("cap exceeded")));
        assert!(outcome.is_err());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "original");
    }

    #[cfg(unix)]
    #[test]
    fn created_file_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("state.json");
        with_locked_file(&path, |_| Ok((String::new(), ()))).unwrap();
        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn concurrent_mutations_serialize() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("counter.txt");
        let mut handles = Vec::new();
        for _ in 0..8 {
            let path = path.clone();
            handles.push(std::thread::spawn(move || {
                for _ in 0..25 {
                    with_locked_file(&path, |current| {
                        let n: u64 = current.trim().parse().unwrap_or(0);
                        Ok(((n + 1).to_string(), ()))
                    })
                    .unwrap();
                }
            }));
        }
        for h in handles {
            h.join().unwrap();
        }
        let total: u64 = std::fs::read_to_string(&path).unwrap().trim().parse().unwrap();
        assert_eq!(total, 200);
    }
}
