use std::fs::{File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::error::{ReceiverError, Result};

/// Append-only file holding the raw link byte stream.
///
/// Created under the first free name `{prefix}{n}.log` so an earlier session's
/// log is never overwritten.
#[derive(Debug)]
pub struct RawLog {
    file: File,
    path: PathBuf,
    bytes_written: u64,
}

impl RawLog {
    /// Create the log in `dir`, trying `{prefix}0.log`, `{prefix}1.log`, ...
    /// up to `max_attempts` names.
    pub fn create(dir: impl AsRef<Path>, prefix: &str, max_attempts: u32) -> Result<Self> {
        let dir = dir.as_ref();
        for n in 0..max_attempts {
            let path = dir.join(format!("{prefix}{n}.log"));
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(file) => {
                    info!(path = %path.display(), "raw log created");
                    return Ok(Self {
                        file,
                        path,
                        bytes_written: 0,
                    });
                }
                Err(err) if err.kind() == ErrorKind::AlreadyExists => {
                    debug!(path = %path.display(), "raw log name taken");
                }
                Err(source) => return Err(ReceiverError::LogCreate { path, source }),
            }
        }
        Err(ReceiverError::LogNamesExhausted {
            dir: dir.to_path_buf(),
            attempts: max_attempts,
        })
    }

    /// Append `bytes` and flush them to the file.
    pub fn append(&mut self, bytes: &[u8]) -> std::io::Result<()> {
        if bytes.is_empty() {
            return Ok(());
        }
        self.file.write_all(bytes)?;
        self.file.flush()?;
        self.bytes_written += bytes.len() as u64;
        Ok(())
    }

    /// Flush and close the file.
    pub fn close(mut self) -> std::io::Result<()> {
        self.file.flush()?;
        self.file.sync_all()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_dir(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "serialpose-rawlog-{}-{}",
            tag,
            std::process::id()
        ));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).expect("temp dir should be creatable");
        dir
    }

    #[test]
    fn first_free_name_is_used() {
        let dir = temp_dir("probe");
        std::fs::write(dir.join("pose0.log"), b"old session").unwrap();
        std::fs::write(dir.join("pose1.log"), b"older session").unwrap();

        let log = RawLog::create(&dir, "pose", 1000).expect("log should be created");
        assert_eq!(log.path(), dir.join("pose2.log"));
        assert_eq!(std::fs::read(dir.join("pose0.log")).unwrap(), b"old session");

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn exhausted_names_fail_loudly() {
        let dir = temp_dir("exhausted");
        for n in 0..3 {
            std::fs::write(dir.join(format!("raw{n}.log")), b"").unwrap();
        }

        let err = RawLog::create(&dir, "raw", 3).unwrap_err();
        assert!(matches!(
            err,
            ReceiverError::LogNamesExhausted { attempts: 3, .. }
        ));

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn missing_directory_is_not_retried() {
        let dir = temp_dir("missing").join("does-not-exist");
        let err = RawLog::create(&dir, "pose", 1000).unwrap_err();
        assert!(matches!(err, ReceiverError::LogCreate { .. }));
    }

    #[test]
    fn appends_in_order() {
        let dir = temp_dir("append");
        let mut log = RawLog::create(&dir, "pose", 10).unwrap();

        log.append(b"\x03\xaa\xbb").unwrap();
        log.append(b"").unwrap();
        log.append(b"\x01\x00").unwrap();
        assert_eq!(log.bytes_written(), 5);

        let path = log.path().to_path_buf();
        log.close().unwrap();
        assert_eq!(std::fs::read(path).unwrap(), b"\x03\xaa\xbb\x01\x00");

        let _ = std::fs::remove_dir_all(&dir);
    }
}
