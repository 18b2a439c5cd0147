use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("cannot use {path:?} as output directory: {reason}")]
    OutputDir { path: PathBuf, reason: String },
    #[error("cannot write {path:?}: {source}")]
    Write { path: PathBuf, source: io::Error },
}

/// Creates `dir` (and parents) unless it already exists as a directory.
pub fn ensure_output_dir(dir: &Path) -> Result<(), PersistError> {
    let refuse = |reason: String| PersistError::OutputDir {
        path: dir.to_path_buf(),
        reason,
    };
    match fs::metadata(dir) {
        Ok(meta) if meta.is_dir() => Ok(()),
        Ok(_) => Err(refuse("not a directory".to_string())),
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            fs::create_dir_all(dir).map_err(|err| refuse(err.to_string()))
        }
        Err(err) => Err(refuse(err.to_string())),
    }
}

/// Result and state files under one output directory, each replaced through
/// a sibling temp file so a reader sees either the old or the new content.
#[derive(Debug, Clone)]
pub struct AtomicFileWriter {
    dir: PathBuf,
}

impl AtomicFileWriter {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    pub fn write(&self, filename: &str, content: &str) -> Result<PathBuf, PersistError> {
        ensure_output_dir(&self.dir)?;
        let target = self.dir.join(filename);
        let failed = |source: io::Error| PersistError::Write {
            path: target.clone(),
            source,
        };

        let mut staged = NamedTempFile::new_in(&self.dir).map_err(failed)?;
        staged.write_all(content.as_bytes()).map_err(failed)?;
        staged.as_file_mut().sync_all().map_err(failed)?;

        // Rename onto an existing file is not an overwrite everywhere.
        match fs::remove_file(&target) {
            Ok(()) => {}
            Err(err) if err.kind() == io::ErrorKind::NotFound => {}
            Err(err) => return Err(failed(err)),
        }
        staged.persist(&target).map_err(|err| failed(err.error))?;
        Ok(target)
    }
}
