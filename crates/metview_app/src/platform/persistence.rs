use std::fs;
use std::path::{Path, PathBuf};

use metview_core::SelectedFile;
use metview_engine::AtomicFileWriter;
use metview_logging::{met_info, met_warn};
use serde::{Deserialize, Serialize};

const SELECTION_FILENAME: &str = ".metview_selection.ron";

#[derive(Debug, Clone, Serialize, Deserialize)]
struct PersistedFile {
    path: PathBuf,
    size_bytes: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct PersistedSelection {
    wrist: Vec<PersistedFile>,
}

/// Reads the pending wrist selection. A missing or unreadable file yields an
/// empty selection.
pub(crate) fn load_selection(state_dir: &Path) -> Vec<SelectedFile> {
    let path = state_dir.join(SELECTION_FILENAME);
    let content = match fs::read_to_string(&path) {
        Ok(text) => text,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            return Vec::new();
        }
        Err(err) => {
            met_warn!("Failed to read pending selection from {:?}: {}", path, err);
            return Vec::new();
        }
    };

    let state: PersistedSelection = match ron::from_str(&content) {
        Ok(state) => state,
        Err(err) => {
            met_warn!("Failed to parse pending selection from {:?}: {}", path, err);
            return Vec::new();
        }
    };

    state
        .wrist
        .into_iter()
        .map(|file| SelectedFile::new(file.path, file.size_bytes))
        .collect()
}

pub(crate) fn save_selection(state_dir: &Path, files: &[SelectedFile]) -> anyhow::Result<()> {
    let state = PersistedSelection {
        wrist: files
            .iter()
            .map(|file| PersistedFile {
                path: file.path.clone(),
                size_bytes: file.size_bytes,
            })
            .collect(),
    };

    let pretty = ron::ser::PrettyConfig::new();
    let content = ron::ser::to_string_pretty(&state, pretty)?;
    let writer = AtomicFileWriter::new(state_dir.to_path_buf());
    writer.write(SELECTION_FILENAME, &content)?;
    met_info!("Saved {} pending file(s) to {:?}", files.len(), state_dir);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn selection_survives_a_round_trip_in_order() {
        let temp = TempDir::new().unwrap();
        let files = vec![
            SelectedFile::new("/data/gyro.csv", 2048),
            SelectedFile::new("/data/accel.csv", 10),
        ];
        save_selection(temp.path(), &files).unwrap();
        assert_eq!(load_selection(temp.path()), files);
    }

    #[test]
    fn missing_or_corrupt_state_is_empty() {
        let temp = TempDir::new().unwrap();
        assert!(load_selection(temp.path()).is_empty());

        fs::write(temp.path().join(SELECTION_FILENAME), "not ron (").unwrap();
        assert!(load_selection(temp.path()).is_empty());
    }
}
