use std::path::PathBuf;

/// A local file chosen for upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectedFile {
    pub path: PathBuf,
    pub name: String,
    pub size_bytes: u64,
}

impl SelectedFile {
    pub fn new(path: impl Into<PathBuf>, size_bytes: u64) -> Self {
        let path = path.into();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.to_string_lossy().into_owned());
        Self {
            path,
            name,
            size_bytes,
        }
    }

    /// Size rounded to whole kilobytes, e.g. `(12kb)`.
    pub fn size_label(&self) -> String {
        let kb = (self.size_bytes as f64 / 1024.0).round() as u64;
        format!("({kb}kb)")
    }
}

/// Ordered, owned list of files pending submission.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FileSelection {
    files: Vec<SelectedFile>,
}

impl FileSelection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends files in order, repeats included. Returns how many were added.
    pub fn add(&mut self, files: impl IntoIterator<Item = SelectedFile>) -> usize {
        let before = self.files.len();
        self.files.extend(files);
        self.files.len() - before
    }

    /// Replaces the selection with at most one file.
    pub fn replace_with(&mut self, file: Option<SelectedFile>) {
        self.files.clear();
        self.files.extend(file);
    }

    pub fn remove(&mut self, index: usize) -> Option<SelectedFile> {
        if index < self.files.len() {
            Some(self.files.remove(index))
        } else {
            None
        }
    }

    pub fn clear(&mut self) {
        self.files.clear();
    }

    pub fn files(&self) -> &[SelectedFile] {
        &self.files
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn total_bytes(&self) -> u64 {
        self.files.iter().map(|f| f.size_bytes).sum()
    }
}
