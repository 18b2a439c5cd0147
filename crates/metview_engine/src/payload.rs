use std::path::{Path, PathBuf};

use reqwest::multipart::{Form, Part};

use crate::{ApiError, FailureKind};

/// Where an upload goes and how its response is read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadTarget {
    /// Endpoint path, e.g. `/actifile/`.
    pub path: String,
    /// Multipart field every file is sent under.
    pub field: String,
    /// Response column holding the MET estimates.
    pub met_column: String,
}

impl UploadTarget {
    pub fn new(
        path: impl Into<String>,
        field: impl Into<String>,
        met_column: impl Into<String>,
    ) -> Self {
        Self {
            path: path.into(),
            field: field.into(),
            met_column: met_column.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PayloadPart {
    pub field: String,
    pub file_name: String,
    pub bytes: Vec<u8>,
}

impl PayloadPart {
    fn mime(&self) -> &'static str {
        let lower = self.file_name.to_ascii_lowercase();
        if lower.ends_with(".csv") {
            "text/csv"
        } else {
            "application/octet-stream"
        }
    }
}

/// In-memory multipart body: one part per file, in selection order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct UploadPayload {
    parts: Vec<PayloadPart>,
}

impl UploadPayload {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, field: &str, file_name: impl Into<String>, bytes: Vec<u8>) {
        self.parts.push(PayloadPart {
            field: field.to_string(),
            file_name: file_name.into(),
            bytes,
        });
    }

    /// Reads every file and adds it under `field`.
    pub async fn from_files(field: &str, files: &[PathBuf]) -> Result<Self, ApiError> {
        let mut payload = Self::new();
        for path in files {
            let bytes = tokio::fs::read(path).await.map_err(|err| {
                ApiError::new(FailureKind::Io, format!("{}: {err}", path.display()))
            })?;
            payload.push(field, file_name_of(path), bytes);
        }
        Ok(payload)
    }

    pub fn parts(&self) -> &[PayloadPart] {
        &self.parts
    }

    /// Parts sent under `field`, in order.
    pub fn entries<'a>(&'a self, field: &'a str) -> impl Iterator<Item = &'a PayloadPart> + 'a {
        self.parts.iter().filter(move |p| p.field == field)
    }

    pub fn total_bytes(&self) -> u64 {
        self.parts.iter().map(|p| p.bytes.len() as u64).sum()
    }

    pub fn into_form(self) -> Result<Form, ApiError> {
        let mut form = Form::new();
        for part in self.parts {
            let mime = part.mime();
            let body = Part::bytes(part.bytes)
                .file_name(part.file_name)
                .mime_str(mime)
                .map_err(|err| ApiError::new(FailureKind::Network, err.to_string()))?;
            form = form.part(part.field, body);
        }
        Ok(form)
    }
}

fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "upload".to_string())
}

#[cfg(test)]
mod tests {
    use super::UploadPayload;

    #[test]
    fn entries_filter_by_field_in_order() {
        let mut payload = UploadPayload::new();
        payload.push("files", "gyro.csv", b"g".to_vec());
        payload.push("other", "x.bin", Vec::new());
        payload.push("files", "accel.csv", b"aa".to_vec());

        let names: Vec<_> = payload.entries("files").map(|p| p.file_name.as_str()).collect();
        assert_eq!(names, vec!["gyro.csv", "accel.csv"]);
        assert_eq!(payload.total_bytes(), 3);
        assert_eq!(payload.parts()[1].mime(), "application/octet-stream");
        assert_eq!(payload.parts()[0].mime(), "text/csv");
    }
}
