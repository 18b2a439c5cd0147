use std::fmt;

pub type JobId = u64;
pub type TimerId = u64;

#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    UploadCompleted {
        job_id: JobId,
        result: Result<MetSeries, ApiError>,
    },
    FragmentFetched {
        job_id: JobId,
        result: Result<FragmentSnapshot, ApiError>,
    },
    PlotCompleted {
        job_id: JobId,
        result: Result<PlotResponse, ApiError>,
    },
    ClearCompleted {
        job_id: JobId,
        result: Result<(), ApiError>,
    },
    TimerFired { timer_id: TimerId },
}

/// One timestamp/estimate pair from an upload response.
#[derive(Debug, Clone, PartialEq)]
pub struct MetSample {
    pub time: String,
    pub met: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct MetSeries {
    pub source_filename: Option<String>,
    pub samples: Vec<MetSample>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, serde::Deserialize)]
pub struct PlotResponse {
    pub plot1: String,
    pub plot2: String,
}

/// What a fragment reload found on the page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FragmentSnapshot {
    /// Outer HTML of the fragment element, when present on the page.
    pub html: Option<String>,
    /// `<tr>` count of the results table inside the page, header included.
    pub table_rows: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    pub kind: FailureKind,
    pub message: String,
}

impl ApiError {
    pub(crate) fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.message.is_empty() {
            write!(f, "{}", self.kind)
        } else {
            write!(f, "{}: {}", self.kind, self.message)
        }
    }
}

impl std::error::Error for ApiError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureKind {
    InvalidUrl,
    HttpStatus(u16),
    Timeout,
    TooLarge { max_bytes: u64, actual: Option<u64> },
    UnsupportedContentType { content_type: String },
    Decode,
    ResponseShape,
    Io,
    Network,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::InvalidUrl => write!(f, "invalid url"),
            FailureKind::HttpStatus(code) => write!(f, "http status {code}"),
            FailureKind::Timeout => write!(f, "timeout"),
            FailureKind::TooLarge { max_bytes, actual } => {
                write!(f, "response too large (max {max_bytes}, actual {actual:?})")
            }
            FailureKind::UnsupportedContentType { content_type } => {
                write!(f, "unsupported content type {content_type}")
            }
            FailureKind::Decode => write!(f, "decode error"),
            FailureKind::ResponseShape => write!(f, "unexpected response shape"),
            FailureKind::Io => write!(f, "io error"),
            FailureKind::Network => write!(f, "network error"),
        }
    }
}
