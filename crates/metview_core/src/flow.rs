use std::fmt;

/// Identifier of a scheduled poll tick. Allocated per state, never reused.
pub type TimerId = u64;

/// The two upload flows and the wire/markup contract each one binds to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FlowKind {
    /// Single ActiGraph CSV export.
    Acti,
    /// One or more wrist-worn sensor CSV files.
    Wrist,
}

impl FlowKind {
    pub const ALL: [FlowKind; 2] = [FlowKind::Acti, FlowKind::Wrist];

    pub fn endpoint(self) -> &'static str {
        match self {
            FlowKind::Acti => "/actifile/",
            FlowKind::Wrist => "/wristfiles/",
        }
    }

    /// Multipart field name each file is sent under.
    pub fn field_name(self) -> &'static str {
        match self {
            FlowKind::Acti => "file",
            FlowKind::Wrist => "files",
        }
    }

    /// Key of the MET estimate column in the upload response.
    pub fn met_column(self) -> &'static str {
        match self {
            FlowKind::Acti => "ActiGraph VM3 Estimation (MET)",
            FlowKind::Wrist => "Wrist Estimation (MET)",
        }
    }

    pub fn table_id(self) -> &'static str {
        match self {
            FlowKind::Acti => "acti_met_table",
            FlowKind::Wrist => "wrist_met_table",
        }
    }

    pub fn fragment_id(self) -> &'static str {
        match self {
            FlowKind::Acti => "acti-div",
            FlowKind::Wrist => "wrist-div",
        }
    }

    pub fn files_list_id(self) -> &'static str {
        match self {
            FlowKind::Acti => "acti-files",
            FlowKind::Wrist => "wrist-files",
        }
    }

    /// Whether the flow submits its whole accumulated selection.
    pub fn accepts_multiple(self) -> bool {
        matches!(self, FlowKind::Wrist)
    }

    pub fn label(self) -> &'static str {
        match self {
            FlowKind::Acti => "acti",
            FlowKind::Wrist => "wrist",
        }
    }
}

impl fmt::Display for FlowKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum FlowPhase {
    #[default]
    Idle,
    /// Upload in flight, no poll timer running.
    Submitted,
    /// Waiting for the server-rendered table to fill in.
    Polling { attempt: u32 },
    Complete,
    Failed(FlowFailure),
}

impl FlowPhase {
    /// True while the flow is waiting on the server.
    pub fn is_busy(&self) -> bool {
        matches!(self, FlowPhase::Submitted | FlowPhase::Polling { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlowFailure {
    /// Submit pressed with nothing selected.
    NoFiles,
    /// The upload request itself failed.
    Upload { reason: String },
    /// The results table never filled in within the attempt budget.
    PollExhausted { attempts: u32 },
}

impl fmt::Display for FlowFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FlowFailure::NoFiles => write!(f, "no files selected"),
            FlowFailure::Upload { reason } => write!(f, "upload failed: {reason}"),
            FlowFailure::PollExhausted { attempts } => {
                write!(f, "results not ready after {attempts} attempts")
            }
        }
    }
}
