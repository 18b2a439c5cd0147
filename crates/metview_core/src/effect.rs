use std::time::Duration;

use crate::{FlowKind, SelectedFile, TimerId};

/// Why a page fragment is being re-fetched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReloadReason {
    /// Readiness check for a flow that is polling.
    Poll,
    /// Plain refresh of the displayed fragment (after a clear).
    Refresh,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    Upload { flow: FlowKind, files: Vec<SelectedFile> },
    ShowLoader { flow: FlowKind },
    HideLoader { flow: FlowKind },
    ScheduleTick { flow: FlowKind, timer: TimerId, delay: Duration },
    CancelTimer { flow: FlowKind, timer: TimerId },
    ReloadFragment { flow: FlowKind, reason: ReloadReason },
    RequestPlot,
    RequestClear,
}
