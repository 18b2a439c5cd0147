use crate::{
    FlowKind, FragmentContent, PlotMarkup, ReloadReason, SelectedFile, TimerId, UploadedTable,
};

#[derive(Debug, Clone, PartialEq)]
pub enum Msg {
    /// User picked files for a flow. The acti flow keeps only the first.
    FilesAdded { flow: FlowKind, files: Vec<SelectedFile> },
    /// User dropped one entry from a flow's pending selection.
    FileRemoved { flow: FlowKind, index: usize },
    /// User emptied a flow's pending selection.
    SelectionCleared { flow: FlowKind },
    /// User submitted a flow's upload form.
    SubmitClicked { flow: FlowKind },
    /// Upload request completed.
    UploadFinished {
        flow: FlowKind,
        result: Result<UploadedTable, String>,
    },
    /// A scheduled poll tick elapsed.
    TimerFired { flow: FlowKind, timer: TimerId },
    /// A page fragment was re-fetched.
    FragmentLoaded {
        flow: FlowKind,
        reason: ReloadReason,
        result: Result<FragmentContent, String>,
    },
    /// User asked for the plots.
    PlotClicked,
    PlotLoaded(Result<PlotMarkup, String>),
    /// User asked the server to drop all stored results.
    ClearClicked,
    ClearFinished(Result<(), String>),
    /// Fallback for placeholder wiring.
    NoOp,
}
