use crate::{FlowKind, FlowPhase, MetRow, PlotMarkup};

#[derive(Debug, Clone, PartialEq, Default)]
pub struct AppViewModel {
    pub flows: Vec<FlowView>,
    pub plots: Option<PlotMarkup>,
    pub last_error: Option<String>,
    pub busy: bool,
    pub dirty: bool,
}

impl AppViewModel {
    pub fn flow(&self, kind: FlowKind) -> Option<&FlowView> {
        self.flows.iter().find(|f| f.flow == kind)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FlowView {
    pub flow: FlowKind,
    pub phase: FlowPhase,
    pub loader_visible: bool,
    pub source_filename: Option<String>,
    pub rows: Vec<MetRow>,
    /// Row count of the last fetched fragment table, header included.
    pub fragment_rows: Option<usize>,
    /// Markup of the last fetched fragment.
    pub fragment_html: Option<String>,
    pub selection: Vec<SelectionRowView>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionRowView {
    pub name: String,
    pub size_label: String,
}
