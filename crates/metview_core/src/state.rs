use crate::view_model::{AppViewModel, FlowView, SelectionRowView};
use crate::{
    FileSelection, FlowKind, FlowPhase, FragmentContent, MetRow, PlotMarkup, PollSettings,
    SelectedFile, TimerId,
};

/// Per-flow state. Each flow owns its poll timer handle.
#[derive(Debug, Clone, PartialEq)]
pub struct FlowState {
    kind: FlowKind,
    phase: FlowPhase,
    timer: Option<TimerId>,
    upload_pending: bool,
    loader_visible: bool,
    selection: FileSelection,
    source_filename: Option<String>,
    rows: Vec<MetRow>,
    fragment_rows: Option<usize>,
    fragment_html: Option<String>,
}

impl FlowState {
    fn new(kind: FlowKind) -> Self {
        Self {
            kind,
            phase: FlowPhase::Idle,
            timer: None,
            upload_pending: false,
            loader_visible: false,
            selection: FileSelection::new(),
            source_filename: None,
            rows: Vec::new(),
            fragment_rows: None,
            fragment_html: None,
        }
    }

    pub fn kind(&self) -> FlowKind {
        self.kind
    }

    pub fn phase(&self) -> &FlowPhase {
        &self.phase
    }

    pub fn timer(&self) -> Option<TimerId> {
        self.timer
    }

    /// True between submit and the upload response, whatever the phase.
    pub fn upload_pending(&self) -> bool {
        self.upload_pending
    }

    pub fn loader_visible(&self) -> bool {
        self.loader_visible
    }

    pub fn selection(&self) -> &FileSelection {
        &self.selection
    }

    pub fn rows(&self) -> &[MetRow] {
        &self.rows
    }

    pub fn fragment_rows(&self) -> Option<usize> {
        self.fragment_rows
    }

    pub fn fragment_html(&self) -> Option<&str> {
        self.fragment_html.as_deref()
    }

    /// Files an upload of this flow would send, in order.
    pub fn files_to_submit(&self) -> Vec<SelectedFile> {
        let files = self.selection.files();
        if self.kind.accepts_multiple() {
            files.to_vec()
        } else {
            files.iter().take(1).cloned().collect()
        }
    }

    pub(crate) fn set_phase(&mut self, phase: FlowPhase) {
        self.phase = phase;
    }

    pub(crate) fn set_timer(&mut self, timer: Option<TimerId>) {
        self.timer = timer;
    }

    pub(crate) fn take_timer(&mut self) -> Option<TimerId> {
        self.timer.take()
    }

    pub(crate) fn set_upload_pending(&mut self, pending: bool) {
        self.upload_pending = pending;
    }

    pub(crate) fn set_loader(&mut self, visible: bool) {
        self.loader_visible = visible;
    }

    pub(crate) fn selection_mut(&mut self) -> &mut FileSelection {
        &mut self.selection
    }

    pub(crate) fn append_rows(&mut self, source_filename: Option<String>, rows: Vec<MetRow>) {
        if source_filename.is_some() {
            self.source_filename = source_filename;
        }
        self.rows.extend(rows);
    }

    pub(crate) fn clear_results(&mut self) {
        self.rows.clear();
        self.source_filename = None;
        self.fragment_rows = None;
        self.fragment_html = None;
    }

    pub(crate) fn set_fragment(&mut self, fragment: FragmentContent) {
        self.fragment_rows = Some(fragment.table_rows);
        self.fragment_html = fragment.html;
    }

    fn view(&self) -> FlowView {
        FlowView {
            flow: self.kind,
            phase: self.phase.clone(),
            loader_visible: self.loader_visible,
            source_filename: self.source_filename.clone(),
            rows: self.rows.clone(),
            fragment_rows: self.fragment_rows,
            fragment_html: self.fragment_html.clone(),
            selection: self
                .selection
                .files()
                .iter()
                .map(|f| SelectionRowView {
                    name: f.name.clone(),
                    size_label: f.size_label(),
                })
                .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AppState {
    settings: PollSettings,
    acti: FlowState,
    wrist: FlowState,
    next_timer: TimerId,
    plots: Option<PlotMarkup>,
    plot_pending: bool,
    clear_pending: bool,
    refreshes_pending: usize,
    last_error: Option<String>,
    dirty: bool,
}

impl Default for AppState {
    fn default() -> Self {
        Self::with_settings(PollSettings::default())
    }
}

impl AppState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_settings(settings: PollSettings) -> Self {
        Self {
            settings,
            acti: FlowState::new(FlowKind::Acti),
            wrist: FlowState::new(FlowKind::Wrist),
            next_timer: 1,
            plots: None,
            plot_pending: false,
            clear_pending: false,
            refreshes_pending: 0,
            last_error: None,
            dirty: false,
        }
    }

    pub fn settings(&self) -> &PollSettings {
        &self.settings
    }

    pub fn flow(&self, kind: FlowKind) -> &FlowState {
        match kind {
            FlowKind::Acti => &self.acti,
            FlowKind::Wrist => &self.wrist,
        }
    }

    pub(crate) fn flow_mut(&mut self, kind: FlowKind) -> &mut FlowState {
        match kind {
            FlowKind::Acti => &mut self.acti,
            FlowKind::Wrist => &mut self.wrist,
        }
    }

    pub fn plots(&self) -> Option<&PlotMarkup> {
        self.plots.as_ref()
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// True once no flow is waiting, no upload response is outstanding and no
    /// plot, clear or refresh request is in flight.
    pub fn is_settled(&self) -> bool {
        [&self.acti, &self.wrist]
            .iter()
            .all(|flow| !flow.phase.is_busy() && !flow.upload_pending)
            && !self.plot_pending
            && !self.clear_pending
            && self.refreshes_pending == 0
    }

    pub fn view(&self) -> AppViewModel {
        AppViewModel {
            flows: FlowKind::ALL.iter().map(|k| self.flow(*k).view()).collect(),
            plots: self.plots.clone(),
            last_error: self.last_error.clone(),
            busy: !self.is_settled(),
            dirty: self.dirty,
        }
    }

    pub fn consume_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }

    pub(crate) fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    pub(crate) fn allocate_timer(&mut self) -> TimerId {
        let id = self.next_timer;
        self.next_timer += 1;
        id
    }

    pub(crate) fn set_error(&mut self, message: impl Into<String>) {
        self.last_error = Some(message.into());
    }

    pub(crate) fn set_plot_pending(&mut self, pending: bool) {
        self.plot_pending = pending;
    }

    pub(crate) fn set_plots(&mut self, plots: PlotMarkup) {
        self.plots = Some(plots);
    }

    pub(crate) fn set_clear_pending(&mut self, pending: bool) {
        self.clear_pending = pending;
    }

    pub(crate) fn add_refreshes(&mut self, count: usize) {
        self.refreshes_pending += count;
    }

    pub(crate) fn finish_refresh(&mut self) {
        self.refreshes_pending = self.refreshes_pending.saturating_sub(1);
    }
}
