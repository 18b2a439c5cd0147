//! Metview core: pure upload/poll state machine and view-model helpers.
mod effect;
mod flow;
mod msg;
mod poll;
mod results;
mod selection;
mod state;
mod update;
mod view_model;

pub use effect::{Effect, ReloadReason};
pub use flow::{FlowFailure, FlowKind, FlowPhase, TimerId};
pub use msg::Msg;
pub use poll::{is_table_ready, PollPolicy, PollSettings, ReadinessSource};
pub use results::{FragmentContent, MetRow, PlotMarkup, UploadedTable};
pub use selection::{FileSelection, SelectedFile};
pub use state::{AppState, FlowState};
pub use update::update;
pub use view_model::{AppViewModel, FlowView, SelectionRowView};
