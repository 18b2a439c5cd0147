//! Metview engine: HTTP client, payload construction and effect execution.
mod api;
mod decode;
mod engine;
mod export;
mod fragment;
mod payload;
mod persist;
mod response;
mod timers;
mod types;

pub use api::{ApiSettings, MetApi, ReqwestApi};
pub use decode::{decode_page, DecodeError, DecodedPage};
pub use engine::{EngineHandle, EngineStopped};
pub use export::{export_fragment, export_plots, export_series, ExportSummary};
pub use fragment::{count_table_rows, extract_fragment, render_rows};
pub use payload::{PayloadPart, UploadPayload, UploadTarget};
pub use persist::{ensure_output_dir, AtomicFileWriter, PersistError};
pub use response::{parse_met_series, parse_plot_response};
pub use timers::TimerRegistry;
pub use types::{
    ApiError, EngineEvent, FailureKind, FragmentSnapshot, JobId, MetSample, MetSeries,
    PlotResponse, TimerId,
};
