use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use chrono::Utc;
use log::LevelFilter;
use metview_core::{update, AppState, FlowKind, FlowPhase, Msg, PollSettings, SelectedFile};
use metview_engine::{
    export_fragment, export_plots, export_series, AtomicFileWriter, EngineHandle, MetSample,
    PlotResponse,
};
use metview_logging::{level_with_verbosity, met_info};
use serde_json::json;

use super::cli::{Cli, Command, ReadinessArg, SelectCommand, UploadCommand};
use super::config::{AppConfig, ReadinessMode};
use super::effects::EffectRunner;
use super::logging::{self, LogDestination};
use super::persistence::{load_selection, save_selection};
use super::render::{self, Renderer};

const EVENT_WAIT: Duration = Duration::from_millis(100);
const RUN_SUMMARY_FILENAME: &str = "run.json";

pub fn run_app(cli: Cli) -> Result<ExitCode> {
    let mut config = AppConfig::load(cli.config.as_deref())?;
    if let Some(server) = &cli.server {
        config.server.base_url = server.clone();
    }
    if let Some(dir) = &cli.output {
        config.output.dir = dir.clone();
    }
    if let Some(readiness) = cli.readiness {
        config.poll.readiness = match readiness {
            ReadinessArg::Fragment => ReadinessMode::Fragment,
            ReadinessArg::Response => ReadinessMode::Response,
        };
    }
    config.validate()?;

    let base_level = config.logging_level().unwrap_or(LevelFilter::Info);
    let destination = if config.logging.file {
        LogDestination::Both
    } else {
        LogDestination::Terminal
    };
    logging::initialize(destination, level_with_verbosity(base_level, cli.verbosity()));

    match cli.command {
        Command::Select(command) => run_select(command, &config.output.dir),
        Command::Upload(command) => run_upload(command, &config),
        Command::Plot => run_plot(&config),
        Command::Clear => run_clear(&config),
    }
}

/// One interactive run: core state plus the engine executing its effects.
pub(crate) struct Session {
    state: AppState,
    runner: EffectRunner,
    renderer: Renderer,
    settle_budget: Duration,
}

impl Session {
    pub(crate) fn new(
        settings: PollSettings,
        engine: EngineHandle,
        request_timeout: Duration,
    ) -> Self {
        Self {
            settle_budget: settle_budget(&settings, request_timeout),
            state: AppState::with_settings(settings),
            runner: EffectRunner::new(engine),
            renderer: Renderer::new(),
        }
    }

    pub(crate) fn from_config(config: &AppConfig) -> Result<Self> {
        let api = config.api_settings();
        let request_timeout = api.request_timeout;
        let engine = EngineHandle::new(api).context("starting the network runtime")?;
        Ok(Self::new(config.poll_settings(), engine, request_timeout))
    }

    pub(crate) fn state(&self) -> &AppState {
        &self.state
    }

    pub(crate) fn dispatch(&mut self, msg: Msg) {
        let state = std::mem::take(&mut self.state);
        let (state, effects) = update(state, msg);
        self.state = state;
        if self.state.consume_dirty() {
            self.renderer.progress(&self.state.view());
        }
        self.runner.enqueue(effects);
    }

    /// Pumps engine events until every flow and request has finished, or
    /// until the worst case of the poll budget has passed.
    pub(crate) fn run_until_settled(&mut self) -> Result<()> {
        let deadline = Instant::now() + self.settle_budget;
        while !self.state.is_settled() {
            let Some(left) = deadline.checked_duration_since(Instant::now()) else {
                anyhow::bail!("no answer from the server within {:?}", self.settle_budget);
            };
            if let Some(msg) = self.runner.next_msg(EVENT_WAIT.min(left))? {
                self.dispatch(msg);
            }
        }
        Ok(())
    }
}

/// Longest a session may legitimately wait: every poll delay of the slowest
/// flow, a request timeout per poll, and one more for the upload itself.
fn settle_budget(settings: &PollSettings, request_timeout: Duration) -> Duration {
    [&settings.acti, &settings.wrist]
        .into_iter()
        .map(|policy| {
            (0..policy.max_attempts.max(1))
                .map(|attempt| policy.delay_for(attempt) + request_timeout)
                .sum::<Duration>()
        })
        .max()
        .unwrap_or_default()
        + request_timeout
}

fn run_select(command: SelectCommand, state_dir: &Path) -> Result<ExitCode> {
    let flow = FlowKind::Wrist;
    let mut state = AppState::new();
    state = update(
        state,
        Msg::FilesAdded {
            flow,
            files: load_selection(state_dir),
        },
    )
    .0;

    let changed = match command {
        SelectCommand::Add { files } => {
            let files = selected_files(&files)?;
            state = update(state, Msg::FilesAdded { flow, files }).0;
            true
        }
        SelectCommand::Remove { position } => {
            let len = state.flow(flow).selection().len();
            if position == 0 || position > len {
                anyhow::bail!("no file at position {position} (selection has {len})");
            }
            state = update(
                state,
                Msg::FileRemoved {
                    flow,
                    index: position - 1,
                },
            )
            .0;
            true
        }
        SelectCommand::Clear => {
            state = update(state, Msg::SelectionCleared { flow }).0;
            true
        }
        SelectCommand::List => false,
    };

    if changed {
        save_selection(state_dir, state.flow(flow).selection().files())?;
    }
    let view = state.view();
    if let Some(flow_view) = view.flow(flow) {
        render::print_selection(&mut io::stdout().lock(), flow_view)?;
    }
    Ok(ExitCode::SUCCESS)
}

fn run_upload(command: UploadCommand, config: &AppConfig) -> Result<ExitCode> {
    let state_dir = &config.output.dir;
    let mut session = Session::from_config(config)?;

    let flow = match command {
        UploadCommand::Acti { file } => {
            let files = selected_files(&[file])?;
            session.dispatch(Msg::FilesAdded {
                flow: FlowKind::Acti,
                files,
            });
            FlowKind::Acti
        }
        UploadCommand::Wrist { files } => {
            session.dispatch(Msg::FilesAdded {
                flow: FlowKind::Wrist,
                files: load_selection(state_dir),
            });
            if !files.is_empty() {
                session.dispatch(Msg::FilesAdded {
                    flow: FlowKind::Wrist,
                    files: selected_files(&files)?,
                });
                save_selection(
                    state_dir,
                    session.state().flow(FlowKind::Wrist).selection().files(),
                )?;
            }
            FlowKind::Wrist
        }
    };

    session.dispatch(Msg::SubmitClicked { flow });
    session.run_until_settled()?;

    let state = session.state();
    let view = state.view();
    if let Some(flow_view) = view.flow(flow) {
        render::print_flow(&mut io::stdout().lock(), flow_view)?;
    }
    write_flow_outputs(config, state, flow)?;

    Ok(exit_for(state.flow(flow).phase()))
}

fn run_plot(config: &AppConfig) -> Result<ExitCode> {
    let mut session = Session::from_config(config)?;
    session.dispatch(Msg::PlotClicked);
    session.run_until_settled()?;

    let state = session.state();
    let Some(plots) = state.plots() else {
        eprintln!("{}", state.last_error().unwrap_or("no plots returned"));
        return Ok(ExitCode::FAILURE);
    };
    let writer = AtomicFileWriter::new(config.output.dir.clone());
    let response = PlotResponse {
        plot1: plots.plot1.clone(),
        plot2: plots.plot2.clone(),
    };
    let (first, second) = export_plots(&writer, &response)?;
    println!("#plotdiv1 -> {}", first.display());
    println!("#plotdiv2 -> {}", second.display());
    Ok(ExitCode::SUCCESS)
}

fn run_clear(config: &AppConfig) -> Result<ExitCode> {
    let mut session = Session::from_config(config)?;
    session.dispatch(Msg::ClearClicked);
    session.run_until_settled()?;

    let state = session.state();
    let view = state.view();
    let writer = AtomicFileWriter::new(config.output.dir.clone());
    let mut out = io::stdout().lock();
    for flow in &view.flows {
        render::print_flow(&mut out, flow)?;
        if let Some(html) = &flow.fragment_html {
            let path = export_fragment(&writer, flow.flow.fragment_id(), html)?;
            writeln!(out, "  #{} -> {}", flow.flow.fragment_id(), path.display())?;
        }
    }
    match state.last_error() {
        Some(err) => {
            eprintln!("{err}");
            Ok(ExitCode::FAILURE)
        }
        None => Ok(ExitCode::SUCCESS),
    }
}

fn exit_for(phase: &FlowPhase) -> ExitCode {
    match phase {
        FlowPhase::Complete => ExitCode::SUCCESS,
        _ => ExitCode::FAILURE,
    }
}

/// Resolves paths to absolute form and reads their sizes.
fn selected_files(paths: &[PathBuf]) -> Result<Vec<SelectedFile>> {
    paths
        .iter()
        .map(|path| {
            let absolute = fs::canonicalize(path)
                .with_context(|| format!("cannot open {}", path.display()))?;
            let meta = fs::metadata(&absolute)
                .with_context(|| format!("cannot stat {}", absolute.display()))?;
            if !meta.is_file() {
                anyhow::bail!("{} is not a file", absolute.display());
            }
            Ok(SelectedFile::new(absolute, meta.len()))
        })
        .collect()
}

fn write_flow_outputs(config: &AppConfig, state: &AppState, flow: FlowKind) -> Result<()> {
    let flow_state = state.flow(flow);
    let writer = AtomicFileWriter::new(config.output.dir.clone());
    let samples: Vec<MetSample> = flow_state
        .rows()
        .iter()
        .map(|row| MetSample {
            time: row.time.clone(),
            met: row.met,
        })
        .collect();

    let export = if samples.is_empty() {
        None
    } else {
        Some(export_series(&writer, flow.label(), flow.table_id(), &samples)?)
    };

    let fragment = flow_state
        .fragment_html()
        .map(|html| export_fragment(&writer, flow.fragment_id(), html))
        .transpose()?;

    let summary = json!({
        "finished_utc": Utc::now().to_rfc3339(),
        "server": config.server.base_url,
        "flow": flow.label(),
        "endpoint": flow.endpoint(),
        "phase": format!("{:?}", flow_state.phase()),
        "files": flow_state
            .files_to_submit()
            .iter()
            .map(|f| f.name.clone())
            .collect::<Vec<_>>(),
        "rows": samples.len(),
        "fragment_rows": flow_state.fragment_rows(),
        "csv": export.as_ref().map(|e| e.csv_path.display().to_string()),
        "table": export.as_ref().map(|e| e.table_path.display().to_string()),
        "fragment": fragment.map(|path| path.display().to_string()),
        "error": state.last_error(),
    });
    let path = writer.write(RUN_SUMMARY_FILENAME, &serde_json::to_string_pretty(&summary)?)?;
    met_info!("Run summary written to {:?}", path);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::config::OutputConfig;
    use metview_engine::{
        ApiError, ApiSettings, FragmentSnapshot, MetApi, MetSeries, UploadPayload, UploadTarget,
    };
    use std::sync::Arc;
    use std::time::Duration as StdDuration;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const HEADER_ONLY: &str = r#"<html><body><div id="acti-div"><table id="acti_met_table"><tr><th>Time</th><th>MET</th></tr></table></div></body></html>"#;
    const POPULATED: &str = r#"<html><body><div id="acti-div"><table id="acti_met_table"><tr><th>Time</th><th>MET</th></tr><tr><td>10:00</td><td>1.4</td></tr><tr><td>10:01</td><td>2.2</td></tr></table></div></body></html>"#;

    const REQUEST_TIMEOUT: StdDuration = StdDuration::from_secs(5);

    /// Reports a populated table but never answers the upload.
    struct UnansweredUpload;

    #[async_trait::async_trait]
    impl MetApi for UnansweredUpload {
        async fn upload(
            &self,
            _target: &UploadTarget,
            _payload: UploadPayload,
        ) -> Result<MetSeries, ApiError> {
            std::future::pending().await
        }

        async fn request_plot(&self) -> Result<PlotResponse, ApiError> {
            Ok(PlotResponse::default())
        }

        async fn request_clear(&self) -> Result<(), ApiError> {
            Ok(())
        }

        async fn fetch_fragment(
            &self,
            _fragment_id: &str,
            _table_id: &str,
        ) -> Result<FragmentSnapshot, ApiError> {
            Ok(FragmentSnapshot {
                html: None,
                table_rows: 3,
            })
        }
    }

    fn fast_settings() -> PollSettings {
        let mut settings = PollSettings::default();
        for policy in [&mut settings.acti, &mut settings.wrist] {
            policy.interval = StdDuration::from_millis(20);
            policy.max_interval = StdDuration::from_millis(40);
            policy.max_attempts = 20;
        }
        settings
    }

    #[test]
    fn acti_upload_polls_until_table_fills_in() {
        metview_logging::initialize_for_tests();
        let rt = tokio::runtime::Runtime::new().unwrap();
        let server = rt.block_on(async {
            let server = MockServer::start().await;
            Mock::given(method("POST"))
                .and(path("/actifile/"))
                .respond_with(ResponseTemplate::new(200).set_body_raw(
                    r#"{"filename":"acti.csv","data":{"Time":["10:00","10:01"],"ActiGraph VM3 Estimation (MET)":[1.4,2.2]}}"#,
                    "application/json",
                ))
                .mount(&server)
                .await;
            Mock::given(method("GET"))
                .and(path("/"))
                .respond_with(ResponseTemplate::new(200).set_body_raw(HEADER_ONLY, "text/html"))
                .up_to_n_times(2)
                .mount(&server)
                .await;
            Mock::given(method("GET"))
                .and(path("/"))
                .respond_with(ResponseTemplate::new(200).set_body_raw(POPULATED, "text/html"))
                .mount(&server)
                .await;
            server
        });

        let temp = tempfile::TempDir::new().unwrap();
        let csv = temp.path().join("acti.csv");
        fs::write(&csv, "header\n1,2,3\n").unwrap();

        let engine = EngineHandle::new(ApiSettings {
            base_url: server.uri(),
            ..ApiSettings::default()
        })
        .unwrap();
        let mut session = Session::new(fast_settings(), engine, REQUEST_TIMEOUT);
        session.dispatch(Msg::FilesAdded {
            flow: FlowKind::Acti,
            files: selected_files(&[csv]).unwrap(),
        });
        session.dispatch(Msg::SubmitClicked {
            flow: FlowKind::Acti,
        });
        session.run_until_settled().unwrap();

        let flow = session.state().flow(FlowKind::Acti);
        assert_eq!(*flow.phase(), FlowPhase::Complete);
        assert!(!flow.loader_visible());
        assert_eq!(flow.rows().len(), 2);
        assert_eq!(flow.fragment_rows(), Some(3));

        let config = AppConfig {
            output: OutputConfig {
                dir: temp.path().join("out"),
            },
            ..AppConfig::default()
        };
        write_flow_outputs(&config, session.state(), FlowKind::Acti).unwrap();
        let summary =
            fs::read_to_string(temp.path().join("out").join(RUN_SUMMARY_FILENAME)).unwrap();
        assert!(summary.contains("\"rows\": 2"));
        assert!(temp.path().join("out").join("acti_met.csv").is_file());
        let fragment = fs::read_to_string(temp.path().join("out").join("acti-div.html")).unwrap();
        assert!(fragment.starts_with("<div id=\"acti-div\">"));
        assert_eq!(fragment.matches("<tr>").count(), 3);
    }

    #[test]
    fn clear_reloads_both_fragments_even_with_odd_body() {
        metview_logging::initialize_for_tests();
        let rt = tokio::runtime::Runtime::new().unwrap();
        let server = rt.block_on(async {
            let server = MockServer::start().await;
            Mock::given(method("POST"))
                .and(path("/clear/"))
                .respond_with(ResponseTemplate::new(200).set_body_string("whatever"))
                .expect(1)
                .mount(&server)
                .await;
            Mock::given(method("GET"))
                .and(path("/"))
                .respond_with(ResponseTemplate::new(200).set_body_raw(HEADER_ONLY, "text/html"))
                .expect(2)
                .mount(&server)
                .await;
            server
        });

        let engine = EngineHandle::new(ApiSettings {
            base_url: server.uri(),
            ..ApiSettings::default()
        })
        .unwrap();
        let mut session = Session::new(fast_settings(), engine, REQUEST_TIMEOUT);
        session.dispatch(Msg::ClearClicked);
        session.run_until_settled().unwrap();

        let state = session.state();
        assert_eq!(state.last_error(), None);
        assert_eq!(state.flow(FlowKind::Acti).fragment_rows(), Some(1));
        // The wrist table is absent from the page.
        assert_eq!(state.flow(FlowKind::Wrist).fragment_rows(), Some(0));
        rt.block_on(server.verify());
    }

    #[test]
    fn lost_upload_result_ends_the_wait_at_the_deadline() {
        metview_logging::initialize_for_tests();
        let temp = tempfile::TempDir::new().unwrap();
        let csv = temp.path().join("acti.csv");
        fs::write(&csv, "header\n").unwrap();

        let mut settings = PollSettings::default();
        for policy in [&mut settings.acti, &mut settings.wrist] {
            policy.interval = StdDuration::from_millis(10);
            policy.max_interval = StdDuration::from_millis(10);
            policy.max_attempts = 2;
        }
        let engine = EngineHandle::with_api(Arc::new(UnansweredUpload)).unwrap();
        let mut session = Session::new(settings, engine, StdDuration::from_millis(50));
        session.dispatch(Msg::FilesAdded {
            flow: FlowKind::Acti,
            files: selected_files(&[csv]).unwrap(),
        });
        session.dispatch(Msg::SubmitClicked {
            flow: FlowKind::Acti,
        });

        let started = Instant::now();
        let err = session.run_until_settled().unwrap_err();
        assert!(err.to_string().contains("no answer from the server"));
        assert!(started.elapsed() < StdDuration::from_secs(5));
        // The table filled in; only the upload response is missing.
        let flow = session.state().flow(FlowKind::Acti);
        assert_eq!(*flow.phase(), FlowPhase::Complete);
        assert!(flow.upload_pending());
    }

    #[test]
    fn settle_budget_covers_every_poll_and_the_upload() {
        let mut settings = PollSettings::default();
        for policy in [&mut settings.acti, &mut settings.wrist] {
            policy.interval = StdDuration::from_millis(100);
            policy.max_interval = StdDuration::from_millis(100);
            policy.max_attempts = 3;
        }
        assert_eq!(
            settle_budget(&settings, StdDuration::from_millis(1000)),
            StdDuration::from_millis(3 * 1100 + 1000)
        );
    }

    #[test]
    fn missing_file_is_rejected_before_any_request() {
        let temp = tempfile::TempDir::new().unwrap();
        let err = selected_files(&[temp.path().join("missing.csv")]).unwrap_err();
        assert!(err.to_string().contains("missing.csv"));
        assert!(selected_files(&[temp.path().to_path_buf()]).is_err());
    }
}
