use std::io;
use std::path::PathBuf;
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::Duration;

use metview_logging::{met_debug, met_warn};

use crate::api::{ApiSettings, MetApi, ReqwestApi};
use crate::payload::{UploadPayload, UploadTarget};
use crate::timers::TimerRegistry;
use crate::{EngineEvent, JobId, TimerId};

enum EngineCommand {
    Upload {
        job_id: JobId,
        target: UploadTarget,
        files: Vec<PathBuf>,
    },
    FetchFragment {
        job_id: JobId,
        fragment_id: String,
        table_id: String,
    },
    Plot { job_id: JobId },
    Clear { job_id: JobId },
    ScheduleTimer { timer_id: TimerId, delay: Duration },
    CancelTimer { timer_id: TimerId },
}

/// The worker thread is gone; no further events will arrive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("engine worker has stopped")]
pub struct EngineStopped;

/// Handle to the background IO runtime.
///
/// Requests run concurrently on a tokio runtime owned by a worker thread;
/// their outcomes come back as [`EngineEvent`]s.
pub struct EngineHandle {
    cmd_tx: mpsc::Sender<EngineCommand>,
    event_rx: mpsc::Receiver<EngineEvent>,
}

impl EngineHandle {
    pub fn new(settings: ApiSettings) -> io::Result<Self> {
        Self::with_api(Arc::new(ReqwestApi::new(settings)))
    }

    pub fn with_api(api: Arc<dyn MetApi>) -> io::Result<Self> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .thread_name("metview-engine")
            .build()?;
        let (cmd_tx, cmd_rx) = mpsc::channel();
        let (event_tx, event_rx) = mpsc::channel();

        thread::spawn(move || {
            let timers = TimerRegistry::new();
            while let Ok(command) = cmd_rx.recv() {
                match command {
                    EngineCommand::ScheduleTimer { timer_id, delay } => {
                        let event_tx = event_tx.clone();
                        timers.schedule(runtime.handle(), timer_id, delay, move |timer_id| {
                            let _ = event_tx.send(EngineEvent::TimerFired { timer_id });
                        });
                    }
                    EngineCommand::CancelTimer { timer_id } => {
                        if !timers.cancel(timer_id) {
                            met_debug!("timer {timer_id} already fired or unknown");
                        }
                    }
                    command => {
                        let api = api.clone();
                        let event_tx = event_tx.clone();
                        runtime.spawn(async move {
                            handle_command(api.as_ref(), command, event_tx).await;
                        });
                    }
                }
            }
            timers.cancel_all();
        });

        Ok(Self { cmd_tx, event_rx })
    }

    pub fn upload(&self, job_id: JobId, target: UploadTarget, files: Vec<PathBuf>) {
        self.send(EngineCommand::Upload {
            job_id,
            target,
            files,
        });
    }

    pub fn fetch_fragment(
        &self,
        job_id: JobId,
        fragment_id: impl Into<String>,
        table_id: impl Into<String>,
    ) {
        self.send(EngineCommand::FetchFragment {
            job_id,
            fragment_id: fragment_id.into(),
            table_id: table_id.into(),
        });
    }

    pub fn request_plot(&self, job_id: JobId) {
        self.send(EngineCommand::Plot { job_id });
    }

    pub fn request_clear(&self, job_id: JobId) {
        self.send(EngineCommand::Clear { job_id });
    }

    pub fn schedule_timer(&self, timer_id: TimerId, delay: Duration) {
        self.send(EngineCommand::ScheduleTimer { timer_id, delay });
    }

    pub fn cancel_timer(&self, timer_id: TimerId) {
        self.send(EngineCommand::CancelTimer { timer_id });
    }

    /// Waits up to `timeout` for the next event. `Ok(None)` means nothing
    /// arrived in time.
    pub fn recv_timeout(&self, timeout: Duration) -> Result<Option<EngineEvent>, EngineStopped> {
        match self.event_rx.recv_timeout(timeout) {
            Ok(event) => Ok(Some(event)),
            Err(mpsc::RecvTimeoutError::Timeout) => Ok(None),
            Err(mpsc::RecvTimeoutError::Disconnected) => Err(EngineStopped),
        }
    }

    fn send(&self, command: EngineCommand) {
        if self.cmd_tx.send(command).is_err() {
            met_warn!("engine worker has stopped; command dropped");
        }
    }
}

async fn handle_command(
    api: &dyn MetApi,
    command: EngineCommand,
    event_tx: mpsc::Sender<EngineEvent>,
) {
    let event = match command {
        EngineCommand::Upload {
            job_id,
            target,
            files,
        } => {
            let result = match UploadPayload::from_files(&target.field, &files).await {
                Ok(payload) => api.upload(&target, payload).await,
                Err(err) => Err(err),
            };
            EngineEvent::UploadCompleted { job_id, result }
        }
        EngineCommand::FetchFragment {
            job_id,
            fragment_id,
            table_id,
        } => EngineEvent::FragmentFetched {
            job_id,
            result: api.fetch_fragment(&fragment_id, &table_id).await,
        },
        EngineCommand::Plot { job_id } => EngineEvent::PlotCompleted {
            job_id,
            result: api.request_plot().await,
        },
        EngineCommand::Clear { job_id } => EngineEvent::ClearCompleted {
            job_id,
            result: api.request_clear().await,
        },
        EngineCommand::ScheduleTimer { .. } | EngineCommand::CancelTimer { .. } => return,
    };
    let _ = event_tx.send(event);
}
