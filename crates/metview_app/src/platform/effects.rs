use std::collections::HashMap;
use std::time::Duration;

use metview_core::{
    Effect, FlowKind, FragmentContent, MetRow, Msg, PlotMarkup, ReloadReason, TimerId,
    UploadedTable,
};
use metview_engine::{EngineEvent, EngineHandle, EngineStopped, JobId, MetSeries, UploadTarget};
use metview_logging::{met_debug, met_info, met_warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PendingJob {
    Upload(FlowKind),
    Fragment(FlowKind, ReloadReason),
    Plot,
    Clear,
}

/// Executes core effects on the engine and turns engine events back into
/// core messages.
pub struct EffectRunner {
    engine: EngineHandle,
    next_job: JobId,
    jobs: HashMap<JobId, PendingJob>,
    timers: HashMap<TimerId, FlowKind>,
}

impl EffectRunner {
    pub fn new(engine: EngineHandle) -> Self {
        Self {
            engine,
            next_job: 1,
            jobs: HashMap::new(),
            timers: HashMap::new(),
        }
    }

    pub fn enqueue(&mut self, effects: Vec<Effect>) {
        for effect in effects {
            match effect {
                Effect::Upload { flow, files } => {
                    let job_id = self.track(PendingJob::Upload(flow));
                    met_info!(
                        "Upload job_id={} flow={} files={} endpoint={}",
                        job_id,
                        flow,
                        files.len(),
                        flow.endpoint()
                    );
                    let paths = files.into_iter().map(|f| f.path).collect();
                    self.engine.upload(job_id, upload_target(flow), paths);
                }
                Effect::ShowLoader { flow } => {
                    met_info!("{}: waiting for results", flow);
                }
                Effect::HideLoader { flow } => {
                    met_debug!("{}: loader hidden", flow);
                }
                Effect::ScheduleTick { flow, timer, delay } => {
                    met_debug!("{}: next check in {:?} (timer {})", flow, delay, timer);
                    self.timers.insert(timer, flow);
                    self.engine.schedule_timer(timer, delay);
                }
                Effect::CancelTimer { flow, timer } => {
                    met_debug!("{}: cancel timer {}", flow, timer);
                    self.timers.remove(&timer);
                    self.engine.cancel_timer(timer);
                }
                Effect::ReloadFragment { flow, reason } => {
                    let job_id = self.track(PendingJob::Fragment(flow, reason));
                    self.engine
                        .fetch_fragment(job_id, flow.fragment_id(), flow.table_id());
                }
                Effect::RequestPlot => {
                    let job_id = self.track(PendingJob::Plot);
                    self.engine.request_plot(job_id);
                }
                Effect::RequestClear => {
                    let job_id = self.track(PendingJob::Clear);
                    self.engine.request_clear(job_id);
                }
            }
        }
    }

    /// Waits up to `timeout` for the next engine event that maps to a message.
    pub fn next_msg(&mut self, timeout: Duration) -> Result<Option<Msg>, EngineStopped> {
        let event = self.engine.recv_timeout(timeout)?;
        Ok(event.and_then(|event| self.translate(event)))
    }

    fn track(&mut self, job: PendingJob) -> JobId {
        let job_id = self.next_job;
        self.next_job += 1;
        self.jobs.insert(job_id, job);
        job_id
    }

    fn translate(&mut self, event: EngineEvent) -> Option<Msg> {
        match event {
            EngineEvent::TimerFired { timer_id } => {
                let flow = self.timers.remove(&timer_id)?;
                Some(Msg::TimerFired {
                    flow,
                    timer: timer_id,
                })
            }
            EngineEvent::UploadCompleted { job_id, result } => {
                let Some(PendingJob::Upload(flow)) = self.jobs.remove(&job_id) else {
                    return self.unknown(job_id);
                };
                let result = result.map(map_series).map_err(|err| {
                    met_warn!("{} upload failed: {}", flow, err);
                    err.to_string()
                });
                Some(Msg::UploadFinished { flow, result })
            }
            EngineEvent::FragmentFetched { job_id, result } => {
                let Some(PendingJob::Fragment(flow, reason)) = self.jobs.remove(&job_id) else {
                    return self.unknown(job_id);
                };
                let result = result
                    .map(|snapshot| FragmentContent::new(snapshot.table_rows, snapshot.html))
                    .map_err(|err| err.to_string());
                Some(Msg::FragmentLoaded {
                    flow,
                    reason,
                    result,
                })
            }
            EngineEvent::PlotCompleted { job_id, result } => {
                if self.jobs.remove(&job_id) != Some(PendingJob::Plot) {
                    return self.unknown(job_id);
                }
                let result = result
                    .map(|plots| PlotMarkup {
                        plot1: plots.plot1,
                        plot2: plots.plot2,
                    })
                    .map_err(|err| err.to_string());
                Some(Msg::PlotLoaded(result))
            }
            EngineEvent::ClearCompleted { job_id, result } => {
                if self.jobs.remove(&job_id) != Some(PendingJob::Clear) {
                    return self.unknown(job_id);
                }
                Some(Msg::ClearFinished(result.map_err(|err| err.to_string())))
            }
        }
    }

    fn unknown(&self, job_id: JobId) -> Option<Msg> {
        met_warn!("Dropping result for unknown job {}", job_id);
        None
    }
}

pub(crate) fn upload_target(flow: FlowKind) -> UploadTarget {
    UploadTarget::new(flow.endpoint(), flow.field_name(), flow.met_column())
}

fn map_series(series: MetSeries) -> UploadedTable {
    UploadedTable {
        source_filename: series.source_filename,
        rows: series
            .samples
            .into_iter()
            .map(|sample| MetRow::new(sample.time, sample.met))
            .collect(),
    }
}
