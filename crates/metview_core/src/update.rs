use crate::{
    is_table_ready, AppState, Effect, FlowFailure, FlowKind, FlowPhase, FragmentContent, Msg,
    ReadinessSource, ReloadReason, UploadedTable,
};

/// Pure update function: applies a message to state and returns any effects.
pub fn update(mut state: AppState, msg: Msg) -> (AppState, Vec<Effect>) {
    let effects = match msg {
        Msg::FilesAdded { flow, files } => {
            let selection = state.flow_mut(flow).selection_mut();
            if flow.accepts_multiple() {
                selection.add(files);
            } else {
                selection.replace_with(files.into_iter().next());
            }
            state.mark_dirty();
            Vec::new()
        }
        Msg::FileRemoved { flow, index } => {
            if state.flow_mut(flow).selection_mut().remove(index).is_some() {
                state.mark_dirty();
            }
            Vec::new()
        }
        Msg::SelectionCleared { flow } => {
            state.flow_mut(flow).selection_mut().clear();
            state.mark_dirty();
            Vec::new()
        }
        Msg::SubmitClicked { flow } => submit(&mut state, flow),
        Msg::UploadFinished { flow, result } => {
            state.flow_mut(flow).set_upload_pending(false);
            upload_finished(&mut state, flow, result)
        }
        Msg::TimerFired { flow, timer } => {
            let flow_state = state.flow(flow);
            let current = flow_state.timer() == Some(timer);
            if current && matches!(flow_state.phase(), FlowPhase::Polling { .. }) {
                vec![Effect::ReloadFragment {
                    flow,
                    reason: ReloadReason::Poll,
                }]
            } else {
                Vec::new()
            }
        }
        Msg::FragmentLoaded {
            flow,
            reason: ReloadReason::Poll,
            result,
        } => poll_checked(&mut state, flow, result),
        Msg::FragmentLoaded {
            flow,
            reason: ReloadReason::Refresh,
            result,
        } => {
            state.finish_refresh();
            match result {
                Ok(fragment) => state.flow_mut(flow).set_fragment(fragment),
                Err(reason) => state.set_error(format!("{flow}: reload failed: {reason}")),
            }
            state.mark_dirty();
            Vec::new()
        }
        Msg::PlotClicked => {
            state.set_plot_pending(true);
            vec![Effect::RequestPlot]
        }
        Msg::PlotLoaded(result) => {
            state.set_plot_pending(false);
            match result {
                Ok(plots) => state.set_plots(plots),
                Err(reason) => state.set_error(format!("plot failed: {reason}")),
            }
            state.mark_dirty();
            Vec::new()
        }
        Msg::ClearClicked => {
            state.set_clear_pending(true);
            vec![Effect::RequestClear]
        }
        Msg::ClearFinished(result) => {
            state.set_clear_pending(false);
            state.mark_dirty();
            match result {
                Ok(()) => {
                    state.add_refreshes(FlowKind::ALL.len());
                    FlowKind::ALL
                        .iter()
                        .map(|flow| {
                            state.flow_mut(*flow).clear_results();
                            Effect::ReloadFragment {
                                flow: *flow,
                                reason: ReloadReason::Refresh,
                            }
                        })
                        .collect()
                }
                Err(reason) => {
                    state.set_error(format!("clear failed: {reason}"));
                    Vec::new()
                }
            }
        }
        Msg::NoOp => Vec::new(),
    };

    (state, effects)
}

fn submit(state: &mut AppState, flow: FlowKind) -> Vec<Effect> {
    let current = state.flow(flow);
    if current.phase().is_busy() || current.upload_pending() {
        return Vec::new();
    }

    let files = state.flow(flow).files_to_submit();
    if files.is_empty() {
        let failure = FlowFailure::NoFiles;
        state.set_error(format!("{flow}: {failure}"));
        state.flow_mut(flow).set_phase(FlowPhase::Failed(failure));
        state.mark_dirty();
        return Vec::new();
    }

    let readiness = state.settings().readiness;
    let delay = state.settings().policy(flow).delay_for(0);
    let timer = match readiness {
        ReadinessSource::Fragment => Some(state.allocate_timer()),
        ReadinessSource::Response => None,
    };

    let flow_state = state.flow_mut(flow);
    flow_state.set_loader(true);
    flow_state.set_upload_pending(true);
    flow_state.set_phase(FlowPhase::Submitted);

    let mut effects = Vec::with_capacity(3);
    effects.push(Effect::ShowLoader { flow });
    effects.push(Effect::Upload { flow, files });
    if let Some(timer) = timer {
        flow_state.set_timer(Some(timer));
        flow_state.set_phase(FlowPhase::Polling { attempt: 0 });
        effects.push(Effect::ScheduleTick { flow, timer, delay });
    }
    state.mark_dirty();
    effects
}

fn upload_finished(
    state: &mut AppState,
    flow: FlowKind,
    result: Result<UploadedTable, String>,
) -> Vec<Effect> {
    state.mark_dirty();
    let table = match result {
        Ok(table) => table,
        Err(reason) => return upload_failed(state, flow, reason),
    };

    let readiness = state.settings().readiness;
    let flow_state = state.flow_mut(flow);
    flow_state.append_rows(table.source_filename, table.rows);
    // Without fragment polling the response is the completion signal.
    if readiness == ReadinessSource::Response && *flow_state.phase() == FlowPhase::Submitted {
        flow_state.set_phase(FlowPhase::Complete);
        flow_state.set_loader(false);
        return vec![Effect::HideLoader { flow }];
    }
    Vec::new()
}

fn upload_failed(state: &mut AppState, flow: FlowKind, reason: String) -> Vec<Effect> {
    let failure = FlowFailure::Upload { reason };
    state.set_error(format!("{flow}: {failure}"));
    // A flow the fragment already completed keeps its phase.
    if !state.flow(flow).phase().is_busy() {
        return Vec::new();
    }

    let flow_state = state.flow_mut(flow);
    let mut effects = Vec::with_capacity(2);
    if let Some(timer) = flow_state.take_timer() {
        effects.push(Effect::CancelTimer { flow, timer });
    }
    flow_state.set_loader(false);
    flow_state.set_phase(FlowPhase::Failed(failure));
    effects.push(Effect::HideLoader { flow });
    effects
}

fn poll_checked(
    state: &mut AppState,
    flow: FlowKind,
    result: Result<FragmentContent, String>,
) -> Vec<Effect> {
    let FlowPhase::Polling { attempt } = *state.flow(flow).phase() else {
        return Vec::new();
    };

    let (ready, failure) = match result {
        Ok(fragment) => {
            let ready = is_table_ready(fragment.table_rows);
            state.flow_mut(flow).set_fragment(fragment);
            (ready, None)
        }
        Err(reason) => (false, Some(reason)),
    };
    state.mark_dirty();

    if ready {
        let flow_state = state.flow_mut(flow);
        let mut effects = Vec::with_capacity(2);
        flow_state.set_phase(FlowPhase::Complete);
        flow_state.set_loader(false);
        effects.push(Effect::HideLoader { flow });
        if let Some(timer) = flow_state.take_timer() {
            effects.push(Effect::CancelTimer { flow, timer });
        }
        return effects;
    }

    if let Some(reason) = failure {
        state.set_error(format!("{flow}: reload failed: {reason}"));
    }

    let attempts = attempt + 1;
    let policy = state.settings().policy(flow).clone();
    if policy.is_exhausted(attempts) {
        let flow_state = state.flow_mut(flow);
        let failure = FlowFailure::PollExhausted { attempts };
        flow_state.set_timer(None);
        flow_state.set_loader(false);
        flow_state.set_phase(FlowPhase::Failed(failure.clone()));
        state.set_error(format!("{flow}: {failure}"));
        return vec![Effect::HideLoader { flow }];
    }

    let timer = state.allocate_timer();
    let flow_state = state.flow_mut(flow);
    flow_state.set_timer(Some(timer));
    flow_state.set_phase(FlowPhase::Polling { attempt: attempts });
    vec![Effect::ScheduleTick {
        flow,
        timer,
        delay: policy.delay_for(attempts),
    }]
}
