use std::time::Duration;

use metview_core::{
    update, AppState, Effect, FlowFailure, FlowKind, FlowPhase, FragmentContent, MetRow, Msg,
    PollPolicy, PollSettings, ReadinessSource, ReloadReason, SelectedFile, TimerId, UploadedTable,
};
use pretty_assertions::assert_eq;

fn init_logging() {
    metview_logging::initialize_for_tests();
}

fn select(state: AppState, flow: FlowKind, paths: &[&str]) -> AppState {
    let files = paths.iter().map(|p| SelectedFile::new(*p, 2048)).collect();
    update(state, Msg::FilesAdded { flow, files }).0
}

fn scheduled_timer(effects: &[Effect], flow: FlowKind) -> TimerId {
    effects
        .iter()
        .find_map(|effect| match effect {
            Effect::ScheduleTick { flow: f, timer, .. } if *f == flow => Some(*timer),
            _ => None,
        })
        .expect("schedule tick effect")
}

fn fragment(state: AppState, flow: FlowKind, rows: usize) -> (AppState, Vec<Effect>) {
    update(
        state,
        Msg::FragmentLoaded {
            flow,
            reason: ReloadReason::Poll,
            result: Ok(FragmentContent::new(rows, None)),
        },
    )
}

fn upload_ok(state: AppState, flow: FlowKind, name: &str) -> AppState {
    let table = UploadedTable {
        source_filename: Some(name.to_string()),
        rows: vec![MetRow::new("00:00", Some(1.0))],
    };
    update(
        state,
        Msg::UploadFinished {
            flow,
            result: Ok(table),
        },
    )
    .0
}

#[test]
fn submit_shows_loader_uploads_and_starts_polling() {
    init_logging();
    let state = select(AppState::new(), FlowKind::Acti, &["/data/acti.csv"]);
    let (state, effects) = update(state, Msg::SubmitClicked { flow: FlowKind::Acti });

    let timer = scheduled_timer(&effects, FlowKind::Acti);
    assert_eq!(
        effects,
        vec![
            Effect::ShowLoader { flow: FlowKind::Acti },
            Effect::Upload {
                flow: FlowKind::Acti,
                files: vec![SelectedFile::new("/data/acti.csv", 2048)],
            },
            Effect::ScheduleTick {
                flow: FlowKind::Acti,
                timer,
                delay: Duration::from_secs(1),
            },
        ]
    );
    let flow = state.flow(FlowKind::Acti);
    assert_eq!(*flow.phase(), FlowPhase::Polling { attempt: 0 });
    assert!(flow.loader_visible());
    assert_eq!(flow.timer(), Some(timer));
}

#[test]
fn header_only_table_is_not_ready_and_reloads_again() {
    init_logging();
    let state = select(AppState::new(), FlowKind::Acti, &["/data/acti.csv"]);
    let (state, effects) = update(state, Msg::SubmitClicked { flow: FlowKind::Acti });
    let first = scheduled_timer(&effects, FlowKind::Acti);

    let (state, effects) = update(
        state,
        Msg::TimerFired {
            flow: FlowKind::Acti,
            timer: first,
        },
    );
    assert_eq!(
        effects,
        vec![Effect::ReloadFragment {
            flow: FlowKind::Acti,
            reason: ReloadReason::Poll,
        }]
    );

    let (state, effects) = fragment(state, FlowKind::Acti, 1);
    let second = scheduled_timer(&effects, FlowKind::Acti);
    assert_ne!(first, second);
    assert_eq!(*state.flow(FlowKind::Acti).phase(), FlowPhase::Polling { attempt: 1 });
    assert!(state.flow(FlowKind::Acti).loader_visible());

    let (_state, effects) = update(
        state,
        Msg::TimerFired {
            flow: FlowKind::Acti,
            timer: second,
        },
    );
    assert_eq!(
        effects,
        vec![Effect::ReloadFragment {
            flow: FlowKind::Acti,
            reason: ReloadReason::Poll,
        }]
    );
}

#[test]
fn populated_table_completes_hides_loader_and_cancels_timer() {
    init_logging();
    let state = select(AppState::new(), FlowKind::Wrist, &["/w/a.csv", "/w/b.csv"]);
    let (state, effects) = update(state, Msg::SubmitClicked { flow: FlowKind::Wrist });
    let timer = scheduled_timer(&effects, FlowKind::Wrist);

    let (state, _) = update(
        state,
        Msg::TimerFired {
            flow: FlowKind::Wrist,
            timer,
        },
    );
    let (mut state, effects) = fragment(state, FlowKind::Wrist, 2);

    assert_eq!(
        effects,
        vec![
            Effect::HideLoader { flow: FlowKind::Wrist },
            Effect::CancelTimer {
                flow: FlowKind::Wrist,
                timer,
            },
        ]
    );
    let flow = state.flow(FlowKind::Wrist);
    assert_eq!(*flow.phase(), FlowPhase::Complete);
    assert!(!flow.loader_visible());
    assert_eq!(flow.timer(), None);
    assert_eq!(flow.fragment_rows(), Some(2));
    assert!(state.consume_dirty());
    // The upload response is still outstanding.
    assert!(!state.is_settled());

    let state = upload_ok(state, FlowKind::Wrist, "a.csv");
    assert_eq!(*state.flow(FlowKind::Wrist).phase(), FlowPhase::Complete);
    assert!(state.is_settled());
}

#[test]
fn stale_timer_is_ignored() {
    let state = select(AppState::new(), FlowKind::Acti, &["/a.csv"]);
    let (state, effects) = update(state, Msg::SubmitClicked { flow: FlowKind::Acti });
    let timer = scheduled_timer(&effects, FlowKind::Acti);

    let (_, effects) = update(
        state,
        Msg::TimerFired {
            flow: FlowKind::Acti,
            timer: timer + 100,
        },
    );
    assert!(effects.is_empty());
}

#[test]
fn each_flow_owns_an_independently_cancellable_timer() {
    init_logging();
    let state = select(AppState::new(), FlowKind::Acti, &["/a.csv"]);
    let state = select(state, FlowKind::Wrist, &["/w1.csv", "/w2.csv"]);

    let (state, acti_effects) = update(state, Msg::SubmitClicked { flow: FlowKind::Acti });
    let (state, wrist_effects) = update(state, Msg::SubmitClicked { flow: FlowKind::Wrist });
    let acti_timer = scheduled_timer(&acti_effects, FlowKind::Acti);
    let wrist_timer = scheduled_timer(&wrist_effects, FlowKind::Wrist);
    assert_ne!(acti_timer, wrist_timer);

    // Wrist timer tick interval is the slower default.
    assert!(wrist_effects.contains(&Effect::ScheduleTick {
        flow: FlowKind::Wrist,
        timer: wrist_timer,
        delay: Duration::from_secs(5),
    }));

    let (state, effects) = fragment(state, FlowKind::Acti, 3);
    assert!(effects.contains(&Effect::CancelTimer {
        flow: FlowKind::Acti,
        timer: acti_timer,
    }));
    assert_eq!(state.flow(FlowKind::Wrist).timer(), Some(wrist_timer));
    assert!(!state.is_settled());

    let (state, effects) = fragment(state, FlowKind::Wrist, 5);
    assert!(effects.contains(&Effect::CancelTimer {
        flow: FlowKind::Wrist,
        timer: wrist_timer,
    }));
    let state = upload_ok(state, FlowKind::Acti, "a.csv");
    assert!(!state.is_settled());
    let state = upload_ok(state, FlowKind::Wrist, "w1.csv");
    assert!(state.is_settled());
}

#[test]
fn polling_gives_up_after_attempt_budget_with_backoff() {
    init_logging();
    let settings = PollSettings {
        acti: PollPolicy {
            interval: Duration::from_millis(100),
            max_attempts: 3,
            backoff_factor: 2.0,
            max_interval: Duration::from_secs(1),
        },
        ..PollSettings::default()
    };
    let state = select(AppState::with_settings(settings), FlowKind::Acti, &["/a.csv"]);
    let (state, _) = update(state, Msg::SubmitClicked { flow: FlowKind::Acti });

    let (state, effects) = fragment(state, FlowKind::Acti, 1);
    assert!(matches!(
        effects.as_slice(),
        [Effect::ScheduleTick { delay, .. }] if *delay == Duration::from_millis(200)
    ));
    let (state, effects) = update(
        state,
        Msg::FragmentLoaded {
            flow: FlowKind::Acti,
            reason: ReloadReason::Poll,
            result: Err("network error".to_string()),
        },
    );
    assert!(matches!(
        effects.as_slice(),
        [Effect::ScheduleTick { delay, .. }] if *delay == Duration::from_millis(400)
    ));
    assert!(state.last_error().unwrap().contains("reload failed"));

    let (state, effects) = fragment(state, FlowKind::Acti, 0);
    assert_eq!(effects, vec![Effect::HideLoader { flow: FlowKind::Acti }]);
    assert_eq!(
        *state.flow(FlowKind::Acti).phase(),
        FlowPhase::Failed(FlowFailure::PollExhausted { attempts: 3 })
    );
    assert_eq!(state.flow(FlowKind::Acti).timer(), None);
}

#[test]
fn upload_failure_is_terminal_and_surfaced() {
    init_logging();
    let state = select(AppState::new(), FlowKind::Acti, &["/a.csv"]);
    let (state, effects) = update(state, Msg::SubmitClicked { flow: FlowKind::Acti });
    let timer = scheduled_timer(&effects, FlowKind::Acti);

    let (state, effects) = update(
        state,
        Msg::UploadFinished {
            flow: FlowKind::Acti,
            result: Err("http status 500".to_string()),
        },
    );
    assert_eq!(
        effects,
        vec![
            Effect::CancelTimer {
                flow: FlowKind::Acti,
                timer,
            },
            Effect::HideLoader { flow: FlowKind::Acti },
        ]
    );
    assert_eq!(
        *state.flow(FlowKind::Acti).phase(),
        FlowPhase::Failed(FlowFailure::Upload {
            reason: "http status 500".to_string()
        })
    );
    assert_eq!(state.last_error(), Some("acti: upload failed: http status 500"));

    // A late fragment result no longer moves the flow.
    let (state, effects) = fragment(state, FlowKind::Acti, 4);
    assert!(effects.is_empty());
    assert!(matches!(state.flow(FlowKind::Acti).phase(), FlowPhase::Failed(_)));
}

#[test]
fn response_readiness_completes_on_upload_and_never_polls() {
    init_logging();
    let settings = PollSettings {
        readiness: ReadinessSource::Response,
        ..PollSettings::default()
    };
    let state = select(AppState::with_settings(settings), FlowKind::Acti, &["/a.csv"]);
    let (state, effects) = update(state, Msg::SubmitClicked { flow: FlowKind::Acti });
    assert!(!effects.iter().any(|e| matches!(e, Effect::ScheduleTick { .. })));
    assert_eq!(*state.flow(FlowKind::Acti).phase(), FlowPhase::Submitted);

    let table = UploadedTable {
        source_filename: Some("a.csv".to_string()),
        rows: vec![MetRow::new("2021-01-01 10:00:00", Some(1.5))],
    };
    let (state, effects) = update(
        state,
        Msg::UploadFinished {
            flow: FlowKind::Acti,
            result: Ok(table),
        },
    );
    assert_eq!(effects, vec![Effect::HideLoader { flow: FlowKind::Acti }]);
    assert_eq!(*state.flow(FlowKind::Acti).phase(), FlowPhase::Complete);
    assert_eq!(state.flow(FlowKind::Acti).rows().len(), 1);
}

#[test]
fn upload_rows_append_while_polling_continues() {
    let state = select(AppState::new(), FlowKind::Acti, &["/a.csv"]);
    let (state, _) = update(state, Msg::SubmitClicked { flow: FlowKind::Acti });
    let table = UploadedTable {
        source_filename: None,
        rows: vec![MetRow::new("t1", Some(1.0)), MetRow::new("t2", None)],
    };
    let (state, effects) = update(
        state,
        Msg::UploadFinished {
            flow: FlowKind::Acti,
            result: Ok(table),
        },
    );
    assert!(effects.is_empty());
    assert_eq!(*state.flow(FlowKind::Acti).phase(), FlowPhase::Polling { attempt: 0 });
    let view = state.view();
    let acti = view.flow(FlowKind::Acti).unwrap();
    assert_eq!(acti.rows[1].met_label(), "");
    assert!(view.busy);
}

#[test]
fn resubmitting_a_busy_flow_is_ignored() {
    let state = select(AppState::new(), FlowKind::Wrist, &["/w.csv"]);
    let (state, _) = update(state, Msg::SubmitClicked { flow: FlowKind::Wrist });
    let (_, effects) = update(state, Msg::SubmitClicked { flow: FlowKind::Wrist });
    assert!(effects.is_empty());
}
