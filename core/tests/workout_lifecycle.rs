use std::sync::Arc;
use std::time::Duration;

use formcoach_core::store::{InMemorySessionStore, SessionStatus, StoreCall, StoreOp, WorkoutRecord};
use formcoach_core::{
    CompletionOutcome, Credential, ExerciseKind, Feedback, Joint, Landmark, PoseFrame, Workout,
    WorkoutConfig, WorkoutEvent,
};
use tokio::sync::mpsc;

/// Side-on pushup pose with a straight body and the given elbow angle
fn pushup_frame(elbow_deg: f64) -> PoseFrame {
    let theta = elbow_deg.to_radians();
    PoseFrame::new()
        .with(Joint::RightShoulder, Landmark::new(0.3, 0.4))
        .with(Joint::RightElbow, Landmark::new(0.3, 0.6))
        .with(
            Joint::RightWrist,
            Landmark::new(0.3 + 0.2 * theta.sin(), 0.6 - 0.2 * theta.cos()),
        )
        .with(Joint::RightHip, Landmark::new(0.6, 0.4))
        .with(Joint::RightAnkle, Landmark::new(0.9, 0.4))
}

async fn drain(events: &mut mpsc::UnboundedReceiver<WorkoutEvent>) -> Vec<WorkoutEvent> {
    let mut out = Vec::new();
    while let Some(event) = events.recv().await {
        out.push(event);
    }
    out
}

fn ticks(events: &[WorkoutEvent]) -> Vec<u32> {
    events
        .iter()
        .filter_map(|event| match event {
            WorkoutEvent::Tick { duration_seconds } => Some(*duration_seconds),
            _ => None,
        })
        .collect()
}

#[tokio::test(start_paused = true)]
async fn stop_halts_the_duration_timer() {
    let store = Arc::new(InMemorySessionStore::new());
    let (_frames_tx, frames_rx) = mpsc::channel(8);
    let (workout, mut events) = Workout::start(
        WorkoutConfig::new(ExerciseKind::Squat),
        store.clone(),
        None,
        frames_rx,
    )
    .unwrap();

    tokio::time::sleep(Duration::from_millis(3500)).await;
    let stopped = workout.stop().await.unwrap();
    assert_eq!(stopped.summary.duration_seconds, 3);

    // a tick was due at 4s; nothing may fire after stop returned
    tokio::time::sleep(Duration::from_secs(5)).await;
    let events = drain(&mut events).await;
    assert_eq!(ticks(&events), vec![1, 2, 3]);

    let outcome = stopped.completion.await.unwrap();
    let session_id = match outcome {
        CompletionOutcome::Completed { session_id } => session_id,
        other => panic!("unexpected outcome: {:?}", other),
    };
    let session = store.session(&session_id).unwrap();
    assert_eq!(session.status, SessionStatus::Completed);
    assert_eq!(session.duration_seconds, 3);
}

#[tokio::test(start_paused = true)]
async fn frames_drive_feedback_and_reps() {
    let store = Arc::new(InMemorySessionStore::new());
    let (frames_tx, frames_rx) = mpsc::channel(16);
    let (workout, mut events) = Workout::start(
        WorkoutConfig::new(ExerciseKind::Pushup),
        store.clone(),
        None,
        frames_rx,
    )
    .unwrap();

    for deg in [170.0, 150.0, 95.0, 85.0, 170.0, 120.0, 140.0, 170.0] {
        frames_tx.send(pushup_frame(deg)).await.unwrap();
    }
    frames_tx.send(PoseFrame::new()).await.unwrap();
    tokio::time::sleep(Duration::from_millis(500)).await;

    let stopped = workout.stop().await.unwrap();
    assert_eq!(stopped.summary.reps, 1);
    assert_eq!(stopped.summary.duration_seconds, 0);
    assert!(!stopped.summary.degraded);

    let events = drain(&mut events).await;
    let reps: Vec<u32> = events
        .iter()
        .filter_map(|event| match event {
            WorkoutEvent::RepCompleted { count } => Some(*count),
            _ => None,
        })
        .collect();
    assert_eq!(reps, vec![1]);

    let feedback: Vec<Feedback> = events
        .iter()
        .filter_map(|event| match event {
            WorkoutEvent::Measured { feedback, .. } => Some(*feedback),
            _ => None,
        })
        .collect();
    assert_eq!(feedback.len(), 8);
    assert_eq!(feedback[0], Feedback::LowerBody);
    assert_eq!(feedback[3], Feedback::PushUp);
    assert_eq!(
        events
            .iter()
            .filter(|event| **event == WorkoutEvent::DetectionGap)
            .count(),
        1
    );

    let started: Vec<&str> = events
        .iter()
        .filter_map(|event| match event {
            WorkoutEvent::SessionStarted { session_id } => Some(session_id.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(started.len(), 1);
    assert_eq!(stopped.summary.session_id.as_deref(), Some(started[0]));

    assert!(stopped.completion.await.unwrap().is_persisted());
}

#[tokio::test(start_paused = true)]
async fn failed_start_falls_back_to_one_save() {
    let store = Arc::new(InMemorySessionStore::new());
    store.fail(StoreOp::Create);
    let credential = Credential::new("user-token").unwrap();
    let (frames_tx, frames_rx) = mpsc::channel(16);
    let (workout, mut events) = Workout::start(
        WorkoutConfig::new(ExerciseKind::Pushup),
        store.clone(),
        Some(credential),
        frames_rx,
    )
    .unwrap();

    for _ in 0..2 {
        frames_tx.send(pushup_frame(80.0)).await.unwrap();
        frames_tx.send(pushup_frame(170.0)).await.unwrap();
    }
    tokio::time::sleep(Duration::from_millis(2200)).await;

    let stopped = workout.stop().await.unwrap();
    assert!(stopped.summary.degraded);
    assert!(stopped.summary.session_id.is_none());

    assert!(drain(&mut events).await.contains(&WorkoutEvent::SessionUnavailable));

    let outcome = stopped.completion.await.unwrap();
    assert!(matches!(outcome, CompletionOutcome::FallbackSaved { cause: None }));

    let saves: Vec<StoreCall> = store
        .calls()
        .into_iter()
        .filter(|call| matches!(call, StoreCall::SaveWorkout { .. }))
        .collect();
    assert_eq!(
        saves,
        vec![StoreCall::SaveWorkout {
            record: WorkoutRecord {
                exercise: ExerciseKind::Pushup,
                reps: 2,
                duration_seconds: 2,
            },
            authenticated: true,
        }]
    );
    // degraded workouts never send incremental updates
    assert!(!store
        .calls()
        .iter()
        .any(|call| matches!(call, StoreCall::Update { .. })));
}

#[tokio::test(start_paused = true)]
async fn stop_does_not_wait_for_the_network() {
    let latency = Duration::from_secs(10);
    let store = Arc::new(InMemorySessionStore::new().with_latency(latency));
    let (_frames_tx, frames_rx) = mpsc::channel(8);
    let (workout, _events) = Workout::start(
        WorkoutConfig::new(ExerciseKind::Squat),
        store.clone(),
        None,
        frames_rx,
    )
    .unwrap();

    // updates from these ticks are still in flight when we stop
    tokio::time::sleep(Duration::from_millis(2500)).await;

    let before = tokio::time::Instant::now();
    let stopped = workout.stop().await.unwrap();
    assert!(before.elapsed() < Duration::from_secs(1));
    assert_eq!(stopped.summary.duration_seconds, 2);

    let outcome = stopped.completion.await.unwrap();
    assert!(matches!(outcome, CompletionOutcome::Completed { .. }));
    assert!(before.elapsed() >= latency);
}

#[tokio::test(start_paused = true)]
async fn closed_frame_source_keeps_timer_running() {
    let store = Arc::new(InMemorySessionStore::new());
    let (frames_tx, frames_rx) = mpsc::channel(8);
    let (workout, _events) = Workout::start(
        WorkoutConfig::new(ExerciseKind::Squat),
        store,
        None,
        frames_rx,
    )
    .unwrap();
    drop(frames_tx);

    tokio::time::sleep(Duration::from_millis(2500)).await;
    assert!(workout.is_running());
    let stopped = workout.stop().await.unwrap();
    assert_eq!(stopped.summary.duration_seconds, 2);
}

#[tokio::test(start_paused = true)]
async fn reps_count_while_the_session_is_being_created() {
    let store = Arc::new(InMemorySessionStore::new().with_latency(Duration::from_secs(4)));
    let (frames_tx, frames_rx) = mpsc::channel(4);
    let (workout, mut events) = Workout::start(
        WorkoutConfig::new(ExerciseKind::Pushup),
        store.clone(),
        None,
        frames_rx,
    )
    .unwrap();

    // detector at ~30fps that never waits on a full channel
    let detector = tokio::spawn(async move {
        let mut dropped = 0;
        for _ in 0..3 {
            for deg in [170.0, 120.0, 80.0, 120.0, 170.0] {
                for _ in 0..6 {
                    if frames_tx.try_send(pushup_frame(deg)).is_err() {
                        dropped += 1;
                    }
                    tokio::time::sleep(Duration::from_millis(33)).await;
                }
            }
        }
        dropped
    });
    let dropped = detector.await.unwrap();
    assert_eq!(dropped, 0);

    // still inside the 4s create latency
    tokio::time::sleep(Duration::from_millis(200)).await;
    let before_start: Vec<StoreCall> = store.calls();
    assert!(before_start.is_empty());

    // let the session come up; the first update carries the totals so far
    tokio::time::sleep(Duration::from_secs(2)).await;
    let stopped = workout.stop().await.unwrap();
    assert_eq!(stopped.summary.reps, 3);
    assert!(stopped.summary.session_id.is_some());

    let events = drain(&mut events).await;
    let first_rep = events
        .iter()
        .position(|event| matches!(event, WorkoutEvent::RepCompleted { .. }))
        .unwrap();
    let started = events
        .iter()
        .position(|event| matches!(event, WorkoutEvent::SessionStarted { .. }))
        .unwrap();
    assert!(first_rep < started);

    let outcome = stopped.completion.await.unwrap();
    assert!(matches!(outcome, CompletionOutcome::Completed { .. }));
    let first_update = store
        .calls()
        .into_iter()
        .find_map(|call| match call {
            StoreCall::Update { update, .. } => Some(update),
            _ => None,
        })
        .unwrap();
    assert_eq!(first_update.reps, Some(3));
}

#[tokio::test(start_paused = true)]
async fn dropping_the_handle_halts_without_saving() {
    let store = Arc::new(InMemorySessionStore::new());
    let (_frames_tx, frames_rx) = mpsc::channel(8);
    let (workout, mut events) = Workout::start(
        WorkoutConfig::new(ExerciseKind::Squat),
        store.clone(),
        None,
        frames_rx,
    )
    .unwrap();

    tokio::time::sleep(Duration::from_millis(1500)).await;
    drop(workout);

    // the driver exits, closing the event stream
    let events = drain(&mut events).await;
    assert_eq!(ticks(&events), vec![1]);
    tokio::time::sleep(Duration::from_secs(3)).await;
    assert!(!store.calls().iter().any(|call| matches!(
        call,
        StoreCall::Complete { .. } | StoreCall::SaveWorkout { .. }
    )));
}
