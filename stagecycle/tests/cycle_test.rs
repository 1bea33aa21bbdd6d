//! End-to-end behavior of the stage-cycle engine.

use pretty_assertions::assert_eq;
use serde_json::json;
use stagecycle::prelude::*;
use stagecycle::testing::{FlakyStage, InvocationLog};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[tokio::test]
async fn init_work_done_produces_output() {
    let work_calls = Arc::new(AtomicUsize::new(0));
    let counter = work_calls.clone();
    let done = FlakyStage::steady("done", Indicator::Over);
    let done_calls = done.counter();

    let mut engine = CycleBuilder::new()
        .fn_stage("init", |calls: &u32| Ok(run_next(*calls)))
        .fn_stage("work", move |calls: &u32| {
            counter.fetch_add(1, Ordering::SeqCst);
            if *calls == 0 {
                Ok(run_again(calls + 1))
            } else {
                Ok(over(calls + 1, Some(json!(42))))
            }
        })
        .stage(done)
        .build(0)
        .unwrap();

    let output = engine
        .run_until_complete(10, Duration::ZERO)
        .await
        .unwrap();

    assert_eq!(output, Some(json!(42)));
    assert!(engine.is_over());
    assert_eq!(work_calls.load(Ordering::SeqCst), 2);
    assert_eq!(done_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn cycle_terminates_within_timeout() {
    let mut engine = CycleBuilder::new()
        .fn_stage("count", |n: &u32| {
            if *n >= 5 {
                Ok(over(*n, None))
            } else {
                Ok(run_next(n + 1))
            }
        })
        .fn_stage("echo", |n: &u32| Ok(run_next(*n)))
        .build(0)
        .unwrap();

    engine
        .run_until_complete_with(&RunConfig::new().with_timeout_ticks(50))
        .await
        .unwrap();
    assert!(engine.is_over());
    assert_eq!(*engine.context(), 5);
}

#[tokio::test]
async fn cycle_that_never_ends_times_out() {
    let mut engine = CycleBuilder::new()
        .fn_stage("spin", |n: &u32| Ok(run_again(n + 1)))
        .build(0)
        .unwrap();

    let err = engine.run_until_complete(7, Duration::ZERO).await.unwrap_err();
    assert!(err.is_timeout());
    assert_eq!(*engine.context(), 7);
}

#[test]
fn tolerated_failures_repeat_the_stage() {
    let flaky = FlakyStage::new("flaky", 3).then(Indicator::Over);
    let calls = flaky.counter();

    let mut engine = CycleBuilder::new().stage(flaky).build(()).unwrap();

    for _ in 0..3 {
        let status = engine.run().unwrap();
        assert_eq!(status.indicator, Indicator::RunAgain);
        assert_eq!(status.stage.as_deref(), Some("flaky"));
    }
    engine.run().unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 4);
    assert!(engine.is_over());
}

#[test]
fn fatal_failure_propagates_with_status_unchanged() {
    let mut engine = CycleBuilder::new()
        .fn_stage("first", |_: &u8| -> anyhow::Result<ActionOutput<u8>> {
            anyhow::bail!("cannot start")
        })
        .build(9)
        .unwrap();
    let before = engine.status().clone();

    let err = engine.run().unwrap_err();

    assert_eq!(err.stage(), Some("first"));
    assert!(err.to_string().contains("cannot start"));
    assert_eq!(engine.status(), &before);
}

#[test]
fn jump_invokes_target_next() {
    let log = InvocationLog::default();
    let mut engine = CycleBuilder::new()
        .stage(FlakyStage::steady("a", Indicator::Run).jumping_to("c").with_log(log.clone()))
        .stage(FlakyStage::steady("b", Indicator::Run).with_log(log.clone()))
        .stage(FlakyStage::steady("c", Indicator::Over).with_log(log.clone()))
        .build(())
        .unwrap();

    engine.run().unwrap();
    engine.run().unwrap();

    assert_eq!(*log.lock(), vec!["a".to_string(), "c".to_string()]);
    assert!(engine.is_over());
}

#[test]
fn wait_pauses_until_resumed() {
    let mut engine = CycleBuilder::new()
        .stage(FlakyStage::steady("pause", Indicator::Wait))
        .stage(FlakyStage::steady("finish", Indicator::Over))
        .build(())
        .unwrap();

    engine.run().unwrap();
    for _ in 0..3 {
        assert_eq!(engine.run().unwrap().indicator, Indicator::Wait);
    }

    engine.resume();
    engine.run().unwrap();
    assert!(engine.is_over());
    assert_eq!(engine.status().stage.as_deref(), Some("finish"));
}

#[tokio::test]
async fn reducer_sees_collected_outputs() {
    let mut engine = CycleBuilder::new()
        .fn_stage("emit", |n: &u32| {
            let out = ActionOutput::new(n + 1, if *n >= 2 { Indicator::Over } else { Indicator::RunAgain });
            Ok(out.with_output(json!(n * 10)))
        })
        .reducer(|_last, collected| {
            let sum: u64 = collected
                .as_array()?
                .iter()
                .filter_map(serde_json::Value::as_u64)
                .sum();
            Some(json!(sum))
        })
        .build(0)
        .unwrap();

    let output = engine.run_until_complete(10, Duration::ZERO).await.unwrap();
    assert_eq!(output, Some(json!(30)));
    assert_eq!(engine.outputs(), &[json!(0), json!(10), json!(20)]);
}
