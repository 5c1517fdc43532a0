//! End-to-end correlator scenarios, driven through the public `Recorder`
//! facade against the in-memory `DryRunActivitySource` — no OTLP collector
//! required.

use nanolite_agent::identifier::ProcessId;
use nanolite_agent::otlp_backend::DryRunActivitySource;
use nanolite_agent::recorder::Recorder;
use nanolite_agent::registry::EventCode;
use nanolite_agent::span_context::{ExportedSpan, TagValue};
use serde_json::json;
use std::sync::Arc;

fn tag<'a>(span: &'a ExportedSpan, key: &str) -> Option<&'a TagValue> {
    span.tags.iter().find(|(k, _)| k == key).map(|(_, v)| v)
}

/// Scenario A: parent process launches a child, the child performs an
/// action, then both terminate. Expect two root-linked process spans and
/// one actor span, all exported with correct parent linkage.
#[test]
fn scenario_a_parent_child_launch_action_terminate() {
    let backend = Arc::new(DryRunActivitySource::default());
    let mut recorder = Recorder::new(backend.clone());

    recorder.on_launch(ProcessId(100), None, "parent.exe", json!({"e": 1}));
    recorder.on_launch(ProcessId(200), Some(ProcessId(100)), "child.exe", json!({"e": 2}));
    recorder.on_action(
        ProcessId(200),
        "C:/Windows/System32/cmd.exe",
        EventCode::Sysmon11,
        json!({"e": 3}),
    );
    recorder.on_terminate(ProcessId(200), json!({"e": 4}));
    recorder.on_terminate(ProcessId(100), json!({"e": 5}));

    let exported = backend.exported();
    assert_eq!(exported.len(), 3, "two process spans + one actor span");

    let parent = exported.iter().find(|s| s.name == "parent.exe").unwrap();
    let child = exported.iter().find(|s| s.name == "child.exe").unwrap();
    let actor = exported
        .iter()
        .find(|s| s.name != "parent.exe" && s.name != "child.exe")
        .unwrap();

    assert!(parent.ids.parent_span_id.is_none());
    assert_eq!(child.ids.parent_span_id, Some(parent.ids.span_id));
    assert_eq!(child.ids.trace_id, parent.ids.trace_id);
    assert_eq!(actor.ids.parent_span_id, Some(child.ids.span_id));
}

/// Scenario B: an action arrives for a pid that never launched (filtered or
/// missed). It is dropped silently, not treated as an error.
#[test]
fn scenario_b_action_before_launch_is_dropped() {
    let backend = Arc::new(DryRunActivitySource::default());
    let mut recorder = Recorder::new(backend.clone());

    recorder.on_action(
        ProcessId(999),
        "x.txt",
        EventCode::Sysmon11,
        json!({"e": 1}),
    );

    assert!(backend.is_empty());
}

/// Scenario C: a process reports a parent_pid the registry has never seen
/// (the parent launched before the agent started, or was filtered). The
/// child becomes a root span with its own fresh trace-id.
#[test]
fn scenario_c_orphan_parent_becomes_root() {
    let backend = Arc::new(DryRunActivitySource::default());
    let mut recorder = Recorder::new(backend.clone());

    recorder.on_launch(ProcessId(5), Some(ProcessId(4)), "orphan.exe", json!({"e": 1}));
    recorder.on_terminate(ProcessId(5), json!({"e": 2}));

    let exported = backend.exported();
    assert_eq!(exported.len(), 1);
    assert!(exported[0].ids.parent_span_id.is_none());
}

/// Scenario D: the agent shuts down while a process is still live. Flush
/// must still stop and export it.
#[test]
fn scenario_d_shutdown_with_in_flight_process() {
    let backend = Arc::new(DryRunActivitySource::default());
    let mut recorder = Recorder::new(backend.clone());

    recorder.on_launch(ProcessId(7), None, "still-running.exe", json!({"e": 1}));
    assert!(backend.is_empty());

    recorder.flush();

    let exported = backend.exported();
    assert_eq!(exported.len(), 1);
    assert_eq!(exported[0].name, "still-running.exe");
}

/// Scenario E: repeated actions against the same artifact and direction
/// coalesce into a single actor span, with log.count reflecting every
/// attached log record.
#[test]
fn scenario_e_actor_coalescing_across_directions() {
    let backend = Arc::new(DryRunActivitySource::default());
    let mut recorder = Recorder::new(backend.clone());

    recorder.on_launch(ProcessId(10), None, "noisy.exe", json!({"e": 1}));
    for i in 0..5 {
        recorder.on_action(
            ProcessId(10),
            "C:/Windows/System32/cmd.exe",
            EventCode::Sysmon11,
            json!({"e": i}),
        );
    }
    recorder.on_terminate(ProcessId(10), json!({"e": 99}));

    let exported = backend.exported();
    let actor = exported.iter().find(|s| s.name != "noisy.exe").unwrap();
    assert_eq!(tag(actor, "log.count"), Some(&TagValue::Int(5)));
}

/// Duplicate launches re-attach the log without re-parenting or creating a
/// second span.
#[test]
fn duplicate_launch_does_not_create_second_span() {
    let backend = Arc::new(DryRunActivitySource::default());
    let mut recorder = Recorder::new(backend.clone());

    recorder.on_launch(ProcessId(1), None, "a.exe", json!({"e": 1}));
    recorder.on_launch(ProcessId(1), None, "a.exe", json!({"e": 2}));
    recorder.flush();

    assert_eq!(backend.exported().len(), 1);
}
