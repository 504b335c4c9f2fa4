//! Execution outcomes flowing into the trace, the summary and the layout

mod common;

use common::{canvas_root, node, tree, MemorySink, ScriptedSession};
use layercap::geometry::Rect;
use layercap::model::{AnalysisTree, CaptureOutcome, NodeId, NodeKind};
use layercap::{pipeline, CaptureConfig, Error, Viewport};
use serde_json::json;

fn two_images() -> AnalysisTree {
    tree(canvas_root(vec![
        node("img", NodeKind::Image, Rect::new(20.0, 20.0, 100.0, 80.0)),
        node("img", NodeKind::Image, Rect::new(200.0, 20.0, 100.0, 80.0)),
    ]))
}

fn config() -> CaptureConfig {
    CaptureConfig {
        document: "file:///page.html".into(),
        viewport: Viewport { width: 800, height: 600 },
        debug: true,
        ..Default::default()
    }
}

#[test]
fn vanished_and_failed_tasks_are_recorded_and_the_run_completes() {
    let tree = two_images();
    let first = tree.root.children[0].id;
    let second = tree.root.children[1].id;

    let mut session = ScriptedSession::new();
    session.measure(Rect::new(0.0, 0.0, 800.0, 600.0), json!([]));
    session.setup_responses.push_back(Ok(json!({ "ok": true, "vanished": true, "rect": null, "undo": [] })));
    session.setup_responses.push_back(Ok(json!({ "ok": false, "error": "detached", "undo": [] })));

    let mut sink = MemorySink::default();
    let report = pipeline::run_analyzed(&mut session, &config(), "file:///page.html", tree, &mut sink).unwrap();

    let summary = &report.summary;
    assert_eq!(summary.task_count, 3);
    assert_eq!((summary.captured, summary.vanished, summary.failed), (1, 1, 1));

    let outcome = |id: NodeId| {
        report
            .plan
            .trace
            .iter()
            .find(|r| r.node_id == id)
            .and_then(|r| r.outcome.clone())
    };
    assert_eq!(outcome(report.tree.root.id), Some(CaptureOutcome::Captured));
    assert_eq!(outcome(first), Some(CaptureOutcome::Vanished));
    assert!(matches!(outcome(second), Some(CaptureOutcome::Failed(ref msg)) if msg.contains("detached")));

    // Only the captured root produced an image; the layout still covers every node
    let root_image = report.plan.task_for(report.tree.root.id).unwrap().output_name.clone();
    assert_eq!(sink.images.keys().cloned().collect::<Vec<_>>(), vec![root_image.clone()]);
    let layout = sink.layout.as_ref().unwrap();
    assert_eq!(layout.root.background_image, Some(root_image));
    assert_eq!(layout.root.children.len(), 2);
    assert!(layout.root.children.iter().all(|c| c.capture.is_none()));

    assert_eq!(sink.debug["summary.json"]["failed"], 1);
    assert_eq!(sink.debug["trace.json"][1]["outcome"]["status"], "vanished");
    assert_eq!(session.revert_scripts().len(), 0);
}

#[test]
fn fatal_errors_abort_the_run_before_the_layout_is_written() {
    let tree = two_images();

    let mut session = ScriptedSession::new();
    session.measure(Rect::new(0.0, 0.0, 800.0, 600.0), json!([]));
    session
        .setup_responses
        .push_back(Err(Error::LoadError("target crashed".into())));

    let mut sink = MemorySink::default();
    let err = pipeline::run_analyzed(&mut session, &config(), "file:///page.html", tree, &mut sink).unwrap_err();
    assert!(matches!(err, Error::LoadError(_)));
    assert!(sink.layout.is_none());
    assert_eq!(sink.images.len(), 1);
}

#[test]
fn plan_digest_is_taken_before_outcomes_are_filled_in() {
    let mut captured = ScriptedSession::new();
    for _ in 0..3 {
        captured.measure(Rect::new(0.0, 0.0, 100.0, 80.0), json!([]));
    }
    let mut failing = ScriptedSession::new();
    failing.fail_capture = true;
    for _ in 0..3 {
        failing.measure(Rect::new(0.0, 0.0, 100.0, 80.0), json!([]));
    }

    let a = pipeline::run_analyzed(&mut captured, &config(), "file:///page.html", two_images(), &mut MemorySink::default()).unwrap();
    let b = pipeline::run_analyzed(&mut failing, &config(), "file:///page.html", two_images(), &mut MemorySink::default()).unwrap();
    assert_eq!(b.summary.failed, 3);
    assert_eq!(a.summary.plan_digest, b.summary.plan_digest);
    assert_ne!(a.plan.trace, b.plan.trace);
}
