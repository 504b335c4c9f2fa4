//! Stage sequencing
//!
//! Analyze, plan, execute every task and assemble, writing images, the
//! layout contract and (in debug mode) the dump through an [`OutputSink`].

use std::collections::BTreeMap;

use log::{debug, info, warn};

use crate::analyzer::Analyzer;
use crate::assembler::{assemble, CanvasSpec};
use crate::executor::Executor;
use crate::model::{AnalysisTree, CaptureMetadata, CaptureOutcome, LayoutDocument, NodeId};
use crate::output::{plan_digest, DebugDump, OutputSink, RunSummary};
use crate::planner::{self, Plan, Violation};
use crate::session::RenderSession;
use crate::{CaptureConfig, Result};

/// Everything one run produced
#[derive(Debug, Clone)]
pub struct RunReport {
    pub tree: AnalysisTree,
    /// Plan with execution outcomes filled into the trace
    pub plan: Plan,
    pub violations: Vec<Violation>,
    pub layout: LayoutDocument,
    pub summary: RunSummary,
}

/// Load the configured document into `session` and run every stage
pub fn run<S, O>(session: &mut S, config: &CaptureConfig, sink: &mut O) -> Result<RunReport>
where
    S: RenderSession + ?Sized,
    O: OutputSink + ?Sized,
{
    config.validate()?;
    let source = config.document_url()?;
    info!("Loading {}", source);
    session.load_url(&source)?;
    run_loaded(session, config, &source, sink)
}

/// Run every stage against a document that is already loaded
pub fn run_loaded<S, O>(session: &mut S, config: &CaptureConfig, source: &str, sink: &mut O) -> Result<RunReport>
where
    S: RenderSession + ?Sized,
    O: OutputSink + ?Sized,
{
    let analyzer = Analyzer::new(config.analyzer.clone(), config.root_selector.clone());
    let tree = analyzer.analyze(session)?;
    run_analyzed(session, config, source, tree, sink)
}

/// Plan, execute and assemble an analysis taken from the loaded document
///
/// Per-task script, capture and render failures become trace outcomes; any
/// other error aborts the run.
pub fn run_analyzed<S, O>(
    session: &mut S,
    config: &CaptureConfig,
    source: &str,
    tree: AnalysisTree,
    sink: &mut O,
) -> Result<RunReport>
where
    S: RenderSession + ?Sized,
    O: OutputSink + ?Sized,
{
    let canvas = CanvasSpec::configured(config, source)?;
    if (tree.pixel_ratio - canvas.pixel_ratio).abs() > 1e-3 {
        warn!(
            "Page reports pixel ratio {} but {} was configured; the canvas keeps the configured value",
            tree.pixel_ratio, canvas.pixel_ratio
        );
    }

    let mut plan = planner::plan(&tree, &config.planner);
    let digest = plan_digest(&plan)?;
    let violations = planner::validate(&tree, &plan);
    for violation in &violations {
        warn!(
            "Plan check `{}` failed{}: {}",
            violation.check,
            violation
                .node_id
                .map(|id| format!(" at node {}", id))
                .unwrap_or_default(),
            violation.message
        );
    }

    let executor = Executor::new(&tree);
    let mut captures: BTreeMap<NodeId, CaptureMetadata> = BTreeMap::new();
    let mut outcomes: Vec<(NodeId, CaptureOutcome)> = Vec::with_capacity(plan.tasks.len());
    for task in &plan.tasks {
        let outcome = match executor.execute(session, task) {
            Ok(Some(output)) => {
                sink.write_image(&output.metadata.image, &output.png)?;
                debug!("Captured {} for node {}", output.metadata.image, task.node_id);
                captures.insert(task.node_id, output.metadata);
                CaptureOutcome::Captured
            }
            Ok(None) => CaptureOutcome::Vanished,
            Err(e) if !e.is_fatal() => {
                warn!("Capture of node {} ({}) failed: {}", task.node_id, task.dom_path, e);
                CaptureOutcome::Failed(e.to_string())
            }
            Err(e) => return Err(e),
        };
        outcomes.push((task.node_id, outcome));
    }

    let mut summary = RunSummary {
        source: source.to_string(),
        pixel_ratio: tree.pixel_ratio,
        node_count: tree.node_count(),
        task_count: plan.tasks.len(),
        captured: 0,
        vanished: 0,
        failed: 0,
        validation_issues: violations.len(),
        fonts_loaded: tree.stability.fonts_loaded,
        plan_digest: digest,
    };
    for (node_id, outcome) in outcomes {
        match outcome {
            CaptureOutcome::Captured => summary.captured += 1,
            CaptureOutcome::Vanished => summary.vanished += 1,
            CaptureOutcome::Failed(_) => summary.failed += 1,
        }
        if let Some(record) = plan.trace_for_mut(node_id) {
            record.outcome = Some(outcome);
        }
    }

    let layout = assemble(&tree, &captures, &canvas);
    sink.write_layout(&layout)?;

    if config.debug {
        DebugDump {
            tree: &tree,
            tasks: &plan.tasks,
            trace: &plan.trace,
            violations: &violations,
            summary: &summary,
        }
        .write(sink)?;
    }

    info!(
        "Run finished: {} captured, {} vanished, {} failed of {} tasks",
        summary.captured, summary.vanished, summary.failed, summary.task_count
    );
    Ok(RunReport {
        tree,
        plan,
        violations,
        layout,
        summary,
    })
}

/// Launch Chrome, run the pipeline into the configured output directory and
/// shut the browser down again
#[cfg(feature = "cdp")]
pub fn capture(config: &CaptureConfig) -> Result<RunReport> {
    use crate::cdp::CdpSession;
    use crate::output::FsSink;

    config.validate()?;
    let mut sink = FsSink::create(&config.output_dir)?;
    let mut session = CdpSession::launch(config)?;
    let report = run(&mut session, config, &mut sink);
    if let Err(e) = session.close() {
        warn!("Failed to close browser: {}", e);
    }
    report
}
