//! Structural checks over a finished plan

use std::collections::BTreeSet;

use serde::Serialize;

use crate::model::{AnalysisTree, CaptureMode, Decision, NodeId};
use crate::planner::Plan;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Violation {
    pub node_id: Option<NodeId>,
    pub check: &'static str,
    pub message: String,
}

impl Violation {
    fn at(node_id: NodeId, check: &'static str, message: impl Into<String>) -> Self {
        Self {
            node_id: Some(node_id),
            check,
            message: message.into(),
        }
    }
}

/// Check a plan against the tree it was made from; an empty list means valid
pub fn validate(tree: &AnalysisTree, plan: &Plan) -> Vec<Violation> {
    let mut violations = Vec::new();

    for task in &plan.tasks {
        let id = task.node_id;
        if task.reasons.is_empty() {
            violations.push(Violation::at(id, "reasons", "task has no reasons"));
        }
        for modifier in task.modifiers.active() {
            if !task.has_token(modifier.token()) {
                violations.push(Violation::at(
                    id,
                    "modifier-token",
                    format!("modifier `{}` set without its reason token", modifier.token()),
                ));
            }
        }
        if task.rotation_baked && task.mode != CaptureMode::InPlace {
            violations.push(Violation::at(id, "rotation-bake", format!("baked rotation in {} mode", task.mode)));
        }
        if task.modifiers.preserve_scene_underlay && task.mode != CaptureMode::InPlace {
            violations.push(Violation::at(id, "scene-underlay", "preserveSceneUnderlay outside inPlace"));
        }
        if task.modifiers.suppress_ancestor_paint && task.modifiers.preserve_scene_underlay {
            violations.push(Violation::at(
                id,
                "ancestor-paint",
                "suppressAncestorPaint combined with preserveSceneUnderlay",
            ));
        }
        if task.modifiers.decouple_opacity && task.render_opacity >= 1.0 {
            violations.push(Violation::at(id, "opacity", "decoupleOpacity with full render opacity"));
        }
        if task.mode == CaptureMode::BackgroundStack && task.overlay_ids.is_empty() {
            violations.push(Violation::at(id, "background-stack", "backgroundStack without overlays"));
        }
        if task.mode == CaptureMode::RangePart {
            let is_part = tree.node(id).and_then(|n| n.range_part()).is_some();
            if !is_part || task.range_part.is_none() {
                violations.push(Violation::at(id, "range-part", "rangePart task for a non range node"));
            }
        }
    }

    let expected: Vec<NodeId> = tree.root.iter().map(|n| n.id).collect();
    let traced: Vec<NodeId> = plan.trace.iter().map(|r| r.node_id).collect();
    if expected != traced {
        violations.push(Violation {
            node_id: None,
            check: "trace-order",
            message: format!(
                "trace covers {} records, expected {} in pre-order",
                traced.len(),
                expected.len()
            ),
        });
    }

    let captured: BTreeSet<NodeId> = plan
        .trace
        .iter()
        .filter(|r| r.decision == Decision::Capture)
        .map(|r| r.node_id)
        .collect();
    for task in &plan.tasks {
        if !captured.contains(&task.node_id) {
            violations.push(Violation::at(task.node_id, "trace-capture", "task without a capture trace record"));
        }
    }

    violations
}
