//! Capture planning
//!
//! [`plan`] is a pure function of the analysis tree and the settings: it
//! walks the tree once in pre-order, evaluates the rule cascade for every
//! node and returns the ordered capture tasks together with one rule-trace
//! record per node. Identical input always yields an identical plan.

mod context;
mod reason;
mod rules;
mod stack;
mod validate;

use log::{debug, info};
use serde::Serialize;

use crate::model::{
    AnalysisNode, AnalysisTree, CaptureTask, Decision, DomPath, NodeId, RuleTraceRecord,
};

pub use context::{ClipFrame, DecisionContext};
pub use reason::Reason;
pub use rules::{Draft, Flow, Rule, RULES};
pub use stack::StackIndex;
pub use validate::{validate, Violation};

use context::Ancestry;

/// Planner thresholds
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlannerSettings {
    /// Visible fraction at or below which a state layer is skipped
    pub state_layer_max_visible_fraction: f64,
    /// Class-name fragments that mark interaction-state layers
    pub state_layer_hints: Vec<String>,
    /// Upper bound for a "low alpha" container background
    pub low_alpha_max: f64,
    pub low_alpha_min_area_ratio: f64,
    pub low_alpha_max_area_ratio: f64,
    /// Border alpha at or below which an underlay border counts as faint
    pub faint_border_max_alpha: f64,
    /// Minimum viewport coverage of a background-stack base
    pub stack_min_coverage: f64,
    /// Share of the base area an overlay must cover
    pub stack_overlap_ratio: f64,
    /// Anchoring slack for a stack base, in CSS pixels
    pub stack_anchor_tolerance: f64,
    /// Deepest parent whose children are considered for stacks
    pub stack_max_parent_depth: usize,
    /// Rotations below this many degrees are ignored
    pub rotation_epsilon: f64,
}

impl Default for PlannerSettings {
    fn default() -> Self {
        Self {
            state_layer_max_visible_fraction: 0.05,
            state_layer_hints: ["hover", "active", "focus", "transition", "ripple", "state-layer"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            low_alpha_max: 0.12,
            low_alpha_min_area_ratio: 0.002,
            low_alpha_max_area_ratio: 0.35,
            faint_border_max_alpha: 0.25,
            stack_min_coverage: 0.7,
            stack_overlap_ratio: 0.92,
            stack_anchor_tolerance: 1.0,
            stack_max_parent_depth: 1,
            rotation_epsilon: 0.01,
        }
    }
}

/// Ordered capture tasks plus the audit trail that produced them
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Plan {
    pub tasks: Vec<CaptureTask>,
    pub trace: Vec<RuleTraceRecord>,
}

impl Plan {
    pub fn task_for(&self, node: NodeId) -> Option<&CaptureTask> {
        self.tasks.iter().find(|t| t.node_id == node)
    }

    pub fn trace_for_mut(&mut self, node: NodeId) -> Option<&mut RuleTraceRecord> {
        self.trace.iter_mut().find(|r| r.node_id == node)
    }
}

pub fn plan(tree: &AnalysisTree, settings: &PlannerSettings) -> Plan {
    let stacks = stack::detect(tree, settings);
    let mut planner = Planner {
        tree,
        settings,
        stacks: &stacks,
        viewport: tree.device_viewport(),
        plan: Plan {
            tasks: Vec::new(),
            trace: Vec::with_capacity(tree.node_count()),
        },
    };
    planner.visit(&tree.root, &Ancestry::default());
    let plan = planner.plan;
    info!(
        "Planned {} capture tasks over {} nodes",
        plan.tasks.len(),
        plan.trace.len()
    );
    plan
}

struct Planner<'a> {
    tree: &'a AnalysisTree,
    settings: &'a PlannerSettings,
    stacks: &'a StackIndex,
    viewport: crate::geometry::Rect,
    plan: Plan,
}

impl<'a> Planner<'a> {
    fn visit(&mut self, node: &AnalysisNode, ancestry: &Ancestry) {
        let ctx = DecisionContext::new(node, ancestry, self.viewport, self.stacks, self.settings);
        let draft = rules::decide(&ctx);
        self.record(&ctx, draft);

        let below = ancestry.descend(node, self.settings.rotation_epsilon);
        for child in &node.children {
            self.visit(child, &below);
        }
    }

    fn path_of(&self, id: NodeId) -> DomPath {
        self.tree
            .node(id)
            .map(|n| n.dom_path.clone())
            .unwrap_or_default()
    }

    fn record(&mut self, ctx: &DecisionContext<'_>, draft: Draft) {
        let node = ctx.node;
        debug!(
            "node {} <{}> -> {:?} {:?} [{}]",
            node.id,
            node.tag,
            draft.decision,
            draft.mode,
            draft
                .reasons
                .iter()
                .map(|r| r.to_string())
                .collect::<Vec<_>>()
                .join(", ")
        );

        self.plan.trace.push(RuleTraceRecord {
            node_id: node.id,
            dom_path: node.dom_path.clone(),
            tag: node.tag.clone(),
            kind: node.kind,
            decision: draft.decision,
            mode: draft.mode,
            modifiers: draft.modifiers,
            rotation_baked: draft.rotation_bake.is_some(),
            rotation_angle: draft.rotation_bake.unwrap_or(node.rotation),
            render_opacity: draft.render_opacity,
            reasons: draft.reasons.clone(),
            clip_ancestor: ctx.clip_summary(),
            outcome: None,
        });

        if draft.decision == Decision::Skip {
            return;
        }
        let Some(mode) = draft.mode else {
            return;
        };
        let ordinal = self.plan.tasks.len();
        let overlay_paths = draft.overlays.iter().map(|id| self.path_of(*id)).collect();
        self.plan.tasks.push(CaptureTask {
            ordinal,
            node_id: node.id,
            dom_path: node.dom_path.clone(),
            output_name: output_name(ordinal, &node.output_tag()),
            mode,
            frame: draft.frame,
            modifiers: draft.modifiers,
            rotation_baked: draft.rotation_bake.is_some(),
            rotation_angle: draft.rotation_bake.unwrap_or(node.rotation),
            render_opacity: draft.render_opacity,
            range_part: draft.range_part,
            overlay_ids: draft.overlays,
            overlay_paths,
            reasons: draft.reasons,
        });
    }
}

/// `{ordinal:03}_{tag}.png`, with the tag reduced to file-name safe characters
pub fn output_name(ordinal: usize, tag: &str) -> String {
    let safe: String = tag
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c.to_ascii_lowercase() } else { '_' })
        .collect();
    format!("{ordinal:03}_{safe}.png")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_names_embed_ordinal_and_tag() {
        assert_eq!(output_name(7, "img"), "007_img.png");
        assert_eq!(output_name(12, "input-thumb"), "012_input-thumb.png");
        assert_eq!(output_name(1, "svg:path"), "001_svg_path.png");
    }

    #[test]
    fn default_settings_carry_state_layer_hints() {
        let settings = PlannerSettings::default();
        assert!(settings.state_layer_hints.iter().any(|h| h == "ripple"));
        assert_eq!(settings.stack_max_parent_depth, 1);
    }
}
