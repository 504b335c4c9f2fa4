//! Background-stack detection over shallow sibling groups
//!
//! A base is a painted, translucent, near full-bleed layer anchored at its
//! parent or the viewport origin. Later siblings that overlap nearly all of it are its
//! overlays; base and overlays are captured together as one composite, so
//! the overlays (and everything below them) get no tasks of their own.

use std::collections::BTreeMap;

use log::debug;

use crate::geometry::Rect;
use crate::model::{AnalysisNode, AnalysisTree, NodeId, NodeKind};
use crate::planner::PlannerSettings;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct StackIndex {
    bases: BTreeMap<NodeId, Vec<NodeId>>,
    suppressed: BTreeMap<NodeId, NodeId>,
}

impl StackIndex {
    pub fn overlays_of(&self, base: NodeId) -> Option<&[NodeId]> {
        self.bases.get(&base).map(Vec::as_slice)
    }

    /// Base that swallowed this node into its composite
    pub fn suppressing_base(&self, node: NodeId) -> Option<NodeId> {
        self.suppressed.get(&node).copied()
    }

    pub fn is_empty(&self) -> bool {
        self.bases.is_empty()
    }
}

pub fn detect(tree: &AnalysisTree, settings: &PlannerSettings) -> StackIndex {
    let mut index = StackIndex::default();
    let viewport = tree.device_viewport();
    let tolerance = settings.stack_anchor_tolerance * tree.pixel_ratio;

    // (parent, depth, inside a propagating composition effect)
    let mut pending: Vec<(&AnalysisNode, usize, bool)> = vec![(&tree.root, 0, false)];
    while let Some((parent, depth, composed)) = pending.pop() {
        let composed = composed
            || parent
                .style
                .composition_effects()
                .iter()
                .any(|e| e.propagates_to_descendants());
        if !composed {
            group(parent, &viewport, tolerance, settings, &mut index);
        }
        if depth < settings.stack_max_parent_depth {
            for child in parent.children.iter().rev() {
                pending.push((child, depth + 1, composed));
            }
        }
    }
    index
}

fn layer_candidate(node: &AnalysisNode) -> bool {
    node.synthetic.is_none()
        && !node.is_mask
        && node.kind != NodeKind::Text
        && node.style.composition_effects().is_empty()
}

fn is_base(
    node: &AnalysisNode,
    parent: &AnalysisNode,
    viewport: &Rect,
    tolerance: f64,
    settings: &PlannerSettings,
) -> bool {
    let coverage = node.rect.intersection_area(viewport) / viewport.area().max(f64::EPSILON);
    let near = |a: f64, b: f64| (a - b).abs() <= tolerance;
    let anchored = (near(node.rect.x, parent.rect.x) && near(node.rect.y, parent.rect.y))
        || (near(node.rect.x, viewport.x) && near(node.rect.y, viewport.y));
    // The base carries the composite; a base without paint would never be captured
    let paints = node.style.has_paint() || node.kind == NodeKind::Image;
    layer_candidate(node)
        && paints
        && coverage >= settings.stack_min_coverage
        && node.style.is_translucent()
        && anchored
}

fn group(
    parent: &AnalysisNode,
    viewport: &Rect,
    tolerance: f64,
    settings: &PlannerSettings,
    index: &mut StackIndex,
) {
    let siblings = &parent.children;
    let mut claimed: Vec<NodeId> = Vec::new();

    for base in siblings {
        if claimed.contains(&base.id) || !is_base(base, parent, viewport, tolerance, settings) {
            continue;
        }
        let threshold = base.rect.area() * settings.stack_overlap_ratio;
        let overlays: Vec<NodeId> = siblings
            .iter()
            .filter(|other| other.id != base.id && !claimed.contains(&other.id))
            .filter(|other| !index.bases.contains_key(&other.id))
            .filter(|other| layer_candidate(other) && other.style.has_paint())
            .filter(|other| other.rect.intersection_area(&base.rect) >= threshold)
            .map(|other| other.id)
            .collect();
        if overlays.is_empty() {
            continue;
        }
        debug!(
            "Background stack at node {} with overlays {:?}",
            base.id, overlays
        );
        claimed.push(base.id);
        for overlay in siblings.iter().filter(|s| overlays.contains(&s.id)) {
            claimed.push(overlay.id);
            for node in overlay.iter() {
                index.suppressed.insert(node.id, base.id);
            }
        }
        index.bases.insert(base.id, overlays);
    }
}
