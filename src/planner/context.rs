//! Per-node decision context and the ancestry state carried down the walk

use crate::geometry::{CornerRadii, Rect};
use crate::model::{AnalysisNode, ClipSummary, NodeId};
use crate::planner::stack::StackIndex;
use crate::planner::PlannerSettings;

/// An ancestor whose overflow clips its descendants
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClipFrame {
    pub id: NodeId,
    pub rect: Rect,
    pub radii: CornerRadii,
}

impl ClipFrame {
    pub fn of(node: &AnalysisNode) -> Self {
        Self {
            id: node.id,
            rect: node.rect,
            radii: node.style.border_radius,
        }
    }

    pub fn summarize(&self, rect: &Rect) -> ClipSummary {
        ClipSummary {
            ancestor_id: self.id,
            rect: self.rect,
            rounded: self.radii.is_rounded(),
            fully_inside: self.rect.contains(rect),
            visible_fraction: rect.visible_fraction_in(&self.rect),
        }
    }
}

/// State accumulated from the root down to the node being decided
#[derive(Debug, Clone, Default)]
pub(crate) struct Ancestry {
    pub clips: Vec<ClipFrame>,
    pub rotation: f64,
    pub composition: Option<NodeId>,
    pub depth: usize,
}

impl Ancestry {
    /// State seen by the children of `node`
    pub fn descend(&self, node: &AnalysisNode, epsilon: f64) -> Ancestry {
        let mut next = self.clone();
        if node.style.clips_content() {
            next.clips.push(ClipFrame::of(node));
        }
        if node.rotation.abs() > epsilon {
            next.rotation += node.rotation;
        }
        if node
            .style
            .composition_effects()
            .iter()
            .any(|effect| effect.propagates_to_descendants())
        {
            next.composition = Some(node.id);
        }
        next.depth += 1;
        next
    }
}

/// Immutable view every rule is evaluated against
pub struct DecisionContext<'a> {
    pub node: &'a AnalysisNode,
    pub depth: usize,
    /// Device-pixel viewport anchored at the origin
    pub viewport: Rect,
    pub clip: Option<ClipFrame>,
    pub ancestor_rotation: f64,
    pub ancestor_composition: Option<NodeId>,
    pub stacks: &'a StackIndex,
    pub settings: &'a PlannerSettings,
}

impl<'a> DecisionContext<'a> {
    pub(crate) fn new(
        node: &'a AnalysisNode,
        ancestry: &Ancestry,
        viewport: Rect,
        stacks: &'a StackIndex,
        settings: &'a PlannerSettings,
    ) -> Self {
        Self {
            node,
            depth: ancestry.depth,
            viewport,
            clip: ancestry.clips.last().copied(),
            ancestor_rotation: ancestry.rotation,
            ancestor_composition: ancestry.composition,
            stacks,
            settings,
        }
    }

    pub fn clip_summary(&self) -> Option<ClipSummary> {
        self.clip.map(|frame| frame.summarize(&self.node.rect))
    }

    /// Fraction of the node visible through its nearest clip, or the viewport
    pub fn visible_fraction(&self) -> f64 {
        let frame = self.clip.map(|c| c.rect).unwrap_or(self.viewport);
        self.node.rect.visible_fraction_in(&frame)
    }

    pub fn viewport_area_ratio(&self) -> f64 {
        let viewport = self.viewport.area();
        if viewport <= 0.0 {
            return 0.0;
        }
        self.node.rect.area() / viewport
    }

    /// Class names carrying one of the configured interaction-state hints
    pub fn has_state_layer_hint(&self) -> bool {
        self.node.classes().any(|class| {
            let class = class.to_ascii_lowercase();
            self.settings
                .state_layer_hints
                .iter()
                .any(|hint| class.contains(hint.as_str()))
        })
    }
}
