//! Capture execution
//!
//! Each [`CaptureTask`] runs as one transaction against the live session:
//! the setup operations from [`ops::build`] are applied by a single page
//! script that records undo entries, the region is screenshotted, and the
//! recorded mutations are reverted whatever happened in between.

pub mod clip;
pub mod ops;
mod scripts;
pub mod transaction;

use std::collections::BTreeMap;

use log::{debug, warn};
use serde::Deserialize;

use crate::geometry::{Point, Rect, Size};
use crate::model::{
    AnalysisNode, AnalysisTree, CaptureFrame, CaptureMetadata, CaptureMode, CaptureTask, NodeId,
};
use crate::session::RenderSession;
use crate::{Error, Result};

pub use clip::{png_dimensions, range_part_rect, ClipPlan};
pub use ops::{SetupOp, Target};
pub use transaction::{Transaction, UndoRecord};

/// Image bytes and metadata for one executed task
#[derive(Debug, Clone, PartialEq)]
pub struct CaptureOutput {
    pub png: Vec<u8>,
    pub metadata: CaptureMetadata,
}

#[derive(Debug, Deserialize)]
struct SetupResult {
    ok: bool,
    #[serde(default)]
    vanished: bool,
    rect: Option<Rect>,
    error: Option<String>,
    #[serde(default)]
    undo: Vec<UndoRecord>,
}

/// Runs capture tasks for one analysis tree
pub struct Executor<'t> {
    tree: &'t AnalysisTree,
    nodes: BTreeMap<NodeId, &'t AnalysisNode>,
    parents: BTreeMap<NodeId, NodeId>,
}

impl<'t> Executor<'t> {
    pub fn new(tree: &'t AnalysisTree) -> Self {
        let nodes = tree.index();
        let parents = nodes
            .values()
            .flat_map(|n| n.children.iter().map(move |c| (c.id, n.id)))
            .collect();
        Self { tree, nodes, parents }
    }

    /// Capture one task
    ///
    /// Returns `Ok(None)` when the node vanished or its live rect is
    /// degenerate. Page state is restored before returning in every case.
    pub fn execute<S: RenderSession + ?Sized>(
        &self,
        session: &mut S,
        task: &CaptureTask,
    ) -> Result<Option<CaptureOutput>> {
        let node = self
            .nodes
            .get(&task.node_id)
            .copied()
            .ok_or_else(|| Error::CaptureError(format!("Task {} names unknown node {}", task.ordinal, task.node_id)))?;
        let owner = match task.mode {
            CaptureMode::RangePart => self.parents.get(&node.id).and_then(|id| self.nodes.get(id)).copied(),
            _ => None,
        };
        let padding = node.style.outpaint_padding() / self.tree.pixel_ratio;
        let (ops, subject) = ops::build(task, node, owner, padding);
        debug!(
            "Task {} ({}, {}): {} setup ops",
            task.ordinal,
            task.dom_path,
            task.mode,
            ops.len()
        );

        let mut txn = Transaction::new(task.ordinal);
        let result = self.run(session, task, node, owner, &ops, &subject, &mut txn);
        if !txn.is_empty() {
            txn.revert(session);
        }
        result
    }

    #[allow(clippy::too_many_arguments)]
    fn run<S: RenderSession + ?Sized>(
        &self,
        session: &mut S,
        task: &CaptureTask,
        node: &AnalysisNode,
        owner: Option<&AnalysisNode>,
        ops: &[SetupOp],
        subject: &Target,
        txn: &mut Transaction,
    ) -> Result<Option<CaptureOutput>> {
        let raw = match session.evaluate_json(&scripts::apply(txn.id(), ops, subject), false) {
            Ok(raw) => raw,
            Err(e) => {
                txn.mark_unreported();
                return Err(e);
            }
        };
        let setup: SetupResult = match serde_json::from_value(raw) {
            Ok(setup) => setup,
            Err(e) => {
                txn.mark_unreported();
                return Err(Error::ScriptError(format!("Unexpected setup result: {}", e)));
            }
        };
        txn.record(setup.undo);
        if !setup.ok {
            return Err(Error::ScriptError(
                setup.error.unwrap_or_else(|| "setup failed".to_string()),
            ));
        }
        let live = match setup.rect {
            Some(rect) if !setup.vanished && rect.has_area() && rect.is_finite() => rect,
            _ => {
                debug!("Task {}: {} vanished", task.ordinal, task.dom_path);
                return Ok(None);
            }
        };

        let plan = self.clip_plan(task, node, owner, live);
        let png = capture_with_room(session, &plan)?;
        let (image_width, image_height) = png_dimensions(&png)
            .ok_or_else(|| Error::CaptureError("Screenshot is not a PNG".to_string()))?;

        let ratio = self.tree.pixel_ratio;
        let metadata = CaptureMetadata {
            node_id: node.id,
            image: task.output_name.clone(),
            image_width,
            image_height,
            content_offset: Point {
                x: plan.content_offset.x * ratio,
                y: plan.content_offset.y * ratio,
            },
            content_size: Size {
                width: plan.content_size.width * ratio,
                height: plan.content_size.height * ratio,
            },
            mode: task.mode,
            rotation_baked: task.rotation_baked,
            rotation_angle: task.rotation_angle,
            opacity_decoupled: task.modifiers.decouple_opacity,
            render_opacity: task.render_opacity,
        };
        Ok(Some(CaptureOutput { png, metadata }))
    }

    fn clip_plan(&self, task: &CaptureTask, node: &AnalysisNode, owner: Option<&AnalysisNode>, live: Rect) -> ClipPlan {
        let padding = node.style.outpaint_padding() / self.tree.pixel_ratio;
        match (task.frame, task.mode, owner) {
            (CaptureFrame::Canvas, _, _) => ClipPlan::canvas(self.tree.viewport),
            (_, CaptureMode::RangePart, Some(owner)) => {
                let part = range_part_rect(&node.rect, &owner.rect, &live, self.tree.pixel_ratio);
                ClipPlan::around(part, padding)
            }
            _ => ClipPlan::around(live, padding),
        }
    }
}

/// Screenshot a clip, enlarging the viewport for the duration when needed
fn capture_with_room<S: RenderSession + ?Sized>(session: &mut S, plan: &ClipPlan) -> Result<Vec<u8>> {
    let current = session.viewport()?;
    let enlarged = plan.required_viewport(current);
    if let Some(size) = enlarged {
        debug!(
            "Enlarging viewport to {}x{} for clip {:?}",
            size.width, size.height, plan.clip
        );
        session.set_viewport(size)?;
    }
    let shot = session.capture_region(&plan.clip);
    if enlarged.is_some() {
        if let Err(e) = session.set_viewport(current) {
            warn!("Failed to restore viewport to {}x{}: {}", current.width, current.height, e);
        }
    }
    shot
}
