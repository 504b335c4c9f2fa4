//! Layout assembly
//!
//! Merges the analysis tree with the metadata of executed captures into the
//! persisted [`LayoutDocument`].

use std::collections::BTreeMap;

use crate::geometry::{Rect, Size};
use crate::model::{AnalysisNode, AnalysisTree, CaptureMetadata, LayoutDocument, LayoutNode, NodeId, SCHEMA_VERSION};
use crate::{CaptureConfig, Result};

/// Where the layout came from and the canvas it is laid out on
#[derive(Debug, Clone, PartialEq)]
pub struct CanvasSpec {
    pub source: String,
    /// Logical viewport, CSS pixels
    pub viewport: Size,
    pub pixel_ratio: f64,
}

impl CanvasSpec {
    /// Canvas of the configured logical viewport at the configured ratio
    pub fn configured(config: &CaptureConfig, source: impl Into<String>) -> Result<Self> {
        Ok(Self {
            source: source.into(),
            viewport: Size {
                width: config.viewport.width as f64,
                height: config.viewport.height as f64,
            },
            pixel_ratio: config.pixel_ratio()?,
        })
    }

    /// Canvas as the page reported it
    pub fn of(tree: &AnalysisTree, source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            viewport: tree.viewport,
            pixel_ratio: tree.pixel_ratio,
        }
    }

    /// Canonical canvas in device pixels
    pub fn device_size(&self) -> Size {
        Size {
            width: self.viewport.width * self.pixel_ratio,
            height: self.viewport.height * self.pixel_ratio,
        }
    }
}

pub fn assemble(
    tree: &AnalysisTree,
    captures: &BTreeMap<NodeId, CaptureMetadata>,
    canvas: &CanvasSpec,
) -> LayoutDocument {
    let bounds = content_bounds(&tree.root);
    let mut root = convert(&tree.root, captures, &bounds);
    root.canvas = Some(canvas.device_size());
    root.background_image = captures.get(&tree.root.id).map(|m| m.image.clone());

    LayoutDocument {
        schema_version: SCHEMA_VERSION,
        source: canvas.source.clone(),
        pixel_ratio: canvas.pixel_ratio,
        viewport: canvas.viewport,
        root,
    }
}

/// Union of all descendant rects per node; a childless node gets its own rect
pub fn content_bounds(root: &AnalysisNode) -> BTreeMap<NodeId, Rect> {
    // Post-order: children are finished before their parent is popped again
    let mut bounds: BTreeMap<NodeId, Rect> = BTreeMap::new();
    let mut work: Vec<(&AnalysisNode, bool)> = vec![(root, false)];
    while let Some((node, expanded)) = work.pop() {
        if !expanded {
            work.push((node, true));
            work.extend(node.children.iter().map(|c| (c, false)));
            continue;
        }
        let union = node
            .children
            .iter()
            .map(|c| {
                let below = bounds.get(&c.id).copied().unwrap_or(c.rect);
                c.rect.union(&below)
            })
            .reduce(|a, b| a.union(&b));
        bounds.insert(node.id, union.unwrap_or(node.rect));
    }
    bounds
}

fn convert(
    node: &AnalysisNode,
    captures: &BTreeMap<NodeId, CaptureMetadata>,
    bounds: &BTreeMap<NodeId, Rect>,
) -> LayoutNode {
    let capture = captures.get(&node.id).cloned();
    let image = capture
        .as_ref()
        .map(|m| m.image.clone())
        .or_else(|| node.image_ref.clone());
    LayoutNode {
        id: node.id,
        kind: node.kind,
        tag: node.tag.clone(),
        role: node.role.clone(),
        attributes: node.attributes.clone(),
        synthetic: node.synthetic,
        rect: node.rect,
        rotation: node.rotation,
        style: node.style.clone(),
        text: node.text.clone(),
        text_style: node.text_style.clone(),
        image,
        capture,
        content_bounds: bounds.get(&node.id).copied().unwrap_or(node.rect),
        canvas: None,
        background_image: None,
        children: node
            .children
            .iter()
            .map(|c| convert(c, captures, bounds))
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{DomPath, NodeKind};
    use crate::style::StyleSnapshot;

    fn node(id: NodeId, rect: Rect, children: Vec<AnalysisNode>) -> AnalysisNode {
        AnalysisNode {
            id,
            kind: if children.is_empty() { NodeKind::Image } else { NodeKind::Container },
            tag: "div".into(),
            role: None,
            attributes: Default::default(),
            dom_path: DomPath(vec![1, id]),
            synthetic: None,
            rect,
            rotation: 0.0,
            transform: None,
            style: StyleSnapshot::default(),
            text: None,
            text_style: None,
            image_ref: None,
            icon_glyph: false,
            interactive: false,
            is_root: id == 0,
            is_mask: false,
            range: None,
            children,
        }
    }

    #[test]
    fn bounds_cover_grandchildren_but_not_the_node_itself() {
        let grandchild = node(2, Rect::new(150.0, 150.0, 20.0, 20.0), vec![]);
        let child = node(1, Rect::new(10.0, 10.0, 50.0, 50.0), vec![grandchild]);
        let root = node(0, Rect::new(0.0, 0.0, 1000.0, 1000.0), vec![child]);

        let bounds = content_bounds(&root);
        assert_eq!(bounds[&2], Rect::new(150.0, 150.0, 20.0, 20.0));
        assert_eq!(bounds[&1], Rect::new(150.0, 150.0, 20.0, 20.0));
        assert_eq!(bounds[&0], Rect::new(10.0, 10.0, 160.0, 160.0));
    }
}
