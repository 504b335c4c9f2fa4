//! Data model shared by the pipeline stages
//!
//! The analysis tree is produced once and never mutated. Capture tasks and
//! rule-trace records come out of the planner, capture metadata out of the
//! executor, and the layout document is the persisted contract.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::geometry::{Point, Rect, Size};
use crate::planner::Reason;
use crate::style::{Affine, StyleSnapshot, TextStyle};

/// Pre-order ordinal of a node in the analysis tree
pub type NodeId = usize;

/// Child-element indices from the document element down to a node
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DomPath(pub Vec<usize>);

impl DomPath {
    pub fn child(&self, index: usize) -> DomPath {
        let mut steps = self.0.clone();
        steps.push(index);
        DomPath(steps)
    }

    /// Paths of every ancestor, nearest first (the document element excluded)
    pub fn ancestors(&self) -> Vec<DomPath> {
        (1..self.0.len())
            .rev()
            .map(|len| DomPath(self.0[..len].to_vec()))
            .collect()
    }

    pub fn is_ancestor_of(&self, other: &DomPath) -> bool {
        other.0.len() > self.0.len() && other.0.starts_with(&self.0)
    }
}

impl fmt::Display for DomPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "html")?;
        for step in &self.0 {
            write!(f, "/{step}")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum NodeKind {
    Container,
    Image,
    Text,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RangePart {
    Track,
    Thumb,
}

impl RangePart {
    pub fn as_str(&self) -> &'static str {
        match self {
            RangePart::Track => "track",
            RangePart::Thumb => "thumb",
        }
    }

    pub fn other(&self) -> RangePart {
        match self {
            RangePart::Track => RangePart::Thumb,
            RangePart::Thumb => RangePart::Track,
        }
    }
}

/// Nodes that do not correspond to an element of their own
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SyntheticPart {
    /// The element's own direct text run
    OwnText,
    Range(RangePart),
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RangeState {
    pub min: f64,
    pub max: f64,
    pub value: f64,
}

impl RangeState {
    /// Position of the value along the track, clamped to 0..=1
    pub fn fraction(&self) -> f64 {
        let span = self.max - self.min;
        if span <= 0.0 || !span.is_finite() {
            return 0.0;
        }
        ((self.value - self.min) / span).clamp(0.0, 1.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisNode {
    pub id: NodeId,
    pub kind: NodeKind,
    pub tag: String,
    pub role: Option<String>,
    pub attributes: BTreeMap<String, String>,
    pub dom_path: DomPath,
    pub synthetic: Option<SyntheticPart>,
    pub rect: Rect,
    pub rotation: f64,
    pub transform: Option<Affine>,
    pub style: StyleSnapshot,
    pub text: Option<String>,
    pub text_style: Option<TextStyle>,
    pub image_ref: Option<String>,
    pub icon_glyph: bool,
    pub interactive: bool,
    pub is_root: bool,
    pub is_mask: bool,
    pub range: Option<RangeState>,
    pub children: Vec<AnalysisNode>,
}

impl AnalysisNode {
    /// Pre-order walk over this node and all descendants
    pub fn iter(&self) -> impl Iterator<Item = &AnalysisNode> {
        let mut stack = vec![self];
        std::iter::from_fn(move || {
            let node = stack.pop()?;
            stack.extend(node.children.iter().rev());
            Some(node)
        })
    }

    pub fn find(&self, id: NodeId) -> Option<&AnalysisNode> {
        self.iter().find(|n| n.id == id)
    }

    pub fn range_part(&self) -> Option<RangePart> {
        match self.synthetic {
            Some(SyntheticPart::Range(part)) => Some(part),
            _ => None,
        }
    }

    pub fn is_own_text(&self) -> bool {
        self.synthetic == Some(SyntheticPart::OwnText)
    }

    /// Range controls own synthesized track/thumb children
    pub fn is_range_owner(&self) -> bool {
        self.children.iter().any(|c| c.range_part().is_some())
    }

    /// Children that are real elements (not synthesized parts)
    pub fn has_element_children(&self) -> bool {
        self.children.iter().any(|c| c.synthetic.is_none())
    }

    pub fn has_own_text_child(&self) -> bool {
        self.children.iter().any(AnalysisNode::is_own_text)
    }

    /// Whether this node or any descendant carries text
    pub fn has_text(&self) -> bool {
        self.iter()
            .any(|n| n.text.as_deref().is_some_and(|t| !t.trim().is_empty()))
    }

    /// Space-separated class list
    pub fn classes(&self) -> impl Iterator<Item = &str> {
        self.attributes
            .get("class")
            .map(|c| c.split_whitespace())
            .into_iter()
            .flatten()
    }

    pub fn output_tag(&self) -> String {
        match self.synthetic {
            Some(SyntheticPart::Range(part)) => format!("{}-{}", self.tag, part.as_str()),
            Some(SyntheticPart::OwnText) => format!("{}-text", self.tag),
            None => self.tag.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StabilityReport {
    pub fonts_loaded: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisTree {
    pub root: AnalysisNode,
    /// Logical (CSS pixel) viewport the document was laid out in
    pub viewport: Size,
    pub pixel_ratio: f64,
    pub root_path: DomPath,
    pub mask_path: Option<DomPath>,
    pub stability: StabilityReport,
}

impl AnalysisTree {
    /// Viewport in device pixels, anchored at the origin
    pub fn device_viewport(&self) -> Rect {
        Rect::new(
            0.0,
            0.0,
            self.viewport.width * self.pixel_ratio,
            self.viewport.height * self.pixel_ratio,
        )
    }

    pub fn node_count(&self) -> usize {
        self.root.iter().count()
    }

    pub fn node(&self, id: NodeId) -> Option<&AnalysisNode> {
        self.root.find(id)
    }

    /// Index of every node by id
    pub fn index(&self) -> BTreeMap<NodeId, &AnalysisNode> {
        self.root.iter().map(|n| (n.id, n)).collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CaptureMode {
    Clone,
    InPlace,
    RangePart,
    BackgroundStack,
}

impl fmt::Display for CaptureMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CaptureMode::Clone => "clone",
            CaptureMode::InPlace => "inPlace",
            CaptureMode::RangePart => "rangePart",
            CaptureMode::BackgroundStack => "backgroundStack",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Modifier {
    HideChildren,
    HideOwnText,
    NeutralizeTransforms,
    SuppressAncestorPaint,
    PreserveOwnTextGeometry,
    PreserveSceneUnderlay,
    SuppressUnderlayFaintBorder,
    DecoupleOpacity,
}

impl Modifier {
    pub const ALL: [Modifier; 8] = [
        Modifier::HideChildren,
        Modifier::HideOwnText,
        Modifier::NeutralizeTransforms,
        Modifier::SuppressAncestorPaint,
        Modifier::PreserveOwnTextGeometry,
        Modifier::PreserveSceneUnderlay,
        Modifier::SuppressUnderlayFaintBorder,
        Modifier::DecoupleOpacity,
    ];

    /// Reason token that must accompany the modifier
    pub fn token(&self) -> &'static str {
        match self {
            Modifier::HideChildren => "hide-children",
            Modifier::HideOwnText => "hide-own-text",
            Modifier::NeutralizeTransforms => "neutralize-transforms",
            Modifier::SuppressAncestorPaint => "suppress-ancestor-paint",
            Modifier::PreserveOwnTextGeometry => "preserve-own-text-geometry",
            Modifier::PreserveSceneUnderlay => "preserve-scene-underlay",
            Modifier::SuppressUnderlayFaintBorder => "suppress-underlay-faint-border",
            Modifier::DecoupleOpacity => "decouple-opacity",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Modifiers {
    pub hide_children: bool,
    pub hide_own_text: bool,
    pub neutralize_transforms: bool,
    pub suppress_ancestor_paint: bool,
    pub preserve_own_text_geometry: bool,
    pub preserve_scene_underlay: bool,
    pub suppress_underlay_faint_border: bool,
    pub decouple_opacity: bool,
}

impl Modifiers {
    fn slot(&mut self, modifier: Modifier) -> &mut bool {
        match modifier {
            Modifier::HideChildren => &mut self.hide_children,
            Modifier::HideOwnText => &mut self.hide_own_text,
            Modifier::NeutralizeTransforms => &mut self.neutralize_transforms,
            Modifier::SuppressAncestorPaint => &mut self.suppress_ancestor_paint,
            Modifier::PreserveOwnTextGeometry => &mut self.preserve_own_text_geometry,
            Modifier::PreserveSceneUnderlay => &mut self.preserve_scene_underlay,
            Modifier::SuppressUnderlayFaintBorder => &mut self.suppress_underlay_faint_border,
            Modifier::DecoupleOpacity => &mut self.decouple_opacity,
        }
    }

    pub(crate) fn set(&mut self, modifier: Modifier) {
        *self.slot(modifier) = true;
    }

    pub fn is_set(&self, modifier: Modifier) -> bool {
        match modifier {
            Modifier::HideChildren => self.hide_children,
            Modifier::HideOwnText => self.hide_own_text,
            Modifier::NeutralizeTransforms => self.neutralize_transforms,
            Modifier::SuppressAncestorPaint => self.suppress_ancestor_paint,
            Modifier::PreserveOwnTextGeometry => self.preserve_own_text_geometry,
            Modifier::PreserveSceneUnderlay => self.preserve_scene_underlay,
            Modifier::SuppressUnderlayFaintBorder => self.suppress_underlay_faint_border,
            Modifier::DecoupleOpacity => self.decouple_opacity,
        }
    }

    pub fn active(&self) -> Vec<Modifier> {
        Modifier::ALL.into_iter().filter(|m| self.is_set(*m)).collect()
    }
}

/// What region a task's content rect refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CaptureFrame {
    /// The node's own live rect
    Node,
    /// The whole canonical canvas (root background)
    Canvas,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptureTask {
    pub ordinal: usize,
    pub node_id: NodeId,
    pub dom_path: DomPath,
    pub output_name: String,
    pub mode: CaptureMode,
    pub frame: CaptureFrame,
    pub modifiers: Modifiers,
    pub rotation_baked: bool,
    pub rotation_angle: f64,
    pub render_opacity: f64,
    pub range_part: Option<RangePart>,
    pub overlay_ids: Vec<NodeId>,
    pub overlay_paths: Vec<DomPath>,
    pub reasons: Vec<Reason>,
}

impl CaptureTask {
    pub fn has_token(&self, token: &str) -> bool {
        self.reasons.iter().any(|r| r.matches(token))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Decision {
    Capture,
    Skip,
}

/// Nearest enclosing clip ancestor as seen from one node
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClipSummary {
    pub ancestor_id: NodeId,
    pub rect: Rect,
    pub rounded: bool,
    pub fully_inside: bool,
    pub visible_fraction: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", content = "message", rename_all = "camelCase")]
pub enum CaptureOutcome {
    Captured,
    Vanished,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleTraceRecord {
    pub node_id: NodeId,
    pub dom_path: DomPath,
    pub tag: String,
    pub kind: NodeKind,
    pub decision: Decision,
    pub mode: Option<CaptureMode>,
    pub modifiers: Modifiers,
    pub rotation_baked: bool,
    pub rotation_angle: f64,
    pub render_opacity: f64,
    pub reasons: Vec<Reason>,
    pub clip_ancestor: Option<ClipSummary>,
    pub outcome: Option<CaptureOutcome>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptureMetadata {
    pub node_id: NodeId,
    pub image: String,
    pub image_width: u32,
    pub image_height: u32,
    pub content_offset: Point,
    pub content_size: Size,
    pub mode: CaptureMode,
    pub rotation_baked: bool,
    pub rotation_angle: f64,
    pub opacity_decoupled: bool,
    pub render_opacity: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutNode {
    pub id: NodeId,
    pub kind: NodeKind,
    pub tag: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub synthetic: Option<SyntheticPart>,
    pub rect: Rect,
    pub rotation: f64,
    pub style: StyleSnapshot,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_style: Option<TextStyle>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capture: Option<CaptureMetadata>,
    pub content_bounds: Rect,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub canvas: Option<Size>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background_image: Option<String>,
    pub children: Vec<LayoutNode>,
}

/// Current layout contract version; bumped only for additive changes
pub const SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutDocument {
    pub schema_version: u32,
    pub source: String,
    pub pixel_ratio: f64,
    pub viewport: Size,
    pub root: LayoutNode,
}
