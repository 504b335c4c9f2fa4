//! The ordered decision cascade
//!
//! Each rule is a pure function over the [`DecisionContext`] that writes into
//! a [`Draft`] and emits its own reason tokens. Rules run in order until one
//! stops the cascade; [`finalize`] then derives the modifier flags.

use crate::model::{CaptureFrame, CaptureMode, Decision, Modifier, Modifiers, NodeId, NodeKind, RangePart};
use crate::planner::context::DecisionContext;
use crate::planner::reason::Reason;

/// Decision under construction for one node
#[derive(Debug, Clone, PartialEq)]
pub struct Draft {
    pub decision: Decision,
    pub mode: Option<CaptureMode>,
    pub frame: CaptureFrame,
    pub modifiers: Modifiers,
    pub rotation_bake: Option<f64>,
    pub render_opacity: f64,
    pub range_part: Option<RangePart>,
    pub overlays: Vec<NodeId>,
    pub reasons: Vec<Reason>,
}

impl Default for Draft {
    fn default() -> Self {
        Self {
            decision: Decision::Capture,
            mode: None,
            frame: CaptureFrame::Node,
            modifiers: Modifiers::default(),
            rotation_bake: None,
            render_opacity: 1.0,
            range_part: None,
            overlays: Vec::new(),
            reasons: Vec::new(),
        }
    }
}

impl Draft {
    fn skip(&mut self, reason: Reason) -> Flow {
        self.decision = Decision::Skip;
        self.mode = None;
        self.reasons.push(reason);
        Flow::Stop
    }

    fn in_place(&mut self, reason: Reason) {
        self.mode = Some(CaptureMode::InPlace);
        self.reasons.push(reason);
    }

    /// Modifiers are only ever set together with their reason token
    pub(crate) fn set_modifier(&mut self, modifier: Modifier) {
        self.modifiers.set(modifier);
        let reason = Reason::Modifier(modifier);
        if !self.reasons.contains(&reason) {
            self.reasons.push(reason);
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Stop,
}

pub struct Rule {
    pub name: &'static str,
    pub apply: fn(&DecisionContext<'_>, &mut Draft) -> Flow,
}

pub const RULES: &[Rule] = &[
    Rule { name: "not-capturable", apply: not_capturable },
    Rule { name: "suppressed-by-base", apply: suppressed_by_base },
    Rule { name: "range-part", apply: range_part },
    Rule { name: "low-visibility-state-layer", apply: low_visibility_state_layer },
    Rule { name: "composition", apply: composition },
    Rule { name: "opacity", apply: opacity },
    Rule { name: "clip-context", apply: clip_context },
    Rule { name: "low-alpha-context", apply: low_alpha_context },
    Rule { name: "background-stack", apply: background_stack },
    Rule { name: "rotation", apply: rotation },
    Rule { name: "icon-glyph", apply: icon_glyph },
    Rule { name: "default", apply: fallback },
];

/// Run the cascade for one node
pub fn decide(ctx: &DecisionContext<'_>) -> Draft {
    let mut draft = Draft::default();
    for rule in RULES {
        if (rule.apply)(ctx, &mut draft) == Flow::Stop {
            log::trace!("node {}: cascade stopped at {}", ctx.node.id, rule.name);
            break;
        }
    }
    if draft.decision == Decision::Capture {
        if draft.mode.is_none() {
            draft.mode = Some(CaptureMode::Clone);
        }
        finalize(ctx, &mut draft);
    }
    draft
}

fn not_capturable(ctx: &DecisionContext<'_>, draft: &mut Draft) -> Flow {
    let node = ctx.node;
    if node.is_root {
        draft.in_place(Reason::RootBackground);
        draft.frame = CaptureFrame::Canvas;
        return Flow::Stop;
    }
    if node.is_mask {
        draft.in_place(Reason::OverlayMask);
        return Flow::Stop;
    }
    if node.kind == NodeKind::Text {
        return draft.skip(Reason::TextNode);
    }
    if node.is_range_owner() {
        return draft.skip(Reason::RangeOwner);
    }
    if node.kind == NodeKind::Container && !node.style.has_paint() {
        return draft.skip(Reason::NoPaint);
    }
    Flow::Continue
}

fn suppressed_by_base(ctx: &DecisionContext<'_>, draft: &mut Draft) -> Flow {
    match ctx.stacks.suppressing_base(ctx.node.id) {
        Some(base) => draft.skip(Reason::SuppressedByBase(base)),
        None => Flow::Continue,
    }
}

fn range_part(ctx: &DecisionContext<'_>, draft: &mut Draft) -> Flow {
    let Some(part) = ctx.node.range_part() else {
        return Flow::Continue;
    };
    draft.mode = Some(CaptureMode::RangePart);
    draft.range_part = Some(part);
    draft.reasons.push(Reason::RangePart(part));
    Flow::Stop
}

fn low_visibility_state_layer(ctx: &DecisionContext<'_>, draft: &mut Draft) -> Flow {
    let node = ctx.node;
    if ctx.visible_fraction() <= ctx.settings.state_layer_max_visible_fraction
        && ctx.has_state_layer_hint()
        && !node.has_text()
        && !node.interactive
    {
        return draft.skip(Reason::LowVisibilityStateLayer);
    }
    Flow::Continue
}

fn composition(ctx: &DecisionContext<'_>, draft: &mut Draft) -> Flow {
    for effect in ctx.node.style.composition_effects() {
        draft.in_place(Reason::Composition(effect));
    }
    if let Some(ancestor) = ctx.ancestor_composition {
        draft.in_place(Reason::AncestorComposition(ancestor));
    }
    Flow::Continue
}

fn opacity(ctx: &DecisionContext<'_>, draft: &mut Draft) -> Flow {
    let node = ctx.node;
    let opacity = node.style.opacity;
    if node.kind == NodeKind::Image
        && opacity < 1.0
        && opacity > 0.0
        && node.style.composition_effects().is_empty()
        && ctx.ancestor_composition.is_none()
    {
        draft.reasons.push(Reason::OpacityEligible(opacity));
        draft.render_opacity = opacity;
        draft.set_modifier(Modifier::DecoupleOpacity);
    }
    Flow::Continue
}

fn clip_context(ctx: &DecisionContext<'_>, draft: &mut Draft) -> Flow {
    let Some(frame) = ctx.clip else {
        return Flow::Continue;
    };
    let rect = ctx.node.rect;
    let rounded = frame.radii.is_rounded();
    if !frame.rect.contains(&rect) {
        draft.in_place(Reason::AncestorClipOutside(frame.id));
    } else if rounded && frame.radii.touches_corner(&frame.rect, &rect) {
        draft.in_place(Reason::AncestorRoundedClip(frame.id));
    } else if rounded {
        let padding = ctx.node.style.outpaint_padding();
        if padding > 0.0 && frame.radii.touches_corner(&frame.rect, &rect.inflate(padding)) {
            draft.in_place(Reason::OutpaintNearRounded(frame.id));
        }
    }
    Flow::Continue
}

fn low_alpha_context(ctx: &DecisionContext<'_>, draft: &mut Draft) -> Flow {
    let node = ctx.node;
    let settings = ctx.settings;
    let alpha = node.style.background_color.a;
    let ratio = ctx.viewport_area_ratio();
    if node.kind == NodeKind::Container
        && alpha > 0.0
        && alpha <= settings.low_alpha_max
        && node.style.background_image.is_none()
        && node.style.composition_effects().is_empty()
        && (settings.low_alpha_min_area_ratio..=settings.low_alpha_max_area_ratio).contains(&ratio)
        && !node.interactive
    {
        draft.in_place(Reason::LowAlphaContext(alpha));
        draft.set_modifier(Modifier::PreserveSceneUnderlay);
        let border = &node.style;
        if border.border_width > 0.0 && border.border_color.a <= settings.faint_border_max_alpha {
            draft.set_modifier(Modifier::SuppressUnderlayFaintBorder);
        }
    }
    Flow::Continue
}

fn background_stack(ctx: &DecisionContext<'_>, draft: &mut Draft) -> Flow {
    let Some(overlays) = ctx.stacks.overlays_of(ctx.node.id) else {
        return Flow::Continue;
    };
    draft.mode = Some(CaptureMode::BackgroundStack);
    draft.overlays = overlays.to_vec();
    draft.reasons.push(Reason::BackgroundStackBase(overlays.len()));
    Flow::Stop
}

fn rotation(ctx: &DecisionContext<'_>, draft: &mut Draft) -> Flow {
    let epsilon = ctx.settings.rotation_epsilon;
    let own = ctx.node.rotation;
    let inherited = ctx.ancestor_rotation;
    let bake = if own.abs() > epsilon {
        draft.reasons.push(Reason::SelfRotation(own));
        Some(inherited + own)
    } else if inherited.abs() > epsilon {
        draft.reasons.push(Reason::AncestorRotation(inherited));
        Some(inherited)
    } else {
        None
    };
    if let Some(angle) = bake {
        draft.rotation_bake = Some(angle);
        draft.in_place(Reason::BakeRotation(angle));
    }
    Flow::Continue
}

fn icon_glyph(ctx: &DecisionContext<'_>, draft: &mut Draft) -> Flow {
    if !ctx.node.icon_glyph {
        return Flow::Continue;
    }
    let composited = draft
        .reasons
        .iter()
        .any(|r| matches!(r, Reason::Composition(_) | Reason::AncestorComposition(_)));
    if draft.rotation_bake.is_some() {
        draft.reasons.push(Reason::IconGlyphRotatedInPlace);
    } else if composited {
        draft.reasons.push(Reason::IconGlyphComposited);
    } else {
        draft.mode = Some(CaptureMode::Clone);
        draft.reasons.push(Reason::IconGlyphIsolated);
    }
    Flow::Continue
}

fn fallback(_ctx: &DecisionContext<'_>, draft: &mut Draft) -> Flow {
    if draft.mode.is_none() {
        draft.mode = Some(CaptureMode::Clone);
        if draft.reasons.is_empty() {
            draft.reasons.push(Reason::DefaultClone);
        }
    }
    Flow::Stop
}

/// In-place reasons that keep ancestor paint in the capture
fn needs_context(reason: &Reason) -> bool {
    matches!(
        reason,
        Reason::RootBackground
            | Reason::OverlayMask
            | Reason::Composition(_)
            | Reason::AncestorComposition(_)
            | Reason::LowAlphaContext(_)
    )
}

/// Derive the structural modifiers once the mode is settled
pub fn finalize(ctx: &DecisionContext<'_>, draft: &mut Draft) {
    let node = ctx.node;
    if node.has_element_children() {
        draft.set_modifier(Modifier::HideChildren);
    }
    if node.has_own_text_child() {
        draft.set_modifier(Modifier::HideOwnText);
        if node.style.is_inline_level() {
            draft.set_modifier(Modifier::PreserveOwnTextGeometry);
        }
    }
    if draft.mode == Some(CaptureMode::Clone)
        && node.transform.is_some()
        && draft.rotation_bake.is_none()
    {
        draft.set_modifier(Modifier::NeutralizeTransforms);
    }
    if draft.mode == Some(CaptureMode::InPlace)
        && !draft.modifiers.preserve_scene_underlay
        && draft.reasons.iter().any(Reason::is_geometric)
        && !draft.reasons.iter().any(needs_context)
    {
        draft.set_modifier(Modifier::SuppressAncestorPaint);
    }
    if draft.reasons.is_empty() {
        draft.reasons.push(Reason::DefaultClone);
    }
}
