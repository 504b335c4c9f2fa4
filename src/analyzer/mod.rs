//! Document analysis
//!
//! One pass over the rendered element tree of a loaded document. The
//! analyzer waits for the page to settle, probes it for the root and the
//! full-screen mask, snapshots the root subtree and turns it into an
//! immutable [`AnalysisTree`] in device pixels.

mod extract;
mod probe;
mod pseudo;
mod scripts;

use log::{debug, info, warn};
use serde::Serialize;

use crate::geometry::{CornerRadii, Rect, Size};
use crate::model::{AnalysisNode, AnalysisTree, NodeKind, RangePart, StabilityReport, SyntheticPart};
use crate::session::{evaluate_as, RenderSession};
use crate::style::{parse_box_shadows, StyleSnapshot};
use crate::{Error, Result};

pub use probe::{choose_mask, choose_root, explicit_root, MaskChoice, ProbeElement, ProbeReport, RootChoice};
pub use pseudo::{
    part_rects, pseudo_selector, resolve_part, PartStyle, PseudoStyleResolver, PseudoValues,
    ResolvedPseudoStyle, ScriptPseudoResolver,
};

use extract::Extractor;

/// Analyzer heuristics and timing
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzerSettings {
    /// Upper bound on waiting for web fonts
    pub font_wait_ms: u64,
    /// Fixed delay after the animation-frame ticks
    pub settle_delay_ms: u64,
    /// Deepest element (below `body`) considered as an automatic root
    pub max_root_depth: usize,
    /// Share of the content bounds a root candidate must cover
    pub min_root_coverage: f64,
    /// Share of the viewport a mask must cover
    pub min_mask_coverage: f64,
    pub root_hints: Vec<String>,
    pub overlay_hints: Vec<String>,
    pub icon_font_hints: Vec<String>,
    /// Elements captured as a single image without descending
    pub atomic_tags: Vec<String>,
    pub interactive_tags: Vec<String>,
    pub interactive_roles: Vec<String>,
}

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|s| s.to_string()).collect()
}

impl Default for AnalyzerSettings {
    fn default() -> Self {
        Self {
            font_wait_ms: 3000,
            settle_delay_ms: 120,
            max_root_depth: 4,
            min_root_coverage: 0.6,
            min_mask_coverage: 0.1,
            root_hints: strings(&["app", "root", "page", "container", "main", "wrapper", "layout", "shell"]),
            overlay_hints: strings(&["overlay", "modal", "mask", "backdrop", "scrim", "dialog", "lightbox"]),
            icon_font_hints: strings(&["icon", "material", "awesome", "glyph", "symbols", "feather", "ionicons"]),
            atomic_tags: strings(&[
                "img", "svg", "canvas", "video", "picture", "iframe", "object", "embed", "input", "select",
                "textarea", "hr", "progress", "meter",
            ]),
            interactive_tags: strings(&["a", "button", "input", "select", "textarea", "summary", "label", "details"]),
            interactive_roles: strings(&[
                "button", "link", "checkbox", "switch", "tab", "menuitem", "slider", "option", "radio",
            ]),
        }
    }
}

/// Produces the analysis tree for the document loaded in a session
#[derive(Debug, Clone)]
pub struct Analyzer {
    settings: AnalyzerSettings,
    root_selector: Option<String>,
}

impl Analyzer {
    pub fn new(settings: AnalyzerSettings, root_selector: Option<String>) -> Self {
        Self {
            settings,
            root_selector,
        }
    }

    pub fn settings(&self) -> &AnalyzerSettings {
        &self.settings
    }

    pub fn analyze<S: RenderSession + ?Sized>(&self, session: &mut S) -> Result<AnalysisTree> {
        let stability = self.wait_for_stability(session)?;

        let probe: ProbeReport = evaluate_as(session, &scripts::probe(self.root_selector.as_deref()), false)?;
        let pixel_ratio = probe.viewport.pixel_ratio;
        if !(pixel_ratio.is_finite() && pixel_ratio > 0.0) {
            return Err(Error::LoadError(format!("Page reported pixel ratio {}", pixel_ratio)));
        }

        let root = match &self.root_selector {
            Some(selector) => explicit_root(&probe, selector)?,
            None => choose_root(&probe, &self.settings)?,
        };
        let mask = choose_mask(&probe, &self.settings);
        info!(
            "Analyzing from root {} (mask: {})",
            root.path(),
            mask.as_ref().map(|m| m.path.to_string()).unwrap_or_else(|| "none".into())
        );

        let atomic: Vec<&str> = self.settings.atomic_tags.iter().map(String::as_str).collect();
        let payload = session.evaluate_json(
            &scripts::snapshot(root.path(), mask.as_ref().map(|m| &m.path), &atomic),
            false,
        )?;
        if payload.is_null() {
            return Err(Error::RootNotFound(root.path().to_string()));
        }

        let extractor = Extractor {
            pixel_ratio,
            mask_translucent: mask.as_ref().is_some_and(|m| m.translucent),
            settings: &self.settings,
        };
        let mut tree_root = extractor.build_root(&payload, root.rect_override())?;

        let mut resolver = ScriptPseudoResolver::new(session);
        attach_range_parts(&mut tree_root, &mut resolver, pixel_ratio)?;
        assign_ids(&mut tree_root);

        let tree = AnalysisTree {
            root: tree_root,
            viewport: Size {
                width: probe.viewport.width,
                height: probe.viewport.height,
            },
            pixel_ratio,
            root_path: root.path().clone(),
            mask_path: mask.map(|m| m.path),
            stability,
        };
        info!("Analysis tree has {} nodes", tree.node_count());
        Ok(tree)
    }

    fn wait_for_stability<S: RenderSession + ?Sized>(&self, session: &mut S) -> Result<StabilityReport> {
        let script = scripts::stability(self.settings.font_wait_ms, self.settings.settle_delay_ms);
        let report: StabilityReport = evaluate_as(session, &script, true)?;
        if !report.fonts_loaded {
            warn!(
                "Fonts did not settle within {}ms; continuing with fallback metrics",
                self.settings.font_wait_ms
            );
        }
        Ok(report)
    }
}

/// Add track and thumb children to every range control
pub fn attach_range_parts<R: PseudoStyleResolver + ?Sized>(
    root: &mut AnalysisNode,
    resolver: &mut R,
    pixel_ratio: f64,
) -> Result<()> {
    let mut stack: Vec<&mut AnalysisNode> = vec![root];
    while let Some(node) = stack.pop() {
        if let Some(state) = node.range {
            let track = resolver.resolve(&node.dom_path, pseudo_selector(RangePart::Track))?;
            let thumb = resolver.resolve(&node.dom_path, pseudo_selector(RangePart::Thumb))?;
            let (Some(track), Some(thumb)) = (track, thumb) else {
                debug!("{}: range pseudo styles unavailable", node.dom_path);
                continue;
            };
            let control = track.control_rect;
            let track_style = resolve_part(RangePart::Track, &track);
            let thumb_style = resolve_part(RangePart::Thumb, &thumb);
            let (track_rect, thumb_rect) = part_rects(&control, &track_style, &thumb_style, &state);

            for (part, style, rect) in [
                (RangePart::Track, &track_style, track_rect),
                (RangePart::Thumb, &thumb_style, thumb_rect),
            ] {
                let rect = rect.scale(pixel_ratio);
                if !rect.has_area() {
                    continue;
                }
                let part_node = range_part_node(node, part, style, rect, pixel_ratio);
                node.children.push(part_node);
            }
            continue;
        }
        stack.extend(node.children.iter_mut());
    }
    Ok(())
}

fn range_part_node(owner: &AnalysisNode, part: RangePart, style: &PartStyle, rect: Rect, ratio: f64) -> AnalysisNode {
    let mut snapshot = StyleSnapshot {
        display: "block".to_string(),
        background_color: style.fill.unwrap_or_default(),
        background_image: style.image.clone(),
        border_width: style.border_width,
        border_color: style.border_color,
        border_radius: CornerRadii::uniform(style.radius),
        box_shadow: style.box_shadow.as_deref().map(parse_box_shadows).unwrap_or_default(),
        ..StyleSnapshot::default()
    };
    snapshot.scale_lengths(ratio);
    AnalysisNode {
        id: 0,
        kind: NodeKind::Image,
        tag: owner.tag.clone(),
        role: None,
        attributes: Default::default(),
        dom_path: owner.dom_path.clone(),
        synthetic: Some(SyntheticPart::Range(part)),
        rect,
        rotation: 0.0,
        transform: None,
        style: snapshot,
        text: None,
        text_style: None,
        image_ref: None,
        icon_glyph: false,
        interactive: owner.interactive,
        is_root: false,
        is_mask: false,
        range: None,
        children: Vec::new(),
    }
}

/// Number nodes in pre-order
pub fn assign_ids(root: &mut AnalysisNode) {
    let mut next = 0;
    let mut stack: Vec<&mut AnalysisNode> = vec![root];
    while let Some(node) = stack.pop() {
        node.id = next;
        next += 1;
        stack.extend(node.children.iter_mut().rev());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{DomPath, RangeState};

    struct FixedResolver;

    impl PseudoStyleResolver for FixedResolver {
        fn resolve(&mut self, _element: &DomPath, pseudo: &str) -> Result<Option<ResolvedPseudoStyle>> {
            let (width, height) = if pseudo.contains("thumb") { ("20px", "20px") } else { ("100%", "4px") };
            Ok(Some(ResolvedPseudoStyle {
                control_rect: Rect::new(10.0, 10.0, 200.0, 20.0),
                computed: PseudoValues::default(),
                authored: Some(PseudoValues {
                    width: Some(width.into()),
                    height: Some(height.into()),
                    background_color: Some("rgb(33, 150, 243)".into()),
                    ..Default::default()
                }),
            }))
        }
    }

    fn control() -> AnalysisNode {
        AnalysisNode {
            id: 0,
            kind: NodeKind::Container,
            tag: "input".into(),
            role: None,
            attributes: Default::default(),
            dom_path: DomPath(vec![1, 0, 2]),
            synthetic: None,
            rect: Rect::new(10.0, 10.0, 200.0, 20.0),
            rotation: 0.0,
            transform: None,
            style: StyleSnapshot::default(),
            text: None,
            text_style: None,
            image_ref: None,
            icon_glyph: false,
            interactive: true,
            is_root: false,
            is_mask: false,
            range: Some(RangeState { min: 0.0, max: 100.0, value: 25.0 }),
            children: Vec::new(),
        }
    }

    #[test]
    fn range_controls_get_track_and_thumb() {
        let mut root = control();
        root.range = None;
        root.tag = "form".into();
        root.children.push(control());

        attach_range_parts(&mut root, &mut FixedResolver, 1.0).unwrap();
        assign_ids(&mut root);

        let slider = &root.children[0];
        assert!(slider.is_range_owner());
        let track = &slider.children[0];
        let thumb = &slider.children[1];
        assert_eq!(track.range_part(), Some(RangePart::Track));
        assert_eq!(track.rect, Rect::new(10.0, 18.0, 200.0, 4.0));
        assert!((thumb.rect.x - (10.0 + 0.25 * 180.0)).abs() < 1e-9);
        assert_eq!(
            root.iter().map(|n| n.id).collect::<Vec<_>>(),
            vec![0, 1, 2, 3]
        );
    }
}
