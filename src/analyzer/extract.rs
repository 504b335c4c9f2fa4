//! Per-node extraction from the page snapshot
//!
//! Converts the nested snapshot payload into [`AnalysisNode`]s in device
//! pixels: parses style values, decomposes transforms, classifies nodes,
//! synthesizes own-text children and drops nodes that are occluded by the
//! full-screen mask or have no area.

use std::collections::BTreeMap;

use log::debug;
use serde::Deserialize;
use serde_json::Value;

use crate::analyzer::AnalyzerSettings;
use crate::geometry::{CornerRadii, Rect};
use crate::model::{AnalysisNode, DomPath, NodeKind, RangeState, SyntheticPart};
use crate::style::{
    non_default, parse_box_shadows, parse_color, parse_filters, parse_px, parse_radius,
    parse_transform, rotation_degrees, StyleSnapshot, TextStyle,
};
use crate::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OcclusionSample {
    hit_mask: bool,
    hit_mask_root: bool,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
struct RawText {
    text: String,
    rect: Option<Rect>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawNode {
    path: DomPath,
    tag: String,
    #[serde(default)]
    attrs: BTreeMap<String, String>,
    rect: Rect,
    #[serde(default = "visible_by_default")]
    visible: bool,
    #[serde(default)]
    style: BTreeMap<String, String>,
    own_text: Option<RawText>,
    range: Option<RawRange>,
    #[serde(default)]
    is_mask: bool,
    #[serde(default)]
    occlusion: Vec<OcclusionSample>,
    #[serde(default)]
    children: Vec<Value>,
}

fn visible_by_default() -> bool {
    true
}

/// Range bounds as reported; unparsable attributes arrive as `null`
#[derive(Debug, Clone, Copy, Deserialize)]
struct RawRange {
    min: Option<f64>,
    max: Option<f64>,
    value: Option<f64>,
}

impl RawRange {
    /// HTML defaults for missing bounds, value falling back to the minimum
    fn state(&self) -> RangeState {
        let min = self.min.unwrap_or(0.0);
        RangeState {
            min,
            max: self.max.unwrap_or(100.0),
            value: self.value.unwrap_or(min),
        }
    }
}

impl RawNode {
    fn prop(&self, name: &str) -> &str {
        self.style.get(name).map(String::as_str).unwrap_or("")
    }
}

/// Builds analysis nodes from one snapshot payload
pub(crate) struct Extractor<'a> {
    pub pixel_ratio: f64,
    pub mask_translucent: bool,
    pub settings: &'a AnalyzerSettings,
}

impl Extractor<'_> {
    /// Build the root; `rect_override` (CSS px) replaces the root's own rect
    pub fn build_root(&self, payload: &Value, rect_override: Option<Rect>) -> Result<AnalysisNode> {
        if payload.is_null() {
            return Err(Error::NoVisibleContent);
        }
        let mut raw = self.parse(payload, "root")?;
        if let Some(rect) = rect_override {
            raw.rect = rect;
        }
        raw.occlusion.clear();
        let mut nodes = self.build(raw, true)?;
        match nodes.len() {
            1 => nodes.pop().ok_or(Error::NoVisibleContent),
            _ => Err(Error::NoVisibleContent),
        }
    }

    fn parse(&self, payload: &Value, label: &str) -> Result<RawNode> {
        RawNode::deserialize(payload).map_err(|e| {
            let path = payload
                .get("path")
                .and_then(|p| serde_json::from_value::<DomPath>(p.clone()).ok())
                .map(|p| p.to_string())
                .unwrap_or_else(|| label.to_string());
            Error::extraction(path, format!("malformed node payload: {}", e))
        })
    }

    fn occluded(&self, raw: &RawNode) -> bool {
        !raw.occlusion.is_empty()
            && raw.occlusion.iter().all(|s| s.hit_mask)
            && !raw
                .occlusion
                .iter()
                .any(|s| s.hit_mask_root && self.mask_translucent)
    }

    /// Returns zero nodes (dropped), one node, or the promoted children of a
    /// dropped zero-area wrapper
    fn build(&self, raw: RawNode, is_root: bool) -> Result<Vec<AnalysisNode>> {
        if !is_root && self.occluded(&raw) {
            debug!("{} occluded by mask, dropped with its subtree", raw.path);
            return Ok(Vec::new());
        }
        let path_label = raw.path.to_string();
        let ratio = self.pixel_ratio;

        let mut children = Vec::new();
        for (index, child) in raw.children.iter().enumerate() {
            let child_raw = self.parse(child, &format!("{}/#{}", path_label, index))?;
            children.extend(self.build(child_raw, false)?);
        }

        let rect = raw.rect.scale(ratio);
        if !rect.is_finite() {
            return Err(Error::extraction(path_label, "non-finite geometry"));
        }
        let mut style = self.style(&raw).map_err(|reason| Error::extraction(&path_label, reason))?;
        if !raw.visible {
            style.background_color = crate::style::Rgba::TRANSPARENT;
            style.background_image = None;
            style.border_width = 0.0;
            style.box_shadow.clear();
        }
        let transform = parse_transform(raw.prop("transform"))
            .map_err(|reason| Error::extraction(&path_label, reason))?;
        let rotation = transform.as_ref().map(rotation_degrees).unwrap_or(0.0);
        let text_style = self.text_style(&raw).map_err(|reason| Error::extraction(&path_label, reason))?;

        let own_text = raw
            .own_text
            .as_ref()
            .filter(|t| raw.visible && !t.text.trim().is_empty());
        let icon_glyph = own_text.is_some_and(|t| self.is_icon_glyph(&t.text, &text_style));
        let range = if raw.tag == "input" && raw.attrs.get("type").map(String::as_str) == Some("range") {
            raw.range.map(|r| r.state())
        } else {
            None
        };
        let atomic = self.settings.atomic_tags.iter().any(|t| *t == raw.tag) && range.is_none();

        let mut text = None;
        let has_elements = !children.is_empty();
        if let Some(run) = own_text {
            if icon_glyph {
                text = Some(run.text.clone());
            } else if has_elements || style.has_paint() || atomic {
                if let Some(text_rect) = run.rect.map(|r| r.scale(ratio)).filter(Rect::has_area) {
                    children.insert(0, own_text_node(&raw, text_rect, &run.text, &text_style));
                }
            } else {
                text = Some(run.text.clone());
            }
        }

        let kind = if is_root || raw.is_mask || range.is_some() {
            NodeKind::Container
        } else if atomic || icon_glyph {
            NodeKind::Image
        } else if !children.is_empty() {
            NodeKind::Container
        } else if style.has_paint() {
            NodeKind::Image
        } else if text.is_some() {
            NodeKind::Text
        } else {
            debug!("{} has no paint, text or children; dropped", raw.path);
            return Ok(Vec::new());
        };

        if !rect.has_area() {
            if is_root {
                return Err(Error::NoVisibleContent);
            }
            debug!("{} has zero area; promoting {} children", raw.path, children.len());
            return Ok(children);
        }

        let interactive = self.is_interactive(&raw);
        let node = AnalysisNode {
            id: 0,
            kind,
            role: raw.attrs.get("role").cloned(),
            image_ref: raw.attrs.get("src").cloned(),
            tag: raw.tag.clone(),
            attributes: raw.attrs.clone(),
            dom_path: raw.path.clone(),
            synthetic: None,
            rect,
            rotation,
            transform,
            style,
            text,
            text_style: Some(text_style),
            icon_glyph,
            interactive,
            is_root,
            is_mask: raw.is_mask,
            range,
            children: if raw.is_mask { Vec::new() } else { children },
        };
        Ok(vec![node])
    }

    fn style(&self, raw: &RawNode) -> std::result::Result<StyleSnapshot, String> {
        let ratio = self.pixel_ratio;
        let color = |name: &str| parse_color(raw.prop(name)).map_err(|e| format!("{}: {}", name, e));
        let (w, h) = (raw.rect.width, raw.rect.height);
        let radius = |name: &str| parse_radius(raw.prop(name), w, h);
        let opacity = raw.prop("opacity").trim().parse::<f64>().unwrap_or(1.0);
        if !opacity.is_finite() {
            return Err(format!("non-finite opacity `{}`", raw.prop("opacity")));
        }
        let border_width = ["border-top-width", "border-right-width", "border-bottom-width", "border-left-width"]
            .iter()
            .filter_map(|p| parse_px(raw.prop(p)))
            .fold(0.0, f64::max);

        let mut style = StyleSnapshot {
            display: raw.prop("display").to_string(),
            position: raw.prop("position").to_string(),
            z_index: raw.prop("z-index").trim().parse::<i32>().ok(),
            background_color: color("background-color")?,
            background_image: non_default(raw.prop("background-image")),
            border_width,
            border_color: color("border-top-color")?,
            border_radius: CornerRadii {
                top_left: radius("border-top-left-radius"),
                top_right: radius("border-top-right-radius"),
                bottom_right: radius("border-bottom-right-radius"),
                bottom_left: radius("border-bottom-left-radius"),
            },
            box_shadow: parse_box_shadows(raw.prop("box-shadow")),
            filter: parse_filters(raw.prop("filter")),
            clip_path: non_default(raw.prop("clip-path")),
            mask: non_default(raw.prop("mask-image")).or_else(|| non_default(raw.prop("-webkit-mask-image"))),
            backdrop_filter: non_default(raw.prop("backdrop-filter"))
                .or_else(|| non_default(raw.prop("-webkit-backdrop-filter"))),
            blend_mode: non_default(raw.prop("mix-blend-mode")),
            overflow_x: default_to(raw.prop("overflow-x"), "visible"),
            overflow_y: default_to(raw.prop("overflow-y"), "visible"),
            opacity: opacity.clamp(0.0, 1.0),
            declarations: raw.style.clone(),
        };
        if style.display.is_empty() {
            style.display = "block".to_string();
        }
        style.scale_lengths(ratio);
        Ok(style)
    }

    fn text_style(&self, raw: &RawNode) -> std::result::Result<TextStyle, String> {
        let ratio = self.pixel_ratio;
        let scaled = |name: &str| parse_px(raw.prop(name)).map(|v| v * ratio);
        Ok(TextStyle {
            font_family: raw.prop("font-family").to_string(),
            font_size: scaled("font-size").unwrap_or(16.0 * ratio),
            font_weight: default_to(raw.prop("font-weight"), "400"),
            font_style: default_to(raw.prop("font-style"), "normal"),
            color: parse_color(raw.prop("color")).map_err(|e| format!("color: {}", e))?,
            line_height: scaled("line-height"),
            letter_spacing: scaled("letter-spacing"),
            text_align: default_to(raw.prop("text-align"), "start"),
            text_decoration: default_to(raw.prop("text-decoration-line"), "none"),
            text_transform: default_to(raw.prop("text-transform"), "none"),
            white_space: default_to(raw.prop("white-space"), "normal"),
        })
    }

    fn is_icon_glyph(&self, text: &str, style: &TextStyle) -> bool {
        let text = text.trim();
        let private_use = text
            .chars()
            .any(|c| matches!(c as u32, 0xE000..=0xF8FF | 0xF0000..=0xFFFFD | 0x100000..=0x10FFFD));
        if private_use {
            return true;
        }
        let family = style.font_family.to_ascii_lowercase();
        text.chars().count() <= 2
            && self
                .settings
                .icon_font_hints
                .iter()
                .any(|hint| family.contains(hint.as_str()))
    }

    fn is_interactive(&self, raw: &RawNode) -> bool {
        let attrs = &raw.attrs;
        let tabbable = attrs
            .get("tabindex")
            .and_then(|t| t.trim().parse::<i32>().ok())
            .is_some_and(|t| t >= 0);
        let role = attrs.get("role").map(|r| r.to_ascii_lowercase());
        self.settings.interactive_tags.iter().any(|t| *t == raw.tag)
            || role.is_some_and(|r| self.settings.interactive_roles.iter().any(|x| *x == r))
            || tabbable
            || attrs.contains_key("onclick")
            || attrs.get("contenteditable").is_some_and(|v| v != "false")
    }
}

fn default_to(raw: &str, fallback: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        fallback.to_string()
    } else {
        trimmed.to_string()
    }
}

fn own_text_node(raw: &RawNode, rect: Rect, text: &str, text_style: &TextStyle) -> AnalysisNode {
    AnalysisNode {
        id: 0,
        kind: NodeKind::Text,
        tag: raw.tag.clone(),
        role: None,
        attributes: BTreeMap::new(),
        dom_path: raw.path.clone(),
        synthetic: Some(SyntheticPart::OwnText),
        rect,
        rotation: 0.0,
        transform: None,
        style: StyleSnapshot {
            display: "inline".to_string(),
            ..StyleSnapshot::default()
        },
        text: Some(text.to_string()),
        text_style: Some(text_style.clone()),
        image_ref: None,
        icon_glyph: false,
        interactive: false,
        is_root: false,
        is_mask: false,
        range: None,
        children: Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn style(extra: Value) -> Value {
        let mut base = json!({
            "display": "block",
            "position": "static",
            "background-color": "rgba(0, 0, 0, 0)",
            "background-image": "none",
            "border-top-color": "rgb(0, 0, 0)",
            "color": "rgb(0, 0, 0)",
            "overflow-x": "visible",
            "overflow-y": "visible",
            "opacity": "1",
            "transform": "none",
            "font-family": "Arial",
            "font-size": "16px"
        });
        if let (Some(base), Some(extra)) = (base.as_object_mut(), extra.as_object()) {
            for (k, v) in extra {
                base.insert(k.clone(), v.clone());
            }
        }
        base
    }

    fn extractor(settings: &AnalyzerSettings) -> Extractor<'_> {
        Extractor {
            pixel_ratio: 2.0,
            mask_translucent: false,
            settings,
        }
    }

    #[test]
    fn scales_geometry_and_synthesizes_own_text_first() {
        let settings = AnalyzerSettings::default();
        let payload = json!({
            "path": [1, 0], "tag": "div",
            "rect": { "x": 0, "y": 0, "width": 100, "height": 50 },
            "style": style(json!({ "background-color": "rgb(255, 255, 255)", "border-top-left-radius": "4px" })),
            "ownText": { "text": "Hello", "rect": { "x": 2, "y": 2, "width": 30, "height": 10 } },
            "children": [{
                "path": [1, 0, 0], "tag": "img",
                "attrs": { "src": "a.png" },
                "rect": { "x": 40, "y": 0, "width": 10, "height": 10 },
                "style": style(json!({ "opacity": "0.5" }))
            }]
        });
        let root = extractor(&settings).build_root(&payload, None).unwrap();
        assert_eq!(root.rect, Rect::new(0.0, 0.0, 200.0, 100.0));
        assert_eq!(root.style.border_radius.top_left, 8.0);
        assert!(root.children[0].is_own_text());
        assert_eq!(root.children[0].rect, Rect::new(4.0, 4.0, 60.0, 20.0));
        assert_eq!(root.children[1].kind, NodeKind::Image);
        assert_eq!(root.children[1].image_ref.as_deref(), Some("a.png"));
    }

    #[test]
    fn unparsable_range_bounds_fall_back_to_defaults() {
        let settings = AnalyzerSettings::default();
        let payload = json!({
            "path": [1, 0], "tag": "div",
            "rect": { "x": 0, "y": 0, "width": 300, "height": 50 },
            "style": style(json!({ "background-color": "rgb(255, 255, 255)" })),
            "children": [{
                "path": [1, 0, 0], "tag": "input",
                "attrs": { "type": "range", "min": "abc" },
                "rect": { "x": 10, "y": 10, "width": 200, "height": 20 },
                "style": style(json!({})),
                "range": { "min": null, "max": null, "value": 40 }
            }]
        });
        let root = extractor(&settings).build_root(&payload, None).unwrap();
        let slider = &root.children[0];
        assert_eq!(slider.range, Some(RangeState { min: 0.0, max: 100.0, value: 40.0 }));
        assert!((slider.range.unwrap().fraction() - 0.4).abs() < 1e-9);
    }

    #[test]
    fn bad_colour_is_labelled_with_the_node_path() {
        let settings = AnalyzerSettings::default();
        let payload = json!({
            "path": [1, 0], "tag": "div",
            "rect": { "x": 0, "y": 0, "width": 100, "height": 50 },
            "style": style(json!({})),
            "children": [{
                "path": [1, 0, 3], "tag": "span",
                "rect": { "x": 0, "y": 0, "width": 10, "height": 10 },
                "style": style(json!({ "background-color": "nonsense(" }))
            }]
        });
        let err = extractor(&settings).build_root(&payload, None).unwrap_err();
        match err {
            Error::ExtractionError { path, .. } => assert_eq!(path, "html/1/0/3"),
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn occluded_and_empty_nodes_are_dropped() {
        let settings = AnalyzerSettings::default();
        let payload = json!({
            "path": [1, 0], "tag": "main",
            "rect": { "x": 0, "y": 0, "width": 100, "height": 50 },
            "style": style(json!({})),
            "children": [
                {
                    "path": [1, 0, 0], "tag": "div",
                    "rect": { "x": 0, "y": 0, "width": 10, "height": 10 },
                    "style": style(json!({ "background-color": "red" })),
                    "occlusion": [{ "hitMask": true, "hitMaskRoot": false }, { "hitMask": true, "hitMaskRoot": false }]
                },
                {
                    "path": [1, 0, 1], "tag": "div",
                    "rect": { "x": 0, "y": 0, "width": 0, "height": 0 },
                    "style": style(json!({})),
                    "children": [{
                        "path": [1, 0, 1, 0], "tag": "p",
                        "rect": { "x": 0, "y": 0, "width": 40, "height": 10 },
                        "style": style(json!({})),
                        "ownText": { "text": "kept", "rect": { "x": 0, "y": 0, "width": 40, "height": 10 } }
                    }]
                }
            ]
        });
        let root = extractor(&settings).build_root(&payload, None).unwrap();
        assert_eq!(root.children.len(), 1);
        assert_eq!(root.children[0].kind, NodeKind::Text);
        assert_eq!(root.children[0].text.as_deref(), Some("kept"));
    }

    #[test]
    fn private_use_glyph_is_an_icon() {
        let settings = AnalyzerSettings::default();
        let payload = json!({
            "path": [1, 0], "tag": "div",
            "rect": { "x": 0, "y": 0, "width": 100, "height": 50 },
            "style": style(json!({})),
            "children": [{
                "path": [1, 0, 0], "tag": "i",
                "rect": { "x": 0, "y": 0, "width": 24, "height": 24 },
                "style": style(json!({ "font-family": "\"Material Icons\"" })),
                "ownText": { "text": "\u{e87d}", "rect": { "x": 0, "y": 0, "width": 24, "height": 24 } }
            }]
        });
        let root = extractor(&settings).build_root(&payload, None).unwrap();
        let icon = &root.children[0];
        assert!(icon.icon_glyph);
        assert_eq!(icon.kind, NodeKind::Image);
    }
}
