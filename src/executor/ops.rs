//! Declarative setup operations
//!
//! The executor never writes mode-specific page code. Each task is turned
//! into a list of [`SetupOp`]s here, serialized to JSON and interpreted by a
//! single page script that records an undo entry for every mutation.

use serde::Serialize;

use crate::model::{AnalysisNode, CaptureMode, CaptureTask, DomPath, RangePart};

/// Element an operation applies to
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Target {
    /// A live element addressed by its structural path
    Path { path: DomPath },
    /// An element inserted earlier in the same transaction
    Marker { marker: String },
}

impl Target {
    pub fn path(path: &DomPath) -> Self {
        Target::Path { path: path.clone() }
    }

    pub fn marker(marker: &str) -> Self {
        Target::Marker {
            marker: marker.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "op", rename_all = "camelCase")]
pub enum SetupOp {
    /// Scroll the document, remembering the previous offset
    ScrollTo { x: f64, y: f64 },
    SetStyle {
        target: Target,
        property: String,
        value: String,
        important: bool,
    },
    SetAttribute {
        target: Target,
        name: String,
        value: String,
    },
    /// Hide everything that is not one of the targets or on their ancestor chains
    Isolate { targets: Vec<Target> },
    /// Hide the element children of the target
    HideChildren { target: Target },
    /// Hide the target's own text runs
    HideOwnText {
        target: Target,
        #[serde(rename = "preserveGeometry")]
        preserve_geometry: bool,
    },
    /// Remove background, border, shadow and filter paint from every ancestor
    StripAncestorPaint { target: Target },
    /// Deep-copy the source to a fixed position at the top-left corner
    CloneToCorner {
        source: Target,
        marker: String,
        offset: f64,
        copy: Vec<String>,
        #[serde(rename = "neutralizeTransform")]
        neutralize_transform: bool,
        opacity: Option<f64>,
    },
    InjectStyleSheet { id: String, css: String },
}

/// Paint and text properties lost when a subtree is detached from its context
pub const CLONE_PROPERTIES: &[&str] = &[
    "display",
    "box-sizing",
    "width",
    "height",
    "padding-top",
    "padding-right",
    "padding-bottom",
    "padding-left",
    "color",
    "font-family",
    "font-size",
    "font-weight",
    "font-style",
    "line-height",
    "letter-spacing",
    "text-align",
    "text-decoration",
    "text-transform",
    "text-shadow",
    "white-space",
    "background-color",
    "background-image",
    "background-size",
    "background-position",
    "background-repeat",
    "box-shadow",
    "filter",
    "border-top-width",
    "border-right-width",
    "border-bottom-width",
    "border-left-width",
    "border-top-style",
    "border-right-style",
    "border-bottom-style",
    "border-left-style",
    "border-top-color",
    "border-right-color",
    "border-bottom-color",
    "border-left-color",
    "border-top-left-radius",
    "border-top-right-radius",
    "border-bottom-right-radius",
    "border-bottom-left-radius",
    "opacity",
];

/// Longhands only: a shorthand reads back empty when just some of its
/// longhands are set inline, so its undo record would lose them
const BORDER_COLORS: [&str; 4] = [
    "border-top-color",
    "border-right-color",
    "border-bottom-color",
    "border-left-color",
];

/// Setup for one task
///
/// `padding` is the outpaint padding in CSS pixels; `owner` is the range
/// control for range-part tasks. Returns the operations plus the element
/// whose live rect anchors the capture.
pub fn build(task: &CaptureTask, node: &AnalysisNode, owner: Option<&AnalysisNode>, padding: f64) -> (Vec<SetupOp>, Target) {
    let mut ops = vec![SetupOp::ScrollTo { x: 0.0, y: 0.0 }];
    let marker = format!("lc-{}", task.ordinal);
    let modifiers = &task.modifiers;

    let subject = match task.mode {
        CaptureMode::Clone => {
            ops.push(SetupOp::CloneToCorner {
                source: Target::path(&node.dom_path),
                marker: marker.clone(),
                offset: padding.ceil(),
                copy: CLONE_PROPERTIES.iter().map(|p| p.to_string()).collect(),
                neutralize_transform: modifiers.neutralize_transforms,
                opacity: modifiers.decouple_opacity.then_some(1.0),
            });
            let clone = Target::marker(&marker);
            ops.push(SetupOp::Isolate {
                targets: vec![clone.clone()],
            });
            ops.push(SetupOp::StripAncestorPaint {
                target: clone.clone(),
            });
            clone
        }
        CaptureMode::InPlace => {
            let target = Target::path(&node.dom_path);
            ops.push(SetupOp::Isolate {
                targets: vec![target.clone()],
            });
            if modifiers.suppress_ancestor_paint && !modifiers.preserve_scene_underlay {
                ops.push(SetupOp::StripAncestorPaint {
                    target: target.clone(),
                });
            }
            if modifiers.suppress_underlay_faint_border {
                for side in BORDER_COLORS {
                    ops.push(set_style(&target, side, "transparent"));
                }
            }
            if modifiers.decouple_opacity {
                ops.push(set_style(&target, "opacity", "1"));
            }
            target
        }
        CaptureMode::RangePart => {
            let control = owner.unwrap_or(node);
            let target = Target::path(&control.dom_path);
            ops.push(SetupOp::Isolate {
                targets: vec![target.clone()],
            });
            ops.push(SetupOp::SetAttribute {
                target: target.clone(),
                name: "data-lc-range".to_string(),
                value: marker.clone(),
            });
            let part = task.range_part.unwrap_or(RangePart::Track);
            ops.push(SetupOp::InjectStyleSheet {
                id: format!("{}-range", marker),
                css: range_part_css(&marker, part),
            });
            target
        }
        CaptureMode::BackgroundStack => {
            let base = Target::path(&node.dom_path);
            let mut targets = vec![base.clone()];
            targets.extend(task.overlay_paths.iter().map(Target::path));
            ops.push(SetupOp::Isolate { targets });
            base
        }
    };

    if task.mode != CaptureMode::RangePart {
        if modifiers.hide_children {
            ops.push(SetupOp::HideChildren {
                target: subject.clone(),
            });
        }
        // Wrapping text inserts elements, so it runs after every path lookup
        if modifiers.hide_own_text {
            ops.push(SetupOp::HideOwnText {
                target: subject.clone(),
                preserve_geometry: modifiers.preserve_own_text_geometry,
            });
        }
    }

    (ops, subject)
}

fn set_style(target: &Target, property: &str, value: &str) -> SetupOp {
    SetupOp::SetStyle {
        target: target.clone(),
        property: property.to_string(),
        value: value.to_string(),
        important: true,
    }
}

/// Style sheet that leaves only `part` of the marked control painted
pub fn range_part_css(marker: &str, part: RangePart) -> String {
    let control = format!("input[data-lc-range=\"{}\"]", marker);
    let hidden = "background: transparent !important; border-color: transparent !important; box-shadow: none !important;";
    let other = match part.other() {
        RangePart::Track => format!(
            "{c}::-webkit-slider-runnable-track {{ {h} }} {c}::-moz-range-track {{ {h} }}",
            c = control,
            h = hidden
        ),
        RangePart::Thumb => format!(
            "{c}::-webkit-slider-thumb {{ {h} }} {c}::-moz-range-thumb {{ {h} }}",
            c = control,
            h = hidden
        ),
    };
    format!("{c} {{ {h} outline: none !important; }} {o}", c = control, h = hidden, o = other)
}
