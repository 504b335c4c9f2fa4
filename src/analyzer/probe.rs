//! Root and full-screen mask selection over the page probe
//!
//! The probe is a flat list of visible elements in CSS pixels of document
//! space. Everything here is pure so the heuristics can be tested without a
//! browser.

use log::debug;
use serde::Deserialize;

use crate::analyzer::AnalyzerSettings;
use crate::geometry::Rect;
use crate::model::DomPath;
use crate::style::parse_color;
use crate::{Error, Result};

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProbeViewport {
    pub width: f64,
    pub height: f64,
    pub pixel_ratio: f64,
    #[serde(default)]
    pub scroll_x: f64,
    #[serde(default)]
    pub scroll_y: f64,
}

impl ProbeViewport {
    pub fn rect(&self) -> Rect {
        Rect::new(0.0, 0.0, self.width, self.height)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ExplicitRoot {
    pub found: bool,
    pub path: Option<DomPath>,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Deserialize)]
pub struct Insets {
    pub top: Option<f64>,
    pub right: Option<f64>,
    pub bottom: Option<f64>,
    pub left: Option<f64>,
}

impl Insets {
    fn all_zero(&self) -> bool {
        [self.top, self.right, self.bottom, self.left]
            .iter()
            .all(|v| v.is_some_and(|v| v.abs() < 0.5))
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProbeElement {
    pub path: DomPath,
    /// Depth below `body` (body itself is 0)
    pub depth: usize,
    pub identity: String,
    pub rect: Rect,
    pub position: String,
    #[serde(default)]
    pub z_index: i32,
    #[serde(default)]
    pub background_color: String,
    #[serde(default)]
    pub background_image: String,
    #[serde(default)]
    pub child_count: usize,
    #[serde(default)]
    pub visible_child_count: usize,
    #[serde(default)]
    pub insets: Insets,
    pub parent_rect: Option<Rect>,
}

impl ProbeElement {
    fn background_alpha(&self) -> f64 {
        match parse_color(&self.background_color) {
            Ok(color) => color.a,
            Err(err) => {
                debug!("probe {}: {}", self.path, err);
                0.0
            }
        }
    }

    fn has_background_image(&self) -> bool {
        let raw = self.background_image.trim();
        !raw.is_empty() && raw != "none"
    }

    fn is_positioned_layer(&self) -> bool {
        matches!(self.position.as_str(), "fixed" | "absolute")
    }

    fn has_hint(&self, hints: &[String]) -> bool {
        hints.iter().any(|hint| self.identity.contains(hint.as_str()))
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProbeReport {
    pub viewport: ProbeViewport,
    pub body_path: Option<DomPath>,
    pub explicit_root: Option<ExplicitRoot>,
    pub elements: Vec<ProbeElement>,
}

/// Where the analysis tree is rooted
#[derive(Debug, Clone, PartialEq)]
pub enum RootChoice {
    Element { path: DomPath, score: f64 },
    /// `body` with its rect replaced by the content bounding box (CSS px)
    ContentBounds { body: DomPath, rect: Rect },
}

impl RootChoice {
    pub fn path(&self) -> &DomPath {
        match self {
            RootChoice::Element { path, .. } => path,
            RootChoice::ContentBounds { body, .. } => body,
        }
    }

    pub fn rect_override(&self) -> Option<Rect> {
        match self {
            RootChoice::ContentBounds { rect, .. } => Some(*rect),
            RootChoice::Element { .. } => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MaskChoice {
    pub path: DomPath,
    pub translucent: bool,
    pub z_index: i32,
    pub area: f64,
}

fn coverage(rect: &Rect, frame: &Rect) -> f64 {
    let area = frame.area();
    if area <= 0.0 {
        return 0.0;
    }
    rect.intersection_area(frame) / area
}

/// Positioned layers that look like overlays rather than content
fn is_overlay_shaped(element: &ProbeElement, viewport: &Rect, settings: &AnalyzerSettings) -> bool {
    (element.is_positioned_layer() && coverage(&element.rect, viewport) >= 0.9)
        || element.has_hint(&settings.overlay_hints)
}

fn content_bounds(report: &ProbeReport, settings: &AnalyzerSettings) -> Option<Rect> {
    let viewport = report.viewport.rect();
    let overlays: Vec<&DomPath> = report
        .elements
        .iter()
        .filter(|e| is_overlay_shaped(e, &viewport, settings))
        .map(|e| &e.path)
        .collect();

    report
        .elements
        .iter()
        .filter(|e| e.depth > 0 && e.rect.has_area())
        .filter(|e| !overlays.iter().any(|o| **o == e.path || o.is_ancestor_of(&e.path)))
        .map(|e| e.rect)
        .reduce(|acc, r| acc.union(&r))
}

/// Pick the root automatically
pub fn choose_root(report: &ProbeReport, settings: &AnalyzerSettings) -> Result<RootChoice> {
    let viewport = report.viewport.rect();
    let content = content_bounds(report, settings).ok_or(Error::NoVisibleContent)?;
    let body = report
        .body_path
        .clone()
        .ok_or_else(|| Error::LoadError("Document has no body".into()))?;
    let single_child = report
        .elements
        .iter()
        .find(|e| e.path == body)
        .map(|b| b.visible_child_count == 1)
        .unwrap_or(false);

    let mut best: Option<(f64, usize, &ProbeElement)> = None;
    for element in &report.elements {
        if element.depth == 0
            || element.depth > settings.max_root_depth
            || is_overlay_shaped(element, &viewport, settings)
        {
            continue;
        }
        let covered = content.intersection_area(&element.rect) / content.area().max(f64::EPSILON);
        if covered < settings.min_root_coverage {
            continue;
        }
        let tightness = (content.area() / element.rect.area().max(f64::EPSILON)).min(1.0);
        let mut score = covered * 100.0 + tightness * 10.0 - element.depth as f64 * 2.0;
        if element.has_hint(&settings.root_hints) {
            score += 15.0;
        }
        if element.has_hint(&settings.overlay_hints) {
            score -= 40.0;
        }
        if single_child && element.depth == 1 {
            score += 20.0;
        }
        let better = match best {
            None => true,
            Some((best_score, best_depth, _)) => {
                score > best_score + 1e-9
                    || ((score - best_score).abs() <= 1e-9 && element.depth < best_depth)
            }
        };
        if better {
            best = Some((score, element.depth, element));
        }
    }

    match best {
        Some((score, _, element)) => {
            debug!("Auto root {} ({}) scored {:.1}", element.path, element.identity, score);
            Ok(RootChoice::Element {
                path: element.path.clone(),
                score,
            })
        }
        None => {
            debug!("No root candidate; falling back to body with content bounds");
            Ok(RootChoice::ContentBounds { body, rect: content })
        }
    }
}

/// Resolve an explicit root selector result
pub fn explicit_root(report: &ProbeReport, selector: &str) -> Result<RootChoice> {
    match &report.explicit_root {
        Some(ExplicitRoot {
            found: true,
            path: Some(path),
        }) => Ok(RootChoice::Element {
            path: path.clone(),
            score: f64::INFINITY,
        }),
        _ => Err(Error::RootNotFound(selector.to_string())),
    }
}

/// Highest-stacked full-screen overlay, if any
pub fn choose_mask(report: &ProbeReport, settings: &AnalyzerSettings) -> Option<MaskChoice> {
    let viewport = report.viewport.rect();
    let mut best: Option<MaskChoice> = None;

    for element in report.elements.iter().filter(|e| e.is_positioned_layer()) {
        let alpha = element.background_alpha();
        let paintable = alpha > 0.0 || element.has_background_image() || element.child_count > 0;
        let viewport_coverage = coverage(&element.rect, &viewport);
        let parent_coverage = element
            .parent_rect
            .map(|parent| coverage(&element.rect, &parent))
            .unwrap_or(0.0);
        let translucent = alpha > 0.0 && alpha < 1.0;
        let overlay_shaped = viewport_coverage >= 0.9
            || parent_coverage >= 0.9
            || element.insets.all_zero()
            || element.has_hint(&settings.overlay_hints)
            || translucent;
        let visible_share = element.rect.intersection_area(&viewport) / viewport.area().max(f64::EPSILON);

        if !paintable || !overlay_shaped || visible_share < settings.min_mask_coverage {
            continue;
        }
        let candidate = MaskChoice {
            path: element.path.clone(),
            translucent,
            z_index: element.z_index,
            area: element.rect.area(),
        };
        // Later elements stack above earlier ones at equal z-index and area
        let replace = match &best {
            None => true,
            Some(current) => {
                (candidate.z_index, candidate.area) >= (current.z_index, current.area)
                    && !current.path.is_ancestor_of(&candidate.path)
            }
        };
        if replace {
            best = Some(candidate);
        }
    }

    if let Some(mask) = &best {
        debug!("Full-screen mask at {} (z {})", mask.path, mask.z_index);
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;

    fn element(path: &[usize], depth: usize, identity: &str, rect: Rect) -> ProbeElement {
        ProbeElement {
            path: DomPath(path.to_vec()),
            depth,
            identity: identity.to_string(),
            rect,
            position: "static".to_string(),
            z_index: 0,
            background_color: "rgba(0, 0, 0, 0)".to_string(),
            background_image: "none".to_string(),
            child_count: 1,
            visible_child_count: 1,
            insets: Insets::default(),
            parent_rect: None,
        }
    }

    fn report(elements: Vec<ProbeElement>) -> ProbeReport {
        ProbeReport {
            viewport: ProbeViewport {
                width: 800.0,
                height: 600.0,
                pixel_ratio: 1.0,
                scroll_x: 0.0,
                scroll_y: 0.0,
            },
            body_path: Some(DomPath(vec![1])),
            explicit_root: None,
            elements,
        }
    }

    #[test]
    fn prefers_hinted_single_child_of_body() {
        let full = Rect::new(0.0, 0.0, 800.0, 600.0);
        let probe = report(vec![
            element(&[1], 0, "body", full),
            element(&[1, 0], 1, "div app", full),
            element(&[1, 0, 0], 2, "div", full),
            element(&[1, 0, 0, 0], 3, "p", Rect::new(10.0, 10.0, 200.0, 20.0)),
        ]);
        let root = choose_root(&probe, &AnalyzerSettings::default()).unwrap();
        assert_eq!(root.path(), &DomPath(vec![1, 0]));
    }

    #[test]
    fn empty_document_has_no_visible_content() {
        let probe = report(vec![element(&[1], 0, "body", Rect::new(0.0, 0.0, 800.0, 600.0))]);
        assert!(matches!(
            choose_root(&probe, &AnalyzerSettings::default()),
            Err(Error::NoVisibleContent)
        ));
    }

    #[test]
    fn unmatched_selector_is_root_not_found() {
        let mut probe = report(Vec::new());
        probe.explicit_root = Some(ExplicitRoot { found: false, path: None });
        assert!(matches!(
            explicit_root(&probe, "#missing"),
            Err(Error::RootNotFound(sel)) if sel == "#missing"
        ));
    }

    #[test]
    fn picks_the_topmost_translucent_overlay_as_mask() {
        let full = Rect::new(0.0, 0.0, 800.0, 600.0);
        let mut low = element(&[1, 1], 1, "div backdrop", full);
        low.position = "fixed".into();
        low.background_color = "rgba(0, 0, 0, 0.5)".into();
        let mut high = low.clone();
        high.path = DomPath(vec![1, 2]);
        high.z_index = 10;
        let mut tiny = low.clone();
        tiny.path = DomPath(vec![1, 3]);
        tiny.z_index = 99;
        tiny.rect = Rect::new(0.0, 0.0, 40.0, 40.0);

        let probe = report(vec![low, high, tiny]);
        let mask = choose_mask(&probe, &AnalyzerSettings::default()).unwrap();
        assert_eq!(mask.path, DomPath(vec![1, 2]));
        assert!(mask.translucent);
    }
}
