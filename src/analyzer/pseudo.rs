//! Pseudo-element style resolution for range controls
//!
//! Engines report pseudo-element styles inconsistently: a slider thumb often
//! resolves to the control's own box or to nothing at all. The resolver
//! returns both the computed values and the values authored in matching
//! style-sheet rules, and [`resolve_part`] picks between them.

use serde::Deserialize;

use crate::analyzer::scripts;
use crate::geometry::Rect;
use crate::model::{DomPath, RangePart, RangeState};
use crate::session::{evaluate_as, RenderSession};
use crate::style::{non_default, parse_box_shadows, parse_color, parse_px, parse_radius, Rgba};
use crate::Result;

/// Raw pseudo-element declarations, as strings
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PseudoValues {
    pub width: Option<String>,
    pub height: Option<String>,
    pub background_color: Option<String>,
    pub background_image: Option<String>,
    pub background: Option<String>,
    pub border_radius: Option<String>,
    pub border_width: Option<String>,
    pub border_color: Option<String>,
    pub box_shadow: Option<String>,
}

impl PseudoValues {
    fn fill(&self) -> Option<Rgba> {
        let color = self
            .background_color
            .as_deref()
            .and_then(|c| parse_color(c).ok())
            .filter(Rgba::is_visible);
        color.or_else(|| {
            // `background: #4caf50` shorthand in authored rules
            self.background
                .as_deref()
                .and_then(|b| parse_color(b).ok())
                .filter(Rgba::is_visible)
        })
    }

    fn image(&self) -> Option<String> {
        self.background_image
            .as_deref()
            .and_then(non_default)
            .or_else(|| {
                self.background
                    .as_deref()
                    .filter(|b| b.contains("gradient(") || b.contains("url("))
                    .map(str::to_string)
            })
    }

    fn has_paint(&self) -> bool {
        self.fill().is_some()
            || self.image().is_some()
            || self
                .box_shadow
                .as_deref()
                .is_some_and(|s| !parse_box_shadows(s).is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedPseudoStyle {
    /// Control border box, CSS pixels of document space
    pub control_rect: Rect,
    #[serde(default)]
    pub computed: PseudoValues,
    pub authored: Option<PseudoValues>,
}

/// Resolve pseudo-element style for an element/pseudo pair
pub trait PseudoStyleResolver {
    fn resolve(&mut self, element: &DomPath, pseudo: &str) -> Result<Option<ResolvedPseudoStyle>>;
}

/// Resolver that asks the page through the rendering session
pub struct ScriptPseudoResolver<'s, S: RenderSession + ?Sized> {
    session: &'s mut S,
}

impl<'s, S: RenderSession + ?Sized> ScriptPseudoResolver<'s, S> {
    pub fn new(session: &'s mut S) -> Self {
        Self { session }
    }
}

impl<S: RenderSession + ?Sized> PseudoStyleResolver for ScriptPseudoResolver<'_, S> {
    fn resolve(&mut self, element: &DomPath, pseudo: &str) -> Result<Option<ResolvedPseudoStyle>> {
        evaluate_as(&mut *self.session, &scripts::pseudo_style(element, pseudo), false)
    }
}

/// Engine pseudo-element selector for a range part
pub fn pseudo_selector(part: RangePart) -> &'static str {
    match part {
        RangePart::Track => "::-webkit-slider-runnable-track",
        RangePart::Thumb => "::-webkit-slider-thumb",
    }
}

/// Size and paint chosen for one part, CSS pixels
#[derive(Debug, Clone, PartialEq)]
pub struct PartStyle {
    pub width: f64,
    pub height: f64,
    pub fill: Option<Rgba>,
    pub image: Option<String>,
    pub radius: f64,
    pub border_width: f64,
    pub border_color: Rgba,
    pub box_shadow: Option<String>,
}

fn parse_length(raw: Option<&str>, basis: f64) -> Option<f64> {
    let raw = raw?.trim();
    if let Some(pct) = raw.strip_suffix('%') {
        return pct.trim().parse::<f64>().ok().map(|p| p / 100.0 * basis);
    }
    parse_px(raw)
}

/// Engine defaults when neither computed nor authored values are usable
fn default_size(part: RangePart, control: &Rect) -> (f64, f64) {
    match part {
        RangePart::Track => (control.width, control.height.min(4.0)),
        RangePart::Thumb => {
            let side = control.height.min(16.0);
            (side, side)
        }
    }
}

/// Choose between computed and authored pseudo-element values
pub fn resolve_part(part: RangePart, resolved: &ResolvedPseudoStyle) -> PartStyle {
    let control = resolved.control_rect;
    let computed = &resolved.computed;
    let width = parse_length(computed.width.as_deref(), control.width);
    let height = parse_length(computed.height.as_deref(), control.height);

    let same_as_control = |w: Option<f64>, h: Option<f64>| {
        matches!((w, h), (Some(w), Some(h)) if (w - control.width).abs() < 0.5 && (h - control.height).abs() < 0.5)
    };
    let zero = width.map_or(true, |w| w <= 0.0) || height.map_or(true, |h| h <= 0.0);
    let looks_unset = same_as_control(width, height) || zero || !computed.has_paint();

    let source = match (&resolved.authored, looks_unset) {
        (Some(authored), true) => authored,
        _ => computed,
    };
    let (default_w, default_h) = default_size(part, &control);
    let pick = |raw: Option<&str>, basis: f64, fallback: f64| {
        parse_length(raw, basis).filter(|v| *v > 0.0).unwrap_or(fallback)
    };
    let width = pick(source.width.as_deref(), control.width, default_w);
    let height = pick(source.height.as_deref(), control.height, default_h);
    let width = if part == RangePart::Track {
        width.min(control.width)
    } else {
        width
    };

    PartStyle {
        width,
        height,
        fill: source.fill().or_else(|| computed.fill()),
        image: source.image(),
        radius: source
            .border_radius
            .as_deref()
            .map(|r| parse_radius(r, width, height))
            .unwrap_or(0.0),
        border_width: source.border_width.as_deref().and_then(parse_px).unwrap_or(0.0),
        border_color: source
            .border_color
            .as_deref()
            .and_then(|c| parse_color(c).ok())
            .unwrap_or(Rgba::TRANSPARENT),
        box_shadow: source.box_shadow.as_deref().and_then(non_default),
    }
}

/// Track and thumb rects in CSS pixels
///
/// The track spans the control horizontally and is centred vertically; the
/// thumb travels along the track by the value fraction.
pub fn part_rects(control: &Rect, track: &PartStyle, thumb: &PartStyle, state: &RangeState) -> (Rect, Rect) {
    let track_rect = Rect::new(
        control.x,
        control.y + (control.height - track.height) / 2.0,
        track.width,
        track.height,
    );
    let travel = (track_rect.width - thumb.width).max(0.0);
    let thumb_rect = Rect::new(
        track_rect.x + state.fraction() * travel,
        control.y + (control.height - thumb.height) / 2.0,
        thumb.width,
        thumb.height,
    );
    (track_rect, thumb_rect)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slider(computed: PseudoValues, authored: Option<PseudoValues>) -> ResolvedPseudoStyle {
        ResolvedPseudoStyle {
            control_rect: Rect::new(0.0, 0.0, 200.0, 20.0),
            computed,
            authored,
        }
    }

    #[test]
    fn authored_rules_win_over_control_sized_defaults() {
        let computed = PseudoValues {
            width: Some("200px".into()),
            height: Some("20px".into()),
            background_color: Some("rgba(0, 0, 0, 0)".into()),
            ..Default::default()
        };
        let authored = PseudoValues {
            width: Some("20px".into()),
            height: Some("20px".into()),
            background: Some("#4caf50".into()),
            border_radius: Some("50%".into()),
            ..Default::default()
        };
        let style = resolve_part(RangePart::Thumb, &slider(computed, Some(authored)));
        assert_eq!((style.width, style.height), (20.0, 20.0));
        assert_eq!(style.radius, 10.0);
        assert!(style.fill.is_some());
    }

    #[test]
    fn painted_computed_values_are_kept() {
        let computed = PseudoValues {
            width: Some("14px".into()),
            height: Some("14px".into()),
            background_color: Some("rgb(30, 30, 30)".into()),
            ..Default::default()
        };
        let authored = PseudoValues {
            width: Some("40px".into()),
            ..Default::default()
        };
        let style = resolve_part(RangePart::Thumb, &slider(computed, Some(authored)));
        assert_eq!(style.width, 14.0);
    }

    #[test]
    fn thumb_sits_at_the_value_fraction_of_travel() {
        let control = Rect::new(0.0, 0.0, 200.0, 20.0);
        let resolved = slider(PseudoValues::default(), None);
        let track = PartStyle {
            width: 200.0,
            height: 4.0,
            ..resolve_part(RangePart::Track, &resolved)
        };
        let thumb = PartStyle {
            width: 20.0,
            height: 20.0,
            ..resolve_part(RangePart::Thumb, &resolved)
        };
        let state = RangeState { min: 0.0, max: 100.0, value: 25.0 };
        let (track_rect, thumb_rect) = part_rects(&control, &track, &thumb, &state);
        assert_eq!(track_rect.y, 8.0);
        assert!((thumb_rect.x - 45.0).abs() < 1e-9);
    }
}
