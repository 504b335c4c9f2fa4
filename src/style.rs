//! Computed-style snapshot types and the CSS value parsing behind them
//!
//! Values arrive as computed-style strings from the page. Lengths are parsed
//! in CSS pixels and scaled into device pixels by the analyzer, so everything
//! stored in a [`StyleSnapshot`] is already in device-pixel space.

use std::collections::BTreeMap;
use std::fmt;

use cssparser::{ParseError, Parser, ParserInput, Token};
use serde::{Deserialize, Serialize};

use crate::geometry::CornerRadii;

/// Parsed colour with 8-bit channels and a fractional alpha
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: f64,
}

impl Rgba {
    pub const TRANSPARENT: Rgba = Rgba { r: 0, g: 0, b: 0, a: 0.0 };

    pub fn is_visible(&self) -> bool {
        self.a > 0.0
    }
}

impl Default for Rgba {
    fn default() -> Self {
        Rgba::TRANSPARENT
    }
}

impl fmt::Display for Rgba {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "rgba({}, {}, {}, {})", self.r, self.g, self.b, self.a)
    }
}

/// Colour parse failure (unknown syntax from the engine)
#[derive(Debug, Clone, PartialEq)]
pub struct ColorError(pub String);

impl fmt::Display for ColorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unparsable colour `{}`", self.0)
    }
}

pub fn parse_color(raw: &str) -> Result<Rgba, ColorError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("transparent") {
        return Ok(Rgba::TRANSPARENT);
    }
    let color = csscolorparser::parse(trimmed).map_err(|_| ColorError(trimmed.to_string()))?;
    let [r, g, b, _] = color.to_rgba8();
    Ok(Rgba {
        r,
        g,
        b,
        a: f64::from(color.a).clamp(0.0, 1.0),
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Shadow {
    pub offset_x: f64,
    pub offset_y: f64,
    pub blur: f64,
    pub spread: f64,
    pub inset: bool,
}

impl Shadow {
    /// How far this shadow paints outside the border box
    pub fn extent(&self) -> f64 {
        if self.inset {
            return 0.0;
        }
        (self.spread + self.blur + self.offset_x.abs().max(self.offset_y.abs())).max(0.0)
    }

    fn scale(&self, factor: f64) -> Self {
        Self {
            offset_x: self.offset_x * factor,
            offset_y: self.offset_y * factor,
            blur: self.blur * factor,
            spread: self.spread * factor,
            inset: self.inset,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "fn", rename_all = "camelCase")]
pub enum FilterFn {
    Blur { radius: f64 },
    DropShadow { offset_x: f64, offset_y: f64, blur: f64 },
    Other { name: String },
}

impl FilterFn {
    pub fn extent(&self) -> f64 {
        match self {
            FilterFn::Blur { radius } => radius.max(0.0),
            FilterFn::DropShadow { offset_x, offset_y, blur } => {
                (blur + offset_x.abs().max(offset_y.abs())).max(0.0)
            }
            FilterFn::Other { .. } => 0.0,
        }
    }

    fn scale(&self, factor: f64) -> Self {
        match self {
            FilterFn::Blur { radius } => FilterFn::Blur { radius: radius * factor },
            FilterFn::DropShadow { offset_x, offset_y, blur } => FilterFn::DropShadow {
                offset_x: offset_x * factor,
                offset_y: offset_y * factor,
                blur: blur * factor,
            },
            other => other.clone(),
        }
    }
}

/// Composition effects that tie a node's pixels to its rendering context
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CompositionEffect {
    Overflow,
    ClipPath,
    Mask,
    BackdropFilter,
    BlendMode,
}

impl CompositionEffect {
    pub fn token(&self) -> &'static str {
        match self {
            CompositionEffect::Overflow => "overflow",
            CompositionEffect::ClipPath => "clip-path",
            CompositionEffect::Mask => "mask",
            CompositionEffect::BackdropFilter => "backdrop-filter",
            CompositionEffect::BlendMode => "blend-mode",
        }
    }

    /// Effects that descendants inherit as rendering context (overflow is
    /// handled by the clip stack instead)
    pub fn propagates_to_descendants(&self) -> bool {
        !matches!(self, CompositionEffect::Overflow)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StyleSnapshot {
    pub display: String,
    pub position: String,
    pub z_index: Option<i32>,
    pub background_color: Rgba,
    pub background_image: Option<String>,
    pub border_width: f64,
    pub border_color: Rgba,
    pub border_radius: CornerRadii,
    pub box_shadow: Vec<Shadow>,
    pub filter: Vec<FilterFn>,
    pub clip_path: Option<String>,
    pub mask: Option<String>,
    pub backdrop_filter: Option<String>,
    pub blend_mode: Option<String>,
    pub overflow_x: String,
    pub overflow_y: String,
    pub opacity: f64,
    /// Raw computed values, kept verbatim for downstream renderers
    pub declarations: BTreeMap<String, String>,
}

impl Default for StyleSnapshot {
    fn default() -> Self {
        Self {
            display: "block".to_string(),
            position: "static".to_string(),
            z_index: None,
            background_color: Rgba::TRANSPARENT,
            background_image: None,
            border_width: 0.0,
            border_color: Rgba::TRANSPARENT,
            border_radius: CornerRadii::default(),
            box_shadow: Vec::new(),
            filter: Vec::new(),
            clip_path: None,
            mask: None,
            backdrop_filter: None,
            blend_mode: None,
            overflow_x: "visible".to_string(),
            overflow_y: "visible".to_string(),
            opacity: 1.0,
            declarations: BTreeMap::new(),
        }
    }
}

impl StyleSnapshot {
    /// Background, border or outset shadow that would put pixels on screen
    pub fn has_paint(&self) -> bool {
        self.background_color.is_visible()
            || self.background_image.is_some()
            || (self.border_width > 0.0 && self.border_color.is_visible())
            || self.box_shadow.iter().any(|s| !s.inset)
    }

    pub fn clips_content(&self) -> bool {
        self.overflow_x != "visible" || self.overflow_y != "visible"
    }

    pub fn composition_effects(&self) -> Vec<CompositionEffect> {
        let mut effects = Vec::new();
        if self.clips_content() {
            effects.push(CompositionEffect::Overflow);
        }
        if self.clip_path.is_some() {
            effects.push(CompositionEffect::ClipPath);
        }
        if self.mask.is_some() {
            effects.push(CompositionEffect::Mask);
        }
        if self.backdrop_filter.is_some() {
            effects.push(CompositionEffect::BackdropFilter);
        }
        if self.blend_mode.is_some() {
            effects.push(CompositionEffect::BlendMode);
        }
        effects
    }

    /// Padding needed around the border box so shadows and blurs are not cut
    pub fn outpaint_padding(&self) -> f64 {
        let shadows = self.box_shadow.iter().map(Shadow::extent);
        let filters = self.filter.iter().map(FilterFn::extent);
        shadows.chain(filters).fold(0.0, f64::max)
    }

    pub fn has_outpainting(&self) -> bool {
        self.outpaint_padding() > 0.0
    }

    /// Partially transparent background or element opacity
    pub fn is_translucent(&self) -> bool {
        let bg = self.background_color.a;
        (bg > 0.0 && bg < 1.0) || self.opacity < 1.0
    }

    pub fn is_inline_level(&self) -> bool {
        self.display.starts_with("inline")
    }

    pub(crate) fn scale_lengths(&mut self, factor: f64) {
        self.border_width *= factor;
        self.border_radius = self.border_radius.scale(factor);
        self.box_shadow = self.box_shadow.iter().map(|s| s.scale(factor)).collect();
        self.filter = self.filter.iter().map(|f| f.scale(factor)).collect();
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextStyle {
    pub font_family: String,
    pub font_size: f64,
    pub font_weight: String,
    pub font_style: String,
    pub color: Rgba,
    pub line_height: Option<f64>,
    pub letter_spacing: Option<f64>,
    pub text_align: String,
    pub text_decoration: String,
    pub text_transform: String,
    pub white_space: String,
}

/// Treat `none`, `normal`, `auto` and empty strings as "not set"
pub fn non_default(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    match trimmed {
        "" | "none" | "normal" | "auto" | "initial" => None,
        other => Some(other.to_string()),
    }
}

/// Parse a pixel length such as `12px` or `0`
pub fn parse_px(raw: &str) -> Option<f64> {
    let trimmed = raw.trim();
    let number = trimmed.strip_suffix("px").unwrap_or(trimmed);
    number.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Parse one corner radius; percentages resolve against the smaller box side
pub fn parse_radius(raw: &str, width: f64, height: f64) -> f64 {
    let first = raw.split_whitespace().next().unwrap_or("");
    if let Some(pct) = first.strip_suffix('%') {
        return pct
            .parse::<f64>()
            .map(|p| p / 100.0 * width.min(height))
            .unwrap_or(0.0);
    }
    parse_px(first).unwrap_or(0.0)
}

fn collect_numbers<'i>(parser: &mut Parser<'i, '_>) -> Result<Vec<f64>, ParseError<'i, ()>> {
    let mut values = Vec::new();
    while let Ok(token) = parser.next() {
        match *token {
            Token::Dimension { value, ref unit, .. } if unit.eq_ignore_ascii_case("px") => {
                values.push(f64::from(value))
            }
            Token::Number { value, .. } => values.push(f64::from(value)),
            _ => {}
        }
    }
    Ok(values)
}

/// Parse a computed `box-shadow` list
pub fn parse_box_shadows(raw: &str) -> Vec<Shadow> {
    let raw = raw.trim();
    if raw.is_empty() || raw == "none" {
        return Vec::new();
    }
    let mut input = ParserInput::new(raw);
    let mut parser = Parser::new(&mut input);
    let mut shadows = Vec::new();
    let mut lengths: Vec<f64> = Vec::new();
    let mut inset = false;

    let mut flush = |lengths: &mut Vec<f64>, inset: &mut bool| {
        if lengths.len() >= 2 {
            shadows.push(Shadow {
                offset_x: lengths[0],
                offset_y: lengths[1],
                blur: lengths.get(2).copied().unwrap_or(0.0),
                spread: lengths.get(3).copied().unwrap_or(0.0),
                inset: *inset,
            });
        }
        lengths.clear();
        *inset = false;
    };

    loop {
        let token = match parser.next() {
            Ok(token) => token.clone(),
            Err(_) => break,
        };
        match token {
            Token::Comma => flush(&mut lengths, &mut inset),
            Token::Dimension { value, ref unit, .. } if unit.eq_ignore_ascii_case("px") => {
                lengths.push(f64::from(value))
            }
            Token::Number { value, .. } if value == 0.0 => lengths.push(0.0),
            Token::Ident(ref ident) if ident.eq_ignore_ascii_case("inset") => inset = true,
            // Colour functions and keywords; nested blocks are skipped by the parser
            _ => {}
        }
    }
    flush(&mut lengths, &mut inset);
    shadows
}

/// Parse a computed `filter` function list
pub fn parse_filters(raw: &str) -> Vec<FilterFn> {
    let raw = raw.trim();
    if raw.is_empty() || raw == "none" {
        return Vec::new();
    }
    let mut input = ParserInput::new(raw);
    let mut parser = Parser::new(&mut input);
    let mut filters = Vec::new();

    loop {
        let name = match parser.next() {
            Ok(Token::Function(name)) => name.to_ascii_lowercase(),
            Ok(_) => continue,
            Err(_) => break,
        };
        let args = parser
            .parse_nested_block(|nested| collect_numbers(nested))
            .unwrap_or_default();
        let filter = match name.as_str() {
            "blur" => FilterFn::Blur {
                radius: args.first().copied().unwrap_or(0.0),
            },
            "drop-shadow" => FilterFn::DropShadow {
                offset_x: args.first().copied().unwrap_or(0.0),
                offset_y: args.get(1).copied().unwrap_or(0.0),
                blur: args.get(2).copied().unwrap_or(0.0),
            },
            _ => FilterFn::Other { name },
        };
        filters.push(filter);
    }
    filters
}

/// 2D affine transform `[a, b, c, d, e, f]` as in `matrix(a, b, c, d, e, f)`
pub type Affine = [f64; 6];

/// Parse a computed `transform` value; `None` for `none` or identity
pub fn parse_transform(raw: &str) -> Result<Option<Affine>, String> {
    let raw = raw.trim();
    if raw.is_empty() || raw == "none" {
        return Ok(None);
    }
    let mut input = ParserInput::new(raw);
    let mut parser = Parser::new(&mut input);
    let name = match parser.next() {
        Ok(Token::Function(name)) => name.to_ascii_lowercase(),
        _ => return Err(format!("unexpected transform `{raw}`")),
    };
    let values = parser
        .parse_nested_block(|nested| collect_numbers(nested))
        .map_err(|_| format!("unparsable transform `{raw}`"))?;

    let affine = match (name.as_str(), values.len()) {
        ("matrix", 6) => [values[0], values[1], values[2], values[3], values[4], values[5]],
        ("matrix3d", 16) => [values[0], values[1], values[4], values[5], values[12], values[13]],
        _ => return Err(format!("unsupported transform `{raw}`")),
    };
    if affine.iter().any(|v| !v.is_finite()) {
        return Err(format!("non-finite transform `{raw}`"));
    }
    if affine == [1.0, 0.0, 0.0, 1.0, 0.0, 0.0] {
        return Ok(None);
    }
    Ok(Some(affine))
}

/// Rotation in degrees from the linear part; independent of scale and translation
pub fn rotation_degrees(affine: &Affine) -> f64 {
    let degrees = affine[1].atan2(affine[0]).to_degrees();
    if degrees.abs() < 1e-6 {
        0.0
    } else {
        degrees
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_colours() {
        assert_eq!(parse_color("rgba(0, 0, 0, 0)").unwrap().a, 0.0);
        let c = parse_color("rgba(255, 128, 0, 0.4)").unwrap();
        assert_eq!((c.r, c.g, c.b), (255, 128, 0));
        assert!((c.a - 0.4).abs() < 1e-3);
        assert_eq!(parse_color("transparent").unwrap(), Rgba::TRANSPARENT);
        assert!(parse_color("definitely-not-a-colour(").is_err());
    }

    #[test]
    fn parses_box_shadow_lists() {
        let shadows = parse_box_shadows(
            "rgba(0, 0, 0, 0.5) 0px 4px 12px 2px, rgb(255, 0, 0) 1px 1px 0px 0px inset",
        );
        assert_eq!(shadows.len(), 2);
        assert_eq!(shadows[0].offset_y, 4.0);
        assert_eq!(shadows[0].blur, 12.0);
        assert_eq!(shadows[0].spread, 2.0);
        assert!(!shadows[0].inset);
        assert!(shadows[1].inset);
        assert_eq!(shadows[0].extent(), 18.0);
        assert_eq!(shadows[1].extent(), 0.0);
        assert!(parse_box_shadows("none").is_empty());
    }

    #[test]
    fn parses_filters() {
        let filters = parse_filters("blur(4px) drop-shadow(rgba(0, 0, 0, 0.3) 2px 6px 8px) grayscale(1)");
        assert_eq!(filters.len(), 3);
        assert_eq!(filters[0], FilterFn::Blur { radius: 4.0 });
        assert_eq!(filters[1].extent(), 14.0);
        assert_eq!(filters[2], FilterFn::Other { name: "grayscale".into() });
    }

    #[test]
    fn rotation_ignores_scale_and_translation() {
        let angle = 30f64.to_radians();
        let scale = 2.5;
        let raw = format!(
            "matrix({}, {}, {}, {}, 40, -12)",
            scale * angle.cos(),
            scale * angle.sin(),
            -scale * angle.sin(),
            scale * angle.cos()
        );
        let affine = parse_transform(&raw).unwrap().unwrap();
        assert!((rotation_degrees(&affine) - 30.0).abs() < 1e-3);

        let translate_only = parse_transform("matrix(1, 0, 0, 1, 25, 0)").unwrap().unwrap();
        assert_eq!(rotation_degrees(&translate_only), 0.0);
        assert_eq!(parse_transform("matrix(1, 0, 0, 1, 0, 0)").unwrap(), None);
        assert_eq!(parse_transform("none").unwrap(), None);
    }

    #[test]
    fn padding_takes_the_largest_extent() {
        let style = StyleSnapshot {
            box_shadow: parse_box_shadows("rgba(0, 0, 0, 0.2) 0px 2px 6px 0px"),
            filter: parse_filters("blur(10px)"),
            ..StyleSnapshot::default()
        };
        assert_eq!(style.outpaint_padding(), 10.0);
        assert!(style.has_paint());
    }

    #[test]
    fn radius_percentages_use_the_short_side() {
        assert_eq!(parse_radius("50%", 40.0, 20.0), 10.0);
        assert_eq!(parse_radius("8px 4px", 40.0, 20.0), 8.0);
        assert_eq!(parse_radius("0px", 40.0, 20.0), 0.0);
    }
}
