//! Reason tokens attached to every planner decision

use std::fmt;

use serde::{Serialize, Serializer};

use crate::model::{Modifier, NodeId, RangePart};
use crate::style::CompositionEffect;

/// One auditable cause behind a capture or skip decision
///
/// Reasons serialize to their token string, e.g. `ancestor-clip-outside:4`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Reason {
    TextNode,
    NoPaint,
    RangeOwner,
    RootBackground,
    OverlayMask,
    SuppressedByBase(NodeId),
    RangePart(RangePart),
    LowVisibilityStateLayer,
    Composition(CompositionEffect),
    AncestorComposition(NodeId),
    OpacityEligible(f64),
    AncestorClipOutside(NodeId),
    AncestorRoundedClip(NodeId),
    OutpaintNearRounded(NodeId),
    LowAlphaContext(f64),
    BackgroundStackBase(usize),
    SelfRotation(f64),
    AncestorRotation(f64),
    BakeRotation(f64),
    IconGlyphIsolated,
    IconGlyphRotatedInPlace,
    IconGlyphComposited,
    Modifier(Modifier),
    DefaultClone,
}

impl Reason {
    /// Whether this reason carries `token`, either exactly or as the prefix
    /// before its `:` argument
    pub fn matches(&self, token: &str) -> bool {
        let rendered = self.to_string();
        let token = token.strip_suffix(':').unwrap_or(token);
        rendered == token
            || rendered
                .strip_prefix(token)
                .is_some_and(|rest| rest.starts_with(':'))
    }

    /// Causes that tie the capture to its geometric context only
    pub fn is_geometric(&self) -> bool {
        matches!(
            self,
            Reason::AncestorClipOutside(_)
                | Reason::AncestorRoundedClip(_)
                | Reason::OutpaintNearRounded(_)
                | Reason::SelfRotation(_)
                | Reason::AncestorRotation(_)
                | Reason::BakeRotation(_)
        )
    }
}

impl fmt::Display for Reason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reason::TextNode => f.write_str("skip:text-node"),
            Reason::NoPaint => f.write_str("skip:no-paint"),
            Reason::RangeOwner => f.write_str("skip:range-owner"),
            Reason::RootBackground => f.write_str("root-background"),
            Reason::OverlayMask => f.write_str("overlay-mask"),
            Reason::SuppressedByBase(id) => write!(f, "suppressed-by-base:{id}"),
            Reason::RangePart(part) => write!(f, "range-part:{}", part.as_str()),
            Reason::LowVisibilityStateLayer => f.write_str("skip:low-visibility-state-layer"),
            Reason::Composition(effect) => write!(f, "composition:{}", effect.token()),
            Reason::AncestorComposition(id) => write!(f, "ancestor-composition:{id}"),
            Reason::OpacityEligible(opacity) => write!(f, "opacity-eligible:{opacity:.2}"),
            Reason::AncestorClipOutside(id) => write!(f, "ancestor-clip-outside:{id}"),
            Reason::AncestorRoundedClip(id) => write!(f, "ancestor-rounded-clip:{id}"),
            Reason::OutpaintNearRounded(id) => write!(f, "outpaint-near-rounded:{id}"),
            Reason::LowAlphaContext(alpha) => write!(f, "low-alpha-context:{alpha:.3}"),
            Reason::BackgroundStackBase(overlays) => write!(f, "background-stack:{overlays}"),
            Reason::SelfRotation(angle) => write!(f, "self-rotation:{angle:.2}"),
            Reason::AncestorRotation(angle) => write!(f, "ancestor-rotation:{angle:.2}"),
            Reason::BakeRotation(angle) => write!(f, "bake-rotation:{angle:.2}"),
            Reason::IconGlyphIsolated => f.write_str("icon-glyph-isolated"),
            Reason::IconGlyphRotatedInPlace => f.write_str("icon-glyph-rotated-in-place"),
            Reason::IconGlyphComposited => f.write_str("icon-glyph-composited-in-place"),
            Reason::Modifier(modifier) => f.write_str(modifier.token()),
            Reason::DefaultClone => f.write_str("default:clone"),
        }
    }
}

impl Serialize for Reason {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokens_match_by_prefix() {
        let reason = Reason::AncestorClipOutside(4);
        assert_eq!(reason.to_string(), "ancestor-clip-outside:4");
        assert!(reason.matches("ancestor-clip-outside"));
        assert!(reason.matches("ancestor-clip-outside:"));
        assert!(reason.matches("ancestor-clip-outside:4"));
        assert!(!reason.matches("ancestor-clip"));
        assert!(Reason::DefaultClone.matches("default:clone"));
    }

    #[test]
    fn modifier_reasons_use_the_modifier_token() {
        let reason = Reason::Modifier(Modifier::DecoupleOpacity);
        assert!(reason.matches(Modifier::DecoupleOpacity.token()));
    }

    #[test]
    fn serializes_as_token_string() {
        let json = serde_json::to_string(&vec![
            Reason::BakeRotation(45.0),
            Reason::Composition(CompositionEffect::BackdropFilter),
        ])
        .unwrap();
        assert_eq!(json, r#"["bake-rotation:45.00","composition:backdrop-filter"]"#);
    }
}
