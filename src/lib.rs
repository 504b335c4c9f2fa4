//! layercap
//!
//! Captures a rendered document as a visual-asset bundle: a layout tree with
//! geometry and style for every visible element, plus isolated raster images
//! for the elements a downstream renderer cannot rebuild from style alone.
//!
//! # Stages
//!
//! - **Analyzer**: one pass over the rendered element tree, producing an
//!   immutable [`model::AnalysisTree`] in device pixels
//! - **Planner**: an ordered rule cascade deciding whether and how each node
//!   is captured, with a reason-tagged trace of every decision
//! - **Executor**: runs each capture as a transaction against the live page
//!   and restores the page afterwards
//! - **Assembler**: merges the tree and capture metadata into the persisted
//!   [`model::LayoutDocument`]
//!
//! # Example
//!
//! ```no_run
//! use layercap::{CaptureConfig, Viewport};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = CaptureConfig {
//!     document: "page.html".to_string(),
//!     viewport: Viewport { width: 390, height: 844 },
//!     pixel_ratio: Some(3.0),
//!     output_dir: "out".into(),
//!     ..Default::default()
//! };
//!
//! let report = layercap::pipeline::capture(&config)?;
//! println!("{} images", report.summary.captured);
//! # Ok(())
//! # }
//! ```

use std::path::{Path, PathBuf};

use url::Url;

pub mod error;
pub use error::{Error, Result};

pub mod analyzer;
pub mod assembler;
pub mod executor;
pub mod geometry;
pub mod model;
pub mod output;
pub mod pipeline;
pub mod planner;
pub mod session;
pub mod style;

#[cfg(feature = "cdp")]
pub mod cdp;

// Async facade over one worker-owned session
#[cfg(feature = "cdp")]
pub mod async_api;

#[cfg(feature = "cdp")]
pub use async_api::CaptureService;

pub use analyzer::AnalyzerSettings;
pub use planner::PlannerSettings;
pub use session::RenderSession;

/// Configuration for one capture run
///
/// The pixel ratio is either given directly or derived from a physical
/// width; when neither is set the document is captured at 1x.
///
/// # Examples
///
/// ```
/// let cfg = layercap::CaptureConfig {
///     physical_width: Some(2560),
///     ..Default::default()
/// };
/// assert_eq!(cfg.pixel_ratio().unwrap(), 2.0);
/// ```
#[derive(Debug, Clone)]
pub struct CaptureConfig {
    /// URL or file path of the document
    pub document: String,
    /// Logical viewport, CSS pixels
    pub viewport: Viewport,
    pub pixel_ratio: Option<f64>,
    /// Target width in device pixels; the ratio becomes `physical_width / viewport.width`
    pub physical_width: Option<u32>,
    /// CSS selector of the capture root; chosen automatically when unset
    pub root_selector: Option<String>,
    /// Write the debug dump next to the layout
    pub debug: bool,
    pub output_dir: PathBuf,
    /// Session timeout for navigation and script calls in milliseconds
    pub timeout_ms: u64,
    pub analyzer: AnalyzerSettings,
    pub planner: PlannerSettings,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            document: String::new(),
            viewport: Viewport::default(),
            pixel_ratio: None,
            physical_width: None,
            root_selector: None,
            debug: false,
            output_dir: PathBuf::from("layercap-out"),
            timeout_ms: 30000,
            analyzer: AnalyzerSettings::default(),
            planner: PlannerSettings::default(),
        }
    }
}

impl CaptureConfig {
    /// Reject configurations no run could succeed with
    pub fn validate(&self) -> Result<()> {
        if self.document.trim().is_empty() {
            return Err(Error::ConfigError("No document given".to_string()));
        }
        if self.viewport.width == 0 || self.viewport.height == 0 {
            return Err(Error::ConfigError(format!(
                "Viewport {}x{} has no area",
                self.viewport.width, self.viewport.height
            )));
        }
        if self.pixel_ratio.is_some() && self.physical_width.is_some() {
            return Err(Error::ConfigError(
                "Give either a pixel ratio or a physical width, not both".to_string(),
            ));
        }
        if self.timeout_ms == 0 {
            return Err(Error::ConfigError("Timeout must be positive".to_string()));
        }
        if let Some(selector) = &self.root_selector {
            if selector.trim().is_empty() {
                return Err(Error::ConfigError("Root selector is empty".to_string()));
            }
        }
        self.pixel_ratio().map(|_| ())
    }

    /// Active device pixel ratio
    pub fn pixel_ratio(&self) -> Result<f64> {
        let ratio = match (self.pixel_ratio, self.physical_width) {
            (Some(ratio), _) => ratio,
            (None, Some(physical)) => {
                if self.viewport.width == 0 {
                    return Err(Error::ConfigError("Viewport width is zero".to_string()));
                }
                physical as f64 / self.viewport.width as f64
            }
            (None, None) => 1.0,
        };
        if !(ratio.is_finite() && ratio > 0.0) {
            return Err(Error::ConfigError(format!("Invalid pixel ratio {}", ratio)));
        }
        Ok(ratio)
    }

    /// Document location as a URL; file paths become `file://` URLs
    pub fn document_url(&self) -> Result<String> {
        let raw = self.document.trim();
        if let Ok(url) = Url::parse(raw) {
            // Single-letter schemes are Windows drive letters
            if url.scheme().len() > 1 {
                return Ok(url.to_string());
            }
        }
        let path = Path::new(raw);
        let absolute = if path.is_absolute() {
            path.to_path_buf()
        } else {
            std::env::current_dir()?.join(path)
        };
        Url::from_file_path(&absolute)
            .map(|u| u.to_string())
            .map_err(|_| Error::ConfigError(format!("Not a usable document path: {}", absolute.display())))
    }
}

/// Viewport dimensions in CSS pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = CaptureConfig::default();
        assert_eq!(config.viewport.width, 1280);
        assert_eq!(config.viewport.height, 720);
        assert_eq!(config.pixel_ratio().unwrap(), 1.0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn physical_width_sets_the_ratio() {
        let config = CaptureConfig {
            document: "https://example.com".into(),
            viewport: Viewport { width: 390, height: 844 },
            physical_width: Some(1170),
            ..Default::default()
        };
        assert!((config.pixel_ratio().unwrap() - 3.0).abs() < 1e-9);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn conflicting_ratio_settings_are_rejected() {
        let config = CaptureConfig {
            document: "page.html".into(),
            pixel_ratio: Some(2.0),
            physical_width: Some(1000),
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(Error::ConfigError(_))));

        let negative = CaptureConfig {
            document: "page.html".into(),
            pixel_ratio: Some(-1.0),
            ..Default::default()
        };
        assert!(negative.pixel_ratio().is_err());
    }

    #[test]
    fn file_paths_become_file_urls() {
        let config = CaptureConfig {
            document: "/tmp/page one.html".into(),
            ..Default::default()
        };
        assert_eq!(config.document_url().unwrap(), "file:///tmp/page%20one.html");

        let remote = CaptureConfig {
            document: "https://example.com/app".into(),
            ..Default::default()
        };
        assert_eq!(remote.document_url().unwrap(), "https://example.com/app");
    }
}
