//! Output sinks and the debug dump

use std::fs;
use std::path::{Path, PathBuf};

use log::debug;
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::model::{AnalysisTree, CaptureTask, LayoutDocument, RuleTraceRecord};
use crate::planner::{Plan, Violation};
use crate::Result;

pub const LAYOUT_FILE: &str = "layout.json";
pub const DEBUG_DIR: &str = "debug";

/// Destination for the artifacts of one run
pub trait OutputSink {
    fn write_image(&mut self, name: &str, png: &[u8]) -> Result<()>;

    fn write_layout(&mut self, layout: &LayoutDocument) -> Result<()>;

    /// Write one debug artifact, `name` being relative to the debug area
    fn write_debug(&mut self, name: &str, value: &serde_json::Value) -> Result<()>;
}

/// Writes everything below one output directory
#[derive(Debug, Clone)]
pub struct FsSink {
    root: PathBuf,
}

impl FsSink {
    /// Create the output directory if it does not exist
    pub fn create(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn write_json(path: &Path, value: &impl Serialize) -> Result<()> {
        let text = serde_json::to_string_pretty(value)?;
        fs::write(path, text)?;
        debug!("Wrote {}", path.display());
        Ok(())
    }
}

impl OutputSink for FsSink {
    fn write_image(&mut self, name: &str, png: &[u8]) -> Result<()> {
        let path = self.root.join(name);
        fs::write(&path, png)?;
        debug!("Wrote {} ({} bytes)", path.display(), png.len());
        Ok(())
    }

    fn write_layout(&mut self, layout: &LayoutDocument) -> Result<()> {
        Self::write_json(&self.root.join(LAYOUT_FILE), layout)
    }

    fn write_debug(&mut self, name: &str, value: &serde_json::Value) -> Result<()> {
        let dir = self.root.join(DEBUG_DIR);
        fs::create_dir_all(&dir)?;
        Self::write_json(&dir.join(name), value)
    }
}

/// SHA-256 of the serialized plan, hex encoded
pub fn plan_digest(plan: &Plan) -> Result<String> {
    let bytes = serde_json::to_vec(plan)?;
    Ok(hex::encode(Sha256::digest(&bytes)))
}

/// Counts and digest written to `debug/summary.json`
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    pub source: String,
    pub pixel_ratio: f64,
    pub node_count: usize,
    pub task_count: usize,
    pub captured: usize,
    pub vanished: usize,
    pub failed: usize,
    pub validation_issues: usize,
    pub fonts_loaded: bool,
    pub plan_digest: String,
}

/// Everything the debug dump consists of
pub struct DebugDump<'a> {
    pub tree: &'a AnalysisTree,
    pub tasks: &'a [CaptureTask],
    pub trace: &'a [RuleTraceRecord],
    pub violations: &'a [Violation],
    pub summary: &'a RunSummary,
}

impl DebugDump<'_> {
    pub fn write<O: OutputSink + ?Sized>(&self, sink: &mut O) -> Result<()> {
        sink.write_debug("analysis.json", &serde_json::to_value(self.tree)?)?;
        sink.write_debug("tasks.json", &serde_json::to_value(self.tasks)?)?;
        sink.write_debug("trace.json", &serde_json::to_value(self.trace)?)?;
        sink.write_debug("validation.json", &serde_json::to_value(self.violations)?)?;
        sink.write_debug("summary.json", &serde_json::to_value(self.summary)?)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fs_sink_writes_images_and_debug_files() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = FsSink::create(dir.path().join("out")).unwrap();
        sink.write_image("000_div.png", b"\x89PNG").unwrap();
        sink.write_debug("summary.json", &serde_json::json!({ "taskCount": 0 }))
            .unwrap();

        assert_eq!(fs::read(sink.root().join("000_div.png")).unwrap(), b"\x89PNG");
        let summary = fs::read_to_string(sink.root().join("debug/summary.json")).unwrap();
        assert!(summary.contains("taskCount"));
    }

    #[test]
    fn empty_plan_digest_is_stable() {
        let plan = Plan::default();
        let a = plan_digest(&plan).unwrap();
        assert_eq!(a.len(), 64);
        assert_eq!(a, plan_digest(&plan).unwrap());
    }
}
