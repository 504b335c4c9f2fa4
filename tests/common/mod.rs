#![allow(dead_code)]
use std::collections::{BTreeMap, VecDeque};

use layercap::analyzer::assign_ids;
use layercap::geometry::{Rect, Size};
use layercap::model::{AnalysisNode, AnalysisTree, DomPath, LayoutDocument, NodeKind, StabilityReport};
use layercap::output::OutputSink;
use layercap::style::StyleSnapshot;
use layercap::{Error, RenderSession, Result};
use serde_json::{json, Value};

/// A bare node; tests adjust style and flags afterwards.
pub fn node(tag: &str, kind: NodeKind, rect: Rect) -> AnalysisNode {
    AnalysisNode {
        id: 0,
        kind,
        tag: tag.to_string(),
        role: None,
        attributes: Default::default(),
        dom_path: DomPath::default(),
        synthetic: None,
        rect,
        rotation: 0.0,
        transform: None,
        style: StyleSnapshot::default(),
        text: None,
        text_style: None,
        image_ref: None,
        icon_glyph: false,
        interactive: false,
        is_root: false,
        is_mask: false,
        range: None,
        children: Vec::new(),
    }
}

pub fn with_children(mut parent: AnalysisNode, children: Vec<AnalysisNode>) -> AnalysisNode {
    parent.children = children;
    parent
}

fn assign_paths(node: &mut AnalysisNode, path: DomPath) {
    let mut element = 0;
    for child in node.children.iter_mut() {
        if child.synthetic.is_some() {
            child.dom_path = path.clone();
            continue;
        }
        assign_paths(child, path.child(element));
        element += 1;
    }
    node.dom_path = path;
}

/// Number the nodes, derive DOM paths below `html/1` and mark the root.
pub fn tree_with(mut root: AnalysisNode, viewport: Size, pixel_ratio: f64) -> AnalysisTree {
    root.is_root = true;
    assign_paths(&mut root, DomPath(vec![1]));
    assign_ids(&mut root);
    let root_path = root.dom_path.clone();
    AnalysisTree {
        root,
        viewport,
        pixel_ratio,
        root_path,
        mask_path: None,
        stability: StabilityReport { fonts_loaded: true },
    }
}

/// An 800x600 canvas at 1x.
pub fn tree(root: AnalysisNode) -> AnalysisTree {
    tree_with(root, Size { width: 800.0, height: 600.0 }, 1.0)
}

/// Full-canvas root container with a white background.
pub fn canvas_root(children: Vec<AnalysisNode>) -> AnalysisNode {
    let mut root = node("div", NodeKind::Container, Rect::new(0.0, 0.0, 800.0, 600.0));
    root.style.background_color = layercap::style::parse_color("#ffffff").unwrap();
    with_children(root, children)
}

/// Minimal PNG header with the given size.
pub fn png(width: u32, height: u32) -> Vec<u8> {
    let mut bytes = b"\x89PNG\r\n\x1a\n\0\0\0\x0dIHDR".to_vec();
    bytes.extend_from_slice(&width.to_be_bytes());
    bytes.extend_from_slice(&height.to_be_bytes());
    bytes.extend_from_slice(&[8, 6, 0, 0, 0]);
    bytes
}

/// In-memory session answering setup and cleanup scripts from a queue.
pub struct ScriptedSession {
    pub scripts: Vec<String>,
    pub setup_responses: VecDeque<Result<Value>>,
    pub viewport: Size,
    pub viewport_history: Vec<Size>,
    pub captures: Vec<Rect>,
    pub fail_capture: bool,
    pub pixel_ratio: f64,
}

impl ScriptedSession {
    pub fn new() -> Self {
        Self {
            scripts: Vec::new(),
            setup_responses: VecDeque::new(),
            viewport: Size { width: 800.0, height: 600.0 },
            viewport_history: Vec::new(),
            captures: Vec::new(),
            fail_capture: false,
            pixel_ratio: 1.0,
        }
    }

    /// Queue a successful setup measuring `rect` with the given undo records.
    pub fn measure(&mut self, rect: Rect, undo: Value) {
        self.setup_responses.push_back(Ok(json!({
            "ok": true,
            "vanished": false,
            "rect": { "x": rect.x, "y": rect.y, "width": rect.width, "height": rect.height },
            "undo": undo,
        })));
    }

    pub fn revert_scripts(&self) -> Vec<&String> {
        self.scripts.iter().filter(|s| s.contains("const provided =")).collect()
    }

    pub fn setup_scripts(&self) -> Vec<&String> {
        self.scripts.iter().filter(|s| s.contains("const measure =")).collect()
    }
}

impl RenderSession for ScriptedSession {
    fn load_url(&mut self, _url: &str) -> Result<()> {
        Ok(())
    }

    fn evaluate_json(&mut self, script: &str, _await_promise: bool) -> Result<Value> {
        self.scripts.push(script.to_string());
        if script.contains("const measure =") {
            return self
                .setup_responses
                .pop_front()
                .unwrap_or_else(|| Err(Error::ScriptError("no scripted setup response".into())));
        }
        if script.contains("const provided =") {
            return Ok(json!({ "reverted": 1, "failures": [] }));
        }
        Ok(Value::Null)
    }

    fn capture_region(&mut self, clip: &Rect) -> Result<Vec<u8>> {
        self.captures.push(*clip);
        if self.fail_capture {
            return Err(Error::CaptureError("screenshot refused".into()));
        }
        Ok(png(
            (clip.width * self.pixel_ratio).round() as u32,
            (clip.height * self.pixel_ratio).round() as u32,
        ))
    }

    fn viewport(&mut self) -> Result<Size> {
        Ok(self.viewport)
    }

    fn set_viewport(&mut self, size: Size) -> Result<()> {
        self.viewport = size;
        self.viewport_history.push(size);
        Ok(())
    }

    fn close(self) -> Result<()> {
        Ok(())
    }
}

/// Sink keeping every artifact in memory.
#[derive(Default)]
pub struct MemorySink {
    pub images: BTreeMap<String, Vec<u8>>,
    pub layout: Option<LayoutDocument>,
    pub debug: BTreeMap<String, Value>,
}

impl OutputSink for MemorySink {
    fn write_image(&mut self, name: &str, png: &[u8]) -> Result<()> {
        self.images.insert(name.to_string(), png.to_vec());
        Ok(())
    }

    fn write_layout(&mut self, layout: &LayoutDocument) -> Result<()> {
        self.layout = Some(layout.clone());
        Ok(())
    }

    fn write_debug(&mut self, name: &str, value: &Value) -> Result<()> {
        self.debug.insert(name.to_string(), value.clone());
        Ok(())
    }
}
