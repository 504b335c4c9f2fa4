use std::collections::BTreeMap;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use layercap::analyzer::assign_ids;
use layercap::assembler::{assemble, CanvasSpec};
use layercap::geometry::{CornerRadii, Rect, Size};
use layercap::model::{AnalysisNode, AnalysisTree, DomPath, NodeKind, StabilityReport};
use layercap::planner::{plan, PlannerSettings};
use layercap::style::{parse_color, Rgba, StyleSnapshot};

fn node(tag: &str, kind: NodeKind, path: DomPath, rect: Rect) -> AnalysisNode {
    AnalysisNode {
        id: 0,
        kind,
        tag: tag.to_string(),
        role: None,
        attributes: Default::default(),
        dom_path: path,
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

/// A feed of `cards` cards, each a rounded clipping container with a
/// thumbnail, a title and a faded badge
fn feed(cards: usize) -> AnalysisTree {
    let white = parse_color("#ffffff").unwrap_or(Rgba::TRANSPARENT);
    let height = cards as f64 * 120.0;
    let root_path = DomPath(vec![1, 0]);
    let mut root = node("main", NodeKind::Container, root_path.clone(), Rect::new(0.0, 0.0, 800.0, height));
    root.is_root = true;
    root.style.background_color = white;

    for i in 0..cards {
        let y = i as f64 * 120.0 + 10.0;
        let path = root_path.child(i);
        let mut card = node("article", NodeKind::Container, path.clone(), Rect::new(10.0, y, 780.0, 100.0));
        card.style.background_color = white;
        card.style.overflow_x = "hidden".into();
        card.style.overflow_y = "hidden".into();
        card.style.border_radius = CornerRadii::uniform(16.0);

        let thumb = node("img", NodeKind::Image, path.child(0), Rect::new(10.0, y, 100.0, 100.0));
        let mut title = node("h3", NodeKind::Text, path.child(1), Rect::new(130.0, y + 10.0, 400.0, 24.0));
        title.text = Some(format!("Item {}", i));
        let mut badge = node("img", NodeKind::Image, path.child(2), Rect::new(760.0, y - 6.0, 40.0, 24.0));
        badge.style.opacity = 0.6;
        if i % 3 == 0 {
            badge.rotation = 12.0;
        }
        card.children = vec![thumb, title, badge];
        root.children.push(card);
    }
    assign_ids(&mut root);

    AnalysisTree {
        root,
        viewport: Size { width: 800.0, height: 600.0 },
        pixel_ratio: 1.0,
        root_path,
        mask_path: None,
        stability: StabilityReport { fonts_loaded: true },
    }
}

fn bench_plan(c: &mut Criterion) {
    let settings = PlannerSettings::default();
    let mut group = c.benchmark_group("plan");
    for cards in [10usize, 100, 1000] {
        let tree = feed(cards);
        group.bench_with_input(BenchmarkId::from_parameter(cards), &tree, |b, tree| {
            b.iter(|| plan(black_box(tree), &settings))
        });
    }
    group.finish();
}

fn bench_assemble(c: &mut Criterion) {
    let tree = feed(500);
    let canvas = CanvasSpec::of(&tree, "file:///feed.html");
    let captures = BTreeMap::new();
    c.bench_function("assemble_500_cards", |b| {
        b.iter(|| assemble(black_box(&tree), &captures, &canvas))
    });
}

criterion_group!(benches, bench_plan, bench_assemble);
criterion_main!(benches);
