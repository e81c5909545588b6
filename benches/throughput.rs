use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};

use featedit::{
    editor::{Activatable, session::EditorSession},
    feature::{Feature, Geometry, Properties},
    layer::{LayerStore, VectorLayer},
    style::{
        filter::{Filter, FilterOp},
        model::Style,
        resolve::StyleResolver,
        rule::{LabelRule, StyleRule},
    },
    types::FeatureId,
};

fn session() -> EditorSession {
    let mut layers = LayerStore::new();
    layers.add_layer(VectorLayer::new(1, "bench")).expect("add");
    let mut s = EditorSession::new(layers);
    s.activate();
    s
}

fn populated(n: i64) -> EditorSession {
    let mut s = session();
    for i in 0..n {
        s.start_operation().expect("start");
        s.create_feature(1, Feature::new(i, Some(Geometry::point(i as f64, 0.0))))
            .expect("create");
        s.stop_operation().expect("stop");
    }
    s
}

fn bench_creates(c: &mut Criterion) {
    c.bench_function("session_create_10k", |b| {
        b.iter(|| populated(10_000));
    });
}

fn bench_undo_redo(c: &mut Criterion) {
    c.bench_function("undo_redo_all_5k", |b| {
        let mut s = populated(5_000);
        b.iter(|| {
            while s.undo().expect("undo").is_some() {}
            while s.redo().expect("redo").is_some() {}
        });
    });
}

fn bench_pending_batch(c: &mut Criterion) {
    let mut s = populated(2_000);
    for i in 0..2_000i64 {
        let mut changes = Properties::new();
        changes.insert("rev".to_string(), serde_json::json!(i));
        s.start_operation().expect("start");
        s.set_properties(1, &FeatureId::Num(i % 500), changes).expect("set");
        s.stop_operation().expect("stop");
    }
    c.bench_function("pending_batch_4k_ops", |b| {
        b.iter(|| s.pending_batch());
    });
}

fn bench_resolve(c: &mut Criterion) {
    let mut group = c.benchmark_group("resolve_styles");
    for rules in [1usize, 10, 50] {
        let mut layer = VectorLayer::new(1, "styled");
        let mut style_rules: Vec<StyleRule> = (0..rules)
            .map(|i| StyleRule::new(vec![Filter::new("class", FilterOp::Equal, i as i64 + 1000)], Style::default()))
            .collect();
        style_rules.push(StyleRule::fallback(Style::default()));
        layer.set_style_rules(style_rules);
        layer.set_label_rules(vec![LabelRule::new(0.0, 100.0, "{name} #{$id}")]);

        let mut feature = Feature::new(1, Some(Geometry::point(0.0, 0.0)))
            .with_property("class", 1)
            .with_property("name", "valve");
        feature.state.selected = true;
        let resolver = StyleResolver::default();

        group.bench_with_input(BenchmarkId::from_parameter(rules), &rules, |b, _| {
            b.iter(|| resolver.resolve(&layer, &feature, 10.0));
        });
    }
    group.finish();
}

criterion_group!(benches, bench_creates, bench_undo_redo, bench_pending_batch, bench_resolve);
criterion_main!(benches);
