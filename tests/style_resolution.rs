use serde_json::json;

use featedit::{
    feature::{Feature, Geometry},
    layer::{LayerDefinition, LayerError, VectorLayer},
    schema::{DomainRegistry, SchemaError},
    style::{
        filter::{Filter, FilterOp},
        model::{Fill, Marker, Stroke, Style, StyleConfig},
        resolve::StyleResolver,
        rule::{LabelRule, StyleRule},
    },
};

fn circle(radius: f32) -> Style {
    Style {
        stroke: Some(Stroke {
            color: [0.0, 0.0, 0.0, 1.0],
            width: 2.0,
        }),
        marker: Some(Marker::Circle {
            radius,
            fill: Some(Fill {
                color: [1.0, 0.0, 0.0, 1.0],
            }),
            stroke: None,
        }),
        ..Style::default()
    }
}

fn layer() -> VectorLayer {
    let mut layer = VectorLayer::new(1, "hydrants");
    layer.set_style_rules(vec![
        StyleRule::new(vec![Filter::new("status", FilterOp::Equal, "broken")], circle(8.0)),
        StyleRule::fallback(circle(4.0)),
    ]);
    layer.set_label_rules(vec![
        LabelRule::new(0.0, 10.0, "{name} ({$id})"),
        LabelRule::new(10.5, 100.0, "{name}"),
    ]);
    layer
}

fn hydrant(id: i64, status: &str) -> Feature {
    Feature::new(id, Some(Geometry::point(0.0, 0.0)))
        .with_property("status", status)
        .with_property("name", "H")
}

#[test]
fn first_matching_rule_wins_and_label_follows_band() {
    let layer = layer();
    let resolver = StyleResolver::default();

    let broken = hydrant(1, "broken");
    let stack = resolver.resolve(&layer, &broken, 5.0).expect("styles");
    assert_eq!(stack.len(), 2);
    assert_eq!(stack[0].marker.as_ref().map(Marker::radius), Some(8.0));
    assert_eq!(stack[1].text.as_ref().map(|t| t.text.as_str()), Some("H (1)"));

    let ok = hydrant(2, "ok");
    let stack = resolver.resolve(&layer, &ok, 50.0).expect("styles");
    assert_eq!(stack[0].marker.as_ref().map(Marker::radius), Some(4.0));
    assert_eq!(stack[1].text.as_ref().map(|t| t.text.as_str()), Some("H"));

    // Between bands: no label.
    let stack = resolver.resolve(&layer, &ok, 10.2).expect("styles");
    assert_eq!(stack.len(), 1);
}

#[test]
fn hidden_and_unmatched_features_draw_nothing() {
    let mut layer = layer();
    let resolver = StyleResolver::default();

    let mut hidden = hydrant(1, "ok");
    hidden.state.hidden = true;
    assert!(resolver.resolve(&layer, &hidden, 5.0).is_none());

    layer.set_style_rules(vec![StyleRule::new(
        vec![Filter::new("status", FilterOp::Equal, "broken")],
        circle(8.0),
    )]);
    assert!(resolver.resolve(&layer, &hydrant(2, "ok"), 5.0).is_none());
}

#[test]
fn selection_overlay_is_scaled_to_base() {
    let mut layer = layer();
    layer.set_labels_visible(false);
    let resolver = StyleResolver::default();

    let mut f = hydrant(1, "ok");
    f.state.selected = true;
    let stack = resolver.resolve(&layer, &f, 5.0).expect("styles");
    assert_eq!(stack.len(), 2);

    let overlay = &stack[0];
    assert!(overlay.text.is_none());
    assert_eq!(overlay.stroke.as_ref().map(|s| s.width), Some(6.0));
    assert_eq!(overlay.marker.as_ref().map(Marker::radius), Some(8.0));
    assert_eq!(stack[1], circle(4.0));
}

#[test]
fn highlight_takes_precedence_over_selection() {
    let layer = layer();
    let config = StyleConfig::default();
    let resolver = StyleResolver::new(config.clone());

    let mut f = hydrant(1, "ok");
    f.state.selected = true;
    f.state.highlighted = true;
    let stack = resolver.resolve(&layer, &f, 500.0).expect("styles");

    assert_eq!(stack.len(), 2);
    assert_eq!(stack[0].fill, config.highlight.fill);
}

#[test]
fn icon_overlay_covers_icon() {
    let mut layer = VectorLayer::new(2, "signs");
    layer.set_style_rules(vec![StyleRule::fallback(Style {
        marker: Some(Marker::Icon {
            src: "sign.png".into(),
            size: [20.0, 10.0],
            scale: 2.0,
        }),
        ..Style::default()
    })]);

    let mut f = Feature::new(1, Some(Geometry::point(0.0, 0.0)));
    f.state.highlighted = true;
    let stack = StyleResolver::default().resolve(&layer, &f, 1.0).expect("styles");
    // Covering radius 20 * 2 / 2 = 20, scaled by 1.5.
    assert_eq!(stack[0].marker.as_ref().map(Marker::radius), Some(30.0));
}

#[test]
fn layer_definition_from_json_resolves_domains() {
    let json = r#"{
        "id": 7,
        "name": "valves",
        "domains": [
            { "name": "valve_state", "type": "coded", "values": [[1, "Open"], [2, "Closed"]] }
        ],
        "fields": [
            { "name": "state", "type": "integer", "domain": "valve_state", "default": 1 },
            { "name": "size", "type": "double" }
        ],
        "styles": [
            { "filters": [{ "attribute": "size", "op": "between", "operand": [0, 10] }], "style": {} },
            { "style": { "z_index": 1 } }
        ],
        "labels": [
            { "min_resolution": 0.0, "max_resolution": 50.0, "text": "{state}" }
        ]
    }"#;

    let registry = DomainRegistry::new();
    let layer = LayerDefinition::from_json(json)
        .expect("parse")
        .build(&registry)
        .expect("build");
    assert_eq!(registry.len(), 1);
    assert_eq!(layer.fields().len(), 2);

    let small = Feature::new(1, None).with_property("state", 2).with_property("size", 4);
    let big = Feature::new(2, None).with_property("state", 1).with_property("size", 40);
    let resolver = StyleResolver::default();

    let stack = resolver.resolve(&layer, &small, 1.0).expect("styles");
    assert_eq!(stack[0].z_index, 0);
    assert_eq!(stack[1].text.as_ref().map(|t| t.text.as_str()), Some("Closed"));

    let stack = resolver.resolve(&layer, &big, 1.0).expect("styles");
    assert_eq!(stack[0].z_index, 1);
    assert_eq!(stack[1].text.as_ref().map(|t| t.text.as_str()), Some("Open"));

    assert!(layer.validate_properties(&small.properties).is_ok());
    let bad = Feature::new(3, None).with_property("state", 5);
    assert!(matches!(
        layer.validate_properties(&bad.properties),
        Err(SchemaError::OutOfDomain { .. })
    ));
}

#[test]
fn unknown_domain_and_inverted_band_are_config_errors() {
    let registry = DomainRegistry::new();
    let unknown = json!({
        "id": 1,
        "name": "x",
        "fields": [{ "name": "a", "type": "string", "domain": "missing" }]
    });
    let err = LayerDefinition::from_json(&unknown.to_string())
        .expect("parse")
        .build(&registry)
        .unwrap_err();
    assert!(matches!(err, LayerError::Schema(SchemaError::UnknownDomain { .. })));

    let inverted = json!({
        "id": 1,
        "name": "x",
        "labels": [{ "min_resolution": 10.0, "max_resolution": 1.0, "text": "t" }]
    });
    let err = LayerDefinition::from_json(&inverted.to_string())
        .expect("parse")
        .build(&registry)
        .unwrap_err();
    assert!(matches!(err, LayerError::Config(_)));
}
