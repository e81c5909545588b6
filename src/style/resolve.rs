//! Per-feature style stack resolution.

use super::{
    model::{Marker, Style, StyleConfig},
    rule::label_for_resolution,
    template,
};
use crate::{feature::Feature, layer::VectorLayer};

/// Computes the style stack the renderer draws for one feature.
///
/// Stateless apart from its overlay configuration; every call recomputes from
/// the feature's current state and the layer's current rules.
#[derive(Debug, Clone, Default)]
pub struct StyleResolver {
    config: StyleConfig,
}

impl StyleResolver {
    /// Resolver with custom overlay defaults.
    pub fn new(config: StyleConfig) -> Self {
        Self { config }
    }

    /// Overlay configuration.
    pub fn config(&self) -> &StyleConfig {
        &self.config
    }

    /// Returns `[overlay?, base, label?]`, or `None` when nothing is drawn.
    ///
    /// Hidden features and features no style rule accepts resolve to `None`.
    pub fn resolve(&self, layer: &VectorLayer, feature: &Feature, resolution: f64) -> Option<Vec<Style>> {
        if feature.state.hidden {
            return None;
        }

        let rule = layer.style_rules().iter().find(|r| r.matches(feature))?;
        let base = &rule.style;

        let mut stack = Vec::with_capacity(3);
        let overlay_template = if feature.state.highlighted {
            Some(&self.config.highlight)
        } else if feature.state.selected {
            Some(&self.config.selection)
        } else {
            None
        };
        if let Some(template) = overlay_template {
            stack.push(self.overlay(template, base));
        }
        stack.push(base.clone());

        if layer.labels_visible()
            && let Some(label) = label_for_resolution(layer.label_rules(), resolution)
        {
            let mut text = label.style.clone();
            text.text = template::format(&label.text, feature, layer.fields(), true);
            stack.push(Style::label(text));
        }

        Some(stack)
    }

    /// Scales the overlay template so it stays proportionate to `base`.
    fn overlay(&self, template: &Style, base: &Style) -> Style {
        let mut out = template.clone();
        out.text = None;

        if let (Some(stroke), Some(base_stroke)) = (out.stroke.as_mut(), base.stroke.as_ref()) {
            stroke.width = base_stroke.width * self.config.stroke_scale;
        }

        out.marker = base.marker.as_ref().map(|base_marker| {
            let radius = match base_marker {
                Marker::Circle { radius, .. } => radius * self.config.circle_scale,
                Marker::Icon { .. } => base_marker.radius() * self.config.icon_scale,
            };
            let (fill, stroke) = match &template.marker {
                Some(Marker::Circle { fill, stroke, .. }) => (fill.clone(), stroke.clone()),
                _ => (template.fill.clone(), template.stroke.clone()),
            };
            Marker::Circle { radius, fill, stroke }
        });

        out
    }
}
