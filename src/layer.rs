//! Feature layers, the layer store, layer configuration, and map context.

use hashbrown::HashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    feature::{Feature, Properties},
    schema::{Domain, DomainRegistry, Field, FieldType, SchemaError},
    style::rule::{LabelRule, StyleRule, overlapping_bands},
    types::{FeatureId, LayerId},
};

/// Layer lookup, mutation, and configuration failures.
#[derive(Debug, thiserror::Error)]
pub enum LayerError {
    /// No layer with this id in the store.
    #[error("unknown layer {0}")]
    UnknownLayer(LayerId),
    /// A layer with this id is already registered.
    #[error("layer {0} already registered")]
    DuplicateLayer(LayerId),
    /// Feature id already present in the layer.
    #[error("feature {id} already exists in layer {layer}")]
    DuplicateFeature {
        /// Layer id.
        layer: LayerId,
        /// Feature id.
        id: FeatureId,
    },
    /// Feature id absent from the layer.
    #[error("feature {id} not found in layer {layer}")]
    MissingFeature {
        /// Layer id.
        layer: LayerId,
        /// Feature id.
        id: FeatureId,
    },
    /// Malformed layer definition.
    #[error("configuration error: {0}")]
    Config(String),
    /// Field schema rejected a definition or value.
    #[error(transparent)]
    Schema(#[from] SchemaError),
    /// Definition was not valid JSON.
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// In-memory vector layer: features plus their metadata and styling.
#[derive(Debug, Clone, Default)]
pub struct VectorLayer {
    id: LayerId,
    name: String,
    features: HashMap<FeatureId, Feature>,
    order: Vec<FeatureId>,
    fields: Vec<Field>,
    style_rules: Vec<StyleRule>,
    label_rules: Vec<LabelRule>,
    labels_visible: bool,
}

impl VectorLayer {
    /// Empty layer without metadata or styling.
    pub fn new(id: LayerId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            labels_visible: true,
            ..Self::default()
        }
    }

    /// Layer id.
    pub fn id(&self) -> LayerId {
        self.id
    }

    /// Display name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Field metadata. Empty when the layer has none.
    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    /// Field by attribute name.
    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name() == name)
    }

    /// Replaces the field list.
    pub fn set_fields(&mut self, fields: Vec<Field>) {
        self.fields = fields;
    }

    /// Ordered style rules.
    pub fn style_rules(&self) -> &[StyleRule] {
        &self.style_rules
    }

    /// Replaces the style rules.
    pub fn set_style_rules(&mut self, rules: Vec<StyleRule>) {
        self.style_rules = rules;
    }

    /// Ordered label rules.
    pub fn label_rules(&self) -> &[LabelRule] {
        &self.label_rules
    }

    /// Replaces the label rules, warning about overlapping bands.
    pub fn set_label_rules(&mut self, rules: Vec<LabelRule>) {
        for (a, b) in overlapping_bands(&rules) {
            tracing::warn!(layer = self.id, first = a, second = b, "label bands overlap; first rule wins");
        }
        self.label_rules = rules;
    }

    /// Whether labels are drawn at all.
    pub fn labels_visible(&self) -> bool {
        self.labels_visible
    }

    /// Turns labels on or off.
    pub fn set_labels_visible(&mut self, visible: bool) {
        self.labels_visible = visible;
    }

    /// Number of features.
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// True when the layer holds no features.
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Feature by id.
    pub fn get(&self, id: &FeatureId) -> Option<&Feature> {
        self.features.get(id)
    }

    /// Mutable feature by id.
    pub fn get_mut(&mut self, id: &FeatureId) -> Option<&mut Feature> {
        self.features.get_mut(id)
    }

    /// True when a feature with `id` exists.
    pub fn contains(&self, id: &FeatureId) -> bool {
        self.features.contains_key(id)
    }

    /// Features in insertion order.
    pub fn features(&self) -> impl Iterator<Item = &Feature> {
        self.order.iter().filter_map(|id| self.features.get(id))
    }

    /// Adds a feature and sets its layer back-reference.
    pub fn insert(&mut self, mut feature: Feature) -> Result<(), LayerError> {
        if self.features.contains_key(&feature.id) {
            return Err(LayerError::DuplicateFeature {
                layer: self.id,
                id: feature.id,
            });
        }
        feature.layer = Some(self.id);
        self.order.push(feature.id.clone());
        self.features.insert(feature.id.clone(), feature);
        Ok(())
    }

    /// Removes a feature, clearing its back-reference.
    pub fn remove(&mut self, id: &FeatureId) -> Option<Feature> {
        let (_, mut feature) = self.take(id)?;
        feature.layer = None;
        Some(feature)
    }

    /// Removes a feature and returns it with its insertion position. The
    /// back-reference and display state are left as they were.
    pub(crate) fn take(&mut self, id: &FeatureId) -> Option<(usize, Feature)> {
        let feature = self.features.remove(id)?;
        let pos = match self.order.iter().position(|x| x == id) {
            Some(pos) => {
                self.order.remove(pos);
                pos
            }
            None => self.order.len(),
        };
        Some((pos, feature))
    }

    /// Puts back a feature returned by [`Self::take`] at its old position.
    pub(crate) fn restore(&mut self, pos: usize, mut feature: Feature) -> Result<(), LayerError> {
        if self.features.contains_key(&feature.id) {
            return Err(LayerError::DuplicateFeature {
                layer: self.id,
                id: feature.id,
            });
        }
        feature.layer = Some(self.id);
        self.order.insert(pos.min(self.order.len()), feature.id.clone());
        self.features.insert(feature.id.clone(), feature);
        Ok(())
    }

    /// Validates `properties` against the field list.
    ///
    /// Layers without field metadata accept anything. Keys without a field
    /// are accepted as loose properties.
    pub fn validate_properties(&self, properties: &Properties) -> Result<(), SchemaError> {
        for (key, value) in properties {
            if let Some(field) = self.field(key) {
                field.validate(value)?;
            }
        }
        Ok(())
    }

    /// Like [`Self::validate_properties`], and also rejects changed values of
    /// non-editable fields relative to `before`.
    pub fn validate_update(&self, before: &Properties, after: &Properties) -> Result<(), SchemaError> {
        self.validate_properties(after)?;
        for field in self.fields.iter().filter(|f| !f.editable()) {
            if before.get(field.name()) != after.get(field.name()) {
                return Err(SchemaError::NotEditable(field.name().to_string()));
            }
        }
        Ok(())
    }

    /// Fills absent properties from field defaults.
    pub fn apply_defaults(&self, properties: &mut Properties) {
        for field in &self.fields {
            if let Some(default) = field.default_value()
                && !properties.contains_key(field.name())
            {
                properties.insert(field.name().to_string(), default.clone());
            }
        }
    }
}

/// All layers of one map, keyed by id.
#[derive(Debug, Clone, Default)]
pub struct LayerStore {
    layers: HashMap<LayerId, VectorLayer>,
    order: Vec<LayerId>,
}

impl LayerStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a layer.
    pub fn add_layer(&mut self, layer: VectorLayer) -> Result<(), LayerError> {
        let id = layer.id();
        if self.layers.contains_key(&id) {
            return Err(LayerError::DuplicateLayer(id));
        }
        self.order.push(id);
        self.layers.insert(id, layer);
        Ok(())
    }

    /// Layer by id.
    pub fn layer(&self, id: LayerId) -> Option<&VectorLayer> {
        self.layers.get(&id)
    }

    /// Mutable layer by id.
    pub fn layer_mut(&mut self, id: LayerId) -> Option<&mut VectorLayer> {
        self.layers.get_mut(&id)
    }

    /// Layer by id, or [`LayerError::UnknownLayer`].
    pub fn require(&self, id: LayerId) -> Result<&VectorLayer, LayerError> {
        self.layer(id).ok_or(LayerError::UnknownLayer(id))
    }

    /// Mutable layer by id, or [`LayerError::UnknownLayer`].
    pub fn require_mut(&mut self, id: LayerId) -> Result<&mut VectorLayer, LayerError> {
        self.layer_mut(id).ok_or(LayerError::UnknownLayer(id))
    }

    /// Feature lookup across the store.
    pub fn feature(&self, layer: LayerId, id: &FeatureId) -> Option<&Feature> {
        self.layer(layer)?.get(id)
    }

    /// Mutable feature lookup across the store.
    pub fn feature_mut(&mut self, layer: LayerId, id: &FeatureId) -> Option<&mut Feature> {
        self.layer_mut(layer)?.get_mut(id)
    }

    /// Layer ids in registration order.
    pub fn ids(&self) -> &[LayerId] {
        &self.order
    }
}

/// Field entry of a [`LayerDefinition`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDefinition {
    /// Attribute key.
    pub name: String,
    /// Display name; defaults to `name`.
    #[serde(default)]
    pub alias: Option<String>,
    /// Type tag.
    #[serde(rename = "type")]
    pub field_type: FieldType,
    /// Visible in attribute tables.
    #[serde(default = "default_true")]
    pub visible: bool,
    /// Writable through the editor.
    #[serde(default = "default_true")]
    pub editable: bool,
    /// Default value for new features.
    #[serde(default)]
    pub default: Option<Value>,
    /// Name of a domain declared in this definition or already registered.
    #[serde(default)]
    pub domain: Option<String>,
}

fn default_true() -> bool {
    true
}

/// Serializable layer metadata, loaded once when a layer is configured.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerDefinition {
    /// Layer id.
    pub id: LayerId,
    /// Display name.
    pub name: String,
    /// Domains to register before resolving fields.
    #[serde(default)]
    pub domains: Vec<Domain>,
    /// Field schema.
    #[serde(default)]
    pub fields: Vec<FieldDefinition>,
    /// Style rules in priority order.
    #[serde(default)]
    pub styles: Vec<StyleRule>,
    /// Label rules in priority order.
    #[serde(default)]
    pub labels: Vec<LabelRule>,
    /// Whether labels are drawn.
    #[serde(default = "default_true")]
    pub labels_visible: bool,
}

impl LayerDefinition {
    /// Parses a JSON definition.
    pub fn from_json(json: &str) -> Result<Self, LayerError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Registers domains, resolves field domain references, and validates
    /// rules. Fails eagerly on any configuration defect.
    pub fn build(self, registry: &DomainRegistry) -> Result<VectorLayer, LayerError> {
        for domain in self.domains {
            registry.get_or_register(domain);
        }

        let mut fields = Vec::with_capacity(self.fields.len());
        for def in self.fields {
            let mut field = Field::new(def.name.clone(), def.field_type);
            if let Some(domain_name) = &def.domain {
                let domain = registry.get(domain_name).ok_or_else(|| SchemaError::UnknownDomain {
                    field: def.name.clone(),
                    domain: domain_name.clone(),
                })?;
                field = field.with_domain(domain);
            }
            if let Some(alias) = def.alias {
                field.set_alias(alias);
            }
            field.set_visible(def.visible);
            field.set_editable(def.editable);
            if let Some(default) = &def.default {
                field.validate(default)?;
            }
            field.set_default(def.default);
            fields.push(field);
        }

        for (idx, rule) in self.styles.iter().enumerate() {
            for filter in &rule.filters {
                filter
                    .validate()
                    .map_err(|e| LayerError::Config(format!("style rule {idx}: {e}")))?;
            }
        }
        for (idx, rule) in self.labels.iter().enumerate() {
            if !(rule.min_resolution <= rule.max_resolution) {
                return Err(LayerError::Config(format!(
                    "label rule {idx}: min_resolution {} exceeds max_resolution {}",
                    rule.min_resolution, rule.max_resolution
                )));
            }
        }

        let mut layer = VectorLayer::new(self.id, self.name);
        layer.set_fields(fields);
        layer.set_style_rules(self.styles);
        layer.set_label_rules(self.labels);
        layer.set_labels_visible(self.labels_visible);
        tracing::debug!(layer = layer.id(), name = layer.name(), "layer configured");
        Ok(layer)
    }
}

/// Inches per meter, used by scale conversion.
const INCHES_PER_METER: f64 = 39.37;

/// Viewport facts the editor and style resolution read from the map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapContext {
    /// Map units per pixel.
    pub resolution: f64,
    /// Projection code, e.g. `EPSG:3857`.
    pub projection: String,
    /// Meters per map unit of `projection`.
    pub meters_per_unit: f64,
    /// Screen dots per inch.
    pub dpi: f64,
    /// Layers shown on the map, bottom first.
    pub layers: Vec<LayerId>,
}

impl Default for MapContext {
    fn default() -> Self {
        Self {
            resolution: 1.0,
            projection: "EPSG:3857".to_string(),
            meters_per_unit: 1.0,
            dpi: 96.0,
            layers: Vec::new(),
        }
    }
}

impl MapContext {
    /// Scale denominator at the current resolution.
    pub fn scale(&self) -> f64 {
        self.scale_for_resolution(self.resolution)
    }

    /// Scale denominator for `resolution`.
    pub fn scale_for_resolution(&self, resolution: f64) -> f64 {
        resolution * self.meters_per_unit * INCHES_PER_METER * self.dpi
    }

    /// Resolution for a scale denominator.
    pub fn resolution_for_scale(&self, scale: f64) -> f64 {
        scale / (self.meters_per_unit * INCHES_PER_METER * self.dpi)
    }
}
