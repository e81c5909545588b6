//! Style and label rules attached to a layer.

use serde::{Deserialize, Serialize};

use super::{
    filter::{Filter, matches_all},
    model::{Style, TextStyle},
};
use crate::feature::Feature;

/// Filter-guarded drawing style. Rules are tried in order; first match wins.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StyleRule {
    /// Conditions, all of which must hold. Empty means "always".
    #[serde(default)]
    pub filters: Vec<Filter>,
    /// Style drawn when the rule matches.
    pub style: Style,
}

impl StyleRule {
    /// Rule guarded by `filters`.
    pub fn new(filters: Vec<Filter>, style: Style) -> Self {
        Self { filters, style }
    }

    /// Unconditional rule, meant to sit last as a fallback.
    pub fn fallback(style: Style) -> Self {
        Self::new(Vec::new(), style)
    }

    /// True when every filter holds for `feature`.
    pub fn matches(&self, feature: &Feature) -> bool {
        matches_all(&self.filters, feature)
    }
}

/// Resolution-banded label.
///
/// Bands should not overlap; when they do, the first rule in list order wins.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelRule {
    /// Smallest resolution (map units per pixel) at which the label shows.
    pub min_resolution: f64,
    /// Largest resolution at which the label shows.
    pub max_resolution: f64,
    /// Template, see [`crate::style::template`].
    pub text: String,
    /// Text rendering parameters.
    #[serde(default)]
    pub style: TextStyle,
}

impl LabelRule {
    /// Label rule with default text style.
    pub fn new(min_resolution: f64, max_resolution: f64, text: impl Into<String>) -> Self {
        Self {
            min_resolution,
            max_resolution,
            text: text.into(),
            style: TextStyle::default(),
        }
    }

    /// Inclusive on both ends.
    pub fn contains(&self, resolution: f64) -> bool {
        resolution >= self.min_resolution && resolution <= self.max_resolution
    }

    /// True when the two bands share at least one resolution.
    pub fn overlaps(&self, other: &Self) -> bool {
        self.min_resolution <= other.max_resolution && other.min_resolution <= self.max_resolution
    }
}

/// First label rule whose band contains `resolution`.
pub fn label_for_resolution(rules: &[LabelRule], resolution: f64) -> Option<&LabelRule> {
    rules.iter().find(|r| r.contains(resolution))
}

/// Index pairs of overlapping bands, for load-time warnings.
pub fn overlapping_bands(rules: &[LabelRule]) -> Vec<(usize, usize)> {
    let mut out = Vec::new();
    for (i, a) in rules.iter().enumerate() {
        for (j, b) in rules.iter().enumerate().skip(i + 1) {
            if a.overlaps(b) {
                out.push((i, j));
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn band_bounds_are_inclusive() {
        let r = LabelRule::new(1000.0, 5000.0, "{name}");
        assert!(r.contains(1000.0));
        assert!(r.contains(5000.0));
        assert!(!r.contains(999.9));
        assert!(!r.contains(5000.1));
    }

    #[test]
    fn first_band_wins_on_overlap() {
        let rules = vec![
            LabelRule::new(0.0, 10.0, "a"),
            LabelRule::new(5.0, 20.0, "b"),
            LabelRule::new(30.0, 40.0, "c"),
        ];
        assert_eq!(label_for_resolution(&rules, 7.0).map(|r| r.text.as_str()), Some("a"));
        assert_eq!(label_for_resolution(&rules, 15.0).map(|r| r.text.as_str()), Some("b"));
        assert!(label_for_resolution(&rules, 25.0).is_none());
        assert_eq!(overlapping_bands(&rules), vec![(0, 1)]);
    }

    #[test]
    fn touching_bands_overlap() {
        let a = LabelRule::new(0.0, 10.0, "a");
        let b = LabelRule::new(10.0, 20.0, "b");
        assert!(a.overlaps(&b));
    }
}
