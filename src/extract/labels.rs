//! Property label → field name mapping

use std::collections::BTreeMap;

/// Known property labels on aratap.az detail pages
const DEFAULT_LABELS: &[(&str, &str)] = &[
    ("Şəhər", "city"),
    ("Əmlakın növü", "property_type"),
    ("Elanın tipi", "listing_type"),
    ("Yerləşdirmə yeri", "location"),
    ("Yerləşmə yeri", "location"),
    ("Binanın tipi", "building_type"),
    ("Sahə, m²", "area_sqm"),
    ("Sahə", "area_sqm"),
    ("Otaq sayı", "rooms"),
    ("Mərtəbə", "floor"),
    ("Mərtəbələrin sayı", "total_floors"),
    ("Tikinti ili", "construction_year"),
    ("Torpaq sahəsi", "land_area"),
    ("Otaqların sayı", "room_count"),
    ("Çıxarış", "deed_type"),
];

/// Maps human-readable property labels to record field names
#[derive(Debug, Clone)]
pub struct LabelMap {
    labels: BTreeMap<String, String>,
}

impl LabelMap {
    /// Builds the default table extended (and overridden) by `extra`
    pub fn with_overrides(extra: &BTreeMap<String, String>) -> Self {
        let mut labels: BTreeMap<String, String> = DEFAULT_LABELS
            .iter()
            .map(|(label, field)| (label.to_string(), field.to_string()))
            .collect();
        labels.extend(extra.iter().map(|(k, v)| (k.clone(), v.clone())));
        Self { labels }
    }

    /// Returns the field name for a raw label
    ///
    /// Colons and surrounding whitespace are stripped first. Unknown labels
    /// become lowercase with spaces replaced by underscores.
    pub fn field_for(&self, raw_label: &str) -> String {
        let label = raw_label.replace(':', "");
        let label = label.trim();

        match self.labels.get(label) {
            Some(field) => field.clone(),
            None => label.to_lowercase().replace(' ', "_"),
        }
    }
}

impl Default for LabelMap {
    fn default() -> Self {
        Self::with_overrides(&BTreeMap::new())
    }
}
