use crate::{CatalogError, FieldMap, RegisterEntry, Result, Width};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

// https://emanual.robotis.com/docs/en/dxl/x/xl330-m288/#control-table
/// Field name, address, width of the X-series control table.
pub const X_SERIES: &[(&str, u16, Width)] = &[
    ("model_number", 0, Width::Two),
    ("firmware_version", 6, Width::One),
    ("id", 7, Width::One),
    ("baud_rate", 8, Width::One),
    ("return_delay_time", 9, Width::One),
    ("drive_mode", 10, Width::One),
    ("operating_mode", 11, Width::One),
    ("homing_offset", 20, Width::Four),
    ("temperature_limit", 31, Width::One),
    ("pwm_limit", 36, Width::Two),
    ("current_limit", 38, Width::Two),
    ("max_position_limit", 48, Width::Four),
    ("min_position_limit", 52, Width::Four),
    ("torque", 64, Width::One),
    ("led", 65, Width::One),
    ("goal_pwm", 100, Width::Two),
    ("goal_current", 102, Width::Two),
    ("goal_velocity", 104, Width::Four),
    ("profile_acceleration", 108, Width::Four),
    ("profile_velocity", 112, Width::Four),
    ("goal_position", 116, Width::Four),
    ("moving", 122, Width::One),
    ("pwm", 124, Width::Two),
    ("current", 126, Width::Two),
    ("velocity", 128, Width::Four),
    ("position", 132, Width::Four),
    ("voltage", 144, Width::Two),
    ("temperature", 146, Width::One),
];

/// Models that share [`X_SERIES`].
pub const X_SERIES_MODELS: &[&str] = &[
    "xl330-m077",
    "xl330-m288",
    "xl430-w250",
    "xm430-w350",
    "xm540-w270",
];

/// Model name to control table. Tables are shared between models of one family.
#[derive(Debug, Clone)]
pub struct ControlTables {
    models: HashMap<String, Arc<[RegisterEntry]>>,
}

impl Default for ControlTables {
    fn default() -> Self {
        Self::builtin()
    }
}

impl ControlTables {
    pub fn builtin() -> Self {
        let table: Arc<[RegisterEntry]> = X_SERIES
            .iter()
            .map(|(name, address, width)| RegisterEntry {
                name: (*name).to_string(),
                address: *address,
                width: *width,
            })
            .collect();
        let models = X_SERIES_MODELS
            .iter()
            .map(|m| ((*m).to_string(), Arc::clone(&table)))
            .collect();
        Self { models }
    }

    /// A copy of this catalog with `extra` models added or replaced.
    pub fn extended<I>(&self, extra: I) -> Result<Self>
    where
        I: IntoIterator<Item = (String, Vec<RegisterEntry>)>,
    {
        let mut out = self.clone();
        for (model, entries) in extra {
            let mut seen = HashSet::new();
            for entry in &entries {
                if !seen.insert(entry.name.as_str()) {
                    return Err(CatalogError::DuplicateField {
                        model,
                        field: entry.name.clone(),
                    });
                }
            }
            tracing::debug!(model = %model, fields = entries.len(), "control table added");
            out.models.insert(model, entries.into());
        }
        Ok(out)
    }

    pub fn lookup(&self, model: &str) -> Option<&[RegisterEntry]> {
        self.models.get(model).map(|t| &**t)
    }

    pub fn contains(&self, model: &str) -> bool {
        self.models.contains_key(model)
    }

    /// Field map for one device of `model`.
    pub fn resolve(&self, model: &str) -> Result<FieldMap> {
        let table = self
            .lookup(model)
            .ok_or_else(|| CatalogError::UnknownModel(model.to_string()))?;
        Ok(table
            .iter()
            .map(|e| (e.name.clone(), e.register()))
            .collect())
    }

    /// Known model names, sorted.
    pub fn models(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.models.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{field, Register};

    #[test]
    fn test_builtin_models_share_table() {
        let tables = ControlTables::builtin();
        assert_eq!(tables.models().len(), X_SERIES_MODELS.len());
        let a = tables.lookup("xl330-m077").unwrap();
        let b = tables.lookup("xm540-w270").unwrap();
        assert_eq!(a.as_ptr(), b.as_ptr());
    }

    #[test]
    fn test_resolve_position() {
        let map = ControlTables::builtin().resolve("xl330-m288").unwrap();
        assert_eq!(
            map[field::POSITION],
            Register {
                address: 132,
                width: Width::Four
            }
        );
        assert_eq!(map[field::TORQUE].width, Width::One);
        assert_eq!(map[field::HOMING_OFFSET].address, 20);
    }

    #[test]
    fn test_unknown_model() {
        let err = ControlTables::builtin().resolve("sts3215").unwrap_err();
        assert_eq!(err, CatalogError::UnknownModel("sts3215".to_string()));
    }

    #[test]
    fn test_extended_leaves_original_untouched() {
        let base = ControlTables::builtin();
        let extra = vec![(
            "sts3215".to_string(),
            vec![RegisterEntry::new("position", 56, 2).unwrap()],
        )];
        let merged = base.extended(extra).unwrap();
        assert!(merged.contains("sts3215"));
        assert!(merged.contains("xl330-m288"));
        assert!(!base.contains("sts3215"));
    }

    #[test]
    fn test_extended_rejects_duplicate_fields() {
        let extra = vec![(
            "custom".to_string(),
            vec![
                RegisterEntry::new("position", 56, 2).unwrap(),
                RegisterEntry::new("position", 58, 2).unwrap(),
            ],
        )];
        assert!(matches!(
            ControlTables::builtin().extended(extra),
            Err(CatalogError::DuplicateField { .. })
        ));
    }

    #[test]
    fn test_invalid_width() {
        let err = RegisterEntry::new("odd", 10, 3).unwrap_err();
        assert_eq!(
            err,
            CatalogError::InvalidWidth {
                field: "odd".to_string(),
                width: 3
            }
        );
    }

    #[test]
    fn test_width_encode_truncates_little_endian() {
        assert_eq!(Width::Two.encode(0x1234_5678), vec![0x78, 0x56]);
        assert_eq!(Width::Four.encode(u32::MAX), vec![0xFF; 4]);
        assert_eq!(Width::One.decode(&[0x2A]), Some(42));
        assert_eq!(Width::Two.decode(&[0x2A]), None);
    }
}
