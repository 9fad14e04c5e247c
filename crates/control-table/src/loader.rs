use crate::RegisterEntry;
use anyhow::Context;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

#[derive(Debug, Deserialize)]
struct RawEntry {
    name: String,
    address: u16,
    width: u8,
}

/// Parse extra models from YAML:
///
/// ```yaml
/// sts3215:
///   - { name: position, address: 56, width: 2 }
/// ```
pub fn parse_models(raw: &str) -> anyhow::Result<Vec<(String, Vec<RegisterEntry>)>> {
    let models: BTreeMap<String, Vec<RawEntry>> =
        serde_yaml::from_str(raw).context("parsing control table yaml")?;
    let mut out = Vec::with_capacity(models.len());
    for (model, entries) in models {
        let entries = entries
            .iter()
            .map(|e| RegisterEntry::new(&e.name, e.address, e.width))
            .collect::<Result<Vec<_>, _>>()
            .with_context(|| format!("model {model}"))?;
        out.push((model, entries));
    }
    Ok(out)
}

pub fn load_models_file(
    path: impl AsRef<Path>,
) -> anyhow::Result<Vec<(String, Vec<RegisterEntry>)>> {
    let path = path.as_ref();
    let raw = fs::read_to_string(path)
        .with_context(|| format!("reading control tables: {}", path.display()))?;
    parse_models(&raw).with_context(|| format!("decoding control tables: {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ControlTables, Width};
    use std::io::Write;

    #[test]
    fn test_parse_models() {
        let yaml = "sts3215:\n  - { name: position, address: 56, width: 2 }\n  - { name: torque, address: 40, width: 1 }\n";
        let models = parse_models(yaml).unwrap();
        assert_eq!(models.len(), 1);
        assert_eq!(models[0].0, "sts3215");
        assert_eq!(models[0].1[0].width, Width::Two);
    }

    #[test]
    fn test_parse_rejects_bad_width() {
        let yaml = "bad:\n  - { name: position, address: 56, width: 3 }\n";
        let err = parse_models(yaml).unwrap_err();
        assert!(format!("{err:#}").contains("invalid register width 3"));
    }

    #[test]
    fn test_load_file_into_catalog() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "custom:\n  - {{ name: position, address: 10, width: 4 }}").unwrap();
        let extra = load_models_file(file.path()).unwrap();
        let tables = ControlTables::builtin().extended(extra).unwrap();
        assert_eq!(tables.resolve("custom").unwrap()["position"].address, 10);
    }
}
