//! Device mapping resolver: loads the YAML device mapping document, merges
//! template references, and builds the three runtime lookups plus the
//! per-light command descriptors.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use serde::Deserialize;
use serde_yaml::Value;

const TEMPLATES_KEY: &str = "templates";
const MERGE_KEY: &str = "<<";
const DEFAULT_INSTANCE: &str = "default";

/// A device configuration after template merge.
#[derive(Debug, Clone, PartialEq)]
pub struct MappingEntry {
    pub entity_id: String,
    pub friendly_name: String,
    pub suggested_area: Option<String>,
    pub device_type: Option<String>,
    pub status_dgn: Option<String>,
    pub interface: Option<String>,
    pub capabilities: Vec<String>,
}

impl MappingEntry {
    pub fn is_light(&self) -> bool {
        self.device_type.as_deref() == Some("light")
    }

    pub fn is_dimmable(&self) -> bool {
        self.capabilities.iter().any(|c| c == "brightness")
    }
}

#[derive(Debug, Deserialize)]
struct RawEntryFields {
    entity_id: String,
    friendly_name: String,
    #[serde(default)]
    suggested_area: Option<String>,
    #[serde(default)]
    device_type: Option<String>,
    #[serde(default)]
    status_dgn: Option<String>,
    #[serde(default)]
    interface: Option<String>,
    #[serde(default)]
    capabilities: Vec<String>,
}

impl From<RawEntryFields> for MappingEntry {
    fn from(raw: RawEntryFields) -> Self {
        MappingEntry {
            entity_id: raw.entity_id,
            friendly_name: raw.friendly_name,
            suggested_area: raw.suggested_area,
            device_type: raw.device_type,
            status_dgn: raw.status_dgn,
            interface: raw.interface,
            capabilities: raw.capabilities,
        }
    }
}

/// DGN + instance + target interface needed to command a light entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LightCommandInfo {
    pub dgn: u32,
    pub instance: u32,
    pub interface: Option<String>,
}

/// The three lookups built once at load time, immutable at runtime.
#[derive(Debug, Default)]
pub struct MappingTables {
    definition_lookup: HashMap<(String, String), MappingEntry>,
    status_lookup: HashMap<(String, String), MappingEntry>,
    entity_lookup: HashMap<String, MappingEntry>,
    light_command_info: HashMap<String, LightCommandInfo>,
}

impl MappingTables {
    /// Load the mapping document at `path`. A missing file or malformed
    /// document is non-fatal: it is logged as a warning and an empty set of
    /// lookups is returned so Lights/Raw tabs still function without device
    /// correlation.
    pub fn load(path: &Path) -> Self {
        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(err) => {
                log::warn!("device mapping {:?} could not be read: {}", path, err);
                return Self::default();
            }
        };
        Self::load_str(&text)
    }

    pub fn load_str(text: &str) -> Self {
        let root: Value = match serde_yaml::from_str(text) {
            Ok(value) => value,
            Err(err) => {
                log::warn!("device mapping could not be parsed: {}", err);
                return Self::default();
            }
        };

        let Value::Mapping(root) = root else {
            log::warn!("device mapping document must be a top-level mapping");
            return Self::default();
        };

        let templates = Self::collect_templates(&root);
        let mut tables = Self::default();

        for (key, value) in &root {
            let Some(key_str) = key.as_str() else { continue };
            if key_str == TEMPLATES_KEY {
                continue;
            }
            let dgn_hex = key_str.to_uppercase();
            let Value::Mapping(instances) = value else {
                log::warn!("mapping entry for DGN {} is not a mapping of instances", dgn_hex);
                continue;
            };

            for (instance_key, entries_value) in instances {
                let Some(instance) = instance_key.as_str().map(|s| s.to_string())
                    .or_else(|| instance_key.as_i64().map(|n| n.to_string()))
                else {
                    continue;
                };

                let Value::Sequence(entries) = entries_value else {
                    log::warn!(
                        "mapping entries for DGN {} instance {} must be a list",
                        dgn_hex,
                        instance
                    );
                    continue;
                };

                for raw_entry in entries {
                    let Value::Mapping(raw_entry) = raw_entry else {
                        log::warn!(
                            "skipping non-mapping entry under DGN {} instance {}",
                            dgn_hex,
                            instance
                        );
                        continue;
                    };
                    tables.ingest_entry(&dgn_hex, &instance, raw_entry, &templates);
                }
            }
        }

        tables
    }

    fn collect_templates(root: &serde_yaml::Mapping) -> HashMap<String, serde_yaml::Mapping> {
        let mut templates = HashMap::new();
        let Some(Value::Mapping(raw_templates)) =
            root.get(Value::String(TEMPLATES_KEY.to_string()))
        else {
            return templates;
        };
        for (name, fields) in raw_templates {
            if let (Some(name), Value::Mapping(fields)) = (name.as_str(), fields) {
                templates.insert(name.to_string(), fields.clone());
            }
        }
        templates
    }

    fn ingest_entry(
        &mut self,
        dgn_hex: &str,
        instance: &str,
        raw_entry: &serde_yaml::Mapping,
        templates: &HashMap<String, serde_yaml::Mapping>,
    ) {
        let merged = merge_template(raw_entry, templates);

        let fields: RawEntryFields = match serde_yaml::from_value(Value::Mapping(merged)) {
            Ok(fields) => fields,
            Err(err) => {
                log::warn!(
                    "skipping mapping entry under DGN {} instance {}: {}",
                    dgn_hex,
                    instance,
                    err
                );
                return;
            }
        };

        let entry: MappingEntry = fields.into();

        let status_dgn = entry
            .status_dgn
            .as_deref()
            .map(|s| s.to_uppercase())
            .unwrap_or_else(|| dgn_hex.to_string());

        if entry.is_light() {
            if let Ok(parsed_instance) = instance.parse::<u32>() {
                self.light_command_info.insert(
                    entry.entity_id.clone(),
                    LightCommandInfo {
                        dgn: u32::from_str_radix(dgn_hex, 16).unwrap_or(0),
                        instance: parsed_instance,
                        interface: entry.interface.clone(),
                    },
                );
            } else {
                log::warn!(
                    "light entity '{}' has non-numeric instance '{}', cannot be commanded",
                    entry.entity_id,
                    instance
                );
            }
        }

        self.entity_lookup
            .entry(entry.entity_id.clone())
            .or_insert_with(|| entry.clone());

        self.status_lookup
            .insert((status_dgn, instance.to_string()), entry.clone());
        self.definition_lookup
            .insert((dgn_hex.to_string(), instance.to_string()), entry);
    }

    /// Resolve an incoming frame's `(dgn_hex, instance)` to a mapping entry,
    /// falling back to the DGN's `default` instance on a direct miss.
    pub fn resolve_status(&self, dgn_hex: &str, instance: &str) -> Option<&MappingEntry> {
        let dgn_hex = dgn_hex.to_uppercase();
        self.status_lookup
            .get(&(dgn_hex.clone(), instance.to_string()))
            .or_else(|| self.status_lookup.get(&(dgn_hex, DEFAULT_INSTANCE.to_string())))
    }

    pub fn entity(&self, entity_id: &str) -> Option<&MappingEntry> {
        self.entity_lookup.get(entity_id)
    }

    pub fn light_command_info(&self, entity_id: &str) -> Option<&LightCommandInfo> {
        self.light_command_info.get(entity_id)
    }

    /// All entities whose `device_type` is `light`.
    pub fn light_entities(&self) -> impl Iterator<Item = &MappingEntry> {
        self.entity_lookup.values().filter(|entry| entry.is_light())
    }
}

fn merge_template(
    entry: &serde_yaml::Mapping,
    templates: &HashMap<String, serde_yaml::Mapping>,
) -> serde_yaml::Mapping {
    let mut merged = serde_yaml::Mapping::new();

    let merge_key = Value::String(MERGE_KEY.to_string());
    if let Some(template_name) = entry.get(&merge_key).and_then(|v| v.as_str()) {
        if let Some(template_fields) = templates.get(template_name) {
            for (k, v) in template_fields {
                merged.insert(k.clone(), v.clone());
            }
        } else {
            log::warn!("mapping entry references unknown template '{}'", template_name);
        }
    }

    for (k, v) in entry {
        if k == &merge_key {
            continue;
        }
        merged.insert(k.clone(), v.clone());
    }

    merged
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_via_status_dgn() {
        let doc = r#"
templates:
  dimmable_light:
    device_type: light
    capabilities: [brightness]

1FED9:
  "33":
    - <<: dimmable_light
      entity_id: master_bedroom_ceiling
      friendly_name: "Master Bedroom Ceiling"
      status_dgn: "1FEDA"
      interface: can0
"#;
        let tables = MappingTables::load_str(doc);

        let resolved = tables.resolve_status("1FEDA", "33").unwrap();
        assert_eq!(resolved.entity_id, "master_bedroom_ceiling");
        assert!(resolved.is_light());
        assert!(resolved.is_dimmable());

        let cmd = tables.light_command_info("master_bedroom_ceiling").unwrap();
        assert_eq!(cmd.dgn, 0x1FED9);
        assert_eq!(cmd.instance, 33);
        assert_eq!(cmd.interface.as_deref(), Some("can0"));
    }

    #[test]
    fn falls_back_to_default_instance() {
        let doc = r#"
1FED9:
  default:
    - entity_id: fallback_light
      friendly_name: "Fallback"
      device_type: light
"#;
        let tables = MappingTables::load_str(doc);
        assert!(tables.resolve_status("1FED9", "99").is_some());
        assert!(tables.resolve_status("1FED9", "99").unwrap().entity_id == "fallback_light");
    }

    #[test]
    fn no_match_returns_none() {
        let doc = r#"
1FED9:
  "33":
    - entity_id: only_light
      friendly_name: "Only"
      device_type: light
"#;
        let tables = MappingTables::load_str(doc);
        assert!(tables.resolve_status("1FED9", "34").is_none());
    }

    #[test]
    fn entries_missing_required_keys_are_discarded() {
        let doc = r#"
1FED9:
  "33":
    - friendly_name: "Missing entity id"
"#;
        let tables = MappingTables::load_str(doc);
        assert!(tables.resolve_status("1FED9", "33").is_none());
    }

    #[test]
    fn missing_file_yields_empty_tables_not_an_error() {
        let tables = MappingTables::load(Path::new("/nonexistent/does-not-exist.yaml"));
        assert!(tables.entity("anything").is_none());
    }

    #[test]
    fn explicit_fields_override_template_fields() {
        let doc = r#"
templates:
  base:
    device_type: light
    friendly_name: "Template Name"

1FED9:
  "1":
    - <<: base
      entity_id: e1
      friendly_name: "Explicit Name"
"#;
        let tables = MappingTables::load_str(doc);
        let entry = tables.entity("e1").unwrap();
        assert_eq!(entry.friendly_name, "Explicit Name");
    }
}
