use crate::commands::dashboard::DEFAULT_PAGE_SIZE;
use crate::commands::editor::DEFAULT_INCREMENT_STEPS;
use serde_json::{json, Map, Value};
use std::fs;
use std::path::{Path, PathBuf};

const SETTINGS_SCHEMA_VERSION: i64 = 1;
const MAX_PAGE_SIZE: u64 = 12;

#[derive(Debug, Clone, PartialEq)]
pub struct EffectiveSettings {
    pub page_size: usize,
    pub increment_steps: Vec<f64>,
    pub forwarders_enabled: bool,
}

pub async fn get_settings(workspace_path: String) -> Result<Value, String> {
    load_settings_from_disk(&workspace_path)
}

pub async fn save_settings(workspace_path: String, settings: Value) -> Result<Value, String> {
    save_settings_to_disk(&workspace_path, settings)
}

pub fn load_effective_settings(workspace_path: &str) -> Result<EffectiveSettings, String> {
    let settings = load_settings_from_disk(workspace_path)?;
    Ok(effective_from(&settings))
}

fn effective_from(settings: &Value) -> EffectiveSettings {
    let page_size = settings
        .get("pageSize")
        .and_then(Value::as_u64)
        .unwrap_or(DEFAULT_PAGE_SIZE as u64)
        .clamp(1, MAX_PAGE_SIZE) as usize;

    let increment_steps = settings
        .get("incrementSteps")
        .and_then(Value::as_array)
        .map(|steps| steps.iter().filter_map(Value::as_f64).collect::<Vec<_>>())
        .filter(|steps| !steps.is_empty())
        .unwrap_or_else(|| DEFAULT_INCREMENT_STEPS.to_vec());

    let forwarders_enabled = settings
        .get("forwardersEnabled")
        .and_then(Value::as_bool)
        .unwrap_or(true);

    EffectiveSettings {
        page_size,
        increment_steps,
        forwarders_enabled,
    }
}

pub fn load_settings_from_disk(workspace_path: &str) -> Result<Value, String> {
    let path = settings_path(workspace_path);
    ensure_goalboard_dir(workspace_path)?;

    let original = if path.exists() {
        let raw = fs::read_to_string(&path)
            .map_err(|e| format!("Failed to read settings.json: {e}"))?;
        serde_json::from_str::<Value>(&raw).unwrap_or_else(|_| json!({}))
    } else {
        json!({})
    };

    let migrated = migrate_settings(original.clone());
    if migrated != original || !path.exists() {
        write_settings_file(&path, &migrated)?;
    }

    Ok(migrated)
}

pub fn save_settings_to_disk(workspace_path: &str, settings: Value) -> Result<Value, String> {
    let path = settings_path(workspace_path);
    ensure_goalboard_dir(workspace_path)?;

    let mut merged = load_settings_from_disk(workspace_path).unwrap_or_else(|_| default_settings());
    merge_settings(&mut merged, &settings);

    let migrated = migrate_settings(merged);
    write_settings_file(&path, &migrated)?;
    Ok(migrated)
}

fn settings_path(workspace_path: &str) -> PathBuf {
    Path::new(workspace_path)
        .join(".goalboard")
        .join("settings.json")
}

fn ensure_goalboard_dir(workspace_path: &str) -> Result<(), String> {
    let dir = Path::new(workspace_path).join(".goalboard");
    fs::create_dir_all(&dir)
        .map_err(|e| format!("Failed to create .goalboard directory: {e}"))
}

fn write_settings_file(path: &Path, settings: &Value) -> Result<(), String> {
    let raw = serde_json::to_string_pretty(settings)
        .map_err(|e| format!("Failed to serialize settings: {e}"))?;
    fs::write(path, raw)
        .map_err(|e| format!("Failed to write settings.json: {e}"))
}

fn migrate_settings(input: Value) -> Value {
    let defaults = default_settings();
    let mut out = match input {
        Value::Object(map) => Value::Object(map),
        _ => Value::Object(Map::new()),
    };

    deep_merge_defaults(&mut out, &defaults);
    sanitize_settings(&mut out);
    if let Some(obj) = out.as_object_mut() {
        obj.insert("schema_version".to_string(), json!(SETTINGS_SCHEMA_VERSION));
    }

    out
}

fn default_settings() -> Value {
    json!({
        "schema_version": SETTINGS_SCHEMA_VERSION,
        "pageSize": DEFAULT_PAGE_SIZE,
        "incrementSteps": DEFAULT_INCREMENT_STEPS,
        "forwardersEnabled": true
    })
}

fn deep_merge_defaults(target: &mut Value, defaults: &Value) {
    let (Some(target_obj), Some(default_obj)) = (target.as_object_mut(), defaults.as_object()) else {
        return;
    };

    for (key, default_value) in default_obj {
        match target_obj.get_mut(key) {
            Some(existing) => {
                if existing.is_object() && default_value.is_object() {
                    deep_merge_defaults(existing, default_value);
                }
            }
            None => {
                target_obj.insert(key.clone(), default_value.clone());
            }
        }
    }
}

fn merge_settings(target: &mut Value, incoming: &Value) {
    match (target, incoming) {
        (Value::Object(target_obj), Value::Object(incoming_obj)) => {
            for (key, value) in incoming_obj {
                if let Some(existing) = target_obj.get_mut(key) {
                    merge_settings(existing, value);
                } else {
                    target_obj.insert(key.clone(), value.clone());
                }
            }
        }
        (target_slot, incoming_value) => {
            *target_slot = incoming_value.clone();
        }
    }
}

fn sanitize_settings(settings: &mut Value) {
    let Some(obj) = settings.as_object_mut() else {
        return;
    };

    clamp_u64(obj, "pageSize", 1, MAX_PAGE_SIZE, DEFAULT_PAGE_SIZE as u64);
    ensure_bool(obj, "forwardersEnabled", true);
    sanitize_steps(obj, "incrementSteps");
}

fn clamp_u64(map: &mut Map<String, Value>, key: &str, min: u64, max: u64, default: u64) {
    let raw = map.get(key).and_then(Value::as_u64).unwrap_or(default);
    map.insert(key.to_string(), json!(raw.clamp(min, max)));
}

fn ensure_bool(map: &mut Map<String, Value>, key: &str, default: bool) {
    let value = map.get(key).and_then(Value::as_bool).unwrap_or(default);
    map.insert(key.to_string(), json!(value));
}

// Keeps positive finite steps only; falls back to the defaults when none survive.
fn sanitize_steps(map: &mut Map<String, Value>, key: &str) {
    let steps: Vec<f64> = map
        .get(key)
        .and_then(Value::as_array)
        .map(|raw| {
            raw.iter()
                .filter_map(Value::as_f64)
                .filter(|step| step.is_finite() && *step > 0.0)
                .collect()
        })
        .unwrap_or_default();

    let steps = if steps.is_empty() {
        DEFAULT_INCREMENT_STEPS.to_vec()
    } else {
        steps
    };
    map.insert(key.to_string(), json!(steps));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fills_defaults_and_stamps_schema_version() {
        let migrated = migrate_settings(json!({}));

        assert_eq!(migrated["pageSize"], json!(3));
        assert_eq!(migrated["forwardersEnabled"], json!(true));
        assert_eq!(migrated["schema_version"], json!(SETTINGS_SCHEMA_VERSION));
        assert_eq!(
            effective_from(&migrated).increment_steps,
            vec![1.0, 5.0, 10.0]
        );
    }

    #[test]
    fn sanitizes_out_of_range_values() {
        let migrated = migrate_settings(json!({
            "pageSize": 500,
            "incrementSteps": [-1, "x", 0, 2.5],
            "forwardersEnabled": "yes"
        }));

        assert_eq!(migrated["pageSize"], json!(MAX_PAGE_SIZE));
        assert_eq!(migrated["incrementSteps"], json!([2.5]));
        assert_eq!(migrated["forwardersEnabled"], json!(true));
    }

    #[test]
    fn merges_partial_settings_without_losing_existing_values() {
        let mut existing = default_settings();
        merge_settings(&mut existing, &json!({ "pageSize": 5 }));
        let migrated = migrate_settings(existing);

        assert_eq!(migrated["pageSize"], json!(5));
        assert_eq!(migrated["incrementSteps"], json!([1.0, 5.0, 10.0]));
    }
}
