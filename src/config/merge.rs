//! Deep merge of JSON-shaped config layers.
//!
//! Objects merge key by key; arrays and scalars from the later layer replace
//! the earlier value outright.

use serde_json::Value;

/// Overlay `overlay` onto `base`.
pub fn deep_merge(base: Value, overlay: Value) -> Value {
    match (base, overlay) {
        (Value::Object(mut base_map), Value::Object(overlay_map)) => {
            for (key, overlay_value) in overlay_map {
                let merged = match base_map.remove(&key) {
                    Some(base_value) => deep_merge(base_value, overlay_value),
                    None => overlay_value,
                };
                base_map.insert(key, merged);
            }
            Value::Object(base_map)
        }
        (_, overlay) => overlay,
    }
}

/// Fold layers in precedence order (first is lowest).
pub fn merge_layers(layers: Vec<Value>) -> Value {
    layers.into_iter().fold(Value::Null, deep_merge)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_nested_table_keeps_unset_keys() {
        let base = json!({"min_versions": {"ios": "13.4", "macosx": "11.0"}});
        let overlay = json!({"min_versions": {"ios": "15.0"}});
        let merged = deep_merge(base, overlay);

        assert_eq!(merged["min_versions"]["ios"], "15.0");
        assert_eq!(merged["min_versions"]["macosx"], "11.0");
    }

    #[test]
    fn test_mirror_list_is_replaced_not_appended() {
        let base = json!({"boost": {"mirrors": ["https://a", "https://b"]}});
        let overlay = json!({"boost": {"mirrors": ["https://c"]}});
        let merged = deep_merge(base, overlay);

        assert_eq!(merged["boost"]["mirrors"], json!(["https://c"]));
    }

    #[test]
    fn test_layers_apply_in_order() {
        let merged = merge_layers(vec![
            json!({"jobs": 4, "paths": {"build_dir": "build"}}),
            json!({"jobs": 8}),
            json!({"paths": {"build_dir": "out"}}),
        ]);

        assert_eq!(merged["jobs"], 8);
        assert_eq!(merged["paths"]["build_dir"], "out");
    }
}
