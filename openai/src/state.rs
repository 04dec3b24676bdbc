//! Conversions between API objects and Terraform values

use std::collections::HashMap;
use tfplug::{AttributePath, Diagnostic, Dynamic, DynamicValue};

/// Builds an object value from `(attribute, value)` pairs
pub fn object<const N: usize>(fields: [(&str, Dynamic); N]) -> Dynamic {
    Dynamic::Map(
        fields
            .into_iter()
            .map(|(name, value)| (name.to_string(), value))
            .collect(),
    )
}

pub fn string_list(items: &[String]) -> Dynamic {
    Dynamic::List(items.iter().map(|s| Dynamic::from(s.as_str())).collect())
}

/// Metadata maps read back as null when empty so that an unset `metadata`
/// argument stays consistent with what the API returns. An empty map that
/// `known` (the plan or prior state) already holds is kept as is.
pub fn string_map(known: Option<&Dynamic>, map: Option<&HashMap<String, String>>) -> Dynamic {
    match map {
        Some(map) if !map.is_empty() => Dynamic::Map(
            map.iter()
                .map(|(k, v)| (k.clone(), Dynamic::from(v.as_str())))
                .collect(),
        ),
        _ => match known {
            Some(Dynamic::Map(empty)) if empty.is_empty() => Dynamic::Map(HashMap::new()),
            _ => Dynamic::Null,
        },
    }
}

/// JSON documents are stored as compact strings
pub fn json_string(value: Option<&serde_json::Value>) -> Dynamic {
    match value {
        Some(value) if !value.is_null() => Dynamic::String(value.to_string()),
        _ => Dynamic::Null,
    }
}

/// Like `json_string`, but keeps `prior` text when it parses to the same
/// document so formatting differences do not read as drift.
pub fn json_string_keeping(prior: Option<&Dynamic>, value: Option<&serde_json::Value>) -> Dynamic {
    let text = prior.and_then(Dynamic::as_str);
    match (text, value) {
        (Some(text), Some(value))
            if serde_json::from_str::<serde_json::Value>(text).ok().as_ref() == Some(value) =>
        {
            Dynamic::String(text.to_string())
        }
        _ => json_string(value),
    }
}

/// Parses a JSON string attribute, `None` when unset
pub fn parse_json(
    value: &DynamicValue,
    path: AttributePath,
) -> Result<Option<serde_json::Value>, Diagnostic> {
    let Ok(text) = value.get_string(&path) else {
        return Ok(None);
    };
    serde_json::from_str(&text).map(Some).map_err(|e| {
        Diagnostic::error("Invalid JSON", format!("{} is not valid JSON: {}", path, e))
            .with_attribute(path)
    })
}

pub fn required_string(value: &DynamicValue, name: &str) -> Result<String, Diagnostic> {
    value.get_string(&AttributePath::new(name)).map_err(|_| {
        Diagnostic::error(
            format!("Missing {}", name),
            format!("The '{}' attribute is required", name),
        )
        .with_attribute(AttributePath::new(name))
    })
}

pub fn optional_string(value: &DynamicValue, name: &str) -> Option<String> {
    value.get_string(&AttributePath::new(name)).ok()
}

/// Keeps an attribute from another value, usually the prior state, for
/// fields the API never echoes back.
pub fn carry(from: &DynamicValue, name: &str) -> Dynamic {
    from.get(&AttributePath::new(name))
        .filter(|v| !v.is_unknown())
        .cloned()
        .unwrap_or(Dynamic::Null)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_maps_become_null() {
        assert_eq!(string_map(None, Some(&HashMap::new())), Dynamic::Null);
        assert_eq!(string_map(Some(&Dynamic::Null), None), Dynamic::Null);
        let map = HashMap::from([("team".to_string(), "ml".to_string())]);
        assert_eq!(
            string_map(None, Some(&map)),
            Dynamic::Map(HashMap::from([("team".to_string(), Dynamic::from("ml"))]))
        );
    }

    #[test]
    fn configured_empty_map_is_kept() {
        let empty = Dynamic::Map(HashMap::new());
        assert_eq!(string_map(Some(&empty), Some(&HashMap::new())), empty);
        assert_eq!(string_map(Some(&empty), None), empty);
        assert_eq!(string_map(Some(&Dynamic::Unknown), None), Dynamic::Null);
    }

    #[test]
    fn invalid_json_points_at_attribute() {
        let mut value = DynamicValue::object();
        value
            .set_string(&AttributePath::new("parameters"), "{not json")
            .unwrap();
        let diag = parse_json(&value, AttributePath::new("parameters")).unwrap_err();
        assert_eq!(diag.summary, "Invalid JSON");
        assert_eq!(diag.attribute, Some(AttributePath::new("parameters")));
        assert_eq!(parse_json(&DynamicValue::object(), AttributePath::new("x")).unwrap(), None);
    }

    #[test]
    fn json_keeps_equivalent_formatting() {
        let value = serde_json::json!({"type": "object", "properties": {}});
        let pretty = Dynamic::from("{\n  \"type\": \"object\",\n  \"properties\": {}\n}");
        assert_eq!(json_string_keeping(Some(&pretty), Some(&value)), pretty);

        let changed = Dynamic::from(r#"{"type":"string"}"#);
        assert_eq!(
            json_string_keeping(Some(&changed), Some(&value)),
            Dynamic::String(value.to_string())
        );
        assert_eq!(json_string_keeping(None, None), Dynamic::Null);
    }

    #[test]
    fn carry_skips_unknown() {
        let mut value = DynamicValue::object();
        value.set_string(&AttributePath::new("filepath"), "a.jsonl").unwrap();
        value.mark_unknown(&AttributePath::new("id")).unwrap();
        assert_eq!(carry(&value, "filepath"), Dynamic::from("a.jsonl"));
        assert_eq!(carry(&value, "id"), Dynamic::Null);
        assert_eq!(carry(&value, "missing"), Dynamic::Null);
    }
}
