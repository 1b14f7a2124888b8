//! Form normalization: collapse the vendor's three encodings of the same
//! logical form into one ordered list of `FieldRecord`s.
//!
//! This function is total. A malformed form loses the form detail for that
//! event, never the event itself — the instance and tasks still get
//! persisted. Decode failures are logged as data-quality signals.

use serde_json::Value;
use tracing::warn;

use crate::models::instance::{FieldRecord, FormPayload};

pub fn normalize(form: Option<&FormPayload>) -> Vec<FieldRecord> {
    let elements: Vec<Value> = match form {
        None => return Vec::new(),
        Some(FormPayload::Encoded(text)) => match serde_json::from_str::<Value>(text) {
            Ok(Value::Array(items)) => items,
            Ok(other) => {
                warn!(got = %other, "form string decoded to a non-array, dropping form fields");
                return Vec::new();
            }
            Err(e) => {
                warn!(error = %e, "form string is not valid JSON, dropping form fields");
                return Vec::new();
            }
        },
        Some(FormPayload::Decoded(items)) => items.clone(),
        Some(FormPayload::Other(value)) => {
            warn!(got = %value, "unexpected form payload shape, dropping form fields");
            return Vec::new();
        }
    };

    elements.into_iter().filter_map(field_from_value).collect()
}

/// Map one raw form element to a `FieldRecord`. The vendor is inconsistent
/// about key names across API versions, so each logical key accepts two
/// variants. Elements without a usable id cannot be keyed and are skipped.
fn field_from_value(element: Value) -> Option<FieldRecord> {
    let obj = match element.as_object() {
        Some(obj) => obj,
        None => {
            warn!(got = %element, "form element is not an object, skipping");
            return None;
        }
    };

    let field_id = match id_key(obj, &["id", "field_id"]) {
        Some(id) => id,
        None => {
            warn!("form element without id, skipping");
            return None;
        }
    };

    let field_name = string_key(obj, &["name", "field_name"]).unwrap_or_default();
    let field_type = string_key(obj, &["type", "field_type"]).unwrap_or_default();
    let field_value = obj
        .get("value")
        .or_else(|| obj.get("field_value"))
        .map(stringify_value)
        .unwrap_or_default();

    Some(FieldRecord {
        field_id,
        field_name,
        field_type,
        field_value,
        raw: element,
    })
}

fn string_key(obj: &serde_json::Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|k| obj.get(*k))
        .find_map(|v| v.as_str())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Like `string_key`, but also accepts numeric ids — some form revisions
/// number their fields instead of naming them.
fn id_key(obj: &serde_json::Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter().filter_map(|k| obj.get(*k)).find_map(|v| match v {
        Value::String(s) => {
            let s = s.trim();
            (!s.is_empty()).then(|| s.to_string())
        }
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

/// Re-serialize a field value to the single column type the schema expects.
/// Plain strings stay as-is; numbers, objects and lists become JSON text.
fn stringify_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn encoded(s: &str) -> FormPayload {
        FormPayload::Encoded(s.to_string())
    }

    #[test]
    fn test_absent_form_is_empty() {
        assert!(normalize(None).is_empty());
    }

    #[test]
    fn test_encoded_form_with_number_value() {
        let form = encoded(r#"[{"id":"f1","name":"Amount","type":"number","value":100}]"#);
        let fields = normalize(Some(&form));
        assert_eq!(fields.len(), 1);
        assert_eq!(fields[0].field_id, "f1");
        assert_eq!(fields[0].field_name, "Amount");
        assert_eq!(fields[0].field_type, "number");
        assert_eq!(fields[0].field_value, "100");
    }

    #[test]
    fn test_invalid_json_string_degrades_to_empty() {
        let fields = normalize(Some(&encoded("not json")));
        assert!(fields.is_empty());
    }

    #[test]
    fn test_encoded_non_array_degrades_to_empty() {
        let fields = normalize(Some(&encoded(r#"{"id":"f1"}"#)));
        assert!(fields.is_empty());
    }

    #[test]
    fn test_decoded_list_used_as_is() {
        let form = FormPayload::Decoded(vec![
            json!({"id": "f1", "name": "City", "type": "input", "value": "Jakarta"}),
            json!({"id": "f2", "name": "Days", "type": "number", "value": 3}),
        ]);
        let fields = normalize(Some(&form));
        assert_eq!(fields.len(), 2);
        assert_eq!(fields[0].field_value, "Jakarta");
        assert_eq!(fields[1].field_value, "3");
    }

    #[test]
    fn test_other_shape_degrades_to_empty() {
        let form = FormPayload::Other(json!({"widgets": []}));
        assert!(normalize(Some(&form)).is_empty());
    }

    #[test]
    fn test_alternate_key_variants_accepted() {
        let form = FormPayload::Decoded(vec![json!({
            "field_id": "f9",
            "field_name": "Reason",
            "field_type": "textarea",
            "field_value": "travel"
        })]);
        let fields = normalize(Some(&form));
        assert_eq!(fields.len(), 1);
        assert_eq!(fields[0].field_id, "f9");
        assert_eq!(fields[0].field_name, "Reason");
        assert_eq!(fields[0].field_value, "travel");
    }

    #[test]
    fn test_structured_value_serialized_as_json_text() {
        let form = FormPayload::Decoded(vec![json!({
            "id": "f3",
            "name": "Attendees",
            "type": "list",
            "value": ["alice", "bob"]
        })]);
        let fields = normalize(Some(&form));
        assert_eq!(fields[0].field_value, r#"["alice","bob"]"#);
    }

    #[test]
    fn test_numeric_id_is_stringified() {
        let form = FormPayload::Decoded(vec![json!({"id": 1, "name": "Amount", "value": 100})]);
        let fields = normalize(Some(&form));
        assert_eq!(fields.len(), 1);
        assert_eq!(fields[0].field_id, "1");
        assert_eq!(fields[0].field_value, "100");
    }

    #[test]
    fn test_element_without_id_is_skipped() {
        let form = FormPayload::Decoded(vec![
            json!({"name": "no id here", "value": 1}),
            json!({"id": "f1", "value": 2}),
        ]);
        let fields = normalize(Some(&form));
        assert_eq!(fields.len(), 1);
        assert_eq!(fields[0].field_id, "f1");
    }

    #[test]
    fn test_original_element_kept_for_audit_column() {
        let element = json!({"id": "f1", "value": 1, "vendor_only_key": true});
        let form = FormPayload::Decoded(vec![element.clone()]);
        let fields = normalize(Some(&form));
        assert_eq!(fields[0].raw, element);
    }
}
