use actix_web::error::ErrorBadRequest;
use serde_json::Value;

/// ===============================
/// Merge a partial JSON update over a record
/// ===============================
///
/// `payload` must be a non-empty object whose keys are all in `allowed`.
/// `null` clears a field.
pub fn merge_update(
    base: &mut Value,
    payload: &Value,
    allowed: &[&str],
) -> Result<(), actix_web::Error> {
    let patch = payload
        .as_object()
        .ok_or_else(|| ErrorBadRequest("Payload must be a JSON object"))?;

    if patch.is_empty() {
        return Err(ErrorBadRequest("No fields provided for update"));
    }

    if let Some(unknown) = patch.keys().find(|k| !allowed.contains(&k.as_str())) {
        return Err(ErrorBadRequest(format!("Unknown field: {}", unknown)));
    }

    if patch
        .values()
        .any(|v| matches!(v, Value::Array(_) | Value::Object(_)))
    {
        return Err(ErrorBadRequest("Unsupported JSON value type"));
    }

    let target = base
        .as_object_mut()
        .ok_or_else(|| ErrorBadRequest("Record is not a JSON object"))?;

    for (key, value) in patch {
        target.insert(key.clone(), value.clone());
    }

    Ok(())
}
