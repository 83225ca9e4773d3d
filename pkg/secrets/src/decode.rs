use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde_json::Number;
use serde_json::value::RawValue;
use std::collections::BTreeMap;

/// Decode a payload for `stringData`.
///
/// Tolerant: a JSON object of strings is taken as-is; failing that, an
/// object with a numeric `port` yields `{"port": "<n>"}` with the number
/// spelled exactly as in the payload; anything else is kept whole under
/// `data`.
pub fn decode_string_map(payload: &str) -> BTreeMap<String, String> {
    if let Ok(map) = serde_json::from_str::<BTreeMap<String, String>>(payload) {
        return map;
    }

    let port = serde_json::from_str::<BTreeMap<String, &RawValue>>(payload)
        .ok()
        .and_then(|fields| fields.get("port").copied())
        .map(RawValue::get)
        .filter(|raw| serde_json::from_str::<Number>(raw).is_ok())
        .map(str::to_string);

    let mut map = BTreeMap::new();
    match port {
        Some(port) => map.insert("port".to_string(), port),
        None => map.insert("data".to_string(), payload.to_string()),
    };
    map
}

/// Decode a payload for `data`.
///
/// Strict: the payload must be a JSON object whose values are base64
/// strings. The error carries a human-readable reason.
pub fn decode_bytes_map(payload: &str) -> Result<BTreeMap<String, Vec<u8>>, String> {
    let encoded: BTreeMap<String, String> = serde_json::from_str(payload)
        .map_err(|e| format!("expected a JSON object of strings: {}", e))?;

    encoded
        .into_iter()
        .map(|(k, v)| match STANDARD.decode(v.as_bytes()) {
            Ok(bytes) => Ok((k, bytes)),
            Err(e) => Err(format!("value of {} is not valid base64: {}", k, e)),
        })
        .collect()
}
