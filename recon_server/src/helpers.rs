use log::*;
use serde::de::DeserializeOwned;

/// Reads a JSON request body. A missing or unreadable body is treated as an empty object, so that the handler reports
/// the missing fields with its usual error codes.
pub fn lenient_json_body<T: DeserializeOwned + Default>(body: &[u8]) -> T {
    if body.is_empty() {
        return T::default();
    }
    serde_json::from_slice(body).unwrap_or_else(|e| {
        debug!("💻️ Could not read the request body as JSON. Treating it as empty. {e}");
        T::default()
    })
}
