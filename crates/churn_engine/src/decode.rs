use churn_core::UserRef;
use engine_logging::engine_warn;
use serde::Deserialize;
use serde_json::Value;

use crate::{FailureKind, FetchError, PageResult};

#[derive(Debug, Deserialize)]
struct RawPage {
    #[serde(default)]
    users: Vec<RawUser>,
    #[serde(default)]
    next_max_id: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct RawUser {
    #[serde(default)]
    username: Option<String>,
    #[serde(default)]
    pk: Option<Value>,
    #[serde(default)]
    full_name: Option<String>,
}

/// Decode a list endpoint response body into a page.
///
/// Entries without a username are skipped. The cursor may arrive as a string
/// or a number; an empty string or `null` ends pagination.
pub fn decode_page(body: &[u8]) -> Result<PageResult, FetchError> {
    let raw: RawPage = serde_json::from_slice(body)
        .map_err(|err| FetchError::new(FailureKind::Decode, err.to_string()))?;

    let mut users = Vec::with_capacity(raw.users.len());
    for entry in raw.users {
        let Some(username) = entry.username else {
            engine_warn!("Skipping list entry without a username");
            continue;
        };
        match UserRef::new(username) {
            Ok(user) => users.push(
                user.with_external_id(entry.pk.as_ref().and_then(scalar_to_string))
                    .with_full_name(entry.full_name),
            ),
            Err(err) => engine_warn!("Skipping list entry: {}", err),
        }
    }

    let next_cursor = raw.next_max_id.as_ref().and_then(scalar_to_string);
    Ok(PageResult { users, next_cursor })
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(text) if !text.is_empty() => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    }
}
