use serde::Deserialize;
use serde_json::Value;

use crate::error::ExtractorError;

/// `room/v1/Room/room_init` payload.
#[derive(Debug, Clone, Deserialize)]
pub struct RoomInitData {
    pub room_id: u64,
    #[serde(default)]
    pub short_id: u64,
    #[serde(default)]
    pub uid: u64,
    #[serde(default)]
    pub live_status: i64,
    /// Unix seconds on most responses, occasionally formatted text.
    #[serde(default)]
    pub live_time: Value,
}

/// `room/v1/Room/get_info` payload.
#[derive(Debug, Clone, Deserialize)]
pub struct RoomInfoData {
    #[serde(default)]
    pub room_id: u64,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub user_cover: String,
    #[serde(default)]
    pub live_status: i64,
    /// `"%Y-%m-%d %H:%M:%S"`, or `"0000-00-00 00:00:00"` while offline.
    #[serde(default)]
    pub live_time: String,
    #[serde(default)]
    pub area_name: String,
}

/// Unwrap the `{code, message, data}` envelope every live API returns.
///
/// Failed calls often carry `data: []`, so the envelope is checked before the
/// payload is decoded.
pub(crate) fn parse_envelope<T>(body: Value) -> Result<T, ExtractorError>
where
    T: for<'de> Deserialize<'de>,
{
    let code = body.get("code").and_then(Value::as_i64).unwrap_or(-1);
    if code != 0 {
        let message = body
            .get("message")
            .or_else(|| body.get("msg"))
            .and_then(Value::as_str)
            .unwrap_or("unknown")
            .to_string();
        return Err(ExtractorError::ApiError { code, message });
    }

    match body.get("data") {
        Some(data) if data.is_object() => Ok(serde_json::from_value(data.clone())?),
        _ => Err(ExtractorError::MissingData),
    }
}
