//! Response envelope `{code, data, msg}`

use serde::Deserialize;

/// Body of every successful API response.
#[derive(Debug, Deserialize)]
pub struct ApiEnvelope<T> {
    #[serde(default)]
    pub code: i64,
    pub data: Option<T>,
    #[serde(default)]
    pub msg: String,
}

/// Pull a displayable message out of an error body.
///
/// Envelope-shaped errors carry it in `msg`; the API framework's own
/// rejections (`HTTPException`, validation) use `detail`, which is either a
/// string or a list of `{msg}` items.
pub fn extract_message(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    if let Some(msg) = value.get("msg").and_then(|m| m.as_str())
        && !msg.is_empty()
    {
        return Some(msg.to_string());
    }
    match value.get("detail")? {
        serde_json::Value::String(detail) => Some(detail.clone()),
        serde_json::Value::Array(items) => items
            .iter()
            .find_map(|item| item.get("msg").and_then(|m| m.as_str()))
            .map(str::to_string),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_with_data() {
        let env: ApiEnvelope<Vec<u32>> =
            serde_json::from_str(r#"{"code":0,"data":[1,2],"msg":"ok"}"#).unwrap();
        assert_eq!(env.data, Some(vec![1, 2]));
        assert_eq!(env.msg, "ok");
    }

    #[test]
    fn envelope_with_null_data() {
        let env: ApiEnvelope<serde_json::Value> =
            serde_json::from_str(r#"{"code":0,"data":null,"msg":"done"}"#).unwrap();
        assert!(env.data.is_none());
    }

    #[test]
    fn message_from_msg_field() {
        assert_eq!(
            extract_message(r#"{"code":1,"data":null,"msg":"Invalid credentials"}"#).as_deref(),
            Some("Invalid credentials")
        );
    }

    #[test]
    fn message_from_detail_string() {
        assert_eq!(
            extract_message(r#"{"detail":"Incorrect email or password"}"#).as_deref(),
            Some("Incorrect email or password")
        );
    }

    #[test]
    fn message_from_validation_detail_list() {
        let body = r#"{"detail":[{"loc":["body","password"],"msg":"Password must be at least 10 characters long","type":"value_error"}]}"#;
        assert_eq!(
            extract_message(body).as_deref(),
            Some("Password must be at least 10 characters long")
        );
    }

    #[test]
    fn no_message_in_unstructured_body() {
        assert!(extract_message("<html>502 Bad Gateway</html>").is_none());
        assert!(extract_message(r#"{"code":500,"msg":""}"#).is_none());
    }
}
