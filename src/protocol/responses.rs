//! Response handling
//!
//! Defines reply status codes and formatting. Every reply is one line:
//! `<status> <json>\r\n`.

use log::error;
use serde::Serialize;
use serde_json::json;

use crate::error::ServerError;
use crate::error::handlers::error_to_status;

pub const OK: u16 = 200;
pub const CREATED: u16 = 201;
pub const NO_CONTENT: u16 = 204;
pub const CLOSING: u16 = 221;
pub const READY: u16 = 220;
pub const LOGIN_SUCCESS: u16 = 230;
pub const PASSWORD_REQUIRED: u16 = 331;
pub const TOO_MANY_CLIENTS: u16 = 421;

/// Body of every failed reply
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    pub message: String,
    pub status_code: u16,
}

/// Format a reply line from an already encoded body
pub fn format_response(code: u16, body: &str) -> String {
    format!("{} {}\r\n", code, body)
}

/// Format a reply line with a JSON body
pub fn json_response<T: Serialize>(code: u16, body: &T) -> String {
    match serde_json::to_string(body) {
        Ok(json) => format_response(code, &json),
        Err(e) => {
            error!("Failed to encode response: {}", e);
            format_response(500, r#"{"message":"failed to encode response","statusCode":500}"#)
        }
    }
}

/// Format a reply line carrying only a message
pub fn message_response(code: u16, message: &str) -> String {
    json_response(code, &json!({ "message": message }))
}

/// Format the reply for a failed command
pub fn error_response(err: &ServerError) -> String {
    let status_code = error_to_status(err);
    json_response(
        status_code,
        &ErrorResponse {
            message: err.to_string(),
            status_code,
        },
    )
}
