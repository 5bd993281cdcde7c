pub mod reconciliation;
pub mod rules;

use axum::Json;
use serde::Serialize;
use serde_json::{json, Value};

/// The `{success: true, data}` envelope every endpoint responds with.
pub fn ok<T: Serialize>(data: T) -> Json<Value> {
    Json(json!({ "success": true, "data": data }))
}
