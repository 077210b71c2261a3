//! API models for request and response payloads

use serde::{Deserialize, Serialize};

pub mod inventory;

/// Response for a newly issued or refreshed session
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionResponse {
    pub user_id: uuid::Uuid,
    pub message: String,
}

/// Query string of `/activity/recent`
#[derive(Debug, Default, Deserialize)]
pub struct RecentQuery {
    pub limit: Option<i64>,
}
