use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::friend_request::FriendRequest;

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct OutputLoginToken {
    pub token: String,
    pub user_id: Uuid,
    pub email: String,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct OutputStatus {
    pub status: String,
}

impl OutputStatus {
    pub fn new(status: &str) -> Self {
        Self {
            status: String::from(status),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct OutputFriendRequest {
    pub id: Uuid,
    pub from_user: Uuid,
    pub to_user: Uuid,
    pub timestamp: DateTime<Utc>,
}

impl From<FriendRequest> for OutputFriendRequest {
    fn from(request: FriendRequest) -> Self {
        Self {
            id: request.id,
            from_user: request.from_user_id,
            to_user: request.to_user_id,
            timestamp: DateTime::<Utc>::from(request.created_timestamp),
        }
    }
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct OutputError {
    pub error: String,
}
