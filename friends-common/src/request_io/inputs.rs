use serde::{Deserialize, Serialize};
use uuid::Uuid;
use zeroize::{Zeroize, ZeroizeOnDrop};

#[derive(Clone, Debug, Deserialize, Serialize, Zeroize, ZeroizeOnDrop)]
pub struct InputUser {
    pub username: String,
    pub email: String,
    pub password: String,
}

/// Login body. `username` holds the account's email address.
#[derive(Clone, Debug, Deserialize, Serialize, Zeroize, ZeroizeOnDrop)]
pub struct CredentialPair {
    pub username: String,
    pub password: String,
}

#[derive(Clone, Copy, Debug, Deserialize, Serialize)]
pub struct InputFriendRequest {
    pub to_user: Uuid,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct InputFriendRequestAction {
    #[serde(default)]
    pub action: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct InputSearchQuery {
    #[serde(default)]
    pub q: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_optional_fields() {
        let action: InputFriendRequestAction = serde_json::from_str("{}").unwrap();
        assert!(action.action.is_none());

        let action: InputFriendRequestAction =
            serde_json::from_str("{\"action\": \"accept\"}").unwrap();
        assert_eq!(action.action.as_deref(), Some("accept"));

        let query: InputSearchQuery = serde_json::from_str("{}").unwrap();
        assert!(query.q.is_empty());
    }

    #[test]
    fn test_friend_request_requires_uuid() {
        assert!(serde_json::from_str::<InputFriendRequest>("{\"to_user\": 5}").is_err());
        assert!(serde_json::from_str::<InputFriendRequest>("{}").is_err());

        let id = Uuid::now_v7();
        let input: InputFriendRequest =
            serde_json::from_str(&format!("{{\"to_user\": \"{id}\"}}")).unwrap();
        assert_eq!(input.to_user, id);
    }
}
