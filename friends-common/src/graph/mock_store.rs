use async_trait::async_trait;
use std::collections::HashSet;
use std::time::SystemTime;
use uuid::Uuid;

use crate::db::DaoError;
use crate::graph::FriendStore;
use crate::models::friend_request::FriendRequest;

/// An in-memory store for exercising the request state machine without a database.
#[derive(Debug, Default)]
pub struct MockFriendStore {
    pub users: HashSet<Uuid>,
    pub requests: Vec<FriendRequest>,
    pub sends: Vec<(Uuid, SystemTime)>,
    pub friendships: Vec<(Uuid, Uuid)>,
    pub locked_users: Vec<Uuid>,
}

impl MockFriendStore {
    pub fn add_user(&mut self) -> Uuid {
        let id = Uuid::now_v7();
        self.users.insert(id);
        id
    }

    pub fn friends_of(&self, user_id: Uuid) -> Vec<Uuid> {
        self.friendships
            .iter()
            .filter_map(|&(a, b)| {
                if a == user_id {
                    Some(b)
                } else if b == user_id {
                    Some(a)
                } else {
                    None
                }
            })
            .collect()
    }
}

#[async_trait]
impl FriendStore for MockFriendStore {
    async fn lock_user(&mut self, user_id: Uuid) -> Result<(), DaoError> {
        if !self.locked_users.contains(&user_id) {
            self.locked_users.push(user_id);
        }

        Ok(())
    }

    async fn user_exists(&mut self, user_id: Uuid) -> Result<bool, DaoError> {
        Ok(self.users.contains(&user_id))
    }

    async fn has_pending_request(
        &mut self,
        from_user_id: Uuid,
        to_user_id: Uuid,
    ) -> Result<bool, DaoError> {
        Ok(self
            .requests
            .iter()
            .any(|r| r.from_user_id == from_user_id && r.to_user_id == to_user_id))
    }

    async fn insert_request(&mut self, request: &FriendRequest) -> Result<(), DaoError> {
        self.requests.push(*request);
        Ok(())
    }

    async fn find_request(&mut self, request_id: Uuid) -> Result<Option<FriendRequest>, DaoError> {
        Ok(self.requests.iter().find(|r| r.id == request_id).copied())
    }

    async fn delete_request(&mut self, request_id: Uuid) -> Result<(), DaoError> {
        self.requests.retain(|r| r.id != request_id);
        Ok(())
    }

    async fn count_requests_sent_since(
        &mut self,
        user_id: Uuid,
        since: SystemTime,
    ) -> Result<i64, DaoError> {
        Ok(self
            .sends
            .iter()
            .filter(|&&(sender, sent_at)| sender == user_id && sent_at >= since)
            .count() as i64)
    }

    async fn record_send(&mut self, user_id: Uuid, sent_at: SystemTime) -> Result<(), DaoError> {
        self.sends.push((user_id, sent_at));
        Ok(())
    }

    async fn forget_sends_before(
        &mut self,
        user_id: Uuid,
        cutoff: SystemTime,
    ) -> Result<(), DaoError> {
        self.sends
            .retain(|&(sender, sent_at)| sender != user_id || sent_at >= cutoff);
        Ok(())
    }

    async fn add_friendship(
        &mut self,
        user_a: Uuid,
        user_b: Uuid,
        _created_at: SystemTime,
    ) -> Result<(), DaoError> {
        let edge = (user_a.min(user_b), user_a.max(user_b));

        if !self.friendships.contains(&edge) {
            self.friendships.push(edge);
        }

        Ok(())
    }
}
