use diesel::Insertable;
use std::time::SystemTime;
use uuid::Uuid;

use crate::schema::friendships;

/// One undirected edge in the friend graph. `user1_id` is always the smaller of the two ids.
#[derive(Debug, Insertable)]
#[diesel(table_name = friendships)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct NewFriendship {
    pub user1_id: Uuid,
    pub user2_id: Uuid,
    pub created_timestamp: SystemTime,
}

impl NewFriendship {
    pub fn between(user_a: Uuid, user_b: Uuid, created_timestamp: SystemTime) -> Self {
        let (user1_id, user2_id) = if user_a < user_b {
            (user_a, user_b)
        } else {
            (user_b, user_a)
        };

        Self {
            user1_id,
            user2_id,
            created_timestamp,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_between_orders_endpoints() {
        let first = Uuid::now_v7();
        let second = Uuid::now_v7();
        let now = SystemTime::now();

        let edge = NewFriendship::between(second, first, now);
        assert_eq!(edge.user1_id, first.min(second));
        assert_eq!(edge.user2_id, first.max(second));

        let reversed = NewFriendship::between(first, second, now);
        assert_eq!(reversed.user1_id, edge.user1_id);
        assert_eq!(reversed.user2_id, edge.user2_id);
    }
}
