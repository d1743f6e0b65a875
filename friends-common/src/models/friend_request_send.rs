use diesel::Insertable;
use std::time::SystemTime;
use uuid::Uuid;

use crate::schema::friend_request_sends;

/// A record of one successful send, kept until it falls out of the rate-limit window.
#[derive(Debug, Insertable)]
#[diesel(table_name = friend_request_sends)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct NewFriendRequestSend {
    pub id: Uuid,
    pub user_id: Uuid,
    pub sent_timestamp: SystemTime,
}
