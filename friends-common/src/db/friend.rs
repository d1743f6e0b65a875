use async_trait::async_trait;
use diesel::{
    dsl, BoolExpressionMethods, ExpressionMethods, JoinOnDsl, OptionalExtension, QueryDsl,
    SelectableHelper,
};
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use uuid::Uuid;

use crate::db::{DaoError, DbAsyncPool};
use crate::graph::{self, FriendGraphError, FriendRequestAction, FriendStore, RequestRateLimit};
use crate::models::friend_request::FriendRequest;
use crate::models::friend_request_send::NewFriendRequestSend;
use crate::models::friendship::NewFriendship;
use crate::models::user::UserProfile;

use crate::schema::friend_request_sends as friend_request_send_fields;
use crate::schema::friend_request_sends::dsl::friend_request_sends;
use crate::schema::friend_requests as friend_request_fields;
use crate::schema::friend_requests::dsl::friend_requests;
use crate::schema::friendships as friendship_fields;
use crate::schema::friendships::dsl::friendships;
use crate::schema::users as user_fields;
use crate::schema::users::dsl::users;

/// A [`FriendStore`] over a connection that is inside an open transaction.
pub struct PgFriendStore<'a> {
    conn: &'a mut AsyncPgConnection,
}

impl<'a> PgFriendStore<'a> {
    pub fn new(conn: &'a mut AsyncPgConnection) -> Self {
        Self { conn }
    }
}

#[async_trait]
impl FriendStore for PgFriendStore<'_> {
    async fn lock_user(&mut self, user_id: Uuid) -> Result<(), DaoError> {
        users
            .find(user_id)
            .select(user_fields::id)
            .for_update()
            .first::<Uuid>(self.conn)
            .await
            .optional()?;

        Ok(())
    }

    async fn user_exists(&mut self, user_id: Uuid) -> Result<bool, DaoError> {
        let exists = dsl::select(dsl::exists(users.find(user_id)))
            .get_result::<bool>(self.conn)
            .await?;

        Ok(exists)
    }

    async fn has_pending_request(
        &mut self,
        from_user_id: Uuid,
        to_user_id: Uuid,
    ) -> Result<bool, DaoError> {
        let exists = dsl::select(dsl::exists(
            friend_requests
                .filter(friend_request_fields::from_user_id.eq(from_user_id))
                .filter(friend_request_fields::to_user_id.eq(to_user_id)),
        ))
        .get_result::<bool>(self.conn)
        .await?;

        Ok(exists)
    }

    async fn insert_request(&mut self, request: &FriendRequest) -> Result<(), DaoError> {
        dsl::insert_into(friend_requests)
            .values(request)
            .execute(self.conn)
            .await?;

        Ok(())
    }

    async fn find_request(&mut self, request_id: Uuid) -> Result<Option<FriendRequest>, DaoError> {
        let request = friend_requests
            .find(request_id)
            .for_update()
            .first::<FriendRequest>(self.conn)
            .await
            .optional()?;

        Ok(request)
    }

    async fn delete_request(&mut self, request_id: Uuid) -> Result<(), DaoError> {
        diesel::delete(friend_requests.find(request_id))
            .execute(self.conn)
            .await?;

        Ok(())
    }

    async fn count_requests_sent_since(
        &mut self,
        user_id: Uuid,
        since: SystemTime,
    ) -> Result<i64, DaoError> {
        let count = friend_request_sends
            .filter(friend_request_send_fields::user_id.eq(user_id))
            .filter(friend_request_send_fields::sent_timestamp.ge(since))
            .count()
            .get_result::<i64>(self.conn)
            .await?;

        Ok(count)
    }

    async fn record_send(&mut self, user_id: Uuid, sent_at: SystemTime) -> Result<(), DaoError> {
        let new_send = NewFriendRequestSend {
            id: Uuid::now_v7(),
            user_id,
            sent_timestamp: sent_at,
        };

        dsl::insert_into(friend_request_sends)
            .values(&new_send)
            .execute(self.conn)
            .await?;

        Ok(())
    }

    async fn forget_sends_before(
        &mut self,
        user_id: Uuid,
        cutoff: SystemTime,
    ) -> Result<(), DaoError> {
        diesel::delete(
            friend_request_sends
                .filter(friend_request_send_fields::user_id.eq(user_id))
                .filter(friend_request_send_fields::sent_timestamp.lt(cutoff)),
        )
        .execute(self.conn)
        .await?;

        Ok(())
    }

    async fn add_friendship(
        &mut self,
        user_a: Uuid,
        user_b: Uuid,
        created_at: SystemTime,
    ) -> Result<(), DaoError> {
        dsl::insert_into(friendships)
            .values(&NewFriendship::between(user_a, user_b, created_at))
            .on_conflict_do_nothing()
            .execute(self.conn)
            .await?;

        Ok(())
    }
}

pub struct Dao {
    db_async_pool: DbAsyncPool,
}

impl Dao {
    pub fn new(db_async_pool: &DbAsyncPool) -> Self {
        Self {
            db_async_pool: db_async_pool.clone(),
        }
    }

    pub async fn send_request(
        &self,
        from_user_id: Uuid,
        to_user_id: Uuid,
        limit: RequestRateLimit,
    ) -> Result<FriendRequest, FriendGraphError> {
        graph::ensure_not_self_request(from_user_id, to_user_id)?;

        let mut db_connection = self.db_async_pool.get().await.map_err(DaoError::from)?;
        let now = truncate_to_micros(SystemTime::now());

        let result = db_connection
            .build_transaction()
            .run::<_, FriendGraphError, _>(|conn| {
                Box::pin(async move {
                    let mut store = PgFriendStore::new(conn);
                    graph::send_request(
                        &mut store,
                        from_user_id,
                        to_user_id,
                        limit,
                        now,
                    )
                    .await
                })
            })
            .await;

        match result {
            // Lost a race with a concurrent send of the same request
            Err(FriendGraphError::Store(e)) if e.is_unique_violation() => {
                Err(FriendGraphError::DuplicateRequest)
            }
            r => r,
        }
    }

    pub async fn respond_to_request(
        &self,
        responder_id: Uuid,
        request_id: Uuid,
        action: Option<&str>,
    ) -> Result<FriendRequestAction, FriendGraphError> {
        let mut db_connection = self.db_async_pool.get().await.map_err(DaoError::from)?;

        db_connection
            .build_transaction()
            .run::<_, FriendGraphError, _>(|conn| {
                Box::pin(async move {
                    let mut store = PgFriendStore::new(conn);
                    graph::respond_to_request(
                        &mut store,
                        responder_id,
                        request_id,
                        action,
                        SystemTime::now(),
                    )
                    .await
                })
            })
            .await
    }

    pub async fn get_friends(&self, user_id: Uuid) -> Result<Vec<UserProfile>, DaoError> {
        let mut conn = self.db_async_pool.get().await?;

        let friends = users
            .inner_join(
                friendships.on(friendship_fields::user1_id
                    .eq(user_fields::id)
                    .or(friendship_fields::user2_id.eq(user_fields::id))),
            )
            .filter(
                friendship_fields::user1_id
                    .eq(user_id)
                    .or(friendship_fields::user2_id.eq(user_id)),
            )
            .filter(user_fields::id.ne(user_id))
            .select(UserProfile::as_select())
            .order((user_fields::username.asc(), user_fields::email.asc()))
            .load::<UserProfile>(&mut conn)
            .await?;

        Ok(friends)
    }

    /// Incoming requests only, oldest first.
    pub async fn get_pending_requests(&self, user_id: Uuid) -> Result<Vec<FriendRequest>, DaoError> {
        let mut conn = self.db_async_pool.get().await?;

        let requests = friend_requests
            .filter(friend_request_fields::to_user_id.eq(user_id))
            .order(friend_request_fields::created_timestamp.asc())
            .load::<FriendRequest>(&mut conn)
            .await?;

        Ok(requests)
    }
}

/// Postgres timestamps hold whole microseconds, so send times are rounded down to match what is
/// stored before they are returned or compared against the window.
fn truncate_to_micros(time: SystemTime) -> SystemTime {
    let sub_micro_nanos = match time.duration_since(UNIX_EPOCH) {
        Ok(since_epoch) => since_epoch.subsec_nanos() % 1000,
        Err(_) => 0,
    };

    time - Duration::from_nanos(u64::from(sub_micro_nanos))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_utils;

    #[test]
    fn test_truncate_to_micros() {
        let exact = UNIX_EPOCH + Duration::new(1_700_000_000, 123_456_000);
        assert_eq!(truncate_to_micros(exact), exact);

        let with_nanos = UNIX_EPOCH + Duration::new(1_700_000_000, 123_456_789);
        assert_eq!(truncate_to_micros(with_nanos), exact);

        let now = truncate_to_micros(SystemTime::now());
        let nanos = now.duration_since(UNIX_EPOCH).unwrap().subsec_nanos();
        assert_eq!(nanos % 1000, 0);
    }

    #[tokio::test]
    #[ignore]
    async fn test_accept_request() {
        let pool = test_utils::db_async_pool().await;
        let dao = Dao::new(&pool);

        let alice = test_utils::insert_user(&pool).await;
        let bob = test_utils::insert_user(&pool).await;

        let request = dao
            .send_request(alice.id, bob.id, RequestRateLimit::default())
            .await
            .unwrap();

        assert_eq!(request.from_user_id, alice.id);
        assert_eq!(request.to_user_id, bob.id);

        // The returned request is exactly what was stored, timestamp included
        let pending = dao.get_pending_requests(bob.id).await.unwrap();
        assert_eq!(pending, vec![request]);
        assert!(dao.get_pending_requests(alice.id).await.unwrap().is_empty());

        let action = dao
            .respond_to_request(bob.id, request.id, Some("accept"))
            .await
            .unwrap();
        assert_eq!(action, FriendRequestAction::Accept);

        assert_eq!(dao.get_friends(alice.id).await.unwrap(), vec![bob.clone()]);
        assert_eq!(dao.get_friends(bob.id).await.unwrap(), vec![alice.clone()]);
        assert!(dao.get_pending_requests(bob.id).await.unwrap().is_empty());

        test_utils::delete_user(&pool, alice.id).await;
        test_utils::delete_user(&pool, bob.id).await;
    }

    #[tokio::test]
    #[ignore]
    async fn test_reject_request() {
        let pool = test_utils::db_async_pool().await;
        let dao = Dao::new(&pool);

        let alice = test_utils::insert_user(&pool).await;
        let bob = test_utils::insert_user(&pool).await;

        let request = dao
            .send_request(alice.id, bob.id, RequestRateLimit::default())
            .await
            .unwrap();

        let result = dao
            .respond_to_request(alice.id, request.id, Some("accept"))
            .await;
        assert!(matches!(result, Err(FriendGraphError::Forbidden)));

        let result = dao
            .respond_to_request(bob.id, request.id, Some("maybe"))
            .await;
        assert!(matches!(result, Err(FriendGraphError::InvalidAction)));
        assert_eq!(dao.get_pending_requests(bob.id).await.unwrap().len(), 1);

        let action = dao
            .respond_to_request(bob.id, request.id, Some("reject"))
            .await
            .unwrap();
        assert_eq!(action, FriendRequestAction::Reject);

        assert!(dao.get_friends(alice.id).await.unwrap().is_empty());
        assert!(dao.get_friends(bob.id).await.unwrap().is_empty());
        assert!(dao.get_pending_requests(bob.id).await.unwrap().is_empty());

        let result = dao
            .respond_to_request(bob.id, request.id, Some("reject"))
            .await;
        assert!(matches!(result, Err(FriendGraphError::RequestNotFound)));

        test_utils::delete_user(&pool, alice.id).await;
        test_utils::delete_user(&pool, bob.id).await;
    }

    #[tokio::test]
    #[ignore]
    async fn test_send_request_preconditions() {
        let pool = test_utils::db_async_pool().await;
        let dao = Dao::new(&pool);
        let limit = RequestRateLimit::default();

        let alice = test_utils::insert_user(&pool).await;
        let mut others = Vec::new();
        for _ in 0..4 {
            others.push(test_utils::insert_user(&pool).await);
        }

        let result = dao.send_request(alice.id, alice.id, limit).await;
        assert!(matches!(result, Err(FriendGraphError::SelfRequest)));

        let result = dao.send_request(alice.id, Uuid::now_v7(), limit).await;
        assert!(matches!(result, Err(FriendGraphError::RecipientNotFound)));

        dao.send_request(alice.id, others[0].id, limit)
            .await
            .unwrap();

        let result = dao.send_request(alice.id, others[0].id, limit).await;
        assert!(matches!(result, Err(FriendGraphError::DuplicateRequest)));

        dao.send_request(alice.id, others[1].id, limit)
            .await
            .unwrap();
        dao.send_request(alice.id, others[2].id, limit)
            .await
            .unwrap();

        let result = dao.send_request(alice.id, others[3].id, limit).await;
        assert!(matches!(result, Err(FriendGraphError::RateLimited(_))));

        test_utils::delete_user(&pool, alice.id).await;
        for other in others {
            test_utils::delete_user(&pool, other.id).await;
        }
    }

    #[tokio::test]
    #[ignore]
    async fn test_concurrent_sends_respect_limit() {
        let pool = test_utils::db_async_pool().await;
        let limit = RequestRateLimit::default();

        let alice = test_utils::insert_user(&pool).await;
        let mut others = Vec::new();
        for _ in 0..6 {
            others.push(test_utils::insert_user(&pool).await);
        }

        let handles = others
            .iter()
            .map(|other| {
                let dao = Dao::new(&pool);
                let (from, to) = (alice.id, other.id);
                tokio::spawn(async move { dao.send_request(from, to, limit).await })
            })
            .collect::<Vec<_>>();

        let mut sent = 0;
        for handle in handles {
            if handle.await.unwrap().is_ok() {
                sent += 1;
            }
        }

        assert_eq!(sent, 3);

        test_utils::delete_user(&pool, alice.id).await;
        for other in others {
            test_utils::delete_user(&pool, other.id).await;
        }
    }
}
