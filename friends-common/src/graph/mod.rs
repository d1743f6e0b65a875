//! The friend-request state machine.
//!
//! A request moves `nonexistent -> pending -> deleted`. It becomes pending through
//! [`send_request`] and is deleted by [`respond_to_request`], which also adds the undirected
//! friendship edge when the recipient accepts. Both functions are written against
//! [`FriendStore`], a transactional view of the data store; callers are expected to run each
//! call inside a single database transaction.

use async_trait::async_trait;
use std::fmt;
use std::str::FromStr;
use std::time::{Duration, SystemTime};
use uuid::Uuid;

use crate::db::DaoError;
use crate::models::friend_request::FriendRequest;

#[cfg(test)]
pub mod mock_store;

#[async_trait]
pub trait FriendStore: Send {
    /// Holds an exclusive lock on the user's row until the surrounding transaction ends, so
    /// that concurrent sends by the same user are evaluated one at a time.
    async fn lock_user(&mut self, user_id: Uuid) -> Result<(), DaoError>;
    async fn user_exists(&mut self, user_id: Uuid) -> Result<bool, DaoError>;

    async fn has_pending_request(
        &mut self,
        from_user_id: Uuid,
        to_user_id: Uuid,
    ) -> Result<bool, DaoError>;
    async fn insert_request(&mut self, request: &FriendRequest) -> Result<(), DaoError>;
    /// Locks the returned request for the rest of the transaction.
    async fn find_request(&mut self, request_id: Uuid) -> Result<Option<FriendRequest>, DaoError>;
    async fn delete_request(&mut self, request_id: Uuid) -> Result<(), DaoError>;

    /// Counts every request the user sent at or after `since`, including requests that have
    /// since been accepted or rejected.
    async fn count_requests_sent_since(
        &mut self,
        user_id: Uuid,
        since: SystemTime,
    ) -> Result<i64, DaoError>;
    async fn record_send(&mut self, user_id: Uuid, sent_at: SystemTime) -> Result<(), DaoError>;
    async fn forget_sends_before(
        &mut self,
        user_id: Uuid,
        cutoff: SystemTime,
    ) -> Result<(), DaoError>;

    /// Adding an edge that already exists is a no-op.
    async fn add_friendship(
        &mut self,
        user_a: Uuid,
        user_b: Uuid,
        created_at: SystemTime,
    ) -> Result<(), DaoError>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RequestRateLimit {
    pub max_requests: u32,
    pub window: Duration,
}

impl Default for RequestRateLimit {
    fn default() -> Self {
        Self {
            max_requests: 3,
            window: Duration::from_secs(60),
        }
    }
}

impl RequestRateLimit {
    pub fn window_start(&self, now: SystemTime) -> SystemTime {
        now.checked_sub(self.window).unwrap_or(SystemTime::UNIX_EPOCH)
    }

    pub fn is_exceeded(&self, sent_in_window: i64) -> bool {
        sent_in_window >= i64::from(self.max_requests)
    }
}

impl fmt::Display for RequestRateLimit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let secs = self.window.as_secs();

        match secs {
            60 => write!(f, "{} friend requests within a minute", self.max_requests),
            s if s > 0 && s % 60 == 0 => write!(
                f,
                "{} friend requests within {} minutes",
                self.max_requests,
                s / 60
            ),
            s => write!(
                f,
                "{} friend requests within {} seconds",
                self.max_requests, s
            ),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FriendRequestAction {
    Accept,
    Reject,
}

impl FromStr for FriendRequestAction {
    type Err = FriendGraphError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "accept" => Ok(FriendRequestAction::Accept),
            "reject" => Ok(FriendRequestAction::Reject),
            _ => Err(FriendGraphError::InvalidAction),
        }
    }
}

#[derive(Debug)]
pub enum FriendGraphError {
    SelfRequest,
    RecipientNotFound,
    DuplicateRequest,
    RateLimited(RequestRateLimit),
    RequestNotFound,
    Forbidden,
    InvalidAction,
    Store(DaoError),
}

impl std::error::Error for FriendGraphError {}

impl fmt::Display for FriendGraphError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FriendGraphError::SelfRequest => {
                write!(f, "You cannot send a friend request to yourself.")
            }
            FriendGraphError::RecipientNotFound => write!(f, "User not found."),
            FriendGraphError::DuplicateRequest => write!(
                f,
                "A friend request is already sent to this user and is pending."
            ),
            FriendGraphError::RateLimited(limit) => {
                write!(f, "You cannot send more than {limit}.")
            }
            FriendGraphError::RequestNotFound => write!(f, "Friend request ID not found."),
            FriendGraphError::Forbidden => write!(
                f,
                "You are not authorized to accept or reject this friend request."
            ),
            FriendGraphError::InvalidAction => {
                write!(f, "Action must be either 'accept' or 'reject'.")
            }
            FriendGraphError::Store(e) => write!(f, "{e}"),
        }
    }
}

impl From<DaoError> for FriendGraphError {
    fn from(error: DaoError) -> Self {
        FriendGraphError::Store(error)
    }
}

impl From<diesel::result::Error> for FriendGraphError {
    fn from(error: diesel::result::Error) -> Self {
        FriendGraphError::Store(DaoError::from(error))
    }
}

#[inline]
pub fn ensure_not_self_request(
    from_user_id: Uuid,
    to_user_id: Uuid,
) -> Result<(), FriendGraphError> {
    if from_user_id == to_user_id {
        return Err(FriendGraphError::SelfRequest);
    }

    Ok(())
}

/// Creates a pending request from `from_user_id` to `to_user_id`.
///
/// Checks run in order and the first failure wins: self-request, unknown recipient, duplicate
/// pending request, then the sliding-window rate limit. The window is recomputed from the
/// recorded send times on every call; a send at exactly `now - window` still counts.
pub async fn send_request<S: FriendStore>(
    store: &mut S,
    from_user_id: Uuid,
    to_user_id: Uuid,
    limit: RequestRateLimit,
    now: SystemTime,
) -> Result<FriendRequest, FriendGraphError> {
    ensure_not_self_request(from_user_id, to_user_id)?;

    store.lock_user(from_user_id).await?;

    if !store.user_exists(to_user_id).await? {
        return Err(FriendGraphError::RecipientNotFound);
    }

    if store.has_pending_request(from_user_id, to_user_id).await? {
        return Err(FriendGraphError::DuplicateRequest);
    }

    let window_start = limit.window_start(now);
    let sent_in_window = store
        .count_requests_sent_since(from_user_id, window_start)
        .await?;

    if limit.is_exceeded(sent_in_window) {
        return Err(FriendGraphError::RateLimited(limit));
    }

    let request = FriendRequest {
        id: Uuid::now_v7(),
        from_user_id,
        to_user_id,
        created_timestamp: now,
    };

    store.insert_request(&request).await?;
    store.record_send(from_user_id, now).await?;
    store.forget_sends_before(from_user_id, window_start).await?;

    Ok(request)
}

/// Resolves a pending request on behalf of its recipient.
///
/// The request must exist and be addressed to `responder_id` before the action is looked at,
/// so an unknown id is reported as not found and a sender trying to resolve their own request
/// is forbidden regardless of the action given.
pub async fn respond_to_request<S: FriendStore>(
    store: &mut S,
    responder_id: Uuid,
    request_id: Uuid,
    action: Option<&str>,
    now: SystemTime,
) -> Result<FriendRequestAction, FriendGraphError> {
    let request = store
        .find_request(request_id)
        .await?
        .ok_or(FriendGraphError::RequestNotFound)?;

    if request.to_user_id != responder_id {
        return Err(FriendGraphError::Forbidden);
    }

    let action = action
        .ok_or(FriendGraphError::InvalidAction)?
        .parse::<FriendRequestAction>()?;

    if action == FriendRequestAction::Accept {
        store
            .add_friendship(request.from_user_id, request.to_user_id, now)
            .await?;
    }

    store.delete_request(request.id).await?;

    Ok(action)
}
