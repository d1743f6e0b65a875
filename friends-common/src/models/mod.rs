pub mod friend_request;
pub mod friend_request_send;
pub mod friendship;
pub mod user;
