use diesel_async::pooled_connection::bb8::Pool as AsyncPool;
use diesel_async::pooled_connection::AsyncDieselConnectionManager;
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use std::fmt;
use std::time::Duration;

pub mod auth;
pub mod friend;
pub mod user;

pub type DbAsyncPool = AsyncPool<AsyncPgConnection>;

pub async fn create_db_async_pool(
    database_uri: &str,
    max_db_connections: u32,
    idle_timeout: Duration,
) -> Result<DbAsyncPool, DaoError> {
    let config = AsyncDieselConnectionManager::<AsyncPgConnection>::new(database_uri);
    AsyncPool::builder()
        .max_size(max_db_connections)
        .idle_timeout(Some(idle_timeout))
        .build(config)
        .await
        .map_err(|e| DaoError::DbAsyncPoolFailure(e.to_string()))
}

/// Runs a trivial query on a pooled connection.
pub async fn ping(db_async_pool: &DbAsyncPool) -> Result<(), DaoError> {
    let mut conn = db_async_pool.get().await?;
    diesel::select(diesel::dsl::sql::<diesel::sql_types::Integer>("1"))
        .get_result::<i32>(&mut conn)
        .await?;

    Ok(())
}

#[derive(Debug)]
pub enum DaoError {
    DbAsyncPoolFailure(String),
    QueryFailure(diesel::result::Error),
}

impl DaoError {
    pub fn is_unique_violation(&self) -> bool {
        matches!(
            self,
            DaoError::QueryFailure(diesel::result::Error::DatabaseError(
                diesel::result::DatabaseErrorKind::UniqueViolation,
                _,
            ))
        )
    }

    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            DaoError::QueryFailure(diesel::result::Error::NotFound)
        )
    }
}

impl std::error::Error for DaoError {}

impl fmt::Display for DaoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DaoError::DbAsyncPoolFailure(e) => {
                write!(f, "DaoError: Failed to obtain async DB connection: {e}")
            }
            DaoError::QueryFailure(e) => {
                write!(f, "DaoError: Query failed: {e}")
            }
        }
    }
}

impl<E: std::error::Error + Send + Sync + 'static> From<bb8::RunError<E>> for DaoError {
    fn from(error: bb8::RunError<E>) -> Self {
        DaoError::DbAsyncPoolFailure(error.to_string())
    }
}

impl From<diesel::result::Error> for DaoError {
    fn from(error: diesel::result::Error) -> Self {
        DaoError::QueryFailure(error)
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    #[ignore]
    async fn test_ping() {
        let pool = test_utils::db_async_pool().await;
        assert!(ping(&pool).await.is_ok());
    }
}
