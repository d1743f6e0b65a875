use diesel::{ExpressionMethods, QueryDsl, Queryable};
use diesel_async::RunQueryDsl;
use uuid::Uuid;

use crate::db::{DaoError, DbAsyncPool};

use crate::schema::users as user_fields;
use crate::schema::users::dsl::users;

#[derive(Clone, Debug, Queryable)]
pub struct UserCredentials {
    pub user_id: Uuid,
    pub email: String,
    pub auth_string_hash: String,
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

    /// The email is matched against the stored (lowercase) address as given; callers normalize it.
    pub async fn get_user_credentials(
        &self,
        user_email: &str,
    ) -> Result<UserCredentials, DaoError> {
        let mut conn = self.db_async_pool.get().await?;
        let credentials = users
            .select((
                user_fields::id,
                user_fields::email,
                user_fields::auth_string_hash,
            ))
            .filter(user_fields::email.eq(user_email))
            .first::<UserCredentials>(&mut conn)
            .await?;

        Ok(credentials)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_utils;

    #[tokio::test]
    #[ignore]
    async fn test_get_user_credentials() {
        let pool = test_utils::db_async_pool().await;
        let dao = Dao::new(&pool);

        let user = test_utils::insert_user(&pool).await;

        let credentials = dao.get_user_credentials(&user.email).await.unwrap();
        assert_eq!(credentials.user_id, user.id);
        assert_eq!(credentials.email, user.email);
        assert_eq!(credentials.auth_string_hash, "test_auth_hash");

        let result = dao
            .get_user_credentials(&test_utils::unique_email())
            .await;
        assert!(result.unwrap_err().is_not_found());

        test_utils::delete_user(&pool, user.id).await;
    }
}
