use diesel::{dsl, ExpressionMethods, PgTextExpressionMethods, QueryDsl, SelectableHelper};
use diesel_async::RunQueryDsl;
use std::time::SystemTime;
use uuid::Uuid;

use crate::db::{DaoError, DbAsyncPool};
use crate::models::user::{NewUser, UserProfile};

use crate::schema::users as user_fields;
use crate::schema::users::dsl::users;

pub struct Dao {
    db_async_pool: DbAsyncPool,
}

impl Dao {
    pub fn new(db_async_pool: &DbAsyncPool) -> Self {
        Self {
            db_async_pool: db_async_pool.clone(),
        }
    }

    /// Emails are stored lowercased. A second account with the same email fails with a
    /// unique violation (see [`DaoError::is_unique_violation`]).
    pub async fn create_user(
        &self,
        username: &str,
        email: &str,
        auth_string_hash: &str,
    ) -> Result<UserProfile, DaoError> {
        let user_id = Uuid::now_v7();
        let email_lowercase = email.to_lowercase();

        let new_user = NewUser {
            id: user_id,
            username,
            email: &email_lowercase,
            auth_string_hash,
            created_timestamp: SystemTime::now(),
        };

        let mut conn = self.db_async_pool.get().await?;
        dsl::insert_into(users)
            .values(&new_user)
            .execute(&mut conn)
            .await?;

        Ok(UserProfile {
            id: user_id,
            username: String::from(username),
            email: email_lowercase,
        })
    }

    /// A query containing `@` is treated as a full email address and must match exactly,
    /// ignoring case. Any other query matches every email that contains it, ignoring case, so
    /// an empty query matches every user.
    pub async fn search_users(&self, query: &str) -> Result<Vec<UserProfile>, DaoError> {
        let mut conn = self.db_async_pool.get().await?;

        let matches = if query.contains('@') {
            users
                .select(UserProfile::as_select())
                .filter(user_fields::email.eq(query.to_lowercase()))
                .order(user_fields::email.asc())
                .load::<UserProfile>(&mut conn)
                .await?
        } else {
            let pattern = format!("%{}%", escape_like_pattern(query));

            users
                .select(UserProfile::as_select())
                .filter(user_fields::email.ilike(pattern))
                .order(user_fields::email.asc())
                .load::<UserProfile>(&mut conn)
                .await?
        };

        Ok(matches)
    }
}

/// Escapes the characters Postgres treats specially in a LIKE pattern so the input only ever
/// matches literally. Backslash is the default escape character.
pub fn escape_like_pattern(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());

    for c in input.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }

        escaped.push(c);
    }

    escaped
}
