use uuid::Uuid;

use super::schema::Database;
use super::types::{DatabaseError, User};

impl Database {
    pub async fn create_user(&self, name: &str) -> Result<User, DatabaseError> {
        let now = chrono::Utc::now().timestamp();
        let user = sqlx::query_as::<_, User>(
            "INSERT INTO users (id, name, created_at, updated_at)
             VALUES (?, ?, ?, ?)
             RETURNING id, name, created_at, updated_at",
        )
        .bind(Uuid::new_v4())
        .bind(name)
        .bind(now)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;
        Ok(user)
    }

    pub async fn get_user(&self, user_id: Uuid) -> Result<Option<User>, DatabaseError> {
        let user = sqlx::query_as::<_, User>(
            "SELECT id, name, created_at, updated_at FROM users WHERE id = ?",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }
}
