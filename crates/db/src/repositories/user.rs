use sqlx::sqlite::SqliteRow;
use sqlx::{Executor, Row, Sqlite};

use gavel_core::domain::user::{User, UserId};

use super::{decode_error, parse_enum, RepositoryError, UserRepository};
use crate::DbPool;

pub struct SqlUserRepository {
    pool: DbPool,
}

impl SqlUserRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn row_to_user(row: &SqliteRow) -> Result<User, RepositoryError> {
    let role: String = row.try_get("role").map_err(decode_error)?;
    let state: String = row.try_get("state").map_err(decode_error)?;

    Ok(User {
        id: UserId(row.try_get("id").map_err(decode_error)?),
        username: row.try_get("username").map_err(decode_error)?,
        full_name: row.try_get("full_name").map_err(decode_error)?,
        email: row.try_get("email").map_err(decode_error)?,
        role: parse_enum("role", &role)?,
        state: parse_enum("state", &state)?,
    })
}

pub(crate) async fn fetch_user<'e, E>(executor: E, id: UserId) -> Result<Option<User>, RepositoryError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let row = sqlx::query(
        "SELECT id, username, full_name, email, role, state FROM users WHERE id = ?",
    )
    .bind(id.0)
    .fetch_optional(executor)
    .await?;

    row.as_ref().map(row_to_user).transpose()
}

pub(crate) async fn upsert_user<'e, E>(executor: E, user: &User) -> Result<(), RepositoryError>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query(
        "INSERT INTO users (id, username, full_name, email, role, state)
         VALUES (?, ?, ?, ?, ?, ?)
         ON CONFLICT(id) DO UPDATE SET
             username = excluded.username,
             full_name = excluded.full_name,
             email = excluded.email,
             role = excluded.role,
             state = excluded.state",
    )
    .bind(user.id.0)
    .bind(&user.username)
    .bind(&user.full_name)
    .bind(&user.email)
    .bind(user.role.as_str())
    .bind(user.state.as_str())
    .execute(executor)
    .await?;

    Ok(())
}

#[async_trait::async_trait]
impl UserRepository for SqlUserRepository {
    async fn find_by_id(&self, id: UserId) -> Result<Option<User>, RepositoryError> {
        fetch_user(&self.pool, id).await
    }

    async fn save(&self, user: User) -> Result<(), RepositoryError> {
        upsert_user(&self.pool, &user).await
    }
}

#[cfg(test)]
mod tests {
    use gavel_core::domain::user::{AccountState, Role, User, UserId};

    use super::SqlUserRepository;
    use crate::repositories::UserRepository;
    use crate::{connect_with_settings, migrations};

    #[tokio::test]
    async fn save_then_update_role_and_state() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        let repo = SqlUserRepository::new(pool);

        let mut user = User {
            id: UserId(11),
            username: "rhea".to_string(),
            full_name: "Rhea Lindqvist".to_string(),
            email: "rhea@example.com".to_string(),
            role: Role::Member,
            state: AccountState::Active,
        };
        repo.save(user.clone()).await.expect("save");

        user.role = Role::Staff;
        user.state = AccountState::Disable;
        repo.save(user.clone()).await.expect("upsert");

        assert_eq!(repo.find_by_id(UserId(11)).await.expect("find"), Some(user));
        assert_eq!(repo.find_by_id(UserId(12)).await.expect("find"), None);
    }
}
