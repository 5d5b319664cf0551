use sqlx::sqlite::SqliteRow;
use sqlx::{Executor, Row, Sqlite};

use gavel_core::domain::jewelry::{Jewelry, JewelryId};
use gavel_core::domain::user::UserId;

use super::{decode_error, parse_decimal, parse_enum, JewelryRepository, RepositoryError};
use crate::DbPool;

pub struct SqlJewelryRepository {
    pool: DbPool,
}

impl SqlJewelryRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn row_to_jewelry(row: &SqliteRow) -> Result<Jewelry, RepositoryError> {
    let weight: String = row.try_get("weight").map_err(decode_error)?;
    let price: String = row.try_get("price").map_err(decode_error)?;
    let state: String = row.try_get("state").map_err(decode_error)?;

    Ok(Jewelry {
        id: JewelryId(row.try_get("id").map_err(decode_error)?),
        name: row.try_get("name").map_err(decode_error)?,
        description: row.try_get("description").map_err(decode_error)?,
        category: row.try_get("category").map_err(decode_error)?,
        material: row.try_get("material").map_err(decode_error)?,
        brand: row.try_get("brand").map_err(decode_error)?,
        weight: parse_decimal("weight", &weight)?,
        price: parse_decimal("price", &price)?,
        state: parse_enum("state", &state)?,
        owner_id: UserId(row.try_get("owner_id").map_err(decode_error)?),
    })
}

pub(crate) async fn fetch_jewelry<'e, E>(
    executor: E,
    id: JewelryId,
) -> Result<Option<Jewelry>, RepositoryError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let row = sqlx::query(
        "SELECT id, name, description, category, material, brand, weight, price, state, owner_id
         FROM jewelry WHERE id = ?",
    )
    .bind(id.0)
    .fetch_optional(executor)
    .await?;

    row.as_ref().map(row_to_jewelry).transpose()
}

pub(crate) async fn upsert_jewelry<'e, E>(executor: E, jewelry: &Jewelry) -> Result<(), RepositoryError>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query(
        "INSERT INTO jewelry (id, name, description, category, material, brand, weight, price,
                              state, owner_id)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
         ON CONFLICT(id) DO UPDATE SET
             name = excluded.name,
             description = excluded.description,
             category = excluded.category,
             material = excluded.material,
             brand = excluded.brand,
             weight = excluded.weight,
             price = excluded.price,
             state = excluded.state,
             owner_id = excluded.owner_id",
    )
    .bind(jewelry.id.0)
    .bind(&jewelry.name)
    .bind(&jewelry.description)
    .bind(&jewelry.category)
    .bind(&jewelry.material)
    .bind(&jewelry.brand)
    .bind(jewelry.weight.to_string())
    .bind(jewelry.price.to_string())
    .bind(jewelry.state.as_str())
    .bind(jewelry.owner_id.0)
    .execute(executor)
    .await?;

    Ok(())
}

#[async_trait::async_trait]
impl JewelryRepository for SqlJewelryRepository {
    async fn find_by_id(&self, id: JewelryId) -> Result<Option<Jewelry>, RepositoryError> {
        fetch_jewelry(&self.pool, id).await
    }

    async fn save(&self, jewelry: Jewelry) -> Result<(), RepositoryError> {
        upsert_jewelry(&self.pool, &jewelry).await
    }
}
