use sqlx::sqlite::SqliteRow;
use sqlx::{Executor, Row, Sqlite};

use gavel_core::domain::approval::{NewRequestApproval, RequestApproval, RequestApprovalId};
use gavel_core::domain::jewelry::JewelryId;
use gavel_core::domain::page::{Page, PageRequest};
use gavel_core::domain::user::{Role, UserId};

use super::{
    decode_error, format_timestamp, page_bounds, parse_decimal, parse_enum, parse_timestamp,
    RepositoryError, RequestApprovalRepository,
};
use crate::DbPool;

const REQUEST_COLUMNS: &str = "ra.id, ra.parent_id, ra.state, ra.confirm, ra.sender_id, \
     ra.staff_id, ra.responder_id, ra.jewelry_id, ra.desired_price, ra.valuation, ra.note, \
     ra.request_time, ra.response_time";

enum FilterValue {
    Text(&'static str),
    Integer(i64),
}

pub struct SqlRequestApprovalRepository {
    pool: DbPool,
}

impl SqlRequestApprovalRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    async fn list_where(
        &self,
        filter: &str,
        bind: Option<FilterValue>,
        page: PageRequest,
    ) -> Result<Page<RequestApproval>, RepositoryError> {
        let (limit, offset) = page_bounds(&page);
        let count_sql = format!(
            "SELECT COUNT(*) AS total FROM request_approval ra \
             JOIN users u ON u.id = ra.sender_id WHERE {filter}"
        );
        let list_sql = format!(
            "SELECT {REQUEST_COLUMNS} FROM request_approval ra \
             JOIN users u ON u.id = ra.sender_id WHERE {filter} \
             ORDER BY ra.request_time {order}, ra.id {order} LIMIT ? OFFSET ?",
            order = page.sort.as_sql()
        );

        let mut count_query = sqlx::query(&count_sql);
        let mut list_query = sqlx::query(&list_sql);
        match bind {
            Some(FilterValue::Text(value)) => {
                count_query = count_query.bind(value);
                list_query = list_query.bind(value);
            }
            Some(FilterValue::Integer(value)) => {
                count_query = count_query.bind(value);
                list_query = list_query.bind(value);
            }
            None => {}
        }

        let total: i64 =
            count_query.fetch_one(&self.pool).await?.try_get("total").map_err(decode_error)?;
        let rows = list_query.bind(limit).bind(offset).fetch_all(&self.pool).await?;
        let items = rows.iter().map(row_to_request).collect::<Result<Vec<_>, _>>()?;

        Ok(Page::new(items, page, u64::try_from(total).unwrap_or_default()))
    }
}

fn row_to_request(row: &SqliteRow) -> Result<RequestApproval, RepositoryError> {
    let state: String = row.try_get("state").map_err(decode_error)?;
    let confirm: i64 = row.try_get("confirm").map_err(decode_error)?;
    let desired_price: String = row.try_get("desired_price").map_err(decode_error)?;
    let valuation: Option<String> = row.try_get("valuation").map_err(decode_error)?;
    let request_time: String = row.try_get("request_time").map_err(decode_error)?;
    let response_time: Option<String> = row.try_get("response_time").map_err(decode_error)?;

    Ok(RequestApproval {
        id: RequestApprovalId(row.try_get("id").map_err(decode_error)?),
        parent_id: row
            .try_get::<Option<i64>, _>("parent_id")
            .map_err(decode_error)?
            .map(RequestApprovalId),
        state: parse_enum("state", &state)?,
        confirm: confirm != 0,
        sender_id: UserId(row.try_get("sender_id").map_err(decode_error)?),
        staff_id: row.try_get::<Option<i64>, _>("staff_id").map_err(decode_error)?.map(UserId),
        responder_id: row
            .try_get::<Option<i64>, _>("responder_id")
            .map_err(decode_error)?
            .map(UserId),
        jewelry_id: JewelryId(row.try_get("jewelry_id").map_err(decode_error)?),
        desired_price: parse_decimal("desired_price", &desired_price)?,
        valuation: valuation.map(|value| parse_decimal("valuation", &value)).transpose()?,
        note: row.try_get("note").map_err(decode_error)?,
        request_time: parse_timestamp("request_time", &request_time)?,
        response_time: response_time
            .map(|value| parse_timestamp("response_time", &value))
            .transpose()?,
    })
}

pub(crate) async fn fetch_request<'e, E>(
    executor: E,
    id: RequestApprovalId,
) -> Result<Option<RequestApproval>, RepositoryError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let sql = format!("SELECT {REQUEST_COLUMNS} FROM request_approval ra WHERE ra.id = ?");
    let row = sqlx::query(&sql).bind(id.0).fetch_optional(executor).await?;
    row.as_ref().map(row_to_request).transpose()
}

pub(crate) async fn insert_request<'e, E>(
    executor: E,
    request: NewRequestApproval,
) -> Result<RequestApproval, RepositoryError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let result = sqlx::query(
        "INSERT INTO request_approval (parent_id, state, confirm, sender_id, staff_id,
                                       jewelry_id, desired_price, valuation, request_time)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(request.parent_id.map(|id| id.0))
    .bind(request.state.as_str())
    .bind(i64::from(request.confirm))
    .bind(request.sender_id.0)
    .bind(request.staff_id.map(|id| id.0))
    .bind(request.jewelry_id.0)
    .bind(request.desired_price.to_string())
    .bind(request.valuation.map(|value| value.to_string()))
    .bind(format_timestamp(&request.request_time))
    .execute(executor)
    .await?;

    Ok(RequestApproval::from_new(RequestApprovalId(result.last_insert_rowid()), request))
}

pub(crate) async fn update_request<'e, E>(
    executor: E,
    request: &RequestApproval,
) -> Result<(), RepositoryError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let result = sqlx::query(
        "UPDATE request_approval
         SET state = ?, confirm = ?, staff_id = ?, responder_id = ?, valuation = ?,
             note = ?, response_time = ?
         WHERE id = ?",
    )
    .bind(request.state.as_str())
    .bind(i64::from(request.confirm))
    .bind(request.staff_id.map(|id| id.0))
    .bind(request.responder_id.map(|id| id.0))
    .bind(request.valuation.map(|value| value.to_string()))
    .bind(request.note.as_deref())
    .bind(request.response_time.as_ref().map(format_timestamp))
    .bind(request.id.0)
    .execute(executor)
    .await?;

    if result.rows_affected() == 0 {
        return Err(RepositoryError::Decode(format!(
            "request approval {} vanished during update",
            request.id
        )));
    }
    Ok(())
}

#[async_trait::async_trait]
impl RequestApprovalRepository for SqlRequestApprovalRepository {
    async fn find_by_id(
        &self,
        id: RequestApprovalId,
    ) -> Result<Option<RequestApproval>, RepositoryError> {
        fetch_request(&self.pool, id).await
    }

    async fn insert(&self, request: NewRequestApproval) -> Result<RequestApproval, RepositoryError> {
        insert_request(&self.pool, request).await
    }

    async fn update(&self, request: &RequestApproval) -> Result<(), RepositoryError> {
        update_request(&self.pool, request).await
    }

    async fn list_by_sender_role(
        &self,
        role: Role,
        page: PageRequest,
    ) -> Result<Page<RequestApproval>, RepositoryError> {
        self.list_where("u.role = ?", Some(FilterValue::Text(role.as_str())), page).await
    }

    async fn list_by_user(
        &self,
        user_id: UserId,
        page: PageRequest,
    ) -> Result<Page<RequestApproval>, RepositoryError> {
        self.list_where("ra.sender_id = ?", Some(FilterValue::Integer(user_id.0)), page).await
    }

    async fn list_passed(
        &self,
        page: PageRequest,
    ) -> Result<Page<RequestApproval>, RepositoryError> {
        self.list_where("ra.state = 'APPROVED' AND ra.confirm = 1", None, page).await
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};
    use rust_decimal::Decimal;

    use gavel_core::domain::approval::{ApprovalState, NewRequestApproval, RequestApprovalId};
    use gavel_core::domain::jewelry::JewelryId;
    use gavel_core::domain::page::{PageRequest, SortOrder};
    use gavel_core::domain::user::{Role, UserId};

    use super::SqlRequestApprovalRepository;
    use crate::repositories::RequestApprovalRepository;
    use crate::{connect_with_settings, fixtures, migrations};

    async fn setup() -> sqlx::SqlitePool {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        fixtures::ReferenceDataset::load(&pool).await.expect("reference data");
        pool
    }

    fn new_request(sender: i64, minutes: i64) -> NewRequestApproval {
        NewRequestApproval {
            parent_id: None,
            state: ApprovalState::Active,
            confirm: false,
            sender_id: UserId(sender),
            staff_id: None,
            jewelry_id: JewelryId(fixtures::EMERALD_RING),
            desired_price: Decimal::new(125_000, 2),
            valuation: None,
            request_time: Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).single().expect("time")
                + Duration::minutes(minutes),
        }
    }

    #[tokio::test]
    async fn insert_assigns_id_and_round_trips_every_field() {
        let repo = SqlRequestApprovalRepository::new(setup().await);

        let created = repo.insert(new_request(fixtures::MEMBER_ALICE, 0)).await.expect("insert");
        let mut updated = created.clone();
        updated.state = ApprovalState::Approved;
        updated.confirm = true;
        updated.staff_id = Some(UserId(fixtures::STAFF_SAM));
        updated.responder_id = Some(UserId(fixtures::STAFF_SAM));
        updated.valuation = Some(Decimal::new(99_950, 2));
        updated.note = Some("clasp replaced".to_string());
        updated.response_time = Some(created.request_time + Duration::hours(2));
        repo.update(&updated).await.expect("update");

        let found = repo.find_by_id(created.id).await.expect("find").expect("exists");
        assert_eq!(found, updated);
        assert!(found.is_passed());
    }

    #[tokio::test]
    async fn find_by_id_returns_none_for_unknown_id() {
        let repo = SqlRequestApprovalRepository::new(setup().await);
        assert_eq!(repo.find_by_id(RequestApprovalId(404)).await.expect("find"), None);
    }

    #[tokio::test]
    async fn update_of_missing_row_is_an_error() {
        let repo = SqlRequestApprovalRepository::new(setup().await);
        let mut ghost = repo.insert(new_request(fixtures::MEMBER_ALICE, 0)).await.expect("insert");
        ghost.id = RequestApprovalId(999);
        assert!(repo.update(&ghost).await.is_err());
    }

    #[tokio::test]
    async fn lists_filter_by_sender_role_and_user() {
        let repo = SqlRequestApprovalRepository::new(setup().await);
        repo.insert(new_request(fixtures::MEMBER_ALICE, 0)).await.expect("alice 1");
        repo.insert(new_request(fixtures::MEMBER_ALICE, 1)).await.expect("alice 2");
        repo.insert(new_request(fixtures::MEMBER_BOB, 2)).await.expect("bob");
        repo.insert(new_request(fixtures::STAFF_SAM, 3)).await.expect("sam");

        let members =
            repo.list_by_sender_role(Role::Member, PageRequest::default()).await.expect("members");
        assert_eq!(members.total_items, 3);

        let staff =
            repo.list_by_sender_role(Role::Staff, PageRequest::default()).await.expect("staff");
        assert_eq!(staff.total_items, 1);
        assert_eq!(staff.items[0].sender_id, UserId(fixtures::STAFF_SAM));

        let alice = repo
            .list_by_user(UserId(fixtures::MEMBER_ALICE), PageRequest::default())
            .await
            .expect("alice");
        assert_eq!(alice.total_items, 2);
        assert!(alice.items.iter().all(|r| r.sender_id == UserId(fixtures::MEMBER_ALICE)));
    }

    #[tokio::test]
    async fn pages_are_ordered_by_request_time() {
        let repo = SqlRequestApprovalRepository::new(setup().await);
        for minute in 0..5 {
            repo.insert(new_request(fixtures::MEMBER_ALICE, minute)).await.expect("insert");
        }

        let newest = repo
            .list_by_user(UserId(fixtures::MEMBER_ALICE), PageRequest::new(0, 2))
            .await
            .expect("newest");
        assert_eq!(newest.total_pages, 3);
        assert!(newest.items[0].request_time > newest.items[1].request_time);

        let oldest = repo
            .list_by_user(
                UserId(fixtures::MEMBER_ALICE),
                PageRequest::new(2, 2).with_sort(SortOrder::OldestFirst),
            )
            .await
            .expect("oldest");
        assert_eq!(oldest.items.len(), 1);
        assert_eq!(oldest.items[0].request_time, new_request(0, 4).request_time);
    }

    #[tokio::test]
    async fn list_passed_requires_approval_and_confirmation() {
        let repo = SqlRequestApprovalRepository::new(setup().await);

        let mut approved_only = repo.insert(new_request(fixtures::MEMBER_ALICE, 0)).await.expect("a");
        approved_only.state = ApprovalState::Approved;
        repo.update(&approved_only).await.expect("update a");

        let mut confirmed_only = repo.insert(new_request(fixtures::MEMBER_ALICE, 1)).await.expect("b");
        confirmed_only.confirm = true;
        repo.update(&confirmed_only).await.expect("update b");

        let mut passed = repo.insert(new_request(fixtures::MEMBER_BOB, 2)).await.expect("c");
        passed.state = ApprovalState::Approved;
        passed.confirm = true;
        repo.update(&passed).await.expect("update c");

        let page = repo.list_passed(PageRequest::default()).await.expect("passed");
        assert_eq!(page.total_items, 1);
        assert_eq!(page.items[0].id, passed.id);
    }
}
