pub mod error;
pub mod format;
mod validate;

use std::sync::Arc;

use chrono::{DateTime, SubsecRound, Utc};
use sqlx::{PgExecutor, PgPool, Postgres, QueryBuilder};
use tracing::{debug, info};

use crate::db::{
    models::{NewReading, Page, ReadingFilter, TemperatureReading},
    schema::ReadingsSchema,
};

pub use self::error::{Result, StoreError};

/// Upper bound on `Page::limit` and on batch sizes unless overridden.
pub const MAX_LIST_LIMIT: i64 = 1000;

/// Typed access to the readings table.
///
/// Cheap to clone; every clone shares the same pool and prepared SQL text.
/// Connections are acquired per call and returned to the pool on every exit
/// path.
#[derive(Debug, Clone)]
pub struct ReadingsStore {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    pool: PgPool,
    schema: ReadingsSchema,
    max_limit: i64,
    insert_sql: String,
    select_by_id_sql: String,
    latest_per_location_sql: String,
}

impl ReadingsStore {
    pub fn new(pool: PgPool, schema: ReadingsSchema) -> Self {
        Self::with_max_limit(pool, schema, MAX_LIST_LIMIT)
    }

    pub fn with_max_limit(pool: PgPool, schema: ReadingsSchema, max_limit: i64) -> Self {
        Self {
            inner: Arc::new(Inner {
                insert_sql: schema.insert_sql(),
                select_by_id_sql: schema.select_by_id_sql(),
                latest_per_location_sql: schema.latest_per_location_sql(),
                pool,
                schema,
                max_limit,
            }),
        }
    }

    pub fn schema(&self) -> &ReadingsSchema {
        &self.inner.schema
    }

    pub fn max_limit(&self) -> i64 {
        self.inner.max_limit
    }

    /// Validates and inserts one reading, returning the persisted row with
    /// its assigned `id` and resolved `timestamp`.
    pub async fn create(&self, new: NewReading) -> Result<TemperatureReading> {
        validate::reading(&new)?;

        let reading = self.insert(&self.inner.pool, new, Utc::now()).await?;
        info!(
            id = reading.id,
            location = ?reading.location,
            temperature = reading.temperature,
            humidity = reading.humidity,
            "Reading persisted"
        );
        Ok(reading)
    }

    /// Inserts every reading inside a single transaction.
    ///
    /// All entries are validated before the transaction opens. If any insert
    /// fails the transaction is dropped uncommitted and nothing is persisted.
    pub async fn create_batch(&self, batch: Vec<NewReading>) -> Result<Vec<TemperatureReading>> {
        if batch.is_empty() {
            return Ok(Vec::new());
        }
        validate::batch(&batch, self.inner.max_limit)?;

        let now = Utc::now();
        let mut tx = self.inner.pool.begin().await?;
        let mut readings = Vec::with_capacity(batch.len());
        for new in batch {
            readings.push(self.insert(&mut *tx, new, now).await?);
        }
        tx.commit().await?;

        info!(count = readings.len(), "Reading batch persisted");
        Ok(readings)
    }

    pub async fn get(&self, id: i64) -> Result<TemperatureReading> {
        debug!(id, "Fetching reading");
        sqlx::query_as::<_, TemperatureReading>(&self.inner.select_by_id_sql)
            .bind(id)
            .fetch_optional(&self.inner.pool)
            .await?
            .ok_or(StoreError::NotFound { id })
    }

    /// Returns one page of readings matching `filter`, ordered by
    /// `timestamp ASC, id ASC`. Every call issues a fresh query.
    pub async fn list(&self, filter: &ReadingFilter, page: Page) -> Result<Vec<TemperatureReading>> {
        validate::filter(filter)?;
        validate::page(&page, self.inner.max_limit)?;

        let mut query = QueryBuilder::<Postgres>::new(format!(
            "SELECT {} FROM {} WHERE TRUE",
            ReadingsSchema::COLUMNS,
            self.inner.schema.table()
        ));
        if let Some(location) = &filter.location {
            query.push(" AND location = ").push_bind(location.clone());
        }
        if let Some(since) = filter.since {
            query.push(r#" AND "timestamp" >= "#).push_bind(since);
        }
        if let Some(until) = filter.until {
            query.push(r#" AND "timestamp" <= "#).push_bind(until);
        }
        query
            .push(r#" ORDER BY "timestamp" ASC, id ASC LIMIT "#)
            .push_bind(page.limit)
            .push(" OFFSET ")
            .push_bind(page.offset);

        let rows = query
            .build_query_as::<TemperatureReading>()
            .fetch_all(&self.inner.pool)
            .await?;

        debug!(?filter, limit = page.limit, offset = page.offset, rows = rows.len(), "Listed readings");
        Ok(rows)
    }

    /// Most recent reading for every distinct location, ordered by location.
    /// Readings without a location form one group, listed last.
    pub async fn latest_per_location(&self) -> Result<Vec<TemperatureReading>> {
        let rows = sqlx::query_as::<_, TemperatureReading>(&self.inner.latest_per_location_sql)
            .fetch_all(&self.inner.pool)
            .await?;
        Ok(rows)
    }

    async fn insert<'e, E>(
        &self,
        executor: E,
        new: NewReading,
        now: DateTime<Utc>,
    ) -> Result<TemperatureReading>
    where
        E: PgExecutor<'e>,
    {
        // timestamptz has microsecond resolution.
        let timestamp = new.timestamp.unwrap_or(now).trunc_subsecs(6);
        let reading = sqlx::query_as::<_, TemperatureReading>(&self.inner.insert_sql)
            .bind(new.temperature)
            .bind(new.humidity)
            .bind(new.location)
            .bind(timestamp)
            .fetch_one(executor)
            .await?;
        Ok(reading)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use chrono::{Duration, TimeZone};
    use sqlx::PgPool;

    use super::*;

    fn store(pool: PgPool) -> ReadingsStore {
        ReadingsStore::new(pool, ReadingsSchema::default())
    }

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + Duration::seconds(secs)
    }

    async fn row_count(pool: &PgPool) -> i64 {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM temperature")
            .fetch_one(pool)
            .await
            .unwrap()
    }

    /// Four readings: two share a timestamp so ordering must fall back to `id`.
    async fn fixture(store: &ReadingsStore) -> Vec<TemperatureReading> {
        let mut out = Vec::new();
        for new in [
            NewReading::new(20.0, 40.0).with_location("lab-1").at(at(30)),
            NewReading::new(21.0, 41.0).with_location("lab-2").at(at(10)),
            NewReading::new(22.0, 42.0).with_location("lab-1").at(at(20)),
            NewReading::new(23.0, 43.0).at(at(20)),
        ] {
            out.push(store.create(new).await.unwrap());
        }
        out
    }

    // -----------------------------------------------------------------------
    // create / get
    // -----------------------------------------------------------------------

    #[sqlx::test(migrations = "./migrations")]
    async fn create_then_get_returns_same_fields(pool: PgPool) {
        let store = store(pool);
        let before = Utc::now();

        let created = store
            .create(NewReading::new(21.5, 40.0).with_location("lab-1"))
            .await
            .unwrap();
        let fetched = store.get(created.id).await.unwrap();

        assert_eq!(fetched, created);
        assert_eq!(fetched.temperature, 21.5);
        assert_eq!(fetched.humidity, 40.0);
        assert_eq!(fetched.location.as_deref(), Some("lab-1"));
        assert!((fetched.timestamp - before).abs() < Duration::seconds(5));
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn create_keeps_explicit_timestamp(pool: PgPool) {
        let store = store(pool);
        let created = store.create(NewReading::new(18.0, 55.5).at(at(0))).await.unwrap();

        assert_eq!(created.timestamp, at(0));
        assert_eq!(created.location, None);
        assert_eq!(store.get(created.id).await.unwrap().timestamp, at(0));
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn create_rejects_non_finite_values(pool: PgPool) {
        let store = store(pool.clone());

        for new in [
            NewReading::new(f64::NAN, 40.0),
            NewReading::new(21.0, f64::INFINITY),
            NewReading::new(f64::NEG_INFINITY, 40.0),
        ] {
            let err = store.create(new).await.unwrap_err();
            assert!(matches!(err, StoreError::Validation { .. }), "{err:?}");
        }
        assert_eq!(row_count(&pool).await, 0);
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn create_truncates_timestamp_to_microseconds(pool: PgPool) {
        let store = store(pool);
        let ts = "2023-11-14T22:13:20.123456789Z".parse::<DateTime<Utc>>().unwrap();

        let created = store.create(NewReading::new(21.5, 40.0).at(ts)).await.unwrap();
        let fetched = store.get(created.id).await.unwrap();

        let expected = "2023-11-14T22:13:20.123456Z".parse::<DateTime<Utc>>().unwrap();
        assert_eq!(created.timestamp, expected);
        assert_eq!(fetched, created);
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn create_rejects_nul_in_location(pool: PgPool) {
        let store = store(pool.clone());
        let err = store
            .create(NewReading::new(21.5, 40.0).with_location("lab\u{0}1"))
            .await
            .unwrap_err();

        match err {
            StoreError::Validation { ref field, .. } => assert_eq!(field, "location"),
            ref other => panic!("unexpected error: {other:?}"),
        }
        assert!(!err.is_retryable());
        assert_eq!(row_count(&pool).await, 0);
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn create_rejects_timestamp_before_storable_range(pool: PgPool) {
        let store = store(pool.clone());
        let ancient = Utc.with_ymd_and_hms(-5000, 1, 1, 0, 0, 0).unwrap();

        let err = store.create(NewReading::new(1.0, 1.0).at(ancient)).await.unwrap_err();
        assert!(matches!(err, StoreError::Validation { ref field, .. } if field == "timestamp"));
        assert_eq!(row_count(&pool).await, 0);
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn get_missing_id_is_not_found(pool: PgPool) {
        let err = store(pool).get(9999).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound { id: 9999 }));
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn ids_are_increasing_and_unique(pool: PgPool) {
        let store = store(pool);
        let a = store.create(NewReading::new(1.0, 1.0)).await.unwrap();
        let b = store.create(NewReading::new(2.0, 2.0)).await.unwrap();
        assert!(b.id > a.id);
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn concurrent_creates_get_distinct_ids(pool: PgPool) {
        let store = store(pool);
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let store = store.clone();
                tokio::spawn(async move { store.create(NewReading::new(i as f64, 50.0)).await })
            })
            .collect();

        let mut ids = HashSet::new();
        for handle in handles {
            ids.insert(handle.await.unwrap().unwrap().id);
        }
        assert_eq!(ids.len(), 8);
    }

    // -----------------------------------------------------------------------
    // list
    // -----------------------------------------------------------------------

    #[sqlx::test(migrations = "./migrations")]
    async fn list_orders_by_timestamp_then_id(pool: PgPool) {
        let store = store(pool);
        let created = fixture(&store).await;

        let rows = store.list(&ReadingFilter::default(), Page::default()).await.unwrap();
        let ids: Vec<i64> = rows.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![created[1].id, created[2].id, created[3].id, created[0].id]);

        for pair in rows.windows(2) {
            assert!(pair[0].timestamp <= pair[1].timestamp);
            if pair[0].timestamp == pair[1].timestamp {
                assert!(pair[0].id < pair[1].id);
            }
        }
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn list_pages_partition_without_overlap(pool: PgPool) {
        let store = store(pool);
        fixture(&store).await;
        let filter = ReadingFilter::default();

        let all = store.list(&filter, Page::new(10, 0)).await.unwrap();
        let first = store.list(&filter, Page::new(2, 0)).await.unwrap();
        let second = store.list(&filter, Page::new(2, 2)).await.unwrap();
        let past_end = store.list(&filter, Page::new(2, 4)).await.unwrap();

        assert_eq!(first.len(), 2);
        assert_eq!(second.len(), 2);
        assert!(past_end.is_empty());
        let joined: Vec<_> = first.into_iter().chain(second).collect();
        assert_eq!(joined, all);
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn list_is_restartable(pool: PgPool) {
        let store = store(pool);
        fixture(&store).await;

        let a = store.list(&ReadingFilter::default(), Page::new(3, 1)).await.unwrap();
        let b = store.list(&ReadingFilter::default(), Page::new(3, 1)).await.unwrap();
        assert_eq!(a, b);
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn list_filters_by_location(pool: PgPool) {
        let store = store(pool);
        fixture(&store).await;

        let filter = ReadingFilter {
            location: Some("lab-1".into()),
            ..ReadingFilter::default()
        };
        let rows = store.list(&filter, Page::default()).await.unwrap();
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|r| r.location.as_deref() == Some("lab-1")));
        assert!(rows[0].timestamp < rows[1].timestamp);
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn list_time_range_is_inclusive(pool: PgPool) {
        let store = store(pool);
        fixture(&store).await;

        let filter = ReadingFilter {
            since: Some(at(10)),
            until: Some(at(20)),
            ..ReadingFilter::default()
        };
        let rows = store.list(&filter, Page::default()).await.unwrap();
        assert_eq!(rows.len(), 3);
        assert!(rows.iter().all(|r| r.timestamp >= at(10) && r.timestamp <= at(20)));

        let only_since = ReadingFilter {
            since: Some(at(25)),
            ..ReadingFilter::default()
        };
        let rows = store.list(&only_since, Page::default()).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].timestamp, at(30));
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn list_rejects_bad_pages(pool: PgPool) {
        let store = ReadingsStore::with_max_limit(pool, ReadingsSchema::default(), 50);
        assert_eq!(store.max_limit(), 50);
        let filter = ReadingFilter::default();

        for page in [Page::new(0, 0), Page::new(51, 0), Page::new(-3, 0), Page::new(10, -1)] {
            let err = store.list(&filter, page).await.unwrap_err();
            assert!(matches!(err, StoreError::Validation { .. }), "{page:?}");
        }
        assert!(store.list(&filter, Page::new(50, 0)).await.is_ok());
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn get_and_list_fail_with_storage_error_when_pool_closed(pool: PgPool) {
        let store = store(pool.clone());
        let created = store.create(NewReading::new(20.0, 40.0)).await.unwrap();
        pool.close().await;

        let err = store.get(created.id).await.unwrap_err();
        assert!(matches!(err, StoreError::Storage(_)), "{err:?}");
        assert!(err.is_retryable());

        let err = store.list(&ReadingFilter::default(), Page::default()).await.unwrap_err();
        assert!(matches!(err, StoreError::Storage(_)), "{err:?}");

        let err = store.create(NewReading::new(20.0, 40.0)).await.unwrap_err();
        assert!(matches!(err, StoreError::Storage(_)), "{err:?}");
    }

    // -----------------------------------------------------------------------
    // create_batch
    // -----------------------------------------------------------------------

    #[sqlx::test(migrations = "./migrations")]
    async fn batch_inserts_all_in_order(pool: PgPool) {
        let store = store(pool.clone());
        let readings = store
            .create_batch(vec![
                NewReading::new(20.0, 40.0).with_location("a"),
                NewReading::new(21.0, 41.0).with_location("b"),
                NewReading::new(22.0, 42.0).at(at(5)),
            ])
            .await
            .unwrap();

        assert_eq!(readings.len(), 3);
        assert!(readings[0].id < readings[1].id && readings[1].id < readings[2].id);
        assert_eq!(readings[0].timestamp, readings[1].timestamp);
        assert_eq!(readings[2].timestamp, at(5));
        assert_eq!(row_count(&pool).await, 3);
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn batch_empty_is_noop(pool: PgPool) {
        assert!(store(pool).create_batch(Vec::new()).await.unwrap().is_empty());
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn batch_with_invalid_entry_inserts_nothing(pool: PgPool) {
        let store = store(pool.clone());
        let err = store
            .create_batch(vec![NewReading::new(20.0, 40.0), NewReading::new(20.0, f64::NAN)])
            .await
            .unwrap_err();

        match err {
            StoreError::Validation { field, .. } => assert_eq!(field, "readings[1].humidity"),
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(row_count(&pool).await, 0);
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn batch_rolls_back_on_storage_failure(pool: PgPool) {
        sqlx::query("ALTER TABLE temperature ADD CONSTRAINT humidity_range CHECK (humidity <= 100)")
            .execute(&pool)
            .await
            .unwrap();
        let store = store(pool.clone());

        let err = store
            .create_batch(vec![NewReading::new(20.0, 40.0), NewReading::new(20.0, 150.0)])
            .await
            .unwrap_err();

        assert!(matches!(err, StoreError::Storage(_)), "{err:?}");
        assert!(err.is_retryable());
        assert_eq!(row_count(&pool).await, 0);
    }

    // -----------------------------------------------------------------------
    // latest_per_location
    // -----------------------------------------------------------------------

    #[sqlx::test(migrations = "./migrations")]
    async fn latest_per_location_picks_newest_in_each_group(pool: PgPool) {
        let store = store(pool);
        let created = fixture(&store).await;

        let latest = store.latest_per_location().await.unwrap();
        let ids: Vec<i64> = latest.iter().map(|r| r.id).collect();
        // lab-1 newest is at(30), lab-2 has a single row, unlabelled group last.
        assert_eq!(ids, vec![created[0].id, created[1].id, created[3].id]);
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn latest_per_location_empty_table(pool: PgPool) {
        assert!(store(pool).latest_per_location().await.unwrap().is_empty());
    }

    // -----------------------------------------------------------------------
    // schema
    // -----------------------------------------------------------------------

    #[sqlx::test(migrations = "./migrations")]
    async fn store_uses_configured_table(pool: PgPool) {
        sqlx::query("CREATE TABLE archive (LIKE temperature INCLUDING ALL)")
            .execute(&pool)
            .await
            .unwrap();
        let archive = ReadingsStore::new(pool.clone(), ReadingsSchema::new("archive").unwrap());

        let created = archive.create(NewReading::new(19.0, 60.0)).await.unwrap();
        assert_eq!(archive.get(created.id).await.unwrap(), created);
        assert_eq!(row_count(&pool).await, 0);
    }
}
