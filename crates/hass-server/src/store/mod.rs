//! Relational persistence on SQLite.
//!
//! Every record type lives in its own table. The full record is stored as
//! JSON next to a fixed set of indexed columns (hospital, patient, visit,
//! parent, actor, status, unique key) that carry the foreign keys and the
//! filters the API needs.

mod entries;

use chrono::{DateTime, SecondsFormat, Utc};
use hass_shared::{PaginatedResult, PaginationInput};
use serde::de::DeserializeOwned;
use serde::Serialize;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::{FromRow, QueryBuilder, Row, Sqlite};
use std::collections::BTreeMap;
use std::str::FromStr;
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("{kind} {id} not found")]
    NotFound { kind: &'static str, id: String },

    #[error("duplicate {0}")]
    Duplicate(&'static str),

    #[error("{0}")]
    Conflict(String),

    #[error("{0} references a record that does not exist")]
    InvalidReference(&'static str),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("stored record could not be decoded: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Indexed columns of a stored record
#[derive(Clone, Debug, Default)]
pub struct EntryIndex {
    pub hospital_id: Option<Uuid>,
    pub patient_id: Option<Uuid>,
    pub visit_id: Option<Uuid>,
    /// Owning record in another table (thread of a message, region of a hospital)
    pub parent_id: Option<Uuid>,
    /// User who created the record, or the account it belongs to
    pub actor_id: Option<Uuid>,
    /// Lifecycle status; users index their role here
    pub status: Option<String>,
    /// Unique within the table (MRN, email, bed slot)
    pub unique_key: Option<String>,
}

/// A record type with its own table
pub trait Entry: Serialize + DeserializeOwned + Send + Sync + Unpin + 'static {
    const TABLE: &'static str;
    /// Human-readable name used in errors
    const KIND: &'static str;

    fn id(&self) -> Uuid;
    fn index(&self) -> EntryIndex;
    fn created_at(&self) -> DateTime<Utc>;
    fn updated_at(&self) -> DateTime<Utc>;
}

/// Column filters for list queries. Unset fields match everything.
#[derive(Clone, Debug, Default)]
pub struct Filter {
    pub hospital_id: Option<Uuid>,
    /// Restrict to any of these hospitals (regional scoping)
    pub hospital_in: Option<Vec<Uuid>>,
    pub patient_id: Option<Uuid>,
    pub visit_id: Option<Uuid>,
    pub parent_id: Option<Uuid>,
    pub actor_id: Option<Uuid>,
    pub status: Option<String>,
    /// Only records whose `participant_ids` JSON array contains this user
    pub participant: Option<Uuid>,
}

impl Filter {
    pub fn hospital(hospital_id: Option<Uuid>) -> Self {
        Self {
            hospital_id,
            ..Default::default()
        }
    }

    pub fn patient(patient_id: Uuid) -> Self {
        Self {
            patient_id: Some(patient_id),
            ..Default::default()
        }
    }
}

struct TableDef {
    name: &'static str,
    /// (column, referenced table)
    references: &'static [(&'static str, &'static str)],
}

const TABLES: &[TableDef] = &[
    TableDef { name: "regions", references: &[] },
    TableDef { name: "hospitals", references: &[("parent_id", "regions")] },
    TableDef { name: "users", references: &[("hospital_id", "hospitals")] },
    TableDef { name: "user_credentials", references: &[("parent_id", "users")] },
    TableDef { name: "patients", references: &[("hospital_id", "hospitals")] },
    TableDef {
        name: "visits",
        references: &[("hospital_id", "hospitals"), ("patient_id", "patients")],
    },
    TableDef { name: "vitals", references: &[("patient_id", "patients"), ("visit_id", "visits")] },
    TableDef { name: "prescriptions", references: &[("patient_id", "patients"), ("visit_id", "visits")] },
    TableDef { name: "lab_tests", references: &[("patient_id", "patients"), ("visit_id", "visits")] },
    TableDef { name: "nurse_logs", references: &[("patient_id", "patients"), ("visit_id", "visits")] },
    TableDef { name: "case_sheets", references: &[("patient_id", "patients"), ("visit_id", "visits")] },
    TableDef {
        name: "beds",
        references: &[
            ("hospital_id", "hospitals"),
            ("patient_id", "patients"),
            ("visit_id", "visits"),
        ],
    },
    TableDef {
        name: "appointments",
        references: &[("hospital_id", "hospitals"), ("patient_id", "patients")],
    },
    TableDef { name: "message_threads", references: &[] },
    TableDef { name: "messages", references: &[("parent_id", "message_threads")] },
    TableDef { name: "files", references: &[("patient_id", "patients")] },
    TableDef { name: "audit_log", references: &[] },
];

fn create_table_sql(def: &TableDef) -> String {
    let mut sql = format!(
        "CREATE TABLE IF NOT EXISTS {} (
            id TEXT PRIMARY KEY NOT NULL,
            hospital_id TEXT,
            patient_id TEXT,
            visit_id TEXT,
            parent_id TEXT,
            actor_id TEXT,
            status TEXT,
            unique_key TEXT UNIQUE,
            record TEXT NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL",
        def.name
    );
    for (column, table) in def.references {
        sql.push_str(&format!(",\n            FOREIGN KEY ({}) REFERENCES {}(id)", column, table));
    }
    sql.push_str("\n        )");
    sql
}

/// RFC 3339 with fixed microsecond precision, so text order is time order
pub fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn opt_id(id: Option<Uuid>) -> Option<String> {
    id.map(|id| id.to_string())
}

/// Decodes the `record` column into an entry
struct Stored<T>(T);

impl<'r, T: DeserializeOwned> FromRow<'r, SqliteRow> for Stored<T> {
    fn from_row(row: &'r SqliteRow) -> sqlx::Result<Self> {
        let record: String = row.try_get("record")?;
        serde_json::from_str(&record)
            .map(Stored)
            .map_err(|e| sqlx::Error::ColumnDecode {
                index: "record".to_string(),
                source: Box::new(e),
            })
    }
}

/// Precondition on a guarded write
enum Guard<'a> {
    Status(&'a str),
    UpdatedAt(String),
}

#[derive(Clone)]
pub struct Store {
    pool: SqlitePool,
}

impl Store {
    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .foreign_keys(true);

        // Each in-memory connection is its own database; keep exactly one alive.
        let pool = if database_url.contains(":memory:") {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
                .connect_with(options)
                .await?
        } else {
            SqlitePoolOptions::new().max_connections(8).connect_with(options).await?
        };

        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    async fn migrate(&self) -> Result<(), StoreError> {
        for def in TABLES {
            sqlx::query(&create_table_sql(def)).execute(&self.pool).await?;
            for column in ["hospital_id", "patient_id", "visit_id", "parent_id", "created_at"] {
                let sql = format!(
                    "CREATE INDEX IF NOT EXISTS idx_{table}_{column} ON {table}({column})",
                    table = def.name,
                    column = column
                );
                sqlx::query(&sql).execute(&self.pool).await?;
            }
        }
        tracing::debug!(tables = TABLES.len(), "schema ready");
        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    fn map_write_error<T: Entry>(err: sqlx::Error) -> StoreError {
        if let sqlx::Error::Database(db) = &err {
            if db.is_unique_violation() {
                return StoreError::Duplicate(T::KIND);
            }
            if db.is_foreign_key_violation() {
                return StoreError::InvalidReference(T::KIND);
            }
        }
        StoreError::Database(err)
    }

    pub async fn create<T: Entry>(&self, entry: &T) -> Result<(), StoreError> {
        let index = entry.index();
        let sql = format!(
            "INSERT INTO {} (id, hospital_id, patient_id, visit_id, parent_id, actor_id, status, unique_key, record, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            T::TABLE
        );
        sqlx::query(&sql)
            .bind(entry.id().to_string())
            .bind(opt_id(index.hospital_id))
            .bind(opt_id(index.patient_id))
            .bind(opt_id(index.visit_id))
            .bind(opt_id(index.parent_id))
            .bind(opt_id(index.actor_id))
            .bind(index.status)
            .bind(index.unique_key)
            .bind(serde_json::to_string(entry)?)
            .bind(timestamp(entry.created_at()))
            .bind(timestamp(entry.updated_at()))
            .execute(&self.pool)
            .await
            .map_err(Self::map_write_error::<T>)?;
        Ok(())
    }

    /// Overwrite a record. With a guard, the write only happens if the stored
    /// row still matches, so concurrent writers cannot both win.
    async fn write<T: Entry>(&self, entry: &T, guard: Option<Guard<'_>>) -> Result<(), StoreError> {
        let index = entry.index();
        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(format!("UPDATE {} SET hospital_id = ", T::TABLE));
        qb.push_bind(opt_id(index.hospital_id));
        qb.push(", patient_id = ").push_bind(opt_id(index.patient_id));
        qb.push(", visit_id = ").push_bind(opt_id(index.visit_id));
        qb.push(", parent_id = ").push_bind(opt_id(index.parent_id));
        qb.push(", actor_id = ").push_bind(opt_id(index.actor_id));
        qb.push(", status = ").push_bind(index.status);
        qb.push(", unique_key = ").push_bind(index.unique_key);
        qb.push(", record = ").push_bind(serde_json::to_string(entry)?);
        qb.push(", updated_at = ").push_bind(timestamp(entry.updated_at()));
        qb.push(" WHERE id = ").push_bind(entry.id().to_string());
        match &guard {
            Some(Guard::Status(status)) => {
                qb.push(" AND status = ").push_bind(status.to_string());
            }
            Some(Guard::UpdatedAt(seen)) => {
                qb.push(" AND updated_at = ").push_bind(seen.clone());
            }
            None => {}
        }

        let result = qb
            .build()
            .execute(&self.pool)
            .await
            .map_err(Self::map_write_error::<T>)?;

        if result.rows_affected() == 0 {
            if let Some(guard) = guard {
                if self.find::<T>(entry.id()).await?.is_some() {
                    return Err(StoreError::Conflict(match guard {
                        Guard::Status(status) => format!("{} is no longer {}", T::KIND, status),
                        Guard::UpdatedAt(_) => format!("{} was changed by another request", T::KIND),
                    }));
                }
            }
            return Err(StoreError::NotFound {
                kind: T::KIND,
                id: entry.id().to_string(),
            });
        }
        Ok(())
    }

    pub async fn update<T: Entry>(&self, entry: &T) -> Result<(), StoreError> {
        self.write(entry, None).await
    }

    /// Persist a status change made from `from_status`
    pub async fn update_from_status<T: Entry>(&self, entry: &T, from_status: &str) -> Result<(), StoreError> {
        self.write(entry, Some(Guard::Status(from_status))).await
    }

    /// Persist `entry` only if the stored copy was last written at `seen`
    pub async fn update_unchanged_since<T: Entry>(&self, entry: &T, seen: DateTime<Utc>) -> Result<(), StoreError> {
        self.write(entry, Some(Guard::UpdatedAt(timestamp(seen)))).await
    }

    pub async fn find<T: Entry>(&self, id: Uuid) -> Result<Option<T>, StoreError> {
        let sql = format!("SELECT record FROM {} WHERE id = ?", T::TABLE);
        let row = sqlx::query_as::<_, Stored<T>>(&sql)
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|Stored(entry)| entry))
    }

    pub async fn get<T: Entry>(&self, id: Uuid) -> Result<T, StoreError> {
        self.find(id).await?.ok_or_else(|| StoreError::NotFound {
            kind: T::KIND,
            id: id.to_string(),
        })
    }

    pub async fn find_by_key<T: Entry>(&self, key: &str) -> Result<Option<T>, StoreError> {
        let sql = format!("SELECT record FROM {} WHERE unique_key = ?", T::TABLE);
        let row = sqlx::query_as::<_, Stored<T>>(&sql)
            .bind(key.to_string())
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|Stored(entry)| entry))
    }

    fn push_filter(qb: &mut QueryBuilder<'_, Sqlite>, filter: &Filter) {
        qb.push(" WHERE 1 = 1");
        let columns = [
            ("hospital_id", filter.hospital_id),
            ("patient_id", filter.patient_id),
            ("visit_id", filter.visit_id),
            ("parent_id", filter.parent_id),
            ("actor_id", filter.actor_id),
        ];
        for (column, value) in columns {
            if let Some(id) = value {
                qb.push(format!(" AND {} = ", column)).push_bind(id.to_string());
            }
        }
        if let Some(hospitals) = &filter.hospital_in {
            if hospitals.is_empty() {
                qb.push(" AND 1 = 0");
            } else {
                qb.push(" AND hospital_id IN (");
                let mut separated = qb.separated(", ");
                for id in hospitals {
                    separated.push_bind(id.to_string());
                }
                separated.push_unseparated(")");
            }
        }
        if let Some(status) = &filter.status {
            qb.push(" AND status = ").push_bind(status.clone());
        }
        if let Some(user) = filter.participant {
            qb.push(" AND EXISTS (SELECT 1 FROM json_each(record, '$.participant_ids') WHERE value = ")
                .push_bind(user.to_string())
                .push(")");
        }
    }

    pub async fn count<T: Entry>(&self, filter: &Filter) -> Result<usize, StoreError> {
        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(format!("SELECT COUNT(*) FROM {}", T::TABLE));
        Self::push_filter(&mut qb, filter);
        let total = qb.build_query_scalar::<i64>().fetch_one(&self.pool).await?;
        Ok(total as usize)
    }

    /// Number of records per status value
    pub async fn count_by_status<T: Entry>(&self, filter: &Filter) -> Result<BTreeMap<String, usize>, StoreError> {
        let mut qb: QueryBuilder<Sqlite> =
            QueryBuilder::new(format!("SELECT COALESCE(status, ''), COUNT(*) FROM {}", T::TABLE));
        Self::push_filter(&mut qb, filter);
        qb.push(" GROUP BY status");
        let rows = qb.build_query_as::<(String, i64)>().fetch_all(&self.pool).await?;
        Ok(rows.into_iter().map(|(status, n)| (status, n as usize)).collect())
    }

    /// Newest first
    pub async fn list<T: Entry>(
        &self,
        filter: &Filter,
        pagination: &PaginationInput,
    ) -> Result<PaginatedResult<T>, StoreError> {
        let total = self.count::<T>(filter).await?;
        if total == 0 {
            return Ok(PaginatedResult::empty(pagination));
        }

        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(format!("SELECT record FROM {}", T::TABLE));
        Self::push_filter(&mut qb, filter);
        qb.push(" ORDER BY created_at DESC, id LIMIT ")
            .push_bind(pagination.limit as i64)
            .push(" OFFSET ")
            .push_bind(pagination.offset as i64);

        let rows = qb.build_query_as::<Stored<T>>().fetch_all(&self.pool).await?;
        let items = rows.into_iter().map(|Stored(entry)| entry).collect();
        Ok(PaginatedResult::new(items, total, pagination))
    }

    /// Every matching record, newest first
    pub async fn list_all<T: Entry>(&self, filter: &Filter) -> Result<Vec<T>, StoreError> {
        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(format!("SELECT record FROM {}", T::TABLE));
        Self::push_filter(&mut qb, filter);
        qb.push(" ORDER BY created_at DESC, id");
        let rows = qb.build_query_as::<Stored<T>>().fetch_all(&self.pool).await?;
        Ok(rows.into_iter().map(|Stored(entry)| entry).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use hass_integrity::{Hospital, Region};

    async fn memory_store() -> Store {
        Store::connect("sqlite::memory:").await.unwrap()
    }

    fn hospital(code: &str, region_id: Option<Uuid>) -> Hospital {
        let now = Utc::now();
        Hospital {
            id: Uuid::new_v4(),
            name: format!("Hospital {}", code),
            code: code.to_string(),
            region_id,
            address: None,
            phone: None,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn test_create_and_get() {
        let store = memory_store().await;
        let h = hospital("GH", None);
        store.create(&h).await.unwrap();
        let loaded: Hospital = store.get(h.id).await.unwrap();
        assert_eq!(loaded, h);
        assert!(store.find::<Hospital>(Uuid::new_v4()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_unique_key_is_enforced() {
        let store = memory_store().await;
        store.create(&hospital("GH", None)).await.unwrap();
        let err = store.create(&hospital("GH", None)).await.unwrap_err();
        assert!(matches!(err, StoreError::Duplicate("Hospital")));
    }

    #[tokio::test]
    async fn test_missing_reference_rejected() {
        let store = memory_store().await;
        let err = store.create(&hospital("GH", Some(Uuid::new_v4()))).await.unwrap_err();
        assert!(matches!(err, StoreError::InvalidReference(_)));
    }

    #[tokio::test]
    async fn test_stale_copy_cannot_overwrite() {
        let store = memory_store().await;
        let original = hospital("GH", None);
        store.create(&original).await.unwrap();

        let mut first = original.clone();
        first.is_active = false;
        first.updated_at = original.updated_at + Duration::seconds(1);
        store.update_unchanged_since(&first, original.updated_at).await.unwrap();

        let mut stale = original.clone();
        stale.phone = Some("555-0100".to_string());
        stale.updated_at = original.updated_at + Duration::seconds(2);
        let err = store.update_unchanged_since(&stale, original.updated_at).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));

        let loaded: Hospital = store.get(original.id).await.unwrap();
        assert!(!loaded.is_active);
        assert_eq!(loaded.phone, None);
    }

    #[tokio::test]
    async fn test_list_newest_first_with_total() {
        let store = memory_store().await;
        let now = Utc::now();
        for i in 0..3 {
            let mut h = hospital(&format!("H{}", i), None);
            h.created_at = now + Duration::seconds(i);
            store.create(&h).await.unwrap();
        }
        let page = store
            .list::<Hospital>(&Filter::default(), &PaginationInput { offset: 0, limit: 2 })
            .await
            .unwrap();
        assert_eq!(page.total, 3);
        assert!(page.has_more);
        assert_eq!(page.items[0].code, "H2");
    }

    #[tokio::test]
    async fn test_parent_filter() {
        let store = memory_store().await;
        let now = Utc::now();
        let region = Region {
            id: Uuid::new_v4(),
            name: "North".to_string(),
            code: "NORTH".to_string(),
            created_at: now,
            updated_at: now,
        };
        store.create(&region).await.unwrap();
        store.create(&hospital("A", Some(region.id))).await.unwrap();
        store.create(&hospital("B", None)).await.unwrap();

        let filter = Filter {
            parent_id: Some(region.id),
            ..Default::default()
        };
        let in_region = store.list_all::<Hospital>(&filter).await.unwrap();
        assert_eq!(in_region.len(), 1);
        assert_eq!(in_region[0].code, "A");
    }

    #[tokio::test]
    async fn test_empty_hospital_scope_matches_nothing() {
        let store = memory_store().await;
        store.create(&hospital("GH", None)).await.unwrap();
        let filter = Filter {
            hospital_in: Some(vec![]),
            ..Default::default()
        };
        assert_eq!(store.count::<Hospital>(&filter).await.unwrap(), 0);
    }
}
