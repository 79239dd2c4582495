use chrono::{DateTime, Utc};
use sea_query::{Expr, Iden, OnConflict, PostgresQueryBuilder, Query, SimpleExpr, Value};
use sea_query_binder::SqlxBinder;
use serde::Deserialize;
use sqlx::pool::PoolConnection;
use sqlx::postgres::PgPoolOptions;
use sqlx::types::Json;
use sqlx::{PgConnection, Pool, Postgres};

use resumable_core::{CompletedPart, Fingerprint, SessionRecord, UploadState};

use super::errors::{Error, Result};

#[derive(Clone, Deserialize)]
pub struct PostgresConfig {
    connection_string: String,
    #[serde(default = "default_max_connections")]
    max_connections: u32,
}

fn default_max_connections() -> u32 {
    10
}

impl PostgresConfig {
    /// Connect and bring the schema up to date.
    pub async fn new_metadata(&self) -> Result<PostgresMetadataPool> {
        let pool = PgPoolOptions::new()
            .max_connections(self.max_connections)
            .connect(&self.connection_string)
            .await?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(PostgresMetadataPool { pool })
    }
}

#[derive(Clone)]
pub struct PostgresMetadataPool {
    pool: Pool<Postgres>,
}

impl PostgresMetadataPool {
    pub async fn get_conn(&self) -> Result<PostgresMetadataConn> {
        Ok(PostgresMetadataConn {
            conn: self.pool.acquire().await?,
        })
    }
}

pub struct PostgresMetadataConn {
    conn: PoolConnection<Postgres>,
}

impl PostgresMetadataConn {
    pub async fn get_by_fingerprint(&mut self, fingerprint: &str) -> Result<Option<UploadSessionRow>> {
        Queries::get_session(&mut self.conn, UploadSessions::Fingerprint, fingerprint).await
    }

    pub async fn get_by_session_id(&mut self, session_id: &str) -> Result<Option<UploadSessionRow>> {
        Queries::get_session(&mut self.conn, UploadSessions::SessionId, session_id).await
    }

    pub async fn upsert_session(&mut self, record: &SessionRecord) -> Result<UploadSessionRow> {
        Queries::upsert_session(&mut self.conn, record).await
    }

    pub async fn compare_and_swap(&mut self, record: &SessionRecord) -> Result<UploadSessionRow> {
        Queries::compare_and_swap(&mut self.conn, record).await
    }
}

#[derive(Iden)]
pub enum UploadSessions {
    Table,
    SessionId,
    Fingerprint,
    UploadState,
    StoreUploadId,
    TotalParts,
    SizeBytes,
    FileName,
    CompletedParts,
    Version,
    CreatedAt,
}

const COLUMNS: [UploadSessions; 10] = [
    UploadSessions::SessionId,
    UploadSessions::Fingerprint,
    UploadSessions::UploadState,
    UploadSessions::StoreUploadId,
    UploadSessions::TotalParts,
    UploadSessions::SizeBytes,
    UploadSessions::FileName,
    UploadSessions::CompletedParts,
    UploadSessions::Version,
    UploadSessions::CreatedAt,
];

#[derive(Debug, sqlx::FromRow)]
pub struct UploadSessionRow {
    pub session_id: String,
    pub fingerprint: String,
    pub upload_state: i16,
    pub store_upload_id: String,
    pub total_parts: i32,
    pub size_bytes: i64,
    pub file_name: String,
    pub completed_parts: Json<Vec<CompletedPart>>,
    pub version: i64,
    pub created_at: DateTime<Utc>,
}

/// Convert between a record's unsigned fields and their signed columns.
fn column<T, U>(name: &'static str, value: T) -> Result<U>
where
    T: Copy + Into<i128>,
    U: TryFrom<T>,
{
    U::try_from(value).map_err(|_| Error::ColumnOutOfRange(name, value.into()))
}

impl TryFrom<UploadSessionRow> for SessionRecord {
    type Error = resumable_core::Error;

    fn try_from(row: UploadSessionRow) -> resumable_core::Result<Self> {
        let total_parts: u32 = column("total_parts", row.total_parts)?;
        let size_bytes: u64 = column("size_bytes", row.size_bytes)?;
        Ok(SessionRecord {
            session_id: row.session_id,
            fingerprint: Fingerprint::try_from(row.fingerprint.as_str())?,
            upload_state: UploadState::try_from(row.upload_state)?,
            store_upload_id: row.store_upload_id,
            total_parts,
            size_bytes,
            file_name: row.file_name,
            completed_parts: row.completed_parts.0,
            version: row.version,
            created_at: row.created_at,
        })
    }
}

fn value<V: Into<Value>>(v: V) -> SimpleExpr {
    SimpleExpr::Value(v.into())
}

// Queries only need a `&mut PgConnection`; callers decide where it comes from.
struct Queries {}

impl Queries {
    async fn get_session(
        executor: &mut PgConnection,
        by: UploadSessions,
        key: &str,
    ) -> Result<Option<UploadSessionRow>> {
        let (sql, values) = Query::select()
            .from(UploadSessions::Table)
            .columns(COLUMNS)
            .and_where(Expr::col(by).eq(key))
            .build_sqlx(PostgresQueryBuilder);

        Ok(sqlx::query_as_with::<_, UploadSessionRow, _>(&sql, values)
            .fetch_optional(executor)
            .await?)
    }

    /// Insert a fresh attempt, or overwrite every field of the attempt already recorded for the
    /// fingerprint while moving its version forward.
    async fn upsert_session(
        executor: &mut PgConnection,
        record: &SessionRecord,
    ) -> Result<UploadSessionRow> {
        let total_parts: i32 = column("total_parts", record.total_parts)?;
        let size_bytes: i64 = column("size_bytes", record.size_bytes)?;

        let (sql, values) = Query::insert()
            .into_table(UploadSessions::Table)
            .columns(COLUMNS)
            .values([
                value(record.session_id.clone()),
                value(String::from(record.fingerprint.clone())),
                value(i16::from(record.upload_state)),
                value(record.store_upload_id.clone()),
                value(total_parts),
                value(size_bytes),
                value(record.file_name.clone()),
                value(serde_json::to_value(&record.completed_parts)?),
                value(record.version + 1),
                value(record.created_at),
            ])?
            .on_conflict(
                OnConflict::column(UploadSessions::Fingerprint)
                    .update_columns([
                        UploadSessions::UploadState,
                        UploadSessions::StoreUploadId,
                        UploadSessions::TotalParts,
                        UploadSessions::SizeBytes,
                        UploadSessions::FileName,
                        UploadSessions::CompletedParts,
                        UploadSessions::CreatedAt,
                    ])
                    .value(
                        UploadSessions::Version,
                        Expr::col((UploadSessions::Table, UploadSessions::Version)).add(1),
                    )
                    .to_owned(),
            )
            .returning(Query::returning().columns(COLUMNS))
            .build_sqlx(PostgresQueryBuilder);

        Ok(sqlx::query_as_with::<_, UploadSessionRow, _>(&sql, values)
            .fetch_one(executor)
            .await?)
    }

    /// Merge the mutable fields if and only if the stored version is the one the caller read.
    async fn compare_and_swap(
        executor: &mut PgConnection,
        record: &SessionRecord,
    ) -> Result<UploadSessionRow> {
        let (sql, values) = Query::update()
            .table(UploadSessions::Table)
            .values([
                (
                    UploadSessions::UploadState,
                    value(i16::from(record.upload_state)),
                ),
                (
                    UploadSessions::CompletedParts,
                    value(serde_json::to_value(&record.completed_parts)?),
                ),
                (
                    UploadSessions::Version,
                    Expr::col(UploadSessions::Version).add(1),
                ),
            ])
            .and_where(Expr::col(UploadSessions::SessionId).eq(record.session_id.as_str()))
            .and_where(Expr::col(UploadSessions::Version).eq(record.version))
            .returning(Query::returning().columns(COLUMNS))
            .build_sqlx(PostgresQueryBuilder);

        sqlx::query_as_with::<_, UploadSessionRow, _>(&sql, values)
            .fetch_optional(executor)
            .await?
            .ok_or_else(|| Error::StaleVersion(record.session_id.clone()))
    }
}
