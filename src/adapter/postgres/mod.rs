//! Postgres `FeedStore` adapter.
//!
//! All queries are runtime-bound; each method is one statement (or one
//! short transaction) so every write stays independently retryable.

use crate::domain::{FeedEntry, FeedState, ListVariant, ObjectKind, ObjectRef};
use crate::port::FeedStore;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::Row;
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS feed_entries (
    obj_kind        TEXT        NOT NULL,
    obj_id          BIGINT      NOT NULL,
    title           TEXT        NOT NULL,
    author_uid      BIGINT      NOT NULL,
    author_is_admin BOOLEAN     NOT NULL DEFAULT FALSE,
    category_id     BIGINT      NOT NULL DEFAULT 0,
    tags            TEXT        NOT NULL DEFAULT '',
    comment_count   BIGINT      NOT NULL DEFAULT 0,
    like_count      BIGINT      NOT NULL DEFAULT 0,
    last_reply_uid  BIGINT,
    last_reply_at   TIMESTAMPTZ,
    pinned          BOOLEAN     NOT NULL DEFAULT FALSE,
    pinned_at       TIMESTAMPTZ,
    score           BIGINT      NOT NULL DEFAULT 0,
    state           SMALLINT    NOT NULL DEFAULT 0,
    updated_at      TIMESTAMPTZ NOT NULL,
    last_engaged_at TIMESTAMPTZ,
    created_at      TIMESTAMPTZ NOT NULL,
    PRIMARY KEY (obj_kind, obj_id)
);
CREATE INDEX IF NOT EXISTS feed_entries_score_idx
    ON feed_entries (score DESC, updated_at DESC);
CREATE INDEX IF NOT EXISTS feed_entries_updated_idx
    ON feed_entries (updated_at DESC);
"#;

const STATE_ONLINE: i16 = 0;
const STATE_OFFLINE: i16 = 1;

const ENTRY_COLUMNS: &str = "obj_kind, obj_id, title, author_uid, author_is_admin, category_id, \
     tags, comment_count, like_count, last_reply_uid, last_reply_at, pinned, pinned_at, score, \
     state, updated_at, last_engaged_at, created_at";

pub struct PgFeedStore {
    pool: PgPool,
}

impl PgFeedStore {
    /// Build a store over a lazily-connected pool; no I/O happens until the
    /// first query.
    pub fn connect_lazy(dsn: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect_lazy(dsn)
            .context("invalid postgres dsn")?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Create the feed tables when missing. Safe to run on every boot.
    pub async fn ensure_schema(&self) -> Result<()> {
        let mut statements: Vec<String> = SCHEMA
            .split(';')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect();
        for kind in [
            ObjectKind::Topic,
            ObjectKind::Article,
            ObjectKind::Resource,
            ObjectKind::Project,
            ObjectKind::Wiki,
            ObjectKind::Book,
        ] {
            statements.push(format!(
                "CREATE TABLE IF NOT EXISTS {} (obj_id BIGINT PRIMARY KEY, \
                 views BIGINT NOT NULL DEFAULT 0, engaged_at TIMESTAMPTZ)",
                kind.stats_table()
            ));
        }
        for statement in statements {
            sqlx::query(&statement)
                .execute(&self.pool)
                .await
                .with_context(|| format!("schema statement failed: {statement}"))?;
        }
        Ok(())
    }
}

fn state_to_sql(state: FeedState) -> i16 {
    match state {
        FeedState::Online => STATE_ONLINE,
        FeedState::Offline => STATE_OFFLINE,
    }
}

fn entry_from_row(row: &PgRow) -> Result<FeedEntry> {
    let kind_raw: String = row.try_get("obj_kind")?;
    let kind = ObjectKind::parse(&kind_raw)
        .with_context(|| format!("unknown object kind in store: {kind_raw}"))?;
    let state_raw: i16 = row.try_get("state")?;
    Ok(FeedEntry {
        object: ObjectRef::new(kind, row.try_get("obj_id")?),
        title: row.try_get("title")?,
        author_uid: row.try_get("author_uid")?,
        author_is_admin: row.try_get("author_is_admin")?,
        category_id: row.try_get("category_id")?,
        tags: row.try_get("tags")?,
        comment_count: row.try_get("comment_count")?,
        like_count: row.try_get("like_count")?,
        last_reply_uid: row.try_get("last_reply_uid")?,
        last_reply_at: row.try_get("last_reply_at")?,
        pinned: row.try_get("pinned")?,
        pinned_at: row.try_get("pinned_at")?,
        score: row.try_get("score")?,
        state: if state_raw == STATE_ONLINE {
            FeedState::Online
        } else {
            FeedState::Offline
        },
        updated_at: row.try_get("updated_at")?,
        last_engaged_at: row.try_get("last_engaged_at")?,
        created_at: row.try_get("created_at")?,
    })
}

#[async_trait]
impl FeedStore for PgFeedStore {
    async fn insert_entry(&self, entry: &FeedEntry) -> Result<()> {
        let sql = format!(
            "INSERT INTO feed_entries ({ENTRY_COLUMNS}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18) \
             ON CONFLICT (obj_kind, obj_id) DO UPDATE SET \
               title = EXCLUDED.title, category_id = EXCLUDED.category_id, \
               tags = EXCLUDED.tags, updated_at = EXCLUDED.updated_at"
        );
        sqlx::query(&sql)
            .bind(entry.object.kind.as_str())
            .bind(entry.object.id)
            .bind(&entry.title)
            .bind(entry.author_uid)
            .bind(entry.author_is_admin)
            .bind(entry.category_id)
            .bind(&entry.tags)
            .bind(entry.comment_count)
            .bind(entry.like_count)
            .bind(entry.last_reply_uid)
            .bind(entry.last_reply_at)
            .bind(entry.pinned)
            .bind(entry.pinned_at)
            .bind(entry.score)
            .bind(state_to_sql(entry.state))
            .bind(entry.updated_at)
            .bind(entry.last_engaged_at)
            .bind(entry.created_at)
            .execute(&self.pool)
            .await
            .context("failed to insert feed entry")?;
        Ok(())
    }

    async fn get_entry(&self, object: ObjectRef) -> Result<Option<FeedEntry>> {
        let sql = format!(
            "SELECT {ENTRY_COLUMNS} FROM feed_entries WHERE obj_kind = $1 AND obj_id = $2"
        );
        let row = sqlx::query(&sql)
            .bind(object.kind.as_str())
            .bind(object.id)
            .fetch_optional(&self.pool)
            .await
            .context("failed to fetch feed entry")?;
        row.as_ref().map(entry_from_row).transpose()
    }

    async fn list_page(
        &self,
        variant: ListVariant,
        offset: i64,
        limit: i64,
    ) -> Result<Vec<FeedEntry>> {
        let (filter, order) = match variant {
            ListVariant::Default => ("NOT pinned", "updated_at DESC"),
            ListVariant::Recommended => ("NOT pinned", "score DESC, updated_at DESC"),
            ListVariant::Pinned => ("pinned", "pinned_at DESC"),
        };
        let sql = format!(
            "SELECT {ENTRY_COLUMNS} FROM feed_entries \
             WHERE state = $1 AND {filter} ORDER BY {order} OFFSET $2 LIMIT $3"
        );
        let rows = sqlx::query(&sql)
            .bind(STATE_ONLINE)
            .bind(offset)
            .bind(limit)
            .fetch_all(&self.pool)
            .await
            .context("failed to list feed page")?;
        rows.iter().map(entry_from_row).collect()
    }

    async fn count_online(&self) -> Result<i64> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM feed_entries WHERE state = $1")
            .bind(STATE_ONLINE)
            .fetch_one(&self.pool)
            .await
            .context("failed to count online entries")?;
        Ok(row.try_get("n")?)
    }

    async fn list_ranked(&self, offset: i64, limit: i64) -> Result<Vec<FeedEntry>> {
        let sql = format!(
            "SELECT {ENTRY_COLUMNS} FROM feed_entries \
             WHERE state = $1 AND NOT pinned AND score > 0 \
             ORDER BY obj_kind, obj_id OFFSET $2 LIMIT $3"
        );
        let rows = sqlx::query(&sql)
            .bind(STATE_ONLINE)
            .bind(offset)
            .bind(limit)
            .fetch_all(&self.pool)
            .await
            .context("failed to list ranked entries")?;
        rows.iter().map(entry_from_row).collect()
    }

    async fn list_pinned_before(&self, cutoff: DateTime<Utc>) -> Result<Vec<ObjectRef>> {
        let rows = sqlx::query(
            "SELECT obj_kind, obj_id FROM feed_entries WHERE pinned AND pinned_at < $1",
        )
        .bind(cutoff)
        .fetch_all(&self.pool)
        .await
        .context("failed to list expired pins")?;
        rows.iter()
            .map(|row| {
                let kind_raw: String = row.try_get("obj_kind")?;
                let kind = ObjectKind::parse(&kind_raw)
                    .with_context(|| format!("unknown object kind in store: {kind_raw}"))?;
                Ok(ObjectRef::new(kind, row.try_get("obj_id")?))
            })
            .collect()
    }

    async fn incr_object_views(
        &self,
        object: ObjectRef,
        delta: i64,
        at: DateTime<Utc>,
    ) -> Result<()> {
        let table = object.kind.stats_table();
        let sql = format!(
            "INSERT INTO {table} (obj_id, views, engaged_at) VALUES ($1, $2, $3) \
             ON CONFLICT (obj_id) DO UPDATE SET \
               views = {table}.views + EXCLUDED.views, engaged_at = EXCLUDED.engaged_at"
        );
        sqlx::query(&sql)
            .bind(object.id)
            .bind(delta)
            .bind(at)
            .execute(&self.pool)
            .await
            .with_context(|| format!("failed to add view delta for {object}"))?;

        sqlx::query(
            "UPDATE feed_entries SET last_engaged_at = $3 WHERE obj_kind = $1 AND obj_id = $2",
        )
        .bind(object.kind.as_str())
        .bind(object.id)
        .bind(at)
        .execute(&self.pool)
        .await
        .with_context(|| format!("failed to mark {object} engaged"))?;
        Ok(())
    }

    async fn object_views(&self, object: ObjectRef) -> Result<i64> {
        let sql = format!(
            "SELECT views FROM {} WHERE obj_id = $1",
            object.kind.stats_table()
        );
        let row = sqlx::query(&sql)
            .bind(object.id)
            .fetch_optional(&self.pool)
            .await
            .with_context(|| format!("failed to read views for {object}"))?;
        Ok(row.map(|r| r.try_get("views")).transpose()?.unwrap_or(0))
    }

    async fn apply_comment(
        &self,
        object: ObjectRef,
        commenter_uid: i64,
        at: DateTime<Utc>,
    ) -> Result<()> {
        sqlx::query(
            "UPDATE feed_entries SET comment_count = comment_count + 1, \
               last_reply_uid = $3, last_reply_at = $4, updated_at = $4 \
             WHERE obj_kind = $1 AND obj_id = $2",
        )
        .bind(object.kind.as_str())
        .bind(object.id)
        .bind(commenter_uid)
        .bind(at)
        .execute(&self.pool)
        .await
        .with_context(|| format!("failed to apply comment to {object}"))?;
        Ok(())
    }

    async fn apply_like(&self, object: ObjectRef, delta: i64, at: DateTime<Utc>) -> Result<()> {
        sqlx::query(
            "UPDATE feed_entries SET like_count = like_count + $3, last_engaged_at = $4 \
             WHERE obj_kind = $1 AND obj_id = $2",
        )
        .bind(object.kind.as_str())
        .bind(object.id)
        .bind(delta)
        .bind(at)
        .execute(&self.pool)
        .await
        .with_context(|| format!("failed to apply like delta to {object}"))?;
        Ok(())
    }

    async fn set_score(&self, object: ObjectRef, score: i64) -> Result<()> {
        sqlx::query("UPDATE feed_entries SET score = $3 WHERE obj_kind = $1 AND obj_id = $2")
            .bind(object.kind.as_str())
            .bind(object.id)
            .bind(score)
            .execute(&self.pool)
            .await
            .with_context(|| format!("failed to write score for {object}"))?;
        Ok(())
    }

    async fn set_pinned(
        &self,
        object: ObjectRef,
        pinned: bool,
        at: Option<DateTime<Utc>>,
    ) -> Result<()> {
        sqlx::query(
            "UPDATE feed_entries SET pinned = $3, pinned_at = $4 \
             WHERE obj_kind = $1 AND obj_id = $2",
        )
        .bind(object.kind.as_str())
        .bind(object.id)
        .bind(pinned)
        .bind(at)
        .execute(&self.pool)
        .await
        .with_context(|| format!("failed to set pin state for {object}"))?;
        Ok(())
    }

    async fn set_state(&self, object: ObjectRef, state: FeedState) -> Result<()> {
        sqlx::query("UPDATE feed_entries SET state = $3 WHERE obj_kind = $1 AND obj_id = $2")
            .bind(object.kind.as_str())
            .bind(object.id)
            .bind(state_to_sql(state))
            .execute(&self.pool)
            .await
            .with_context(|| format!("failed to set state for {object}"))?;
        Ok(())
    }

    async fn set_category(
        &self,
        object: ObjectRef,
        category_id: i64,
        state: Option<FeedState>,
    ) -> Result<()> {
        match state {
            Some(state) => {
                sqlx::query(
                    "UPDATE feed_entries SET category_id = $3, state = $4 \
                     WHERE obj_kind = $1 AND obj_id = $2",
                )
                .bind(object.kind.as_str())
                .bind(object.id)
                .bind(category_id)
                .bind(state_to_sql(state))
                .execute(&self.pool)
                .await
            }
            None => {
                sqlx::query(
                    "UPDATE feed_entries SET category_id = $3 \
                     WHERE obj_kind = $1 AND obj_id = $2",
                )
                .bind(object.kind.as_str())
                .bind(object.id)
                .bind(category_id)
                .execute(&self.pool)
                .await
            }
        }
        .with_context(|| format!("failed to reassign category for {object}"))?;
        Ok(())
    }
}
