// svetlana-core/src/repositories/sqlite/follows.rs
//
// The follow registry, stored in the `follows` table. One row per
// (channel_id, game_id); the UNIQUE constraint on that pair is what keeps
// duplicate follows out, even with several writers.
//
// Discord snowflakes and WebDiplomacy ids are u64 in the domain but SQLite
// only has signed 64-bit integers, so ids are checked on the way in and out.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Pool, Row, Sqlite};
use tracing::{debug, info};

use svetlana_common::error::Error;
use svetlana_common::models::{FollowKey, FollowRecord, GamePhase};
use svetlana_common::traits::repository_traits::FollowRepository;

#[derive(Clone)]
pub struct SqliteFollowRepository {
    pool: Pool<Sqlite>,
}

impl SqliteFollowRepository {
    pub fn new(pool: Pool<Sqlite>) -> Self {
        Self { pool }
    }
}

fn to_db_id(id: u64) -> Result<i64, Error> {
    i64::try_from(id).map_err(|_| Error::MalformedIdentifier(id.to_string()))
}

fn from_db_id(id: i64) -> Result<u64, Error> {
    u64::try_from(id).map_err(|_| Error::Parse(format!("negative id {id} in follows table")))
}

fn row_to_record(r: &SqliteRow) -> Result<FollowRecord, Error> {
    let phase_json: Option<String> = r.try_get("last_notified_phase")?;
    let last_notified_phase = match phase_json {
        Some(json) => Some(serde_json::from_str::<GamePhase>(&json)?),
        None => None,
    };
    Ok(FollowRecord {
        channel_id:          from_db_id(r.try_get("channel_id")?)?,
        game_id:             from_db_id(r.try_get("game_id")?)?,
        last_notified_phase,
        created_at:          r.try_get::<DateTime<Utc>, _>("created_at")?,
        updated_at:          r.try_get::<DateTime<Utc>, _>("updated_at")?,
    })
}

#[async_trait]
impl FollowRepository for SqliteFollowRepository {
    async fn follow(&self, channel_id: u64, game_id: u64) -> Result<(), Error> {
        let now = Utc::now();
        let q = r#"
            INSERT INTO follows (channel_id, game_id, last_notified_phase, created_at, updated_at)
            VALUES (?, ?, NULL, ?, ?)
            ON CONFLICT (channel_id, game_id) DO NOTHING
        "#;
        let result = sqlx::query(q)
            .bind(to_db_id(channel_id)?)
            .bind(to_db_id(game_id)?)
            .bind(now)
            .bind(now)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(Error::AlreadyFollowing { channel_id, game_id });
        }
        info!("Channel {} now follows game {}", channel_id, game_id);
        Ok(())
    }

    async fn unfollow(&self, channel_id: u64, game_id: u64) -> Result<(), Error> {
        let q = r#"
            DELETE FROM follows
            WHERE channel_id = ?
              AND game_id = ?
        "#;
        let result = sqlx::query(q)
            .bind(to_db_id(channel_id)?)
            .bind(to_db_id(game_id)?)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(Error::NotFollowing { channel_id, game_id });
        }
        info!("Channel {} unfollowed game {}", channel_id, game_id);
        Ok(())
    }

    async fn list(&self, channel_id: u64) -> Result<Vec<u64>, Error> {
        let q = r#"
            SELECT game_id
            FROM follows
            WHERE channel_id = ?
            ORDER BY follow_id
        "#;
        let rows = sqlx::query(q)
            .bind(to_db_id(channel_id)?)
            .fetch_all(&self.pool)
            .await?;

        let mut out = Vec::with_capacity(rows.len());
        for r in rows {
            out.push(from_db_id(r.try_get("game_id")?)?);
        }
        Ok(out)
    }

    async fn list_all(&self) -> Result<Vec<FollowKey>, Error> {
        let q = r#"
            SELECT channel_id, game_id
            FROM follows
            ORDER BY follow_id
        "#;
        let rows = sqlx::query(q).fetch_all(&self.pool).await?;

        let mut out = Vec::with_capacity(rows.len());
        for r in rows {
            out.push(FollowKey {
                channel_id: from_db_id(r.try_get("channel_id")?)?,
                game_id:    from_db_id(r.try_get("game_id")?)?,
            });
        }
        Ok(out)
    }

    async fn get(&self, channel_id: u64, game_id: u64) -> Result<Option<FollowRecord>, Error> {
        let q = r#"
            SELECT channel_id, game_id, last_notified_phase, created_at, updated_at
            FROM follows
            WHERE channel_id = ?
              AND game_id = ?
        "#;
        let row_opt = sqlx::query(q)
            .bind(to_db_id(channel_id)?)
            .bind(to_db_id(game_id)?)
            .fetch_optional(&self.pool)
            .await?;

        match row_opt {
            Some(r) => Ok(Some(row_to_record(&r)?)),
            None => Ok(None),
        }
    }

    async fn update_last_notified(
        &self,
        channel_id: u64,
        game_id: u64,
        phase: &GamePhase,
    ) -> Result<bool, Error> {
        let q = r#"
            UPDATE follows
            SET last_notified_phase = ?,
                updated_at = ?
            WHERE channel_id = ?
              AND game_id = ?
        "#;
        let result = sqlx::query(q)
            .bind(serde_json::to_string(phase)?)
            .bind(Utc::now())
            .bind(to_db_id(channel_id)?)
            .bind(to_db_id(game_id)?)
            .execute(&self.pool)
            .await?;

        let updated = result.rows_affected() > 0;
        if !updated {
            debug!(
                "Dropping phase update for channel {} game {}: no longer followed",
                channel_id, game_id
            );
        }
        Ok(updated)
    }
}
