use anyhow::{Context, Result};
use rusqlite::{params, Connection, OptionalExtension};

use crate::db::{
    connection::Database,
    helpers::row_to_night,
    models::{NightId, SleepNight},
};

const NIGHT_COLUMNS: &str = "night_id, start_time_milli, end_time_milli, quality_rating";

pub(crate) fn load_all_nights(conn: &Connection) -> Result<Vec<SleepNight>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {NIGHT_COLUMNS} FROM sleep_nights ORDER BY night_id DESC"
    ))?;

    let mut rows = stmt.query([])?;
    let mut nights = Vec::new();
    while let Some(row) = rows.next()? {
        nights.push(row_to_night(row)?);
    }

    Ok(nights)
}

impl Database {
    /// Inserts `night` and returns the id the table assigned. Any id already on
    /// the record is ignored.
    pub async fn insert_night(&self, night: &SleepNight) -> Result<NightId> {
        let record = night.clone();
        self.execute_mutation(move |conn| {
            conn.execute(
                "INSERT INTO sleep_nights (start_time_milli, end_time_milli, quality_rating)
                 VALUES (?1, ?2, ?3)",
                params![record.start_time_ms, record.end_time_ms, record.quality],
            )
            .with_context(|| "failed to insert night")?;
            Ok(NightId(conn.last_insert_rowid()))
        })
        .await
    }

    /// Writes every field of `night` back to its row. Updating a missing row
    /// is not an error.
    pub async fn update_night(&self, night: &SleepNight) -> Result<()> {
        let record = night.clone();
        self.execute_mutation(move |conn| {
            conn.execute(
                "UPDATE sleep_nights
                 SET start_time_milli = ?1,
                     end_time_milli = ?2,
                     quality_rating = ?3
                 WHERE night_id = ?4",
                params![
                    record.start_time_ms,
                    record.end_time_ms,
                    record.quality,
                    record.id.0,
                ],
            )
            .with_context(|| format!("failed to update night {}", record.id))?;
            Ok(())
        })
        .await
    }

    pub async fn get_night(&self, night_id: NightId) -> Result<Option<SleepNight>> {
        self.execute(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {NIGHT_COLUMNS} FROM sleep_nights WHERE night_id = ?1"
            ))?;

            let night = stmt
                .query_row(params![night_id.0], |row| Ok(row_to_night(row)))
                .optional()?
                .transpose()?;
            Ok(night)
        })
        .await
    }

    /// Most recently inserted night, open or not.
    pub async fn get_tonight(&self) -> Result<Option<SleepNight>> {
        self.execute(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {NIGHT_COLUMNS} FROM sleep_nights ORDER BY night_id DESC LIMIT 1"
            ))?;

            let mut rows = stmt.query([])?;
            let night = match rows.next()? {
                Some(row) => Some(row_to_night(row)?),
                None => None,
            };
            Ok(night)
        })
        .await
    }

    pub async fn get_all_nights(&self) -> Result<Vec<SleepNight>> {
        self.execute(|conn| load_all_nights(conn)).await
    }

    /// Deletes every night. The id sequence is not reset, so ids are never reused.
    pub async fn clear_nights(&self) -> Result<()> {
        self.execute_mutation(|conn| {
            conn.execute("DELETE FROM sleep_nights", [])
                .with_context(|| "failed to clear nights")?;
            Ok(())
        })
        .await
    }
}
