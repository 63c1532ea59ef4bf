use std::convert::TryFrom;

use anyhow::{anyhow, Result};
use rusqlite::Row;

use crate::db::models::{NightId, SleepNight, QUALITY_MAX, QUALITY_UNRATED};

pub fn to_i32(value: i64, field: &str) -> Result<i32> {
    i32::try_from(value).map_err(|_| anyhow!("{field} value {value} is out of range"))
}

pub fn parse_quality(value: i64) -> Result<i32> {
    let quality = to_i32(value, "quality_rating")?;
    if quality == QUALITY_UNRATED || (0..=QUALITY_MAX).contains(&quality) {
        Ok(quality)
    } else {
        Err(anyhow!("unknown quality rating {quality}"))
    }
}

pub fn row_to_night(row: &Row) -> Result<SleepNight> {
    let quality: i64 = row.get("quality_rating")?;

    Ok(SleepNight {
        id: NightId(row.get("night_id")?),
        start_time_ms: row.get("start_time_milli")?,
        end_time_ms: row.get("end_time_milli")?,
        quality: parse_quality(quality)?,
    })
}
