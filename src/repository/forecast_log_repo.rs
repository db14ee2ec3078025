// ==========================================
// 影院经营决策系统 - 预测日志与校正系数仓储
// ==========================================
// 用途: 场次级预测落日志 → 开映后回填实际售票 → 复盘
// 校正系数只做持久化（开环），不在预测链路中自动套用
// ==========================================

use crate::domain::forecast::{CorrectionRecord, ForecastLogEntry, ShowForecast};
use crate::repository::error::{parse_date_column, RepositoryError, RepositoryResult};
use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::sync::{Arc, Mutex};

const LOG_SELECT: &str = r#"
    SELECT log_id, run_id, show_id, movie_id, show_date, forecast_demand, actual_bookings
    FROM forecast_log
"#;

fn map_entry(row: &Row<'_>) -> rusqlite::Result<(ForecastLogEntryRaw, String)> {
    Ok((
        ForecastLogEntryRaw {
            log_id: row.get(0)?,
            run_id: row.get(1)?,
            show_id: row.get(2)?,
            movie_id: row.get(3)?,
            forecast_demand: row.get(5)?,
            actual_bookings: row.get::<_, Option<i64>>(6)?,
        },
        row.get(4)?,
    ))
}

struct ForecastLogEntryRaw {
    log_id: i64,
    run_id: String,
    show_id: String,
    movie_id: String,
    forecast_demand: f64,
    actual_bookings: Option<i64>,
}

fn into_entry((raw, date): (ForecastLogEntryRaw, String)) -> RepositoryResult<ForecastLogEntry> {
    Ok(ForecastLogEntry {
        log_id: raw.log_id,
        run_id: raw.run_id,
        show_id: raw.show_id,
        movie_id: raw.movie_id,
        show_date: parse_date_column(&date, "forecast_log.show_date")?,
        forecast_demand: raw.forecast_demand,
        actual_bookings: raw.actual_bookings.map(|v| v.max(0) as u32),
    })
}

// ==========================================
// ForecastLogRepository - 预测日志仓储
// ==========================================
pub struct ForecastLogRepository {
    conn: Arc<Mutex<Connection>>,
}

impl ForecastLogRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 批量写入场次级预测
    ///
    /// 同一场次只保留最新一次预测: 写入前先删除该场次尚未回填的旧日志
    pub fn insert_show_forecasts(
        &self,
        run_id: &str,
        forecasts: &[ShowForecast],
    ) -> RepositoryResult<usize> {
        if forecasts.is_empty() {
            return Ok(0);
        }

        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;
        {
            let mut supersede = tx.prepare(
                "DELETE FROM forecast_log WHERE show_id = ?1 AND actual_bookings IS NULL",
            )?;
            let mut stmt = tx.prepare(
                r#"
                INSERT INTO forecast_log (run_id, show_id, movie_id, show_date, forecast_demand)
                VALUES (?1, ?2, ?3, ?4, ?5)
                "#,
            )?;
            for f in forecasts {
                supersede.execute(params![&f.show_id])?;
                stmt.execute(params![
                    run_id,
                    &f.show_id,
                    &f.movie_id,
                    f.date.format("%Y-%m-%d").to_string(),
                    f.forecast_demand
                ])?;
            }
        }
        tx.commit()?;
        Ok(forecasts.len())
    }

    /// 查询目标日期已过、尚未回填实际值的日志
    pub fn list_unresolved_before(&self, today: NaiveDate) -> RepositoryResult<Vec<ForecastLogEntry>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "{} WHERE actual_bookings IS NULL AND show_date < ?1 ORDER BY log_id",
            LOG_SELECT
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params![today.format("%Y-%m-%d").to_string()], map_entry)?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter().map(into_entry).collect()
    }

    /// 回填实际售票（单事务）
    ///
    /// # 参数
    /// - actuals: (log_id, actual_bookings)
    pub fn set_actuals(&self, actuals: &[(i64, u32)]) -> RepositoryResult<usize> {
        if actuals.is_empty() {
            return Ok(0);
        }

        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;
        let mut updated = 0usize;
        {
            let mut stmt =
                tx.prepare("UPDATE forecast_log SET actual_bookings = ?1 WHERE log_id = ?2")?;
            for (log_id, actual) in actuals {
                updated += stmt.execute(params![*actual as i64, log_id])?;
            }
        }
        tx.commit()?;
        Ok(updated)
    }

    pub fn list_by_run(&self, run_id: &str) -> RepositoryResult<Vec<ForecastLogEntry>> {
        let conn = self.get_conn()?;
        let sql = format!("{} WHERE run_id = ?1 ORDER BY log_id", LOG_SELECT);
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params![run_id], map_entry)?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter().map(into_entry).collect()
    }

    /// 查询某日及之后已回填的日志（复盘回看窗口）
    pub fn list_resolved_since(&self, since: NaiveDate) -> RepositoryResult<Vec<ForecastLogEntry>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "{} WHERE actual_bookings IS NOT NULL AND show_date >= ?1 ORDER BY log_id",
            LOG_SELECT
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params![since.format("%Y-%m-%d").to_string()], map_entry)?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter().map(into_entry).collect()
    }

    /// 删除无法复盘的日志（场次已取消或已被重排删除）
    pub fn discard_entries(&self, log_ids: &[i64]) -> RepositoryResult<usize> {
        if log_ids.is_empty() {
            return Ok(0);
        }

        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;
        let mut removed = 0usize;
        {
            let mut stmt = tx.prepare("DELETE FROM forecast_log WHERE log_id = ?1")?;
            for log_id in log_ids {
                removed += stmt.execute(params![log_id])?;
            }
        }
        tx.commit()?;
        Ok(removed)
    }

    // ==========================================
    // 校正系数
    // ==========================================

    /// 批量写入影片校正系数（UPSERT，单事务）
    pub fn upsert_corrections(&self, records: &[CorrectionRecord]) -> RepositoryResult<()> {
        if records.is_empty() {
            return Ok(());
        }

        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                r#"
                INSERT INTO movie_correction (movie_id, correction_factor, sample_count)
                VALUES (?1, ?2, ?3)
                ON CONFLICT(movie_id) DO UPDATE SET
                    correction_factor = ?2,
                    sample_count = ?3,
                    updated_at = datetime('now')
                "#,
            )?;
            for r in records {
                stmt.execute(params![&r.movie_id, r.correction_factor, r.sample_count as i64])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    pub fn find_correction(&self, movie_id: &str) -> RepositoryResult<Option<CorrectionRecord>> {
        let conn = self.get_conn()?;
        let record = conn
            .query_row(
                "SELECT movie_id, correction_factor, sample_count FROM movie_correction WHERE movie_id = ?1",
                params![movie_id],
                |row| {
                    Ok(CorrectionRecord {
                        movie_id: row.get(0)?,
                        correction_factor: row.get(1)?,
                        sample_count: row.get::<_, i64>(2)?.max(0) as usize,
                    })
                },
            )
            .optional()?;
        Ok(record)
    }
}
