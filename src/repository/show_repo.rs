// ==========================================
// 影院经营决策系统 - 场次数据仓储
// ==========================================
// 红线: Repository 不含业务逻辑
// 红线: (screen_id, show_date, show_time) 唯一
// 红线: 按影厅/日重排、两场互换必须在单个事务内完成，
//       外部不可观察到"清了一半"或"换了一半"的状态
// ==========================================

use crate::domain::catalog::Show;
use crate::domain::schedule::ScheduleAssignment;
use crate::domain::types::ShowStatus;
use crate::repository::error::{
    parse_date_column, parse_time_column, RepositoryError, RepositoryResult,
};
use chrono::{NaiveDate, NaiveTime};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

const SHOW_SELECT: &str = r#"
    SELECT s.show_id, s.movie_id, s.screen_id, s.show_date, s.show_time, s.end_time, s.status,
           sc.seat_capacity,
           COALESCE((SELECT SUM(b.seats) FROM booking b WHERE b.show_id = s.show_id), 0)
    FROM show s
    JOIN screen sc ON sc.screen_id = s.screen_id
"#;

/// 未解析的场次行（日期/时间为文本）
struct ShowRow {
    show_id: String,
    movie_id: String,
    screen_id: String,
    show_date: String,
    show_time: String,
    end_time: String,
    status: String,
    capacity: u32,
    booked_seats: i64,
}

impl ShowRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            show_id: row.get(0)?,
            movie_id: row.get(1)?,
            screen_id: row.get(2)?,
            show_date: row.get(3)?,
            show_time: row.get(4)?,
            end_time: row.get(5)?,
            status: row.get(6)?,
            capacity: row.get(7)?,
            booked_seats: row.get(8)?,
        })
    }

    fn into_show(self) -> RepositoryResult<Show> {
        let status = self
            .status
            .parse::<ShowStatus>()
            .map_err(|message| RepositoryError::FieldValueError {
                field: "show.status".to_string(),
                message,
            })?;
        Ok(Show {
            show_date: parse_date_column(&self.show_date, "show.show_date")?,
            show_time: parse_time_column(&self.show_time, "show.show_time")?,
            end_time: parse_time_column(&self.end_time, "show.end_time")?,
            show_id: self.show_id,
            movie_id: self.movie_id,
            screen_id: self.screen_id,
            status,
            capacity: self.capacity,
            booked_seats: self.booked_seats.max(0) as u32,
        })
    }
}

/// 单影厅单日重排结果
#[derive(Debug, Clone, Default)]
pub struct ReplaceScreenDayOutcome {
    /// 被清除的旧"待映"场次数
    pub removed: usize,
    /// 成功写入的场次ID
    pub inserted_show_ids: Vec<String>,
    /// 因唯一约束冲突而跳过的排片
    pub skipped: Vec<ScheduleAssignment>,
}

fn fmt_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

fn fmt_time(time: NaiveTime) -> String {
    time.format("%H:%M").to_string()
}

// ==========================================
// ShowRepository - 场次仓储
// ==========================================
pub struct ShowRepository {
    conn: Arc<Mutex<Connection>>,
}

impl ShowRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    pub fn find_by_id(&self, show_id: &str) -> RepositoryResult<Option<Show>> {
        let conn = self.get_conn()?;
        let sql = format!("{} WHERE s.show_id = ?1", SHOW_SELECT);
        let row = conn
            .query_row(&sql, params![show_id], ShowRow::from_row)
            .optional()?;
        row.map(ShowRow::into_show).transpose()
    }

    /// 查询日期范围内指定状态的场次（按日期、影厅、时间升序）
    pub fn list_by_status_in_range(
        &self,
        status: ShowStatus,
        date_from: NaiveDate,
        date_to: NaiveDate,
    ) -> RepositoryResult<Vec<Show>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "{} WHERE s.status = ?1 AND s.show_date BETWEEN ?2 AND ?3 \
             ORDER BY s.show_date, s.screen_id, s.show_time",
            SHOW_SELECT
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(
                params![status.as_str(), fmt_date(date_from), fmt_date(date_to)],
                ShowRow::from_row,
            )?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter().map(ShowRow::into_show).collect()
    }

    /// 查询某日"待映"场次
    pub fn list_upcoming_on(&self, date: NaiveDate) -> RepositoryResult<Vec<Show>> {
        self.list_by_status_in_range(ShowStatus::Upcoming, date, date)
    }

    /// 查询影厅某日的全部"待映"场次
    pub fn list_upcoming_for_screen_day(
        &self,
        screen_id: &str,
        date: NaiveDate,
    ) -> RepositoryResult<Vec<Show>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "{} WHERE s.screen_id = ?1 AND s.show_date = ?2 AND s.status = 'upcoming' \
             ORDER BY s.show_time",
            SHOW_SELECT
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params![screen_id, fmt_date(date)], ShowRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter().map(ShowRow::into_show).collect()
    }

    /// 重排单影厅单日
    ///
    /// 单事务内:
    /// 1) 清除该影厅当日无售票的"待映"场次（幂等重排）；
    ///    给定 only_movies 时只清除这些影片的场次
    /// 2) 写入新排片；与保留场次冲突的排片跳过并返回
    pub fn replace_screen_day(
        &self,
        screen_id: &str,
        date: NaiveDate,
        only_movies: Option<&[String]>,
        assignments: &[ScheduleAssignment],
    ) -> RepositoryResult<ReplaceScreenDayOutcome> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;
        let date_str = fmt_date(date);

        let mut sql = String::from(
            r#"
            DELETE FROM show
            WHERE screen_id = ?1 AND show_date = ?2 AND status = 'upcoming'
              AND NOT EXISTS (SELECT 1 FROM booking b WHERE b.show_id = show.show_id)
            "#,
        );
        let mut values: Vec<String> = vec![screen_id.to_string(), date_str];
        if let Some(ids) = only_movies {
            if ids.is_empty() {
                sql.push_str(" AND 0");
            } else {
                let placeholders: Vec<String> =
                    (0..ids.len()).map(|i| format!("?{}", i + 3)).collect();
                sql.push_str(&format!(" AND movie_id IN ({})", placeholders.join(", ")));
                values.extend(ids.iter().cloned());
            }
        }
        let removed = tx.execute(&sql, params_from_iter(values.iter()))?;

        let mut outcome = ReplaceScreenDayOutcome {
            removed,
            ..Default::default()
        };

        {
            let mut stmt = tx.prepare(
                r#"
                INSERT OR IGNORE INTO show (
                    show_id, movie_id, screen_id, show_date, show_time, end_time, status
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, 'upcoming')
                "#,
            )?;
            for a in assignments {
                let changed = stmt.execute(params![
                    &a.show_id,
                    &a.movie_id,
                    &a.screen_id,
                    fmt_date(a.date),
                    fmt_time(a.time),
                    fmt_time(a.end_time),
                ])?;
                if changed == 0 {
                    outcome.skipped.push(a.clone());
                } else {
                    outcome.inserted_show_ids.push(a.show_id.clone());
                }
            }
        }

        tx.commit()?;
        Ok(outcome)
    }

    /// 互换同影厅同日两场的开场时间
    ///
    /// 单事务内三步写:
    /// 1) A → 临时时间 `__swap__<uuid>`（不与任何真实时间冲突）
    /// 2) B → A 原时间
    /// 3) A → B 原时间
    /// 临时值只出现在事务中间，最后一次写入总是真实时间。
    pub fn swap_show_times(
        &self,
        show_a: &str,
        show_b: &str,
        a_end_after: NaiveTime,
        b_end_after: NaiveTime,
    ) -> RepositoryResult<()> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;

        let load = |id: &str| -> RepositoryResult<(String, String, String, String)> {
            tx.query_row(
                "SELECT screen_id, show_date, show_time, status FROM show WHERE show_id = ?1",
                params![id],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
            )
            .optional()?
            .ok_or_else(|| RepositoryError::NotFound {
                entity: "show".to_string(),
                id: id.to_string(),
            })
        };

        let (screen_a, date_a, time_a, status_a) = load(show_a)?;
        let (screen_b, date_b, time_b, status_b) = load(show_b)?;

        if screen_a != screen_b || date_a != date_b {
            return Err(RepositoryError::FieldValueError {
                field: "show.screen_id/show_date".to_string(),
                message: format!("只能互换同影厅同日场次: {} vs {}", show_a, show_b),
            });
        }
        for (id, status) in [(show_a, &status_a), (show_b, &status_b)] {
            if status != ShowStatus::Upcoming.as_str() {
                return Err(RepositoryError::InvalidStateTransition {
                    from: format!("{}:{}", id, status),
                    to: "swap".to_string(),
                });
            }
        }

        let temp_time = format!("__swap__{}", Uuid::new_v4());
        tx.execute(
            "UPDATE show SET show_time = ?1 WHERE show_id = ?2",
            params![&temp_time, show_a],
        )?;
        tx.execute(
            "UPDATE show SET show_time = ?1, end_time = ?2 WHERE show_id = ?3",
            params![&time_a, fmt_time(b_end_after), show_b],
        )?;
        tx.execute(
            "UPDATE show SET show_time = ?1, end_time = ?2 WHERE show_id = ?3",
            params![&time_b, fmt_time(a_end_after), show_a],
        )?;

        tx.commit()?;
        Ok(())
    }

    /// 取消场次（仅"待映"可取消）
    ///
    /// # 返回
    /// - true: 已取消
    /// - false: 场次不存在或状态不是 upcoming
    pub fn cancel_show(&self, show_id: &str) -> RepositoryResult<bool> {
        let conn = self.get_conn()?;
        let changed = conn.execute(
            "UPDATE show SET status = 'cancelled' WHERE show_id = ?1 AND status = 'upcoming'",
            params![show_id],
        )?;
        Ok(changed > 0)
    }
}
