// ==========================================
// 影院经营决策系统 - 售票数据仓储
// ==========================================
// 红线: Repository 不含业务逻辑
// 口径: 售票量 = booking.seats 之和；已取消场次不计入
// ==========================================

use crate::domain::forecast::{BookingHistory, CompletedShowStat, DailyBookings};
use crate::repository::error::{
    parse_date_column, parse_time_column, RepositoryError, RepositoryResult,
};
use chrono::NaiveDate;
use rusqlite::{params, Connection};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

// ==========================================
// BookingRepository - 售票仓储
// ==========================================
pub struct BookingRepository {
    conn: Arc<Mutex<Connection>>,
}

impl BookingRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 查询单片日售票历史（有排场的日期才出现，无售票记为 0）
    ///
    /// # 参数
    /// - date_from / date_to: 闭区间
    pub fn daily_bookings(
        &self,
        movie_id: &str,
        date_from: NaiveDate,
        date_to: NaiveDate,
    ) -> RepositoryResult<BookingHistory> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT s.show_date, COALESCE(SUM(b.seats), 0)
            FROM show s
            LEFT JOIN booking b ON b.show_id = s.show_id
            WHERE s.movie_id = ?1
              AND s.status != 'cancelled'
              AND s.show_date BETWEEN ?2 AND ?3
            GROUP BY s.show_date
            ORDER BY s.show_date
            "#,
        )?;
        let rows = stmt
            .query_map(
                params![
                    movie_id,
                    date_from.format("%Y-%m-%d").to_string(),
                    date_to.format("%Y-%m-%d").to_string()
                ],
                |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)),
            )?
            .collect::<Result<Vec<_>, _>>()?;

        let mut days = Vec::with_capacity(rows.len());
        for (date, seats) in rows {
            days.push(DailyBookings {
                date: parse_date_column(&date, "show.show_date")?,
                bookings: seats.max(0) as u32,
            });
        }

        Ok(BookingHistory {
            movie_id: movie_id.to_string(),
            days,
        })
    }

    /// 区间内各影片售票合计（用于市场份额）
    pub fn totals_by_movie(
        &self,
        date_from: NaiveDate,
        date_to: NaiveDate,
    ) -> RepositoryResult<HashMap<String, f64>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT s.movie_id, COALESCE(SUM(b.seats), 0)
            FROM show s
            JOIN booking b ON b.show_id = s.show_id
            WHERE s.status != 'cancelled'
              AND s.show_date BETWEEN ?1 AND ?2
            GROUP BY s.movie_id
            "#,
        )?;
        let rows = stmt.query_map(
            params![
                date_from.format("%Y-%m-%d").to_string(),
                date_to.format("%Y-%m-%d").to_string()
            ],
            |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)),
        )?;

        let mut totals = HashMap::new();
        for row in rows {
            let (movie_id, seats) = row?;
            totals.insert(movie_id, seats.max(0) as f64);
        }
        Ok(totals)
    }

    /// 单场已售座位数
    pub fn booked_seats(&self, show_id: &str) -> RepositoryResult<u32> {
        let conn = self.get_conn()?;
        let seats: i64 = conn.query_row(
            "SELECT COALESCE(SUM(seats), 0) FROM booking WHERE show_id = ?1",
            params![show_id],
            |row| row.get(0),
        )?;
        Ok(seats.max(0) as u32)
    }

    /// 已完成场次明细（时段权重学习输入）
    pub fn completed_show_stats(&self, since: NaiveDate) -> RepositoryResult<Vec<CompletedShowStat>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT s.show_date, s.show_time, COALESCE(SUM(b.seats), 0)
            FROM show s
            LEFT JOIN booking b ON b.show_id = s.show_id
            WHERE s.status = 'completed' AND s.show_date >= ?1
            GROUP BY s.show_id
            "#,
        )?;
        let rows = stmt
            .query_map(params![since.format("%Y-%m-%d").to_string()], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, i64>(2)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(date, time, seats)| {
                Ok(CompletedShowStat {
                    date: parse_date_column(&date, "show.show_date")?,
                    time: parse_time_column(&time, "show.show_time")?,
                    bookings: seats.max(0) as u32,
                })
            })
            .collect()
    }
}
