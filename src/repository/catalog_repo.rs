// ==========================================
// 影院经营决策系统 - 影片/影厅档案仓储
// ==========================================
// 红线: Repository 不含业务逻辑
// 说明: 档案由外部 CRUD 系统维护，本仓储只读
// ==========================================

use crate::domain::catalog::{Movie, Screen, SeatCategory};
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};
use std::sync::{Arc, Mutex};

// ==========================================
// CatalogRepository - 档案仓储
// ==========================================
pub struct CatalogRepository {
    conn: Arc<Mutex<Connection>>,
}

impl CatalogRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 查询在映影片
    ///
    /// # 参数
    /// - movie_ids: 可选过滤（None 或空 = 全部在映影片）
    pub fn list_active_movies(&self, movie_ids: Option<&[String]>) -> RepositoryResult<Vec<Movie>> {
        let conn = self.get_conn()?;

        let mut sql = String::from(
            "SELECT movie_id, title, runtime_minutes, is_active FROM movie WHERE is_active = 1",
        );
        let mut values: Vec<Value> = Vec::new();

        if let Some(ids) = movie_ids {
            let ids: Vec<String> = ids
                .iter()
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
            if !ids.is_empty() {
                let placeholders = std::iter::repeat("?")
                    .take(ids.len())
                    .collect::<Vec<_>>()
                    .join(", ");
                sql.push_str(&format!(" AND movie_id IN ({})", placeholders));
                values.extend(ids.into_iter().map(Value::from));
            }
        }
        sql.push_str(" ORDER BY movie_id");

        let mut stmt = conn.prepare(&sql)?;
        let movies = stmt
            .query_map(params_from_iter(values), |row| {
                Ok(Movie {
                    movie_id: row.get(0)?,
                    title: row.get(1)?,
                    runtime_minutes: row.get(2)?,
                    is_active: row.get::<_, i64>(3)? != 0,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(movies)
    }

    pub fn find_movie(&self, movie_id: &str) -> RepositoryResult<Option<Movie>> {
        let conn = self.get_conn()?;
        let movie = conn
            .query_row(
                "SELECT movie_id, title, runtime_minutes, is_active FROM movie WHERE movie_id = ?1",
                params![movie_id],
                |row| {
                    Ok(Movie {
                        movie_id: row.get(0)?,
                        title: row.get(1)?,
                        runtime_minutes: row.get(2)?,
                        is_active: row.get::<_, i64>(3)? != 0,
                    })
                },
            )
            .optional()?;
        Ok(movie)
    }

    /// 查询可用影厅
    pub fn list_available_screens(&self) -> RepositoryResult<Vec<Screen>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT screen_id, name, seat_capacity, is_available
            FROM screen
            WHERE is_available = 1 AND seat_capacity > 0
            ORDER BY screen_id
            "#,
        )?;
        let screens = stmt
            .query_map([], |row| {
                Ok(Screen {
                    screen_id: row.get(0)?,
                    name: row.get(1)?,
                    seat_capacity: row.get(2)?,
                    is_available: row.get::<_, i64>(3)? != 0,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(screens)
    }

    /// 查询影厅的座位档位
    pub fn list_seat_categories(&self, screen_id: &str) -> RepositoryResult<Vec<SeatCategory>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT category_id, screen_id, name, base_price
            FROM seat_category
            WHERE screen_id = ?1
            ORDER BY category_id
            "#,
        )?;
        let categories = stmt
            .query_map(params![screen_id], |row| {
                Ok(SeatCategory {
                    category_id: row.get(0)?,
                    screen_id: row.get(1)?,
                    name: row.get(2)?,
                    base_price: row.get(3)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(categories)
    }
}
