// ==========================================
// 影院经营决策系统 - 场次票价仓储
// ==========================================
// 红线: Repository 不含业务逻辑
// 红线: 同一批调价在单个事务内写入
// ==========================================

use crate::domain::schedule::PricingUpdate;
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{params, Connection, OptionalExtension};
use std::sync::{Arc, Mutex};

// ==========================================
// PricingRepository - 票价仓储
// ==========================================
pub struct PricingRepository {
    conn: Arc<Mutex<Connection>>,
}

impl PricingRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 查询场次某档位的当前票价（无记录返回 None）
    pub fn current_price(&self, show_id: &str, category_id: &str) -> RepositoryResult<Option<f64>> {
        let conn = self.get_conn()?;
        let price = conn
            .query_row(
                "SELECT price FROM show_price WHERE show_id = ?1 AND category_id = ?2",
                params![show_id, category_id],
                |row| row.get::<_, f64>(0),
            )
            .optional()?;
        Ok(price)
    }

    /// 写入单个票价（UPSERT）
    pub fn upsert_price(&self, show_id: &str, category_id: &str, price: f64) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT INTO show_price (show_id, category_id, price) VALUES (?1, ?2, ?3)
            ON CONFLICT(show_id, category_id)
            DO UPDATE SET price = ?3, updated_at = datetime('now')
            "#,
            params![show_id, category_id, price],
        )?;
        Ok(())
    }

    /// 批量落库调价结果
    ///
    /// # 返回
    /// 写入的行数
    pub fn apply_updates(&self, updates: &[PricingUpdate]) -> RepositoryResult<usize> {
        if updates.is_empty() {
            return Ok(0);
        }

        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;
        let mut written = 0usize;
        {
            let mut stmt = tx.prepare(
                r#"
                INSERT INTO show_price (show_id, category_id, price) VALUES (?1, ?2, ?3)
                ON CONFLICT(show_id, category_id)
                DO UPDATE SET price = ?3, updated_at = datetime('now')
                "#,
            )?;
            for u in updates {
                written += stmt.execute(params![&u.show_id, &u.category_id, u.new_price])?;
            }
        }
        tx.commit()?;
        Ok(written)
    }
}
