// ==========================================
// 影院经营决策系统 - 周季节性统计模型
// ==========================================
// 特征: [截距, 趋势 t(周), 周二..周日哑变量(6), 热度, 节假日系数]
// 拟合: 岭回归 (XᵀX + λI')β = Xᵀy，截距不加惩罚
// 区间: 预测值 ± 1.28 × 残差标准差（约 80% 区间）
// ==========================================

use chrono::{Datelike, NaiveDate};
use std::collections::HashMap;

const FEATURES: usize = 10;
pub const INTERVAL_Z: f64 = 1.28;

/// 已拟合的季节性模型
#[derive(Debug, Clone, PartialEq)]
pub struct SeasonalModel {
    coefficients: [f64; FEATURES],
    origin: NaiveDate,
    residual_std: f64,
    sample_count: usize,
}

fn features(origin: NaiveDate, date: NaiveDate, buzz: f64, holiday: f64) -> [f64; FEATURES] {
    let mut x = [0.0; FEATURES];
    x[0] = 1.0;
    x[1] = (date - origin).num_days() as f64 / 7.0;
    let dow = date.weekday().num_days_from_monday() as usize;
    if dow > 0 {
        x[1 + dow] = 1.0;
    }
    x[8] = buzz;
    x[9] = holiday;
    x
}

impl SeasonalModel {
    /// 拟合模型
    ///
    /// # 参数
    /// - observations: (日期, 售票量)，按日期升序
    /// - buzz: 影片热度（历史期按当前值处理）
    /// - holidays: 历史日期的节假日系数（缺省 1.0）
    /// - lambda: 岭参数
    ///
    /// # 返回
    /// 样本不足或矩阵奇异时返回 None
    pub fn fit(
        observations: &[(NaiveDate, f64)],
        buzz: f64,
        holidays: &HashMap<NaiveDate, f64>,
        lambda: f64,
        min_samples: usize,
    ) -> Option<Self> {
        if observations.len() < min_samples.max(2) {
            return None;
        }
        let origin = observations[0].0;

        let mut xtx = [[0.0; FEATURES]; FEATURES];
        let mut xty = [0.0; FEATURES];
        for (date, y) in observations {
            let holiday = holidays.get(date).copied().unwrap_or(1.0);
            let x = features(origin, *date, buzz, holiday);
            for i in 0..FEATURES {
                xty[i] += x[i] * y;
                for j in 0..FEATURES {
                    xtx[i][j] += x[i] * x[j];
                }
            }
        }
        let lambda = lambda.max(1e-6);
        for (i, row) in xtx.iter_mut().enumerate().skip(1) {
            row[i] += lambda;
        }

        let coefficients = solve(xtx, xty)?;

        let mut sse = 0.0;
        for (date, y) in observations {
            let holiday = holidays.get(date).copied().unwrap_or(1.0);
            let x = features(origin, *date, buzz, holiday);
            let fitted: f64 = x.iter().zip(coefficients.iter()).map(|(a, b)| a * b).sum();
            sse += (y - fitted).powi(2);
        }
        let dof = observations.len().saturating_sub(FEATURES).max(1);
        let residual_std = (sse / dof as f64).sqrt();

        if !residual_std.is_finite() || coefficients.iter().any(|c| !c.is_finite()) {
            return None;
        }

        Some(Self {
            coefficients,
            origin,
            residual_std,
            sample_count: observations.len(),
        })
    }

    /// 单日预测（非负）
    pub fn predict(&self, date: NaiveDate, buzz: f64, holiday: f64) -> f64 {
        let x = features(self.origin, date, buzz, holiday);
        let y: f64 = x.iter().zip(self.coefficients.iter()).map(|(a, b)| a * b).sum();
        y.max(0.0)
    }

    pub fn residual_std(&self) -> f64 {
        self.residual_std
    }

    pub fn sample_count(&self) -> usize {
        self.sample_count
    }
}

/// 高斯消元（列主元）
fn solve(mut a: [[f64; FEATURES]; FEATURES], mut b: [f64; FEATURES]) -> Option<[f64; FEATURES]> {
    for col in 0..FEATURES {
        let pivot = (col..FEATURES).max_by(|&i, &j| a[i][col].abs().total_cmp(&a[j][col].abs()))?;
        if a[pivot][col].abs() < 1e-12 {
            return None;
        }
        a.swap(col, pivot);
        b.swap(col, pivot);

        for row in (col + 1)..FEATURES {
            let factor = a[row][col] / a[col][col];
            if factor == 0.0 {
                continue;
            }
            for k in col..FEATURES {
                a[row][k] -= factor * a[col][k];
            }
            b[row] -= factor * b[col];
        }
    }

    let mut x = [0.0; FEATURES];
    for row in (0..FEATURES).rev() {
        let tail: f64 = ((row + 1)..FEATURES).map(|k| a[row][k] * x[k]).sum();
        x[row] = (b[row] - tail) / a[row][row];
    }
    Some(x)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(d: u32) -> NaiveDate {
        // 2026-03-02 为周一
        NaiveDate::from_ymd_opt(2026, 3, 1).unwrap() + chrono::Duration::days(d as i64)
    }

    #[test]
    fn test_fit_recovers_weekend_lift() {
        let obs: Vec<(NaiveDate, f64)> = (1..=28)
            .map(|d| {
                let dt = date(d);
                let y = if dt.weekday().num_days_from_monday() >= 5 { 80.0 } else { 40.0 };
                (dt, y)
            })
            .collect();
        let model = SeasonalModel::fit(&obs, 0.5, &HashMap::new(), 0.1, 7).unwrap();

        let saturday = date(34);
        let tuesday = date(30);
        assert_eq!(saturday.weekday(), chrono::Weekday::Sat);
        let sat = model.predict(saturday, 0.5, 1.0);
        let tue = model.predict(tuesday, 0.5, 1.0);
        assert!(sat > tue + 25.0, "sat={} tue={}", sat, tue);
        assert!((tue - 40.0).abs() < 8.0, "tue={}", tue);
    }

    #[test]
    fn test_fit_requires_min_samples() {
        let obs: Vec<(NaiveDate, f64)> = (1..=5).map(|d| (date(d), 10.0)).collect();
        assert!(SeasonalModel::fit(&obs, 0.5, &HashMap::new(), 1.0, 7).is_none());
    }

    #[test]
    fn test_prediction_is_non_negative() {
        let obs: Vec<(NaiveDate, f64)> = (1..=14)
            .map(|d| (date(d), (100.0 - 7.0 * d as f64).max(0.0)))
            .collect();
        let model = SeasonalModel::fit(&obs, 0.5, &HashMap::new(), 0.1, 7).unwrap();
        assert!(model.predict(date(60), 0.5, 1.0) >= 0.0);
    }
}
