// ==========================================
// 影院经营决策系统 - 历史基线统计
// ==========================================
// 截尾均值 / 售票速度 / 变异系数 / 市场压力
// ==========================================

/// 截尾均值：按值排序后两端各去掉 floor(n × ratio) 个
pub fn trimmed_mean(values: &[f64], trim_ratio: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    if sorted.is_empty() {
        return 0.0;
    }
    sorted.sort_by(|a, b| a.total_cmp(b));

    let k = ((sorted.len() as f64) * trim_ratio.clamp(0.0, 0.45)).floor() as usize;
    let kept = &sorted[k..sorted.len() - k];
    if kept.is_empty() {
        return mean(&sorted);
    }
    mean(kept)
}

pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// 售票速度 = 最近 7 天均值 / 之前 7 天均值，截断到 [0.70, 1.30]
///
/// 之前窗口为空或均值为 0 时返回 1.0
pub fn velocity(counts: &[f64]) -> f64 {
    let n = counts.len();
    let recent_start = n.saturating_sub(7);
    let prior_start = recent_start.saturating_sub(7);
    let recent = &counts[recent_start..];
    let prior = &counts[prior_start..recent_start];

    let prior_mean = mean(prior);
    if prior.is_empty() || prior_mean <= 0.0 {
        return 1.0;
    }
    (mean(recent) / prior_mean).clamp(0.70, 1.30)
}

/// 变异系数（均值为 0 时视为 0）
pub fn coefficient_of_variation(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let m = mean(values);
    if m <= 0.0 {
        return 0.0;
    }
    let var = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64;
    var.sqrt() / m
}

/// 市场压力 = 1 − 市场份额，截断到 [0.15, 0.75]
pub fn market_pressure(share: f64) -> f64 {
    let share = if share.is_finite() { share } else { 0.0 };
    (1.0 - share).clamp(0.15, 0.75)
}
