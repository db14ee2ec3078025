// ==========================================
// 影院经营决策系统 - 意图路由
// ==========================================
// 显式意图直接采用；否则按关键词命中数路由
// 置信度:
// - 显式意图:            0.95
// - 唯一最高命中:        0.55 + 0.10 × 命中数（上限 0.95）
// - 多个意图并列最高:    0.45
// - 有文本但无命中:      0.40 (optimize)
// - 无意图也无文本:      0.35 (optimize)
// 匹配: 英文关键词按整词比对，中文关键词按子串比对
// ==========================================

use crate::domain::pipeline::{OperateRequest, RoutingDecision};
use crate::domain::types::Intent;
use tracing::debug;

const EXPLICIT_CONFIDENCE: f64 = 0.95;
const TIE_CONFIDENCE: f64 = 0.45;
const NO_MATCH_CONFIDENCE: f64 = 0.40;
const NO_INPUT_CONFIDENCE: f64 = 0.35;

// 同一意图内的词形变体放在同一组，一组至多计一次命中
const SCHEDULING_KEYWORDS: &[&[&str]] = &[
    &["schedule", "scheduling", "scheduled"],
    &["showtime", "showtimes"],
    &["lineup"],
    &["programme", "program"],
    &["排片"],
    &["排期"],
    &["场次安排"],
];
const PRICING_KEYWORDS: &[&[&str]] = &[
    &["price", "prices", "pricing"],
    &["fare", "fares"],
    &["ticket cost"],
    &["surge"],
    &["调价"],
    &["票价"],
    &["定价"],
];
const OPTIMIZE_KEYWORDS: &[&[&str]] = &[
    &["optimize", "optimise", "optimization", "optimisation"],
    &["reschedule", "rescheduling"],
    &["cancel", "cancellation"],
    &["swap"],
    &["prime"],
    &["优化"],
    &["调度"],
    &["取消"],
    &["黄金"],
];

pub struct IntentRouter {
    // 无状态
}

impl Default for IntentRouter {
    fn default() -> Self {
        Self::new()
    }
}

impl IntentRouter {
    pub fn new() -> Self {
        Self {}
    }

    /// 为请求生成路由决策
    pub fn route(&self, request: &OperateRequest) -> RoutingDecision {
        if let Some(intent) = request.intent {
            return RoutingDecision {
                route: intent,
                confidence: EXPLICIT_CONFIDENCE,
                reason: format!("显式意图: {}", intent),
            };
        }

        let Some(query) = request.query.as_deref().filter(|q| !q.trim().is_empty()) else {
            return RoutingDecision {
                route: Intent::Optimize,
                confidence: NO_INPUT_CONFIDENCE,
                reason: "未提供意图与诉求文本，默认存量优化".to_string(),
            };
        };

        let lowered = query.to_lowercase();
        let words = tokenize(&lowered);
        let hits = [
            (Intent::Scheduling, count_hits(&lowered, &words, SCHEDULING_KEYWORDS)),
            (Intent::Pricing, count_hits(&lowered, &words, PRICING_KEYWORDS)),
            (Intent::Optimize, count_hits(&lowered, &words, OPTIMIZE_KEYWORDS)),
        ];
        debug!(query = %query, ?hits, "关键词命中");

        let best = hits.iter().map(|(_, n)| *n).max().unwrap_or(0);
        if best == 0 {
            return RoutingDecision {
                route: Intent::Optimize,
                confidence: NO_MATCH_CONFIDENCE,
                reason: "诉求文本未命中任何关键词，默认存量优化".to_string(),
            };
        }

        let leaders: Vec<Intent> = hits
            .iter()
            .filter(|(_, n)| *n == best)
            .map(|(intent, _)| *intent)
            .collect();
        let route = leaders[0];
        if leaders.len() > 1 {
            let names: Vec<&str> = leaders.iter().map(|i| i.as_str()).collect();
            return RoutingDecision {
                route,
                confidence: TIE_CONFIDENCE,
                reason: format!("多个意图并列命中 ({})", names.join(", ")),
            };
        }

        RoutingDecision {
            route,
            confidence: (0.55 + 0.10 * best as f64).min(EXPLICIT_CONFIDENCE),
            reason: format!("关键词命中 {} 次", best),
        }
    }
}

/// 按非字母数字字符切分出的 ASCII 单词
fn tokenize(text: &str) -> Vec<&str> {
    text.split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect()
}

fn keyword_matches(text: &str, words: &[&str], keyword: &str) -> bool {
    if !keyword.is_ascii() {
        return text.contains(keyword);
    }
    let parts: Vec<&str> = keyword.split(' ').collect();
    words.windows(parts.len()).any(|w| w == parts.as_slice())
}

fn count_hits(text: &str, words: &[&str], groups: &[&[&str]]) -> usize {
    groups
        .iter()
        .filter(|group| group.iter().any(|k| keyword_matches(text, words, k)))
        .count()
}
