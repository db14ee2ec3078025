// ==========================================
// 影院经营决策系统 - 流水线编排器
// ==========================================
// 主流程: 审批 → 需求预测 → 时段分布 → (按意图分支)
//        → 调价 → 结果汇总 → 复盘
// 分支:
// - scheduling: 排片 → 场次展开
// - optimize:   场次展开 → 存量调度
// - pricing:    场次展开
// 红线: 阶段严格顺序执行，结果段只增不改
// 红线: 审批挂起 = 持久化断点，恢复时从记录的阶段继续
// ==========================================

use crate::config::PipelinePolicy;
use crate::domain::catalog::{Movie, Screen, SeatCategory};
use crate::domain::forecast::BookingHistory;
use crate::domain::pipeline::{
    ForecastSection, OperateRequest, PipelineContext, PipelineStage, PricingSection,
    ReflectionSection, RescheduleSection, RunOutcome, SchedulingSection, ShowForecastSection,
    SlotForecastSection, StageOutcome, StageSection,
};
use crate::domain::types::{RescheduleActionType, ShowStatus};
use crate::engine::approval::ApprovalGate;
use crate::engine::error::{EngineError, EngineResult};
use crate::engine::forecast::{FilmForecastInput, ForecastEngine};
use crate::engine::pricing::{CategoryPrice, PricingEngine};
use crate::engine::reflection::{ReflectionEngine, CORRECTION_LOOKBACK_DAYS};
use crate::engine::repositories::PipelineRepositories;
use crate::engine::rescheduler::{PlannedAction, Rescheduler};
use crate::engine::router::IntentRouter;
use crate::engine::scheduler::{FilmDemand, Scheduler};
use crate::engine::show_expander::ShowExpander;
use crate::engine::slot_distributor::SlotDistributor;
use crate::i18n::t_with_args;
use crate::signals::market::NEUTRAL_BUZZ;
use crate::signals::{DemandAdjustmentService, HolidayCalendar, TrendSignalProvider};
use chrono::{Duration, Local, NaiveDate, NaiveDateTime};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

/// 市场份额统计窗口（天）
const MARKET_SHARE_WINDOW_DAYS: i64 = 14;

// ==========================================
// PipelineOrchestrator - 流水线编排器
// ==========================================
pub struct PipelineOrchestrator {
    repos: PipelineRepositories,
    policy: PipelinePolicy,
    trend: Arc<dyn TrendSignalProvider>,
    holidays: Arc<dyn HolidayCalendar>,

    router: IntentRouter,
    gate: ApprovalGate,
    forecaster: ForecastEngine,
    distributor: SlotDistributor,
    scheduler: Scheduler,
    expander: ShowExpander,
    rescheduler: Rescheduler,
    pricing: PricingEngine,
    reflection: ReflectionEngine,

    /// 固定"当前时间"（测试与回放用）
    now: Option<NaiveDateTime>,
}

impl PipelineOrchestrator {
    /// 创建编排器
    ///
    /// # 参数
    /// - repos: 仓储集合
    /// - policy: 全链路参数
    /// - adjustment: 需求修正服务（不可用时走降级阶梯）
    /// - trend / holidays: 外部信号
    pub fn new(
        repos: PipelineRepositories,
        policy: PipelinePolicy,
        adjustment: Arc<dyn DemandAdjustmentService>,
        trend: Arc<dyn TrendSignalProvider>,
        holidays: Arc<dyn HolidayCalendar>,
    ) -> Self {
        Self {
            router: IntentRouter::new(),
            gate: ApprovalGate::new(policy.approval.clone()),
            forecaster: ForecastEngine::new(policy.forecast.clone(), adjustment),
            distributor: SlotDistributor::new(policy.slot.clone()),
            scheduler: Scheduler::new(policy.scheduler.clone()),
            expander: ShowExpander::new(),
            rescheduler: Rescheduler::new(policy.reschedule.clone()),
            pricing: PricingEngine::new(policy.pricing.clone()),
            reflection: ReflectionEngine::new(),
            repos,
            policy,
            trend,
            holidays,
            now: None,
        }
    }

    /// 固定当前时间
    pub fn with_now(mut self, now: NaiveDateTime) -> Self {
        self.now = Some(now);
        self
    }

    fn now(&self) -> NaiveDateTime {
        self.now.unwrap_or_else(|| Local::now().naive_local())
    }

    fn today(&self) -> NaiveDate {
        self.now().date()
    }

    /// 预测期: 明天起连续 forecast_days 天
    fn horizon(&self, forecast_days: u32) -> Vec<NaiveDate> {
        let today = self.today();
        (1..=forecast_days.max(1) as i64)
            .map(|d| today + Duration::days(d))
            .collect()
    }

    // ==========================================
    // 对外入口
    // ==========================================

    /// 发起一次运行
    ///
    /// # 返回
    /// - Completed: 全部阶段完成
    /// - PendingApproval: 路由置信度不足，已持久化断点
    #[instrument(skip_all, fields(intent = ?request.intent, forecast_days = request.forecast_days))]
    pub async fn operate(&self, request: OperateRequest) -> EngineResult<RunOutcome> {
        if request.forecast_days == 0 {
            return Err(EngineError::Validation("forecast_days 必须 ≥ 1".to_string()));
        }

        let decision = self.router.route(&request);
        let run_id = Uuid::new_v4().to_string();
        info!(
            run_id = %run_id,
            route = %decision.route,
            confidence = decision.confidence,
            reason = %decision.reason,
            "意图路由完成"
        );

        let context = PipelineContext::new(run_id, &request, decision);
        self.run_from(&request, context, PipelineStage::Approval).await
    }

    /// 审批并恢复挂起的运行
    ///
    /// # 错误
    /// - 未知 token: Repository(NotFound)
    /// - 已审批/已完成: Repository(InvalidStateTransition)
    #[instrument(skip(self))]
    pub async fn approve(&self, token: &str) -> EngineResult<RunOutcome> {
        let record = self.repos.checkpoints.claim_pending(token)?;
        let mut context = record.context;
        context.approved = true;
        info!(
            run_id = %context.run_id,
            next_stage = record.next_stage.as_str(),
            "审批通过，从断点恢复"
        );

        match self.run_from(&record.request, context, record.next_stage).await {
            Ok(outcome) => {
                self.repos.checkpoints.mark_completed(token)?;
                Ok(outcome)
            }
            Err(e) => {
                if let Err(release_err) = self.repos.checkpoints.release(token) {
                    warn!(error = %release_err, "断点回退失败");
                }
                Err(e)
            }
        }
    }

    /// 独立执行复盘（不依赖某次运行）
    #[instrument(skip(self))]
    pub fn reflect(&self) -> EngineResult<ReflectionSection> {
        let today = self.today();
        let pending = self.repos.forecast_log.list_unresolved_before(today)?;

        let mut actuals = Vec::new();
        let mut discarded = Vec::new();
        for entry in &pending {
            match self.repos.shows.find_by_id(&entry.show_id)? {
                Some(show) if show.status != ShowStatus::Cancelled => {
                    actuals.push((entry.log_id, show.booked_seats))
                }
                _ => discarded.push(entry.log_id),
            }
        }
        let backfilled = self.repos.forecast_log.set_actuals(&actuals)?;
        let removed = self.repos.forecast_log.discard_entries(&discarded)?;

        let since = today - Duration::days(CORRECTION_LOOKBACK_DAYS);
        let resolved: Vec<_> = self
            .repos
            .forecast_log
            .list_resolved_since(since)?
            .iter()
            .filter_map(|entry| {
                entry
                    .actual_bookings
                    .map(|actual| self.reflection.resolve(entry, actual))
            })
            .collect();

        let corrections = self.reflection.aggregate(&resolved);
        self.repos.forecast_log.upsert_corrections(&corrections)?;

        info!(
            backfilled,
            removed,
            resolved = resolved.len(),
            corrections = corrections.len(),
            "复盘完成"
        );
        Ok(self.reflection.summarize(&resolved, corrections))
    }

    // ==========================================
    // 阶段循环
    // ==========================================

    async fn run_from(
        &self,
        request: &OperateRequest,
        mut context: PipelineContext,
        start: PipelineStage,
    ) -> EngineResult<RunOutcome> {
        let stages: Vec<PipelineStage> = PipelineStage::plan_for(context.intent)
            .into_iter()
            .skip_while(|s| *s != start)
            .collect();
        if stages.is_empty() {
            return Err(EngineError::Validation(format!(
                "意图 {} 的流程不包含阶段 {}",
                context.intent,
                start.as_str()
            )));
        }

        for (idx, stage) in stages.iter().enumerate() {
            match self.run_stage(*stage, context).await? {
                StageOutcome::Continue(next) => context = next,
                StageOutcome::PendingApproval { token, context } => {
                    let next_stage = stages.get(idx + 1).copied().unwrap_or(*stage);
                    self.repos
                        .checkpoints
                        .save(&token, request, &context, next_stage)?;
                    warn!(
                        run_id = %context.run_id,
                        token = %token,
                        confidence = context.decision.confidence,
                        threshold = self.gate.threshold(),
                        message = %self.gate.pending_message(&context),
                        "运行挂起，等待人工审批"
                    );
                    return Ok(RunOutcome::PendingApproval {
                        run_id: context.run_id,
                        token,
                        decision: context.decision,
                    });
                }
            }
        }

        info!(run_id = %context.run_id, "运行完成");
        Ok(RunOutcome::Completed {
            run_id: context.run_id,
            result: context.result,
        })
    }

    async fn run_stage(
        &self,
        stage: PipelineStage,
        mut context: PipelineContext,
    ) -> EngineResult<StageOutcome> {
        let section = match stage {
            PipelineStage::Approval => {
                if self.gate.requires_approval(&context) {
                    return Ok(StageOutcome::PendingApproval {
                        token: Uuid::new_v4().to_string(),
                        context,
                    });
                }
                None
            }
            PipelineStage::Forecast => Some(StageSection::Forecast(
                self.stage_forecast(&context).await?,
            )),
            PipelineStage::SlotDistribution => {
                Some(StageSection::SlotForecast(self.stage_slot_distribution(&context)?))
            }
            PipelineStage::Scheduling => Some(StageSection::Scheduling(self.stage_scheduling(&context)?)),
            PipelineStage::ShowExpansion => {
                let section = self.stage_show_expansion(&context)?;
                Some(StageSection::ShowForecast(section))
            }
            PipelineStage::Rescheduling => {
                Some(StageSection::Reschedule(self.stage_rescheduling(&context)?))
            }
            PipelineStage::Pricing => Some(StageSection::Pricing(self.stage_pricing(&context)?)),
            PipelineStage::Formatting => Some(StageSection::Summary(format_summary(&context))),
            PipelineStage::Reflection => Some(StageSection::Reflection(self.reflect()?)),
        };

        if let Some(section) = section {
            context.result.merge(section)?;
        }
        info!(run_id = %context.run_id, stage = stage.as_str(), "阶段完成");
        Ok(StageOutcome::Continue(context))
    }

    // ==========================================
    // 各阶段
    // ==========================================

    fn load_screens(&self, stage: &'static str) -> EngineResult<Vec<Screen>> {
        let screens = self.repos.catalog.list_available_screens()?;
        if screens.is_empty() {
            return Err(EngineError::missing(stage, "没有可用影厅"));
        }
        Ok(screens)
    }

    async fn stage_forecast(
        &self,
        context: &PipelineContext,
    ) -> EngineResult<ForecastSection> {
        let movies = self
            .repos
            .catalog
            .list_active_movies(context.movies.as_deref())?;
        if movies.is_empty() {
            return Err(EngineError::missing("forecast", "没有符合条件的在映影片"));
        }
        let screens = self.load_screens("forecast")?;

        let today = self.today();
        let yesterday = today - Duration::days(1);
        let lookback_from = today - Duration::days(self.policy.forecast.lookback_days.max(1) as i64);
        let horizon = self.horizon(context.forecast_days);
        let capacity = ForecastEngine::daily_capacity(&screens, self.scheduler.slots_per_day());

        // 市场份额
        let share_from = today - Duration::days(MARKET_SHARE_WINDOW_DAYS);
        let totals = self.repos.bookings.totals_by_movie(share_from, yesterday)?;
        let grand_total: f64 = totals.values().sum();

        // 历史（单片失败按无历史处理）
        let histories: Vec<BookingHistory> = movies
            .iter()
            .map(|m| {
                self.repos
                    .bookings
                    .daily_bookings(&m.movie_id, lookback_from, yesterday)
                    .unwrap_or_else(|e| {
                        warn!(movie_id = %m.movie_id, error = %e, "读取售票历史失败，按冷启动处理");
                        BookingHistory {
                            movie_id: m.movie_id.clone(),
                            days: Vec::new(),
                        }
                    })
            })
            .collect();

        let dates: Vec<NaiveDate> = histories
            .iter()
            .flat_map(|h| h.days.iter().map(|d| d.date))
            .chain(horizon.iter().copied())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let holidays = self.holidays.boosts(&dates);

        let inputs: Vec<FilmForecastInput<'_>> = movies
            .iter()
            .zip(histories.iter())
            .map(|(movie, history)| FilmForecastInput {
                movie,
                history,
                market_share: if grand_total > 0.0 {
                    totals.get(&movie.movie_id).copied().unwrap_or(0.0) / grand_total
                } else {
                    0.0
                },
                buzz: self.trend.buzz(&movie.movie_id).unwrap_or_else(|e| {
                    warn!(movie_id = %movie.movie_id, error = %e, "热度信号读取失败，按中性处理");
                    NEUTRAL_BUZZ
                }),
                holidays: &holidays,
            })
            .collect();

        let section = self.forecaster.forecast_films(&inputs, &horizon, capacity).await;
        if section.forecasts.is_empty() {
            return Err(EngineError::missing("forecast", "未生成任何日级预测"));
        }
        Ok(section)
    }

    fn stage_slot_distribution(&self, context: &PipelineContext) -> EngineResult<SlotForecastSection> {
        let forecasts = context.result.day_forecasts();
        if forecasts.is_empty() {
            return Err(EngineError::missing("slot_distribution", "缺少日级需求预测"));
        }
        let screens = self.load_screens("slot_distribution")?;
        let aggregate_seats: f64 = screens.iter().map(|s| s.seat_capacity as f64).sum();

        let since = self.today() - Duration::days(self.policy.forecast.lookback_days.max(1) as i64);
        let stats = self.repos.bookings.completed_show_stats(since)?;
        let table = self
            .distributor
            .learn_weights(&SlotDistributor::aggregate_history(&stats));

        Ok(SlotForecastSection {
            slots: self.distributor.distribute(forecasts, &table, aggregate_seats),
        })
    }

    fn stage_scheduling(&self, context: &PipelineContext) -> EngineResult<SchedulingSection> {
        let forecasts = context.result.day_forecasts();
        if forecasts.is_empty() {
            return Err(EngineError::missing("scheduling", "缺少日级需求预测"));
        }
        let screens = self.load_screens("scheduling")?;
        let movies: HashMap<String, Movie> = self
            .repos
            .catalog
            .list_active_movies(context.movies.as_deref())?
            .into_iter()
            .map(|m| (m.movie_id.clone(), m))
            .collect();

        let dates: BTreeSet<NaiveDate> = forecasts.iter().map(|f| f.date).collect();
        let mut section = SchedulingSection::default();

        // 无筛选时整厅重排；有筛选时只重排筛选内的影片
        let scope: Option<Vec<String>> = context
            .movies
            .as_ref()
            .map(|_| movies.keys().cloned().collect());
        let in_scope = |movie_id: &str| context.movies.is_none() || movies.contains_key(movie_id);

        for date in dates {
            let mut films: Vec<FilmDemand> = forecasts
                .iter()
                .filter(|f| f.date == date)
                .filter_map(|f| {
                    movies.get(&f.movie_id).map(|movie| FilmDemand {
                        movie: movie.clone(),
                        demand: f.movie_day_demand,
                    })
                })
                .collect();
            films.sort_by(|a, b| a.movie.movie_id.cmp(&b.movie.movie_id));

            for screen in &screens {
                // 有售票的场次保留；带影片筛选时，筛选外影片的场次同样保留
                let kept: Vec<_> = self
                    .repos
                    .shows
                    .list_upcoming_for_screen_day(&screen.screen_id, date)?
                    .into_iter()
                    .filter(|s| s.booked_seats > 0 || !in_scope(&s.movie_id))
                    .collect();
                let plan = self
                    .scheduler
                    .plan_screen_day(&screen.screen_id, date, &films, &kept);

                match self.repos.shows.replace_screen_day(
                    &screen.screen_id,
                    date,
                    scope.as_deref(),
                    &plan.assignments,
                ) {
                    Ok(outcome) => {
                        let inserted: HashSet<&str> =
                            outcome.inserted_show_ids.iter().map(|s| s.as_str()).collect();
                        section.assignments.extend(
                            plan.assignments
                                .iter()
                                .filter(|a| inserted.contains(a.show_id.as_str()))
                                .cloned(),
                        );
                        section.skipped_slots += outcome.skipped.len();
                        section.show_ids.extend(outcome.inserted_show_ids);
                    }
                    Err(e) => {
                        warn!(
                            screen_id = %screen.screen_id,
                            date = %date,
                            error = %e,
                            "影厅重排失败，跳过该影厅当日"
                        );
                        section.skipped_slots += plan.assignments.len();
                    }
                }
            }
        }

        info!(
            inserted = section.show_ids.len(),
            skipped = section.skipped_slots,
            "排片完成"
        );
        Ok(section)
    }

    fn stage_show_expansion(
        &self,
        context: &PipelineContext,
    ) -> EngineResult<ShowForecastSection> {
        let slots = context.result.slot_forecasts();
        if slots.is_empty() {
            return Err(EngineError::missing("show_expansion", "缺少时段需求预测"));
        }
        let horizon = self.horizon(context.forecast_days);
        let (Some(first), Some(last)) = (horizon.first(), horizon.last()) else {
            return Err(EngineError::missing("show_expansion", "预测期为空"));
        };
        let shows = self
            .repos
            .shows
            .list_by_status_in_range(ShowStatus::Upcoming, *first, *last)?;

        let section = self.expander.expand(slots, &shows)?;
        self.repos
            .forecast_log
            .insert_show_forecasts(&context.run_id, &section.shows)?;
        Ok(section)
    }

    fn stage_rescheduling(&self, context: &PipelineContext) -> EngineResult<RescheduleSection> {
        let show_forecasts: HashMap<String, _> = context
            .result
            .show_forecasts()
            .iter()
            .map(|f| (f.show_id.clone(), f.clone()))
            .collect();
        if show_forecasts.is_empty() {
            return Err(EngineError::missing("rescheduling", "缺少场次级需求预测"));
        }

        let tomorrow = self.today() + Duration::days(1);
        let shows = self.repos.shows.list_upcoming_on(tomorrow)?;
        let runtimes: HashMap<String, u32> = self
            .repos
            .catalog
            .list_active_movies(None)?
            .into_iter()
            .map(|m| (m.movie_id, m.runtime_minutes))
            .collect();

        let planned = self
            .rescheduler
            .plan(&shows, &show_forecasts, &runtimes, self.now());

        let mut section = RescheduleSection::default();
        for action in planned {
            let result = match &action {
                PlannedAction::Cancel { show_id, .. } => {
                    self.repos.shows.cancel_show(show_id).map(|changed| {
                        if changed {
                            None
                        } else {
                            Some("场次状态已变化，未取消".to_string())
                        }
                    })
                }
                PlannedAction::Swap {
                    into_prime,
                    off_prime,
                    into_prime_end,
                    off_prime_end,
                    ..
                } => self
                    .repos
                    .shows
                    .swap_show_times(into_prime, off_prime, *into_prime_end, *off_prime_end)
                    .map(|_| None),
            };

            match result {
                Ok(None) => section.actions.extend(action.to_actions()),
                Ok(Some(reason)) => {
                    for id in action.show_ids() {
                        section.skipped.push((id.to_string(), reason.clone()));
                    }
                }
                Err(e) => {
                    warn!(error = %e, "调度动作执行失败，跳过");
                    for id in action.show_ids() {
                        section.skipped.push((id.to_string(), e.to_string()));
                    }
                }
            }
        }

        info!(
            actions = section.actions.len(),
            skipped = section.skipped.len(),
            "存量调度完成"
        );
        Ok(section)
    }

    fn stage_pricing(&self, context: &PipelineContext) -> EngineResult<PricingSection> {
        let forecasts = context.result.show_forecasts();
        if forecasts.is_empty() {
            return Err(EngineError::missing("pricing", "缺少场次级需求预测"));
        }

        let cancelled: HashSet<&str> = context
            .result
            .reschedule
            .as_ref()
            .map(|r| {
                r.actions
                    .iter()
                    .filter(|a| a.action == RescheduleActionType::Cancelled)
                    .map(|a| a.show_id.as_str())
                    .collect()
            })
            .unwrap_or_default();

        let mut categories_by_screen: HashMap<String, Vec<SeatCategory>> =
            HashMap::new();
        let mut updates = Vec::new();
        for forecast in forecasts {
            if cancelled.contains(forecast.show_id.as_str()) {
                continue;
            }
            let Some(show) = self.repos.shows.find_by_id(&forecast.show_id)? else {
                continue;
            };
            if show.status != ShowStatus::Upcoming {
                continue;
            }

            if !categories_by_screen.contains_key(&show.screen_id) {
                let categories = self.repos.catalog.list_seat_categories(&show.screen_id)?;
                categories_by_screen.insert(show.screen_id.clone(), categories);
            }
            let Some(categories) = categories_by_screen.get(&show.screen_id) else {
                continue;
            };

            let mut priced = Vec::with_capacity(categories.len());
            for category in categories {
                let current = self
                    .repos
                    .prices
                    .current_price(&show.show_id, &category.category_id)?;
                priced.push(CategoryPrice {
                    category: category.clone(),
                    current,
                });
            }
            updates.extend(self.pricing.updates_for_show(
                &show.show_id,
                forecast.forecast_demand,
                show.occupancy(),
                &priced,
            ));
        }

        let applied = self.repos.prices.apply_updates(&updates)?;
        info!(updates = updates.len(), applied, "调价完成");
        Ok(PricingSection { updates })
    }
}

/// 生成本地化运行摘要
fn format_summary(context: &PipelineContext) -> String {
    let result = &context.result;
    let mut lines = Vec::new();

    let confidence = format!("{:.2}", context.decision.confidence);
    lines.push(t_with_args(
        "summary.header",
        &[
            ("run_id", context.run_id.as_str()),
            ("intent", context.intent.as_str()),
            ("confidence", confidence.as_str()),
        ],
    ));

    if let Some(forecast) = &result.forecast {
        let films: BTreeSet<&str> = forecast.forecasts.iter().map(|f| f.movie_id.as_str()).collect();
        let films = films.len().to_string();
        let days = context.forecast_days.to_string();
        let degraded = forecast.degraded_movies.len().to_string();
        lines.push(t_with_args(
            "summary.forecast",
            &[
                ("films", films.as_str()),
                ("days", days.as_str()),
                ("degraded", degraded.as_str()),
            ],
        ));
    }
    if let Some(slots) = &result.slot_forecast {
        let count = slots.slots.len().to_string();
        lines.push(t_with_args("summary.slot_forecast", &[("slots", count.as_str())]));
    }
    if let Some(scheduling) = &result.scheduling {
        let inserted = scheduling.show_ids.len().to_string();
        let skipped = scheduling.skipped_slots.to_string();
        lines.push(t_with_args(
            "summary.scheduling",
            &[("inserted", inserted.as_str()), ("skipped", skipped.as_str())],
        ));
    }
    if let Some(shows) = &result.show_forecast {
        let count = shows.shows.len().to_string();
        let unmatched = shows.unmatched_slot_count.to_string();
        lines.push(t_with_args(
            "summary.show_forecast",
            &[("shows", count.as_str()), ("unmatched", unmatched.as_str())],
        ));
    }
    if let Some(reschedule) = &result.reschedule {
        let actions = reschedule.actions.len().to_string();
        let skipped = reschedule.skipped.len().to_string();
        lines.push(t_with_args(
            "summary.reschedule",
            &[("actions", actions.as_str()), ("skipped", skipped.as_str())],
        ));
    }
    if let Some(pricing) = &result.pricing {
        let updates = pricing.updates.len().to_string();
        lines.push(t_with_args("summary.pricing", &[("updates", updates.as_str())]));
    }

    lines.join("\n")
}
