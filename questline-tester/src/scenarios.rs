use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail, ensure};
use chrono::{DateTime, TimeDelta, Utc};
use questline_engine::{
    Command, CompletionReport, EngineCfg, EngineError, InMemory, ManualClock, MemoryQuestStore,
    PipelineOutcome, QuestService, QuestStore, ReplayEngine, SchedulerHandle, TickScheduler,
    Trigger,
};
use questline_game::{
    ClassType, EventKind, EventOutcome, Hero, HeroId, LifecycleError, Msg, PlanSpec, Quest,
    QuestEvent, QuestId, QuestPhase, ResolveContext, RewardTally, plan_with, resolve,
    resolve_context_for,
};
use tokio::task::JoinSet;

/// 2026-01-05T08:30:00Z
const BASE_EPOCH_SECS: i64 = 1_767_601_800;
const SCHEDULER_TIMEOUT: Duration = Duration::from_secs(10);

/// Inputs shared by every scenario iteration.
#[derive(Debug, Clone)]
pub struct ScenarioCtx {
    pub seed: u64,
    pub duration_minutes: u32,
    pub class_type: ClassType,
    pub cfg: EngineCfg,
}

impl ScenarioCtx {
    fn start_at(&self) -> Result<DateTime<Utc>> {
        let offset = i64::try_from(self.seed % 86_400).unwrap_or(0);
        DateTime::from_timestamp(BASE_EPOCH_SECS + offset, 0).context("start time out of range")
    }

    fn hero_level(&self) -> u32 {
        u32::try_from(self.seed % 10).unwrap_or(0) + 1
    }

    fn hero(&self) -> Hero {
        let mut hero = Hero::new(HeroId::new(format!("hero-{:016x}", self.seed)), self.class_type);
        hero.level = self.hero_level();
        hero
    }

    fn quest_id(&self) -> QuestId {
        QuestId::new(format!("quest-{:016x}", self.seed))
    }

    fn quest(&self) -> Result<Quest> {
        Ok(Quest::new(
            self.quest_id(),
            self.hero().id,
            self.duration_minutes,
            self.start_at()?,
            self.class_type,
        ))
    }

    fn engine_cfg(&self) -> EngineCfg {
        let mut cfg = self.cfg.clone();
        cfg.game.lifecycle.default_class = self.class_type;
        cfg
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scenario {
    PlanDeterminism,
    ResolverDeterminism,
    CatchUp,
    IdempotentReplay,
    CrashResume,
    OverlappingTicks,
    LifecycleGuards,
    SchedulerLoop,
}

impl Scenario {
    pub const ALL: [Self; 8] = [
        Self::PlanDeterminism,
        Self::ResolverDeterminism,
        Self::CatchUp,
        Self::IdempotentReplay,
        Self::CrashResume,
        Self::OverlappingTicks,
        Self::LifecycleGuards,
        Self::SchedulerLoop,
    ];

    pub const fn key(self) -> &'static str {
        match self {
            Self::PlanDeterminism => "plan-determinism",
            Self::ResolverDeterminism => "resolver-determinism",
            Self::CatchUp => "catch-up",
            Self::IdempotentReplay => "idempotent-replay",
            Self::CrashResume => "crash-resume",
            Self::OverlappingTicks => "overlapping-ticks",
            Self::LifecycleGuards => "lifecycle-guards",
            Self::SchedulerLoop => "scheduler-loop",
        }
    }

    pub const fn description(self) -> &'static str {
        match self {
            Self::PlanDeterminism => "Same seed plans the same timeline within the quest window",
            Self::ResolverDeterminism => "Same slot resolves to the same rewards and outcome",
            Self::CatchUp => "One pass resolves every due event in idx order",
            Self::IdempotentReplay => "A second pass with no new time appends nothing",
            Self::CrashResume => "A pass cut short resumes at cursor + 1 without drift",
            Self::OverlappingTicks => "Concurrent ticks never duplicate plans, events or loot",
            Self::LifecycleGuards => "Illegal starts are rejected and cooldowns expire on time",
            Self::SchedulerLoop => "The tick scheduler drives a quest to completion",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|scenario| scenario.key().eq_ignore_ascii_case(key.trim()))
    }

    /// Run one iteration, returning a short summary line on success.
    pub async fn run(self, ctx: &ScenarioCtx) -> Result<String> {
        match self {
            Self::PlanDeterminism => plan_determinism(ctx),
            Self::ResolverDeterminism => resolver_determinism(ctx),
            Self::CatchUp => catch_up(ctx).await,
            Self::IdempotentReplay => idempotent_replay(ctx).await,
            Self::CrashResume => crash_resume(ctx).await,
            Self::OverlappingTicks => overlapping_ticks(ctx).await,
            Self::LifecycleGuards => lifecycle_guards(ctx).await,
            Self::SchedulerLoop => scheduler_loop(ctx).await,
        }
    }
}

fn plan_spec(ctx: &ScenarioCtx) -> Result<PlanSpec> {
    Ok(PlanSpec {
        duration_minutes: ctx.duration_minutes,
        seed: ctx.seed,
        start_at: ctx.start_at()?,
        hero_level: ctx.hero_level(),
        class_type: ctx.class_type,
    })
}

fn plan_determinism(ctx: &ScenarioCtx) -> Result<String> {
    let spec = plan_spec(ctx)?;
    let quest_id = ctx.quest_id();
    let first = plan_with(&quest_id, &spec, &ctx.cfg.game.planner);
    let second = plan_with(&quest_id, &spec, &ctx.cfg.game.planner);
    ensure!(first == second, "two plans from one spec differ");
    ensure!(!first.is_empty(), "a {} minute quest planned nothing", spec.duration_minutes);

    let end = spec.start_at + TimeDelta::minutes(i64::from(spec.duration_minutes));
    for (position, event) in first.iter().enumerate() {
        ensure!(
            usize::try_from(event.idx).ok() == Some(position),
            "idx {} at position {position}",
            event.idx
        );
        ensure!(
            (spec.start_at..=end).contains(&event.due_at),
            "event {} due at {} outside the quest window",
            event.idx,
            event.due_at
        );
        ensure!(
            (event.kind == EventKind::Mob) == event.mob_tier.is_some(),
            "event {} has a mob tier mismatch",
            event.idx
        );
    }
    ensure!(
        first.windows(2).all(|pair| pair[0].due_at <= pair[1].due_at),
        "due times decrease"
    );
    ensure!(
        first.last().is_some_and(|event| event.is_major),
        "final event is not major"
    );
    Ok(format!("{} events", first.len()))
}

fn resolver_determinism(ctx: &ScenarioCtx) -> Result<String> {
    let spec = plan_spec(ctx)?;
    let quest_id = ctx.quest_id();
    let plan = plan_with(&quest_id, &spec, &ctx.cfg.game.planner);
    let resolve_ctx = ResolveContext {
        quest_id,
        base_seed: ctx.seed,
        hero_level: ctx.hero_level(),
        class_type: ctx.class_type,
    };

    let mut resolved = Vec::with_capacity(plan.len());
    for planned in &plan {
        let first = resolve(&resolve_ctx, planned, planned.due_at);
        let second = resolve(&resolve_ctx, planned, spec.start_at);
        ensure!(
            first.same_resolution(&second),
            "event {} resolved differently",
            planned.idx
        );
        let fought = !matches!(first.outcome, EventOutcome::None);
        ensure!(
            fought == (planned.kind == EventKind::Mob),
            "event {} ({}) has outcome {:?}",
            planned.idx,
            planned.kind.label(),
            first.outcome
        );
        resolved.push(first);
    }
    let tally = RewardTally::of(&resolved);
    Ok(format!(
        "{} events, {} xp, {} gold, {}W/{}F",
        tally.events, tally.xp, tally.gold, tally.wins, tally.flees
    ))
}

struct ReplayFixture {
    store: Arc<MemoryQuestStore>,
    engine: ReplayEngine,
    hero: Hero,
    quest: Quest,
}

impl ReplayFixture {
    fn new(ctx: &ScenarioCtx) -> Result<Self> {
        let store = Arc::new(MemoryQuestStore::new());
        let engine = ReplayEngine::new(store.clone(), &ctx.cfg);
        Ok(Self {
            store,
            engine,
            hero: ctx.hero(),
            quest: ctx.quest()?,
        })
    }

    async fn planned(&self) -> Result<usize> {
        let status = self
            .engine
            .ensure_plan_if_missing(&self.hero, &self.quest)
            .await?;
        Ok(status.events())
    }

    async fn log(&self) -> Result<Vec<QuestEvent>> {
        Ok(self.store.events(&self.quest.id).await?)
    }
}

async fn catch_up(ctx: &ScenarioCtx) -> Result<String> {
    let fixture = ReplayFixture::new(ctx)?;
    let planned = fixture.planned().await?;
    let end = fixture.quest.planned_end();
    let report = fixture
        .engine
        .replay_due_events(&fixture.hero, &fixture.quest, end)
        .await?;
    ensure!(
        usize::try_from(report.appended).ok() == Some(planned),
        "one pass appended {} of {planned} events",
        report.appended
    );

    let plan = fixture.store.plan(&fixture.quest.id).await?;
    let log = fixture.log().await?;
    let resolve_ctx = resolve_context_for(&fixture.quest, fixture.hero.level);
    for (event, slot) in log.iter().zip(&plan) {
        let expected = resolve(&resolve_ctx, slot, slot.due_at);
        ensure!(
            *event == expected,
            "logged event {} differs from a fresh resolution",
            slot.idx
        );
    }
    ensure!(log.len() == plan.len(), "log has {} of {} events", log.len(), plan.len());
    Ok(format!("{planned} events caught up"))
}

async fn idempotent_replay(ctx: &ScenarioCtx) -> Result<String> {
    let fixture = ReplayFixture::new(ctx)?;
    fixture.planned().await?;
    let midpoint = fixture.quest.start_time + fixture.quest.duration() / 2;

    let first = fixture
        .engine
        .replay_due_events(&fixture.hero, &fixture.quest, midpoint)
        .await?;
    let snapshot = fixture.log().await?;
    let second = fixture
        .engine
        .replay_due_events(&fixture.hero, &fixture.quest, midpoint)
        .await?;
    ensure!(second.appended == 0, "repeat pass appended {}", second.appended);
    ensure!(fixture.log().await? == snapshot, "repeat pass changed the log");
    ensure!(second.cursor == first.cursor, "cursor moved without new time");
    Ok(format!("cursor {:?}", first.cursor))
}

async fn crash_resume(ctx: &ScenarioCtx) -> Result<String> {
    let reference = ReplayFixture::new(ctx)?;
    let planned = reference.planned().await?;
    let end = reference.quest.planned_end();
    reference
        .engine
        .replay_due_events(&reference.hero, &reference.quest, end)
        .await?;
    if planned < 2 {
        return Ok(String::from("plan too short to interrupt"));
    }

    let fixture = ReplayFixture::new(ctx)?;
    fixture.planned().await?;
    let budget = usize::try_from(ctx.seed).unwrap_or(0) % planned;
    fixture.store.fail_appends_after(budget);
    if fixture
        .engine
        .replay_due_events(&fixture.hero, &fixture.quest, end)
        .await
        .is_ok()
    {
        bail!("interrupted pass reported success");
    }
    let cursor = fixture.store.last_resolved_event_idx(&fixture.quest.id).await?;
    let expected_cursor = budget.checked_sub(1).and_then(|c| u32::try_from(c).ok());
    ensure!(
        cursor == expected_cursor,
        "cursor {cursor:?} after {budget} appends"
    );

    fixture.store.heal();
    let resumed = fixture
        .engine
        .replay_due_events(&fixture.hero, &fixture.quest, end)
        .await?;
    ensure!(
        usize::try_from(resumed.appended).ok() == Some(planned - budget),
        "resume appended {} instead of {}",
        resumed.appended,
        planned - budget
    );
    ensure!(
        fixture.log().await? == reference.log().await?,
        "resumed log differs from an uninterrupted run"
    );
    Ok(format!("resumed after {budget} of {planned}"))
}

fn service_over(ctx: &ScenarioCtx, quests: MemoryQuestStore) -> (InMemory, Arc<QuestService>) {
    let cfg = ctx.engine_cfg();
    let world = InMemory::with_quest_store(&cfg, quests);
    let service = Arc::new(world.service(cfg));
    (world, service)
}

/// Creates the hero and starts the scenario quest at `start_at`.
async fn start_scenario_quest(ctx: &ScenarioCtx, service: &QuestService) -> Result<QuestId> {
    let start_at = ctx.start_at()?;
    service.tick(start_at).await?;
    let quest_id = ctx.quest_id();
    let msg = Msg::Start {
        quest_id: quest_id.clone(),
        duration_minutes: ctx.duration_minutes,
    };
    service.handle(&msg, start_at).await?;
    Ok(quest_id)
}

async fn overlapping_ticks(ctx: &ScenarioCtx) -> Result<String> {
    let (world, service) =
        service_over(ctx, MemoryQuestStore::new().with_latency(Duration::from_millis(1)));
    let quest_id = start_scenario_quest(ctx, &service).await?;
    let end = ctx.start_at()? + TimeDelta::minutes(i64::from(ctx.duration_minutes));

    let mut ticks = JoinSet::new();
    for _ in 0..6 {
        let service = Arc::clone(&service);
        ticks.spawn(async move { service.tick(end).await });
    }
    let mut completions = 0;
    while let Some(joined) = ticks.join_next().await {
        let report = joined.context("tick task panicked")??;
        if let Some(CompletionReport::Completed { .. }) = report.completion {
            completions += 1;
        }
    }

    let plan = world.quests.plan(&quest_id).await?;
    let log = world.quests.events(&quest_id).await?;
    let hero = world.heroes.peek().context("hero missing")?;
    let plans_inserted = world.quests.plans_inserted();
    ensure!(plans_inserted == 1, "plan written {plans_inserted} times");
    ensure!(log.len() == plan.len(), "log has {} of {} events", log.len(), plan.len());
    ensure!(completions == 1, "quest completed {completions} times");
    ensure!(
        hero.total_focus_minutes == u64::from(ctx.duration_minutes),
        "hero credited {} focus minutes",
        hero.total_focus_minutes
    );
    Ok(format!(
        "{} events, {} duplicate appends absorbed",
        log.len(),
        world.quests.duplicate_appends()
    ))
}

async fn lifecycle_guards(ctx: &ScenarioCtx) -> Result<String> {
    let (world, service) = service_over(ctx, MemoryQuestStore::new());
    let quest_id = start_scenario_quest(ctx, &service).await?;
    let start_at = ctx.start_at()?;

    match service.start_quest(ctx.duration_minutes, start_at).await {
        Err(EngineError::Lifecycle(LifecycleError::QuestAlreadyActive(active)))
            if active == quest_id => {}
        other => bail!("second start was not rejected: {other:?}"),
    }

    let gave_up_at = start_at + TimeDelta::minutes(1);
    service.give_up(gave_up_at).await?;
    let until = gave_up_at + TimeDelta::minutes(i64::from(ctx.duration_minutes));
    let hero = world.heroes.peek().context("hero missing")?;
    ensure!(
        hero.in_cooldown && hero.cooldown_end_time == Some(until),
        "cooldown ends at {:?}, expected {until}",
        hero.cooldown_end_time
    );

    match service.start_quest(ctx.duration_minutes, until - TimeDelta::seconds(1)).await {
        Err(EngineError::Lifecycle(LifecycleError::HeroInCooldown { until: reported }))
            if reported == until => {}
        other => bail!("start during cooldown was not rejected: {other:?}"),
    }

    let report = service.tick(until).await?;
    ensure!(
        report.view.phase == QuestPhase::Idle,
        "phase {:?} once the cooldown elapsed",
        report.view.phase
    );
    service.start_quest(ctx.duration_minutes, until).await?;
    Ok(String::from("guards held"))
}

async fn wait_for(
    handle: &mut SchedulerHandle,
    wanted: impl Fn(&PipelineOutcome) -> bool,
) -> Result<PipelineOutcome> {
    let next = async {
        while let Some(outcome) = handle.next_outcome().await {
            if wanted(&outcome) {
                return Some(outcome);
            }
        }
        None
    };
    tokio::time::timeout(SCHEDULER_TIMEOUT, next)
        .await
        .context("scheduler timed out")?
        .context("scheduler stopped early")
}

async fn scheduler_loop(ctx: &ScenarioCtx) -> Result<String> {
    let mut cfg = ctx.engine_cfg();
    cfg.tick_interval_ms = 10;
    let world = InMemory::new(&cfg);
    let clock = Arc::new(ManualClock::new(ctx.start_at()?));
    let mut handle = TickScheduler::spawn(Arc::new(world.service(cfg)), clock.clone());

    wait_for(&mut handle, |outcome| {
        outcome
            .report()
            .is_some_and(|report| report.hero_created.is_some())
    })
    .await?;
    handle
        .send(Command::Start {
            duration_minutes: ctx.duration_minutes,
        })
        .await?;
    let started = wait_for(&mut handle, |outcome| {
        matches!(outcome.trigger(), Trigger::Start { .. })
    })
    .await?;
    if let Some(err) = started.error() {
        bail!("start failed: {err}");
    }

    clock.advance(TimeDelta::minutes(i64::from(ctx.duration_minutes)));
    let done = wait_for(&mut handle, |outcome| {
        outcome.report().is_some_and(|report| {
            matches!(report.completion, Some(CompletionReport::Completed { .. }))
        })
    })
    .await?;
    handle.shutdown().await;

    let hero = world.heroes.peek().context("hero missing")?;
    ensure!(hero.class_type == ctx.class_type, "hero created as {}", hero.class_type);
    Ok(format!("completed on {:?}, level {}", done.trigger(), hero.level))
}
