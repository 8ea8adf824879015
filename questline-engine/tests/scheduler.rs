use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, TimeZone, Utc};
use questline_engine::{
    Command, CompletionReport, EngineCfg, EngineError, HeroStore, InMemory, ManualClock,
    MemoryQuestStore, PipelineOutcome, SchedulerHandle, TickScheduler, Trigger,
};
use questline_game::{ClassType, Hero, HeroId, LifecycleError};

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 1, 5, 8, 30, 0).unwrap()
}

async fn wait_for(
    handle: &mut SchedulerHandle,
    wanted: impl Fn(&PipelineOutcome) -> bool,
) -> PipelineOutcome {
    for _ in 0..500 {
        let outcome = handle.next_outcome().await.expect("scheduler is running");
        if wanted(&outcome) {
            return outcome;
        }
    }
    panic!("expected outcome never arrived");
}

fn created_hero(outcome: &PipelineOutcome) -> bool {
    outcome
        .report()
        .is_some_and(|report| report.hero_created.is_some())
}

#[tokio::test(start_paused = true)]
async fn drives_a_quest_from_start_to_completion() {
    let cfg = EngineCfg::default();
    let world = InMemory::new(&cfg);
    let clock = Arc::new(ManualClock::new(t0()));
    let mut handle = TickScheduler::spawn(Arc::new(world.service(cfg)), clock.clone());

    wait_for(&mut handle, created_hero).await;

    handle
        .send(Command::Start {
            duration_minutes: 25,
        })
        .await
        .unwrap();
    let started = wait_for(&mut handle, |outcome| {
        matches!(outcome.trigger(), Trigger::Start { .. })
    })
    .await;
    assert!(started.error().is_none(), "start failed: {started:?}");

    clock.advance(TimeDelta::minutes(25));
    let done = wait_for(&mut handle, |outcome| {
        outcome.report().is_some_and(|report| {
            matches!(report.completion, Some(CompletionReport::Completed { .. }))
        })
    })
    .await;
    assert!(matches!(done.trigger(), Trigger::Tick { .. }));

    handle.shutdown().await;
    let hero = world.heroes.peek().unwrap();
    assert_eq!(hero.xp, 250);
    assert_eq!(hero.total_focus_minutes, 25);
}

#[tokio::test(start_paused = true)]
async fn failures_are_reported_and_the_loop_keeps_running() {
    let cfg = EngineCfg::default();
    let world = InMemory::new(&cfg);
    world.heroes.set_unavailable(true);
    let clock = Arc::new(ManualClock::new(t0()));
    let mut handle = TickScheduler::spawn(Arc::new(world.service(cfg)), clock);

    let failed = wait_for(&mut handle, |outcome| outcome.error().is_some()).await;
    assert!(failed.error().is_some_and(EngineError::is_transient));

    world.heroes.set_unavailable(false);
    wait_for(&mut handle, created_hero).await;

    handle.send(Command::GiveUp).await.unwrap();
    let rejected = wait_for(&mut handle, |outcome| outcome.trigger() == Trigger::GiveUp).await;
    assert_eq!(
        rejected.error(),
        Some(&EngineError::Lifecycle(LifecycleError::NoActiveQuest))
    );

    let later = wait_for(&mut handle, |outcome| {
        matches!(outcome.trigger(), Trigger::Tick { .. }) && outcome.error().is_none()
    })
    .await;
    assert!(later.report().is_some());
    handle.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn shutdown_aborts_in_flight_pipelines() {
    let cfg = EngineCfg::default();
    let world = InMemory::with_quest_store(
        &cfg,
        MemoryQuestStore::new().with_latency(Duration::from_secs(60)),
    );
    world
        .heroes
        .insert_hero(Hero::new(HeroId::new("hero"), ClassType::Mage))
        .await
        .unwrap();
    let clock = Arc::new(ManualClock::new(t0()));
    let handle = TickScheduler::spawn(Arc::new(world.service(cfg)), clock);

    tokio::time::sleep(Duration::from_millis(3_500)).await;
    let undelivered = handle.shutdown().await;
    assert!(undelivered.is_empty());
}
