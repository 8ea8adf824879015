use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, TimeZone, Utc};
use questline_engine::{
    EngineCfg, MemoryQuestStore, PlanStatus, QuestStore, ReplayEngine, StoreError,
};
use questline_game::{ClassType, Hero, HeroId, Quest, QuestEvent, QuestId};
use tokio::task::JoinSet;

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 1, 5, 8, 30, 0).unwrap()
}

/// Thirty minutes at three minutes per event with no jitter plans exactly ten events.
fn ten_event_cfg() -> EngineCfg {
    let mut cfg = EngineCfg::default();
    cfg.game.planner.count_jitter = 0;
    cfg
}

fn hero() -> Hero {
    Hero::new(HeroId::new("hero-1"), ClassType::Warrior)
}

fn quest() -> Quest {
    Quest::new(
        QuestId::new("quest-1"),
        HeroId::new("hero-1"),
        30,
        t0(),
        ClassType::Warrior,
    )
}

fn engine_over(store: &Arc<MemoryQuestStore>) -> ReplayEngine {
    ReplayEngine::new(store.clone(), &ten_event_cfg())
}

async fn full_log(store: &MemoryQuestStore) -> Vec<QuestEvent> {
    store.events(&quest().id).await.unwrap()
}

#[tokio::test]
async fn ten_due_events_are_caught_up_in_one_pass() {
    let store = Arc::new(MemoryQuestStore::new());
    let engine = engine_over(&store);
    let status = engine.ensure_plan_if_missing(&hero(), &quest()).await.unwrap();
    assert_eq!(status, PlanStatus::Created { events: 10 });

    let end = t0() + TimeDelta::minutes(30);
    let report = engine.replay_due_events(&hero(), &quest(), end).await.unwrap();
    assert_eq!(report.appended, 10);
    assert_eq!(report.cursor, Some(9));

    let log = full_log(&store).await;
    assert_eq!(log.iter().map(|e| e.idx).collect::<Vec<_>>(), (0..10).collect::<Vec<_>>());
    let plan = store.plan(&quest().id).await.unwrap();
    for (event, slot) in log.iter().zip(&plan) {
        assert_eq!(event.at, slot.due_at);
        assert_eq!(event.kind, slot.kind);
    }
}

#[tokio::test]
async fn replaying_again_with_no_new_time_is_a_no_op() {
    let store = Arc::new(MemoryQuestStore::new());
    let engine = engine_over(&store);
    engine.ensure_plan_if_missing(&hero(), &quest()).await.unwrap();

    let now = t0() + TimeDelta::minutes(14);
    let first = engine.replay_due_events(&hero(), &quest(), now).await.unwrap();
    let before = full_log(&store).await;
    let second = engine.replay_due_events(&hero(), &quest(), now).await.unwrap();

    assert!(first.appended > 0);
    assert_eq!(second.appended, 0);
    assert_eq!(second.duplicates, 0);
    assert_eq!(second.cursor, first.cursor);
    assert_eq!(full_log(&store).await, before);
}

#[tokio::test]
async fn cursor_tracks_the_highest_resolved_idx() {
    let store = Arc::new(MemoryQuestStore::new());
    let engine = engine_over(&store);
    engine.ensure_plan_if_missing(&hero(), &quest()).await.unwrap();
    let plan = store.plan(&quest().id).await.unwrap();

    assert_eq!(store.last_resolved_event_idx(&quest().id).await.unwrap(), None);
    for slot in &plan {
        let report = engine
            .replay_due_events(&hero(), &quest(), slot.due_at)
            .await
            .unwrap();
        let expected = plan
            .iter()
            .filter(|other| other.due_at <= slot.due_at)
            .map(|other| other.idx)
            .max();
        assert_eq!(report.cursor, expected);
        assert_eq!(
            store.last_resolved_event_idx(&quest().id).await.unwrap(),
            expected
        );
    }
}

#[tokio::test]
async fn interrupted_pass_resumes_after_the_cursor() {
    let end = t0() + TimeDelta::minutes(30);

    let reference = Arc::new(MemoryQuestStore::new());
    let clean = engine_over(&reference);
    clean.ensure_plan_if_missing(&hero(), &quest()).await.unwrap();
    clean.replay_due_events(&hero(), &quest(), end).await.unwrap();

    let store = Arc::new(MemoryQuestStore::new());
    let engine = engine_over(&store);
    engine.ensure_plan_if_missing(&hero(), &quest()).await.unwrap();
    store.fail_appends_after(4);
    let err = engine
        .replay_due_events(&hero(), &quest(), end)
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::Unavailable(_)));
    assert_eq!(store.last_resolved_event_idx(&quest().id).await.unwrap(), Some(3));

    store.heal();
    let resumed = engine.replay_due_events(&hero(), &quest(), end).await.unwrap();
    assert_eq!(resumed.appended, 6);
    assert_eq!(full_log(&store).await, full_log(&reference).await);
}

#[tokio::test]
async fn failed_plan_write_leaves_nothing_behind() {
    let store = Arc::new(MemoryQuestStore::new());
    let engine = engine_over(&store);
    store.fail_plan_writes(true);
    assert!(engine.ensure_plan_if_missing(&hero(), &quest()).await.is_err());
    assert!(store.plan(&quest().id).await.unwrap().is_empty());

    let report = engine
        .replay_due_events(&hero(), &quest(), t0() + TimeDelta::minutes(30))
        .await
        .unwrap();
    assert_eq!(report.appended, 0);

    store.heal();
    assert_eq!(
        engine.ensure_plan_if_missing(&hero(), &quest()).await.unwrap(),
        PlanStatus::Created { events: 10 }
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn overlapping_passes_never_duplicate_plans_or_events() {
    let store = Arc::new(MemoryQuestStore::new().with_latency(Duration::from_millis(2)));
    let engine = Arc::new(engine_over(&store));
    let end = t0() + TimeDelta::minutes(30);

    let mut passes = JoinSet::new();
    for _ in 0..8 {
        let engine = Arc::clone(&engine);
        passes.spawn(async move {
            engine.ensure_plan_if_missing(&hero(), &quest()).await.unwrap();
            engine.replay_due_events(&hero(), &quest(), end).await
        });
    }
    let mut appended = 0;
    while let Some(joined) = passes.join_next().await {
        appended += joined.unwrap().unwrap().appended;
    }

    assert_eq!(store.plans_inserted(), 1);
    assert_eq!(appended, 10);
    let log = full_log(&store).await;
    assert_eq!(log.iter().map(|e| e.idx).collect::<Vec<_>>(), (0..10).collect::<Vec<_>>());
}
