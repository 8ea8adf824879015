use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, TimeZone, Utc};
use questline_engine::{
    CompletionReport, EngineCfg, EngineError, HeroStore, InMemory, MemoryQuestStore, PlanStatus,
    QuestService, QuestStore, ValidationError,
};
use questline_game::{ClassType, LifecycleError, QuestId, QuestPhase};

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 1, 5, 8, 30, 0).unwrap()
}

fn minutes(n: i64) -> DateTime<Utc> {
    t0() + TimeDelta::minutes(n)
}

fn harness() -> (InMemory, QuestService) {
    let cfg = EngineCfg::default();
    let world = InMemory::new(&cfg);
    let service = world.service(cfg);
    (world, service)
}

/// Hero created and a 25 minute quest started at `t0`.
async fn started(world: &InMemory, service: &QuestService) -> QuestId {
    service.tick(t0()).await.unwrap();
    let report = service.start_quest(25, t0()).await.unwrap();
    assert_eq!(report.view.phase, QuestPhase::Active);
    let quest_id = report.view.quest_id.expect("start reports the new quest");
    assert!(world.quests.quest(&quest_id).await.unwrap().is_some());
    quest_id
}

#[tokio::test]
async fn first_tick_creates_a_default_hero_once() {
    let (world, service) = harness();
    let first = service.tick(t0()).await.unwrap();
    assert!(first.hero_created.is_some());
    assert_eq!(first.view.phase, QuestPhase::Idle);

    let second = service.tick(minutes(1)).await.unwrap();
    assert!(second.hero_created.is_none());
    let hero = world.heroes.peek().unwrap();
    assert_eq!(hero.class_type, ClassType::Warrior);
    assert_eq!(hero.level, 1);
}

#[tokio::test]
async fn start_plans_and_schedules_the_end_notification() {
    let (world, service) = harness();
    let quest_id = started(&world, &service).await;
    assert!(!world.quests.plan(&quest_id).await.unwrap().is_empty());
    assert_eq!(world.notifier.pending(&quest_id), Some(minutes(25)));
}

#[tokio::test]
async fn starting_while_active_is_rejected_without_writes() {
    let (world, service) = harness();
    let quest_id = started(&world, &service).await;

    let err = service.start_quest(10, minutes(3)).await.unwrap_err();
    assert_eq!(
        err,
        EngineError::Lifecycle(LifecycleError::QuestAlreadyActive(quest_id.clone()))
    );
    let hero = world.heroes.peek().unwrap();
    let latest = world.quests.latest_quest(&hero.id).await.unwrap().unwrap();
    assert_eq!(latest.id, quest_id);
    assert_eq!(latest.duration_minutes, 25);
}

#[tokio::test]
async fn ticks_catch_up_the_feed_and_complete_due_quests() {
    let (world, service) = harness();
    let quest_id = started(&world, &service).await;
    let plan = world.quests.plan(&quest_id).await.unwrap();

    let mid = service.tick(minutes(12)).await.unwrap();
    let due_by_mid = plan.iter().filter(|slot| slot.due_at <= minutes(12)).count();
    assert_eq!(mid.view.phase, QuestPhase::Active);
    assert_eq!(mid.replay.unwrap().appended as usize, due_by_mid);

    let end = service.tick(minutes(25)).await.unwrap();
    assert_eq!(end.view.phase, QuestPhase::Completed);
    assert_eq!(
        world.quests.events(&quest_id).await.unwrap().len(),
        plan.len()
    );
    let loot = *end.completion.as_ref().and_then(CompletionReport::loot).unwrap();
    assert_eq!((loot.xp, loot.gold, loot.focus_minutes), (250, 50, 25));

    let hero = world.heroes.peek().unwrap();
    assert_eq!((hero.xp, hero.gold, hero.total_focus_minutes), (250, 50, 25));
    assert_eq!(hero.level, 2);
    let quest = world.quests.quest(&quest_id).await.unwrap().unwrap();
    assert!(quest.completed && quest.server_validated);
    assert_eq!(quest.end_time, Some(minutes(25)));
    assert_eq!(world.notifier.pending(&quest_id), None);
}

#[tokio::test]
async fn completing_twice_applies_loot_once() {
    let (world, service) = harness();
    started(&world, &service).await;

    service.complete(minutes(25)).await.unwrap();
    let after_first = world.heroes.peek().unwrap();
    let again = service.complete(minutes(26)).await.unwrap();
    assert!(again.completion.is_none());
    service.tick(minutes(27)).await.unwrap();
    assert_eq!(world.heroes.peek().unwrap(), after_first);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_completions_apply_loot_once() {
    let cfg = EngineCfg::default();
    let world = InMemory::with_quest_store(
        &cfg,
        MemoryQuestStore::new().with_latency(Duration::from_millis(2)),
    );
    let service = Arc::new(world.service(cfg));
    let quest_id = started(&world, &service).await;

    let mut handles = Vec::new();
    for _ in 0..6 {
        let service = Arc::clone(&service);
        let quest_id = quest_id.clone();
        handles.push(tokio::spawn(async move {
            service.complete_quest(&quest_id, minutes(25)).await
        }));
    }
    let mut completed = 0;
    for handle in handles {
        if let CompletionReport::Completed { .. } = handle.await.unwrap().unwrap() {
            completed += 1;
        }
    }
    assert_eq!(completed, 1);
    assert_eq!(world.heroes.peek().unwrap().xp, 250);
}

#[tokio::test]
async fn validator_failure_keeps_the_quest_active() {
    let (world, service) = harness();
    let quest_id = started(&world, &service).await;

    world.validator.set_offline(true);
    let err = service.complete(minutes(25)).await.unwrap_err();
    assert!(matches!(
        err,
        EngineError::Validation(ValidationError::Unreachable(_))
    ));
    assert!(err.is_transient());
    let quest = world.quests.quest(&quest_id).await.unwrap().unwrap();
    assert!(quest.is_active());
    assert_eq!(world.heroes.peek().unwrap().xp, 0);
    assert_eq!(world.notifier.pending(&quest_id), Some(minutes(25)));

    world.validator.set_offline(false);
    let report = service.tick(minutes(26)).await.unwrap();
    assert!(matches!(
        report.completion,
        Some(CompletionReport::Completed { .. })
    ));
}

#[tokio::test]
async fn giving_up_starts_a_cooldown_for_the_quest_duration() {
    let (world, service) = harness();
    let quest_id = started(&world, &service).await;

    let report = service.give_up(minutes(7)).await.unwrap();
    assert_eq!(report.view.phase, QuestPhase::GaveUp);
    let quest = world.quests.quest(&quest_id).await.unwrap().unwrap();
    assert!(quest.gave_up && !quest.completed);
    assert_eq!(quest.end_time, Some(minutes(7)));
    assert_eq!(world.notifier.pending(&quest_id), None);

    let hero = world.heroes.peek().unwrap();
    assert!(hero.in_cooldown);
    assert_eq!(hero.cooldown_end_time, Some(minutes(32)));
    assert_eq!(hero.xp, 0);

    let err = service.start_quest(10, minutes(31)).await.unwrap_err();
    assert_eq!(
        err,
        EngineError::Lifecycle(LifecycleError::HeroInCooldown { until: minutes(32) })
    );
    let cooling = service.tick(minutes(31)).await.unwrap();
    assert_eq!(cooling.view.phase, QuestPhase::Cooldown);
    assert_eq!(cooling.view.cooldown_remaining_secs, 60);

    let idle = service.tick(minutes(32)).await.unwrap();
    assert_eq!(idle.view.phase, QuestPhase::Idle);
    let hero = world.heroes.current_hero().await.unwrap().unwrap();
    assert!(!hero.in_cooldown);
    assert_eq!(hero.cooldown_end_time, None);

    service.start_quest(10, minutes(33)).await.unwrap();
}

#[tokio::test]
async fn intents_without_an_active_quest_are_rejected() {
    let (_world, service) = harness();
    assert_eq!(
        service.complete(t0()).await.unwrap_err(),
        EngineError::Lifecycle(LifecycleError::NoHero)
    );
    service.tick(t0()).await.unwrap();
    assert_eq!(
        service.give_up(t0()).await.unwrap_err(),
        EngineError::Lifecycle(LifecycleError::NoActiveQuest)
    );
}

#[tokio::test]
async fn transient_store_failures_heal_on_a_later_tick() {
    let (world, service) = harness();
    let quest_id = started(&world, &service).await;

    world.quests.set_unavailable(true);
    let err = service.tick(minutes(10)).await.unwrap_err();
    assert!(err.is_transient());

    world.quests.set_unavailable(false);
    let report = service.tick(minutes(10)).await.unwrap();
    let plan = world.quests.plan(&quest_id).await.unwrap();
    let due = plan.iter().filter(|slot| slot.due_at <= minutes(10)).count();
    assert_eq!(report.replay.unwrap().cursor.map(|c| c as usize + 1), (due > 0).then_some(due));
}

#[tokio::test(start_paused = true)]
async fn give_up_losing_to_a_completion_keeps_the_loot() {
    let cfg = EngineCfg::default();
    let world = InMemory::with_quest_store(
        &cfg,
        MemoryQuestStore::new().with_latency(Duration::from_millis(10)),
    );
    let finisher = world.service(cfg.clone());
    let quitter = world.service(cfg);
    let quest_id = started(&world, &finisher).await;

    let (completion, gave_up) = tokio::join!(
        finisher.complete_quest(&quest_id, minutes(25)),
        async {
            tokio::time::sleep(Duration::from_millis(5)).await;
            quitter.give_up(minutes(25)).await
        }
    );

    assert!(matches!(
        completion.unwrap(),
        CompletionReport::Completed { .. }
    ));
    assert_eq!(
        gave_up.unwrap_err(),
        EngineError::Lifecycle(LifecycleError::NoActiveQuest)
    );
    let quest = world.quests.quest(&quest_id).await.unwrap().unwrap();
    assert!(quest.completed && !quest.gave_up);
    let hero = world.heroes.peek().unwrap();
    assert_eq!((hero.xp, hero.gold, hero.total_focus_minutes), (250, 50, 25));
    assert!(!hero.in_cooldown);
    assert_eq!(hero.cooldown_end_time, None);
}

#[tokio::test]
async fn failed_plan_write_on_start_is_repaired_by_the_next_tick() {
    let (world, service) = harness();
    service.tick(t0()).await.unwrap();
    world.quests.fail_plan_writes(true);

    let report = service.start_quest(25, t0()).await.unwrap();
    assert_eq!(report.view.phase, QuestPhase::Active);
    assert!(report.plan.is_none());
    let quest_id = report.view.quest_id.unwrap();
    assert!(world.quests.plan(&quest_id).await.unwrap().is_empty());
    assert_eq!(world.notifier.pending(&quest_id), Some(minutes(25)));

    world.quests.fail_plan_writes(false);
    let next = service.tick(minutes(1)).await.unwrap();
    assert!(matches!(next.plan, Some(PlanStatus::Created { .. })));
    assert!(!world.quests.plan(&quest_id).await.unwrap().is_empty());
}
