//! In-memory reference stores.
//!
//! Both stores enforce the same constraints a durable backend must offer
//! (single plan per quest, unique gap-free event idx, one active quest per
//! hero, compare-and-set closing) and expose fault injection so crash and
//! transient-failure paths can be exercised without a real database.
use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use questline_game::{Hero, HeroId, PlannedEvent, Quest, QuestEvent, QuestId};

use crate::error::StoreError;
use crate::store::{AppendResult, HeroStore, PlanWrite, QuestClosure, QuestStore};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Injected failures, shared by both stores.
#[derive(Debug, Default, Clone)]
struct Faults {
    unavailable: bool,
    fail_plan_writes: bool,
    /// Appends still allowed before every further append fails.
    append_budget: Option<usize>,
    latency: Option<Duration>,
}

impl Faults {
    fn check_available(&self) -> Result<(), StoreError> {
        if self.unavailable {
            return Err(StoreError::Unavailable(String::from("store offline")));
        }
        Ok(())
    }
}

async fn simulate_latency(faults: &Mutex<Faults>) {
    let latency = lock(faults).latency;
    if let Some(latency) = latency {
        tokio::time::sleep(latency).await;
    }
}

#[derive(Debug, Default)]
pub struct MemoryHeroStore {
    hero: Mutex<Option<Hero>>,
    faults: Mutex<Faults>,
}

impl MemoryHeroStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_hero(hero: Hero) -> Self {
        Self {
            hero: Mutex::new(Some(hero)),
            faults: Mutex::default(),
        }
    }

    /// Make every operation fail with `StoreError::Unavailable`.
    pub fn set_unavailable(&self, unavailable: bool) {
        lock(&self.faults).unavailable = unavailable;
    }

    /// Stored hero, bypassing fault injection.
    #[must_use]
    pub fn peek(&self) -> Option<Hero> {
        lock(&self.hero).clone()
    }
}

#[async_trait]
impl HeroStore for MemoryHeroStore {
    async fn current_hero(&self) -> Result<Option<Hero>, StoreError> {
        lock(&self.faults).check_available()?;
        Ok(lock(&self.hero).clone())
    }

    async fn insert_hero(&self, hero: Hero) -> Result<Hero, StoreError> {
        lock(&self.faults).check_available()?;
        let mut slot = lock(&self.hero);
        Ok(slot.get_or_insert(hero).clone())
    }

    async fn update_hero(&self, hero: &Hero) -> Result<(), StoreError> {
        lock(&self.faults).check_available()?;
        let mut slot = lock(&self.hero);
        match slot.as_mut() {
            Some(existing) if existing.id == hero.id => {
                *existing = hero.clone();
                Ok(())
            }
            Some(existing) => Err(StoreError::Conflict(format!(
                "hero {} is not the stored hero {}",
                hero.id, existing.id
            ))),
            None => Err(StoreError::Conflict(format!("hero {} does not exist", hero.id))),
        }
    }
}

#[derive(Debug, Default)]
struct QuestTables {
    /// Insertion order doubles as start order.
    quests: Vec<Quest>,
    plans: HashMap<QuestId, Vec<PlannedEvent>>,
    events: HashMap<QuestId, BTreeMap<u32, QuestEvent>>,
    plans_inserted: usize,
    duplicate_appends: usize,
}

impl QuestTables {
    fn quest_mut(&mut self, quest_id: &QuestId) -> Result<&mut Quest, StoreError> {
        self.quests
            .iter_mut()
            .find(|quest| &quest.id == quest_id)
            .ok_or_else(|| StoreError::QuestNotFound(quest_id.clone()))
    }
}

#[derive(Debug, Default)]
pub struct MemoryQuestStore {
    tables: Mutex<QuestTables>,
    faults: Mutex<Faults>,
}

impl MemoryQuestStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a delay before every operation so concurrent callers interleave.
    #[must_use]
    pub fn with_latency(self, latency: Duration) -> Self {
        lock(&self.faults).latency = Some(latency);
        self
    }

    /// Make every operation fail with `StoreError::Unavailable`.
    pub fn set_unavailable(&self, unavailable: bool) {
        lock(&self.faults).unavailable = unavailable;
    }

    /// Reject plan writes with `StoreError::Unavailable`.
    pub fn fail_plan_writes(&self, fail: bool) {
        lock(&self.faults).fail_plan_writes = fail;
    }

    /// Allow `budget` more appends, then fail every later append as if the
    /// process died mid-pass.
    pub fn fail_appends_after(&self, budget: usize) {
        lock(&self.faults).append_budget = Some(budget);
    }

    /// Clear every injected fault.
    pub fn heal(&self) {
        let mut faults = lock(&self.faults);
        let latency = faults.latency;
        *faults = Faults {
            latency,
            ..Faults::default()
        };
    }

    /// Plans actually written, excluding `AlreadyPresent` rejections.
    #[must_use]
    pub fn plans_inserted(&self) -> usize {
        lock(&self.tables).plans_inserted
    }

    /// Appends rejected because the idx was already present.
    #[must_use]
    pub fn duplicate_appends(&self) -> usize {
        lock(&self.tables).duplicate_appends
    }

    fn check_available(&self) -> Result<(), StoreError> {
        lock(&self.faults).check_available()
    }
}

#[async_trait]
impl QuestStore for MemoryQuestStore {
    async fn insert_quest(&self, quest: &Quest) -> Result<(), StoreError> {
        simulate_latency(&self.faults).await;
        self.check_available()?;
        let mut tables = lock(&self.tables);
        if tables.quests.iter().any(|existing| existing.id == quest.id) {
            return Err(StoreError::Conflict(format!("quest {} already exists", quest.id)));
        }
        if let Some(active) = tables
            .quests
            .iter()
            .find(|existing| existing.hero_id == quest.hero_id && existing.is_active())
        {
            return Err(StoreError::Conflict(format!(
                "hero {} already has active quest {}",
                quest.hero_id, active.id
            )));
        }
        tables.quests.push(quest.clone());
        Ok(())
    }

    async fn update_quest(&self, quest: &Quest) -> Result<(), StoreError> {
        simulate_latency(&self.faults).await;
        self.check_available()?;
        let mut tables = lock(&self.tables);
        *tables.quest_mut(&quest.id)? = quest.clone();
        Ok(())
    }

    async fn close_quest(
        &self,
        quest_id: &QuestId,
        closure: QuestClosure,
    ) -> Result<bool, StoreError> {
        simulate_latency(&self.faults).await;
        self.check_available()?;
        let mut tables = lock(&self.tables);
        let quest = tables.quest_mut(quest_id)?;
        if !quest.is_active() {
            return Ok(false);
        }
        closure.apply(quest);
        Ok(true)
    }

    async fn quest(&self, quest_id: &QuestId) -> Result<Option<Quest>, StoreError> {
        simulate_latency(&self.faults).await;
        self.check_available()?;
        let tables = lock(&self.tables);
        Ok(tables.quests.iter().find(|quest| &quest.id == quest_id).cloned())
    }

    async fn latest_quest(&self, hero_id: &HeroId) -> Result<Option<Quest>, StoreError> {
        simulate_latency(&self.faults).await;
        self.check_available()?;
        let tables = lock(&self.tables);
        Ok(tables
            .quests
            .iter()
            .rev()
            .find(|quest| &quest.hero_id == hero_id)
            .cloned())
    }

    async fn save_plan(
        &self,
        quest_id: &QuestId,
        plan: &[PlannedEvent],
    ) -> Result<PlanWrite, StoreError> {
        simulate_latency(&self.faults).await;
        {
            let faults = lock(&self.faults);
            faults.check_available()?;
            if faults.fail_plan_writes {
                return Err(StoreError::Unavailable(String::from("plan write failed")));
            }
        }
        if plan.iter().any(|event| &event.quest_id != quest_id) {
            return Err(StoreError::Conflict(format!(
                "plan for {quest_id} contains foreign events"
            )));
        }
        let mut tables = lock(&self.tables);
        if tables.plans.contains_key(quest_id) {
            return Ok(PlanWrite::AlreadyPresent);
        }
        let mut rows = plan.to_vec();
        rows.sort_by_key(|event| event.idx);
        tables.plans.insert(quest_id.clone(), rows);
        tables.plans_inserted += 1;
        Ok(PlanWrite::Inserted)
    }

    async fn plan(&self, quest_id: &QuestId) -> Result<Vec<PlannedEvent>, StoreError> {
        simulate_latency(&self.faults).await;
        self.check_available()?;
        let tables = lock(&self.tables);
        Ok(tables.plans.get(quest_id).cloned().unwrap_or_default())
    }

    async fn append_event(&self, event: &QuestEvent) -> Result<AppendResult, StoreError> {
        simulate_latency(&self.faults).await;
        {
            let mut faults = lock(&self.faults);
            faults.check_available()?;
            if let Some(budget) = faults.append_budget.as_mut() {
                if *budget == 0 {
                    return Err(StoreError::Unavailable(format!(
                        "append of {}#{} lost",
                        event.quest_id, event.idx
                    )));
                }
                *budget -= 1;
            }
        }

        let mut guard = lock(&self.tables);
        let tables = &mut *guard;
        let planned = tables
            .plans
            .get(&event.quest_id)
            .is_some_and(|plan| plan.iter().any(|slot| slot.idx == event.idx));
        if !planned {
            return Err(StoreError::Conflict(format!(
                "{}#{} has no planned slot",
                event.quest_id, event.idx
            )));
        }

        let log = tables.events.entry(event.quest_id.clone()).or_default();
        if log.contains_key(&event.idx) {
            tables.duplicate_appends += 1;
            return Ok(AppendResult::Duplicate);
        }
        let next = log.keys().next_back().map_or(0, |last| last + 1);
        if event.idx != next {
            return Err(StoreError::Conflict(format!(
                "{}#{} would leave a gap (next is {next})",
                event.quest_id, event.idx
            )));
        }
        log.insert(event.idx, event.clone());
        Ok(AppendResult::Appended)
    }

    async fn events(&self, quest_id: &QuestId) -> Result<Vec<QuestEvent>, StoreError> {
        simulate_latency(&self.faults).await;
        self.check_available()?;
        let tables = lock(&self.tables);
        Ok(tables
            .events
            .get(quest_id)
            .map(|log| log.values().cloned().collect())
            .unwrap_or_default())
    }

    async fn last_resolved_event_idx(&self, quest_id: &QuestId) -> Result<Option<u32>, StoreError> {
        simulate_latency(&self.faults).await;
        self.check_available()?;
        let tables = lock(&self.tables);
        Ok(tables
            .events
            .get(quest_id)
            .and_then(|log| log.keys().next_back().copied()))
    }
}
