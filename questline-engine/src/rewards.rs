//! Offline reward validation.
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use questline_game::{LootCfg, Loot};

use crate::error::ValidationError;
use crate::store::{CompletionRequest, RewardValidator};

/// Validator that computes loot locally from the credited focus minutes.
///
/// Credits `min(elapsed, duration)` whole minutes at the configured rates,
/// then applies the class loot bonus.
#[derive(Debug, Default)]
pub struct LocalRewardValidator {
    cfg: LootCfg,
    offline: AtomicBool,
}

impl LocalRewardValidator {
    #[must_use]
    pub const fn new(cfg: LootCfg) -> Self {
        Self {
            cfg,
            offline: AtomicBool::new(false),
        }
    }

    /// Simulate the validation service being unreachable.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Loot for `request` without any availability check.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::Rejected` when the request ends before it starts.
    pub fn loot_for(&self, request: &CompletionRequest) -> Result<Loot, ValidationError> {
        let elapsed = request.end_time - request.start_time;
        if elapsed.num_seconds() < 0 {
            return Err(ValidationError::Rejected {
                quest_id: request.quest_id.clone(),
                reason: String::from("quest ends before it starts"),
            });
        }
        let elapsed_minutes = u64::try_from(elapsed.num_minutes()).unwrap_or(0);
        let minutes = elapsed_minutes.min(u64::from(request.duration_minutes));
        let bonus = 100 + request.class_type.loot_bonus_pct();
        Ok(Loot {
            xp: minutes.saturating_mul(self.cfg.xp_per_minute).saturating_mul(bonus) / 100,
            gold: minutes.saturating_mul(self.cfg.gold_per_minute).saturating_mul(bonus) / 100,
            focus_minutes: minutes,
        })
    }
}

#[async_trait]
impl RewardValidator for LocalRewardValidator {
    async fn complete_quest(&self, request: &CompletionRequest) -> Result<Loot, ValidationError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(ValidationError::Unreachable(String::from(
                "reward service offline",
            )));
        }
        self.loot_for(request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeDelta, TimeZone, Utc};
    use questline_game::{ClassType, HeroId, QuestId};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap()
    }

    fn request(class_type: ClassType, elapsed: TimeDelta) -> CompletionRequest {
        CompletionRequest {
            hero_id: HeroId::new("hero"),
            quest_id: QuestId::new("quest"),
            duration_minutes: 25,
            start_time: t0(),
            end_time: t0() + elapsed,
            class_type,
        }
    }

    #[tokio::test]
    async fn credits_at_most_the_planned_duration() {
        let validator = LocalRewardValidator::new(LootCfg::default());
        let loot = validator
            .complete_quest(&request(ClassType::Warrior, TimeDelta::hours(3)))
            .await
            .unwrap();
        assert_eq!(loot.focus_minutes, 25);
        assert_eq!(loot.xp, 250);
        assert_eq!(loot.gold, 50);
    }

    #[tokio::test]
    async fn rogues_earn_their_loot_bonus() {
        let validator = LocalRewardValidator::new(LootCfg::default());
        let loot = validator
            .complete_quest(&request(ClassType::Rogue, TimeDelta::minutes(10)))
            .await
            .unwrap();
        assert_eq!(loot.focus_minutes, 10);
        assert_eq!(loot.xp, 115);
        assert_eq!(loot.gold, 23);
    }

    #[tokio::test]
    async fn rejects_inverted_windows_and_reports_offline() {
        let validator = LocalRewardValidator::new(LootCfg::default());
        assert!(matches!(
            validator
                .complete_quest(&request(ClassType::Mage, TimeDelta::minutes(-1)))
                .await,
            Err(ValidationError::Rejected { .. })
        ));

        validator.set_offline(true);
        assert!(matches!(
            validator
                .complete_quest(&request(ClassType::Mage, TimeDelta::minutes(5)))
                .await,
            Err(ValidationError::Unreachable(_))
        ));
    }
}
