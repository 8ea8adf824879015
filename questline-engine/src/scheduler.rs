//! Tick scheduler and command loop.
//!
//! An interval task emits `Tick`s onto a channel at the configured cadence.
//! The driver loop receives ticks and user commands and runs each through
//! the service pipeline on its own task, so slow passes may overlap; the
//! service's idempotent effects make that safe. Every pipeline result is
//! reported on the outcome channel and failures never stop the loop.
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, TimeDelta, Utc};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::MissedTickBehavior;

use crate::error::EngineError;
use crate::service::{QuestService, TickReport};

const COMMAND_BUFFER: usize = 32;
const TICK_BUFFER: usize = 8;

/// Source of wall-clock time for the pipeline.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    #[must_use]
    pub const fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner) = now;
    }

    pub fn advance(&self, by: TimeDelta) {
        let mut now = self.now.lock().unwrap_or_else(PoisonError::into_inner);
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Periodic observation event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tick {
    pub seq: u64,
    pub now: DateTime<Utc>,
}

/// User intents delivered to the driver loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum Command {
    Start { duration_minutes: u32 },
    Complete,
    GiveUp,
    Shutdown,
}

/// What started a pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "trigger", rename_all = "snake_case")]
pub enum Trigger {
    Tick { seq: u64 },
    Start { duration_minutes: u32 },
    Complete,
    GiveUp,
}

/// Result of one pipeline run.
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineOutcome {
    Succeeded {
        trigger: Trigger,
        at: DateTime<Utc>,
        report: Box<TickReport>,
    },
    Failed {
        trigger: Trigger,
        at: DateTime<Utc>,
        error: EngineError,
    },
}

impl PipelineOutcome {
    #[must_use]
    pub const fn trigger(&self) -> Trigger {
        match self {
            Self::Succeeded { trigger, .. } | Self::Failed { trigger, .. } => *trigger,
        }
    }

    #[must_use]
    pub fn report(&self) -> Option<&TickReport> {
        match self {
            Self::Succeeded { report, .. } => Some(&**report),
            Self::Failed { .. } => None,
        }
    }

    #[must_use]
    pub const fn error(&self) -> Option<&EngineError> {
        match self {
            Self::Succeeded { .. } => None,
            Self::Failed { error, .. } => Some(error),
        }
    }
}

#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
#[error("scheduler has stopped")]
pub struct SchedulerClosed;

/// Control surface of a running scheduler.
pub struct SchedulerHandle {
    commands: mpsc::Sender<Command>,
    outcomes: mpsc::UnboundedReceiver<PipelineOutcome>,
    driver: JoinHandle<()>,
}

impl SchedulerHandle {
    /// # Errors
    ///
    /// Returns `SchedulerClosed` once the driver loop has exited.
    pub async fn send(&self, command: Command) -> Result<(), SchedulerClosed> {
        self.commands
            .send(command)
            .await
            .map_err(|_| SchedulerClosed)
    }

    /// Next pipeline outcome; `None` after shutdown once drained.
    pub async fn next_outcome(&mut self) -> Option<PipelineOutcome> {
        self.outcomes.recv().await
    }

    /// Stop the loop, abort every in-flight pipeline and return the
    /// outcomes nobody had received yet.
    pub async fn shutdown(mut self) -> Vec<PipelineOutcome> {
        let _ = self.commands.send(Command::Shutdown).await;
        if let Err(err) = self.driver.await
            && err.is_panic()
        {
            warn!("scheduler driver panicked: {err}");
        }
        let mut remaining = Vec::new();
        while let Some(outcome) = self.outcomes.recv().await {
            remaining.push(outcome);
        }
        remaining
    }
}

pub struct TickScheduler;

impl TickScheduler {
    /// Spawn the ticker and driver loop on the current runtime.
    #[must_use]
    pub fn spawn(service: Arc<QuestService>, clock: Arc<dyn Clock>) -> SchedulerHandle {
        let (command_tx, command_rx) = mpsc::channel(COMMAND_BUFFER);
        let (tick_tx, tick_rx) = mpsc::channel(TICK_BUFFER);
        let (outcome_tx, outcome_rx) = mpsc::unbounded_channel();

        let period = service.config().tick_interval();
        let ticker_clock = Arc::clone(&clock);
        let ticker = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            let mut seq = 0_u64;
            loop {
                interval.tick().await;
                let tick = Tick {
                    seq,
                    now: ticker_clock.now(),
                };
                if tick_tx.send(tick).await.is_err() {
                    break;
                }
                seq += 1;
            }
        });

        let driver = tokio::spawn(drive(
            service, clock, ticker, tick_rx, command_rx, outcome_tx,
        ));
        SchedulerHandle {
            commands: command_tx,
            outcomes: outcome_rx,
            driver,
        }
    }
}

async fn drive(
    service: Arc<QuestService>,
    clock: Arc<dyn Clock>,
    ticker: JoinHandle<()>,
    mut ticks: mpsc::Receiver<Tick>,
    mut commands: mpsc::Receiver<Command>,
    outcomes: mpsc::UnboundedSender<PipelineOutcome>,
) {
    let mut tasks = JoinSet::new();
    loop {
        tokio::select! {
            command = commands.recv() => {
                let trigger = match command {
                    None | Some(Command::Shutdown) => break,
                    Some(Command::Start { duration_minutes }) => {
                        Trigger::Start { duration_minutes }
                    }
                    Some(Command::Complete) => Trigger::Complete,
                    Some(Command::GiveUp) => Trigger::GiveUp,
                };
                tasks.spawn(run_pipeline(
                    Arc::clone(&service),
                    trigger,
                    clock.now(),
                    outcomes.clone(),
                ));
            }
            Some(tick) = ticks.recv() => {
                let trigger = Trigger::Tick { seq: tick.seq };
                tasks.spawn(run_pipeline(
                    Arc::clone(&service),
                    trigger,
                    tick.now,
                    outcomes.clone(),
                ));
            }
            Some(joined) = tasks.join_next() => {
                if let Err(err) = joined
                    && err.is_panic()
                {
                    warn!("pipeline task panicked: {err}");
                }
            }
        }
    }

    ticker.abort();
    let in_flight = tasks.len();
    tasks.abort_all();
    while tasks.join_next().await.is_some() {}
    info!("scheduler stopped; aborted {in_flight} in-flight pipelines");
}

async fn run_pipeline(
    service: Arc<QuestService>,
    trigger: Trigger,
    at: DateTime<Utc>,
    outcomes: mpsc::UnboundedSender<PipelineOutcome>,
) {
    let result = match trigger {
        Trigger::Tick { .. } => service.tick(at).await,
        Trigger::Start { duration_minutes } => service.start_quest(duration_minutes, at).await,
        Trigger::Complete => service.complete(at).await,
        Trigger::GiveUp => service.give_up(at).await,
    };
    let outcome = match result {
        Ok(report) => PipelineOutcome::Succeeded {
            trigger,
            at,
            report: Box::new(report),
        },
        Err(error) => {
            if error.is_transient() {
                warn!("{trigger:?} failed, retrying next tick: {error}");
            } else {
                debug!("{trigger:?} rejected: {error}");
            }
            PipelineOutcome::Failed { trigger, at, error }
        }
    };
    let _ = outcomes.send(outcome);
}
