use crate::decider::{EventDecider, EventKind, SideEffect};
use crate::detail::{DetailError, DetailGenerator};
use chrono::DateTime;
use chrono_tz::Tz;
use ottlog_core::config::{Config, ConfigError, GenerationMode};
use ottlog_core::rate::RateLimiter;
use ottlog_core::timeline::Timeline;
use ottlog_core::traits::{Catalog, CatalogError, EventSink};
use ottlog_core::users::UserPool;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

const BATCH_PROGRESS_EVERY: u64 = 1_000;
const STREAM_PROGRESS_EVERY: u64 = 100;

/// Why one timestamp produced no output.
#[derive(Debug)]
pub enum SkipReason {
    /// The selected user was already terminal.
    TerminalUser,
    /// The decision referenced data the user does not hold.
    DetailUnavailable(&'static str),
    Catalog(CatalogError),
}

/// Per-iteration result of the pipeline.
#[derive(Debug)]
pub enum StepOutcome {
    Emitted(usize),
    Skipped(SkipReason),
}

#[derive(Debug, Default, Clone)]
pub struct RunSummary {
    pub emitted: u64,
    pub skipped: u64,
    pub sink_errors: u64,
}

/// Single-threaded generation loop: sample timestamp, select user, decide,
/// generate, apply side effects, emit. One emission per iteration; the only
/// suspension point is the rate-limit sleep.
pub struct Pipeline<C: Catalog, S: EventSink> {
    mode: GenerationMode,
    target_months: Vec<String>,
    dau: usize,
    logs_per_user_per_day: u32,
    timeline: Timeline,
    pool: UserPool,
    decider: EventDecider,
    detail: DetailGenerator,
    catalog: C,
    sink: S,
    limiter: RateLimiter,
    rng: StdRng,
    running: Arc<AtomicBool>,
    summary: RunSummary,
}

impl<C: Catalog, S: EventSink> Pipeline<C, S> {
    pub fn from_config(
        config: &Config,
        catalog: C,
        sink: S,
        running: Arc<AtomicBool>,
    ) -> Result<Self, ConfigError> {
        let timeline = Timeline::from_config(&config.global, &config.timeline)?;
        let pool = UserPool::new(config.timeline.dau, &config.users, &config.user_activity)?;
        let decider = EventDecider::from_config(&config.user_event_transitions)?;
        let detail = DetailGenerator::from_config(&config.log_detail, &config.watch_time)?;
        let limiter =
            RateLimiter::from_mps(config.global.target_mps).map_err(|err| ConfigError::Invalid {
                field: "global.target_mps",
                reason: err.to_string(),
            })?;
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        Ok(Self {
            mode: config.global.generation_mode,
            target_months: config.global.target_months.clone(),
            dau: config.timeline.dau,
            logs_per_user_per_day: config.timeline.logs_per_user_per_day,
            timeline,
            pool,
            decider,
            detail,
            catalog,
            sink,
            limiter,
            rng,
            running,
            summary: RunSummary::default(),
        })
    }

    /// Runs the configured mode to completion (or interrupt), then closes
    /// the sink so both hour buckets flush.
    pub fn run(&mut self, max_events: Option<u64>) -> Result<RunSummary, ConfigError> {
        let result = match self.mode {
            GenerationMode::Batch => self.run_batch(max_events),
            GenerationMode::Streaming => {
                self.run_streaming(max_events);
                Ok(())
            }
        };

        if let Err(err) = self.sink.close() {
            warn!("sink close failed: {err}");
            self.summary.sink_errors += 1;
        }
        result.map(|_| self.summary.clone())
    }

    fn run_batch(&mut self, max_events: Option<u64>) -> Result<(), ConfigError> {
        let months = self.target_months.clone();
        for month in &months {
            if !self.is_running() {
                break;
            }
            let total =
                self.timeline
                    .monthly_total(month, self.dau, self.logs_per_user_per_day)?;
            info!(month = %month, total, "generating batch month");

            let started = Instant::now();
            let month_start = self.summary.emitted;
            let mut next_report = BATCH_PROGRESS_EVERY;
            let timestamps = self.timeline.monthly(month, total, &mut self.rng)?;
            for ts in timestamps {
                if !self.is_running() {
                    break;
                }
                self.step(ts);

                let emitted = self.summary.emitted - month_start;
                if emitted >= next_report {
                    next_report = emitted + BATCH_PROGRESS_EVERY;
                    let elapsed = started.elapsed().as_secs_f64().max(0.000_1);
                    let mps = emitted as f64 / elapsed;
                    info!(month = %month, emitted, total, mps, "batch progress");
                }
                if let Some(max) = max_events {
                    if self.summary.emitted >= max {
                        return Ok(());
                    }
                }
            }
            info!(
                month = %month,
                emitted = self.summary.emitted - month_start,
                total,
                elapsed_secs = started.elapsed().as_secs(),
                "batch month complete"
            );
        }
        Ok(())
    }

    fn run_streaming(&mut self, max_events: Option<u64>) {
        info!("streaming until interrupted");
        let started = Instant::now();
        let mut next_report = STREAM_PROGRESS_EVERY;
        while self.is_running() {
            let ts = self.timeline.now();
            self.step(ts);

            if self.summary.emitted >= next_report {
                next_report = self.summary.emitted + STREAM_PROGRESS_EVERY;
                let elapsed = started.elapsed().as_secs_f64().max(0.000_1);
                let mps = self.summary.emitted as f64 / elapsed;
                info!(emitted = self.summary.emitted, mps, "streaming progress");
            }
            if let Some(max) = max_events {
                if self.summary.emitted >= max {
                    break;
                }
            }
        }
    }

    /// One iteration of the per-timestamp flow.
    pub fn step(&mut self, ts: DateTime<Tz>) -> StepOutcome {
        let user_id = match self.pool.select(ts, &mut self.catalog, &mut self.rng) {
            Ok(user_id) => user_id,
            Err(err) => {
                warn!("user selection failed, dropping timestamp: {err}");
                return self.skipped(SkipReason::Catalog(err));
            }
        };

        let user = match self.pool.get_mut(user_id) {
            Some(user) => user,
            None => return self.skipped(SkipReason::TerminalUser),
        };
        let decision = match self.decider.decide(user, &mut self.rng) {
            Some(decision) => decision,
            None => return self.skipped(SkipReason::TerminalUser),
        };

        let mut events =
            match self
                .detail
                .generate(decision.kind, user, ts, &mut self.catalog, &mut self.rng)
            {
                Ok(events) => events,
                Err(DetailError::Unavailable(reason)) => {
                    return self.skipped(SkipReason::DetailUnavailable(reason));
                }
                Err(DetailError::Catalog(err)) => {
                    warn!("catalog read failed, dropping timestamp: {err}");
                    return self.skipped(SkipReason::Catalog(err));
                }
            };

        if decision.follow_up_registration {
            match self.detail.generate(
                EventKind::RegisterIn,
                user,
                ts,
                &mut self.catalog,
                &mut self.rng,
            ) {
                Ok(more) => events.extend(more),
                Err(err) => warn!("registration log skipped: {err}"),
            }
        }

        match decision.effect {
            SideEffect::None => {}
            SideEffect::ResetLogin => user.has_logged_in_today = false,
            SideEffect::Subscribe => user.is_subscribed = true,
            SideEffect::Unsubscribe => {
                user.is_subscribed = false;
                user.current_plan_id = None;
            }
            SideEffect::SoftDelete => {}
        }
        self.pool.update_state(user_id, decision.next_state);

        // write-through after the pool update so a failure never leaves the
        // pool and catalog disagreeing on eviction
        match decision.effect {
            SideEffect::Subscribe => {
                if let Err(err) = self.catalog.mark_subscription(user_id, true) {
                    warn!("subscription write-through failed: {err}");
                }
            }
            SideEffect::Unsubscribe => {
                if let Err(err) = self.catalog.mark_subscription(user_id, false) {
                    warn!("subscription write-through failed: {err}");
                }
            }
            SideEffect::SoftDelete => {
                if let Err(err) = self.catalog.soft_delete_user(user_id) {
                    warn!("soft delete write-through failed: {err}");
                }
            }
            _ => {}
        }

        let mut emitted = 0;
        for event in &events {
            match self.sink.write(event) {
                Ok(_) => {
                    emitted += 1;
                    self.limiter.pause();
                }
                Err(err) => {
                    self.summary.sink_errors += 1;
                    warn!("sink write failed: {err}");
                }
            }
        }
        self.summary.emitted += emitted;
        StepOutcome::Emitted(emitted as usize)
    }

    pub fn summary(&self) -> &RunSummary {
        &self.summary
    }

    pub fn into_sink(self) -> S {
        self.sink
    }

    fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }

    fn skipped(&mut self, reason: SkipReason) -> StepOutcome {
        self.summary.skipped += 1;
        StepOutcome::Skipped(reason)
    }
}

/// Collects events in memory; test double for the real sinks.
#[cfg(test)]
pub(crate) struct VecSink {
    pub events: Vec<ottlog_core::event::LogEvent>,
    pub closed: bool,
}

#[cfg(test)]
impl VecSink {
    pub fn new() -> Self {
        Self {
            events: Vec::new(),
            closed: false,
        }
    }
}

#[cfg(test)]
impl EventSink for VecSink {
    fn write(
        &mut self,
        event: &ottlog_core::event::LogEvent,
    ) -> Result<u64, ottlog_core::traits::SinkError> {
        let bytes = serde_json::to_vec(event)?;
        self.events.push(event.clone());
        Ok(bytes.len() as u64 + 1)
    }

    fn close(&mut self) -> Result<(), ottlog_core::traits::SinkError> {
        self.closed = true;
        Ok(())
    }
}
