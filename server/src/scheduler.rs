use chrono::{DateTime, Utc};
use cron::Schedule;
use serde::Serialize;
use std::future::Future;
use std::pin::Pin;
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

type ImportFuture = Pin<Box<dyn Future<Output = ()> + Send>>;
type ImportJob = Arc<dyn Fn() -> ImportFuture + Send + Sync>;

#[derive(Error, Debug)]
pub enum ScheduleError {
    #[error("Invalid cron expression: {expression} ({reason})")]
    InvalidExpression { expression: String, reason: String },
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleStatus {
    pub cron_expression: String,
    pub running: bool,
    pub next_run: Option<DateTime<Utc>>,
}

struct Timer {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

struct ScheduleState {
    expression: String,
    schedule: Schedule,
    timer: Option<Timer>,
}

impl ScheduleState {
    fn status(&self) -> ScheduleStatus {
        let running = self
            .timer
            .as_ref()
            .is_some_and(|timer| !timer.handle.is_finished());

        ScheduleStatus {
            cron_expression: self.expression.clone(),
            running,
            next_run: running
                .then(|| self.schedule.upcoming(Utc).next())
                .flatten(),
        }
    }
}

/// Drives the weather import on a cron schedule. Holds at most one timer;
/// every state change goes through one lock.
pub struct ImportScheduler {
    job: ImportJob,
    state: Mutex<ScheduleState>,
}

pub fn parse_cron(expression: &str) -> Result<Schedule, ScheduleError> {
    Schedule::from_str(expression.trim()).map_err(|e| ScheduleError::InvalidExpression {
        expression: expression.to_string(),
        reason: e.to_string(),
    })
}

impl ImportScheduler {
    /// Created stopped; call [`ImportScheduler::start`] to install the timer.
    pub fn new<F, Fut>(expression: &str, job: F) -> Result<Self, ScheduleError>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let schedule = parse_cron(expression)?;
        let job: ImportJob = Arc::new(move || Box::pin(job()) as ImportFuture);

        Ok(Self {
            job,
            state: Mutex::new(ScheduleState {
                expression: expression.trim().to_string(),
                schedule,
                timer: None,
            }),
        })
    }

    pub async fn start(&self) -> ScheduleStatus {
        let mut state = self.state.lock().await;
        self.start_locked(&mut state);
        state.status()
    }

    pub async fn stop(&self) -> ScheduleStatus {
        let mut state = self.state.lock().await;
        Self::stop_locked(&mut state);
        state.status()
    }

    /// Replaces the expression and restarts the timer. An invalid expression
    /// changes nothing.
    pub async fn set_schedule(&self, expression: &str) -> Result<ScheduleStatus, ScheduleError> {
        let schedule = parse_cron(expression)?;

        let mut state = self.state.lock().await;
        state.expression = expression.trim().to_string();
        state.schedule = schedule;
        Self::stop_locked(&mut state);
        self.start_locked(&mut state);

        tracing::info!("Weather import schedule set to '{}'", state.expression);
        Ok(state.status())
    }

    pub async fn status(&self) -> ScheduleStatus {
        self.state.lock().await.status()
    }

    /// Runs the job once in the background, outside the schedule.
    pub fn trigger_now(&self) -> JoinHandle<()> {
        tokio::spawn((self.job)())
    }

    fn start_locked(&self, state: &mut ScheduleState) {
        if let Some(timer) = &state.timer {
            if !timer.handle.is_finished() {
                tracing::debug!("Weather import schedule already running");
                return;
            }
        }

        let cancel = CancellationToken::new();
        let handle = tokio::spawn(run_timer(
            state.schedule.clone(),
            self.job.clone(),
            cancel.clone(),
        ));
        state.timer = Some(Timer { cancel, handle });
        tracing::info!("Weather import schedule started with '{}'", state.expression);
    }

    fn stop_locked(state: &mut ScheduleState) {
        if let Some(timer) = state.timer.take() {
            // a fetch already in progress finishes; only the wait is cancelled
            timer.cancel.cancel();
            tracing::info!("Weather import schedule stopped");
        }
    }
}

async fn run_timer(schedule: Schedule, job: ImportJob, cancel: CancellationToken) {
    let mut after = Utc::now();

    loop {
        let Some(next) = schedule.after(&after).next() else {
            tracing::warn!("Cron schedule has no upcoming runs, timer exits");
            return;
        };
        let wait = (next - Utc::now()).to_std().unwrap_or_default();

        tokio::select! {
            biased;
            _ = cancel.cancelled() => return,
            _ = tokio::time::sleep(wait) => {}
        }

        tracing::debug!("Scheduled weather import firing ({})", next);
        job().await;
        after = std::cmp::max(next, Utc::now());
    }
}
