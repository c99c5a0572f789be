//! Run Executor - drives an ordered list of activities to a terminal state
//!
//! For every activity the executor:
//! 1. Starts a heartbeat that refreshes the console status line
//! 2. Executes the activity and stops (and joins) the heartbeat
//! 3. Appends the outcome to the run record and logs it
//! 4. Halts on an operator stop request, or on an error outcome
//! 5. Collects golden files for READY jobs that did something
//!
//! Nothing is touched before SMART has answered the connectivity check, so a
//! run that cannot start leaves the golden directory as it was.
//!
//! Activities always run one at a time: later READY jobs depend on state
//! left behind by earlier ones.

use async_trait::async_trait;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, error, info, instrument, warn};

use super::activity::Activity;
use super::console::{RunLog, RED, RESET, YELLOW};
use super::error::RunError;
use super::golden::{self, Collection, GoldenCollector};
use super::heartbeat::{format_hms, Heartbeat};
use super::operator::StopSignal;
use super::outcome::{Outcome, OutcomeStatus, RunRecord};
use crate::bridge::SmartApi;

pub const OUTCOME_FILE: &str = "outcome.json";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RunState {
    NotStarted,
    Running,
    Completed,
    HaltedOnError,
    HaltedByOperator,
}

/// Everything one run needs, passed explicitly instead of living in globals
pub struct RunContext {
    pub run_id: String,
    pub data_dir: PathBuf,
    pub log: Arc<RunLog>,
    pub signal: StopSignal,
    pub heartbeat_interval: Duration,
    /// Expected run length from the last golden run, for the ETA
    pub baseline: Option<Duration>,
    pub api: Option<Arc<dyn SmartApi>>,
    pub collector: Option<GoldenCollector>,
}

impl RunContext {
    pub fn new(data_dir: impl Into<PathBuf>, log: Arc<RunLog>) -> Self {
        Self {
            run_id: uuid::Uuid::new_v4().to_string(),
            data_dir: data_dir.into(),
            log,
            signal: StopSignal::new(),
            heartbeat_interval: Duration::from_secs(15),
            baseline: None,
            api: None,
            collector: None,
        }
    }

    pub fn with_signal(mut self, signal: StopSignal) -> Self {
        self.signal = signal;
        self
    }

    pub fn with_heartbeat_interval(mut self, interval: Duration) -> Self {
        self.heartbeat_interval = interval;
        self
    }

    pub fn with_baseline(mut self, baseline: Option<Duration>) -> Self {
        self.baseline = baseline;
        self
    }

    pub fn with_api(mut self, api: Arc<dyn SmartApi>) -> Self {
        self.api = Some(api);
        self
    }

    pub fn with_collector(mut self, collector: GoldenCollector) -> Self {
        self.collector = Some(collector);
        self
    }

    /// Create `<root>/<YYYYMMDD-HHMMSS>-<definition>`
    pub fn create_data_dir(root: &Path, definition: &str) -> std::io::Result<PathBuf> {
        let stamp = chrono::Local::now().format("%Y%m%d-%H%M%S");
        let dir = root.join(format!("{}-{}", stamp, definition));
        std::fs::create_dir_all(&dir)?;
        Ok(dir)
    }
}

/// Run-specific work before the first and after the last activity
#[async_trait]
pub trait RunHooks: Send + Sync {
    async fn on_start(&self, _ctx: &RunContext) -> Result<(), RunError> {
        Ok(())
    }

    async fn on_finish(&self, _ctx: &RunContext, _report: &RunReport) -> Result<(), RunError> {
        Ok(())
    }
}

/// Makes a run the new baseline: clears the golden directory up front and
/// copies the finished run into it
pub struct GoldenCapture {
    golden_dir: PathBuf,
}

impl GoldenCapture {
    pub fn new(golden_dir: impl Into<PathBuf>) -> Self {
        Self {
            golden_dir: golden_dir.into(),
        }
    }
}

#[async_trait]
impl RunHooks for GoldenCapture {
    async fn on_start(&self, ctx: &RunContext) -> Result<(), RunError> {
        let removed = golden::purge(&self.golden_dir)?;
        info!(
            "Purged {} entries from {}",
            removed,
            self.golden_dir.display()
        );
        ctx.log
            .line(&format!("Cleared golden directory {}", self.golden_dir.display()));
        Ok(())
    }

    async fn on_finish(&self, ctx: &RunContext, report: &RunReport) -> Result<(), RunError> {
        if report.state != RunState::Completed {
            warn!(
                "Run ended {:?}; golden directory left without a snapshot",
                report.state
            );
            return Ok(());
        }
        let copied = golden::snapshot(&ctx.data_dir, &self.golden_dir)?;
        info!("Copied {} files into {}", copied, self.golden_dir.display());
        Ok(())
    }
}

/// Final state of a run
#[derive(Debug, Clone)]
pub struct RunReport {
    pub run_id: String,
    pub state: RunState,
    pub record: RunRecord,
    pub elapsed: Duration,
    /// Per READY activity, what golden collection found
    pub golden: Vec<(String, Collection)>,
}

impl RunReport {
    pub fn completed_without_error(&self) -> bool {
        self.record.completed_without_error()
    }
}

pub struct RunExecutor {
    ctx: RunContext,
    hooks: Vec<Box<dyn RunHooks>>,
    state: RunState,
}

impl RunExecutor {
    pub fn new(ctx: RunContext) -> Self {
        Self {
            ctx,
            hooks: Vec::new(),
            state: RunState::NotStarted,
        }
    }

    /// Add hooks; they run in the order they were added
    pub fn with_hooks(mut self, hooks: Box<dyn RunHooks>) -> Self {
        self.hooks.push(hooks);
        self
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn context(&self) -> &RunContext {
        &self.ctx
    }

    /// Confirm SMART answers before anything runs
    async fn check_connectivity(&self, activities: &[Arc<dyn Activity>]) -> Result<(), RunError> {
        if !activities.iter().any(|a| a.kind().calls_api()) {
            return Ok(());
        }
        let Some(api) = &self.ctx.api else {
            debug!("No SMART client in context; skipping connectivity check");
            return Ok(());
        };

        let version = api.app_version().await.map_err(RunError::Connectivity)?;
        info!(
            "Connected to SMART build: {}, git-hash: {}",
            version.build_number, version.short_git_hash
        );
        self.ctx.log.line(&format!(
            "Connected to SMART build: {} git-hash: {}",
            version.build_number, version.short_git_hash
        ));
        Ok(())
    }

    fn log_outcome(&self, activity: &dyn Activity, outcome: &Outcome) {
        let log = &self.ctx.log;
        let msg = outcome.message.trim().replace('\n', "\n   ");
        if !msg.is_empty() {
            info!("Activity message: {}", msg);
        }
        info!(
            "Activity {} took {}, Status: {}",
            outcome.name,
            outcome.took_display(),
            outcome.status
        );

        match outcome.status {
            OutcomeStatus::Ok => {
                let command = outcome
                    .full_command
                    .as_deref()
                    .filter(|c| activity.kind().submits_job() && !c.trim().is_empty());
                match command {
                    Some(command) => log.line(&format!(
                        "✓ {} {} ({})",
                        outcome.took_display(),
                        outcome.name,
                        command
                    )),
                    None => log.line(&format!("✓ {} {}", outcome.took_display(), outcome.name)),
                }
            }
            OutcomeStatus::NoOperation => {
                if msg.is_empty() {
                    log.line(&format!("- {} {} (no operation)", outcome.took_display(), outcome.name));
                } else {
                    log.line(&format!(
                        "- {} {} (no operation: {})",
                        outcome.took_display(),
                        outcome.name,
                        msg
                    ));
                }
            }
            OutcomeStatus::Error => {
                log.line("");
                log.line(&format!(
                    "{}------------------- ERROR in {} -------------------",
                    RED, outcome.name
                ));
                log.line(&format!("{}Status: {}", RED, outcome.status));
                log.line(&format!("{}Duration: {}", RED, outcome.took_display()));
                if !msg.is_empty() {
                    log.line(&format!("{}Message: {}", RED, msg));
                }
                if !outcome.standard_out.trim().is_empty() {
                    log.line("");
                    log.line(&format!("{}Output:", RED));
                    for l in outcome.standard_out.lines() {
                        log.line(&format!("{}{}", RED, l));
                    }
                }
                if !outcome.standard_error.trim().is_empty() {
                    log.line("");
                    log.line(&format!("{}Error Output:", RED));
                    for l in outcome.standard_error.lines() {
                        log.line(&format!("{}{}", RED, l));
                    }
                }
                log.line(&format!(
                    "{}---------------------------------------------------------------{}",
                    RED, RESET
                ));
            }
        }
    }

    /// Execute the activities in order until the list is exhausted, an
    /// activity fails, or the operator asks to stop.
    ///
    /// Returns `Err` only for problems that prevent the run from starting
    /// (connectivity, a failing start hook) or from being persisted.
    #[instrument(skip_all, fields(run_id = %self.ctx.run_id, activities = activities.len()))]
    pub async fn run(&mut self, activities: &[Arc<dyn Activity>]) -> Result<RunReport, RunError> {
        if self.state != RunState::NotStarted {
            return Err(RunError::Config(format!(
                "executor already used (state {:?})",
                self.state
            )));
        }

        let run_started = Instant::now();
        self.check_connectivity(activities).await?;
        for hooks in &self.hooks {
            hooks.on_start(&self.ctx).await?;
        }

        self.state = RunState::Running;
        info!("Starting run with {} activities", activities.len());
        self.ctx.log.line(&format!(
            "Starting run with {} activities. Press 'S' or 's' at any time to stop gracefully (no enter needed).",
            activities.len()
        ));
        self.ctx.log.line("");

        let mut record = RunRecord::new();
        let mut collections = Vec::new();

        for activity in activities {
            info!("------------------- Starting execution: {}", activity.name());

            let heartbeat = Heartbeat::start(
                self.ctx.log.clone(),
                activity.name().to_string(),
                self.ctx.heartbeat_interval,
                run_started,
                self.ctx.baseline,
            );
            let outcome = activity.execute(&self.ctx.signal).await;
            let ticks = heartbeat.stop().await;
            self.ctx.log.clear_status();
            debug!("{} heartbeat ticks for {}", ticks, activity.name());

            self.log_outcome(activity.as_ref(), &outcome);
            let status = outcome.status;
            let stdout = outcome.standard_out.clone();
            record.push(outcome);

            if self.ctx.signal.stop_requested() {
                warn!("Operator requested stop - stopping gracefully after {}", activity.name());
                self.ctx
                    .log
                    .line(&format!("{}User requested stop - exiting gracefully{}", YELLOW, RESET));
                self.state = RunState::HaltedByOperator;
                break;
            }

            if status == OutcomeStatus::Error {
                error!("Stopping execution due to error/failure: {}", activity.name());
                self.state = RunState::HaltedOnError;
                break;
            }

            if activity.kind().submits_job() && status == OutcomeStatus::Ok {
                if let Some(collector) = self.ctx.collector.as_mut() {
                    let collection = collector.collect(activity.name(), &stdout).await;
                    collections.push((activity.name().to_string(), collection));
                }
            }
        }

        if self.state == RunState::Running {
            self.state = RunState::Completed;
        }

        let outcome_path = self.ctx.data_dir.join(OUTCOME_FILE);
        tokio::fs::write(&outcome_path, record.to_json_pretty()?).await?;
        info!("Outcomes written to {}", outcome_path.display());

        if let Some(collector) = &self.ctx.collector {
            if !collector.manifest().is_empty() {
                let path = collector.write_manifest().await?;
                info!("Golden manifest written to {}", path.display());
            }
        }

        let elapsed = run_started.elapsed();
        info!("Completed run. Took: {}", format_hms(elapsed));
        self.ctx.log.line("");
        self.ctx
            .log
            .line(&format!("Completed in {}", format_hms(elapsed)));
        self.ctx.log.flush()?;

        let report = RunReport {
            run_id: self.ctx.run_id.clone(),
            state: self.state,
            record,
            elapsed,
            golden: collections,
        };

        for hooks in &self.hooks {
            hooks.on_finish(&self.ctx, &report).await?;
        }
        Ok(report)
    }
}
