//! Run orchestration engine
//!
//! This module contains:
//! - `activity` - The activity contract and its READY / SMART / paired implementations
//! - `outcome` - Outcome and run record types
//! - `factory` - Resolves activity names to activities
//! - `executor` - The run loop
//! - `golden` - Golden-file extraction, collection and snapshots
//! - `console` - Dual console / `run.txt` writer
//! - `heartbeat` - Per-activity progress line and ETA
//! - `operator` - Stop signal and keyboard listener
//! - `template` - Handlebars rendering for commands and report names
//! - `error` - Engine error types

pub mod activity;
pub mod console;
pub mod error;
pub mod executor;
pub mod factory;
pub mod golden;
pub mod heartbeat;
pub mod operator;
pub mod outcome;
pub mod template;

pub use activity::{
    classify_job_output, merge_outcomes, Activity, ActivityKind, ApiActivity, JobMarkers,
    PairedActivity, RemoteJobActivity, UnavailableActivity,
};
pub use console::{RunLog, SharedBuffer};
pub use error::RunError;
pub use executor::{
    GoldenCapture, RunContext, RunExecutor, RunHooks, RunReport, RunState, OUTCOME_FILE,
};
pub use factory::{ActivityFactory, FactorySettings, ReseedOnStart};
pub use golden::{
    extract_log_id, Collection, GoldenCollector, GoldenError, GoldenFileMapping, GoldenManifest,
    LogId, LogIdSource,
};
pub use heartbeat::{load_baseline, Heartbeat};
pub use operator::{KeyListener, StopSignal};
pub use outcome::{Outcome, OutcomeStatus, RunRecord};
