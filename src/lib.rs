//! # YEMatch
//!
//! Drives the legacy READY batch system and the modern SMART API through the
//! ordered steps of profit-sharing year-end processing, so the two systems'
//! results can be compared.
//!
//! ## Concepts
//!
//! - **Activity** - One step on one system (`R03` on READY, `S03` on SMART)
//! - **Outcome** - The classified result of one activity: `Ok`, `NoOperation` or `Error`
//! - **Run definition** - A named, ordered list of activities
//! - **Golden files** - READY reports captured from a known-good run
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use yematch::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = RunnerConfig::discover(None)?;
//!     let api: Arc<dyn SmartApi> = Arc::new(SmartApiBridge::from_config(&config.smart)?);
//!     let factory = ActivityFactory::new(None, Some(api.clone()), FactorySettings::from_config(&config))?;
//!
//!     let definitions = yematch::runs::builtin();
//!     let definition = yematch::runs::find(&definitions, "smart-year-end").unwrap();
//!     let activities = factory.resolve(&definition.activities)?;
//!
//!     let data_dir = RunContext::create_data_dir(&config.data_root, &definition.name)?;
//!     let log = Arc::new(RunLog::create(&data_dir)?);
//!     let mut executor = RunExecutor::new(RunContext::new(data_dir, log).with_api(api));
//!     let report = executor.run(&activities).await?;
//!
//!     println!("completed without error: {}", report.completed_without_error());
//!     Ok(())
//! }
//! ```

pub mod bridge;
pub mod engine;
pub mod runs;

pub use bridge::{
    ApiRequest, ApiResponse, AppVersion, BridgeError, RemoteFileStore, RemoteShell, ShellOutput,
    SmartApi, SmartApiBridge, SshBridge,
};
pub use engine::{
    Activity, ActivityFactory, ActivityKind, FactorySettings, GoldenCapture, GoldenCollector,
    GoldenFileMapping, Outcome, OutcomeStatus, RunContext, RunError, RunExecutor, RunLog,
    RunRecord, RunReport, RunState, StopSignal,
};
pub use runs::{ActivityName, DefinitionLoader, LoadError, RunDefinition, RunnerConfig};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::bridge::{RemoteFileStore, RemoteShell, SmartApi, SmartApiBridge, SshBridge};
    pub use crate::engine::{
        Activity, ActivityFactory, ActivityKind, FactorySettings, GoldenCapture, GoldenCollector,
        GoldenFileMapping, Outcome, OutcomeStatus, RunContext, RunError, RunExecutor,
        RunHooks, RunLog, RunRecord, RunReport, RunState, StopSignal,
    };
    pub use crate::runs::{ActivityName, DefinitionLoader, RunDefinition, RunnerConfig};
}
