//! Run definitions and configuration
//!
//! This module contains everything that describes *what* to run:
//! - `activity_name` - Closed set of activity codes
//! - `catalog` - READY job or SMART request plan behind each code
//! - `definition` - Named activity sequences and the built-in scenarios
//! - `loader` - Load run definitions from files and directories
//! - `config` - Runner configuration (`yematch.yaml`)

pub mod activity_name;
pub mod catalog;
pub mod config;
pub mod definition;
pub mod loader;

pub use activity_name::{ActivityName, System, UnknownActivityName};
pub use catalog::{plan, ActivityPlan, CatalogSettings, ReadyJob};
pub use config::{ReadyConfig, RetryConfig, RunnerConfig, Scramble, SmartConfig};
pub use definition::{builtin, find, RunDefinition};
pub use loader::{DefinitionLoader, LoadError};
