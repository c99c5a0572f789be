//! Activity factory: resolves activity names to runnable activities
//!
//! The factory owns the READY shell and the SMART client and hands the same
//! instances to every activity it builds, so a run reuses one session and one
//! connection pool throughout.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, instrument};

use super::activity::{
    Activity, ActivityKind, ApiActivity, JobMarkers, PairedActivity, RemoteJobActivity,
    UnavailableActivity,
};
use super::error::RunError;
use super::executor::{RunContext, RunHooks};
use super::template;
use crate::bridge::{RemoteShell, SmartApi};
use crate::runs::activity_name::{ActivityName, System};
use crate::runs::catalog::{self, ActivityPlan, CatalogSettings};
use crate::runs::config::RunnerConfig;

/// Knobs the factory needs from the configuration
#[derive(Debug, Clone)]
pub struct FactorySettings {
    pub job_command: String,
    pub markers: JobMarkers,
    pub reseed_command: String,
    pub catalog: CatalogSettings,
}

impl Default for FactorySettings {
    fn default() -> Self {
        Self::from_config(&RunnerConfig::default())
    }
}

impl FactorySettings {
    pub fn from_config(config: &RunnerConfig) -> Self {
        Self {
            job_command: config.ready.job_command.clone(),
            markers: JobMarkers {
                completion: config.ready.completion_marker.clone(),
                no_op: config.ready.no_op_marker.clone(),
            },
            reseed_command: config.ready.reseed_command.clone(),
            catalog: CatalogSettings {
                profit_year: config.smart.profit_year,
                scramble: config.ready.scramble,
            },
        }
    }
}

pub struct ActivityFactory {
    activities: HashMap<ActivityName, Arc<dyn Activity>>,
    shell: Option<Arc<dyn RemoteShell>>,
    api: Option<Arc<dyn SmartApi>>,
    settings: FactorySettings,
}

impl ActivityFactory {
    /// Build every activity whose system has a client.
    ///
    /// Fails only when a job command template cannot be rendered.
    pub fn new(
        shell: Option<Arc<dyn RemoteShell>>,
        api: Option<Arc<dyn SmartApi>>,
        settings: FactorySettings,
    ) -> Result<Self, RunError> {
        let mut factory = Self {
            activities: HashMap::new(),
            shell,
            api,
            settings,
        };
        factory.build()?;
        Ok(factory)
    }

    fn build(&mut self) -> Result<(), RunError> {
        self.activities.clear();
        for name in ActivityName::ALL.iter().copied() {
            if let Some(activity) = self.build_one(name)? {
                self.activities.insert(name, activity);
            }
        }
        debug!("Factory holds {} activities", self.activities.len());
        Ok(())
    }

    fn build_one(&self, name: ActivityName) -> Result<Option<Arc<dyn Activity>>, RunError> {
        let activity: Arc<dyn Activity> = match catalog::plan(name, &self.settings.catalog) {
            ActivityPlan::Unavailable(reason) => {
                let kind = match name.system() {
                    System::Ready => ActivityKind::RemoteJob,
                    System::Smart => ActivityKind::ApiCall,
                    System::Both => ActivityKind::Paired,
                };
                Arc::new(UnavailableActivity::new(name.code(), kind, reason))
            }
            ActivityPlan::ReadyJob(job) => {
                let Some(shell) = &self.shell else {
                    return Ok(None);
                };
                let command = template::render(
                    &self.settings.job_command,
                    &serde_json::json!({ "job": job.job, "args": job.args }),
                )
                .map_err(|e| RunError::Config(e.to_string()))?;
                Arc::new(RemoteJobActivity::new(
                    name.code(),
                    name.letter_number(),
                    command,
                    self.settings.markers.clone(),
                    shell.clone(),
                ))
            }
            ActivityPlan::SmartCalls(requests) => {
                let Some(api) = &self.api else {
                    return Ok(None);
                };
                Arc::new(ApiActivity::new(name.code(), requests, api.clone()))
            }
            ActivityPlan::Paired { ready, smart } => {
                let (Some(ready), Some(smart)) = (self.build_one(ready)?, self.build_one(smart)?)
                else {
                    return Ok(None);
                };
                Arc::new(PairedActivity::new(name.code(), ready, smart))
            }
        };
        Ok(Some(activity))
    }

    pub fn activities_by_name(&self) -> &HashMap<ActivityName, Arc<dyn Activity>> {
        &self.activities
    }

    pub fn activity(&self, name: ActivityName) -> Result<Arc<dyn Activity>, RunError> {
        self.activities.get(&name).cloned().ok_or_else(|| {
            let system = match name.system() {
                System::Ready => "READY (ready.host)",
                System::Smart => "SMART (smart.base_url)",
                System::Both => "READY (ready.host) and SMART (smart.base_url)",
            };
            RunError::Config(format!("{} needs {}, which is not configured", name, system))
        })
    }

    /// Resolve a whole list up front so a bad name fails before anything runs
    pub fn resolve(&self, names: &[ActivityName]) -> Result<Vec<Arc<dyn Activity>>, RunError> {
        names.iter().map(|name| self.activity(*name)).collect()
    }

    /// Resolve short codes such as `R03`
    pub fn resolve_codes<S: AsRef<str>>(
        &self,
        codes: &[S],
    ) -> Result<Vec<Arc<dyn Activity>>, RunError> {
        let names = codes
            .iter()
            .map(|code| {
                code.as_ref()
                    .parse::<ActivityName>()
                    .map_err(|e| RunError::UnknownActivity(e.0))
            })
            .collect::<Result<Vec<_>, _>>()?;
        self.resolve(&names)
    }

    /// Rebuild READY from the scrambled dataset before a batch of activities
    #[instrument(skip(self))]
    pub async fn reseed(&self) -> Result<(), RunError> {
        let shell = self
            .shell
            .as_ref()
            .ok_or_else(|| RunError::Reseed("READY is not configured".to_string()))?;

        info!("Reseeding READY: {}", self.settings.reseed_command);
        let output = shell
            .submit(&self.settings.reseed_command)
            .await
            .map_err(|e| RunError::Reseed(e.to_string()))?;

        if !output.success() {
            return Err(RunError::Reseed(format!(
                "exit code {:?}: {}",
                output.exit_code,
                output.stderr.trim()
            )));
        }
        if !output.stdout.contains(&self.settings.markers.completion) {
            return Err(RunError::Reseed(format!(
                "completion marker '{}' not found",
                self.settings.markers.completion
            )));
        }
        Ok(())
    }
}

/// Reseeds READY as the run starts, once SMART has answered
pub struct ReseedOnStart {
    factory: Arc<ActivityFactory>,
}

impl ReseedOnStart {
    pub fn new(factory: Arc<ActivityFactory>) -> Self {
        Self { factory }
    }
}

#[async_trait]
impl RunHooks for ReseedOnStart {
    async fn on_start(&self, ctx: &RunContext) -> Result<(), RunError> {
        ctx.log.line("Reseeding READY...");
        self.factory.reseed().await
    }
}
