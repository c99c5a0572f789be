//! Activities: one named, independently executable unit of work
//!
//! Three families share the `Activity` contract:
//! - `RemoteJobActivity` submits a batch job to READY and classifies its text output
//! - `ApiActivity` issues one or more HTTP calls against SMART
//! - `PairedActivity` runs the READY and SMART halves of one step together
//!
//! Checklist steps with nothing to automate are `UnavailableActivity` and
//! always report `NoOperation`.

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, instrument, warn};

use super::operator::StopSignal;
use super::outcome::{Outcome, OutcomeStatus};
use crate::bridge::{ApiRequest, RemoteShell, ShellOutput, SmartApi};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivityKind {
    RemoteJob,
    ApiCall,
    Paired,
}

impl ActivityKind {
    /// Submits a READY job, so its output may name golden reports
    pub fn submits_job(&self) -> bool {
        matches!(self, ActivityKind::RemoteJob | ActivityKind::Paired)
    }

    /// Talks to SMART, so the run needs a reachable API
    pub fn calls_api(&self) -> bool {
        matches!(self, ActivityKind::ApiCall | ActivityKind::Paired)
    }
}

#[async_trait]
pub trait Activity: Send + Sync {
    fn name(&self) -> &str;

    fn kind(&self) -> ActivityKind;

    /// Run the activity. Never fails: problems are reported through the outcome.
    async fn execute(&self, signal: &StopSignal) -> Outcome;
}

/// Output markers a READY job is judged by
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobMarkers {
    pub completion: String,
    pub no_op: String,
}

impl Default for JobMarkers {
    fn default() -> Self {
        Self {
            completion: "EJR COMPLETED".to_string(),
            no_op: "NOTHING TO PROCESS".to_string(),
        }
    }
}

/// Three-way classification of a finished READY job
pub fn classify_job_output(output: &ShellOutput, markers: &JobMarkers) -> (OutcomeStatus, String) {
    match output.exit_code {
        None => {
            return (
                OutcomeStatus::Error,
                "session ended before the job reported completion".to_string(),
            )
        }
        Some(code) if code != 0 => {
            return (OutcomeStatus::Error, format!("job exited with code {}", code))
        }
        Some(_) => {}
    }

    if !output.stdout.contains(&markers.completion) {
        return (
            OutcomeStatus::Error,
            format!("completion marker '{}' not found", markers.completion),
        );
    }

    if !markers.no_op.is_empty() && output.stdout.contains(&markers.no_op) {
        return (OutcomeStatus::NoOperation, markers.no_op.clone());
    }

    (OutcomeStatus::Ok, String::new())
}

pub struct RemoteJobActivity {
    name: String,
    letter_number: String,
    command: String,
    markers: JobMarkers,
    shell: Arc<dyn RemoteShell>,
}

impl RemoteJobActivity {
    pub fn new(
        name: impl Into<String>,
        letter_number: impl Into<String>,
        command: impl Into<String>,
        markers: JobMarkers,
        shell: Arc<dyn RemoteShell>,
    ) -> Self {
        Self {
            name: name.into(),
            letter_number: letter_number.into(),
            command: command.into(),
            markers,
            shell,
        }
    }
}

#[async_trait]
impl Activity for RemoteJobActivity {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> ActivityKind {
        ActivityKind::RemoteJob
    }

    #[instrument(skip(self, signal), fields(activity = %self.name))]
    async fn execute(&self, signal: &StopSignal) -> Outcome {
        if signal.is_cancelled() {
            return Outcome::cancelled(&self.name);
        }

        let start = Instant::now();
        debug!("Submitting {}", self.command);

        let outcome = match self.shell.submit(&self.command).await {
            Ok(output) => {
                let (status, message) = classify_job_output(&output, &self.markers);
                Outcome::new(&self.name, status, message).with_output(output.stdout, output.stderr)
            }
            Err(e) => {
                warn!("READY submit failed: {}", e);
                Outcome::error(&self.name, format!("could not run job: {}", e))
                    .with_output(String::new(), e.to_string())
            }
        };

        outcome
            .with_took(start.elapsed())
            .with_provenance(self.letter_number.clone(), self.command.clone())
    }
}

/// Number of result rows in a SMART report response, if it has any
pub fn records_loaded(body: &Value) -> Option<usize> {
    body.pointer("/response/results")
        .or_else(|| body.pointer("/results"))
        .and_then(Value::as_array)
        .or_else(|| body.as_array())
        .map(Vec::len)
}

pub struct ApiActivity {
    name: String,
    requests: Vec<ApiRequest>,
    api: Arc<dyn SmartApi>,
}

impl ApiActivity {
    pub fn new(name: impl Into<String>, requests: Vec<ApiRequest>, api: Arc<dyn SmartApi>) -> Self {
        Self {
            name: name.into(),
            requests,
            api,
        }
    }
}

#[async_trait]
impl Activity for ApiActivity {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> ActivityKind {
        ActivityKind::ApiCall
    }

    #[instrument(skip(self, signal), fields(activity = %self.name))]
    async fn execute(&self, signal: &StopSignal) -> Outcome {
        if signal.is_cancelled() {
            return Outcome::cancelled(&self.name);
        }

        let start = Instant::now();
        let mut summary = Vec::with_capacity(self.requests.len());
        let mut no_content = 0;

        for request in &self.requests {
            let response = match self.api.invoke(request).await {
                Ok(response) => response,
                Err(e) => {
                    warn!("{} failed: {}", request.label(), e);
                    summary.push(format!("{} failed", request.label()));
                    return Outcome::error(&self.name, format!("{} failed: {}", request.label(), e))
                        .with_output(summary.join("\n"), e.to_string())
                        .with_took(start.elapsed());
                }
            };

            if !response.is_success() {
                summary.push(format!("{} -> {}", request.label(), response.status));
                return Outcome::error(
                    &self.name,
                    format!("{} returned {}", request.label(), response.status),
                )
                .with_output(summary.join("\n"), response.body.to_string())
                .with_took(start.elapsed());
            }

            if response.status == 204 {
                no_content += 1;
                summary.push(format!("{} -> 204 no matching records", request.label()));
                continue;
            }

            match records_loaded(&response.body) {
                Some(count) => summary.push(format!(
                    "{} -> {} (records loaded: {})",
                    request.label(),
                    response.status,
                    count
                )),
                None => summary.push(format!("{} -> {}", request.label(), response.status)),
            }
        }

        let status = if !self.requests.is_empty() && no_content == self.requests.len() {
            OutcomeStatus::NoOperation
        } else {
            OutcomeStatus::Ok
        };
        let message = summary.join("\n");

        Outcome::new(&self.name, status, message.clone())
            .with_output(message, String::new())
            .with_took(start.elapsed())
    }
}

/// A checklist step with no automated counterpart on its system
pub struct UnavailableActivity {
    name: String,
    kind: ActivityKind,
    reason: String,
}

impl UnavailableActivity {
    pub fn new(name: impl Into<String>, kind: ActivityKind, reason: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind,
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl Activity for UnavailableActivity {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> ActivityKind {
        self.kind
    }

    async fn execute(&self, _signal: &StopSignal) -> Outcome {
        Outcome::no_operation(&self.name, self.reason.clone())
            .with_took(std::time::Duration::ZERO)
    }
}

/// Fold the outcomes of both halves: any error wins, then any real work
pub fn merge_outcomes(name: &str, ready: Outcome, smart: Outcome) -> Outcome {
    let status = match (ready.status, smart.status) {
        (OutcomeStatus::Error, _) | (_, OutcomeStatus::Error) => OutcomeStatus::Error,
        (OutcomeStatus::Ok, _) | (_, OutcomeStatus::Ok) => OutcomeStatus::Ok,
        _ => OutcomeStatus::NoOperation,
    };

    let section = |outcome: &Outcome, text: &str| {
        if text.trim().is_empty() {
            String::new()
        } else {
            format!("[{}]\n{}\n", outcome.name, text.trim_end())
        }
    };
    let message = [&ready, &smart]
        .iter()
        .filter(|o| !o.message.trim().is_empty())
        .map(|o| format!("{}: {}", o.name, o.message.trim()))
        .collect::<Vec<_>>()
        .join("\n");
    let stdout = section(&ready, &ready.standard_out) + &section(&smart, &smart.standard_out);
    let stderr = section(&ready, &ready.standard_error) + &section(&smart, &smart.standard_error);

    let mut merged = Outcome::new(name, status, message).with_output(stdout, stderr);
    merged.took = match (ready.took, smart.took) {
        (Some(a), Some(b)) => Some(a.max(b)),
        (a, b) => a.or(b),
    };
    merged.activity_letter_number = ready.activity_letter_number;
    merged.full_command = ready.full_command;
    merged
}

/// One checklist step on both systems; the halves run concurrently
pub struct PairedActivity {
    name: String,
    ready: Arc<dyn Activity>,
    smart: Arc<dyn Activity>,
}

impl PairedActivity {
    pub fn new(name: impl Into<String>, ready: Arc<dyn Activity>, smart: Arc<dyn Activity>) -> Self {
        Self {
            name: name.into(),
            ready,
            smart,
        }
    }
}

#[async_trait]
impl Activity for PairedActivity {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> ActivityKind {
        ActivityKind::Paired
    }

    #[instrument(skip(self, signal), fields(activity = %self.name))]
    async fn execute(&self, signal: &StopSignal) -> Outcome {
        let start = Instant::now();
        let (ready, smart) = tokio::join!(self.ready.execute(signal), self.smart.execute(signal));
        debug!(
            "{} finished: {} {}, {} {}",
            self.name, ready.name, ready.status, smart.name, smart.status
        );

        let mut outcome = merge_outcomes(&self.name, ready, smart);
        if outcome.took.is_some() {
            outcome.took = Some(start.elapsed());
        }
        outcome
    }
}
