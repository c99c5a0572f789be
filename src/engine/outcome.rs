//! Activity outcomes and the run record

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Classification of one activity execution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OutcomeStatus {
    Ok,
    /// Ran fine but found nothing to act on
    NoOperation,
    Error,
}

impl std::fmt::Display for OutcomeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            OutcomeStatus::Ok => "Ok",
            OutcomeStatus::NoOperation => "NoOperation",
            OutcomeStatus::Error => "Error",
        };
        f.write_str(s)
    }
}

/// Result of executing one activity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Outcome {
    pub name: String,
    pub status: OutcomeStatus,
    /// Absent when the activity never started
    #[serde(rename = "tookMs", with = "duration_ms")]
    pub took: Option<Duration>,
    pub message: String,
    pub standard_out: String,
    pub standard_error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub activity_letter_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_command: Option<String>,
}

impl Outcome {
    pub fn new(name: impl Into<String>, status: OutcomeStatus, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status,
            took: None,
            message: message.into(),
            standard_out: String::new(),
            standard_error: String::new(),
            activity_letter_number: None,
            full_command: None,
        }
    }

    pub fn ok(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(name, OutcomeStatus::Ok, message)
    }

    pub fn no_operation(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(name, OutcomeStatus::NoOperation, message)
    }

    pub fn error(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(name, OutcomeStatus::Error, message)
    }

    /// Outcome for an activity whose cancellation was observed before the remote call
    pub fn cancelled(name: impl Into<String>) -> Self {
        Self::error(name, "cancelled before the remote call started")
    }

    pub fn with_output(mut self, stdout: impl Into<String>, stderr: impl Into<String>) -> Self {
        self.standard_out = stdout.into();
        self.standard_error = stderr.into();
        self
    }

    pub fn with_provenance(mut self, letter_number: String, full_command: String) -> Self {
        self.activity_letter_number = Some(letter_number);
        self.full_command = Some(full_command);
        self
    }

    pub fn with_took(mut self, took: Duration) -> Self {
        self.took = Some(took);
        self
    }

    pub fn is_error(&self) -> bool {
        self.status == OutcomeStatus::Error
    }

    /// `mm:ss`, or `--:--` when the activity never started
    pub fn took_display(&self) -> String {
        match self.took {
            Some(took) => {
                let secs = took.as_secs();
                format!("{:02}:{:02}", secs / 60, secs % 60)
            }
            None => "--:--".to_string(),
        }
    }
}

/// Ordered, append-only sequence of outcomes for one run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunRecord {
    outcomes: Vec<Outcome>,
}

impl RunRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, outcome: Outcome) {
        self.outcomes.push(outcome);
    }

    pub fn outcomes(&self) -> &[Outcome] {
        &self.outcomes
    }

    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    pub fn statuses(&self) -> Vec<OutcomeStatus> {
        self.outcomes.iter().map(|o| o.status).collect()
    }

    pub fn completed_without_error(&self) -> bool {
        !self.outcomes.iter().any(Outcome::is_error)
    }

    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Option<Duration>, s: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(d) => s.serialize_some(&(d.as_millis() as u64)),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Duration>, D::Error> {
        Ok(Option::<u64>::deserialize(d)?.map(Duration::from_millis))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_completed_without_error() {
        let mut record = RunRecord::new();
        assert!(record.completed_without_error());

        record.push(Outcome::ok("R01", ""));
        record.push(Outcome::no_operation("S06", "nothing to clear"));
        assert!(record.completed_without_error());

        record.push(Outcome::error("R03", "boom"));
        assert!(!record.completed_without_error());
        assert_eq!(
            record.statuses(),
            vec![
                OutcomeStatus::Ok,
                OutcomeStatus::NoOperation,
                OutcomeStatus::Error
            ]
        );
    }

    #[test]
    fn test_took_display() {
        let outcome = Outcome::ok("R01", "").with_took(Duration::from_secs(125));
        assert_eq!(outcome.took_display(), "02:05");
        assert_eq!(Outcome::cancelled("R01").took_display(), "--:--");
    }

    #[test]
    fn test_json_shape() {
        let mut record = RunRecord::new();
        record.push(
            Outcome::ok("R03", "done")
                .with_took(Duration::from_millis(1500))
                .with_output("LogFile: /x_1.log\n", "")
                .with_provenance("A3".to_string(), "PROF-TERM".to_string()),
        );
        record.push(Outcome::cancelled("R04"));

        let json: serde_json::Value =
            serde_json::from_str(&record.to_json_pretty().unwrap()).unwrap();
        let arr = json.as_array().unwrap();
        assert_eq!(arr.len(), 2);
        assert_eq!(arr[0]["status"], "Ok");
        assert_eq!(arr[0]["tookMs"], 1500);
        assert_eq!(arr[0]["activityLetterNumber"], "A3");
        assert_eq!(arr[0]["fullCommand"], "PROF-TERM");
        assert!(arr[1]["tookMs"].is_null());
        assert!(arr[1].get("fullCommand").is_none());

        let back: RunRecord = serde_json::from_value(json).unwrap();
        assert_eq!(back, record);
    }
}
