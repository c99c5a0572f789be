//! Activity identifiers
//!
//! Every activity the harness knows about has a short code (`R03`, `S13A`).
//! The leading letter names the system (`R` = READY, `S` = SMART, `P` = both
//! at once) and the rest is the step of the year-end checklist, shared between
//! the systems so `R07`, `S07` and `P07` always describe the same business step.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Which backend an activity drives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum System {
    /// Legacy batch system reached over a remote shell
    Ready,
    /// Modern system reached over HTTP
    Smart,
    /// The same step on READY and SMART, run as one activity
    Both,
}

macro_rules! activity_names {
    ($( $variant:ident => ($code:literal, $description:literal) ),+ $(,)?) => {
        /// Closed set of activities a run definition may reference
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub enum ActivityName {
            $( #[doc = $description] $variant ),+
        }

        impl ActivityName {
            /// Every activity in checklist order: READY, then SMART, then the pairs
            pub const ALL: &'static [ActivityName] = &[ $( ActivityName::$variant ),+ ];

            /// Short code used in logs, report filenames and definitions
            pub fn code(&self) -> &'static str {
                match self {
                    $( ActivityName::$variant => $code ),+
                }
            }

            /// Human readable checklist label
            pub fn description(&self) -> &'static str {
                match self {
                    $( ActivityName::$variant => $description ),+
                }
            }
        }
    };
}

activity_names! {
    R00BuildDatabase => ("R00", "Creates new database by importing from the PROFITSHARE schema"),
    R01CleanUpReports => ("R01", "Profit sharing clean up reports (SSN cleanup)"),
    R02MilitaryAndRehire => ("R02", "Military and rehire (TERM-REHIRE)"),
    R03ProfTermination => ("R03", "Prof termination (PROF-TERM)"),
    R04ProfShareLoanBalance => ("R04", "Prof share loan balance (QRY-PSLOAN)"),
    R05ExtractExecutiveHoursAndDollars => ("R05", "Extract executive hours and dollars (PROF-DOLLAR-EXEC-EXTRACT)"),
    R06ClearExecutiveHoursAndDollars => ("R06", "Clear executive hours and dollars (PAYPROFIT-CLEAR-EXEC)"),
    R07ReadyScreen00809 => ("R07", "READY screen 008-09 (enter exec hours)"),
    R08ProfitShareReport => ("R08", "Profit share report (PROF-SHARE)"),
    R09YeOraclePayrollProcessing => ("R09", "YE Oracle payroll processing"),
    R10LoadOraclePayProfit => ("R10", "Load Oracle PAYPROFIT (weekly job)"),
    R11ProfitSharingYtdWagesExtract => ("R11", "Profit sharing YTD wages extract (PROF-DOLLAR-EXTRACT)"),
    R12ProfLoadYrEndDemoProfitShare => ("R12", "PROF LOAD YREND DEMO PROFSHARE (the freeze)"),
    R13APayProfitShiftPartTime => ("R13A", "PAYPROFIT SHIFT, part-time update"),
    R13BPayProfitShiftWeekly => ("R13B", "PAYPROFIT SHIFT, weekly update"),
    R14ZeroPyPdPayProfit => ("R14", "ZERO-PY-PD-PAYPROFIT"),
    R15ProfitSharingYtdWagesExtract2 => ("R15", "Profit sharing YTD wages extract, second pass"),
    R16ReadyScreen00809Second => ("R16", "READY screen 008-09, second chance"),
    R17ProfitShareReportEditRun => ("R17", "Profit share report edit run"),
    R18ProfitShareReportFinalRun => ("R18", "Profit share report final run"),
    R19GetEligibleEmployees => ("R19", "Get eligible employees (GET-ELIGIBLE-EMPS)"),
    R20ProfitForfeit => ("R20", "Profit forfeit PAY443 (PROF-FORT)"),
    R21ProfitShareUpdate => ("R21", "Profit share update PAY444 (PROF-UPD1)"),
    R22ProfitShareEdit => ("R22", "Profit share edit PAY447 (PROF-EDIT)"),
    R23ProfitMasterUpdate => ("R23", "Profit master update (PROF-DBUPD)"),
    R24ProfPayMasterUpdate => ("R24", "PROF PAYMASTER UPD (PROF-UPD2)"),
    R24BProfPayMasterUpdatePartTwo => ("R24B", "PROF PAYMASTER UPD part two"),
    R25ProfShareReportByAge => ("R25", "Prof share report by age (PROFSHARE-RPT)"),
    R26ProfShareGrossReport => ("R26", "Prof share gross report QPAY501 (PROFGROSS)"),
    R27ProfShareByStore => ("R27", "Prof share by store (PROF-BREAK)"),
    R28PrintProfitCerts => ("R28", "Print profit certs (PROF-CERT01)"),
    R29SaveProfPayMstr => ("R29", "Save prof paymstr (SAVE-PROF-PAYMSTR)"),

    S00InitializeDatabase => ("S00", "Initialize database with obfuscated data"),
    S01CleanUpReports => ("S01", "Profit sharing clean up reports"),
    S02MilitaryAndRehire => ("S02", "Military and rehire"),
    S03ProfTermination => ("S03", "Prof termination"),
    S04ProfShareLoanBalance => ("S04", "Distributions and forfeitures (QPAY129)"),
    S05ExtractExecutiveHoursAndDollars => ("S05", "Extract executive hours and dollars"),
    S06ClearExecutiveHoursAndDollars => ("S06", "Clear executive hours and dollars"),
    S07ReadyScreen00809 => ("S07", "Enter executive hours"),
    S08ProfitShareReport => ("S08", "Profit share report (PAY426)"),
    S09YeOraclePayrollProcessing => ("S09", "YE Oracle HCM payroll processing"),
    S10LoadOraclePayProfit => ("S10", "Load Oracle PAYPROFIT"),
    S11ProfitSharingYtdWagesExtract => ("S11", "Profit sharing YTD wages extract"),
    S12ProfLoadYrEndDemoProfitShare => ("S12", "Freeze demographics"),
    S13APayProfitShiftPartTime => ("S13A", "PAYPROFIT SHIFT, part-time"),
    S13BPayProfitShiftWeekly => ("S13B", "PAYPROFIT SHIFT, weekly"),
    S14ZeroPyPdPayProfit => ("S14", "ZERO-PY-PD-PAYPROFIT"),
    S15ProfitSharingYtdWagesExtract2 => ("S15", "Profit sharing YTD wages extract, second pass"),
    S16ReadyScreen00809Second => ("S16", "Enter executive hours, second chance"),
    S17ProfitShareReportEditRun => ("S17", "Profit share report edit run (PAY426N)"),
    S18ProfitShareReportFinalRun => ("S18", "Profit share report final run"),
    S19GetEligibleEmployees => ("S19", "Get eligible employees"),
    S20ProfitForfeit => ("S20", "Profit share forfeit (PAY443)"),
    S21ProfitShareUpdate => ("S21", "Profit share update (PAY444)"),
    S22ProfitShareEdit => ("S22", "Profit share edit (PAY447)"),
    S23ProfitMasterUpdate => ("S23", "Profit master update"),
    S24ProfPayMasterUpdate => ("S24", "Update enrollment"),
    S24BProfPayMasterUpdatePartTwo => ("S24B", "PROF PAYMASTER UPD part two"),
    S25ProfShareReportByAge => ("S25", "Prof share report by age"),
    S26ProfShareGrossReport => ("S26", "Prof share gross report (QPAY501)"),
    S27ProfShareByStore => ("S27", "Prof share by store (QPAY066)"),
    S28PrintProfitCerts => ("S28", "Print profit certs"),
    S29SaveProfPayMstr => ("S29", "Save prof paymstr"),

    P00BuildDatabase => ("P00", "R00 and S00 side by side"),
    P01CleanUpReports => ("P01", "R01 and S01 side by side"),
    P02MilitaryAndRehire => ("P02", "R02 and S02 side by side"),
    P03ProfTermination => ("P03", "R03 and S03 side by side"),
    P04ProfShareLoanBalance => ("P04", "R04 and S04 side by side"),
    P05ExtractExecutiveHoursAndDollars => ("P05", "R05 and S05 side by side"),
    P06ClearExecutiveHoursAndDollars => ("P06", "R06 and S06 side by side"),
    P07ReadyScreen00809 => ("P07", "R07 and S07 side by side"),
    P08ProfitShareReport => ("P08", "R08 and S08 side by side"),
    P09YeOraclePayrollProcessing => ("P09", "R09 and S09 side by side"),
    P10LoadOraclePayProfit => ("P10", "R10 and S10 side by side"),
    P11ProfitSharingYtdWagesExtract => ("P11", "R11 and S11 side by side"),
    P12ProfLoadYrEndDemoProfitShare => ("P12", "R12 and S12 side by side"),
    P13APayProfitShiftPartTime => ("P13A", "R13A and S13A side by side"),
    P13BPayProfitShiftWeekly => ("P13B", "R13B and S13B side by side"),
    P14ZeroPyPdPayProfit => ("P14", "R14 and S14 side by side"),
    P15ProfitSharingYtdWagesExtract2 => ("P15", "R15 and S15 side by side"),
    P16ReadyScreen00809Second => ("P16", "R16 and S16 side by side"),
    P17ProfitShareReportEditRun => ("P17", "R17 and S17 side by side"),
    P18ProfitShareReportFinalRun => ("P18", "R18 and S18 side by side"),
    P19GetEligibleEmployees => ("P19", "R19 and S19 side by side"),
    P20ProfitForfeit => ("P20", "R20 and S20 side by side"),
    P21ProfitShareUpdate => ("P21", "R21 and S21 side by side"),
    P22ProfitShareEdit => ("P22", "R22 and S22 side by side"),
    P23ProfitMasterUpdate => ("P23", "R23 and S23 side by side"),
    P24ProfPayMasterUpdate => ("P24", "R24 and S24 side by side"),
    P24BProfPayMasterUpdatePartTwo => ("P24B", "R24B and S24B side by side"),
    P25ProfShareReportByAge => ("P25", "R25 and S25 side by side"),
    P26ProfShareGrossReport => ("P26", "R26 and S26 side by side"),
    P27ProfShareByStore => ("P27", "R27 and S27 side by side"),
    P28PrintProfitCerts => ("P28", "R28 and S28 side by side"),
    P29SaveProfPayMstr => ("P29", "R29 and S29 side by side"),
}

impl ActivityName {
    /// The backend this activity drives
    pub fn system(&self) -> System {
        match self.code().as_bytes().first() {
            Some(b'R') => System::Ready,
            Some(b'S') => System::Smart,
            _ => System::Both,
        }
    }

    /// Whether running this activity needs a client for `system`
    pub fn involves(&self, system: System) -> bool {
        let own = self.system();
        own == system || own == System::Both
    }

    /// Checklist step shared by every system, e.g. `03` or `13A`
    pub fn step(&self) -> &'static str {
        &self.code()[1..]
    }

    /// Legacy checklist label (`A3`, `A13A`) used by the READY job list
    pub fn letter_number(&self) -> String {
        let step = self.step();
        let trimmed = step.trim_start_matches('0');
        if trimmed.is_empty() || trimmed.starts_with(|c: char| !c.is_ascii_digit()) {
            format!("A0{}", trimmed)
        } else {
            format!("A{}", trimmed)
        }
    }

    /// The same checklist step on `system`
    pub fn on(&self, system: System) -> Option<ActivityName> {
        let prefix = match system {
            System::Ready => 'R',
            System::Smart => 'S',
            System::Both => 'P',
        };
        let code = format!("{}{}", prefix, self.step());
        ActivityName::ALL.iter().copied().find(|a| a.code() == code)
    }

    /// READY and SMART halves of a paired activity
    pub fn halves(&self) -> Option<(ActivityName, ActivityName)> {
        if self.system() != System::Both {
            return None;
        }
        Some((self.on(System::Ready)?, self.on(System::Smart)?))
    }

    /// READY activities only
    pub fn ready() -> impl Iterator<Item = ActivityName> {
        Self::on_system(System::Ready)
    }

    /// SMART activities only
    pub fn smart() -> impl Iterator<Item = ActivityName> {
        Self::on_system(System::Smart)
    }

    /// Paired activities only
    pub fn paired() -> impl Iterator<Item = ActivityName> {
        Self::on_system(System::Both)
    }

    fn on_system(system: System) -> impl Iterator<Item = ActivityName> {
        Self::ALL.iter().copied().filter(move |a| a.system() == system)
    }
}

/// Unknown activity code
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown activity name: {0}")]
pub struct UnknownActivityName(pub String);

impl FromStr for ActivityName {
    type Err = UnknownActivityName;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        // Accept `R03` as well as `R03_ProfTermination`
        let code = trimmed.split('_').next().unwrap_or(trimmed);
        ActivityName::ALL
            .iter()
            .copied()
            .find(|a| a.code().eq_ignore_ascii_case(code))
            .ok_or_else(|| UnknownActivityName(s.to_string()))
    }
}

impl fmt::Display for ActivityName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl Serialize for ActivityName {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.code())
    }
}

impl<'de> Deserialize<'de> for ActivityName {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
