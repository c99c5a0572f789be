//! What each activity actually does
//!
//! READY activities submit a batch job (`EJR <job> [args]`); SMART activities
//! issue one or more HTTP calls. Checklist steps that have no automated
//! counterpart on a system are `Unavailable` and resolve to a no-op. Paired
//! (`P`) activities run the READY and SMART plans of their step together.

use serde_json::json;

use super::activity_name::ActivityName;
use super::config::Scramble;
use crate::bridge::ApiRequest;

/// Batch job submitted to READY
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadyJob {
    pub job: &'static str,
    pub args: Option<String>,
}

impl ReadyJob {
    fn new(job: &'static str) -> Self {
        Self { job, args: None }
    }

    fn with_args(job: &'static str, args: &str) -> Self {
        Self {
            job,
            args: Some(args.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ActivityPlan {
    ReadyJob(ReadyJob),
    SmartCalls(Vec<ApiRequest>),
    /// Both halves of one checklist step
    Paired {
        ready: ActivityName,
        smart: ActivityName,
    },
    /// Nothing to automate yet; the reason ends up in the outcome message
    Unavailable(&'static str),
}

/// Inputs that change what a plan sends
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CatalogSettings {
    pub profit_year: u16,
    pub scramble: Scramble,
}

impl Default for CatalogSettings {
    fn default() -> Self {
        Self {
            profit_year: 2024,
            scramble: Scramble::default(),
        }
    }
}

// Reference rates used by the PAY444/PAY447 and master update runs
const CONTRIBUTION_PERCENT: u32 = 15;
const INCOMING_FORFEIT_PERCENT: f64 = 0.876678;
const EARNINGS_PERCENT: f64 = 9.280136;
const MAX_ALLOWED_CONTRIBUTIONS: u32 = 57_000;

const EXEC_HOURS_SCREEN: &str = "interactive READY screen 008-09; enter executive hours by hand";

pub fn plan(name: ActivityName, settings: &CatalogSettings) -> ActivityPlan {
    use ActivityName::*;
    use ActivityPlan::{ReadyJob as Job, SmartCalls, Unavailable};

    let year = settings.profit_year;

    match name {
        R00BuildDatabase => Job(match settings.scramble.build_args() {
            Some(args) => ReadyJob::with_args("YE-BUILD-DB", args),
            None => ReadyJob::new("YE-BUILD-DB"),
        }),
        R01CleanUpReports => Job(ReadyJob::new("PROF-SSN-CLEANUP")),
        R02MilitaryAndRehire => Job(ReadyJob::new("TERM-REHIRE")),
        R03ProfTermination => Job(ReadyJob::new("PROF-TERM")),
        R04ProfShareLoanBalance => Job(ReadyJob::new("QRY-PSLOAN")),
        R05ExtractExecutiveHoursAndDollars => Job(ReadyJob::new("PROF-DOLLAR-EXEC-EXTRACT")),
        R06ClearExecutiveHoursAndDollars => Job(ReadyJob::new("PAYPROFIT-CLEAR-EXEC")),
        R07ReadyScreen00809 | R16ReadyScreen00809Second => Unavailable(EXEC_HOURS_SCREEN),
        R08ProfitShareReport => Job(ReadyJob::new("PROF-SHARE")),
        R09YeOraclePayrollProcessing => Unavailable("payroll processing runs in Oracle HCM"),
        R10LoadOraclePayProfit => Job(ReadyJob::new("PAYPROFIT-WEEKLY")),
        R11ProfitSharingYtdWagesExtract | R15ProfitSharingYtdWagesExtract2 => {
            Job(ReadyJob::new("PROF-DOLLAR-EXTRACT"))
        }
        R12ProfLoadYrEndDemoProfitShare => Job(ReadyJob::new("PROF-LOAD-YREND-DEMO-PROFSHARE")),
        R13APayProfitShiftPartTime => Job(ReadyJob::with_args("PAYPROFIT-SHIFT", "PT")),
        R13BPayProfitShiftWeekly => Job(ReadyJob::with_args("PAYPROFIT-SHIFT", "WEEKLY")),
        R14ZeroPyPdPayProfit => Job(ReadyJob::new("ZERO-PY-PD-PAYPROFIT")),
        R17ProfitShareReportEditRun => Job(ReadyJob::with_args("PROF-SHARE", "EDIT")),
        R18ProfitShareReportFinalRun => Job(ReadyJob::with_args("PROF-SHARE", "FINAL")),
        R19GetEligibleEmployees => Job(ReadyJob::new("GET-ELIGIBLE-EMPS")),
        R20ProfitForfeit => Job(ReadyJob::new("PROF-FORT")),
        R21ProfitShareUpdate => Job(ReadyJob::new("PROF-UPD1")),
        R22ProfitShareEdit => Job(ReadyJob::new("PROF-EDIT")),
        R23ProfitMasterUpdate => Job(ReadyJob::new("PROF-DBUPD")),
        R24ProfPayMasterUpdate => Job(ReadyJob::new("PROF-UPD2")),
        R24BProfPayMasterUpdatePartTwo => Job(ReadyJob::with_args("PROF-UPD2", "PART2")),
        R25ProfShareReportByAge => Job(ReadyJob::new("PROFSHARE-RPT")),
        R26ProfShareGrossReport => Job(ReadyJob::new("PROFGROSS")),
        R27ProfShareByStore => Job(ReadyJob::new("PROF-BREAK")),
        R28PrintProfitCerts => Job(ReadyJob::new("PROF-CERT01")),
        R29SaveProfPayMstr => Job(ReadyJob::new("SAVE-PROF-PAYMSTR")),

        S00InitializeDatabase => Unavailable("SMART is seeded by the READY import tool"),
        S01CleanUpReports => SmartCalls(vec![
            ApiRequest::get("api/yearend/cleanup/negative-etva-for-ssns-on-payprofit")
                .query("profitYear", year),
            ApiRequest::get("api/yearend/cleanup/duplicate-ssns").query("profitYear", year),
            ApiRequest::get("api/yearend/cleanup/demographic-badges-not-in-payprofit"),
            ApiRequest::get("api/yearend/duplicate-names-and-birthdays").query("profitYear", year),
        ]),
        S02MilitaryAndRehire => Unavailable("rehire forfeitures endpoint moved to POST"),
        S03ProfTermination => SmartCalls(vec![ApiRequest::post(
            "api/yearend/terminated-employees",
            json!({ "profitYear": year, "skip": 0, "take": i32::MAX }),
        )]),
        S04ProfShareLoanBalance => SmartCalls(vec![ApiRequest::get(
            "api/yearend/cleanup/distributions-and-forfeitures",
        )
        .query("profitYear", year)]),
        S05ExtractExecutiveHoursAndDollars => SmartCalls(vec![ApiRequest::get(
            "api/yearend/executive-hours-and-dollars",
        )
        .query("profitYear", year)
        .query("hasExecutiveHoursAndDollars", true)]),
        S06ClearExecutiveHoursAndDollars => {
            Unavailable("SMART keeps executive hours per year; nothing to clear")
        }
        S07ReadyScreen00809 | S16ReadyScreen00809Second => {
            Unavailable("executive hours entry is not automated")
        }
        S08ProfitShareReport => Unavailable("summary report not yet complete"),
        S09YeOraclePayrollProcessing => Unavailable("payroll processing runs in Oracle HCM"),
        S10LoadOraclePayProfit => Unavailable("SMART reads Oracle HCM directly"),
        S11ProfitSharingYtdWagesExtract | S15ProfitSharingYtdWagesExtract2 => {
            SmartCalls(vec![
                ApiRequest::get("api/yearend/wages-current-year").query("profitYear", year)
            ])
        }
        S12ProfLoadYrEndDemoProfitShare => SmartCalls(vec![ApiRequest::post(
            "api/itdevops/freeze",
            json!({
                "profitYear": year,
                "asOfDateTime": format!("{}-12-31T23:59:59", year),
            }),
        )
        .as_role("IT-DevOps")]),
        S13APayProfitShiftPartTime | S13BPayProfitShiftWeekly | S14ZeroPyPdPayProfit => {
            Unavailable("SMART keeps yearly columns; no shift needed")
        }
        S17ProfitShareReportEditRun => SmartCalls(vec![ApiRequest::post(
            "api/yearend/yearend-profit-sharing-report",
            json!({
                "profitYear": year,
                "isYearEnd": true,
                "minimumAgeInclusive": 18,
                "minimumHoursInclusive": 1000,
                "includeActiveEmployees": true,
                "includeInactiveEmployees": true,
                "includeEmployeesTerminatedThisYear": false,
                "includeTerminatedEmployees": false,
                "includeBeneficiaries": false,
                "includeEmployeesWithPriorProfitSharingAmounts": true,
                "includeEmployeesWithNoPriorProfitSharingAmounts": true,
                "skip": 0,
                "take": i32::MAX,
            }),
        )]),
        S18ProfitShareReportFinalRun => SmartCalls(vec![ApiRequest::post(
            "api/yearend/final",
            json!({ "profitYear": year }),
        )
        .as_role("Finance-Manager")]),
        S19GetEligibleEmployees => SmartCalls(vec![
            ApiRequest::get("api/yearend/eligible-employees").query("profitYear", year)
        ]),
        S20ProfitForfeit => SmartCalls(vec![ApiRequest::get(
            "api/yearend/frozen/forfeitures-and-points",
        )
        .query("profitYear", year)
        .query("useFrozenData", true)]),
        S21ProfitShareUpdate => SmartCalls(vec![with_rates(
            ApiRequest::get("api/yearend/profit-share-update").query("profitYear", year),
        )]),
        S22ProfitShareEdit => SmartCalls(vec![with_rates(
            ApiRequest::get("api/yearend/profit-share-edit").query("profitYear", year),
        )]),
        S23ProfitMasterUpdate => SmartCalls(vec![ApiRequest::post(
            "api/yearend/profit-master-update",
            json!({
                "profitYear": year,
                "contributionPercent": CONTRIBUTION_PERCENT,
                "incomingForfeitPercent": INCOMING_FORFEIT_PERCENT,
                "earningsPercent": EARNINGS_PERCENT,
                "maxAllowedContributions": MAX_ALLOWED_CONTRIBUTIONS,
            }),
        )
        .as_role("System-Administrator")]),
        S24ProfPayMasterUpdate => SmartCalls(vec![ApiRequest::post(
            "api/yearend/update-enrollment",
            json!({ "profitYear": year }),
        )]),
        S24BProfPayMasterUpdatePartTwo => Unavailable("enrollment update covers part two"),
        S25ProfShareReportByAge => Unavailable("age reports not yet exposed"),
        S26ProfShareGrossReport => Unavailable("QPAY501 not yet exposed"),
        S27ProfShareByStore => SmartCalls(vec![ApiRequest::get("api/yearend/breakdown")
            .query("profitYear", year + 1)
            .query("storeNumber", 1)]),
        S28PrintProfitCerts => Unavailable("certificates are printed from the UI"),
        S29SaveProfPayMstr => Unavailable("SMART keeps history; no tape backup"),

        paired => match paired.halves() {
            Some((ready, smart)) => ActivityPlan::Paired { ready, smart },
            None => Unavailable("no READY/SMART pair for this step"),
        },
    }
}

fn with_rates(request: ApiRequest) -> ApiRequest {
    request
        .query("contributionPercent", CONTRIBUTION_PERCENT)
        .query("incomingForfeitPercent", INCOMING_FORFEIT_PERCENT)
        .query("earningsPercent", EARNINGS_PERCENT)
        .query("maxAllowedContributions", MAX_ALLOWED_CONTRIBUTIONS)
}
