//! Integrated ESG report: loads a company's records and runs them through the
//! scoring helpers. Also hosts the record classifiers the assistant reuses.

use anyhow::Result;
use chrono::NaiveDate;
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use crate::database::models::{date_field, f64_field, status_in, EsgTable};
use crate::database::source::EsgDataSource;
use crate::scoring::{
    self, EnvironmentalInputs, GovernanceInputs, SocialInputs, WasteRecord,
};

/// Upper bound of rows loaded per table
pub const RECORD_LIMIT: i64 = 500;

/// True when a fetch hit `RECORD_LIMIT`, so older rows were left out.
pub(crate) fn is_capped(records: &[Value]) -> bool {
    records.len() as i64 >= RECORD_LIMIT
}

/// Days ahead in which a license counts as expiring
pub const EXPIRING_WINDOW_DAYS: i64 = 90;

const DONE_STATUSES: &[&str] = &["concluída", "concluida", "concluído", "concluido", "finalizada", "atingida", "done"];
const CLOSED_NC_STATUSES: &[&str] = &["encerrada", "fechada", "closed"];
const INACTIVE_STATUSES: &[&str] = &["inativo", "inativa", "desligado", "desligada"];

pub(crate) fn is_done(record: &Value) -> bool {
    status_in(record, "status", DONE_STATUSES)
}

pub(crate) fn is_license_expired(record: &Value, today: NaiveDate) -> bool {
    date_field(record, "expiration_date").is_some_and(|d| d < today)
}

pub(crate) fn is_license_expiring(record: &Value, today: NaiveDate) -> bool {
    date_field(record, "expiration_date")
        .is_some_and(|d| d >= today && (d - today).num_days() <= EXPIRING_WINDOW_DAYS)
}

pub(crate) fn is_task_overdue(record: &Value, today: NaiveDate) -> bool {
    !is_done(record) && date_field(record, "due_date").is_some_and(|d| d < today)
}

pub(crate) fn is_nc_open(record: &Value) -> bool {
    !status_in(record, "status", CLOSED_NC_STATUSES)
}

pub(crate) fn is_active(record: &Value) -> bool {
    !status_in(record, "status", INACTIVE_STATUSES)
}

pub(crate) fn is_high_level(record: &Value, key: &str) -> bool {
    status_in(record, key, &["alta", "alto", "high", "crítica", "critica", "crítico", "critico", "critical"])
}

pub(crate) fn goal_progress(record: &Value) -> f64 {
    f64_field(record, "progress_percentage").unwrap_or(0.0).clamp(0.0, 100.0)
}

pub(crate) fn average(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, count) = values.fold((0.0, 0usize), |(s, c), v| (s + v, c + 1));
    if count == 0 { 0.0 } else { sum / count as f64 }
}

pub(crate) fn sum_field(records: &[Value], key: &str) -> f64 {
    records.iter().filter_map(|r| f64_field(r, key)).sum()
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IntegratedReport {
    pub company_id: Uuid,
    pub generated_on: NaiveDate,
    pub environmental_score: f64,
    pub social_score: f64,
    pub governance_score: f64,
    pub overall_score: f64,
    pub rating: &'static str,
    /// Some table had more than `RECORD_LIMIT` rows; figures cover the most recent ones.
    pub truncated: bool,
    pub recycling_rate: f64,
    pub total_waste_tonnes: f64,
    pub total_emissions_tco2e: f64,
    pub energy_gj: f64,
    pub energy_intensity_gj_per_employee: f64,
    pub waste_intensity_t_per_employee: f64,
    pub environmental: EnvironmentalInputs,
    pub social: SocialInputs,
    pub governance: GovernanceInputs,
}

/// Load the records behind the integrated report and score them.
pub async fn build_integrated_report(
    source: &dyn EsgDataSource,
    company_id: Uuid,
    today: NaiveDate,
) -> Result<IntegratedReport> {
    let (licenses, goals, waste, emissions, energy, employees, stakeholders, tasks, audits, ncs) = futures::try_join!(
        source.fetch_records(EsgTable::Licenses, company_id, RECORD_LIMIT),
        source.fetch_records(EsgTable::Goals, company_id, RECORD_LIMIT),
        source.fetch_records(EsgTable::WasteLogs, company_id, RECORD_LIMIT),
        source.fetch_records(EsgTable::Emissions, company_id, RECORD_LIMIT),
        source.fetch_records(EsgTable::EnergyConsumption, company_id, RECORD_LIMIT),
        source.fetch_records(EsgTable::Employees, company_id, RECORD_LIMIT),
        source.fetch_records(EsgTable::Stakeholders, company_id, RECORD_LIMIT),
        source.fetch_records(EsgTable::ComplianceTasks, company_id, RECORD_LIMIT),
        source.fetch_records(EsgTable::Audits, company_id, RECORD_LIMIT),
        source.fetch_records(EsgTable::NonConformities, company_id, RECORD_LIMIT),
    )?;
    let truncated = [&licenses, &goals, &waste, &emissions, &energy, &employees, &stakeholders, &tasks, &audits, &ncs]
        .into_iter()
        .any(|rows| is_capped(rows));

    let waste: Vec<WasteRecord> = waste.iter().map(WasteRecord::from_json).collect();
    let recycling_rate = scoring::calculate_recycling_rate(&waste);
    let total_waste_tonnes = scoring::total_waste_tonnes(&waste);

    let expired_licenses = licenses.iter().filter(|l| is_license_expired(l, today)).count();
    let environmental = EnvironmentalInputs {
        recycling_rate,
        goals_progress: average(goals.iter().map(goal_progress)),
        license_compliance: scoring::percentage(licenses.len() - expired_licenses, licenses.len()),
        expired_licenses,
        has_emissions_inventory: !emissions.is_empty(),
    };

    let active: Vec<&Value> = employees.iter().filter(|e| is_active(e)).collect();
    let women = active
        .iter()
        .filter(|e| status_in(e, "gender", &["feminino", "f", "mulher", "female"]))
        .count();
    let social = SocialInputs {
        employees: active.len(),
        women_share: scoring::percentage(women, active.len()),
        stakeholders: stakeholders.len(),
        high_influence_stakeholders: stakeholders.iter().filter(|s| is_high_level(s, "influence_level")).count(),
    };

    let governance = GovernanceInputs {
        task_completion: scoring::percentage(tasks.iter().filter(|t| is_done(t)).count(), tasks.len()),
        overdue_tasks: tasks.iter().filter(|t| is_task_overdue(t, today)).count(),
        audit_completion: scoring::percentage(audits.iter().filter(|a| is_done(a)).count(), audits.len()),
        open_non_conformities: ncs.iter().filter(|nc| is_nc_open(nc)).count(),
    };

    let environmental_score = scoring::environmental_score(&environmental);
    let social_score = scoring::social_score(&social);
    let governance_score = scoring::governance_score(&governance);
    let overall_score = scoring::overall_score(environmental_score, social_score, governance_score);

    let consumption_kwh = sum_field(&energy, "consumption_kwh");
    let headcount = social.employees as f64;

    Ok(IntegratedReport {
        company_id,
        generated_on: today,
        environmental_score,
        social_score,
        governance_score,
        overall_score,
        rating: scoring::score_rating(overall_score),
        truncated,
        recycling_rate,
        total_waste_tonnes,
        total_emissions_tco2e: sum_field(&emissions, "total_co2e"),
        energy_gj: scoring::kwh_to_gj(consumption_kwh),
        energy_intensity_gj_per_employee: scoring::energy_intensity(consumption_kwh, headcount),
        waste_intensity_t_per_employee: scoring::waste_intensity(&waste, headcount),
        environmental,
        social,
        governance,
    })
}
