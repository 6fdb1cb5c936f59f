//! # Integrated Report Scoring
//!
//! Arithmetic behind the integrated ESG report: recycling rate, waste and
//! energy intensity, unit conversions and the weighted pillar scores.
//! All scores are on a 0..100 scale.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::database::models::{f64_field, str_field};

/// Weight of each pillar in the overall score
const ENVIRONMENTAL_WEIGHT: f64 = 0.4;
const SOCIAL_WEIGHT: f64 = 0.3;
const GOVERNANCE_WEIGHT: f64 = 0.3;

const KWH_TO_GJ: f64 = 0.0036;

/// One waste log entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WasteRecord {
    pub quantity: f64,
    pub unit: String,
    pub disposal_method: Option<String>,
}

impl WasteRecord {
    pub fn from_json(record: &Value) -> Self {
        Self {
            quantity: f64_field(record, "quantity").unwrap_or(0.0),
            unit: str_field(record, "unit").unwrap_or("kg").to_string(),
            disposal_method: str_field(record, "disposal_method").map(str::to_string),
        }
    }

    fn is_recycled(&self) -> bool {
        self.disposal_method
            .as_deref()
            .map(|m| m.to_lowercase().contains("reciclagem"))
            .unwrap_or(false)
    }
}

/// Percentage of waste entries sent to recycling. Empty input scores 0.
pub fn calculate_recycling_rate(waste: &[WasteRecord]) -> f64 {
    if waste.is_empty() {
        return 0.0;
    }
    let recycled = waste.iter().filter(|w| w.is_recycled()).count();
    recycled as f64 / waste.len() as f64 * 100.0
}

/// Convert a mass to tonnes. Unknown units yield `None`.
pub fn to_tonnes(quantity: f64, unit: &str) -> Option<f64> {
    match unit.trim().to_lowercase().as_str() {
        "t" | "ton" | "tons" | "tonelada" | "toneladas" => Some(quantity),
        "kg" | "quilo" | "quilos" | "quilograma" | "quilogramas" => Some(quantity / 1_000.0),
        "g" | "grama" | "gramas" => Some(quantity / 1_000_000.0),
        _ => None,
    }
}

/// Total waste mass in tonnes, skipping entries with non-mass units.
pub fn total_waste_tonnes(waste: &[WasteRecord]) -> f64 {
    waste.iter()
        .filter_map(|w| to_tonnes(w.quantity, &w.unit))
        .sum()
}

pub fn kwh_to_gj(kwh: f64) -> f64 {
    kwh * KWH_TO_GJ
}

/// Ratio guarded against empty or negative denominators.
pub fn intensity(numerator: f64, denominator: f64) -> f64 {
    if denominator <= 0.0 { 0.0 } else { numerator / denominator }
}

/// GJ of energy per unit of the reference base (employees, revenue, area...)
pub fn energy_intensity(consumption_kwh: f64, base: f64) -> f64 {
    intensity(kwh_to_gj(consumption_kwh), base)
}

/// Tonnes of waste per unit of the reference base
pub fn waste_intensity(waste: &[WasteRecord], base: f64) -> f64 {
    intensity(total_waste_tonnes(waste), base)
}

fn clamp_score(score: f64) -> f64 {
    if score.is_nan() { 0.0 } else { score.clamp(0.0, 100.0) }
}

/// Inputs of the environmental pillar
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EnvironmentalInputs {
    pub recycling_rate: f64,
    /// Average progress of environmental goals, 0..100
    pub goals_progress: f64,
    /// Share of licenses currently valid, 0..100
    pub license_compliance: f64,
    pub expired_licenses: usize,
    /// Whether the company inventories its emissions at all
    pub has_emissions_inventory: bool,
}

pub fn environmental_score(inputs: &EnvironmentalInputs) -> f64 {
    let base = inputs.recycling_rate * 0.3
        + inputs.goals_progress * 0.4
        + inputs.license_compliance * 0.3;
    let penalty = (inputs.expired_licenses as f64 * 5.0).min(20.0);
    let bonus = if inputs.has_emissions_inventory { 5.0 } else { 0.0 };
    clamp_score(base - penalty + bonus)
}

/// Inputs of the social pillar
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SocialInputs {
    pub employees: usize,
    /// Share of women among active employees, 0..100
    pub women_share: f64,
    pub stakeholders: usize,
    pub high_influence_stakeholders: usize,
}

pub fn social_score(inputs: &SocialInputs) -> f64 {
    if inputs.employees == 0 && inputs.stakeholders == 0 {
        return 0.0;
    }
    // Parity scores 100 and degrades linearly towards 0 or 100 percent.
    let diversity = 100.0 - (inputs.women_share - 50.0).abs() * 2.0;
    let engagement = if inputs.stakeholders == 0 {
        0.0
    } else {
        (inputs.stakeholders as f64 * 10.0).min(100.0)
    };
    let bonus = if inputs.high_influence_stakeholders > 0 { 10.0 } else { 0.0 };
    clamp_score(diversity * 0.6 + engagement * 0.4 + bonus)
}

/// Inputs of the governance pillar
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GovernanceInputs {
    /// Completed over total compliance tasks, 0..100
    pub task_completion: f64,
    pub overdue_tasks: usize,
    /// Completed over total audits, 0..100
    pub audit_completion: f64,
    pub open_non_conformities: usize,
}

pub fn governance_score(inputs: &GovernanceInputs) -> f64 {
    let nc_health = 100.0 - (inputs.open_non_conformities as f64 * 10.0).min(100.0);
    let base = inputs.task_completion * 0.5 + inputs.audit_completion * 0.3 + nc_health * 0.2;
    let penalty = (inputs.overdue_tasks as f64 * 2.0).min(15.0);
    clamp_score(base - penalty)
}

pub fn overall_score(environmental: f64, social: f64, governance: f64) -> f64 {
    clamp_score(
        environmental * ENVIRONMENTAL_WEIGHT + social * SOCIAL_WEIGHT + governance * GOVERNANCE_WEIGHT,
    )
}

/// Letter rating shown next to the overall score
pub fn score_rating(score: f64) -> &'static str {
    match score {
        s if s >= 85.0 => "A",
        s if s >= 70.0 => "B",
        s if s >= 50.0 => "C",
        s if s >= 30.0 => "D",
        _ => "E",
    }
}

/// Percentage helper shared by the report builder
pub fn percentage(part: usize, total: usize) -> f64 {
    if total == 0 { 0.0 } else { part as f64 / total as f64 * 100.0 }
}
