use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio_postgres::Row;
use uuid::Uuid;

/// Map a Postgres row into a model
pub trait FromRow: Sized {
    fn from_row(row: &Row) -> Result<Self, tokio_postgres::Error>;
}

/// ESG tables the assistant may read. Table names never come from user input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EsgTable {
    Licenses,
    Emissions,
    Goals,
    WasteLogs,
    EnergyConsumption,
    WaterConsumption,
    EsgRisks,
    EsgOpportunities,
    NonConformities,
    Audits,
    ComplianceTasks,
    Documents,
    Employees,
    Stakeholders,
    Suppliers,
}

impl EsgTable {
    pub fn as_str(&self) -> &'static str {
        match self {
            EsgTable::Licenses => "licenses",
            EsgTable::Emissions => "emissions",
            EsgTable::Goals => "goals",
            EsgTable::WasteLogs => "waste_logs",
            EsgTable::EnergyConsumption => "energy_consumption",
            EsgTable::WaterConsumption => "water_consumption",
            EsgTable::EsgRisks => "esg_risks",
            EsgTable::EsgOpportunities => "esg_opportunities",
            EsgTable::NonConformities => "non_conformities",
            EsgTable::Audits => "audits",
            EsgTable::ComplianceTasks => "compliance_tasks",
            EsgTable::Documents => "documents",
            EsgTable::Employees => "employees",
            EsgTable::Stakeholders => "stakeholders",
            EsgTable::Suppliers => "suppliers",
        }
    }
}

/// Company the authenticated user belongs to
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompanyRef {
    pub id: Uuid,
    pub name: String,
}

impl FromRow for CompanyRef {
    fn from_row(row: &Row) -> Result<Self, tokio_postgres::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
        })
    }
}

// --- Record accessors ---
//
// ESG records travel as opaque JSON produced by `row_to_json`. These helpers
// read the handful of fields the assistant and the scoring code care about.

pub fn str_field<'a>(record: &'a Value, key: &str) -> Option<&'a str> {
    record.get(key).and_then(Value::as_str)
}

/// Numeric field; Postgres `numeric` columns arrive as strings in JSON.
pub fn f64_field(record: &Value, key: &str) -> Option<f64> {
    match record.get(key)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Date field, accepting `YYYY-MM-DD` or a timestamp starting with one.
pub fn date_field(record: &Value, key: &str) -> Option<NaiveDate> {
    let raw = str_field(record, key)?;
    let day = raw.get(..10).unwrap_or(raw);
    NaiveDate::parse_from_str(day, "%Y-%m-%d").ok()
}

/// Case-insensitive equality against any of the given status labels.
pub fn status_in(record: &Value, key: &str, statuses: &[&str]) -> bool {
    str_field(record, key)
        .map(|s| {
            let s = s.trim().to_lowercase();
            statuses.iter().any(|candidate| s == candidate.to_lowercase())
        })
        .unwrap_or(false)
}

// --- Mailing ---

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MailingList {
    pub id: Uuid,
    pub company_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub form_id: Option<Uuid>,
    pub contact_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl FromRow for MailingList {
    fn from_row(row: &Row) -> Result<Self, tokio_postgres::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            company_id: row.try_get("company_id")?,
            name: row.try_get("name")?,
            description: row.try_get("description")?,
            form_id: row.try_get("form_id")?,
            contact_count: row.try_get("contact_count")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MailingContact {
    pub id: Uuid,
    pub mailing_list_id: Uuid,
    pub email: String,
    pub name: Option<String>,
    pub company_name: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl FromRow for MailingContact {
    fn from_row(row: &Row) -> Result<Self, tokio_postgres::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            mailing_list_id: row.try_get("mailing_list_id")?,
            email: row.try_get("email")?,
            name: row.try_get("name")?,
            company_name: row.try_get("company_name")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

/// Contact as submitted by a client or parsed from CSV
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactInput {
    pub email: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub company_name: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewMailingList {
    pub name: String,
    pub description: Option<String>,
    pub form_id: Option<Uuid>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CampaignStatus {
    Draft,
    /// Claimed by a send in progress
    Sending,
    Sent,
    Failed,
}

impl CampaignStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CampaignStatus::Draft => "draft",
            CampaignStatus::Sending => "sending",
            CampaignStatus::Sent => "sent",
            CampaignStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "sending" => CampaignStatus::Sending,
            "sent" => CampaignStatus::Sent,
            "failed" => CampaignStatus::Failed,
            _ => CampaignStatus::Draft,
        }
    }

    /// Whether a send may start from this status
    pub fn is_sendable(&self) -> bool {
        matches!(self, CampaignStatus::Draft | CampaignStatus::Failed)
    }

    /// Status after a send attempt: failed only when nothing went out.
    pub fn after_send(sent: i32) -> Self {
        if sent > 0 { CampaignStatus::Sent } else { CampaignStatus::Failed }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Campaign {
    pub id: Uuid,
    pub company_id: Uuid,
    pub mailing_list_id: Uuid,
    pub form_id: Option<Uuid>,
    pub subject: String,
    pub message: String,
    pub status: CampaignStatus,
    pub sent_count: i32,
    pub failed_count: i32,
    pub created_at: DateTime<Utc>,
    pub sent_at: Option<DateTime<Utc>>,
}

impl FromRow for Campaign {
    fn from_row(row: &Row) -> Result<Self, tokio_postgres::Error> {
        let status: String = row.try_get("status")?;
        Ok(Self {
            id: row.try_get("id")?,
            company_id: row.try_get("company_id")?,
            mailing_list_id: row.try_get("mailing_list_id")?,
            form_id: row.try_get("form_id")?,
            subject: row.try_get("subject")?,
            message: row.try_get("message")?,
            status: CampaignStatus::parse(&status),
            sent_count: row.try_get("sent_count")?,
            failed_count: row.try_get("failed_count")?,
            created_at: row.try_get("created_at")?,
            sent_at: row.try_get("sent_at")?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct NewCampaign {
    pub mailing_list_id: Uuid,
    pub form_id: Option<Uuid>,
    pub subject: String,
    pub message: String,
}
