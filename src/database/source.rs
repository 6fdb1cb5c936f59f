//! Data access seams used by the HTTP layer.
//!
//! Handlers only see these traits; `DatabaseConnection` implements both over
//! Postgres and tests plug in in-memory versions.

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;
use uuid::Uuid;

use crate::database::models::{
    Campaign, CompanyRef, ContactInput, EsgTable, MailingContact, MailingList, NewCampaign,
    NewMailingList,
};

/// Read-only access to a company's ESG records.
#[async_trait]
pub trait EsgDataSource: Send + Sync {
    /// Company linked to the user's profile, if any
    async fn company_for_user(&self, user_id: Uuid) -> Result<Option<CompanyRef>>;

    /// Most recent records of `table` for the company, newest first
    async fn fetch_records(&self, table: EsgTable, company_id: Uuid, limit: i64) -> Result<Vec<Value>>;

    /// Cheap round trip used by the health endpoint
    async fn ping(&self) -> Result<()>;
}

/// Persistence for mailing lists, contacts and campaigns. Every call is
/// scoped to a company; rows of other companies are invisible.
#[async_trait]
pub trait MailingStore: Send + Sync {
    async fn list_mailing_lists(&self, company_id: Uuid) -> Result<Vec<MailingList>>;

    async fn get_mailing_list(&self, company_id: Uuid, id: Uuid) -> Result<Option<MailingList>>;

    async fn create_mailing_list(&self, company_id: Uuid, new: NewMailingList) -> Result<MailingList>;

    async fn update_mailing_list(
        &self,
        company_id: Uuid,
        id: Uuid,
        name: Option<String>,
        description: Option<String>,
    ) -> Result<Option<MailingList>>;

    async fn delete_mailing_list(&self, company_id: Uuid, id: Uuid) -> Result<bool>;

    async fn list_contacts(&self, company_id: Uuid, mailing_list_id: Uuid) -> Result<Vec<MailingContact>>;

    /// Inserts contacts, ignoring emails already on the list. Returns the number inserted.
    async fn add_contacts(
        &self,
        company_id: Uuid,
        mailing_list_id: Uuid,
        contacts: &[ContactInput],
    ) -> Result<u64>;

    async fn create_campaign(&self, company_id: Uuid, new: NewCampaign) -> Result<Campaign>;

    async fn get_campaign(&self, company_id: Uuid, id: Uuid) -> Result<Option<Campaign>>;

    async fn list_campaigns(&self, company_id: Uuid) -> Result<Vec<Campaign>>;

    /// Atomically moves a draft or failed campaign to `sending`. `None` when
    /// the campaign is missing or another send already claimed it.
    async fn claim_campaign(&self, company_id: Uuid, id: Uuid) -> Result<Option<Campaign>>;

    /// Records the outcome of a send and returns the updated campaign
    async fn finish_campaign(&self, campaign_id: Uuid, sent: i32, failed: i32) -> Result<Campaign>;
}
