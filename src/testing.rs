//! In-memory doubles for the data, mail and LLM seams. Test builds only.

use anyhow::{bail, Result};
use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use chrono::Utc;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use tower::ServiceExt;
use uuid::Uuid;

use crate::assistant::ai_client::AssistantError;
use crate::assistant::{ChatModel, StaticMarketIntel};
use crate::auth::jwt::JwtService;
use crate::database::models::{
    Campaign, CampaignStatus, CompanyRef, ContactInput, EsgTable, MailingContact, MailingList,
    NewCampaign, NewMailingList,
};
use crate::database::source::{EsgDataSource, MailingStore};
use crate::mailing::mailer::{Mailer, OutgoingEmail};
use crate::mailing::MailingError;
use crate::server::AppState;

pub struct InMemoryEsgData {
    company: CompanyRef,
    users: HashSet<Uuid>,
    records: HashMap<EsgTable, Vec<Value>>,
    fail: bool,
}

impl Default for InMemoryEsgData {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryEsgData {
    pub fn new() -> Self {
        Self {
            company: CompanyRef {
                id: Uuid::new_v4(),
                name: "Acme Sustentável".to_string(),
            },
            users: HashSet::new(),
            records: HashMap::new(),
            fail: false,
        }
    }

    /// Every query fails as if the database were down
    pub fn failing() -> Self {
        Self { fail: true, ..Self::new() }
    }

    pub fn with(mut self, table: EsgTable, record: Value) -> Self {
        self.records.entry(table).or_default().push(record);
        self
    }

    pub fn with_user(mut self, user_id: Uuid) -> Self {
        self.users.insert(user_id);
        self
    }

    pub fn company_id(&self) -> Uuid {
        self.company.id
    }
}

#[async_trait]
impl EsgDataSource for InMemoryEsgData {
    async fn company_for_user(&self, user_id: Uuid) -> Result<Option<CompanyRef>> {
        Ok(self.users.contains(&user_id).then(|| self.company.clone()))
    }

    async fn fetch_records(&self, table: EsgTable, company_id: Uuid, limit: i64) -> Result<Vec<Value>> {
        if self.fail {
            bail!("connection refused");
        }
        if company_id != self.company.id {
            return Ok(Vec::new());
        }
        Ok(self
            .records
            .get(&table)
            .map(|rows| rows.iter().take(limit as usize).cloned().collect())
            .unwrap_or_default())
    }

    async fn ping(&self) -> Result<()> {
        if self.fail {
            bail!("connection refused");
        }
        Ok(())
    }
}

#[derive(Default)]
struct MailingTables {
    lists: Vec<MailingList>,
    contacts: Vec<MailingContact>,
    campaigns: Vec<Campaign>,
}

#[derive(Default)]
pub struct InMemoryMailing {
    tables: Mutex<MailingTables>,
}

impl InMemoryMailing {
    pub fn new() -> Self {
        Self::default()
    }
}

fn with_count(mut list: MailingList, contacts: &[MailingContact]) -> MailingList {
    list.contact_count = contacts.iter().filter(|c| c.mailing_list_id == list.id).count() as i64;
    list
}

#[async_trait]
impl MailingStore for InMemoryMailing {
    async fn list_mailing_lists(&self, company_id: Uuid) -> Result<Vec<MailingList>> {
        let t = self.tables.lock().unwrap();
        Ok(t.lists
            .iter()
            .filter(|l| l.company_id == company_id)
            .map(|l| with_count(l.clone(), &t.contacts))
            .collect())
    }

    async fn get_mailing_list(&self, company_id: Uuid, id: Uuid) -> Result<Option<MailingList>> {
        let t = self.tables.lock().unwrap();
        Ok(t.lists
            .iter()
            .find(|l| l.id == id && l.company_id == company_id)
            .map(|l| with_count(l.clone(), &t.contacts)))
    }

    async fn create_mailing_list(&self, company_id: Uuid, new: NewMailingList) -> Result<MailingList> {
        let list = MailingList {
            id: Uuid::new_v4(),
            company_id,
            name: new.name,
            description: new.description,
            form_id: new.form_id,
            contact_count: 0,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        self.tables.lock().unwrap().lists.push(list.clone());
        Ok(list)
    }

    async fn update_mailing_list(
        &self,
        company_id: Uuid,
        id: Uuid,
        name: Option<String>,
        description: Option<String>,
    ) -> Result<Option<MailingList>> {
        let mut t = self.tables.lock().unwrap();
        let Some(list) = t.lists.iter_mut().find(|l| l.id == id && l.company_id == company_id) else {
            return Ok(None);
        };
        if let Some(name) = name {
            list.name = name;
        }
        if description.is_some() {
            list.description = description;
        }
        list.updated_at = Utc::now();
        let list = list.clone();
        Ok(Some(with_count(list, &t.contacts)))
    }

    async fn delete_mailing_list(&self, company_id: Uuid, id: Uuid) -> Result<bool> {
        let mut t = self.tables.lock().unwrap();
        let before = t.lists.len();
        t.lists.retain(|l| !(l.id == id && l.company_id == company_id));
        let deleted = t.lists.len() < before;
        if deleted {
            t.contacts.retain(|c| c.mailing_list_id != id);
        }
        Ok(deleted)
    }

    async fn list_contacts(&self, company_id: Uuid, mailing_list_id: Uuid) -> Result<Vec<MailingContact>> {
        let t = self.tables.lock().unwrap();
        if !t.lists.iter().any(|l| l.id == mailing_list_id && l.company_id == company_id) {
            return Ok(Vec::new());
        }
        Ok(t.contacts.iter().filter(|c| c.mailing_list_id == mailing_list_id).cloned().collect())
    }

    async fn add_contacts(
        &self,
        company_id: Uuid,
        mailing_list_id: Uuid,
        contacts: &[ContactInput],
    ) -> Result<u64> {
        let mut t = self.tables.lock().unwrap();
        if !t.lists.iter().any(|l| l.id == mailing_list_id && l.company_id == company_id) {
            return Ok(0);
        }
        let mut inserted = 0;
        for contact in contacts {
            let exists = t
                .contacts
                .iter()
                .any(|c| c.mailing_list_id == mailing_list_id && c.email == contact.email);
            if exists {
                continue;
            }
            t.contacts.push(MailingContact {
                id: Uuid::new_v4(),
                mailing_list_id,
                email: contact.email.clone(),
                name: contact.name.clone(),
                company_name: contact.company_name.clone(),
                created_at: Utc::now(),
            });
            inserted += 1;
        }
        Ok(inserted)
    }

    async fn create_campaign(&self, company_id: Uuid, new: NewCampaign) -> Result<Campaign> {
        let campaign = Campaign {
            id: Uuid::new_v4(),
            company_id,
            mailing_list_id: new.mailing_list_id,
            form_id: new.form_id,
            subject: new.subject,
            message: new.message,
            status: CampaignStatus::Draft,
            sent_count: 0,
            failed_count: 0,
            created_at: Utc::now(),
            sent_at: None,
        };
        self.tables.lock().unwrap().campaigns.push(campaign.clone());
        Ok(campaign)
    }

    async fn get_campaign(&self, company_id: Uuid, id: Uuid) -> Result<Option<Campaign>> {
        let t = self.tables.lock().unwrap();
        Ok(t.campaigns.iter().find(|c| c.id == id && c.company_id == company_id).cloned())
    }

    async fn list_campaigns(&self, company_id: Uuid) -> Result<Vec<Campaign>> {
        let t = self.tables.lock().unwrap();
        Ok(t.campaigns.iter().filter(|c| c.company_id == company_id).cloned().collect())
    }

    async fn claim_campaign(&self, company_id: Uuid, id: Uuid) -> Result<Option<Campaign>> {
        let mut t = self.tables.lock().unwrap();
        let Some(campaign) = t
            .campaigns
            .iter_mut()
            .find(|c| c.id == id && c.company_id == company_id && c.status.is_sendable())
        else {
            return Ok(None);
        };
        campaign.status = CampaignStatus::Sending;
        Ok(Some(campaign.clone()))
    }

    async fn finish_campaign(&self, campaign_id: Uuid, sent: i32, failed: i32) -> Result<Campaign> {
        let mut t = self.tables.lock().unwrap();
        let Some(campaign) = t.campaigns.iter_mut().find(|c| c.id == campaign_id) else {
            bail!("campaign {campaign_id} not found");
        };
        campaign.status = CampaignStatus::after_send(sent);
        campaign.sent_count = sent;
        campaign.failed_count = failed;
        campaign.sent_at = Some(Utc::now());
        Ok(campaign.clone())
    }
}

/// Mailer that keeps delivered emails in memory. Each send yields once, like a
/// network round trip would.
#[derive(Default)]
pub struct RecordingMailer {
    delivered: Mutex<Vec<OutgoingEmail>>,
    reject: Option<String>,
}

impl RecordingMailer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fails every send addressed to `email`
    pub fn failing_for(email: &str) -> Self {
        Self { reject: Some(email.to_string()), ..Self::default() }
    }

    pub fn delivered(&self) -> Vec<OutgoingEmail> {
        self.delivered.lock().unwrap().clone()
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, email: OutgoingEmail) -> Result<(), MailingError> {
        tokio::task::yield_now().await;
        if self.reject.as_deref() == Some(email.to.as_str()) {
            return Err(MailingError::Smtp("550 mailbox unavailable".to_string()));
        }
        self.delivered.lock().unwrap().push(email);
        Ok(())
    }
}

/// Chat model returning a fixed reply and remembering the last prompt
pub struct FakeChatModel {
    reply: Option<String>,
    last_prompt: Mutex<Option<String>>,
}

impl FakeChatModel {
    pub fn replying(reply: &str) -> Self {
        Self { reply: Some(reply.to_string()), last_prompt: Mutex::new(None) }
    }

    pub fn failing() -> Self {
        Self { reply: None, last_prompt: Mutex::new(None) }
    }

    pub fn last_prompt(&self) -> Option<String> {
        self.last_prompt.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatModel for FakeChatModel {
    async fn complete(&self, system_prompt: &str, _user_message: &str) -> Result<String, AssistantError> {
        *self.last_prompt.lock().unwrap() = Some(system_prompt.to_string());
        self.reply
            .clone()
            .ok_or_else(|| AssistantError::Api("503 Service Unavailable".to_string()))
    }
}

/// App state wired to in-memory doubles, with an empty mailing store and a recording mailer.
pub fn test_state(data: InMemoryEsgData, llm: impl Into<Arc<FakeChatModel>>) -> AppState {
    let llm: Arc<FakeChatModel> = llm.into();
    AppState {
        jwt_service: Arc::new(JwtService::new("test-secret", "esg-server", "authenticated")),
        data: Arc::new(data),
        mailing: Arc::new(InMemoryMailing::new()),
        llm,
        mailer: Arc::new(RecordingMailer::new()),
        market: Arc::new(StaticMarketIntel),
        public_app_url: Arc::from("https://app.example.com"),
    }
}

pub fn bearer_for(state: &AppState, user_id: Uuid) -> String {
    state
        .jwt_service
        .create_token(user_id, "user@example.com".to_string())
        .unwrap()
}

pub fn post_json(uri: &str, token: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

/// Run one request through the router and decode the JSON body (`Null` when empty).
pub async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}
