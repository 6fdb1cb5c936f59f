//! Action dispatcher behind the mailing endpoint.

use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{info, warn};
use uuid::Uuid;

use crate::database::models::{CampaignStatus, ContactInput, NewCampaign, NewMailingList};
use crate::database::source::MailingStore;
use crate::error::{ApiError, ApiResult};
use crate::mailing::csv::{normalize_contact, parse_contacts_csv};
use crate::mailing::mailer::{render_campaign_email, Mailer};

/// Request body of the mailing endpoint, tagged by `action`.
#[derive(Debug, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum MailingAction {
    ListMailingLists,
    CreateMailingList {
        name: String,
        description: Option<String>,
        form_id: Option<Uuid>,
        #[serde(default)]
        contacts: Vec<ContactInput>,
    },
    UpdateMailingList {
        id: Uuid,
        name: Option<String>,
        description: Option<String>,
    },
    DeleteMailingList {
        id: Uuid,
    },
    GetContacts {
        mailing_list_id: Uuid,
    },
    ImportCsv {
        mailing_list_id: Uuid,
        csv_data: String,
    },
    CreateCampaign {
        mailing_list_id: Uuid,
        form_id: Option<Uuid>,
        subject: String,
        message: String,
    },
    ListCampaigns,
    SendCampaign {
        campaign_id: Uuid,
    },
}

fn required(value: &str, field: &str) -> ApiResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ApiError::BadRequest(format!("O campo '{field}' é obrigatório")));
    }
    Ok(trimmed.to_string())
}

pub struct MailingService<'a> {
    store: &'a dyn MailingStore,
    mailer: &'a dyn Mailer,
    company_id: Uuid,
    public_app_url: &'a str,
}

impl<'a> MailingService<'a> {
    pub fn new(
        store: &'a dyn MailingStore,
        mailer: &'a dyn Mailer,
        company_id: Uuid,
        public_app_url: &'a str,
    ) -> Self {
        Self { store, mailer, company_id, public_app_url }
    }

    pub async fn execute(&self, action: MailingAction) -> ApiResult<Value> {
        match action {
            MailingAction::ListMailingLists => {
                let lists = self.store.list_mailing_lists(self.company_id).await?;
                Ok(json!({ "mailingLists": lists }))
            }
            MailingAction::CreateMailingList { name, description, form_id, contacts } => {
                let new = NewMailingList {
                    name: required(&name, "name")?,
                    description,
                    form_id,
                };
                let list = self.store.create_mailing_list(self.company_id, new).await?;

                let contacts: Vec<ContactInput> = contacts.into_iter().filter_map(normalize_contact).collect();
                if !contacts.is_empty() {
                    self.store.add_contacts(self.company_id, list.id, &contacts).await?;
                }
                let list = self
                    .store
                    .get_mailing_list(self.company_id, list.id)
                    .await?
                    .unwrap_or(list);

                info!("Created mailing list {} with {} contacts", list.id, list.contact_count);
                Ok(json!({ "mailingList": list }))
            }
            MailingAction::UpdateMailingList { id, name, description } => {
                let name = name.as_deref().map(|n| required(n, "name")).transpose()?;
                let list = self
                    .store
                    .update_mailing_list(self.company_id, id, name, description)
                    .await?
                    .ok_or_else(|| ApiError::NotFound("Lista de e-mails não encontrada".to_string()))?;
                Ok(json!({ "mailingList": list }))
            }
            MailingAction::DeleteMailingList { id } => {
                if !self.store.delete_mailing_list(self.company_id, id).await? {
                    return Err(ApiError::NotFound("Lista de e-mails não encontrada".to_string()));
                }
                Ok(json!({ "success": true }))
            }
            MailingAction::GetContacts { mailing_list_id } => {
                self.ensure_list(mailing_list_id).await?;
                let contacts = self.store.list_contacts(self.company_id, mailing_list_id).await?;
                Ok(json!({ "contacts": contacts }))
            }
            MailingAction::ImportCsv { mailing_list_id, csv_data } => {
                self.ensure_list(mailing_list_id).await?;
                let parsed = parse_contacts_csv(&csv_data).map_err(|e| ApiError::BadRequest(e.to_string()))?;

                let total = parsed.contacts.len() + parsed.skipped;
                let imported = self
                    .store
                    .add_contacts(self.company_id, mailing_list_id, &parsed.contacts)
                    .await? as usize;

                info!("Imported {}/{} contacts into list {}", imported, total, mailing_list_id);
                Ok(json!({ "imported": imported, "skipped": total - imported, "total": total }))
            }
            MailingAction::CreateCampaign { mailing_list_id, form_id, subject, message } => {
                self.ensure_list(mailing_list_id).await?;
                let new = NewCampaign {
                    mailing_list_id,
                    form_id,
                    subject: required(&subject, "subject")?,
                    message: required(&message, "message")?,
                };
                let campaign = self.store.create_campaign(self.company_id, new).await?;
                Ok(json!({ "campaign": campaign }))
            }
            MailingAction::ListCampaigns => {
                let campaigns = self.store.list_campaigns(self.company_id).await?;
                Ok(json!({ "campaigns": campaigns }))
            }
            MailingAction::SendCampaign { campaign_id } => self.send_campaign(campaign_id).await,
        }
    }

    async fn ensure_list(&self, id: Uuid) -> ApiResult<()> {
        match self.store.get_mailing_list(self.company_id, id).await? {
            Some(_) => Ok(()),
            None => Err(ApiError::NotFound("Lista de e-mails não encontrada".to_string())),
        }
    }

    /// Sends sequentially; a failed recipient is counted and the batch continues.
    async fn send_campaign(&self, campaign_id: Uuid) -> ApiResult<Value> {
        if !self.mailer.is_configured() {
            return Err(ApiError::Unavailable("SMTP não configurado".to_string()));
        }

        let campaign = self
            .store
            .get_campaign(self.company_id, campaign_id)
            .await?
            .ok_or_else(|| ApiError::NotFound("Campanha não encontrada".to_string()))?;
        match campaign.status {
            CampaignStatus::Sent => return Err(ApiError::BadRequest("Campanha já enviada".to_string())),
            CampaignStatus::Sending => return Err(ApiError::BadRequest("Campanha em envio".to_string())),
            CampaignStatus::Draft | CampaignStatus::Failed => {}
        }

        let contacts = self.store.list_contacts(self.company_id, campaign.mailing_list_id).await?;
        if contacts.is_empty() {
            return Err(ApiError::BadRequest("A lista de e-mails não possui contatos".to_string()));
        }

        // Only one request wins the claim; a concurrent retry gets 400.
        let campaign = self
            .store
            .claim_campaign(self.company_id, campaign.id)
            .await?
            .ok_or_else(|| ApiError::BadRequest("Campanha já enviada ou em envio".to_string()))?;

        let mut sent = 0;
        let mut failed = 0;
        for contact in &contacts {
            let email = render_campaign_email(&campaign, contact, self.public_app_url);
            match self.mailer.send(email).await {
                Ok(()) => sent += 1,
                Err(e) => {
                    warn!("Failed to send campaign {} to {}: {}", campaign.id, contact.email, e);
                    failed += 1;
                }
            }
        }

        info!("Campaign {} finished: {} sent, {} failed", campaign.id, sent, failed);
        let campaign = self.store.finish_campaign(campaign.id, sent, failed).await?;
        Ok(json!({ "campaign": campaign, "sent": sent, "failed": failed }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mailing::DisabledMailer;
    use crate::testing::{InMemoryMailing, RecordingMailer};

    fn action(value: Value) -> MailingAction {
        serde_json::from_value(value).unwrap()
    }

    async fn create_list(service: &MailingService<'_>) -> Uuid {
        let created = service
            .execute(action(json!({"action": "create_mailing_list", "name": "Fornecedores"})))
            .await
            .unwrap();
        created["mailingList"]["id"].as_str().unwrap().parse().unwrap()
    }

    #[test]
    fn actions_deserialize_with_camel_case_fields() {
        let parsed = action(json!({"action": "import_csv", "mailingListId": Uuid::nil(), "csvData": "email"}));
        assert!(matches!(parsed, MailingAction::ImportCsv { .. }));
        assert!(serde_json::from_value::<MailingAction>(json!({"action": "explode"})).is_err());
    }

    #[tokio::test]
    async fn list_lifecycle() {
        let store = InMemoryMailing::new();
        let mailer = RecordingMailer::new();
        let company = Uuid::new_v4();
        let service = MailingService::new(&store, &mailer, company, "https://app");

        let id = create_list(&service).await;

        let updated = service
            .execute(action(json!({"action": "update_mailing_list", "id": id, "description": "Cadeia de valor"})))
            .await
            .unwrap();
        assert_eq!(updated["mailingList"]["description"], "Cadeia de valor");
        assert_eq!(updated["mailingList"]["name"], "Fornecedores");

        let lists = service.execute(MailingAction::ListMailingLists).await.unwrap();
        assert_eq!(lists["mailingLists"].as_array().unwrap().len(), 1);

        // Other companies cannot see or delete it
        let other = MailingService::new(&store, &mailer, Uuid::new_v4(), "https://app");
        assert!(matches!(
            other.execute(MailingAction::DeleteMailingList { id }).await,
            Err(ApiError::NotFound(_))
        ));

        service.execute(MailingAction::DeleteMailingList { id }).await.unwrap();
        let lists = service.execute(MailingAction::ListMailingLists).await.unwrap();
        assert!(lists["mailingLists"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn blank_name_is_rejected() {
        let store = InMemoryMailing::new();
        let mailer = RecordingMailer::new();
        let service = MailingService::new(&store, &mailer, Uuid::new_v4(), "https://app");

        let result = service
            .execute(action(json!({"action": "create_mailing_list", "name": "   "})))
            .await;
        assert!(matches!(result, Err(ApiError::BadRequest(_))));
    }

    #[tokio::test]
    async fn csv_import_counts_duplicates_and_invalid_rows() {
        let store = InMemoryMailing::new();
        let mailer = RecordingMailer::new();
        let service = MailingService::new(&store, &mailer, Uuid::new_v4(), "https://app");
        let id = create_list(&service).await;

        let csv = "nome;contato;email\nAcme;John;john@acme.com\nAcme;Dup;JOHN@acme.com\nBeta;Sem;invalido";
        let result = service
            .execute(action(json!({"action": "import_csv", "mailingListId": id, "csvData": csv})))
            .await
            .unwrap();

        assert_eq!(result["imported"], 1);
        assert_eq!(result["skipped"], 2);
        assert_eq!(result["total"], 3);

        let contacts = service.execute(MailingAction::GetContacts { mailing_list_id: id }).await.unwrap();
        assert_eq!(contacts["contacts"][0]["companyName"], "Acme");

        let bad = service
            .execute(action(json!({"action": "import_csv", "mailingListId": id, "csvData": "nome\nAcme"})))
            .await;
        assert!(matches!(bad, Err(ApiError::BadRequest(_))));
    }

    #[tokio::test]
    async fn campaign_send_counts_failures() {
        let store = InMemoryMailing::new();
        let mailer = RecordingMailer::failing_for("bounce@acme.com");
        let service = MailingService::new(&store, &mailer, Uuid::new_v4(), "https://app");
        let id = create_list(&service).await;

        service
            .execute(action(json!({
                "action": "import_csv",
                "mailingListId": id,
                "csvData": "email,contato\nok@acme.com,Ok\nbounce@acme.com,Bounce"
            })))
            .await
            .unwrap();

        let form_id = Uuid::new_v4();
        let created = service
            .execute(action(json!({
                "action": "create_campaign",
                "mailingListId": id,
                "formId": form_id,
                "subject": "Pesquisa",
                "message": "Responda, por favor"
            })))
            .await
            .unwrap();
        let campaign_id: Uuid = created["campaign"]["id"].as_str().unwrap().parse().unwrap();

        let result = service.execute(MailingAction::SendCampaign { campaign_id }).await.unwrap();
        assert_eq!(result["sent"], 1);
        assert_eq!(result["failed"], 1);
        assert_eq!(result["campaign"]["status"], "sent");

        let delivered = mailer.delivered();
        assert_eq!(delivered.len(), 1);
        assert!(delivered[0].html_body.contains(&format!("https://app/form/{form_id}")));

        let again = service.execute(MailingAction::SendCampaign { campaign_id }).await;
        assert!(matches!(again, Err(ApiError::BadRequest(_))));
    }

    #[tokio::test]
    async fn concurrent_sends_deliver_once() {
        let store = InMemoryMailing::new();
        let mailer = RecordingMailer::new();
        let service = MailingService::new(&store, &mailer, Uuid::new_v4(), "https://app");
        let id = create_list(&service).await;
        service
            .execute(action(json!({"action": "import_csv", "mailingListId": id, "csvData": "email\nana@acme.com"})))
            .await
            .unwrap();
        let created = service
            .execute(action(json!({
                "action": "create_campaign",
                "mailingListId": id,
                "subject": "Pesquisa",
                "message": "Olá"
            })))
            .await
            .unwrap();
        let campaign_id: Uuid = created["campaign"]["id"].as_str().unwrap().parse().unwrap();

        let (first, second) = tokio::join!(
            service.execute(MailingAction::SendCampaign { campaign_id }),
            service.execute(MailingAction::SendCampaign { campaign_id }),
        );
        let outcomes = [first, second];

        assert_eq!(outcomes.iter().filter(|r| r.is_ok()).count(), 1);
        assert!(outcomes.iter().any(|r| matches!(r, Err(ApiError::BadRequest(_)))));
        assert_eq!(mailer.delivered().len(), 1);
    }

    #[tokio::test]
    async fn failed_campaign_can_be_retried() {
        let store = InMemoryMailing::new();
        let mailer = RecordingMailer::failing_for("ana@acme.com");
        let service = MailingService::new(&store, &mailer, Uuid::new_v4(), "https://app");
        let id = create_list(&service).await;
        service
            .execute(action(json!({"action": "import_csv", "mailingListId": id, "csvData": "email\nana@acme.com"})))
            .await
            .unwrap();
        let created = service
            .execute(action(json!({"action": "create_campaign", "mailingListId": id, "subject": "S", "message": "M"})))
            .await
            .unwrap();
        let campaign_id: Uuid = created["campaign"]["id"].as_str().unwrap().parse().unwrap();

        let result = service.execute(MailingAction::SendCampaign { campaign_id }).await.unwrap();
        assert_eq!(result["campaign"]["status"], "failed");

        let retry = service.execute(MailingAction::SendCampaign { campaign_id }).await.unwrap();
        assert_eq!(retry["failed"], 1);
    }

    #[tokio::test]
    async fn campaign_requires_smtp() {
        let store = InMemoryMailing::new();
        let service = MailingService::new(&store, &DisabledMailer, Uuid::new_v4(), "https://app");

        let result = service.execute(MailingAction::SendCampaign { campaign_id: Uuid::new_v4() }).await;
        assert!(matches!(result, Err(ApiError::Unavailable(_))));
    }
}
