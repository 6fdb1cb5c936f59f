//! Postgres implementations of the data access traits.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::Value;
use uuid::Uuid;

use crate::database::connection::DatabaseConnection;
use crate::database::models::{
    Campaign, CampaignStatus, CompanyRef, ContactInput, EsgTable, FromRow, MailingContact,
    MailingList, NewCampaign, NewMailingList,
};
use crate::database::source::{EsgDataSource, MailingStore};

const MAILING_LIST_COLUMNS: &str = "l.id, l.company_id, l.name, l.description, l.form_id, l.created_at, l.updated_at, \
     (SELECT COUNT(*) FROM mailing_list_contacts c WHERE c.mailing_list_id = l.id) AS contact_count";

const CAMPAIGN_COLUMNS: &str = "id, company_id, mailing_list_id, form_id, subject, message, status, \
     sent_count, failed_count, created_at, sent_at";

fn map_rows<T: FromRow>(rows: &[tokio_postgres::Row]) -> Result<Vec<T>> {
    rows.iter()
        .map(|row| T::from_row(row).context("Failed to map row"))
        .collect()
}

#[async_trait]
impl EsgDataSource for DatabaseConnection {
    async fn company_for_user(&self, user_id: Uuid) -> Result<Option<CompanyRef>> {
        let client = self.pool().get().await.context("Failed to get DB connection")?;
        let row = client
            .query_opt(
                "SELECT c.id, c.name FROM profiles p JOIN companies c ON c.id = p.company_id WHERE p.id = $1",
                &[&user_id],
            )
            .await
            .context("Failed to query company for user")?;

        row.map(|r| CompanyRef::from_row(&r).context("Failed to map company"))
            .transpose()
    }

    async fn fetch_records(&self, table: EsgTable, company_id: Uuid, limit: i64) -> Result<Vec<Value>> {
        let client = self.pool().get().await.context("Failed to get DB connection")?;
        // Table names come from the EsgTable whitelist only.
        let sql = format!(
            "SELECT row_to_json(t) AS record FROM {} t WHERE t.company_id = $1 ORDER BY t.created_at DESC LIMIT $2",
            table.as_str()
        );
        let rows = client
            .query(&sql, &[&company_id, &limit])
            .await
            .with_context(|| format!("Failed to query {}", table.as_str()))?;

        rows.iter()
            .map(|row| row.try_get::<_, Value>("record").context("Failed to decode record"))
            .collect()
    }

    async fn ping(&self) -> Result<()> {
        self.health_check().await
    }
}

#[async_trait]
impl MailingStore for DatabaseConnection {
    async fn list_mailing_lists(&self, company_id: Uuid) -> Result<Vec<MailingList>> {
        let client = self.pool().get().await.context("Failed to get DB connection")?;
        let sql = format!(
            "SELECT {MAILING_LIST_COLUMNS} FROM mailing_lists l WHERE l.company_id = $1 ORDER BY l.created_at DESC"
        );
        let rows = client.query(&sql, &[&company_id]).await.context("Failed to list mailing lists")?;
        map_rows(&rows)
    }

    async fn get_mailing_list(&self, company_id: Uuid, id: Uuid) -> Result<Option<MailingList>> {
        let client = self.pool().get().await.context("Failed to get DB connection")?;
        let sql = format!(
            "SELECT {MAILING_LIST_COLUMNS} FROM mailing_lists l WHERE l.id = $1 AND l.company_id = $2"
        );
        let row = client.query_opt(&sql, &[&id, &company_id]).await.context("Failed to get mailing list")?;
        row.map(|r| MailingList::from_row(&r).context("Failed to map mailing list"))
            .transpose()
    }

    async fn create_mailing_list(&self, company_id: Uuid, new: NewMailingList) -> Result<MailingList> {
        let client = self.pool().get().await.context("Failed to get DB connection")?;
        let row = client
            .query_one(
                "INSERT INTO mailing_lists (company_id, name, description, form_id) VALUES ($1, $2, $3, $4) \
                 RETURNING id, company_id, name, description, form_id, created_at, updated_at, 0::bigint AS contact_count",
                &[&company_id, &new.name, &new.description, &new.form_id],
            )
            .await
            .context("Failed to insert mailing list")?;
        MailingList::from_row(&row).context("Failed to map mailing list")
    }

    async fn update_mailing_list(
        &self,
        company_id: Uuid,
        id: Uuid,
        name: Option<String>,
        description: Option<String>,
    ) -> Result<Option<MailingList>> {
        let updated = {
            let client = self.pool().get().await.context("Failed to get DB connection")?;
            client
                .execute(
                    "UPDATE mailing_lists SET name = COALESCE($3, name), description = COALESCE($4, description), \
                     updated_at = NOW() WHERE id = $1 AND company_id = $2",
                    &[&id, &company_id, &name, &description],
                )
                .await
                .context("Failed to update mailing list")?
        };

        if updated == 0 {
            return Ok(None);
        }
        self.get_mailing_list(company_id, id).await
    }

    async fn delete_mailing_list(&self, company_id: Uuid, id: Uuid) -> Result<bool> {
        let client = self.pool().get().await.context("Failed to get DB connection")?;
        let n = client
            .execute(
                "DELETE FROM mailing_lists WHERE id = $1 AND company_id = $2",
                &[&id, &company_id],
            )
            .await
            .context("Failed to delete mailing list")?;
        Ok(n > 0)
    }

    async fn list_contacts(&self, company_id: Uuid, mailing_list_id: Uuid) -> Result<Vec<MailingContact>> {
        let client = self.pool().get().await.context("Failed to get DB connection")?;
        let rows = client
            .query(
                "SELECT c.id, c.mailing_list_id, c.email, c.name, c.company_name, c.created_at \
                 FROM mailing_list_contacts c JOIN mailing_lists l ON l.id = c.mailing_list_id \
                 WHERE l.id = $1 AND l.company_id = $2 ORDER BY c.created_at",
                &[&mailing_list_id, &company_id],
            )
            .await
            .context("Failed to list contacts")?;
        map_rows(&rows)
    }

    async fn add_contacts(
        &self,
        company_id: Uuid,
        mailing_list_id: Uuid,
        contacts: &[ContactInput],
    ) -> Result<u64> {
        let mut client = self.pool().get().await.context("Failed to get DB connection")?;
        let tx = client.transaction().await.context("Failed to start transaction")?;
        let stmt = tx
            .prepare(
                "INSERT INTO mailing_list_contacts (mailing_list_id, email, name, company_name) \
                 SELECT $1::uuid, $2::text, $3::text, $4::text WHERE EXISTS (SELECT 1 FROM mailing_lists WHERE id = $1 AND company_id = $5) \
                 ON CONFLICT (mailing_list_id, email) DO NOTHING",
            )
            .await
            .context("Failed to prepare contact insert")?;

        let mut inserted = 0;
        for contact in contacts {
            inserted += tx
                .execute(
                    &stmt,
                    &[&mailing_list_id, &contact.email, &contact.name, &contact.company_name, &company_id],
                )
                .await
                .with_context(|| format!("Failed to insert contact {}", contact.email))?;
        }

        tx.commit().await.context("Failed to commit contacts")?;
        Ok(inserted)
    }

    async fn create_campaign(&self, company_id: Uuid, new: NewCampaign) -> Result<Campaign> {
        let client = self.pool().get().await.context("Failed to get DB connection")?;
        let sql = format!(
            "INSERT INTO email_campaigns (company_id, mailing_list_id, form_id, subject, message, status) \
             VALUES ($1, $2, $3, $4, $5, $6) RETURNING {CAMPAIGN_COLUMNS}"
        );
        let row = client
            .query_one(
                &sql,
                &[&company_id, &new.mailing_list_id, &new.form_id, &new.subject, &new.message, &CampaignStatus::Draft.as_str()],
            )
            .await
            .context("Failed to insert campaign")?;
        Campaign::from_row(&row).context("Failed to map campaign")
    }

    async fn get_campaign(&self, company_id: Uuid, id: Uuid) -> Result<Option<Campaign>> {
        let client = self.pool().get().await.context("Failed to get DB connection")?;
        let sql = format!("SELECT {CAMPAIGN_COLUMNS} FROM email_campaigns WHERE id = $1 AND company_id = $2");
        let row = client.query_opt(&sql, &[&id, &company_id]).await.context("Failed to get campaign")?;
        row.map(|r| Campaign::from_row(&r).context("Failed to map campaign"))
            .transpose()
    }

    async fn list_campaigns(&self, company_id: Uuid) -> Result<Vec<Campaign>> {
        let client = self.pool().get().await.context("Failed to get DB connection")?;
        let sql = format!(
            "SELECT {CAMPAIGN_COLUMNS} FROM email_campaigns WHERE company_id = $1 ORDER BY created_at DESC"
        );
        let rows = client.query(&sql, &[&company_id]).await.context("Failed to list campaigns")?;
        map_rows(&rows)
    }

    async fn claim_campaign(&self, company_id: Uuid, id: Uuid) -> Result<Option<Campaign>> {
        let client = self.pool().get().await.context("Failed to get DB connection")?;
        let sql = format!(
            "UPDATE email_campaigns SET status = $3 \
             WHERE id = $1 AND company_id = $2 AND status IN ($4, $5) RETURNING {CAMPAIGN_COLUMNS}"
        );
        let row = client
            .query_opt(
                &sql,
                &[
                    &id,
                    &company_id,
                    &CampaignStatus::Sending.as_str(),
                    &CampaignStatus::Draft.as_str(),
                    &CampaignStatus::Failed.as_str(),
                ],
            )
            .await
            .context("Failed to claim campaign")?;
        row.map(|r| Campaign::from_row(&r).context("Failed to map campaign"))
            .transpose()
    }

    async fn finish_campaign(&self, campaign_id: Uuid, sent: i32, failed: i32) -> Result<Campaign> {
        let client = self.pool().get().await.context("Failed to get DB connection")?;
        let sql = format!(
            "UPDATE email_campaigns SET status = $2, sent_count = $3, failed_count = $4, sent_at = NOW() \
             WHERE id = $1 RETURNING {CAMPAIGN_COLUMNS}"
        );
        let row = client
            .query_one(&sql, &[&campaign_id, &CampaignStatus::after_send(sent).as_str(), &sent, &failed])
            .await
            .context("Failed to update campaign")?;
        Campaign::from_row(&row).context("Failed to map campaign")
    }
}
