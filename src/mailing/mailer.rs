//! Outgoing email over SMTP.

use async_trait::async_trait;
use lettre::message::{header::ContentType, Mailbox};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Address, AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

use crate::config::SmtpConfig;
use crate::database::models::{Campaign, MailingContact};
use crate::mailing::MailingError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingEmail {
    pub to: String,
    pub to_name: Option<String>,
    pub subject: String,
    pub html_body: String,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, email: OutgoingEmail) -> Result<(), MailingError>;

    /// Whether sends can succeed at all
    fn is_configured(&self) -> bool {
        true
    }
}

pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailer {
    pub fn new(config: &SmtpConfig) -> Result<Self, MailingError> {
        let from_address: Address = config
            .from_email
            .parse()
            .map_err(|_| MailingError::InvalidAddress(config.from_email.clone()))?;

        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
            .map_err(|e| MailingError::Smtp(e.to_string()))?
            .port(config.port);
        if !config.username.is_empty() {
            builder = builder.credentials(Credentials::new(config.username.clone(), config.password.clone()));
        }

        tracing::info!("📧 SMTP relay configured: {}:{}", config.host, config.port);

        Ok(Self {
            transport: builder.build(),
            from: Mailbox::new(Some(config.from_name.clone()), from_address),
        })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, email: OutgoingEmail) -> Result<(), MailingError> {
        let to_address: Address = email
            .to
            .parse()
            .map_err(|_| MailingError::InvalidAddress(email.to.clone()))?;

        let message = Message::builder()
            .from(self.from.clone())
            .to(Mailbox::new(email.to_name, to_address))
            .subject(email.subject)
            .header(ContentType::TEXT_HTML)
            .body(email.html_body)
            .map_err(|e| MailingError::Build(e.to_string()))?;

        self.transport
            .send(message)
            .await
            .map_err(|e| MailingError::Smtp(e.to_string()))?;
        Ok(())
    }
}

/// Stand-in used when SMTP is not configured
pub struct DisabledMailer;

#[async_trait]
impl Mailer for DisabledMailer {
    async fn send(&self, _email: OutgoingEmail) -> Result<(), MailingError> {
        Err(MailingError::MailerNotConfigured)
    }

    fn is_configured(&self) -> bool {
        false
    }
}

fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Email for one contact of a campaign. The form link is added when the
/// campaign points to a form.
pub fn render_campaign_email(campaign: &Campaign, contact: &MailingContact, public_app_url: &str) -> OutgoingEmail {
    let greeting = match &contact.name {
        Some(name) => format!("Olá, {}!", escape_html(name)),
        None => "Olá!".to_string(),
    };
    let message = escape_html(&campaign.message).replace('\n', "<br>");

    let mut html = format!(
        "<div style=\"font-family: Arial, sans-serif; max-width: 600px;\">\
         <p>{greeting}</p><p>{message}</p>"
    );
    if let Some(form_id) = campaign.form_id {
        html.push_str(&format!(
            "<p><a href=\"{public_app_url}/form/{form_id}\" \
             style=\"background:#15803d;color:#fff;padding:10px 18px;border-radius:6px;text-decoration:none;\">\
             Responder formulário</a></p>"
        ));
    }
    html.push_str("</div>");

    OutgoingEmail {
        to: contact.email.clone(),
        to_name: contact.name.clone(),
        subject: campaign.subject.clone(),
        html_body: html,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::models::CampaignStatus;
    use chrono::Utc;
    use uuid::Uuid;

    fn campaign(form_id: Option<Uuid>) -> Campaign {
        Campaign {
            id: Uuid::new_v4(),
            company_id: Uuid::new_v4(),
            mailing_list_id: Uuid::new_v4(),
            form_id,
            subject: "Pesquisa de materialidade".to_string(),
            message: "Linha 1\nSua opinião <importa>".to_string(),
            status: CampaignStatus::Draft,
            sent_count: 0,
            failed_count: 0,
            created_at: Utc::now(),
            sent_at: None,
        }
    }

    fn contact(name: Option<&str>) -> MailingContact {
        MailingContact {
            id: Uuid::new_v4(),
            mailing_list_id: Uuid::new_v4(),
            email: "ana@fornecedor.com".to_string(),
            name: name.map(str::to_string),
            company_name: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn renders_form_link_and_escapes_message() {
        let form_id = Uuid::new_v4();
        let email = render_campaign_email(&campaign(Some(form_id)), &contact(Some("Ana")), "https://app.esg.com");

        assert_eq!(email.to, "ana@fornecedor.com");
        assert_eq!(email.subject, "Pesquisa de materialidade");
        assert!(email.html_body.contains("Olá, Ana!"));
        assert!(email.html_body.contains("Linha 1<br>Sua opinião &lt;importa&gt;"));
        assert!(email.html_body.contains(&format!("https://app.esg.com/form/{form_id}")));
    }

    #[test]
    fn renders_without_form() {
        let email = render_campaign_email(&campaign(None), &contact(None), "https://app.esg.com");
        assert!(email.html_body.contains("Olá!"));
        assert!(!email.html_body.contains("/form/"));
    }

    #[tokio::test]
    async fn disabled_mailer_refuses() {
        let mailer = DisabledMailer;
        assert!(!mailer.is_configured());
        let email = render_campaign_email(&campaign(None), &contact(None), "");
        assert!(matches!(mailer.send(email).await, Err(MailingError::MailerNotConfigured)));
    }
}
