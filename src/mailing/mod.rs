//! # Mailing Module
//!
//! Stakeholder communication: mailing lists, CSV contact import and email
//! campaigns linked to forms.

pub mod csv;
pub mod mailer;
pub mod service;

pub use mailer::{DisabledMailer, Mailer, SmtpMailer};
pub use service::{MailingAction, MailingService};

#[derive(Debug, thiserror::Error)]
pub enum MailingError {
    #[error("O arquivo CSV está vazio")]
    EmptyCsv,

    #[error("O CSV deve conter uma coluna 'email'")]
    MissingEmailColumn,

    #[error("CSV inválido: {0}")]
    MalformedCsv(#[from] ::csv::Error),

    #[error("SMTP não configurado")]
    MailerNotConfigured,

    #[error("Endereço de e-mail inválido: {0}")]
    InvalidAddress(String),

    #[error("Falha ao montar e-mail: {0}")]
    Build(String),

    #[error("Falha no envio SMTP: {0}")]
    Smtp(String),
}
