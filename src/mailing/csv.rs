//! CSV contact import.
//!
//! Accepts comma or semicolon separated files with a header row. Quoted
//! cells may contain the delimiter. Only the `email` column is mandatory;
//! rows without a usable address are dropped.

use csv::{ReaderBuilder, StringRecord, Trim};

use crate::database::models::ContactInput;
use crate::mailing::MailingError;

const EMAIL_COLUMNS: &[&str] = &["email", "e-mail"];
const COMPANY_COLUMNS: &[&str] = &["nome", "empresa", "company"];
const NAME_COLUMNS: &[&str] = &["contato", "contact", "name"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsvImport {
    pub contacts: Vec<ContactInput>,
    /// Data rows dropped for a missing or malformed email
    pub skipped: usize,
}

pub fn is_valid_email(email: &str) -> bool {
    let email = email.trim();
    !email.is_empty() && email.contains('@')
}

/// Normalise a contact coming from a client: trimmed, lower-cased email and
/// empty optional fields collapsed to `None`. Invalid emails yield `None`.
pub fn normalize_contact(contact: ContactInput) -> Option<ContactInput> {
    if !is_valid_email(&contact.email) {
        return None;
    }
    let non_empty = |v: Option<String>| v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty());
    Some(ContactInput {
        email: contact.email.trim().to_lowercase(),
        name: non_empty(contact.name),
        company_name: non_empty(contact.company_name),
    })
}

/// Semicolon when the header line has one, else comma.
fn detect_delimiter(header_line: &str) -> u8 {
    if header_line.contains(';') { b';' } else { b',' }
}

fn cell(record: &StringRecord, idx: Option<usize>) -> Option<String> {
    idx.and_then(|i| record.get(i))
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

pub fn parse_contacts_csv(text: &str) -> Result<CsvImport, MailingError> {
    let body = text.trim_start_matches('\u{feff}').trim_start();
    let header_line = body.lines().next().ok_or(MailingError::EmptyCsv)?;

    let mut reader = ReaderBuilder::new()
        .delimiter(detect_delimiter(header_line))
        .flexible(true)
        .trim(Trim::All)
        .from_reader(body.as_bytes());

    let columns: Vec<String> = reader.headers()?.iter().map(str::to_lowercase).collect();
    let find = |names: &[&str]| columns.iter().position(|c| names.contains(&c.as_str()));

    let email_idx = find(EMAIL_COLUMNS).ok_or(MailingError::MissingEmailColumn)?;
    let company_idx = find(COMPANY_COLUMNS);
    let name_idx = find(NAME_COLUMNS);

    let mut contacts = Vec::new();
    let mut skipped = 0;

    for record in reader.records() {
        let record = record?;
        if record.iter().all(str::is_empty) {
            continue;
        }

        let contact = cell(&record, Some(email_idx)).and_then(|email| {
            normalize_contact(ContactInput {
                email,
                name: cell(&record, name_idx),
                company_name: cell(&record, company_idx),
            })
        });

        match contact {
            Some(contact) => contacts.push(contact),
            None => skipped += 1,
        }
    }

    tracing::debug!("Parsed {} contacts from CSV, skipped {}", contacts.len(), skipped);
    Ok(CsvImport { contacts, skipped })
}
