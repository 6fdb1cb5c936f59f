use axum::{
    body::Bytes,
    extract::{Extension, State},
    response::Json,
};
use serde_json::Value;

use crate::auth::models::AuthUser;
use crate::error::ApiResult;
use crate::mailing::{MailingAction, MailingService};
use crate::routes::{company_of, parse_body};
use crate::server::AppState;

/// Single RPC-style endpoint for mailing lists and campaigns.
///
/// # Route
/// - **Method**: POST
/// - **Path**: `/api/v1/mailing`
/// - **Body**: `{"action": "list_mailing_lists" | "create_mailing_list" | ..., ...fields}`
pub async fn mailing_action(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    body: Bytes,
) -> ApiResult<Json<Value>> {
    let action: MailingAction = parse_body(&body)?;
    let company = company_of(&state, &user).await?;
    tracing::debug!("Mailing action {:?} for company {}", action, company.id);

    let service = MailingService::new(
        state.mailing.as_ref(),
        state.mailer.as_ref(),
        company.id,
        &state.public_app_url,
    );
    Ok(Json(service.execute(action).await?))
}
