// # Routes Module
//
// HTTP route handlers, one submodule per API area. Handlers behind the auth
// middleware receive the caller as `Extension<AuthUser>`.

use axum::body::Bytes;
use serde::de::DeserializeOwned;

use crate::auth::models::AuthUser;
use crate::database::models::CompanyRef;
use crate::error::{ApiError, ApiResult};
use crate::server::AppState;

/// Health check and monitoring endpoints
pub mod health;

/// ESG chat assistant
pub mod chat;

/// Mailing lists and campaigns
pub mod mailing;

/// Integrated ESG report
pub mod reports;

/// Decode a JSON body, reporting malformed payloads as 400.
pub(crate) fn parse_body<T: DeserializeOwned>(body: &Bytes) -> ApiResult<T> {
    serde_json::from_slice(body).map_err(|e| ApiError::BadRequest(format!("Requisição inválida: {e}")))
}

/// Company of the authenticated user.
pub(crate) async fn company_of(state: &AppState, user: &AuthUser) -> ApiResult<CompanyRef> {
    state
        .data
        .company_for_user(user.id)
        .await?
        .ok_or_else(|| ApiError::BadRequest("Empresa não encontrada para o usuário".to_string()))
}
