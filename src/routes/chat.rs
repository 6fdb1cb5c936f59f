//! AI chat endpoint.

use axum::{
    body::Bytes,
    extract::{Extension, State},
    response::Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{error, info};
use uuid::Uuid;

use crate::assistant::ai_client::build_system_prompt;
use crate::assistant::intent::suggested_actions;
use crate::assistant::ContextResolver;
use crate::auth::models::AuthUser;
use crate::error::{ApiError, ApiResult};
use crate::routes::{company_of, parse_body};
use crate::server::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    pub message: String,
    #[serde(default)]
    pub current_page: Option<String>,
    #[serde(default)]
    pub user_id: Option<Uuid>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatResponse {
    pub response: String,
    pub context: String,
    pub market_info: Option<String>,
    pub suggested_actions: Vec<String>,
    pub data_found: bool,
    pub company_name: String,
}

/// Answer a user question with company data attached to the prompt.
///
/// # Route
/// - **Method**: POST
/// - **Path**: `/api/v1/ai-chat`
/// - **Body**: `{"message": "...", "currentPage": "dashboard", "userId": "..."}`
pub async fn ai_chat(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    body: Bytes,
) -> ApiResult<Json<ChatResponse>> {
    let request: ChatRequest = parse_body(&body)?;

    if request.message.trim().is_empty() {
        return Err(ApiError::BadRequest("A mensagem não pode estar vazia".to_string()));
    }
    if request.user_id.is_some_and(|id| id != user.id) {
        return Err(ApiError::Unauthorized("userId does not match the access token".to_string()));
    }

    let company = company_of(&state, &user).await?;
    let current_page = request.current_page.as_deref();
    info!("AI chat for company {} on page {:?}", company.id, current_page);

    let resolver = ContextResolver::new(state.data.as_ref(), Utc::now().date_naive());
    let resolved = resolver.resolve(&request.message, company.id, current_page).await;
    let market_info = state.market.lookup(&request.message);

    let system_prompt = build_system_prompt(&company.name, current_page, &resolved, market_info.as_deref())
        .map_err(anyhow::Error::from)?;

    let response = state
        .llm
        .complete(&system_prompt, &request.message)
        .await
        .map_err(|e| {
            error!("Chat completion failed: {}", e);
            ApiError::Internal(e.into())
        })?;

    Ok(Json(ChatResponse {
        response,
        data_found: resolved.data_found(),
        suggested_actions: suggested_actions(resolved.topic).into_iter().map(String::from).collect(),
        context: resolved.context,
        market_info,
        company_name: company.name,
    }))
}
