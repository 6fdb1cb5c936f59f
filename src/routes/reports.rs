use axum::{
    extract::{Extension, State},
    response::Json,
};
use chrono::Utc;

use crate::auth::models::AuthUser;
use crate::error::ApiResult;
use crate::reports::{build_integrated_report, IntegratedReport};
use crate::routes::company_of;
use crate::server::AppState;

/// Scores and headline indicators for the caller's company.
///
/// # Route
/// - **Method**: GET
/// - **Path**: `/api/v1/reports/integrated`
pub async fn integrated_report(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> ApiResult<Json<IntegratedReport>> {
    let company = company_of(&state, &user).await?;
    let report = build_integrated_report(state.data.as_ref(), company.id, Utc::now().date_naive()).await?;
    tracing::info!("Integrated report for {}: overall {:.1} ({})", company.id, report.overall_score, report.rating);
    Ok(Json(report))
}

#[cfg(test)]
mod tests {
    use crate::database::models::EsgTable;
    use crate::testing::{bearer_for, send, test_state, FakeChatModel, InMemoryEsgData};
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use serde_json::json;
    use uuid::Uuid;

    #[tokio::test]
    async fn returns_scores_for_the_company() {
        let user_id = Uuid::new_v4();
        let data = InMemoryEsgData::new()
            .with_user(user_id)
            .with(EsgTable::WasteLogs, json!({"quantity": 2, "unit": "t", "disposal_method": "Reciclagem"}))
            .with(EsgTable::WasteLogs, json!({"quantity": 1, "unit": "t", "disposal_method": "Aterro"}));
        let state = test_state(data, FakeChatModel::replying("ok"));
        let token = bearer_for(&state, user_id);
        let app = crate::server::create_router(state);

        let request = Request::builder()
            .uri("/api/v1/reports/integrated")
            .header(header::AUTHORIZATION, format!("Bearer {token}"))
            .body(Body::empty())
            .unwrap();
        let (status, body) = send(&app, request).await;

        assert_eq!(status, StatusCode::OK, "{body}");
        assert_eq!(body["recyclingRate"], 50.0);
        assert_eq!(body["totalWasteTonnes"], 3.0);
        assert!(body["rating"].is_string());
    }

    #[tokio::test]
    async fn database_errors_become_500() {
        let user_id = Uuid::new_v4();
        let state = test_state(InMemoryEsgData::failing().with_user(user_id), FakeChatModel::replying("ok"));
        let token = bearer_for(&state, user_id);
        let app = crate::server::create_router(state);

        let request = Request::builder()
            .uri("/api/v1/reports/integrated")
            .header(header::AUTHORIZATION, format!("Bearer {token}"))
            .body(Body::empty())
            .unwrap();
        let (status, _) = send(&app, request).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    }
}
