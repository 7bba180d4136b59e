use axum::{
    extract::{rejection::JsonRejection, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info};
use wr_core::{Article, Error};
use wr_scrapers::Cancellation;
use crate::AppState;

/// Envelope shared by every JSON endpoint.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn data(data: T) -> Json<Self> {
        Json(Self {
            success: true,
            data: Some(data),
            message: None,
        })
    }

    pub fn data_with_message(data: T, message: impl Into<String>) -> Json<Self> {
        Json(Self {
            success: true,
            data: Some(data),
            message: Some(message.into()),
        })
    }
}

#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        let status = if err.is_client_error() {
            StatusCode::BAD_REQUEST
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        };
        Self {
            status,
            message: err.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ApiResponse::<()> {
            success: false,
            data: None,
            message: Some(self.message),
        };
        (self.status, Json(body)).into_response()
    }
}

#[derive(Debug, Deserialize)]
pub struct FetchRequest {
    #[serde(default)]
    pub url: String,
}

#[derive(Debug, Deserialize)]
pub struct TopicQuery {
    pub topic: Option<String>,
}

/// `POST /api/fetch`: scrapes the album behind `url` and stores the result.
///
/// Dropping the request future (client gone) drops the scrape with it, so
/// no further upstream requests are made.
pub async fn fetch_articles(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<FetchRequest>, JsonRejection>,
) -> Result<Json<ApiResponse<Vec<Article>>>, ApiError> {
    let Json(request) = payload.map_err(|e| ApiError::bad_request(format!("Invalid request body: {}", e.body_text())))?;
    let url = request.url.trim();
    if url.is_empty() {
        return Err(ApiError::bad_request("URL is required"));
    }

    info!("📥 Fetch requested for {}", url);
    let articles = state
        .manager
        .fetch_and_store(url, Cancellation::never())
        .await
        .map_err(|e| {
            error!("❌ Failed to fetch {}: {}", url, e);
            ApiError::from(e)
        })?;

    Ok(ApiResponse::data_with_message(articles, "Articles fetched and saved successfully"))
}

/// `GET /api/articles[?topic=]`, newest first.
pub async fn list_articles(
    State(state): State<Arc<AppState>>,
    Query(query): Query<TopicQuery>,
) -> Result<Json<ApiResponse<Vec<Article>>>, ApiError> {
    let storage = state.storage();
    let articles = match query.topic.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
        Some(topic) => storage.list_by_topic(topic).await?,
        None => storage.list_articles().await?,
    };
    Ok(ApiResponse::data(articles))
}

pub async fn list_topics(State(state): State<Arc<AppState>>) -> Result<Json<ApiResponse<Vec<String>>>, ApiError> {
    Ok(ApiResponse::data(state.storage().list_topics().await?))
}
