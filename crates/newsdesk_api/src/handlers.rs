use crate::AppState;
use crate::auth::bearer_token;
use crate::error::ApiError;
use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use newsdesk_core::articles;
use newsdesk_core::schema::{Article, NewArticle, Source};
use newsdesk_core::{ListingQuery, PipelineError};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::warn;

fn caller(state: &AppState, headers: &HeaderMap) -> Result<String, ApiError> {
    let token = bearer_token(headers).ok_or(ApiError::MissingCredential)?;
    state.tokens.verify(token).ok_or(ApiError::InvalidCredential)
}

pub async fn list_articles(State(state): State<AppState>) -> Result<Json<Vec<Article>>, ApiError> {
    let listed = state.store.run(|store| store.articles()).await?;
    Ok(Json(listed))
}

pub async fn publish_article(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(draft): Json<NewArticle>,
) -> Result<(StatusCode, Json<Article>), ApiError> {
    let author = caller(&state, &headers)?;
    let article = state
        .store
        .run(move |store| Ok(articles::publish(store, &author, draft)))
        .await??;
    Ok((StatusCode::CREATED, Json(article)))
}

pub async fn delete_article(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let who = caller(&state, &headers)?;
    state
        .store
        .run(move |store| Ok(articles::delete(store, &id, &who)))
        .await??;
    Ok(Json(json!({ "message": "Article removed." })))
}

pub async fn verify_article(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<Article>, ApiError> {
    let who = caller(&state, &headers)?;
    Ok(Json(state.pipeline.verify(&id, &who).await?))
}

pub async fn reset_article(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<Article>, ApiError> {
    let who = caller(&state, &headers)?;
    Ok(Json(state.pipeline.reset(&id, &who).await?))
}

pub async fn list_sources(State(state): State<AppState>) -> Result<Json<Vec<Source>>, ApiError> {
    let ledger = state.ledger.clone();
    let ranking = state
        .store
        .run(move |_| Ok(ledger.ranking()))
        .await??;
    Ok(Json(ranking))
}

#[derive(Debug, Default, Deserialize)]
pub struct NewsParams {
    pub filter: Option<String>,
    pub lang: Option<String>,
    pub category: Option<String>,
    pub city: Option<String>,
}

pub async fn news_listing(
    State(state): State<AppState>,
    Query(params): Query<NewsParams>,
) -> Response {
    let query = ListingQuery::from_params(
        params.filter.as_deref(),
        params.lang.as_deref(),
        params.category.as_deref(),
        params.city.as_deref(),
    );
    match state.news.listing(&query).await {
        Ok(items) => Json(json!({ "success": true, "data": { "articles": items } })).into_response(),
        Err(err) => {
            warn!(error = %err, filter = ?query.filter, "news listing failed");
            let message = match err {
                PipelineError::Configuration(_) => "News source is not configured.",
                _ => "Failed to fetch news.",
            };
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "success": false, "message": message })),
            )
                .into_response()
        }
    }
}
