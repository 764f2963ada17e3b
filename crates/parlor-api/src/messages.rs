use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use tracing::{error, warn};
use uuid::Uuid;

use parlor_types::api::{Claims, DeleteMessageResponse, MessageResponse, SendMessageRequest};
use parlor_types::events::GatewayEvent;

use crate::auth::AppStateInner;

/// Fixed page size cap; there is no cursor beyond it.
const MESSAGE_PAGE_LIMIT: u32 = 100;
const MAX_MESSAGE_LEN: usize = 4000;

#[derive(Debug, Deserialize)]
pub struct MessageQuery {
    #[serde(default = "default_limit")]
    pub limit: u32,
}

fn default_limit() -> u32 {
    MESSAGE_PAGE_LIMIT
}

pub async fn send_message(
    State(state): State<Arc<AppStateInner>>,
    Path(channel_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<SendMessageRequest>,
) -> Result<impl IntoResponse, StatusCode> {
    if req.body.is_empty() || req.body.len() > MAX_MESSAGE_LEN {
        return Err(StatusCode::BAD_REQUEST);
    }

    let message_id = Uuid::new_v4();

    // Run blocking DB work off the async runtime
    let db = state.clone();
    let cid = channel_id.to_string();
    let mid = message_id.to_string();
    let aid = claims.sub.to_string();
    let body = req.body.clone();
    let author_profile = tokio::task::spawn_blocking(move || {
        let is_member = db
            .db
            .is_channel_member(&cid, &aid)
            .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
        if !is_member {
            return Err(StatusCode::FORBIDDEN);
        }

        db.db
            .insert_message(&mid, &cid, &aid, &body)
            .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

        let profiles = db
            .db
            .get_profiles_for_users(std::slice::from_ref(&aid))
            .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

        Ok::<_, StatusCode>(profiles.into_iter().next())
    })
    .await
    .map_err(|e| { error!("spawn_blocking join error: {}", e); StatusCode::INTERNAL_SERVER_ERROR })??;

    let now = chrono::Utc::now();

    let (author_display_name, author_avatar_url) = author_profile
        .map(|p| (p.display_name, p.avatar_url))
        .unwrap_or_else(|| (claims.username.clone(), None));

    // Push to subscribed clients; they re-fetch the page on receipt
    state.dispatcher.broadcast(GatewayEvent::MessageCreate {
        id: message_id,
        channel_id,
        author_id: claims.sub,
        author_username: claims.username.clone(),
        body: req.body.clone(),
        timestamp: now,
    });

    Ok((StatusCode::CREATED, Json(MessageResponse {
        id: message_id,
        channel_id,
        author_id: claims.sub,
        author_display_name,
        author_avatar_url,
        body: req.body,
        created_at: now,
    })))
}

pub async fn get_messages(
    State(state): State<Arc<AppStateInner>>,
    Path(channel_id): Path<Uuid>,
    Query(query): Query<MessageQuery>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, StatusCode> {
    // Run all blocking DB queries off the async runtime
    let db = state.clone();
    let cid = channel_id.to_string();
    let uid = claims.sub.to_string();
    let limit = query.limit.min(MESSAGE_PAGE_LIMIT);

    let (rows, profile_rows) = tokio::task::spawn_blocking(move || {
        let is_member = db
            .db
            .is_channel_member(&cid, &uid)
            .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
        if !is_member {
            return Err(StatusCode::FORBIDDEN);
        }

        let rows = db
            .db
            .get_messages(&cid, limit)
            .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

        // Second batched query keyed by the page's distinct authors; the
        // join into each record happens below, not in SQL.
        let author_ids: Vec<String> = rows
            .iter()
            .map(|r| r.author_id.clone())
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        let profile_rows = db
            .db
            .get_profiles_for_users(&author_ids)
            .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

        Ok::<_, StatusCode>((rows, profile_rows))
    })
    .await
    .map_err(|e| { error!("spawn_blocking join error: {}", e); StatusCode::INTERNAL_SERVER_ERROR })??;

    let profile_map: HashMap<String, (String, Option<String>)> = profile_rows
        .into_iter()
        .map(|p| (p.user_id.clone(), (p.display_name, p.avatar_url)))
        .collect();

    let messages: Vec<MessageResponse> = rows
        .into_iter()
        .map(|row| {
            let (author_display_name, author_avatar_url) = profile_map
                .get(&row.author_id)
                .cloned()
                .unwrap_or_else(|| ("unknown".to_string(), None));

            MessageResponse {
                id: row.id.parse().unwrap_or_else(|e| {
                    warn!("Corrupt message id '{}': {}", row.id, e);
                    Uuid::default()
                }),
                channel_id: row.channel_id.parse().unwrap_or_else(|e| {
                    warn!("Corrupt channel_id '{}' on message '{}': {}", row.channel_id, row.id, e);
                    Uuid::default()
                }),
                author_id: row.author_id.parse().unwrap_or_else(|e| {
                    warn!("Corrupt author_id '{}' on message '{}': {}", row.author_id, row.id, e);
                    Uuid::default()
                }),
                author_display_name,
                author_avatar_url,
                body: row.body,
                created_at: parse_created_at(&row.created_at, &row.id),
            }
        })
        .collect();

    Ok(Json(messages))
}

pub async fn delete_message(
    State(state): State<Arc<AppStateInner>>,
    Path((channel_id, message_id)): Path<(Uuid, Uuid)>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, StatusCode> {
    let db = state.clone();
    let mid = message_id.to_string();
    let aid = claims.sub.to_string();

    let rows = tokio::task::spawn_blocking(move || db.db.delete_message(&mid, &aid))
        .await
        .map_err(|e| { error!("spawn_blocking join error: {}", e); StatusCode::INTERNAL_SERVER_ERROR })?
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    // A non-author delete matches zero rows: silent no-op, not an error.
    let deleted = rows > 0;

    if deleted {
        state.dispatcher.broadcast(GatewayEvent::MessageDelete {
            channel_id,
            message_id,
        });
    }

    Ok(Json(DeleteMessageResponse { deleted }))
}

/// SQLite stores timestamps as "YYYY-MM-DD HH:MM:SS" without timezone.
/// Parse as RFC 3339 first, then fall back to naive UTC.
pub(crate) fn parse_created_at(raw: &str, context_id: &str) -> chrono::DateTime<chrono::Utc> {
    raw.parse::<chrono::DateTime<chrono::Utc>>()
        .or_else(|_| {
            chrono::NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S")
                .map(|ndt| ndt.and_utc())
        })
        .unwrap_or_else(|e| {
            warn!("Corrupt created_at '{}' on '{}': {}", raw, context_id, e);
            chrono::DateTime::default()
        })
}
