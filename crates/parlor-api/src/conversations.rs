use std::collections::HashMap;
use std::sync::Arc;

use axum::{Extension, Json, extract::State, http::StatusCode, response::IntoResponse};
use tracing::{error, warn};
use uuid::Uuid;

use parlor_types::api::{Claims, ConversationSummary, LastMessage};

use crate::auth::AppStateInner;
use crate::messages::parse_created_at;

/// The conversation list is a derived view: the session user's 2-member
/// private channels, each paired with the other member's profile and the
/// latest message. Nothing here is persisted; it is recomputed per call.
pub async fn list_conversations(
    State(state): State<Arc<AppStateInner>>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, StatusCode> {
    let db = state.clone();
    let uid = claims.sub.to_string();

    let (rows, profile_rows) = tokio::task::spawn_blocking(move || {
        let rows = db
            .db
            .conversations_for(&uid)
            .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

        let other_ids: Vec<String> = rows.iter().map(|r| r.other_user_id.clone()).collect();
        let profile_rows = db
            .db
            .get_profiles_for_users(&other_ids)
            .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

        Ok::<_, StatusCode>((rows, profile_rows))
    })
    .await
    .map_err(|e| { error!("spawn_blocking join error: {}", e); StatusCode::INTERNAL_SERVER_ERROR })??;

    let profile_map: HashMap<String, (String, Option<String>)> = profile_rows
        .into_iter()
        .map(|p| (p.user_id.clone(), (p.display_name, p.avatar_url)))
        .collect();

    let summaries: Vec<ConversationSummary> = rows
        .into_iter()
        .map(|row| {
            let (other_display_name, other_avatar_url) = profile_map
                .get(&row.other_user_id)
                .cloned()
                .unwrap_or_else(|| ("unknown".to_string(), None));

            let last_message = match (row.last_body, row.last_created_at) {
                (Some(body), Some(created_at)) => Some(LastMessage {
                    body,
                    created_at: parse_created_at(&created_at, &row.channel_id),
                }),
                _ => None,
            };

            ConversationSummary {
                channel_id: row.channel_id.parse().unwrap_or_else(|e| {
                    warn!("Corrupt channel id '{}': {}", row.channel_id, e);
                    Uuid::default()
                }),
                other_user_id: row.other_user_id.parse().unwrap_or_else(|e| {
                    warn!("Corrupt user id '{}' in channel '{}': {}", row.other_user_id, row.channel_id, e);
                    Uuid::default()
                }),
                other_display_name,
                other_avatar_url,
                last_message,
            }
        })
        .collect();

    Ok(Json(summaries))
}
