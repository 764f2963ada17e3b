use std::sync::Arc;

use axum::{Extension, Json, extract::State, http::StatusCode, response::IntoResponse};
use tracing::error;

use parlor_types::api::{Claims, DirectChannelResponse, OpenDirectChannelRequest};

use crate::auth::AppStateInner;
use crate::resolver;

/// Resolve (find-or-create) the private channel between the session user
/// and the requested user. Resolution failures are logged inside the
/// resolver and surface as `channel_id: null`, not as an HTTP error — the
/// caller shows "couldn't open the conversation" and moves on.
pub async fn open_direct_channel(
    State(state): State<Arc<AppStateInner>>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<OpenDirectChannelRequest>,
) -> Result<impl IntoResponse, StatusCode> {
    let user_a = claims.sub;
    let user_b = req.user_id;

    let db = state.clone();
    let channel_id = tokio::task::spawn_blocking(move || {
        resolver::resolve_direct(&db.db, user_a, user_b)
    })
    .await
    .map_err(|e| { error!("spawn_blocking join error: {}", e); StatusCode::INTERNAL_SERVER_ERROR })?;

    Ok(Json(DirectChannelResponse { channel_id }))
}
