//! Account route handlers.

use axum::{Json, extract::State};
use serde::Serialize;
use tracing::instrument;

use crate::db::LoyaltyRepository;
use crate::error::Result;
use crate::middleware::CurrentUser;
use crate::models::loyalty::LoyaltyTier;
use crate::models::user::User;
use crate::state::AppState;

/// The current-user response: the user joined with their loyalty tier.
#[derive(Debug, Serialize)]
pub struct MeResponse {
    /// The authenticated user.
    #[serde(flatten)]
    pub user: User,
    /// The user's loyalty tier, when they have reached one.
    pub tier: Option<LoyaltyTier>,
}

/// Show the current user with points and tier.
///
/// # Route
///
/// `GET /me`
///
/// # Errors
///
/// Returns an error if the tier lookup fails.
#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn me(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<MeResponse>> {
    let tier = match user.loyalty_tier_id {
        Some(tier_id) => LoyaltyRepository::new(state.pool()).find_by_id(tier_id).await?,
        None => None,
    };

    Ok(Json(MeResponse { user, tier }))
}
