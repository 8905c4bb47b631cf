// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! User endpoints.

use axum::Json;

use crate::auth::{Auth, VerifiedIdentity};
use crate::error::ErrorBody;

/// Get the current authenticated user's identity.
///
/// Works the same for local and Azure AD sign-ins; `authKind` tells them apart.
#[utoipa::path(
    get,
    path = "/api/users/me",
    tag = "Users",
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Current user", body = VerifiedIdentity),
        (status = 401, description = "Not authenticated", body = ErrorBody),
    )
)]
pub async fn get_current_user(Auth(identity): Auth) -> Json<VerifiedIdentity> {
    Json(identity)
}
