// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::sync::Arc;

use crate::auth::AuthGate;

#[derive(Clone)]
pub struct AppState {
    pub auth: Arc<AuthGate>,
}

impl AppState {
    pub fn new(auth: AuthGate) -> Self {
        Self {
            auth: Arc::new(auth),
        }
    }
}
