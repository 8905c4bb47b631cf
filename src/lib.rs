// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! BaristaCMS API server - dual-mode token authentication
//!
//! Serves the BaristaCMS admin API behind an authentication gate that accepts
//! both locally issued tokens and Azure AD tokens.
//!
//! ## Modules
//!
//! - `api` - HTTP API handlers (Axum)
//! - `auth` - Token classification, verification and the request gate
//! - `config` - Environment configuration
//! - `logging` - Tracing subscriber setup

pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod logging;
pub mod state;
