// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP and WebSocket surface for Switchboard.
//!
//! A thin axum layer over the routing engine:
//! - `POST /webhook` feeds gateway events to the [`EventRouter`](switchboard_router::EventRouter);
//! - `GET /ws` registers an operator connection with the presence registry;
//! - `/v1/...` exposes operator actions (claim, transfer, complete, ...);
//! - `GET /health` reports storage health and connected operators.
//!
//! No routing policy lives here.

pub mod auth;
pub mod error;
pub mod handlers;
pub mod server;
pub mod ws;

pub use auth::AuthConfig;
pub use error::ApiError;
pub use server::{AppState, ServerConfig, build_router, start_server};
