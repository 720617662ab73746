// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Evolution chat-gateway adapter for Switchboard.
//!
//! Implements [`switchboard_core::ChatGateway`] over the gateway's HTTP API:
//! sending text, changing upstream bot-session status, and listing upstream
//! bot sessions.

pub mod client;
pub mod types;

pub use client::EvolutionClient;
