// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for Switchboard integration tests.
//!
//! - [`MockChatGateway`] records outbound texts and bot-status changes,
//!   serves scripted upstream bot sessions, and can be told to fail.
//! - [`TestHarness`] wires storage (temp SQLite), presence, the session
//!   registry, the assignment engine, the router, and the reaper together.

pub mod harness;
pub mod mock_gateway;

pub use harness::{
    DEFAULT_INSTANCE, OperatorConnection, TestHarness, TestHarnessBuilder, bot_status_event,
    far_future, message_event,
};
pub use mock_gateway::{GatewayOp, MockChatGateway, SentText, StatusChange};
