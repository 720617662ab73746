// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Webhook event router for the Switchboard routing engine.
//!
//! Gateway webhooks are validated into typed events by [`event`] and
//! dispatched by [`EventRouter`] onto the session registry, the assignment
//! engine, and the presence broadcast layer.

pub mod event;
pub mod router;

pub use event::{BotEvent, EventKind, MessageEnvelope, ParsedEvent, WebhookEnvelope, parse_event};
pub use router::{EventRouter, RouteOutcome};
