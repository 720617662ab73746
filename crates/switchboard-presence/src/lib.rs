// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Operator presence and real-time broadcast for the Switchboard routing engine.
//!
//! [`PresenceRegistry`] tracks live operator connections in memory. It is
//! never persisted: after a restart it is rebuilt as operators reconnect.
//! Broadcast methods on the registry fan [`OperatorEvent`]s out to one
//! operator, one department, or everyone.

pub mod broadcast;
pub mod event;
pub mod registry;

pub use broadcast::{Audience, DeliveryReport};
pub use event::{NotificationLevel, OperatorEvent, QueueChange};
pub use registry::{OperatorIdentity, PresenceRecord, PresenceRegistry};
