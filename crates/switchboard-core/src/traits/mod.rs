// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Collaborator traits consumed by the routing engine.
//!
//! Every trait uses `#[async_trait]` so implementations can be held as
//! `Arc<dyn Trait>` and swapped in tests.

pub mod directory;
pub mod gateway;
pub mod messages;
pub mod sessions;
pub mod tabulations;

pub use directory::{CustomerDirectory, OperatorDirectory};
pub use gateway::ChatGateway;
pub use messages::MessageStore;
pub use sessions::{PriorState, SessionStore};
pub use tabulations::TabulationStore;
