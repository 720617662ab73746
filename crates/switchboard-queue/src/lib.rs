// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Session registry, state machine, and assignment engine.
//!
//! - [`machine`] holds the pure transition rules.
//! - [`SessionRegistry`] applies them with conditional writes.
//! - [`AssignmentEngine`] implements operator choice, claim, transfer,
//!   completion, cancellation, and outbound start on top of the registry.

pub mod announce;
pub mod assignment;
pub mod machine;
pub mod notices;
pub mod registry;

pub use announce::announce;
pub use assignment::{AssignmentEngine, AssignmentOutcome};
pub use notices::Notices;
pub use registry::SessionRegistry;
