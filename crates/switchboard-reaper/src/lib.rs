// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Inactivity reaper.
//!
//! Three sweeps converge abandoned conversations to `cancelled`:
//!
//! 1. `bot` sessions past the no-session cutoff with no live upstream bot
//!    session are cancelled with `inactivity_no_session`.
//! 2. Live upstream bot sessions that are `opened` and idle past the idle
//!    cutoff are closed, and the local `bot` session is cancelled with
//!    `inactivity`. Group addresses are skipped.
//! 3. `waiting` sessions past the waiting timeout are cancelled with
//!    `waiting_timeout`.
//!
//! Each sweep tolerates per-session failures. Cancellations go through the
//! session registry's conditional update, so sweeps never need a shared lock.

pub mod reaper;

pub use reaper::{Reaper, SweepReport};
