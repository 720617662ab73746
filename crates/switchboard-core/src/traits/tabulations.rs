// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Tabulation persistence.

use async_trait::async_trait;

use crate::error::SwitchboardError;
use crate::types::Tabulation;

/// Store of immutable session outcome records.
#[async_trait]
pub trait TabulationStore: Send + Sync {
    async fn create_tabulation(&self, tabulation: &Tabulation) -> Result<(), SwitchboardError>;

    async fn tabulations_for_session(
        &self,
        session_id: &str,
    ) -> Result<Vec<Tabulation>, SwitchboardError>;
}
