// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Customer and operator directories.

use async_trait::async_trait;

use crate::error::SwitchboardError;
use crate::types::{Customer, Operator};

/// Resolves customers by gateway address.
#[async_trait]
pub trait CustomerDirectory: Send + Sync {
    /// Returns the customer for `address`, creating it on first contact.
    async fn find_or_create_customer(
        &self,
        address: &str,
        display_name: Option<&str>,
    ) -> Result<Customer, SwitchboardError>;

    async fn find_customer_by_address(
        &self,
        address: &str,
    ) -> Result<Option<Customer>, SwitchboardError>;
}

/// Looks up operators, departments, and supervisors.
#[async_trait]
pub trait OperatorDirectory: Send + Sync {
    async fn find_operator(&self, id: &str) -> Result<Option<Operator>, SwitchboardError>;

    /// All operators in a department, active or not.
    async fn operators_in_department(
        &self,
        department: &str,
    ) -> Result<Vec<Operator>, SwitchboardError>;

    /// The department's supervisor, if one is configured and exists.
    async fn department_supervisor(
        &self,
        department: &str,
    ) -> Result<Option<Operator>, SwitchboardError>;
}
