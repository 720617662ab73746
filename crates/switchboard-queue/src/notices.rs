// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Customer-facing texts rendered from the routing templates.

use switchboard_config::model::RoutingConfig;
use switchboard_core::Operator;

/// Rendered customer notices. Templates accept `{operator}` and `{department}`.
#[derive(Debug, Clone)]
pub struct Notices {
    templates: RoutingConfig,
}

impl Notices {
    pub fn new(templates: RoutingConfig) -> Self {
        Self { templates }
    }

    pub fn default_department(&self) -> Option<&str> {
        self.templates.default_department.as_deref()
    }

    pub fn inactivity(&self) -> String {
        self.templates.inactivity_notice.clone()
    }

    pub fn waiting_timeout(&self) -> String {
        self.templates.waiting_timeout_notice.clone()
    }

    pub fn wait(&self, operator: &str) -> String {
        render(&self.templates.wait_notice, operator, "")
    }

    pub fn assigned(&self, operator: &str) -> String {
        render(&self.templates.assigned_notice, operator, "")
    }

    pub fn transfer(&self, operator: &str) -> String {
        render(&self.templates.transfer_notice, operator, "")
    }

    /// The numbered operator menu, one `N - Name` line per operator.
    pub fn operator_menu(&self, department: &str, operators: &[Operator]) -> String {
        let mut text = render(&self.templates.operator_menu_header, "", department);
        for (i, op) in operators.iter().enumerate() {
            text.push_str(&format!("\n{} - {}", i + 1, op.name));
        }
        text
    }
}

impl Default for Notices {
    fn default() -> Self {
        Self::new(RoutingConfig::default())
    }
}

fn render(template: &str, operator: &str, department: &str) -> String {
    template
        .replace("{operator}", operator)
        .replace("{department}", department)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn menu_lists_operators_in_order() {
        let notices = Notices::default();
        let ops = vec![
            Operator {
                id: "1".into(),
                name: "Ana".into(),
                department: "sales".into(),
                active: true,
            },
            Operator {
                id: "2".into(),
                name: "Bruno".into(),
                department: "sales".into(),
                active: true,
            },
        ];
        let menu = notices.operator_menu("sales", &ops);
        assert!(menu.contains("sales"));
        assert!(menu.ends_with("1 - Ana\n2 - Bruno"));
    }

    #[test]
    fn placeholders_are_substituted() {
        let notices = Notices::default();
        assert!(notices.transfer("Bruno").contains("Bruno"));
        assert!(!notices.wait("Ana").contains("{operator}"));
    }
}
