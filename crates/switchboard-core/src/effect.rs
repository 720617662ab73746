// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Helpers for side effects whose failure must not undo a committed transition.

use std::future::Future;

use tracing::warn;

use crate::error::SwitchboardError;

/// Awaits a side effect, logging and swallowing any error.
///
/// Use this only after the state change it accompanies is durable, so a
/// failed notification or broadcast never rolls back a session transition.
pub async fn best_effort<T, F>(label: &str, effect: F) -> Option<T>
where
    F: Future<Output = Result<T, SwitchboardError>>,
{
    match effect.await {
        Ok(value) => Some(value),
        Err(e) => {
            warn!(effect = label, error = %e, "side effect failed, continuing");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_test::traced_test;

    #[tokio::test]
    async fn passes_through_success() {
        let out = best_effort("noop", async { Ok::<_, SwitchboardError>(7) }).await;
        assert_eq!(out, Some(7));
    }

    #[tokio::test]
    #[traced_test]
    async fn swallows_and_logs_failure() {
        let out: Option<()> = best_effort("notify_customer", async {
            Err(SwitchboardError::Internal("gateway down".into()))
        })
        .await;
        assert!(out.is_none());
        assert!(logs_contain("notify_customer"));
        assert!(logs_contain("gateway down"));
    }
}
