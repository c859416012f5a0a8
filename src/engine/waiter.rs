use std::future::Future;
use std::time::Duration;

use crate::error::{ProvisionError, Result};

pub const DEFAULT_WAIT_TIMEOUT: Duration = Duration::from_secs(30 * 60);
pub const DEFAULT_WAIT_DELAY: Duration = Duration::from_secs(30);

/// Polling cadence shared by every waiter of a provisioner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaiterSettings {
    pub timeout: Duration,
    pub delay: Duration,
}

impl Default for WaiterSettings {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_WAIT_TIMEOUT,
            delay: DEFAULT_WAIT_DELAY,
        }
    }
}

impl WaiterSettings {
    pub fn conf(
        &self,
        pending: &'static [&'static str],
        target: &'static [&'static str],
    ) -> StatusWaiterConf {
        StatusWaiterConf {
            pending,
            target,
            timeout: self.timeout,
            delay: self.delay,
        }
    }
}

/// Pending/target status tables for one wait.
///
/// An empty `target` waits for the resource to disappear.
#[derive(Debug, Clone)]
pub struct StatusWaiterConf {
    pub pending: &'static [&'static str],
    pub target: &'static [&'static str],
    pub timeout: Duration,
    pub delay: Duration,
}

/// Poll `status_fn` every `delay` until it reports a target status or the
/// overall timeout fires.
///
/// `status_fn` yields `None` once the resource no longer exists. Statuses in
/// neither table keep the loop polling. Errors from `status_fn` end the wait
/// immediately.
pub async fn wait_until_target_status<F, Fut>(
    identifier: &str,
    conf: &StatusWaiterConf,
    mut status_fn: F,
) -> Result<()>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Option<String>>>,
{
    let poll = async {
        loop {
            match status_fn().await? {
                Some(status) if conf.target.contains(&status.as_str()) => {
                    tracing::info!(identifier, status = %status, "Reached target status");
                    return Ok(());
                }
                None if conf.target.is_empty() => {
                    tracing::info!(identifier, "Resource no longer exists");
                    return Ok(());
                }
                Some(status) if conf.pending.contains(&status.as_str()) => {
                    tracing::info!(identifier, status = %status, "Waiting for target status");
                }
                Some(status) => {
                    tracing::debug!(identifier, status = %status, "Unrecognized status, still waiting");
                }
                None => {
                    tracing::debug!(identifier, "Resource not visible yet, still waiting");
                }
            }
            tokio::time::sleep(conf.delay).await;
        }
    };

    match tokio::time::timeout(conf.timeout, poll).await {
        Ok(result) => result,
        Err(_) => {
            tracing::error!(identifier, timeout_secs = conf.timeout.as_secs(), "Wait timed out");
            Err(ProvisionError::Timeout {
                identifier: identifier.to_string(),
                timeout: conf.timeout,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    const PENDING: &[&str] = &["creating", "modifying"];
    const TARGET: &[&str] = &["available"];

    fn fast(pending: &'static [&'static str], target: &'static [&'static str]) -> StatusWaiterConf {
        WaiterSettings {
            timeout: Duration::from_millis(200),
            delay: Duration::from_millis(1),
        }
        .conf(pending, target)
    }

    #[tokio::test]
    async fn reaches_target_through_unknown_statuses() {
        let calls = Arc::new(AtomicUsize::new(0));
        let statuses = ["creating", "backing-up-weird", "modifying", "available"];
        let c = calls.clone();
        wait_until_target_status("db-1", &fast(PENDING, TARGET), move || {
            let n = c.fetch_add(1, Ordering::SeqCst);
            async move { Ok(Some(statuses[n.min(3)].to_string())) }
        })
        .await
        .unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn times_out_when_target_never_reached() {
        let err = wait_until_target_status("db-1", &fast(PENDING, TARGET), || async {
            Ok(Some("creating".to_string()))
        })
        .await
        .unwrap_err();
        assert!(matches!(err, ProvisionError::Timeout { .. }));
    }

    #[tokio::test]
    async fn empty_target_waits_for_deletion() {
        let calls = Arc::new(AtomicUsize::new(0));
        let c = calls.clone();
        wait_until_target_status("db-1", &fast(&["deleting"], &[]), move || {
            let n = c.fetch_add(1, Ordering::SeqCst);
            async move {
                Ok(if n < 2 {
                    Some("deleting".to_string())
                } else {
                    None
                })
            }
        })
        .await
        .unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn status_errors_stop_the_wait() {
        let err = wait_until_target_status("db-1", &fast(PENDING, TARGET), || async {
            Err(ProvisionError::NotFound("db-1".to_string()))
        })
        .await
        .unwrap_err();
        assert!(err.is_not_found());
    }
}
