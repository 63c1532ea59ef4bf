//! Lifecycle-scoped async work.
//!
//! A [`LifecycleScope`] belongs to one controller. Work is launched into it, store
//! calls are awaited through [`LifecycleScope::suspend`], and observable state is
//! only touched inside [`LifecycleScope::on_interactive`]. Once the scope is
//! cancelled no further mutation runs, even for calls already in flight.

use std::{
    future::Future,
    sync::{Arc, Mutex, MutexGuard},
};

use anyhow::Result;
use log::{debug, error};
use tokio::task::JoinHandle;
use tokio_util::{sync::CancellationToken, task::TaskTracker};

/// Returned when work resumes into a scope that has been torn down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("{0} scope was cancelled")]
pub struct Cancelled(pub &'static str);

/// Handle to a job launched into a scope. Resolves to `Ok(())` when the job was
/// cancelled before finishing.
pub type Job = JoinHandle<Result<()>>;

#[derive(Debug)]
struct Interactive {
    alive: bool,
}

#[derive(Clone, Debug)]
pub struct LifecycleScope {
    name: &'static str,
    token: CancellationToken,
    tracker: TaskTracker,
    interactive: Arc<Mutex<Interactive>>,
}

impl LifecycleScope {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            token: CancellationToken::new(),
            tracker: TaskTracker::new(),
            interactive: Arc::new(Mutex::new(Interactive { alive: true })),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Spawns `work` as one independent job. Store failures are logged and
    /// returned through the handle; cancellation ends the job quietly.
    pub fn launch<F>(&self, action: &'static str, work: F) -> Job
    where
        F: Future<Output = Result<()>> + Send + 'static,
    {
        let token = self.token.clone();
        let scope = self.name;

        self.tracker.spawn(async move {
            let outcome = tokio::select! {
                biased;
                _ = token.cancelled() => Err(Cancelled(scope).into()),
                result = work => result,
            };

            match outcome {
                Ok(()) => Ok(()),
                Err(err) if err.downcast_ref::<Cancelled>().is_some() => {
                    debug!("{scope}: {action} cancelled");
                    Ok(())
                }
                Err(err) => {
                    error!("{scope}: {action} failed: {err:#}");
                    Err(err)
                }
            }
        })
    }

    /// Spawns a long-lived job, such as a subscription loop. It dies with the
    /// scope but is not waited on by [`LifecycleScope::settled`].
    pub fn launch_background<F>(&self, action: &'static str, work: F) -> Job
    where
        F: Future<Output = Result<()>> + Send + 'static,
    {
        let token = self.token.clone();
        let scope = self.name;

        tokio::spawn(async move {
            let outcome = tokio::select! {
                biased;
                _ = token.cancelled() => Err(Cancelled(scope).into()),
                result = work => result,
            };

            match outcome {
                Err(err) if err.downcast_ref::<Cancelled>().is_none() => {
                    error!("{scope}: {action} failed: {err:#}");
                    Err(err)
                }
                _ => {
                    debug!("{scope}: {action} stopped");
                    Ok(())
                }
            }
        })
    }

    /// Awaits a store call. Cancellation aborts the call while it is pending and
    /// is checked again once it resumes.
    pub async fn suspend<F, T>(&self, call: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        let value = tokio::select! {
            biased;
            _ = self.token.cancelled() => None,
            value = call => Some(value),
        };

        let Some(value) = value else {
            return Err(Cancelled(self.name).into());
        };
        let value = value?;

        if self.token.is_cancelled() {
            return Err(Cancelled(self.name).into());
        }
        Ok(value)
    }

    /// Runs `mutate` unless the scope has been torn down. Serialized with
    /// [`LifecycleScope::cancel`], so a mutation never lands after it.
    pub fn on_interactive<R>(&self, mutate: impl FnOnce() -> R) -> Result<R> {
        let guard = self.lock_interactive();
        if !guard.alive {
            return Err(Cancelled(self.name).into());
        }
        Ok(mutate())
    }

    /// Tears the scope down. Safe to call more than once.
    pub fn cancel(&self) {
        let mut guard = self.lock_interactive();
        if !guard.alive {
            return;
        }
        guard.alive = false;
        self.token.cancel();
        self.tracker.close();
        debug!("{}: scope cancelled", self.name);
    }

    /// Waits until every job launched so far has finished.
    pub async fn settled(&self) {
        let reopen = !self.tracker.is_closed();
        self.tracker.close();
        self.tracker.wait().await;
        if reopen && !self.is_cancelled() {
            self.tracker.reopen();
        }
    }

    fn lock_interactive(&self) -> MutexGuard<'_, Interactive> {
        match self.interactive.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Notify;

    #[tokio::test]
    async fn launched_job_reports_store_failure() {
        let scope = LifecycleScope::new("test");
        let job = scope.launch("fail", async { Err(anyhow::anyhow!("disk full")) });
        let err = job.await.unwrap().unwrap_err();
        assert!(err.to_string().contains("disk full"));
    }

    #[tokio::test]
    async fn cancel_aborts_pending_suspension() {
        let scope = LifecycleScope::new("test");
        let gate = Arc::new(Notify::new());
        let mutations = Arc::new(AtomicUsize::new(0));

        let job = {
            let scope_in = scope.clone();
            let gate = Arc::clone(&gate);
            let mutations = Arc::clone(&mutations);
            scope.launch("gated", async move {
                scope_in
                    .suspend(async {
                        gate.notified().await;
                        Ok(())
                    })
                    .await?;
                scope_in.on_interactive(|| mutations.fetch_add(1, Ordering::SeqCst))?;
                Ok(())
            })
        };

        tokio::task::yield_now().await;
        scope.cancel();
        gate.notify_one();

        job.await.unwrap().unwrap();
        assert_eq!(mutations.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn resume_after_cancel_is_rejected() {
        let scope = LifecycleScope::new("test");
        scope.cancel();

        let resumed = scope.suspend(async { Ok(7) }).await;
        assert!(resumed.unwrap_err().downcast_ref::<Cancelled>().is_some());

        let mut touched = false;
        assert!(scope.on_interactive(|| touched = true).is_err());
        assert!(!touched);
    }

    #[tokio::test]
    async fn settled_waits_for_jobs_and_scope_stays_usable() {
        let scope = LifecycleScope::new("test");
        let counter = Arc::new(AtomicUsize::new(0));

        for _ in 0..3 {
            let counter = Arc::clone(&counter);
            scope.launch("count", async move {
                tokio::task::yield_now().await;
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            });
        }
        scope.settled().await;
        assert_eq!(counter.load(Ordering::SeqCst), 3);

        let counter_again = Arc::clone(&counter);
        scope
            .launch("count", async move {
                counter_again.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .await
            .unwrap()
            .unwrap();
        assert_eq!(counter.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn cancel_is_idempotent() {
        let scope = LifecycleScope::new("test");
        scope.cancel();
        scope.cancel();
        assert!(scope.is_cancelled());
        scope.settled().await;
    }
}
