use std::sync::Arc;

use anyhow::Result;
use log::{debug, info};
use tokio::sync::watch;

use crate::{
    clock::{Clock, SystemClock},
    db::{NightId, SleepNight},
    lifecycle::{Job, LifecycleScope, Observable},
    store::SessionStore,
};

use super::{ButtonState, HistoryFormatter};

struct TrackerCore {
    store: Arc<dyn SessionStore>,
    clock: Arc<dyn Clock>,
    formatter: Arc<dyn HistoryFormatter>,
    scope: LifecycleScope,
    tonight: Observable<Option<SleepNight>>,
    history: Observable<Vec<String>>,
    navigate_to_quality: Observable<Option<NightId>>,
}

impl TrackerCore {
    /// Latest night, but only while it is still open. A closed one is stale.
    async fn load_tonight(&self) -> Result<Option<SleepNight>> {
        let night = self.scope.suspend(self.store.get_tonight()).await?;
        Ok(match night {
            Some(night) if night.is_open() => Some(night),
            Some(stale) => {
                debug!("night {} already closed; no session in progress", stale.id);
                None
            }
            None => None,
        })
    }

    fn publish_tonight(&self, night: Option<SleepNight>) -> Result<()> {
        self.scope.on_interactive(|| self.tonight.set(night))
    }

    async fn watch_history(&self) -> Result<()> {
        let mut nights = self.scope.suspend(self.store.subscribe_all()).await?;

        loop {
            let snapshot = nights.borrow_and_update().clone();
            let lines = self.formatter.format_nights(&snapshot);
            self.scope.on_interactive(|| self.history.set(lines))?;

            let changed = self
                .scope
                .suspend(async { Ok(nights.changed().await) })
                .await?;
            if changed.is_err() {
                debug!("night history source closed");
                return Ok(());
            }
        }
    }
}

/// State holder behind the tracking screen: starts, stops and clears nights and
/// keeps a formatted history list current.
///
/// Must be created inside a Tokio runtime. Dropping it tears down all of its
/// outstanding work.
pub struct SessionController {
    core: Arc<TrackerCore>,
}

impl SessionController {
    pub fn new(store: Arc<dyn SessionStore>, formatter: Arc<dyn HistoryFormatter>) -> Self {
        Self::with_clock(store, formatter, Arc::new(SystemClock))
    }

    pub fn with_clock(
        store: Arc<dyn SessionStore>,
        formatter: Arc<dyn HistoryFormatter>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let controller = Self {
            core: Arc::new(TrackerCore {
                store,
                clock,
                formatter,
                scope: LifecycleScope::new("tracker"),
                tonight: Observable::new(None),
                history: Observable::new(Vec::new()),
                navigate_to_quality: Observable::new(None),
            }),
        };

        let core = Arc::clone(&controller.core);
        controller
            .core
            .scope
            .launch_background("history", async move { core.watch_history().await });
        controller.initialize();

        controller
    }

    /// Loads the night in progress, if any. Runs once from construction.
    fn initialize(&self) -> Job {
        let core = Arc::clone(&self.core);
        self.core.scope.launch("initialize", async move {
            let tonight = core.load_tonight().await?;
            core.publish_tonight(tonight)
        })
    }

    /// Opens a new night and publishes it once it has been stored and read back.
    /// Does not check for a night that is already open.
    pub fn on_start_tracking(&self) -> Job {
        let core = Arc::clone(&self.core);
        let night = SleepNight::begin(self.core.clock.now_ms());

        self.core.scope.launch("start tracking", async move {
            let id = core.scope.suspend(core.store.insert(night)).await?;
            info!("Started night {id}");

            let tonight = core.load_tonight().await?;
            core.publish_tonight(tonight)
        })
    }

    /// Closes the current night, if one is held, and signals that it is ready
    /// to be rated.
    pub fn on_stop_tracking(&self) -> Job {
        let core = Arc::clone(&self.core);
        let now = self.core.clock.now_ms();

        self.core.scope.launch("stop tracking", async move {
            let Some(mut night) = core.scope.on_interactive(|| core.tonight.get())? else {
                debug!("stop requested with no night in progress");
                return Ok(());
            };

            night.finish(now);
            core.scope.suspend(core.store.update(night.clone())).await?;
            info!(
                "Stopped night {} after {}ms",
                night.id,
                night.duration_ms()
            );

            core.scope.on_interactive(|| {
                core.tonight.set(None);
                core.navigate_to_quality.set(Some(night.id));
            })
        })
    }

    /// Deletes every stored night. Irreversible.
    pub fn on_clear(&self) -> Job {
        let core = Arc::clone(&self.core);

        self.core.scope.launch("clear", async move {
            core.scope.suspend(core.store.clear()).await?;
            info!("Cleared all nights");
            core.publish_tonight(None)
        })
    }

    /// Marks the quality navigation as handled.
    pub fn done_navigating(&self) {
        if self
            .core
            .scope
            .on_interactive(|| self.core.navigate_to_quality.set(None))
            .is_err()
        {
            debug!("quality navigation acknowledged after teardown");
        }
    }

    pub fn current_session(&self) -> Option<SleepNight> {
        self.core.tonight.get()
    }

    pub fn subscribe_current_session(&self) -> watch::Receiver<Option<SleepNight>> {
        self.core.tonight.subscribe()
    }

    pub fn history(&self) -> Vec<String> {
        self.core.history.get()
    }

    pub fn subscribe_history(&self) -> watch::Receiver<Vec<String>> {
        self.core.history.subscribe()
    }

    pub fn navigate_to_quality(&self) -> Option<NightId> {
        self.core.navigate_to_quality.get()
    }

    pub fn subscribe_navigate_to_quality(&self) -> watch::Receiver<Option<NightId>> {
        self.core.navigate_to_quality.subscribe()
    }

    pub fn buttons(&self) -> ButtonState {
        let history_len = self.core.history.with(Vec::len);
        ButtonState::derive(self.core.tonight.get().as_ref(), history_len)
    }

    /// Waits for every action launched so far, including initialization.
    pub async fn settled(&self) {
        self.core.scope.settled().await;
    }

    /// Cancels all outstanding work. Nothing observable changes afterwards.
    pub fn teardown(&self) {
        self.core.scope.cancel();
    }
}

impl Drop for SessionController {
    fn drop(&mut self) {
        self.teardown();
    }
}
