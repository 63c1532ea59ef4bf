use std::sync::Arc;

use anyhow::bail;
use log::{debug, info};
use tokio::sync::watch;

use crate::{
    db::{NightId, QUALITY_MAX},
    lifecycle::{Job, LifecycleScope, Observable},
    store::SessionStore,
};

/// State holder behind the rating screen. Applies one rating to a fixed night,
/// then raises the navigate signal.
///
/// Must be created inside a Tokio runtime. Dropping it tears down all of its
/// outstanding work.
pub struct QualityRecorder {
    night_id: NightId,
    store: Arc<dyn SessionStore>,
    scope: LifecycleScope,
    navigate: Observable<Option<bool>>,
}

impl QualityRecorder {
    /// `night_id` usually comes from the tracker's quality navigation signal.
    /// `NightId::NONE` builds a recorder that never finds anything to rate.
    pub fn new(store: Arc<dyn SessionStore>, night_id: NightId) -> Self {
        Self {
            night_id,
            store,
            scope: LifecycleScope::new("quality"),
            navigate: Observable::new(None),
        }
    }

    pub fn night_id(&self) -> NightId {
        self.night_id
    }

    /// Stores `rating` on the night. A missing night is skipped silently.
    pub fn on_set_quality(&self, rating: i32) -> Job {
        let night_id = self.night_id;
        let store = Arc::clone(&self.store);
        let scope = self.scope.clone();
        let navigate = self.navigate.clone();

        self.scope.launch("set quality", async move {
            if !(0..=QUALITY_MAX).contains(&rating) {
                bail!("quality rating {rating} is outside 0..={QUALITY_MAX}");
            }

            let Some(mut night) = scope.suspend(store.get(night_id)).await? else {
                debug!("night {night_id} not found; rating skipped");
                return Ok(());
            };

            night.quality = rating;
            scope.suspend(store.update(night)).await?;
            info!("Rated night {night_id} as {rating}");

            scope.on_interactive(|| navigate.set(Some(true)))
        })
    }

    /// Resets the navigate signal after the UI has acted on it.
    pub fn done_navigating(&self) {
        if self.scope.on_interactive(|| self.navigate.set(None)).is_err() {
            debug!("navigation acknowledged after teardown");
        }
    }

    pub fn navigate(&self) -> Option<bool> {
        self.navigate.get()
    }

    pub fn subscribe_navigate(&self) -> watch::Receiver<Option<bool>> {
        self.navigate.subscribe()
    }

    pub async fn settled(&self) {
        self.scope.settled().await;
    }

    /// Cancels outstanding work; an unfinished rating never raises the signal.
    pub fn teardown(&self) {
        self.scope.cancel();
    }
}

impl Drop for QualityRecorder {
    fn drop(&mut self) {
        self.teardown();
    }
}
