use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::watch;

use crate::db::{Database, NightId, SleepNight};

/// Persistence seam shared by every controller. Implementations own their own
/// synchronization; callers never lock around it.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn get(&self, id: NightId) -> Result<Option<SleepNight>>;

    /// Most recently inserted night, whether or not it is still open.
    async fn get_tonight(&self) -> Result<Option<SleepNight>>;

    /// Every night, newest first.
    async fn get_all(&self) -> Result<Vec<SleepNight>>;

    /// Live, newest-first view of every night.
    async fn subscribe_all(&self) -> Result<watch::Receiver<Vec<SleepNight>>>;

    async fn insert(&self, night: SleepNight) -> Result<NightId>;

    async fn update(&self, night: SleepNight) -> Result<()>;

    async fn clear(&self) -> Result<()>;
}

#[async_trait]
impl SessionStore for Database {
    async fn get(&self, id: NightId) -> Result<Option<SleepNight>> {
        self.get_night(id).await
    }

    async fn get_tonight(&self) -> Result<Option<SleepNight>> {
        Database::get_tonight(self).await
    }

    async fn get_all(&self) -> Result<Vec<SleepNight>> {
        self.get_all_nights().await
    }

    async fn subscribe_all(&self) -> Result<watch::Receiver<Vec<SleepNight>>> {
        Ok(self.watch_nights())
    }

    async fn insert(&self, night: SleepNight) -> Result<NightId> {
        self.insert_night(&night).await
    }

    async fn update(&self, night: SleepNight) -> Result<()> {
        self.update_night(&night).await
    }

    async fn clear(&self) -> Result<()> {
        self.clear_nights().await
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Store wrappers used to pin down suspension behavior in tests.

    use std::sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc,
    };

    use anyhow::{bail, Result};
    use async_trait::async_trait;
    use tokio::sync::{watch, Notify};

    use super::SessionStore;
    use crate::db::{Database, NightId, SleepNight};

    /// Delegates to an in-memory database, but every read and write waits for
    /// the gate to open first when `gated` is set.
    pub struct GatedStore {
        pub db: Database,
        pub gate: Arc<Notify>,
        pub gated: AtomicBool,
        pub inserts: AtomicUsize,
        pub fail_writes: AtomicBool,
    }

    impl GatedStore {
        pub fn new() -> Arc<Self> {
            Arc::new(Self {
                db: Database::in_memory().unwrap(),
                gate: Arc::new(Notify::new()),
                gated: AtomicBool::new(false),
                inserts: AtomicUsize::new(0),
                fail_writes: AtomicBool::new(false),
            })
        }

        pub fn close_gate(&self) {
            self.gated.store(true, Ordering::SeqCst);
        }

        pub fn release(&self) {
            self.gated.store(false, Ordering::SeqCst);
            self.gate.notify_waiters();
        }

        async fn pass(&self) {
            let notified = self.gate.notified();
            if self.gated.load(Ordering::SeqCst) {
                notified.await;
            }
        }

        fn check_write(&self) -> Result<()> {
            if self.fail_writes.load(Ordering::SeqCst) {
                bail!("store is read-only");
            }
            Ok(())
        }
    }

    #[async_trait]
    impl SessionStore for GatedStore {
        async fn get(&self, id: NightId) -> Result<Option<SleepNight>> {
            self.pass().await;
            self.db.get(id).await
        }

        async fn get_tonight(&self) -> Result<Option<SleepNight>> {
            self.pass().await;
            SessionStore::get_tonight(&self.db).await
        }

        async fn get_all(&self) -> Result<Vec<SleepNight>> {
            self.pass().await;
            self.db.get_all().await
        }

        async fn subscribe_all(&self) -> Result<watch::Receiver<Vec<SleepNight>>> {
            self.db.subscribe_all().await
        }

        async fn insert(&self, night: SleepNight) -> Result<NightId> {
            self.pass().await;
            self.check_write()?;
            self.inserts.fetch_add(1, Ordering::SeqCst);
            self.db.insert(night).await
        }

        async fn update(&self, night: SleepNight) -> Result<()> {
            self.pass().await;
            self.check_write()?;
            self.db.update(night).await
        }

        async fn clear(&self) -> Result<()> {
            self.pass().await;
            self.check_write()?;
            self.db.clear().await
        }
    }
}
