//! Periodic syncing of all accounts.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::config::SyncOptions;
use crate::error::WalletError;
use crate::locks::lock;
use crate::shutdown::ShutdownController;
use crate::wallet::Wallet;

pub(crate) struct BackgroundSync {
    shutdown: ShutdownController,
    handle: JoinHandle<()>,
}

impl BackgroundSync {
    pub(crate) fn signal(&self) {
        self.shutdown.shutdown();
    }
}

impl Wallet {
    /// Sync all accounts every `interval` until stopped. The loop holds no
    /// strong reference, so dropping the last wallet handle also ends it.
    pub fn start_background_syncing(
        &self,
        options: Option<SyncOptions>,
        interval: Option<Duration>,
    ) -> Result<(), WalletError> {
        let mut slot = lock(&self.inner.background);
        if slot.as_ref().is_some_and(|b| !b.handle.is_finished()) {
            return Err(WalletError::BackgroundSyncAlreadyRunning);
        }
        let interval = interval
            .unwrap_or_else(|| Duration::from_secs(self.config().background_sync_interval_secs))
            .max(Duration::from_millis(1));

        let shutdown = ShutdownController::new();
        let mut shutdown_rx = shutdown.subscribe();
        let wallet = Arc::downgrade(&self.inner);
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    biased;
                    _ = shutdown_rx.recv() => {
                        debug!("background sync stopping");
                        break;
                    }
                    _ = ticker.tick() => {
                        let Some(inner) = wallet.upgrade() else {
                            break;
                        };
                        let wallet = Wallet { inner };
                        if let Err(e) = wallet.sync_all(options.clone()).await {
                            warn!(error = %e, "background sync failed");
                        }
                    }
                }
            }
        });
        *slot = Some(BackgroundSync { shutdown, handle });
        info!(interval_ms = interval.as_millis() as u64, "background sync started");
        Ok(())
    }

    /// Stop the loop and wait for a running cycle to finish.
    pub async fn stop_background_syncing(&self) -> Result<(), WalletError> {
        let running = lock(&self.inner.background).take();
        if let Some(background) = running {
            background.signal();
            background.handle.await?;
            info!("background sync stopped");
        }
        Ok(())
    }

    pub fn is_background_syncing(&self) -> bool {
        lock(&self.inner.background)
            .as_ref()
            .is_some_and(|b| !b.handle.is_finished())
    }
}
