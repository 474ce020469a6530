use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use crate::engine::ContainerRuntime;
use crate::error::RuntimeError;

const RESCAN_INTERVAL: Duration = Duration::from_secs(2 * 60 * 60);

/// Keeps a builder's pinned image fresh: pulls immediately on every
/// (re-)arm and then every two hours after. Re-arming cancels whatever timer
/// was previously running, so at most one recurring pull loop exists at a
/// time.
pub struct ScheduledPull {
    runtime: Arc<dyn ContainerRuntime>,
    timer: Mutex<Option<JoinHandle<()>>>,
    pinned: Mutex<Option<String>>,
}

impl ScheduledPull {
    pub fn new(runtime: Arc<dyn ContainerRuntime>) -> Self {
        Self {
            runtime,
            timer: Mutex::new(None),
            pinned: Mutex::new(None),
        }
    }

    /// Arm the recurring pull. `name = None` keeps whatever image was pinned
    /// by the previous call.
    pub async fn arm(&self, name: Option<String>) -> Result<(), RuntimeError> {
        let name = match name {
            Some(name) => {
                *self.pinned.lock().await = Some(name.clone());
                name
            }
            None => self
                .pinned
                .lock()
                .await
                .clone()
                .ok_or_else(|| RuntimeError::Engine("no image pinned yet".to_string()))?,
        };

        if let Some(handle) = self.timer.lock().await.take() {
            handle.abort();
        }

        self.runtime.pull_image(&name).await?;

        let runtime = self.runtime.clone();
        let pinned_name = name.clone();
        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(RESCAN_INTERVAL);
            interval.tick().await;
            loop {
                interval.tick().await;
                if let Err(err) = runtime.pull_image(&pinned_name).await {
                    tracing::warn!(image = %pinned_name, error = %err, "scheduled pull failed");
                }
            }
        });
        *self.timer.lock().await = Some(handle);
        Ok(())
    }
}

impl Drop for ScheduledPull {
    fn drop(&mut self) {
        if let Ok(mut timer) = self.timer.try_lock() {
            if let Some(handle) = timer.take() {
                handle.abort();
            }
        }
    }
}
