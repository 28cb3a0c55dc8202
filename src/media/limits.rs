use super::{error::MediaError, model::Platform};
use std::{collections::HashMap, sync::Arc};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Caps concurrent outbound connections per platform so one busy platform
/// does not get the service throttled or banned.
#[derive(Clone)]
pub struct UpstreamLimits {
    permits: HashMap<Platform, Arc<Semaphore>>,
}

impl UpstreamLimits {
    pub fn new(max_connections: usize) -> Self {
        let max_connections = max_connections.max(1);
        let permits = Platform::ALL
            .into_iter()
            .map(|platform| (platform, Arc::new(Semaphore::new(max_connections))))
            .collect();
        UpstreamLimits { permits }
    }

    pub async fn acquire(&self, platform: Platform) -> Result<OwnedSemaphorePermit, MediaError> {
        let semaphore = self.permits.get(&platform).cloned().ok_or_else(|| {
            MediaError::Internal(anyhow::anyhow!("no connection limit for {}", platform))
        })?;
        semaphore
            .acquire_owned()
            .await
            .map_err(|e| MediaError::Internal(anyhow::Error::new(e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_limits_are_per_platform() {
        let limits = UpstreamLimits::new(1);
        let _tiktok = limits.acquire(Platform::Tiktok).await.unwrap();

        // another platform is unaffected
        let youtube = limits.acquire(Platform::Youtube).await;
        assert!(youtube.is_ok());

        // a second tiktok permit has to wait
        let blocked =
            tokio::time::timeout(Duration::from_millis(50), limits.acquire(Platform::Tiktok)).await;
        assert!(blocked.is_err());
    }
}
