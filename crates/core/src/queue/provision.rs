//! Locating, replacing and verifying the remote queue at construction

use std::sync::Arc;

use spillway_domain::QueueSettings;
use tracing::{info, instrument, warn};

use crate::errors::{QueueError, QueueResult};
use crate::queue::metrics::QueueMetrics;
use crate::remote::bridge::{retry_executor, with_retry};
use crate::remote::{BlobService, OverflowStore, QueueAttributes, QueueService, RemoteQueue};

/// A ready-to-use remote queue and its overflow container
pub struct Provisioned {
    /// Handle to the remote queue
    pub queue: Arc<dyn RemoteQueue>,
    /// Verified non-empty queue URL
    pub url: String,
    /// Overflow container named after the queue
    pub store: Arc<dyn OverflowStore>,
}

/// Find or create the remote queue, replacing a non-empty one when the
/// settings ask for it, then open the overflow container.
#[instrument(skip_all, fields(queue = %settings.name))]
pub async fn provision(
    queues: &dyn QueueService,
    blobs: &dyn BlobService,
    settings: &QueueSettings,
    metrics: &QueueMetrics,
) -> QueueResult<Provisioned> {
    let mut queue = find_or_create(queues, settings, metrics).await?;

    if settings.replace_existing_queue {
        let executor = retry_executor(settings.retry.receive_attempts, &settings.retry)?;
        let existing = &queue;
        let count = with_retry("approximate_count", &executor, move || async move {
            metrics.record_request();
            existing
                .approximate_count()
                .await
                .map_err(|e| QueueError::from_remote("approximate_count", e))
        })
        .await?;

        if count > 0 {
            info!(count, delay = ?settings.recreate_delay, "Replacing non-empty queue");
            let executor = retry_executor(settings.retry.delete_attempts, &settings.retry)?;
            let stale = &queue;
            with_retry("delete_queue", &executor, move || async move {
                metrics.record_request();
                stale.delete_queue().await.map_err(|e| QueueError::from_remote("delete_queue", e))
            })
            .await?;
            tokio::time::sleep(settings.recreate_delay).await;
            queue = find_or_create(queues, settings, metrics).await?;
        }
    }

    let url = verify_url(&queue, settings).await?;

    let executor = retry_executor(settings.retry.create_attempts, &settings.retry)?;
    let name = settings.name.as_str();
    let store = with_retry("open_container", &executor, move || async move {
        metrics.record_request();
        blobs.open_container(name).await.map_err(|e| QueueError::from_remote("open_container", e))
    })
    .await?;

    info!(url = %url, "Queue ready");
    Ok(Provisioned { queue, url, store })
}

async fn find_or_create(
    queues: &dyn QueueService,
    settings: &QueueSettings,
    metrics: &QueueMetrics,
) -> QueueResult<Arc<dyn RemoteQueue>> {
    let executor = retry_executor(settings.retry.create_attempts, &settings.retry)?;
    let name = settings.name.as_str();
    let attributes = QueueAttributes { visibility_timeout_secs: settings.visibility_timeout_secs };
    let attributes = &attributes;

    let found = with_retry("find_queue", &executor, move || async move {
        metrics.record_request();
        queues.find_queue(name).await.map_err(|e| QueueError::from_remote("find_queue", e))
    })
    .await?;
    if let Some(queue) = found {
        return Ok(queue);
    }

    with_retry("create_queue", &executor, move || async move {
        metrics.record_request();
        queues
            .create_queue(name, attributes)
            .await
            .map_err(|e| QueueError::from_remote("create_queue", e))
    })
    .await
    .map_err(|e| QueueError::QueueCreationFailure { name: name.to_string(), reason: e.to_string() })
}

/// The service may hand out a queue before its URL resolves; poll a bounded
/// number of times.
async fn verify_url(queue: &Arc<dyn RemoteQueue>, settings: &QueueSettings) -> QueueResult<String> {
    let attempts = settings.retry.create_attempts;
    let mut last_error = String::from("empty url");
    for attempt in 1..=attempts {
        match queue.url().await {
            Ok(url) if !url.is_empty() => return Ok(url),
            Ok(_) => last_error = String::from("empty url"),
            Err(e) => last_error = e.to_string(),
        }
        if attempt < attempts {
            warn!(attempt, error = %last_error, "Queue URL not available yet");
            tokio::time::sleep(settings.retry.base_delay).await;
        }
    }
    Err(QueueError::QueueCreationFailure {
        name: settings.name.clone(),
        reason: format!("Couldn't create queue or delete existing queue by this name: {last_error}"),
    })
}
