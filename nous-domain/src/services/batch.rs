//! Batch queue in front of the AI service
//!
//! Requests are collected until either `max_batch_size` are queued or
//! `max_wait` has passed since the first one arrived, then the whole batch
//! is answered concurrently.

use std::sync::Arc;

use futures::future::join_all;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::{timeout_at, Instant};
use tracing::{debug, info};

use crate::config::BatchConfig;
use crate::entities::{AiRequest, AiResponse};
use crate::services::optimizer::{AiServiceError, AiServiceTrait};

struct BatchItem {
    request: AiRequest,
    reply: oneshot::Sender<Result<AiResponse, AiServiceError>>,
}

/// Handle to a running batch worker
#[derive(Clone)]
pub struct BatchQueue {
    sender: mpsc::Sender<BatchItem>,
    shutdown: Arc<watch::Sender<bool>>,
}

impl BatchQueue {
    /// Start a worker on the current tokio runtime
    pub fn spawn(service: Arc<dyn AiServiceTrait>, config: BatchConfig) -> Self {
        let (sender, receiver) = mpsc::channel(config.capacity.max(1));
        let (shutdown, shutdown_rx) = watch::channel(false);

        tokio::spawn(run_worker(service, config, receiver, shutdown_rx));

        Self {
            sender,
            shutdown: Arc::new(shutdown),
        }
    }

    /// Queue a request and wait for its answer
    pub async fn submit(&self, request: AiRequest) -> Result<AiResponse, AiServiceError> {
        let (reply, answer) = oneshot::channel();
        self.sender
            .send(BatchItem { request, reply })
            .await
            .map_err(|_| AiServiceError::QueueClosed)?;
        answer.await.map_err(|_| AiServiceError::QueueClosed)?
    }

    /// Queue several requests, answers in submission order
    pub async fn submit_all(&self, requests: Vec<AiRequest>) -> Vec<Result<AiResponse, AiServiceError>> {
        join_all(requests.into_iter().map(|request| self.submit(request))).await
    }

    /// Stop the worker once the batch in progress is answered
    pub fn close(&self) {
        let _ = self.shutdown.send(true);
    }

    /// Whether the worker has stopped accepting requests
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}

async fn run_worker(
    service: Arc<dyn AiServiceTrait>,
    config: BatchConfig,
    mut receiver: mpsc::Receiver<BatchItem>,
    mut shutdown: watch::Receiver<bool>,
) {
    let max_batch_size = config.max_batch_size.max(1);
    info!(
        "Batch worker started: max_batch_size={}, max_wait={:?}",
        max_batch_size, config.max_wait
    );

    loop {
        let first = tokio::select! {
            item = receiver.recv() => match item {
                Some(item) => item,
                None => break,
            },
            _ = shutdown.changed() => break,
        };

        let deadline = Instant::now() + config.max_wait;
        let mut batch = vec![first];
        while batch.len() < max_batch_size {
            match timeout_at(deadline, receiver.recv()).await {
                Ok(Some(item)) => batch.push(item),
                Ok(None) | Err(_) => break,
            }
        }

        debug!("Flushing batch of {} requests", batch.len());
        let service = &service;
        join_all(batch.into_iter().map(|item| async move {
            let result = service.generate(item.request).await;
            // The submitter may have given up waiting
            let _ = item.reply.send(result);
        }))
        .await;
    }

    // Queued items are dropped with their reply senders, which their
    // submitters observe as a closed queue
    receiver.close();
    info!("Batch worker stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockAiService;
    use std::time::Duration;

    fn config(max_batch_size: usize, max_wait: Duration) -> BatchConfig {
        BatchConfig {
            max_batch_size,
            max_wait,
            capacity: 16,
        }
    }

    #[tokio::test]
    async fn test_full_batch_flushes_before_timer() {
        let service = Arc::new(MockAiService::new());
        let queue = BatchQueue::spawn(service.clone(), config(3, Duration::from_secs(30)));

        let requests = vec![AiRequest::new("a"), AiRequest::new("b"), AiRequest::new("c")];
        let answers = tokio::time::timeout(Duration::from_secs(5), queue.submit_all(requests))
            .await
            .expect("a full batch must not wait for the timer");

        let texts: Vec<String> = answers.into_iter().map(|a| a.unwrap().text).collect();
        assert_eq!(texts, vec!["echo: a", "echo: b", "echo: c"]);
        assert_eq!(service.generate_calls(), 3);
    }

    #[tokio::test]
    async fn test_partial_batch_flushes_on_timer() {
        let service = Arc::new(MockAiService::new());
        let queue = BatchQueue::spawn(service.clone(), config(10, Duration::from_millis(50)));

        let started = std::time::Instant::now();
        let answer = queue.submit(AiRequest::new("lonely")).await.unwrap();

        assert_eq!(answer.text, "echo: lonely");
        assert!(started.elapsed() >= Duration::from_millis(50));
    }

    #[tokio::test]
    async fn test_errors_are_delivered_to_their_submitter() {
        let service = Arc::new(MockAiService::new().with_generate_failure());
        let queue = BatchQueue::spawn(service, config(1, Duration::from_millis(10)));

        assert!(matches!(
            queue.submit(AiRequest::new("x")).await,
            Err(AiServiceError::Internal(_))
        ));
    }

    #[tokio::test]
    async fn test_submit_after_close_is_rejected() {
        let service = Arc::new(MockAiService::new());
        let queue = BatchQueue::spawn(service, config(1, Duration::from_millis(10)));

        queue.close();
        for _ in 0..100 {
            if queue.is_closed() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        assert!(queue.is_closed());
        assert!(matches!(
            queue.submit(AiRequest::new("late")).await,
            Err(AiServiceError::QueueClosed)
        ));
    }
}
