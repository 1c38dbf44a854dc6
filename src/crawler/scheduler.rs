//! Scheduler for detail-page fetches
//!
//! This module handles:
//! - Global concurrency limiting via a semaphore shared by the whole run
//! - Running one listing page's detail fetches as a batch
//! - The sequential shape with pauses between entities

use crate::config::{CrawlerConfig, ExecutionMode};
use crate::crawler::fetcher::{FetchResult, Transport};
use crate::crawler::parser::EntityReference;
use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// A detail fetch ready to be dispatched
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetailTask {
    /// The listing entry this fetch belongs to
    pub reference: EntityReference,

    /// Rendered detail URL
    pub url: String,
}

/// A completed detail fetch
#[derive(Debug, Clone)]
pub struct DetailOutcome {
    pub task: DetailTask,
    pub result: FetchResult,
}

/// Scheduler runs detail fetches under the global concurrency bound
///
/// The scheduler coordinates:
/// - A semaphore of `max-concurrent-tasks` permits, held for the duration of each fetch
/// - Batch execution in the configured shape
/// - Pauses between entities in the sequential shape
pub struct Scheduler {
    /// Global semaphore for limiting concurrent fetches
    global_semaphore: Arc<Semaphore>,

    /// Transport shared by every fetch task
    transport: Arc<dyn Transport>,

    mode: ExecutionMode,

    between_companies: Duration,
}

impl Scheduler {
    /// Creates a new scheduler
    ///
    /// # Arguments
    ///
    /// * `config` - The crawler configuration
    /// * `transport` - The transport detail pages are fetched through
    ///
    /// # Returns
    ///
    /// A new Scheduler instance
    pub fn new(config: &CrawlerConfig, transport: Arc<dyn Transport>) -> Self {
        let permits = config.max_concurrent_tasks.max(1) as usize;

        Self {
            global_semaphore: Arc::new(Semaphore::new(permits)),
            transport,
            mode: config.mode,
            between_companies: config.between_companies(),
        }
    }

    /// Returns the shared transport
    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    /// Number of permits currently free
    pub fn available_permits(&self) -> usize {
        self.global_semaphore.available_permits()
    }

    /// Fetches a batch of detail pages
    ///
    /// In the concurrent shape every task is launched at once and waits for a
    /// permit; a stop request does not abort any of them. In the sequential
    /// shape the stop request is checked before each entity and the rest of
    /// the batch is left undispatched.
    ///
    /// # Returns
    ///
    /// Outcomes in task order, one per dispatched task
    pub async fn run_batch(
        &self,
        tasks: Vec<DetailTask>,
        cancel: &CancellationToken,
    ) -> Vec<DetailOutcome> {
        match self.mode {
            ExecutionMode::Concurrent => self.run_concurrent(tasks).await,
            ExecutionMode::Sequential => self.run_sequential(tasks, cancel).await,
        }
    }

    async fn run_concurrent(&self, tasks: Vec<DetailTask>) -> Vec<DetailOutcome> {
        let fetches = tasks.into_iter().map(|task| {
            let semaphore = Arc::clone(&self.global_semaphore);
            let transport = Arc::clone(&self.transport);

            async move {
                let result = match semaphore.acquire_owned().await {
                    Ok(_permit) => {
                        debug!(slug = %task.reference.identifier, url = %task.url, "Fetching detail page");
                        transport.fetch(&task.url).await
                    }
                    Err(_) => FetchResult::NetworkError {
                        error: "scheduler semaphore closed".to_string(),
                        attempts: 0,
                    },
                };
                DetailOutcome { task, result }
            }
        });

        join_all(fetches).await
    }

    async fn run_sequential(
        &self,
        tasks: Vec<DetailTask>,
        cancel: &CancellationToken,
    ) -> Vec<DetailOutcome> {
        let total = tasks.len();
        let mut outcomes = Vec::with_capacity(total);

        for (index, task) in tasks.into_iter().enumerate() {
            if cancel.is_cancelled() {
                info!(
                    remaining = total - index,
                    "Stop requested, leaving rest of batch undispatched"
                );
                break;
            }

            if index > 0 && !self.between_companies.is_zero() {
                tokio::time::sleep(self.between_companies).await;
            }

            let result = match Arc::clone(&self.global_semaphore).acquire_owned().await {
                Ok(_permit) => {
                    debug!(slug = %task.reference.identifier, url = %task.url, "Fetching detail page");
                    self.transport.fetch(&task.url).await
                }
                Err(_) => FetchResult::NetworkError {
                    error: "scheduler semaphore closed".to_string(),
                    attempts: 0,
                },
            };

            outcomes.push(DetailOutcome { task, result });
        }

        outcomes
    }
}
