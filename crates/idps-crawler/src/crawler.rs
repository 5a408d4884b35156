use std::cmp;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures::stream::FuturesUnordered;
use futures::StreamExt;

use crate::config::{CrawlerConfig, RunOptions};
use crate::document::Document;
use crate::error::{ConfigurationError, ExtractionError, FetchError, FrontierEmpty, PersistenceError};
use crate::fetch::Fetcher;
use crate::frontier::Frontier;
use crate::generator::UrlGenerator;
use crate::record::{extract_records, Extraction, Record};
use crate::selector::TypedSelector;
use crate::store::{NoStore, RecordSource, Store};
use crate::task::Task;

/// Asks a running crawl to stop fetching new URLs.
///
/// Downloads already in flight are still processed and their records returned. Every run starts
/// with the signal lowered, so raising it only affects the current run.
#[derive(Debug, Clone, Default)]
pub struct StopSignal(Arc<AtomicBool>);

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn raise(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_raised(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    fn lower(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// The records of a run and everything that went wrong along the way.
#[derive(Debug, Default)]
pub struct CrawlReport {
    pub records: Vec<Record>,
    /// Number of fetch attempts, failed ones included.
    pub fetched: usize,
    pub failed_fetches: usize,
    pub fetch_errors: Vec<FetchError>,
    pub extraction_errors: Vec<ExtractionError>,
    pub persistence_errors: Vec<PersistenceError>,
    /// Whether the run ended on a [`StopSignal`] rather than an empty frontier.
    pub stopped: bool,
}

impl CrawlReport {
    pub fn is_clean(&self) -> bool {
        self.fetch_errors.is_empty()
            && self.extraction_errors.is_empty()
            && self.persistence_errors.is_empty()
    }
}

pub struct Crawler<F, S = NoStore> {
    config: CrawlerConfig,
    fetcher: F,
    store: S,
    source: Option<Arc<dyn RecordSource>>,
    stop: StopSignal,
}

impl<F> Crawler<F, NoStore>
where
    F: Fetcher,
{
    pub fn new(config: CrawlerConfig, fetcher: F) -> Self {
        Self {
            config,
            fetcher,
            store: NoStore,
            source: None,
            stop: StopSignal::new(),
        }
    }
}

impl<F, S> Crawler<F, S>
where
    F: Fetcher,
    S: Store,
{
    pub fn with_store<T>(self, store: T) -> Crawler<F, T>
    where
        T: Store,
    {
        Crawler {
            config: self.config,
            fetcher: self.fetcher,
            store,
            source: self.source,
            stop: self.stop,
        }
    }

    /// Where generators reading another task's records get them from when seeding.
    pub fn with_source(mut self, source: Arc<dyn RecordSource>) -> Self {
        self.source = Some(source);
        self
    }

    pub fn stop_signal(&self) -> StopSignal {
        self.stop.clone()
    }

    pub fn config(&self) -> &CrawlerConfig {
        &self.config
    }

    pub fn fetcher(&self) -> &F {
        &self.fetcher
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub async fn run(
        &self,
        task: &Task,
        limit: Option<usize>,
        persist: bool,
    ) -> Result<CrawlReport, ConfigurationError> {
        self.run_with(task, RunOptions::new(limit, persist)).await
    }

    /// Checks a task definition against at most one fetched page, storing nothing.
    pub async fn test(&self, task: &Task) -> Result<CrawlReport, ConfigurationError> {
        self.run_with(task, RunOptions::test()).await
    }

    /// Crawls until no unvisited URL is left, each URL being fetched at most once.
    ///
    /// Only the first recursive generator of the task is fed with the records of each page.
    /// Fetch, extraction and persistence failures are collected in the report, only an invalid
    /// task definition fails the run.
    pub async fn run_with(
        &self,
        task: &Task,
        opts: RunOptions,
    ) -> Result<CrawlReport, ConfigurationError> {
        let selectors = task.validate()?;
        let recursive = task.recursive_generators().next();
        let budget = opts.limit.unwrap_or(usize::MAX);
        let concurrency = cmp::max(1, self.config.concurrent_downloads);

        let frontier = Frontier::new();
        let mut report = CrawlReport::default();
        self.stop.lower();

        // Seeding

        let prior = self.foreign_records(task);
        let seeded = frontier.seed(task.urls(&prior, opts.limit).take(budget));
        log::info!("Running task {}: {seeded} seed URLs", task.name);

        let sigint = self.spawn_sigint_handler();

        // Draining

        let mut in_flight = FuturesUnordered::new();
        let mut started = 0;
        loop {
            while in_flight.len() < concurrency && started < budget && !self.stop.is_raised() {
                let url = match frontier.pop() {
                    Ok(url) => url,
                    Err(FrontierEmpty) => break,
                };
                if !frontier.mark_visited(&url) {
                    log::trace!("Already visited {url}");
                    continue;
                }
                started += 1;
                in_flight.push(async move {
                    let page = self.fetcher.fetch(&url, &task.selectors).await;
                    (url, page)
                });
            }

            let Some((url, page)) = in_flight.next().await else {
                break;
            };
            report.fetched += 1;
            self.process(task, &selectors, recursive, &frontier, opts, &mut report, url, page);
        }

        // Done

        if let Some(handle) = sigint {
            handle.abort();
        }
        if opts.persist {
            self.store.finalizer();
        }
        report.stopped = self.stop.is_raised();

        log::info!(
            "Task {} done: {} fetched, {} failed, {} records, {} left in frontier",
            task.name,
            report.fetched,
            report.failed_fetches,
            report.records.len(),
            frontier.len(),
        );

        Ok(report)
    }

    /// Records of the other tasks the generators read from. The task's own recursive generator
    /// starts from nothing.
    fn foreign_records(&self, task: &Task) -> Vec<Record> {
        let Some(source) = &self.source else {
            return vec![];
        };

        let mut tasks = task
            .url_generators
            .iter()
            .filter_map(UrlGenerator::source_task)
            .filter(|source_task| *source_task != task.name)
            .collect::<Vec<_>>();
        tasks.sort_unstable();
        tasks.dedup();

        tasks
            .into_iter()
            .flat_map(|source_task| source.records(source_task))
            .collect()
    }

    fn spawn_sigint_handler(&self) -> Option<tokio::task::JoinHandle<()>> {
        if !self.config.handle_sigint {
            return None;
        }
        let Ok(rt) = tokio::runtime::Handle::try_current() else {
            log::warn!("No Tokio runtime, Ctrl-C won't stop the crawl");
            return None;
        };

        let stop = self.stop.clone();
        Some(rt.spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                log::warn!("Interrupted, waiting for in-flight downloads");
                stop.raise();
            }
        }))
    }

    #[allow(clippy::too_many_arguments)]
    fn process(
        &self,
        task: &Task,
        selectors: &[TypedSelector],
        recursive: Option<&UrlGenerator>,
        frontier: &Frontier,
        opts: RunOptions,
        report: &mut CrawlReport,
        url: String,
        page: Result<String, FetchError>,
    ) {
        let doc = match page.and_then(|page| {
            Document::parse(&page).map_err(|source| FetchError::Document {
                url: url.clone(),
                source,
            })
        }) {
            Ok(doc) => doc,
            Err(e) => {
                log::warn!("Skipping URL: {e}");
                report.failed_fetches += 1;
                report.fetch_errors.push(e);
                return;
            }
        };

        let Extraction { records, errors } = extract_records(&task.name, &url, selectors, &doc);
        report.extraction_errors.extend(errors);
        if records.is_empty() {
            log::debug!("No record in {url}");
            return;
        }

        if opts.persist {
            if let Err(e) = self.store.store(task, &records) {
                log::error!("{e}");
                report.persistence_errors.push(e);
            }
        }

        if let Some(generator) = recursive {
            let added = frontier.merge(generator.produce(&records, None));
            log::debug!("{url}: {} records, {added} new URLs", records.len());
        }

        report.records.extend(records);
    }
}
