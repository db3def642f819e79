//! Download orchestration: nested bounded-concurrency transfers with retry,
//! skip-by-size, progress aggregation, and cancellation.
//!
//! The manager runs in two phases. `initialize` resolves every input URL into
//! a typed [`Release`] and precomputes expected totals via best-effort size
//! probes. `start_downloads` then runs the transfers: an outer pool bounds how
//! many releases are in flight, an inner pool per release bounds its asset
//! transfers.
//!
//! # Concurrency Model
//!
//! - One task per release, gated by an outer semaphore
//!   (`max_concurrent_releases`, default 1)
//! - One task per asset within a release, gated by an inner semaphore
//!   (`max_concurrent_transfers`, default 10)
//! - A single `CancellationToken` is observed at every await point; after
//!   cancellation no new task starts, in-flight ones finish or fail
//! - Cover-art bytes reach track tasks through a `watch` channel; tasks wait
//!   for artwork only after releasing their transfer permit, so a 1-wide pool
//!   cannot deadlock on it
//!
//! # Failure Model
//!
//! Per-file and per-release failures are reported through the event stream
//! and never abort siblings. The run as a whole fails only on cancellation.

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::{Semaphore, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};
use url::Url;

use super::progress::{EventReceiver, EventSender, ProgressEvent, ProgressSnapshot, ProgressState};
use super::retry::{RetryError, RetryPolicy, retry_with_backoff};
use crate::config::Settings;
use crate::fetch::HttpClient;
use crate::model::{NamingConfig, Release};
use crate::scrape::{self, ScrapeError, UrlKind};
use crate::tag::Tagger;

/// Errors that fail a run as a whole.
#[derive(Debug, Error)]
pub enum ManagerError {
    /// The run was cancelled. Individual file and release failures are
    /// reported through the event stream instead.
    #[error("run cancelled")]
    Cancelled,
}

/// One planned transfer: source URL, destination, and best-effort expected
/// size from the initialization probe.
#[derive(Debug, Clone)]
pub struct TransferJob {
    /// Source asset URL.
    pub url: String,
    /// Destination file path.
    pub dest: PathBuf,
    /// Expected size from the HEAD probe, when it succeeded.
    pub expected_size: Option<u64>,
}

/// Cover-art state shared with track tasks over a watch channel.
#[derive(Debug, Clone)]
enum ArtworkStatus {
    /// The artwork transfer has not finished yet.
    Pending,
    /// Artwork bytes are available.
    Ready(Arc<Vec<u8>>),
    /// No artwork, or its transfer failed.
    Unavailable,
}

/// How a single transfer ended.
enum TransferOutcome {
    /// Transferred to disk.
    Completed,
    /// Existing file was within the size tolerance.
    Skipped,
    /// All retry attempts failed.
    Failed,
    /// Cancellation fired before or during the transfer.
    Cancelled,
}

/// Clone-cheap bundle of everything a spawned transfer task needs.
#[derive(Clone)]
struct TaskCtx {
    client: HttpClient,
    retry_policy: RetryPolicy,
    cancel: CancellationToken,
    progress: Arc<ProgressState>,
    events: EventSender,
    tagger: Arc<dyn Tagger>,
    size_tolerance: f64,
    modify_tags: bool,
    save_cover_in_folder: bool,
    save_cover_in_tags: bool,
    expected_sizes: Arc<HashMap<String, u64>>,
}

impl TaskCtx {
    /// True when some consumer needs the cover art fetched at all.
    fn wants_artwork(&self) -> bool {
        self.save_cover_in_folder || self.save_cover_in_tags
    }
}

/// Orchestrates resolution and download of a set of releases.
pub struct DownloadManager {
    client: HttpClient,
    settings: Settings,
    naming: NamingConfig,
    retry_policy: RetryPolicy,
    cancel: CancellationToken,
    progress: Arc<ProgressState>,
    events: EventSender,
    tagger: Arc<dyn Tagger>,
    releases: Vec<Arc<Release>>,
    expected_sizes: HashMap<String, u64>,
}

impl DownloadManager {
    /// Creates a manager and the receiving half of its event stream.
    ///
    /// `settings` should already be validated; naming templates, concurrency
    /// limits, and the retry policy are all derived from it here.
    #[must_use]
    pub fn new(settings: Settings, tagger: Arc<dyn Tagger>) -> (Self, EventReceiver) {
        Self::with_client(settings, tagger, HttpClient::new())
    }

    /// Creates a manager with an explicit HTTP client.
    #[must_use]
    pub fn with_client(
        settings: Settings,
        tagger: Arc<dyn Tagger>,
        client: HttpClient,
    ) -> (Self, EventReceiver) {
        let (events, receiver) = tokio::sync::mpsc::unbounded_channel();
        let naming = settings.naming();
        let retry_policy = settings.retry_policy();
        let manager = Self {
            client,
            settings,
            naming,
            retry_policy,
            cancel: CancellationToken::new(),
            progress: Arc::new(ProgressState::new()),
            events,
            tagger,
            releases: Vec::new(),
            expected_sizes: HashMap::new(),
        };
        (manager, receiver)
    }

    /// Signals cancellation. Idempotent; in-flight transfers may still finish.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Returns the run's cancellation token, for wiring to Ctrl-C handling.
    #[must_use]
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Returns a point-in-time copy of the progress counters.
    #[must_use]
    pub fn progress(&self) -> ProgressSnapshot {
        self.progress.snapshot()
    }

    /// Returns the shared progress counters, for polling from a UI task.
    #[must_use]
    pub fn progress_state(&self) -> Arc<ProgressState> {
        Arc::clone(&self.progress)
    }

    /// Returns the resolved releases. Empty before `initialize`.
    #[must_use]
    pub fn releases(&self) -> &[Arc<Release>] {
        &self.releases
    }

    /// One-line summaries of the resolved releases, for display.
    #[must_use]
    pub fn release_summaries(&self) -> Vec<String> {
        self.releases.iter().map(|r| r.display_name()).collect()
    }

    /// Resolves every input URL into a release and precomputes expected
    /// transfer totals.
    ///
    /// Artist root URLs are expanded into their discography's leaf URLs;
    /// leaf URLs are expanded too when the discography setting is on.
    /// Per-URL failures are reported as events and skipped.
    ///
    /// # Errors
    ///
    /// Returns [`ManagerError::Cancelled`] when cancellation fires during
    /// resolution. Per-URL scrape and fetch errors never fail the call.
    #[instrument(skip(self, inputs), fields(input_count = inputs.len()))]
    pub async fn initialize(&mut self, inputs: &[String]) -> Result<(), ManagerError> {
        let leaf_urls = self.resolve_inputs(inputs).await?;
        info!(release_count = leaf_urls.len(), "resolved release URLs");

        for url in leaf_urls {
            let page = match self.checked(self.client.get_text(&url)).await? {
                Ok(page) => page,
                Err(e) => {
                    self.emit(ProgressEvent::error(format!("failed to fetch {url}: {e}")));
                    continue;
                }
            };
            match scrape::extract_catalog(&page, &self.naming) {
                Ok(release) => {
                    self.emit(ProgressEvent::verbose(format!(
                        "found {}",
                        release.display_name()
                    )));
                    self.releases.push(Arc::new(release));
                }
                Err(e) => {
                    self.emit(ProgressEvent::error(format!("failed to parse {url}: {e}")));
                }
            }
        }

        self.probe_expected_totals().await?;
        Ok(())
    }

    /// Runs all transfers for the resolved releases.
    ///
    /// Must be called after [`initialize`](Self::initialize). Returns `Ok`
    /// even when individual files or releases failed; those are reported
    /// through the event stream.
    ///
    /// # Errors
    ///
    /// Returns [`ManagerError::Cancelled`] when the run was cancelled.
    #[instrument(skip(self), fields(release_count = self.releases.len()))]
    pub async fn start_downloads(&self) -> Result<(), ManagerError> {
        let outer = Arc::new(Semaphore::new(self.settings.max_concurrent_releases));
        let inner_width = self.settings.max_concurrent_transfers;
        let ctx = self.task_ctx();

        let mut handles = Vec::new();
        for release in &self.releases {
            if self.cancel.is_cancelled() {
                break;
            }
            let permit = tokio::select! {
                () = self.cancel.cancelled() => break,
                permit = Arc::clone(&outer).acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => break,
                },
            };

            let ctx = ctx.clone();
            let release = Arc::clone(release);
            handles.push(tokio::spawn(async move {
                let _permit = permit;
                download_release(ctx, release, inner_width).await;
            }));
        }

        for handle in handles {
            if let Err(e) = handle.await {
                warn!(error = %e, "release task panicked");
            }
        }

        if self.cancel.is_cancelled() {
            self.emit(ProgressEvent::warning("run cancelled".to_string()));
            return Err(ManagerError::Cancelled);
        }

        let snap = self.progress.snapshot();
        info!(
            files_completed = snap.files_completed,
            files_expected = snap.files_expected,
            bytes_received = snap.bytes_received,
            "downloads finished"
        );
        Ok(())
    }

    /// Expands the inputs into deduplicated leaf release URLs, first-seen
    /// order preserved.
    async fn resolve_inputs(&self, inputs: &[String]) -> Result<Vec<String>, ManagerError> {
        let mut seen = HashSet::new();
        let mut leaf_urls = Vec::new();

        for input in inputs {
            let expand = match scrape::classify_url(input) {
                UrlKind::ArtistRoot => true,
                UrlKind::Leaf => self.settings.download_artist_discography,
            };

            if !expand {
                if seen.insert(input.clone()) {
                    leaf_urls.push(input.clone());
                }
                continue;
            }

            match self.expand_discography(input).await? {
                Ok(urls) => {
                    for url in urls {
                        if seen.insert(url.clone()) {
                            leaf_urls.push(url);
                        }
                    }
                }
                Err(e) => {
                    self.emit(ProgressEvent::error(format!(
                        "failed to resolve discography for {input}: {e}"
                    )));
                }
            }
        }

        Ok(leaf_urls)
    }

    /// Fetches the artist's listing page and resolves it into absolute leaf
    /// URLs.
    async fn expand_discography(
        &self,
        input: &str,
    ) -> Result<Result<Vec<String>, DiscographyError>, ManagerError> {
        let Ok(mut listing_url) = Url::parse(input) else {
            return Ok(Err(DiscographyError::BadUrl));
        };
        listing_url.set_path("/music");
        listing_url.set_query(None);
        listing_url.set_fragment(None);

        debug!(listing = %listing_url, "expanding discography");
        let page = match self.checked(self.client.get_text(listing_url.as_str())).await? {
            Ok(page) => page,
            Err(e) => return Ok(Err(DiscographyError::Fetch(e.to_string()))),
        };

        match scrape::resolve_leaf_urls(&page) {
            Ok(urls) => {
                let absolute = urls
                    .into_iter()
                    .map(|href| {
                        listing_url
                            .join(&href)
                            .map_or(href, |joined| joined.to_string())
                    })
                    .collect();
                Ok(Ok(absolute))
            }
            Err(e) => Ok(Err(DiscographyError::Resolve(e))),
        }
    }

    /// Best-effort expected totals: one file per asset, bytes from HEAD
    /// probes. A failed probe omits its byte contribution. Artwork counts
    /// only when a consumer (folder copy or tag embedding) is enabled.
    async fn probe_expected_totals(&mut self) -> Result<(), ManagerError> {
        let wants_artwork = self.settings.save_cover_art_in_folder
            || self.settings.save_cover_art_in_tags;
        let mut asset_urls = Vec::new();
        for release in &self.releases {
            for track in &release.tracks {
                self.progress.add_expected_file();
                asset_urls.push(track.audio_url.clone());
            }
            if wants_artwork && let Some(artwork_url) = &release.artwork_url {
                self.progress.add_expected_file();
                asset_urls.push(artwork_url.clone());
            }
        }

        for url in asset_urls {
            match self.checked(self.client.get_size(&url)).await? {
                Ok(size) => {
                    self.progress.add_expected_bytes(size);
                    self.expected_sizes.insert(url, size);
                }
                Err(e) => {
                    debug!(url = %url, error = %e, "size probe failed");
                }
            }
        }
        Ok(())
    }

    /// Races `fut` against cancellation.
    async fn checked<T>(&self, fut: impl Future<Output = T>) -> Result<T, ManagerError> {
        if self.cancel.is_cancelled() {
            return Err(ManagerError::Cancelled);
        }
        tokio::select! {
            () = self.cancel.cancelled() => Err(ManagerError::Cancelled),
            value = fut => Ok(value),
        }
    }

    fn task_ctx(&self) -> TaskCtx {
        TaskCtx {
            client: self.client.clone(),
            retry_policy: self.retry_policy.clone(),
            cancel: self.cancel.clone(),
            progress: Arc::clone(&self.progress),
            events: self.events.clone(),
            tagger: Arc::clone(&self.tagger),
            size_tolerance: self.settings.allowed_file_size_difference,
            modify_tags: self.settings.modify_tags,
            save_cover_in_folder: self.settings.save_cover_art_in_folder,
            save_cover_in_tags: self.settings.save_cover_art_in_tags,
            expected_sizes: Arc::new(self.expected_sizes.clone()),
        }
    }

    fn emit(&self, event: ProgressEvent) {
        // A dropped receiver just means nobody is listening.
        let _ = self.events.send(event);
    }

    /// Expected size recorded for `url` during initialization, if any.
    #[must_use]
    pub fn expected_size(&self, url: &str) -> Option<u64> {
        self.expected_sizes.get(url).copied()
    }
}

/// Why a discography expansion failed. Internal; rendered into events.
enum DiscographyError {
    BadUrl,
    Fetch(String),
    Resolve(ScrapeError),
}

impl std::fmt::Display for DiscographyError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BadUrl => write!(f, "not a valid URL"),
            Self::Fetch(e) => write!(f, "listing fetch failed: {e}"),
            Self::Resolve(e) => write!(f, "{e}"),
        }
    }
}

/// Downloads every asset of one release through an inner bounded pool.
#[instrument(skip(ctx, release), fields(release = %release.display_name()))]
async fn download_release(ctx: TaskCtx, release: Arc<Release>, inner_width: usize) {
    emit(&ctx, ProgressEvent::info(format!("downloading {}", release.display_name())));

    if let Err(e) = tokio::fs::create_dir_all(&release.dir).await {
        emit(
            &ctx,
            ProgressEvent::error(format!(
                "cannot create {}: {e}",
                release.dir.display()
            )),
        );
        return;
    }

    let inner = Arc::new(Semaphore::new(inner_width));
    let fetch_artwork = release.has_artwork() && ctx.wants_artwork();
    let (artwork_tx, artwork_rx) = watch::channel(if fetch_artwork {
        ArtworkStatus::Pending
    } else {
        ArtworkStatus::Unavailable
    });

    let mut handles = Vec::new();

    if fetch_artwork {
        let ctx = ctx.clone();
        let release = Arc::clone(&release);
        let inner = Arc::clone(&inner);
        handles.push(tokio::spawn(async move {
            let Ok(permit) = Arc::clone(&inner).acquire_owned().await else {
                let _ = artwork_tx.send(ArtworkStatus::Unavailable);
                return false;
            };
            let done = download_artwork(&ctx, &release).await;
            drop(permit);
            let _ = artwork_tx.send(match &done {
                Some(bytes) => ArtworkStatus::Ready(Arc::clone(bytes)),
                None => ArtworkStatus::Unavailable,
            });
            done.is_some()
        }));
    }

    for track_index in 0..release.tracks.len() {
        let ctx = ctx.clone();
        let release = Arc::clone(&release);
        let inner = Arc::clone(&inner);
        let artwork_rx = artwork_rx.clone();
        handles.push(tokio::spawn(async move {
            download_track(ctx, release, track_index, inner, artwork_rx).await
        }));
    }

    let mut succeeded = 0usize;
    let total = handles.len();
    for handle in handles {
        match handle.await {
            Ok(true) => succeeded += 1,
            Ok(false) => {}
            Err(e) => warn!(error = %e, "transfer task panicked"),
        }
    }

    if ctx.cancel.is_cancelled() {
        return;
    }
    if succeeded == total {
        emit(
            &ctx,
            ProgressEvent::success(format!("finished {}", release.display_name())),
        );
    } else {
        emit(
            &ctx,
            ProgressEvent::warning(format!(
                "finished {} with {} of {total} assets failed",
                release.display_name(),
                total - succeeded
            )),
        );
    }
}

/// Fetches the release artwork, optionally saving it into the release folder.
/// Returns the bytes on success.
async fn download_artwork(ctx: &TaskCtx, release: &Release) -> Option<Arc<Vec<u8>>> {
    let url = release.artwork_url.as_deref()?;

    let fetched = retry_with_backoff(&ctx.retry_policy, &ctx.cancel, || {
        ctx.client.get_bytes(url)
    })
    .await;

    let bytes = match fetched {
        Ok(bytes) => Arc::new(bytes),
        Err(RetryError::Cancelled) => return None,
        Err(RetryError::Exhausted { error, attempts }) => {
            emit(
                ctx,
                ProgressEvent::error(format!(
                    "artwork for {} failed after {attempts} attempts: {error}",
                    release.title
                )),
            );
            return None;
        }
    };

    ctx.progress.add_received(bytes.len() as u64);

    if ctx.save_cover_in_folder
        && let Some(path) = &release.artwork_path
        && let Err(e) = tokio::fs::write(path, bytes.as_slice()).await
    {
        emit(
            ctx,
            ProgressEvent::warning(format!("cannot save artwork {}: {e}", path.display())),
        );
    }

    ctx.progress.add_completed_file();
    emit(
        ctx,
        ProgressEvent::verbose(format!("fetched artwork for {}", release.title)),
    );
    Some(bytes)
}

/// Transfers one track, then tags it once artwork state is known.
///
/// The transfer permit is dropped before waiting on the artwork channel so
/// track tasks never hold pool capacity while blocked on the artwork task.
async fn download_track(
    ctx: TaskCtx,
    release: Arc<Release>,
    track_index: usize,
    inner: Arc<Semaphore>,
    mut artwork_rx: watch::Receiver<ArtworkStatus>,
) -> bool {
    let track = &release.tracks[track_index];
    let job = TransferJob {
        url: track.audio_url.clone(),
        dest: track.path.clone(),
        expected_size: ctx.expected_sizes.get(&track.audio_url).copied(),
    };

    let Ok(permit) = Arc::clone(&inner).acquire_owned().await else {
        return false;
    };
    let outcome = transfer_file(&ctx, &job, &track.file_name()).await;
    drop(permit);

    match outcome {
        TransferOutcome::Completed | TransferOutcome::Skipped => {}
        TransferOutcome::Failed | TransferOutcome::Cancelled => return false,
    }

    if !ctx.modify_tags {
        return true;
    }

    // Permit already released; a 1-wide pool can make progress while we wait.
    // Artwork goes into tags only when the embed flag asks for it.
    let artwork = if ctx.save_cover_in_tags {
        wait_for_artwork(&mut artwork_rx, &ctx.cancel).await
    } else {
        None
    };
    let artwork_bytes = artwork.as_deref().map(Vec::as_slice);
    if let Err(e) = ctx
        .tagger
        .apply_metadata(&track.path, &release, track, artwork_bytes)
        .await
    {
        emit(&ctx, ProgressEvent::warning(e.to_string()));
    }
    true
}

/// Waits until the artwork channel leaves `Pending`, or cancellation fires.
async fn wait_for_artwork(
    rx: &mut watch::Receiver<ArtworkStatus>,
    cancel: &CancellationToken,
) -> Option<Arc<Vec<u8>>> {
    loop {
        match &*rx.borrow() {
            ArtworkStatus::Ready(bytes) => return Some(Arc::clone(bytes)),
            ArtworkStatus::Unavailable => return None,
            ArtworkStatus::Pending => {}
        }
        tokio::select! {
            () = cancel.cancelled() => return None,
            changed = rx.changed() => {
                if changed.is_err() {
                    return None;
                }
            }
        }
    }
}

/// Runs one transfer: skip-by-size check, then retrying streamed download.
async fn transfer_file(ctx: &TaskCtx, job: &TransferJob, label: &str) -> TransferOutcome {
    if ctx.cancel.is_cancelled() {
        return TransferOutcome::Cancelled;
    }

    if should_skip(ctx, job).await {
        emit(
            ctx,
            ProgressEvent::verbose(format!("skipping {label}, already downloaded")),
        );
        ctx.progress.add_completed_file();
        return TransferOutcome::Skipped;
    }

    let result = retry_with_backoff(&ctx.retry_policy, &ctx.cancel, || {
        let progress = Arc::clone(&ctx.progress);
        ctx.client
            .download_to_file(&job.url, &job.dest, move |n| progress.add_received(n))
    })
    .await;

    match result {
        Ok(bytes) => {
            ctx.progress.add_completed_file();
            emit(
                ctx,
                ProgressEvent::verbose(format!("downloaded {label} ({bytes} bytes)")),
            );
            TransferOutcome::Completed
        }
        Err(RetryError::Cancelled) => TransferOutcome::Cancelled,
        Err(RetryError::Exhausted { error, attempts }) => {
            emit(
                ctx,
                ProgressEvent::error(format!(
                    "{label} failed after {attempts} attempts: {error}"
                )),
            );
            TransferOutcome::Failed
        }
    }
}

/// True when the destination already exists and its size is within the
/// configured tolerance of the remote size.
async fn should_skip(ctx: &TaskCtx, job: &TransferJob) -> bool {
    let Ok(metadata) = tokio::fs::metadata(&job.dest).await else {
        return false;
    };
    let local = metadata.len();

    let remote = match job.expected_size {
        Some(size) => size,
        None => match ctx.client.get_size(&job.url).await {
            Ok(size) => size,
            Err(e) => {
                debug!(url = %job.url, error = %e, "skip probe failed, re-downloading");
                return false;
            }
        },
    };
    if remote == 0 {
        return false;
    }

    #[allow(clippy::cast_precision_loss)]
    let difference = (local as f64 - remote as f64).abs() / remote as f64;
    difference <= ctx.size_tolerance
}

fn emit(ctx: &TaskCtx, event: ProgressEvent) {
    let _ = ctx.events.send(event);
}
