use std::fs;
use std::thread;
use std::time::{Duration, Instant};

use camino::Utf8PathBuf;
use serde::Serialize;

use crate::config::ResolvedConfig;
use crate::domain::{DatasetSpecifier, JobStatus};
use crate::error::FetchError;
use crate::fs_util::{self, ArchiveKind};
use crate::kaggle::{ArchiveInfo, KaggleClient};
use crate::progress::{self, TransferCounter};
use crate::store::Store;

#[derive(Debug, Clone)]
pub struct FetchOptions {
    pub keep_archive: bool,
    pub dry_run: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct FetchResult {
    pub items: Vec<FetchItemResult>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FetchItemResult {
    pub dataset_type: String,
    pub id: String,
    pub action: String,
    pub status: JobStatus,
    pub destination: String,
    pub archive_path: Option<String>,
}

/// One fetch invocation, alive for the duration of the call only.
#[derive(Debug, Clone)]
pub struct DownloadJob {
    pub specifier: DatasetSpecifier,
    pub destination: Utf8PathBuf,
    pub archive_path: Utf8PathBuf,
    pub status: JobStatus,
}

#[derive(Debug, Clone)]
pub struct ProgressEvent {
    pub message: String,
    pub bytes: Option<u64>,
    pub total_bytes: Option<u64>,
    pub elapsed: Option<Duration>,
}

impl ProgressEvent {
    pub fn phase(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            bytes: None,
            total_bytes: None,
            elapsed: None,
        }
    }

    pub fn transfer(bytes: u64, total_bytes: Option<u64>, elapsed: Duration) -> Self {
        Self {
            message: "transfer".to_string(),
            bytes: Some(bytes),
            total_bytes,
            elapsed: Some(elapsed),
        }
    }
}

/// Sinks are shared with the watcher thread, hence the `Sync` bound.
pub trait ProgressSink: Sync {
    fn event(&self, event: ProgressEvent);
}

#[derive(Clone)]
pub struct App<C: KaggleClient> {
    store: Store,
    client: C,
}

impl<C: KaggleClient> App<C> {
    pub fn new(store: Store, client: C) -> Self {
        Self { store, client }
    }

    pub fn fetch(
        &self,
        specifier: Option<DatasetSpecifier>,
        config: Option<&ResolvedConfig>,
        options: FetchOptions,
        sink: &dyn ProgressSink,
    ) -> Result<FetchResult, FetchError> {
        let mut items = Vec::new();

        if let Some(spec) = specifier {
            items.push(self.fetch_single(spec, None, options.clone(), sink)?);
        } else if let Some(config) = config {
            for request in &config.datasets {
                items.push(self.fetch_single(
                    request.specifier.clone(),
                    request.destination.clone(),
                    options.clone(),
                    sink,
                )?);
            }
        }

        Ok(FetchResult { items })
    }

    pub fn fetch_single(
        &self,
        specifier: DatasetSpecifier,
        destination_override: Option<Utf8PathBuf>,
        options: FetchOptions,
        sink: &dyn ProgressSink,
    ) -> Result<FetchItemResult, FetchError> {
        let destination =
            destination_override.unwrap_or_else(|| self.store.destination_for(&specifier));
        sink.event(ProgressEvent::phase(format!(
            "phase=Resolve; {} {}",
            specifier.dataset_type(),
            specifier.id()
        )));

        if options.dry_run {
            return Ok(FetchItemResult {
                dataset_type: specifier.dataset_type().to_string(),
                id: specifier.id(),
                action: "dry-run".to_string(),
                status: JobStatus::Pending,
                destination: destination.to_string(),
                archive_path: None,
            });
        }

        let mut job = DownloadJob {
            specifier,
            destination,
            archive_path: Utf8PathBuf::new(),
            status: JobStatus::Pending,
        };

        match self.run_job(&mut job, &options, sink) {
            Ok(kept_archive) => {
                job.status = JobStatus::Done;
                sink.event(ProgressEvent::phase("phase=Done; dataset ready"));
                Ok(FetchItemResult {
                    dataset_type: job.specifier.dataset_type().to_string(),
                    id: job.specifier.id(),
                    action: "download".to_string(),
                    status: job.status,
                    destination: job.destination.to_string(),
                    archive_path: kept_archive.map(|path| path.to_string()),
                })
            }
            Err(err) => {
                job.status = JobStatus::Failed;
                sink.event(ProgressEvent::phase(format!("phase=Failed; {err}")));
                Err(err)
            }
        }
    }

    fn run_job(
        &self,
        job: &mut DownloadJob,
        options: &FetchOptions,
        sink: &dyn ProgressSink,
    ) -> Result<Option<Utf8PathBuf>, FetchError> {
        let staging = self.store.staging()?;
        let archive_path =
            Utf8PathBuf::from_path_buf(staging.path().join(job.specifier.archive_name()))
                .map_err(|_| FetchError::Filesystem("non-utf8 staging path".to_string()))?;
        job.archive_path = archive_path.clone();

        job.status = JobStatus::Downloading;
        sink.event(ProgressEvent::phase("phase=Download; requesting archive"));
        let counter = TransferCounter::new();
        let start = Instant::now();
        let info = thread::scope(|scope| {
            let watcher = scope
                .spawn(|| progress::watch_transfer(&counter, sink, progress::DEFAULT_TICK));
            let result =
                self.client
                    .download_archive(&job.specifier, archive_path.as_std_path(), &counter);
            counter.finish();
            let _ = watcher.join();
            result
        })?;
        sink.event(ProgressEvent::phase(format!(
            "download.response bytes={} latency_ms={}",
            counter.bytes(),
            start.elapsed().as_millis()
        )));
        if !archive_path.as_std_path().exists() {
            return Err(FetchError::Filesystem(format!(
                "download produced no file at {archive_path}"
            )));
        }

        job.status = JobStatus::Extracting;
        sink.event(ProgressEvent::phase("phase=Extract; validating archive"));
        let kind = fs_util::sniff_archive_kind(archive_path.as_std_path())?;
        if info.is_zip && kind != ArchiveKind::Zip {
            tracing::debug!("content-type said zip but the payload is not");
        }
        let extract_dir = staging.path().join("extract");
        fs::create_dir_all(&extract_dir).map_err(|err| FetchError::Filesystem(err.to_string()))?;
        match kind {
            ArchiveKind::Zip => {
                fs_util::validate_zip(archive_path.as_std_path())?;
                fs_util::extract_zip(archive_path.as_std_path(), &extract_dir)?;
            }
            ArchiveKind::Gzip => {
                let output_name = gzip_member_name(&info, &job.specifier);
                fs_util::extract_gzip(archive_path.as_std_path(), &extract_dir, &output_name)?;
            }
        }

        sink.event(ProgressEvent::phase("phase=Store; writing files"));
        self.store.swap_into_place(&extract_dir, &job.destination)?;

        if options.keep_archive {
            let name = info
                .file_name
                .clone()
                .unwrap_or_else(|| job.specifier.archive_name());
            let kept = self
                .store
                .persist_archive(job.archive_path.as_std_path(), &name)?;
            return Ok(Some(kept));
        }
        Ok(None)
    }
}

fn gzip_member_name(info: &ArchiveInfo, specifier: &DatasetSpecifier) -> String {
    let source = info
        .file_name
        .clone()
        .unwrap_or_else(|| specifier.archive_name());
    let base = source.strip_suffix(".zip").unwrap_or(&source);
    fs_util::gzip_output_name(base)
}
