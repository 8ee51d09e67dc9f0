//! Export orchestration.
//!
//! [`Exporter`] runs one export at a time through the lifecycle in
//! [`ExportState`], reports progress to a [`Notifier`] and hands the finished
//! PDF to a [`DownloadSink`].

use crate::assembler::DocumentAssembler;
use crate::capture::{validate_scale, SnapshotCapturer, DEFAULT_SCALE};
use crate::error::{ExportError, ExportResult};
use crate::job::{ExportJob, ExportState};
use crate::links::project_links;
use crate::raster::Rasterizer;
use crate::surface::NodeHandle;
use crate::telemetry;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tempfile::NamedTempFile;
use tracing::{error, info, warn};

/// Display hint for the start notification; capture may be slow.
pub const START_NOTICE_TIMEOUT: Duration = Duration::from_secs(10);

const START_MESSAGE: &str = "Generating PDF...";
const SUCCESS_MESSAGE: &str = "PDF exported successfully!";
const FAILURE_MESSAGE: &str = "PDF export failed. Please try again.";

/// User-facing status surface. Calls are fire-and-forget.
#[cfg_attr(test, mockall::automock)]
pub trait Notifier: Send + Sync {
    fn info(&self, message: &str, timeout: Duration);
    fn success(&self, message: &str);
    fn error(&self, message: &str);
}

/// Notifier that only logs.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn info(&self, message: &str, timeout: Duration) {
        info!(timeout_ms = timeout.as_millis() as u64, "{}", message);
    }

    fn success(&self, message: &str) {
        info!("{}", message);
    }

    fn error(&self, message: &str) {
        error!("{}", message);
    }
}

/// Receives finished documents for the user to keep.
pub trait DownloadSink: Send + Sync {
    /// Stores `bytes` as `file_name` and returns where it ended up.
    fn save(&self, file_name: &str, bytes: &[u8]) -> ExportResult<PathBuf>;
}

/// Writes documents into a directory, atomically.
#[derive(Debug, Clone)]
pub struct DirectorySink {
    dir: PathBuf,
}

impl DirectorySink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl DownloadSink for DirectorySink {
    fn save(&self, file_name: &str, bytes: &[u8]) -> ExportResult<PathBuf> {
        std::fs::create_dir_all(&self.dir)?;
        let path = self.dir.join(file_name);

        // Written next to the target so the final rename never crosses filesystems.
        let mut temp = NamedTempFile::new_in(&self.dir)?;
        temp.write_all(bytes)?;
        temp.as_file().sync_all()?;
        temp.persist(&path).map_err(|e| ExportError::Persist {
            path: path.clone(),
            source: e.error,
        })?;

        info!("Saved {} ({} bytes)", path.display(), bytes.len());
        Ok(path)
    }
}

/// Clears the in-progress flag and returns to `Idle` however the export ends.
struct InFlight<'a> {
    busy: &'a AtomicBool,
    state: &'a Mutex<ExportState>,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        *self.state.lock().unwrap_or_else(|p| p.into_inner()) = ExportState::Idle;
        self.busy.store(false, Ordering::Release);
    }
}

/// Captures nodes and saves them as single-page PDFs, one at a time.
pub struct Exporter<R, N, S> {
    capturer: SnapshotCapturer<R>,
    assembler: DocumentAssembler,
    notifier: N,
    sink: S,
    scale: f32,
    busy: AtomicBool,
    state: Mutex<ExportState>,
}

impl<R, N, S> Exporter<R, N, S>
where
    R: Rasterizer,
    N: Notifier,
    S: DownloadSink,
{
    pub fn new(rasterizer: R, notifier: N, sink: S) -> Self {
        Self {
            capturer: SnapshotCapturer::new(rasterizer),
            assembler: DocumentAssembler::new(),
            notifier,
            sink,
            scale: DEFAULT_SCALE,
            busy: AtomicBool::new(false),
            state: Mutex::new(ExportState::Idle),
        }
    }

    /// Sets the raster scale multiplier.
    pub fn with_scale(mut self, scale: f32) -> ExportResult<Self> {
        validate_scale(scale).map_err(|_| ExportError::config(format!("invalid scale {}", scale)))?;
        self.scale = scale;
        Ok(self)
    }

    pub fn scale(&self) -> f32 {
        self.scale
    }

    pub fn state(&self) -> ExportState {
        *self.state.lock().unwrap_or_else(|p| p.into_inner())
    }

    /// The "in progress" flag.
    pub fn is_exporting(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    fn set_state(&self, state: ExportState) {
        *self.state.lock().unwrap_or_else(|p| p.into_inner()) = state;
    }

    fn begin(&self) -> ExportResult<InFlight<'_>> {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| ExportError::Busy)?;
        Ok(InFlight {
            busy: &self.busy,
            state: &self.state,
        })
    }

    /// Exports `node` as `<basename>.pdf`.
    ///
    /// Every outcome except [`ExportError::Busy`] is reported to the notifier;
    /// a rejected overlapping call leaves the running export untouched.
    pub async fn export(&self, node: &NodeHandle, basename: &str) -> ExportResult<ExportJob> {
        let _in_flight = match self.begin() {
            Ok(guard) => guard,
            Err(e) => {
                warn!("Export of '{}' rejected: another export is running", basename);
                return Err(e);
            }
        };

        let mut job = ExportJob::new(basename, self.scale);
        info!(job_id = %job.job_id, basename = %basename, "Starting export");
        self.notifier.info(START_MESSAGE, START_NOTICE_TIMEOUT);

        let result = self.run(&mut job, node).await;

        match &result {
            Ok(path) => {
                let links = job.link_count;
                job.mark_saved(path.display().to_string(), links);
                self.set_state(ExportState::Saved);
                self.notifier.success(SUCCESS_MESSAGE);
            }
            Err(e) => {
                error!(job_id = %job.job_id, "Error exporting PDF: {}", e);
                job.mark_failed(e.to_string());
                self.set_state(ExportState::Failed);
                self.notifier.error(FAILURE_MESSAGE);
            }
        }

        telemetry::record_export_telemetry(&job);
        result.map(|_| job)
    }

    async fn run(&self, job: &mut ExportJob, node: &NodeHandle) -> ExportResult<PathBuf> {
        // Links come from the live node as it is when the export starts.
        let regions = project_links(node, self.scale)?;

        job.start_capture();
        self.set_state(ExportState::Capturing);
        let image = self.capturer.capture(node, self.scale).await?;

        job.start_assembly(image.width, image.height);
        self.set_state(ExportState::Assembling);
        let document = self.assembler.assemble(&image, &regions)?;
        job.link_count = document.links.len();

        self.sink.save(&job.file_name(), &document.bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fragment::FragmentBuilder;
    use crate::geometry::{Point, Rect, Size};
    use crate::raster::{RasterImage, RasterSource};
    use crate::surface::Surface;
    use async_trait::async_trait;
    use mockall::predicate::eq;
    use resvg::tiny_skia::{Color, Pixmap};
    use std::sync::Arc;

    /// Paints a blank page of the requested size, optionally failing.
    struct BlankRasterizer {
        fail: bool,
        states_seen: Arc<Mutex<Vec<usize>>>,
        surface: Surface,
    }

    #[async_trait]
    impl Rasterizer for BlankRasterizer {
        async fn rasterize(&self, source: &RasterSource, scale: f32) -> ExportResult<RasterImage> {
            self.states_seen
                .lock()
                .unwrap()
                .push(self.surface.fixed_layer_count());
            tokio::time::sleep(Duration::from_millis(5)).await;
            if self.fail {
                return Err(ExportError::capture("cross-origin image without permissive headers"));
            }
            let (width, height) = source.size.scaled_pixels(scale);
            let mut pixmap = Pixmap::new(width, height).unwrap();
            pixmap.fill(Color::WHITE);
            Ok(RasterImage {
                width,
                height,
                png: pixmap.encode_png().unwrap(),
            })
        }
    }

    fn setup(fail: bool) -> (Surface, NodeHandle, BlankRasterizer) {
        let mut builder = FragmentBuilder::new(Size::new(300.0, 200.0));
        builder.link(Some("https://hotel.example"), Rect::new(10.0, 20.0, 100.0, 30.0), |_| {});
        let surface = Surface::new();
        let node = surface.mount(builder.build(), Point::new(0.0, 0.0));
        let rasterizer = BlankRasterizer {
            fail,
            states_seen: Arc::new(Mutex::new(Vec::new())),
            surface: surface.clone(),
        };
        (surface, node, rasterizer)
    }

    #[tokio::test]
    async fn test_successful_export_notifies_and_saves() {
        let (_surface, node, rasterizer) = setup(false);
        let dir = tempfile::tempdir().unwrap();

        let mut notifier = MockNotifier::new();
        notifier
            .expect_info()
            .with(eq(START_MESSAGE), eq(START_NOTICE_TIMEOUT))
            .times(1)
            .return_const(());
        notifier.expect_success().times(1).return_const(());
        notifier.expect_error().times(0);

        let exporter = Exporter::new(rasterizer, notifier, DirectorySink::new(dir.path()));
        let job = exporter.export(&node, "itinerary").await.unwrap();

        assert_eq!(job.status, ExportState::Saved);
        assert_eq!(job.link_count, 1);
        assert_eq!((job.pixel_width, job.pixel_height), (Some(600), Some(400)));
        assert!(dir.path().join("itinerary.pdf").exists());
        assert!(!exporter.is_exporting());
        assert_eq!(exporter.state(), ExportState::Idle);
    }

    #[tokio::test]
    async fn test_failed_capture_notifies_and_cleans_up() {
        let (surface, node, rasterizer) = setup(true);
        let seen = rasterizer.states_seen.clone();
        let dir = tempfile::tempdir().unwrap();

        let mut notifier = MockNotifier::new();
        notifier.expect_info().times(1).return_const(());
        notifier.expect_success().times(0);
        notifier
            .expect_error()
            .with(eq(FAILURE_MESSAGE))
            .times(1)
            .return_const(());

        let exporter = Exporter::new(rasterizer, notifier, DirectorySink::new(dir.path()));
        let result = exporter.export(&node, "itinerary").await;

        assert!(matches!(result, Err(ExportError::Capture { .. })));
        assert_eq!(*seen.lock().unwrap(), vec![1]);
        assert_eq!(surface.fixed_layer_count(), 0);
        assert!(!exporter.is_exporting());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    /// Returns a raster with no columns, which no page can be built from.
    struct EmptyRasterizer;

    #[async_trait]
    impl Rasterizer for EmptyRasterizer {
        async fn rasterize(&self, _source: &RasterSource, _scale: f32) -> ExportResult<RasterImage> {
            Ok(RasterImage {
                width: 0,
                height: 400,
                png: Vec::new(),
            })
        }
    }

    /// Refuses every save.
    struct FailingSink;

    impl DownloadSink for FailingSink {
        fn save(&self, file_name: &str, _bytes: &[u8]) -> ExportResult<PathBuf> {
            Err(ExportError::Io(std::io::Error::new(
                std::io::ErrorKind::PermissionDenied,
                format!("cannot write {}", file_name),
            )))
        }
    }

    fn failure_notifier() -> MockNotifier {
        let mut notifier = MockNotifier::new();
        notifier.expect_info().times(1).return_const(());
        notifier.expect_success().times(0);
        notifier
            .expect_error()
            .with(eq(FAILURE_MESSAGE))
            .times(1)
            .return_const(());
        notifier
    }

    #[tokio::test]
    async fn test_failed_assembly_notifies_and_cleans_up() {
        let (surface, node, _rasterizer) = setup(false);
        let dir = tempfile::tempdir().unwrap();

        let exporter = Exporter::new(EmptyRasterizer, failure_notifier(), DirectorySink::new(dir.path()));
        let result = exporter.export(&node, "itinerary").await;

        assert!(matches!(result, Err(ExportError::Assembly { .. })));
        assert_eq!(surface.fixed_layer_count(), 0);
        assert!(!exporter.is_exporting());
        assert_eq!(exporter.state(), ExportState::Idle);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_failed_save_notifies_and_cleans_up() {
        let (surface, node, rasterizer) = setup(false);
        let dir = tempfile::tempdir().unwrap();

        let exporter = Exporter::new(rasterizer, failure_notifier(), FailingSink);
        let result = exporter.export(&node, "itinerary").await;

        assert!(matches!(result, Err(ExportError::Io(_))));
        assert_eq!(surface.fixed_layer_count(), 0);
        assert!(!exporter.is_exporting());
        assert_eq!(exporter.state(), ExportState::Idle);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);

        // The guard is released, so a later export can run.
        assert!(exporter.begin().is_ok());
    }

    #[tokio::test]
    async fn test_overlapping_export_is_rejected() {
        let (_surface, node, rasterizer) = setup(false);
        let dir = tempfile::tempdir().unwrap();

        let mut notifier = MockNotifier::new();
        notifier.expect_info().times(1).return_const(());
        notifier.expect_success().times(1).return_const(());
        notifier.expect_error().times(0);

        let exporter = Exporter::new(rasterizer, notifier, DirectorySink::new(dir.path()));
        let (first, second) = tokio::join!(
            exporter.export(&node, "first"),
            exporter.export(&node, "second")
        );

        assert!(first.is_ok());
        assert!(matches!(second, Err(ExportError::Busy)));
        assert!(dir.path().join("first.pdf").exists());
        assert!(!dir.path().join("second.pdf").exists());
        assert!(!exporter.is_exporting());
    }

    #[tokio::test]
    async fn test_in_progress_flag_visible_while_capturing() {
        let (_surface, node, rasterizer) = setup(false);
        let dir = tempfile::tempdir().unwrap();
        let exporter = Exporter::new(rasterizer, TracingNotifier, DirectorySink::new(dir.path()));

        let observe = async {
            tokio::task::yield_now().await;
            (exporter.is_exporting(), exporter.state())
        };
        let (result, (busy, state)) = tokio::join!(exporter.export(&node, "itinerary"), observe);

        assert!(result.is_ok());
        assert!(busy);
        assert_eq!(state, ExportState::Capturing);
        assert!(!exporter.is_exporting());
    }

    #[tokio::test]
    async fn test_detached_node_fails_without_capture() {
        let (_surface, node, rasterizer) = setup(false);
        let seen = rasterizer.states_seen.clone();
        node.unmount();
        let dir = tempfile::tempdir().unwrap();

        let mut notifier = MockNotifier::new();
        notifier.expect_info().times(1).return_const(());
        notifier.expect_error().times(1).return_const(());

        let exporter = Exporter::new(rasterizer, notifier, DirectorySink::new(dir.path()));

        assert!(exporter.export(&node, "itinerary").await.is_err());
        assert!(seen.lock().unwrap().is_empty());
    }

    #[test]
    fn test_invalid_scale_rejected() {
        let (_surface, _node, rasterizer) = setup(false);
        let exporter = Exporter::new(rasterizer, TracingNotifier, DirectorySink::new("."));

        assert!(matches!(exporter.with_scale(-1.0), Err(ExportError::Config { .. })));
    }

    #[test]
    fn test_directory_sink_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let sink = DirectorySink::new(dir.path().join("nested"));

        sink.save("a.pdf", b"first").unwrap();
        let path = sink.save("a.pdf", b"second").unwrap();

        assert_eq!(std::fs::read(path).unwrap(), b"second");
        assert_eq!(std::fs::read_dir(sink.dir()).unwrap().count(), 1);
    }
}
