//! Bounded-concurrency tile fetch.
//!
//! A sequential dispatch loop takes a [`Limiter`] permit before starting each
//! tile on its own scoped thread. The first failing tile records its error
//! and raises the cancel flag: no further tiles are dispatched, workers that
//! have not started their fetch skip it, and the scope drains every
//! outstanding worker before the error is handed back.

use crate::error::{Result, RipError};
use crate::fetch::HttpClient;
use crate::grid::{ImageJob, TileCoordinate, TileGrid};
use crate::layout::OutputLayout;
use crate::limiter::Limiter;
use crate::preview::{PreviewAssembler, TileRegion};
use parking_lot::Mutex;
use serde::Serialize;
use std::fs::File;
use std::io::{BufWriter, ErrorKind, Read, Write};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread;
use tracing::{debug, info, warn};

const COPY_BUF_BYTES: usize = 64 * 1024;

#[derive(Debug, Default)]
struct CancelToken(AtomicBool);

impl CancelToken {
    fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Default)]
struct FirstError(Mutex<Option<RipError>>);

impl FirstError {
    /// Returns true if this was the first error recorded.
    fn record(&self, err: RipError) -> bool {
        let mut slot = self.0.lock();
        if slot.is_some() {
            debug!("dropping follow-up tile error: {err}");
            return false;
        }
        *slot = Some(err);
        true
    }

    fn into_inner(self) -> Option<RipError> {
        self.0.into_inner()
    }
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct DownloadSummary {
    pub tiles: u64,
    pub bytes: u64,
    pub peak_in_flight: usize,
}

pub struct TileDownloader<'a> {
    client: &'a dyn HttpClient,
    job: &'a ImageJob,
    layout: &'a OutputLayout,
    preview: Option<&'a PreviewAssembler>,
    limiter: Limiter,
}

impl<'a> TileDownloader<'a> {
    pub fn new(
        client: &'a dyn HttpClient,
        job: &'a ImageJob,
        layout: &'a OutputLayout,
        concurrency: usize,
    ) -> Self {
        Self {
            client,
            job,
            layout,
            preview: None,
            limiter: Limiter::new(concurrency),
        }
    }

    /// Feed every downloaded tile into the preview as well.
    pub fn with_preview(mut self, assembler: &'a PreviewAssembler) -> Self {
        self.preview = Some(assembler);
        self
    }

    /// Fetch every tile of `grid`. `regions` is either empty or holds one
    /// preview region per tile in row-major order.
    pub fn run(&self, grid: &TileGrid, regions: Vec<TileRegion<'_>>) -> Result<DownloadSummary> {
        let grid = *grid;
        let mut slots: Vec<Option<TileRegion<'_>>> = regions.into_iter().map(Some).collect();
        let cancel = CancelToken::default();
        let first_error = FirstError::default();
        let done = AtomicU64::new(0);
        let bytes = AtomicU64::new(0);
        let step = (grid.num_tiles / 10).max(1);

        thread::scope(|s| {
            for coord in grid.coordinates() {
                let permit = self.limiter.acquire();
                if cancel.is_cancelled() {
                    break;
                }
                let region = slots.get_mut(grid.index_of(coord)).and_then(Option::take);
                let (cancel, first_error, done, bytes) = (&cancel, &first_error, &done, &bytes);

                let spawned = thread::Builder::new()
                    .name(format!("tile-{}x{}", coord.col, coord.row))
                    .spawn_scoped(s, move || {
                        let _permit = permit;
                        if cancel.is_cancelled() {
                            return;
                        }
                        match self.fetch_tile(coord, region, cancel) {
                            Ok(n) => {
                                bytes.fetch_add(n, Ordering::Relaxed);
                                let finished = done.fetch_add(1, Ordering::Relaxed) + 1;
                                if finished % step == 0 || finished == grid.num_tiles {
                                    info!("{} tiles {finished}/{}", self.job.image, grid.num_tiles);
                                }
                            }
                            Err(err) => {
                                warn!(col = coord.col, row = coord.row, "tile failed: {err}");
                                first_error.record(err);
                                cancel.cancel();
                            }
                        }
                    });

                if let Err(e) = spawned {
                    first_error.record(RipError::Spawn(e));
                    cancel.cancel();
                    break;
                }
            }
        });

        if let Some(err) = first_error.into_inner() {
            return Err(err);
        }

        Ok(DownloadSummary {
            tiles: done.into_inner(),
            bytes: bytes.into_inner(),
            peak_in_flight: self.limiter.peak(),
        })
    }

    fn fetch_tile(
        &self,
        coord: TileCoordinate,
        region: Option<TileRegion<'_>>,
        cancel: &CancelToken,
    ) -> Result<u64> {
        let url = self.job.tile_url(coord);
        let path = self.layout.tile_path(coord);

        let mut body = self.client.get_stream(&url)?;
        let file = File::create(&path).map_err(|e| RipError::filesystem(&path, e))?;
        let mut out = BufWriter::new(file);
        let mut buf = vec![0u8; COPY_BUF_BYTES];
        let mut written = 0u64;
        loop {
            if cancel.is_cancelled() {
                debug!("tile {}x{} abandoned after {written} bytes", coord.col, coord.row);
                return Ok(written);
            }
            let n = match body.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(RipError::network(&url, format!("reading body: {e}"))),
            };
            out.write_all(&buf[..n])
                .map_err(|e| RipError::filesystem(&path, e))?;
            written += n as u64;
        }
        out.flush().map_err(|e| RipError::filesystem(&path, e))?;
        drop(out);
        debug!("tile {}x{} {written} bytes", coord.col, coord.row);

        if let (Some(mut region), Some(assembler)) = (region, self.preview) {
            if cancel.is_cancelled() {
                return Ok(written);
            }
            assembler.contribute(&mut region, &path, &OutputLayout::tile_file_name(coord))?;
        }
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    const LONG_BODY: u64 = 4 * 1024 * 1024;

    struct LongBody;

    impl HttpClient for LongBody {
        fn get_text(&self, url: &str) -> Result<String> {
            Err(RipError::network(url, "no pages here"))
        }

        fn get_stream(&self, _url: &str) -> Result<Box<dyn Read + Send>> {
            Ok(Box::new(io::repeat(0xAB).take(LONG_BODY)))
        }
    }

    fn downloader_parts(dir: &std::path::Path) -> (ImageJob, OutputLayout) {
        let job = ImageJob::new("A-01", "http://slides.test/", 512, 512, 256, 0).unwrap();
        let layout = OutputLayout::new(dir, "A-01", None);
        layout.create().unwrap();
        (job, layout)
    }

    #[test]
    fn cancelled_copy_stops_before_reading_the_body() {
        let tmp = tempfile::tempdir().unwrap();
        let (job, layout) = downloader_parts(tmp.path());
        let downloader = TileDownloader::new(&LongBody, &job, &layout, 1);

        let cancel = CancelToken::default();
        cancel.cancel();
        let written = downloader
            .fetch_tile(TileCoordinate::new(0, 0), None, &cancel)
            .unwrap();

        assert_eq!(written, 0);
        let on_disk = std::fs::metadata(layout.tile_path(TileCoordinate::new(0, 0))).unwrap();
        assert_eq!(on_disk.len(), 0);
    }

    #[test]
    fn uncancelled_copy_streams_the_whole_body() {
        let tmp = tempfile::tempdir().unwrap();
        let (job, layout) = downloader_parts(tmp.path());
        let downloader = TileDownloader::new(&LongBody, &job, &layout, 1);

        let written = downloader
            .fetch_tile(TileCoordinate::new(1, 0), None, &CancelToken::default())
            .unwrap();

        assert_eq!(written, LONG_BODY);
    }
}
