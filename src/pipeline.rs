use crate::{
    config::Config,
    download::{DownloadSummary, TileDownloader},
    error::{Result, RipError},
    fetch::{HttpClient, MetadataFetcher},
    grid::{ImageJob, TileGrid},
    layout::OutputLayout,
    preview::PreviewAssembler,
    report::JobReport,
    util::now_rfc3339,
};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, error, info, warn};

pub struct Ripper<C: HttpClient> {
    cfg: Config,
    client: C,
    metadata: MetadataFetcher,
    out_root: PathBuf,
}

pub struct JobOutput {
    pub layout: OutputLayout,
    pub report: JobReport,
}

impl<C: HttpClient> Ripper<C> {
    pub fn new(cfg: &Config, client: C) -> Result<Self> {
        cfg.validate()?;
        Ok(Self {
            cfg: cfg.clone(),
            metadata: MetadataFetcher::new(cfg)?,
            out_root: PathBuf::from(&cfg.paths.out_dir),
            client,
        })
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    pub fn layout_for(&self, image: &str) -> OutputLayout {
        let preview = self
            .cfg
            .preview
            .enabled
            .then_some(self.cfg.preview.filename.as_str());
        OutputLayout::new(&self.out_root, image, preview)
    }

    /// Fetch metadata and plan the grid without touching the filesystem.
    pub fn plan(&self, image: &str) -> Result<(ImageJob, TileGrid)> {
        let (width, height) = self.metadata.fetch(&self.client, image)?;
        let job = ImageJob::new(
            image,
            self.metadata.base_url(),
            width,
            height,
            self.cfg.source.tile_size,
            self.cfg.source.zoom_level,
        )?;
        let grid = job.grid();
        Ok((job, grid))
    }

    /// Rip every image in turn. A failed image is logged and does not stop
    /// the rest.
    pub fn rip_all(&self, images: &[String]) -> Vec<(String, Result<JobOutput>)> {
        images
            .iter()
            .map(|image| {
                let res = self.rip(image);
                if let Err(err) = &res {
                    error!("ripping {image} failed: {err}");
                }
                (image.clone(), res)
            })
            .collect()
    }

    pub fn rip(&self, image: &str) -> Result<JobOutput> {
        let layout = self.layout_for(image);
        if layout.exists() {
            return Err(RipError::OutputExists(layout.root().to_path_buf()));
        }

        let started = now_rfc3339();
        let clock = Instant::now();
        let (job, grid) = self.plan(image)?;

        info!("ripping {image}.svs");
        info!("image size {} x {}", job.width, job.height);
        info!(
            "tiles {} x {} = {}",
            grid.x_tiles, grid.y_tiles, grid.num_tiles
        );
        if grid.dropped_width > 0 || grid.dropped_height > 0 {
            debug!(
                "trailing pixels not covered by a full tile: {} x {}",
                grid.dropped_width, grid.dropped_height
            );
        }

        layout.create()?;

        let summary = match self.acquire(&job, &grid, &layout) {
            Ok(summary) => summary,
            Err(cause) => {
                layout.remove();
                return Err(RipError::JobAborted {
                    image: image.to_string(),
                    source: Box::new(cause),
                });
            }
        };

        let report = JobReport {
            image: job.image.clone(),
            width: job.width,
            height: job.height,
            tile_size: job.tile_size,
            zoom_level: job.zoom_level,
            grid,
            download: summary,
            preview: layout.preview_path().map(|p| p.display().to_string()),
            started,
            finished: now_rfc3339(),
            elapsed_ms: clock.elapsed().as_millis() as u64,
        };

        if self.cfg.output.write_report_json {
            let path = layout.root().join(&self.cfg.output.report_filename);
            if let Err(cause) = write_report(&path, &report) {
                layout.remove();
                return Err(RipError::JobAborted {
                    image: image.to_string(),
                    source: Box::new(cause),
                });
            }
        }

        info!(
            "{image} done: {} tiles, {} bytes in {}ms",
            summary.tiles, summary.bytes, report.elapsed_ms
        );
        Ok(JobOutput { layout, report })
    }

    fn acquire(
        &self,
        job: &ImageJob,
        grid: &TileGrid,
        layout: &OutputLayout,
    ) -> Result<DownloadSummary> {
        let downloader =
            TileDownloader::new(&self.client, job, layout, self.cfg.limits.concurrency);

        let Some(preview_path) = layout.preview_path() else {
            return downloader.run(grid, Vec::new());
        };

        let assembler = PreviewAssembler::new(self.cfg.preview.scale, self.cfg.preview.jpeg_quality);
        let mut canvas = assembler.canvas(job, *grid);
        if canvas.is_empty() {
            warn!("{}: nothing to preview, skipping preview image", job.image);
            return downloader.run(grid, Vec::new());
        }

        let summary = downloader
            .with_preview(&assembler)
            .run(grid, canvas.split_regions())?;
        info!("writing preview image");
        assembler.finish(canvas, preview_path)?;
        Ok(summary)
    }
}

fn write_report(path: &Path, report: &JobReport) -> Result<()> {
    let raw = serde_json::to_string_pretty(report)
        .map_err(|e| RipError::filesystem(path, std::io::Error::other(e)))?;
    std::fs::write(path, raw).map_err(|e| RipError::filesystem(path, e))
}
