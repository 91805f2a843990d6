use crate::{download::DownloadSummary, grid::TileGrid};
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct JobReport {
    pub image: String,
    pub width: u32,
    pub height: u32,
    pub tile_size: u32,
    pub zoom_level: u32,
    pub grid: TileGrid,
    pub download: DownloadSummary,
    pub preview: Option<String>,
    pub started: String,
    pub finished: String,
    pub elapsed_ms: u64,
}

/// One line of the end-of-run summary.
#[derive(Debug, Clone, Serialize)]
pub struct ImageOutcome {
    pub image: String,
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub out_dir: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}
