//! Downsampled, annotated composite of all tiles.
//!
//! The canvas is split into one [`TileRegion`] per tile before any worker
//! starts. Each region holds mutable row slices over its own rectangle only,
//! so concurrent tile workers cannot touch each other's pixels.
//!
//! Region edges use ceiling division: tile column `c` owns canvas columns
//! `ceil(c * T / S) .. ceil((c + 1) * T / S)`, clipped to the canvas. That
//! makes tile `(px * S / T, py * S / T)` the owner of pixel `(px, py)`.

use crate::error::{Result, RipError};
use crate::grid::{ImageJob, TileCoordinate, TileGrid};
use font8x8::{BASIC_FONTS, UnicodeFonts};
use image::codecs::jpeg::JpegEncoder;
use image::imageops::{self, FilterType};
use image::{DynamicImage, Rgb, RgbImage};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::debug;

const CHANNELS: usize = 3;
const BLACK: Rgb<u8> = Rgb([0, 0, 0]);
const GLYPH_SIZE: u32 = 8;
const LABEL_INSET: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    pub fn contains(&self, px: u32, py: u32) -> bool {
        px >= self.x && px < self.x + self.width && py >= self.y && py < self.y + self.height
    }
}

#[derive(Debug, Clone, Copy)]
pub struct PreviewGeometry {
    grid: TileGrid,
    scale: u32,
    width: u32,
    height: u32,
}

impl PreviewGeometry {
    pub fn new(image_width: u32, image_height: u32, grid: TileGrid, scale: u32) -> Self {
        let scale = scale.max(1);
        Self {
            grid,
            scale,
            width: image_width / scale,
            height: image_height / scale,
        }
    }

    pub fn canvas_size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn column_start(&self, col: u32) -> u32 {
        self.edge(col, self.width)
    }

    pub fn row_start(&self, row: u32) -> u32 {
        self.edge(row, self.height)
    }

    fn edge(&self, index: u32, limit: u32) -> u32 {
        let px = (index as u64 * self.grid.tile_size as u64).div_ceil(self.scale as u64);
        px.min(limit as u64) as u32
    }

    pub fn region(&self, coord: TileCoordinate) -> Rect {
        let x = self.column_start(coord.col);
        let y = self.row_start(coord.row);
        Rect {
            x,
            y,
            width: self.column_start(coord.col + 1) - x,
            height: self.row_start(coord.row + 1) - y,
        }
    }

    /// Tile owning a canvas pixel, or `None` past the last full tile.
    pub fn owner(&self, px: u32, py: u32) -> Option<TileCoordinate> {
        if px >= self.width || py >= self.height {
            return None;
        }
        let scale = self.scale as u64;
        let tile = self.grid.tile_size as u64;
        let col = px as u64 * scale / tile;
        let row = py as u64 * scale / tile;
        let coord = TileCoordinate::new(u32::try_from(col).ok()?, u32::try_from(row).ok()?);
        self.grid.contains(coord).then_some(coord)
    }
}

pub struct PreviewCanvas {
    geometry: PreviewGeometry,
    image: RgbImage,
}

impl PreviewCanvas {
    pub fn new(geometry: PreviewGeometry) -> Self {
        let (w, h) = geometry.canvas_size();
        Self {
            geometry,
            image: RgbImage::new(w, h),
        }
    }

    pub fn geometry(&self) -> &PreviewGeometry {
        &self.geometry
    }

    pub fn image(&self) -> &RgbImage {
        &self.image
    }

    pub fn is_empty(&self) -> bool {
        self.image.width() == 0 || self.image.height() == 0 || self.geometry.grid.is_empty()
    }

    /// One region per tile, in row-major order (see [`TileGrid::index_of`]).
    pub fn split_regions(&mut self) -> Vec<TileRegion<'_>> {
        let geometry = self.geometry;
        let grid = geometry.grid;
        let mut regions: Vec<TileRegion<'_>> = (0..grid.y_tiles)
            .flat_map(|row| (0..grid.x_tiles).map(move |col| TileCoordinate::new(col, row)))
            .map(|coord| TileRegion {
                coord,
                rect: geometry.region(coord),
                rows: Vec::new(),
            })
            .collect();

        let stride = self.image.width() as usize * CHANNELS;
        if stride == 0 || regions.is_empty() {
            return regions;
        }

        let x_tiles = grid.x_tiles as usize;
        let col_edges: Vec<usize> = (0..=grid.x_tiles)
            .map(|c| geometry.column_start(c) as usize * CHANNELS)
            .collect();
        let row_edges: Vec<u32> = (0..=grid.y_tiles).map(|r| geometry.row_start(r)).collect();

        for (py, line) in self.image.chunks_exact_mut(stride).enumerate() {
            let py = py as u32;
            let Some(tile_row) = row_edges.windows(2).position(|e| e[0] <= py && py < e[1]) else {
                continue;
            };
            let (mut rest, _) = line.split_at_mut(col_edges[x_tiles]);
            for col in 0..x_tiles {
                let (segment, tail) =
                    std::mem::take(&mut rest).split_at_mut(col_edges[col + 1] - col_edges[col]);
                rest = tail;
                regions[tile_row * x_tiles + col].rows.push(segment);
            }
        }
        regions
    }

    /// 1px black line at every tile column and row start, across the whole
    /// canvas.
    pub fn draw_grid(&mut self) {
        let (w, h) = self.geometry.canvas_size();
        let grid = self.geometry.grid;
        for col in 0..grid.x_tiles {
            let x = self.geometry.column_start(col);
            if x < w {
                for y in 0..h {
                    self.image.put_pixel(x, y, BLACK);
                }
            }
        }
        for row in 0..grid.y_tiles {
            let y = self.geometry.row_start(row);
            if y < h {
                for x in 0..w {
                    self.image.put_pixel(x, y, BLACK);
                }
            }
        }
    }

    pub fn write_jpeg(&self, path: &Path, quality: u8) -> Result<()> {
        let file = File::create(path).map_err(|e| RipError::filesystem(path, e))?;
        let mut out = BufWriter::new(file);
        JpegEncoder::new_with_quality(&mut out, quality)
            .encode_image(&self.image)
            .map_err(|e| RipError::Image(format!("encoding {}: {e}", path.display())))?;
        out.flush().map_err(|e| RipError::filesystem(path, e))
    }
}

/// Exclusive view over one tile's rectangle of the canvas.
pub struct TileRegion<'a> {
    coord: TileCoordinate,
    rect: Rect,
    rows: Vec<&'a mut [u8]>,
}

impl TileRegion<'_> {
    pub fn coord(&self) -> TileCoordinate {
        self.coord
    }

    /// Position and size on the canvas.
    pub fn rect(&self) -> Rect {
        self.rect
    }

    /// Region-local write. Returns false when `(x, y)` falls outside.
    pub fn put_pixel(&mut self, x: u32, y: u32, px: Rgb<u8>) -> bool {
        let Some(line) = self.rows.get_mut(y as usize) else {
            return false;
        };
        let i = x as usize * CHANNELS;
        match line.get_mut(i..i + CHANNELS) {
            Some(dst) => {
                dst.copy_from_slice(&px.0);
                true
            }
            None => false,
        }
    }

    /// Resample `tile` to exactly this region and copy it in.
    pub fn draw_tile(&mut self, tile: &DynamicImage) {
        let (w, h) = (self.rect.width, self.rect.height);
        if w == 0 || h == 0 {
            return;
        }
        let scaled = imageops::resize(&tile.to_rgb8(), w, h, FilterType::CatmullRom);
        for (line, src) in self.rows.iter_mut().zip(scaled.chunks_exact(w as usize * CHANNELS)) {
            line.copy_from_slice(src);
        }
    }

    /// Black 8x8 glyphs from the top-left corner, clipped to the region.
    pub fn draw_label(&mut self, text: &str) {
        let mut x0 = LABEL_INSET;
        for ch in text.chars() {
            if let Some(glyph) = BASIC_FONTS.get(ch).or_else(|| BASIC_FONTS.get('?')) {
                for (gy, &bits) in glyph.iter().enumerate() {
                    for gx in 0..GLYPH_SIZE {
                        if (bits >> gx) & 1 == 1 {
                            self.put_pixel(x0 + gx, LABEL_INSET + gy as u32, BLACK);
                        }
                    }
                }
            }
            x0 += GLYPH_SIZE;
        }
    }
}

/// Builds the preview: one canvas per job, fed by tile workers, then
/// finished with grid lines and encoded.
#[derive(Debug, Clone)]
pub struct PreviewAssembler {
    scale: u32,
    quality: u8,
}

impl PreviewAssembler {
    pub fn new(scale: u32, quality: u8) -> Self {
        Self {
            scale: scale.max(1),
            quality: quality.clamp(1, 100),
        }
    }

    pub fn canvas(&self, job: &ImageJob, grid: TileGrid) -> PreviewCanvas {
        PreviewCanvas::new(PreviewGeometry::new(job.width, job.height, grid, self.scale))
    }

    /// Decode a persisted tile, draw it into its region and label it.
    pub fn contribute(&self, region: &mut TileRegion<'_>, tile_path: &Path, label: &str) -> Result<()> {
        let tile = image::open(tile_path)
            .map_err(|e| RipError::Image(format!("decoding {}: {e}", tile_path.display())))?;
        region.draw_tile(&tile);
        region.draw_label(label);
        Ok(())
    }

    pub fn finish(&self, mut canvas: PreviewCanvas, path: &Path) -> Result<()> {
        canvas.draw_grid();
        let (w, h) = canvas.geometry().canvas_size();
        debug!("writing {w}x{h} preview to {}", path.display());
        canvas.write_jpeg(path, self.quality)
    }
}
