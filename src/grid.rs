use crate::error::{Result, RipError};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TileCoordinate {
    pub col: u32,
    pub row: u32,
}

impl TileCoordinate {
    pub fn new(col: u32, row: u32) -> Self {
        Self { col, row }
    }
}

/// Full-tile grid over an image. Trailing pixels that do not fill a whole
/// tile are left uncovered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TileGrid {
    pub tile_size: u32,
    pub x_tiles: u32,
    pub y_tiles: u32,
    pub num_tiles: u64,
    pub dropped_width: u32,
    pub dropped_height: u32,
}

impl TileGrid {
    /// Floor division on each axis. `tile_size` must be non-zero.
    pub fn plan(width: u32, height: u32, tile_size: u32) -> Self {
        let x_tiles = width / tile_size;
        let y_tiles = height / tile_size;
        TileGrid {
            tile_size,
            x_tiles,
            y_tiles,
            num_tiles: x_tiles as u64 * y_tiles as u64,
            dropped_width: width % tile_size,
            dropped_height: height % tile_size,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.num_tiles == 0
    }

    /// Row-major slot for a coordinate, used to index per-tile state.
    pub fn index_of(&self, coord: TileCoordinate) -> usize {
        coord.row as usize * self.x_tiles as usize + coord.col as usize
    }

    pub fn contains(&self, coord: TileCoordinate) -> bool {
        coord.col < self.x_tiles && coord.row < self.y_tiles
    }

    /// Dispatch order: column-major, each coordinate exactly once.
    pub fn coordinates(&self) -> impl Iterator<Item = TileCoordinate> + '_ {
        (0..self.x_tiles)
            .flat_map(move |col| (0..self.y_tiles).map(move |row| TileCoordinate::new(col, row)))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageJob {
    pub image: String,
    pub base_url: String,
    pub width: u32,
    pub height: u32,
    pub tile_size: u32,
    pub zoom_level: u32,
}

impl ImageJob {
    pub fn new(
        image: &str,
        base_url: &str,
        width: u32,
        height: u32,
        tile_size: u32,
        zoom_level: u32,
    ) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(RipError::Parse(format!(
                "{image} reports an empty image ({width}x{height})"
            )));
        }
        if tile_size == 0 {
            return Err(RipError::Config("tile size must be > 0".into()));
        }
        Ok(Self {
            image: image.to_string(),
            base_url: base_url.to_string(),
            width,
            height,
            tile_size,
            zoom_level,
        })
    }

    pub fn grid(&self) -> TileGrid {
        TileGrid::plan(self.width, self.height, self.tile_size)
    }

    pub fn tile_url(&self, coord: TileCoordinate) -> String {
        let t = self.tile_size as u64;
        format!(
            "{}{}.svs?{}+{}+{}+{}+{}",
            self.base_url,
            self.image,
            coord.col as u64 * t,
            coord.row as u64 * t,
            t,
            t,
            self.zoom_level
        )
    }
}
