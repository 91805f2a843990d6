#![allow(dead_code)]

use image::codecs::jpeg::JpegEncoder;
use image::{Rgb, RgbImage};
use slide_ripper::{Result, RipError, config::Config, fetch::HttpClient};
use std::collections::HashMap;
use std::io::{Cursor, Read};
use std::path::Path;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

pub const BASE: &str = "http://slides.test/BoxA/";
pub const TILE_COLOR: Rgb<u8> = Rgb([200, 10, 10]);

pub fn jpeg_tile(size: u32, color: Rgb<u8>) -> Vec<u8> {
    let img = RgbImage::from_pixel(size, size, color);
    let mut buf = Vec::new();
    JpegEncoder::new_with_quality(&mut buf, 95)
        .encode_image(&img)
        .unwrap();
    buf
}

pub fn viewer_page(width: u32, height: u32) -> String {
    format!(
        "<html><script>\nvar slide = {{\n  height: \"{height}\",\n  width: \"{width}\",\n  tileSize: \"256\"\n}};\n</script></html>"
    )
}

/// In-process stand-in for the slide server.
pub struct FakeServer {
    pages: HashMap<String, String>,
    tile: Vec<u8>,
    failing: Mutex<Vec<String>>,
    delay: Duration,
    pub metadata_calls: AtomicUsize,
    pub tile_calls: AtomicUsize,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

impl FakeServer {
    pub fn new() -> Self {
        Self {
            pages: HashMap::new(),
            tile: jpeg_tile(64, TILE_COLOR),
            failing: Mutex::new(Vec::new()),
            delay: Duration::ZERO,
            metadata_calls: AtomicUsize::new(0),
            tile_calls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        }
    }

    pub fn with_image(mut self, image: &str, width: u32, height: u32) -> Self {
        self.pages.insert(image.to_string(), viewer_page(width, height));
        self
    }

    pub fn with_page(mut self, image: &str, page: &str) -> Self {
        self.pages.insert(image.to_string(), page.to_string());
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Every tile answers 200 with `body` instead of a JPEG.
    pub fn with_tile_body(mut self, body: &[u8]) -> Self {
        self.tile = body.to_vec();
        self
    }

    /// Any tile URL ending in `suffix` answers with a server error.
    pub fn failing_tile(self, suffix: &str) -> Self {
        self.failing.lock().unwrap().push(suffix.to_string());
        self
    }

    pub fn metadata_calls(&self) -> usize {
        self.metadata_calls.load(Ordering::SeqCst)
    }

    pub fn tile_calls(&self) -> usize {
        self.tile_calls.load(Ordering::SeqCst)
    }

    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

impl HttpClient for FakeServer {
    fn get_text(&self, url: &str) -> Result<String> {
        self.metadata_calls.fetch_add(1, Ordering::SeqCst);
        let image = url
            .strip_prefix(BASE)
            .and_then(|rest| rest.strip_suffix(".svs/view.apml"))
            .ok_or_else(|| RipError::network(url, "HTTP 404 Not Found"))?;
        self.pages
            .get(image)
            .cloned()
            .ok_or_else(|| RipError::network(url, "HTTP 404 Not Found"))
    }

    fn get_stream(&self, url: &str) -> Result<Box<dyn Read + Send>> {
        self.tile_calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        if !self.delay.is_zero() {
            std::thread::sleep(self.delay);
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.failing.lock().unwrap().iter().any(|s| url.ends_with(s)) {
            return Err(RipError::network(url, "HTTP 500 Internal Server Error"));
        }
        Ok(Box::new(Cursor::new(self.tile.clone())))
    }
}

pub fn test_config(out: &Path, preview: bool, tile_size: u32, concurrency: usize) -> Config {
    let mut cfg = Config::default();
    cfg.source.base_url = BASE.into();
    cfg.source.tile_size = tile_size;
    cfg.paths.out_dir = out.display().to_string();
    cfg.preview.enabled = preview;
    cfg.limits.concurrency = concurrency;
    cfg
}

pub fn file_names(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}
