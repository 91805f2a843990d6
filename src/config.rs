use crate::error::RipError;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub global: Global,
    #[serde(default)]
    pub source: Source,
    #[serde(default)]
    pub metadata: Metadata,
    #[serde(default)]
    pub limits: Limits,
    #[serde(default)]
    pub http: Http,
    #[serde(default)]
    pub paths: Paths,
    #[serde(default)]
    pub preview: Preview,
    #[serde(default)]
    pub output: Output,
    #[serde(default)]
    pub logging: Logging,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading config: {}", path.display()))?;
        let cfg: Config = toml::from_str(&raw).with_context(|| "parsing TOML")?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> std::result::Result<(), RipError> {
        if self.source.base_url.trim().is_empty() {
            return Err(RipError::Config("source.base_url is empty".into()));
        }
        if self.source.tile_size == 0 {
            return Err(RipError::Config("source.tile_size must be > 0".into()));
        }
        if self.limits.concurrency == 0 {
            return Err(RipError::Config("limits.concurrency must be > 0".into()));
        }
        if self.preview.scale == 0 {
            return Err(RipError::Config("preview.scale must be > 0".into()));
        }
        if !(1..=100).contains(&self.preview.jpeg_quality) {
            return Err(RipError::Config(format!(
                "preview.jpeg_quality must be within 1..=100, got {}",
                self.preview.jpeg_quality
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Global {
    pub print_summary: bool,
}
impl Default for Global {
    fn default() -> Self {
        Self {
            print_summary: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Source {
    pub base_url: String,
    pub tile_size: u32,
    pub zoom_level: u32,
}
impl Default for Source {
    fn default() -> Self {
        Self {
            base_url: "http://image.upmc.edu:8080/NikiForov%20EFV%20Study/BoxA/".into(),
            tile_size: 512,
            zoom_level: 1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Metadata {
    pub height_pattern: String,
    pub width_pattern: String,
}
impl Default for Metadata {
    fn default() -> Self {
        Self {
            height_pattern: r#"height: "(\d+)""#.into(),
            width_pattern: r#"width: "(\d+)""#.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Limits {
    pub concurrency: usize,
}
impl Default for Limits {
    fn default() -> Self {
        Self { concurrency: 10 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Http {
    /// 0 disables the request timeout.
    pub timeout_seconds: u64,
    pub user_agent: String,
}
impl Default for Http {
    fn default() -> Self {
        Self {
            timeout_seconds: 0,
            user_agent: concat!("slide-ripper/", env!("CARGO_PKG_VERSION")).into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Paths {
    pub out_dir: String,
}
impl Default for Paths {
    fn default() -> Self {
        Self {
            out_dir: "output".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Preview {
    pub enabled: bool,
    pub scale: u32,
    pub jpeg_quality: u8,
    pub filename: String,
}
impl Default for Preview {
    fn default() -> Self {
        Self {
            enabled: true,
            scale: 4,
            jpeg_quality: 100,
            filename: "preview.jpeg".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Output {
    pub write_report_json: bool,
    pub report_filename: String,
}
impl Default for Output {
    fn default() -> Self {
        Self {
            write_report_json: false,
            report_filename: "report.json".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Logging {
    pub level: String,
    pub json: bool,
    pub write_to_file: bool,
    pub file_path: String,
}
impl Default for Logging {
    fn default() -> Self {
        Self {
            level: "info".into(),
            json: false,
            write_to_file: true,
            file_path: "".into(),
        }
    }
}
