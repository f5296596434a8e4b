pub mod jobs;
pub mod orchestrator;

use serde::{Deserialize, Serialize};

use crate::foundation::error::{TonecraftError, TonecraftResult};

/// Encoded output format for rendered images.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Jpeg,
    Png,
}

impl OutputFormat {
    pub fn extension(self) -> &'static str {
        match self {
            Self::Jpeg => "jpg",
            Self::Png => "png",
        }
    }
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "jpg" | "jpeg" => Ok(Self::Jpeg),
            "png" => Ok(Self::Png),
            other => Err(format!("unknown output format '{other}'")),
        }
    }
}

/// Output sizing and encoding options. Part of the cache key.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OutputOpts {
    /// Resize to this width (aspect preserved); `None` keeps the
    /// source size.
    pub width: Option<u32>,
    /// JPEG quality 1..=100. Ignored for PNG.
    pub quality: u8,
    pub format: OutputFormat,
}

impl Default for OutputOpts {
    fn default() -> Self {
        Self {
            width: None,
            quality: 92,
            format: OutputFormat::Jpeg,
        }
    }
}

impl OutputOpts {
    pub fn validate(&self) -> TonecraftResult<()> {
        if self.quality == 0 || self.quality > 100 {
            return Err(TonecraftError::validation(
                "output quality must be in 1..=100",
            ));
        }
        if self.width == Some(0) {
            return Err(TonecraftError::validation("output width must be non-zero"));
        }
        Ok(())
    }
}
