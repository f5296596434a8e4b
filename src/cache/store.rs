//! Content-addressed render cache.
//!
//! Layout: a flat directory of `<key_hex>.<format>` files. Writes go
//! through a temp path and a rename so concurrent renders of the same
//! key can never leave a torn entry; the losing writer simply
//! overwrites with identical content.

use std::{
    path::{Path, PathBuf},
    time::{Duration, SystemTime},
};

use anyhow::Context as _;
use sha2::{Digest as _, Sha256};

use crate::foundation::error::{TonecraftError, TonecraftResult};
use crate::params::model::{AdjustmentParams, GradingZone, HslBand, PrimaryShift};
use crate::render::{OutputFormat, OutputOpts};

/// Bump when the key layout changes; keeps stale entries from being
/// served across incompatible versions.
const KEY_SCHEMA: &str = "tonecraft-cache-v1";

/// Normalized identity of a source image.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ImageIdentity {
    /// A file on disk: canonical path plus length and mtime, so a
    /// replaced file invalidates its entries without hashing content.
    File {
        path: String,
        len: u64,
        mtime_nanos: u128,
    },
    /// In-memory bytes: identified by content digest.
    Content { digest: [u8; 32] },
}

impl ImageIdentity {
    pub fn for_path(path: &Path) -> TonecraftResult<Self> {
        let canonical = path
            .canonicalize()
            .map_err(|e| TonecraftError::input(format!("cannot resolve '{}': {e}", path.display())))?;
        let meta = std::fs::metadata(&canonical)
            .map_err(|e| TonecraftError::input(format!("cannot stat '{}': {e}", path.display())))?;
        let mtime_nanos = meta
            .modified()
            .ok()
            .and_then(|t| t.duration_since(SystemTime::UNIX_EPOCH).ok())
            .map(|d| d.as_nanos())
            .unwrap_or(0);
        Ok(Self::File {
            path: canonical.to_string_lossy().into_owned(),
            len: meta.len(),
            mtime_nanos,
        })
    }

    pub fn for_bytes(bytes: &[u8]) -> Self {
        Self::Content {
            digest: Sha256::digest(bytes).into(),
        }
    }
}

/// Deterministic digest over the full set of render inputs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct RenderCacheKey([u8; 32]);

impl RenderCacheKey {
    /// Key computation walks every field in a fixed order; it can
    /// never depend on map or JSON field ordering.
    pub fn compute(
        identity: &ImageIdentity,
        params: &AdjustmentParams,
        opts: &OutputOpts,
    ) -> Self {
        let mut w = KeyWriter::new();
        w.write_str(KEY_SCHEMA);

        match identity {
            ImageIdentity::File {
                path,
                len,
                mtime_nanos,
            } => {
                w.write_u8(0);
                w.write_str(path);
                w.write_u64(*len);
                w.write_u64((*mtime_nanos >> 64) as u64);
                w.write_u64(*mtime_nanos as u64);
            }
            ImageIdentity::Content { digest } => {
                w.write_u8(1);
                w.write_bytes(digest);
            }
        }

        hash_params(&mut w, params);

        match opts.width {
            Some(width) => {
                w.write_u8(1);
                w.write_u64(u64::from(width));
            }
            None => w.write_u8(0),
        }
        w.write_u8(opts.quality);
        w.write_u8(match opts.format {
            OutputFormat::Jpeg => 0,
            OutputFormat::Png => 1,
        });

        Self(w.finish())
    }

    pub fn hex(&self) -> String {
        let mut out = String::with_capacity(64);
        for b in self.0 {
            let _ = std::fmt::Write::write_fmt(&mut out, format_args!("{b:02x}"));
        }
        out
    }
}

fn hash_params(w: &mut KeyWriter, params: &AdjustmentParams) {
    let b = &params.basic;
    for v in [
        b.exposure,
        b.contrast,
        b.highlights,
        b.shadows,
        b.whites,
        b.blacks,
        b.texture,
        b.clarity,
        b.dehaze,
        b.vibrance,
        b.saturation,
    ] {
        w.write_f32(v);
    }

    w.write_f32(params.white_balance.temperature);
    w.write_f32(params.white_balance.tint);

    for band in params.hsl.bands() {
        hash_band(w, band);
    }

    hash_zone(w, &params.color_grading.shadows);
    hash_zone(w, &params.color_grading.midtones);
    hash_zone(w, &params.color_grading.highlights);
    w.write_f32(params.color_grading.balance);

    hash_primary(w, &params.calibration.red_primary);
    hash_primary(w, &params.calibration.green_primary);
    hash_primary(w, &params.calibration.blue_primary);
    w.write_f32(params.calibration.shadows_tint);
}

fn hash_band(w: &mut KeyWriter, band: &HslBand) {
    w.write_f32(band.hue);
    w.write_f32(band.saturation);
    w.write_f32(band.luminance);
}

fn hash_zone(w: &mut KeyWriter, zone: &GradingZone) {
    w.write_f32(zone.hue);
    w.write_f32(zone.saturation);
    w.write_f32(zone.luminance);
}

fn hash_primary(w: &mut KeyWriter, primary: &PrimaryShift) {
    w.write_f32(primary.hue);
    w.write_f32(primary.saturation);
}

struct KeyWriter(Sha256);

impl KeyWriter {
    fn new() -> Self {
        Self(Sha256::new())
    }

    fn write_bytes(&mut self, bytes: &[u8]) {
        self.0.update(bytes);
    }

    fn write_u8(&mut self, v: u8) {
        self.write_bytes(&[v]);
    }

    fn write_u64(&mut self, v: u64) {
        self.write_bytes(&v.to_le_bytes());
    }

    fn write_f32(&mut self, v: f32) {
        self.write_bytes(&v.to_bits().to_le_bytes());
    }

    fn write_str(&mut self, s: &str) {
        self.write_u64(s.len() as u64);
        self.write_bytes(s.as_bytes());
    }

    fn finish(self) -> [u8; 32] {
        self.0.finalize().into()
    }
}

/// Owns the cache directory. All reads and writes go through here.
pub struct CacheManager {
    dir: PathBuf,
}

impl CacheManager {
    pub fn new(dir: impl Into<PathBuf>) -> TonecraftResult<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("failed to create cache directory '{}'", dir.display()))?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn entry_path(&self, key: &RenderCacheKey, format: OutputFormat) -> PathBuf {
        self.dir
            .join(format!("{}.{}", key.hex(), format.extension()))
    }

    pub fn lookup(&self, key: &RenderCacheKey, format: OutputFormat) -> Option<PathBuf> {
        let path = self.entry_path(key, format);
        path.is_file().then_some(path)
    }

    /// Atomic store: write to a temp path in the same directory, then
    /// rename into place.
    pub fn store(
        &self,
        key: &RenderCacheKey,
        format: OutputFormat,
        bytes: &[u8],
    ) -> TonecraftResult<PathBuf> {
        let dest = self.entry_path(key, format);
        let tmp = self.temp_path(key);
        std::fs::write(&tmp, bytes)
            .map_err(|e| TonecraftError::cache(format!("write '{}': {e}", tmp.display())))?;
        std::fs::rename(&tmp, &dest).map_err(|e| {
            let _ = std::fs::remove_file(&tmp);
            TonecraftError::cache(format!("rename into '{}': {e}", dest.display()))
        })?;
        Ok(dest)
    }

    /// Store an already-rendered file (the external renderer writes to
    /// its own scratch path first).
    pub fn store_file(
        &self,
        key: &RenderCacheKey,
        format: OutputFormat,
        src: &Path,
    ) -> TonecraftResult<PathBuf> {
        let dest = self.entry_path(key, format);
        let tmp = self.temp_path(key);
        std::fs::copy(src, &tmp).map_err(|e| {
            TonecraftError::cache(format!("copy '{}' into cache: {e}", src.display()))
        })?;
        std::fs::rename(&tmp, &dest).map_err(|e| {
            let _ = std::fs::remove_file(&tmp);
            TonecraftError::cache(format!("rename into '{}': {e}", dest.display()))
        })?;
        Ok(dest)
    }

    /// Delete entries strictly older than `max_age`. Returns the number
    /// of files removed. Entries mid-write live under a temp name with
    /// a fresh mtime, so a sweep can run concurrently with renders.
    pub fn evict(&self, max_age: Duration) -> TonecraftResult<usize> {
        let cutoff = SystemTime::now()
            .checked_sub(max_age)
            .unwrap_or(SystemTime::UNIX_EPOCH);
        let entries = std::fs::read_dir(&self.dir)
            .map_err(|e| TonecraftError::cache(format!("read cache dir: {e}")))?;

        let mut removed = 0usize;
        for entry in entries {
            let Ok(entry) = entry else { continue };
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            let Ok(meta) = entry.metadata() else { continue };
            let Ok(mtime) = meta.modified() else { continue };
            if mtime < cutoff && std::fs::remove_file(&path).is_ok() {
                tracing::debug!(path = %path.display(), "evicted cache entry");
                removed += 1;
            }
        }
        Ok(removed)
    }

    fn temp_path(&self, key: &RenderCacheKey) -> PathBuf {
        let nanos = SystemTime::now()
            .duration_since(SystemTime::UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or(0);
        self.dir.join(format!(
            ".tmp-{}-{}-{nanos}",
            &key.hex()[..16],
            std::process::id()
        ))
    }
}
