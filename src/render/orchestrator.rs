//! The render orchestrator: the single entry point that wires the
//! cache, the external renderer and the fallback engine together.
//!
//! Flow: resolve input -> cache check -> external attempt -> engine
//! fallback -> cache store. Only a missing/unreadable input fails
//! without attempting a renderer; every adapter failure is absorbed
//! and logged, and the caller sees it only if the fallback engine
//! fails too.

use std::io::Cursor;
use std::path::{Path, PathBuf};

use crate::cache::store::{CacheManager, ImageIdentity, RenderCacheKey};
use crate::engine::{ColorEngine, PixelBuf};
use crate::foundation::error::{TonecraftError, TonecraftResult};
use crate::params::model::AdjustmentParams;
use crate::render::{OutputFormat, OutputOpts};
use crate::sidecar::container::ExternalRenderer;

/// Source image: a file on disk or in-memory bytes (an upload that
/// never touched the filesystem).
#[derive(Clone, Debug)]
pub enum ImageSource {
    Path(PathBuf),
    Bytes(Vec<u8>),
}

#[derive(Clone, Debug)]
pub struct RenderRequest {
    pub image: ImageSource,
    pub params: AdjustmentParams,
    pub use_cache: bool,
    pub output: OutputOpts,
}

/// What callers always get back: never a raw error, always this shape.
#[derive(Clone, Debug, serde::Serialize)]
pub struct RenderResult {
    pub success: bool,
    pub message: String,
    pub output_path: Option<PathBuf>,
}

impl RenderResult {
    fn ok(message: impl Into<String>, path: PathBuf) -> Self {
        Self {
            success: true,
            message: message.into(),
            output_path: Some(path),
        }
    }

    fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            output_path: None,
        }
    }
}

pub struct RenderOrchestrator {
    cache: CacheManager,
    engine: ColorEngine,
    external: Box<dyn ExternalRenderer>,
    work_dir: PathBuf,
}

impl RenderOrchestrator {
    /// Explicit dependency injection; lifecycle belongs to the caller,
    /// not to import-time side effects.
    pub fn new(
        cache: CacheManager,
        engine: ColorEngine,
        external: Box<dyn ExternalRenderer>,
        work_dir: impl Into<PathBuf>,
    ) -> TonecraftResult<Self> {
        let work_dir = work_dir.into();
        std::fs::create_dir_all(&work_dir).map_err(|e| {
            TonecraftError::validation(format!(
                "failed to create work directory '{}': {e}",
                work_dir.display()
            ))
        })?;
        Ok(Self {
            cache,
            engine,
            external,
            work_dir,
        })
    }

    pub fn cache(&self) -> &CacheManager {
        &self.cache
    }

    /// Render one image. Never panics and never surfaces an adapter
    /// failure: the result is a failure only when the input is
    /// unusable or both renderers fail.
    #[tracing::instrument(skip_all, fields(use_cache = req.use_cache))]
    pub fn render(&self, req: &RenderRequest) -> RenderResult {
        if let Err(e) = req.output.validate() {
            return RenderResult::failed(e.to_string());
        }

        let mut params = req.params.clone();
        params.sanitize();

        // Resolve the source to an absolute, existing path. The only
        // failure-terminal state that attempts neither renderer.
        let (source_path, identity, spooled) = match self.resolve_image(&req.image) {
            Ok(v) => v,
            Err(e) => return RenderResult::failed(e.to_string()),
        };
        let _spool_guard = spooled.as_deref().map(SpoolGuard);

        let key = RenderCacheKey::compute(&identity, &params, &req.output);

        if req.use_cache
            && let Some(hit) = self.cache.lookup(&key, req.output.format)
        {
            tracing::debug!(key = %key.hex(), "cache hit");
            return RenderResult::ok("from cache", hit);
        }

        if self.external.probe() {
            match self
                .external
                .render(&source_path, &params, &req.output, &self.work_dir)
            {
                Ok(scratch) => {
                    let path = self.cache_file(&key, req.output.format, &scratch);
                    return RenderResult::ok("rendered (external)", path);
                }
                Err(e) => {
                    tracing::warn!(error = %e, "external renderer failed, falling back");
                }
            }
        } else {
            tracing::debug!("external renderer unreachable, using fallback engine");
        }

        match self.engine_render(&source_path, &params, &req.output) {
            Ok(bytes) => {
                let path = self.cache_bytes(&key, req.output.format, &bytes);
                match path {
                    Ok(path) => RenderResult::ok("rendered (fallback)", path),
                    Err(result) => result,
                }
            }
            Err(e) => RenderResult::failed(format!("render failed: {e}")),
        }
    }

    fn resolve_image(
        &self,
        image: &ImageSource,
    ) -> TonecraftResult<(PathBuf, ImageIdentity, Option<PathBuf>)> {
        match image {
            ImageSource::Path(path) => {
                let identity = ImageIdentity::for_path(path)?;
                let resolved = path
                    .canonicalize()
                    .map_err(|e| TonecraftError::input(format!("cannot resolve '{}': {e}", path.display())))?;
                Ok((resolved, identity, None))
            }
            ImageSource::Bytes(bytes) => {
                if bytes.is_empty() {
                    return Err(TonecraftError::input("source image bytes are empty"));
                }
                let identity = ImageIdentity::for_bytes(bytes);
                let spool = self.work_dir.join(format!(
                    "tc-src-{}-{}.bin",
                    std::process::id(),
                    nanos_now()
                ));
                std::fs::write(&spool, bytes).map_err(|e| {
                    TonecraftError::input(format!("cannot spool source bytes: {e}"))
                })?;
                Ok((spool.clone(), identity, Some(spool)))
            }
        }
    }

    /// CPU fallback: decode, resize, run the color pipeline, encode.
    fn engine_render(
        &self,
        source: &Path,
        params: &AdjustmentParams,
        opts: &OutputOpts,
    ) -> TonecraftResult<Vec<u8>> {
        let decoded = image::ImageReader::open(source)
            .map_err(|e| TonecraftError::input(format!("cannot open '{}': {e}", source.display())))?
            .with_guessed_format()
            .map_err(|e| TonecraftError::input(format!("cannot probe '{}': {e}", source.display())))?
            .decode()
            .map_err(|e| {
                TonecraftError::input(format!("cannot decode '{}': {e}", source.display()))
            })?;

        let mut rgb = decoded.to_rgb8();
        if let Some(width) = opts.width
            && width < rgb.width()
        {
            let height =
                ((u64::from(rgb.height()) * u64::from(width)) / u64::from(rgb.width())).max(1);
            rgb = image::imageops::resize(
                &rgb,
                width,
                height as u32,
                image::imageops::FilterType::Lanczos3,
            );
        }

        let mut buf = PixelBuf::from_rgb8(&rgb);
        self.engine.apply(&mut buf, params)?;
        let out = buf.to_rgb8()?;

        let mut bytes = Vec::new();
        match opts.format {
            OutputFormat::Jpeg => {
                let mut encoder =
                    image::codecs::jpeg::JpegEncoder::new_with_quality(&mut bytes, opts.quality);
                encoder
                    .encode_image(&out)
                    .map_err(|e| TonecraftError::engine(format!("jpeg encode failed: {e}")))?;
            }
            OutputFormat::Png => {
                image::DynamicImage::ImageRgb8(out)
                    .write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)
                    .map_err(|e| TonecraftError::engine(format!("png encode failed: {e}")))?;
            }
        }
        Ok(bytes)
    }

    /// Move an external-renderer scratch file into the cache. A cache
    /// failure downgrades to the scratch path, never to a lost render.
    fn cache_file(&self, key: &RenderCacheKey, format: OutputFormat, scratch: &Path) -> PathBuf {
        match self.cache.store_file(key, format, scratch) {
            Ok(path) => {
                let _ = std::fs::remove_file(scratch);
                path
            }
            Err(e) => {
                tracing::warn!(error = %e, "cache store failed, serving scratch output");
                scratch.to_path_buf()
            }
        }
    }

    fn cache_bytes(
        &self,
        key: &RenderCacheKey,
        format: OutputFormat,
        bytes: &[u8],
    ) -> Result<PathBuf, RenderResult> {
        match self.cache.store(key, format, bytes) {
            Ok(path) => Ok(path),
            Err(e) => {
                tracing::warn!(error = %e, "cache store failed, writing to work directory");
                let fallback = self.work_dir.join(format!(
                    "tc-out-{}-{}.{}",
                    std::process::id(),
                    nanos_now(),
                    format.extension()
                ));
                std::fs::write(&fallback, bytes)
                    .map(|_| fallback)
                    .map_err(|e| {
                        RenderResult::failed(format!("cannot write rendered output: {e}"))
                    })
            }
        }
    }
}

struct SpoolGuard<'a>(&'a Path);

impl Drop for SpoolGuard<'_> {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(self.0);
    }
}

fn nanos_now() -> u128 {
    std::time::SystemTime::now()
        .duration_since(std::time::SystemTime::UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0)
}
