//! Orchestrator behavior: fallback selection, cache determinism and
//! the async job path — all with a fake external renderer, no
//! container runtime required.

use std::{
    path::{Path, PathBuf},
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use tonecraft::{
    AdjustmentParams, CacheManager, ColorEngine, ExternalRenderer, ImageSource, JobState,
    JobTracker, OutputFormat, OutputOpts, RenderOrchestrator, RenderRequest, TonecraftError,
    TonecraftResult,
};

fn temp_dir(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!(
        "tonecraft_{name}_{}_{}",
        std::process::id(),
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_nanos()
    ))
}

fn write_fixture_image(dir: &Path) -> PathBuf {
    std::fs::create_dir_all(dir).unwrap();
    let path = dir.join("fixture.png");
    let img = image::RgbImage::from_fn(12, 8, |x, y| {
        image::Rgb([(x * 20) as u8, (y * 30) as u8, 90])
    });
    img.save(&path).unwrap();
    path
}

/// Configurable stand-in for the containerized renderer.
struct FakeRenderer {
    reachable: bool,
    fail_render: bool,
    calls: Arc<AtomicUsize>,
}

impl FakeRenderer {
    fn offline() -> Self {
        Self {
            reachable: false,
            fail_render: false,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    fn broken() -> Self {
        Self {
            reachable: true,
            fail_render: true,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    fn working() -> Self {
        Self {
            reachable: true,
            fail_render: false,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    fn call_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.calls)
    }
}

impl ExternalRenderer for FakeRenderer {
    fn probe(&self) -> bool {
        self.reachable
    }

    fn render(
        &self,
        _image: &Path,
        _params: &AdjustmentParams,
        opts: &OutputOpts,
        out_dir: &Path,
    ) -> TonecraftResult<PathBuf> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_render {
            return Err(TonecraftError::adapter("simulated renderer crash"));
        }
        let out = out_dir.join(format!("fake-output.{}", opts.format.extension()));
        std::fs::write(&out, b"external-render-bytes")
            .map_err(|e| TonecraftError::adapter(format!("write fake output: {e}")))?;
        Ok(out)
    }
}

fn orchestrator_with(root: &Path, external: Box<dyn ExternalRenderer>) -> RenderOrchestrator {
    RenderOrchestrator::new(
        CacheManager::new(root.join("cache")).unwrap(),
        ColorEngine,
        external,
        root.join("work"),
    )
    .unwrap()
}

fn request(image: PathBuf, use_cache: bool) -> RenderRequest {
    RenderRequest {
        image: ImageSource::Path(image),
        params: AdjustmentParams::from_json(&serde_json::json!({
            "basic": { "exposure": "+0.5", "contrast": 20 }
        })),
        use_cache,
        output: OutputOpts {
            width: None,
            quality: 92,
            format: OutputFormat::Png,
        },
    }
}

#[test]
fn unreachable_external_falls_back_and_succeeds() {
    let root = temp_dir("fallback_unreachable");
    let image = write_fixture_image(&root);
    let orchestrator = orchestrator_with(&root, Box::new(FakeRenderer::offline()));

    let result = orchestrator.render(&request(image, true));
    assert!(result.success, "fallback must succeed: {}", result.message);
    assert_eq!(result.message, "rendered (fallback)");
    let path = result.output_path.unwrap();
    assert!(path.is_file());

    std::fs::remove_dir_all(&root).ok();
}

#[test]
fn broken_external_is_absorbed_into_fallback() {
    let root = temp_dir("fallback_broken");
    let image = write_fixture_image(&root);
    let external = FakeRenderer::broken();
    let calls = external.call_counter();
    let orchestrator = orchestrator_with(&root, Box::new(external));

    let result = orchestrator.render(&request(image, false));
    assert!(result.success);
    assert_eq!(result.message, "rendered (fallback)");
    // The adapter was attempted before falling back.
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    std::fs::remove_dir_all(&root).ok();
}

#[test]
fn working_external_is_preferred_over_the_engine() {
    let root = temp_dir("external_preferred");
    let image = write_fixture_image(&root);
    let external = FakeRenderer::working();
    let calls = external.call_counter();
    let orchestrator = orchestrator_with(&root, Box::new(external));

    let result = orchestrator.render(&request(image.clone(), true));
    assert!(result.success);
    assert_eq!(result.message, "rendered (external)");
    let path = result.output_path.unwrap();
    assert_eq!(std::fs::read(&path).unwrap(), b"external-render-bytes");
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    // The output was cached: a second call does not touch the adapter.
    let second = orchestrator.render(&request(image, true));
    assert_eq!(second.message, "from cache");
    assert_eq!(second.output_path.unwrap(), path);
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    std::fs::remove_dir_all(&root).ok();
}

#[test]
fn cache_hit_returns_identical_bytes_and_path() {
    let root = temp_dir("cache_determinism");
    let image = write_fixture_image(&root);
    let orchestrator = orchestrator_with(&root, Box::new(FakeRenderer::offline()));

    let first = orchestrator.render(&request(image.clone(), true));
    assert_eq!(first.message, "rendered (fallback)");
    let first_path = first.output_path.unwrap();
    let first_bytes = std::fs::read(&first_path).unwrap();

    let second = orchestrator.render(&request(image, true));
    assert_eq!(second.message, "from cache");
    let second_path = second.output_path.unwrap();

    assert_eq!(first_path, second_path);
    assert_eq!(first_bytes, std::fs::read(&second_path).unwrap());

    std::fs::remove_dir_all(&root).ok();
}

#[test]
fn no_cache_skips_lookup_but_still_stores() {
    let root = temp_dir("no_cache");
    let image = write_fixture_image(&root);
    let orchestrator = orchestrator_with(&root, Box::new(FakeRenderer::offline()));

    let first = orchestrator.render(&request(image.clone(), false));
    assert_eq!(first.message, "rendered (fallback)");

    // With caching re-enabled the earlier store is visible.
    let second = orchestrator.render(&request(image, true));
    assert_eq!(second.message, "from cache");

    std::fs::remove_dir_all(&root).ok();
}

#[test]
fn different_output_options_render_separately() {
    let root = temp_dir("options_keyed");
    let image = write_fixture_image(&root);
    let orchestrator = orchestrator_with(&root, Box::new(FakeRenderer::offline()));

    let mut req = request(image, true);
    let first = orchestrator.render(&req);
    assert_eq!(first.message, "rendered (fallback)");

    req.output.width = Some(6);
    let resized = orchestrator.render(&req);
    assert_eq!(resized.message, "rendered (fallback)");
    assert_ne!(first.output_path, resized.output_path);

    std::fs::remove_dir_all(&root).ok();
}

#[test]
fn undecodable_input_fails_both_paths_with_a_structured_result() {
    let root = temp_dir("undecodable");
    std::fs::create_dir_all(&root).unwrap();
    let bogus = root.join("not-an-image.png");
    std::fs::write(&bogus, b"definitely not pixels").unwrap();

    let orchestrator = orchestrator_with(&root, Box::new(FakeRenderer::offline()));
    let result = orchestrator.render(&request(bogus, true));

    assert!(!result.success);
    assert!(result.output_path.is_none());
    assert!(result.message.contains("render failed"));

    std::fs::remove_dir_all(&root).ok();
}

#[test]
fn byte_sources_render_without_touching_the_original_path() {
    let root = temp_dir("byte_source");
    std::fs::create_dir_all(&root).unwrap();
    let img = image::RgbImage::from_pixel(6, 6, image::Rgb([120, 60, 200]));
    let mut bytes = Vec::new();
    image::DynamicImage::ImageRgb8(img)
        .write_to(&mut std::io::Cursor::new(&mut bytes), image::ImageFormat::Png)
        .unwrap();

    let orchestrator = orchestrator_with(&root, Box::new(FakeRenderer::offline()));
    let result = orchestrator.render(&RenderRequest {
        image: ImageSource::Bytes(bytes),
        params: AdjustmentParams::default(),
        use_cache: true,
        output: OutputOpts {
            format: OutputFormat::Png,
            ..OutputOpts::default()
        },
    });

    assert!(result.success, "{}", result.message);
    assert!(result.output_path.unwrap().is_file());

    std::fs::remove_dir_all(&root).ok();
}

#[test]
fn async_job_completes_and_reports_progress_states() {
    let root = temp_dir("async_job");
    let image = write_fixture_image(&root);
    let orchestrator = Arc::new(orchestrator_with(&root, Box::new(FakeRenderer::offline())));

    let tracker = JobTracker::new();
    let id = tracker.submit(Arc::clone(&orchestrator), request(image, true));

    // submit() returns before the render settles; poll to completion.
    let mut state = tracker.status(&id).expect("job must be tracked").state;
    let deadline = std::time::Instant::now() + Duration::from_secs(10);
    while state != JobState::Completed && state != JobState::Failed {
        assert!(std::time::Instant::now() < deadline, "job never settled");
        std::thread::sleep(Duration::from_millis(10));
        state = tracker.status(&id).unwrap().state;
    }

    let job = tracker.status(&id).unwrap();
    assert_eq!(job.state, JobState::Completed);
    assert_eq!(job.progress, 100);
    assert!(job.output_path.unwrap().is_file());
    assert!(job.error.is_none());

    // Settled jobs survive until purged.
    assert_eq!(tracker.purge(Duration::from_secs(3600)), 0);
    assert_eq!(tracker.purge(Duration::ZERO), 1);
    assert!(tracker.status(&id).is_none());

    std::fs::remove_dir_all(&root).ok();
}

#[test]
fn failed_async_job_carries_the_error_message() {
    let root = temp_dir("async_failed");
    std::fs::create_dir_all(&root).unwrap();
    let orchestrator = Arc::new(orchestrator_with(&root, Box::new(FakeRenderer::offline())));

    let tracker = JobTracker::new();
    let id = tracker.submit(
        Arc::clone(&orchestrator),
        request(root.join("missing.png"), true),
    );

    let deadline = std::time::Instant::now() + Duration::from_secs(10);
    loop {
        let job = tracker.status(&id).unwrap();
        match job.state {
            JobState::Failed => {
                assert!(job.error.unwrap().contains("input error"));
                break;
            }
            JobState::Completed => panic!("job must fail on a missing input"),
            _ => {
                assert!(std::time::Instant::now() < deadline, "job never settled");
                std::thread::sleep(Duration::from_millis(10));
            }
        }
    }

    std::fs::remove_dir_all(&root).ok();
}
