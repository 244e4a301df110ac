mod common;

use std::path::Path;
use std::time::{Duration, Instant};

use common::{broken_shader, good_shader, FakeGpu};
use vimshady::compiler::DEFAULT_FALLBACK_COLOR;
use vimshady::render_loop::{LoopSettings, RenderLoop, RenderState};
use vimshady::texture::TextureImage;
use vimshady::{PreviewError, ShaderError, SourceWatcher, WatchEvent, WatchMode};

const DEBOUNCE: Duration = Duration::from_millis(100);

fn ms(t0: Instant, n: u64) -> Instant {
    t0 + Duration::from_millis(n)
}

fn changed_text(ev: Option<WatchEvent>) -> String {
    match ev {
        Some(WatchEvent::Changed(src)) => src.text().to_string(),
        other => panic!("expected a change, got {other:?}"),
    }
}

/// Poll with the real clock until something arrives.
fn wait_for_event(w: &mut SourceWatcher, timeout: Duration) -> Option<WatchEvent> {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if let Some(ev) = w.poll(Instant::now()) {
            return Some(ev);
        }
        std::thread::sleep(Duration::from_millis(10));
    }
    None
}

#[test]
fn burst_of_writes_yields_one_reload_with_final_content() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("shader.glsl");
    std::fs::write(&path, "v0").unwrap();

    let mut w = SourceWatcher::polling(&path, DEBOUNCE, Duration::ZERO);
    assert_eq!(w.mode(), WatchMode::Poll);
    let t0 = Instant::now();
    assert_eq!(w.poll(t0), None);

    // distinct lengths so the change is visible even with coarse mtimes
    std::fs::write(&path, "v1 ").unwrap();
    assert_eq!(w.poll(ms(t0, 10)), None);
    std::fs::write(&path, "v2  ").unwrap();
    assert_eq!(w.poll(ms(t0, 40)), None);
    std::fs::write(&path, "final").unwrap();
    assert_eq!(w.poll(ms(t0, 70)), None);
    assert_eq!(w.poll(ms(t0, 120)), None);

    assert_eq!(changed_text(w.poll(ms(t0, 180))), "final");
    assert_eq!(w.poll(ms(t0, 400)), None);
    assert_eq!(w.poll(ms(t0, 900)), None);
}

#[test]
fn burst_spanning_a_metadata_check_reloads_once() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("shader.glsl");
    std::fs::write(&path, "v0").unwrap();

    // default cadence: checks are further apart than the debounce window
    let mut w = SourceWatcher::polling(&path, Duration::from_millis(150), Duration::from_millis(250));
    let t0 = Instant::now();
    assert_eq!(w.poll(t0), None);

    std::fs::write(&path, "a").unwrap();
    assert_eq!(w.poll(ms(t0, 250)), None);
    // second write lands after the check that saw the first one
    std::fs::write(&path, "final!").unwrap();

    let events: Vec<WatchEvent> = [300, 400, 500, 650, 800, 1200]
        .into_iter()
        .filter_map(|n| w.poll(ms(t0, n)))
        .collect();
    assert_eq!(events.len(), 1, "{events:?}");
    assert_eq!(changed_text(events.into_iter().next()), "final!");
}

#[test]
fn deleted_file_is_reported_once_then_recovers() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("shader.glsl");
    std::fs::write(&path, "v0").unwrap();

    let mut w = SourceWatcher::polling(&path, DEBOUNCE, Duration::ZERO);
    let t0 = Instant::now();
    w.poll(t0);

    std::fs::remove_file(&path).unwrap();
    assert_eq!(w.poll(ms(t0, 10)), None);
    match w.poll(ms(t0, 200)) {
        Some(WatchEvent::SourceUnavailable { path: p, error }) => {
            assert_eq!(p, path);
            assert!(!error.is_empty());
        }
        other => panic!("expected unavailable, got {other:?}"),
    }

    // a forced reload during the outage stays quiet
    w.request_reload();
    assert_eq!(w.poll(ms(t0, 300)), None);

    std::fs::write(&path, "back again").unwrap();
    assert_eq!(w.poll(ms(t0, 400)), None);
    assert_eq!(changed_text(w.poll(ms(t0, 600))), "back again");
}

#[test]
fn poll_interval_limits_metadata_checks() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("shader.glsl");
    std::fs::write(&path, "v0").unwrap();

    let mut w = SourceWatcher::polling(&path, Duration::ZERO, Duration::from_millis(250));
    let t0 = Instant::now();
    assert_eq!(w.poll(t0), None);

    std::fs::write(&path, "v1 longer").unwrap();
    // still inside the interval: not looked at yet
    assert_eq!(w.poll(ms(t0, 100)), None);
    assert_eq!(changed_text(w.poll(ms(t0, 260))), "v1 longer");
}

#[test]
fn notify_mode_sees_atomic_rename_saves() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("shader.glsl");
    std::fs::write(&path, "v0").unwrap();

    let mut w = SourceWatcher::new(&path, WatchMode::Notify, Duration::from_millis(50), Duration::from_millis(50));

    // editor style save: write a temp file, then rename over the target
    let tmp = dir.path().join(".shader.glsl.swp");
    std::fs::write(&tmp, "renamed into place").unwrap();
    std::fs::rename(&tmp, &path).unwrap();

    let text = changed_text(wait_for_event(&mut w, Duration::from_secs(5)));
    assert_eq!(text, "renamed into place");
}

fn write_source(path: &Path, src: &vimshady::ShaderSource) {
    std::fs::write(path, src.text()).unwrap();
}

#[test]
fn broken_save_keeps_previous_program_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("live.glsl");
    write_source(&path, &good_shader("live.glsl", 0.3));

    let mut gpu = FakeGpu::new();
    let t0 = Instant::now();
    let settings = LoopSettings { test: [0.0, 0.0], fallback_color: DEFAULT_FALLBACK_COLOR };
    let mut rl = RenderLoop::new(settings, t0);
    let mut w = SourceWatcher::polling(&path, DEBOUNCE, Duration::ZERO);
    w.poll(t0);

    let noise = TextureImage::procedural_noise(4);
    rl.start(&mut gpu, vimshady::ShaderSource::load(&path), &noise).unwrap();
    rl.frame(&mut gpu, ms(t0, 16)).unwrap();
    let good = gpu.last_draw().program;

    write_source(&path, &broken_shader("live.glsl"));
    assert_eq!(w.poll(ms(t0, 20)), None);
    let Some(WatchEvent::Changed(src)) = w.poll(ms(t0, 150)) else {
        panic!("change not detected");
    };
    rl.notify_change(src);

    let outcome = rl.frame(&mut gpu, ms(t0, 160)).unwrap().unwrap();
    assert!(matches!(
        outcome.error(),
        Some(PreviewError::Shader(ShaderError::Compile(d))) if !d.is_empty()
    ));
    assert_eq!(outcome.path(), path.as_path());
    assert_eq!(rl.state(), RenderState::ReloadFailed);
    assert_eq!(gpu.last_draw().program, good);

    // fixing the file recovers
    write_source(&path, &good_shader("live.glsl", 0.9));
    w.poll(ms(t0, 200));
    let Some(WatchEvent::Changed(src)) = w.poll(ms(t0, 400)) else {
        panic!("fix not detected");
    };
    rl.notify_change(src);
    assert!(rl.frame(&mut gpu, ms(t0, 410)).unwrap().unwrap().is_swapped());
    assert_ne!(gpu.last_draw().program, good);
}
