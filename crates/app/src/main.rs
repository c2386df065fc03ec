//! texsnip - drag out a screen region and save it as PNG

mod config;

use crate::config::{load_config, AppConfig};
use anyhow::Context;
use export::PngExporter;
use overlay::{CancelReason, CaptureOutcome};
use std::path::{Path, PathBuf};

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config_path = std::env::args_os().nth(1).map(PathBuf::from);
    let config = load_config(config_path.as_deref());

    log::info!("texsnip starting up");
    run(&config)
}

#[cfg(windows)]
fn run(config: &AppConfig) -> anyhow::Result<()> {
    use desktop::GdiDisplayService;
    use overlay::OverlayWindow;
    use std::thread;
    use std::time::Duration;
    use windows::Win32::UI::HiDpi::{
        SetProcessDpiAwarenessContext, DPI_AWARENESS_CONTEXT_PER_MONITOR_AWARE_V2,
    };

    // Window-manager coordinates become physical pixels
    unsafe {
        let _ = SetProcessDpiAwarenessContext(DPI_AWARENESS_CONTEXT_PER_MONITOR_AWARE_V2);
    }

    if config.capture_delay_ms > 0 {
        thread::sleep(Duration::from_millis(config.capture_delay_ms));
    }

    let outcome = OverlayWindow::show(&GdiDisplayService::new(), &config.overlay);

    handle_outcome(outcome, &config.output_dir()).map(|_| ())
}

#[cfg(not(windows))]
fn run(_config: &AppConfig) -> anyhow::Result<()> {
    anyhow::bail!("No desktop capture backend is available on this platform")
}

/// Save a capture, or report why there is none. Returns the written path.
#[cfg_attr(not(windows), allow(dead_code))]
fn handle_outcome(outcome: CaptureOutcome, output_dir: &Path) -> anyhow::Result<Option<PathBuf>> {
    match outcome {
        CaptureOutcome::Captured(region) => {
            let path = PngExporter::save(&region.image, output_dir)
                .with_context(|| format!("Failed to save capture into {}", output_dir.display()))?;
            println!("{}", path.display());
            Ok(Some(path))
        }
        CaptureOutcome::Cancelled(CancelReason::CaptureUnavailable) => {
            anyhow::bail!("Screen capture unavailable")
        }
        CaptureOutcome::Cancelled(reason) => {
            log::info!("Capture cancelled ({:?})", reason);
            Ok(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use desktop::{Point, Rect};
    use desktop::MemoryDisplayService;
    use overlay::{outcome_channel, CaptureSession, OverlayEvent, PointerButton};

    fn captured_outcome() -> CaptureOutcome {
        let service = MemoryDisplayService::single(320, 240, 1.0);
        let (tx, rx) = outcome_channel();
        let mut session = CaptureSession::new(&service, AppConfig::default().overlay, tx);

        session.handle(OverlayEvent::PointerDown {
            position: Point::new(10, 20),
            button: PointerButton::Primary,
        });
        session.handle(OverlayEvent::PointerUp {
            position: Point::new(60, 50),
            button: PointerButton::Primary,
        });

        rx.try_recv().unwrap()
    }

    #[test]
    fn capture_is_saved() {
        let dir = tempfile::tempdir().unwrap();
        let outcome = captured_outcome();
        match &outcome {
            CaptureOutcome::Captured(region) => assert_eq!(region.logical, Rect::new(10, 20, 50, 30)),
            other => panic!("expected a capture, got {:?}", other),
        }

        let path = handle_outcome(outcome, dir.path()).unwrap().unwrap();
        let saved = image::open(&path).unwrap();
        assert_eq!((saved.width(), saved.height()), (50, 30));
    }

    #[test]
    fn user_cancel_is_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = handle_outcome(CaptureOutcome::Cancelled(CancelReason::Escape), dir.path()).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn unavailable_capture_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(handle_outcome(CaptureOutcome::Cancelled(CancelReason::CaptureUnavailable), dir.path()).is_err());
    }
}
