// SPDX-License-Identifier: GPL-3.0-only

//! Integration tests for the scanner control lifecycle and scan loop

mod common;

use camera_scanner::backends::camera::{
    AutoFocusRange, BackendError, CameraResolution, DeviceInfo, FocusMode, ManualFocusDistance,
    Panel,
};
use camera_scanner::geometry::{DisplayOrientation, VideoRotation};
use camera_scanner::scanner::{OverlayMode, ScannerOverlay};
use camera_scanner::{ScanError, ScanOptions, ScanState};
use common::{GatedDecoder, Harness, MockSetup, Record};
use std::sync::atomic::Ordering;
use std::sync::{Arc, Mutex, mpsc};
use std::time::Duration;

const FRAMES: Duration = Duration::from_millis(150);
const CONTINUOUS: Duration = Duration::from_millis(1000);

#[tokio::test]
async fn test_start_streams_and_stop_is_idempotent() {
    let h = Harness::new(MockSetup::default());
    h.control.start(h.manual_options()).await.unwrap();

    assert_eq!(h.control.state(), ScanState::Streaming);
    assert!(h.control.is_analyzing());
    assert_eq!(Record::count(&h.record.start_previews), 1);
    assert_eq!(h.orientation.subscriber_count(), 1);

    h.control.stop().await;
    h.control.stop().await;

    assert_eq!(h.control.state(), ScanState::Idle);
    assert!(!h.control.is_analyzing());
    assert_eq!(Record::count(&h.record.closes), 1);
    assert_eq!(Record::count(&h.record.stop_previews), 1);
    assert_eq!(Record::count(&h.orientation.unsubscribes), 1);
    assert_eq!(h.orientation.subscriber_count(), 0);
    // Release fails every time but teardown still finished
    assert_eq!(Record::count(&h.display.releases), 1);
}

#[tokio::test]
async fn test_stop_from_idle_is_noop() {
    let h = Harness::new(MockSetup::default());
    h.control.stop().await;
    assert_eq!(h.control.state(), ScanState::Idle);
    assert_eq!(Record::count(&h.display.releases), 0);
}

#[tokio::test]
async fn test_start_while_running_is_noop() {
    let h = Harness::new(MockSetup::default());
    h.control.start(h.manual_options()).await.unwrap();
    let session = h.control.session_id();

    h.control.start(h.manual_options()).await.unwrap();

    assert_eq!(h.record.initialized.lock().unwrap().len(), 1);
    assert_eq!(h.control.session_id(), session);
}

#[tokio::test]
async fn test_filtered_results_dispatch_one_event() {
    let h = Harness::new(MockSetup::default());
    let mut events = h.control.subscribe();
    let options = ScanOptions {
        scan_multiple: true,
        ..h.manual_options()
    };
    h.control.start(options).await.unwrap();

    h.decoder.push(vec![Some(""), None, Some("ABC123")]);
    let delay = h.control.tick();

    assert_eq!(delay, CONTINUOUS);
    assert_eq!(h.control.current_delay(), CONTINUOUS);
    let event = events.try_recv().unwrap();
    assert_eq!(event.results.len(), 1);
    assert_eq!(event.results[0].text, "ABC123");
    assert_eq!(Some(event.session_id), h.control.session_id());
    assert!(events.try_recv().is_err());
}

#[tokio::test]
async fn test_empty_results_reset_delay() {
    let h = Harness::new(MockSetup::default());
    let mut events = h.control.subscribe();
    h.control.start(h.manual_options()).await.unwrap();

    h.decoder.push(vec![Some("first")]);
    assert_eq!(h.control.tick(), CONTINUOUS);
    assert!(events.try_recv().is_ok());

    h.decoder.push(vec![Some("   ")]);
    assert_eq!(h.control.tick(), FRAMES);
    assert!(events.try_recv().is_err());

    // Nothing scripted: no result at all
    assert_eq!(h.control.tick(), FRAMES);
    assert!(events.try_recv().is_err());
}

#[tokio::test]
async fn test_frame_fetch_failure_keeps_loop_alive() {
    let h = Harness::new(MockSetup {
        fail_frames: true,
        ..Default::default()
    });
    h.control.start(h.manual_options()).await.unwrap();

    assert_eq!(h.control.tick(), FRAMES);
    assert_eq!(h.control.tick(), FRAMES);
    // Both ticks fetched, so the processing guard was cleared in between
    assert_eq!(Record::count(&h.record.frames), 2);
    assert_eq!(h.control.state(), ScanState::Streaming);
}

#[tokio::test]
async fn test_paused_analysis_skips_decoding() {
    let h = Harness::new(MockSetup::default());
    h.control.start(h.manual_options()).await.unwrap();

    h.control.set_analyzing(false);
    h.decoder.push(vec![Some("hidden")]);
    assert_eq!(h.control.tick(), FRAMES);
    assert_eq!(Record::count(&h.record.frames), 0);

    h.control.set_analyzing(true);
    assert_eq!(h.control.tick(), CONTINUOUS);
    assert_eq!(Record::count(&h.record.frames), 1);
}

#[tokio::test]
async fn test_tick_after_stop_is_idle() {
    let h = Harness::new(MockSetup::default());
    h.control.start(h.manual_options()).await.unwrap();
    h.control.stop().await;

    h.control.tick();
    assert_eq!(Record::count(&h.record.frames), 0);
}

#[tokio::test]
async fn test_tick_task_dispatches_events() {
    let h = Harness::new(MockSetup::default());
    let mut events = h.control.subscribe();
    h.decoder.push(vec![Some("HELLO")]);
    let options = ScanOptions {
        initial_delay_before_analyzing_frames_ms: 10,
        delay_between_analyzing_frames_ms: 10,
        ..h.manual_options()
    };
    h.control.start(options).await.unwrap();

    let event = tokio::time::timeout(Duration::from_secs(5), events.recv())
        .await
        .expect("no event before timeout")
        .unwrap();
    assert_eq!(event.results[0].text, "HELLO");

    h.control.dispose().await;
    assert_eq!(h.overlay.clears.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_no_camera_leaves_idle() {
    let h = Harness::new(MockSetup {
        cameras: Vec::new(),
        ..Default::default()
    });
    let err = h.control.start(h.manual_options()).await.unwrap_err();

    assert!(matches!(err, ScanError::NoCameraAvailable));
    assert_eq!(h.control.state(), ScanState::Idle);
    assert_eq!(Record::count(&h.orientation.subscribes), 0);
}

#[tokio::test]
async fn test_init_failure_leaves_idle() {
    let h = Harness::new(MockSetup {
        init_error: Some(BackendError::PermissionDenied("/dev/video0".into())),
        ..Default::default()
    });
    let err = h.control.start(h.manual_options()).await.unwrap_err();

    assert!(matches!(err, ScanError::CaptureInit(BackendError::PermissionDenied(_))));
    assert_eq!(h.control.state(), ScanState::Idle);
    assert_eq!(Record::count(&h.record.closes), 0);

    // No tick task was left behind
    assert_eq!(h.control.tick(), FRAMES);
    assert_eq!(Record::count(&h.record.frames), 0);
}

#[tokio::test]
async fn test_no_resolution_releases_device() {
    let h = Harness::new(MockSetup {
        resolutions: Vec::new(),
        ..Default::default()
    });
    let err = h.control.start(h.manual_options()).await.unwrap_err();

    assert!(matches!(err, ScanError::NoResolutionAvailable));
    assert_eq!(h.control.state(), ScanState::Idle);
    assert_eq!(Record::count(&h.record.closes), 1);
    assert_eq!(Record::count(&h.record.stop_previews), 1);
}

#[tokio::test]
async fn test_resolution_and_picker() {
    let h = Harness::new(MockSetup::default());
    h.control.start(h.manual_options()).await.unwrap();
    {
        let set = h.record.resolutions.lock().unwrap();
        assert_eq!(set[0].0, CameraResolution::new(640, 480));
    }
    h.control.stop().await;

    let options = ScanOptions {
        resolution_selector: Some(Arc::new(|available: &[CameraResolution]| {
            available.iter().max_by_key(|r| r.pixel_count()).copied()
        })),
        ..h.manual_options()
    };
    h.control.start(options).await.unwrap();
    let set = h.record.resolutions.lock().unwrap();
    assert_eq!(set[1].0, CameraResolution::new(1920, 1080));
}

#[tokio::test]
async fn test_front_preference_falls_back_to_first() {
    let h = Harness::new(MockSetup {
        cameras: vec![
            DeviceInfo::new("usb", "USB camera", Panel::Unknown),
            DeviceInfo::new("rear", "Rear camera", Panel::Back),
        ],
        ..Default::default()
    });
    let options = ScanOptions {
        use_front_camera: Some(true),
        ..h.manual_options()
    };
    h.control.start(options).await.unwrap();

    assert_eq!(*h.record.initialized.lock().unwrap(), vec!["usb".to_string()]);
    assert!(!h.control.preview_geometry().unwrap().mirrored);
}

#[tokio::test]
async fn test_no_preference_opens_back_camera() {
    let h = Harness::new(MockSetup {
        cameras: vec![
            DeviceInfo::new("usb", "USB camera", Panel::Unknown),
            DeviceInfo::new("rear", "Rear camera", Panel::Back),
        ],
        ..Default::default()
    });
    h.control.start(h.manual_options()).await.unwrap();

    assert_eq!(*h.record.initialized.lock().unwrap(), vec!["rear".to_string()]);
}

#[tokio::test]
async fn test_front_camera_is_mirrored() {
    let h = Harness::new(MockSetup {
        cameras: vec![
            DeviceInfo::new("rear", "Rear camera", Panel::Back),
            DeviceInfo::new("selfie", "Front camera", Panel::Front),
        ],
        ..Default::default()
    });
    h.orientation.set_orientation(DisplayOrientation::Portrait);
    let options = ScanOptions {
        use_front_camera: Some(true),
        ..h.manual_options()
    };
    h.control.start(options).await.unwrap();

    assert_eq!(*h.record.initialized.lock().unwrap(), vec!["selfie".to_string()]);
    let geometry = h.control.preview_geometry().unwrap();
    assert!(geometry.mirrored);
    assert_eq!(geometry.rotation, VideoRotation::Clockwise270);
    assert_eq!(geometry.rotation_degrees, 270);
    let (_, mirrored) = *h.overlay.layouts.lock().unwrap().last().unwrap();
    assert!(mirrored);
}

#[tokio::test]
async fn test_orientation_change_reapplies_rotation() {
    let h = Harness::new(MockSetup::default());
    h.control.start(h.manual_options()).await.unwrap();
    assert_eq!(
        h.record.resolutions.lock().unwrap()[0].1,
        VideoRotation::None
    );

    h.orientation.set_orientation(DisplayOrientation::Portrait);
    assert_eq!(
        *h.record.rotations.lock().unwrap(),
        vec![VideoRotation::Clockwise90]
    );
    let geometry = h.control.preview_geometry().unwrap();
    assert_eq!(geometry.orientation, DisplayOrientation::Portrait);
    assert_eq!(geometry.oriented_stream_size().width, 480.0);

    h.control.stop().await;
    h.orientation.set_orientation(DisplayOrientation::LandscapeFlipped);
    assert_eq!(h.record.rotations.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn test_initial_focus_prefers_continuous_full_range() {
    let h = Harness::new(MockSetup::default());
    h.control.start(h.manual_options()).await.unwrap();

    let settings = h.record.focus_settings.lock().unwrap();
    assert_eq!(settings[0].mode, Some(FocusMode::Continuous));
    assert_eq!(settings[0].auto_focus_range, Some(AutoFocusRange::FullRange));
    assert!(!settings[0].wait_for_focus);
    assert_eq!(Record::count(&h.record.focus_requests), 1);
    assert!(h.control.is_focus_supported());
}

#[tokio::test]
async fn test_disabled_autofocus_parks_lens_and_ignores_taps() {
    let h = Harness::new(MockSetup::default());
    let options = ScanOptions {
        disable_autofocus: true,
        ..h.manual_options()
    };
    h.control.start(options).await.unwrap();

    {
        let settings = h.record.focus_settings.lock().unwrap();
        assert_eq!(settings.len(), 1);
        assert_eq!(settings[0].mode, Some(FocusMode::Manual));
        assert_eq!(settings[0].distance, Some(ManualFocusDistance::Nearest));
    }
    assert_eq!(Record::count(&h.record.focus_requests), 0);

    h.control.set_control_size(640.0, 480.0);
    h.control.on_tap(100.0, 100.0);
    assert!(h.record.regions.lock().unwrap().is_empty());
    assert_eq!(Record::count(&h.record.focus_requests), 0);
}

#[tokio::test]
async fn test_tap_sets_normalized_region() {
    let h = Harness::new(MockSetup::default());
    h.control.start(h.manual_options()).await.unwrap();
    h.control.set_control_size(640.0, 480.0);

    h.control.focus_at(320.0, 240.0);

    let regions = h.record.regions.lock().unwrap().clone();
    assert_eq!(regions.len(), 1);
    let region = regions[0];
    assert!(region.auto_focus_enabled);
    assert_eq!(region.weight, 100);
    assert!((region.bounds.x - 310.0 / 640.0).abs() < 1e-9);
    assert!((region.bounds.y - 230.0 / 480.0).abs() < 1e-9);
    assert!((region.bounds.width - 20.0 / 640.0).abs() < 1e-9);
    assert!((region.bounds.height - 20.0 / 480.0).abs() < 1e-9);

    let settings = h.record.focus_settings.lock().unwrap();
    let last = settings.last().unwrap();
    assert_eq!(last.mode, Some(FocusMode::Single));
    assert_eq!(last.auto_focus_range, Some(AutoFocusRange::FullRange));
    // Initial focus plus the tap
    assert_eq!(Record::count(&h.record.focus_requests), 2);
}

#[tokio::test]
async fn test_general_refocus_clears_regions() {
    let h = Harness::new(MockSetup::default());
    h.control.start(h.manual_options()).await.unwrap();
    h.control.set_control_size(640.0, 480.0);
    h.control.focus_at(10.0, 10.0);

    h.control.auto_focus();

    assert_eq!(Record::count(&h.record.region_clears), 1);
    assert!(h.record.regions.lock().unwrap().is_empty());
    assert_eq!(Record::count(&h.record.focus_requests), 3);
}

#[tokio::test]
async fn test_tap_without_region_support_still_focuses() {
    let h = Harness::new(MockSetup {
        roi_regions: 0,
        ..Default::default()
    });
    h.control.start(h.manual_options()).await.unwrap();
    h.control.focus_at(50.0, 50.0);

    assert!(h.record.regions.lock().unwrap().is_empty());
    assert_eq!(h.record.focus_settings.lock().unwrap().len(), 1);
    assert_eq!(Record::count(&h.record.focus_requests), 2);
}

#[tokio::test]
async fn test_focus_before_start_is_noop() {
    let h = Harness::new(MockSetup::default());
    h.control.focus_at(10.0, 10.0);
    h.control.auto_focus();
    assert!(!h.control.is_focus_supported());
    assert_eq!(Record::count(&h.record.focus_requests), 0);
}

#[tokio::test]
async fn test_torch_toggle_and_off_on_stop() {
    let h = Harness::new(MockSetup::default());
    assert!(!h.control.has_torch());
    h.control.toggle_torch();
    assert!(!h.record.torch_on.load(Ordering::SeqCst));

    h.control.start(h.manual_options()).await.unwrap();
    assert!(h.control.has_torch());
    h.control.toggle_torch();
    assert!(h.control.is_torch_on());
    h.control.set_torch(false);
    assert!(!h.control.is_torch_on());
    h.control.set_torch(true);

    h.control.stop().await;
    assert!(!h.record.torch_on.load(Ordering::SeqCst));
}

#[tokio::test]
async fn test_missing_torch_is_noop() {
    let h = Harness::new(MockSetup {
        torch: false,
        ..Default::default()
    });
    h.control.start(h.manual_options()).await.unwrap();
    assert!(!h.control.has_torch());
    h.control.toggle_torch();
    assert!(!h.control.is_torch_on());
}

#[tokio::test]
async fn test_custom_overlay_lifecycle() {
    let h = Harness::new(MockSetup::default());
    h.control.set_overlay(ScannerOverlay {
        use_custom_overlay: true,
        ..Default::default()
    });
    h.control.start(h.manual_options()).await.unwrap();
    assert_eq!(*h.overlay.shown.lock().unwrap(), vec![OverlayMode::Custom]);

    h.control.dispose().await;
    h.control.dispose().await;
    assert_eq!(h.overlay.removals.load(Ordering::SeqCst), 1);
    assert_eq!(h.overlay.clears.load(Ordering::SeqCst), 2);
    assert_eq!(Record::count(&h.display.requests), 1);
}

#[tokio::test]
async fn test_layout_follows_control_size() {
    let h = Harness::new(MockSetup::default());
    h.control.start(h.manual_options()).await.unwrap();
    h.control.set_control_size(800.0, 400.0);

    let (rect, mirrored) = *h.overlay.layouts.lock().unwrap().last().unwrap();
    assert!(!mirrored);
    // 640x480 in 800x400: bars left and right
    assert!((rect.height - 400.0).abs() < 1e-9);
    assert!((rect.width - 400.0 * 640.0 / 480.0).abs() < 1e-9);
    assert!((rect.x - (800.0 - rect.width) / 2.0).abs() < 1e-9);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_stop_during_start_cancels() {
    let (entered_tx, entered_rx) = mpsc::channel::<()>();
    let (resume_tx, resume_rx) = mpsc::channel::<()>();
    let entered_tx = Mutex::new(entered_tx);
    let resume_rx = Mutex::new(resume_rx);

    let h = Harness::new(MockSetup {
        on_initialize: Some(Arc::new(move || {
            let _ = entered_tx.lock().unwrap().send(());
            let _ = resume_rx.lock().unwrap().recv();
        })),
        ..Default::default()
    });
    let options = h.manual_options();
    let h = Arc::new(h);

    let starter = h.clone();
    let start = tokio::spawn(async move { starter.control.start(options).await });

    tokio::task::spawn_blocking(move || entered_rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(h.control.state(), ScanState::Starting);
    h.control.stop().await;
    resume_tx.send(()).unwrap();

    let result = start.await.unwrap();
    assert!(matches!(result, Err(ScanError::Cancelled)));
    assert_eq!(h.control.state(), ScanState::Idle);
    assert_eq!(Record::count(&h.record.closes), 1);
    assert_eq!(Record::count(&h.orientation.subscribes), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_tick_during_decode_and_stop_before_it_finishes() {
    let (gate, entered_rx, release_tx) = GatedDecoder::new();
    let h = Harness::new(MockSetup::default());
    let mut events = h.control.subscribe();
    let options = ScanOptions {
        decoder_factory: Some(gate.factory()),
        ..h.manual_options()
    };
    h.control.start(options).await.unwrap();
    let h = Arc::new(h);

    let ticker = h.clone();
    let first = tokio::task::spawn_blocking(move || ticker.control.tick());
    tokio::task::spawn_blocking(move || entered_rx.recv())
        .await
        .unwrap()
        .unwrap();

    // A decode is in flight, the overlapping tick is skipped
    assert_eq!(h.control.tick(), FRAMES);
    assert_eq!(Record::count(&h.record.frames), 1);
    assert_eq!(h.control.current_delay(), FRAMES);

    // Stop does not wait for the decode
    h.control.stop().await;
    assert_eq!(h.control.state(), ScanState::Idle);

    release_tx.send(()).unwrap();
    first.await.unwrap();

    assert!(events.try_recv().is_err());
    assert_eq!(h.control.state(), ScanState::Idle);
    assert_eq!(h.control.current_delay(), FRAMES);
    assert_eq!(Record::count(&h.record.frames), 1);
    assert_eq!(Record::count(&h.record.closes), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_drop_in_runtime_closes_device_off_thread() {
    let h = Harness::new(MockSetup::default());
    h.control.start(h.manual_options()).await.unwrap();
    let Harness {
        control, record, ..
    } = h;

    drop(control);

    for _ in 0..200 {
        if Record::count(&record.closes) == 1 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(Record::count(&record.closes), 1);
    assert_eq!(Record::count(&record.stop_previews), 1);
    let closed_on = record.closed_on.lock().unwrap().unwrap();
    assert_ne!(closed_on, std::thread::current().id());
}

#[test]
fn test_drop_outside_runtime_closes_inline() {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let h = Harness::new(MockSetup::default());
    rt.block_on(h.control.start(h.manual_options())).unwrap();
    let Harness {
        control, record, ..
    } = h;

    drop(control);

    assert_eq!(Record::count(&record.closes), 1);
    let closed_on = record.closed_on.lock().unwrap().unwrap();
    assert_eq!(closed_on, std::thread::current().id());
}
