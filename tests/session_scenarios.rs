//! End-to-end talk sessions on simulated time, with fake capture hardware.

mod common;

use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time;

use common::{deck, harness, DeniedMic, FakeAudio, GrantedMic};
use ignite_talk::capture::DeviceEvent;
use ignite_talk::session::{ControlInput, ExitReason, SessionPhase};
use ignite_talk::timer::TOTAL_SLIDES;

const TALK: Duration = Duration::from_secs(300);

#[tokio::test(start_paused = true)]
async fn test_full_talk_records_audio_and_video() {
    let mut h = harness(vec!["libx264"], Box::new(GrantedMic), deck(&[]));
    let mut snapshots = h.session.subscribe();
    let (_controls, rx) = mpsc::channel(8);

    let outcome = h.session.run(rx).await.unwrap();

    assert_eq!(outcome.reason, ExitReason::Finished);
    assert!(outcome.final_state.is_finished);
    assert_eq!(outcome.final_state.current_slide, TOTAL_SLIDES - 1);
    assert!(!outcome.mic_denied);

    let media = outcome.media.expect("a recording");
    assert!(media.bytes.starts_with(b"finished:"));
    assert!(media.has_audio);
    assert!(media.duration_corrected);
    assert!(media.duration >= TALK);
    assert_eq!(*h.finisher.calls.lock().unwrap(), 1);

    {
        let log = h.log.lock().unwrap();
        assert_eq!(log.starts, 1);
        assert_eq!(log.stops, 1);
        assert_eq!(log.releases, 0);
        // One full draw per slide plus redraws as the countdown ticks.
        assert!(log.frames > TOTAL_SLIDES * 10);
        let spec = log.spec.unwrap();
        assert_eq!((spec.width, spec.height), (32, 18));
    }

    let status = h.status.get().await;
    assert_eq!(status.phase, SessionPhase::Finished);
    assert!(!status.recording);
    assert!(status.last_error.is_none());

    // Nothing ticks after the session is over.
    assert!(snapshots.borrow_and_update().is_finished);
    time::sleep(Duration::from_secs(5)).await;
    assert!(!snapshots.has_changed().unwrap());
    assert!(h.session.finalize().await.is_none());
}

#[tokio::test(start_paused = true)]
async fn test_denied_microphone_records_video_only() {
    let mut h = harness(vec!["libx264"], Box::new(DeniedMic), deck(&[]));
    let (_controls, rx) = mpsc::channel(8);

    let outcome = h.session.run(rx).await.unwrap();

    assert_eq!(outcome.reason, ExitReason::Finished);
    assert!(outcome.mic_denied);
    let media = outcome.media.expect("a video-only recording");
    assert!(!media.has_audio);
    assert!(media.bytes.starts_with(b"finished:"));
    assert!(media.bytes.ends_with(b"trailer"));
    // Fragmented mp4 still gets its duration written, audio or not.
    assert!(media.duration_corrected);
    assert_eq!(*h.finisher.calls.lock().unwrap(), 1);
    assert!(h.status.get().await.mic_denied);
}

#[tokio::test(start_paused = true)]
async fn test_cancel_mid_talk_finalizes_once() {
    let mut h = harness(vec!["libvpx-vp9"], Box::new(DeniedMic), deck(&[]));
    let mut snapshots = h.session.subscribe();
    let (controls, rx) = mpsc::channel(8);

    let (outcome, _) = tokio::join!(h.session.run(rx), async {
        time::sleep(Duration::from_millis(10 * 15_000 + 7_000)).await;
        controls.send(ControlInput::Cancel).await.unwrap();
    });
    let outcome = outcome.unwrap();

    assert_eq!(outcome.reason, ExitReason::Cancelled);
    assert_eq!(outcome.final_state.current_slide, 10);
    assert!((6_900..=7_100).contains(&outcome.final_state.slide_elapsed_ms));
    assert!(!outcome.final_state.is_finished);

    let media = outcome.media.expect("a partial recording");
    assert!(media.duration_corrected);
    assert!(media.duration < Duration::from_secs(158));
    assert_eq!(h.status.get().await.phase, SessionPhase::Exited);

    let frames = h.log.lock().unwrap().frames;
    let _ = snapshots.borrow_and_update();
    time::sleep(Duration::from_secs(30)).await;

    assert!(!snapshots.has_changed().unwrap());
    assert_eq!(h.log.lock().unwrap().frames, frames);
    assert!(h.session.finalize().await.is_none());
    assert_eq!(h.log.lock().unwrap().stops, 1);
    assert_eq!(*h.finisher.calls.lock().unwrap(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_device_error_keeps_the_talk_running() {
    let mut h = harness(vec!["libx264"], Box::new(DeniedMic), deck(&[]));
    let log = h.log.clone();
    let (_controls, rx) = mpsc::channel(8);

    let (outcome, _) = tokio::join!(h.session.run(rx), async {
        time::sleep(Duration::from_secs(30)).await;
        let events = log.lock().unwrap().events.clone().unwrap();
        events
            .send(DeviceEvent::Error("encoder crashed".to_string()))
            .unwrap();
    });
    let outcome = outcome.unwrap();

    assert_eq!(outcome.reason, ExitReason::Finished);
    assert!(outcome.final_state.is_finished);
    assert!(outcome.media.is_none());

    let log = h.log.lock().unwrap();
    assert_eq!(log.releases, 1);
    assert_eq!(log.stops, 0);

    let status = h.status.get().await;
    assert!(!status.recording);
    assert!(status.last_error.is_some());
}

#[tokio::test(start_paused = true)]
async fn test_no_supported_format_presents_unrecorded() {
    let mut h = harness(vec![], Box::new(GrantedMic), deck(&[]));
    let (_controls, rx) = mpsc::channel(8);

    let outcome = h.session.run(rx).await.unwrap();

    assert_eq!(outcome.reason, ExitReason::Finished);
    assert!(outcome.media.is_none());
    assert!(!outcome.mic_denied);
    let log = h.log.lock().unwrap();
    assert_eq!(log.starts, 0);
    assert_eq!(log.frames, 0);
}

#[tokio::test(start_paused = true)]
async fn test_undecodable_slide_skips_its_redraw() {
    let mut h = harness(vec!["libx264"], Box::new(DeniedMic), deck(&[3]));
    let (_controls, rx) = mpsc::channel(8);

    let outcome = h.session.run(rx).await.unwrap();

    assert_eq!(outcome.reason, ExitReason::Finished);
    assert!(outcome.media.is_some());
    assert!(h.status.get().await.last_error.is_none());
}

#[tokio::test(start_paused = true)]
async fn test_pre_acquired_audio_skips_microphone() {
    let h = harness(vec!["libx264"], Box::new(DeniedMic), deck(&[]));
    let mut session = h.session.with_audio(Box::new(FakeAudio::started()));
    let (controls, rx) = mpsc::channel(8);

    let (outcome, _) = tokio::join!(session.run(rx), async {
        time::sleep(Duration::from_secs(20)).await;
        controls.send(ControlInput::Stop).await.unwrap();
    });
    let outcome = outcome.unwrap();

    assert_eq!(outcome.reason, ExitReason::Stopped);
    assert!(!outcome.mic_denied);
    assert!(outcome.media.unwrap().has_audio);
    assert_eq!(h.log.lock().unwrap().stops, 1);
}

#[tokio::test(start_paused = true)]
async fn test_pause_and_seek_during_talk() {
    let mut h = harness(vec!["libx264"], Box::new(DeniedMic), deck(&[]));
    let (controls, rx) = mpsc::channel(8);

    let (outcome, _) = tokio::join!(h.session.run(rx), async {
        time::sleep(Duration::from_secs(20)).await;
        controls.send(ControlInput::Pause).await.unwrap();
        time::sleep(Duration::from_secs(60)).await;
        controls.send(ControlInput::GoToSlide(7)).await.unwrap();
        time::sleep(Duration::from_secs(1)).await;
        controls.send(ControlInput::Resume).await.unwrap();
        time::sleep(Duration::from_secs(2)).await;
        controls.send(ControlInput::Cancel).await.unwrap();
    });
    let outcome = outcome.unwrap();

    assert_eq!(outcome.reason, ExitReason::Cancelled);
    assert_eq!(outcome.final_state.current_slide, 7);
    assert!((1_900..=2_100).contains(&outcome.final_state.slide_elapsed_ms));

    let log = h.log.lock().unwrap();
    assert_eq!(log.pauses, 1);
    assert_eq!(log.resumes, 1);

    // The paused minute does not count towards the recording.
    let media = outcome.media.unwrap();
    assert!(media.duration < Duration::from_secs(30));
}

#[tokio::test(start_paused = true)]
async fn test_cancel_during_finish_hold_ends_it_early() {
    let mut h = harness(vec!["libx264"], Box::new(DeniedMic), deck(&[]));
    let (controls, rx) = mpsc::channel(8);

    let started = time::Instant::now();
    let (outcome, _) = tokio::join!(h.session.run(rx), async {
        time::sleep(TALK + Duration::from_millis(500)).await;
        controls.send(ControlInput::Cancel).await.unwrap();
    });
    let outcome = outcome.unwrap();

    // The talk already finished; the cancel only cuts the hold short.
    assert_eq!(outcome.reason, ExitReason::Finished);
    assert!(started.elapsed() < TALK + Duration::from_millis(1_500));
    assert_eq!(h.log.lock().unwrap().stops, 1);
}
