use crate::audio::{CpalMicrophone, MicrophoneAccess, NoMicrophone};
use crate::capture::{
    CaptureEngine, CaptureSettings, FfmpegCapabilities, FfmpegDevice, FfmpegFinisher, MediaResult,
};
use crate::cli::PresentCliArgs;
use crate::config::Config;
use crate::global;
use crate::keys::{spawn_key_reader, RawModeGuard};
use crate::overlay::{FontSet, TalkInfo};
use crate::session::{
    ControlInput, ExitReason, SessionCoordinator, SessionOptions, SessionOutcome,
    SessionStatusHandle,
};
use crate::slides::Deck;
use crate::timer::{TimerState, TOTAL_SLIDES};
use anyhow::{Context, Result};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{info, warn};

pub async fn run_presentation(args: PresentCliArgs) -> Result<()> {
    info!("Starting ignite-talk");

    let config = Config::load()?;
    let deck = Deck::load_dir(&args.deck_dir)
        .with_context(|| format!("Failed to load deck from {:?}", args.deck_dir))?;

    let talk = TalkInfo {
        event_title: args.title,
        story_name: args.story,
        speaker_name: args.speaker,
    };
    let mut options = SessionOptions::from_config(&config, talk);
    if args.no_record {
        options.record = false;
    }
    if args.wait {
        options.auto_start = false;
    }

    let capture = build_capture_engine(&config, options.record).await;
    let mut coordinator =
        SessionCoordinator::new(deck, capture, options.clone(), SessionStatusHandle::default());

    let (controls_tx, controls_rx) = mpsc::channel::<ControlInput>(16);
    let shutdown = Arc::new(AtomicBool::new(false));

    let outcome = {
        let raw_mode = match RawModeGuard::enable() {
            Ok(guard) => Some(guard),
            Err(e) => {
                warn!("Keyboard control unavailable ({}); the talk will run to the end", e);
                None
            }
        };
        print_key_help(options.auto_start);

        let reader = spawn_key_reader(controls_tx.clone(), Arc::clone(&shutdown));
        let signals = spawn_stop_on_ctrl_c(controls_tx);
        let progress = spawn_progress(coordinator.subscribe());

        let result = coordinator.run(controls_rx).await;

        shutdown.store(true, Ordering::Relaxed);
        progress.abort();
        signals.abort();
        let _ = reader.await;
        drop(raw_mode);
        result?
    };

    println!();
    report_outcome(&config, &outcome, !options.record);
    if let Some(media) = &outcome.media {
        let path = match args.output {
            Some(path) => path,
            None => {
                let dir = config.recordings_dir()?;
                generate_recording_path(&dir, media.extension())
            }
        };
        save_recording(&path, media)?;
        println!("Saved recording to {}", path.display());
    }

    Ok(())
}

async fn build_capture_engine(config: &Config, record: bool) -> CaptureEngine {
    let ffmpeg_path = config.capture.ffmpeg_path.clone();
    let device = if record {
        FfmpegDevice::probe(ffmpeg_path.clone()).await
    } else {
        FfmpegDevice::new(ffmpeg_path.clone(), FfmpegCapabilities::default())
    };

    let microphone: Box<dyn MicrophoneAccess> = if config.audio.enabled {
        Box::new(CpalMicrophone::new(config.audio.sample_rate))
    } else {
        Box::new(NoMicrophone)
    };

    CaptureEngine::new(
        Box::new(device),
        microphone,
        Box::new(FfmpegFinisher::new(ffmpeg_path)),
        FontSet::load(&config.overlay),
        CaptureSettings::from(&config.capture),
    )
}

fn print_key_help(auto_start: bool) {
    if !auto_start {
        print!("Press Enter to start.\r\n");
    }
    print!("space/p pause  →/n next  ←/b previous  Home/r reset  Esc/q quit\r\n");
    let _ = std::io::stdout().flush();
}

fn spawn_stop_on_ctrl_c(controls: mpsc::Sender<ControlInput>) -> JoinHandle<()> {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = controls.send(ControlInput::Stop).await;
        }
    })
}

fn spawn_progress(mut snapshots: watch::Receiver<TimerState>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut last_line = String::new();
        while snapshots.changed().await.is_ok() {
            let line = progress_line(&snapshots.borrow_and_update());
            if line != last_line {
                print!("\r{line}");
                let _ = std::io::stdout().flush();
                last_line = line;
            }
        }
    })
}

fn progress_line(state: &TimerState) -> String {
    let status = if state.is_finished {
        "done"
    } else if state.is_paused {
        "paused"
    } else {
        ""
    };
    format!(
        "Slide {:>2}/{}  {:>2}s  {:>3.0}%  {:<6}",
        state.current_slide + 1,
        TOTAL_SLIDES,
        state.slide_seconds_left(),
        state.progress() * 100.0,
        status
    )
}

fn report_outcome(config: &Config, outcome: &SessionOutcome, recording_disabled: bool) {
    let ending = match outcome.reason {
        ExitReason::Finished => "Talk finished",
        ExitReason::Cancelled => "Talk cancelled",
        ExitReason::Stopped => "Talk stopped",
    };
    println!(
        "{} at slide {}/{}",
        ending,
        outcome.final_state.current_slide + 1,
        TOTAL_SLIDES
    );

    if recording_disabled {
        return;
    }
    if outcome.mic_denied {
        if config.audio.enabled {
            println!("Microphone unavailable: the recording has no audio.");
        } else {
            println!("Audio disabled in config: the recording has no audio.");
        }
    }
    if outcome.media.is_none() {
        println!("No recording was produced.");
    }
}

fn generate_recording_path(dir: &Path, extension: &str) -> PathBuf {
    let timestamp = chrono::Local::now().format("%Y%m%d-%H%M%S");
    let path = dir.join(format!("talk-{}.{}", timestamp, extension));

    // Handle collision by appending counter
    if path.exists() {
        for i in 1..100 {
            let alt_path = dir.join(format!("talk-{}-{}.{}", timestamp, i, extension));
            if !alt_path.exists() {
                return alt_path;
            }
        }
    }

    path
}

fn save_recording(path: &Path, media: &MediaResult) -> Result<()> {
    global::ensure_parent_dir(path)?;
    std::fs::write(path, &media.bytes)
        .with_context(|| format!("Failed to write recording to {:?}", path))?;
    info!(
        "Recording saved: {:?} ({} bytes, {:.1}s, audio: {})",
        path,
        media.bytes.len(),
        media.duration.as_secs_f64(),
        media.has_audio
    );
    Ok(())
}
