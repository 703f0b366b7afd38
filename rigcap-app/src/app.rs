//! Recorder wiring and main run loop with builder pattern.

use crate::command::Command;
use crossbeam_channel::{Receiver, Sender, TrySendError};
use image::RgbImage;
use rigcap_capture::{CaptureError, CaptureSource, StreamKind, SyntheticSource, synthetic_calibration};
use rigcap_saver::{DumpTrigger, FrameSaver, SaverConfig};
use std::error::Error;
use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use tracing::{debug, error, info, warn};

/// Logging configuration.
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Builder for configuring and running the recorder.
pub struct AppBuilder {
    config: SaverConfig,
    frame_size: (u32, u32),
    frame_limit: Option<u64>,
    preview_path: Option<PathBuf>,
    logging: LoggingConfig,
}

impl AppBuilder {
    pub fn new(config: SaverConfig) -> Self {
        Self {
            config,
            frame_size: (640, 480),
            frame_limit: None,
            preview_path: None,
            logging: LoggingConfig::default(),
        }
    }

    /// Set the synthetic frame size.
    pub fn with_frame_size(mut self, width: u32, height: u32) -> Self {
        self.frame_size = (width, height);
        self
    }

    /// End every capture stream after this many frames.
    pub fn with_frame_limit(mut self, limit: Option<u64>) -> Self {
        self.frame_limit = limit;
        self
    }

    /// Write the preview mosaic to this file after every save.
    pub fn with_preview_path(mut self, path: Option<PathBuf>) -> Self {
        self.preview_path = path;
        self
    }

    /// Configure logging.
    pub fn with_logging(mut self, config: LoggingConfig) -> Self {
        self.logging = config;
        self
    }

    /// Run until the user quits or stdin closes.
    pub fn run(self) -> Result<(), Box<dyn Error>> {
        self.init_logging();

        let (width, height) = self.frame_size;
        let fps = self.config.sensor_fps as f32;
        let mut saver = FrameSaver::new(self.config)?;

        let preview = match self.preview_path {
            Some(path) => {
                let (tx, rx) = crossbeam_channel::bounded::<RgbImage>(1);
                saver = saver.with_preview_sink(tx);
                Some(spawn_preview_writer(path, rx)?)
            }
            None => None,
        };
        let saver = Arc::new(saver);

        for position in saver.positions() {
            for kind in StreamKind::ALL {
                for message in synthetic_calibration(kind, width, height) {
                    saver.ingest_calibration(position, kind, &message)?;
                }
            }
        }

        let shutdown = Arc::new(AtomicBool::new(false));
        let mut producers = Vec::new();
        for position in saver.positions() {
            for kind in StreamKind::ALL {
                let mut source = SyntheticSource::new(position.clone(), kind, width, height, fps);
                if let Some(limit) = self.frame_limit {
                    source = source.with_frame_limit(limit);
                }
                producers.push(spawn_producer(Box::new(source), Arc::clone(&saver), Arc::clone(&shutdown))?);
            }
        }
        info!("Started {} capture streams", producers.len());

        let (trigger_tx, trigger_rx) = crossbeam_channel::bounded::<DumpTrigger>(1);
        let worker = spawn_dump_worker(Arc::clone(&saver), trigger_rx)?;

        let result = console_loop(&trigger_tx);

        shutdown.store(true, Ordering::Relaxed);
        drop(trigger_tx);
        for handle in producers {
            join(handle);
        }
        join(worker);
        // Last sink owner; closes the preview channel.
        drop(saver);
        if let Some(handle) = preview {
            join(handle);
        }

        info!("Recorder stopped");
        result
    }

    fn init_logging(&self) {
        tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&self.logging.level)),
            )
            .with_target(false)
            .init();
    }
}

fn join(handle: JoinHandle<()>) {
    let name = handle.thread().name().unwrap_or("worker").to_string();
    if handle.join().is_err() {
        error!("Thread '{}' panicked", name);
    }
}

/// Pump frames from one source into the saver until shutdown or end of
/// stream. Returns how many frames the saver accepted.
fn pump(source: &mut dyn CaptureSource, saver: &FrameSaver, shutdown: &AtomicBool) -> u64 {
    let (position, kind) = {
        let (position, kind) = source.stream();
        (position.clone(), kind)
    };

    let mut accepted = 0;
    while !shutdown.load(Ordering::Relaxed) {
        match source.next_frame() {
            Ok(Some(frame)) => match saver.ingest(&position, kind, &frame.raw) {
                Ok(()) => accepted += 1,
                Err(e) => debug!("{}/{} frame {} dropped: {}", position, kind, frame.frame_number, e),
            },
            Ok(None) => break,
            Err(CaptureError::StreamEnded) => {
                info!("{}/{} stream ended", position, kind);
                break;
            }
            Err(e) => {
                error!("{}/{} capture failed: {}", position, kind, e);
                break;
            }
        }
    }
    source.stop();
    accepted
}

fn spawn_producer(
    mut source: Box<dyn CaptureSource>,
    saver: Arc<FrameSaver>,
    shutdown: Arc<AtomicBool>,
) -> std::io::Result<JoinHandle<()>> {
    let (position, kind) = source.stream();
    let name = format!("capture-{}-{}", position, kind);

    thread::Builder::new().name(name).spawn(move || {
        pump(source.as_mut(), &saver, &shutdown);
    })
}

/// Run dumps one at a time in trigger order.
fn spawn_dump_worker(saver: Arc<FrameSaver>, triggers: Receiver<DumpTrigger>) -> std::io::Result<JoinHandle<()>> {
    thread::Builder::new().name("dump-worker".to_string()).spawn(move || {
        for trigger in triggers.iter() {
            match saver.dump_on(&trigger) {
                Ok(Some(report)) => debug!("Dump {} finished", report.cycle),
                Ok(None) => debug!("Trigger {:?} ignored", trigger),
                Err(e) => error!("Dump failed: {}", e),
            }
        }
    })
}

fn spawn_preview_writer(path: PathBuf, mosaics: Receiver<RgbImage>) -> std::io::Result<JoinHandle<()>> {
    thread::Builder::new().name("preview".to_string()).spawn(move || {
        for mosaic in mosaics.iter() {
            match mosaic.save(&path) {
                Ok(()) => debug!("Preview written to {:?}", path),
                Err(e) => warn!("Could not write preview {:?}: {}", path, e),
            }
        }
    })
}

fn console_loop(triggers: &Sender<DumpTrigger>) -> Result<(), Box<dyn Error>> {
    let stdin = std::io::stdin();
    let mut stdout = std::io::stdout();
    writeln!(stdout, "Press 's' + Enter to save frames, 'q' + Enter to quit")?;

    for line in stdin.lock().lines() {
        match Command::parse(&line?) {
            Command::Save => match triggers.try_send(DumpTrigger::Manual) {
                Ok(()) => info!("Save requested"),
                Err(TrySendError::Full(_)) => warn!("A save is already pending, trigger dropped"),
                Err(TrySendError::Disconnected(_)) => return Err("dump worker stopped".into()),
            },
            Command::Quit => break,
            Command::Empty => {}
            Command::Unknown => writeln!(stdout, "Unknown command, use 's' to save or 'q' to quit")?,
        }
    }

    Ok(())
}
