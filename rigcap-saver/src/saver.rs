//! The frame saver: ingestion entry points and the dump dispatcher.

use crate::clock::{Clock, SystemClock};
use crate::config::{SaverConfig, SyncWindow};
use crate::error::SaverError;
use crate::gate::{self, GateError};
use crate::layout::SaveLayout;
use crate::preview::{PreviewRing, PreviewSink, render_mosaic};
use crate::store::{CalibrationInfo, Frame, PositionSnapshot, PositionState};
use parking_lot::Mutex;
use rigcap_capture::{CalibrationMessage, CalibrationPayload, RawFrame, RigPosition, StreamKind, decode};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// What asked for a dump.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DumpTrigger {
    /// Explicit "save now".
    Manual,
    /// Location update; dumps only when it equals the configured sentinel.
    Location(String),
}

impl DumpTrigger {
    pub fn fires(&self, sentinel: &str) -> bool {
        match self {
            DumpTrigger::Manual => true,
            DumpTrigger::Location(location) => location == sentinel,
        }
    }
}

/// Result of one dump for one rig position.
#[derive(Debug, Clone, PartialEq)]
pub enum PositionOutcome {
    Saved { files: Vec<PathBuf> },
    Skipped(GateError),
    Failed(String),
}

/// Summary of one dump invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct DumpReport {
    pub cycle: u64,
    pub outcomes: BTreeMap<RigPosition, PositionOutcome>,
}

impl DumpReport {
    pub fn saved_count(&self) -> usize {
        self.outcomes
            .values()
            .filter(|o| matches!(o, PositionOutcome::Saved { .. }))
            .count()
    }

    pub fn files(&self) -> impl Iterator<Item = &PathBuf> {
        self.outcomes
            .values()
            .filter_map(|o| match o {
                PositionOutcome::Saved { files } => Some(files),
                _ => None,
            })
            .flatten()
    }
}

struct DumpState {
    cycle: u64,
    color_history: PreviewRing<Arc<Frame>>,
    depth_history: PreviewRing<Arc<Frame>>,
}

/// Buffers the latest frame per (position, stream) and dumps complete,
/// time-coherent sets to disk.
///
/// Each position sits behind its own lock, so ingestion for one position never
/// waits on another. Dumps are serialized and hold a position's lock only for
/// the snapshot and flag reset, never across disk writes.
pub struct FrameSaver {
    config: SaverConfig,
    window: SyncWindow,
    layout: SaveLayout,
    positions: BTreeMap<RigPosition, Mutex<PositionState>>,
    dump_state: Mutex<DumpState>,
    clock: Arc<dyn Clock>,
    preview_sink: Option<Box<dyn PreviewSink>>,
}

impl FrameSaver {
    /// Create a saver writing to a fresh dated run directory under
    /// `config.output_root`.
    pub fn new(config: SaverConfig) -> Result<Self, SaverError> {
        let layout = SaveLayout::dated(&config.output_root)?;
        Self::with_layout(config, layout)
    }

    pub fn with_layout(config: SaverConfig, layout: SaveLayout) -> Result<Self, SaverError> {
        config.validate()?;
        let positions = config
            .topic_prefixes
            .iter()
            .map(|p| (p.clone(), Mutex::new(PositionState::new())))
            .collect();

        info!(
            "Saver for [{}] writing to {:?} (max skew {:.3}s)",
            config
                .topic_prefixes
                .iter()
                .map(RigPosition::as_str)
                .collect::<Vec<_>>()
                .join(", "),
            layout.dir(),
            config.max_time_difference()
        );

        Ok(Self {
            window: config.sync_window(),
            config,
            layout,
            positions,
            dump_state: Mutex::new(DumpState {
                cycle: 0,
                color_history: PreviewRing::new(),
                depth_history: PreviewRing::new(),
            }),
            clock: Arc::new(SystemClock),
            preview_sink: None,
        })
    }

    /// Replace the time source.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Publish a preview mosaic after every saved position.
    pub fn with_preview_sink(mut self, sink: impl PreviewSink + 'static) -> Self {
        self.preview_sink = Some(Box::new(sink));
        self
    }

    pub fn config(&self) -> &SaverConfig {
        &self.config
    }

    pub fn layout(&self) -> &SaveLayout {
        &self.layout
    }

    pub fn positions(&self) -> impl Iterator<Item = &RigPosition> {
        self.positions.keys()
    }

    /// ID the next dump will use.
    pub fn cycle(&self) -> u64 {
        self.dump_state.lock().cycle
    }

    fn position(&self, position: &RigPosition) -> Result<&Mutex<PositionState>, SaverError> {
        self.positions
            .get(position)
            .ok_or_else(|| SaverError::UnknownPosition(position.clone()))
    }

    pub fn freshness(&self, position: &RigPosition) -> Result<[bool; StreamKind::COUNT], SaverError> {
        Ok(self.position(position)?.lock().freshness())
    }

    pub fn snapshot(&self, position: &RigPosition) -> Result<PositionSnapshot, SaverError> {
        Ok(self.position(position)?.lock().snapshot(position))
    }

    /// Run the dump gate against the live state without mutating it.
    pub fn check(&self, position: &RigPosition) -> Result<Result<(), GateError>, SaverError> {
        let snapshot = self.snapshot(position)?;
        Ok(gate::check(&snapshot, &self.window))
    }

    /// Record a frame, stamped with the current time.
    pub fn ingest(&self, position: &RigPosition, kind: StreamKind, raw: &RawFrame) -> Result<(), SaverError> {
        self.ingest_at(position, kind, raw, self.clock.now())
    }

    /// Record a frame with an explicit arrival time.
    ///
    /// Malformed payloads are dropped and reported; the stored state is left
    /// untouched.
    pub fn ingest_at(
        &self,
        position: &RigPosition,
        kind: StreamKind,
        raw: &RawFrame,
        arrived: f64,
    ) -> Result<(), SaverError> {
        let slot = self.position(position)?;
        if !arrived.is_finite() {
            warn!("Dropping {}/{} frame with arrival time {}", position, kind, arrived);
            return Err(SaverError::InvalidArrival {
                position: position.clone(),
                kind,
                arrived,
            });
        }
        let image = decode(kind, raw).map_err(|source| {
            warn!("Dropping {}/{} frame: {}", position, kind, source);
            SaverError::Decode {
                position: position.clone(),
                kind,
                source,
            }
        })?;

        slot.lock().store(Frame {
            position: position.clone(),
            kind,
            image,
            arrived,
        });
        debug!("Stored {}/{} frame at {:.3}", position, kind, arrived);
        Ok(())
    }

    /// Record a calibration update. Latest value wins.
    pub fn ingest_calibration(
        &self,
        position: &RigPosition,
        kind: StreamKind,
        message: &CalibrationMessage,
    ) -> Result<(), SaverError> {
        let slot = self.position(position)?;
        let payload = CalibrationPayload::try_from(message)
            .map_err(|e| SaverError::calibration(position, kind, e))?;
        slot.lock().update_calibration(kind, payload);
        debug!("Updated {} calibration for {}/{}", message.kind, position, kind);
        Ok(())
    }

    /// Dump if the trigger fires; `Ok(None)` means the trigger was ignored and
    /// nothing changed.
    pub fn dump_on(&self, trigger: &DumpTrigger) -> Result<Option<DumpReport>, SaverError> {
        if !trigger.fires(&self.config.location_sentinel) {
            debug!("Ignoring trigger {:?}", trigger);
            return Ok(None);
        }
        self.dump().map(Some)
    }

    /// Persist every position whose frame set passes the gate.
    ///
    /// Only a failure to create the run directory aborts the dump, and it does
    /// so before any state changes. The cycle ID advances exactly once per
    /// call that gets past that point.
    #[tracing::instrument(skip_all, fields(dir = %self.layout.dir().display()))]
    pub fn dump(&self) -> Result<DumpReport, SaverError> {
        let mut state = self.dump_state.lock();
        self.layout.ensure_dir()?;

        let cycle = state.cycle;
        let save_time = self.clock.now();
        let mut outcomes = BTreeMap::new();

        for (position, slot) in &self.positions {
            let accepted = {
                let mut live = slot.lock();
                let snapshot = live.snapshot(position);
                let verdict = gate::check(&snapshot, &self.window);
                if verdict.is_ok() {
                    live.mark_consumed();
                }
                verdict.map(|()| snapshot)
            };

            let outcome = match accepted {
                Err(reason) => {
                    warn!("{}, cannot save", reason);
                    PositionOutcome::Skipped(reason)
                }
                Ok(snapshot) => {
                    let outcome = match self.persist(cycle, save_time, &snapshot) {
                        Ok(files) => PositionOutcome::Saved { files },
                        Err(e) => {
                            error!("Failed to save '{}' frame set: {}", position, e);
                            PositionOutcome::Failed(e.to_string())
                        }
                    };
                    self.update_preview(&mut state, &snapshot);
                    outcome
                }
            };
            outcomes.insert(position.clone(), outcome);
        }

        state.cycle += 1;

        let report = DumpReport { cycle, outcomes };
        info!(
            "Dump {} saved {}/{} positions",
            cycle,
            report.saved_count(),
            self.positions.len()
        );
        Ok(report)
    }

    fn persist(&self, cycle: u64, save_time: f64, snapshot: &PositionSnapshot) -> Result<Vec<PathBuf>, SaverError> {
        let mut files = Vec::with_capacity(StreamKind::COUNT + 1);

        if !snapshot.calibration.is_empty() {
            let path = self.layout.camera_info_path(cycle, &snapshot.position);
            info!("Saving file {:?}", path);
            fs::write(&path, camera_info_json(&snapshot.calibration, save_time)?)?;
            files.push(path);
        }

        for frame in snapshot.present() {
            let path = self.layout.image_path(cycle, &snapshot.position, frame.kind);
            info!("Saving file {:?}", path);
            frame.image.save(&path)?;
            files.push(path);
        }

        Ok(files)
    }

    fn update_preview(&self, state: &mut DumpState, snapshot: &PositionSnapshot) {
        if let Some(color) = snapshot.frame(StreamKind::Color) {
            state.color_history.push(color.clone());
        }
        if let Some(depth) = snapshot.frame(StreamKind::DepthAligned) {
            state.depth_history.push(depth.clone());
        }

        let Some(sink) = &self.preview_sink else {
            return;
        };
        if let Some(mosaic) = render_mosaic(&state.color_history, &state.depth_history) {
            if let Err(e) = sink.publish(mosaic) {
                warn!("Preview not published: {}", e);
            }
        }
    }
}

/// Calibration document: one key per stream plus `save_time`, sorted keys,
/// four-space indent.
pub fn camera_info_json(calibration: &CalibrationInfo, save_time: f64) -> Result<Vec<u8>, SaverError> {
    let mut doc: BTreeMap<String, serde_json::Value> = BTreeMap::new();
    for (kind, entry) in calibration {
        doc.insert(kind.name().to_string(), serde_json::to_value(entry)?);
    }
    doc.insert("save_time".to_string(), serde_json::Value::from(save_time));

    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut serializer = serde_json::Serializer::with_formatter(&mut buf, formatter);
    doc.serialize(&mut serializer)?;
    Ok(buf)
}
