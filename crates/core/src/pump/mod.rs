//! Fixed-cadence driver. Each frame runs, in order: the idle animator, the
//! smoothing resolution of every queued parameter, and the rig hand-off.
//! The pump itself holds no engine state.

use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread::{self, JoinHandle},
    time::{Duration, Instant},
};

use serde::Serialize;

use crate::{
    controller::{ControlState, Controller},
    registry::ParameterUpdate,
    Result, RigError,
};

/// Fully resolved parameter set of one frame.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FrameReport {
    pub frame: u64,
    pub timestamp: f64,
    pub values: Vec<ParameterUpdate>,
    /// Parameters whose resolution or rig write failed this frame.
    pub skipped: Vec<String>,
}

/// Receives each frame after the rig has rendered it.
pub trait FrameSink {
    fn present(&mut self, report: &FrameReport);
}

impl<F> FrameSink for F
where
    F: FnMut(&FrameReport),
{
    fn present(&mut self, report: &FrameReport) {
        self(report)
    }
}

/// Runs one frame against already-locked state. Returns `None` without a rig.
pub(crate) fn run_frame(state: &mut ControlState, now: f64) -> Option<FrameReport> {
    if !state.is_ready() {
        return None;
    }
    state.animate(now);
    let skipped = state.resolve_queued();
    state.present();
    Some(state.finish_frame(now, skipped))
}

#[derive(Debug, Clone)]
pub struct FramePump {
    controller: Controller,
    interval: Duration,
}

impl FramePump {
    pub fn new(controller: Controller, frame_rate: u32) -> Self {
        Self {
            controller,
            interval: Duration::from_secs_f64(1.0 / f64::from(frame_rate.max(1))),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Ticks once. Failures are logged and reported as a missing frame.
    pub fn step(&self, sink: &mut dyn FrameSink) -> Option<FrameReport> {
        match self.controller.tick() {
            Ok(Some(report)) => {
                sink.present(&report);
                Some(report)
            }
            Ok(None) => None,
            Err(err) => {
                tracing::warn!(%err, "frame skipped");
                None
            }
        }
    }

    /// Ticks at the configured cadence until `stop` is raised. Returns the
    /// number of frames produced.
    pub fn run(&self, stop: &AtomicBool, sink: &mut dyn FrameSink) -> u64 {
        let mut frames = 0;
        let mut deadline = Instant::now();
        while !stop.load(Ordering::Acquire) {
            if self.step(sink).is_some() {
                frames += 1;
            }

            deadline += self.interval;
            let now = Instant::now();
            if deadline > now {
                thread::sleep(deadline - now);
            } else if now - deadline > self.interval {
                // Too far behind to catch up; drop the backlog.
                deadline = now;
            }
        }
        frames
    }

    /// Moves the pump onto its own thread.
    pub fn spawn(self, mut sink: Box<dyn FrameSink + Send>) -> Result<PumpHandle> {
        let stop = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&stop);
        tracing::info!(interval_ms = self.interval.as_secs_f64() * 1000.0, "frame pump starting");
        let thread = thread::Builder::new()
            .name("frame-pump".to_string())
            .spawn(move || self.run(&flag, sink.as_mut()))?;
        Ok(PumpHandle {
            stop,
            thread: Some(thread),
        })
    }
}

/// Owner of a running pump thread. Dropping it stops the pump.
#[derive(Debug)]
pub struct PumpHandle {
    stop: Arc<AtomicBool>,
    thread: Option<JoinHandle<u64>>,
}

impl PumpHandle {
    /// Stops the pump and returns how many frames it produced.
    pub fn stop(mut self) -> Result<u64> {
        self.shutdown()
    }

    fn shutdown(&mut self) -> Result<u64> {
        self.stop.store(true, Ordering::Release);
        let Some(thread) = self.thread.take() else {
            return Ok(0);
        };
        let frames = thread
            .join()
            .map_err(|_| RigError::msg("frame pump thread panicked"))?;
        tracing::info!(frames, "frame pump stopped");
        Ok(frames)
    }
}

impl Drop for PumpHandle {
    fn drop(&mut self) {
        if let Err(err) = self.shutdown() {
            tracing::warn!(%err, "frame pump did not shut down cleanly");
        }
    }
}
