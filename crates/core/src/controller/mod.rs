//! The single synchronized owner of engine state.
//!
//! [`Controller`] is a cheap, cloneable handle over one mutex-guarded
//! [`ControlState`]. The frame pump and any number of command callers share
//! it; every mutation happens under the same lock, so a command's sample is
//! always visible to the next frame.

use std::{
    collections::BTreeMap,
    fmt,
    path::{Path, PathBuf},
    sync::{Arc, Mutex, MutexGuard},
};

use serde::Serialize;

use crate::{
    animator::AutoAnimator,
    clock::{Clock, MonotonicClock},
    config::EngineConfig,
    lock::LockArbiter,
    playback::{MotionRequest, PlaybackCoordinator, PlaybackState},
    pump::{self, FrameReport},
    registry::{Parameter, ParameterRegistry},
    rig::{Rig, RigLoader},
    smoothing::{SmoothingInfo, SmoothingPipeline, SmoothingSettings},
    Result, RigError,
};

/// Snapshot of the active rig for the command layer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RigInfo {
    pub source: Option<PathBuf>,
    pub parameter_count: usize,
    pub expressions: Vec<String>,
    pub playback: PlaybackState,
    pub locked_parameters: Vec<String>,
    pub frames: u64,
}

pub struct ControlState {
    lock_duration: f64,
    rig: Option<Box<dyn Rig>>,
    source: Option<PathBuf>,
    registry: ParameterRegistry,
    smoothing: SmoothingPipeline,
    locks: LockArbiter,
    animator: AutoAnimator,
    playback: PlaybackCoordinator,
    frames: u64,
}

impl ControlState {
    fn new(config: &EngineConfig) -> Self {
        Self {
            lock_duration: config.lock_duration_secs,
            rig: None,
            source: None,
            registry: ParameterRegistry::new(),
            smoothing: SmoothingPipeline::new(
                config.smoothing.window_length,
                config.smoothing.enabled,
            ),
            locks: LockArbiter::new(),
            animator: AutoAnimator::new(config.animator.clone()),
            playback: PlaybackCoordinator::new(),
            frames: 0,
        }
    }

    pub(crate) fn is_ready(&self) -> bool {
        self.rig.is_some()
    }

    fn ensure_ready(&self) -> Result<()> {
        if self.is_ready() {
            Ok(())
        } else {
            Err(RigError::NotReady)
        }
    }

    /// Installs `rig` and hands back the one it replaces, so the caller can
    /// drop it after releasing the lock.
    fn swap_rig(
        &mut self,
        rig: Box<dyn Rig>,
        registry: ParameterRegistry,
        source: Option<PathBuf>,
    ) -> Option<Box<dyn Rig>> {
        let previous = self.rig.replace(rig);
        self.source = source;
        self.registry = registry;
        self.reset_runtime();
        previous
    }

    fn take_rig(&mut self) -> Option<Box<dyn Rig>> {
        let rig = self.rig.take()?;
        self.source = None;
        self.registry = ParameterRegistry::new();
        self.reset_runtime();
        Some(rig)
    }

    fn reset_runtime(&mut self) {
        self.smoothing.clear();
        self.locks.clear();
        self.animator.reset();
        self.playback.clear();
        self.frames = 0;
    }

    fn set_parameter(&mut self, now: f64, id: &str, value: f32) -> Result<f32> {
        self.ensure_ready()?;
        let param = self.registry.get(id)?;
        if !value.is_finite() {
            return Err(RigError::NonFinite { id: id.to_string() });
        }
        let clamped = param.clamp(value);
        if clamped != value {
            tracing::debug!(parameter = id, requested = value, clamped, "value clamped into range");
        }

        self.smoothing.enqueue(&self.registry, id, clamped)?;
        let resolved = self.smoothing.resolve(&mut self.registry, id)?;
        self.locks.acquire(id, now, self.lock_duration);
        Ok(resolved)
    }

    /// Writes every parameter's default and queues it so the next frame
    /// pushes it to the rig. Pending samples and locks are discarded.
    fn reset_parameters(&mut self) -> Result<usize> {
        self.ensure_ready()?;
        self.smoothing.clear();
        self.locks.clear();

        let defaults: Vec<(String, f32)> = self
            .registry
            .iter()
            .map(|param| (param.id().to_string(), param.default_value()))
            .collect();
        for (id, default) in &defaults {
            let value = self.registry.write(id, *default)?;
            self.smoothing.enqueue(&self.registry, id, value)?;
        }
        Ok(defaults.len())
    }

    fn rig_info(&mut self, now: f64) -> Result<RigInfo> {
        let rig = self.rig.as_deref().ok_or(RigError::NotReady)?;
        Ok(RigInfo {
            source: self.source.clone(),
            parameter_count: self.registry.len(),
            expressions: rig.enumerate_expressions(),
            playback: self.playback.state().clone(),
            locked_parameters: self.locks.locked_ids(now),
            frames: self.frames,
        })
    }

    /// Frame phase 1: queue the idle animator's proposals.
    pub(crate) fn animate(&mut self, now: f64) {
        let proposals = self.animator.step(now, &self.registry, &mut self.locks);
        for update in proposals {
            if let Err(err) = self.smoothing.enqueue(&self.registry, &update.target, update.value) {
                tracing::warn!(parameter = %update.target, %err, "idle proposal dropped");
            }
        }
    }

    /// Frame phase 2: resolve every queued parameter and push it to the rig.
    /// Returns the ids that failed; the rig keeps its previous value for them.
    pub(crate) fn resolve_queued(&mut self) -> Vec<String> {
        let mut skipped = Vec::new();
        let Some(rig) = self.rig.as_deref_mut() else {
            return skipped;
        };

        for id in self.smoothing.queued_ids() {
            let written = self
                .smoothing
                .resolve(&mut self.registry, &id)
                .and_then(|value| rig.set_parameter_value(&id, value));
            if let Err(err) = written {
                tracing::warn!(parameter = %id, %err, "parameter skipped this frame");
                skipped.push(id);
            }
        }
        skipped
    }

    /// Frame phase 3: let the rig advance its own curves and render.
    pub(crate) fn present(&mut self) {
        let Some(rig) = self.rig.as_deref_mut() else {
            return;
        };
        if let Err(err) = rig.advance_frame() {
            tracing::warn!(%err, "rig failed to advance");
        }
        if let Err(err) = rig.render_frame() {
            tracing::warn!(%err, "rig failed to render");
        }
    }

    pub(crate) fn finish_frame(&mut self, now: f64, skipped: Vec<String>) -> FrameReport {
        self.frames += 1;
        FrameReport {
            frame: self.frames,
            timestamp: now,
            values: self.registry.snapshot(),
            skipped,
        }
    }
}

impl fmt::Debug for ControlState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ControlState")
            .field("source", &self.source)
            .field("ready", &self.is_ready())
            .field("parameters", &self.registry.len())
            .field("smoothing", &self.smoothing.info())
            .field("frames", &self.frames)
            .finish()
    }
}

/// Shared, thread-safe handle over the engine state.
#[derive(Clone)]
pub struct Controller {
    shared: Arc<Mutex<ControlState>>,
    clock: Arc<dyn Clock>,
}

impl Controller {
    pub fn new(config: EngineConfig) -> Self {
        Self::with_clock(config, Arc::new(MonotonicClock::start()))
    }

    pub fn with_clock(config: EngineConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            shared: Arc::new(Mutex::new(ControlState::new(&config))),
            clock,
        }
    }

    pub fn now(&self) -> f64 {
        self.clock.now()
    }

    pub fn is_ready(&self) -> Result<bool> {
        Ok(self.lock()?.is_ready())
    }

    /// Loads a rig and makes it active. The load and metadata enumeration run
    /// without holding the engine lock; on failure the previous rig stays.
    pub fn load_rig(&self, loader: &dyn RigLoader, source: &Path) -> Result<RigInfo> {
        tracing::info!(source = %source.display(), "loading rig");
        let installed = loader
            .load(source)
            .and_then(|rig| self.install(rig, Some(source.to_path_buf())));
        if let Err(err) = &installed {
            tracing::warn!(source = %source.display(), %err, "rig load failed, keeping the active rig");
        }
        installed
    }

    /// Activates an already constructed rig.
    pub fn install_rig(&self, rig: Box<dyn Rig>) -> Result<RigInfo> {
        self.install(rig, None)
    }

    fn install(&self, rig: Box<dyn Rig>, source: Option<PathBuf>) -> Result<RigInfo> {
        let registry = ParameterRegistry::load(rig.enumerate_parameters()?)?;
        let count = registry.len();
        let now = self.now();

        let (previous, info) = {
            let mut state = self.lock()?;
            let previous = state.swap_rig(rig, registry, source);
            (previous, state.rig_info(now))
        };
        drop(previous);
        tracing::info!(parameters = count, "rig activated");
        info
    }

    /// Drops the active rig and all per-rig state. Returns whether a rig was
    /// loaded.
    pub fn unload_rig(&self) -> Result<bool> {
        let previous = self.lock()?.take_rig();
        if previous.is_some() {
            tracing::info!("rig unloaded");
        }
        Ok(previous.is_some())
    }

    /// Queues an explicit value, resolves it immediately and holds idle
    /// animation off the parameter for the configured lock duration. Returns
    /// the resolved value.
    pub fn set_parameter(&self, id: &str, value: f32) -> Result<f32> {
        let now = self.now();
        self.lock()?
            .set_parameter(now, id, value)
            .map_err(|err| {
                tracing::warn!(parameter = id, %err, "parameter command rejected");
                err
            })
    }

    /// Applies every entry independently and returns how many succeeded.
    pub fn set_parameters<I, K>(&self, values: I) -> Result<usize>
    where
        I: IntoIterator<Item = (K, f32)>,
        K: AsRef<str>,
    {
        let now = self.now();
        let mut state = self.lock()?;
        state.ensure_ready()?;

        let mut applied = 0;
        for (id, value) in values {
            match state.set_parameter(now, id.as_ref(), value) {
                Ok(_) => applied += 1,
                Err(err) => {
                    tracing::warn!(parameter = id.as_ref(), %err, "parameter command rejected")
                }
            }
        }
        Ok(applied)
    }

    pub fn play_motion(&self, name: &str, index: usize, priority: u32) -> Result<()> {
        let mut state = self.lock()?;
        let state = &mut *state;
        let rig = state.rig.as_deref_mut().ok_or(RigError::NotReady)?;
        state
            .playback
            .play_motion(rig, MotionRequest::new(name, index, priority))
    }

    pub fn play_expression(&self, name: &str) -> Result<()> {
        let mut state = self.lock()?;
        let state = &mut *state;
        let rig = state.rig.as_deref_mut().ok_or(RigError::NotReady)?;
        state.playback.play_expression(rig, name)
    }

    pub fn reset_expression(&self) -> Result<()> {
        let mut state = self.lock()?;
        let state = &mut *state;
        let rig = state.rig.as_deref_mut().ok_or(RigError::NotReady)?;
        state.playback.reset_expression(rig)
    }

    pub fn stop_all_motions(&self) -> Result<()> {
        let mut state = self.lock()?;
        let state = &mut *state;
        let rig = state.rig.as_deref_mut().ok_or(RigError::NotReady)?;
        state.playback.stop_all_motions(rig)
    }

    /// Returns every parameter to its rig default. Returns how many were reset.
    pub fn reset_parameters(&self) -> Result<usize> {
        let reset = self.lock()?.reset_parameters()?;
        tracing::info!(parameters = reset, "parameters reset to defaults");
        Ok(reset)
    }

    pub fn smoothing_info(&self) -> Result<SmoothingInfo> {
        Ok(self.lock()?.smoothing.info())
    }

    pub fn set_smoothing_settings(&self, settings: SmoothingSettings) -> Result<SmoothingInfo> {
        let mut state = self.lock()?;
        state.smoothing.apply(settings);
        let info = state.smoothing.info();
        tracing::info!(enabled = info.enabled, window = info.window_length, "smoothing updated");
        Ok(info)
    }

    pub fn set_auto_blink(&self, enabled: bool) -> Result<()> {
        self.lock()?.animator.set_auto_blink(enabled);
        Ok(())
    }

    pub fn set_auto_breath(&self, enabled: bool) -> Result<()> {
        self.lock()?.animator.set_auto_breath(enabled);
        Ok(())
    }

    /// Holds idle animation off `id` for `duration` seconds, or the
    /// configured lock duration. Returns the expiry time.
    pub fn lock_parameter(&self, id: &str, duration: Option<f64>) -> Result<f64> {
        let now = self.now();
        let mut state = self.lock()?;
        state.ensure_ready()?;
        state.registry.get(id)?;
        let duration = duration.unwrap_or(state.lock_duration);
        Ok(state.locks.acquire(id, now, duration))
    }

    pub fn is_locked(&self, id: &str) -> Result<bool> {
        let now = self.now();
        let mut state = self.lock()?;
        state.ensure_ready()?;
        state.registry.get(id)?;
        Ok(state.locks.is_locked(id, now))
    }

    pub fn parameter(&self, id: &str) -> Result<Parameter> {
        let state = self.lock()?;
        state.ensure_ready()?;
        state.registry.get(id).cloned()
    }

    pub fn parameter_ids(&self) -> Result<Vec<String>> {
        let state = self.lock()?;
        state.ensure_ready()?;
        Ok(state.registry.list().to_vec())
    }

    pub fn parameter_values(&self) -> Result<BTreeMap<String, f32>> {
        let state = self.lock()?;
        state.ensure_ready()?;
        Ok(state
            .registry
            .iter()
            .map(|param| (param.id().to_string(), param.value()))
            .collect())
    }

    pub fn rig_info(&self) -> Result<RigInfo> {
        let now = self.now();
        self.lock()?.rig_info(now)
    }

    /// Runs one frame. `Ok(None)` means no rig is loaded.
    pub fn tick(&self) -> Result<Option<FrameReport>> {
        let now = self.now();
        let mut state = self.lock()?;
        Ok(pump::run_frame(&mut state, now))
    }

    fn lock(&self) -> Result<MutexGuard<'_, ControlState>> {
        self.shared
            .lock()
            .map_err(|_| RigError::Poisoned("controller state"))
    }
}

impl fmt::Debug for Controller {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Controller")
            .field("clock", &self.clock)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};

    use approx::assert_relative_eq;

    use super::*;
    use crate::{
        clock::ManualClock,
        config::AnimatorConfig,
        registry::ParameterInfo,
        rig::SimulatedRig,
        smoothing::weighted_average,
        EntityKind,
    };

    fn config(auto_blink: bool, auto_breath: bool) -> EngineConfig {
        EngineConfig {
            animator: AnimatorConfig {
                auto_blink,
                auto_breath,
                seed: Some(5),
                ..AnimatorConfig::default()
            },
            ..EngineConfig::default()
        }
    }

    fn loaded(config: EngineConfig) -> (Controller, Arc<ManualClock>, SimulatedRig) {
        let clock = Arc::new(ManualClock::new());
        let controller = Controller::with_clock(config, clock.clone());
        let rig = SimulatedRig::standard();
        controller.install_rig(Box::new(rig.clone())).unwrap();
        (controller, clock, rig)
    }

    /// Fails every write to one parameter, delegating everything else.
    #[derive(Debug)]
    struct FlakyRig {
        inner: SimulatedRig,
        broken: &'static str,
    }

    impl Rig for FlakyRig {
        fn enumerate_parameters(&self) -> Result<Vec<ParameterInfo>> {
            self.inner.enumerate_parameters()
        }

        fn set_parameter_value(&mut self, id: &str, value: f32) -> Result<()> {
            if id == self.broken {
                return Err(RigError::msg("actuator stuck"));
            }
            self.inner.set_parameter_value(id, value)
        }

        fn enumerate_expressions(&self) -> Vec<String> {
            self.inner.enumerate_expressions()
        }

        fn start_motion(&mut self, request: &MotionRequest) -> Result<()> {
            self.inner.start_motion(request)
        }

        fn set_expression(&mut self, id: &str) -> Result<()> {
            self.inner.set_expression(id)
        }

        fn advance_frame(&mut self) -> Result<()> {
            self.inner.advance_frame()
        }

        fn render_frame(&mut self) -> Result<()> {
            self.inner.render_frame()
        }
    }

    /// Records whether the controller lock was free when the rig was dropped.
    #[derive(Debug)]
    struct DropWitness {
        inner: SimulatedRig,
        controller: Controller,
        dropped_unlocked: Arc<AtomicBool>,
    }

    impl Rig for DropWitness {
        fn enumerate_parameters(&self) -> Result<Vec<ParameterInfo>> {
            self.inner.enumerate_parameters()
        }

        fn set_parameter_value(&mut self, id: &str, value: f32) -> Result<()> {
            self.inner.set_parameter_value(id, value)
        }

        fn enumerate_expressions(&self) -> Vec<String> {
            self.inner.enumerate_expressions()
        }

        fn start_motion(&mut self, request: &MotionRequest) -> Result<()> {
            self.inner.start_motion(request)
        }

        fn set_expression(&mut self, id: &str) -> Result<()> {
            self.inner.set_expression(id)
        }

        fn advance_frame(&mut self) -> Result<()> {
            self.inner.advance_frame()
        }

        fn render_frame(&mut self) -> Result<()> {
            self.inner.render_frame()
        }
    }

    impl Drop for DropWitness {
        fn drop(&mut self) {
            let free = self.controller.shared.try_lock().is_ok();
            self.dropped_unlocked.store(free, Ordering::SeqCst);
        }
    }

    #[test]
    fn every_command_needs_a_rig() {
        let controller = Controller::new(config(false, false));

        assert!(matches!(controller.set_parameter("ParamAngleX", 1.0), Err(RigError::NotReady)));
        assert!(matches!(
            controller.set_parameters([("ParamAngleX", 1.0)]),
            Err(RigError::NotReady)
        ));
        assert!(matches!(controller.play_motion("idle", 0, 1), Err(RigError::NotReady)));
        assert!(matches!(controller.play_expression("happy"), Err(RigError::NotReady)));
        assert!(matches!(controller.parameter("ParamAngleX"), Err(RigError::NotReady)));
        assert!(matches!(controller.rig_info(), Err(RigError::NotReady)));
        assert!(matches!(controller.reset_parameters(), Err(RigError::NotReady)));
        assert_eq!(controller.tick().unwrap(), None);
        assert!(controller.smoothing_info().is_ok());
    }

    #[test]
    fn set_parameter_clamps_smooths_and_locks() {
        let (controller, clock, _) = loaded(config(false, false));

        let resolved = controller.set_parameter("ParamAngleX", 90.0).unwrap();
        assert_relative_eq!(
            resolved,
            weighted_average(&[0.0, 0.0, 0.0, 0.0, 30.0]),
            epsilon = 1e-5
        );
        assert_eq!(controller.parameter("ParamAngleX").unwrap().value(), resolved);

        assert!(controller.is_locked("ParamAngleX").unwrap());
        clock.advance(4.999);
        assert!(controller.is_locked("ParamAngleX").unwrap());
        clock.advance(0.001);
        assert!(!controller.is_locked("ParamAngleX").unwrap());
    }

    #[test]
    fn rejected_commands_leave_state_untouched() {
        let (controller, _, _) = loaded(config(false, false));

        let err = controller.set_parameter("ParamTail", 1.0).unwrap_err();
        assert!(matches!(
            err,
            RigError::NotFound {
                kind: EntityKind::Parameter,
                ..
            }
        ));
        let err = controller.set_parameter("ParamAngleX", f32::NAN).unwrap_err();
        assert!(matches!(err, RigError::NonFinite { .. }));

        assert_eq!(controller.smoothing_info().unwrap().active_queue_count, 0);
        assert!(controller.rig_info().unwrap().locked_parameters.is_empty());
    }

    #[test]
    fn batch_commands_count_only_successes() {
        let (controller, _, _) = loaded(config(false, false));

        let applied = controller
            .set_parameters([
                ("ParamAngleX", 10.0),
                ("ParamTail", 1.0),
                ("ParamMouthOpenY", 0.8),
            ])
            .unwrap();

        assert_eq!(applied, 2);
        assert_eq!(
            controller.smoothing_info().unwrap().queued_parameters,
            ["ParamAngleX", "ParamMouthOpenY"]
        );
    }

    #[test]
    fn next_tick_pushes_command_values_to_the_rig() {
        let (controller, _, rig) = loaded(config(false, false));

        let resolved = controller.set_parameter("ParamMouthOpenY", 1.0).unwrap();
        assert_eq!(rig.value("ParamMouthOpenY").unwrap(), Some(0.0));

        let report = controller.tick().unwrap().unwrap();
        assert_eq!(report.frame, 1);
        assert_eq!(rig.value("ParamMouthOpenY").unwrap(), Some(resolved));
        assert_eq!(rig.frames_rendered().unwrap(), 1);
    }

    #[test]
    fn locked_breath_is_left_alone_until_the_lock_expires() {
        let (controller, clock, _) = loaded(config(false, true));

        controller.tick().unwrap();
        let before = controller.parameter("ParamBreath").unwrap().value();
        controller.lock_parameter("ParamBreath", Some(1.0)).unwrap();

        for _ in 0..9 {
            clock.advance(0.1);
            controller.tick().unwrap();
            assert_eq!(controller.parameter("ParamBreath").unwrap().value(), before);
        }

        clock.advance(0.2);
        controller.tick().unwrap();
        assert_ne!(controller.parameter("ParamBreath").unwrap().value(), before);
    }

    #[test]
    fn explicit_values_outrank_idle_animation() {
        let (controller, clock, _) = loaded(config(false, true));

        controller.set_parameter("ParamBreath", 1.0).unwrap();
        let held = controller.parameter("ParamBreath").unwrap().value();
        for _ in 0..30 {
            clock.advance(1.0 / 60.0);
            controller.tick().unwrap();
        }
        assert_eq!(controller.parameter("ParamBreath").unwrap().value(), held);
    }

    #[test]
    fn idle_blink_runs_through_the_tick() {
        let (controller, clock, rig) = loaded(config(true, false));

        let mut lowest = f32::MAX;
        for _ in 0..(6 * 60) {
            clock.advance(1.0 / 60.0);
            controller.tick().unwrap();
            lowest = lowest.min(rig.value("ParamEyeLOpen").unwrap().unwrap());
        }

        assert!(lowest < 1.0, "eyes never moved");
        assert!(lowest >= 0.0);
    }

    #[test]
    fn turning_blink_off_mid_blink_still_reopens_the_eyes() {
        let (controller, clock, rig) = loaded(config(true, false));

        let mut closing = None;
        for _ in 0..(6 * 60) {
            clock.advance(1.0 / 60.0);
            controller.tick().unwrap();
            let eye = controller.parameter("ParamEyeLOpen").unwrap().value();
            if eye < 1.0 {
                closing = Some(eye);
                break;
            }
        }
        let closing = closing.expect("eyes never started closing");

        controller.set_auto_blink(false).unwrap();
        for _ in 0..600 {
            clock.advance(1.0 / 60.0);
            controller.tick().unwrap();
        }

        let reopened = controller.parameter("ParamEyeLOpen").unwrap().value();
        assert!(reopened > closing, "eyes stuck at {reopened}");
        assert_relative_eq!(
            reopened,
            weighted_average(&[1.0, 1.0, 1.0, 0.0, 1.0]),
            epsilon = 1e-5
        );
        assert_eq!(rig.value("ParamEyeLOpen").unwrap(), Some(reopened));
    }

    #[test]
    fn reset_parameters_restores_defaults_on_the_next_tick() {
        let (controller, _, rig) = loaded(config(false, false));
        controller.set_parameter("ParamAngleX", 25.0).unwrap();
        controller.set_parameter("ParamEyeLOpen", 0.0).unwrap();
        controller.tick().unwrap();
        assert_ne!(rig.value("ParamAngleX").unwrap(), Some(0.0));

        assert_eq!(controller.reset_parameters().unwrap(), 11);
        assert!(controller.rig_info().unwrap().locked_parameters.is_empty());
        for id in controller.parameter_ids().unwrap() {
            let param = controller.parameter(&id).unwrap();
            assert_eq!(param.value(), param.default_value(), "{id}");
        }

        controller.tick().unwrap();
        assert_eq!(rig.value("ParamAngleX").unwrap(), Some(0.0));
        assert_eq!(rig.value("ParamEyeLOpen").unwrap(), Some(1.0));

        controller.tick().unwrap();
        assert_eq!(controller.parameter("ParamAngleX").unwrap().value(), 0.0);
    }

    #[test]
    fn replaced_rig_is_dropped_outside_the_state_lock() {
        let controller = Controller::new(config(false, false));
        let dropped_unlocked = Arc::new(AtomicBool::new(false));
        controller
            .install_rig(Box::new(DropWitness {
                inner: SimulatedRig::standard(),
                controller: controller.clone(),
                dropped_unlocked: Arc::clone(&dropped_unlocked),
            }))
            .unwrap();

        controller
            .install_rig(Box::new(SimulatedRig::standard()))
            .unwrap();
        assert!(dropped_unlocked.load(Ordering::SeqCst));
    }

    #[test]
    fn motions_are_forwarded_regardless_of_priority() {
        let (controller, clock, rig) = loaded(config(false, false));

        controller.play_motion("idle", 2, 2).unwrap();
        clock.advance(0.1);
        controller.play_motion("idle", 1, 3).unwrap();

        assert_eq!(
            rig.motion_log().unwrap(),
            [MotionRequest::new("idle", 2, 2), MotionRequest::new("idle", 1, 3)]
        );
        let info = controller.rig_info().unwrap();
        assert_eq!(info.playback.motions_dispatched, 2);
        assert_eq!(info.playback.last_motion, Some(MotionRequest::new("idle", 1, 3)));

        assert!(controller.play_motion("dance", 0, 1).unwrap_err().is_not_found());
        controller.stop_all_motions().unwrap();
        assert_eq!(rig.current_motion().unwrap(), None);
    }

    #[test]
    fn expressions_replace_each_other() {
        let (controller, _, rig) = loaded(config(false, false));

        controller.play_expression("happy").unwrap();
        controller.play_expression("surprised").unwrap();
        assert!(controller.play_expression("smug").unwrap_err().is_not_found());

        assert_eq!(rig.active_expression().unwrap().as_deref(), Some("surprised"));
        controller.reset_expression().unwrap();
        assert_eq!(controller.rig_info().unwrap().playback.active_expression, None);
    }

    #[test]
    fn smoothing_settings_reset_queues() {
        let (controller, _, _) = loaded(config(false, false));
        controller.set_parameter("ParamAngleX", 5.0).unwrap();

        let settings = SmoothingSettings {
            enabled: Some(false),
            window_length: Some(30),
        };
        let info = controller.set_smoothing_settings(settings).unwrap();
        assert_eq!(info, controller.set_smoothing_settings(settings).unwrap());
        assert!(!info.enabled);
        assert_eq!(info.window_length, 20);
        assert_eq!(info.active_queue_count, 0);

        assert_eq!(controller.set_parameter("ParamAngleX", 12.0).unwrap(), 12.0);
    }

    #[test]
    fn failing_parameter_is_skipped_without_aborting_the_tick() {
        let clock = Arc::new(ManualClock::new());
        let controller = Controller::with_clock(config(false, false), clock);
        let observer = SimulatedRig::standard();
        controller
            .install_rig(Box::new(FlakyRig {
                inner: observer.clone(),
                broken: "ParamAngleX",
            }))
            .unwrap();

        controller.set_parameter("ParamAngleX", 20.0).unwrap();
        let mouth = controller.set_parameter("ParamMouthOpenY", 0.6).unwrap();

        let report = controller.tick().unwrap().unwrap();
        assert_eq!(report.skipped, ["ParamAngleX"]);
        assert_eq!(observer.value("ParamMouthOpenY").unwrap(), Some(mouth));
        assert_eq!(observer.value("ParamAngleX").unwrap(), Some(0.0));
        assert_eq!(observer.frames_rendered().unwrap(), 1);
    }

    #[test]
    fn failed_load_keeps_the_previous_rig() {
        let (controller, _, _) = loaded(config(false, false));
        controller.set_parameter("ParamAngleX", 5.0).unwrap();

        let missing = |_: &Path| -> Result<Box<dyn Rig>> {
            Err(std::io::Error::new(std::io::ErrorKind::NotFound, "gone").into())
        };
        let err = controller.load_rig(&missing, Path::new("gone.json")).unwrap_err();
        assert!(matches!(err, RigError::Io(_)));

        let inverted = |_: &Path| -> Result<Box<dyn Rig>> {
            Ok(Box::new(SimulatedRig::new(crate::rig::RigManifest {
                parameters: vec![ParameterInfo::new("X", 0.0, 1.0, -1.0, 0.0)],
                expressions: Vec::new(),
                motions: Default::default(),
            })))
        };
        let err = controller.load_rig(&inverted, Path::new("bad.json")).unwrap_err();
        assert!(matches!(err, RigError::InvalidMetadata(_)));

        assert_eq!(controller.parameter_ids().unwrap().len(), 11);
        assert_eq!(controller.smoothing_info().unwrap().active_queue_count, 1);
    }

    #[test]
    fn loading_a_new_rig_resets_per_rig_state() {
        let (controller, _, _) = loaded(config(false, false));
        controller.set_parameter("ParamAngleX", 5.0).unwrap();
        controller.play_expression("happy").unwrap();

        let loader = |_: &Path| -> Result<Box<dyn Rig>> { Ok(Box::new(SimulatedRig::standard())) };
        let info = controller.load_rig(&loader, Path::new("fresh.json")).unwrap();

        assert_eq!(info.source.as_deref(), Some(Path::new("fresh.json")));
        assert_eq!(info.parameter_count, 11);
        assert!(info.locked_parameters.is_empty());
        assert_eq!(info.playback, PlaybackState::default());
        assert_eq!(controller.smoothing_info().unwrap().active_queue_count, 0);
    }

    #[test]
    fn unloading_returns_to_not_ready() {
        let (controller, _, _) = loaded(config(false, false));
        assert!(controller.unload_rig().unwrap());
        assert!(!controller.unload_rig().unwrap());
        assert!(!controller.is_ready().unwrap());
        assert!(matches!(controller.parameter_values(), Err(RigError::NotReady)));
    }
}
