//! Idle animation: randomized blinking and a breathing sinusoid.
//!
//! The animator only proposes samples. The caller feeds them through the
//! smoothing pipeline, so idle motion blends with whatever commands left in
//! the queues. Locked parameters are never proposed.

use rand::{rngs::StdRng, Rng, SeedableRng};

use crate::{
    config::AnimatorConfig,
    lock::LockArbiter,
    registry::{Parameter, ParameterRegistry, ParameterUpdate},
};

/// Where the blink state machine currently is.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BlinkPhase {
    /// Nothing scheduled yet; the first step picks a blink time.
    Waiting,
    Open { next_blink_at: f64 },
    Closed { reopen_at: f64, next_blink_at: f64 },
}

#[derive(Debug)]
pub struct AutoAnimator {
    config: AnimatorConfig,
    blink: BlinkPhase,
    rng: StdRng,
}

impl AutoAnimator {
    pub fn new(config: AnimatorConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            config,
            blink: BlinkPhase::Waiting,
            rng,
        }
    }

    pub fn config(&self) -> &AnimatorConfig {
        &self.config
    }

    pub fn blink_phase(&self) -> BlinkPhase {
        self.blink
    }

    pub fn set_auto_blink(&mut self, enabled: bool) {
        self.config.auto_blink = enabled;
    }

    pub fn set_auto_breath(&mut self, enabled: bool) {
        self.config.auto_breath = enabled;
    }

    /// Forgets any scheduled blink. Called when the rig changes.
    pub fn reset(&mut self) {
        self.blink = BlinkPhase::Waiting;
    }

    /// Advances idle animation to `now` and returns the samples it proposes.
    pub fn step(
        &mut self,
        now: f64,
        registry: &ParameterRegistry,
        locks: &mut LockArbiter,
    ) -> Vec<ParameterUpdate> {
        let mut proposals = Vec::new();
        // A blink already in progress still reopens after blinking is turned off.
        if self.config.auto_blink || matches!(self.blink, BlinkPhase::Closed { .. }) {
            self.step_blink(now, registry, locks, &mut proposals);
        }
        if self.config.auto_breath {
            self.step_breath(now, registry, locks, &mut proposals);
        }
        proposals
    }

    fn step_blink(
        &mut self,
        now: f64,
        registry: &ParameterRegistry,
        locks: &mut LockArbiter,
        proposals: &mut Vec<ParameterUpdate>,
    ) {
        let eyes: Vec<&Parameter> = self
            .config
            .eye_parameters
            .iter()
            .filter_map(|id| registry.get(id).ok())
            .collect();
        if eyes.is_empty() {
            return;
        }

        match self.blink {
            BlinkPhase::Waiting => {
                self.blink = BlinkPhase::Open {
                    next_blink_at: self.schedule_after(now),
                };
            }
            BlinkPhase::Open { next_blink_at } if now >= next_blink_at => {
                let next_blink_at = self.schedule_after(now);
                if locks.any_locked(eyes.iter().map(|eye| eye.id()), now) {
                    tracing::trace!("blink skipped, eyes are locked");
                    self.blink = BlinkPhase::Open { next_blink_at };
                    return;
                }
                proposals.extend(eyes.iter().map(|eye| ParameterUpdate::new(eye.id(), eye.min())));
                self.blink = BlinkPhase::Closed {
                    reopen_at: now + self.config.blink_closed_secs,
                    next_blink_at,
                };
            }
            BlinkPhase::Closed {
                reopen_at,
                next_blink_at,
            } if now >= reopen_at => {
                // A lock taken while the eyes were shut wins; they stay as
                // resolved until something else writes them.
                if locks.any_locked(eyes.iter().map(|eye| eye.id()), now) {
                    tracing::debug!("blink reopen skipped, eyes were locked mid-blink");
                } else {
                    proposals
                        .extend(eyes.iter().map(|eye| ParameterUpdate::new(eye.id(), eye.max())));
                }
                self.blink = if self.config.auto_blink {
                    BlinkPhase::Open { next_blink_at }
                } else {
                    BlinkPhase::Waiting
                };
            }
            _ => {}
        }
    }

    fn step_breath(
        &mut self,
        now: f64,
        registry: &ParameterRegistry,
        locks: &mut LockArbiter,
        proposals: &mut Vec<ParameterUpdate>,
    ) {
        let Ok(param) = registry.get(&self.config.breath_parameter) else {
            return;
        };
        if locks.is_locked(param.id(), now) {
            return;
        }
        proposals.push(ParameterUpdate::new(
            param.id(),
            breath_value(param, now, self.config.breath_frequency),
        ));
    }

    fn schedule_after(&mut self, now: f64) -> f64 {
        let (min, max) = (self.config.blink_interval_min, self.config.blink_interval_max);
        if max > min {
            now + self.rng.gen_range(min..max)
        } else {
            now + min
        }
    }
}

/// Sinusoid spanning the lower half of the parameter's range.
fn breath_value(param: &Parameter, now: f64, frequency: f64) -> f32 {
    let phase = (((now * frequency).sin() + 1.0) / 2.0) as f32;
    param.min() + phase * param.range() / 2.0
}
