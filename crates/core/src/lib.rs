//! Core library of the Marionette rig controller.
//!
//! The engine keeps the target value of every rig parameter, blends explicit
//! commands with idle animation (blinking, breathing) through a recency
//! weighted smoothing window, and hands the resolved values to the rig once
//! per frame. All state lives behind one [`Controller`] handle that the frame
//! pump and any number of command callers share.

pub mod animator;
pub mod clock;
pub mod config;
pub mod controller;
pub mod error;
pub mod lock;
pub mod playback;
pub mod pump;
pub mod registry;
pub mod rig;
pub mod smoothing;

pub use animator::{AutoAnimator, BlinkPhase};
pub use clock::{Clock, ManualClock, MonotonicClock};
pub use config::{AnimatorConfig, EngineConfig, SmoothingConfig};
pub use controller::{Controller, RigInfo};
pub use error::{EntityKind, Result, RigError};
pub use lock::LockArbiter;
pub use playback::{MotionRequest, PlaybackCoordinator, PlaybackState};
pub use pump::{FramePump, FrameReport, FrameSink, PumpHandle};
pub use registry::{Parameter, ParameterInfo, ParameterRegistry, ParameterUpdate};
pub use rig::{ManifestLoader, Rig, RigLoader, RigManifest, SimulatedRig};
pub use smoothing::{SmoothingInfo, SmoothingPipeline, SmoothingSettings};
