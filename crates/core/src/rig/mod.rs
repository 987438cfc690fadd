//! Boundary between the engine and the character rig that renders it.
//!
//! The engine talks to a rig only through [`Rig`]. Metadata is enumerated
//! once at load; every frame the engine pushes resolved values, advances the
//! rig's own motion/expression evaluation and asks it to render.

mod simulated;

pub use simulated::{ManifestLoader, RigManifest, SimulatedRig};

use std::{fmt, path::Path};

use crate::{playback::MotionRequest, registry::ParameterInfo, Result};

pub trait Rig: Send + fmt::Debug {
    fn enumerate_parameters(&self) -> Result<Vec<ParameterInfo>>;

    fn set_parameter_value(&mut self, id: &str, value: f32) -> Result<()>;

    fn enumerate_expressions(&self) -> Vec<String>;

    /// Starts a motion. Preemption between priorities is up to the rig.
    fn start_motion(&mut self, request: &MotionRequest) -> Result<()>;

    fn set_expression(&mut self, id: &str) -> Result<()>;

    fn reset_expression(&mut self) -> Result<()> {
        Ok(())
    }

    fn stop_all_motions(&mut self) -> Result<()> {
        Ok(())
    }

    /// Steps the rig's internal curves (motions, expressions, physics).
    fn advance_frame(&mut self) -> Result<()>;

    fn render_frame(&mut self) -> Result<()>;
}

/// Produces a rig from an on-disk source. Loading may block on I/O and is
/// always performed outside the engine lock.
pub trait RigLoader: Send + Sync {
    fn load(&self, source: &Path) -> Result<Box<dyn Rig>>;
}

impl<F> RigLoader for F
where
    F: Fn(&Path) -> Result<Box<dyn Rig>> + Send + Sync,
{
    fn load(&self, source: &Path) -> Result<Box<dyn Rig>> {
        self(source)
    }
}
