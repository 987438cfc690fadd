use serde::{Deserialize, Serialize};

use crate::{rig::Rig, EntityKind, Result, RigError};

/// A discrete motion to start on the rig.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MotionRequest {
    /// Motion group name.
    pub name: String,
    /// Position of the motion inside its group.
    pub index: usize,
    pub priority: u32,
}

impl MotionRequest {
    pub fn new(name: impl Into<String>, index: usize, priority: u32) -> Self {
        Self {
            name: name.into(),
            index,
            priority,
        }
    }
}

/// What has been dispatched so far. Kept for observability only; nothing here
/// gates playback.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PlaybackState {
    pub last_motion: Option<MotionRequest>,
    pub motions_dispatched: u64,
    pub active_expression: Option<String>,
}

/// Forwards motion and expression requests to the rig. Motion preemption is
/// the rig's business since motions run on its own curve evaluator; the
/// coordinator never rejects a request on priority.
#[derive(Debug, Default)]
pub struct PlaybackCoordinator {
    state: PlaybackState,
}

impl PlaybackCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &PlaybackState {
        &self.state
    }

    pub fn play_motion(&mut self, rig: &mut dyn Rig, request: MotionRequest) -> Result<()> {
        rig.start_motion(&request)?;
        tracing::info!(
            motion = %request.name,
            index = request.index,
            priority = request.priority,
            "motion dispatched"
        );
        self.state.last_motion = Some(request);
        self.state.motions_dispatched += 1;
        Ok(())
    }

    /// Replaces the active expression. Last write wins; nothing is blended.
    pub fn play_expression(&mut self, rig: &mut dyn Rig, name: &str) -> Result<()> {
        if !rig.enumerate_expressions().iter().any(|known| known == name) {
            return Err(RigError::not_found(EntityKind::Expression, name));
        }
        rig.set_expression(name)?;
        tracing::info!(expression = name, "expression applied");
        self.state.active_expression = Some(name.to_string());
        Ok(())
    }

    pub fn reset_expression(&mut self, rig: &mut dyn Rig) -> Result<()> {
        rig.reset_expression()?;
        self.state.active_expression = None;
        Ok(())
    }

    pub fn stop_all_motions(&mut self, rig: &mut dyn Rig) -> Result<()> {
        rig.stop_all_motions()
    }

    pub fn clear(&mut self) {
        self.state = PlaybackState::default();
    }
}
