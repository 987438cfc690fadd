use std::{
    collections::{BTreeMap, HashMap},
    path::Path,
    sync::{Arc, Mutex, MutexGuard},
};

use serde::{Deserialize, Serialize};

use crate::{
    playback::MotionRequest, registry::ParameterInfo, EntityKind, Result, RigError,
};

use super::{Rig, RigLoader};

/// Frames a simulated motion keeps playing before the slot frees up.
const MOTION_FRAMES: u32 = 60;

/// Description of a simulated rig: its parameter table, the expressions it
/// knows and how many motions each motion group holds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RigManifest {
    pub parameters: Vec<ParameterInfo>,
    #[serde(default)]
    pub expressions: Vec<String>,
    #[serde(default)]
    pub motions: BTreeMap<String, usize>,
}

impl RigManifest {
    /// The stock head/eye/mouth/breath table used when no rig is supplied.
    pub fn standard() -> Self {
        let param = ParameterInfo::new;
        Self {
            parameters: vec![
                param("ParamAngleX", 0.0, -30.0, 30.0, 0.0),
                param("ParamAngleY", 0.0, -30.0, 30.0, 0.0),
                param("ParamAngleZ", 0.0, -30.0, 30.0, 0.0),
                param("ParamEyeBallX", 0.0, -1.0, 1.0, 0.0),
                param("ParamEyeBallY", 0.0, -1.0, 1.0, 0.0),
                param("ParamEyeLOpen", 1.0, 0.0, 1.0, 1.0),
                param("ParamEyeROpen", 1.0, 0.0, 1.0, 1.0),
                param("ParamMouthOpenY", 0.0, 0.0, 1.0, 0.0),
                param("ParamBrowLY", 0.0, -1.0, 1.0, 0.0),
                param("ParamBrowRY", 0.0, -1.0, 1.0, 0.0),
                param("ParamBreath", 0.0, 0.0, 1.0, 0.0),
            ],
            expressions: ["happy", "sad", "surprised", "angry"]
                .into_iter()
                .map(String::from)
                .collect(),
            motions: BTreeMap::from([("idle".to_string(), 3), ("tap_body".to_string(), 2)]),
        }
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|err| RigError::InvalidMetadata(err.to_string()))
    }

    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text).map_err(|err| match err {
            RigError::InvalidMetadata(reason) => {
                RigError::InvalidMetadata(format!("{}: {reason}", path.display()))
            }
            other => other,
        })
    }
}

#[derive(Debug)]
struct SimulatedState {
    manifest: RigManifest,
    values: HashMap<String, f32>,
    active_expression: Option<String>,
    playing: Option<(MotionRequest, u32)>,
    motion_log: Vec<MotionRequest>,
    frames_advanced: u64,
    frames_rendered: u64,
}

/// In-memory rig that records everything the engine sends it. Clones share
/// state, so a caller can keep one to observe a rig the engine owns.
#[derive(Debug, Clone)]
pub struct SimulatedRig {
    shared: Arc<Mutex<SimulatedState>>,
}

impl SimulatedRig {
    pub fn new(manifest: RigManifest) -> Self {
        let values = manifest
            .parameters
            .iter()
            .map(|param| (param.id.clone(), param.value))
            .collect();
        Self {
            shared: Arc::new(Mutex::new(SimulatedState {
                manifest,
                values,
                active_expression: None,
                playing: None,
                motion_log: Vec::new(),
                frames_advanced: 0,
                frames_rendered: 0,
            })),
        }
    }

    pub fn standard() -> Self {
        Self::new(RigManifest::standard())
    }

    pub fn from_manifest_path(path: &Path) -> Result<Self> {
        Ok(Self::new(RigManifest::from_json_file(path)?))
    }

    /// Last value the engine pushed for `id`.
    pub fn value(&self, id: &str) -> Result<Option<f32>> {
        Ok(self.lock()?.values.get(id).copied())
    }

    pub fn active_expression(&self) -> Result<Option<String>> {
        Ok(self.lock()?.active_expression.clone())
    }

    /// Motion currently occupying the playback slot.
    pub fn current_motion(&self) -> Result<Option<MotionRequest>> {
        Ok(self.lock()?.playing.as_ref().map(|(request, _)| request.clone()))
    }

    /// Every motion request received, accepted or not.
    pub fn motion_log(&self) -> Result<Vec<MotionRequest>> {
        Ok(self.lock()?.motion_log.clone())
    }

    pub fn frames_rendered(&self) -> Result<u64> {
        Ok(self.lock()?.frames_rendered)
    }

    fn lock(&self) -> Result<MutexGuard<'_, SimulatedState>> {
        self.shared
            .lock()
            .map_err(|_| RigError::Poisoned("simulated rig"))
    }
}

impl Rig for SimulatedRig {
    fn enumerate_parameters(&self) -> Result<Vec<ParameterInfo>> {
        let state = self.lock()?;
        Ok(state
            .manifest
            .parameters
            .iter()
            .map(|param| ParameterInfo {
                value: state.values.get(&param.id).copied().unwrap_or(param.value),
                ..param.clone()
            })
            .collect())
    }

    fn set_parameter_value(&mut self, id: &str, value: f32) -> Result<()> {
        let mut state = self.lock()?;
        match state.values.get_mut(id) {
            Some(slot) => {
                *slot = value;
                Ok(())
            }
            None => Err(RigError::not_found(EntityKind::Parameter, id)),
        }
    }

    fn enumerate_expressions(&self) -> Vec<String> {
        self.lock()
            .map(|state| state.manifest.expressions.clone())
            .unwrap_or_default()
    }

    fn start_motion(&mut self, request: &MotionRequest) -> Result<()> {
        let mut state = self.lock()?;
        let known = state
            .manifest
            .motions
            .get(&request.name)
            .is_some_and(|&count| request.index < count);
        if !known {
            return Err(RigError::not_found(
                EntityKind::Motion,
                format!("{}[{}]", request.name, request.index),
            ));
        }

        state.motion_log.push(request.clone());
        let outranked = state
            .playing
            .as_ref()
            .is_some_and(|(playing, _)| playing.priority >= request.priority);
        if outranked {
            tracing::debug!(motion = %request.name, priority = request.priority, "motion outranked by the playing one");
        } else {
            state.playing = Some((request.clone(), MOTION_FRAMES));
        }
        Ok(())
    }

    fn set_expression(&mut self, id: &str) -> Result<()> {
        let mut state = self.lock()?;
        if !state.manifest.expressions.iter().any(|name| name == id) {
            return Err(RigError::not_found(EntityKind::Expression, id));
        }
        state.active_expression = Some(id.to_string());
        Ok(())
    }

    fn reset_expression(&mut self) -> Result<()> {
        self.lock()?.active_expression = None;
        Ok(())
    }

    fn stop_all_motions(&mut self) -> Result<()> {
        self.lock()?.playing = None;
        Ok(())
    }

    fn advance_frame(&mut self) -> Result<()> {
        let mut state = self.lock()?;
        state.frames_advanced += 1;
        let finished = match state.playing.as_mut() {
            Some((_, remaining)) => {
                *remaining = remaining.saturating_sub(1);
                *remaining == 0
            }
            None => false,
        };
        if finished {
            state.playing = None;
        }
        Ok(())
    }

    fn render_frame(&mut self) -> Result<()> {
        self.lock()?.frames_rendered += 1;
        Ok(())
    }
}

/// Loads [`SimulatedRig`]s from JSON manifests on disk.
#[derive(Debug, Default, Clone, Copy)]
pub struct ManifestLoader;

impl RigLoader for ManifestLoader {
    fn load(&self, source: &Path) -> Result<Box<dyn Rig>> {
        Ok(Box::new(SimulatedRig::from_manifest_path(source)?))
    }
}
