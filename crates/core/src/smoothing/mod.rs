//! Per-parameter sample history and recency-weighted resolution.
//!
//! Every parameter that has received a sample owns a bounded FIFO queue. On
//! first use the queue is filled with copies of the parameter's current
//! value so a single sample cannot jump the output. Resolution weights the
//! sample at position `i` (oldest first) by `(i + 1)^1.5`.

use std::collections::{HashMap, VecDeque};

use serde::Serialize;

use crate::{registry::ParameterRegistry, Result, RigError};

pub const DEFAULT_WINDOW: usize = 5;
pub const MIN_WINDOW: usize = 1;
pub const MAX_WINDOW: usize = 20;

const RECENCY_EXPONENT: f32 = 1.5;

/// Recency-weighted mean of `samples`, ordered oldest to newest. An empty
/// sequence resolves to 0.
pub fn weighted_average<'a>(samples: impl IntoIterator<Item = &'a f32>) -> f32 {
    let mut weighted_sum = 0.0;
    let mut total_weight = 0.0;
    for (position, value) in samples.into_iter().enumerate() {
        let weight = ((position + 1) as f32).powf(RECENCY_EXPONENT);
        weighted_sum += value * weight;
        total_weight += weight;
    }

    if total_weight > 0.0 {
        weighted_sum / total_weight
    } else {
        0.0
    }
}

#[derive(Debug, Clone)]
pub struct SmoothingQueue {
    samples: VecDeque<f32>,
    capacity: usize,
}

impl SmoothingQueue {
    fn seeded(capacity: usize, seed: f32) -> Self {
        Self {
            samples: std::iter::repeat(seed).take(capacity).collect(),
            capacity,
        }
    }

    fn push(&mut self, value: f32) {
        self.samples.push_back(value);
        while self.samples.len() > self.capacity {
            self.samples.pop_front();
        }
    }

    pub fn samples(&self) -> impl Iterator<Item = &f32> {
        self.samples.iter()
    }

    pub fn newest(&self) -> Option<f32> {
        self.samples.back().copied()
    }

    pub fn weighted_average(&self) -> f32 {
        weighted_average(&self.samples)
    }
}

/// Observable smoothing state reported to the command layer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SmoothingInfo {
    pub enabled: bool,
    pub window_length: usize,
    pub active_queue_count: usize,
    pub queued_parameters: Vec<String>,
}

/// Partial update of the smoothing settings. `None` leaves a field as is.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SmoothingSettings {
    pub enabled: Option<bool>,
    pub window_length: Option<usize>,
}

#[derive(Debug)]
pub struct SmoothingPipeline {
    queues: HashMap<String, SmoothingQueue>,
    capacity: usize,
    enabled: bool,
}

impl Default for SmoothingPipeline {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW, true)
    }
}

impl SmoothingPipeline {
    pub fn new(capacity: usize, enabled: bool) -> Self {
        Self {
            queues: HashMap::new(),
            capacity: capacity.clamp(MIN_WINDOW, MAX_WINDOW),
            enabled,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    /// Changes the window length and drops every queue, since samples
    /// gathered under one window do not share a weight basis with another.
    pub fn set_capacity(&mut self, capacity: usize) -> usize {
        self.capacity = capacity.clamp(MIN_WINDOW, MAX_WINDOW);
        self.queues.clear();
        self.capacity
    }

    pub fn apply(&mut self, settings: SmoothingSettings) {
        if let Some(length) = settings.window_length {
            self.set_capacity(length);
        }
        if let Some(enabled) = settings.enabled {
            self.set_enabled(enabled);
        }
    }

    /// Appends a raw sample for `id`, seeding its queue on first use.
    pub fn enqueue(&mut self, registry: &ParameterRegistry, id: &str, raw: f32) -> Result<()> {
        let param = registry.get(id)?;
        let capacity = self.capacity;
        self.queues
            .entry(id.to_string())
            .or_insert_with(|| SmoothingQueue::seeded(capacity, param.value()))
            .push(raw);
        Ok(())
    }

    /// Resolves `id` from its queue, clamps and writes the result back into
    /// the registry. A parameter without a queue keeps its current value.
    pub fn resolve(&self, registry: &mut ParameterRegistry, id: &str) -> Result<f32> {
        let current = registry.get(id)?.value();
        let Some(queue) = self.queues.get(id) else {
            return Ok(current);
        };

        let resolved = if self.enabled {
            queue.weighted_average()
        } else {
            queue.newest().unwrap_or(current)
        };
        if !resolved.is_finite() {
            return Err(RigError::NonFinite { id: id.to_string() });
        }
        registry.write(id, resolved)
    }

    pub fn queue(&self, id: &str) -> Option<&SmoothingQueue> {
        self.queues.get(id)
    }

    /// Ids of every parameter with a live queue, sorted for stable ticks.
    pub fn queued_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.queues.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn clear(&mut self) {
        self.queues.clear();
    }

    pub fn info(&self) -> SmoothingInfo {
        SmoothingInfo {
            enabled: self.enabled,
            window_length: self.capacity,
            active_queue_count: self.queues.len(),
            queued_parameters: self.queued_ids(),
        }
    }
}
