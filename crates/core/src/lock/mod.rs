use std::collections::HashMap;

pub const DEFAULT_LOCK_SECONDS: f64 = 5.0;

/// Temporary per-parameter claims that keep automatic animation away from a
/// value an explicit command just set. A claim only ends by expiring; expired
/// entries are dropped the next time they are queried.
#[derive(Debug, Default)]
pub struct LockArbiter {
    expiries: HashMap<String, f64>,
}

impl LockArbiter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Locks `id` until `now + duration`, replacing any earlier claim.
    pub fn acquire(&mut self, id: &str, now: f64, duration: f64) -> f64 {
        let expiry = now + duration;
        self.expiries.insert(id.to_string(), expiry);
        tracing::debug!(parameter = id, expiry, "parameter locked");
        expiry
    }

    pub fn is_locked(&mut self, id: &str, now: f64) -> bool {
        match self.expiries.get(id) {
            Some(&expiry) if now < expiry => true,
            Some(_) => {
                self.expiries.remove(id);
                false
            }
            None => false,
        }
    }

    pub fn any_locked<'a>(&mut self, ids: impl IntoIterator<Item = &'a str>, now: f64) -> bool {
        // Every id is visited so expired claims are all evicted.
        ids.into_iter()
            .fold(false, |locked, id| self.is_locked(id, now) || locked)
    }

    pub fn expiry(&self, id: &str) -> Option<f64> {
        self.expiries.get(id).copied()
    }

    /// Ids still locked at `now`, sorted.
    pub fn locked_ids(&mut self, now: f64) -> Vec<String> {
        self.expiries.retain(|_, expiry| now < *expiry);
        let mut ids: Vec<String> = self.expiries.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn clear(&mut self) {
        self.expiries.clear();
    }
}
