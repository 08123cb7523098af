use std::collections::HashMap;
use tracing::debug;
use velyra_schemas::NicheStatistics;

/// Read-through cache of per-niche aggregates.
///
/// Entries are filled from the database on first read and dropped whenever a
/// campaign for that niche is written, so the database stays the only source
/// of truth.
#[derive(Debug, Default)]
pub struct NicheStatsCache {
    entries: HashMap<String, NicheStatistics>,
}

impl NicheStatsCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, niche: &str) -> Option<&NicheStatistics> {
        self.entries.get(niche)
    }

    /// Return the cached entry or compute, store and return it
    pub fn get_or_load<E, F>(&mut self, niche: &str, load: F) -> Result<NicheStatistics, E>
    where
        F: FnOnce() -> Result<NicheStatistics, E>,
    {
        if let Some(stats) = self.entries.get(niche) {
            debug!("Niche stats cache hit: {}", niche);
            return Ok(stats.clone());
        }

        let stats = load()?;
        self.entries.insert(niche.to_string(), stats.clone());
        debug!("Niche stats cached: {}", niche);
        Ok(stats)
    }

    pub fn invalidate(&mut self, niche: &str) {
        if self.entries.remove(niche).is_some() {
            debug!("Niche stats invalidated: {}", niche);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
