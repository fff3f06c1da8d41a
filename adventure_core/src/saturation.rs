//! Per-region saturation accounting for stories and events.
//!
//! Counters are atomic so propagation workers can bump them without a
//! global mutex; the outer map only takes a write lock when a region is
//! seen for the first time.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::RwLock;

use bevy::prelude::Resource;

use world_schema::{SpreadKind, SOFT_CAP_RATIO};

#[derive(Debug, Default)]
struct RegionCounters {
    stories: AtomicU32,
    events: AtomicU32,
}

impl RegionCounters {
    fn counter(&self, kind: SpreadKind) -> &AtomicU32 {
        match kind {
            SpreadKind::Story => &self.stories,
            SpreadKind::Event => &self.events,
        }
    }
}

/// Bounded per-region capacity for propagating payloads.
#[derive(Resource, Debug)]
pub struct SaturationLedger {
    counters: RwLock<HashMap<u64, RegionCounters>>,
    story_cap: u32,
    event_cap: u32,
}

impl Default for SaturationLedger {
    fn default() -> Self {
        Self {
            counters: RwLock::new(HashMap::new()),
            story_cap: SpreadKind::Story.default_cap(),
            event_cap: SpreadKind::Event.default_cap(),
        }
    }
}

impl SaturationLedger {
    pub fn with_caps(story_cap: u32, event_cap: u32) -> Self {
        Self {
            counters: RwLock::new(HashMap::new()),
            story_cap: story_cap.max(1),
            event_cap: event_cap.max(1),
        }
    }

    pub fn cap(&self, kind: SpreadKind) -> u32 {
        match kind {
            SpreadKind::Story => self.story_cap,
            SpreadKind::Event => self.event_cap,
        }
    }

    pub fn count(&self, region: u64, kind: SpreadKind) -> u32 {
        let counters = self.counters.read().expect("saturation map lock");
        counters
            .get(&region)
            .map(|c| c.counter(kind).load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    pub fn increment(&self, region: u64, kind: SpreadKind) {
        {
            let counters = self.counters.read().expect("saturation map lock");
            if let Some(entry) = counters.get(&region) {
                entry.counter(kind).fetch_add(1, Ordering::Relaxed);
                return;
            }
        }
        let mut counters = self.counters.write().expect("saturation map lock");
        counters
            .entry(region)
            .or_default()
            .counter(kind)
            .fetch_add(1, Ordering::Relaxed);
    }

    pub fn decrement(&self, region: u64, kind: SpreadKind) {
        let counters = self.counters.read().expect("saturation map lock");
        if let Some(entry) = counters.get(&region) {
            let counter = entry.counter(kind);
            let mut current = counter.load(Ordering::Relaxed);
            while current > 0 {
                match counter.compare_exchange(
                    current,
                    current - 1,
                    Ordering::Relaxed,
                    Ordering::Relaxed,
                ) {
                    Ok(_) => break,
                    Err(actual) => current = actual,
                }
            }
        }
    }

    /// `max(0, 1 - count / cap)`; reaches zero at the hard cap.
    pub fn factor(&self, region: u64, kind: SpreadKind) -> f32 {
        let cap = self.cap(kind) as f32;
        (1.0 - self.count(region, kind) as f32 / cap).max(0.0)
    }

    /// Soft-cap warning: 80% of the hard cap.
    pub fn is_cap_reached(&self, region: u64, kind: SpreadKind) -> bool {
        self.count(region, kind) as f32 >= self.cap(kind) as f32 * SOFT_CAP_RATIO
    }

    pub fn is_saturated(&self, region: u64, kind: SpreadKind) -> bool {
        self.count(region, kind) >= self.cap(kind)
    }
}
