//! The live story/event directory and the propagation flush.
//!
//! Worldgen seeds stories; play seeds events. Either kind queues here and
//! is propagated across the region graph at the next tick boundary, each
//! under its own derived stream (`propagation/story/<id>` or
//! `propagation/event/<id>`), so unrelated propagations can never perturb
//! one another.

use std::collections::{BTreeMap, VecDeque};

use bevy::prelude::{Res, ResMut, Resource};

use world_runtime::DecayCurve;
use world_schema::{EventStatus, SpreadKind, Story, WorldEvent};

use crate::propagation::propagate;
use crate::regions::RegionRegistry;
use crate::resources::Streams;
use crate::rng::domains;
use crate::saturation::SaturationLedger;

#[derive(Resource, Debug, Clone, Default)]
pub struct StoryDirectory {
    stories: BTreeMap<u64, Story>,
    events: BTreeMap<u64, WorldEvent>,
    pending_stories: VecDeque<u64>,
    pending_events: VecDeque<u64>,
    next_event_id: u64,
    pub decay_curve: DecayCurve,
}

impl StoryDirectory {
    /// Adopt the worldgen-seeded stories and queue their initial spread.
    pub fn adopt_seeded(&mut self, stories: &[Story]) {
        for story in stories {
            self.stories.insert(story.id, story.clone());
            self.pending_stories.push_back(story.id);
        }
    }

    pub fn story(&self, id: u64) -> Option<&Story> {
        self.stories.get(&id)
    }

    pub fn stories(&self) -> impl Iterator<Item = &Story> {
        self.stories.values()
    }

    pub fn event(&self, id: u64) -> Option<&WorldEvent> {
        self.events.get(&id)
    }

    pub fn events(&self) -> impl Iterator<Item = &WorldEvent> {
        self.events.values()
    }

    pub fn insert_story(&mut self, story: Story) {
        self.stories.insert(story.id, story);
    }

    /// Register an event and queue it for propagation. The directory
    /// assigns the id.
    pub fn raise_event(&mut self, build: impl FnOnce(u64) -> WorldEvent) -> u64 {
        let id = self.next_event_id;
        self.next_event_id += 1;
        let event = build(id);
        self.events.insert(id, event);
        self.pending_events.push_back(id);
        id
    }

    pub fn queue_story_spread(&mut self, id: u64) {
        if self.stories.contains_key(&id) {
            self.pending_stories.push_back(id);
        }
    }

    pub fn pending(&self) -> usize {
        self.pending_stories.len() + self.pending_events.len()
    }

    pub fn story_saves(&self) -> Vec<Story> {
        self.stories.values().cloned().collect()
    }

    pub fn event_saves(&self) -> Vec<WorldEvent> {
        self.events.values().cloned().collect()
    }

    pub fn restore(&mut self, stories: Vec<Story>, events: Vec<WorldEvent>) {
        self.next_event_id = events.iter().map(|e| e.id + 1).max().unwrap_or(0);
        self.stories = stories.into_iter().map(|s| (s.id, s)).collect();
        self.events = events.into_iter().map(|e| (e.id, e)).collect();
        self.pending_stories.clear();
        self.pending_events.clear();
    }
}

/// Tick-boundary flush: drain every queued story and event through the
/// propagation engine.
pub fn flush_propagation(
    streams: Res<Streams>,
    registry: Res<RegionRegistry>,
    saturation: Res<SaturationLedger>,
    mut directory: ResMut<StoryDirectory>,
) {
    let curve = directory.decay_curve;

    while let Some(id) = directory.pending_stories.pop_front() {
        let Some(story) = directory.stories.get(&id).cloned() else {
            continue;
        };
        let Some(origin_region) = registry.region_at(story.origin) else {
            continue;
        };
        let mut rng = streams.0.stream(domains::PROPAGATION_STORY, id);
        let outcome = propagate(
            origin_region,
            story.base_probability,
            story.max_hops,
            SpreadKind::Story,
            registry.graph(),
            &saturation,
            curve,
            &mut rng,
        );
        let mut updated = story;
        for (region, depth) in &outcome.admitted {
            updated = updated.with_spread(*region, *depth);
        }
        directory.stories.insert(id, updated);
    }

    while let Some(id) = directory.pending_events.pop_front() {
        let Some(event) = directory.events.get(&id).cloned() else {
            continue;
        };
        let Some(origin_region) = registry.region_at(event.origin) else {
            continue;
        };

        let active = match event.status {
            EventStatus::Pending => match event.activate() {
                Ok(active) => active,
                Err(_) => continue,
            },
            _ => event,
        };
        let propagating = match active.begin_propagation() {
            Ok(propagating) => propagating,
            Err(_) => continue,
        };

        let mut rng = streams.0.stream(domains::PROPAGATION_EVENT, id);
        let outcome = propagate(
            origin_region,
            propagating.base_probability,
            propagating.max_hops,
            SpreadKind::Event,
            registry.graph(),
            &saturation,
            curve,
            &mut rng,
        );
        let mut spread = propagating;
        for (region, depth) in &outcome.admitted {
            spread = spread.with_spread(*region, *depth);
        }
        let mut completed = match spread.complete() {
            Ok(completed) => completed,
            Err(_) => spread,
        };
        // A completed event becomes part of the local canon: tie it to the
        // oldest story already told in its origin region.
        if completed.linked_story_id.is_none() {
            let local_story = directory
                .stories
                .values()
                .filter(|s| s.affected_regions.contains(&origin_region))
                .map(|s| s.id)
                .min();
            if let Some(story_id) = local_story {
                completed = completed.with_link(story_id);
            }
        }
        directory.events.insert(id, completed);
    }
}
