//! Shared data contracts for the Everwilds simulation core.
//!
//! This crate hosts the serializable world model: terrain and worldgen
//! artifacts, the story/event model, items, structures, fiscal and
//! diplomatic records, character sheets, and the save envelopes that the
//! persistence layer writes to disk. Everything here is plain data plus the
//! value-level algebra that belongs to the contract itself (clamping,
//! status transitions, derived metrics). The bevy runtime in
//! `adventure_core` layers behavior on top of these types; nothing in this
//! crate depends on it.
//!
//! Collections that end up inside hashed or persisted payloads use ordered
//! containers (`BTreeMap`/`BTreeSet`) so byte serialization is canonical.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::hash::{BuildHasher, Hasher};

use ahash::RandomState;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Coordinates
// ---------------------------------------------------------------------------

/// Tile coordinate on the world grid. Bounds are half-open:
/// `0 <= x < width`, `0 <= y < height`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub struct TileCoord {
    pub x: u32,
    pub y: u32,
}

impl TileCoord {
    pub const fn new(x: u32, y: u32) -> Self {
        Self { x, y }
    }

    /// Row-major index into a `width * height` field.
    #[inline]
    pub fn index(self, width: u32) -> usize {
        (self.y * width + self.x) as usize
    }

    pub fn euclidean_distance(self, other: Self) -> f32 {
        let dx = self.x as f32 - other.x as f32;
        let dy = self.y as f32 - other.y as f32;
        (dx * dx + dy * dy).sqrt()
    }

    pub fn manhattan_distance(self, other: Self) -> u32 {
        self.x.abs_diff(other.x) + self.y.abs_diff(other.y)
    }
}

impl fmt::Display for TileCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.x, self.y)
    }
}

/// Encode a structure location as the canonical `"x:y:z"` key.
pub fn encode_location(x: i32, y: i32, z: i32) -> String {
    format!("{x}:{y}:{z}")
}

/// Parse an `"x:y:z"` location key. Returns `None` on malformed input.
pub fn parse_location(key: &str) -> Option<(i32, i32, i32)> {
    let mut parts = key.split(':');
    let x = parts.next()?.parse().ok()?;
    let y = parts.next()?.parse().ok()?;
    let z = parts.next()?.parse().ok()?;
    if parts.next().is_some() {
        return None;
    }
    Some((x, y, z))
}

// ---------------------------------------------------------------------------
// Biomes
// ---------------------------------------------------------------------------

bitflags::bitflags! {
    /// Semantic tags layered over the biome enumeration.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct BiomeTags: u8 {
        const WATER     = 1 << 0;
        const HABITABLE = 1 << 1;
        const COLD      = 1 << 2;
        const ARID      = 1 << 3;
        const FERTILE   = 1 << 4;
        const HAZARDOUS = 1 << 5;
    }
}

/// Biome classification for a tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Biome {
    Ocean,
    Lake,
    Mountain,
    Hills,
    Volcanic,
    Tundra,
    Taiga,
    Desert,
    Jungle,
    Savanna,
    Forest,
    Swamp,
    Grassland,
}

impl Biome {
    pub const ALL: [Biome; 13] = [
        Biome::Ocean,
        Biome::Lake,
        Biome::Mountain,
        Biome::Hills,
        Biome::Volcanic,
        Biome::Tundra,
        Biome::Taiga,
        Biome::Desert,
        Biome::Jungle,
        Biome::Savanna,
        Biome::Forest,
        Biome::Swamp,
        Biome::Grassland,
    ];

    pub fn tags(self) -> BiomeTags {
        use BiomeTags as Tag;
        match self {
            Biome::Ocean => Tag::WATER,
            Biome::Lake => Tag::WATER | Tag::FERTILE,
            Biome::Mountain => Tag::COLD | Tag::HAZARDOUS,
            Biome::Hills => Tag::HABITABLE,
            Biome::Volcanic => Tag::HAZARDOUS | Tag::ARID,
            Biome::Tundra => Tag::COLD,
            Biome::Taiga => Tag::COLD | Tag::HABITABLE,
            Biome::Desert => Tag::ARID,
            Biome::Jungle => Tag::HABITABLE | Tag::FERTILE,
            Biome::Savanna => Tag::HABITABLE | Tag::ARID,
            Biome::Forest => Tag::HABITABLE | Tag::FERTILE,
            Biome::Swamp => Tag::FERTILE | Tag::HAZARDOUS,
            Biome::Grassland => Tag::HABITABLE | Tag::FERTILE,
        }
    }

    pub fn is_water(self) -> bool {
        self.tags().contains(BiomeTags::WATER)
    }

    pub fn is_habitable(self) -> bool {
        self.tags().contains(BiomeTags::HABITABLE)
    }

    /// Relative resource richness in `[0, 1]`, consumed by region seeding.
    pub fn resource_abundance(self) -> f32 {
        match self {
            Biome::Ocean => 0.3,
            Biome::Lake => 0.5,
            Biome::Mountain => 0.6,
            Biome::Hills => 0.55,
            Biome::Volcanic => 0.7,
            Biome::Tundra => 0.15,
            Biome::Taiga => 0.4,
            Biome::Desert => 0.1,
            Biome::Jungle => 0.9,
            Biome::Savanna => 0.45,
            Biome::Forest => 0.8,
            Biome::Swamp => 0.35,
            Biome::Grassland => 0.6,
        }
    }
}

// ---------------------------------------------------------------------------
// Tectonic plates
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlateType {
    Continental,
    Oceanic,
}

impl PlateType {
    /// Pre-noise elevation baseline per plate class.
    pub fn baseline_elevation(self) -> f32 {
        match self {
            PlateType::Continental => 0.62,
            PlateType::Oceanic => 0.18,
        }
    }
}

/// A tectonic plate. Plate ownership partitions the tile grid: every tile
/// belongs to exactly one plate (its Voronoi-nearest center).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Plate {
    pub id: u32,
    pub center: TileCoord,
    /// Drift vector with both components in `[-0.5, 0.5]`.
    pub drift: (f32, f32),
    pub kind: PlateType,
    pub owned_tiles: Vec<TileCoord>,
}

impl Plate {
    pub fn drift_magnitude(&self) -> f32 {
        (self.drift.0 * self.drift.0 + self.drift.1 * self.drift.1).sqrt()
    }
}

// ---------------------------------------------------------------------------
// Rivers
// ---------------------------------------------------------------------------

/// A carved river. The path is 4-connected and downhill monotone; the
/// terminus is either an ocean tile or a closed basin flagged as a lake.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct River {
    pub id: u32,
    pub source: TileCoord,
    pub terminus: TileCoord,
    pub path: Vec<TileCoord>,
    pub is_lake: bool,
}

impl River {
    pub fn length(&self) -> usize {
        self.path.len()
    }
}

// ---------------------------------------------------------------------------
// Regional features
// ---------------------------------------------------------------------------

/// Minimum pairwise Euclidean separation between placed features, in tiles.
pub const FEATURE_MIN_SEPARATION: f32 = 10.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FeatureType {
    Volcano,
    SubmergedCity,
    MagicZone,
    AncientRuins,
    CrystalSpire,
    BlightedGrove,
}

impl FeatureType {
    pub const ALL: [FeatureType; 6] = [
        FeatureType::Volcano,
        FeatureType::SubmergedCity,
        FeatureType::MagicZone,
        FeatureType::AncientRuins,
        FeatureType::CrystalSpire,
        FeatureType::BlightedGrove,
    ];

    pub fn effect_description(self, intensity: f32) -> String {
        let grade = if intensity >= 0.75 {
            "overwhelming"
        } else if intensity >= 0.4 {
            "pronounced"
        } else {
            "faint"
        };
        match self {
            FeatureType::Volcano => format!("{grade} geothermal activity scorches the slopes"),
            FeatureType::SubmergedCity => {
                format!("{grade} echoes of a drowned civilization stir the depths")
            }
            FeatureType::MagicZone => format!("{grade} arcane currents warp the land"),
            FeatureType::AncientRuins => format!("{grade} remnants of forgotten builders remain"),
            FeatureType::CrystalSpire => format!("{grade} resonant crystal growths pierce the rock"),
            FeatureType::BlightedGrove => format!("{grade} corruption seeps through the roots"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegionalFeature {
    pub id: u32,
    pub kind: FeatureType,
    pub position: TileCoord,
    /// Effect strength in `[0, 1]`.
    pub intensity: f32,
    pub effect: String,
}

// ---------------------------------------------------------------------------
// Status transitions
// ---------------------------------------------------------------------------

/// Rejected status-machine transition on a story or event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransitionError {
    pub from: &'static str,
    pub to: &'static str,
}

impl fmt::Display for TransitionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid status transition {} -> {}", self.from, self.to)
    }
}

impl std::error::Error for TransitionError {}

// ---------------------------------------------------------------------------
// Stories
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum StoryType {
    Legend,
    Prophecy,
    Tragedy,
    Mystery,
    Quest,
    Comedy,
}

impl StoryType {
    /// Narrative weight on the 0..=10 priority scale. Legends propagate
    /// ahead of everything; comedies stay local color.
    pub fn default_priority(self) -> u8 {
        match self {
            StoryType::Legend => 9,
            StoryType::Prophecy => 8,
            StoryType::Tragedy => 6,
            StoryType::Mystery => 5,
            StoryType::Quest => 4,
            StoryType::Comedy => 2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StoryStatus {
    Active,
    Resolved,
    Archived,
}

/// A propagating story. Value type: mutation returns a new instance,
/// equality is by `id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Story {
    pub id: u64,
    pub kind: StoryType,
    pub title: String,
    pub origin: TileCoord,
    pub origin_tick: u64,
    pub base_probability: f32,
    pub hop_count: u32,
    pub max_hops: u32,
    pub priority: u8,
    pub status: StoryStatus,
    pub affected_regions: BTreeSet<u64>,
    pub metadata: BTreeMap<String, String>,
    pub linked_story_id: Option<u64>,
    pub schema_version: u32,
}

impl PartialEq for Story {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Story {}

impl Story {
    pub fn builder(id: u64, kind: StoryType, title: impl Into<String>) -> StoryBuilder {
        StoryBuilder {
            id,
            kind,
            title: title.into(),
            origin: TileCoord::default(),
            origin_tick: 0,
            base_probability: 0.5,
            max_hops: 4,
            priority: kind.default_priority(),
            metadata: BTreeMap::new(),
            linked_story_id: None,
        }
    }

    pub fn resolve(&self) -> Result<Self, TransitionError> {
        match self.status {
            StoryStatus::Active => Ok(Self {
                status: StoryStatus::Resolved,
                ..self.clone()
            }),
            StoryStatus::Resolved => Err(TransitionError {
                from: "Resolved",
                to: "Resolved",
            }),
            StoryStatus::Archived => Err(TransitionError {
                from: "Archived",
                to: "Resolved",
            }),
        }
    }

    pub fn archive(&self) -> Result<Self, TransitionError> {
        match self.status {
            StoryStatus::Active | StoryStatus::Resolved => Ok(Self {
                status: StoryStatus::Archived,
                ..self.clone()
            }),
            StoryStatus::Archived => Err(TransitionError {
                from: "Archived",
                to: "Archived",
            }),
        }
    }

    /// Record a propagation admission: the region joins the affected set and
    /// the hop count rises to the admission depth if it is deeper.
    pub fn with_spread(&self, region: u64, hops: u32) -> Self {
        let mut next = self.clone();
        next.affected_regions.insert(region);
        next.hop_count = next.hop_count.max(hops);
        next
    }

    pub fn with_link(&self, linked: u64) -> Self {
        Self {
            linked_story_id: Some(linked),
            ..self.clone()
        }
    }
}

#[derive(Debug, Clone)]
pub struct StoryBuilder {
    id: u64,
    kind: StoryType,
    title: String,
    origin: TileCoord,
    origin_tick: u64,
    base_probability: f32,
    max_hops: u32,
    priority: u8,
    metadata: BTreeMap<String, String>,
    linked_story_id: Option<u64>,
}

impl StoryBuilder {
    pub fn origin(mut self, origin: TileCoord) -> Self {
        self.origin = origin;
        self
    }

    pub fn origin_tick(mut self, tick: u64) -> Self {
        self.origin_tick = tick;
        self
    }

    pub fn base_probability(mut self, p: f32) -> Self {
        self.base_probability = p.clamp(0.0, 1.0);
        self
    }

    pub fn max_hops(mut self, hops: u32) -> Self {
        self.max_hops = hops;
        self
    }

    pub fn priority(mut self, priority: u8) -> Self {
        self.priority = priority.min(10);
        self
    }

    pub fn metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn linked_story(mut self, id: u64) -> Self {
        self.linked_story_id = Some(id);
        self
    }

    pub fn build(self) -> Story {
        Story {
            id: self.id,
            kind: self.kind,
            title: self.title,
            origin: self.origin,
            origin_tick: self.origin_tick,
            base_probability: self.base_probability,
            hop_count: 0,
            max_hops: self.max_hops,
            priority: self.priority,
            status: StoryStatus::Active,
            affected_regions: BTreeSet::new(),
            metadata: self.metadata,
            linked_story_id: self.linked_story_id,
            schema_version: versions::STORY,
        }
    }
}

// ---------------------------------------------------------------------------
// World events
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum EventCategory {
    Festival,
    Disaster,
    Discovery,
    Conflict,
    Miracle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventStatus {
    Pending,
    Active,
    Propagating,
    Completed,
}

impl EventStatus {
    fn name(self) -> &'static str {
        match self {
            EventStatus::Pending => "Pending",
            EventStatus::Active => "Active",
            EventStatus::Propagating => "Propagating",
            EventStatus::Completed => "Completed",
        }
    }
}

/// A world event moving through the PENDING -> ACTIVE -> PROPAGATING ->
/// COMPLETED lattice. Same value-type discipline as [`Story`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorldEvent {
    pub id: u64,
    pub category: EventCategory,
    pub title: String,
    pub origin: TileCoord,
    pub origin_tick: u64,
    pub base_probability: f32,
    pub hop_count: u32,
    pub max_hops: u32,
    pub priority: u8,
    pub status: EventStatus,
    pub affected_regions: BTreeSet<u64>,
    pub metadata: BTreeMap<String, String>,
    pub linked_story_id: Option<u64>,
    pub schema_version: u32,
}

impl PartialEq for WorldEvent {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for WorldEvent {}

impl WorldEvent {
    pub fn builder(id: u64, category: EventCategory, title: impl Into<String>) -> WorldEventBuilder {
        WorldEventBuilder {
            id,
            category,
            title: title.into(),
            origin: TileCoord::default(),
            origin_tick: 0,
            base_probability: 0.5,
            max_hops: 3,
            priority: 5,
            metadata: BTreeMap::new(),
            linked_story_id: None,
        }
    }

    fn transition(&self, expected: EventStatus, next: EventStatus) -> Result<Self, TransitionError> {
        if self.status == expected {
            Ok(Self {
                status: next,
                ..self.clone()
            })
        } else {
            Err(TransitionError {
                from: self.status.name(),
                to: next.name(),
            })
        }
    }

    pub fn activate(&self) -> Result<Self, TransitionError> {
        self.transition(EventStatus::Pending, EventStatus::Active)
    }

    pub fn begin_propagation(&self) -> Result<Self, TransitionError> {
        self.transition(EventStatus::Active, EventStatus::Propagating)
    }

    pub fn complete(&self) -> Result<Self, TransitionError> {
        self.transition(EventStatus::Propagating, EventStatus::Completed)
    }

    pub fn with_spread(&self, region: u64, hops: u32) -> Self {
        let mut next = self.clone();
        next.affected_regions.insert(region);
        next.hop_count = next.hop_count.max(hops);
        next
    }

    pub fn with_link(&self, linked: u64) -> Self {
        Self {
            linked_story_id: Some(linked),
            ..self.clone()
        }
    }
}

#[derive(Debug, Clone)]
pub struct WorldEventBuilder {
    id: u64,
    category: EventCategory,
    title: String,
    origin: TileCoord,
    origin_tick: u64,
    base_probability: f32,
    max_hops: u32,
    priority: u8,
    metadata: BTreeMap<String, String>,
    linked_story_id: Option<u64>,
}

impl WorldEventBuilder {
    pub fn origin(mut self, origin: TileCoord) -> Self {
        self.origin = origin;
        self
    }

    pub fn origin_tick(mut self, tick: u64) -> Self {
        self.origin_tick = tick;
        self
    }

    pub fn base_probability(mut self, p: f32) -> Self {
        self.base_probability = p.clamp(0.0, 1.0);
        self
    }

    pub fn max_hops(mut self, hops: u32) -> Self {
        self.max_hops = hops;
        self
    }

    pub fn priority(mut self, priority: u8) -> Self {
        self.priority = priority.min(10);
        self
    }

    pub fn metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn linked_story(mut self, id: u64) -> Self {
        self.linked_story_id = Some(id);
        self
    }

    pub fn build(self) -> WorldEvent {
        WorldEvent {
            id: self.id,
            category: self.category,
            title: self.title,
            origin: self.origin,
            origin_tick: self.origin_tick,
            base_probability: self.base_probability,
            hop_count: 0,
            max_hops: self.max_hops,
            priority: self.priority,
            status: EventStatus::Pending,
            affected_regions: BTreeSet::new(),
            metadata: self.metadata,
            linked_story_id: self.linked_story_id,
            schema_version: versions::EVENT,
        }
    }
}

// ---------------------------------------------------------------------------
// Saturation
// ---------------------------------------------------------------------------

/// Which per-region saturation counter a propagating payload consumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SpreadKind {
    Story,
    Event,
}

impl SpreadKind {
    /// Hard per-region cap; at the cap the saturation factor reaches zero.
    pub fn default_cap(self) -> u32 {
        match self {
            SpreadKind::Story => 50,
            SpreadKind::Event => 20,
        }
    }
}

/// Fraction of the hard cap at which the soft-cap warning trips.
pub const SOFT_CAP_RATIO: f32 = 0.8;

// ---------------------------------------------------------------------------
// Resources and regions (persisted forms)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ResourceType {
    Wood,
    Stone,
    IronOre,
    Herbs,
    Fish,
    Crystal,
    Clay,
    Game,
}

/// Persisted state of a regenerating resource node.
/// Invariant: `0 <= current <= r_max`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceNodeState {
    pub id: String,
    pub kind: ResourceType,
    pub position: TileCoord,
    pub r_max: f64,
    pub regen_rate: f64,
    pub current: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RegionStatus {
    Active,
    Background,
}

/// Deterministic NPC behavior tag. Spawn-time classification only; no
/// further AI behind it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BehaviorType {
    Passive,
    Defensive,
    Aggressive,
    Skittish,
    Merchant,
}

/// Persisted region record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionSave {
    pub id: u64,
    pub center: TileCoord,
    pub width: u32,
    pub height: u32,
    pub status: RegionStatus,
    pub last_processed_tick: u64,
    pub resource_nodes: Vec<ResourceNodeState>,
    pub npc_count: u32,
    pub npc_behaviors: Vec<BehaviorType>,
    pub schema_version: u32,
}

// ---------------------------------------------------------------------------
// Items
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ItemCategory {
    Weapon,
    Armor,
    Tool,
    Consumable,
    Material,
    Trinket,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ItemRarity {
    Common,
    Uncommon,
    Rare,
    Epic,
    Legendary,
}

impl ItemRarity {
    /// Crafting XP multiplier contributed by the recipe output's rarity.
    pub fn xp_multiplier(self) -> f32 {
        match self {
            ItemRarity::Common => 1.0,
            ItemRarity::Uncommon => 1.2,
            ItemRarity::Rare => 1.5,
            ItemRarity::Epic => 2.0,
            ItemRarity::Legendary => 3.0,
        }
    }
}

/// Shared, immutable item template. Instances reference prototypes by id;
/// a registry owns the prototypes and resolution is O(1).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemPrototype {
    pub id: String,
    pub name: String,
    pub category: ItemCategory,
    pub rarity: ItemRarity,
    pub max_durability: u32,
    pub base_value: u32,
    pub weight: f32,
    pub stackable: bool,
    pub stack_cap: u32,
    pub properties: BTreeMap<String, String>,
    pub icon_path: String,
    pub model_path: String,
}

impl PartialEq for ItemPrototype {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for ItemPrototype {}

impl ItemPrototype {
    pub fn builder(
        id: impl Into<String>,
        name: impl Into<String>,
        category: ItemCategory,
    ) -> ItemPrototypeBuilder {
        ItemPrototypeBuilder {
            id: id.into(),
            name: name.into(),
            category,
            rarity: ItemRarity::Common,
            max_durability: 100,
            base_value: 1,
            weight: 1.0,
            stackable: false,
            stack_cap: 1,
            properties: BTreeMap::new(),
            icon_path: String::new(),
            model_path: String::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ItemPrototypeBuilder {
    id: String,
    name: String,
    category: ItemCategory,
    rarity: ItemRarity,
    max_durability: u32,
    base_value: u32,
    weight: f32,
    stackable: bool,
    stack_cap: u32,
    properties: BTreeMap<String, String>,
    icon_path: String,
    model_path: String,
}

impl ItemPrototypeBuilder {
    pub fn rarity(mut self, rarity: ItemRarity) -> Self {
        self.rarity = rarity;
        self
    }

    pub fn max_durability(mut self, value: u32) -> Self {
        self.max_durability = value;
        self
    }

    pub fn base_value(mut self, value: u32) -> Self {
        self.base_value = value;
        self
    }

    pub fn weight(mut self, weight: f32) -> Self {
        self.weight = weight;
        self
    }

    pub fn stackable(mut self, cap: u32) -> Self {
        self.stackable = cap > 1;
        self.stack_cap = cap.max(1);
        self
    }

    pub fn property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    pub fn icon_path(mut self, path: impl Into<String>) -> Self {
        self.icon_path = path.into();
        self
    }

    pub fn model_path(mut self, path: impl Into<String>) -> Self {
        self.model_path = path.into();
        self
    }

    pub fn build(self) -> ItemPrototype {
        ItemPrototype {
            id: self.id,
            name: self.name,
            category: self.category,
            rarity: self.rarity,
            max_durability: self.max_durability,
            base_value: self.base_value,
            weight: self.weight,
            stackable: self.stackable,
            stack_cap: self.stack_cap,
            properties: self.properties,
            icon_path: self.icon_path,
            model_path: self.model_path,
        }
    }
}

/// Ceiling for item evolution points.
pub const EVOLUTION_POINT_CAP: u32 = 10_000;

/// A live item. Carries a prototype id, never a pointer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemInstance {
    pub id: String,
    pub prototype_id: String,
    pub current_durability: u32,
    /// Meaningful only for stackable prototypes.
    pub quantity: u32,
    pub evolution_points: u32,
    pub owner_id: Option<String>,
    pub history_reference_id: Option<u64>,
    pub custom_properties: BTreeMap<String, String>,
}

impl ItemInstance {
    pub fn from_prototype(id: impl Into<String>, proto: &ItemPrototype) -> Self {
        Self {
            id: id.into(),
            prototype_id: proto.id.clone(),
            current_durability: proto.max_durability,
            quantity: 1,
            evolution_points: 0,
            owner_id: None,
            history_reference_id: None,
            custom_properties: BTreeMap::new(),
        }
    }

    pub fn with_evolution_points(&self, points: u32) -> Self {
        Self {
            evolution_points: points.min(EVOLUTION_POINT_CAP),
            ..self.clone()
        }
    }

    pub fn with_owner(&self, owner: impl Into<String>) -> Self {
        Self {
            owner_id: Some(owner.into()),
            ..self.clone()
        }
    }
}

// ---------------------------------------------------------------------------
// Structures
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum StructureType {
    House,
    Workshop,
    Warehouse,
    Tower,
    Shrine,
    Hall,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OwnerType {
    Player,
    Clan,
}

/// Totally ordered access lattice. The owner is implicitly `Full` and can
/// never be downgraded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum AccessLevel {
    None,
    Read,
    Use,
    Modify,
    Manage,
    Full,
}

/// Rejected structure mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StructureError {
    Destroyed,
    EmptyOwner,
}

impl fmt::Display for StructureError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StructureError::Destroyed => write!(f, "structure is destroyed"),
            StructureError::EmptyOwner => write!(f, "owner id must be non-empty"),
        }
    }
}

impl std::error::Error for StructureError {}

/// A player- or clan-owned structure. Value type; mutators return new
/// instances and stamp `last_updated_tick`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Structure {
    pub id: String,
    pub kind: StructureType,
    pub owner_id: String,
    pub owner_type: OwnerType,
    /// Canonical `"x:y:z"` location key.
    pub location: String,
    pub health: u32,
    pub max_health: u32,
    pub permissions: BTreeMap<String, AccessLevel>,
    pub rooms: Vec<String>,
    pub upgrades: Vec<String>,
    pub created_at_tick: u64,
    pub last_updated_tick: u64,
    pub schema_version: u32,
}

impl PartialEq for Structure {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Structure {}

impl Structure {
    pub fn builder(
        id: impl Into<String>,
        kind: StructureType,
        owner_id: impl Into<String>,
        owner_type: OwnerType,
    ) -> StructureBuilder {
        StructureBuilder {
            id: id.into(),
            kind,
            owner_id: owner_id.into(),
            owner_type,
            location: encode_location(0, 0, 0),
            max_health: 100,
            rooms: Vec::new(),
            upgrades: Vec::new(),
            created_at_tick: 0,
        }
    }

    pub fn is_destroyed(&self) -> bool {
        self.health == 0
    }

    /// Effective access level for a role. The owner id always resolves to
    /// `Full` regardless of the permission table.
    pub fn access_for(&self, role: &str) -> AccessLevel {
        if role == self.owner_id {
            return AccessLevel::Full;
        }
        self.permissions
            .get(role)
            .copied()
            .unwrap_or(AccessLevel::None)
    }

    pub fn has_access(&self, role: &str, required: AccessLevel) -> bool {
        self.access_for(role) >= required
    }

    /// Grant or change a role's access. Setting the owner role is a no-op.
    pub fn with_permission(&self, role: impl Into<String>, level: AccessLevel, now: u64) -> Self {
        let role = role.into();
        if role == self.owner_id {
            return self.clone();
        }
        let mut next = self.clone();
        next.permissions.insert(role, level);
        next.last_updated_tick = now;
        next
    }

    pub fn with_damage(&self, amount: u32, now: u64) -> Self {
        let mut next = self.clone();
        next.health = next.health.saturating_sub(amount);
        next.last_updated_tick = now;
        next
    }

    /// Repair, clamped at `max_health`. Destroyed structures reject repair.
    pub fn with_repair(&self, amount: u32, now: u64) -> Result<Self, StructureError> {
        if self.is_destroyed() {
            return Err(StructureError::Destroyed);
        }
        let mut next = self.clone();
        next.health = (next.health + amount).min(next.max_health);
        next.last_updated_tick = now;
        Ok(next)
    }

    /// Transfer ownership. Clears every non-owner permission.
    pub fn with_owner(
        &self,
        owner_id: impl Into<String>,
        owner_type: OwnerType,
        now: u64,
    ) -> Result<Self, StructureError> {
        let owner_id = owner_id.into();
        if owner_id.is_empty() {
            return Err(StructureError::EmptyOwner);
        }
        let mut next = self.clone();
        next.owner_id = owner_id;
        next.owner_type = owner_type;
        next.permissions.clear();
        next.last_updated_tick = now;
        Ok(next)
    }
}

#[derive(Debug, Clone)]
pub struct StructureBuilder {
    id: String,
    kind: StructureType,
    owner_id: String,
    owner_type: OwnerType,
    location: String,
    max_health: u32,
    rooms: Vec<String>,
    upgrades: Vec<String>,
    created_at_tick: u64,
}

impl StructureBuilder {
    pub fn location(mut self, x: i32, y: i32, z: i32) -> Self {
        self.location = encode_location(x, y, z);
        self
    }

    pub fn max_health(mut self, value: u32) -> Self {
        self.max_health = value.max(1);
        self
    }

    pub fn room(mut self, name: impl Into<String>) -> Self {
        self.rooms.push(name.into());
        self
    }

    pub fn upgrade(mut self, name: impl Into<String>) -> Self {
        self.upgrades.push(name.into());
        self
    }

    pub fn created_at(mut self, tick: u64) -> Self {
        self.created_at_tick = tick;
        self
    }

    pub fn build(self) -> Structure {
        Structure {
            id: self.id,
            kind: self.kind,
            owner_id: self.owner_id,
            owner_type: self.owner_type,
            location: self.location,
            health: self.max_health,
            max_health: self.max_health,
            permissions: BTreeMap::new(),
            rooms: self.rooms,
            upgrades: self.upgrades,
            created_at_tick: self.created_at_tick,
            last_updated_tick: self.created_at_tick,
            schema_version: versions::STRUCTURE,
        }
    }
}

// ---------------------------------------------------------------------------
// Taxation
// ---------------------------------------------------------------------------

/// Fiscal tuning shared by the tax ledger and the enforcement sweep.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TaxPolicy {
    pub rate: f64,
    pub cadence_days: u64,
    pub grace_days: u64,
    pub seizure_days: u64,
    pub ticks_per_day: u64,
}

impl Default for TaxPolicy {
    fn default() -> Self {
        Self {
            rate: 0.05,
            cadence_days: 7,
            grace_days: 14,
            seizure_days: 21,
            ticks_per_day: 1_440,
        }
    }
}

impl TaxPolicy {
    pub fn cadence_ticks(&self) -> u64 {
        self.cadence_days * self.ticks_per_day
    }

    pub fn grace_ticks(&self) -> u64 {
        self.grace_days * self.ticks_per_day
    }

    pub fn seizure_ticks(&self) -> u64 {
        self.seizure_days * self.ticks_per_day
    }
}

/// `floor(rate * income)`, the authoritative tax formula.
pub fn calculate_tax(rate: f64, income: u64) -> u64 {
    (rate * income as f64).floor() as u64
}

/// Enforcement standing derived purely from record state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EnforcementStanding {
    Current,
    InGrace,
    UnderSeizureRisk,
    Seizable,
}

/// Per-structure tax ledger entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaxRecord {
    pub structure_id: String,
    pub last_tax_tick: u64,
    pub next_tax_due_tick: u64,
    pub tax_owed: u64,
    pub tax_paid: u64,
    pub unpaid_since_tick: Option<u64>,
    pub taxable_income: u64,
}

impl TaxRecord {
    pub fn register(structure_id: impl Into<String>, now: u64, policy: &TaxPolicy) -> Self {
        Self {
            structure_id: structure_id.into(),
            last_tax_tick: now,
            next_tax_due_tick: now + policy.cadence_ticks(),
            tax_owed: 0,
            tax_paid: 0,
            unpaid_since_tick: None,
            taxable_income: 0,
        }
    }

    pub fn outstanding(&self) -> u64 {
        self.tax_owed.saturating_sub(self.tax_paid)
    }

    /// Assess a collection cycle: accrue `floor(rate * income)` and push the
    /// due tick one cadence out from `now`.
    pub fn with_collection(&self, income: u64, now: u64, policy: &TaxPolicy) -> Self {
        let mut next = self.clone();
        next.tax_owed += calculate_tax(policy.rate, income);
        next.taxable_income = income;
        next.last_tax_tick = now;
        next.next_tax_due_tick = now + policy.cadence_ticks();
        next
    }

    /// Credit a payment. Full settlement clears the unpaid marker.
    pub fn with_payment(&self, amount: u64, _now: u64) -> Self {
        let mut next = self.clone();
        next.tax_paid += amount;
        if next.outstanding() == 0 {
            next.unpaid_since_tick = None;
        }
        next
    }

    /// Stamp the first unpaid observation. The marker records the missed
    /// due tick, not the sweep tick, so repeated sweeps classify identically.
    pub fn observe_overdue(&self, now: u64) -> Self {
        let mut next = self.clone();
        if next.outstanding() > 0 && now >= next.next_tax_due_tick && next.unpaid_since_tick.is_none()
        {
            next.unpaid_since_tick = Some(next.next_tax_due_tick);
        }
        next
    }

    pub fn standing(&self, now: u64, policy: &TaxPolicy) -> EnforcementStanding {
        let Some(since) = self.unpaid_since_tick else {
            return EnforcementStanding::Current;
        };
        if self.outstanding() == 0 {
            return EnforcementStanding::Current;
        }
        let elapsed = now.saturating_sub(since);
        if elapsed == 0 {
            EnforcementStanding::Current
        } else if elapsed <= policy.grace_ticks() {
            EnforcementStanding::InGrace
        } else if elapsed < policy.grace_ticks() + policy.seizure_ticks() {
            EnforcementStanding::UnderSeizureRisk
        } else {
            EnforcementStanding::Seizable
        }
    }

    pub fn in_grace(&self, now: u64, policy: &TaxPolicy) -> bool {
        self.standing(now, policy) == EnforcementStanding::InGrace
    }

    pub fn under_seizure_risk(&self, now: u64, policy: &TaxPolicy) -> bool {
        self.standing(now, policy) == EnforcementStanding::UnderSeizureRisk
    }
}

// ---------------------------------------------------------------------------
// Diplomacy
// ---------------------------------------------------------------------------

/// Clamped relationship metrics toward a single target.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelationshipRecord {
    pub target_id: String,
    pub reputation: f32,
    pub influence: f32,
    pub alignment: f32,
    pub race_affinity: f32,
    pub last_updated_tick: u64,
}

impl PartialEq for RelationshipRecord {
    fn eq(&self, other: &Self) -> bool {
        self.target_id == other.target_id
    }
}

impl Eq for RelationshipRecord {}

impl RelationshipRecord {
    pub fn new(target_id: impl Into<String>, now: u64) -> Self {
        Self {
            target_id: target_id.into(),
            reputation: 0.0,
            influence: 0.0,
            alignment: 0.0,
            race_affinity: 0.0,
            last_updated_tick: now,
        }
    }

    pub fn with_reputation(&self, value: f32, now: u64) -> Self {
        Self {
            reputation: value.clamp(-100.0, 100.0),
            last_updated_tick: now,
            ..self.clone()
        }
    }

    pub fn with_influence(&self, value: f32, now: u64) -> Self {
        Self {
            influence: value.clamp(0.0, 100.0),
            last_updated_tick: now,
            ..self.clone()
        }
    }

    pub fn with_alignment(&self, value: f32, now: u64) -> Self {
        Self {
            alignment: value.clamp(-100.0, 100.0),
            last_updated_tick: now,
            ..self.clone()
        }
    }

    pub fn with_race_affinity(&self, value: f32, now: u64) -> Self {
        Self {
            race_affinity: value.clamp(-50.0, 50.0),
            last_updated_tick: now,
            ..self.clone()
        }
    }

    pub fn alliance_strength(&self) -> f32 {
        (self.reputation + self.alignment) / 2.0
    }

    pub fn war_likelihood(&self) -> f32 {
        ((-self.reputation - 20.0) / 50.0).max(0.0)
    }
}

/// Diplomatic incidents with fixed metric impacts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DiplomaticIncident {
    TradeMission,
    Betrayal,
    DiplomaticGift,
    WarDeclaration,
    AllianceFormed,
}

// ---------------------------------------------------------------------------
// Clans
// ---------------------------------------------------------------------------

/// A player clan. Immutable value type with builder construction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Clan {
    pub id: String,
    pub name: String,
    pub leader_id: String,
    pub members: BTreeSet<String>,
    pub created_at_tick: u64,
}

impl PartialEq for Clan {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Clan {}

impl Clan {
    pub fn builder(
        id: impl Into<String>,
        name: impl Into<String>,
        leader_id: impl Into<String>,
    ) -> ClanBuilder {
        let leader = leader_id.into();
        ClanBuilder {
            id: id.into(),
            name: name.into(),
            leader_id: leader,
            members: BTreeSet::new(),
            created_at_tick: 0,
        }
    }

    pub fn add_member(&self, player_id: impl Into<String>) -> Self {
        let mut next = self.clone();
        next.members.insert(player_id.into());
        next
    }

    pub fn remove_member(&self, player_id: &str) -> Self {
        let mut next = self.clone();
        if player_id != next.leader_id {
            next.members.remove(player_id);
        }
        next
    }

    pub fn is_member(&self, player_id: &str) -> bool {
        player_id == self.leader_id || self.members.contains(player_id)
    }
}

#[derive(Debug, Clone)]
pub struct ClanBuilder {
    id: String,
    name: String,
    leader_id: String,
    members: BTreeSet<String>,
    created_at_tick: u64,
}

impl ClanBuilder {
    pub fn member(mut self, player_id: impl Into<String>) -> Self {
        self.members.insert(player_id.into());
        self
    }

    pub fn created_at(mut self, tick: u64) -> Self {
        self.created_at_tick = tick;
        self
    }

    pub fn build(self) -> Clan {
        let mut members = self.members;
        members.insert(self.leader_id.clone());
        Clan {
            id: self.id,
            name: self.name,
            leader_id: self.leader_id,
            members,
            created_at_tick: self.created_at_tick,
        }
    }
}

// ---------------------------------------------------------------------------
// Characters
// ---------------------------------------------------------------------------

/// Absolute stat ceiling.
pub const STAT_HARD_CAP: i32 = 100;
/// Soft cap above which gains decay quadratically.
pub const STAT_SOFT_CAP: i32 = 50;
/// A crafter declares at most this many specializations.
pub const MAX_SPECIALIZATIONS: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum CoreStat {
    Strength,
    Agility,
    Constitution,
    Intellect,
    Willpower,
}

impl CoreStat {
    pub const ALL: [CoreStat; 5] = [
        CoreStat::Strength,
        CoreStat::Agility,
        CoreStat::Constitution,
        CoreStat::Intellect,
        CoreStat::Willpower,
    ];
}

/// Innate character traits carrying progression modifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum CharacterTrait {
    QuickLearner,
    IronMuscles,
    Bookish,
    Resilient,
    Nimble,
    ManaTouched,
}

impl CharacterTrait {
    /// Multiplier applied to raw stat deltas for a given stat.
    pub fn stat_multiplier(self, stat: CoreStat) -> f32 {
        match (self, stat) {
            (CharacterTrait::IronMuscles, CoreStat::Strength) => 1.25,
            (CharacterTrait::Bookish, CoreStat::Intellect) => 1.25,
            (CharacterTrait::Bookish, CoreStat::Strength) => 0.9,
            (CharacterTrait::Resilient, CoreStat::Constitution) => 1.2,
            (CharacterTrait::Nimble, CoreStat::Agility) => 1.2,
            (CharacterTrait::ManaTouched, CoreStat::Willpower) => 1.15,
            _ => 1.0,
        }
    }

    /// Multiplier applied to raw skill XP.
    pub fn skill_multiplier(self) -> f32 {
        match self {
            CharacterTrait::QuickLearner => 1.2,
            _ => 1.0,
        }
    }
}

/// Crafting proficiency tiers bucketed from cumulative XP. XP keeps
/// accumulating past Master; the tier saturates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum CraftingProficiency {
    Novice,
    Apprentice,
    Journeyman,
    Expert,
    Master,
}

impl CraftingProficiency {
    pub const ALL: [CraftingProficiency; 5] = [
        CraftingProficiency::Novice,
        CraftingProficiency::Apprentice,
        CraftingProficiency::Journeyman,
        CraftingProficiency::Expert,
        CraftingProficiency::Master,
    ];

    pub fn from_xp(xp: u64) -> Self {
        if xp >= 1_000 {
            CraftingProficiency::Master
        } else if xp >= 600 {
            CraftingProficiency::Expert
        } else if xp >= 300 {
            CraftingProficiency::Journeyman
        } else if xp >= 100 {
            CraftingProficiency::Apprentice
        } else {
            CraftingProficiency::Novice
        }
    }

    pub fn xp_threshold(self) -> u64 {
        match self {
            CraftingProficiency::Novice => 0,
            CraftingProficiency::Apprentice => 100,
            CraftingProficiency::Journeyman => 300,
            CraftingProficiency::Expert => 600,
            CraftingProficiency::Master => 1_000,
        }
    }

    pub fn failure_multiplier(self) -> f32 {
        match self {
            CraftingProficiency::Novice => 0.5,
            CraftingProficiency::Apprentice => 0.4,
            CraftingProficiency::Journeyman => 0.3,
            CraftingProficiency::Expert => 0.2,
            CraftingProficiency::Master => 0.1,
        }
    }

    /// Ordinal index used by the tier-gap term in the failure roll.
    pub fn rank(self) -> i32 {
        match self {
            CraftingProficiency::Novice => 0,
            CraftingProficiency::Apprentice => 1,
            CraftingProficiency::Journeyman => 2,
            CraftingProficiency::Expert => 3,
            CraftingProficiency::Master => 4,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum CraftingCategory {
    Smithing,
    Alchemy,
    Woodworking,
    Tailoring,
    Cooking,
    Enchanting,
}

/// Post-success quality tag altering durability and XP yield.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum CraftingQuality {
    Masterwork,
    HighQuality,
    Standard,
    Flawed,
}

impl CraftingQuality {
    /// Cumulative-uniform quality bucket: `< 0.05` Masterwork, `< 0.25`
    /// HighQuality, `< 0.85` Standard, else Flawed.
    pub fn from_roll(roll: f32) -> Self {
        if roll < 0.05 {
            CraftingQuality::Masterwork
        } else if roll < 0.25 {
            CraftingQuality::HighQuality
        } else if roll < 0.85 {
            CraftingQuality::Standard
        } else {
            CraftingQuality::Flawed
        }
    }

    pub fn xp_multiplier(self) -> f32 {
        match self {
            CraftingQuality::Masterwork => 2.0,
            CraftingQuality::HighQuality => 1.5,
            CraftingQuality::Standard => 1.0,
            CraftingQuality::Flawed => 0.5,
        }
    }

    pub fn durability_multiplier(self) -> f32 {
        match self {
            CraftingQuality::Masterwork => 1.3,
            CraftingQuality::HighQuality => 1.15,
            CraftingQuality::Standard => 1.0,
            CraftingQuality::Flawed => 0.7,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SkillProgress {
    pub xp: u64,
}

impl SkillProgress {
    pub fn tier(self) -> CraftingProficiency {
        CraftingProficiency::from_xp(self.xp)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManaPool {
    pub current: u32,
    pub max: u32,
}

/// A player character sheet: hard-capped stats, skills, traits, inventory
/// and mana.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CharacterSheet {
    pub id: String,
    pub name: String,
    pub stats: BTreeMap<CoreStat, i32>,
    pub skills: BTreeMap<String, SkillProgress>,
    pub traits: BTreeSet<CharacterTrait>,
    pub inventory: Vec<String>,
    pub mana: ManaPool,
    pub specializations: BTreeSet<CraftingCategory>,
    pub schema_version: u32,
}

impl CharacterSheet {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        let mut stats = BTreeMap::new();
        for stat in CoreStat::ALL {
            stats.insert(stat, 10);
        }
        let mut sheet = Self {
            id: id.into(),
            name: name.into(),
            stats,
            skills: BTreeMap::new(),
            traits: BTreeSet::new(),
            inventory: Vec::new(),
            mana: ManaPool { current: 0, max: 0 },
            specializations: BTreeSet::new(),
            schema_version: versions::CHARACTER,
        };
        sheet.mana = ManaPool {
            current: sheet.max_mana(),
            max: sheet.max_mana(),
        };
        sheet
    }

    pub fn stat(&self, stat: CoreStat) -> i32 {
        self.stats.get(&stat).copied().unwrap_or(0)
    }

    pub fn max_mana(&self) -> u32 {
        (10 + 2 * self.stat(CoreStat::Intellect)).max(0) as u32
    }

    pub fn mana_regen(&self) -> u32 {
        (1 + self.stat(CoreStat::Intellect) / 10).max(0) as u32
    }

    pub fn max_health(&self) -> u32 {
        (50 + 5 * self.stat(CoreStat::Constitution)).max(0) as u32
    }

    pub fn melee_damage_bonus(&self) -> i32 {
        self.stat(CoreStat::Strength) / 2
    }

    pub fn skill_xp(&self, skill: &str) -> u64 {
        self.skills.get(skill).map(|s| s.xp).unwrap_or(0)
    }

    pub fn skill_tier(&self, skill: &str) -> CraftingProficiency {
        CraftingProficiency::from_xp(self.skill_xp(skill))
    }

    pub fn is_specialized(&self, category: CraftingCategory) -> bool {
        self.specializations.contains(&category)
    }

    /// Declare a specialization; silently ignored past the two-slot limit.
    pub fn add_specialization(&mut self, category: CraftingCategory) {
        if self.specializations.len() < MAX_SPECIALIZATIONS
            || self.specializations.contains(&category)
        {
            self.specializations.insert(category);
        }
    }
}

// ---------------------------------------------------------------------------
// World content, checksums, chunks
// ---------------------------------------------------------------------------

/// Fixed-point scale used when quantizing elevation for hashing, matching
/// the six-decimal precision used across the simulation.
pub const ELEVATION_QUANT_SCALE: f64 = 1_000_000.0;

/// Full generated world: the static product of the worldgen pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorldContent {
    pub width: u32,
    pub height: u32,
    pub seed: u64,
    /// Row-major `height * width` elevation in `[0, 1]`.
    pub elevation: Vec<f32>,
    pub biomes: Vec<Biome>,
    pub plates: Vec<Plate>,
    pub rivers: Vec<River>,
    pub features: Vec<RegionalFeature>,
    pub stories: Vec<Story>,
}

/// Canonical hashed projection of [`WorldContent`]: quantized elevation,
/// biome grid, and id-ordered rivers/features/stories.
#[derive(Serialize)]
struct CanonicalWorld<'a> {
    width: u32,
    height: u32,
    seed: u64,
    elevation_q: Vec<u32>,
    biomes: &'a [Biome],
    rivers: Vec<&'a River>,
    features: Vec<&'a RegionalFeature>,
    stories: Vec<&'a Story>,
}

/// Deterministic content hash over the canonical byte serialization of the
/// world. Identical worlds hash identically across runs and platforms.
pub fn world_checksum(content: &WorldContent) -> u64 {
    let elevation_q = content
        .elevation
        .iter()
        .map(|v| (f64::from(*v) * ELEVATION_QUANT_SCALE).round() as u32)
        .collect();

    let mut rivers: Vec<&River> = content.rivers.iter().collect();
    rivers.sort_unstable_by_key(|r| r.id);
    let mut features: Vec<&RegionalFeature> = content.features.iter().collect();
    features.sort_unstable_by_key(|f| f.id);
    let mut stories: Vec<&Story> = content.stories.iter().collect();
    stories.sort_unstable_by_key(|s| s.id);

    let canonical = CanonicalWorld {
        width: content.width,
        height: content.height,
        seed: content.seed,
        elevation_q,
        biomes: &content.biomes,
        rivers,
        features,
        stories,
    };
    let encoded = bincode::serialize(&canonical).expect("canonical world serialization for hashing");
    hash_bytes(&encoded)
}

/// Seed-stable hash over raw bytes.
pub fn hash_bytes(bytes: &[u8]) -> u64 {
    let mut hasher = RandomState::with_seeds(0, 0, 0, 0).build_hasher();
    hasher.write(bytes);
    hasher.finish()
}

/// Exported world chunk, the JSON contract consumed by external viewers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorldChunk {
    pub schema_version: u32,
    pub width: u32,
    pub height: u32,
    pub seed: u64,
    pub elevation: Vec<f32>,
    pub checksum: u64,
}

impl WorldChunk {
    pub fn from_content(content: &WorldContent) -> Self {
        Self {
            schema_version: versions::WORLD_CHUNK,
            width: content.width,
            height: content.height,
            seed: content.seed,
            elevation: content.elevation.clone(),
            checksum: world_checksum(content),
        }
    }
}

pub fn encode_world_chunk_json(chunk: &WorldChunk) -> serde_json::Result<String> {
    serde_json::to_string_pretty(chunk)
}

pub fn decode_world_chunk_json(data: &str) -> serde_json::Result<WorldChunk> {
    serde_json::from_str(data)
}

/// Elevation band glyphs used by the ASCII viewer contract.
pub fn elevation_glyph(value: f32) -> char {
    if value < 0.2 {
        '~'
    } else if value < 0.4 {
        ','
    } else if value < 0.7 {
        '"'
    } else if value < 0.9 {
        '^'
    } else {
        'M'
    }
}

// ---------------------------------------------------------------------------
// Save envelopes and schema versions
// ---------------------------------------------------------------------------

/// Current schema versions, keyed by persisted module.
pub mod versions {
    pub const WORLD_CHUNK: u32 = 1;
    pub const CHARACTER: u32 = 1;
    pub const STRUCTURE: u32 = 1;
    pub const STORY: u32 = 1;
    pub const EVENT: u32 = 1;
    pub const REGION: u32 = 1;
    pub const SAVE: u32 = 1;
}

/// Persisted module identifiers used by the migration registry.
pub mod modules {
    pub const WORLD_CHUNK: &str = "world/Chunk";
    pub const CHARACTER: &str = "character/Character";
    pub const STRUCTURE: &str = "structure/Structure";
}

/// Aggregate save payload: the whole simulation state as JSON.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorldSave {
    pub schema_version: u32,
    pub tick: u64,
    pub world: WorldContent,
    pub regions: Vec<RegionSave>,
    pub characters: Vec<CharacterSheet>,
    pub structures: Vec<Structure>,
    pub tax_records: Vec<TaxRecord>,
    pub relationships: BTreeMap<String, Vec<RelationshipRecord>>,
    pub events: Vec<WorldEvent>,
    pub clans: Vec<Clan>,
}

pub fn encode_save_json(save: &WorldSave) -> serde_json::Result<String> {
    serde_json::to_string_pretty(save)
}

pub fn decode_save_json(data: &str) -> serde_json::Result<WorldSave> {
    serde_json::from_str(data)
}
