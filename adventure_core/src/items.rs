//! Item prototype registry.
//!
//! Prototypes are immutable and shared; the registry owns them and resolves
//! ids in O(1). Instances carry ids, never pointers.

use std::collections::HashMap;
use std::sync::Arc;

use bevy::prelude::Resource;

use world_schema::{ItemCategory, ItemPrototype, ItemRarity};

#[derive(Resource, Debug, Clone, Default)]
pub struct PrototypeRegistry {
    prototypes: HashMap<String, Arc<ItemPrototype>>,
}

impl PrototypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry preloaded with the base item set.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(
            ItemPrototype::builder("iron_sword", "Iron Sword", ItemCategory::Weapon)
                .rarity(ItemRarity::Common)
                .max_durability(120)
                .base_value(45)
                .weight(3.5)
                .property("damage", "8")
                .icon_path("icons/items/iron_sword.png")
                .model_path("models/items/iron_sword.glb")
                .build(),
        );
        registry.register(
            ItemPrototype::builder("iron_ingot", "Iron Ingot", ItemCategory::Material)
                .rarity(ItemRarity::Common)
                .max_durability(1)
                .base_value(8)
                .weight(1.0)
                .stackable(50)
                .icon_path("icons/items/iron_ingot.png")
                .build(),
        );
        registry.register(
            ItemPrototype::builder("leather_strip", "Leather Strip", ItemCategory::Material)
                .rarity(ItemRarity::Common)
                .max_durability(1)
                .base_value(2)
                .weight(0.2)
                .stackable(100)
                .icon_path("icons/items/leather_strip.png")
                .build(),
        );
        registry.register(
            ItemPrototype::builder("steel_hammer", "Steel Hammer", ItemCategory::Tool)
                .rarity(ItemRarity::Uncommon)
                .max_durability(200)
                .base_value(60)
                .weight(4.0)
                .icon_path("icons/items/steel_hammer.png")
                .build(),
        );
        registry.register(
            ItemPrototype::builder("healing_draught", "Healing Draught", ItemCategory::Consumable)
                .rarity(ItemRarity::Common)
                .max_durability(1)
                .base_value(15)
                .weight(0.5)
                .stackable(10)
                .property("heal", "25")
                .icon_path("icons/items/healing_draught.png")
                .build(),
        );
        registry
    }

    pub fn register(&mut self, prototype: ItemPrototype) {
        self.prototypes
            .insert(prototype.id.clone(), Arc::new(prototype));
    }

    pub fn resolve(&self, id: &str) -> Option<&Arc<ItemPrototype>> {
        self.prototypes.get(id)
    }

    pub fn len(&self) -> usize {
        self.prototypes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prototypes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use world_schema::ItemInstance;

    #[test]
    fn resolution_returns_shared_prototypes() {
        let registry = PrototypeRegistry::with_defaults();
        let sword = registry.resolve("iron_sword").expect("iron_sword");
        let again = registry.resolve("iron_sword").expect("iron_sword");
        assert!(Arc::ptr_eq(sword, again));
        assert_eq!(registry.resolve("obsidian_axe"), None);
    }

    #[test]
    fn instances_reference_prototypes_by_id() {
        let registry = PrototypeRegistry::with_defaults();
        let proto = registry.resolve("iron_sword").expect("iron_sword");
        let instance = ItemInstance::from_prototype("item_1", proto);
        assert_eq!(instance.prototype_id, "iron_sword");
        assert_eq!(instance.current_durability, proto.max_durability);
    }
}
