//! Player action envelopes and their validation rules.
//!
//! The envelope is the wire-agnostic contract between the session layer and
//! the dispatch pipeline: `{action_id, player_id, kind, parameters,
//! timestamp}`. Validation here is pure; lock acquisition and dispatch live
//! in `adventure_core::pipeline`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Actions older than this at validation time are expired.
pub const ACTION_TTL_MS: u64 = 5_000;

/// Maximum accepted chat message length, in characters.
pub const CHAT_MESSAGE_MAX_LEN: usize = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActionKind {
    Move,
    Harvest,
    Craft,
    Attack,
    Trade,
    Build,
    Chat,
    UseItem,
    DropItem,
    PickUpItem,
    TransferOwnership,
    JoinClan,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActionStatus {
    Pending,
    Accepted,
    Rejected,
    Completed,
}

/// A submitted player action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionEnvelope {
    pub action_id: String,
    pub player_id: String,
    pub kind: ActionKind,
    pub parameters: BTreeMap<String, Value>,
    /// Submission wall-clock time, milliseconds since the epoch.
    pub timestamp_ms: u64,
    pub status: ActionStatus,
}

impl ActionEnvelope {
    pub fn new(
        action_id: impl Into<String>,
        player_id: impl Into<String>,
        kind: ActionKind,
        timestamp_ms: u64,
    ) -> Self {
        Self {
            action_id: action_id.into(),
            player_id: player_id.into(),
            kind,
            parameters: BTreeMap::new(),
            timestamp_ms,
            status: ActionStatus::Pending,
        }
    }

    pub fn with_param(mut self, key: impl Into<String>, value: Value) -> Self {
        self.parameters.insert(key.into(), value);
        self
    }

    pub fn param(&self, key: &str) -> Option<&Value> {
        self.parameters.get(key)
    }

    pub fn param_str(&self, key: &str) -> Option<&str> {
        self.param(key).and_then(Value::as_str)
    }

    pub fn param_i64(&self, key: &str) -> Option<i64> {
        self.param(key).and_then(Value::as_i64)
    }

    pub fn age_ms(&self, now_ms: u64) -> u64 {
        now_ms.saturating_sub(self.timestamp_ms)
    }

    pub fn with_status(mut self, status: ActionStatus) -> Self {
        self.status = status;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ActionValidationError {
    #[error("action {action_id} does not belong to player {player_id}")]
    WrongPlayer {
        action_id: String,
        player_id: String,
    },
    #[error("action {action_id} expired ({age_ms} ms old, limit {ACTION_TTL_MS})")]
    Expired { action_id: String, age_ms: u64 },
    #[error("{kind:?} action requires parameter '{name}'")]
    MissingParameter { kind: ActionKind, name: &'static str },
    #[error("parameter '{name}' must not be empty")]
    EmptyParameter { name: &'static str },
    #[error("chat message is {len} chars, limit {CHAT_MESSAGE_MAX_LEN}")]
    OversizedMessage { len: usize },
    #[error("{kind:?} action requires an owned character")]
    CharacterRequired { kind: ActionKind },
}

fn require(
    envelope: &ActionEnvelope,
    name: &'static str,
) -> Result<(), ActionValidationError> {
    if envelope.param(name).is_some() {
        Ok(())
    } else {
        Err(ActionValidationError::MissingParameter {
            kind: envelope.kind,
            name,
        })
    }
}

fn require_non_empty_str(
    envelope: &ActionEnvelope,
    name: &'static str,
) -> Result<(), ActionValidationError> {
    match envelope.param_str(name) {
        Some(value) if !value.is_empty() => Ok(()),
        Some(_) => Err(ActionValidationError::EmptyParameter { name }),
        None => Err(ActionValidationError::MissingParameter {
            kind: envelope.kind,
            name,
        }),
    }
}

/// Validate an envelope against the asserting player, the liveness window,
/// and the per-kind parameter table.
pub fn validate_envelope(
    envelope: &ActionEnvelope,
    asserting_player: &str,
    now_ms: u64,
    has_character: bool,
) -> Result<(), ActionValidationError> {
    if envelope.player_id != asserting_player {
        return Err(ActionValidationError::WrongPlayer {
            action_id: envelope.action_id.clone(),
            player_id: asserting_player.to_owned(),
        });
    }

    let age = envelope.age_ms(now_ms);
    if age > ACTION_TTL_MS {
        return Err(ActionValidationError::Expired {
            action_id: envelope.action_id.clone(),
            age_ms: age,
        });
    }

    if envelope.kind != ActionKind::Chat && !has_character {
        return Err(ActionValidationError::CharacterRequired {
            kind: envelope.kind,
        });
    }

    match envelope.kind {
        ActionKind::Move => {
            require(envelope, "x")?;
            require(envelope, "y")?;
        }
        ActionKind::Harvest => require_non_empty_str(envelope, "resource_node_id")?,
        ActionKind::Craft => require_non_empty_str(envelope, "recipe_id")?,
        ActionKind::Attack => require_non_empty_str(envelope, "target_id")?,
        ActionKind::Trade => {
            require_non_empty_str(envelope, "target_player_id")?;
            require(envelope, "offered_items")?;
        }
        ActionKind::Build => {
            require_non_empty_str(envelope, "structure_type")?;
            require(envelope, "x")?;
            require(envelope, "y")?;
        }
        ActionKind::Chat => {
            let message = envelope.param_str("message").ok_or(
                ActionValidationError::MissingParameter {
                    kind: ActionKind::Chat,
                    name: "message",
                },
            )?;
            if message.is_empty() {
                return Err(ActionValidationError::EmptyParameter { name: "message" });
            }
            let len = message.chars().count();
            if len > CHAT_MESSAGE_MAX_LEN {
                return Err(ActionValidationError::OversizedMessage { len });
            }
        }
        ActionKind::UseItem | ActionKind::DropItem | ActionKind::PickUpItem => {
            require_non_empty_str(envelope, "item_id")?;
        }
        ActionKind::TransferOwnership => {
            require_non_empty_str(envelope, "structure_id")?;
            require_non_empty_str(envelope, "target_player_id")?;
        }
        ActionKind::JoinClan => require_non_empty_str(envelope, "clan_id")?,
    }

    Ok(())
}

/// The lockable resource an action contends on, if any. Two actions conflict
/// iff they resolve to the same claim.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ResourceClaim {
    /// HARVEST on a resource node.
    Node(String),
    /// TRANSFER_OWNERSHIP or structure modification.
    Structure(String),
    /// BUILD on a `(structure_type, x, y)` site.
    BuildSite(String, i64, i64),
    /// Per-player serialization of CRAFT actions.
    CraftSerial(String),
}

impl ResourceClaim {
    /// Derive the claim for an envelope. Validation is assumed to have
    /// passed; malformed parameters simply yield no claim.
    pub fn for_envelope(envelope: &ActionEnvelope) -> Option<Self> {
        match envelope.kind {
            ActionKind::Harvest => envelope
                .param_str("resource_node_id")
                .map(|id| ResourceClaim::Node(id.to_owned())),
            ActionKind::TransferOwnership => envelope
                .param_str("structure_id")
                .map(|id| ResourceClaim::Structure(id.to_owned())),
            ActionKind::Build => {
                let kind = envelope.param_str("structure_type")?;
                let x = envelope.param_i64("x")?;
                let y = envelope.param_i64("y")?;
                Some(ResourceClaim::BuildSite(kind.to_owned(), x, y))
            }
            ActionKind::Craft => Some(ResourceClaim::CraftSerial(envelope.player_id.clone())),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn harvest(now: u64) -> ActionEnvelope {
        ActionEnvelope::new("a1", "alia", ActionKind::Harvest, now)
            .with_param("resource_node_id", json!("node_123"))
    }

    #[test]
    fn valid_harvest_passes() {
        let envelope = harvest(1_000);
        assert!(validate_envelope(&envelope, "alia", 1_500, true).is_ok());
    }

    #[test]
    fn wrong_player_is_rejected() {
        let envelope = harvest(1_000);
        assert!(matches!(
            validate_envelope(&envelope, "bram", 1_500, true),
            Err(ActionValidationError::WrongPlayer { .. })
        ));
    }

    #[test]
    fn expired_actions_are_rejected() {
        let envelope = harvest(1_000);
        assert!(matches!(
            validate_envelope(&envelope, "alia", 7_000, true),
            Err(ActionValidationError::Expired { age_ms: 6_000, .. })
        ));
    }

    #[test]
    fn missing_parameters_are_named() {
        let envelope = ActionEnvelope::new("a2", "alia", ActionKind::Build, 0)
            .with_param("structure_type", json!("House"))
            .with_param("x", json!(4));
        assert_eq!(
            validate_envelope(&envelope, "alia", 100, true),
            Err(ActionValidationError::MissingParameter {
                kind: ActionKind::Build,
                name: "y",
            })
        );
    }

    #[test]
    fn chat_bounds_are_enforced_without_a_character() {
        let empty = ActionEnvelope::new("a3", "alia", ActionKind::Chat, 0)
            .with_param("message", json!(""));
        assert!(matches!(
            validate_envelope(&empty, "alia", 100, false),
            Err(ActionValidationError::EmptyParameter { name: "message" })
        ));

        let oversized = ActionEnvelope::new("a4", "alia", ActionKind::Chat, 0)
            .with_param("message", json!("x".repeat(501)));
        assert!(matches!(
            validate_envelope(&oversized, "alia", 100, false),
            Err(ActionValidationError::OversizedMessage { len: 501 })
        ));

        let fine = ActionEnvelope::new("a5", "alia", ActionKind::Chat, 0)
            .with_param("message", json!("hello"));
        assert!(validate_envelope(&fine, "alia", 100, false).is_ok());
    }

    #[test]
    fn non_chat_actions_need_a_character() {
        let envelope = harvest(0);
        assert!(matches!(
            validate_envelope(&envelope, "alia", 100, false),
            Err(ActionValidationError::CharacterRequired { .. })
        ));
    }

    #[test]
    fn claims_identify_conflicts() {
        let a = harvest(0);
        let b = harvest(0);
        assert_eq!(
            ResourceClaim::for_envelope(&a),
            ResourceClaim::for_envelope(&b)
        );

        let build = ActionEnvelope::new("a6", "alia", ActionKind::Build, 0)
            .with_param("structure_type", json!("House"))
            .with_param("x", json!(4))
            .with_param("y", json!(9));
        assert_eq!(
            ResourceClaim::for_envelope(&build),
            Some(ResourceClaim::BuildSite("House".into(), 4, 9))
        );

        let craft = ActionEnvelope::new("a7", "alia", ActionKind::Craft, 0)
            .with_param("recipe_id", json!("iron_sword"));
        assert_eq!(
            ResourceClaim::for_envelope(&craft),
            Some(ResourceClaim::CraftSerial("alia".into()))
        );

        let chat = ActionEnvelope::new("a8", "alia", ActionKind::Chat, 0)
            .with_param("message", json!("hi"));
        assert_eq!(ResourceClaim::for_envelope(&chat), None);
    }
}
