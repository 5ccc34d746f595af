//! Action types: Street, ActionType, GameAction, ActionKey
//!
//! The `ActionKey` string encoding (`street:seat:action:amount`) is the
//! canonical key space shared by the solver distribution, the blended
//! distribution, and the selector. Aligning all three on one encoding lets
//! probability mass from different sources be mixed per key and lets a
//! sampled key be decoded back into a concrete action.

use serde::{Deserialize, Serialize};

// ============================================================================
// Street
// ============================================================================

/// Betting round of the current hand.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Street {
    Preflop,
    Flop,
    Turn,
    River,
}

impl std::fmt::Display for Street {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Street::Preflop => write!(f, "preflop"),
            Street::Flop => write!(f, "flop"),
            Street::Turn => write!(f, "turn"),
            Street::River => write!(f, "river"),
        }
    }
}

impl std::str::FromStr for Street {
    type Err = ActionKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "preflop" => Ok(Street::Preflop),
            "flop" => Ok(Street::Flop),
            "turn" => Ok(Street::Turn),
            "river" => Ok(Street::River),
            other => Err(ActionKeyError::UnknownStreet(other.to_string())),
        }
    }
}

// ============================================================================
// Action types
// ============================================================================

/// Concrete action vocabulary as the table understands it.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum ActionType {
    Fold,
    Check,
    Call,
    Bet,
    Raise,
    AllIn,
}

impl ActionType {
    /// Whether this action commits additional chips beyond a call.
    pub fn is_aggressive(self) -> bool {
        matches!(self, ActionType::Bet | ActionType::Raise | ActionType::AllIn)
    }

    /// Collapse to the coarse vocabulary advisors speak.
    pub fn coarse(self) -> CoarseAction {
        match self {
            ActionType::Fold => CoarseAction::Fold,
            ActionType::Check => CoarseAction::Check,
            ActionType::Call => CoarseAction::Call,
            ActionType::Bet | ActionType::Raise | ActionType::AllIn => CoarseAction::Raise,
        }
    }
}

impl std::fmt::Display for ActionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ActionType::Fold => write!(f, "fold"),
            ActionType::Check => write!(f, "check"),
            ActionType::Call => write!(f, "call"),
            ActionType::Bet => write!(f, "bet"),
            ActionType::Raise => write!(f, "raise"),
            ActionType::AllIn => write!(f, "all-in"),
        }
    }
}

impl std::str::FromStr for ActionType {
    type Err = ActionKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "fold" => Ok(ActionType::Fold),
            "check" => Ok(ActionType::Check),
            "call" => Ok(ActionType::Call),
            "bet" => Ok(ActionType::Bet),
            "raise" => Ok(ActionType::Raise),
            "all-in" => Ok(ActionType::AllIn),
            other => Err(ActionKeyError::UnknownAction(other.to_string())),
        }
    }
}

/// Coarse action vocabulary used by advisors.
///
/// Advisors recommend at this granularity; the blender redistributes coarse
/// "raise" mass across the solver's discrete raise-size keys.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "lowercase")]
pub enum CoarseAction {
    Fold,
    Check,
    Call,
    Raise,
}

impl CoarseAction {
    /// All coarse actions in canonical order.
    pub const ALL: [CoarseAction; 4] = [
        CoarseAction::Fold,
        CoarseAction::Check,
        CoarseAction::Call,
        CoarseAction::Raise,
    ];
}

impl std::fmt::Display for CoarseAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CoarseAction::Fold => write!(f, "fold"),
            CoarseAction::Check => write!(f, "check"),
            CoarseAction::Call => write!(f, "call"),
            CoarseAction::Raise => write!(f, "raise"),
        }
    }
}

impl std::str::FromStr for CoarseAction {
    type Err = ActionKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "fold" => Ok(CoarseAction::Fold),
            "check" => Ok(CoarseAction::Check),
            "call" => Ok(CoarseAction::Call),
            "raise" => Ok(CoarseAction::Raise),
            other => Err(ActionKeyError::UnknownAction(other.to_string())),
        }
    }
}

// ============================================================================
// Concrete action
// ============================================================================

/// A concrete action ready for execution: type plus chip amount.
///
/// `amount` is zero for fold/check and the committed total for call/bet/raise.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GameAction {
    pub action_type: ActionType,
    pub amount: f64,
}

impl GameAction {
    pub fn new(action_type: ActionType, amount: f64) -> Self {
        Self { action_type, amount }
    }

    /// Zero-amount action constructor for fold/check.
    pub fn simple(action_type: ActionType) -> Self {
        Self { action_type, amount: 0.0 }
    }
}

// ============================================================================
// Action key
// ============================================================================

/// Errors from parsing a canonical action key.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum ActionKeyError {
    #[error("malformed action key: {0}")]
    Malformed(String),
    #[error("unknown street: {0}")]
    UnknownStreet(String),
    #[error("unknown action: {0}")]
    UnknownAction(String),
    #[error("invalid amount in action key: {0}")]
    InvalidAmount(String),
}

/// Canonical encoding of (street, seat, action type, amount).
#[derive(Debug, Clone, PartialEq)]
pub struct ActionKey {
    pub street: Street,
    pub seat: u8,
    pub action_type: ActionType,
    pub amount: f64,
}

impl ActionKey {
    pub fn new(street: Street, seat: u8, action_type: ActionType, amount: f64) -> Self {
        Self { street, seat, action_type, amount }
    }

    /// Encode to the canonical string form, e.g. `flop:2:raise:75.00`.
    ///
    /// Amounts are fixed to two decimals so the same action always encodes
    /// to the same key regardless of float formatting noise.
    pub fn encode(&self) -> String {
        format!(
            "{}:{}:{}:{:.2}",
            self.street, self.seat, self.action_type, self.amount
        )
    }

    /// Decode from the canonical string form.
    pub fn decode(key: &str) -> Result<Self, ActionKeyError> {
        let parts: Vec<&str> = key.split(':').collect();
        if parts.len() != 4 {
            return Err(ActionKeyError::Malformed(key.to_string()));
        }
        let street: Street = parts[0].parse()?;
        let seat: u8 = parts[1]
            .parse()
            .map_err(|_| ActionKeyError::Malformed(key.to_string()))?;
        let action_type: ActionType = parts[2].parse()?;
        let amount: f64 = parts[3]
            .parse()
            .map_err(|_| ActionKeyError::InvalidAmount(key.to_string()))?;
        if !amount.is_finite() || amount < 0.0 {
            return Err(ActionKeyError::InvalidAmount(key.to_string()));
        }
        Ok(Self { street, seat, action_type, amount })
    }

    /// The concrete action this key describes.
    pub fn to_action(&self) -> GameAction {
        GameAction::new(self.action_type, self.amount)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_decode_round_trip() {
        let key = ActionKey::new(Street::Flop, 2, ActionType::Raise, 75.0);
        let encoded = key.encode();
        assert_eq!(encoded, "flop:2:raise:75.00");

        let decoded = ActionKey::decode(&encoded).expect("decode");
        assert_eq!(decoded, key);
    }

    #[test]
    fn decode_rejects_malformed_keys() {
        assert!(ActionKey::decode("flop:2:raise").is_err());
        assert!(ActionKey::decode("swamp:2:raise:10.00").is_err());
        assert!(ActionKey::decode("flop:2:levitate:10.00").is_err());
        assert!(ActionKey::decode("flop:2:raise:NaN").is_err());
        assert!(ActionKey::decode("flop:2:raise:-5.00").is_err());
    }

    #[test]
    fn aggressive_actions_collapse_to_coarse_raise() {
        assert_eq!(ActionType::Bet.coarse(), CoarseAction::Raise);
        assert_eq!(ActionType::Raise.coarse(), CoarseAction::Raise);
        assert_eq!(ActionType::AllIn.coarse(), CoarseAction::Raise);
        assert_eq!(ActionType::Call.coarse(), CoarseAction::Call);
    }

    #[test]
    fn amount_encoding_is_stable() {
        let a = ActionKey::new(Street::Turn, 0, ActionType::Bet, 33.333_333);
        let b = ActionKey::new(Street::Turn, 0, ActionType::Bet, 33.330_001);
        // Both round to the same canonical amount
        assert_eq!(a.encode(), b.encode());
    }
}
