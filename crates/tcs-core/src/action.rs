//! # Actions and Action Identifiers
//!
//! An [`Action`] is the unit of compliance evaluation: the tuple
//! `(provider_id, provider_version, instrument, instrument_id_or_amount,
//! from, to, aux_code)`. Its [`ActionId`] is a SHA-256 digest of the
//! canonical form of that tuple and keys the off-chain approval cache.
//!
//! ## Security Invariant
//!
//! The preimage is a JCS object with one named member per tuple field plus
//! a domain tag. Two actions that differ in any field produce different
//! canonical bytes, so an approval written for one action can never be
//! consumed by another. The amount is encoded as a decimal string so the
//! full `u128` range canonicalizes without floats.
//!
//! Any party holding the tuple can recompute the id; an oracle uses
//! [`compute_action_hash`] to address its approval before the transfer is
//! attempted.

use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::canonical::CanonicalBytes;
use crate::digest::sha256_digest;
use crate::error::ComplianceError;
use crate::identity::{hex_to_bytes, Address, ProviderId, ProviderVersion};

/// Domain tag mixed into every action preimage.
pub const ACTION_DOMAIN: &str = "tcs.action.v1";

/// Distinguishes kinds of action sharing the action hash space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AuxCode(pub u32);

impl AuxCode {
    /// Advisory check made before committing to a transfer.
    pub const PRE_CHECK: AuxCode = AuxCode(0);
    /// The balance-mutating transfer itself.
    pub const TRANSFER: AuxCode = AuxCode(1);
}

impl std::fmt::Display for AuxCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A pending operation on an instrument, as presented for a compliance check.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Action {
    /// Provider whose rule is consulted.
    pub provider_id: ProviderId,
    /// Revision of that provider's rule the action is evaluated against.
    pub provider_version: ProviderVersion,
    /// The instrument (token) being operated on.
    pub instrument: Address,
    /// Token id for non-fungible instruments, amount for fungible ones.
    #[serde(with = "decimal_u128")]
    pub instrument_id_or_amount: u128,
    /// Sending account.
    pub from: Address,
    /// Receiving account, the subject of most rules.
    pub to: Address,
    /// Action kind.
    pub aux_code: AuxCode,
}

impl Action {
    /// Assemble an action tuple.
    pub fn new(
        provider_id: ProviderId,
        provider_version: ProviderVersion,
        instrument: Address,
        instrument_id_or_amount: u128,
        from: Address,
        to: Address,
        aux_code: AuxCode,
    ) -> Self {
        Self {
            provider_id,
            provider_version,
            instrument,
            instrument_id_or_amount,
            from,
            to,
            aux_code,
        }
    }

    /// The same action addressed to another provider revision.
    ///
    /// Used when a delegation chain consults a parent: every field other
    /// than the provider pin is carried over unchanged.
    pub fn for_provider(&self, provider_id: ProviderId, provider_version: ProviderVersion) -> Self {
        Self {
            provider_id,
            provider_version,
            ..self.clone()
        }
    }

    /// Compute this action's identifier.
    pub fn id(&self) -> Result<ActionId, ComplianceError> {
        compute_action_hash(self)
    }
}

#[derive(Serialize)]
struct ActionPreimage<'a> {
    domain: &'static str,
    provider_id: u64,
    provider_version: u32,
    instrument: &'a Address,
    instrument_id_or_amount: String,
    from: &'a Address,
    to: &'a Address,
    aux_code: u32,
}

/// Compute the canonical identifier of an action.
///
/// Pure: no state is read, and identical tuples always yield identical ids.
pub fn compute_action_hash(action: &Action) -> Result<ActionId, ComplianceError> {
    let preimage = ActionPreimage {
        domain: ACTION_DOMAIN,
        provider_id: action.provider_id.get(),
        provider_version: action.provider_version.0,
        instrument: &action.instrument,
        instrument_id_or_amount: action.instrument_id_or_amount.to_string(),
        from: &action.from,
        to: &action.to,
        aux_code: action.aux_code.0,
    };
    let canonical = CanonicalBytes::new(&preimage)?;
    Ok(ActionId(sha256_digest(&canonical).0))
}

/// Content-addressed identifier of an [`Action`].
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ActionId([u8; 32]);

impl ActionId {
    /// Wrap raw digest bytes.
    pub fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Access the raw digest bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Render as lowercase hex without the `0x` prefix.
    pub fn to_hex(&self) -> String {
        self.0.iter().map(|b| format!("{b:02x}")).collect()
    }

    /// Parse from 64 hex characters, with or without a `0x` prefix.
    pub fn from_hex(s: &str) -> Result<Self, ComplianceError> {
        let s = s.trim();
        let s = s.strip_prefix("0x").unwrap_or(s);
        if s.len() != 64 {
            return Err(ComplianceError::InvalidInput(format!(
                "action id must be 64 hex chars, got {}",
                s.len()
            )));
        }
        let bytes = hex_to_bytes(s).map_err(ComplianceError::InvalidInput)?;
        let mut arr = [0u8; 32];
        arr.copy_from_slice(&bytes);
        Ok(Self(arr))
    }
}

impl std::fmt::Display for ActionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "0x{}", self.to_hex())
    }
}

impl std::fmt::Debug for ActionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ActionId(0x{}...)", &self.to_hex()[..12])
    }
}

impl FromStr for ActionId {
    type Err = ComplianceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl Serialize for ActionId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for ActionId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

/// Serialize `u128` as a decimal string; accept a string or an integer.
pub mod decimal_u128 {
    use serde::de::{self, Visitor};
    use serde::{Deserializer, Serializer};

    /// Serialize as a decimal string.
    pub fn serialize<S: Serializer>(value: &u128, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_string())
    }

    /// Deserialize from a decimal string or a non-negative integer.
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u128, D::Error> {
        struct DecimalVisitor;

        impl<'de> Visitor<'de> for DecimalVisitor {
            type Value = u128;

            fn expecting(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str("a non-negative integer or decimal string")
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<u128, E> {
                Ok(u128::from(v))
            }

            fn visit_u128<E: de::Error>(self, v: u128) -> Result<u128, E> {
                Ok(v)
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<u128, E> {
                u128::try_from(v).map_err(|_| E::custom(format!("negative amount {v}")))
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<u128, E> {
                v.trim()
                    .parse::<u128>()
                    .map_err(|e| E::custom(format!("invalid amount {v:?}: {e}")))
            }
        }

        deserializer.deserialize_any(DecimalVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Action {
        Action::new(
            ProviderId(1),
            ProviderVersion::INITIAL,
            Address::from_seed("token"),
            100,
            Address::from_seed("alice"),
            Address::from_seed("bob"),
            AuxCode::TRANSFER,
        )
    }

    #[test]
    fn identical_tuples_identical_ids() {
        assert_eq!(sample().id().unwrap(), sample().id().unwrap());
    }

    #[test]
    fn each_field_changes_the_id() {
        let base = sample().id().unwrap();
        let with = |change: fn(&mut Action)| {
            let mut action = sample();
            change(&mut action);
            action
        };
        let variants = [
            with(|a| a.provider_id = ProviderId(2)),
            with(|a| a.provider_version = ProviderVersion(2)),
            with(|a| a.instrument = Address::from_seed("other-token")),
            with(|a| a.instrument_id_or_amount = 101),
            with(|a| a.from = Address::from_seed("carol")),
            with(|a| a.to = Address::from_seed("carol")),
            with(|a| a.aux_code = AuxCode::PRE_CHECK),
        ];
        for variant in variants {
            assert_ne!(variant.id().unwrap(), base, "{variant:?}");
        }
    }

    #[test]
    fn swapping_from_and_to_changes_the_id() {
        let a = sample();
        let swapped = Action { from: a.to, to: a.from, ..a.clone() };
        assert_ne!(a.id().unwrap(), swapped.id().unwrap());
    }

    #[test]
    fn max_amount_hashes() {
        let mut a = sample();
        a.instrument_id_or_amount = u128::MAX;
        assert!(a.id().is_ok());
    }

    #[test]
    fn for_provider_repins_only_the_provider() {
        let a = sample();
        let parent = a.for_provider(ProviderId(9), ProviderVersion(4));
        assert_eq!(parent.provider_id, ProviderId(9));
        assert_eq!(parent.provider_version, ProviderVersion(4));
        assert_eq!(parent.to, a.to);
        assert_eq!(parent.instrument_id_or_amount, a.instrument_id_or_amount);
    }

    #[test]
    fn action_id_hex_parses_back() {
        let id = sample().id().unwrap();
        assert_eq!(ActionId::from_hex(&id.to_string()).unwrap(), id);
        assert_eq!(id.to_string().parse::<ActionId>().unwrap(), id);
        assert!(ActionId::from_hex("0xabcd").is_err());
    }

    #[test]
    fn action_serde_accepts_integer_amounts() {
        let json = serde_json::json!({
            "provider_id": 3,
            "provider_version": 1,
            "instrument": Address::from_seed("token").to_string(),
            "instrument_id_or_amount": 42,
            "from": Address::from_seed("alice").to_string(),
            "to": Address::from_seed("bob").to_string(),
            "aux_code": 1
        });
        let action: Action = serde_json::from_value(json).unwrap();
        assert_eq!(action.instrument_id_or_amount, 42);
        let out = serde_json::to_value(&action).unwrap();
        assert_eq!(out["instrument_id_or_amount"], "42");
    }
}
