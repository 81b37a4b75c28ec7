//! # Principals and Provider Identities
//!
//! Newtype wrappers for the identifiers the engine compares and stores.
//! An [`Address`] is the opaque authorization principal ("the caller");
//! a [`ProviderId`] names a registered compliance rule; a
//! [`ProviderVersion`] names one revision of that rule.
//!
//! ## Security Invariant
//!
//! Provider ids and principals are distinct types, so an owner check can
//! never be handed a provider id by mistake, and an action tuple cannot be
//! assembled with its fields transposed.

use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};

use crate::error::ComplianceError;

/// Length in bytes of an [`Address`].
pub const ADDRESS_LEN: usize = 20;

/// An authorization principal: a token contract, a rule instance, an
/// operator, or an account holder.
///
/// Rendered as `0x` followed by 40 lowercase hex characters.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Address([u8; ADDRESS_LEN]);

impl Address {
    /// The all-zero address.
    pub const ZERO: Address = Address([0u8; ADDRESS_LEN]);

    /// Wrap raw address bytes.
    pub fn new(bytes: [u8; ADDRESS_LEN]) -> Self {
        Self(bytes)
    }

    /// Derive a stable address from a human-readable seed.
    ///
    /// Used for rule instances, tokens and scripted scenarios, where an
    /// address must be reproducible from a name rather than a key.
    pub fn from_seed(seed: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(b"tcs.address:");
        hasher.update(seed.as_bytes());
        let hash = hasher.finalize();
        let mut bytes = [0u8; ADDRESS_LEN];
        bytes.copy_from_slice(&hash[..ADDRESS_LEN]);
        Self(bytes)
    }

    /// Access the raw bytes.
    pub fn as_bytes(&self) -> &[u8; ADDRESS_LEN] {
        &self.0
    }

    /// Render as lowercase hex without the `0x` prefix.
    pub fn to_hex(&self) -> String {
        self.0.iter().map(|b| format!("{b:02x}")).collect()
    }

    /// Parse from 40 hex characters, with or without a `0x` prefix.
    pub fn from_hex(s: &str) -> Result<Self, ComplianceError> {
        let s = s.trim();
        let s = s.strip_prefix("0x").unwrap_or(s);
        let bytes = hex_to_bytes(s).map_err(ComplianceError::InvalidInput)?;
        if bytes.len() != ADDRESS_LEN {
            return Err(ComplianceError::InvalidInput(format!(
                "address must be {ADDRESS_LEN} bytes, got {}",
                bytes.len()
            )));
        }
        let mut arr = [0u8; ADDRESS_LEN];
        arr.copy_from_slice(&bytes);
        Ok(Self(arr))
    }
}

impl std::fmt::Display for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "0x{}", self.to_hex())
    }
}

impl std::fmt::Debug for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Address(0x{})", self.to_hex())
    }
}

impl FromStr for Address {
    type Err = ComplianceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

/// Identifier of a registered compliance provider.
///
/// Assigned sequentially by the registry starting at 1. Id 0 is never
/// issued; "no parent" is expressed as `Option<ProviderId>::None`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProviderId(pub u64);

impl ProviderId {
    /// The first id the registry issues.
    pub const FIRST: ProviderId = ProviderId(1);

    /// Access the inner integer.
    pub fn get(&self) -> u64 {
        self.0
    }

    /// The id following this one, or `None` on overflow.
    pub fn next(&self) -> Option<ProviderId> {
        self.0.checked_add(1).map(ProviderId)
    }
}

impl std::fmt::Display for ProviderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Revision of a provider's rule.
///
/// Starts at [`ProviderVersion::INITIAL`] and is bumped on every upgrade.
/// Actions carry the version they were evaluated against, so approvals
/// written for one revision never match actions built for another.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProviderVersion(pub u32);

impl ProviderVersion {
    /// The version assigned at registration.
    pub const INITIAL: ProviderVersion = ProviderVersion(1);

    /// The version following this one, or `None` on overflow.
    pub fn next(&self) -> Option<ProviderVersion> {
        self.0.checked_add(1).map(ProviderVersion)
    }
}

impl std::fmt::Display for ProviderVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "v{}", self.0)
    }
}

/// Decode a lowercase or uppercase hex string into bytes.
pub(crate) fn hex_to_bytes(s: &str) -> Result<Vec<u8>, String> {
    if s.len() % 2 != 0 {
        return Err(format!("hex string has odd length: {}", s.len()));
    }
    (0..s.len())
        .step_by(2)
        .map(|i| {
            s.get(i..i + 2)
                .ok_or_else(|| format!("invalid hex at position {i}"))
                .and_then(|pair| {
                    u8::from_str_radix(pair, 16)
                        .map_err(|e| format!("invalid hex at position {i}: {e}"))
                })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn address_display_is_prefixed_hex() {
        let addr = Address::new([0xab; ADDRESS_LEN]);
        let s = addr.to_string();
        assert!(s.starts_with("0x"));
        assert_eq!(s.len(), 2 + 40);
        assert_eq!(&s[2..6], "abab");
    }

    #[test]
    fn address_parse_accepts_with_and_without_prefix() {
        let addr = Address::from_seed("alice");
        let with = Address::from_hex(&addr.to_string()).unwrap();
        let without = Address::from_hex(&addr.to_hex()).unwrap();
        assert_eq!(with, addr);
        assert_eq!(without, addr);
    }

    #[test]
    fn address_parse_rejects_wrong_length() {
        assert!(Address::from_hex("0x1234").is_err());
        assert!(Address::from_hex("").is_err());
    }

    #[test]
    fn address_parse_rejects_non_hex() {
        let bad = format!("0x{}", "zz".repeat(ADDRESS_LEN));
        assert!(Address::from_hex(&bad).is_err());
    }

    #[test]
    fn seeded_addresses_are_stable_and_distinct() {
        assert_eq!(Address::from_seed("alice"), Address::from_seed("alice"));
        assert_ne!(Address::from_seed("alice"), Address::from_seed("bob"));
        assert_ne!(Address::from_seed("alice"), Address::ZERO);
    }

    #[test]
    fn address_serde_uses_string_form() {
        let addr = Address::from_seed("operator");
        let json = serde_json::to_string(&addr).unwrap();
        assert_eq!(json, format!("\"{addr}\""));
        let back: Address = serde_json::from_str(&json).unwrap();
        assert_eq!(back, addr);
    }

    #[test]
    fn provider_id_sequence() {
        assert_eq!(ProviderId::FIRST.next(), Some(ProviderId(2)));
        assert_eq!(ProviderId(u64::MAX).next(), None);
    }

    #[test]
    fn provider_version_sequence() {
        assert_eq!(ProviderVersion::INITIAL.next(), Some(ProviderVersion(2)));
        assert_eq!(ProviderVersion(u32::MAX).next(), None);
        assert_eq!(ProviderVersion(3).to_string(), "v3");
    }
}
