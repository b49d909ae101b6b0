// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Volume capacity value object.
//!
//! Wraps a Kubernetes quantity string (`"100Gi"`, `"1Ti"`, `"500G"`) and keeps
//! the original spelling for round-tripping into resource manifests, while
//! comparisons are done on the byte value so that `1Ti` and `1024Gi` are the
//! same size.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use thiserror::Error;

/// A storage size as written in configuration or read back from the cluster.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Capacity(String);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid size: {0}")]
pub struct InvalidCapacity(pub String);

impl Capacity {
    /// Parse and validate a quantity coming from configuration.
    pub fn parse(raw: impl Into<String>) -> Result<Self, InvalidCapacity> {
        let raw = raw.into();
        let trimmed = raw.trim();
        if parse_bytes(trimmed).is_none() {
            return Err(InvalidCapacity(raw));
        }
        Ok(Self(trimmed.to_string()))
    }

    /// Wrap a quantity read back from the cluster without validating it.
    pub fn from_cluster(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Size in bytes, if the quantity can be parsed.
    pub fn bytes(&self) -> Option<u128> {
        parse_bytes(&self.0)
    }

    /// Semantic equality; falls back to string comparison for unparseable quantities.
    pub fn same_size(&self, other: &Capacity) -> bool {
        match (self.bytes(), other.bytes()) {
            (Some(a), Some(b)) => a == b,
            _ => self.0 == other.0,
        }
    }

    /// Ordering by byte value. `None` when either side cannot be parsed.
    pub fn compare(&self, other: &Capacity) -> Option<Ordering> {
        Some(self.bytes()?.cmp(&other.bytes()?))
    }
}

impl std::fmt::Display for Capacity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

fn suffix_multiplier(suffix: &str) -> Option<u128> {
    let multiplier = match suffix {
        "" => 1,
        "k" => 1_000,
        "M" => 1_000u128.pow(2),
        "G" => 1_000u128.pow(3),
        "T" => 1_000u128.pow(4),
        "P" => 1_000u128.pow(5),
        "E" => 1_000u128.pow(6),
        "Ki" => 1 << 10,
        "Mi" => 1 << 20,
        "Gi" => 1 << 30,
        "Ti" => 1 << 40,
        "Pi" => 1 << 50,
        "Ei" => 1 << 60,
        _ => return None,
    };
    Some(multiplier)
}

// Decimal quantities only; exponent notation and milli units are not valid sizes.
fn parse_bytes(raw: &str) -> Option<u128> {
    let split = raw
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(raw.len());
    let (number, suffix) = raw.split_at(split);
    let multiplier = suffix_multiplier(suffix)?;

    let (whole, fraction) = number.split_once('.').unwrap_or((number, ""));
    if whole.is_empty() && fraction.is_empty() {
        return None;
    }
    if fraction.contains('.') {
        return None;
    }

    let whole: u128 = if whole.is_empty() { 0 } else { whole.parse().ok()? };
    let mut bytes = whole.checked_mul(multiplier)?;

    if !fraction.is_empty() {
        let digits: u128 = fraction.parse().ok()?;
        let scale = 10u128.checked_pow(u32::try_from(fraction.len()).ok()?)?;
        bytes = bytes.checked_add(digits.checked_mul(multiplier)? / scale)?;
    }

    Some(bytes)
}
