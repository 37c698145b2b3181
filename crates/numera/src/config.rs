//! Dispenser configuration: kinds, per-kind knobs, durability strategies,
//! validation, and the immutability rules applied on reconfiguration.
//!
//! A [`Config`] is the *normalized* form stored in the registry and the
//! snapshot: per-kind defaults have been applied and it round-trips through
//! JSON unchanged. A [`ConfigPatch`] is the raw form parsed off the wire,
//! where every field is optional and a zero-valued integer means "absent".

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Upper length bound for numeric-random dispensers.
///
/// The de-duplication set grows with every issued identifier; at length 7
/// the 80% refusal threshold caps it at ~7.2M entries, which is the largest
/// footprint we are willing to hold in memory for a single dispenser.
pub const NUMERIC_RANDOM_MAX_LENGTH: u32 = 7;

/// The generation algorithm family, numbered 1..=5 on the wire and in the
/// snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Kind {
    /// Uniform draws over the fixed-width decimal space, de-duplicated.
    NumericRandom = 1,
    /// A counter advancing by `step`, optionally zero-padded.
    NumericMonotonic = 2,
    /// Random hex or base62 strings.
    AlphanumericRandom = 3,
    /// Timestamp-sharded 64-bit snowflake identifiers.
    Snowflake = 4,
    /// RFC 4122 v4 UUIDs.
    Uuid = 5,
}

impl TryFrom<u8> for Kind {
    type Error = String;

    fn try_from(value: u8) -> core::result::Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::NumericRandom),
            2 => Ok(Self::NumericMonotonic),
            3 => Ok(Self::AlphanumericRandom),
            4 => Ok(Self::Snowflake),
            5 => Ok(Self::Uuid),
            other => Err(format!("invalid dispenser type {other}")),
        }
    }
}

impl From<Kind> for u8 {
    fn from(kind: Kind) -> Self {
        kind as u8
    }
}

/// How a numeric-monotonic dispenser renders and bounds its counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MonotonicMode {
    /// Zero-pad to `length` digits and fail `exhausted` past `10^length - 1`.
    Fixed,
    /// Plain unbounded decimal.
    Sequence,
}

impl core::fmt::Display for MonotonicMode {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(match self {
            Self::Fixed => "fixed",
            Self::Sequence => "sequence",
        })
    }
}

/// Character set for alphanumeric-random dispensers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Charset {
    Hex,
    Base62,
}

impl core::fmt::Display for Charset {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(match self {
            Self::Hex => "hex",
            Self::Base62 => "base62",
        })
    }
}

/// Rendering of UUID dispenser output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UuidFormat {
    /// `8-4-4-4-12` hex with dashes.
    Standard,
    /// 32 hex characters, no dashes.
    Compact,
}

impl core::fmt::Display for UuidFormat {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(match self {
            Self::Standard => "standard",
            Self::Compact => "compact",
        })
    }
}

/// The durability strategy: how (and whether) a dispenser's progress is
/// written to the snapshot.
///
/// Only this field of a configuration may be changed after creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Durability {
    /// No persistence hook at all; a restart loses all progress.
    #[serde(rename = "memory")]
    Memory,
    /// Segment pre-allocation only. Bounded waste of one segment per restart.
    #[serde(rename = "pre-base")]
    PreBase,
    /// Segments plus a 2 s checkpoint of the consumed position.
    #[serde(rename = "pre-checkpoint")]
    PreCheckpoint,
    /// Immediate save per identifier plus a graceful-shutdown save.
    #[default]
    #[serde(rename = "elegant_close")]
    ElegantClose,
    /// Segments, checkpointing, and a graceful-shutdown save of `current`.
    #[serde(rename = "pre_close")]
    PreClose,
}

impl Durability {
    /// Parses the wire spelling (`memory`, `pre-base`, `pre-checkpoint`,
    /// `elegant_close`, `pre_close`).
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "memory" => Some(Self::Memory),
            "pre-base" => Some(Self::PreBase),
            "pre-checkpoint" => Some(Self::PreCheckpoint),
            "elegant_close" => Some(Self::ElegantClose),
            "pre_close" => Some(Self::PreClose),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Memory => "memory",
            Self::PreBase => "pre-base",
            Self::PreCheckpoint => "pre-checkpoint",
            Self::ElegantClose => "elegant_close",
            Self::PreClose => "pre_close",
        }
    }

    /// Whether this strategy drives the monotonic kind through the segment
    /// allocator.
    pub fn uses_segments(self) -> bool {
        matches!(self, Self::PreBase | Self::PreCheckpoint | Self::PreClose)
    }

    /// Whether this strategy runs the periodic checkpoint timer.
    pub fn uses_checkpoint(self) -> bool {
        matches!(self, Self::PreCheckpoint | Self::PreClose)
    }
}

impl core::fmt::Display for Durability {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

fn is_zero_u32(value: &u32) -> bool {
    *value == 0
}

fn is_zero_i64(value: &i64) -> bool {
    *value == 0
}

fn is_false(value: &bool) -> bool {
    !*value
}

/// A dispenser configuration, normalized and validated.
///
/// Serialized field names match the wire protocol, so the snapshot on disk
/// reads like the `hset` command that created it. Fields irrelevant to the
/// configured kind stay at their zero value and are omitted from JSON.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    #[serde(rename = "type")]
    pub kind: Kind,
    #[serde(default, skip_serializing_if = "is_zero_u32")]
    pub length: u32,
    #[serde(default, skip_serializing_if = "is_zero_i64")]
    pub starting: i64,
    #[serde(default, skip_serializing_if = "is_zero_i64")]
    pub step: i64,
    #[serde(default, skip_serializing_if = "is_zero_i64")]
    pub machine_id: i64,
    #[serde(default, skip_serializing_if = "is_zero_i64")]
    pub datacenter_id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub incr_mode: Option<MonotonicMode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub charset: Option<Charset>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uuid_format: Option<UuidFormat>,
    #[serde(default)]
    pub auto_disk: Durability,
    #[serde(default, skip_serializing_if = "is_false")]
    pub unique_check: bool,
    #[serde(default, skip_serializing_if = "is_zero_u32")]
    pub unique_cache_size: u32,
}

impl Config {
    /// The monotonic rendering mode, defaulting to `sequence` when unset.
    pub fn mode(&self) -> MonotonicMode {
        self.incr_mode.unwrap_or(MonotonicMode::Sequence)
    }

    /// The inclusive upper bound for a fixed-width monotonic counter, or
    /// `None` in sequence mode.
    pub fn cap(&self) -> Option<i64> {
        match self.mode() {
            MonotonicMode::Fixed => Some(pow10(self.length) - 1),
            MonotonicMode::Sequence => None,
        }
    }

    /// Checks the per-kind field constraints.
    pub fn validate(&self) -> Result<()> {
        match self.kind {
            Kind::NumericRandom => {
                if self.length < 1 || self.length > NUMERIC_RANDOM_MAX_LENGTH {
                    return Err(Error::bad_config(format!(
                        "length must be 1..={NUMERIC_RANDOM_MAX_LENGTH} for numeric-random"
                    )));
                }
            }
            Kind::NumericMonotonic => {
                if self.incr_mode == Some(MonotonicMode::Fixed) {
                    if self.length < 1 || self.length > 18 {
                        return Err(Error::bad_config(
                            "length must be 1..=18 for fixed-width monotonic",
                        ));
                    }
                    if self.starting >= pow10(self.length) {
                        return Err(Error::bad_config("starting value exceeds fixed width"));
                    }
                }
                if self.starting < 0 {
                    return Err(Error::bad_config("starting value must not be negative"));
                }
                if self.step < 1 {
                    return Err(Error::bad_config("step must be positive"));
                }
            }
            Kind::AlphanumericRandom => {
                if self.length < 1 || self.length > 64 {
                    return Err(Error::bad_config(
                        "length must be 1..=64 for alphanumeric-random",
                    ));
                }
            }
            Kind::Snowflake => {
                if !(0..=31).contains(&self.machine_id) {
                    return Err(Error::bad_config("machine_id must be 0..=31"));
                }
                if !(0..=31).contains(&self.datacenter_id) {
                    return Err(Error::bad_config("datacenter_id must be 0..=31"));
                }
            }
            Kind::Uuid => {}
        }
        Ok(())
    }

    /// Applies the per-kind defaults.
    fn normalize(&mut self) {
        match self.kind {
            Kind::NumericRandom => {
                // De-duplication is the point of this kind; it cannot be
                // switched off.
                self.unique_check = true;
            }
            Kind::NumericMonotonic => {
                if self.step == 0 {
                    self.step = 1;
                }
                if self.incr_mode.is_none() {
                    self.incr_mode = Some(if self.length > 0 {
                        MonotonicMode::Fixed
                    } else {
                        MonotonicMode::Sequence
                    });
                }
            }
            Kind::AlphanumericRandom => {
                if self.charset.is_none() {
                    self.charset = Some(Charset::Hex);
                }
            }
            Kind::Snowflake => {
                if self.machine_id == 0 {
                    self.machine_id = 1;
                }
            }
            Kind::Uuid => {
                if self.uuid_format.is_none() {
                    self.uuid_format = Some(UuidFormat::Standard);
                }
            }
        }
    }
}

/// Configuration fields as parsed off the wire, before defaults.
///
/// Absent fields are `None`; by protocol convention a zero-valued integer
/// (or `false`) is treated the same as absent, both when creating and when
/// comparing against an existing configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigPatch {
    pub kind: Option<Kind>,
    pub length: Option<u32>,
    pub starting: Option<i64>,
    pub step: Option<i64>,
    pub machine_id: Option<i64>,
    pub datacenter_id: Option<i64>,
    pub incr_mode: Option<MonotonicMode>,
    pub charset: Option<Charset>,
    pub uuid_format: Option<UuidFormat>,
    pub auto_disk: Option<Durability>,
    pub unique_check: Option<bool>,
    pub unique_cache_size: Option<u32>,
}

impl ConfigPatch {
    /// Builds a normalized, validated [`Config`] for a new dispenser.
    pub fn into_config(self) -> Result<Config> {
        let kind = self
            .kind
            .ok_or_else(|| Error::bad_config("type field is required"))?;
        let mut config = Config {
            kind,
            length: self.length.unwrap_or(0),
            starting: self.starting.unwrap_or(0),
            step: self.step.unwrap_or(0),
            machine_id: self.machine_id.unwrap_or(0),
            datacenter_id: self.datacenter_id.unwrap_or(0),
            incr_mode: self.incr_mode,
            charset: self.charset,
            uuid_format: self.uuid_format,
            auto_disk: self.auto_disk.unwrap_or_default(),
            unique_check: self.unique_check.unwrap_or(false),
            unique_cache_size: self.unique_cache_size.unwrap_or(0),
        };
        config.normalize();
        config.validate()?;
        Ok(config)
    }

    /// Returns the immutable fields this patch would change on `existing`.
    ///
    /// `auto_disk` is deliberately not checked: it is the one mutable field.
    /// Zero-valued integers count as absent, so re-sending a creation
    /// command verbatim is always accepted.
    pub fn rejected_fields(&self, existing: &Config) -> Vec<&'static str> {
        let mut rejected = Vec::new();
        if let Some(kind) = self.kind {
            if kind != existing.kind {
                rejected.push("type");
            }
        }
        if let Some(length) = self.length {
            if length != 0 && length != existing.length {
                rejected.push("length");
            }
        }
        if let Some(starting) = self.starting {
            if starting != 0 && starting != existing.starting {
                rejected.push("starting");
            }
        }
        if let Some(step) = self.step {
            if step != 0 && step != existing.step {
                rejected.push("step");
            }
        }
        if let Some(machine_id) = self.machine_id {
            if machine_id != 0 && machine_id != existing.machine_id {
                rejected.push("machine_id");
            }
        }
        if let Some(datacenter_id) = self.datacenter_id {
            if datacenter_id != 0 && datacenter_id != existing.datacenter_id {
                rejected.push("datacenter_id");
            }
        }
        if let Some(incr_mode) = self.incr_mode {
            if existing.incr_mode != Some(incr_mode) {
                rejected.push("incr_mode");
            }
        }
        if let Some(charset) = self.charset {
            if existing.charset != Some(charset) {
                rejected.push("charset");
            }
        }
        if let Some(uuid_format) = self.uuid_format {
            if existing.uuid_format != Some(uuid_format) {
                rejected.push("uuid_format");
            }
        }
        if let Some(unique_check) = self.unique_check {
            if unique_check && unique_check != existing.unique_check {
                rejected.push("unique_check");
            }
        }
        if let Some(size) = self.unique_cache_size {
            if size != 0 && size != existing.unique_cache_size {
                rejected.push("unique_cache_size");
            }
        }
        rejected
    }
}

/// `10^exp` as `i64`. Callers keep `exp <= 18`, which validation enforces.
pub(crate) fn pow10(exp: u32) -> i64 {
    10i64.pow(exp)
}
