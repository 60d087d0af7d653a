//! Snowflake message ID - 64-bit, roughly time-ordered unique identifier
//!
//! Layout:
//! - Bits 63-22: Milliseconds since [`Snowflake::EPOCH`]
//! - Bits 21-12: Node ID (0-1023)
//! - Bits 11-0:  Per-millisecond sequence (0-4095)

use parking_lot::Mutex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

const NODE_BITS: u32 = 10;
const SEQUENCE_BITS: u32 = 12;
const MAX_NODE_ID: u16 = (1 << NODE_BITS) - 1;
const SEQUENCE_MASK: i64 = (1 << SEQUENCE_BITS) - 1;

/// Message identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Snowflake(i64);

impl Snowflake {
    /// Custom epoch: 2025-01-01 00:00:00 UTC (milliseconds)
    pub const EPOCH: i64 = 1_735_689_600_000;

    #[inline]
    pub const fn new(id: i64) -> Self {
        Self(id)
    }

    #[inline]
    pub const fn into_inner(self) -> i64 {
        self.0
    }

    /// Zero means "not assigned yet"
    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Creation time in milliseconds since the Unix epoch
    #[inline]
    pub fn timestamp_millis(&self) -> i64 {
        (self.0 >> (NODE_BITS + SEQUENCE_BITS)) + Self::EPOCH
    }

    #[inline]
    pub fn node_id(&self) -> u16 {
        ((self.0 >> SEQUENCE_BITS) & i64::from(MAX_NODE_ID)) as u16
    }

    #[inline]
    pub fn sequence(&self) -> u16 {
        (self.0 & SEQUENCE_MASK) as u16
    }

    pub fn parse(s: &str) -> Result<Self, SnowflakeParseError> {
        s.parse::<i64>()
            .map(Snowflake)
            .map_err(|_| SnowflakeParseError::InvalidFormat)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SnowflakeParseError {
    #[error("invalid snowflake format")]
    InvalidFormat,
}

impl fmt::Display for Snowflake {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for Snowflake {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

impl From<Snowflake> for i64 {
    fn from(id: Snowflake) -> Self {
        id.0
    }
}

impl std::str::FromStr for Snowflake {
    type Err = SnowflakeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Snowflake::parse(s)
    }
}

// JSON clients lose precision above 2^53, so ids travel as strings.
impl Serialize for Snowflake {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.0.to_string())
    }
}

impl<'de> Deserialize<'de> for Snowflake {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        use serde::de::{self, Visitor};

        struct SnowflakeVisitor;

        impl Visitor<'_> for SnowflakeVisitor {
            type Value = Snowflake;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("a string or integer message id")
            }

            fn visit_i64<E: de::Error>(self, value: i64) -> Result<Snowflake, E> {
                Ok(Snowflake(value))
            }

            fn visit_u64<E: de::Error>(self, value: u64) -> Result<Snowflake, E> {
                i64::try_from(value)
                    .map(Snowflake)
                    .map_err(|_| de::Error::custom("message id out of range"))
            }

            fn visit_str<E: de::Error>(self, value: &str) -> Result<Snowflake, E> {
                if value.is_empty() {
                    return Ok(Snowflake::default());
                }
                value
                    .parse::<i64>()
                    .map(Snowflake)
                    .map_err(|_| de::Error::custom("invalid message id string"))
            }
        }

        deserializer.deserialize_any(SnowflakeVisitor)
    }
}

/// Error constructing a generator
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum GeneratorError {
    #[error("node id {0} exceeds {MAX_NODE_ID}")]
    NodeIdOutOfRange(u16),
}

#[derive(Debug)]
struct GeneratorState {
    last_timestamp: i64,
    sequence: i64,
}

impl GeneratorState {
    /// Pick the timestamp for the next id given the wall clock `now`.
    ///
    /// An exhausted sequence borrows the next millisecond instead of waiting
    /// for the clock, so a clock that stepped backwards never blocks callers.
    fn advance(&mut self, now: i64) -> i64 {
        if now > self.last_timestamp {
            self.sequence = 0;
            self.last_timestamp = now;
        } else {
            self.sequence = (self.sequence + 1) & SEQUENCE_MASK;
            if self.sequence == 0 {
                self.last_timestamp += 1;
            }
        }
        self.last_timestamp
    }
}

/// Thread-safe snowflake generator for one node.
///
/// Up to 4096 ids per millisecond. A clock that steps backwards is treated as
/// still being at the last issued millisecond so ids never go backwards.
#[derive(Debug)]
pub struct SnowflakeGenerator {
    node_id: u16,
    state: Mutex<GeneratorState>,
}

impl SnowflakeGenerator {
    pub fn new(node_id: u16) -> Result<Self, GeneratorError> {
        if node_id > MAX_NODE_ID {
            return Err(GeneratorError::NodeIdOutOfRange(node_id));
        }
        Ok(Self {
            node_id,
            state: Mutex::new(GeneratorState {
                last_timestamp: 0,
                sequence: 0,
            }),
        })
    }

    pub fn generate(&self) -> Snowflake {
        let mut state = self.state.lock();
        let timestamp = state.advance(current_millis());

        Snowflake::new(
            ((timestamp - Snowflake::EPOCH) << (NODE_BITS + SEQUENCE_BITS))
                | (i64::from(self.node_id) << SEQUENCE_BITS)
                | state.sequence,
        )
    }

    pub fn node_id(&self) -> u16 {
        self.node_id
    }
}

#[inline]
fn current_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}
