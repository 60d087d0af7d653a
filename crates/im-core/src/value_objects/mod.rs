//! Value objects

mod snowflake;

pub use snowflake::{GeneratorError, Snowflake, SnowflakeGenerator, SnowflakeParseError};
