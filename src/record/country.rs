//! Country record
//!
//! A concrete record type used by the CLI, tests and benchmarks.

use bincode::Options;
use serde::{Deserialize, Serialize};

use crate::error::Result;

use super::Record;

/// A country with a handful of statistics
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Country {
    /// Store-assigned identifier
    pub id: i32,
    /// Ranking by population
    pub rank: i32,
    pub name: String,
    pub population: i64,
    /// Inhabitants per square kilometre
    pub density: f32,
    /// Area in square kilometres
    pub area: f32,
    /// Unix timestamp (seconds) of the last statistics update
    pub updated_at: i64,
    pub largest_cities: Vec<String>,
}

impl Country {
    /// Create a country with no id (assigned on create)
    pub fn new(name: impl Into<String>, population: i64) -> Self {
        Self {
            name: name.into(),
            population,
            ..Default::default()
        }
    }

    /// Builder-style setter for the largest cities
    pub fn with_cities<I, S>(mut self, cities: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.largest_cities = cities.into_iter().map(Into::into).collect();
        self
    }

    /// Fixed-int little-endian bincode, tolerant of slot padding
    fn codec() -> impl Options {
        bincode::DefaultOptions::new()
            .with_fixint_encoding()
            .with_little_endian()
            .allow_trailing_bytes()
    }
}

impl Record for Country {
    fn encode(&self) -> Result<Vec<u8>> {
        Ok(Self::codec().serialize(self)?)
    }

    fn decode(bytes: &[u8]) -> Result<Self> {
        Ok(Self::codec().deserialize(bytes)?)
    }

    fn id(&self) -> i32 {
        self.id
    }

    fn set_id(&mut self, id: i32) {
        self.id = id;
    }
}
