use anyhow::Result;
use serde::Deserialize;
use thiserror::Error;

use crate::{
    cache::CACHE_NUM_LINES,
    memory::{AddressSpace, MEMORY_SIZE},
    trace::{AccessTrace, ACCESS_SEQUENCE},
};

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigurationError {
    #[error("cache size must be at least 1 line")]
    ZeroCacheSize,
    #[error("memory size must be at least 1 address")]
    ZeroMemorySize,
}

/// on-disk form; any field may be left out.
#[derive(Deserialize)]
#[serde(default, deny_unknown_fields)]
struct SimConfigRaw {
    cache_size: usize,
    memory_size: usize,
    trace: Vec<usize>,
}

impl Default for SimConfigRaw {
    fn default() -> Self {
        Self {
            cache_size: CACHE_NUM_LINES,
            memory_size: MEMORY_SIZE,
            trace: ACCESS_SEQUENCE.to_vec(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimConfig {
    pub cache_size: usize,
    pub memory_size: usize,
    pub trace: AccessTrace,
}

impl Default for SimConfig {
    fn default() -> Self {
        SimConfigRaw::default().into()
    }
}

impl From<SimConfigRaw> for SimConfig {
    fn from(raw: SimConfigRaw) -> Self {
        Self {
            cache_size: raw.cache_size,
            memory_size: raw.memory_size,
            trace: raw.trace.into_iter().collect(),
        }
    }
}

impl SimConfig {
    pub fn deser(file: impl std::io::Read) -> Result<Self> {
        let raw: SimConfigRaw = serde_json::from_reader(file)?;
        Ok(raw.into())
    }

    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.cache_size < 1 {
            return Err(ConfigurationError::ZeroCacheSize);
        }
        if self.memory_size < 1 {
            return Err(ConfigurationError::ZeroMemorySize);
        }
        let space = self.address_space();
        for addr in self.trace.iter().filter(|a| !space.contains(*a)) {
            log::warn!(
                "address {addr} lies outside the {}-word memory and will not be drawn",
                space.size()
            );
        }
        Ok(())
    }

    pub fn address_space(&self) -> AddressSpace {
        AddressSpace::new(self.memory_size)
    }
}
