//! Build configuration for DataStore construction
//!
//! Word length, sampling step, repetitiveness threshold and packing, plus the
//! knobs that only affect how the file is produced.

use crate::constants::{DEFAULT_STEP, DEFAULT_THRESHOLD, DEFAULT_WORD_LENGTH};
use crate::error::{Result, SsahaError};
use crate::large_buffer::{PAGE_OVERLAP, PAGE_SIZE};
use crate::packing::Packing;

/// Configuration parameters for building a DataStore
#[derive(Debug, Clone)]
pub struct BuildConfiguration {
    /// Residues per word
    pub word_length: usize,

    /// Stride between indexed windows (1 = every window)
    pub step: usize,

    /// Words occurring `threshold` times or more are left out of the index
    pub threshold: u32,

    /// Residue packing
    pub packing: Packing,

    /// Truncate names longer than 65535 bytes instead of failing
    pub truncate_long_names: bool,

    /// Page size of the output mapping
    pub page_size: u64,
}

impl Default for BuildConfiguration {
    fn default() -> Self {
        Self {
            word_length: DEFAULT_WORD_LENGTH,
            step: DEFAULT_STEP,
            threshold: DEFAULT_THRESHOLD,
            packing: Packing::dna(),
            truncate_long_names: true,
            page_size: PAGE_SIZE,
        }
    }
}

impl BuildConfiguration {
    /// Create a new build configuration with the specified word length
    pub fn new(word_length: usize) -> Result<Self> {
        let config = Self {
            word_length,
            ..Self::default()
        };
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration parameters
    pub fn validate(&self) -> Result<()> {
        self.packing.validate_word_length(self.word_length)?;
        if self.step == 0 || u32::try_from(self.step).is_err() {
            return Err(SsahaError::InvalidStep(self.step));
        }
        if self.threshold == 0 {
            return Err(SsahaError::InvalidThreshold(self.threshold));
        }
        if self.page_size < PAGE_OVERLAP {
            return Err(SsahaError::InvalidPageSize {
                page_size: self.page_size,
                min: PAGE_OVERLAP,
            });
        }
        Ok(())
    }

    /// Log configuration parameters via tracing
    pub fn print(&self) {
        tracing::info!("Build Configuration:");
        tracing::info!("  word_length = {}", self.word_length);
        tracing::info!("  step = {}", self.step);
        tracing::info!("  threshold = {}", self.threshold);
        tracing::info!("  packing = {}", self.packing);
        tracing::debug!("  truncate_long_names = {}", self.truncate_long_names);
        tracing::debug!("  page_size = {}", self.page_size);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = BuildConfiguration::default();
        assert_eq!(config.word_length, 12);
        assert_eq!(config.step, 1);
        assert_eq!(config.threshold, 1000);
        assert_eq!(config.packing, Packing::dna());
        assert!(config.truncate_long_names);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_new_config() {
        let config = BuildConfiguration::new(8).unwrap();
        assert_eq!(config.word_length, 8);
        assert!(BuildConfiguration::new(0).is_err());
        assert!(BuildConfiguration::new(16).is_err());
    }

    #[test]
    fn test_validate_word_length_depends_on_packing() {
        let config = BuildConfiguration {
            word_length: 10,
            packing: Packing::protein(),
            ..BuildConfiguration::default()
        };
        assert!(matches!(
            config.validate(),
            Err(SsahaError::InvalidWordLength { word_length: 10, max: 6 })
        ));
    }

    #[test]
    fn test_validate_step_and_threshold() {
        let config = BuildConfiguration { step: 0, ..BuildConfiguration::default() };
        assert!(matches!(config.validate(), Err(SsahaError::InvalidStep(0))));

        let config = BuildConfiguration { threshold: 0, ..BuildConfiguration::default() };
        assert!(matches!(config.validate(), Err(SsahaError::InvalidThreshold(0))));
    }

    #[test]
    fn test_validate_page_size() {
        let config = BuildConfiguration { page_size: 4, ..BuildConfiguration::default() };
        assert!(config.validate().is_err());
        let config = BuildConfiguration { page_size: 8, ..BuildConfiguration::default() };
        assert!(config.validate().is_ok());
    }
}
