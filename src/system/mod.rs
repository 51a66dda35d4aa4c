//! # System Integration Utilities
//!
//! Hardware queries used to pick code paths at startup. The only query the
//! compression kernels need today is the CPU capability snapshot.

pub mod cpu_features;

pub use cpu_features::{
    CapabilitySnapshot, CapabilityWord, CpuFeature, FeatureEntry, FEATURE_TABLE, capture, has,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_module_structure() {
        let snapshot = capture();
        let _ = has(&snapshot, CpuFeature::Popcnt);
        assert_eq!(FEATURE_TABLE.len(), CpuFeature::all().count());
    }
}
