//! # CPU Feature Detection
//!
//! A [`CapabilitySnapshot`] holds the four raw CPUID feature words the
//! compression kernels care about. Capturing is the only step that touches the
//! hardware; every query afterwards is a pure bit test against one fixed table,
//! so a snapshot can be captured once at startup, handed to whoever selects a
//! code path, and replaced by a synthetic one in tests.
//!
//! On targets without the CPUID instruction the snapshot is all zero and every
//! feature reads as absent. Callers never need a separate "detection
//! unsupported" branch.

use crate::config::PlatformConfig;
use crate::error::{Result, ZiporaError};
use std::fmt;
use std::str::FromStr;

/// One of the four raw capability words kept in a snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CapabilityWord {
    /// Leaf 1, ECX
    F1c,
    /// Leaf 1, EDX
    F1d,
    /// Leaf 7 sub-leaf 0, EBX
    F7b,
    /// Leaf 7 sub-leaf 0, ECX
    F7c,
}

impl CapabilityWord {
    /// All words in storage order
    pub const ALL: [CapabilityWord; 4] = [Self::F1c, Self::F1d, Self::F7b, Self::F7c];
}

/// Processor features decodable from a [`CapabilitySnapshot`].
///
/// Variant order matches [`FEATURE_TABLE`], which is what [`CpuFeature::entry`]
/// relies on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[allow(missing_docs)]
pub enum CpuFeature {
    // cpuid(1).ecx
    Sse3,
    Pclmuldq,
    Dtes64,
    Monitor,
    Dscpl,
    Vmx,
    Smx,
    Eist,
    Tm2,
    Ssse3,
    Cnxtid,
    Fma,
    Cx16,
    Xtpr,
    Pdcm,
    Pcid,
    Dca,
    Sse41,
    Sse42,
    X2apic,
    Movbe,
    Popcnt,
    Tscdeadline,
    Aes,
    Xsave,
    Osxsave,
    Avx,
    F16c,
    Rdrand,
    // cpuid(1).edx
    Fpu,
    Vme,
    De,
    Pse,
    Tsc,
    Msr,
    Pae,
    Mce,
    Cx8,
    Apic,
    Sep,
    Mtrr,
    Pge,
    Mca,
    Cmov,
    Pat,
    Pse36,
    Psn,
    Clfsh,
    Ds,
    Acpi,
    Mmx,
    Fxsr,
    Sse,
    Sse2,
    Ss,
    Htt,
    Tm,
    Pbe,
    // cpuid(7).ebx
    Bmi1,
    Hle,
    Avx2,
    Smep,
    Bmi2,
    Erms,
    Invpcid,
    Rtm,
    Mpx,
    Avx512f,
    Avx512dq,
    Rdseed,
    Adx,
    Smap,
    Avx512ifma,
    Pcommit,
    Clflushopt,
    Clwb,
    Avx512pf,
    Avx512er,
    Avx512cd,
    Sha,
    Avx512bw,
    Avx512vl,
    // cpuid(7).ecx
    Prefetchwt1,
    Avx512vbmi,
}

/// Location of one feature bit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeatureEntry {
    /// The feature this entry describes
    pub feature: CpuFeature,
    /// Canonical lowercase name
    pub name: &'static str,
    /// Word holding the bit
    pub word: CapabilityWord,
    /// Bit index within the word
    pub bit: u8,
}

const fn entry(
    feature: CpuFeature,
    name: &'static str,
    word: CapabilityWord,
    bit: u8,
) -> FeatureEntry {
    FeatureEntry {
        feature,
        name,
        word,
        bit,
    }
}

use self::CapabilityWord::{F1c, F1d, F7b, F7c};
use self::CpuFeature as F;

/// Every decodable feature, indexed by `CpuFeature as usize`
pub static FEATURE_TABLE: [FeatureEntry; 84] = [
    entry(F::Sse3, "sse3", F1c, 0),
    entry(F::Pclmuldq, "pclmuldq", F1c, 1),
    entry(F::Dtes64, "dtes64", F1c, 2),
    entry(F::Monitor, "monitor", F1c, 3),
    entry(F::Dscpl, "dscpl", F1c, 4),
    entry(F::Vmx, "vmx", F1c, 5),
    entry(F::Smx, "smx", F1c, 6),
    entry(F::Eist, "eist", F1c, 7),
    entry(F::Tm2, "tm2", F1c, 8),
    entry(F::Ssse3, "ssse3", F1c, 9),
    entry(F::Cnxtid, "cnxtid", F1c, 10),
    entry(F::Fma, "fma", F1c, 12),
    entry(F::Cx16, "cx16", F1c, 13),
    entry(F::Xtpr, "xtpr", F1c, 14),
    entry(F::Pdcm, "pdcm", F1c, 15),
    entry(F::Pcid, "pcid", F1c, 17),
    entry(F::Dca, "dca", F1c, 18),
    entry(F::Sse41, "sse41", F1c, 19),
    entry(F::Sse42, "sse42", F1c, 20),
    entry(F::X2apic, "x2apic", F1c, 21),
    entry(F::Movbe, "movbe", F1c, 22),
    entry(F::Popcnt, "popcnt", F1c, 23),
    entry(F::Tscdeadline, "tscdeadline", F1c, 24),
    entry(F::Aes, "aes", F1c, 25),
    entry(F::Xsave, "xsave", F1c, 26),
    entry(F::Osxsave, "osxsave", F1c, 27),
    entry(F::Avx, "avx", F1c, 28),
    entry(F::F16c, "f16c", F1c, 29),
    entry(F::Rdrand, "rdrand", F1c, 30),
    entry(F::Fpu, "fpu", F1d, 0),
    entry(F::Vme, "vme", F1d, 1),
    entry(F::De, "de", F1d, 2),
    entry(F::Pse, "pse", F1d, 3),
    entry(F::Tsc, "tsc", F1d, 4),
    entry(F::Msr, "msr", F1d, 5),
    entry(F::Pae, "pae", F1d, 6),
    entry(F::Mce, "mce", F1d, 7),
    entry(F::Cx8, "cx8", F1d, 8),
    entry(F::Apic, "apic", F1d, 9),
    entry(F::Sep, "sep", F1d, 11),
    entry(F::Mtrr, "mtrr", F1d, 12),
    entry(F::Pge, "pge", F1d, 13),
    entry(F::Mca, "mca", F1d, 14),
    entry(F::Cmov, "cmov", F1d, 15),
    entry(F::Pat, "pat", F1d, 16),
    entry(F::Pse36, "pse36", F1d, 17),
    entry(F::Psn, "psn", F1d, 18),
    entry(F::Clfsh, "clfsh", F1d, 19),
    entry(F::Ds, "ds", F1d, 21),
    entry(F::Acpi, "acpi", F1d, 22),
    entry(F::Mmx, "mmx", F1d, 23),
    entry(F::Fxsr, "fxsr", F1d, 24),
    entry(F::Sse, "sse", F1d, 25),
    entry(F::Sse2, "sse2", F1d, 26),
    entry(F::Ss, "ss", F1d, 27),
    entry(F::Htt, "htt", F1d, 28),
    entry(F::Tm, "tm", F1d, 29),
    entry(F::Pbe, "pbe", F1d, 31),
    entry(F::Bmi1, "bmi1", F7b, 3),
    entry(F::Hle, "hle", F7b, 4),
    entry(F::Avx2, "avx2", F7b, 5),
    entry(F::Smep, "smep", F7b, 7),
    entry(F::Bmi2, "bmi2", F7b, 8),
    entry(F::Erms, "erms", F7b, 9),
    entry(F::Invpcid, "invpcid", F7b, 10),
    entry(F::Rtm, "rtm", F7b, 11),
    entry(F::Mpx, "mpx", F7b, 14),
    entry(F::Avx512f, "avx512f", F7b, 16),
    entry(F::Avx512dq, "avx512dq", F7b, 17),
    entry(F::Rdseed, "rdseed", F7b, 18),
    entry(F::Adx, "adx", F7b, 19),
    entry(F::Smap, "smap", F7b, 20),
    entry(F::Avx512ifma, "avx512ifma", F7b, 21),
    entry(F::Pcommit, "pcommit", F7b, 22),
    entry(F::Clflushopt, "clflushopt", F7b, 23),
    entry(F::Clwb, "clwb", F7b, 24),
    entry(F::Avx512pf, "avx512pf", F7b, 26),
    entry(F::Avx512er, "avx512er", F7b, 27),
    entry(F::Avx512cd, "avx512cd", F7b, 28),
    entry(F::Sha, "sha", F7b, 29),
    entry(F::Avx512bw, "avx512bw", F7b, 30),
    entry(F::Avx512vl, "avx512vl", F7b, 31),
    entry(F::Prefetchwt1, "prefetchwt1", F7c, 0),
    entry(F::Avx512vbmi, "avx512vbmi", F7c, 1),
];

impl CpuFeature {
    /// Iterate over every feature in table order
    pub fn all() -> impl Iterator<Item = CpuFeature> {
        FEATURE_TABLE.iter().map(|e| e.feature)
    }

    /// Table entry for this feature
    #[inline]
    pub fn entry(self) -> &'static FeatureEntry {
        &FEATURE_TABLE[self as usize]
    }

    /// Canonical lowercase name
    pub fn name(self) -> &'static str {
        self.entry().name
    }

    /// Word holding this feature's bit
    pub fn word(self) -> CapabilityWord {
        self.entry().word
    }

    /// Bit index within [`CpuFeature::word`]
    pub fn bit(self) -> u8 {
        self.entry().bit
    }
}

impl fmt::Display for CpuFeature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for CpuFeature {
    type Err = ZiporaError;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim();
        FEATURE_TABLE
            .iter()
            .find(|e| e.name.eq_ignore_ascii_case(wanted))
            .map(|e| e.feature)
            .ok_or_else(|| ZiporaError::unknown_feature(wanted))
    }
}

/// Raw capability words captured from the running processor
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct CapabilitySnapshot {
    f1c: u32,
    f1d: u32,
    f7b: u32,
    f7c: u32,
}

impl CapabilitySnapshot {
    /// Snapshot with every feature absent
    pub const EMPTY: CapabilitySnapshot = CapabilitySnapshot {
        f1c: 0,
        f1d: 0,
        f7b: 0,
        f7c: 0,
    };

    /// Build a snapshot from raw words, in `f1c, f1d, f7b, f7c` order
    pub const fn from_words(f1c: u32, f1d: u32, f7b: u32, f7c: u32) -> Self {
        Self { f1c, f1d, f7b, f7c }
    }

    /// Read the capability words from the running processor.
    ///
    /// Never fails. Leaves the processor does not report stay zero, and
    /// targets without CPUID get [`CapabilitySnapshot::EMPTY`].
    pub fn capture() -> Self {
        #[cfg(any(
            all(target_arch = "x86_64", not(target_env = "sgx")),
            all(target_arch = "x86", target_feature = "sse", not(target_env = "sgx"))
        ))]
        {
            Self::capture_from(raw_cpuid::CpuIdReaderNative)
        }

        #[cfg(not(any(
            all(target_arch = "x86_64", not(target_env = "sgx")),
            all(target_arch = "x86", target_feature = "sse", not(target_env = "sgx"))
        )))]
        {
            Self::EMPTY
        }
    }

    /// Capture honoring [`PlatformConfig::disable_cpu_detection`]
    pub fn capture_with(config: &PlatformConfig) -> Self {
        if config.disable_cpu_detection {
            log::debug!("CPU detection disabled by configuration, using empty snapshot");
            return Self::EMPTY;
        }
        let snapshot = Self::capture();
        if config.log_capabilities {
            log::info!("CPU capabilities: {}", snapshot);
        } else {
            log::debug!(
                "Captured CPU snapshot {:?} (simd tier {})",
                snapshot,
                snapshot.simd_tier()
            );
        }
        snapshot
    }

    /// Capture through an arbitrary CPUID reader
    #[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
    pub fn capture_from<R: raw_cpuid::CpuIdReader>(reader: R) -> Self {
        let max_leaf = reader.cpuid1(0).eax;
        let mut snapshot = Self::EMPTY;

        if max_leaf >= 1 {
            let leaf1 = reader.cpuid1(1);
            snapshot.f1c = leaf1.ecx;
            snapshot.f1d = leaf1.edx;
        }
        if max_leaf >= 7 {
            let leaf7 = reader.cpuid2(7, 0);
            snapshot.f7b = leaf7.ebx;
            snapshot.f7c = leaf7.ecx;
        }
        snapshot
    }

    /// Raw value of one capability word
    #[inline]
    pub fn word(&self, word: CapabilityWord) -> u32 {
        match word {
            CapabilityWord::F1c => self.f1c,
            CapabilityWord::F1d => self.f1d,
            CapabilityWord::F7b => self.f7b,
            CapabilityWord::F7c => self.f7c,
        }
    }

    /// Check whether a feature bit is set
    #[inline]
    pub fn has(&self, feature: CpuFeature) -> bool {
        let entry = feature.entry();
        self.word(entry.word) & (1u32 << entry.bit) != 0
    }

    /// Features present in this snapshot, in table order
    pub fn features(&self) -> impl Iterator<Item = CpuFeature> + '_ {
        CpuFeature::all().filter(move |f| self.has(*f))
    }

    /// True when no word has any bit set
    pub fn is_empty(&self) -> bool {
        *self == Self::EMPTY
    }

    /// SIMD dispatch tier (0=scalar, 1=sse2, 2=sse4.2, 3=avx2, 4=avx512f)
    ///
    /// Each tier tests only its own bit. A processor reporting avx2 without
    /// sse4.2 still lands in tier 3.
    pub fn simd_tier(&self) -> u8 {
        if self.has(CpuFeature::Avx512f) {
            4
        } else if self.has(CpuFeature::Avx2) {
            3
        } else if self.has(CpuFeature::Sse42) {
            2
        } else if self.has(CpuFeature::Sse2) {
            1
        } else {
            0
        }
    }

    /// Get recommended buffer alignment for SIMD operations
    pub fn recommended_alignment(&self) -> usize {
        if self.has(CpuFeature::Avx512f) {
            64
        } else if self.has(CpuFeature::Avx2) || self.has(CpuFeature::Avx) {
            32
        } else if self.has(CpuFeature::Sse2) {
            16
        } else {
            8
        }
    }
}

impl fmt::Display for CapabilitySnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return f.write_str("(none)");
        }
        for (i, feature) in self.features().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            f.write_str(feature.name())?;
        }
        Ok(())
    }
}

/// Capture the running processor's capabilities
pub fn capture() -> CapabilitySnapshot {
    CapabilitySnapshot::capture()
}

/// Test one feature against a snapshot
#[inline]
pub fn has(snapshot: &CapabilitySnapshot, feature: CpuFeature) -> bool {
    snapshot.has(feature)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn only(feature: CpuFeature) -> CapabilitySnapshot {
        let mut words = [0u32; 4];
        let idx = CapabilityWord::ALL.iter().position(|w| *w == feature.word()).unwrap();
        words[idx] = 1 << feature.bit();
        CapabilitySnapshot::from_words(words[0], words[1], words[2], words[3])
    }

    #[test]
    fn test_table_matches_enum_order() {
        for (i, e) in FEATURE_TABLE.iter().enumerate() {
            assert_eq!(e.feature as usize, i, "table entry {} out of order", e.name);
            assert!(e.bit < 32);
        }
        assert_eq!(CpuFeature::Avx512vbmi as usize, FEATURE_TABLE.len() - 1);
    }

    #[test]
    fn test_table_has_no_duplicate_bits_or_names() {
        for (i, a) in FEATURE_TABLE.iter().enumerate() {
            for b in &FEATURE_TABLE[i + 1..] {
                assert!(a.name != b.name, "duplicate name {}", a.name);
                let shared = a.word == b.word && a.bit == b.bit;
                assert!(!shared, "{} and {} share a bit", a.name, b.name);
            }
        }
    }

    #[test]
    fn test_word_sizes() {
        let count = |w| FEATURE_TABLE.iter().filter(|e| e.word == w).count();
        assert_eq!(count(CapabilityWord::F1c), 29);
        assert_eq!(count(CapabilityWord::F1d), 29);
        assert_eq!(count(CapabilityWord::F7b), 24);
        assert_eq!(count(CapabilityWord::F7c), 2);
    }

    #[test]
    fn test_known_positions() {
        let expected = [
            (CpuFeature::Sse3, CapabilityWord::F1c, 0),
            (CpuFeature::Sse2, CapabilityWord::F1d, 26),
            (CpuFeature::Pbe, CapabilityWord::F1d, 31),
            (CpuFeature::Avx2, CapabilityWord::F7b, 5),
            (CpuFeature::Bmi2, CapabilityWord::F7b, 8),
            (CpuFeature::Avx512vbmi, CapabilityWord::F7c, 1),
        ];
        for (feature, word, bit) in expected {
            assert_eq!((feature.word(), feature.bit()), (word, bit), "{}", feature);
        }
    }

    #[test]
    fn test_empty_snapshot_has_nothing() {
        let snapshot = CapabilitySnapshot::EMPTY;
        assert!(snapshot.is_empty());
        assert!(CpuFeature::all().all(|f| !snapshot.has(f)));
        assert_eq!(snapshot.simd_tier(), 0);
        assert_eq!(snapshot.recommended_alignment(), 8);
        assert_eq!(snapshot.to_string(), "(none)");
    }

    #[test]
    fn test_single_bit_snapshots() {
        for feature in CpuFeature::all() {
            let snapshot = only(feature);
            assert!(snapshot.has(feature));
            assert_eq!(snapshot.features().collect::<Vec<_>>(), vec![feature]);
            assert_eq!(snapshot.to_string(), feature.name());
        }
    }

    #[test]
    fn test_unlisted_bits_are_ignored() {
        // f1c bits 11, 16, 31 and f1d bits 10, 20, 30 are not in the table
        let snapshot = CapabilitySnapshot::from_words(
            (1 << 11) | (1 << 16) | (1 << 31),
            (1 << 10) | (1 << 20) | (1 << 30),
            0,
            0,
        );
        assert!(!snapshot.is_empty());
        assert_eq!(snapshot.features().count(), 0);
    }

    #[test]
    fn test_simd_tier_uses_only_named_bits() {
        assert_eq!(only(CpuFeature::Sse2).simd_tier(), 1);
        assert_eq!(only(CpuFeature::Sse42).simd_tier(), 2);
        assert_eq!(only(CpuFeature::Avx2).simd_tier(), 3);
        assert_eq!(only(CpuFeature::Avx512f).simd_tier(), 4);
        assert_eq!(only(CpuFeature::Popcnt).simd_tier(), 0);

        assert_eq!(only(CpuFeature::Avx).recommended_alignment(), 32);
        assert_eq!(only(CpuFeature::Avx512f).recommended_alignment(), 64);
        assert_eq!(only(CpuFeature::Sse2).recommended_alignment(), 16);
    }

    #[test]
    fn test_feature_names_round_trip() {
        for feature in CpuFeature::all() {
            assert_eq!(feature.name().parse::<CpuFeature>().unwrap(), feature);
            assert_eq!(feature.to_string(), feature.name());
        }
        assert_eq!("AVX2".parse::<CpuFeature>().unwrap(), CpuFeature::Avx2);
        assert_eq!(" sse41 ".parse::<CpuFeature>().unwrap(), CpuFeature::Sse41);
        assert!(matches!(
            "sse5".parse::<CpuFeature>(),
            Err(ZiporaError::UnknownFeature { .. })
        ));
    }

    #[test]
    fn test_capture_is_deterministic() {
        let first = capture();
        for _ in 0..16 {
            let again = capture();
            assert_eq!(first, again);
            for feature in CpuFeature::all() {
                assert_eq!(has(&first, feature), has(&again, feature));
            }
        }
    }

    #[cfg(not(any(target_arch = "x86", target_arch = "x86_64")))]
    #[test]
    fn test_capture_without_cpuid_is_empty() {
        assert!(capture().is_empty());
    }

    #[cfg(all(target_arch = "x86_64", not(target_env = "sgx")))]
    #[test]
    fn test_capture_reports_x86_64_baseline() {
        // SSE2 is architecturally guaranteed on x86_64
        let snapshot = capture();
        assert!(snapshot.has(CpuFeature::Sse2));
        assert!(snapshot.simd_tier() >= 1);
    }

    #[test]
    fn test_capture_with_disabled_detection() {
        let config = PlatformConfig {
            disable_cpu_detection: true,
            ..PlatformConfig::default()
        };
        assert!(CapabilitySnapshot::capture_with(&config).is_empty());

        let config = PlatformConfig::default();
        assert_eq!(CapabilitySnapshot::capture_with(&config), capture());
    }

    #[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
    mod reader {
        use super::*;
        use raw_cpuid::CpuIdResult;

        fn fake(max_leaf: u32) -> impl Fn(u32, u32) -> CpuIdResult + Clone {
            move |leaf, subleaf| {
                let word = |eax, ebx, ecx, edx| CpuIdResult { eax, ebx, ecx, edx };
                if leaf > max_leaf {
                    return word(0xdead, 0xdead, 0xdead, 0xdead);
                }
                match (leaf, subleaf) {
                    (0, _) => word(max_leaf, 0, 0, 0),
                    (1, _) => word(0, 0, 1 << 20, 1 << 26),
                    (7, 0) => word(0, (1 << 5) | (1 << 8), 1 << 1, 0),
                    _ => word(0, 0, 0, 0),
                }
            }
        }

        #[test]
        fn test_capture_from_full_reader() {
            let snapshot = CapabilitySnapshot::capture_from(fake(7));
            assert!(snapshot.has(CpuFeature::Sse42));
            assert!(snapshot.has(CpuFeature::Sse2));
            assert!(snapshot.has(CpuFeature::Avx2));
            assert!(snapshot.has(CpuFeature::Bmi2));
            assert!(snapshot.has(CpuFeature::Avx512vbmi));
            assert!(!snapshot.has(CpuFeature::Avx));
            assert_eq!(snapshot.simd_tier(), 3);
        }

        #[test]
        fn test_capture_from_old_processor_skips_leaf7() {
            let snapshot = CapabilitySnapshot::capture_from(fake(1));
            assert!(snapshot.has(CpuFeature::Sse2));
            assert_eq!(snapshot.word(CapabilityWord::F7b), 0);
            assert_eq!(snapshot.word(CapabilityWord::F7c), 0);
        }

        #[test]
        fn test_capture_from_leaf0_only() {
            assert!(CapabilitySnapshot::capture_from(fake(0)).is_empty());
        }
    }
}
