//! Golden test vectors for the summary wire format.
//!
//! Each vector is a fixed summary together with the exact bytes it must
//! encode to for a given feature set. A change to any of these bytes breaks
//! compatibility with deployed peers.

use std::net::SocketAddr;

use serde::Serialize;

use clog_core::{
    AddrKind, EntityAddr, EntityKind, EntityName, Features, LogEntryBuilder, LogSummary, Origin,
    Severity, Timestamp, CHANNEL_AUDIT,
};

/// A golden test vector.
#[derive(Debug, Clone)]
pub struct GoldenVector {
    /// Human-readable name for the vector.
    pub name: &'static str,
    /// Features the encoder is given.
    pub features: Features,
    /// Builds the summary to encode.
    pub build: fn() -> LogSummary,
    /// Expected encoding (hex).
    pub expected_hex: &'static str,
}

/// Outcome of checking one vector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VectorReport {
    pub name: String,
    pub matches: bool,
    pub actual_hex: String,
}

fn empty() -> LogSummary {
    LogSummary::new()
}

/// One info entry from `osd.0`, no name, no addresses.
fn single() -> LogSummary {
    let mut summary = LogSummary::new();
    summary.add(
        LogEntryBuilder::new(Origin::osd(0), 1)
            .stamp(Timestamp::new(1, 0))
            .message("hi")
            .build(),
    );
    summary.set_version(1);
    summary
}

/// Two channels, named origins, mixed address kinds.
fn mixed() -> LogSummary {
    let mut summary = LogSummary::new();
    summary.add(
        LogEntryBuilder::new(Origin::osd(1), 10)
            .name(EntityName::new(EntityKind::OSD, "1"))
            .addrs(vec![
                EntityAddr::new(AddrKind::Msgr2, SocketAddr::from(([10, 0, 0, 1], 3300)), 7),
                EntityAddr::new(AddrKind::Legacy, SocketAddr::from(([10, 0, 0, 1], 6789)), 7),
            ])
            .stamp(Timestamp::new(1_700_000_000, 500_000_000))
            .severity(Severity::Warn)
            .message("slow request")
            .build(),
    );
    summary.add(
        LogEntryBuilder::new(Origin::client(4100), 11)
            .name(EntityName::new(EntityKind::CLIENT, "admin"))
            .addrs(vec![EntityAddr::new(
                AddrKind::Msgr2,
                SocketAddr::from(([10, 0, 0, 9], 0)),
                9,
            )])
            .stamp(Timestamp::new(1_700_000_001, 0))
            .severity(Severity::Security)
            .message("auth")
            .channel(CHANNEL_AUDIT)
            .build(),
    );
    summary.set_version(2);
    summary
}

/// Get all golden test vectors.
pub fn all_vectors() -> Vec<GoldenVector> {
    vec![
        GoldenVector {
            name: "empty summary, channel layout",
            features: Features::ALL,
            build: empty,
            expected_hex: "0303140000000000000000000000000000000000000000000000",
        },
        GoldenVector {
            name: "empty summary, flat layout",
            features: Features::NONE,
            build: empty,
            expected_hex: "02020c000000000000000000000000000000",
        },
        GoldenVector {
            name: "single entry, channel layout",
            features: Features::ALL,
            build: single,
            expected_hex: concat!(
                "0303690000000100000000000000010000000000000001000000",
                "07000000636c757374657201000000010000000000000005053800000000",
                "000000000000000400000000000000000000000001000000000000000100",
                "000000000000010002000000686907000000636c7573746572",
            ),
        },
        GoldenVector {
            name: "single entry, flat layout",
            features: Features::NONE,
            build: single,
            expected_hex: concat!(
                "02024c000000010000000000000001000000",
                "04023a00000004000000000000000000000000000001000000000000000100",
                "000000000000010002000000686907000000636c75737465720000000000",
                "000000",
            ),
        },
        GoldenVector {
            name: "two channels, channel layout",
            features: Features::ALL,
            build: mixed,
            expected_hex: concat!(
                "0303f300000002000000000000000200000000000000020000000500000061",
                "7564697401000000020000000000000005054a000000080000000500000061",
                "646d696e080410000000000000010000000209000000020000000a00000901",
                "f15365000000000b000000000000000200040000006175746805000000617564",
                "697407000000636c757374657201000000010000000000000005055d000000",
                "0400000001000000310401000000000000000200000002070000000200e40c",
                "0a00000101070000000200851a0a00000100f153650065cd1d0a0000000000",
                "000003000c000000736c6f77207265717565737407000000636c7573746572",
            ),
        },
        GoldenVector {
            name: "two channels, flat layout",
            features: Features::NONE,
            build: mixed,
            expected_hex: concat!(
                "0202a200000002000000000000000200000004024b00000004010000000000",
                "0000070000000200851a0a00000100f153650065cd1d0a0000000000000003",
                "000c000000736c6f77207265717565737407000000636c7573746572040000",
                "00010000003104023f00000008041000000000000000000000000001f15365",
                "000000000b0000000000000002000400000061757468050000006175646974",
                "080000000500000061646d696e",
            ),
        },
    ]
}

/// Encode every vector and compare against the expected bytes.
pub fn verify_all_vectors() -> Vec<VectorReport> {
    all_vectors()
        .iter()
        .map(|v| {
            let actual_hex = hex::encode((v.build)().encode_to_bytes(v.features));
            VectorReport {
                name: v.name.to_string(),
                matches: actual_hex == v.expected_hex,
                actual_hex,
            }
        })
        .collect()
}

/// The verification results as JSON, for diffing against another build.
pub fn report_json() -> serde_json::Value {
    serde_json::json!({ "vectors": verify_all_vectors() })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vectors_match() {
        for report in verify_all_vectors() {
            assert!(
                report.matches,
                "Vector '{}' encoded to {}",
                report.name, report.actual_hex
            );
        }
    }

    #[test]
    fn test_vectors_decode_back() {
        for vector in all_vectors() {
            let bytes = hex::decode(vector.expected_hex).unwrap();
            let decoded = LogSummary::decode_from(&bytes).unwrap();
            let original = (vector.build)();

            assert_eq!(decoded.version(), original.version(), "{}", vector.name);
            assert_eq!(decoded.len(), original.len(), "{}", vector.name);
            assert_eq!(
                decoded.fingerprint(),
                original.fingerprint(),
                "Vector '{}' lost identities on decode",
                vector.name
            );
        }
    }

    #[test]
    fn test_report_json_lists_every_vector() {
        let report = report_json();
        assert_eq!(
            report["vectors"].as_array().map(Vec::len),
            Some(all_vectors().len())
        );
    }
}
