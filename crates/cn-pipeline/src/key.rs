//! Group-key resolution from source identifiers.
//!
//! Source names follow a fixed token convention, e.g.
//! `pid22_E65536_eta_20_25_phiCorrected.json`: the true energy is the number
//! after `E` in the second `_`-separated token, and the eta bin is the two
//! tokens following the literal `eta_` marker. Extraction is purely
//! syntactic; anything that does not match fails loudly, since a wrongly
//! derived key would corrupt the per-group statistics without a trace.

use cn_core::{Error, GroupKey, Result};

/// Identity of one event source, derived from its name alone.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceMeta {
    /// The full source identifier (file name).
    pub name: String,
    /// Statistics partition key (eta-bin token).
    pub group: GroupKey,
    /// True particle energy declared by the source, shared by all its events.
    pub etrue: f64,
}

/// Parse a source identifier into its group key and true energy.
pub fn parse_source_name(name: &str) -> Result<SourceMeta> {
    let malformed = |reason: &str| Error::MalformedIdentifier {
        name: name.to_string(),
        reason: reason.to_string(),
    };

    // Second underscore-separated token carries the energy, e.g. `E65536`.
    let energy_token =
        name.split('_').nth(1).ok_or_else(|| malformed("expected at least two '_' tokens"))?;
    let energy_digits = energy_token
        .split_once('E')
        .map(|(_, rest)| rest)
        .ok_or_else(|| malformed("expected 'E<energy>' in the second token"))?;
    let etrue: f64 = energy_digits
        .parse()
        .map_err(|_| malformed(&format!("non-numeric energy '{energy_digits}'")))?;

    // Eta range follows the literal `eta_` marker: two more tokens.
    let after_eta =
        name.split_once("eta_").map(|(_, rest)| rest).ok_or_else(|| malformed("missing 'eta_' marker"))?;
    let mut eta_tokens = after_eta.split('_');
    let lo = eta_tokens.next().filter(|t| !t.is_empty()).ok_or_else(|| malformed("incomplete eta range"))?;
    let hi = eta_tokens.next().filter(|t| !t.is_empty()).ok_or_else(|| malformed("incomplete eta range"))?;
    // The upper token may be the last before the extension (`..._eta_20_25.json`).
    let hi = hi.split('.').next().unwrap_or(hi);
    if hi.is_empty() {
        return Err(malformed("incomplete eta range"));
    }

    Ok(SourceMeta { name: name.to_string(), group: GroupKey::new(format!("eta_{lo}_{hi}")), etrue })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_typical_identifier() {
        let m = parse_source_name("pid22_E65536_eta_20_25_phiCorrected.json").unwrap();
        assert_eq!(m.group.as_str(), "eta_20_25");
        assert_eq!(m.etrue, 65536.0);
    }

    #[test]
    fn parses_eta_at_end_of_name() {
        let m = parse_source_name("pid211_E2097152_eta_0_5.json").unwrap();
        assert_eq!(m.group.as_str(), "eta_0_5");
        assert_eq!(m.etrue, 2097152.0);
    }

    #[test]
    fn same_eta_token_yields_same_group() {
        let a = parse_source_name("pid22_E1024_eta_20_25_a.json").unwrap();
        let b = parse_source_name("pid211_E65536_eta_20_25_b.json").unwrap();
        assert_eq!(a.group, b.group);
    }

    #[test]
    fn rejects_missing_energy_token() {
        let err = parse_source_name("noseparators.json").unwrap_err();
        assert!(matches!(err, Error::MalformedIdentifier { .. }), "got {err:?}");
    }

    #[test]
    fn rejects_missing_eta_marker() {
        let err = parse_source_name("pid22_E65536_nobin.json").unwrap_err();
        assert!(matches!(err, Error::MalformedIdentifier { .. }), "got {err:?}");
    }

    #[test]
    fn rejects_non_numeric_energy() {
        let err = parse_source_name("pid22_Exyz_eta_20_25.json").unwrap_err();
        assert!(matches!(err, Error::MalformedIdentifier { .. }), "got {err:?}");
    }

    #[test]
    fn rejects_truncated_eta_range() {
        let err = parse_source_name("pid22_E65536_eta_20").unwrap_err();
        assert!(matches!(err, Error::MalformedIdentifier { .. }), "got {err:?}");
    }
}
