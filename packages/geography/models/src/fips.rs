//! US state FIPS lookups.
//!
//! One table of `(fips, abbreviation, name)` for the 50 states + DC, and
//! [`validate_state`] to normalize whatever a user typed into a FIPS code.

use thiserror::Error;

/// `(FIPS, USPS abbreviation, full name)` for the 50 states + DC.
pub const STATES: &[(&str, &str, &str)] = &[
    ("01", "AL", "Alabama"),
    ("02", "AK", "Alaska"),
    ("04", "AZ", "Arizona"),
    ("05", "AR", "Arkansas"),
    ("06", "CA", "California"),
    ("08", "CO", "Colorado"),
    ("09", "CT", "Connecticut"),
    ("10", "DE", "Delaware"),
    ("11", "DC", "District of Columbia"),
    ("12", "FL", "Florida"),
    ("13", "GA", "Georgia"),
    ("15", "HI", "Hawaii"),
    ("16", "ID", "Idaho"),
    ("17", "IL", "Illinois"),
    ("18", "IN", "Indiana"),
    ("19", "IA", "Iowa"),
    ("20", "KS", "Kansas"),
    ("21", "KY", "Kentucky"),
    ("22", "LA", "Louisiana"),
    ("23", "ME", "Maine"),
    ("24", "MD", "Maryland"),
    ("25", "MA", "Massachusetts"),
    ("26", "MI", "Michigan"),
    ("27", "MN", "Minnesota"),
    ("28", "MS", "Mississippi"),
    ("29", "MO", "Missouri"),
    ("30", "MT", "Montana"),
    ("31", "NE", "Nebraska"),
    ("32", "NV", "Nevada"),
    ("33", "NH", "New Hampshire"),
    ("34", "NJ", "New Jersey"),
    ("35", "NM", "New Mexico"),
    ("36", "NY", "New York"),
    ("37", "NC", "North Carolina"),
    ("38", "ND", "North Dakota"),
    ("39", "OH", "Ohio"),
    ("40", "OK", "Oklahoma"),
    ("41", "OR", "Oregon"),
    ("42", "PA", "Pennsylvania"),
    ("44", "RI", "Rhode Island"),
    ("45", "SC", "South Carolina"),
    ("46", "SD", "South Dakota"),
    ("47", "TN", "Tennessee"),
    ("48", "TX", "Texas"),
    ("49", "UT", "Utah"),
    ("50", "VT", "Vermont"),
    ("51", "VA", "Virginia"),
    ("53", "WA", "Washington"),
    ("54", "WV", "West Virginia"),
    ("55", "WI", "Wisconsin"),
    ("56", "WY", "Wyoming"),
];

type StateRow = (&'static str, &'static str, &'static str);

fn find(predicate: impl Fn(&StateRow) -> bool) -> Option<&'static StateRow> {
    STATES.iter().find(|row| predicate(row))
}

/// Maps a two-digit FIPS code to the two-letter abbreviation.
///
/// Returns `"??"` for unrecognized codes.
#[must_use]
pub fn state_abbr(fips: &str) -> &'static str {
    find(|(f, _, _)| *f == fips).map_or("??", |(_, abbr, _)| *abbr)
}

/// Maps a two-digit FIPS code to the full state name.
///
/// Returns `"Unknown"` for unrecognized codes.
#[must_use]
pub fn state_name(fips: &str) -> &'static str {
    find(|(f, _, _)| *f == fips).map_or("Unknown", |(_, _, name)| *name)
}

/// Maps a two-letter abbreviation (any case) to its FIPS code.
#[must_use]
pub fn abbr_to_fips(abbr: &str) -> Option<&'static str> {
    find(|(_, a, _)| a.eq_ignore_ascii_case(abbr)).map(|(fips, _, _)| *fips)
}

/// Maps a full state name (any case) to its FIPS code.
#[must_use]
pub fn name_to_fips(name: &str) -> Option<&'static str> {
    find(|(_, _, n)| n.eq_ignore_ascii_case(name)).map(|(fips, _, _)| *fips)
}

/// Error returned by [`validate_state`] for input that names no state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("'{input}' is not a state FIPS code, abbreviation or name")]
pub struct UnknownStateError {
    /// The rejected input.
    pub input: String,
}

/// Normalizes a state given as FIPS code (`"6"`, `"06"`), abbreviation
/// (`"CA"`) or full name (`"california"`) into its two-digit FIPS code.
///
/// # Errors
///
/// Returns [`UnknownStateError`] if the input matches no state.
pub fn validate_state(input: &str) -> Result<&'static str, UnknownStateError> {
    let trimmed = input.trim();

    let resolved = if trimmed.chars().all(|c| c.is_ascii_digit()) && !trimmed.is_empty() {
        let padded = format!("{trimmed:0>2}");
        find(|(f, _, _)| *f == padded).map(|(fips, _, _)| *fips)
    } else if trimmed.len() == 2 {
        abbr_to_fips(trimmed)
    } else {
        name_to_fips(trimmed)
    };

    resolved.ok_or_else(|| UnknownStateError {
        input: input.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_has_states_and_dc() {
        assert_eq!(STATES.len(), 51);
    }

    #[test]
    fn abbr_roundtrip() {
        for (fips, _, _) in STATES {
            let abbr = state_abbr(fips);
            assert_ne!(abbr, "??", "unknown FIPS: {fips}");
            assert_eq!(abbr_to_fips(abbr), Some(*fips));
        }
    }

    #[test]
    fn unknown_codes() {
        assert_eq!(state_abbr("99"), "??");
        assert_eq!(state_name("99"), "Unknown");
        assert_eq!(abbr_to_fips("XX"), None);
    }

    #[test]
    fn validate_accepts_every_spelling() {
        assert_eq!(validate_state("CA"), Ok("06"));
        assert_eq!(validate_state("ca"), Ok("06"));
        assert_eq!(validate_state("06"), Ok("06"));
        assert_eq!(validate_state("6"), Ok("06"));
        assert_eq!(validate_state(" California "), Ok("06"));
        assert_eq!(validate_state("district of columbia"), Ok("11"));
    }

    #[test]
    fn validate_rejects_unknown_input() {
        assert!(validate_state("03").is_err());
        assert!(validate_state("ZZ").is_err());
        assert!(validate_state("Atlantis").is_err());
        assert!(validate_state("").is_err());
        assert_eq!(
            validate_state("Atlantis").unwrap_err().to_string(),
            "'Atlantis' is not a state FIPS code, abbreviation or name"
        );
    }
}
