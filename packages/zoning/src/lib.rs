#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! San Jose zoning code lookups.
//!
//! Maps raw zoning district codes (as published in the city's
//! `Zoning_Districts` layer) to a human-readable category for the urban
//! village family of districts and to a coarse land-use [`ZoningClass`].
//! Codes are trimmed before lookup; anything not in the tables falls back
//! to `Other`, and a missing code is `Unknown`.

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// District codes treated as urban-village / transit-oriented zoning.
pub const URBAN_CODES: &[&str] = &["UV", "UVC", "UR", "TR", "MU", "MUC", "MUN"];

/// Category label for codes outside the abbreviation table.
pub const OTHER_LABEL: &str = "Other";

/// Category label for a missing code.
pub const UNKNOWN_LABEL: &str = "Unknown";

/// Coarse land-use class of a zoning district.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
pub enum ZoningClass {
    /// Single- and multi-family residential districts.
    Residential,
    /// Commercial, office and downtown districts.
    Commercial,
    /// Light, heavy and industrial park districts.
    Industrial,
    /// Urban village, mixed use and transit residential districts.
    #[serde(rename = "Mixed Use")]
    #[strum(serialize = "Mixed Use")]
    MixedUse,
    /// Open space, agriculture, public and water districts.
    #[serde(rename = "Special Purpose")]
    #[strum(serialize = "Special Purpose")]
    SpecialPurpose,
    /// A code not in the classification table.
    Other,
    /// No code at all.
    Unknown,
}

/// Returns the human-readable category for urban-village family codes.
///
/// ```
/// assert_eq!(diridon_zoning::abbreviate_zoning(Some(" UV ")), "Urban Village");
/// assert_eq!(diridon_zoning::abbreviate_zoning(Some("R-1-8")), "Other");
/// assert_eq!(diridon_zoning::abbreviate_zoning(None), "Unknown");
/// ```
#[must_use]
pub fn abbreviate_zoning(code: Option<&str>) -> &'static str {
    let Some(code) = code else {
        return UNKNOWN_LABEL;
    };

    match code.trim() {
        "UV" => "Urban Village",
        "UVC" => "Urban Village Commercial",
        "UR" => "Urban Residential",
        "TR" => "Transit Residential",
        "MU" => "Mixed Use",
        "MUC" => "Mixed Use Commercial",
        "MUN" => "Municipal/Neighborhood Mixed Use",
        _ => OTHER_LABEL,
    }
}

/// Classifies a zoning code into a [`ZoningClass`].
///
/// Only codes listed in the city table are recognized, including the
/// planned-development `(PD)` and conditional `(CL)` overlays the table
/// spells out. Unlisted overlays fall back to [`ZoningClass::Other`].
#[must_use]
pub fn classify_zoning(code: Option<&str>) -> ZoningClass {
    let Some(code) = code else {
        return ZoningClass::Unknown;
    };

    match code.trim() {
        // ── Residential ─────────────────────────────────────────────
        "R-1-1" | "R-1-2" | "R-1-5" | "R-1-8" | "R-1-10" | "R-1-RR" | "R-2" | "R-M" | "R-MH"
        | "MS-C" | "MS-G" | "R-2(PD)" | "R-1-1(PD)" | "R-1-2(PD)" | "R-1-5(PD)"
        | "R-1-5(CL)" | "R-1-8(PD)" | "R-1-8(CL)" | "R-M(PD)" | "R-M(CL)" => {
            ZoningClass::Residential
        }

        // ── Commercial ──────────────────────────────────────────────
        "C-1" | "C-2" | "CP" | "CN" | "CG" | "CR" | "CO" | "CIC" | "TEC" | "DC" | "DC-NT1"
        | "CG(PD)" | "CN(PD)" | "CP(PD)" | "CIC(PD)" | "CO(PD)" | "DC(PD)" | "TEC(PD)" => {
            ZoningClass::Commercial
        }

        // ── Industrial ──────────────────────────────────────────────
        "LI" | "HI" | "IP" | "LI(PD)" | "HI(PD)" | "IP(PD)" => ZoningClass::Industrial,

        // ── Mixed use / urban village / transit ─────────────────────
        "MUN" | "MUC" | "UV" | "UVC" | "UR" | "TR" | "MUN(PD)" | "UR(PD)" => {
            ZoningClass::MixedUse
        }

        // ── Special purpose ─────────────────────────────────────────
        "OS" | "A" | "PQ" | "PQP" | "PF" | "PI" | "WATER" | "OS(PD)" | "A(PD)" | "PQP(PD)" => {
            ZoningClass::SpecialPurpose
        }

        _ => ZoningClass::Other,
    }
}

/// Whether a code carries the planned-development `(PD)` overlay.
#[must_use]
pub fn is_planned_development(code: Option<&str>) -> bool {
    code.is_some_and(|c| c.to_uppercase().contains("(PD)"))
}

/// Whether a trimmed code is one of `urban_codes` (usually [`URBAN_CODES`]).
#[must_use]
pub fn is_urban_code(code: Option<&str>, urban_codes: &[String]) -> bool {
    code.is_some_and(|c| {
        let c = c.trim();
        urban_codes.iter().any(|u| u == c)
    })
}

/// Returns [`URBAN_CODES`] as owned strings.
#[must_use]
pub fn default_urban_codes() -> Vec<String> {
    URBAN_CODES.iter().map(ToString::to_string).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn abbreviates_urban_village_family() {
        assert_eq!(abbreviate_zoning(Some("UV")), "Urban Village");
        assert_eq!(abbreviate_zoning(Some("UVC")), "Urban Village Commercial");
        assert_eq!(
            abbreviate_zoning(Some("MUN")),
            "Municipal/Neighborhood Mixed Use"
        );
        assert_eq!(abbreviate_zoning(Some("  TR\t")), "Transit Residential");
    }

    #[test]
    fn abbreviation_fallbacks() {
        assert_eq!(abbreviate_zoning(Some("CG")), "Other");
        assert_eq!(abbreviate_zoning(Some("")), "Other");
        assert_eq!(abbreviate_zoning(None), "Unknown");
    }

    #[test]
    fn classifies_known_codes() {
        assert_eq!(classify_zoning(Some("R-1-8")), ZoningClass::Residential);
        assert_eq!(classify_zoning(Some("R-M(CL)")), ZoningClass::Residential);
        assert_eq!(classify_zoning(Some("DC-NT1")), ZoningClass::Commercial);
        assert_eq!(classify_zoning(Some("IP(PD)")), ZoningClass::Industrial);
        assert_eq!(classify_zoning(Some(" UV ")), ZoningClass::MixedUse);
        assert_eq!(classify_zoning(Some("WATER")), ZoningClass::SpecialPurpose);
    }

    #[test]
    fn classification_fallbacks() {
        assert_eq!(classify_zoning(Some("UV(PD)")), ZoningClass::Other);
        assert_eq!(classify_zoning(Some("OTHER")), ZoningClass::Other);
        assert_eq!(classify_zoning(Some("r-1-8")), ZoningClass::Other);
        assert_eq!(classify_zoning(None), ZoningClass::Unknown);
    }

    #[test]
    fn class_labels_match_table_wording() {
        assert_eq!(ZoningClass::MixedUse.to_string(), "Mixed Use");
        assert_eq!(ZoningClass::SpecialPurpose.as_ref(), "Special Purpose");
        assert_eq!(
            "Mixed Use".parse::<ZoningClass>().unwrap(),
            ZoningClass::MixedUse
        );
    }

    #[test]
    fn planned_development_overlay() {
        assert!(is_planned_development(Some("R-2(PD)")));
        assert!(is_planned_development(Some("a(pd)")));
        assert!(!is_planned_development(Some("R-1-5(CL)")));
        assert!(!is_planned_development(None));
    }

    #[test]
    fn urban_code_membership() {
        let codes = default_urban_codes();
        assert!(is_urban_code(Some("UV"), &codes));
        assert!(is_urban_code(Some(" MUC "), &codes));
        assert!(!is_urban_code(Some("CG"), &codes));
        assert!(!is_urban_code(None, &codes));
    }
}
