//! Derived ACS indicators.
//!
//! Each indicator is either a sum of estimates or a percentage of a
//! denominator. Definitions are evaluated in order so later percentages can
//! reference earlier sums (e.g. `pct_college_plus` uses `college_plus`).

use diridon_geography_models::AcsRecord;

/// How an indicator is computed from a record.
#[derive(Debug, Clone, Copy)]
pub enum Derivation {
    /// Sum of the named operands; `None` if any operand is missing.
    Sum(&'static [&'static str]),
    /// `numerator / denominator * 100`; `None` if either is missing or the
    /// denominator is zero.
    Percent {
        /// Numerator operand.
        numerator: &'static str,
        /// Denominator operand.
        denominator: &'static str,
    },
}

const fn pct(numerator: &'static str, denominator: &'static str) -> Derivation {
    Derivation::Percent {
        numerator,
        denominator,
    }
}

/// Every derived indicator in evaluation order.
pub const INDICATORS: &[(&str, Derivation)] = &[
    // Rent burden
    (
        "rent_burdened_count",
        Derivation::Sum(&["rent_30_34", "rent_35_39", "rent_40_49", "rent_50_plus"]),
    ),
    (
        "rent_burdened_pct",
        pct("rent_burdened_count", "total_renter_households"),
    ),
    // Poverty
    ("poverty_rate", pct("below_poverty", "poverty_universe")),
    // Tenure
    ("pct_renters", pct("renter_occupied", "tenure_total")),
    ("pct_homeowners", pct("owner_occupied", "tenure_total")),
    // Transportation
    ("no_vehicle_pct", pct("no_vehicle", "total_households")),
    (
        "public_transit_pct",
        pct("public_transit_total", "total_workers"),
    ),
    ("drove_pct", pct("drove", "total_workers")),
    ("bike_pct", pct("bike", "total_workers")),
    ("walked_pct", pct("walked", "total_workers")),
    ("commuter_rail_pct", pct("commuter_rail", "total_workers")),
    ("light_rail_pct", pct("light_rail", "total_workers")),
    ("worked_home_pct", pct("worked_home", "total_workers")),
    // Housing structure
    (
        "single_family_units",
        Derivation::Sum(&["units_1_detached", "units_1_attached"]),
    ),
    (
        "small_multifamily_units",
        Derivation::Sum(&["units_2", "units_3_4"]),
    ),
    (
        "medium_multifamily_units",
        Derivation::Sum(&["units_5_9", "units_10_19"]),
    ),
    (
        "large_multifamily_units",
        Derivation::Sum(&["units_20_49", "units_50_plus"]),
    ),
    (
        "other_units",
        Derivation::Sum(&["units_mobile", "units_other"]),
    ),
    ("pct_single_family", pct("single_family_units", "units_total")),
    (
        "pct_small_multifamily",
        pct("small_multifamily_units", "units_total"),
    ),
    (
        "pct_medium_multifamily",
        pct("medium_multifamily_units", "units_total"),
    ),
    (
        "pct_large_multifamily",
        pct("large_multifamily_units", "units_total"),
    ),
    ("pct_other", pct("other_units", "units_total")),
    // Vacancy
    (
        "vacancy_rate",
        pct("housing_units_vacant", "housing_units_total"),
    ),
    // Race / ethnicity
    ("pct_white", pct("white", "race_total")),
    ("pct_black", pct("black", "race_total")),
    ("pct_asian", pct("asian", "race_total")),
    ("pct_latino", pct("hispanic", "hisp_total")),
    // Education
    (
        "college_plus",
        Derivation::Sum(&["bachelors", "masters", "professional", "doctorate"]),
    ),
    ("pct_college_plus", pct("college_plus", "edu_total")),
];

/// `numerator / denominator * 100`, or `None` when undefined.
#[must_use]
pub fn percent(numerator: Option<f64>, denominator: Option<f64>) -> Option<f64> {
    let (n, d) = (numerator?, denominator?);
    if d == 0.0 {
        return None;
    }
    Some(n / d * 100.0).filter(|v| v.is_finite())
}

impl Derivation {
    /// Evaluates this derivation against a record.
    #[must_use]
    pub fn evaluate(&self, record: &AcsRecord) -> Option<f64> {
        match self {
            Self::Sum(operands) => operands.iter().map(|name| record.get(name)).sum(),
            Self::Percent {
                numerator,
                denominator,
            } => percent(record.get(numerator), record.get(denominator)),
        }
    }
}

/// Adds every [`INDICATORS`] entry to each record's `indicators` map.
pub fn compute_acs_indicators(records: &mut [AcsRecord]) {
    let mut undefined = 0usize;

    for record in records.iter_mut() {
        for (name, derivation) in INDICATORS {
            let value = derivation.evaluate(record);
            if value.is_none() {
                undefined += 1;
            }
            record.indicators.insert((*name).to_string(), value);
        }
    }

    log::info!(
        "Computed {} indicators for {} tracts ({undefined} undefined values)",
        INDICATORS.len(),
        records.len()
    );
}

/// Names of every derived indicator.
#[must_use]
pub fn indicator_names() -> Vec<&'static str> {
    INDICATORS.iter().map(|(name, _)| *name).collect()
}
