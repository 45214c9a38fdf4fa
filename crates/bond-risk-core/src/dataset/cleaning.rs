//! Preparation of raw bond and CDS spreadsheets into one analysis table.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Instant;

use crate::config::{parse_date, AnalysisConfig};
use crate::dataset::analysis::{FACE_VALUE, YEARS_TO_MATURITY, YTM_ASK, YTM_BID};
use crate::dataset::countries::COUNTRY_NAMES;
use crate::table::{Cell, Table};
use crate::types::{with_metadata, ComputationOutput, Money};
use crate::BondRiskResult;

// ---------------------------------------------------------------------------
// Column names
// ---------------------------------------------------------------------------

pub const CDS_NAME: &str = "Name";
pub const CDS_LOW: &str = "Low";
pub const CDS_HIGH: &str = "High";
pub const CDS_AVG: &str = "Avg";
pub const CDS_3M_CHANGE: &str = "3M +/-";
pub const COUNTRY: &str = "Country";

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// The three CDS tenor sheets, one row per reference entity.
#[derive(Debug, Clone)]
pub struct CdsSheets {
    pub ten_year: Table,
    pub five_year: Table,
    pub two_year: Table,
}

/// Column names and reference data for [`clean_dataset`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CleaningOptions {
    pub issuer_field: String,
    pub maturity_field: String,
    /// Columns removed from the bond sheet when present
    pub drop_columns: Vec<String>,
    /// Source column → analysis column, applied when the target is absent
    pub rename_columns: BTreeMap<String, String>,
    /// Reference country names; empty means the built-in list
    pub countries: Vec<String>,
    /// Issuer name → country for issuers whose name carries no country
    pub country_overrides: BTreeMap<String, String>,
}

impl Default for CleaningOptions {
    fn default() -> Self {
        Self {
            issuer_field: "Issuer Name".into(),
            maturity_field: "Maturity".into(),
            drop_columns: vec!["BVAL Ask Yld".into(), "BVAL Bid Yld".into()],
            rename_columns: BTreeMap::from([
                ("Yld to Mty (Bid)".to_string(), YTM_BID.to_string()),
                ("Yld to Mty (Ask)".to_string(), YTM_ASK.to_string()),
            ]),
            countries: Vec::new(),
            country_overrides: BTreeMap::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// CDS sheets
// ---------------------------------------------------------------------------

/// Swap `Avg` and `3M +/-` on rows where `Avg` lies outside `[Low, High]`
/// but `3M +/-` lies inside. Rows with any blank of the four are left alone.
///
/// Returns the number of rows swapped.
pub fn correct_avg_and_3m(table: &mut Table) -> BondRiskResult<usize> {
    table.require_columns(&[CDS_LOW, CDS_HIGH, CDS_AVG, CDS_3M_CHANGE])?;

    let mut swapped = 0;
    for row in table.rows_mut() {
        let (Some(low), Some(high), Some(avg), Some(change)) = (
            row.number(CDS_LOW),
            row.number(CDS_HIGH),
            row.number(CDS_AVG),
            row.number(CDS_3M_CHANGE),
        ) else {
            continue;
        };
        let within = |v: Decimal| low <= v && v <= high;
        if !within(avg) && within(change) {
            row.set(CDS_AVG, change);
            row.set(CDS_3M_CHANGE, avg);
            swapped += 1;
        }
    }
    Ok(swapped)
}

/// Suffix each tenor's columns (`_10y`, `_5y`, `_2y`) and inner-join the
/// three on the entity name. Entities missing from any tenor are dropped.
pub fn merge_cds_tenors(sheets: CdsSheets) -> BondRiskResult<Table> {
    for sheet in [&sheets.ten_year, &sheets.five_year, &sheets.two_year] {
        sheet.require_columns(&[CDS_NAME])?;
    }
    let ten = sheets.ten_year.with_suffix("_10y");
    let five = sheets.five_year.with_suffix("_5y");
    let two = sheets.two_year.with_suffix("_2y");

    Ok(ten
        .inner_join(&five, "Name_10y", "Name_5y")
        .inner_join(&two, "Name_10y", "Name_2y"))
}

// ---------------------------------------------------------------------------
// Bond sheet
// ---------------------------------------------------------------------------

/// Maturity date of a cell, if it holds text in one of the accepted layouts.
pub fn parse_maturity(cell: &Cell) -> Option<NaiveDate> {
    parse_date(cell.as_text()?).ok()
}

/// Keep rows maturing on or after `as_of`; rows whose maturity cannot be
/// parsed are dropped too. Kept maturities are rewritten as ISO dates.
///
/// Returns the number of rows dropped.
pub fn drop_matured(
    table: &mut Table,
    maturity_field: &str,
    as_of: NaiveDate,
) -> BondRiskResult<usize> {
    table.require_columns(&[maturity_field])?;

    let before = table.len();
    table.retain(|row| parse_maturity(row.get(maturity_field)).is_some_and(|d| d >= as_of));
    for row in table.rows_mut() {
        if let Some(date) = parse_maturity(row.get(maturity_field)) {
            row.set(maturity_field, date.format("%Y-%m-%d").to_string());
        }
    }
    Ok(before - table.len())
}

/// Country whose name appears, case-insensitively, inside the issuer name.
///
/// When several names match, the longest wins, so "Nigeria" beats "Niger"
/// and "Papua New Guinea" beats "Guinea".
pub fn infer_country<S: AsRef<str>>(issuer: &str, countries: &[S]) -> Option<String> {
    let issuer = issuer.to_lowercase();
    countries
        .iter()
        .map(|c| AsRef::<str>::as_ref(c))
        .filter(|c| !c.is_empty() && issuer.contains(&c.to_lowercase()))
        .fold(None::<&str>, |best, c| match best {
            Some(b) if b.chars().count() >= c.chars().count() => Some(b),
            _ => Some(c),
        })
        .map(str::to_string)
}

/// Add a `Country` column inferred from the issuer name, falling back to
/// `overrides` keyed by issuer name.
///
/// Returns the number of rows left without a country.
pub fn assign_countries<S: AsRef<str>>(
    table: &mut Table,
    issuer_field: &str,
    countries: &[S],
    overrides: &BTreeMap<String, String>,
) -> BondRiskResult<usize> {
    table.require_columns(&[issuer_field])?;
    table.ensure_column(COUNTRY);

    let mut unresolved = 0;
    for row in table.rows_mut() {
        let issuer = row.get(issuer_field).to_string();
        let country = infer_country(&issuer, countries)
            .or_else(|| overrides.get(issuer.trim()).cloned());
        match country {
            Some(c) => row.set(COUNTRY, c),
            None => {
                tracing::debug!(issuer = %issuer, "no country matched issuer");
                row.set(COUNTRY, Cell::Empty);
                unresolved += 1;
            }
        }
    }
    Ok(unresolved)
}

/// Add `Years to Maturity` as `days / 365` from `config.as_of_date`.
///
/// With `round_years` the value is rounded half-to-even to whole years. A
/// result of exactly zero becomes one. Rows without a parseable maturity get
/// an empty cell; their count is returned.
pub fn derive_years_to_maturity(
    table: &mut Table,
    maturity_field: &str,
    config: &AnalysisConfig,
) -> BondRiskResult<usize> {
    table.require_columns(&[maturity_field])?;
    table.ensure_column(YEARS_TO_MATURITY);

    let mut missing = 0;
    for row in table.rows_mut() {
        let Some(maturity) = parse_maturity(row.get(maturity_field)) else {
            row.set(YEARS_TO_MATURITY, Cell::Empty);
            missing += 1;
            continue;
        };
        let days = (maturity - config.as_of_date).num_days();
        let mut years = Decimal::from(days) / Decimal::from(365);
        if config.round_years {
            years = years.round();
        }
        if years.is_zero() {
            years = Decimal::ONE;
        }
        row.set(YEARS_TO_MATURITY, years);
    }
    Ok(missing)
}

/// Set `Face Value` to `default` on rows where it is blank. Unreadable text
/// is left in place for analysis to reject.
pub fn fill_face_value(table: &mut Table, default: Money) {
    table.ensure_column(FACE_VALUE);
    for row in table.rows_mut() {
        if row.get(FACE_VALUE).is_empty() {
            row.set(FACE_VALUE, default);
        }
    }
}

/// Full preparation pipeline: correct and merge the CDS sheets, drop matured
/// bonds and unused columns, assign countries, join the CDS data by country,
/// then derive years to maturity and fill face values.
pub fn clean_dataset(
    bonds: &Table,
    mut cds: CdsSheets,
    options: &CleaningOptions,
    config: &AnalysisConfig,
) -> BondRiskResult<ComputationOutput<Table>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();
    config.validate()?;

    let mut swaps = 0;
    for sheet in [&mut cds.ten_year, &mut cds.five_year, &mut cds.two_year] {
        swaps += correct_avg_and_3m(sheet)?;
    }
    if swaps > 0 {
        warnings.push(format!("Swapped Avg and 3M +/- on {swaps} CDS rows"));
    }
    let merged_cds = merge_cds_tenors(cds)?;

    let mut bonds = bonds.clone();
    bonds.require_columns(&[options.issuer_field.as_str(), options.maturity_field.as_str()])?;
    for (from, to) in &options.rename_columns {
        bonds.rename_column(from, to);
    }

    let dropped = drop_matured(&mut bonds, &options.maturity_field, config.as_of_date)?;
    if dropped > 0 {
        warnings.push(format!(
            "Dropped {dropped} bonds maturing before {} or with unreadable maturity",
            config.as_of_date
        ));
    }

    let unused: Vec<&str> = options.drop_columns.iter().map(String::as_str).collect();
    bonds.drop_columns(&unused);

    let unresolved = if options.countries.is_empty() {
        assign_countries(
            &mut bonds,
            &options.issuer_field,
            COUNTRY_NAMES,
            &options.country_overrides,
        )?
    } else {
        assign_countries(
            &mut bonds,
            &options.issuer_field,
            options.countries.as_slice(),
            &options.country_overrides,
        )?
    };
    if unresolved > 0 {
        warnings.push(format!(
            "{unresolved} bonds have no country and are excluded from the CDS join"
        ));
    }

    let before_join = bonds.len();
    let mut joined = bonds.inner_join(&merged_cds, COUNTRY, "Name_10y");
    let unmatched = (before_join - unresolved).saturating_sub(joined.len());
    if unmatched > 0 {
        warnings.push(format!("{unmatched} bonds have no CDS quotes for their country"));
    }

    derive_years_to_maturity(&mut joined, &options.maturity_field, config)?;
    fill_face_value(&mut joined, config.default_face_value);

    for w in &warnings {
        tracing::warn!(warning = %w, "dataset cleaning");
    }
    tracing::info!(rows = joined.len(), "dataset cleaned");

    let elapsed = start.elapsed().as_micros() as u64;
    let assumptions = serde_json::json!({
        "as_of_date": config.as_of_date.to_string(),
        "round_years": config.round_years,
        "default_face_value": config.default_face_value.to_string(),
        "issuer_field": options.issuer_field,
        "maturity_field": options.maturity_field,
        "country_match": "longest reference name contained in issuer name",
    });

    Ok(with_metadata(
        "Bond & CDS Dataset Preparation",
        &assumptions,
        warnings,
        elapsed,
        joined,
    ))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
