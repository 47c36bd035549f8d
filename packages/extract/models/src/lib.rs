#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Extraction scope, query dimension, column, and summary types.
//!
//! An [`ExtractScope`] fixes which countries, commodities, price type, and
//! years a run covers. Each (country, commodity) pair is one
//! [`QueryDimension`], fetched independently and merged in scope order.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString, IntoStaticStr};

/// One (country, commodity) pair driving a single paginated fetch.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct QueryDimension {
    /// ISO 3166-1 alpha-3 country code (e.g., `"PHL"`).
    pub country: String,
    /// Commodity name as the API spells it (e.g., `"Cooking Oil"`).
    pub commodity: String,
}

impl fmt::Display for QueryDimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.country, self.commodity)
    }
}

/// The fixed scope of one extraction run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractScope {
    /// Country codes, in the order their results are merged.
    pub countries: Vec<String>,
    /// Commodity names, in the order their results are merged within a
    /// country.
    pub commodities: Vec<String>,
    /// Price type filter (e.g., `"Retail"`).
    pub price_type: String,
    /// First calendar year of the reference-period window (inclusive).
    pub start_year: i32,
    /// Last calendar year of the reference-period window (inclusive).
    pub end_year: i32,
}

impl ExtractScope {
    /// Enumerates every query dimension, countries outer and commodities
    /// inner.
    pub fn dimensions(&self) -> impl Iterator<Item = QueryDimension> + '_ {
        self.countries.iter().flat_map(move |country| {
            self.commodities.iter().map(move |commodity| QueryDimension {
                country: country.clone(),
                commodity: commodity.clone(),
            })
        })
    }

    /// Number of query dimensions in the scope.
    #[must_use]
    pub fn dimension_count(&self) -> usize {
        self.countries.len() * self.commodities.len()
    }

    /// Lower bound for `reference_period_start` (`YYYY-01-01`).
    #[must_use]
    pub fn period_start(&self) -> String {
        format!("{:04}-01-01", self.start_year)
    }

    /// Upper bound for `reference_period_start` (`YYYY-12-31`).
    #[must_use]
    pub fn period_end(&self) -> String {
        format!("{:04}-12-31", self.end_year)
    }
}

/// What to do when one query dimension's fetch fails.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum FailurePolicy {
    /// Stop the whole run on the first failing dimension.
    #[default]
    Abort,
    /// Log the failure, record the dimension, and continue with the next.
    Skip,
}

/// The allow-listed output columns, in output order.
///
/// Each variant's [`name`](Self::name) is the API field of the same
/// spelling, and is also the CSV header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum Column {
    /// Commodity code.
    CommodityCode,
    /// Commodity name, e.g. `Rice`.
    CommodityName,
    /// Commodity category, e.g. `cereals and tubers`.
    CommodityCategory,
    /// Price type, e.g. `Retail`.
    PriceType,
    /// Observed price.
    Price,
    /// Unit the price is quoted per.
    Unit,
    /// ISO 4217 currency code of the price.
    CurrencyCode,
    /// First day of the observation period.
    ReferencePeriodStart,
    /// Last day of the observation period.
    ReferencePeriodEnd,
    /// ISO 3166 alpha-3 country code.
    LocationCode,
    /// Country name.
    LocationName,
    /// First-level administrative division code.
    #[strum(serialize = "admin1_code")]
    Admin1Code,
    /// First-level administrative division name.
    #[strum(serialize = "admin1_name")]
    Admin1Name,
    /// Second-level administrative division code.
    #[strum(serialize = "admin2_code")]
    Admin2Code,
    /// Second-level administrative division name.
    #[strum(serialize = "admin2_name")]
    Admin2Name,
    /// Market code.
    MarketCode,
    /// Market name.
    MarketName,
    /// Market latitude.
    Lat,
    /// Market longitude.
    Lon,
    /// HDX identifier of the source resource.
    ResourceHdxId,
}

impl Column {
    /// Every allow-listed column, in output order.
    pub const ALL: [Self; 20] = [
        Self::CommodityCode,
        Self::CommodityName,
        Self::CommodityCategory,
        Self::PriceType,
        Self::Price,
        Self::Unit,
        Self::CurrencyCode,
        Self::ReferencePeriodStart,
        Self::ReferencePeriodEnd,
        Self::LocationCode,
        Self::LocationName,
        Self::Admin1Code,
        Self::Admin1Name,
        Self::Admin2Code,
        Self::Admin2Name,
        Self::MarketCode,
        Self::MarketName,
        Self::Lat,
        Self::Lon,
        Self::ResourceHdxId,
    ];

    /// The API field name, which is also the CSV header.
    #[must_use]
    pub fn name(self) -> &'static str {
        self.into()
    }
}

/// A query dimension whose fetch failed and was tolerated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DimensionFailure {
    /// The dimension that failed.
    pub dimension: QueryDimension,
    /// The error message.
    pub error: String,
}

/// Result of a completed extraction run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractSummary {
    /// Where the dataset was written.
    pub output_path: PathBuf,
    /// Number of data rows written.
    pub rows: usize,
    /// Names of the columns written, in order.
    pub columns: Vec<String>,
    /// The scope the run covered.
    pub scope: ExtractScope,
    /// Dimensions that returned no rows.
    pub empty: Vec<QueryDimension>,
    /// Dimensions whose fetch failed under [`FailurePolicy::Skip`].
    pub failed: Vec<DimensionFailure>,
}

impl fmt::Display for ExtractSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Saved filtered raw data: {}", self.output_path.display())?;
        writeln!(f, "Rows saved: {}", group_thousands(self.rows))?;
        writeln!(f, "Countries: {}", self.scope.countries.join(", "))?;
        writeln!(f, "Commodities: {}", self.scope.commodities.join(", "))?;
        writeln!(f, "Price type: {}", self.scope.price_type)?;
        write!(
            f,
            "Years: {} to {}",
            self.scope.start_year, self.scope.end_year
        )?;
        for failure in &self.failed {
            write!(f, "\nFailed: {} ({})", failure.dimension, failure.error)?;
        }
        Ok(())
    }
}

/// Formats `n` with `,` between groups of three digits.
fn group_thousands(n: usize) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}
