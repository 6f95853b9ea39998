use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use clap::ValueEnum;
use regex::Regex;
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::CatalogError;

static ACCESSION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^GC[AF]_\d{9}(\.\d+)?$").expect("static regex"));

static RELEASE_VERSION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d+)(?:\.(\d))?$").expect("static regex"));

macro_rules! row_id {
    ($($name:ident),+ $(,)?) => {
        $(
            #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
            #[serde(transparent)]
            pub struct $name(pub i64);

            impl fmt::Display for $name {
                fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                    write!(f, "{}", self.0)
                }
            }

            impl ToSql for $name {
                fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
                    Ok(ToSqlOutput::from(self.0))
                }
            }

            impl FromSql for $name {
                fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
                    i64::column_result(value).map($name)
                }
            }
        )+
    };
}

row_id!(
    OrganismId,
    AssemblyId,
    GenomeId,
    SiteId,
    ReleaseId,
    DatasetTypeId,
    DatasetSourceId,
    DatasetId,
    AttributeId,
    GenomeDatasetId,
    GenomeReleaseId,
    OrganismGroupId,
);

pub fn parse_uuid(value: &str) -> Result<Uuid, CatalogError> {
    Uuid::parse_str(value.trim()).map_err(|_| CatalogError::InvalidUuid(value.to_string()))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "VersionRepr", into = "f64")]
pub struct ReleaseVersion {
    major: u32,
    minor: u8,
}

impl ReleaseVersion {
    pub fn new(major: u32, minor: u8) -> Result<Self, CatalogError> {
        if minor > 9 {
            return Err(CatalogError::InvalidReleaseVersion(format!(
                "{major}.{minor}"
            )));
        }
        Ok(Self { major, minor })
    }

    pub fn major(&self) -> u32 {
        self.major
    }

    pub fn minor(&self) -> u8 {
        self.minor
    }

    /// Storage encoding that keeps SQL ordering equal to version ordering.
    pub fn as_tenths(&self) -> i64 {
        i64::from(self.major) * 10 + i64::from(self.minor)
    }

    pub fn from_tenths(value: i64) -> Result<Self, CatalogError> {
        let major = u32::try_from(value / 10)
            .map_err(|_| CatalogError::InvalidReleaseVersion(value.to_string()))?;
        let minor = u8::try_from(value % 10)
            .map_err(|_| CatalogError::InvalidReleaseVersion(value.to_string()))?;
        Ok(Self { major, minor })
    }
}

impl fmt::Display for ReleaseVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

impl FromStr for ReleaseVersion {
    type Err = CatalogError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        let captures = RELEASE_VERSION_RE
            .captures(trimmed)
            .ok_or_else(|| CatalogError::InvalidReleaseVersion(value.to_string()))?;
        let major = captures[1]
            .parse::<u32>()
            .map_err(|_| CatalogError::InvalidReleaseVersion(value.to_string()))?;
        let minor = captures
            .get(2)
            .map(|m| m.as_str().parse::<u8>())
            .transpose()
            .map_err(|_| CatalogError::InvalidReleaseVersion(value.to_string()))?
            .unwrap_or(0);
        Self::new(major, minor)
    }
}

impl TryFrom<f64> for ReleaseVersion {
    type Error = CatalogError;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        let tenths = (value * 10.0).round();
        if !value.is_finite() || value < 0.0 || (value * 10.0 - tenths).abs() > 1e-6 {
            return Err(CatalogError::InvalidReleaseVersion(value.to_string()));
        }
        Self::from_tenths(tenths as i64)
    }
}

impl From<ReleaseVersion> for f64 {
    fn from(version: ReleaseVersion) -> Self {
        version.as_tenths() as f64 / 10.0
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum VersionRepr {
    Number(f64),
    Text(String),
}

impl TryFrom<VersionRepr> for ReleaseVersion {
    type Error = CatalogError;

    fn try_from(value: VersionRepr) -> Result<Self, Self::Error> {
        match value {
            VersionRepr::Number(number) => ReleaseVersion::try_from(number),
            VersionRepr::Text(text) => text.parse(),
        }
    }
}

impl ToSql for ReleaseVersion {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_tenths()))
    }
}

impl FromSql for ReleaseVersion {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let tenths = i64::column_result(value)?;
        ReleaseVersion::from_tenths(tenths).map_err(|err| FromSqlError::Other(Box::new(err)))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AssemblyAccession(String);

impl AssemblyAccession {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AssemblyAccession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for AssemblyAccession {
    type Err = CatalogError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_uppercase();
        if !ACCESSION_RE.is_match(&normalized) {
            return Err(CatalogError::InvalidAccession(value.to_string()));
        }
        Ok(Self(normalized))
    }
}

impl TryFrom<String> for AssemblyAccession {
    type Error = CatalogError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<AssemblyAccession> for String {
    fn from(value: AssemblyAccession) -> Self {
        value.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
pub enum DatasetStatus {
    Submitted,
    Processing,
    Processed,
    Released,
    Faulty,
    Suppressed,
}

impl DatasetStatus {
    pub const ALL: [DatasetStatus; 6] = [
        DatasetStatus::Submitted,
        DatasetStatus::Processing,
        DatasetStatus::Processed,
        DatasetStatus::Released,
        DatasetStatus::Faulty,
        DatasetStatus::Suppressed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DatasetStatus::Submitted => "Submitted",
            DatasetStatus::Processing => "Processing",
            DatasetStatus::Processed => "Processed",
            DatasetStatus::Released => "Released",
            DatasetStatus::Faulty => "Faulty",
            DatasetStatus::Suppressed => "Suppressed",
        }
    }

    pub fn satisfies_dependency(&self) -> bool {
        matches!(self, DatasetStatus::Processed | DatasetStatus::Released)
    }

    pub fn is_in_flight(&self) -> bool {
        matches!(self, DatasetStatus::Submitted | DatasetStatus::Processing)
    }
}

impl fmt::Display for DatasetStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DatasetStatus {
    type Err = CatalogError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        DatasetStatus::ALL
            .into_iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| CatalogError::InvalidStatus(value.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
pub enum ReleaseStatus {
    Planned,
    Preparing,
    Prepared,
    Released,
}

impl ReleaseStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReleaseStatus::Planned => "Planned",
            ReleaseStatus::Preparing => "Preparing",
            ReleaseStatus::Prepared => "Prepared",
            ReleaseStatus::Released => "Released",
        }
    }

    pub fn next(&self) -> Option<ReleaseStatus> {
        match self {
            ReleaseStatus::Planned => Some(ReleaseStatus::Preparing),
            ReleaseStatus::Preparing => Some(ReleaseStatus::Prepared),
            ReleaseStatus::Prepared => Some(ReleaseStatus::Released),
            ReleaseStatus::Released => None,
        }
    }
}

impl fmt::Display for ReleaseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReleaseStatus {
    type Err = CatalogError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "planned" => Ok(ReleaseStatus::Planned),
            "preparing" => Ok(ReleaseStatus::Preparing),
            "prepared" => Ok(ReleaseStatus::Prepared),
            "released" => Ok(ReleaseStatus::Released),
            _ => Err(CatalogError::InvalidStatus(value.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ReleaseType {
    #[serde(alias = "integrated")]
    Full,
    Partial,
}

impl ReleaseType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReleaseType::Full => "full",
            ReleaseType::Partial => "partial",
        }
    }
}

impl fmt::Display for ReleaseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReleaseType {
    type Err = CatalogError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "full" | "integrated" => Ok(ReleaseType::Full),
            "partial" => Ok(ReleaseType::Partial),
            _ => Err(CatalogError::InvalidValue {
                field: "release type",
                value: value.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssemblyLevel {
    Contig,
    Scaffold,
    Chromosome,
}

impl AssemblyLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssemblyLevel::Contig => "contig",
            AssemblyLevel::Scaffold => "scaffold",
            AssemblyLevel::Chromosome => "chromosome",
        }
    }
}

impl FromStr for AssemblyLevel {
    type Err = CatalogError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "contig" => Ok(AssemblyLevel::Contig),
            "scaffold" => Ok(AssemblyLevel::Scaffold),
            "chromosome" => Ok(AssemblyLevel::Chromosome),
            _ => Err(CatalogError::InvalidValue {
                field: "assembly level",
                value: value.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AttributeType {
    #[default]
    String,
    Percent,
    Float,
    Integer,
    Bp,
}

impl AttributeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttributeType::String => "string",
            AttributeType::Percent => "percent",
            AttributeType::Float => "float",
            AttributeType::Integer => "integer",
            AttributeType::Bp => "bp",
        }
    }
}

impl FromStr for AttributeType {
    type Err = CatalogError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "string" => Ok(AttributeType::String),
            "percent" => Ok(AttributeType::Percent),
            "float" => Ok(AttributeType::Float),
            "integer" => Ok(AttributeType::Integer),
            "bp" => Ok(AttributeType::Bp),
            _ => Err(CatalogError::InvalidValue {
                field: "attribute type",
                value: value.to_string(),
            }),
        }
    }
}

macro_rules! text_column {
    ($($name:ident),+ $(,)?) => {
        $(
            impl ToSql for $name {
                fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
                    Ok(ToSqlOutput::from(self.as_str()))
                }
            }

            impl FromSql for $name {
                fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
                    value
                        .as_str()?
                        .parse()
                        .map_err(|err: CatalogError| FromSqlError::Other(Box::new(err)))
                }
            }
        )+
    };
}

text_column!(
    DatasetStatus,
    ReleaseStatus,
    ReleaseType,
    AssemblyLevel,
    AttributeType
);
