use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{
    AssemblyAccession, AssemblyId, AssemblyLevel, AttributeId, AttributeType, DatasetId,
    DatasetSourceId, DatasetStatus, DatasetTypeId, GenomeDatasetId, GenomeId, GenomeReleaseId,
    OrganismGroupId, OrganismId, ReleaseId, ReleaseStatus, ReleaseType, ReleaseVersion, SiteId,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Organism {
    pub id: OrganismId,
    pub organism_uuid: Uuid,
    pub taxonomy_id: i64,
    pub species_taxonomy_id: Option<i64>,
    pub common_name: String,
    pub scientific_name: Option<String>,
    pub strain: Option<String>,
    pub rank: Option<i64>,
    pub production_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assembly {
    pub id: AssemblyId,
    pub assembly_uuid: Uuid,
    pub accession: AssemblyAccession,
    pub name: String,
    pub level: AssemblyLevel,
    pub is_reference: bool,
    pub created: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssemblySequence {
    pub assembly_id: AssemblyId,
    pub name: String,
    pub accession: String,
    pub length: i64,
    pub md5: Option<String>,
    pub is_circular: bool,
    pub chromosomal: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Genome {
    pub id: GenomeId,
    pub genome_uuid: Uuid,
    pub assembly_id: AssemblyId,
    pub organism_id: OrganismId,
    pub created: DateTime<Utc>,
    pub production_name: String,
    pub is_best: bool,
    pub suppressed: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Site {
    pub id: SiteId,
    pub name: String,
    pub label: String,
    pub uri: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Release {
    pub id: ReleaseId,
    pub version: ReleaseVersion,
    pub site_id: SiteId,
    pub site_name: String,
    pub release_date: Option<NaiveDate>,
    pub label: Option<String>,
    pub is_current: bool,
    pub release_type: ReleaseType,
    pub status: ReleaseStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetType {
    pub id: DatasetTypeId,
    pub name: String,
    pub label: String,
    pub topic: String,
    pub description: Option<String>,
    pub parent_id: Option<DatasetTypeId>,
    pub depends_on: Vec<DatasetTypeId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetSource {
    pub id: DatasetSourceId,
    pub source_type: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    pub id: DatasetId,
    pub dataset_uuid: Uuid,
    pub name: String,
    pub version: Option<String>,
    pub label: String,
    pub created: DateTime<Utc>,
    pub dataset_type_id: DatasetTypeId,
    pub dataset_source_id: DatasetSourceId,
    pub parent_id: Option<DatasetId>,
    pub status: DatasetStatus,
    pub eligible: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenomeDataset {
    pub id: GenomeDatasetId,
    pub genome_id: GenomeId,
    pub dataset_id: DatasetId,
    pub release_id: Option<ReleaseId>,
    pub is_current: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenomeRelease {
    pub id: GenomeReleaseId,
    pub genome_id: GenomeId,
    pub release_id: ReleaseId,
    pub is_current: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attribute {
    pub id: AttributeId,
    pub name: String,
    pub label: String,
    pub description: Option<String>,
    pub attribute_type: AttributeType,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetAttribute {
    pub name: String,
    pub label: String,
    pub attribute_type: AttributeType,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrganismGroup {
    pub id: OrganismGroupId,
    pub group_type: String,
    pub name: String,
    pub code: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrganismGroupMember {
    pub group_id: OrganismGroupId,
    pub organism_id: OrganismId,
    pub is_reference: bool,
    pub order: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusChange {
    pub dataset_id: DatasetId,
    pub from: DatasetStatus,
    pub to: DatasetStatus,
    pub changed_at: DateTime<Utc>,
}

// Registration payloads. Identifiers, UUIDs and timestamps are assigned by
// the store on insert.

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewOrganism {
    pub taxonomy_id: i64,
    #[serde(default)]
    pub species_taxonomy_id: Option<i64>,
    pub common_name: String,
    #[serde(default)]
    pub scientific_name: Option<String>,
    #[serde(default)]
    pub strain: Option<String>,
    #[serde(default)]
    pub rank: Option<i64>,
    pub production_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewAssembly {
    pub accession: AssemblyAccession,
    pub name: String,
    pub level: AssemblyLevel,
    #[serde(default)]
    pub is_reference: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewAssemblySequence {
    pub name: String,
    pub accession: String,
    pub length: i64,
    #[serde(default)]
    pub md5: Option<String>,
    #[serde(default)]
    pub is_circular: bool,
    #[serde(default)]
    pub chromosomal: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewGenome {
    pub assembly_id: AssemblyId,
    pub organism_id: OrganismId,
    pub production_name: String,
    pub is_best: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewSite {
    pub name: String,
    pub label: String,
    #[serde(default)]
    pub uri: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewRelease {
    pub version: ReleaseVersion,
    pub site_id: SiteId,
    pub label: Option<String>,
    pub release_type: ReleaseType,
    pub release_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewDatasetType {
    pub name: String,
    pub label: String,
    pub topic: String,
    pub description: Option<String>,
    pub parent_id: Option<DatasetTypeId>,
    pub depends_on: Vec<DatasetTypeId>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewDataset {
    pub name: String,
    pub version: Option<String>,
    pub label: String,
    pub dataset_type_id: DatasetTypeId,
    pub dataset_source_id: DatasetSourceId,
    pub parent_id: Option<DatasetId>,
    pub status: DatasetStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewAttribute {
    pub name: String,
    pub label: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, rename = "type")]
    pub attribute_type: AttributeType,
}
