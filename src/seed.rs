use std::fs;

use camino::Utf8Path;
use chrono::NaiveDate;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};

use crate::catalog::{self, Catalog};
use crate::domain::{AssemblyAccession, ReleaseType, ReleaseVersion};
use crate::error::CatalogError;
use crate::lineage;
use crate::model::{NewAssembly, NewAssemblySequence, NewAttribute, NewOrganism, NewSite};
use crate::store;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SeedDocument {
    #[serde(default)]
    pub sites: Vec<NewSite>,
    #[serde(default)]
    pub releases: Vec<SeedRelease>,
    #[serde(default)]
    pub organisms: Vec<NewOrganism>,
    #[serde(default)]
    pub assemblies: Vec<SeedAssembly>,
    #[serde(default)]
    pub genomes: Vec<SeedGenome>,
    #[serde(default)]
    pub dataset_types: Vec<SeedDatasetType>,
    #[serde(default)]
    pub dataset_sources: Vec<SeedSource>,
    #[serde(default)]
    pub attributes: Vec<NewAttribute>,
    #[serde(default)]
    pub organism_groups: Vec<SeedGroup>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SeedRelease {
    pub version: ReleaseVersion,
    pub site: String,
    #[serde(default)]
    pub label: Option<String>,
    pub release_type: ReleaseType,
    #[serde(default)]
    pub release_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SeedAssembly {
    #[serde(flatten)]
    pub assembly: NewAssembly,
    #[serde(default)]
    pub sequences: Vec<NewAssemblySequence>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SeedGenome {
    pub assembly: AssemblyAccession,
    pub organism: String,
    pub production_name: String,
    #[serde(default)]
    pub is_best: bool,
}

/// `depends_on` may be written as a list or as one delimited string.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum DependsOn {
    List(Vec<String>),
    Delimited(String),
}

impl Default for DependsOn {
    fn default() -> Self {
        DependsOn::List(Vec::new())
    }
}

impl DependsOn {
    pub fn names(&self) -> Vec<String> {
        match self {
            DependsOn::List(names) => names
                .iter()
                .map(|name| name.trim().to_string())
                .filter(|name| !name.is_empty())
                .collect(),
            DependsOn::Delimited(value) => lineage::parse_depends_on(value),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SeedDatasetType {
    pub name: String,
    pub label: String,
    pub topic: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub parent: Option<String>,
    #[serde(default)]
    pub depends_on: DependsOn,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SeedSource {
    #[serde(rename = "type")]
    pub source_type: String,
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SeedGroup {
    #[serde(rename = "type")]
    pub group_type: String,
    pub name: String,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub members: Vec<SeedGroupMember>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SeedGroupMember {
    pub organism: String,
    #[serde(default)]
    pub is_reference: bool,
    #[serde(default)]
    pub order: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SeedSummary {
    pub sites: usize,
    pub releases: usize,
    pub organisms: usize,
    pub assemblies: usize,
    pub genomes: usize,
    pub dataset_types: usize,
    pub dataset_sources: usize,
    pub attributes: usize,
    pub organism_groups: usize,
}

impl SeedDocument {
    pub fn from_path(path: &Utf8Path) -> Result<Self, CatalogError> {
        let content = fs::read_to_string(path)
            .map_err(|err| CatalogError::SeedParse(format!("{path}: {err}")))?;
        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> Result<Self, CatalogError> {
        serde_json::from_str(content).map_err(|err| CatalogError::SeedParse(err.to_string()))
    }
}

impl Catalog {
    pub fn load_seed(&mut self, document: &SeedDocument) -> Result<SeedSummary, CatalogError> {
        self.store_mut()
            .write("load seed", |tx| load(tx, document))
    }
}

pub fn load(conn: &Connection, document: &SeedDocument) -> Result<SeedSummary, CatalogError> {
    for site in &document.sites {
        store::insert_site(conn, site)?;
    }
    for release in &document.releases {
        catalog::register_release(
            conn,
            &release.site,
            release.version,
            release.label.as_deref(),
            release.release_type,
            release.release_date,
        )?;
    }
    for organism in &document.organisms {
        store::insert_organism(conn, organism)?;
    }
    for assembly in &document.assemblies {
        catalog::register_assembly(conn, &assembly.assembly, &assembly.sequences)?;
    }
    for genome in &document.genomes {
        catalog::register_genome(
            conn,
            &genome.assembly,
            &genome.organism,
            &genome.production_name,
            genome.is_best,
        )?;
    }
    for dataset_type in &document.dataset_types {
        lineage::register_dataset_type(
            conn,
            &dataset_type.name,
            &dataset_type.label,
            &dataset_type.topic,
            dataset_type.description.as_deref(),
            dataset_type.parent.as_deref(),
            &dataset_type.depends_on.names(),
        )?;
    }
    for source in &document.dataset_sources {
        store::ensure_dataset_source(conn, &source.source_type, &source.name)?;
    }
    for attribute in &document.attributes {
        store::insert_attribute(conn, attribute)?;
    }
    for group in &document.organism_groups {
        let created =
            store::ensure_organism_group(conn, &group.group_type, &group.name, group.code.as_deref())?;
        for member in &group.members {
            let organism = store::organism_by_production_name(conn, &member.organism)?;
            store::add_organism_group_member(
                conn,
                created.id,
                organism.id,
                member.is_reference,
                member.order,
            )?;
        }
    }

    let summary = SeedSummary {
        sites: document.sites.len(),
        releases: document.releases.len(),
        organisms: document.organisms.len(),
        assemblies: document.assemblies.len(),
        genomes: document.genomes.len(),
        dataset_types: document.dataset_types.len(),
        dataset_sources: document.dataset_sources.len(),
        attributes: document.attributes.len(),
        organism_groups: document.organism_groups.len(),
    };
    tracing::info!(?summary, "loaded seed document");
    Ok(summary)
}
