use std::collections::{BTreeMap, BTreeSet};

use chrono::{NaiveDate, Utc};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::CatalogConfig;
use crate::domain::{
    AssemblyAccession, DatasetId, DatasetStatus, GenomeId, ReleaseId, ReleaseStatus, ReleaseType,
    ReleaseVersion,
};
use crate::error::CatalogError;
use crate::lifecycle;
use crate::lineage::{self, DependencyGraph};
use crate::model::{
    Assembly, AssemblySequence, Attribute, Dataset, DatasetAttribute, DatasetType, Genome, GenomeDataset,
    NewAssembly, NewAssemblySequence, NewAttribute, NewDataset, NewGenome, NewOrganism,
    NewRelease, NewSite, Organism, Release, Site, StatusChange,
};
use crate::release;
use crate::store::{self, Store};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceRef {
    #[serde(rename = "type")]
    pub source_type: String,
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatasetRequest {
    pub genome_uuid: Uuid,
    pub dataset_type: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub label: Option<String>,
    pub source: SourceRef,
    #[serde(default)]
    pub parent: Option<Uuid>,
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReleaseFilter {
    #[serde(default)]
    pub site_names: Vec<String>,
    #[serde(default)]
    pub labels: Vec<String>,
    #[serde(default)]
    pub current_only: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct GenomeRecord {
    #[serde(flatten)]
    pub genome: Genome,
    pub organism: Organism,
    pub assembly: Assembly,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReleaseSummary {
    pub version: ReleaseVersion,
    pub site_name: String,
    pub release_date: Option<NaiveDate>,
    pub release_type: ReleaseType,
    pub is_current: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct DatasetSummary {
    pub dataset_uuid: Uuid,
    pub name: String,
    pub dataset_type: String,
    pub status: DatasetStatus,
    pub version: Option<String>,
    pub is_current: bool,
    pub release: Option<ReleaseSummary>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DatasetInformation {
    #[serde(flatten)]
    pub summary: DatasetSummary,
    pub label: String,
    pub source: SourceRef,
    pub attributes: Vec<DatasetAttribute>,
}

#[derive(Debug, Clone, Serialize)]
pub struct OrganismCount {
    pub organism_uuid: Uuid,
    pub common_name: String,
    pub scientific_name: Option<String>,
    pub production_name: String,
    pub genome_count: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct Eligibility {
    pub dataset_type: String,
    pub eligible: bool,
    pub blocking: Vec<String>,
}

pub struct Catalog {
    store: Store,
    config: CatalogConfig,
}

impl Catalog {
    pub fn open(config: CatalogConfig) -> Result<Self, CatalogError> {
        let store = Store::open(&config)?;
        Ok(Self { store, config })
    }

    pub fn in_memory(config: CatalogConfig) -> Result<Self, CatalogError> {
        let store = Store::open_in_memory(&config)?;
        Ok(Self { store, config })
    }

    pub fn config(&self) -> &CatalogConfig {
        &self.config
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut Store {
        &mut self.store
    }

    fn conn(&self) -> &Connection {
        self.store.conn()
    }

    // -- registration ------------------------------------------------------

    pub fn register_site(&mut self, site: &NewSite) -> Result<Site, CatalogError> {
        self.store.write("register site", |tx| store::insert_site(tx, site))
    }

    pub fn register_release(
        &mut self,
        site_name: &str,
        version: ReleaseVersion,
        label: Option<&str>,
        release_type: ReleaseType,
        release_date: Option<NaiveDate>,
    ) -> Result<Release, CatalogError> {
        self.store.write("register release", |tx| {
            register_release(tx, site_name, version, label, release_type, release_date)
        })
    }

    pub fn register_organism(&mut self, organism: &NewOrganism) -> Result<Organism, CatalogError> {
        self.store
            .write("register organism", |tx| store::insert_organism(tx, organism))
    }

    pub fn register_assembly(
        &mut self,
        assembly: &NewAssembly,
        sequences: &[NewAssemblySequence],
    ) -> Result<Assembly, CatalogError> {
        self.store.write("register assembly", |tx| {
            register_assembly(tx, assembly, sequences)
        })
    }

    pub fn register_genome(
        &mut self,
        accession: &AssemblyAccession,
        organism: &str,
        production_name: &str,
        is_best: bool,
    ) -> Result<Genome, CatalogError> {
        self.store.write("register genome", |tx| {
            register_genome(tx, accession, organism, production_name, is_best)
        })
    }

    pub fn register_dataset_type(
        &mut self,
        name: &str,
        label: &str,
        topic: &str,
        parent: Option<&str>,
        depends_on: &[String],
    ) -> Result<DatasetType, CatalogError> {
        self.store.write("register dataset type", |tx| {
            lineage::register_dataset_type(tx, name, label, topic, None, parent, depends_on)
        })
    }

    pub fn register_attribute(
        &mut self,
        attribute: &NewAttribute,
    ) -> Result<Attribute, CatalogError> {
        self.store
            .write("register attribute", |tx| store::insert_attribute(tx, attribute))
    }

    // -- dataset write path ------------------------------------------------

    pub fn create_dataset(&mut self, request: &DatasetRequest) -> Result<Dataset, CatalogError> {
        self.store
            .write("create dataset", |tx| create_dataset(tx, request))
    }

    pub fn create_child_datasets(&mut self, dataset_uuid: &Uuid) -> Result<Vec<Dataset>, CatalogError> {
        self.store.write("create child datasets", |tx| {
            let graph = DependencyGraph::load(tx)?;
            let parent = store::dataset_by_uuid(tx, dataset_uuid)?;
            create_child_datasets(tx, &graph, &parent)
        })
    }

    pub fn set_dataset_attributes(
        &mut self,
        dataset_uuid: &Uuid,
        attributes: &BTreeMap<String, String>,
    ) -> Result<Vec<DatasetAttribute>, CatalogError> {
        self.store.write("set dataset attributes", |tx| {
            let dataset = store::dataset_by_uuid(tx, dataset_uuid)?;
            set_attributes(tx, dataset.id, attributes)?;
            store::dataset_attributes(tx, dataset.id)
        })
    }

    pub fn transition_dataset(
        &mut self,
        dataset_uuid: &Uuid,
        status: DatasetStatus,
    ) -> Result<Dataset, CatalogError> {
        self.store.write("transition dataset", |tx| {
            let graph = DependencyGraph::load(tx)?;
            let dataset = store::dataset_by_uuid(tx, dataset_uuid)?;
            lifecycle::transition(tx, &graph, dataset.id, status)
        })
    }

    pub fn attach_dataset(
        &mut self,
        genome_uuid: &Uuid,
        dataset_uuid: &Uuid,
        release_id: Option<ReleaseId>,
    ) -> Result<GenomeDataset, CatalogError> {
        self.store.write("attach dataset", |tx| {
            let genome = store::genome_by_uuid(tx, genome_uuid)?;
            let dataset = store::dataset_by_uuid(tx, dataset_uuid)?;
            release::attach(tx, genome.id, dataset.id, release_id)
        })
    }

    // -- release write path ------------------------------------------------

    pub fn prepare_release(&mut self, release_id: ReleaseId) -> Result<Vec<Uuid>, CatalogError> {
        self.store
            .write("prepare release", |tx| release::prepare_release(tx, release_id))
    }

    pub fn mark_prepared(&mut self, release_id: ReleaseId) -> Result<Release, CatalogError> {
        self.store
            .write("mark release prepared", |tx| release::mark_prepared(tx, release_id))
    }

    pub fn publish_release(
        &mut self,
        release_id: ReleaseId,
        date: Option<NaiveDate>,
    ) -> Result<Release, CatalogError> {
        let date = date.unwrap_or_else(|| Utc::now().date_naive());
        self.store.write("publish release", |tx| {
            let graph = DependencyGraph::load(tx)?;
            release::publish_release(tx, &graph, release_id, date)
        })
    }

    pub fn promote_release(&mut self, release_id: ReleaseId) -> Result<Release, CatalogError> {
        self.store
            .write("promote release", |tx| release::promote_release(tx, release_id))
    }

    // -- reads -------------------------------------------------------------

    pub fn genome(&self, genome_uuid: &Uuid) -> Result<GenomeRecord, CatalogError> {
        let genome = store::genome_by_uuid(self.conn(), genome_uuid)?;
        self.genome_record(genome)
    }

    pub fn genomes_by_assembly_accession(
        &self,
        accession: &str,
    ) -> Result<Vec<GenomeRecord>, CatalogError> {
        let accession: AssemblyAccession = accession.parse()?;
        let genomes = store::genomes_by_assembly_accession(self.conn(), &accession)?;
        self.non_empty("genome", accession.as_str(), genomes)
    }

    pub fn genomes_by_production_name(
        &self,
        production_name: &str,
    ) -> Result<Vec<GenomeRecord>, CatalogError> {
        let genomes = store::genomes_by_production_name(self.conn(), production_name)?;
        self.non_empty("genome", production_name, genomes)
    }

    pub fn genomes_by_taxonomy_id(&self, taxonomy_id: i64) -> Result<Vec<GenomeRecord>, CatalogError> {
        let genomes = store::genomes_by_taxonomy_id(self.conn(), taxonomy_id)?;
        self.non_empty("genome", taxonomy_id, genomes)
    }

    pub fn genomes_by_keyword(&self, keyword: &str) -> Result<Vec<GenomeRecord>, CatalogError> {
        store::genomes_by_keyword(self.conn(), keyword)?
            .into_iter()
            .map(|genome| self.genome_record(genome))
            .collect()
    }

    pub fn genomes_by_status_and_type(
        &self,
        status: DatasetStatus,
        dataset_type: &str,
    ) -> Result<Vec<(Uuid, Uuid)>, CatalogError> {
        let dataset_type = store::dataset_type_by_name(self.conn(), dataset_type)?;
        Ok(
            store::genomes_by_status_and_type(self.conn(), status, dataset_type.id)?
                .into_iter()
                .map(|(genome, dataset_uuid)| (genome.genome_uuid, dataset_uuid))
                .collect(),
        )
    }

    pub fn assembly_sequences(
        &self,
        genome_uuid: &Uuid,
        chromosomal_only: bool,
    ) -> Result<Vec<AssemblySequence>, CatalogError> {
        let genome = store::genome_by_uuid(self.conn(), genome_uuid)?;
        store::assembly_sequences(self.conn(), genome.assembly_id, chromosomal_only)
    }

    pub fn dataset(&self, dataset_uuid: &Uuid) -> Result<Dataset, CatalogError> {
        store::dataset_by_uuid(self.conn(), dataset_uuid)
    }

    pub fn status_history(&self, dataset_uuid: &Uuid) -> Result<Vec<StatusChange>, CatalogError> {
        let dataset = store::dataset_by_uuid(self.conn(), dataset_uuid)?;
        store::status_history(self.conn(), dataset.id)
    }

    pub fn current_datasets(&self, genome_uuid: &Uuid) -> Result<Vec<Dataset>, CatalogError> {
        let genome = store::genome_by_uuid(self.conn(), genome_uuid)?;
        release::current_datasets(self.conn(), genome.id)
    }

    pub fn datasets_for_genome(&self, genome_uuid: &Uuid) -> Result<Vec<DatasetSummary>, CatalogError> {
        let genome = store::genome_by_uuid(self.conn(), genome_uuid)?;
        let mut summaries = Vec::new();
        for (link, release) in self.visible_links(genome.id)? {
            let dataset = store::dataset_by_id(self.conn(), link.dataset_id)?;
            if dataset.parent_id.is_some() {
                continue;
            }
            summaries.push(self.summarize(&dataset, &link, release.as_ref())?);
        }
        Ok(summaries)
    }

    pub fn dataset_information(
        &self,
        genome_uuid: &Uuid,
        dataset_type: &str,
        release_version: Option<ReleaseVersion>,
    ) -> Result<Vec<DatasetInformation>, CatalogError> {
        let genome = store::genome_by_uuid(self.conn(), genome_uuid)?;
        let dataset_type = store::dataset_type_by_name(self.conn(), dataset_type)?;
        let mut information = Vec::new();
        for (link, release) in self.visible_links(genome.id)? {
            if let Some(version) = release_version {
                if release.as_ref().map(|r| r.version) != Some(version) {
                    continue;
                }
            }
            let dataset = store::dataset_by_id(self.conn(), link.dataset_id)?;
            if dataset.dataset_type_id != dataset_type.id {
                continue;
            }
            let source = store::dataset_source_by_id(self.conn(), dataset.dataset_source_id)?;
            information.push(DatasetInformation {
                summary: self.summarize(&dataset, &link, release.as_ref())?,
                label: dataset.label.clone(),
                source: SourceRef {
                    source_type: source.source_type,
                    name: source.name,
                },
                attributes: store::dataset_attributes(self.conn(), dataset.id)?,
            });
        }
        Ok(information)
    }

    pub fn release_versions(
        &self,
        genome_uuid: &Uuid,
        dataset_type: &str,
        version: ReleaseVersion,
    ) -> Result<Vec<ReleaseVersion>, CatalogError> {
        let genome = store::genome_by_uuid(self.conn(), genome_uuid)?;
        let dataset_type = store::dataset_type_by_name(self.conn(), dataset_type)?;
        let mut versions = BTreeSet::new();
        for (link, release) in self.visible_links(genome.id)? {
            let Some(release) = release else { continue };
            if release.version > version {
                continue;
            }
            let dataset = store::dataset_by_id(self.conn(), link.dataset_id)?;
            if dataset.dataset_type_id == dataset_type.id {
                versions.insert(release.version);
            }
        }
        Ok(versions.into_iter().rev().collect())
    }

    pub fn releases(&self, filter: &ReleaseFilter) -> Result<Vec<Release>, CatalogError> {
        let sites: Vec<&str> = if filter.site_names.is_empty() {
            self.config.site.iter().map(String::as_str).collect()
        } else {
            filter.site_names.iter().map(String::as_str).collect()
        };
        Ok(store::releases(self.conn())?
            .into_iter()
            .filter(|r| sites.is_empty() || sites.contains(&r.site_name.as_str()))
            .filter(|r| {
                filter.labels.is_empty()
                    || r.label.as_ref().is_some_and(|label| filter.labels.contains(label))
            })
            .filter(|r| !filter.current_only || r.is_current)
            .filter(|r| self.config.allow_unreleased || r.status == ReleaseStatus::Released)
            .collect())
    }

    pub fn releases_for_genome(&self, genome_uuid: &Uuid) -> Result<Vec<Release>, CatalogError> {
        let genome = store::genome_by_uuid(self.conn(), genome_uuid)?;
        let mut releases = store::genome_releases_for_genome(self.conn(), genome.id)?
            .into_iter()
            .map(|link| store::release_by_id(self.conn(), link.release_id))
            .collect::<Result<Vec<_>, _>>()?;
        releases.retain(|r| self.release_visible(r));
        releases.sort_by_key(|r| r.version);
        Ok(releases)
    }

    pub fn releases_for_dataset(&self, dataset_uuid: &Uuid) -> Result<Vec<Release>, CatalogError> {
        let dataset = store::dataset_by_uuid(self.conn(), dataset_uuid)?;
        let ids: BTreeSet<ReleaseId> = store::genome_datasets_for_dataset(self.conn(), dataset.id)?
            .into_iter()
            .filter_map(|link| link.release_id)
            .collect();
        let mut releases = ids
            .into_iter()
            .map(|id| store::release_by_id(self.conn(), id))
            .collect::<Result<Vec<_>, _>>()?;
        releases.retain(|r| self.release_visible(r));
        releases.sort_by_key(|r| r.version);
        Ok(releases)
    }

    pub fn organism_group_counts(&self, group: &str) -> Result<Vec<OrganismCount>, CatalogError> {
        let group = store::organism_group_by_key(self.conn(), group)?;
        Ok(store::organism_group_counts(self.conn(), group.id)?
            .into_iter()
            .map(|(organism, genome_count)| OrganismCount {
                organism_uuid: organism.organism_uuid,
                common_name: organism.common_name,
                scientific_name: organism.scientific_name,
                production_name: organism.production_name,
                genome_count,
            })
            .collect())
    }

    pub fn eligibility_report(&self, genome_uuid: &Uuid) -> Result<Vec<Eligibility>, CatalogError> {
        let genome = store::genome_by_uuid(self.conn(), genome_uuid)?;
        let graph = DependencyGraph::load(self.conn())?;
        let datasets = store::datasets_for_genome(self.conn(), genome.id, None)?;
        graph
            .types()
            .map(|dataset_type| {
                let blocking = graph.blocking_among(dataset_type.id, &datasets)?;
                Ok(Eligibility {
                    dataset_type: dataset_type.name.clone(),
                    eligible: blocking.is_empty(),
                    blocking: graph.names(blocking),
                })
            })
            .collect()
    }

    fn release_visible(&self, release: &Release) -> bool {
        (self.config.allow_unreleased || release.status == ReleaseStatus::Released)
            && self
                .config
                .site
                .as_ref()
                .is_none_or(|site| *site == release.site_name)
    }

    fn visible_links(
        &self,
        genome_id: GenomeId,
    ) -> Result<Vec<(GenomeDataset, Option<Release>)>, CatalogError> {
        let mut visible = Vec::new();
        for link in store::genome_datasets_for_genome(self.conn(), genome_id)? {
            let release = link
                .release_id
                .map(|id| store::release_by_id(self.conn(), id))
                .transpose()?;
            let shown = match &release {
                Some(release) => self.release_visible(release),
                None => self.config.allow_unreleased,
            };
            if shown {
                visible.push((link, release));
            }
        }
        Ok(visible)
    }

    fn summarize(
        &self,
        dataset: &Dataset,
        link: &GenomeDataset,
        release: Option<&Release>,
    ) -> Result<DatasetSummary, CatalogError> {
        let dataset_type = store::dataset_type_by_id(self.conn(), dataset.dataset_type_id)?;
        Ok(DatasetSummary {
            dataset_uuid: dataset.dataset_uuid,
            name: dataset.name.clone(),
            dataset_type: dataset_type.name,
            status: dataset.status,
            version: dataset.version.clone(),
            is_current: link.is_current,
            release: release.map(|r| ReleaseSummary {
                version: r.version,
                site_name: r.site_name.clone(),
                release_date: r.release_date,
                release_type: r.release_type,
                is_current: r.is_current,
            }),
        })
    }

    fn genome_record(&self, genome: Genome) -> Result<GenomeRecord, CatalogError> {
        let organism = store::organism_by_id(self.conn(), genome.organism_id)?;
        let assembly = store::assembly_by_id(self.conn(), genome.assembly_id)?;
        Ok(GenomeRecord {
            genome,
            organism,
            assembly,
        })
    }

    fn non_empty(
        &self,
        entity: &'static str,
        key: impl ToString,
        genomes: Vec<Genome>,
    ) -> Result<Vec<GenomeRecord>, CatalogError> {
        if genomes.is_empty() {
            return Err(CatalogError::not_found(entity, key));
        }
        genomes
            .into_iter()
            .map(|genome| self.genome_record(genome))
            .collect()
    }
}

pub(crate) fn register_release(
    conn: &Connection,
    site_name: &str,
    version: ReleaseVersion,
    label: Option<&str>,
    release_type: ReleaseType,
    release_date: Option<NaiveDate>,
) -> Result<Release, CatalogError> {
    let site = store::site_by_name(conn, site_name)?;
    let release = store::insert_release(
        conn,
        &NewRelease {
            version,
            site_id: site.id,
            label: label.map(str::to_string),
            release_type,
            release_date,
        },
    )?;
    tracing::info!(release = %release::release_key(&release), "registered release");
    Ok(release)
}

pub(crate) fn register_assembly(
    conn: &Connection,
    assembly: &NewAssembly,
    sequences: &[NewAssemblySequence],
) -> Result<Assembly, CatalogError> {
    let created = store::insert_assembly(conn, assembly)?;
    for sequence in sequences {
        store::insert_assembly_sequence(conn, created.id, sequence)?;
    }
    tracing::info!(
        accession = %created.accession,
        sequences = sequences.len(),
        "registered assembly"
    );
    Ok(created)
}

pub(crate) fn register_genome(
    conn: &Connection,
    accession: &AssemblyAccession,
    organism: &str,
    production_name: &str,
    is_best: bool,
) -> Result<Genome, CatalogError> {
    let assembly = store::assembly_by_accession(conn, accession)?;
    let organism = store::organism_by_production_name(conn, organism)?;
    let genome = store::insert_genome(
        conn,
        &NewGenome {
            assembly_id: assembly.id,
            organism_id: organism.id,
            production_name: production_name.to_string(),
            is_best,
        },
    )?;
    tracing::info!(genome = %genome.genome_uuid, %accession, "registered genome");
    Ok(genome)
}

fn create_dataset(conn: &Connection, request: &DatasetRequest) -> Result<Dataset, CatalogError> {
    let genome = store::genome_by_uuid(conn, &request.genome_uuid)?;
    let graph = DependencyGraph::load(conn)?;
    let dataset_type = graph.by_name(&request.dataset_type)?;
    let source = store::ensure_dataset_source(conn, &request.source.source_type, &request.source.name)?;
    let parent_id = request
        .parent
        .map(|uuid| store::dataset_by_uuid(conn, &uuid).map(|parent| parent.id))
        .transpose()?;

    let dataset = store::insert_dataset(
        conn,
        &NewDataset {
            name: request.name.clone().unwrap_or_else(|| dataset_type.name.clone()),
            version: request.version.clone(),
            label: request.label.clone().unwrap_or_else(|| dataset_type.label.clone()),
            dataset_type_id: dataset_type.id,
            dataset_source_id: source.id,
            parent_id,
            status: DatasetStatus::Submitted,
        },
    )?;
    store::insert_genome_dataset(conn, genome.id, dataset.id, None, false)?;
    let eligible = graph.is_eligible(conn, genome.id, dataset_type.id)?;
    store::set_dataset_eligible(conn, dataset.id, eligible)?;
    set_attributes(conn, dataset.id, &request.attributes)?;

    tracing::info!(
        dataset = %dataset.dataset_uuid,
        genome = %genome.genome_uuid,
        dataset_type = %dataset_type.name,
        eligible,
        "created dataset"
    );
    store::dataset_by_id(conn, dataset.id)
}

pub fn create_child_datasets(
    conn: &Connection,
    graph: &DependencyGraph,
    parent: &Dataset,
) -> Result<Vec<Dataset>, CatalogError> {
    let links = store::genome_datasets_for_dataset(conn, parent.id)?;
    let child_types: Vec<&DatasetType> = graph
        .types()
        .filter(|t| t.parent_id == Some(parent.dataset_type_id))
        .collect();

    let mut created = Vec::new();
    for child_type in child_types {
        let mut in_flight = false;
        for link in &links {
            in_flight |= store::datasets_for_genome(conn, link.genome_id, Some(child_type.id))?
                .iter()
                .any(|d| d.status.is_in_flight());
        }
        if in_flight {
            tracing::debug!(
                parent = %parent.dataset_uuid,
                dataset_type = %child_type.name,
                "child dataset already in flight"
            );
            continue;
        }

        let child = store::insert_dataset(
            conn,
            &NewDataset {
                name: child_type.name.clone(),
                version: parent.version.clone(),
                label: format!("Child of {}", parent.name),
                dataset_type_id: child_type.id,
                dataset_source_id: parent.dataset_source_id,
                parent_id: Some(parent.id),
                status: parent.status,
            },
        )?;
        let mut eligible = true;
        for link in &links {
            store::insert_genome_dataset(conn, link.genome_id, child.id, None, false)?;
            eligible &= graph.is_eligible(conn, link.genome_id, child_type.id)?;
        }
        store::set_dataset_eligible(conn, child.id, eligible)?;
        tracing::info!(
            parent = %parent.dataset_uuid,
            dataset = %child.dataset_uuid,
            dataset_type = %child_type.name,
            "created child dataset"
        );

        let child = store::dataset_by_id(conn, child.id)?;
        let grandchildren = create_child_datasets(conn, graph, &child)?;
        created.push(child);
        created.extend(grandchildren);
    }
    Ok(created)
}

fn set_attributes(
    conn: &Connection,
    dataset_id: DatasetId,
    attributes: &BTreeMap<String, String>,
) -> Result<(), CatalogError> {
    for (name, value) in attributes {
        let attribute = store::attribute_by_name(conn, name)?;
        store::insert_dataset_attribute(conn, dataset_id, attribute.id, value)?;
    }
    Ok(())
}
