use std::collections::BTreeSet;

use chrono::NaiveDate;
use rusqlite::Connection;
use uuid::Uuid;

use crate::domain::{
    DatasetId, DatasetStatus, GenomeId, ReleaseId, ReleaseStatus, SiteId,
};
use crate::error::CatalogError;
use crate::lifecycle;
use crate::lineage::DependencyGraph;
use crate::model::{Dataset, GenomeDataset, Release};
use crate::store;

pub const GENEBUILD_TYPE: &str = "genebuild";

pub fn publishing_site(conn: &Connection, genome_id: GenomeId) -> Result<Option<SiteId>, CatalogError> {
    let mut sites = BTreeSet::new();
    for link in store::genome_releases_for_genome(conn, genome_id)? {
        sites.insert(store::release_by_id(conn, link.release_id)?.site_id);
    }
    if sites.len() > 1 {
        tracing::warn!(genome = %genome_id, sites = sites.len(), "genome linked to several sites");
    }
    Ok(sites.into_iter().next())
}

fn check_site(
    conn: &Connection,
    genome_id: GenomeId,
    release: &Release,
) -> Result<(), CatalogError> {
    match publishing_site(conn, genome_id)? {
        Some(site) if site != release.site_id => {
            let genome = store::genome_by_id(conn, genome_id)?;
            let genome_site = store::site_by_id(conn, site)?;
            Err(CatalogError::SiteMismatch {
                genome: genome.genome_uuid.to_string(),
                genome_site: genome_site.name,
                release_site: release.site_name.clone(),
            })
        }
        _ => Ok(()),
    }
}

fn make_exclusive_current(conn: &Connection, link: &GenomeDataset) -> Result<usize, CatalogError> {
    let dataset = store::dataset_by_id(conn, link.dataset_id)?;
    let mut cleared = 0;
    for other in store::current_links_in_lineage(
        conn,
        link.genome_id,
        dataset.dataset_type_id,
        dataset.dataset_source_id,
    )? {
        if other.id != link.id {
            store::set_genome_dataset_current(conn, other.id, false)?;
            cleared += 1;
        }
    }
    store::set_genome_dataset_current(conn, link.id, true)?;
    Ok(cleared)
}

pub fn attach(
    conn: &Connection,
    genome_id: GenomeId,
    dataset_id: DatasetId,
    release_id: Option<ReleaseId>,
) -> Result<GenomeDataset, CatalogError> {
    let genome = store::genome_by_id(conn, genome_id)?;
    let dataset = store::dataset_by_id(conn, dataset_id)?;
    if let Some(release_id) = release_id {
        let release = store::release_by_id(conn, release_id)?;
        check_site(conn, genome_id, &release)?;
        store::ensure_genome_release(conn, genome_id, release_id)?;
    }

    let link_id = match store::genome_dataset(conn, genome_id, dataset_id)? {
        Some(existing) => {
            store::update_genome_dataset(
                conn,
                existing.id,
                release_id.or(existing.release_id),
                existing.is_current,
            )?;
            existing.id
        }
        None => store::insert_genome_dataset(conn, genome_id, dataset_id, release_id, false)?,
    };
    let link = store::genome_dataset_by_id(conn, link_id)?;
    let cleared = make_exclusive_current(conn, &link)?;

    tracing::info!(
        genome = %genome.genome_uuid,
        dataset = %dataset.dataset_uuid,
        release = ?release_id.map(|id| id.0),
        cleared,
        "attached dataset"
    );
    store::genome_dataset_by_id(conn, link_id)
}

pub fn current_datasets(conn: &Connection, genome_id: GenomeId) -> Result<Vec<Dataset>, CatalogError> {
    store::genome_datasets_for_genome(conn, genome_id)?
        .into_iter()
        .filter(|link| link.is_current)
        .map(|link| store::dataset_by_id(conn, link.dataset_id))
        .collect()
}

pub fn promote_release(conn: &Connection, release_id: ReleaseId) -> Result<Release, CatalogError> {
    let release = store::release_by_id(conn, release_id)?;
    let key = release_key(&release);
    if release.is_current {
        return Err(CatalogError::AlreadyCurrent(key));
    }
    if release.status != ReleaseStatus::Released {
        return Err(CatalogError::ReleaseNotReady {
            release: key,
            reasons: vec![format!("status is {}, expected Released", release.status)],
        });
    }

    for previous in store::current_releases_for_site(conn, release.site_id)? {
        store::set_release_current(conn, previous.id, false)?;
        tracing::debug!(release = %release_key(&previous), "demoted release");
    }
    store::set_release_current(conn, release.id, true)?;

    for link in store::genome_releases_for_release(conn, release.id)? {
        for other in store::genome_releases_for_genome(conn, link.genome_id)? {
            if other.id != link.id && other.is_current {
                store::set_genome_release_current(conn, other.id, false)?;
            }
        }
        store::set_genome_release_current(conn, link.id, true)?;
    }
    let mut links = 0;
    for link in store::genome_datasets_for_release(conn, release.id)? {
        make_exclusive_current(conn, &link)?;
        links += 1;
    }

    tracing::info!(release = %key, links, "promoted release");
    store::release_by_id(conn, release.id)
}

pub fn prepare_release(conn: &Connection, release_id: ReleaseId) -> Result<Vec<Uuid>, CatalogError> {
    let release = store::release_by_id(conn, release_id)?;
    advance(conn, &release, ReleaseStatus::Preparing)?;

    let mut genomes = BTreeSet::new();
    match store::dataset_type_by_name(conn, GENEBUILD_TYPE) {
        Ok(genebuild) => {
            for status in [DatasetStatus::Processed, DatasetStatus::Released] {
                for (genome, _) in store::genomes_by_status_and_type(conn, status, genebuild.id)? {
                    genomes.insert(genome.id);
                }
            }
        }
        Err(CatalogError::NotFound { .. }) => {
            tracing::warn!("no {GENEBUILD_TYPE} dataset type registered");
        }
        Err(err) => return Err(err),
    }

    let mut prepared = Vec::new();
    for genome_id in genomes {
        if let Some(site) = publishing_site(conn, genome_id)? {
            if site != release.site_id {
                continue;
            }
        }
        let mut attached = 0;
        for link in store::genome_datasets_for_genome(conn, genome_id)? {
            if link.release_id.is_some() {
                continue;
            }
            let dataset = store::dataset_by_id(conn, link.dataset_id)?;
            if dataset.parent_id.is_none() && dataset.status == DatasetStatus::Processed {
                store::update_genome_dataset(conn, link.id, Some(release.id), link.is_current)?;
                attached += 1;
            }
        }
        if attached > 0 {
            store::ensure_genome_release(conn, genome_id, release.id)?;
            prepared.push(store::genome_by_id(conn, genome_id)?.genome_uuid);
        }
    }
    tracing::info!(release = %release_key(&release), genomes = prepared.len(), "release preparing");
    Ok(prepared)
}

pub fn mark_prepared(conn: &Connection, release_id: ReleaseId) -> Result<Release, CatalogError> {
    let release = store::release_by_id(conn, release_id)?;
    check_step(&release, ReleaseStatus::Prepared)?;

    let genomes: BTreeSet<GenomeId> = store::genome_releases_for_release(conn, release.id)?
        .into_iter()
        .map(|link| link.genome_id)
        .collect();
    let mut reasons = Vec::new();
    for link in store::genome_datasets_for_release(conn, release.id)? {
        if !genomes.contains(&link.genome_id) {
            let genome = store::genome_by_id(conn, link.genome_id)?;
            reasons.push(format!("genome {} is not attached to the release", genome.genome_uuid));
        }
    }
    if !reasons.is_empty() {
        reasons.dedup();
        return Err(CatalogError::ReleaseNotReady {
            release: release_key(&release),
            reasons,
        });
    }
    advance(conn, &release, ReleaseStatus::Prepared)?;
    store::release_by_id(conn, release.id)
}

pub fn publish_release(
    conn: &Connection,
    graph: &DependencyGraph,
    release_id: ReleaseId,
    date: NaiveDate,
) -> Result<Release, CatalogError> {
    let release = store::release_by_id(conn, release_id)?;
    check_step(&release, ReleaseStatus::Released)?;

    let dataset_ids: BTreeSet<DatasetId> = store::genome_datasets_for_release(conn, release.id)?
        .into_iter()
        .map(|link| link.dataset_id)
        .collect();
    let mut datasets = Vec::with_capacity(dataset_ids.len());
    let mut reasons = Vec::new();
    for id in dataset_ids {
        let dataset = store::dataset_by_id(conn, id)?;
        if !dataset.status.satisfies_dependency() {
            reasons.push(format!("dataset {} is {}", dataset.dataset_uuid, dataset.status));
        }
        datasets.push(dataset);
    }
    if !reasons.is_empty() {
        return Err(CatalogError::ReleaseNotReady {
            release: release_key(&release),
            reasons,
        });
    }

    for dataset in datasets {
        if dataset.status == DatasetStatus::Processed {
            lifecycle::transition(conn, graph, dataset.id, DatasetStatus::Released)?;
        }
    }
    store::update_release_status(conn, release.id, ReleaseStatus::Released, Some(date))?;
    tracing::info!(release = %release_key(&release), %date, "release published");
    store::release_by_id(conn, release.id)
}

fn check_step(release: &Release, to: ReleaseStatus) -> Result<(), CatalogError> {
    if release.status.next() == Some(to) {
        Ok(())
    } else {
        Err(CatalogError::IllegalReleaseTransition {
            release: release_key(release),
            from: release.status.to_string(),
            to: to.to_string(),
        })
    }
}

fn advance(conn: &Connection, release: &Release, to: ReleaseStatus) -> Result<(), CatalogError> {
    check_step(release, to)?;
    store::update_release_status(conn, release.id, to, None)?;
    tracing::info!(release = %release_key(release), from = %release.status, to = %to, "release status changed");
    Ok(())
}

pub fn release_key(release: &Release) -> String {
    format!("{}/{}", release.version, release.site_name)
}
