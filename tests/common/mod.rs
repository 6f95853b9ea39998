#![allow(dead_code)]

use kira_genome_catalog::catalog::{Catalog, DatasetRequest, ReleaseFilter, SourceRef};
use kira_genome_catalog::config::CatalogConfig;
use kira_genome_catalog::domain::DatasetStatus;
use kira_genome_catalog::model::{Dataset, Release};
use kira_genome_catalog::seed::SeedDocument;
use uuid::Uuid;

pub const SEED: &str = include_str!("../../demos/seed.json");

pub const HUMAN: &str = "homo_sapiens_gca000001405v29";
pub const MOUSE: &str = "mus_musculus_gca000001635v9";
pub const HUMAN_CORE: &str = "homo_sapiens_core_110_38";

pub fn config(allow_unreleased: bool) -> CatalogConfig {
    CatalogConfig {
        allow_unreleased,
        ..CatalogConfig::default()
    }
}

pub fn seeded(catalog: &mut Catalog) {
    let document = SeedDocument::from_json(SEED).unwrap();
    catalog.load_seed(&document).unwrap();
}

pub fn catalog() -> Catalog {
    let mut catalog = Catalog::in_memory(config(true)).unwrap();
    seeded(&mut catalog);
    catalog
}

pub fn genome(catalog: &Catalog, production_name: &str) -> Uuid {
    catalog.genomes_by_production_name(production_name).unwrap()[0]
        .genome
        .genome_uuid
}

pub fn request(genome: Uuid, dataset_type: &str, source: &str) -> DatasetRequest {
    DatasetRequest {
        genome_uuid: genome,
        dataset_type: dataset_type.to_string(),
        name: None,
        version: None,
        label: None,
        source: SourceRef {
            source_type: "core".to_string(),
            name: source.to_string(),
        },
        parent: None,
        attributes: Default::default(),
    }
}

pub fn dataset(catalog: &mut Catalog, genome: Uuid, dataset_type: &str) -> Dataset {
    catalog
        .create_dataset(&request(genome, dataset_type, HUMAN_CORE))
        .unwrap()
}

/// Walks the forward sequence up to `to`.
pub fn advance(catalog: &mut Catalog, dataset: &Dataset, to: DatasetStatus) -> Dataset {
    let path = [
        DatasetStatus::Processing,
        DatasetStatus::Processed,
        DatasetStatus::Released,
    ];
    let mut current = catalog.dataset(&dataset.dataset_uuid).unwrap();
    for step in path {
        if current.status == to {
            break;
        }
        current = catalog
            .transition_dataset(&dataset.dataset_uuid, step)
            .unwrap();
    }
    current
}

pub fn release(catalog: &Catalog, site: &str, version: &str) -> Release {
    let version = version.parse().unwrap();
    catalog
        .releases(&ReleaseFilter {
            site_names: vec![site.to_string()],
            ..ReleaseFilter::default()
        })
        .unwrap()
        .into_iter()
        .find(|r| r.version == version)
        .unwrap()
}

/// Planned -> Released in one go.
pub fn publish(catalog: &mut Catalog, release: &Release) -> Release {
    catalog.prepare_release(release.id).unwrap();
    catalog.mark_prepared(release.id).unwrap();
    catalog.publish_release(release.id, None).unwrap()
}
