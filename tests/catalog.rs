mod common;

use std::collections::BTreeMap;

use assert_matches::assert_matches;
use kira_genome_catalog::catalog::{Catalog, ReleaseFilter};
use kira_genome_catalog::domain::{
    AssemblyAccession, AssemblyLevel, AttributeType, DatasetStatus, ReleaseType, ReleaseVersion,
};
use kira_genome_catalog::error::CatalogError;
use kira_genome_catalog::model::{NewAssembly, NewAttribute, NewOrganism, NewSite};
use kira_genome_catalog::seed::SeedDocument;
use uuid::Uuid;

use common::{HUMAN, MOUSE, advance, catalog, dataset, genome, publish, release, request};

#[test]
fn genome_lookups() {
    let catalog = catalog();
    let human = genome(&catalog, HUMAN);

    let record = catalog.genome(&human).unwrap();
    assert_eq!(record.organism.taxonomy_id, 9606);
    assert_eq!(record.assembly.accession.as_str(), "GCA_000001405.29");

    let by_accession = catalog
        .genomes_by_assembly_accession("gca_000001405.29")
        .unwrap();
    assert_eq!(by_accession[0].genome.genome_uuid, human);

    let by_taxon = catalog.genomes_by_taxonomy_id(10090).unwrap();
    assert_eq!(by_taxon.len(), 1);
    assert_eq!(by_taxon[0].genome.production_name, MOUSE);

    let by_keyword = catalog.genomes_by_keyword("c57bl").unwrap();
    assert_eq!(by_keyword.len(), 1);
    assert!(catalog.genomes_by_keyword("zebrafish").unwrap().is_empty());
}

#[test]
fn unknown_keys_are_not_found() {
    let catalog = catalog();
    assert_matches!(
        catalog.genome(&Uuid::new_v4()),
        Err(CatalogError::NotFound { entity: "genome", .. })
    );
    assert_matches!(
        catalog.genomes_by_assembly_accession("GCA_999999999.1"),
        Err(CatalogError::NotFound { .. })
    );
    assert_matches!(
        catalog.genomes_by_assembly_accession("not-an-accession"),
        Err(CatalogError::InvalidAccession(_))
    );
    assert_matches!(
        catalog.genomes_by_taxonomy_id(7955),
        Err(CatalogError::NotFound { .. })
    );
    assert_matches!(
        catalog.organism_group_counts("plants"),
        Err(CatalogError::NotFound { entity: "organism group", .. })
    );
}

#[test]
fn assembly_sequences_filter_chromosomal() {
    let catalog = catalog();
    let human = genome(&catalog, HUMAN);
    assert_eq!(catalog.assembly_sequences(&human, false).unwrap().len(), 3);
    let chromosomal = catalog.assembly_sequences(&human, true).unwrap();
    assert_eq!(chromosomal.len(), 2);
    assert!(chromosomal.iter().any(|s| s.is_circular));
}

#[test]
fn organism_group_counts_genomes() {
    let catalog = catalog();
    let counts = catalog.organism_group_counts("vertebrates").unwrap();
    assert_eq!(counts.len(), 2);
    assert_eq!(counts[0].production_name, "homo_sapiens");
    assert_eq!(counts[0].genome_count, 1);
}

#[test]
fn datasets_list_hides_children_and_carries_attributes() {
    let mut catalog = catalog();
    let human = genome(&catalog, HUMAN);
    let mut req = request(human, "genebuild", common::HUMAN_CORE);
    req.version = Some("2023_06".to_string());
    req.attributes = BTreeMap::from([(
        "genebuild.method".to_string(),
        "full_genebuild".to_string(),
    )]);
    let genebuild = catalog.create_dataset(&req).unwrap();
    catalog.create_child_datasets(&genebuild.dataset_uuid).unwrap();

    let listed = catalog.datasets_for_genome(&human).unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].dataset_type, "genebuild");
    assert_eq!(listed[0].version.as_deref(), Some("2023_06"));

    let info = catalog
        .dataset_information(&human, "genebuild", None)
        .unwrap();
    assert_eq!(info[0].attributes[0].value, "full_genebuild");
    assert_eq!(info[0].source.name, common::HUMAN_CORE);
}

#[test]
fn unknown_attribute_rejects_dataset() {
    let mut catalog = catalog();
    let human = genome(&catalog, HUMAN);
    let mut req = request(human, "genebuild", common::HUMAN_CORE);
    req.attributes = BTreeMap::from([("no.such".to_string(), "x".to_string())]);
    let err = catalog.create_dataset(&req).unwrap_err();
    assert_matches!(err, CatalogError::NotFound { entity: "attribute", .. });
    assert!(catalog.datasets_for_genome(&human).unwrap().is_empty());
}

fn released_catalog(allow_unreleased: bool) -> (Catalog, Uuid) {
    let mut catalog = Catalog::in_memory(common::config(allow_unreleased)).unwrap();
    common::seeded(&mut catalog);
    let human = genome(&catalog, HUMAN);
    let assembly = dataset(&mut catalog, human, "assembly");
    let genebuild = dataset(&mut catalog, human, "genebuild");
    advance(&mut catalog, &assembly, DatasetStatus::Processed);
    advance(&mut catalog, &genebuild, DatasetStatus::Processed);
    let r1 = release(&catalog, "rapid", "110.1");
    publish(&mut catalog, &r1);
    // registered after the release was cut
    dataset(&mut catalog, human, "variation");
    (catalog, human)
}

#[test]
fn unreleased_links_hidden_by_default() {
    let (strict, human) = released_catalog(false);
    let listed = strict.datasets_for_genome(&human).unwrap();
    assert_eq!(listed.len(), 2);
    assert!(listed.iter().all(|d| d.release.is_some()));

    let (open, human) = released_catalog(true);
    assert_eq!(open.datasets_for_genome(&human).unwrap().len(), 3);
}

#[test]
fn unreleased_releases_hidden_by_default() {
    let (strict, _) = released_catalog(false);
    let releases = strict.releases(&ReleaseFilter::default()).unwrap();
    assert_eq!(releases.len(), 1);
    assert_eq!(releases[0].version.to_string(), "110.1");
}

#[test]
fn release_versions_up_to_requested() {
    let (catalog, human) = released_catalog(true);
    let versions = catalog
        .release_versions(&human, "genebuild", "110.2".parse().unwrap())
        .unwrap();
    assert_eq!(versions, vec!["110.1".parse::<ReleaseVersion>().unwrap()]);
    let none = catalog
        .release_versions(&human, "genebuild", "110.0".parse().unwrap())
        .unwrap();
    assert!(none.is_empty());

    let info = catalog
        .dataset_information(&human, "genebuild", Some("110.1".parse().unwrap()))
        .unwrap();
    assert_eq!(info.len(), 1);
    assert_eq!(
        info[0].summary.release.as_ref().map(|r| r.site_name.as_str()),
        Some("rapid")
    );
}

#[test]
fn release_filter_by_label_and_site() {
    let catalog = catalog();
    let by_label = catalog
        .releases(&ReleaseFilter {
            labels: vec!["2023-09".to_string()],
            ..ReleaseFilter::default()
        })
        .unwrap();
    assert_eq!(by_label.len(), 1);
    assert_eq!(by_label[0].version.to_string(), "110.2");

    let rapid = catalog
        .releases(&ReleaseFilter {
            site_names: vec!["rapid".to_string()],
            ..ReleaseFilter::default()
        })
        .unwrap();
    assert_eq!(rapid.len(), 2);
    assert!(rapid[0].version < rapid[1].version);
}

#[test]
fn production_query_by_status_and_type() {
    let mut catalog = catalog();
    let human = genome(&catalog, HUMAN);
    let assembly = dataset(&mut catalog, human, "assembly");
    advance(&mut catalog, &assembly, DatasetStatus::Processing);
    let found = catalog
        .genomes_by_status_and_type(DatasetStatus::Processing, "assembly")
        .unwrap();
    assert_eq!(found, vec![(human, assembly.dataset_uuid)]);
    assert_matches!(
        catalog.genomes_by_status_and_type(DatasetStatus::Processing, "nope"),
        Err(CatalogError::NotFound { .. })
    );
}

#[test]
fn registering_type_with_unknown_dependency_fails() {
    let mut catalog = catalog();
    let err = catalog
        .register_dataset_type("regulation", "Regulation", "Regulation", None, &[
            "genebuild".to_string(),
            "epigenomes".to_string(),
        ])
        .unwrap_err();
    assert_matches!(err, CatalogError::UnknownDependency { dependency, .. } if dependency == "epigenomes");

    let created = catalog
        .register_dataset_type("regulation", "Regulation", "Regulation", None, &[
            "genebuild".to_string(),
        ])
        .unwrap();
    assert_eq!(created.depends_on.len(), 1);
}

#[test]
fn in_memory_catalog_uses_configured_busy_timeout() {
    let mut config = common::config(true);
    config.busy_timeout_ms = 1234;
    let catalog = Catalog::in_memory(config).unwrap();
    let timeout: i64 = catalog
        .store()
        .conn()
        .query_row("PRAGMA busy_timeout", [], |row| row.get(0))
        .unwrap();
    assert_eq!(timeout, 1234);
}

#[test]
fn seed_summary_and_duplicate_load() {
    let mut catalog = Catalog::in_memory(common::config(true)).unwrap();
    let document = SeedDocument::from_json(common::SEED).unwrap();
    let summary = catalog.load_seed(&document).unwrap();
    assert_eq!(summary.sites, 2);
    assert_eq!(summary.releases, 3);
    assert_eq!(summary.genomes, 2);
    assert_eq!(summary.dataset_types, 6);

    let err = catalog.load_seed(&document).unwrap_err();
    assert_matches!(err, CatalogError::IntegrityViolation { .. });
    // the failed load left nothing behind
    assert_eq!(catalog.genomes_by_production_name(HUMAN).unwrap().len(), 1);
}

#[test]
fn building_a_catalog_through_the_api() {
    let mut catalog = Catalog::in_memory(common::config(true)).unwrap();
    catalog
        .register_site(&NewSite {
            name: "plants".to_string(),
            label: "Ensembl Plants".to_string(),
            uri: String::new(),
        })
        .unwrap();
    catalog
        .register_release("plants", "58.0".parse().unwrap(), Some("Plants 58"), ReleaseType::Full, None)
        .unwrap();
    catalog
        .register_organism(&NewOrganism {
            taxonomy_id: 3702,
            species_taxonomy_id: Some(3702),
            common_name: "Thale cress".to_string(),
            scientific_name: Some("Arabidopsis thaliana".to_string()),
            strain: None,
            rank: None,
            production_name: "arabidopsis_thaliana".to_string(),
        })
        .unwrap();
    let accession: AssemblyAccession = "GCA_000001735.2".parse().unwrap();
    catalog
        .register_assembly(
            &NewAssembly {
                accession: accession.clone(),
                name: "TAIR10".to_string(),
                level: AssemblyLevel::Chromosome,
                is_reference: true,
            },
            &[],
        )
        .unwrap();
    let genome = catalog
        .register_genome(&accession, "arabidopsis_thaliana", "arabidopsis_thaliana_gca000001735v2", true)
        .unwrap();
    catalog
        .register_dataset_type("assembly", "Genomic assembly", "Core Annotation", None, &[])
        .unwrap();
    catalog
        .register_attribute(&NewAttribute {
            name: "assembly.contig_n50".to_string(),
            label: "Contig N50".to_string(),
            description: None,
            attribute_type: AttributeType::Bp,
        })
        .unwrap();

    let assembly = catalog
        .create_dataset(&request(genome.genome_uuid, "assembly", "arabidopsis_thaliana_core_58_1"))
        .unwrap();
    assert!(assembly.eligible);
    let attributes = catalog
        .set_dataset_attributes(
            &assembly.dataset_uuid,
            &BTreeMap::from([("assembly.contig_n50".to_string(), "11194537".to_string())]),
        )
        .unwrap();
    assert_eq!(attributes.len(), 1);
    assert_eq!(attributes[0].attribute_type, AttributeType::Bp);
    assert_eq!(catalog.genomes_by_taxonomy_id(3702).unwrap().len(), 1);
}
