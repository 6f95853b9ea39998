mod common;

use std::thread;

use assert_matches::assert_matches;
use kira_genome_catalog::catalog::{Catalog, ReleaseFilter};
use kira_genome_catalog::config::{CatalogConfig, RetryPolicy};
use kira_genome_catalog::domain::{DatasetStatus, ReleaseStatus};
use kira_genome_catalog::error::CatalogError;
use kira_genome_catalog::store;
use tempfile::TempDir;

use common::{HUMAN, HUMAN_CORE, MOUSE, advance, catalog, dataset, genome, publish, release, request};

fn current_links(catalog: &Catalog, genome_uuid: &uuid::Uuid) -> usize {
    catalog
        .current_datasets(genome_uuid)
        .unwrap()
        .len()
}

#[test]
fn attach_moves_current_flag_within_lineage() {
    let mut catalog = catalog();
    let g = genome(&catalog, HUMAN);
    let d1 = dataset(&mut catalog, g, "genebuild");
    let d2 = dataset(&mut catalog, g, "genebuild");

    let first = catalog.attach_dataset(&g, &d1.dataset_uuid, None).unwrap();
    assert!(first.is_current);
    let second = catalog.attach_dataset(&g, &d2.dataset_uuid, None).unwrap();
    assert!(second.is_current);

    let current = catalog.current_datasets(&g).unwrap();
    assert_eq!(current.len(), 1);
    assert_eq!(current[0].dataset_uuid, d2.dataset_uuid);

    let links = store::genome_datasets_for_dataset(catalog.store().conn(), d1.id).unwrap();
    assert!(!links[0].is_current);
}

#[test]
fn attach_keeps_other_lineages_current() {
    let mut catalog = catalog();
    let g = genome(&catalog, HUMAN);
    let genebuild = dataset(&mut catalog, g, "genebuild");
    let assembly = dataset(&mut catalog, g, "assembly");
    let other_source = catalog
        .create_dataset(&request(g, "genebuild", "homo_sapiens_variation_110_38"))
        .unwrap();

    catalog.attach_dataset(&g, &genebuild.dataset_uuid, None).unwrap();
    catalog.attach_dataset(&g, &assembly.dataset_uuid, None).unwrap();
    // same type, different source: a separate lineage
    catalog.attach_dataset(&g, &other_source.dataset_uuid, None).unwrap();
    assert_eq!(current_links(&catalog, &g), 3);
}

#[test]
fn reattaching_is_stable() {
    let mut catalog = catalog();
    let g = genome(&catalog, HUMAN);
    let d1 = dataset(&mut catalog, g, "genebuild");
    let a = catalog.attach_dataset(&g, &d1.dataset_uuid, None).unwrap();
    let b = catalog.attach_dataset(&g, &d1.dataset_uuid, None).unwrap();
    assert_eq!(a.id, b.id);
    assert!(b.is_current);
    assert_eq!(current_links(&catalog, &g), 1);
}

#[test]
fn attach_rejects_release_on_another_site() {
    let mut catalog = catalog();
    let g = genome(&catalog, HUMAN);
    let d1 = dataset(&mut catalog, g, "genebuild");
    let d2 = dataset(&mut catalog, g, "assembly");
    let rapid = release(&catalog, "rapid", "110.1");
    let vertebrates = release(&catalog, "vertebrates", "111.0");

    catalog
        .attach_dataset(&g, &d1.dataset_uuid, Some(rapid.id))
        .unwrap();
    let err = catalog
        .attach_dataset(&g, &d2.dataset_uuid, Some(vertebrates.id))
        .unwrap_err();
    assert_matches!(err, CatalogError::SiteMismatch { genome_site, release_site, .. }
        if genome_site == "rapid" && release_site == "vertebrates");

    // nothing written for the rejected call
    let links = store::genome_datasets_for_dataset(catalog.store().conn(), d2.id).unwrap();
    assert_eq!(links[0].release_id, None);
    assert!(!links[0].is_current);
}

#[test]
fn promote_demotes_previous_current_release() {
    let mut catalog = catalog();
    let r1 = release(&catalog, "rapid", "110.1");
    let r2 = release(&catalog, "rapid", "110.2");
    publish(&mut catalog, &r1);
    publish(&mut catalog, &r2);

    let r1 = catalog.promote_release(r1.id).unwrap();
    assert!(r1.is_current);
    let r2 = catalog.promote_release(r2.id).unwrap();
    assert!(r2.is_current);

    let current: Vec<_> = catalog
        .releases(&ReleaseFilter {
            site_names: vec!["rapid".to_string()],
            current_only: true,
            ..Default::default()
        })
        .unwrap();
    assert_eq!(current.len(), 1);
    assert_eq!(current[0].id, r2.id);
}

#[test]
fn promote_twice_is_already_current() {
    let mut catalog = catalog();
    let r1 = release(&catalog, "rapid", "110.1");
    publish(&mut catalog, &r1);
    catalog.promote_release(r1.id).unwrap();
    let err = catalog.promote_release(r1.id).unwrap_err();
    assert_matches!(err, CatalogError::AlreadyCurrent(_));
}

#[test]
fn promote_requires_released_status() {
    let mut catalog = catalog();
    let r1 = release(&catalog, "rapid", "110.1");
    let err = catalog.promote_release(r1.id).unwrap_err();
    assert_matches!(err, CatalogError::ReleaseNotReady { .. });
}

#[test]
fn promotion_is_per_site() {
    let mut catalog = catalog();
    let rapid = release(&catalog, "rapid", "110.1");
    let vertebrates = release(&catalog, "vertebrates", "111.0");
    publish(&mut catalog, &rapid);
    publish(&mut catalog, &vertebrates);
    catalog.promote_release(rapid.id).unwrap();
    catalog.promote_release(vertebrates.id).unwrap();
    assert!(release(&catalog, "rapid", "110.1").is_current);
    assert!(release(&catalog, "vertebrates", "111.0").is_current);
}

#[test]
fn release_steps_in_order() {
    let mut catalog = catalog();
    let r1 = release(&catalog, "rapid", "110.1");
    let err = catalog.mark_prepared(r1.id).unwrap_err();
    assert_matches!(err, CatalogError::IllegalReleaseTransition { from, to, .. }
        if from == "Planned" && to == "Prepared");
    let err = catalog.publish_release(r1.id, None).unwrap_err();
    assert_matches!(err, CatalogError::IllegalReleaseTransition { .. });
}

#[test]
fn release_cycle_publishes_and_promotes_genome_datasets() {
    let mut catalog = catalog();
    let human = genome(&catalog, HUMAN);
    let mouse = genome(&catalog, MOUSE);
    let assembly = dataset(&mut catalog, human, "assembly");
    let genebuild = dataset(&mut catalog, human, "genebuild");
    advance(&mut catalog, &assembly, DatasetStatus::Processed);
    let children = catalog.create_child_datasets(&genebuild.dataset_uuid).unwrap();
    for child in &children {
        advance(&mut catalog, child, DatasetStatus::Processed);
    }
    advance(&mut catalog, &genebuild, DatasetStatus::Processed);
    // mouse has no genebuild and is not picked up
    let mouse_assembly = catalog
        .create_dataset(&request(mouse, "assembly", "mus_musculus_core_110_39"))
        .unwrap();
    advance(&mut catalog, &mouse_assembly, DatasetStatus::Processed);

    let r1 = release(&catalog, "rapid", "110.1");
    let prepared = catalog.prepare_release(r1.id).unwrap();
    assert_eq!(prepared, vec![human]);
    let r1 = catalog.mark_prepared(r1.id).unwrap();
    assert_eq!(r1.status, ReleaseStatus::Prepared);
    let r1 = catalog
        .publish_release(r1.id, Some("2023-06-15".parse().unwrap()))
        .unwrap();
    assert_eq!(r1.status, ReleaseStatus::Released);
    assert_eq!(r1.release_date, Some("2023-06-15".parse().unwrap()));

    for d in [&assembly, &genebuild].into_iter().chain(&children) {
        assert_eq!(
            catalog.dataset(&d.dataset_uuid).unwrap().status,
            DatasetStatus::Released
        );
    }
    assert_eq!(
        catalog.dataset(&mouse_assembly.dataset_uuid).unwrap().status,
        DatasetStatus::Processed
    );

    let history = catalog.status_history(&children[0].dataset_uuid).unwrap();
    assert_eq!(history.last().map(|c| c.to), Some(DatasetStatus::Released));

    catalog.promote_release(r1.id).unwrap();
    let current = catalog.current_datasets(&human).unwrap();
    assert_eq!(current.len(), 2);
    let releases = catalog.releases_for_genome(&human).unwrap();
    assert_eq!(releases.len(), 1);
    assert!(releases[0].is_current);
}

#[test]
fn publish_rejects_unfinished_datasets() {
    let mut catalog = catalog();
    let g = genome(&catalog, HUMAN);
    let d = dataset(&mut catalog, g, "assembly");
    let r1 = release(&catalog, "rapid", "110.1");
    catalog.prepare_release(r1.id).unwrap();
    catalog.attach_dataset(&g, &d.dataset_uuid, Some(r1.id)).unwrap();
    catalog.mark_prepared(r1.id).unwrap();

    let err = catalog.publish_release(r1.id, None).unwrap_err();
    assert_matches!(err, CatalogError::ReleaseNotReady { reasons, .. } if reasons.len() == 1);
    assert_eq!(release(&catalog, "rapid", "110.1").status, ReleaseStatus::Prepared);
}

#[test]
fn concurrent_attach_leaves_exactly_one_current() {
    let dir = TempDir::new().unwrap();
    let config = CatalogConfig {
        database_path: camino::Utf8PathBuf::from_path_buf(dir.path().join("catalog.sqlite")).unwrap(),
        allow_unreleased: true,
        busy_timeout_ms: 5_000,
        retry: RetryPolicy {
            max_attempts: 10,
            base_backoff_ms: 5,
        },
        ..CatalogConfig::default()
    };

    let mut setup = Catalog::open(config.clone()).unwrap();
    common::seeded(&mut setup);
    let g = genome(&setup, HUMAN);
    let datasets: Vec<_> = (0..6)
        .map(|_| {
            setup
                .create_dataset(&request(g, "genebuild", HUMAN_CORE))
                .unwrap()
        })
        .collect();

    let workers: Vec<_> = datasets
        .iter()
        .map(|d| {
            let mut catalog = Catalog::open(config.clone()).unwrap();
            let dataset_uuid = d.dataset_uuid;
            thread::spawn(move || {
                for _ in 0..5 {
                    catalog.attach_dataset(&g, &dataset_uuid, None)?;
                }
                Ok::<_, CatalogError>(())
            })
        })
        .collect();
    for worker in workers {
        worker.join().unwrap().unwrap();
    }

    assert_eq!(current_links(&setup, &g), 1);
}
