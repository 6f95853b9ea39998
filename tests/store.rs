use assert_matches::assert_matches;
use camino::Utf8PathBuf;
use rusqlite::{Connection, TransactionBehavior};
use tempfile::TempDir;

use kira_genome_catalog::config::{CatalogConfig, RetryPolicy};
use kira_genome_catalog::error::CatalogError;
use kira_genome_catalog::model::NewSite;
use kira_genome_catalog::store::{self, Store};

fn file_config(dir: &TempDir) -> CatalogConfig {
    CatalogConfig {
        database_path: Utf8PathBuf::from_path_buf(dir.path().join("nested").join("catalog.sqlite"))
            .unwrap(),
        busy_timeout_ms: 0,
        retry: RetryPolicy {
            max_attempts: 2,
            base_backoff_ms: 1,
        },
        ..CatalogConfig::default()
    }
}

fn rapid() -> NewSite {
    NewSite {
        name: "rapid".to_string(),
        label: "Rapid Release".to_string(),
        uri: "https://rapid.ensembl.org".to_string(),
    }
}

#[test]
fn reopening_keeps_data() {
    let dir = TempDir::new().unwrap();
    let config = file_config(&dir);
    {
        let mut store = Store::open(&config).unwrap();
        store
            .write("register site", |tx| store::insert_site(tx, &rapid()))
            .unwrap();
    }
    let store = Store::open(&config).unwrap();
    let site = store::site_by_name(store.conn(), "rapid").unwrap();
    assert_eq!(site.label, "Rapid Release");
}

#[test]
fn held_lock_exhausts_retries() {
    let dir = TempDir::new().unwrap();
    let config = file_config(&dir);
    let mut store = Store::open(&config).unwrap();

    let mut other = Connection::open(config.database_path.as_std_path()).unwrap();
    let holder = other
        .transaction_with_behavior(TransactionBehavior::Immediate)
        .unwrap();

    let err = store
        .write("register site", |tx| store::insert_site(tx, &rapid()))
        .unwrap_err();
    assert_matches!(err, CatalogError::ConcurrentUpdate { attempts: 2, .. });

    holder.rollback().unwrap();
    store
        .write("register site", |tx| store::insert_site(tx, &rapid()))
        .unwrap();
}

#[test]
fn failed_body_rolls_back() {
    let mut store = Store::open_in_memory(&CatalogConfig::default()).unwrap();
    let err = store
        .write("register sites", |tx| {
            store::insert_site(tx, &rapid())?;
            store::insert_site(tx, &rapid())
        })
        .unwrap_err();
    assert_matches!(err, CatalogError::IntegrityViolation { .. });
    assert_matches!(
        store::site_by_name(store.conn(), "rapid"),
        Err(CatalogError::NotFound { entity: "site", .. })
    );
}
