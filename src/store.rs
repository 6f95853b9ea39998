use std::collections::HashMap;
use std::fs;
use std::thread;
use std::time::Duration;

use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::types::Type;
use rusqlite::{Connection, OptionalExtension, Row, Transaction, TransactionBehavior, params};
use uuid::Uuid;

use crate::config::{CatalogConfig, RetryPolicy};
use crate::domain::{
    AssemblyAccession, AssemblyId, AttributeId, DatasetId, DatasetSourceId, DatasetStatus,
    DatasetTypeId, GenomeDatasetId, GenomeId, GenomeReleaseId, OrganismGroupId, OrganismId,
    ReleaseId, ReleaseStatus, SiteId,
};
use crate::error::CatalogError;
use crate::model::{
    Assembly, AssemblySequence, Attribute, Dataset, DatasetAttribute, DatasetSource, DatasetType,
    Genome, GenomeDataset, GenomeRelease, NewAssembly, NewAssemblySequence, NewAttribute,
    NewDataset, NewDatasetType, NewGenome, NewOrganism, NewRelease, NewSite, Organism,
    OrganismGroup, Release, Site, StatusChange,
};

const SCHEMA_VERSION: i64 = 1;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS organism (
    organism_id INTEGER PRIMARY KEY,
    organism_uuid TEXT NOT NULL UNIQUE,
    taxonomy_id INTEGER NOT NULL,
    species_taxonomy_id INTEGER,
    common_name TEXT NOT NULL,
    scientific_name TEXT,
    strain TEXT,
    rank INTEGER,
    production_name TEXT NOT NULL UNIQUE
);

CREATE TABLE IF NOT EXISTS assembly (
    assembly_id INTEGER PRIMARY KEY,
    assembly_uuid TEXT NOT NULL UNIQUE,
    accession TEXT NOT NULL UNIQUE,
    name TEXT NOT NULL,
    level TEXT NOT NULL,
    is_reference INTEGER NOT NULL DEFAULT 0,
    created TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS assembly_sequence (
    assembly_sequence_id INTEGER PRIMARY KEY,
    assembly_id INTEGER NOT NULL REFERENCES assembly(assembly_id) ON DELETE CASCADE,
    name TEXT NOT NULL,
    accession TEXT NOT NULL,
    length INTEGER NOT NULL,
    md5 TEXT,
    is_circular INTEGER NOT NULL DEFAULT 0,
    chromosomal INTEGER NOT NULL DEFAULT 0,
    UNIQUE (assembly_id, accession)
);

CREATE TABLE IF NOT EXISTS genome (
    genome_id INTEGER PRIMARY KEY,
    genome_uuid TEXT NOT NULL UNIQUE,
    assembly_id INTEGER NOT NULL REFERENCES assembly(assembly_id),
    organism_id INTEGER NOT NULL REFERENCES organism(organism_id),
    created TEXT NOT NULL,
    production_name TEXT NOT NULL,
    is_best INTEGER NOT NULL DEFAULT 0,
    suppressed INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS site (
    site_id INTEGER PRIMARY KEY,
    name TEXT NOT NULL UNIQUE,
    label TEXT NOT NULL,
    uri TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS catalog_release (
    release_id INTEGER PRIMARY KEY,
    version INTEGER NOT NULL,
    site_id INTEGER NOT NULL REFERENCES site(site_id),
    release_date TEXT,
    label TEXT,
    is_current INTEGER NOT NULL DEFAULT 0,
    release_type TEXT NOT NULL,
    status TEXT NOT NULL DEFAULT 'Planned',
    UNIQUE (version, site_id)
);

CREATE TABLE IF NOT EXISTS dataset_type (
    dataset_type_id INTEGER PRIMARY KEY,
    name TEXT NOT NULL UNIQUE,
    label TEXT NOT NULL,
    topic TEXT NOT NULL,
    description TEXT,
    parent_id INTEGER REFERENCES dataset_type(dataset_type_id)
);

CREATE TABLE IF NOT EXISTS dataset_type_dependency (
    dataset_type_id INTEGER NOT NULL REFERENCES dataset_type(dataset_type_id),
    depends_on_id INTEGER NOT NULL REFERENCES dataset_type(dataset_type_id),
    PRIMARY KEY (dataset_type_id, depends_on_id)
);

CREATE TABLE IF NOT EXISTS dataset_source (
    dataset_source_id INTEGER PRIMARY KEY,
    source_type TEXT NOT NULL,
    name TEXT NOT NULL UNIQUE
);

CREATE TABLE IF NOT EXISTS dataset (
    dataset_id INTEGER PRIMARY KEY,
    dataset_uuid TEXT NOT NULL UNIQUE,
    name TEXT NOT NULL,
    version TEXT,
    label TEXT NOT NULL,
    created TEXT NOT NULL,
    dataset_type_id INTEGER NOT NULL REFERENCES dataset_type(dataset_type_id),
    dataset_source_id INTEGER NOT NULL REFERENCES dataset_source(dataset_source_id),
    parent_id INTEGER REFERENCES dataset(dataset_id) ON DELETE CASCADE,
    status TEXT NOT NULL DEFAULT 'Submitted'
        CHECK (status IN ('Submitted', 'Processing', 'Processed', 'Released', 'Faulty', 'Suppressed')),
    eligible INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS attribute (
    attribute_id INTEGER PRIMARY KEY,
    name TEXT NOT NULL UNIQUE,
    label TEXT NOT NULL,
    description TEXT,
    attribute_type TEXT NOT NULL DEFAULT 'string'
);

CREATE TABLE IF NOT EXISTS dataset_attribute (
    dataset_attribute_id INTEGER PRIMARY KEY,
    dataset_id INTEGER NOT NULL REFERENCES dataset(dataset_id) ON DELETE CASCADE,
    attribute_id INTEGER NOT NULL REFERENCES attribute(attribute_id),
    value TEXT NOT NULL,
    UNIQUE (dataset_id, attribute_id, value)
);

CREATE TABLE IF NOT EXISTS genome_dataset (
    genome_dataset_id INTEGER PRIMARY KEY,
    genome_id INTEGER NOT NULL REFERENCES genome(genome_id) ON DELETE CASCADE,
    dataset_id INTEGER NOT NULL REFERENCES dataset(dataset_id) ON DELETE CASCADE,
    release_id INTEGER REFERENCES catalog_release(release_id),
    is_current INTEGER NOT NULL DEFAULT 0,
    UNIQUE (dataset_id, genome_id)
);

CREATE TABLE IF NOT EXISTS genome_release (
    genome_release_id INTEGER PRIMARY KEY,
    genome_id INTEGER NOT NULL REFERENCES genome(genome_id) ON DELETE CASCADE,
    release_id INTEGER NOT NULL REFERENCES catalog_release(release_id),
    is_current INTEGER NOT NULL DEFAULT 0,
    UNIQUE (genome_id, release_id)
);

CREATE TABLE IF NOT EXISTS organism_group (
    organism_group_id INTEGER PRIMARY KEY,
    group_type TEXT NOT NULL,
    name TEXT NOT NULL,
    code TEXT,
    UNIQUE (group_type, name)
);

CREATE TABLE IF NOT EXISTS organism_group_member (
    organism_group_member_id INTEGER PRIMARY KEY,
    organism_group_id INTEGER NOT NULL REFERENCES organism_group(organism_group_id),
    organism_id INTEGER NOT NULL REFERENCES organism(organism_id),
    is_reference INTEGER NOT NULL DEFAULT 0,
    member_order INTEGER,
    UNIQUE (organism_id, organism_group_id)
);

CREATE TABLE IF NOT EXISTS dataset_status_log (
    dataset_status_log_id INTEGER PRIMARY KEY,
    dataset_id INTEGER NOT NULL REFERENCES dataset(dataset_id) ON DELETE CASCADE,
    from_status TEXT NOT NULL,
    to_status TEXT NOT NULL,
    changed_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS genome_dataset_genome_idx ON genome_dataset (genome_id);
CREATE INDEX IF NOT EXISTS genome_dataset_release_idx ON genome_dataset (release_id);
CREATE INDEX IF NOT EXISTS dataset_type_idx ON dataset (dataset_type_id);
CREATE INDEX IF NOT EXISTS dataset_parent_idx ON dataset (parent_id);
"#;

pub struct Store {
    conn: Connection,
    retry: RetryPolicy,
}

impl Store {
    pub fn open(config: &CatalogConfig) -> Result<Self, CatalogError> {
        if let Some(parent) = config.database_path.parent() {
            if !parent.as_str().is_empty() {
                fs::create_dir_all(parent.as_std_path())
                    .map_err(|err| CatalogError::Storage(err.to_string()))?;
            }
        }
        let conn = Connection::open(config.database_path.as_std_path())?;
        apply_pragmas(&conn, config.busy_timeout(), true)?;
        let mut store = Self {
            conn,
            retry: config.retry.clone(),
        };
        store.migrate()?;
        Ok(store)
    }

    pub fn open_in_memory(config: &CatalogConfig) -> Result<Self, CatalogError> {
        let conn = Connection::open_in_memory()?;
        apply_pragmas(&conn, config.busy_timeout(), false)?;
        let mut store = Self {
            conn,
            retry: config.retry.clone(),
        };
        store.migrate()?;
        Ok(store)
    }

    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    fn migrate(&mut self) -> Result<(), CatalogError> {
        let tx = self.conn.transaction()?;
        tx.execute_batch("CREATE TABLE IF NOT EXISTS schema_meta (version INTEGER NOT NULL);")?;
        let version: Option<i64> = tx
            .query_row("SELECT version FROM schema_meta LIMIT 1", [], |row| row.get(0))
            .optional()?;
        match version {
            None => {
                tx.execute_batch(SCHEMA)?;
                tx.execute(
                    "INSERT INTO schema_meta (version) VALUES (?1)",
                    params![SCHEMA_VERSION],
                )?;
                tracing::debug!(version = SCHEMA_VERSION, "created catalog schema");
            }
            Some(SCHEMA_VERSION) => {}
            Some(other) => {
                return Err(CatalogError::Storage(format!(
                    "unsupported schema version {other}"
                )));
            }
        }
        tx.commit()?;
        Ok(())
    }

    /// Runs `body` in one `BEGIN IMMEDIATE` transaction. Lock contention rolls
    /// the attempt back and retries with backoff; when the budget is spent
    /// the caller gets `ConcurrentUpdate`. Any other error rolls back and is
    /// returned as is.
    pub fn write<T, F>(&mut self, operation: &str, mut body: F) -> Result<T, CatalogError>
    where
        F: FnMut(&Transaction<'_>) -> Result<T, CatalogError>,
    {
        let attempts = self.retry.max_attempts.max(1);
        for attempt in 1..=attempts {
            match self.try_write(&mut body) {
                Err(CatalogError::Busy(reason)) => {
                    tracing::debug!(operation, attempt, %reason, "write transaction contended");
                    if attempt < attempts {
                        thread::sleep(self.retry.delay_for_attempt(attempt));
                    }
                }
                other => return other,
            }
        }
        tracing::warn!(operation, attempts, "write transaction retries exhausted");
        Err(CatalogError::ConcurrentUpdate {
            operation: operation.to_string(),
            attempts,
        })
    }

    fn try_write<T, F>(&mut self, body: &mut F) -> Result<T, CatalogError>
    where
        F: FnMut(&Transaction<'_>) -> Result<T, CatalogError>,
    {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        let value = body(&tx)?;
        tx.commit()?;
        Ok(value)
    }
}

fn apply_pragmas(conn: &Connection, busy_timeout: Duration, wal: bool) -> Result<(), CatalogError> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    if wal {
        // journal_mode answers with the mode now in effect
        let mode: String = conn.query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))?;
        tracing::debug!(%mode, "journal mode");
        conn.execute_batch("PRAGMA synchronous = NORMAL;")?;
    }
    conn.busy_timeout(busy_timeout)?;
    Ok(())
}

fn uuid_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<Uuid> {
    let text: String = row.get(idx)?;
    Uuid::parse_str(&text)
        .map_err(|err| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(err)))
}

fn accession_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<AssemblyAccession> {
    let text: String = row.get(idx)?;
    text.parse()
        .map_err(|err: CatalogError| {
            rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(err))
        })
}

fn now() -> DateTime<Utc> {
    Utc::now()
}

// ---------------------------------------------------------------------------
// organisms, assemblies, genomes

const ORGANISM_COLUMNS: &str = "organism_id, organism_uuid, taxonomy_id, species_taxonomy_id, \
     common_name, scientific_name, strain, rank, production_name";

fn map_organism(row: &Row<'_>) -> rusqlite::Result<Organism> {
    Ok(Organism {
        id: row.get(0)?,
        organism_uuid: uuid_at(row, 1)?,
        taxonomy_id: row.get(2)?,
        species_taxonomy_id: row.get(3)?,
        common_name: row.get(4)?,
        scientific_name: row.get(5)?,
        strain: row.get(6)?,
        rank: row.get(7)?,
        production_name: row.get(8)?,
    })
}

pub fn insert_organism(conn: &Connection, new: &NewOrganism) -> Result<Organism, CatalogError> {
    let organism_uuid = Uuid::new_v4();
    conn.execute(
        "INSERT INTO organism (organism_uuid, taxonomy_id, species_taxonomy_id, common_name, \
         scientific_name, strain, rank, production_name) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            organism_uuid.to_string(),
            new.taxonomy_id,
            new.species_taxonomy_id,
            new.common_name,
            new.scientific_name,
            new.strain,
            new.rank,
            new.production_name,
        ],
    )?;
    organism_by_id(conn, OrganismId(conn.last_insert_rowid()))
}

pub fn organism_by_id(conn: &Connection, id: OrganismId) -> Result<Organism, CatalogError> {
    conn.query_row(
        &format!("SELECT {ORGANISM_COLUMNS} FROM organism WHERE organism_id = ?1"),
        params![id],
        map_organism,
    )
    .optional()?
    .ok_or_else(|| CatalogError::not_found("organism", id))
}

pub fn organism_by_production_name(
    conn: &Connection,
    production_name: &str,
) -> Result<Organism, CatalogError> {
    conn.query_row(
        &format!("SELECT {ORGANISM_COLUMNS} FROM organism WHERE production_name = ?1"),
        params![production_name],
        map_organism,
    )
    .optional()?
    .ok_or_else(|| CatalogError::not_found("organism", production_name))
}

const ASSEMBLY_COLUMNS: &str =
    "assembly_id, assembly_uuid, accession, name, level, is_reference, created";

fn map_assembly(row: &Row<'_>) -> rusqlite::Result<Assembly> {
    Ok(Assembly {
        id: row.get(0)?,
        assembly_uuid: uuid_at(row, 1)?,
        accession: accession_at(row, 2)?,
        name: row.get(3)?,
        level: row.get(4)?,
        is_reference: row.get(5)?,
        created: row.get(6)?,
    })
}

pub fn insert_assembly(conn: &Connection, new: &NewAssembly) -> Result<Assembly, CatalogError> {
    conn.execute(
        "INSERT INTO assembly (assembly_uuid, accession, name, level, is_reference, created) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            Uuid::new_v4().to_string(),
            new.accession.as_str(),
            new.name,
            new.level,
            new.is_reference,
            now(),
        ],
    )?;
    assembly_by_id(conn, AssemblyId(conn.last_insert_rowid()))
}

pub fn assembly_by_id(conn: &Connection, id: AssemblyId) -> Result<Assembly, CatalogError> {
    conn.query_row(
        &format!("SELECT {ASSEMBLY_COLUMNS} FROM assembly WHERE assembly_id = ?1"),
        params![id],
        map_assembly,
    )
    .optional()?
    .ok_or_else(|| CatalogError::not_found("assembly", id))
}

pub fn assembly_by_accession(
    conn: &Connection,
    accession: &AssemblyAccession,
) -> Result<Assembly, CatalogError> {
    conn.query_row(
        &format!("SELECT {ASSEMBLY_COLUMNS} FROM assembly WHERE accession = ?1"),
        params![accession.as_str()],
        map_assembly,
    )
    .optional()?
    .ok_or_else(|| CatalogError::not_found("assembly", accession))
}

pub fn insert_assembly_sequence(
    conn: &Connection,
    assembly_id: AssemblyId,
    new: &NewAssemblySequence,
) -> Result<(), CatalogError> {
    conn.execute(
        "INSERT INTO assembly_sequence (assembly_id, name, accession, length, md5, is_circular, \
         chromosomal) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            assembly_id,
            new.name,
            new.accession,
            new.length,
            new.md5,
            new.is_circular,
            new.chromosomal,
        ],
    )?;
    Ok(())
}

pub fn assembly_sequences(
    conn: &Connection,
    assembly_id: AssemblyId,
    chromosomal_only: bool,
) -> Result<Vec<AssemblySequence>, CatalogError> {
    let mut stmt = conn.prepare(
        "SELECT assembly_id, name, accession, length, md5, is_circular, chromosomal \
         FROM assembly_sequence WHERE assembly_id = ?1 AND (?2 = 0 OR chromosomal = 1) \
         ORDER BY assembly_sequence_id",
    )?;
    let rows = stmt.query_map(params![assembly_id, chromosomal_only], |row| {
        Ok(AssemblySequence {
            assembly_id: row.get(0)?,
            name: row.get(1)?,
            accession: row.get(2)?,
            length: row.get(3)?,
            md5: row.get(4)?,
            is_circular: row.get(5)?,
            chromosomal: row.get(6)?,
        })
    })?;
    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}

const GENOME_COLUMNS: &str = "g.genome_id, g.genome_uuid, g.assembly_id, g.organism_id, g.created, \
     g.production_name, g.is_best, g.suppressed";

fn map_genome(row: &Row<'_>) -> rusqlite::Result<Genome> {
    Ok(Genome {
        id: row.get(0)?,
        genome_uuid: uuid_at(row, 1)?,
        assembly_id: row.get(2)?,
        organism_id: row.get(3)?,
        created: row.get(4)?,
        production_name: row.get(5)?,
        is_best: row.get(6)?,
        suppressed: row.get(7)?,
    })
}

pub fn insert_genome(conn: &Connection, new: &NewGenome) -> Result<Genome, CatalogError> {
    conn.execute(
        "INSERT INTO genome (genome_uuid, assembly_id, organism_id, created, production_name, \
         is_best) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            Uuid::new_v4().to_string(),
            new.assembly_id,
            new.organism_id,
            now(),
            new.production_name,
            new.is_best,
        ],
    )?;
    genome_by_id(conn, GenomeId(conn.last_insert_rowid()))
}

pub fn genome_by_id(conn: &Connection, id: GenomeId) -> Result<Genome, CatalogError> {
    conn.query_row(
        &format!("SELECT {GENOME_COLUMNS} FROM genome g WHERE g.genome_id = ?1"),
        params![id],
        map_genome,
    )
    .optional()?
    .ok_or_else(|| CatalogError::not_found("genome", id))
}

pub fn genome_by_uuid(conn: &Connection, genome_uuid: &Uuid) -> Result<Genome, CatalogError> {
    conn.query_row(
        &format!("SELECT {GENOME_COLUMNS} FROM genome g WHERE g.genome_uuid = ?1"),
        params![genome_uuid.to_string()],
        map_genome,
    )
    .optional()?
    .ok_or_else(|| CatalogError::not_found("genome", genome_uuid))
}

fn query_genomes(
    conn: &Connection,
    clause: &str,
    args: &[&dyn rusqlite::ToSql],
) -> Result<Vec<Genome>, CatalogError> {
    let sql = format!(
        "SELECT DISTINCT {GENOME_COLUMNS} FROM genome g \
         JOIN assembly a ON a.assembly_id = g.assembly_id \
         JOIN organism o ON o.organism_id = g.organism_id \
         WHERE {clause} ORDER BY g.created DESC, g.genome_id DESC"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(args, map_genome)?;
    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}

pub fn genomes_by_assembly_accession(
    conn: &Connection,
    accession: &AssemblyAccession,
) -> Result<Vec<Genome>, CatalogError> {
    query_genomes(conn, "a.accession = ?1", &[&accession.as_str()])
}

pub fn genomes_by_production_name(
    conn: &Connection,
    production_name: &str,
) -> Result<Vec<Genome>, CatalogError> {
    query_genomes(
        conn,
        "g.production_name = ?1 OR o.production_name = ?1",
        &[&production_name],
    )
}

pub fn genomes_by_taxonomy_id(
    conn: &Connection,
    taxonomy_id: i64,
) -> Result<Vec<Genome>, CatalogError> {
    query_genomes(
        conn,
        "o.taxonomy_id = ?1 OR o.species_taxonomy_id = ?1",
        &[&taxonomy_id],
    )
}

pub fn genomes_by_keyword(conn: &Connection, keyword: &str) -> Result<Vec<Genome>, CatalogError> {
    let pattern = format!("%{}%", keyword.trim().to_lowercase());
    query_genomes(
        conn,
        "lower(o.common_name) LIKE ?1 OR lower(coalesce(o.scientific_name, '')) LIKE ?1 \
         OR lower(coalesce(o.strain, '')) LIKE ?1 OR lower(a.accession) LIKE ?1 \
         OR lower(a.name) LIKE ?1 OR lower(g.production_name) LIKE ?1",
        &[&pattern],
    )
}

pub fn genomes_by_status_and_type(
    conn: &Connection,
    status: DatasetStatus,
    dataset_type_id: DatasetTypeId,
) -> Result<Vec<(Genome, Uuid)>, CatalogError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {GENOME_COLUMNS}, d.dataset_uuid FROM genome g \
         JOIN genome_dataset gd ON gd.genome_id = g.genome_id \
         JOIN dataset d ON d.dataset_id = gd.dataset_id \
         WHERE d.status = ?1 AND d.dataset_type_id = ?2 ORDER BY g.genome_id, d.dataset_id"
    ))?;
    let rows = stmt.query_map(params![status, dataset_type_id], |row| {
        Ok((map_genome(row)?, uuid_at(row, 8)?))
    })?;
    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}

// ---------------------------------------------------------------------------
// sites and releases

pub fn insert_site(conn: &Connection, new: &NewSite) -> Result<Site, CatalogError> {
    conn.execute(
        "INSERT INTO site (name, label, uri) VALUES (?1, ?2, ?3)",
        params![new.name, new.label, new.uri],
    )?;
    site_by_id(conn, SiteId(conn.last_insert_rowid()))
}

fn map_site(row: &Row<'_>) -> rusqlite::Result<Site> {
    Ok(Site {
        id: row.get(0)?,
        name: row.get(1)?,
        label: row.get(2)?,
        uri: row.get(3)?,
    })
}

pub fn site_by_id(conn: &Connection, id: SiteId) -> Result<Site, CatalogError> {
    conn.query_row(
        "SELECT site_id, name, label, uri FROM site WHERE site_id = ?1",
        params![id],
        map_site,
    )
    .optional()?
    .ok_or_else(|| CatalogError::not_found("site", id))
}

pub fn site_by_name(conn: &Connection, name: &str) -> Result<Site, CatalogError> {
    conn.query_row(
        "SELECT site_id, name, label, uri FROM site WHERE name = ?1",
        params![name],
        map_site,
    )
    .optional()?
    .ok_or_else(|| CatalogError::not_found("site", name))
}

const RELEASE_COLUMNS: &str = "r.release_id, r.version, r.site_id, s.name, r.release_date, \
     r.label, r.is_current, r.release_type, r.status";

fn map_release(row: &Row<'_>) -> rusqlite::Result<Release> {
    Ok(Release {
        id: row.get(0)?,
        version: row.get(1)?,
        site_id: row.get(2)?,
        site_name: row.get(3)?,
        release_date: row.get(4)?,
        label: row.get(5)?,
        is_current: row.get(6)?,
        release_type: row.get(7)?,
        status: row.get(8)?,
    })
}

pub fn insert_release(conn: &Connection, new: &NewRelease) -> Result<Release, CatalogError> {
    conn.execute(
        "INSERT INTO catalog_release (version, site_id, release_date, label, release_type) \
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            new.version,
            new.site_id,
            new.release_date,
            new.label,
            new.release_type,
        ],
    )?;
    release_by_id(conn, ReleaseId(conn.last_insert_rowid()))
}

pub fn release_by_id(conn: &Connection, id: ReleaseId) -> Result<Release, CatalogError> {
    conn.query_row(
        &format!(
            "SELECT {RELEASE_COLUMNS} FROM catalog_release r \
             JOIN site s ON s.site_id = r.site_id WHERE r.release_id = ?1"
        ),
        params![id],
        map_release,
    )
    .optional()?
    .ok_or_else(|| CatalogError::not_found("release", id))
}

pub fn releases(conn: &Connection) -> Result<Vec<Release>, CatalogError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {RELEASE_COLUMNS} FROM catalog_release r \
         JOIN site s ON s.site_id = r.site_id ORDER BY r.version, s.name"
    ))?;
    let rows = stmt.query_map([], map_release)?;
    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}

pub fn current_releases_for_site(
    conn: &Connection,
    site_id: SiteId,
) -> Result<Vec<Release>, CatalogError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {RELEASE_COLUMNS} FROM catalog_release r \
         JOIN site s ON s.site_id = r.site_id WHERE r.site_id = ?1 AND r.is_current = 1"
    ))?;
    let rows = stmt.query_map(params![site_id], map_release)?;
    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}

pub fn set_release_current(
    conn: &Connection,
    id: ReleaseId,
    is_current: bool,
) -> Result<(), CatalogError> {
    conn.execute(
        "UPDATE catalog_release SET is_current = ?2 WHERE release_id = ?1",
        params![id, is_current],
    )?;
    Ok(())
}

pub fn update_release_status(
    conn: &Connection,
    id: ReleaseId,
    status: ReleaseStatus,
    release_date: Option<NaiveDate>,
) -> Result<(), CatalogError> {
    conn.execute(
        "UPDATE catalog_release SET status = ?2, release_date = coalesce(?3, release_date) \
         WHERE release_id = ?1",
        params![id, status, release_date],
    )?;
    Ok(())
}

// ---------------------------------------------------------------------------
// dataset types and sources

pub fn insert_dataset_type(
    conn: &Connection,
    new: &NewDatasetType,
) -> Result<DatasetType, CatalogError> {
    conn.execute(
        "INSERT INTO dataset_type (name, label, topic, description, parent_id) \
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![new.name, new.label, new.topic, new.description, new.parent_id],
    )?;
    let id = DatasetTypeId(conn.last_insert_rowid());
    for dependency in &new.depends_on {
        conn.execute(
            "INSERT OR IGNORE INTO dataset_type_dependency (dataset_type_id, depends_on_id) \
             VALUES (?1, ?2)",
            params![id, dependency],
        )?;
    }
    dataset_type_by_id(conn, id)
}

fn dataset_type_rows(
    conn: &Connection,
    clause: &str,
    args: &[&dyn rusqlite::ToSql],
) -> Result<Vec<DatasetType>, CatalogError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT dataset_type_id, name, label, topic, description, parent_id \
         FROM dataset_type WHERE {clause} ORDER BY dataset_type_id"
    ))?;
    let rows = stmt.query_map(args, |row| {
        Ok(DatasetType {
            id: row.get(0)?,
            name: row.get(1)?,
            label: row.get(2)?,
            topic: row.get(3)?,
            description: row.get(4)?,
            parent_id: row.get(5)?,
            depends_on: Vec::new(),
        })
    })?;
    let mut types = rows.collect::<Result<Vec<_>, _>>()?;
    let edges = dependency_edges(conn)?;
    for dataset_type in &mut types {
        if let Some(deps) = edges.get(&dataset_type.id) {
            dataset_type.depends_on = deps.clone();
        }
    }
    Ok(types)
}

fn dependency_edges(
    conn: &Connection,
) -> Result<HashMap<DatasetTypeId, Vec<DatasetTypeId>>, CatalogError> {
    let mut stmt = conn.prepare(
        "SELECT dataset_type_id, depends_on_id FROM dataset_type_dependency \
         ORDER BY dataset_type_id, depends_on_id",
    )?;
    let rows = stmt.query_map([], |row| {
        Ok((row.get::<_, DatasetTypeId>(0)?, row.get::<_, DatasetTypeId>(1)?))
    })?;
    let mut edges: HashMap<DatasetTypeId, Vec<DatasetTypeId>> = HashMap::new();
    for row in rows {
        let (from, to) = row?;
        edges.entry(from).or_default().push(to);
    }
    Ok(edges)
}

pub fn dataset_types(conn: &Connection) -> Result<Vec<DatasetType>, CatalogError> {
    dataset_type_rows(conn, "1 = 1", &[])
}

pub fn dataset_type_by_id(conn: &Connection, id: DatasetTypeId) -> Result<DatasetType, CatalogError> {
    dataset_type_rows(conn, "dataset_type_id = ?1", &[&id])?
        .pop()
        .ok_or_else(|| CatalogError::not_found("dataset type", id))
}

pub fn dataset_type_by_name(conn: &Connection, name: &str) -> Result<DatasetType, CatalogError> {
    dataset_type_rows(conn, "name = ?1", &[&name])?
        .pop()
        .ok_or_else(|| CatalogError::not_found("dataset type", name))
}

pub fn ensure_dataset_source(
    conn: &Connection,
    source_type: &str,
    name: &str,
) -> Result<DatasetSource, CatalogError> {
    conn.execute(
        "INSERT OR IGNORE INTO dataset_source (source_type, name) VALUES (?1, ?2)",
        params![source_type, name],
    )?;
    conn.query_row(
        "SELECT dataset_source_id, source_type, name FROM dataset_source WHERE name = ?1",
        params![name],
        map_source,
    )
    .map_err(CatalogError::from)
}

fn map_source(row: &Row<'_>) -> rusqlite::Result<DatasetSource> {
    Ok(DatasetSource {
        id: row.get(0)?,
        source_type: row.get(1)?,
        name: row.get(2)?,
    })
}

pub fn dataset_source_by_id(
    conn: &Connection,
    id: DatasetSourceId,
) -> Result<DatasetSource, CatalogError> {
    conn.query_row(
        "SELECT dataset_source_id, source_type, name FROM dataset_source \
         WHERE dataset_source_id = ?1",
        params![id],
        map_source,
    )
    .optional()?
    .ok_or_else(|| CatalogError::not_found("dataset source", id))
}

// ---------------------------------------------------------------------------
// datasets

const DATASET_COLUMNS: &str = "d.dataset_id, d.dataset_uuid, d.name, d.version, d.label, \
     d.created, d.dataset_type_id, d.dataset_source_id, d.parent_id, d.status, d.eligible";

fn map_dataset(row: &Row<'_>) -> rusqlite::Result<Dataset> {
    Ok(Dataset {
        id: row.get(0)?,
        dataset_uuid: uuid_at(row, 1)?,
        name: row.get(2)?,
        version: row.get(3)?,
        label: row.get(4)?,
        created: row.get(5)?,
        dataset_type_id: row.get(6)?,
        dataset_source_id: row.get(7)?,
        parent_id: row.get(8)?,
        status: row.get(9)?,
        eligible: row.get(10)?,
    })
}

fn dataset_rows(
    conn: &Connection,
    tail: &str,
    args: &[&dyn rusqlite::ToSql],
) -> Result<Vec<Dataset>, CatalogError> {
    let mut stmt = conn.prepare(&format!("SELECT {DATASET_COLUMNS} FROM dataset d {tail}"))?;
    let rows = stmt.query_map(args, map_dataset)?;
    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}

pub fn insert_dataset(conn: &Connection, new: &NewDataset) -> Result<Dataset, CatalogError> {
    conn.execute(
        "INSERT INTO dataset (dataset_uuid, name, version, label, created, dataset_type_id, \
         dataset_source_id, parent_id, status) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            Uuid::new_v4().to_string(),
            new.name,
            new.version,
            new.label,
            now(),
            new.dataset_type_id,
            new.dataset_source_id,
            new.parent_id,
            new.status,
        ],
    )?;
    dataset_by_id(conn, DatasetId(conn.last_insert_rowid()))
}

pub fn dataset_by_id(conn: &Connection, id: DatasetId) -> Result<Dataset, CatalogError> {
    dataset_rows(conn, "WHERE d.dataset_id = ?1", &[&id])?
        .pop()
        .ok_or_else(|| CatalogError::not_found("dataset", id))
}

pub fn dataset_by_uuid(conn: &Connection, dataset_uuid: &Uuid) -> Result<Dataset, CatalogError> {
    dataset_rows(conn, "WHERE d.dataset_uuid = ?1", &[&dataset_uuid.to_string()])?
        .pop()
        .ok_or_else(|| CatalogError::not_found("dataset", dataset_uuid))
}

pub fn child_datasets(conn: &Connection, parent_id: DatasetId) -> Result<Vec<Dataset>, CatalogError> {
    dataset_rows(conn, "WHERE d.parent_id = ?1 ORDER BY d.dataset_id", &[&parent_id])
}

pub fn datasets_for_genome(
    conn: &Connection,
    genome_id: GenomeId,
    dataset_type_id: Option<DatasetTypeId>,
) -> Result<Vec<Dataset>, CatalogError> {
    dataset_rows(
        conn,
        "JOIN genome_dataset gd ON gd.dataset_id = d.dataset_id \
         WHERE gd.genome_id = ?1 AND (?2 IS NULL OR d.dataset_type_id = ?2) \
         ORDER BY d.dataset_id",
        &[&genome_id, &dataset_type_id],
    )
}

pub fn update_dataset_status(
    conn: &Connection,
    id: DatasetId,
    status: DatasetStatus,
) -> Result<(), CatalogError> {
    conn.execute(
        "UPDATE dataset SET status = ?2 WHERE dataset_id = ?1",
        params![id, status],
    )?;
    Ok(())
}

pub fn set_dataset_eligible(
    conn: &Connection,
    id: DatasetId,
    eligible: bool,
) -> Result<(), CatalogError> {
    conn.execute(
        "UPDATE dataset SET eligible = ?2 WHERE dataset_id = ?1",
        params![id, eligible],
    )?;
    Ok(())
}

pub fn log_status_change(conn: &Connection, change: &StatusChange) -> Result<(), CatalogError> {
    conn.execute(
        "INSERT INTO dataset_status_log (dataset_id, from_status, to_status, changed_at) \
         VALUES (?1, ?2, ?3, ?4)",
        params![change.dataset_id, change.from, change.to, change.changed_at],
    )?;
    Ok(())
}

pub fn status_history(
    conn: &Connection,
    dataset_id: DatasetId,
) -> Result<Vec<StatusChange>, CatalogError> {
    let mut stmt = conn.prepare(
        "SELECT dataset_id, from_status, to_status, changed_at FROM dataset_status_log \
         WHERE dataset_id = ?1 ORDER BY dataset_status_log_id",
    )?;
    let rows = stmt.query_map(params![dataset_id], |row| {
        Ok(StatusChange {
            dataset_id: row.get(0)?,
            from: row.get(1)?,
            to: row.get(2)?,
            changed_at: row.get(3)?,
        })
    })?;
    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}

// ---------------------------------------------------------------------------
// attributes

pub fn insert_attribute(conn: &Connection, new: &NewAttribute) -> Result<Attribute, CatalogError> {
    conn.execute(
        "INSERT INTO attribute (name, label, description, attribute_type) VALUES (?1, ?2, ?3, ?4)",
        params![new.name, new.label, new.description, new.attribute_type],
    )?;
    attribute_by_name(conn, &new.name)
}

pub fn attribute_by_name(conn: &Connection, name: &str) -> Result<Attribute, CatalogError> {
    conn.query_row(
        "SELECT attribute_id, name, label, description, attribute_type FROM attribute \
         WHERE name = ?1",
        params![name],
        |row| {
            Ok(Attribute {
                id: row.get(0)?,
                name: row.get(1)?,
                label: row.get(2)?,
                description: row.get(3)?,
                attribute_type: row.get(4)?,
            })
        },
    )
    .optional()?
    .ok_or_else(|| CatalogError::not_found("attribute", name))
}

pub fn insert_dataset_attribute(
    conn: &Connection,
    dataset_id: DatasetId,
    attribute_id: AttributeId,
    value: &str,
) -> Result<(), CatalogError> {
    conn.execute(
        "INSERT OR IGNORE INTO dataset_attribute (dataset_id, attribute_id, value) \
         VALUES (?1, ?2, ?3)",
        params![dataset_id, attribute_id, value],
    )?;
    Ok(())
}

pub fn dataset_attributes(
    conn: &Connection,
    dataset_id: DatasetId,
) -> Result<Vec<DatasetAttribute>, CatalogError> {
    let mut stmt = conn.prepare(
        "SELECT a.name, a.label, a.attribute_type, da.value FROM dataset_attribute da \
         JOIN attribute a ON a.attribute_id = da.attribute_id \
         WHERE da.dataset_id = ?1 ORDER BY a.name, da.value",
    )?;
    let rows = stmt.query_map(params![dataset_id], |row| {
        Ok(DatasetAttribute {
            name: row.get(0)?,
            label: row.get(1)?,
            attribute_type: row.get(2)?,
            value: row.get(3)?,
        })
    })?;
    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}

// ---------------------------------------------------------------------------
// genome links

const GENOME_DATASET_COLUMNS: &str =
    "gd.genome_dataset_id, gd.genome_id, gd.dataset_id, gd.release_id, gd.is_current";

fn map_genome_dataset(row: &Row<'_>) -> rusqlite::Result<GenomeDataset> {
    Ok(GenomeDataset {
        id: row.get(0)?,
        genome_id: row.get(1)?,
        dataset_id: row.get(2)?,
        release_id: row.get(3)?,
        is_current: row.get(4)?,
    })
}

fn genome_dataset_rows(
    conn: &Connection,
    tail: &str,
    args: &[&dyn rusqlite::ToSql],
) -> Result<Vec<GenomeDataset>, CatalogError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {GENOME_DATASET_COLUMNS} FROM genome_dataset gd {tail}"
    ))?;
    let rows = stmt.query_map(args, map_genome_dataset)?;
    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}

pub fn genome_dataset(
    conn: &Connection,
    genome_id: GenomeId,
    dataset_id: DatasetId,
) -> Result<Option<GenomeDataset>, CatalogError> {
    Ok(genome_dataset_rows(
        conn,
        "WHERE gd.genome_id = ?1 AND gd.dataset_id = ?2",
        &[&genome_id, &dataset_id],
    )?
    .pop())
}

pub fn insert_genome_dataset(
    conn: &Connection,
    genome_id: GenomeId,
    dataset_id: DatasetId,
    release_id: Option<ReleaseId>,
    is_current: bool,
) -> Result<GenomeDatasetId, CatalogError> {
    conn.execute(
        "INSERT INTO genome_dataset (genome_id, dataset_id, release_id, is_current) \
         VALUES (?1, ?2, ?3, ?4)",
        params![genome_id, dataset_id, release_id, is_current],
    )?;
    Ok(GenomeDatasetId(conn.last_insert_rowid()))
}

pub fn update_genome_dataset(
    conn: &Connection,
    id: GenomeDatasetId,
    release_id: Option<ReleaseId>,
    is_current: bool,
) -> Result<(), CatalogError> {
    conn.execute(
        "UPDATE genome_dataset SET release_id = ?2, is_current = ?3 WHERE genome_dataset_id = ?1",
        params![id, release_id, is_current],
    )?;
    Ok(())
}

pub fn genome_dataset_by_id(
    conn: &Connection,
    id: GenomeDatasetId,
) -> Result<GenomeDataset, CatalogError> {
    genome_dataset_rows(conn, "WHERE gd.genome_dataset_id = ?1", &[&id])?
        .pop()
        .ok_or_else(|| CatalogError::not_found("genome dataset", id))
}

pub fn genome_datasets_for_genome(
    conn: &Connection,
    genome_id: GenomeId,
) -> Result<Vec<GenomeDataset>, CatalogError> {
    genome_dataset_rows(
        conn,
        "WHERE gd.genome_id = ?1 ORDER BY gd.genome_dataset_id",
        &[&genome_id],
    )
}

pub fn genome_datasets_for_dataset(
    conn: &Connection,
    dataset_id: DatasetId,
) -> Result<Vec<GenomeDataset>, CatalogError> {
    genome_dataset_rows(
        conn,
        "WHERE gd.dataset_id = ?1 ORDER BY gd.genome_dataset_id",
        &[&dataset_id],
    )
}

pub fn genome_datasets_for_release(
    conn: &Connection,
    release_id: ReleaseId,
) -> Result<Vec<GenomeDataset>, CatalogError> {
    genome_dataset_rows(
        conn,
        "WHERE gd.release_id = ?1 ORDER BY gd.genome_dataset_id",
        &[&release_id],
    )
}

pub fn current_links_in_lineage(
    conn: &Connection,
    genome_id: GenomeId,
    dataset_type_id: DatasetTypeId,
    dataset_source_id: DatasetSourceId,
) -> Result<Vec<GenomeDataset>, CatalogError> {
    genome_dataset_rows(
        conn,
        "JOIN dataset d ON d.dataset_id = gd.dataset_id \
         WHERE gd.genome_id = ?1 AND d.dataset_type_id = ?2 AND d.dataset_source_id = ?3 \
         AND gd.is_current = 1",
        &[&genome_id, &dataset_type_id, &dataset_source_id],
    )
}

pub fn set_genome_dataset_current(
    conn: &Connection,
    id: GenomeDatasetId,
    is_current: bool,
) -> Result<(), CatalogError> {
    conn.execute(
        "UPDATE genome_dataset SET is_current = ?2 WHERE genome_dataset_id = ?1",
        params![id, is_current],
    )?;
    Ok(())
}

fn map_genome_release(row: &Row<'_>) -> rusqlite::Result<GenomeRelease> {
    Ok(GenomeRelease {
        id: row.get(0)?,
        genome_id: row.get(1)?,
        release_id: row.get(2)?,
        is_current: row.get(3)?,
    })
}

fn genome_release_rows(
    conn: &Connection,
    clause: &str,
    args: &[&dyn rusqlite::ToSql],
) -> Result<Vec<GenomeRelease>, CatalogError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT genome_release_id, genome_id, release_id, is_current FROM genome_release \
         WHERE {clause} ORDER BY genome_release_id"
    ))?;
    let rows = stmt.query_map(args, map_genome_release)?;
    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}

pub fn ensure_genome_release(
    conn: &Connection,
    genome_id: GenomeId,
    release_id: ReleaseId,
) -> Result<GenomeRelease, CatalogError> {
    conn.execute(
        "INSERT OR IGNORE INTO genome_release (genome_id, release_id, is_current) \
         VALUES (?1, ?2, 0)",
        params![genome_id, release_id],
    )?;
    genome_release_rows(
        conn,
        "genome_id = ?1 AND release_id = ?2",
        &[&genome_id, &release_id],
    )?
    .pop()
    .ok_or_else(|| CatalogError::not_found("genome release", format!("{genome_id}/{release_id}")))
}

pub fn genome_releases_for_genome(
    conn: &Connection,
    genome_id: GenomeId,
) -> Result<Vec<GenomeRelease>, CatalogError> {
    genome_release_rows(conn, "genome_id = ?1", &[&genome_id])
}

pub fn genome_releases_for_release(
    conn: &Connection,
    release_id: ReleaseId,
) -> Result<Vec<GenomeRelease>, CatalogError> {
    genome_release_rows(conn, "release_id = ?1", &[&release_id])
}

pub fn set_genome_release_current(
    conn: &Connection,
    id: GenomeReleaseId,
    is_current: bool,
) -> Result<(), CatalogError> {
    conn.execute(
        "UPDATE genome_release SET is_current = ?2 WHERE genome_release_id = ?1",
        params![id, is_current],
    )?;
    Ok(())
}

// ---------------------------------------------------------------------------
// organism groups

pub fn ensure_organism_group(
    conn: &Connection,
    group_type: &str,
    name: &str,
    code: Option<&str>,
) -> Result<OrganismGroup, CatalogError> {
    conn.execute(
        "INSERT OR IGNORE INTO organism_group (group_type, name, code) VALUES (?1, ?2, ?3)",
        params![group_type, name, code],
    )?;
    conn.query_row(
        "SELECT organism_group_id, group_type, name, code FROM organism_group \
         WHERE group_type = ?1 AND name = ?2",
        params![group_type, name],
        map_group,
    )
    .map_err(CatalogError::from)
}

fn map_group(row: &Row<'_>) -> rusqlite::Result<OrganismGroup> {
    Ok(OrganismGroup {
        id: row.get(0)?,
        group_type: row.get(1)?,
        name: row.get(2)?,
        code: row.get(3)?,
    })
}

pub fn organism_group_by_key(conn: &Connection, key: &str) -> Result<OrganismGroup, CatalogError> {
    conn.query_row(
        "SELECT organism_group_id, group_type, name, code FROM organism_group \
         WHERE code = ?1 OR name = ?1 ORDER BY (code = ?1) DESC LIMIT 1",
        params![key],
        map_group,
    )
    .optional()?
    .ok_or_else(|| CatalogError::not_found("organism group", key))
}

pub fn add_organism_group_member(
    conn: &Connection,
    group_id: OrganismGroupId,
    organism_id: OrganismId,
    is_reference: bool,
    order: Option<i64>,
) -> Result<(), CatalogError> {
    conn.execute(
        "INSERT INTO organism_group_member (organism_group_id, organism_id, is_reference, \
         member_order) VALUES (?1, ?2, ?3, ?4)",
        params![group_id, organism_id, is_reference, order],
    )?;
    Ok(())
}

pub fn organism_group_counts(
    conn: &Connection,
    group_id: OrganismGroupId,
) -> Result<Vec<(Organism, i64)>, CatalogError> {
    let columns = ORGANISM_COLUMNS
        .split(", ")
        .map(|column| format!("o.{}", column.trim()))
        .collect::<Vec<_>>()
        .join(", ");
    let mut stmt = conn.prepare(&format!(
        "SELECT {columns}, count(g.genome_id) FROM organism_group_member m \
         JOIN organism o ON o.organism_id = m.organism_id \
         LEFT JOIN genome g ON g.organism_id = o.organism_id \
         WHERE m.organism_group_id = ?1 \
         GROUP BY o.organism_id ORDER BY m.member_order, o.organism_id"
    ))?;
    let rows = stmt.query_map(params![group_id], |row| Ok((map_organism(row)?, row.get(9)?)))?;
    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}
