use std::collections::BTreeSet;

use chrono::Utc;
use rusqlite::Connection;

use crate::domain::{DatasetId, DatasetStatus};
use crate::error::CatalogError;
use crate::lineage::DependencyGraph;
use crate::model::{Dataset, StatusChange};
use crate::store;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Unchanged,
    Advance,
    Override,
    Illegal,
}

pub fn classify(from: DatasetStatus, to: DatasetStatus) -> Step {
    use DatasetStatus::*;

    if from == to {
        return Step::Unchanged;
    }
    match from {
        Submitted => match to {
            Processing => Step::Advance,
            Faulty | Suppressed => Step::Override,
            Submitted | Processed | Released => Step::Illegal,
        },
        Processing => match to {
            Processed => Step::Advance,
            Faulty | Suppressed => Step::Override,
            Submitted | Processing | Released => Step::Illegal,
        },
        Processed => match to {
            Released => Step::Advance,
            Faulty | Suppressed => Step::Override,
            Submitted | Processing | Processed => Step::Illegal,
        },
        Released => match to {
            Suppressed => Step::Override,
            Submitted | Processing | Processed | Released | Faulty => Step::Illegal,
        },
        Faulty | Suppressed => Step::Illegal,
    }
}

/// Moves `dataset_id` to `to`. Runs inside the caller's write transaction:
/// validation happens before the first write, so a rejected request leaves
/// nothing behind.
pub fn transition(
    conn: &Connection,
    graph: &DependencyGraph,
    dataset_id: DatasetId,
    to: DatasetStatus,
) -> Result<Dataset, CatalogError> {
    let dataset = store::dataset_by_id(conn, dataset_id)?;
    let from = dataset.status;

    match classify(from, to) {
        Step::Unchanged => {
            tracing::debug!(dataset = %dataset.dataset_uuid, status = %to, "status unchanged");
            return Ok(dataset);
        }
        Step::Illegal => {
            return Err(CatalogError::IllegalTransition {
                dataset: dataset.dataset_uuid.to_string(),
                from: from.to_string(),
                to: to.to_string(),
            });
        }
        Step::Advance | Step::Override => {}
    }

    let blocking = match to {
        DatasetStatus::Processed => blocking_for(conn, graph, &dataset)?,
        DatasetStatus::Released => unfinished_descendants(conn, graph, dataset.id)?,
        _ => Vec::new(),
    };
    if !blocking.is_empty() {
        return Err(CatalogError::DependenciesNotSatisfied {
            dataset: dataset.dataset_uuid.to_string(),
            blocking,
        });
    }

    store::update_dataset_status(conn, dataset.id, to)?;
    store::log_status_change(
        conn,
        &StatusChange {
            dataset_id: dataset.id,
            from,
            to,
            changed_at: Utc::now(),
        },
    )?;
    tracing::info!(
        dataset = %dataset.dataset_uuid,
        from = %from,
        to = %to,
        "dataset status changed"
    );

    if to == DatasetStatus::Released {
        release_descendants(conn, graph, dataset.id)?;
    }

    if matches!(to, DatasetStatus::Released | DatasetStatus::Suppressed)
        || from.satisfies_dependency() != to.satisfies_dependency()
    {
        refresh_dependents(conn, graph, &dataset)?;
    }

    store::dataset_by_id(conn, dataset.id)
}

pub fn blocking_for(
    conn: &Connection,
    graph: &DependencyGraph,
    dataset: &Dataset,
) -> Result<Vec<String>, CatalogError> {
    let mut blocking = BTreeSet::new();
    let links = store::genome_datasets_for_dataset(conn, dataset.id)?;
    if links.is_empty() {
        let required = graph.resolve_dependencies(dataset.dataset_type_id)?;
        blocking.extend(
            required
                .into_iter()
                .filter(|id| *id != dataset.dataset_type_id),
        );
    }
    for link in &links {
        blocking.extend(graph.blocking_types(conn, link.genome_id, dataset.dataset_type_id)?);
    }
    let mut names = graph.names(blocking);

    for child in store::child_datasets(conn, dataset.id)? {
        if child.status.is_in_flight() {
            let child_type = graph.get(child.dataset_type_id)?;
            names.push(format!("{} (child {})", child_type.name, child.dataset_uuid));
        }
    }
    Ok(names)
}

// Children at any depth that are neither Processed nor Released.
fn unfinished_descendants(
    conn: &Connection,
    graph: &DependencyGraph,
    dataset_id: DatasetId,
) -> Result<Vec<String>, CatalogError> {
    let mut names = Vec::new();
    for child in store::child_datasets(conn, dataset_id)? {
        if !child.status.satisfies_dependency() {
            let child_type = graph.get(child.dataset_type_id)?;
            names.push(format!("{} (child {})", child_type.name, child.dataset_uuid));
        }
        names.extend(unfinished_descendants(conn, graph, child.id)?);
    }
    Ok(names)
}

fn release_descendants(
    conn: &Connection,
    graph: &DependencyGraph,
    dataset_id: DatasetId,
) -> Result<(), CatalogError> {
    for child in store::child_datasets(conn, dataset_id)? {
        match child.status {
            DatasetStatus::Processed => {
                transition(conn, graph, child.id, DatasetStatus::Released)?;
            }
            DatasetStatus::Released => release_descendants(conn, graph, child.id)?,
            _ => {}
        }
    }
    Ok(())
}

pub fn refresh_dependents(
    conn: &Connection,
    graph: &DependencyGraph,
    changed: &Dataset,
) -> Result<usize, CatalogError> {
    let dependent_types = graph.dependents_of(changed.dataset_type_id)?;
    if dependent_types.is_empty() {
        return Ok(0);
    }
    let mut refreshed = 0;
    for link in store::genome_datasets_for_dataset(conn, changed.id)? {
        for &dataset_type in &dependent_types {
            let eligible = graph.is_eligible(conn, link.genome_id, dataset_type)?;
            for dependent in store::datasets_for_genome(conn, link.genome_id, Some(dataset_type))? {
                if dependent.eligible != eligible {
                    store::set_dataset_eligible(conn, dependent.id, eligible)?;
                    refreshed += 1;
                }
            }
        }
    }
    tracing::debug!(dataset = %changed.dataset_uuid, refreshed, "refreshed dependent eligibility");
    Ok(refreshed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use DatasetStatus::*;

    #[test]
    fn forward_sequence_only() {
        assert_eq!(classify(Submitted, Processing), Step::Advance);
        assert_eq!(classify(Processing, Processed), Step::Advance);
        assert_eq!(classify(Processed, Released), Step::Advance);
        assert_eq!(classify(Submitted, Processed), Step::Illegal);
        assert_eq!(classify(Processing, Released), Step::Illegal);
        assert_eq!(classify(Released, Processing), Step::Illegal);
    }

    #[test]
    fn overrides_and_terminal_states() {
        for from in [Submitted, Processing, Processed] {
            assert_eq!(classify(from, Faulty), Step::Override);
            assert_eq!(classify(from, Suppressed), Step::Override);
        }
        assert_eq!(classify(Released, Suppressed), Step::Override);
        assert_eq!(classify(Released, Faulty), Step::Illegal);
        for to in DatasetStatus::ALL {
            if to != Faulty {
                assert_eq!(classify(Faulty, to), Step::Illegal);
            }
            if to != Suppressed {
                assert_eq!(classify(Suppressed, to), Step::Illegal);
            }
        }
    }

    #[test]
    fn same_status_is_unchanged() {
        for status in DatasetStatus::ALL {
            assert_eq!(classify(status, status), Step::Unchanged);
        }
    }
}
