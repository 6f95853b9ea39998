// A type's effective dependencies are its own `depends_on` together with
// the `depends_on` of every ancestor reached through `parent_id`. The parent
// itself is not a prerequisite of its children.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use rusqlite::Connection;

use crate::domain::{DatasetTypeId, GenomeId};
use crate::error::CatalogError;
use crate::model::{Dataset, DatasetType, NewDatasetType};
use crate::store;

#[derive(Debug, Clone)]
pub struct DependencyGraph {
    types: BTreeMap<DatasetTypeId, DatasetType>,
    by_name: HashMap<String, DatasetTypeId>,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    Visiting,
    Done,
}

impl DependencyGraph {
    pub fn build(types: &[DatasetType]) -> Result<Self, CatalogError> {
        let types: BTreeMap<DatasetTypeId, DatasetType> =
            types.iter().map(|t| (t.id, t.clone())).collect();
        let by_name = types
            .values()
            .map(|t| (t.name.clone(), t.id))
            .collect::<HashMap<_, _>>();
        let graph = Self { types, by_name };

        for dataset_type in graph.types.values() {
            let referenced = dataset_type.parent_id.iter().chain(&dataset_type.depends_on);
            for id in referenced {
                if !graph.types.contains_key(id) {
                    return Err(CatalogError::UnknownDependency {
                        dataset_type: dataset_type.name.clone(),
                        dependency: id.to_string(),
                    });
                }
            }
        }
        graph.check_acyclic()?;
        Ok(graph)
    }

    pub fn load(conn: &Connection) -> Result<Self, CatalogError> {
        Self::build(&store::dataset_types(conn)?)
    }

    pub fn get(&self, id: DatasetTypeId) -> Result<&DatasetType, CatalogError> {
        self.types
            .get(&id)
            .ok_or_else(|| CatalogError::not_found("dataset type", id))
    }

    pub fn by_name(&self, name: &str) -> Result<&DatasetType, CatalogError> {
        self.by_name
            .get(name)
            .and_then(|id| self.types.get(id))
            .ok_or_else(|| CatalogError::not_found("dataset type", name))
    }

    pub fn types(&self) -> impl Iterator<Item = &DatasetType> {
        self.types.values()
    }

    pub fn names(&self, ids: impl IntoIterator<Item = DatasetTypeId>) -> Vec<String> {
        ids.into_iter()
            .map(|id| {
                self.types
                    .get(&id)
                    .map(|t| t.name.clone())
                    .unwrap_or_else(|| id.to_string())
            })
            .collect()
    }

    pub fn effective_dependencies(
        &self,
        id: DatasetTypeId,
    ) -> Result<BTreeSet<DatasetTypeId>, CatalogError> {
        let mut deps = BTreeSet::new();
        let mut seen = BTreeSet::new();
        let mut current = Some(id);
        while let Some(type_id) = current {
            if !seen.insert(type_id) {
                return Err(self.cycle_error(seen.into_iter().collect()));
            }
            let dataset_type = self.get(type_id)?;
            deps.extend(dataset_type.depends_on.iter().copied());
            current = dataset_type.parent_id;
        }
        deps.remove(&id);
        Ok(deps)
    }

    /// Every type `id` transitively requires, followed by `id` itself.
    /// Dependencies always precede their dependents.
    pub fn resolve_dependencies(
        &self,
        id: DatasetTypeId,
    ) -> Result<Vec<DatasetTypeId>, CatalogError> {
        let mut order = Vec::new();
        let mut marks = HashMap::new();
        let mut stack = Vec::new();
        self.visit(id, &mut marks, &mut stack, &mut order)?;
        Ok(order)
    }

    fn visit(
        &self,
        id: DatasetTypeId,
        marks: &mut HashMap<DatasetTypeId, Mark>,
        stack: &mut Vec<DatasetTypeId>,
        order: &mut Vec<DatasetTypeId>,
    ) -> Result<(), CatalogError> {
        match marks.get(&id) {
            Some(Mark::Done) => return Ok(()),
            Some(Mark::Visiting) => {
                let start = stack.iter().position(|t| *t == id).unwrap_or(0);
                let mut path = stack[start..].to_vec();
                path.push(id);
                return Err(self.cycle_error(path));
            }
            None => {}
        }
        marks.insert(id, Mark::Visiting);
        stack.push(id);
        for dependency in self.effective_dependencies(id)? {
            self.visit(dependency, marks, stack, order)?;
        }
        stack.pop();
        marks.insert(id, Mark::Done);
        order.push(id);
        Ok(())
    }

    pub fn dependents_of(&self, id: DatasetTypeId) -> Result<Vec<DatasetTypeId>, CatalogError> {
        let mut dependents = Vec::new();
        for &candidate in self.types.keys() {
            if candidate == id {
                continue;
            }
            if self.resolve_dependencies(candidate)?.contains(&id) {
                dependents.push(candidate);
            }
        }
        Ok(dependents)
    }

    pub fn blocking_among(
        &self,
        id: DatasetTypeId,
        datasets: &[Dataset],
    ) -> Result<BTreeSet<DatasetTypeId>, CatalogError> {
        let satisfied: BTreeSet<DatasetTypeId> = datasets
            .iter()
            .filter(|d| d.status.satisfies_dependency())
            .map(|d| d.dataset_type_id)
            .collect();
        Ok(self
            .resolve_dependencies(id)?
            .into_iter()
            .filter(|t| *t != id && !satisfied.contains(t))
            .collect())
    }

    pub fn blocking_types(
        &self,
        conn: &Connection,
        genome_id: GenomeId,
        id: DatasetTypeId,
    ) -> Result<BTreeSet<DatasetTypeId>, CatalogError> {
        let datasets = store::datasets_for_genome(conn, genome_id, None)?;
        self.blocking_among(id, &datasets)
    }

    pub fn is_eligible(
        &self,
        conn: &Connection,
        genome_id: GenomeId,
        id: DatasetTypeId,
    ) -> Result<bool, CatalogError> {
        let blocking = self.blocking_types(conn, genome_id, id)?;
        tracing::debug!(
            genome = %genome_id,
            dataset_type = %id,
            blocking = blocking.len(),
            "resolved eligibility"
        );
        Ok(blocking.is_empty())
    }

    fn check_acyclic(&self) -> Result<(), CatalogError> {
        let mut marks = HashMap::new();
        for &id in self.types.keys() {
            let mut stack = Vec::new();
            self.walk_edges(id, &mut marks, &mut stack)?;
        }
        Ok(())
    }

    // Walks parent and depends_on edges together; a cycle in either counts.
    fn walk_edges(
        &self,
        id: DatasetTypeId,
        marks: &mut HashMap<DatasetTypeId, Mark>,
        stack: &mut Vec<DatasetTypeId>,
    ) -> Result<(), CatalogError> {
        match marks.get(&id) {
            Some(Mark::Done) => return Ok(()),
            Some(Mark::Visiting) => {
                let start = stack.iter().position(|t| *t == id).unwrap_or(0);
                let mut path = stack[start..].to_vec();
                path.push(id);
                return Err(self.cycle_error(path));
            }
            None => {}
        }
        marks.insert(id, Mark::Visiting);
        stack.push(id);
        let dataset_type = self.get(id)?;
        for next in dataset_type.parent_id.iter().chain(&dataset_type.depends_on) {
            self.walk_edges(*next, marks, stack)?;
        }
        stack.pop();
        marks.insert(id, Mark::Done);
        Ok(())
    }

    fn cycle_error(&self, path: Vec<DatasetTypeId>) -> CatalogError {
        CatalogError::Cycle {
            path: self.names(path),
        }
    }
}

pub fn parse_depends_on(value: &str) -> Vec<String> {
    value
        .split([',', ';'])
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .collect()
}

pub fn register_dataset_type(
    conn: &Connection,
    name: &str,
    label: &str,
    topic: &str,
    description: Option<&str>,
    parent: Option<&str>,
    depends_on: &[String],
) -> Result<DatasetType, CatalogError> {
    let graph = DependencyGraph::load(conn)?;
    let lookup = |dependency: &str| {
        graph
            .by_name(dependency)
            .map(|t| t.id)
            .map_err(|_| CatalogError::UnknownDependency {
                dataset_type: name.to_string(),
                dependency: dependency.to_string(),
            })
    };
    let parent_id = parent.map(lookup).transpose()?;
    let depends_on = depends_on
        .iter()
        .map(|dependency| lookup(dependency))
        .collect::<Result<Vec<_>, _>>()?;

    let created = store::insert_dataset_type(
        conn,
        &NewDatasetType {
            name: name.to_string(),
            label: label.to_string(),
            topic: topic.to_string(),
            description: description.map(str::to_string),
            parent_id,
            depends_on,
        },
    )?;
    // revalidate with the new node in place; an error rolls the insert back
    DependencyGraph::load(conn)?;
    tracing::info!(dataset_type = %created.name, "registered dataset type");
    Ok(created)
}
