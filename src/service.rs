use std::io::{BufRead, Write};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::catalog::{Catalog, ReleaseFilter};
use crate::domain::{DatasetStatus, ReleaseId, ReleaseVersion};
use crate::error::CatalogError;

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "method", content = "params")]
pub enum Request {
    #[serde(rename = "GetGenomeByUUID")]
    GetGenomeByUuid { genome_uuid: Uuid },
    #[serde(rename = "GetGenomesByAssemblyAccessionID")]
    GetGenomesByAssemblyAccessionId { assembly_accession: String },
    GetGenomesByKeyword { keyword: String },
    GetGenomeByName { production_name: String },
    #[serde(rename = "GetGenomesByTaxonomyID")]
    GetGenomesByTaxonomyId { taxonomy_id: i64 },
    GetGenomeAssemblySequence {
        genome_uuid: Uuid,
        #[serde(default)]
        chromosomal_only: bool,
    },
    #[serde(rename = "GetDatasetsListByUUID")]
    GetDatasetsListByUuid { genome_uuid: Uuid },
    GetDatasetInformation {
        genome_uuid: Uuid,
        dataset_type: String,
        #[serde(default)]
        release_version: Option<ReleaseVersion>,
    },
    GetReleasesByReleaseVersion {
        genome_uuid: Uuid,
        dataset_type: String,
        release_version: ReleaseVersion,
    },
    GetRelease {
        #[serde(default)]
        site_name: Vec<String>,
        #[serde(default)]
        release_label: Vec<String>,
        #[serde(default)]
        current_only: bool,
    },
    #[serde(rename = "GetReleaseByUUID")]
    GetReleaseByUuid { genome_uuid: Uuid },
    GetOrganismsGroupCount { group: String },
    AttachDataset {
        genome_uuid: Uuid,
        dataset_uuid: Uuid,
        #[serde(default)]
        release_id: Option<ReleaseId>,
    },
    TransitionDatasetStatus {
        dataset_uuid: Uuid,
        status: DatasetStatus,
    },
    PromoteRelease { release_id: ReleaseId },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub kind: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorBody>,
}

impl Response {
    fn ok(value: Value) -> Self {
        Self {
            result: Some(value),
            error: None,
        }
    }

    fn failed(kind: &str, message: String) -> Self {
        Self {
            result: None,
            error: Some(ErrorBody {
                kind: kind.to_string(),
                message,
            }),
        }
    }
}

impl From<CatalogError> for Response {
    fn from(err: CatalogError) -> Self {
        Response::failed(err.kind(), err.to_string())
    }
}

pub fn handle(catalog: &mut Catalog, request: Request) -> Response {
    match dispatch(catalog, request) {
        Ok(value) => Response::ok(value),
        Err(err) => {
            tracing::debug!(kind = err.kind(), error = %err, "request failed");
            err.into()
        }
    }
}

pub fn handle_line(catalog: &mut Catalog, line: &str) -> Response {
    match serde_json::from_str::<Request>(line) {
        Ok(request) => handle(catalog, request),
        Err(err) => Response::failed("InvalidRequestError", err.to_string()),
    }
}

pub fn serve<R: BufRead, W: Write>(
    catalog: &mut Catalog,
    reader: R,
    mut writer: W,
) -> Result<usize, CatalogError> {
    let mut handled = 0;
    for line in reader.lines() {
        let line = line.map_err(|err| CatalogError::Storage(err.to_string()))?;
        if line.trim().is_empty() {
            continue;
        }
        let response = handle_line(catalog, &line);
        let encoded =
            serde_json::to_string(&response).map_err(|err| CatalogError::Storage(err.to_string()))?;
        writeln!(writer, "{encoded}").map_err(|err| CatalogError::Storage(err.to_string()))?;
        writer
            .flush()
            .map_err(|err| CatalogError::Storage(err.to_string()))?;
        handled += 1;
    }
    tracing::info!(handled, "request stream closed");
    Ok(handled)
}

fn dispatch(catalog: &mut Catalog, request: Request) -> Result<Value, CatalogError> {
    match request {
        Request::GetGenomeByUuid { genome_uuid } => to_value(catalog.genome(&genome_uuid)?),
        Request::GetGenomesByAssemblyAccessionId { assembly_accession } => {
            to_value(catalog.genomes_by_assembly_accession(&assembly_accession)?)
        }
        Request::GetGenomesByKeyword { keyword } => to_value(catalog.genomes_by_keyword(&keyword)?),
        Request::GetGenomeByName { production_name } => {
            to_value(catalog.genomes_by_production_name(&production_name)?)
        }
        Request::GetGenomesByTaxonomyId { taxonomy_id } => {
            to_value(catalog.genomes_by_taxonomy_id(taxonomy_id)?)
        }
        Request::GetGenomeAssemblySequence {
            genome_uuid,
            chromosomal_only,
        } => to_value(catalog.assembly_sequences(&genome_uuid, chromosomal_only)?),
        Request::GetDatasetsListByUuid { genome_uuid } => {
            to_value(catalog.datasets_for_genome(&genome_uuid)?)
        }
        Request::GetDatasetInformation {
            genome_uuid,
            dataset_type,
            release_version,
        } => to_value(catalog.dataset_information(&genome_uuid, &dataset_type, release_version)?),
        Request::GetReleasesByReleaseVersion {
            genome_uuid,
            dataset_type,
            release_version,
        } => to_value(catalog.release_versions(&genome_uuid, &dataset_type, release_version)?),
        Request::GetRelease {
            site_name,
            release_label,
            current_only,
        } => to_value(catalog.releases(&ReleaseFilter {
            site_names: site_name,
            labels: release_label,
            current_only,
        })?),
        Request::GetReleaseByUuid { genome_uuid } => {
            to_value(catalog.releases_for_genome(&genome_uuid)?)
        }
        Request::GetOrganismsGroupCount { group } => {
            to_value(catalog.organism_group_counts(&group)?)
        }
        Request::AttachDataset {
            genome_uuid,
            dataset_uuid,
            release_id,
        } => to_value(catalog.attach_dataset(&genome_uuid, &dataset_uuid, release_id)?),
        Request::TransitionDatasetStatus {
            dataset_uuid,
            status,
        } => to_value(catalog.transition_dataset(&dataset_uuid, status)?),
        Request::PromoteRelease { release_id } => to_value(catalog.promote_release(release_id)?),
    }
}

fn to_value<T: Serialize>(value: T) -> Result<Value, CatalogError> {
    serde_json::to_value(value).map_err(|err| CatalogError::Storage(err.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_tagged_request() {
        let request: Request = serde_json::from_str(
            r#"{"method":"TransitionDatasetStatus","params":{"dataset_uuid":"6f2b0f1e-6a52-4a8f-9a43-1c2d3e4f5a6b","status":"Processing"}}"#,
        )
        .unwrap();
        assert!(matches!(
            request,
            Request::TransitionDatasetStatus {
                status: DatasetStatus::Processing,
                ..
            }
        ));
    }

    #[test]
    fn error_response_omits_result() {
        let response: Response = CatalogError::not_found("genome", "x").into();
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["error"]["kind"], "NotFoundError");
        assert!(json.get("result").is_none());
    }
}
