mod common;

use std::io::Cursor;

use kira_genome_catalog::domain::DatasetStatus;
use kira_genome_catalog::service::{self, Response};
use serde_json::{Value, json};

use common::{HUMAN, catalog, dataset, genome, release};

fn call(catalog: &mut kira_genome_catalog::catalog::Catalog, request: Value) -> Response {
    service::handle_line(catalog, &request.to_string())
}

fn result(response: Response) -> Value {
    assert_eq!(response.error, None);
    response.result.unwrap()
}

fn error_kind(response: &Response) -> &str {
    assert!(response.result.is_none());
    &response.error.as_ref().unwrap().kind
}

#[test]
fn genome_methods() {
    let mut catalog = catalog();
    let human = genome(&catalog, HUMAN);

    let record = result(call(
        &mut catalog,
        json!({"method": "GetGenomeByUUID", "params": {"genome_uuid": human}}),
    ));
    assert_eq!(record["production_name"], HUMAN);
    assert_eq!(record["organism"]["taxonomy_id"], 9606);

    let by_name = result(call(
        &mut catalog,
        json!({"method": "GetGenomeByName", "params": {"production_name": HUMAN}}),
    ));
    assert_eq!(by_name.as_array().unwrap().len(), 1);

    let by_accession = result(call(
        &mut catalog,
        json!({"method": "GetGenomesByAssemblyAccessionID", "params": {"assembly_accession": "GCA_000001635.9"}}),
    ));
    assert_eq!(by_accession[0]["organism"]["production_name"], "mus_musculus");

    let by_keyword = result(call(
        &mut catalog,
        json!({"method": "GetGenomesByKeyword", "params": {"keyword": "sapiens"}}),
    ));
    assert_eq!(by_keyword.as_array().unwrap().len(), 1);

    let sequences = result(call(
        &mut catalog,
        json!({"method": "GetGenomeAssemblySequence", "params": {"genome_uuid": human, "chromosomal_only": true}}),
    ));
    assert_eq!(sequences.as_array().unwrap().len(), 2);

    let groups = result(call(
        &mut catalog,
        json!({"method": "GetOrganismsGroupCount", "params": {"group": "vertebrates"}}),
    ));
    assert_eq!(groups.as_array().unwrap().len(), 2);
}

#[test]
fn write_methods_go_through_the_envelope() {
    let mut catalog = catalog();
    let human = genome(&catalog, HUMAN);
    let assembly = dataset(&mut catalog, human, "assembly");

    let moved = result(call(
        &mut catalog,
        json!({"method": "TransitionDatasetStatus", "params": {"dataset_uuid": assembly.dataset_uuid, "status": "Processing"}}),
    ));
    assert_eq!(moved["status"], "Processing");

    let link = result(call(
        &mut catalog,
        json!({"method": "AttachDataset", "params": {"genome_uuid": human, "dataset_uuid": assembly.dataset_uuid}}),
    ));
    assert_eq!(link["is_current"], true);

    let listed = result(call(
        &mut catalog,
        json!({"method": "GetDatasetsListByUUID", "params": {"genome_uuid": human}}),
    ));
    assert_eq!(listed[0]["dataset_type"], "assembly");
    assert_eq!(listed[0]["is_current"], true);
}

#[test]
fn release_methods() {
    let mut catalog = catalog();
    let human = genome(&catalog, HUMAN);
    let r1 = release(&catalog, "rapid", "110.1");
    common::publish(&mut catalog, &r1);

    let promoted = result(call(
        &mut catalog,
        json!({"method": "PromoteRelease", "params": {"release_id": r1.id}}),
    ));
    assert_eq!(promoted["is_current"], true);

    let releases = result(call(
        &mut catalog,
        json!({"method": "GetRelease", "params": {"site_name": ["rapid"], "current_only": true}}),
    ));
    assert_eq!(releases.as_array().unwrap().len(), 1);

    let by_genome = result(call(
        &mut catalog,
        json!({"method": "GetReleaseByUUID", "params": {"genome_uuid": human}}),
    ));
    assert!(by_genome.as_array().unwrap().is_empty());

    let versions = result(call(
        &mut catalog,
        json!({"method": "GetReleasesByReleaseVersion", "params": {"genome_uuid": human, "dataset_type": "genebuild", "release_version": 110.2}}),
    ));
    assert!(versions.as_array().unwrap().is_empty());

    let again = call(
        &mut catalog,
        json!({"method": "PromoteRelease", "params": {"release_id": r1.id}}),
    );
    assert_eq!(error_kind(&again), "AlreadyCurrentError");
}

#[test]
fn errors_carry_a_kind() {
    let mut catalog = catalog();
    let human = genome(&catalog, HUMAN);
    let assembly = dataset(&mut catalog, human, "assembly");

    let missing = call(
        &mut catalog,
        json!({"method": "GetGenomeByUUID", "params": {"genome_uuid": uuid::Uuid::new_v4()}}),
    );
    assert_eq!(error_kind(&missing), "NotFoundError");

    let illegal = call(
        &mut catalog,
        json!({"method": "TransitionDatasetStatus", "params": {"dataset_uuid": assembly.dataset_uuid, "status": "Released"}}),
    );
    assert_eq!(error_kind(&illegal), "IllegalTransitionError");
    assert_eq!(
        catalog.dataset(&assembly.dataset_uuid).unwrap().status,
        DatasetStatus::Submitted
    );

    let bad_accession = call(
        &mut catalog,
        json!({"method": "GetGenomesByAssemblyAccessionID", "params": {"assembly_accession": "GRCh38"}}),
    );
    assert_eq!(error_kind(&bad_accession), "InvalidArgumentError");

    let unknown = service::handle_line(&mut catalog, r#"{"method":"DropEverything","params":{}}"#);
    assert_eq!(error_kind(&unknown), "InvalidRequestError");
    let garbage = service::handle_line(&mut catalog, "not json");
    assert_eq!(error_kind(&garbage), "InvalidRequestError");
}

#[test]
fn serve_answers_one_line_per_request() {
    let mut catalog = catalog();
    let human = genome(&catalog, HUMAN);
    let input = format!(
        "{}\n\n{}\n",
        json!({"method": "GetGenomeByUUID", "params": {"genome_uuid": human}}),
        json!({"method": "GetGenomesByTaxonomyID", "params": {"taxonomy_id": 7955}}),
    );
    let mut output = Vec::new();
    let handled = service::serve(&mut catalog, Cursor::new(input), &mut output).unwrap();
    assert_eq!(handled, 2);

    let lines: Vec<Response> = String::from_utf8(output)
        .unwrap()
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();
    assert_eq!(lines.len(), 2);
    assert!(lines[0].result.is_some());
    assert_eq!(error_kind(&lines[1]), "NotFoundError");
}
