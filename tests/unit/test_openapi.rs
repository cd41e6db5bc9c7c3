use super::helpers::sample_interactions;
use contractwatch::errors::SynthesisError;
use contractwatch::openapi::{synthesize, validate_document, OpenApiDocument, ParameterLocation};
use contractwatch::traffic::group_by_endpoint;

fn sample_contract() -> OpenApiDocument {
    let groups = group_by_endpoint(&sample_interactions());
    synthesize(&groups, "Users API", "2.0.0", Some("recorded")).unwrap()
}

#[test]
fn test_sample_contract_shape() {
    let doc = sample_contract();
    assert_eq!(doc.openapi, "3.0.3");
    assert_eq!(doc.info.title, "Users API");
    assert_eq!(doc.servers.len(), 1);
    assert_eq!(doc.servers[0].url, "https://api.example.com");

    let paths: Vec<&str> = doc.paths.keys().map(String::as_str).collect();
    assert_eq!(paths, vec!["/api/orders/{uuid}", "/api/users", "/api/users/{id}"]);
    assert_eq!(doc.operation_count(), 4);
    assert!(validate_document(&doc).is_empty());
}

#[test]
fn test_path_and_query_parameters() {
    let doc = sample_contract();
    let by_id = &doc.paths["/api/users/{id}"]["get"];
    let id = by_id.path_parameters().next().unwrap();
    assert_eq!(id.name, "id");
    assert!(id.required);
    assert_eq!(id.schema["type"], "integer");

    let order = &doc.paths["/api/orders/{uuid}"]["get"];
    let uuid = order.path_parameters().next().unwrap();
    assert_eq!(uuid.schema["format"], "uuid");
    assert!(order.responses.contains_key("404"));

    let list = &doc.paths["/api/users"]["get"];
    let page = list
        .parameters
        .iter()
        .find(|p| p.location == ParameterLocation::Query)
        .unwrap();
    assert_eq!(page.name, "page");
    assert!(!page.required);
}

#[test]
fn test_operation_ids_unique() {
    let doc = sample_contract();
    let ops = doc.operations();
    let mut ids: Vec<&str> = ops.iter().map(|o| o.operation.operation_id.as_str()).collect();
    let total = ids.len();
    ids.sort();
    ids.dedup();
    assert_eq!(ids.len(), total);
    assert!(ids.contains(&"postUsers"));
}

#[test]
fn test_object_bodies_become_components() {
    let doc = sample_contract();
    let create = &doc.paths["/api/users"]["post"];
    let body = create.request_body.as_ref().unwrap();
    let media = &body.content["application/json"];
    let reference = media.schema["$ref"].as_str().unwrap();
    assert!(reference.starts_with("#/components/schemas/"));

    let resolved = doc.resolve_schema(&media.schema);
    assert_eq!(resolved["type"], "object");
    assert!(resolved["properties"]["email"].is_object());

    let (status, _, example) = create.success_example().unwrap();
    assert_eq!(status, 201);
    assert_eq!(example.unwrap()["id"], 789);
}

#[test]
fn test_yaml_and_json_reload() {
    let doc = sample_contract();
    let yaml = doc.to_yaml().unwrap();
    assert_eq!(OpenApiDocument::from_str_auto(&yaml).unwrap(), doc);
    let json = doc.to_json_pretty().unwrap();
    assert!(json.contains("\"operationId\""));
    assert_eq!(OpenApiDocument::from_str_auto(&json).unwrap(), doc);
    assert!(OpenApiDocument::from_json("{\"openapi\": 3}").is_err());
}

#[test]
fn test_no_interactions() {
    assert!(matches!(synthesize(&[], "t", "1", None), Err(SynthesisError::NoInteractions)));
}
