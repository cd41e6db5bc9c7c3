use super::helpers::{entry, har, sample_interactions};
use contractwatch::analysis::{analyze_interactions, SensitiveDataType};
use contractwatch::errors::FormatError;
use contractwatch::traffic::{filter, group_by_endpoint, parse_str, summary_stats, FilterCriteria};

#[test]
fn test_fixture_skips_static_assets() {
    let interactions = sample_interactions();
    assert_eq!(interactions.len(), 5);
    assert!(interactions.iter().all(|i| !i.request.path.starts_with("/static")));
}

#[test]
fn test_fixture_fields_extracted() {
    let interactions = sample_interactions();
    let list = interactions
        .iter()
        .find(|i| i.request.query_params.contains_key("page"))
        .unwrap();
    assert_eq!(list.request.path, "/api/users");
    assert_eq!(list.request.domain, "api.example.com");
    assert_eq!(list.request.scheme, "https");
    assert_eq!(list.request.query_params["page"], "1");
    assert!(list.response.size > 0);

    let create = interactions.iter().find(|i| i.request.method == "POST").unwrap();
    assert_eq!(create.response.status, 201);
    assert!(create.request.body.as_deref().unwrap().contains("Linus"));
    assert_eq!(create.request.content_type.as_deref(), Some("application/json"));
}

#[test]
fn test_fixture_groups() {
    let groups = group_by_endpoint(&sample_interactions());
    let paths: Vec<&str> = groups.iter().map(|g| g.base_path.as_str()).collect();
    assert_eq!(paths, vec!["/api/orders/{uuid}", "/api/users/{id}"]);

    let users = &groups[1];
    assert_eq!(users.interactions.len(), 4);
    assert!(users.methods.contains("GET"));
    assert!(users.methods.contains("POST"));
    // ordered by capture time
    let times: Vec<_> = users.interactions.iter().map(|i| i.request.timestamp).collect();
    let mut sorted = times.clone();
    sorted.sort();
    assert_eq!(times, sorted);
}

#[test]
fn test_users_by_id_share_a_group() {
    let input = har(vec![
        entry("GET", "https://api.example.com/users/123", "2024-01-01T00:00:00Z", 200, "{}"),
        entry("GET", "https://api.example.com/users/456", "2024-01-01T00:00:01Z", 200, "{}"),
    ]);
    let groups = group_by_endpoint(&parse_str(&input).unwrap());
    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].base_path, "/users/{id}");
    assert_eq!(groups[0].interactions.len(), 2);
}

#[test]
fn test_malformed_logs_rejected() {
    assert!(matches!(parse_str("[]"), Err(FormatError::MissingField { .. })));
    assert!(matches!(parse_str("nope"), Err(FormatError::InvalidJson(_))));

    let missing_status = r#"{"log":{"entries":[{"request":{"method":"GET","url":"https://a/api/x"},"response":{}}]}}"#;
    match parse_str(missing_status) {
        Err(FormatError::MissingField { path }) => assert_eq!(path, "log.entries[0].response.status"),
        other => panic!("unexpected: {:?}", other),
    }
}

#[test]
fn test_summary_stats() {
    let summary = summary_stats(&sample_interactions());
    assert_eq!(summary.total_interactions, 5);
    assert_eq!(summary.unique_domains, 1);
    assert_eq!(summary.unique_endpoints, 2);
    assert_eq!(summary.methods["GET"], 4);
    assert_eq!(summary.methods["POST"], 1);
    assert_eq!(summary.status_codes[&404], 1);
    assert_eq!(summary.content_types["application/json"], 5);
}

#[test]
fn test_filter_by_method_and_status() {
    let interactions = sample_interactions();
    let criteria = FilterCriteria {
        methods: Some(vec!["get".to_string()]),
        status_codes: Some(vec![200]),
        ..Default::default()
    };
    let kept = filter(&interactions, &criteria);
    assert_eq!(kept.len(), 3);
    assert!(kept.iter().all(|i| i.request.method == "GET" && i.response.status == 200));
}

#[test]
fn test_sensitive_findings_in_fixture() {
    let findings = analyze_interactions(&sample_interactions());
    assert!(findings
        .iter()
        .any(|f| matches!(f.matched.data_type, SensitiveDataType::Jwt | SensitiveDataType::BearerToken)));
    assert!(findings.iter().all(|f| !f.severity.is_empty() && !f.recommendation.is_empty()));
}
