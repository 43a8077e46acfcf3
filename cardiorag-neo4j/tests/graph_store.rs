use httpmock::prelude::*;
use serde_json::json;
use cardiorag_cypher::{guard, GraphSchema, GraphStore, GraphStoreError, ReadOnlyQuery};
use cardiorag_neo4j::{Neo4jClient, Neo4jGraphStore};

fn store(server: &MockServer) -> Neo4jGraphStore {
    let client = Neo4jClient::builder()
        .uri(server.url(""))
        .user("neo4j")
        .password("secret")
        .build()
        .expect("client should build");
    Neo4jGraphStore::new(client)
}

fn query(text: &str) -> ReadOnlyQuery {
    guard::check(text, &GraphSchema::cardiovascular()).expect("query should pass the guard")
}

#[tokio::test]
async fn execute_posts_read_transaction_and_zips_columns() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(POST)
            .path("/db/neo4j/tx/commit")
            .header("access-mode", "READ")
            // base64("neo4j:secret")
            .header("authorization", "Basic bmVvNGo6c2VjcmV0")
            .body_contains("MATCH (d:Domain) RETURN d.Name AS name, d.Url AS url");
        then.status(200).json_body(json!({
            "results": [{
                "columns": ["name", "url"],
                "data": [
                    {"row": ["Mayo Clinic", "mayoclinic.org"], "meta": [null, null]},
                    {"row": ["AHA", null], "meta": [null, null]}
                ]
            }],
            "errors": []
        }));
    });

    let rows = store(&server)
        .execute(&query("MATCH (d:Domain) RETURN d.Name AS name, d.Url AS url"))
        .await
        .expect("execute");

    mock.assert();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0]["name"], json!("Mayo Clinic"));
    assert_eq!(rows[0]["url"], json!("mayoclinic.org"));
    assert_eq!(rows[1]["url"], json!(null));
}

#[tokio::test]
async fn cypher_errors_surface_as_query_errors() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(POST).path("/db/neo4j/tx/commit");
        then.status(200).json_body(json!({
            "results": [],
            "errors": [{
                "code": "Neo.ClientError.Statement.SyntaxError",
                "message": "Invalid input 'RETRUN'"
            }]
        }));
    });

    let err = store(&server)
        .execute(&query("MATCH (p:Post) RETURN p.ResourceId"))
        .await
        .expect_err("syntax errors should fail");

    match err {
        GraphStoreError::Query { code, message } => {
            assert_eq!(code, "Neo.ClientError.Statement.SyntaxError");
            assert!(message.contains("RETRUN"));
        }
        other => panic!("expected query error, got {other:?}"),
    }
}

#[tokio::test]
async fn unauthorized_responses_are_connection_errors() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(POST).path("/db/neo4j/tx/commit");
        then.status(401).json_body(json!({
            "errors": [{
                "code": "Neo.ClientError.Security.Unauthorized",
                "message": "Invalid username or password."
            }]
        }));
    });

    let err = store(&server)
        .execute(&query("MATCH (p:Post) RETURN p.ResourceId"))
        .await
        .expect_err("401 should fail");

    match err {
        GraphStoreError::Connection(message) => {
            assert!(message.contains("401"));
            assert!(message.contains("Unauthorized"));
        }
        other => panic!("expected connection error, got {other:?}"),
    }
}

#[tokio::test]
async fn undecodable_body_is_invalid_response() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(POST).path("/db/neo4j/tx/commit");
        then.status(200).body("not-json");
    });

    let err = store(&server)
        .execute(&query("MATCH (p:Post) RETURN p.ResourceId"))
        .await
        .expect_err("invalid json should fail");

    assert!(matches!(err, GraphStoreError::InvalidResponse(_)));
}

#[tokio::test]
async fn ragged_records_are_rejected() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(POST).path("/db/neo4j/tx/commit");
        then.status(200).json_body(json!({
            "results": [{"columns": ["a", "b"], "data": [{"row": [1]}]}],
            "errors": []
        }));
    });

    let err = store(&server)
        .execute(&query("MATCH (p:Post) RETURN p.ResourceId"))
        .await
        .expect_err("ragged rows should fail");

    assert!(matches!(err, GraphStoreError::InvalidResponse(m) if m.contains("1 values for 2 columns")));
}
