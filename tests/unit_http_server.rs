use anyhow::Result;
use reqwest::StatusCode;
use serde_json::{Value, json};
use sheets_i18n::model::AuthType;
use sheets_i18n::server;

mod support;
use support::{DOC, TestDocument, USER_TOKEN};

struct TestServer {
    base_url: String,
    client: reqwest::Client,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn start(doc: &TestDocument) -> Result<Self> {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let state = doc.state.clone();
        let handle = tokio::spawn(async move {
            let _ = server::serve_listener(state, listener).await;
        });
        Ok(Self {
            base_url: format!("http://{addr}"),
            client: reqwest::Client::new(),
            handle,
        })
    }

    async fn post(&self, path: &str, token: Option<&str>, body: Value) -> Result<(StatusCode, Value)> {
        let mut request = self.client.post(format!("{}{path}", self.base_url)).json(&body);
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }
        let response = request.send().await?;
        let status = response.status();
        let body = response.json::<Value>().await?;
        Ok((status, body))
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn document() -> TestDocument {
    TestDocument::new(&[(
        "common",
        &[&["KEY", "English"], &["hello", "Hello"], &["hello", "Hi"]],
    )])
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn validate_fix_and_export_over_http() -> Result<()> {
    let doc = document();
    let server = TestServer::start(&doc).await?;

    let (status, body) = server
        .post(
            "/api/load-and-validate",
            Some(USER_TOKEN),
            json!({ "documentId": DOC }),
        )
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["isValid"], false);
    assert_eq!(body["validationIssues"][0]["fixes"][0]["type"], "duplicate_keys");

    let (status, body) = server
        .post(
            "/api/apply-fix",
            Some(USER_TOKEN),
            json!({ "documentId": DOC, "sheetTitle": "common", "fixType": "duplicate_keys" }),
        )
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["isValid"], true);
    assert_eq!(body["spreadsheet"]["sheets"][0]["rows"][1]["key"], "hello_2");

    let spreadsheet = body["spreadsheet"].clone();
    let (status, body) = server
        .post("/api/export", None, json!({ "spreadsheet": spreadsheet }))
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["English"]["common"]["hello_2"], "Hi");
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn format_errors_are_unprocessable_with_issues() -> Result<()> {
    let doc = document();
    let server = TestServer::start(&doc).await?;

    let (status, body) = server
        .post(
            "/api/get-spreadsheet",
            Some(USER_TOKEN),
            json!({ "documentId": DOC }),
        )
        .await?;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"]["kind"], "format_error");
    assert_eq!(
        body["error"]["details"]["validationIssues"][0]["sheetTitle"],
        "common"
    );
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn missing_bearer_token_uses_service_identity_only() -> Result<()> {
    let doc = document();
    doc.deny(AuthType::ServiceAccount);
    let server = TestServer::start(&doc).await?;

    let (status, body) = server
        .post("/api/load-and-validate", None, json!({ "documentId": DOC }))
        .await?;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"]["kind"], "permission_denied");
    assert_eq!(body["error"]["details"]["authType"], "service_account");

    let (status, _) = server
        .post(
            "/api/load-and-validate",
            Some(USER_TOKEN),
            json!({ "documentId": DOC }),
        )
        .await?;
    assert_eq!(status, StatusCode::OK);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn malformed_bodies_are_bad_requests() -> Result<()> {
    let doc = document();
    let server = TestServer::start(&doc).await?;

    let (status, body) = server
        .post("/api/add-row", Some(USER_TOKEN), json!({ "documentId": DOC }))
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["kind"], "invalid_input");
    assert_eq!(body["error"]["details"]["path"], "sheetId");

    let (status, body) = server
        .post(
            "/api/load-and-validate",
            Some(USER_TOKEN),
            json!({ "documentId": "https://example.com/nothing" }),
        )
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["details"]["path"], "documentId");
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn unknown_documents_are_not_found() -> Result<()> {
    let doc = document();
    let server = TestServer::start(&doc).await?;

    let (status, body) = server
        .post(
            "/api/load-and-validate",
            Some(USER_TOKEN),
            json!({ "documentId": "someOtherDocument" }),
        )
        .await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["kind"], "not_found");
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn operation_schemas_are_served() -> Result<()> {
    let doc = document();
    let server = TestServer::start(&doc).await?;

    let response = server
        .client
        .get(format!("{}/api/schema", server.base_url))
        .send()
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    let body = response.json::<Value>().await?;
    assert!(body["update-row"]["params"]["properties"]["rowNumber"].is_object());
    assert!(body["sync"]["result"]["properties"]["rowsWritten"].is_object());
    Ok(())
}
