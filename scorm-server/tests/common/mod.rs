//! Shared test utilities for scorm-server integration tests

pub mod client;

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use scorm_core::reporting::ReportingError;
use scorm_core::{
    AttemptId, AttemptStore, CompactionConfig, GradeReporter, GradingMethod, OutcomeSubmission,
    ResourceId, SqliteLedger, StaticSessions, SystemClock, UserId,
};
use scorm_server::{AppState, AuthLayer, Collaborators, ScormServer, ServerConfig};
use tokio::net::TcpListener;

pub const ALICE_TOKEN: &str = "alice-token";
pub const BOB_TOKEN: &str = "bob-token";

/// Grade reporter that keeps every submission
#[derive(Default)]
pub struct RecordingGrades {
    pub submissions: Mutex<Vec<OutcomeSubmission>>,
}

#[async_trait]
impl GradeReporter for RecordingGrades {
    async fn transmit(&self, submission: &OutcomeSubmission) -> Result<(), ReportingError> {
        self.submissions.lock().unwrap().push(submission.clone());
        Ok(())
    }
}

/// A running test server with one resource and one attempt owned by alice
///
/// Alice is the only admin.
#[allow(dead_code)]
pub struct TestServer {
    pub addr: SocketAddr,
    pub state: Arc<AppState>,
    pub store: Arc<SqliteLedger>,
    pub grades: Arc<RecordingGrades>,
    pub resource: ResourceId,
    pub attempt: AttemptId,
}

impl TestServer {
    #[allow(dead_code)]
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

pub fn sessions() -> AuthLayer {
    AuthLayer::new(Arc::new(
        StaticSessions::default()
            .with_token(ALICE_TOKEN, UserId::new("alice"))
            .with_token(BOB_TOKEN, UserId::new("bob")),
    ))
}

/// Creates a test server over an in-memory store
#[allow(dead_code)]
pub async fn create_test_server() -> TestServer {
    let store = Arc::new(SqliteLedger::open_in_memory().unwrap());
    create_test_server_with_store(store).await
}

/// Creates a test server over the given store
#[allow(dead_code)]
pub async fn create_test_server_with_store(store: Arc<SqliteLedger>) -> TestServer {
    let resource = store.create_resource("Quiz", GradingMethod::Highest).unwrap();
    let attempt = store
        .create_attempt(resource.id, &UserId::new("alice"), Utc::now())
        .unwrap();

    let grades = Arc::new(RecordingGrades::default());
    let collaborators = Collaborators {
        grades: grades.clone(),
        ..Collaborators::logging()
    };
    let state = Arc::new(AppState::with_components(
        store.clone(),
        store.clone(),
        collaborators,
        CompactionConfig {
            enabled: false,
            ..CompactionConfig::default()
        },
        Arc::new(SystemClock),
    )
    .with_admins([UserId::new("alice")]));

    let server = ScormServer::new(ServerConfig::default(), Arc::clone(&state)).with_auth(sessions());
    let addr = spawn_server(server).await;

    TestServer {
        addr,
        state,
        store,
        grades,
        resource: resource.id,
        attempt: attempt.id,
    }
}

/// Spawns server in background task, returns bound address
async fn spawn_server(server: ScormServer) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let _ = server.run_with_listener(listener).await;
    });

    // Brief delay to ensure server is accepting connections
    tokio::time::sleep(std::time::Duration::from_millis(10)).await;

    addr
}

/// Poll until `check` holds or five seconds pass
#[allow(dead_code)]
pub async fn eventually(mut check: impl FnMut() -> bool) {
    let deadline = tokio::time::Instant::now() + std::time::Duration::from_secs(5);
    while !check() {
        assert!(tokio::time::Instant::now() < deadline, "condition never held");
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
}
