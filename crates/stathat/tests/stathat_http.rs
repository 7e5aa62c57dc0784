use std::sync::Arc;

use multilog::Level;
use multilog::LogRouter;
use multilog::MemorySink;
use similar_asserts::assert_eq;
use stathat::Pipeline;
use stathat::StatHatConfig;
use stathat::StatHatSink;
use test_log::test;
use wiremock::matchers::body_string_contains;
use wiremock::matchers::method;
use wiremock::matchers::path;
use wiremock::Mock;
use wiremock::MockServer;
use wiremock::ResponseTemplate;

async fn pipeline_against(server: &MockServer, router: Arc<LogRouter>) -> Pipeline {
    let sink = StatHatSink::new(StatHatConfig::default().with_endpoint(format!("{}/ez", server.uri())))
        .expect("should build sink");

    Pipeline::builder()
        .with_api_key("secret")
        .with_prefix("[svc]")
        .spawn_with_env(Arc::new(sink), router, |_| None)
        .expect("pipeline should start")
}

#[test(tokio::test)]
async fn counts_and_measures_reach_the_ez_api() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/ez"))
        .and(body_string_contains("ezkey=secret"))
        .and(body_string_contains("stat=%5Bsvc%5D+users"))
        .and(body_string_contains("count=2"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/ez"))
        .and(body_string_contains("stat=%5Bsvc%5D+latency"))
        .and(body_string_contains("value=12.5"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let pipeline = pipeline_against(&server, Arc::new(LogRouter::new())).await;
    pipeline.client().count("users", 2);
    pipeline.client().measure("latency", 12.5);

    let report = pipeline.shutdown().await;
    assert_eq!(report.total().shipped, 2);
    assert_eq!(report.total().failed, 0);
}

#[test(tokio::test)]
async fn rejected_posts_are_logged_as_warnings() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500).set_body_string("bad key"))
        .expect(1)
        .mount(&server)
        .await;

    let memory = Arc::new(MemorySink::with_level(Level::Warning));
    let router = Arc::new(LogRouter::new());
    router.add(memory.clone());

    let pipeline = pipeline_against(&server, router).await;
    pipeline.client().count("users", 1);

    let report = pipeline.shutdown().await;
    assert_eq!(report.counts.failed, 1);
    assert!(memory.contains("[WARNING] failed to ship count [svc] users"));
    assert!(memory.contains("bad key"));
}
