//! Integration tests for the crawler
//!
//! These tests use wiremock to create mock HTTP servers and run the full
//! crawl cycle end-to-end: robots.txt, HTTP capture, storage, link
//! expansion and captioning.

use pagescribe::caption::{CaptionService, ProviderRegistry};
use pagescribe::capture::HttpRenderer;
use pagescribe::config::Config;
use pagescribe::crawler::{CrawlOptions, Orchestrator};
use pagescribe::robots::RobotsGate;
use pagescribe::state::JobStatus;
use pagescribe::storage::{self, open_storage, SharedStorage, Storage};
use pagescribe::CrawlError;
use std::sync::Arc;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const UA: &str = "pagescribe-test/1.0";

/// Creates a test configuration for crawling a mock server
fn create_test_config(max_depth: u32, data_dir: &std::path::Path) -> Config {
    let mut config = Config::default();
    config.crawler.max_depth = max_depth;
    config.crawler.rate_limit = 10; // Very short for testing
    config.crawler.concurrency = 2;
    config.crawler.timeout = 5000;
    config.crawler.max_retries = 1;
    config.crawler.user_agent = UA.to_string();
    config.storage.data_dir = data_dir.to_string_lossy().into_owned();
    config.storage.db_path = data_dir.join("test.db").to_string_lossy().into_owned();
    config
}

/// Builds an orchestrator that talks plain HTTP to the mock server
fn create_orchestrator(config: Config, captioner: Option<CaptionService>) -> (Orchestrator, SharedStorage) {
    let storage = storage::shared(open_storage(std::path::Path::new(&config.storage.db_path)).unwrap());
    let renderer = Arc::new(HttpRenderer::new(&config.crawler).unwrap());
    let robots = config
        .crawler
        .respect_robots_txt
        .then(|| RobotsGate::new(UA).unwrap().with_scheme("http"));

    let orchestrator =
        Orchestrator::with_robots_gate(config, storage.clone(), renderer, captioner, robots);
    (orchestrator, storage)
}

async fn mount_page(server: &MockServer, page: &str, body: String) {
    Mock::given(method("GET"))
        .and(path(page))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/html"))
        .mount(server)
        .await;
}

async fn mount_robots(server: &MockServer, body: &str) {
    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(server)
        .await;
}

/// Home links to two pages, page1 links one level deeper
async fn mount_site(server: &MockServer) {
    let base = server.uri();
    mount_page(
        server,
        "/",
        format!(
            r#"<html><head><title>Home</title></head><body>
            <a href="{base}/page1">Page 1</a>
            <a href="/page2">Page 2</a>
            <a href="https://external.example.org/">External</a>
            </body></html>"#
        ),
    )
    .await;
    mount_page(
        server,
        "/page1",
        r#"<html><head><title>Page 1</title></head><body>
            <a href="/">Home</a><a href="/deep">Deep</a></body></html>"#
            .to_string(),
    )
    .await;
    mount_page(
        server,
        "/page2",
        "<html><head><title>Page 2</title></head><body>Leaf</body></html>".to_string(),
    )
    .await;
    mount_page(
        server,
        "/deep",
        "<html><head><title>Deep</title></head><body>Bottom</body></html>".to_string(),
    )
    .await;
}

#[tokio::test]
async fn test_full_crawl_single_domain() {
    let server = MockServer::start().await;
    mount_robots(&server, "User-agent: *\nAllow: /").await;
    mount_site(&server).await;

    let dir = tempfile::tempdir().unwrap();
    let (orchestrator, storage) = create_orchestrator(create_test_config(2, dir.path()), None);

    let seed = format!("{}/", server.uri());
    assert_eq!(orchestrator.add_seeds(&[seed.as_str()]).unwrap(), 1);

    let stats = orchestrator.crawl(CrawlOptions::default()).await.unwrap();

    assert_eq!(stats.urls_crawled, 4);
    assert_eq!(stats.urls_discovered, 4);
    assert_eq!(stats.urls_failed, 0);

    let store = storage::lock(&storage).unwrap();
    assert_eq!(store.count_captures().unwrap(), 4);
    assert_eq!(store.count_jobs_by_status(JobStatus::Completed).unwrap(), 4);

    let home = store.get_capture_by_url(&seed).unwrap().unwrap();
    assert_eq!(home.title.as_deref(), Some("Home"));
    assert_eq!(home.depth, 0);

    let deep = store
        .get_capture_by_url(&format!("{}/deep", server.uri()))
        .unwrap()
        .unwrap();
    assert_eq!(deep.depth, 2);
}

#[tokio::test]
async fn test_max_depth_zero_captures_only_seed() {
    let server = MockServer::start().await;
    mount_robots(&server, "User-agent: *\nAllow: /").await;
    mount_site(&server).await;

    let dir = tempfile::tempdir().unwrap();
    let (orchestrator, storage) = create_orchestrator(create_test_config(0, dir.path()), None);

    orchestrator
        .add_seeds(&[format!("{}/", server.uri())])
        .unwrap();
    let stats = orchestrator.crawl(CrawlOptions::default()).await.unwrap();

    assert_eq!(stats.urls_crawled, 1);
    assert_eq!(stats.urls_discovered, 1);

    let store = storage::lock(&storage).unwrap();
    assert_eq!(store.count_jobs_by_status(JobStatus::Completed).unwrap(), 1);
    assert!(!store
        .job_exists_by_url(&format!("{}/page1", server.uri()))
        .unwrap());
}

#[tokio::test]
async fn test_robots_txt_respect() {
    let server = MockServer::start().await;
    mount_robots(&server, "User-agent: *\nDisallow: /page1\n").await;
    mount_site(&server).await;

    let dir = tempfile::tempdir().unwrap();
    let (orchestrator, storage) = create_orchestrator(create_test_config(1, dir.path()), None);

    orchestrator
        .add_seeds(&[format!("{}/", server.uri())])
        .unwrap();
    let stats = orchestrator.crawl(CrawlOptions::default()).await.unwrap();

    // page1 is queued but skipped without a fetch
    assert_eq!(stats.urls_crawled, 2);
    assert_eq!(stats.urls_skipped, 1);

    let store = storage::lock(&storage).unwrap();
    let page1 = format!("{}/page1", server.uri());
    assert!(store.job_exists_by_url(&page1).unwrap());
    assert!(store.get_capture_by_url(&page1).unwrap().is_none());
    assert_eq!(store.count_jobs_by_status(JobStatus::Completed).unwrap(), 3);
}

#[tokio::test]
async fn test_huge_crawl_delay_is_capped() {
    let server = MockServer::start().await;
    mount_robots(&server, "User-agent: *\nCrawl-delay: 1e20\n").await;
    mount_site(&server).await;

    let dir = tempfile::tempdir().unwrap();
    let mut config = create_test_config(1, dir.path());
    config.crawler.max_crawl_delay = 50;
    let (orchestrator, storage) = create_orchestrator(config, None);

    orchestrator
        .add_seeds(&[format!("{}/", server.uri())])
        .unwrap();
    let stats = tokio::time::timeout(
        std::time::Duration::from_secs(10),
        orchestrator.crawl(CrawlOptions::default()),
    )
    .await
    .expect("crawl should not wait on the declared delay")
    .unwrap();

    assert_eq!(stats.urls_crawled, 3);
    assert_eq!(stats.urls_failed, 0);

    let store = storage::lock(&storage).unwrap();
    assert_eq!(store.count_jobs_by_status(JobStatus::Completed).unwrap(), 3);
    assert_eq!(store.count_jobs_by_status(JobStatus::Crawling).unwrap(), 0);
}

#[tokio::test]
async fn test_missing_robots_txt_allows_crawl() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    mount_site(&server).await;

    let dir = tempfile::tempdir().unwrap();
    let (orchestrator, _) = create_orchestrator(create_test_config(1, dir.path()), None);

    orchestrator
        .add_seeds(&[format!("{}/", server.uri())])
        .unwrap();
    let stats = orchestrator.crawl(CrawlOptions::default()).await.unwrap();

    assert_eq!(stats.urls_crawled, 3);
    assert_eq!(stats.urls_skipped, 0);
}

#[tokio::test]
async fn test_server_errors_are_retried_then_failed() {
    let server = MockServer::start().await;
    mount_robots(&server, "User-agent: *\nAllow: /").await;

    // One attempt plus max_retries (1) re-queue
    Mock::given(method("GET"))
        .and(path("/flaky"))
        .respond_with(ResponseTemplate::new(503))
        .expect(2)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let (orchestrator, storage) = create_orchestrator(create_test_config(0, dir.path()), None);

    let url = format!("{}/flaky", server.uri());
    orchestrator.add_seeds(&[url.as_str()]).unwrap();
    let stats = orchestrator.crawl(CrawlOptions::default()).await.unwrap();

    assert_eq!(stats.urls_failed, 1);
    assert_eq!(stats.urls_crawled, 0);

    let store = storage::lock(&storage).unwrap();
    assert_eq!(store.count_jobs_by_status(JobStatus::Failed).unwrap(), 1);
    let job = store.fetch_pending_jobs(10).unwrap();
    assert!(job.is_empty());
}

#[tokio::test]
async fn test_content_type_handling() {
    let server = MockServer::start().await;
    mount_robots(&server, "User-agent: *\nAllow: /").await;

    let base = server.uri();
    mount_page(
        &server,
        "/",
        format!(r#"<html><body><a href="{base}/report.pdf">Report</a></body></html>"#),
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/report.pdf"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(vec![0u8; 64], "application/pdf"))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let (orchestrator, storage) = create_orchestrator(create_test_config(1, dir.path()), None);

    orchestrator.add_seeds(&[format!("{}/", base)]).unwrap();
    let stats = orchestrator.crawl(CrawlOptions::default()).await.unwrap();

    assert_eq!(stats.urls_crawled, 1);
    assert_eq!(stats.urls_skipped, 1);

    let store = storage::lock(&storage).unwrap();
    assert_eq!(store.count_captures().unwrap(), 1);
    assert_eq!(store.count_jobs_by_status(JobStatus::Completed).unwrap(), 2);
}

#[tokio::test]
async fn test_crawl_with_captioning() {
    let server = MockServer::start().await;
    mount_robots(&server, "User-agent: *\nAllow: /").await;
    mount_site(&server).await;

    let llm = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "response": "A small test page.",
            "done": true,
            "eval_count": 5
        })))
        .mount(&llm)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let mut config = create_test_config(1, dir.path());
    config.captioning.provider = "ollama".to_string();
    config.captioning.base_url = Some(llm.uri());

    let captioner =
        CaptionService::from_config(&ProviderRegistry::with_builtin(), &config.captioning).unwrap();
    let (orchestrator, storage) = create_orchestrator(config, Some(captioner));

    orchestrator
        .add_seeds(&[format!("{}/", server.uri())])
        .unwrap();
    let stats = orchestrator.crawl(CrawlOptions::default()).await.unwrap();

    assert_eq!(stats.urls_crawled, 3);
    assert_eq!(stats.captions_generated, 3);

    let store = storage::lock(&storage).unwrap();
    assert_eq!(store.count_captions().unwrap(), 3);
    assert!(store.get_uncaptioned_captures(10).unwrap().is_empty());
}

#[tokio::test]
async fn test_caption_failure_does_not_fail_crawl() {
    let server = MockServer::start().await;
    mount_robots(&server, "User-agent: *\nAllow: /").await;
    mount_site(&server).await;

    let llm = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&llm)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let mut config = create_test_config(0, dir.path());
    config.captioning.provider = "ollama".to_string();
    config.captioning.base_url = Some(llm.uri());

    let captioner =
        CaptionService::from_config(&ProviderRegistry::with_builtin(), &config.captioning).unwrap();
    let (orchestrator, storage) = create_orchestrator(config, Some(captioner));

    orchestrator
        .add_seeds(&[format!("{}/", server.uri())])
        .unwrap();
    let stats = orchestrator.crawl(CrawlOptions::default()).await.unwrap();

    assert_eq!(stats.urls_crawled, 1);
    assert_eq!(stats.captions_generated, 0);
    assert_eq!(stats.urls_failed, 0);

    let store = storage::lock(&storage).unwrap();
    assert_eq!(store.get_uncaptioned_captures(10).unwrap().len(), 1);
}

#[tokio::test]
async fn test_single_capture_respects_robots() {
    let server = MockServer::start().await;
    mount_robots(&server, "User-agent: pagescribe-test\nDisallow: /page2\n").await;
    mount_site(&server).await;

    let dir = tempfile::tempdir().unwrap();
    let (orchestrator, storage) = create_orchestrator(create_test_config(2, dir.path()), None);

    let single = orchestrator
        .capture_single(&format!("{}/page1", server.uri()), false)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(single.capture.title.as_deref(), Some("Page 1"));
    assert_eq!(single.capture.links.len(), 2);

    let err = orchestrator
        .capture_single(&format!("{}/page2", server.uri()), false)
        .await
        .unwrap_err();
    assert!(matches!(err, CrawlError::RobotsDenied(_)));

    // Single captures never touch the frontier
    let store = storage::lock(&storage).unwrap();
    assert_eq!(store.count_jobs_by_status(JobStatus::Pending).unwrap(), 0);
    assert_eq!(store.count_captures().unwrap(), 1);
}

#[tokio::test]
async fn test_resume_skips_captured_pages() {
    let server = MockServer::start().await;
    mount_robots(&server, "User-agent: *\nAllow: /").await;
    mount_site(&server).await;

    let dir = tempfile::tempdir().unwrap();
    let seed = format!("{}/", server.uri());

    {
        let (orchestrator, _) = create_orchestrator(create_test_config(1, dir.path()), None);
        orchestrator.add_seeds(&[seed.as_str()]).unwrap();
        let stats = orchestrator.crawl(CrawlOptions::default()).await.unwrap();
        assert_eq!(stats.urls_crawled, 3);
    }

    // A second process over the same database finds nothing new to do
    let (orchestrator, storage) = create_orchestrator(create_test_config(1, dir.path()), None);
    assert_eq!(orchestrator.add_seeds(&[seed.as_str()]).unwrap(), 0);
    let stats = orchestrator.crawl(CrawlOptions::default()).await.unwrap();
    assert_eq!(stats.urls_crawled, 0);

    let store = storage::lock(&storage).unwrap();
    assert_eq!(store.count_captures().unwrap(), 3);
}
