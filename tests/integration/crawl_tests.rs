//! Integration tests for the crawler
//!
//! These tests use wiremock to serve pages and drive a fetch through the
//! whole pipeline. The fetch client is blocking, so the mock server lives on
//! a tokio runtime while the crawl runs on the test thread.

use pagefeed::config::{Config, RateLimitMode};
use pagefeed::crawler::{FetchLoop, UrlSource};
use pagefeed::pipeline::{
    HtmlTextExtractor, LinkSink, PreprocessStage, StageWorkerPool, TokenizeStage, TrainStage, Trainer,
    PREPROCESSED_DIR, RAW_PAGES_DIR, TRAINED_DIR, TRAINING_QUEUE_DIR,
};
use pagefeed::priority::PriorityFactors;
use pagefeed::storage::UrlQuery;
use pagefeed::{AddOutcome, NullTrainer, Orchestrator, UrlScheduler, UrlStatus, UrlStore};
use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};
use tokio::runtime::Runtime;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Trainer that counts its calls
#[derive(Default)]
struct CountingTrainer {
    calls: AtomicUsize,
}

impl Trainer for CountingTrainer {
    fn train_on_tokens(&self, tokens: &[u32]) -> f32 {
        assert!(!tokens.is_empty());
        self.calls.fetch_add(1, Ordering::SeqCst);
        0.5
    }
}

/// Creates a test configuration that fetches without delay
fn create_test_config(data_dir: &Path, max_pages: u64) -> Config {
    let mut config = Config::default();
    config.crawler.data_dir = data_dir.to_path_buf();
    config.crawler.max_pages = max_pages;
    config.rate_limit.mode = RateLimitMode::Fixed;
    config.rate_limit.delay_secs = 0;
    config.fetch.timeout_secs = 5;
    config.pipeline.preprocess_threads = 1;
    config.pipeline.tokenize_threads = 1;
    config.pipeline.train_threads = 1;
    config.pipeline.epochs = 2;
    config
}

fn create_dirs(data_dir: &Path) {
    for dir in [RAW_PAGES_DIR, PREPROCESSED_DIR, TRAINING_QUEUE_DIR, TRAINED_DIR] {
        fs::create_dir_all(data_dir.join(dir)).unwrap();
    }
}

fn files_in(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(dir)
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

fn index_page(base_url: &str) -> String {
    format!(
        r#"<html><head><title>Home</title><style>body {{ color: red }}</style></head><body>
        <h1>Welcome to the test site</h1>
        <p>{}</p>
        <a href="{}/page1">Page 1</a>
        <a href="{}/page2">Page 2</a>
        </body></html>"#,
        "This paragraph has enough words to survive the minimum text length. ".repeat(8),
        base_url,
        base_url
    )
}

/// Starts a mock server on `runtime` serving the index page at `/`
fn start_site(runtime: &Runtime) -> MockServer {
    let server = runtime.block_on(MockServer::start());
    let body = index_page(&server.uri());

    runtime.block_on(
        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(body)
                    .insert_header("content-type", "text/html"),
            )
            .mount(&server),
    );
    runtime.block_on(
        Mock::given(method("GET"))
            .and(path("/missing"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server),
    );

    server
}

fn open_scheduler(data_dir: &Path) -> Arc<Mutex<UrlScheduler>> {
    let scheduler = UrlScheduler::open(data_dir, PriorityFactors::default()).unwrap();
    Arc::new(Mutex::new(scheduler))
}

fn add(scheduler: &Mutex<UrlScheduler>, url: &str) -> i64 {
    match scheduler.lock().unwrap().add(url, "") {
        AddOutcome::Added(id) => id,
        other => panic!("{} not added: {:?}", url, other),
    }
}

#[test]
fn test_fetch_and_pipeline_end_to_end() {
    let runtime = Runtime::new().unwrap();
    let server = start_site(&runtime);
    let base_url = server.uri();

    let dir = tempfile::tempdir().unwrap();
    let data_dir = dir.path();
    create_dirs(data_dir);
    let config = create_test_config(data_dir, 1);

    // Seed the store with the index page
    let scheduler = open_scheduler(data_dir);
    let seed_id = add(&scheduler, &format!("{}/", base_url));

    // One fetch; the loop exits on its own once the page limit is reached
    let fetch = FetchLoop::new(
        &config,
        UrlSource::Scheduler(Arc::clone(&scheduler)),
        data_dir.join(RAW_PAGES_DIR),
    )
    .unwrap();
    let handle = fetch.handle();
    fetch.run();

    assert!(handle.is_finished());
    assert_eq!(handle.pages_crawled(), 1);

    let raw = files_in(&data_dir.join(RAW_PAGES_DIR));
    assert_eq!(raw.len(), 1);
    assert!(raw[0].ends_with(".html"));

    {
        let scheduler = scheduler.lock().unwrap();
        let seed = scheduler.store().get_by_id(seed_id).unwrap().unwrap();
        assert_eq!(seed.status, UrlStatus::Crawled);
        assert_eq!(seed.crawl_count, 1);
        assert!(scheduler.store().query(&UrlQuery::pending()).unwrap().is_empty());
    }

    // Preprocess feeds the two links back into the store
    let preprocess = StageWorkerPool::new(
        Arc::new(PreprocessStage::new(
            data_dir.join(RAW_PAGES_DIR),
            data_dir.join(PREPROCESSED_DIR),
            Arc::new(HtmlTextExtractor::new(config.pipeline.min_text_length)),
            Some(Arc::clone(&scheduler) as Arc<dyn LinkSink>),
        )),
        1,
    );
    assert_eq!(preprocess.drain(), 1);
    assert_eq!(preprocess.stats().failed(), 0);

    {
        let scheduler = scheduler.lock().unwrap();
        let pending = scheduler.store().query(&UrlQuery::pending()).unwrap();
        let mut urls: Vec<&str> = pending.iter().map(|r| r.url.as_str()).collect();
        urls.sort();
        assert_eq!(
            urls,
            vec![format!("{}/page1", base_url), format!("{}/page2", base_url)]
        );
        assert!(pending.iter().all(|r| r.source_url == format!("{}/", base_url)));
    }

    let text_files = files_in(&data_dir.join(PREPROCESSED_DIR));
    assert_eq!(text_files.len(), 1);
    let text = fs::read_to_string(data_dir.join(PREPROCESSED_DIR).join(&text_files[0])).unwrap();
    assert!(text.starts_with("Home Welcome to the test site"));
    assert!(!text.contains("color: red"));

    // Tokenize and train
    let tokenize = StageWorkerPool::new(
        Arc::new(TokenizeStage::new(
            data_dir.join(PREPROCESSED_DIR),
            data_dir.join(TRAINING_QUEUE_DIR),
            data_dir.join(TRAINED_DIR),
        )),
        1,
    );
    assert_eq!(tokenize.drain(), 1);

    let trainer = Arc::new(CountingTrainer::default());
    let train = StageWorkerPool::new(
        Arc::new(TrainStage::new(
            data_dir.join(TRAINING_QUEUE_DIR),
            data_dir.join(TRAINED_DIR),
            Arc::clone(&trainer) as Arc<dyn Trainer>,
            config.pipeline.epochs,
            config.pipeline.vocab_size,
        )),
        1,
    );
    assert_eq!(train.drain(), 1);

    assert_eq!(trainer.calls.load(Ordering::SeqCst), 2);
    assert!(files_in(&data_dir.join(TRAINING_QUEUE_DIR)).is_empty());
    assert_eq!(files_in(&data_dir.join(TRAINED_DIR)).len(), 1);

    // Nothing is redone once every stage has its marker
    assert_eq!(preprocess.drain(), 0);
    assert_eq!(tokenize.drain(), 0);
    assert_eq!(train.drain(), 0);
}

#[test]
fn test_http_error_marks_failed() {
    let runtime = Runtime::new().unwrap();
    let server = start_site(&runtime);

    let dir = tempfile::tempdir().unwrap();
    let data_dir = dir.path();
    create_dirs(data_dir);
    let config = create_test_config(data_dir, 1);

    let scheduler = open_scheduler(data_dir);
    let id = add(&scheduler, &format!("{}/missing", server.uri()));

    let fetch = FetchLoop::new(
        &config,
        UrlSource::Scheduler(Arc::clone(&scheduler)),
        data_dir.join(RAW_PAGES_DIR),
    )
    .unwrap()
    .with_empty_queue_wait(Duration::from_millis(50));
    let handle = fetch.handle();
    let thread = fetch.spawn().unwrap();

    let deadline = Instant::now() + Duration::from_secs(10);
    loop {
        let failed = scheduler.lock().unwrap().stats().unwrap().failed;
        if failed == 1 || Instant::now() > deadline {
            break;
        }
        thread::sleep(Duration::from_millis(50));
    }
    handle.stop();
    thread.join().unwrap();

    let record = scheduler.lock().unwrap().store().get_by_id(id).unwrap().unwrap();
    assert_eq!(record.status, UrlStatus::Failed);
    assert_eq!(record.crawl_count, 0);
    assert_eq!(handle.pages_crawled(), 0);
    assert!(handle.last_error().unwrap().contains("404"));
    assert!(files_in(&data_dir.join(RAW_PAGES_DIR)).is_empty());
}

#[test]
fn test_orchestrator_runs_seed_to_trained() {
    let runtime = Runtime::new().unwrap();
    let server = start_site(&runtime);

    let dir = tempfile::tempdir().unwrap();
    let mut config = create_test_config(dir.path(), 1);
    config.crawler.seeds = vec![format!("{}/", server.uri())];

    let mut orchestrator = Orchestrator::new(config, Arc::new(NullTrainer));
    orchestrator.start().unwrap();

    let deadline = Instant::now() + Duration::from_secs(60);
    while orchestrator.status().trained < 1 && Instant::now() < deadline {
        thread::sleep(Duration::from_millis(200));
    }

    let status = orchestrator.status();
    assert!(status.running);
    assert_eq!(status.pages_crawled, 1);
    assert_eq!(status.trained, 1);
    assert!(orchestrator.fetch_finished());

    orchestrator.stop().unwrap();
    assert!(!orchestrator.status().running);

    let stats = orchestrator.scheduler().unwrap().lock().unwrap().stats().unwrap();
    assert_eq!(stats.crawled, 1);
    assert_eq!(stats.pending, 2);
}
