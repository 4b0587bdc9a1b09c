use super::*;
use restock_watcher::config::{
    AppConfig, CatalogConfig, DatabaseConfig, DiscordConfig, EmailConfig, LoggingConfig,
    MetricsConfig, MonitorConfig, NotificationsConfig, ScraperConfig, SurfaceConfig,
    TelegramConfig,
};
use serde_json::json;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const LISTING: &str = r#"
    <html><body>
      <div class="list">
        <a href="/hot-wheels/twin-mill/1001/product-detail?pos=1">Twin Mill</a>
        <a href="/hot-wheels/bone-shaker/1002/product-detail">Bone Shaker</a>
        <a href="/help/contact-us">Help</a>
      </div>
    </body></html>
"#;

const TWIN_MILL_SOLD_OUT: &str = r#"
    <html><body>
      <h1 class="prod-name">Hot Wheels Twin Mill</h1>
      <span class="out-of-stock">Out of Stock</span>
      <button>Notify Me</button>
    </body></html>
"#;

const TWIN_MILL_IN_STOCK: &str = r#"
    <html><body>
      <h1 class="prod-name">Hot Wheels Twin Mill</h1>
      <span class="prod-price">₹899</span>
      <button>Add to Cart</button>
    </body></html>
"#;

const BONE_SHAKER_IN_STOCK: &str = r#"
    <html><body>
      <h1 class="prod-name">Hot Wheels Bone Shaker</h1>
      <span class="prod-price">₹1,299</span>
      <button>Add to Cart</button>
    </body></html>
"#;

fn config(server: &MockServer) -> AppConfig {
    AppConfig {
        database: DatabaseConfig {
            url: "sqlite::memory:".to_string(),
            max_connections: 1,
        },
        catalog: CatalogConfig {
            base_url: server.uri(),
            surfaces: vec![
                SurfaceConfig {
                    name: "brand_listing".to_string(),
                    path: "/hot-wheels/0/0/113".to_string(),
                },
                SurfaceConfig {
                    name: "search_results".to_string(),
                    path: "/search".to_string(),
                },
            ],
            product_link_pattern: r"/hot-wheels/.*?/\d+/product-detail".to_string(),
            product_id_pattern: ID_PATTERN.to_string(),
            brand_keywords: vec!["hot wheels".to_string()],
        },
        scraper: ScraperConfig {
            user_agent: "restock-watcher-test".to_string(),
            request_timeout: 5,
            retry_attempts: 0,
            retry_delay_ms: 10,
            request_delay_ms: 0,
        },
        monitor: MonitorConfig {
            interval_seconds: 60,
            cron: None,
            error_backoff_seconds: 60,
        },
        notifications: NotificationsConfig {
            currency_symbol: "₹".to_string(),
            telegram: TelegramConfig {
                bot_token: Some("123:abc".to_string()),
                chat_id: Some("42".to_string()),
                api_base: server.uri(),
            },
            discord: DiscordConfig::default(),
            email: EmailConfig::default(),
        },
        metrics: MetricsConfig {
            enabled: false,
            port: 9001,
        },
        logging: LoggingConfig::default(),
    }
}

async fn mount_page(server: &MockServer, route: &str, status: u16, body: &str) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(status).set_body_string(body))
        .mount(server)
        .await;
}

async fn mount_catalog(server: &MockServer, twin_mill: &str) {
    mount_page(server, "/hot-wheels/0/0/113", 200, LISTING).await;
    mount_page(server, "/search", 503, "Service Unavailable").await;
    mount_page(server, "/hot-wheels/twin-mill/1001/product-detail", 200, twin_mill).await;
    mount_page(server, "/hot-wheels/bone-shaker/1002/product-detail", 200, BONE_SHAKER_IN_STOCK).await;
}

#[tokio::test]
async fn test_restock_is_delivered_to_telegram() {
    let server = MockServer::start().await;
    let config = config(&server);
    let store: Arc<dyn StateStore> = Arc::new(SqliteStore::in_memory().await.unwrap());
    let monitor = Monitor::from_config(&config, store.clone()).await.unwrap();
    assert!(monitor.notifiers().has_notifier("telegram").await);

    mount_catalog(&server, TWIN_MILL_SOLD_OUT).await;
    let first = monitor.run_cycle().await.unwrap();

    assert_eq!(first.surfaces_failed, 1);
    assert_eq!(first.candidates, 2);
    assert_eq!(first.observed, 2);
    assert_eq!(first.alerts, 0);
    assert_eq!(
        store.get(&identity(1001)).await.unwrap().map(|r| r.state),
        Some(ProductState::OutOfStock)
    );
    let twin_mill = store.get(&identity(1001)).await.unwrap().unwrap();
    assert!(twin_mill
        .url
        .starts_with(&format!("{}/hot-wheels/twin-mill/1001/product-detail", server.uri())));

    server.reset().await;
    mount_catalog(&server, TWIN_MILL_IN_STOCK).await;
    Mock::given(method("POST"))
        .and(path("/bot123:abc/sendMessage"))
        .and(body_partial_json(json!({ "chat_id": "42", "parse_mode": "Markdown" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "ok": true,
            "result": { "message_id": 9 }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let second = monitor.run_cycle().await.unwrap();

    assert_eq!(second.alerts, 1);
    assert_eq!(second.notifications_sent, 1);
    let record = store.get(&identity(1001)).await.unwrap().unwrap();
    assert_eq!(record.state, ProductState::Buyable);
    assert_eq!(record.price, Some(89900));
}

#[tokio::test]
async fn test_catalog_outage_aborts_without_changes() {
    let server = MockServer::start().await;
    let config = config(&server);
    let store: Arc<dyn StateStore> = Arc::new(MemoryStore::new());
    let monitor = Monitor::from_config(&config, store.clone()).await.unwrap();

    mount_catalog(&server, TWIN_MILL_IN_STOCK).await;
    monitor.run_cycle().await.unwrap();

    server.reset().await;
    mount_page(&server, "/hot-wheels/0/0/113", 503, "").await;
    mount_page(&server, "/search", 503, "").await;

    let result = monitor.run_cycle().await;

    assert!(matches!(result, Err(AppError::CycleAborted(_))));
    assert_eq!(store.records().await.unwrap().len(), 2);
    assert!(store
        .records()
        .await
        .unwrap()
        .iter()
        .all(|r| r.state == ProductState::Buyable));
}
