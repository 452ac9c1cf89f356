//! `quota-gate` binary entry point.
//!
//! Loads configuration, starts the middleware, pushes a short burst of
//! requests from a handful of users through a simulated upstream and prints
//! the resulting status.

use quota_gate::config::ConfigLoader;
use quota_gate::module::ModuleContract;
use quota_gate::modules::cache::{CacheKey, ResponseCache};
use quota_gate::modules::load_balancer::SharedHandler;
use quota_gate::modules::middleware::Middleware;
use quota_gate::{logging, Outcome};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tracing::{debug, info};

const DEFAULT_CONFIG_PATH: &str = "quota-gate.toml";
const BURST_USERS: usize = 4;
const REQUESTS_PER_USER: usize = 3;
const BURST_IP: &str = "198.51.100.7";

/// Upstream stand-in: a slow lookup memoized in `cache`.
fn simulated_upstream(cache: Arc<ResponseCache<Value>>) -> SharedHandler<Value, Value> {
    Arc::new(move |request: Value| {
        let cache = Arc::clone(&cache);
        async move {
            let key = match CacheKey::new("lookup", &request) {
                Ok(key) => key,
                Err(e) => return json!({ "error": e.to_string() }),
            };
            cache
                .get_or_insert_with(key, None, || async move {
                    tokio::time::sleep(Duration::from_millis(25)).await;
                    Some(json!({ "symbol": request["symbol"], "price": 101.5 }))
                })
                .await
                .unwrap_or(Value::Null)
        }
    })
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());
    let loader = ConfigLoader::standard();
    let config = loader.load_or_default(&path)?;

    logging::init(&config.logging)?;
    // Re-run validation so warnings reach the freshly installed subscriber.
    loader.validate(&config)?;
    info!(config = %path, "quota-gate v{}", env!("CARGO_PKG_VERSION"));

    let cache = Arc::new(ResponseCache::from_config(&config.cache));
    let upstream = simulated_upstream(Arc::clone(&cache));

    let mut middleware: Middleware<Value, Value> = Middleware::new(config);
    middleware.start()?;
    let middleware = Arc::new(middleware);

    let mut burst = JoinSet::new();
    for user in 0..BURST_USERS {
        for n in 0..REQUESTS_PER_USER {
            let middleware = Arc::clone(&middleware);
            let handler = Arc::clone(&upstream);
            burst.spawn(async move {
                let user_id = format!("user-{user}");
                let symbol = if n % 2 == 0 { "ACME" } else { "INITECH" };
                let request = json!({ "symbol": symbol });
                middleware
                    .handle_request(request, handler, &user_id, BURST_IP)
                    .await
            });
        }
    }

    let (mut completed, mut rejected) = (0u64, 0u64);
    while let Some(joined) = burst.join_next().await {
        match joined? {
            Outcome::Completed(response) => {
                completed += 1;
                debug!(%response, "request completed");
            }
            Outcome::Rejected(rejection) => {
                rejected += 1;
                info!(%rejection, "request rejected");
            }
        }
    }

    let report = json!({
        "burst": { "completed": completed, "rejected": rejected },
        "status": middleware.get_system_status("user-0", BURST_IP),
        "cache": {
            "entries": cache.len(),
            "hits": cache.hits(),
            "misses": cache.misses(),
        },
    });
    println!("{}", serde_json::to_string_pretty(&report)?);
    print!("{}", middleware.metrics().to_prometheus("quota_gate"));

    middleware.shutdown().await;
    Ok(())
}
