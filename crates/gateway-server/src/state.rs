use std::sync::Arc;
use std::time::Duration;

use gateway_auth::{
    Authenticator, MemoryRateStore, MemoryRevocationStore, RateLimiter, TokenIssuer,
};
use gateway_checkout::payment::{MockPaymentGateway, PaymentGateway};
use gateway_checkout::store::{CartItem, Product};
use gateway_checkout::MemoryStore;
use gateway_circuitbreaker::BreakerRegistry;
use gateway_proxy::{ProxyRegistry, ProxyTarget, ResilienceConfig, Route, RouteTable};
use gateway_saga::SagaRegistry;
use metrics_exporter_prometheus::PrometheusHandle;
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::config::GatewayConfig;

/// Everything the handlers share, constructed once at startup and passed by
/// reference; no module-level mutable state.
pub struct AppState {
    inner: Arc<Inner>,
}

pub struct Inner {
    pub config: GatewayConfig,
    pub authenticator: Authenticator,
    pub rate_limiter: RateLimiter<MemoryRateStore>,
    pub breakers: Arc<BreakerRegistry>,
    pub proxies: ProxyRegistry,
    pub routes: RouteTable,
    pub sagas: Arc<SagaRegistry>,
    pub store: Arc<MemoryStore>,
    pub payments: Arc<dyn PaymentGateway>,
    /// Plain client for readiness probes; downstream health checks bypass
    /// the breakers on purpose.
    pub probe_client: reqwest::Client,
    pub prometheus: PrometheusHandle,
}

impl Clone for AppState {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl std::ops::Deref for AppState {
    type Target = Inner;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl AppState {
    pub fn new(config: GatewayConfig, prometheus: PrometheusHandle) -> Self {
        let authenticator = Authenticator::new(
            TokenIssuer::new(
                &config.jwt_secret,
                config.jwt_algorithm,
                config.access_token_ttl,
            ),
            Arc::new(MemoryRevocationStore::new()),
        );

        let rate_limiter = RateLimiter::new(MemoryRateStore::new(), config.rate_limit_per_minute);

        let routes = RouteTable::new(
            config
                .services
                .iter()
                .map(|service| Route {
                    prefix: format!("/api/v1/{}", service.name),
                    service_name: service.name.to_string(),
                })
                .collect(),
        );

        let breakers = Arc::new(BreakerRegistry::new());
        let proxies = ProxyRegistry::new(Arc::clone(&breakers));

        let store = Arc::new(MemoryStore::new());
        if config.demo_seed {
            seed_demo_data(&store);
        }

        let probe_client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(3))
            .timeout(Duration::from_secs(3))
            .build()
            .expect("probe client");

        Self {
            inner: Arc::new(Inner {
                config,
                authenticator,
                rate_limiter,
                breakers,
                proxies,
                routes,
                sagas: Arc::new(SagaRegistry::default()),
                store,
                payments: Arc::new(MockPaymentGateway::new()),
                probe_client,
                prometheus,
            }),
        }
    }

    /// The proxy target for a configured service.
    pub fn target(&self, service_name: &str) -> Option<ProxyTarget> {
        self.config.service(service_name).map(|service| {
            ProxyTarget::new(service.name, service.base_url.clone())
                .with_auth_secret(service.auth_secret.clone())
                .with_config(ResilienceConfig::default())
        })
    }
}

/// A product and a cart to checkout against, for local runs without the
/// backend store.
fn seed_demo_data(store: &MemoryStore) {
    let product_id = Uuid::new_v4();
    store.insert_product(Product {
        id: product_id,
        name: "Walnut Desk".into(),
        sku: "DESK-001".into(),
        price: Decimal::new(199_99, 2),
        stock_quantity: 50,
        track_inventory: true,
    });
    let cart_id = store.insert_cart(
        "demo-user",
        vec![CartItem {
            product_id,
            variant_name: None,
            quantity: 1,
        }],
    );
    tracing::info!(%product_id, %cart_id, "seeded demo catalog and cart");
}
