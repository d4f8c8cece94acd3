use crate::config::{self, RuntimeConfig};
use crate::engine::event::LogNotifier;
use crate::engine::MatchEngine;
use crate::metrics;

use hyper::service::{make_service_fn, service_fn};
use hyper::{Body, Request, Response};
use prometheus::{Encoder, TextEncoder};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Daemon around one [`MatchEngine`]: seeds demo accounts, serves metrics and
/// runs the periodic sweep
pub struct Server {
    config: RuntimeConfig,
    engine: Arc<MatchEngine>,
    tasks: Vec<JoinHandle<()>>,
}

impl Server {
    /// Builds from the global config instance
    pub fn builder() -> Self {
        Self::with_config(config::current())
    }

    pub fn with_config(config: RuntimeConfig) -> Self {
        let engine = Arc::new(MatchEngine::new(&config, Arc::new(LogNotifier)));
        Server {
            config,
            engine,
            tasks: Vec::new(),
        }
    }

    pub fn engine(&self) -> Arc<MatchEngine> {
        self.engine.clone()
    }

    pub async fn start(&mut self) -> anyhow::Result<()> {
        metrics::init_registry();
        self.seed_accounts()?;
        if self.config.sweep_on_start {
            match self.engine.schedule_sweep() {
                Some(report) => {
                    log::info!("startup sweep matched {} of {}", report.matched, report.examined)
                }
                None => log::info!("startup sweep queued"),
            }
        }
        self.start_metrics_server()?;
        self.start_sweeper();
        log::info!(
            "exchange started, dispatch {:?}, commission rate {}",
            self.config.dispatch,
            self.engine.commission_rate()
        );
        Ok(())
    }

    pub fn stop(&mut self) {
        for task in self.tasks.drain(..) {
            task.abort();
        }
        self.engine.shutdown();
        log::info!("server stop");
    }

    fn seed_accounts(&self) -> anyhow::Result<()> {
        for seed in &self.config.seed_accounts {
            let account_id = self.engine.open_account(seed.usd_balance)?;
            for (symbol, amount) in seed.holdings().map_err(anyhow::Error::msg)? {
                self.engine
                    .deposit_asset(account_id, symbol.as_str(), amount)?;
            }
            log::info!("seeded account {}", account_id);
        }
        Ok(())
    }

    fn start_metrics_server(&mut self) -> anyhow::Result<()> {
        let addr: SocketAddr = self.config.metrics_addr.parse()?;
        let make_svc = make_service_fn(move |_| {
            let registry = metrics::REGISTRY_INSTANCE.clone();
            async move {
                Ok::<_, hyper::Error>(service_fn(move |_: Request<Body>| {
                    let registry = registry.clone();
                    async move {
                        let encoder = TextEncoder::new();
                        let metric_families = registry.gather();
                        let mut buffer = Vec::new();
                        if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
                            log::error!("failed to encode metrics: {}", e);
                        }
                        Ok::<_, hyper::Error>(Response::new(Body::from(buffer)))
                    }
                }))
            }
        });
        let server = hyper::Server::try_bind(&addr)?.serve(make_svc);
        self.tasks.push(tokio::spawn(async move {
            if let Err(e) = server.await {
                log::error!("metrics server error: {}", e);
            }
        }));
        log::info!("metrics server started on {}", addr);
        Ok(())
    }

    fn start_sweeper(&mut self) {
        if self.config.sweep_interval_secs == 0 {
            return;
        }
        let period = Duration::from_secs(self.config.sweep_interval_secs);
        let engine = self.engine.clone();
        self.tasks.push(tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            // the first tick completes immediately
            interval.tick().await;
            loop {
                interval.tick().await;
                let engine = engine.clone();
                if let Err(e) = tokio::task::spawn_blocking(move || engine.schedule_sweep()).await {
                    log::error!("sweep task failed: {}", e);
                }
            }
        }));
        log::info!("periodic sweep every {:?}", period);
    }
}
