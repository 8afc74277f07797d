//! Runtime wiring
//!
//! One `Runtime` value owns everything: registry, engine, persister and its
//! muxer, endpoint workers with their failover chains, and the stats
//! reporter. Components receive shared handles; nothing global survives the
//! value. Shutdown follows pipeline order: the bus stops accepting
//! publishes and drains muxers to disk, workers flush their final acks,
//! the persister drains its connection queues, stats and flusher exit last.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use vigil_bus::{Engine, Muxer, MuxerOptions};
use vigil_config::{Config, EndpointDef, TransportKind};
use vigil_endpoint::{
    Endpoint, EndpointConfig, LinkConfig, StreamFactory, TcpAcceptor, TcpConnector, TcpOptions,
};
use vigil_persist::{Persister, PersisterConfig};
use vigil_protocol::{Category, EventType, Registry};
use vigil_spool::SplitterOptions;
use vigil_stats::{ReporterBuilder, ReporterConfig, SharedProvider};

use crate::stats_providers::{BusStats, EndpointStats, PersisterStats};

/// Name of the persister's subscriber queue
const SQL_MUXER: &str = "sql";

/// Everything the broker process owns
pub struct Runtime {
    config: Config,
    registry: Arc<Registry>,
    engine: Arc<Engine>,
    persister: Persister,
    sql_muxer: Arc<Muxer>,
    endpoints: Vec<Arc<Endpoint>>,
    providers: Vec<SharedProvider>,
}

impl Runtime {
    /// Assemble all components from the configuration
    pub async fn build(config: Config) -> Result<Self> {
        let registry = Arc::new(Registry::bootstrap());
        let engine = Arc::new(Engine::new());

        let spool_opts = SplitterOptions {
            max_file_size: config.spool.max_file_size,
            auto_delete: config.spool.auto_delete,
        };
        let muxer_options = MuxerOptions {
            spool: spool_opts,
            ..Default::default()
        };

        // The persister consumes every monitoring and perfdata fact.
        let sql_filter = category_filter(&registry, &[Category::Neb, Category::Storage]);
        let sql_muxer = Arc::new(
            Muxer::open(
                SQL_MUXER,
                &config.spool.directory,
                sql_filter,
                HashSet::new(),
                Arc::clone(&registry),
                muxer_options.clone(),
            )
            .context("failed to open the persister queue")?,
        );
        engine
            .register(Arc::clone(&sql_muxer))
            .context("failed to register the persister queue")?;

        let persister = Persister::connect(
            PersisterConfig {
                db_path: config.db.path.clone(),
                connections: config.db.connections,
                queries_per_transaction: config.db.queries_per_transaction,
                instance_timeout: config.db.instance_timeout,
                store_in_hosts_services: config.db.store_in_hosts_services,
                store_in_resources: config.db.store_in_resources,
                store_in_data_bin: config.db.store_in_data_bin,
                rrd_len: config.db.rrd_len,
                interval_length: config.db.interval_length,
                flush_interval: std::time::Duration::from_secs(5),
            },
            Arc::clone(&engine),
        )
        .await
        .context("failed to connect the sql persister")?;

        // Endpoints referenced as failovers are children, not roots.
        let failover_names: HashSet<&str> = config.failover_names().into_iter().collect();
        let defs: HashMap<&str, &EndpointDef> = config
            .endpoints
            .iter()
            .map(|def| (def.name.as_str(), def))
            .collect();

        let mut endpoints = Vec::new();
        for def in &config.endpoints {
            if failover_names.contains(def.name.as_str()) {
                continue;
            }
            let endpoint = build_endpoint(
                def,
                &defs,
                &config,
                &registry,
                &engine,
                &muxer_options,
                true,
            )?;
            endpoints.push(endpoint);
        }

        let mut providers: Vec<SharedProvider> = vec![
            Arc::new(BusStats {
                engine: Arc::clone(&engine),
            }),
            Arc::new(PersisterStats {
                handle: persister.stats_handle(),
            }),
        ];
        for endpoint in &endpoints {
            providers.push(Arc::new(EndpointStats {
                endpoint: Arc::clone(endpoint),
            }));
        }

        Ok(Self {
            config,
            registry,
            engine,
            persister,
            sql_muxer,
            endpoints,
            providers,
        })
    }

    /// Run until SIGINT/SIGTERM, then shut down in pipeline order
    pub async fn run(self) -> Result<()> {
        let Self {
            config,
            registry: _registry,
            engine,
            persister,
            sql_muxer,
            endpoints,
            providers,
        } = self;

        tracing::info!(
            broker = %config.broker.name,
            endpoints = endpoints.len(),
            "broker starting"
        );

        let cancel = CancellationToken::new();
        let mut tasks: Vec<JoinHandle<()>> = Vec::new();

        tasks.push(tokio::spawn(
            persister.run(Arc::clone(&sql_muxer), cancel.child_token()),
        ));
        for endpoint in &endpoints {
            tasks.push(tokio::spawn(
                Arc::clone(endpoint).run(cancel.child_token()),
            ));
        }

        let reporter = ReporterBuilder::new()
            .config(ReporterConfig {
                path: config.stats.path.clone(),
                flush_interval: config.stats.flush_interval,
            })
            .providers(providers)
            .build();
        tasks.push(tokio::spawn(reporter.run(cancel.child_token())));

        wait_for_shutdown_signal().await;
        tracing::info!("shutdown signal received");

        // Pipeline order: stop the bus first so publishers drain to disk,
        // then cancel the workers.
        engine.shutdown();
        cancel.cancel();
        for task in tasks {
            if let Err(e) = task.await {
                tracing::warn!(error = %e, "task join failed");
            }
        }
        tracing::info!("broker stopped");
        Ok(())
    }
}

async fn wait_for_shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        let mut term = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler");
        tokio::select! {
            _ = ctrl_c => {}
            _ = term.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        let _ = ctrl_c.await;
    }
}

/// Expand configured categories into the concrete type id set
fn category_filter(registry: &Registry, categories: &[Category]) -> HashSet<EventType> {
    registry
        .type_ids()
        .filter(|id| id.category().is_some_and(|c| categories.contains(&c)))
        .collect()
}

fn filter_from_names(registry: &Registry, names: &[String]) -> HashSet<EventType> {
    if names.is_empty() {
        return registry.type_ids().collect();
    }
    let categories: Vec<Category> = names
        .iter()
        .filter_map(|name| match name.as_str() {
            "neb" => Some(Category::Neb),
            "bbdo" => Some(Category::Bbdo),
            "storage" => Some(Category::Storage),
            _ => None,
        })
        .collect();
    category_filter(registry, &categories)
}

fn build_factory(def: &EndpointDef, address: &str) -> Box<dyn StreamFactory> {
    let opts = TcpOptions::default();
    match def.transport {
        TransportKind::Tcp => Box::new(TcpConnector::new(address, opts)),
        TransportKind::TcpAccept => Box::new(TcpAcceptor::new(address, opts)),
    }
}

/// Build one endpoint worker, recursing into its failover chain
fn build_endpoint(
    def: &EndpointDef,
    defs: &HashMap<&str, &EndpointDef>,
    config: &Config,
    registry: &Arc<Registry>,
    engine: &Arc<Engine>,
    muxer_options: &MuxerOptions,
    register: bool,
) -> Result<Arc<Endpoint>> {
    let filter = filter_from_names(registry, &def.categories);
    // Input endpoints publish into the bus and consume nothing from it;
    // output endpoints forward their filtered subset.
    let published = match def.role {
        vigil_config::EndpointRole::Input => HashSet::new(),
        vigil_config::EndpointRole::Output => filter.clone(),
    };
    let muxer = Arc::new(
        Muxer::open(
            &def.name,
            &config.spool.directory,
            published,
            filter,
            Arc::clone(registry),
            muxer_options.clone(),
        )
        .with_context(|| format!("failed to open queue for endpoint {}", def.name))?,
    );
    if register {
        engine
            .register(Arc::clone(&muxer))
            .with_context(|| format!("failed to register queue for endpoint {}", def.name))?;
    }

    let endpoint_config = EndpointConfig {
        retry_interval: def.retry_interval,
        buffering_timeout: def.buffering_timeout,
        link: LinkConfig {
            max_frame_size: def.max_frame_size,
            ack_interval: def.ack_interval,
            ..Default::default()
        },
    };

    let mut endpoint = Endpoint::new(
        def.name.clone(),
        build_factory(def, &def.address),
        muxer,
        Arc::clone(engine),
        Arc::clone(registry),
        endpoint_config,
    );

    if !def.secondaries.is_empty() {
        let secondaries = def
            .secondaries
            .iter()
            .map(|address| build_factory(def, address))
            .collect();
        endpoint = endpoint.with_secondaries(secondaries);
    }

    if let Some(failover_name) = &def.failover {
        let child_def = defs
            .get(failover_name.as_str())
            .expect("validation checked failover references");
        // The child's muxer joins the bus only while the failover is
        // active; the parent controls registration.
        let child = build_endpoint(
            child_def,
            defs,
            config,
            registry,
            engine,
            muxer_options,
            false,
        )?;
        endpoint = endpoint.with_failover(child);
    }

    Ok(Arc::new(endpoint))
}
