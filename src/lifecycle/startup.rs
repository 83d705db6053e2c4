//! Startup orchestration.
//!
//! # Responsibilities
//! - Turn a validated configuration into engine parameters
//! - Build every pluggable strategy in a fixed order
//! - Hand the parameters to the transport engine and serve
//!
//! # Design Decisions
//! - Fail fast: the first failing step ends startup with a typed error
//! - Nothing touches the network until every strategy is built
//! - A served server is always closed, however `run` ends

use std::path::Path;
use std::sync::Arc;

use crate::acl::load_acl;
use crate::auth::build_authenticator;
use crate::config::{resolve_limits, ServerConfig};
use crate::congestion::{BrutalFactory, CongestionFactory};
use crate::error::{Error, Result};
use crate::net::tls::load_tls_config;
use crate::obfs::select_obfuscator;
use crate::observability::EventReporter;
use crate::transport::{ServerParams, TransportEngine, TunnelServer};

/// Compose a bound server from `config`.
///
/// Steps run in order: TLS material, limits, authenticator, obfuscator, ACL,
/// congestion factory, then `engine.build`. A failure at any step returns
/// before the engine is called.
pub async fn start<E>(
    config: &ServerConfig,
    engine: &E,
    reporter: Arc<dyn EventReporter>,
) -> Result<E::Server>
where
    E: TransportEngine,
{
    tracing::info!(config = %config.summary(), "Server configuration loaded");

    let tls = load_tls_config(Path::new(&config.cert), Path::new(&config.key)).map_err(
        |source| Error::Certificate {
            cert: config.cert.clone(),
            key: config.key.clone(),
            source,
        },
    )?;

    let limits = resolve_limits(config);
    let authenticator = build_authenticator(&config.auth);
    let obfuscator = select_obfuscator(&config.obfs);
    let acl = load_acl(&config.acl).map_err(|source| Error::Acl {
        file: config.acl.clone(),
        source,
    })?;
    let congestion: Arc<dyn CongestionFactory> = Arc::new(BrutalFactory);

    let params = ServerParams {
        listen: config.listen.clone(),
        tls,
        limits,
        up_bps: config.up_bps(),
        down_bps: config.down_bps(),
        congestion,
        acl,
        obfuscator,
        authenticator,
        reporter,
    };

    engine
        .build(params)
        .await
        .map_err(|source| Error::ServerInit {
            listen: config.listen.clone(),
            source,
        })
}

/// Serve until the server stops, then report why.
///
/// Every return is an [`Error::Shutdown`]; a clean stop carries no cause.
/// The server is closed on return and when this future is dropped.
pub async fn run<S>(server: S, listen: &str) -> Error
where
    S: TunnelServer,
{
    let _guard = CloseGuard(&server);
    tracing::info!(listen = %listen, "Server up and running");

    let result = server.serve().await;
    Error::Shutdown {
        listen: listen.to_string(),
        source: result.err(),
    }
}

struct CloseGuard<'a, S: TunnelServer>(&'a S);

impl<S: TunnelServer> Drop for CloseGuard<'_, S> {
    fn drop(&mut self) {
        self.0.close();
    }
}
