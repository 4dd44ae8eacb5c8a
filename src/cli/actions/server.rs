use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::signal;
use tokio_util::{sync::CancellationToken, task::TaskTracker};
use tracing::{debug, error, info, warn};

use crate::api::{
    self,
    middleware::{AdmissionController, LimiterConfig, NoopRateLimiter, RateLimiter},
    AppState, Environment,
};
use crate::auth::{PermissionOracle, TokenStore, TokenTtls};
use crate::cli::{commands::database::Storage, telemetry};
use crate::mail::{LogMailer, MailDispatcher};
use crate::store::{Backends, MemoryStore, PgStore};

/// How long to wait for background mail before giving up on shutdown.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug)]
pub struct Args {
    pub port: u16,
    pub environment: Environment,
    pub storage: Storage,
    pub limiter: LimiterConfig,
    pub ttls: TokenTtls,
    pub store_timeout: Duration,
    pub trusted_origins: Vec<String>,
}

/// Execute the server action.
///
/// # Errors
/// Returns an error if the database is unreachable, the limiter or CORS
/// settings are invalid, or the server fails to start.
pub async fn execute(args: Args) -> Result<()> {
    let (backends, pg) = match args.storage {
        Storage::Postgres { dsn, pool } => {
            let store = PgStore::connect(&dsn, &pool)
                .await
                .context("Failed to connect to database")?;
            store
                .apply_schema()
                .await
                .context("Failed to apply database schema")?;
            (Backends::from_store(store.clone()), Some(store))
        }
        Storage::Memory => {
            warn!("using in-memory storage, data is lost on exit");
            (Backends::from_store(MemoryStore::new()), None)
        }
    };

    let shutdown = CancellationToken::new();
    let tracker = TaskTracker::new();

    let mut sweeper = None;
    let limiter: Arc<dyn RateLimiter> = if args.limiter.enabled() {
        let controller = Arc::new(AdmissionController::new(args.limiter)?);
        sweeper = Some(controller.spawn_sweeper(shutdown.child_token()));
        controller
    } else {
        info!("rate limiting disabled");
        Arc::new(NoopRateLimiter)
    };

    let state = Arc::new(AppState {
        environment: args.environment,
        tokens: TokenStore::new(backends.tokens).with_timeout(args.store_timeout),
        permissions: PermissionOracle::new(backends.permissions).with_timeout(args.store_timeout),
        users: backends.users,
        movies: backends.movies,
        ttls: args.ttls,
        mail: MailDispatcher::new(Arc::new(LogMailer), tracker.clone()),
        limiter,
        store_timeout: args.store_timeout,
    });

    let app = api::router(state, &args.trusted_origins)?;

    tokio::spawn(listen_for_signals(shutdown.clone()));

    let served = api::serve(app, args.port, shutdown.clone()).await;
    shutdown.cancel();

    if let Some(handle) = sweeper {
        if let Err(err) = handle.await {
            warn!("admission sweeper ended abnormally: {err}");
        }
    }

    tracker.close();
    debug!(tasks = tracker.len(), "waiting for background tasks");
    if tokio::time::timeout(DRAIN_TIMEOUT, tracker.wait())
        .await
        .is_err()
    {
        warn!("background tasks still running after {DRAIN_TIMEOUT:?}");
    }

    if let Some(store) = pg {
        store.close().await;
    }
    telemetry::shutdown_tracer();

    served
}

/// Cancel `shutdown` on SIGINT or SIGTERM.
async fn listen_for_signals(shutdown: CancellationToken) {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            error!("failed to install Ctrl+C handler: {err}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                error!("failed to install SIGTERM handler: {err}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("ctrl_c signal received"),
        () = terminate => info!("terminate signal received"),
        () = shutdown.cancelled() => return,
    }

    shutdown.cancel();
}
