//! Per-client admission control.
//!
//! Each peer IP gets its own token bucket. Buckets are created on first sight,
//! refreshed on every request, and dropped by a periodic sweep once idle.

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::num::NonZeroU32;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use axum::{
    extract::{ConnectInfo, Request, State},
    middleware::Next,
    response::Response,
};
use governor::{
    clock::{Clock, DefaultClock, Reference},
    middleware::NoOpMiddleware,
    state::{InMemoryState, NotKeyed},
    Quota,
};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::api::error::ApiError;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AdmissionDecision {
    Allowed,
    Rejected,
}

pub trait RateLimiter: Send + Sync {
    fn check_ip(&self, ip: IpAddr) -> AdmissionDecision;

    /// A disabled limiter lets requests through without looking at the peer.
    fn is_enabled(&self) -> bool {
        true
    }
}

#[derive(Clone, Debug)]
pub struct NoopRateLimiter;

impl RateLimiter for NoopRateLimiter {
    fn check_ip(&self, _ip: IpAddr) -> AdmissionDecision {
        AdmissionDecision::Allowed
    }

    fn is_enabled(&self) -> bool {
        false
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LimiterConfig {
    enabled: bool,
    rps: f64,
    burst: u32,
    idle_timeout: Duration,
    sweep_interval: Duration,
}

impl Default for LimiterConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            rps: 50.0,
            burst: 1000,
            idle_timeout: Duration::from_secs(3 * 60),
            sweep_interval: Duration::from_secs(60),
        }
    }
}

impl LimiterConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    #[must_use]
    pub fn with_rps(mut self, rps: f64) -> Self {
        self.rps = rps;
        self
    }

    #[must_use]
    pub fn with_burst(mut self, burst: u32) -> Self {
        self.burst = burst;
        self
    }

    #[must_use]
    pub fn with_idle_timeout(mut self, idle_timeout: Duration) -> Self {
        self.idle_timeout = idle_timeout;
        self
    }

    #[must_use]
    pub fn with_sweep_interval(mut self, sweep_interval: Duration) -> Self {
        self.sweep_interval = sweep_interval;
        self
    }

    #[must_use]
    pub const fn enabled(&self) -> bool {
        self.enabled
    }

    #[must_use]
    pub const fn sweep_interval(&self) -> Duration {
        self.sweep_interval
    }

    /// One cell every `1 / rps` seconds, up to `burst` cells banked.
    fn quota(&self) -> Result<Quota> {
        if !self.rps.is_finite() || self.rps <= 0.0 {
            return Err(anyhow!("limiter rps must be a positive number, got {}", self.rps));
        }
        let period = Duration::try_from_secs_f64(1.0 / self.rps)
            .with_context(|| format!("limiter rps {} is out of range", self.rps))?;
        let burst = NonZeroU32::new(self.burst).context("limiter burst must be at least 1")?;
        Quota::with_period(period)
            .map(|quota| quota.allow_burst(burst))
            .with_context(|| format!("limiter rps {} is too high", self.rps))
    }
}

type Bucket<C> =
    governor::RateLimiter<NotKeyed, InMemoryState, C, NoOpMiddleware<<C as Clock>::Instant>>;

struct ClientEntry<C: Clock> {
    bucket: Bucket<C>,
    last_seen: C::Instant,
}

/// Token-bucket admission keyed by client address.
pub struct AdmissionController<C: Clock = DefaultClock> {
    config: LimiterConfig,
    quota: Quota,
    clock: C,
    clients: Mutex<HashMap<IpAddr, ClientEntry<C>>>,
}

impl AdmissionController<DefaultClock> {
    /// # Errors
    /// Returns an error if the rate or burst cannot form a quota.
    pub fn new(config: LimiterConfig) -> Result<Self> {
        Self::with_clock(config, DefaultClock::default())
    }
}

impl<C: Clock> AdmissionController<C> {
    /// # Errors
    /// Returns an error if the rate or burst cannot form a quota.
    pub fn with_clock(config: LimiterConfig, clock: C) -> Result<Self> {
        Ok(Self {
            quota: config.quota()?,
            config,
            clock,
            clients: Mutex::new(HashMap::new()),
        })
    }

    fn clients(&self) -> MutexGuard<'_, HashMap<IpAddr, ClientEntry<C>>> {
        self.clients.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Lookup-or-create, refresh and check run in one critical section.
    pub fn admit(&self, ip: IpAddr) -> AdmissionDecision {
        if !self.config.enabled {
            return AdmissionDecision::Allowed;
        }

        let now = self.clock.now();
        let mut clients = self.clients();
        let entry = clients.entry(ip).or_insert_with(|| ClientEntry {
            bucket: governor::RateLimiter::direct_with_clock(self.quota, &self.clock),
            last_seen: now,
        });
        entry.last_seen = now;

        match entry.bucket.check() {
            Ok(()) => AdmissionDecision::Allowed,
            Err(_) => AdmissionDecision::Rejected,
        }
    }

    /// Drop clients idle for longer than the configured timeout. Returns how many were evicted.
    pub fn sweep(&self) -> usize {
        let now = self.clock.now();
        let idle_timeout = self.config.idle_timeout;
        let mut clients = self.clients();
        let before = clients.len();
        clients.retain(|_, entry| {
            Duration::from(now.duration_since(entry.last_seen)) <= idle_timeout
        });
        before - clients.len()
    }

    #[must_use]
    pub fn tracked_clients(&self) -> usize {
        self.clients().len()
    }
}

impl<C> AdmissionController<C>
where
    C: Clock + Send + Sync + 'static,
    C::Instant: Send,
{
    /// Run [`Self::sweep`] every sweep interval until `shutdown` is cancelled.
    pub fn spawn_sweeper(self: &Arc<Self>, shutdown: CancellationToken) -> JoinHandle<()> {
        let controller = Arc::clone(self);
        let period = self.config.sweep_interval;
        tokio::spawn(async move {
            let start = tokio::time::Instant::now() + period;
            let mut ticker = tokio::time::interval_at(start, period);
            loop {
                tokio::select! {
                    () = shutdown.cancelled() => {
                        debug!("admission sweeper stopped");
                        break;
                    }
                    _ = ticker.tick() => {
                        let evicted = controller.sweep();
                        if evicted > 0 {
                            debug!(evicted, "evicted idle clients");
                        }
                    }
                }
            }
        })
    }
}

impl<C> RateLimiter for AdmissionController<C>
where
    C: Clock + Send + Sync,
    C::Instant: Send,
{
    fn check_ip(&self, ip: IpAddr) -> AdmissionDecision {
        self.admit(ip)
    }

    fn is_enabled(&self) -> bool {
        self.config.enabled
    }
}

/// Admission middleware; runs before authentication.
pub async fn admit(
    State(limiter): State<Arc<dyn RateLimiter>>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    if !limiter.is_enabled() {
        return Ok(next.run(request).await);
    }

    let Some(ConnectInfo(peer)) = connect_info else {
        return Err(ApiError::Internal(anyhow!(
            "peer address missing from request"
        )));
    };

    match limiter.check_ip(peer.ip().to_canonical()) {
        AdmissionDecision::Allowed => Ok(next.run(request).await),
        AdmissionDecision::Rejected => {
            info!(client = %peer.ip(), "rate limit exceeded");
            Err(ApiError::TooManyRequests)
        }
    }
}
