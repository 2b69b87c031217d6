//! Connectivity signal
//!
//! An edge-triggered source of "became online" / "became offline" events.
//! Platform glue (network change notifications, or [`ReachabilityProbe`])
//! calls `set_online`/`set_offline`; repeated reports of the same state are
//! ignored.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::error::{Error, Result};
use crate::listeners::Listeners;
use crate::util::{is_http_url, non_blank};

pub use crate::listeners::Subscription;

const PROBE_TIMEOUT_CAP: Duration = Duration::from_secs(5);

/// Network state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Connectivity {
    Online,
    Offline,
}

impl Connectivity {
    pub const fn is_online(self) -> bool {
        matches!(self, Self::Online)
    }
}

impl fmt::Display for Connectivity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Online => f.write_str("online"),
            Self::Offline => f.write_str("offline"),
        }
    }
}

/// Cloneable hub delivering connectivity transitions to subscribers
#[derive(Clone)]
pub struct ConnectivitySignal {
    online: Arc<AtomicBool>,
    went_online: Listeners<()>,
    went_offline: Listeners<()>,
}

impl fmt::Debug for ConnectivitySignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectivitySignal")
            .field("state", &self.current())
            .finish_non_exhaustive()
    }
}

impl ConnectivitySignal {
    /// Create a signal starting in `initial`
    pub fn new(initial: Connectivity) -> Self {
        Self {
            online: Arc::new(AtomicBool::new(initial.is_online())),
            went_online: Listeners::new(),
            went_offline: Listeners::new(),
        }
    }

    /// Last reported state
    pub fn current(&self) -> Connectivity {
        if self.online.load(Ordering::Acquire) {
            Connectivity::Online
        } else {
            Connectivity::Offline
        }
    }

    /// Report that the network is reachable
    pub fn set_online(&self) {
        self.set(Connectivity::Online);
    }

    /// Report that the network is unreachable
    pub fn set_offline(&self) {
        self.set(Connectivity::Offline);
    }

    /// Report a state; subscribers hear about it only on a transition
    pub fn set(&self, state: Connectivity) {
        let was_online = self.online.swap(state.is_online(), Ordering::AcqRel);
        if was_online == state.is_online() {
            return;
        }

        tracing::info!("Connectivity changed: {}", state);
        match state {
            Connectivity::Online => self.went_online.emit(&()),
            Connectivity::Offline => self.went_offline.emit(&()),
        }
    }

    /// Run `handler` on every offline-to-online transition
    pub fn on_online(&self, handler: impl Fn() + Send + Sync + 'static) -> Subscription {
        self.went_online.subscribe(move |()| handler())
    }

    /// Run `handler` on every online-to-offline transition
    pub fn on_offline(&self, handler: impl Fn() + Send + Sync + 'static) -> Subscription {
        self.went_offline.subscribe(move |()| handler())
    }
}

/// Poll-based connectivity source issuing `HEAD` requests to a URL
#[derive(Debug, Clone)]
pub struct ReachabilityProbe {
    url: String,
    interval: Duration,
    client: reqwest::Client,
}

impl ReachabilityProbe {
    /// Probe `url` every `interval`
    pub fn new(url: impl Into<String>, interval: Duration) -> Result<Self> {
        let url = non_blank(Some(url.into()))
            .filter(|url| is_http_url(url))
            .ok_or_else(|| {
                Error::InvalidInput("probe URL must include http:// or https://".to_string())
            })?;
        if interval.is_zero() {
            return Err(Error::InvalidInput(
                "probe interval must be positive".to_string(),
            ));
        }

        let client = reqwest::Client::builder()
            .timeout(interval.min(PROBE_TIMEOUT_CAP))
            .build()
            .map_err(|error| Error::InvalidInput(error.to_string()))?;
        Ok(Self {
            url,
            interval,
            client,
        })
    }

    /// Whether the URL answered. Any HTTP status counts as reachable.
    pub async fn check(&self) -> Connectivity {
        match self.client.head(&self.url).send().await {
            Ok(_) => Connectivity::Online,
            Err(error) => {
                tracing::debug!("Reachability probe to {} failed: {}", self.url, error);
                Connectivity::Offline
            }
        }
    }

    /// Feed `signal` from a background task until the handle is aborted
    pub fn spawn(self, signal: ConnectivitySignal) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                signal.set(self.check().await);
            }
        })
    }
}
