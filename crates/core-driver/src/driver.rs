use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use core_dataapi::{DataApiService, DataSourceSettings, StatementTarget};

use crate::backoff::BackoffPolicy;
use crate::connection::Connection;
use crate::error::DriverResult;

pub const DRIVER_NAME: &str = "redshift";

static OPENED_CONNECTIONS: AtomicUsize = AtomicUsize::new(0);

/// Opens connections that share one service, target and backoff policy.
#[derive(Clone)]
pub struct Driver {
    service: Arc<dyn DataApiService>,
    target: StatementTarget,
    with_event: bool,
    backoff: BackoffPolicy,
}

impl Driver {
    /// Resolves the statement target from `settings`.
    pub fn new(
        service: Arc<dyn DataApiService>,
        settings: &DataSourceSettings,
    ) -> DriverResult<Self> {
        let target = settings.statement_target()?;
        Ok(Self::with_target(service, target).with_event(settings.with_event))
    }

    #[must_use]
    pub fn with_target(service: Arc<dyn DataApiService>, target: StatementTarget) -> Self {
        Self {
            service,
            target,
            with_event: false,
            backoff: BackoffPolicy::default(),
        }
    }

    #[must_use]
    pub const fn with_backoff(mut self, backoff: BackoffPolicy) -> Self {
        self.backoff = backoff;
        self
    }

    #[must_use]
    pub const fn with_event(mut self, with_event: bool) -> Self {
        self.with_event = with_event;
        self
    }

    #[must_use]
    pub const fn target(&self) -> &StatementTarget {
        &self.target
    }

    /// New connection named `redshift-<n>`, unique within the process.
    #[must_use]
    pub fn open(&self) -> Connection {
        let n = OPENED_CONNECTIONS.fetch_add(1, Ordering::Relaxed);
        let name = format!("{DRIVER_NAME}-{n}");
        tracing::debug!(connection = %name, "Opening connection");
        Connection::new(
            name,
            self.service.clone(),
            self.target.clone(),
            self.with_event,
            self.backoff,
        )
    }
}
