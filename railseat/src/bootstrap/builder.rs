//! Topology selection and application building.
//!
//! ```text
//! Config ─▶ ResourceManager ─▶ declare queues ─▶ seed
//!                                   │
//!             ┌─────────────────────┴──────────────────────┐
//!        choreography                                single-process
//!   ReservationService + local consumers      SingleProcessDesk, no consumers
//!             └─────────────────────┬──────────────────────┘
//!                            AppState ─▶ Router ─▶ Application
//! ```

use super::{BootstrapError, ResourceManager, local_queues, register_consumers};
use crate::app::{
    Collaborators, ReservationDesk, ReservationService, RiderLookup, SeatLookup,
    SingleProcessDesk, TrainLookup,
};
use crate::clients::{HttpSeatStore, HttpTrainInventory, HttpUserDirectory};
use crate::config::{CollaboratorConfig, Config, Topology};
use crate::metrics::register_business_metrics;
use crate::runtime::consumer::EventConsumer;
use crate::runtime::Application;
use crate::server::{AppState, build_router};
use railseat_runtime::metrics::MetricsServer;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tracing::{info, warn};

/// Every wired part, before anything is spawned or bound.
pub struct Assembly {
    /// Shared services and transport
    pub resources: ResourceManager,
    /// Router state
    pub state: AppState,
    /// Unspawned consumers (empty in the single-process topology)
    pub consumers: Vec<EventConsumer>,
    /// Shutdown broadcast the consumers listen on
    pub shutdown_tx: broadcast::Sender<()>,
}

impl Assembly {
    /// Router over this assembly's state.
    #[must_use]
    pub fn router(&self) -> axum::Router {
        build_router(self.state.clone())
    }
}

/// Wire services, queues, consumers and router state per `config`.
///
/// # Errors
///
/// [`BootstrapError`] if queue declaration, seeding or consumer wiring fails.
pub async fn assemble(
    config: &Config,
    resources: ResourceManager,
) -> Result<Assembly, BootstrapError> {
    let (shutdown_tx, _) = broadcast::channel(1);

    let (desk, consumers): (Arc<dyn ReservationDesk>, Vec<EventConsumer>) =
        match config.broker.topology {
            Topology::Choreography => {
                let local = local_queues(&config.collaborators);
                resources.declare_queues(&local).await?;
                resources.seed(config).await?;

                let desk: Arc<dyn ReservationDesk> = Arc::new(ReservationService::new(
                    Arc::clone(&resources.clock),
                    Arc::clone(&resources.event_bus),
                    collaborators(&config.collaborators, &resources),
                ));
                let consumers = register_consumers(
                    &resources,
                    &config.consumers,
                    &config.collaborators,
                    &shutdown_tx,
                )?;
                info!(consumers = consumers.len(), "Choreography topology assembled");
                (desk, consumers)
            },
            Topology::SingleProcess => {
                resources.seed(config).await?;
                if config.collaborators.any_remote() {
                    warn!("Remote collaborator URLs are ignored in the single-process topology");
                }

                let ledger = ReservationService::new(
                    Arc::clone(&resources.clock),
                    Arc::clone(&resources.event_bus),
                    local_collaborators(&resources),
                );
                let desk: Arc<dyn ReservationDesk> = Arc::new(SingleProcessDesk::new(
                    ledger,
                    Arc::new(resources.users.clone()),
                    resources.seats.clone(),
                    resources.trains.clone(),
                ));
                info!("Single-process topology assembled");
                (desk, Vec::new())
            },
        };

    let state = AppState::new(
        desk,
        resources.seats.clone(),
        resources.trains.clone(),
        resources.users.clone(),
    );

    Ok(Assembly {
        resources,
        state,
        consumers,
        shutdown_tx,
    })
}

fn local_collaborators(resources: &ResourceManager) -> Collaborators {
    Collaborators {
        riders: Arc::new(resources.users.clone()),
        trains: Arc::new(resources.trains.clone()),
        seats: Arc::new(resources.seats.clone()),
    }
}

/// Remote clients where a URL is configured, in-process services elsewhere.
fn collaborators(urls: &CollaboratorConfig, resources: &ResourceManager) -> Collaborators {
    let riders: Arc<dyn RiderLookup> = match &urls.user_service_url {
        Some(url) => {
            info!(url = %url, "User directory is remote");
            Arc::new(HttpUserDirectory::new(url.clone()))
        },
        None => Arc::new(resources.users.clone()),
    };
    let trains: Arc<dyn TrainLookup> = match &urls.train_service_url {
        Some(url) => {
            info!(url = %url, "Train inventory is remote");
            Arc::new(HttpTrainInventory::new(url.clone()))
        },
        None => Arc::new(resources.trains.clone()),
    };
    let seats: Arc<dyn SeatLookup> = match &urls.seat_service_url {
        Some(url) => {
            info!(url = %url, "Seat store is remote");
            Arc::new(HttpSeatStore::new(url.clone()))
        },
        None => Arc::new(resources.seats.clone()),
    };

    Collaborators {
        riders,
        trains,
        seats,
    }
}

/// Builds a runnable [`Application`] from configuration.
pub struct ApplicationBuilder {
    config: Config,
    resources: Option<ResourceManager>,
}

impl ApplicationBuilder {
    /// Start from `config`.
    #[must_use]
    pub const fn new(config: Config) -> Self {
        Self {
            config,
            resources: None,
        }
    }

    /// Use prepared resources instead of building them from the config.
    #[must_use]
    pub fn with_resources(mut self, resources: ResourceManager) -> Self {
        self.resources = Some(resources);
        self
    }

    /// Install metrics, assemble, and bind the listener.
    ///
    /// # Errors
    ///
    /// [`BootstrapError`] from any step.
    pub async fn build(self) -> Result<Application, BootstrapError> {
        let resources = match self.resources {
            Some(resources) => resources,
            None => ResourceManager::from_config(&self.config)?,
        };

        let metrics = if self.config.metrics_enabled {
            let mut server = MetricsServer::new();
            server.start()?;
            register_business_metrics();
            Some(Arc::new(server))
        } else {
            None
        };

        let mut assembly = assemble(&self.config, resources).await?;
        if let Some(metrics) = metrics {
            assembly.state = assembly.state.with_metrics(metrics);
        }

        let address = self.config.server.address();
        let listener = TcpListener::bind(&address)
            .await
            .map_err(|source| BootstrapError::Bind {
                address: address.clone(),
                source,
            })?;
        info!(address = %address, topology = ?self.config.broker.topology, "Listener bound");

        Ok(Application::new(
            listener,
            assembly.router(),
            assembly.consumers,
            assembly.shutdown_tx,
            self.config.server.shutdown_timeout(),
        ))
    }
}
