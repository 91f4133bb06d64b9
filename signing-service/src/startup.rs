//! Application assembly: database, background workers, HTTP server.

use std::sync::Arc;

use axum::routing::{delete, get, post};
use axum::Router;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;

use crate::config::SigningConfig;
use crate::handlers;
use crate::services::{
    Database, DispatchWorker, EmailService, LoggingArtifactGenerator, NotificationDispatcher,
    ReconciliationScheduler, SecondFactorGate, WorkflowService,
};
use service_core::error::AppError;
use service_core::middleware::tracing::request_id_middleware;

#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub workflow: WorkflowService,
    pub gate: SecondFactorGate,
    pub scheduler: ReconciliationScheduler,
}

pub struct Application {
    port: u16,
    listener: tokio::net::TcpListener,
    router: Router,
    shutdown: CancellationToken,
    workers: Vec<JoinHandle<()>>,
}

impl Application {
    /// Wire everything together: connect and migrate the database, start the
    /// dispatch worker and the sweep loop, bind the listener.
    pub async fn build(config: SigningConfig) -> Result<Self, AppError> {
        let db = Database::new(
            &config.database.url,
            config.database.max_connections,
            config.database.min_connections,
        )
        .await?;
        db.run_migrations().await?;

        let email = Arc::new(EmailService::new(&config.smtp)?);
        let shutdown = CancellationToken::new();

        let (dispatcher, dispatch_worker) = DispatchWorker::new(
            db.clone(),
            email,
            config.workflow.dispatch_queue_size,
            shutdown.clone(),
        );
        let gate = SecondFactorGate::new(db.clone());
        let workflow = WorkflowService::new(
            db.clone(),
            gate.clone(),
            dispatcher.clone(),
            Arc::new(LoggingArtifactGenerator),
        );
        let scheduler =
            ReconciliationScheduler::new(db.clone(), dispatcher, config.workflow.clone());

        let mut workers = Vec::new();
        workers.push(tokio::spawn(dispatch_worker.run()));
        workers.push(tokio::spawn(
            scheduler.clone().run_loop(shutdown.clone()),
        ));

        let state = AppState {
            db,
            workflow,
            gate,
            scheduler,
        };
        let router = build_router(state);

        let address = format!("0.0.0.0:{}", config.port);
        let listener = tokio::net::TcpListener::bind(&address).await?;
        let port = listener.local_addr()?.port();
        tracing::info!(port, service = %config.service_name, "Listening");

        Ok(Self {
            port,
            listener,
            router,
            shutdown,
            workers,
        })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Serve until ctrl-c, then stop the workers.
    pub async fn run_until_stopped(self) -> Result<(), AppError> {
        let shutdown = self.shutdown.clone();
        axum::serve(self.listener, self.router)
            .with_graceful_shutdown(async move {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {
                        tracing::info!("Shutdown signal received");
                    }
                    _ = shutdown.cancelled() => {}
                }
            })
            .await?;

        self.shutdown.cancel();
        for worker in self.workers {
            let _ = worker.await;
        }
        Ok(())
    }
}

fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health::health))
        .route("/ready", get(handlers::health::ready))
        .route("/metrics", get(handlers::health::metrics))
        .route("/requests", post(handlers::requests::create_request))
        .route("/requests/:request_id", get(handlers::requests::get_request))
        .route(
            "/requests/:request_id/send",
            post(handlers::requests::send_request),
        )
        .route(
            "/requests/:request_id/notifications",
            get(handlers::requests::list_notifications),
        )
        .route(
            "/requests/:request_id/signers/:signer_id/actions",
            post(handlers::actions::submit_action),
        )
        .route("/exemptions", post(handlers::exemptions::grant_exemption))
        .route(
            "/exemptions/:exemption_id",
            delete(handlers::exemptions::revoke_exemption),
        )
        .route("/sweeps/run", post(handlers::sweeps::run_sweep))
        .layer(axum::middleware::from_fn(request_id_middleware))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
