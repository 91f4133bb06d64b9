pub mod artifacts;
pub mod cascade;
pub mod database;
pub mod dispatcher;
pub mod email;
pub mod error;
pub mod metrics;
pub mod scheduler;
pub mod second_factor;
pub mod transition;
pub mod workflow;

pub use artifacts::{ArtifactGenerator, LoggingArtifactGenerator};
pub use database::Database;
pub use dispatcher::{DispatchWorker, NotificationDispatcher, WorkflowEvent};
pub use email::EmailService;
pub use error::WorkflowError;
pub use scheduler::{ReconciliationScheduler, SweepReport};
pub use second_factor::SecondFactorGate;
pub use workflow::WorkflowService;
