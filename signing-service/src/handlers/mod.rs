pub mod actions;
pub mod exemptions;
pub mod health;
pub mod requests;
pub mod sweeps;
