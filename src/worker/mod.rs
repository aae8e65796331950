//! Offline worker: install, activate and fetch handling
//!
//! A worker owns one cache generation. Install precaches the asset
//! manifest into that generation, activate deletes every other generation,
//! and fetch answers same-scope GET requests cache-first with a network
//! fallback and an offline page for navigations.

pub mod activator;
pub mod agent;
pub mod installer;
pub mod interceptor;
pub mod lifecycle;
pub mod manifest;
pub mod registration;

pub use activator::{ActivationReport, Activator};
pub use agent::OfflineWorker;
pub use installer::{InstallReport, Installer};
pub use interceptor::{FetchOutcome, Intercepted, Interceptor, ResponseSource};
pub use lifecycle::{EventOutcome, LifecycleEvent, WorkerState};
pub use manifest::{AssetManifest, WorkerSettings};
pub use registration::{Registration, RegistrationStore};
