//! Worker lifecycle states and events

use crate::http::Request;
use crate::worker::activator::ActivationReport;
use crate::worker::installer::InstallReport;
use crate::worker::interceptor::FetchOutcome;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Worker lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkerState {
    /// Registered, install not yet attempted
    #[default]
    Parsed,
    /// Precaching assets
    Installing,
    /// Precache complete, waiting for activation
    Installed,
    /// Retiring stale caches
    Activating,
    /// Intercepting requests for every open page
    Activated,
    /// Install failed or superseded; never intercepts
    Redundant,
}

impl WorkerState {
    /// Whether fetch events are intercepted in this state
    pub fn intercepts_fetch(&self) -> bool {
        matches!(self, Self::Activated)
    }

    /// Whether an install may start from this state
    ///
    /// An activated worker may reinstall to refresh its precache.
    pub fn can_install(&self) -> bool {
        matches!(self, Self::Parsed | Self::Redundant | Self::Activated)
    }

    /// Whether activation may start from this state
    pub fn can_activate(&self) -> bool {
        matches!(self, Self::Installed | Self::Activated)
    }
}

impl fmt::Display for WorkerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Parsed => write!(f, "parsed"),
            Self::Installing => write!(f, "installing"),
            Self::Installed => write!(f, "installed"),
            Self::Activating => write!(f, "activating"),
            Self::Activated => write!(f, "activated"),
            Self::Redundant => write!(f, "redundant"),
        }
    }
}

/// Events raised by the hosting runtime
#[derive(Debug, Clone)]
pub enum LifecycleEvent {
    Install,
    Activate,
    Fetch(Request),
}

impl LifecycleEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Install => "install",
            Self::Activate => "activate",
            Self::Fetch(_) => "fetch",
        }
    }
}

/// Result of handling one lifecycle event
#[derive(Debug)]
pub enum EventOutcome {
    Installed(InstallReport),
    Activated(ActivationReport),
    Fetched(FetchOutcome),
}
