//! Demo identity
//!
//! There is exactly one shared demo credential for the whole system. It is
//! recognised by email; everything demo-specific is bypassed for any other
//! identity.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::constants::DEMO_EMAIL;

/// Whether `email` is the built-in demo account
pub fn is_demo_user(email: &str) -> bool {
    DemoIdentity::default().matches(email)
}

/// The shared demo account, by email
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DemoIdentity {
    email: String,
}

impl Default for DemoIdentity {
    fn default() -> Self {
        Self {
            email: DEMO_EMAIL.to_string(),
        }
    }
}

impl DemoIdentity {
    /// Use a deployment-specific demo email
    pub fn new(email: impl Into<String>) -> Self {
        Self {
            email: email.into().trim().to_ascii_lowercase(),
        }
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    /// Case- and whitespace-insensitive match
    pub fn matches(&self, email: &str) -> bool {
        email.trim().eq_ignore_ascii_case(&self.email)
    }
}

impl fmt::Display for DemoIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.email)
    }
}

/// Visible state of the demo account
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum DemoState {
    /// No outstanding tracked changes
    Clean,
    /// Mutations are waiting to be undone
    Dirty { outstanding: usize },
}

impl DemoState {
    pub fn from_outstanding(outstanding: usize) -> Self {
        if outstanding == 0 {
            DemoState::Clean
        } else {
            DemoState::Dirty { outstanding }
        }
    }

    pub fn is_clean(&self) -> bool {
        matches!(self, DemoState::Clean)
    }
}

impl fmt::Display for DemoState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DemoState::Clean => write!(f, "clean"),
            DemoState::Dirty { outstanding } => write!(f, "dirty ({} outstanding)", outstanding),
        }
    }
}
