pub mod config;
pub mod diff;
pub mod engine;
pub mod epic;
pub mod error;
pub mod feedback;
pub mod io;
pub mod matcher;
pub mod paths;
pub mod rules;
pub mod severity;
pub mod spec;
pub mod store;
pub mod types;
pub mod verification;

pub use engine::{DiffInput, VerificationEngine, VerifyInput, VerifyOptions};
pub use error::{FlowguardError, Result};
