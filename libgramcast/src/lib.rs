//! Gramcast - scheduled media posting to a graph-style social API
//!
//! This library picks a random local media file, stages it at a public URL,
//! publishes it through a two-phase container API, and cleans up after
//! itself. The `gram-send` daemon runs the cycle loop; `gram-setup` manages
//! the access token.

pub mod config;
pub mod cycle;
pub mod error;
pub mod graph;
pub mod hashtags;
pub mod logging;
pub mod media;
pub mod probe;
pub mod schedule;
pub mod staging;
pub mod token;

// Re-export commonly used types
pub use config::Config;
pub use cycle::{CycleReport, CycleRunner, PostReport};
pub use error::{GramcastError, Result};
pub use graph::{GraphClient, Publisher};
pub use staging::Staging;
pub use token::TokenStore;
