//! Data models for the repair tally application.
//!
//! Typed records for every persisted entity plus the request and response shapes of the API.

mod count;
mod option;
mod report;
mod session;
mod stats;

pub use count::*;
pub use option::*;
pub use report::*;
pub use session::*;
pub use stats::*;
