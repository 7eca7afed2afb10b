//! # Provider boundary
//!
//! Helpers shared by the collaborators that talk to the cloud provider. The tree itself never makes
//! network calls; deployers wrap their requests with these.
//!
//! ## Modules
//!
//! - **`retry`**: repeats throttled (HTTP 429) requests after a fixed delay until they succeed or
//!   fail for another reason.

pub mod retry;
