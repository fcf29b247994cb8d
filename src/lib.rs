//! vCD Provider - VMware vCloud Director resource management library.
//!
//! A library for managing vCloud Director objects with:
//! - **Client**: Session login, XML transport and link navigation
//! - **Tasks**: Waiting on vCD's asynchronous operations
//! - **Retry**: One bounded retry policy for failed tasks and busy entities
//! - **Objects**: Orgs, catalogs, media, VDCs, disks, networks, vApps and VMs
//! - **Provider**: Schema-checked resources and data sources on top of it all
//!
//! ## Quick Start
//!
//! All configuration is loaded from environment variables. Create a `.env` file:
//!
//! ```text
//! VCD_URL=https://vcd.example.com/api
//! VCD_USER=admin
//! VCD_PASSWORD=secret
//! VCD_ORG=acme
//! VCD_VDC=vdc-1
//! VCD_MAX_RETRY_TIMEOUT=60
//! ```
//!
//! Then create a disk through the provider:
//!
//! ```ignore
//! use serde_json::json;
//! use vcd_provider::{VcdClientConfig, VcdProvider};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let provider = VcdProvider::connect(VcdClientConfig::from_env()?).await?;
//!
//!     let attrs = json!({"name": "scratch", "size": "10GB"});
//!     let disk = provider
//!         .create("vcd_disk", attrs.as_object().cloned().unwrap_or_default())
//!         .await?;
//!     println!("Disk {} uses {:?}", disk.id, disk.get_str("storage_profile"));
//!
//!     provider.delete("vcd_disk", &disk.id).await?;
//!     Ok(())
//! }
//! ```

// ============================================================================
// Linting
// ============================================================================

#![forbid(unsafe_code)]               // Unsafe code is forbidden
#![warn(missing_docs)]                // Public items should be documented
#![deny(unused_must_use)]             // Must handle Result and Option explicitly
#![deny(nonstandard_style)]           // Non-standard code style is forbidden

// Clippy for strict discipline
#![deny(clippy::all)]                 // All standard Clippy lints
#![warn(clippy::pedantic)]            // Very strict Clippy lints
#![deny(clippy::unwrap_used)]         // unwrap() is forbidden
#![deny(clippy::expect_used)]         // expect() is forbidden
#![deny(clippy::panic)]               // panic!() is forbidden
#![deny(clippy::print_stdout)]        // println!() is forbidden in the library
#![deny(clippy::todo)]                // TODO is forbidden
#![deny(clippy::unimplemented)]       // unimplemented!() is forbidden
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used, clippy::panic))]

// ============================================================================
// Modules
// ============================================================================

/// XML object model: documents, request bodies, MIME types and link helpers.
pub mod vcd_types;

/// Authenticated vCD client.
///
/// Use this module to log in, navigate to the org and run raw requests.
pub mod vcd_client;

/// Asynchronous task tracking.
pub mod vcd_task;

/// Bounded retry policy shared by task retries and busy-entity re-attempts.
pub mod vcd_retry;

/// Organizations, tenant and admin views.
pub mod vcd_org;

/// Catalogs, catalog items, media and vApp templates.
pub mod vcd_catalog;

/// Virtual datacenters, vApps and VMs.
pub mod vcd_vdc;

/// Independent disks and base-2 size parsing.
pub mod vcd_disk;

/// Org VDC networks.
pub mod vcd_network;

/// Attribute schemas.
pub mod vcd_schema;

/// Provider entry point, resource data and resource traits.
///
/// Use this module to drive resources by type name.
pub mod vcd_provider;

/// Resource implementations.
pub mod vcd_resources;

/// Data source implementations.
pub mod vcd_data_sources;

#[cfg(test)]
mod test_support;

// ============================================================================
// Re-exports for convenience
// ============================================================================

pub use vcd_client::{VcdClient, VcdClientConfig, VcdError};
pub use vcd_provider::{ProviderError, ResourceData, VcdDataSource, VcdProvider, VcdResource};
pub use vcd_retry::{Backoff, RetryError, RetryFailure, RetryPolicy, retry_call};
pub use vcd_schema::{Attribute, AttributeType, ResourceSchema, SchemaError};
pub use vcd_task::{Task, TaskStatus};
