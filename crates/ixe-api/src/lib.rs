//! Device control API abstraction.
//!
//! The chassis, its cards and its ports are controlled through an external
//! command interpreter. This crate describes the narrow seam the topology
//! client depends on:
//!
//! - [`ObjectPath`]: addresses an object inside a command namespace
//! - [`Request`]: one `get`, `set` or `invoke` call, renderable as a command line
//! - [`DeviceApi`]: the async trait implemented by transports and simulators
//! - [`DeviceError`]: the error classes every implementation must report
//! - [`Serialized`]: adapter for transports that cannot take concurrent calls
//!
//! # Example
//!
//! ```ignore
//! use ixe_api::{DeviceApi, ObjectPath};
//! use ixe_types::CardAddress;
//!
//! async fn probe(api: &dyn DeviceApi) -> bool {
//!     let card = ObjectPath::card(CardAddress::new(1, 2));
//!     match api.invoke(&card, "get", &[]).await {
//!         Ok(_) => true,
//!         Err(e) if e.is_not_found() => false,
//!         Err(e) => panic!("{}", e),
//!     }
//! }
//! ```

pub mod device;
pub mod error;
pub mod path;
pub mod tcl;

pub use device::{DeviceApi, Serialized};
pub use error::{DeviceError, DeviceResult};
pub use path::{ObjectKind, ObjectPath, Request};
pub use tcl::tclquote;
