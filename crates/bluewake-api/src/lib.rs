//! Radio transport for BlueZ-style Bluetooth adapters.
//!
//! The power coordinator in `bluewake-core` needs only four remote calls:
//! read a boolean property, write one, invoke a method, and enumerate the
//! daemon's objects. This crate provides:
//!
//! - **[`RadioTransport`]** — the async trait describing those calls.
//! - **[`BusClient`]** — an implementation over a zbus connection to the
//!   system (or session) bus, with a per-call deadline.
//! - **[`Value`]** — an owned mirror of D-Bus values, so property maps reach
//!   the core already typed.

pub mod bus;
pub mod error;
pub mod transport;
pub mod value;

pub use bus::{Bus, BusClient, TransportConfig, managed_objects_from};
pub use error::Error;
pub use transport::{ManagedObject, ObjectPath, Properties, RadioTransport, bluez};
pub use value::Value;
