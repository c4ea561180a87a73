// ── Domain model ──
//
// Addresses, devices, and adapter power state. Everything here is plain
// data: no transport access, no locking.

mod address;
mod device;
mod state;

pub use address::MacAddress;
pub use device::Device;
pub use state::AdapterState;
