//! cts602: Modbus RTU master for Nilan CTS 602 heat-pump/ventilation controllers
//!
//! The crate polls a single serial slave for a sparse catalog of typed
//! registers, keeps the latest value of each in a lock-free cache, and offers
//! on-demand block reads and holding-register writes over the same serialized
//! transport. Start from [`api::modbus::ModbusMaster`].
//!
//! The internal runtime/boot helpers are placed in hidden modules to keep
//! implementation details out of the generated documentation.

pub mod api;
#[doc(hidden)]
pub mod boot;
#[doc(hidden)]
pub mod cli;
pub mod core;
pub mod protocol;

pub use api::*;
