//! Domain types and the ports the engine talks to.

pub mod actor;
pub mod amount;
pub mod audit;
pub mod clock;
pub mod disbursement;
pub mod module;
pub mod pause;
pub mod ports;
pub mod receipt;
