//! Ledger entities, money types and the ports the engine talks through.

pub mod account;
pub mod amortization;
pub mod credit;
pub mod ids;
pub mod money;
pub mod ports;
pub mod transaction;
