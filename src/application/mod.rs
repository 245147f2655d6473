//! Application layer containing the ledger's business operations.
//!
//! `LedgerEngine` wires the components together: `AccountLedger` for balance
//! mutations, `CreditEngine` for issuance, `PaymentProcessor` for installments
//! and `Scheduler` to drive the processor periodically. Every mutation locks
//! its rows, stages its writes into one `AtomicUnit` and commits it, retrying
//! when the store reports a conflicting writer.

pub mod context;
pub mod credit;
pub mod engine;
pub mod ledger;
pub mod locks;
pub mod payments;
pub mod scheduler;
