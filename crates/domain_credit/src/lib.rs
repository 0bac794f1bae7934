//! Credit Domain - prepaid session credits
//!
//! A client's balance is the number of prepaid sessions they hold. Every
//! change is a row in an append-only log, and the balance always equals
//! the sum of that log.
//!
//! # Key Concepts
//!
//! - **CreditBalance**: Current credits, never negative
//! - **CreditTransaction**: One immutable log row with the balance after it
//! - **LedgerEntry**: A requested change (grant, use, refund, forfeit)
//! - **LedgerTx**: Storage port, implemented per unit of work

pub mod balance;
pub mod transaction;
pub mod ledger;
pub mod ports;
pub mod error;

pub use balance::{CreditBalance, ReplayReport, ReplayDivergence, replay};
pub use transaction::{CreditTransaction, CreditTransactionKind, CreditGrant, LedgerEntry};
pub use ledger::{Ledger, post, balance_of};
pub use ports::LedgerTx;
pub use error::LedgerError;
