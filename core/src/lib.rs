//! Shade Core
//!
//! Stateful services of the shielded note engine, built on the
//! `shade-privacy` primitives:
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                      ShieldedPool                        │
//! │   shield / transfer / unshield                           │
//! │  ┌────────────────────┐   ┌───────────────────────────┐  │
//! │  │ SharedAccumulator  │   │   NullifierRegistry       │  │
//! │  │ (Merkle, RwLock)   │   │   (DashMap, atomic gate)  │  │
//! │  └────────────────────┘   └───────────────────────────┘  │
//! │             ▲                         ▲                  │
//! │             └────── ledger sync ──────┘                  │
//! └──────────────────────────────────────────────────────────┘
//! ```

pub mod accumulator;
pub mod nullifier_set;
pub mod pool;
pub mod sync;
pub mod transfer;

pub use accumulator::{AccumulatorSnapshot, SharedAccumulator};
pub use nullifier_set::NullifierRegistry;
pub use pool::ShieldedPool;
pub use sync::{LedgerEvent, LedgerPage, LedgerSource, SyncOptions, SyncReport, sync};
pub use transfer::{
    IncomingPayment, ReceivedNote, ShieldedNote, TransferOutcome, TransferRequest,
    TransferStatement, UnshieldOutcome, UnshieldRequest, receive,
};
