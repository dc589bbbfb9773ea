//! Domain models for receivables-service.

pub mod payment;
pub mod receivable;
pub mod report;

pub use payment::{MethodTotal, PaymentLine, ReceivableBreakdown, Transaction};
pub use receivable::{CreateReceivable, Receivable, ReceivableStatus, SETTLEMENT_EPSILON};
pub use report::{AgingBucket, AgingRow, CollectionsByDay, DailyCollectionRow, OutstandingRow};
