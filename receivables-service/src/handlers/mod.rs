pub mod payments;
pub mod receivables;
pub mod reports;
