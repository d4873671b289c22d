//! Types that represent the core data model, such as `Transaction` and `FinancialSummary`.
mod amount;
mod kind;
mod summary;
mod transaction;

pub use amount::{format_brl, Amount, AmountError};
pub(crate) use amount::signed_decimal;
pub use kind::{Kind, Period};
pub use summary::{BackendSummary, FinancialSummary, Report, ReportQuery, SummarySource};
pub use transaction::{parse_records, ParsedRecords, RecordError, SalaryTerms, Transaction};
