//! Invoices: model, numbering, generation, matching, credit notes and the
//! transactional service on top of them.

mod credit;
mod generator;
mod matching;
mod model;
mod numbering;
mod service;

pub use credit::{
    apply_credit, build_credit_note, plan_credit, plan_set_credit, spread, CreditLine,
    CreditRequest,
};
pub use generator::{
    draft_invoices, drafts_total, receivable_type_for, DraftInvoice, DraftRow, RentGross,
};
pub use matching::{invoices_match, match_draft, MatchOutcome};
pub use model::{
    ConsumedAdjustment, Invoice, InvoicePayment, InvoiceRow, InvoiceSet, InvoiceState,
    InvoiceType,
};
pub use numbering::{
    InvoiceNumberSequences, ReceivableType, ServiceUnit, DEFAULT_UNIT_NUMBER_START,
    UNIT_NUMBER_START,
};
pub use service::{record_results, InvoiceService};
