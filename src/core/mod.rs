pub mod crm;
pub mod execution;
pub mod json_extract;
pub mod planning;
pub mod retry;
pub mod rfq;
pub mod sourcing;

pub use crate::domain::model::{
    Component, Order, Priority, ProcurementItem, ProcurementPlan, Vendor, VendorComparison,
};
pub use crate::domain::ports::{EmailProvider, LlmClient, PaymentRail, Storage, VendorScraper};
pub use crate::utils::error::Result;
