pub mod bom_estimator;
pub mod design_processor;
pub mod email_sender;
pub mod payment_executor;
pub mod prompts;
pub mod vendor_sourcing;

pub use bom_estimator::BomEstimator;
pub use design_processor::{DesignAnalysis, DesignProcessor};
pub use email_sender::{EmailSender, RfqDispatch};
pub use payment_executor::{ExecutionReport, PaymentExecutor};
pub use prompts::PromptVariant;
pub use vendor_sourcing::{SourcingRequest, SourcingResult, VendorSourcing};
