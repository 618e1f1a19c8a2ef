//! `orderbridge-webhooks` — invoice and shipping event processors.
//!
//! Providers push asynchronous notifications; adapters normalize them into
//! the DTOs in [`events`] and hand them to the processors here. Processors
//! mutate the order, then enqueue side effects (customer emails, ERP status
//! pushes) on the job queue instead of firing them inline.

pub mod effects;
pub mod error;
pub mod events;
pub mod invoice;
pub mod mailer;
pub mod shipping;
pub mod storage;

pub use effects::{
    EMAIL_INVOICE_ISSUED, EMAIL_TRACKING_CODE, ERP_STATUS_PUSH, EmailEffect, StatusPushEffect,
    email_effect_handler, enqueue_side_effect, status_push_effect_handler,
};
pub use error::WebhookError;
pub use events::{InvoiceEvent, ShippingEvent};
pub use invoice::{InvoiceOutcome, InvoiceProcessor, InvoiceProcessorConfig};
pub use mailer::{Mailer, MailerError, RecordingMailer, SentEmail};
pub use shipping::{ShippingOutcome, ShippingProcessor, ShippingProcessorConfig};
pub use storage::{InMemoryPdfStorage, PdfStorage, PdfStorageError};
