//! Result delivery.
//!
//! This crate provides:
//! - Multipart upload of finished videos to the public file host
//! - Status webhooks to the platform endpoint and an optional caller endpoint

pub mod error;
pub mod notify;
pub mod upload;

pub use error::{DeliveryError, DeliveryResult};
pub use notify::{Notifier, NotifyReport, WebhookTarget};
pub use upload::{UploadClient, DEFAULT_UPLOAD_URL};
