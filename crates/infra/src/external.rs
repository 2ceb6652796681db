//! External service boundaries.
//!
//! The platform hands fully-built payloads across these seams; nothing on
//! this side knows how mail is delivered or PDFs are rendered. Real adapters
//! live with the services. Tests use stubs.

use std::sync::Arc;

use thiserror::Error;

use assessly_core::OrganizationId;

#[derive(Debug, Error)]
#[error("external service call failed: {0}")]
pub struct ExternalError(pub String);

/// A notification ready for delivery. Subject and body are prebuilt by the
/// caller; the sender only transports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub organization_id: OrganizationId,
    pub recipient: String,
    pub subject: String,
    pub body: String,
}

pub trait NotificationSender: Send + Sync {
    fn send(&self, notification: Notification) -> Result<(), ExternalError>;
}

/// Flat rendering options for a results report.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ReportOptions {
    pub title: String,
    pub include_breakdown: bool,
    pub locale: Option<String>,
}

pub trait ReportRenderer: Send + Sync {
    /// Render a report to bytes (typically PDF).
    fn render(
        &self,
        organization_id: OrganizationId,
        options: &ReportOptions,
    ) -> Result<Vec<u8>, ExternalError>;
}

/// Static metadata about an available assessment template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateInfo {
    pub slug: String,
    pub name: String,
    pub question_count: u32,
}

pub trait TemplateCatalog: Send + Sync {
    fn templates(&self) -> Result<Vec<TemplateInfo>, ExternalError>;

    fn find(&self, slug: &str) -> Result<Option<TemplateInfo>, ExternalError> {
        Ok(self
            .templates()?
            .into_iter()
            .find(|t| t.slug == slug))
    }
}

impl<T> NotificationSender for Arc<T>
where
    T: NotificationSender + ?Sized,
{
    fn send(&self, notification: Notification) -> Result<(), ExternalError> {
        (**self).send(notification)
    }
}

impl<T> ReportRenderer for Arc<T>
where
    T: ReportRenderer + ?Sized,
{
    fn render(
        &self,
        organization_id: OrganizationId,
        options: &ReportOptions,
    ) -> Result<Vec<u8>, ExternalError> {
        (**self).render(organization_id, options)
    }
}

impl<T> TemplateCatalog for Arc<T>
where
    T: TemplateCatalog + ?Sized,
{
    fn templates(&self) -> Result<Vec<TemplateInfo>, ExternalError> {
        (**self).templates()
    }

    fn find(&self, slug: &str) -> Result<Option<TemplateInfo>, ExternalError> {
        (**self).find(slug)
    }
}
