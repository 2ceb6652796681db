use assessly_core::OrganizationId;

use crate::EventEnvelope;

/// Helper trait for organization-scoped messages.
///
/// Marks types carrying an organization id, so infrastructure components
/// (workers, subscription loops) can filter or pin to a single tenant as
/// defense in depth. `EventEnvelope` implements it; other message types can
/// opt in when they need tenant scoping.
pub trait OrganizationScoped {
    fn organization_id(&self) -> OrganizationId;
}

impl<E> OrganizationScoped for EventEnvelope<E> {
    fn organization_id(&self) -> OrganizationId {
        self.organization_id()
    }
}
