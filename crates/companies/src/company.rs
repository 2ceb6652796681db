use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use assessly_core::{Aggregate, AggregateId, AggregateRoot, DomainError, OrganizationId, UserId};
use assessly_events::{Event, EventKindError};

/// Company identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CompanyId(pub AggregateId);

impl CompanyId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for CompanyId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Aggregate root: a customer company inside an organization.
///
/// Companies are never hard-deleted; deactivation is a state flip so the
/// event history and read models stay addressable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Company {
    id: CompanyId,
    organization_id: Option<OrganizationId>,
    name: String,
    contact_email: String,
    members: BTreeSet<UserId>,
    is_active: bool,
    version: u64,
    created: bool,
}

impl Company {
    /// Create an empty, not-yet-created aggregate instance for rehydration.
    pub fn empty(id: CompanyId) -> Self {
        Self {
            id,
            organization_id: None,
            name: String::new(),
            contact_email: String::new(),
            members: BTreeSet::new(),
            is_active: false,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> CompanyId {
        self.id
    }

    pub fn organization_id(&self) -> Option<OrganizationId> {
        self.organization_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_active(&self) -> bool {
        self.is_active
    }

    pub fn members(&self) -> &BTreeSet<UserId> {
        &self.members
    }
}

impl AggregateRoot for Company {
    type Id = CompanyId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: CreateCompany.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateCompany {
    pub organization_id: OrganizationId,
    pub company_id: CompanyId,
    pub name: String,
    pub contact_email: String,
}

/// Command: UpdateCompanyDetails.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateCompanyDetails {
    pub organization_id: OrganizationId,
    pub company_id: CompanyId,
    pub name: String,
    pub contact_email: String,
}

/// Command: AddUser.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddUser {
    pub organization_id: OrganizationId,
    pub company_id: CompanyId,
    pub user_id: UserId,
}

/// Command: RemoveUser.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoveUser {
    pub organization_id: OrganizationId,
    pub company_id: CompanyId,
    pub user_id: UserId,
}

/// Command: DeactivateCompany.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeactivateCompany {
    pub organization_id: OrganizationId,
    pub company_id: CompanyId,
}

/// Command: ReactivateCompany.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReactivateCompany {
    pub organization_id: OrganizationId,
    pub company_id: CompanyId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompanyCommand {
    CreateCompany(CreateCompany),
    UpdateCompanyDetails(UpdateCompanyDetails),
    AddUser(AddUser),
    RemoveUser(RemoveUser),
    DeactivateCompany(DeactivateCompany),
    ReactivateCompany(ReactivateCompany),
}

/// Event: CompanyCreated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompanyCreated {
    pub organization_id: OrganizationId,
    pub company_id: CompanyId,
    pub name: String,
    pub contact_email: String,
}

/// Event: CompanyDetailsUpdated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompanyDetailsUpdated {
    pub organization_id: OrganizationId,
    pub company_id: CompanyId,
    pub name: String,
    pub contact_email: String,
}

/// Event: UserAdded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserAdded {
    pub organization_id: OrganizationId,
    pub company_id: CompanyId,
    pub user_id: UserId,
}

/// Event: UserRemoved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRemoved {
    pub organization_id: OrganizationId,
    pub company_id: CompanyId,
    pub user_id: UserId,
}

/// Event: CompanyDeactivated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompanyDeactivated {
    pub organization_id: OrganizationId,
    pub company_id: CompanyId,
}

/// Event: CompanyReactivated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompanyReactivated {
    pub organization_id: OrganizationId,
    pub company_id: CompanyId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompanyEvent {
    CompanyCreated(CompanyCreated),
    CompanyDetailsUpdated(CompanyDetailsUpdated),
    UserAdded(UserAdded),
    UserRemoved(UserRemoved),
    CompanyDeactivated(CompanyDeactivated),
    CompanyReactivated(CompanyReactivated),
}

impl CompanyEvent {
    pub fn organization_id(&self) -> OrganizationId {
        match self {
            CompanyEvent::CompanyCreated(e) => e.organization_id,
            CompanyEvent::CompanyDetailsUpdated(e) => e.organization_id,
            CompanyEvent::UserAdded(e) => e.organization_id,
            CompanyEvent::UserRemoved(e) => e.organization_id,
            CompanyEvent::CompanyDeactivated(e) => e.organization_id,
            CompanyEvent::CompanyReactivated(e) => e.organization_id,
        }
    }

    pub fn company_id(&self) -> CompanyId {
        match self {
            CompanyEvent::CompanyCreated(e) => e.company_id,
            CompanyEvent::CompanyDetailsUpdated(e) => e.company_id,
            CompanyEvent::UserAdded(e) => e.company_id,
            CompanyEvent::UserRemoved(e) => e.company_id,
            CompanyEvent::CompanyDeactivated(e) => e.company_id,
            CompanyEvent::CompanyReactivated(e) => e.company_id,
        }
    }
}

impl Event for CompanyEvent {
    fn event_type(&self) -> &'static str {
        match self {
            CompanyEvent::CompanyCreated(_) => "company.created",
            CompanyEvent::CompanyDetailsUpdated(_) => "company.details_updated",
            CompanyEvent::UserAdded(_) => "company.user_added",
            CompanyEvent::UserRemoved(_) => "company.user_removed",
            CompanyEvent::CompanyDeactivated(_) => "company.deactivated",
            CompanyEvent::CompanyReactivated(_) => "company.reactivated",
        }
    }

    fn to_payload(&self) -> serde_json::Result<JsonValue> {
        match self {
            CompanyEvent::CompanyCreated(e) => serde_json::to_value(e),
            CompanyEvent::CompanyDetailsUpdated(e) => serde_json::to_value(e),
            CompanyEvent::UserAdded(e) => serde_json::to_value(e),
            CompanyEvent::UserRemoved(e) => serde_json::to_value(e),
            CompanyEvent::CompanyDeactivated(e) => serde_json::to_value(e),
            CompanyEvent::CompanyReactivated(e) => serde_json::to_value(e),
        }
    }

    fn from_parts(event_type: &str, payload: &JsonValue) -> Result<Self, EventKindError> {
        let bad = |e: serde_json::Error| EventKindError::payload(event_type, e.to_string());
        match event_type {
            "company.created" => Ok(CompanyEvent::CompanyCreated(
                serde_json::from_value(payload.clone()).map_err(bad)?,
            )),
            "company.details_updated" => Ok(CompanyEvent::CompanyDetailsUpdated(
                serde_json::from_value(payload.clone()).map_err(bad)?,
            )),
            "company.user_added" => Ok(CompanyEvent::UserAdded(
                serde_json::from_value(payload.clone()).map_err(bad)?,
            )),
            "company.user_removed" => Ok(CompanyEvent::UserRemoved(
                serde_json::from_value(payload.clone()).map_err(bad)?,
            )),
            "company.deactivated" => Ok(CompanyEvent::CompanyDeactivated(
                serde_json::from_value(payload.clone()).map_err(bad)?,
            )),
            "company.reactivated" => Ok(CompanyEvent::CompanyReactivated(
                serde_json::from_value(payload.clone()).map_err(bad)?,
            )),
            other => Err(EventKindError::unknown(other)),
        }
    }
}

impl Aggregate for Company {
    type Command = CompanyCommand;
    type Event = CompanyEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            CompanyEvent::CompanyCreated(e) => {
                self.id = e.company_id;
                self.organization_id = Some(e.organization_id);
                self.name = e.name.clone();
                self.contact_email = e.contact_email.clone();
                self.members.clear();
                self.is_active = true;
                self.created = true;
            }
            CompanyEvent::CompanyDetailsUpdated(e) => {
                self.name = e.name.clone();
                self.contact_email = e.contact_email.clone();
            }
            CompanyEvent::UserAdded(e) => {
                self.members.insert(e.user_id);
            }
            CompanyEvent::UserRemoved(e) => {
                self.members.remove(&e.user_id);
            }
            CompanyEvent::CompanyDeactivated(_) => {
                self.is_active = false;
            }
            CompanyEvent::CompanyReactivated(_) => {
                self.is_active = true;
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            CompanyCommand::CreateCompany(cmd) => self.handle_create(cmd),
            CompanyCommand::UpdateCompanyDetails(cmd) => self.handle_update(cmd),
            CompanyCommand::AddUser(cmd) => self.handle_add_user(cmd),
            CompanyCommand::RemoveUser(cmd) => self.handle_remove_user(cmd),
            CompanyCommand::DeactivateCompany(cmd) => self.handle_deactivate(cmd),
            CompanyCommand::ReactivateCompany(cmd) => self.handle_reactivate(cmd),
        }
    }
}

impl Company {
    fn ensure_organization(&self, organization_id: OrganizationId) -> Result<(), DomainError> {
        if !self.created {
            return Ok(());
        }
        if self.organization_id != Some(organization_id) {
            return Err(DomainError::invariant("organization mismatch"));
        }
        Ok(())
    }

    fn ensure_company_id(&self, company_id: CompanyId) -> Result<(), DomainError> {
        if self.id != company_id {
            return Err(DomainError::invariant("company_id mismatch"));
        }
        Ok(())
    }

    fn ensure_exists(&self) -> Result<(), DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        Ok(())
    }

    fn handle_create(&self, cmd: &CreateCompany) -> Result<Vec<CompanyEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("company already exists"));
        }
        if cmd.name.trim().is_empty() {
            return Err(DomainError::validation("name cannot be empty"));
        }
        Ok(vec![CompanyEvent::CompanyCreated(CompanyCreated {
            organization_id: cmd.organization_id,
            company_id: cmd.company_id,
            name: cmd.name.clone(),
            contact_email: cmd.contact_email.clone(),
        })])
    }

    fn handle_update(&self, cmd: &UpdateCompanyDetails) -> Result<Vec<CompanyEvent>, DomainError> {
        self.ensure_exists()?;
        self.ensure_organization(cmd.organization_id)?;
        self.ensure_company_id(cmd.company_id)?;
        if cmd.name.trim().is_empty() {
            return Err(DomainError::validation("name cannot be empty"));
        }
        Ok(vec![CompanyEvent::CompanyDetailsUpdated(
            CompanyDetailsUpdated {
                organization_id: cmd.organization_id,
                company_id: cmd.company_id,
                name: cmd.name.clone(),
                contact_email: cmd.contact_email.clone(),
            },
        )])
    }

    fn handle_add_user(&self, cmd: &AddUser) -> Result<Vec<CompanyEvent>, DomainError> {
        self.ensure_exists()?;
        self.ensure_organization(cmd.organization_id)?;
        self.ensure_company_id(cmd.company_id)?;
        if !self.is_active {
            return Err(DomainError::invariant("company is deactivated"));
        }
        if self.members.contains(&cmd.user_id) {
            return Err(DomainError::conflict("user already a member"));
        }
        Ok(vec![CompanyEvent::UserAdded(UserAdded {
            organization_id: cmd.organization_id,
            company_id: cmd.company_id,
            user_id: cmd.user_id,
        })])
    }

    fn handle_remove_user(&self, cmd: &RemoveUser) -> Result<Vec<CompanyEvent>, DomainError> {
        self.ensure_exists()?;
        self.ensure_organization(cmd.organization_id)?;
        self.ensure_company_id(cmd.company_id)?;
        if !self.members.contains(&cmd.user_id) {
            return Err(DomainError::not_found());
        }
        Ok(vec![CompanyEvent::UserRemoved(UserRemoved {
            organization_id: cmd.organization_id,
            company_id: cmd.company_id,
            user_id: cmd.user_id,
        })])
    }

    fn handle_deactivate(&self, cmd: &DeactivateCompany) -> Result<Vec<CompanyEvent>, DomainError> {
        self.ensure_exists()?;
        self.ensure_organization(cmd.organization_id)?;
        self.ensure_company_id(cmd.company_id)?;
        if !self.is_active {
            return Err(DomainError::invariant("company already deactivated"));
        }
        Ok(vec![CompanyEvent::CompanyDeactivated(CompanyDeactivated {
            organization_id: cmd.organization_id,
            company_id: cmd.company_id,
        })])
    }

    fn handle_reactivate(&self, cmd: &ReactivateCompany) -> Result<Vec<CompanyEvent>, DomainError> {
        self.ensure_exists()?;
        self.ensure_organization(cmd.organization_id)?;
        self.ensure_company_id(cmd.company_id)?;
        if self.is_active {
            return Err(DomainError::invariant("company already active"));
        }
        Ok(vec![CompanyEvent::CompanyReactivated(CompanyReactivated {
            organization_id: cmd.organization_id,
            company_id: cmd.company_id,
        })])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assessly_events::execute;

    fn org() -> OrganizationId {
        OrganizationId::new()
    }

    fn cid() -> CompanyId {
        CompanyId::new(AggregateId::new())
    }

    fn created(organization_id: OrganizationId, company_id: CompanyId) -> Company {
        let mut c = Company::empty(company_id);
        execute(
            &mut c,
            &CompanyCommand::CreateCompany(CreateCompany {
                organization_id,
                company_id,
                name: "Acme Corp".to_string(),
                contact_email: "hr@acme.example".to_string(),
            }),
        )
        .unwrap();
        c
    }

    #[test]
    fn create_starts_active_with_no_members() {
        let c = created(org(), cid());
        assert!(c.is_active());
        assert!(c.members().is_empty());
        assert_eq!(c.version(), 1);
    }

    #[test]
    fn membership_is_a_set() {
        let organization_id = org();
        let company_id = cid();
        let mut c = created(organization_id, company_id);
        let user_id = UserId::new();

        execute(
            &mut c,
            &CompanyCommand::AddUser(AddUser {
                organization_id,
                company_id,
                user_id,
            }),
        )
        .unwrap();

        let err = c
            .handle(&CompanyCommand::AddUser(AddUser {
                organization_id,
                company_id,
                user_id,
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));

        execute(
            &mut c,
            &CompanyCommand::RemoveUser(RemoveUser {
                organization_id,
                company_id,
                user_id,
            }),
        )
        .unwrap();
        assert!(c.members().is_empty());
    }

    #[test]
    fn deactivation_is_a_flip_not_a_removal() {
        let organization_id = org();
        let company_id = cid();
        let mut c = created(organization_id, company_id);

        execute(
            &mut c,
            &CompanyCommand::DeactivateCompany(DeactivateCompany {
                organization_id,
                company_id,
            }),
        )
        .unwrap();
        assert!(!c.is_active());
        assert_eq!(c.name(), "Acme Corp");

        execute(
            &mut c,
            &CompanyCommand::ReactivateCompany(ReactivateCompany {
                organization_id,
                company_id,
            }),
        )
        .unwrap();
        assert!(c.is_active());
    }

    #[test]
    fn deactivated_company_rejects_new_members() {
        let organization_id = org();
        let company_id = cid();
        let mut c = created(organization_id, company_id);
        execute(
            &mut c,
            &CompanyCommand::DeactivateCompany(DeactivateCompany {
                organization_id,
                company_id,
            }),
        )
        .unwrap();

        let err = c
            .handle(&CompanyCommand::AddUser(AddUser {
                organization_id,
                company_id,
                user_id: UserId::new(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::InvariantViolation(_)));
    }

    #[test]
    fn event_parts_round_trip() {
        let ev = CompanyEvent::UserAdded(UserAdded {
            organization_id: org(),
            company_id: cid(),
            user_id: UserId::new(),
        });
        let back = CompanyEvent::from_parts(ev.event_type(), &ev.to_payload().unwrap()).unwrap();
        assert_eq!(ev, back);
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #![proptest_config(ProptestConfig {
                cases: 256,
                ..ProptestConfig::default()
            })]

            /// Property: replaying the emitted events onto a fresh instance
            /// reproduces the evolved state exactly.
            #[test]
            fn replay_reproduces_state(adds in 1usize..12) {
                let organization_id = org();
                let company_id = cid();

                let mut live = Company::empty(company_id);
                let mut log = execute(&mut live, &CompanyCommand::CreateCompany(CreateCompany {
                    organization_id,
                    company_id,
                    name: "Acme Corp".to_string(),
                    contact_email: "hr@acme.example".to_string(),
                })).unwrap();

                for _ in 0..adds {
                    log.extend(execute(&mut live, &CompanyCommand::AddUser(AddUser {
                        organization_id,
                        company_id,
                        user_id: UserId::new(),
                    })).unwrap());
                }

                let mut replayed = Company::empty(company_id);
                for ev in &log {
                    replayed.apply(ev);
                }
                prop_assert_eq!(live, replayed);
            }
        }
    }
}
