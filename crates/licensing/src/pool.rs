use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use assessly_core::{Aggregate, AggregateId, AggregateRoot, DomainError, OrganizationId};
use assessly_events::{Event, EventKindError};

/// License pool identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LicensePoolId(pub AggregateId);

impl LicensePoolId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for LicensePoolId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Aggregate root: a pool of assessment licenses purchased by an organization.
///
/// State keeps only primitive counters (`total_purchased`, `consumed`,
/// `warning_threshold`); availability and the warning/depleted conditions are
/// derived from them on demand so they can never drift.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LicensePool {
    id: LicensePoolId,
    organization_id: Option<OrganizationId>,
    assessment_name: String,
    total_purchased: u64,
    consumed: u64,
    warning_threshold: u64,
    is_active: bool,
    version: u64,
    created: bool,
}

impl LicensePool {
    /// Create an empty, not-yet-created aggregate instance for rehydration.
    pub fn empty(id: LicensePoolId) -> Self {
        Self {
            id,
            organization_id: None,
            assessment_name: String::new(),
            total_purchased: 0,
            consumed: 0,
            warning_threshold: 0,
            is_active: false,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> LicensePoolId {
        self.id
    }

    pub fn organization_id(&self) -> Option<OrganizationId> {
        self.organization_id
    }

    pub fn total_purchased(&self) -> u64 {
        self.total_purchased
    }

    pub fn consumed(&self) -> u64 {
        self.consumed
    }

    pub fn available(&self) -> u64 {
        self.total_purchased.saturating_sub(self.consumed)
    }

    pub fn warning_threshold(&self) -> u64 {
        self.warning_threshold
    }

    pub fn is_warning(&self) -> bool {
        self.available() <= self.warning_threshold
    }

    pub fn is_depleted(&self) -> bool {
        self.available() == 0
    }

    pub fn is_active(&self) -> bool {
        self.is_active
    }
}

impl AggregateRoot for LicensePool {
    type Id = LicensePoolId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: CreatePool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatePool {
    pub organization_id: OrganizationId,
    pub pool_id: LicensePoolId,
    pub assessment_name: String,
    pub total_purchased: u64,
    pub warning_threshold: u64,
}

/// Command: ConsumeLicenses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsumeLicenses {
    pub organization_id: OrganizationId,
    pub pool_id: LicensePoolId,
    pub count: u64,
}

/// Command: ReleaseLicenses (e.g. a cancelled session returns its license).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseLicenses {
    pub organization_id: OrganizationId,
    pub pool_id: LicensePoolId,
    pub count: u64,
}

/// Command: PurchaseLicenses (top-up).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseLicenses {
    pub organization_id: OrganizationId,
    pub pool_id: LicensePoolId,
    pub count: u64,
}

/// Command: ChangeWarningThreshold.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeWarningThreshold {
    pub organization_id: OrganizationId,
    pub pool_id: LicensePoolId,
    pub warning_threshold: u64,
}

/// Command: DeactivatePool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeactivatePool {
    pub organization_id: OrganizationId,
    pub pool_id: LicensePoolId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LicensePoolCommand {
    CreatePool(CreatePool),
    ConsumeLicenses(ConsumeLicenses),
    ReleaseLicenses(ReleaseLicenses),
    PurchaseLicenses(PurchaseLicenses),
    ChangeWarningThreshold(ChangeWarningThreshold),
    DeactivatePool(DeactivatePool),
}

/// Event: PoolCreated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolCreated {
    pub organization_id: OrganizationId,
    pub pool_id: LicensePoolId,
    pub assessment_name: String,
    pub total_purchased: u64,
    pub warning_threshold: u64,
}

/// Event: LicensesConsumed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LicensesConsumed {
    pub organization_id: OrganizationId,
    pub pool_id: LicensePoolId,
    pub count: u64,
}

/// Event: LicensesReleased.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LicensesReleased {
    pub organization_id: OrganizationId,
    pub pool_id: LicensePoolId,
    pub count: u64,
}

/// Event: LicensesPurchased.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LicensesPurchased {
    pub organization_id: OrganizationId,
    pub pool_id: LicensePoolId,
    pub count: u64,
}

/// Event: WarningThresholdChanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WarningThresholdChanged {
    pub organization_id: OrganizationId,
    pub pool_id: LicensePoolId,
    pub warning_threshold: u64,
}

/// Event: PoolDeactivated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolDeactivated {
    pub organization_id: OrganizationId,
    pub pool_id: LicensePoolId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LicensePoolEvent {
    PoolCreated(PoolCreated),
    LicensesConsumed(LicensesConsumed),
    LicensesReleased(LicensesReleased),
    LicensesPurchased(LicensesPurchased),
    WarningThresholdChanged(WarningThresholdChanged),
    PoolDeactivated(PoolDeactivated),
}

impl LicensePoolEvent {
    pub fn organization_id(&self) -> OrganizationId {
        match self {
            LicensePoolEvent::PoolCreated(e) => e.organization_id,
            LicensePoolEvent::LicensesConsumed(e) => e.organization_id,
            LicensePoolEvent::LicensesReleased(e) => e.organization_id,
            LicensePoolEvent::LicensesPurchased(e) => e.organization_id,
            LicensePoolEvent::WarningThresholdChanged(e) => e.organization_id,
            LicensePoolEvent::PoolDeactivated(e) => e.organization_id,
        }
    }

    pub fn pool_id(&self) -> LicensePoolId {
        match self {
            LicensePoolEvent::PoolCreated(e) => e.pool_id,
            LicensePoolEvent::LicensesConsumed(e) => e.pool_id,
            LicensePoolEvent::LicensesReleased(e) => e.pool_id,
            LicensePoolEvent::LicensesPurchased(e) => e.pool_id,
            LicensePoolEvent::WarningThresholdChanged(e) => e.pool_id,
            LicensePoolEvent::PoolDeactivated(e) => e.pool_id,
        }
    }
}

impl Event for LicensePoolEvent {
    fn event_type(&self) -> &'static str {
        match self {
            LicensePoolEvent::PoolCreated(_) => "license_pool.created",
            LicensePoolEvent::LicensesConsumed(_) => "license_pool.consumed",
            LicensePoolEvent::LicensesReleased(_) => "license_pool.released",
            LicensePoolEvent::LicensesPurchased(_) => "license_pool.purchased",
            LicensePoolEvent::WarningThresholdChanged(_) => "license_pool.threshold_changed",
            LicensePoolEvent::PoolDeactivated(_) => "license_pool.deactivated",
        }
    }

    fn to_payload(&self) -> serde_json::Result<JsonValue> {
        match self {
            LicensePoolEvent::PoolCreated(e) => serde_json::to_value(e),
            LicensePoolEvent::LicensesConsumed(e) => serde_json::to_value(e),
            LicensePoolEvent::LicensesReleased(e) => serde_json::to_value(e),
            LicensePoolEvent::LicensesPurchased(e) => serde_json::to_value(e),
            LicensePoolEvent::WarningThresholdChanged(e) => serde_json::to_value(e),
            LicensePoolEvent::PoolDeactivated(e) => serde_json::to_value(e),
        }
    }

    fn from_parts(event_type: &str, payload: &JsonValue) -> Result<Self, EventKindError> {
        let bad = |e: serde_json::Error| EventKindError::payload(event_type, e.to_string());
        match event_type {
            "license_pool.created" => Ok(LicensePoolEvent::PoolCreated(
                serde_json::from_value(payload.clone()).map_err(bad)?,
            )),
            "license_pool.consumed" => Ok(LicensePoolEvent::LicensesConsumed(
                serde_json::from_value(payload.clone()).map_err(bad)?,
            )),
            "license_pool.released" => Ok(LicensePoolEvent::LicensesReleased(
                serde_json::from_value(payload.clone()).map_err(bad)?,
            )),
            "license_pool.purchased" => Ok(LicensePoolEvent::LicensesPurchased(
                serde_json::from_value(payload.clone()).map_err(bad)?,
            )),
            "license_pool.threshold_changed" => Ok(LicensePoolEvent::WarningThresholdChanged(
                serde_json::from_value(payload.clone()).map_err(bad)?,
            )),
            "license_pool.deactivated" => Ok(LicensePoolEvent::PoolDeactivated(
                serde_json::from_value(payload.clone()).map_err(bad)?,
            )),
            other => Err(EventKindError::unknown(other)),
        }
    }
}

impl Aggregate for LicensePool {
    type Command = LicensePoolCommand;
    type Event = LicensePoolEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            LicensePoolEvent::PoolCreated(e) => {
                self.id = e.pool_id;
                self.organization_id = Some(e.organization_id);
                self.assessment_name = e.assessment_name.clone();
                self.total_purchased = e.total_purchased;
                self.consumed = 0;
                self.warning_threshold = e.warning_threshold;
                self.is_active = true;
                self.created = true;
            }
            LicensePoolEvent::LicensesConsumed(e) => {
                self.consumed += e.count;
            }
            LicensePoolEvent::LicensesReleased(e) => {
                self.consumed = self.consumed.saturating_sub(e.count);
            }
            LicensePoolEvent::LicensesPurchased(e) => {
                self.total_purchased += e.count;
            }
            LicensePoolEvent::WarningThresholdChanged(e) => {
                self.warning_threshold = e.warning_threshold;
            }
            LicensePoolEvent::PoolDeactivated(_) => {
                self.is_active = false;
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            LicensePoolCommand::CreatePool(cmd) => self.handle_create(cmd),
            LicensePoolCommand::ConsumeLicenses(cmd) => self.handle_consume(cmd),
            LicensePoolCommand::ReleaseLicenses(cmd) => self.handle_release(cmd),
            LicensePoolCommand::PurchaseLicenses(cmd) => self.handle_purchase(cmd),
            LicensePoolCommand::ChangeWarningThreshold(cmd) => self.handle_threshold(cmd),
            LicensePoolCommand::DeactivatePool(cmd) => self.handle_deactivate(cmd),
        }
    }
}

impl LicensePool {
    fn ensure_organization(&self, organization_id: OrganizationId) -> Result<(), DomainError> {
        if !self.created {
            return Ok(());
        }
        if self.organization_id != Some(organization_id) {
            return Err(DomainError::invariant("organization mismatch"));
        }
        Ok(())
    }

    fn ensure_pool(&self, cmd_org: OrganizationId, pool_id: LicensePoolId) -> Result<(), DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        self.ensure_organization(cmd_org)?;
        if self.id != pool_id {
            return Err(DomainError::invariant("pool_id mismatch"));
        }
        Ok(())
    }

    fn handle_create(&self, cmd: &CreatePool) -> Result<Vec<LicensePoolEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("pool already exists"));
        }
        if cmd.total_purchased == 0 {
            return Err(DomainError::validation("total_purchased must be positive"));
        }
        if cmd.warning_threshold >= cmd.total_purchased {
            return Err(DomainError::validation(
                "warning_threshold must be below total_purchased",
            ));
        }
        Ok(vec![LicensePoolEvent::PoolCreated(PoolCreated {
            organization_id: cmd.organization_id,
            pool_id: cmd.pool_id,
            assessment_name: cmd.assessment_name.clone(),
            total_purchased: cmd.total_purchased,
            warning_threshold: cmd.warning_threshold,
        })])
    }

    fn handle_consume(&self, cmd: &ConsumeLicenses) -> Result<Vec<LicensePoolEvent>, DomainError> {
        self.ensure_pool(cmd.organization_id, cmd.pool_id)?;
        if !self.is_active {
            return Err(DomainError::invariant("pool is deactivated"));
        }
        if cmd.count == 0 {
            return Err(DomainError::validation("count must be positive"));
        }
        if cmd.count > self.available() {
            return Err(DomainError::invariant("not enough licenses available"));
        }
        Ok(vec![LicensePoolEvent::LicensesConsumed(LicensesConsumed {
            organization_id: cmd.organization_id,
            pool_id: cmd.pool_id,
            count: cmd.count,
        })])
    }

    fn handle_release(&self, cmd: &ReleaseLicenses) -> Result<Vec<LicensePoolEvent>, DomainError> {
        self.ensure_pool(cmd.organization_id, cmd.pool_id)?;
        if cmd.count == 0 {
            return Err(DomainError::validation("count must be positive"));
        }
        if cmd.count > self.consumed {
            return Err(DomainError::invariant("cannot release more than consumed"));
        }
        Ok(vec![LicensePoolEvent::LicensesReleased(LicensesReleased {
            organization_id: cmd.organization_id,
            pool_id: cmd.pool_id,
            count: cmd.count,
        })])
    }

    fn handle_purchase(&self, cmd: &PurchaseLicenses) -> Result<Vec<LicensePoolEvent>, DomainError> {
        self.ensure_pool(cmd.organization_id, cmd.pool_id)?;
        if !self.is_active {
            return Err(DomainError::invariant("pool is deactivated"));
        }
        if cmd.count == 0 {
            return Err(DomainError::validation("count must be positive"));
        }
        Ok(vec![LicensePoolEvent::LicensesPurchased(LicensesPurchased {
            organization_id: cmd.organization_id,
            pool_id: cmd.pool_id,
            count: cmd.count,
        })])
    }

    fn handle_threshold(
        &self,
        cmd: &ChangeWarningThreshold,
    ) -> Result<Vec<LicensePoolEvent>, DomainError> {
        self.ensure_pool(cmd.organization_id, cmd.pool_id)?;
        if cmd.warning_threshold >= self.total_purchased {
            return Err(DomainError::validation(
                "warning_threshold must be below total_purchased",
            ));
        }
        Ok(vec![LicensePoolEvent::WarningThresholdChanged(
            WarningThresholdChanged {
                organization_id: cmd.organization_id,
                pool_id: cmd.pool_id,
                warning_threshold: cmd.warning_threshold,
            },
        )])
    }

    fn handle_deactivate(&self, cmd: &DeactivatePool) -> Result<Vec<LicensePoolEvent>, DomainError> {
        self.ensure_pool(cmd.organization_id, cmd.pool_id)?;
        if !self.is_active {
            return Err(DomainError::invariant("pool already deactivated"));
        }
        Ok(vec![LicensePoolEvent::PoolDeactivated(PoolDeactivated {
            organization_id: cmd.organization_id,
            pool_id: cmd.pool_id,
        })])
    }
}
