//! License pool domain module.

pub mod pool;

pub use pool::{
    ChangeWarningThreshold, ConsumeLicenses, CreatePool, DeactivatePool, LicensePool,
    LicensePoolCommand, LicensePoolEvent, LicensePoolId, LicensesConsumed, LicensesPurchased,
    LicensesReleased, PoolCreated, PoolDeactivated, PurchaseLicenses, ReleaseLicenses,
    WarningThresholdChanged,
};
