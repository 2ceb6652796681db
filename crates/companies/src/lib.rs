//! Companies domain module.

pub mod company;

pub use company::{
    AddUser, Company, CompanyCommand, CompanyCreated, CompanyDeactivated, CompanyDetailsUpdated,
    CompanyEvent, CompanyId, CompanyReactivated, CreateCompany, DeactivateCompany,
    ReactivateCompany, RemoveUser, UpdateCompanyDetails, UserAdded, UserRemoved,
};
