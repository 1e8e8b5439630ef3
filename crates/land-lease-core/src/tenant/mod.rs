//! Tenants, their contacts and the share allocator.

mod allocator;
mod model;

pub use allocator::{allocate, ShareAllocation};
pub use model::{
    Contact, ContactDirectory, Share, ShareSum, Tenant, TenantContact, TenantContactType, TenantRentShare,
};
