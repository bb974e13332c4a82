//! API handlers module

pub mod devices;
pub mod health;
pub mod landlords;
pub mod notifications;
pub mod payments;
pub mod properties;
pub mod reports;
pub mod tenants;
