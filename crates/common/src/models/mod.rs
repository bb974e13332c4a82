//! Typed records stored as documents
//!
//! Field names are camelCase both on the wire and in the store. Ingress
//! types (`*Input`, `New*`, `Record*`, `*Update`) carry validation rules;
//! stored records are produced only by the workflows in `services`.

mod device;
mod landlord;
mod payment;
mod property;
mod tenant;

pub use device::{DeviceToken, RegisterToken, UserRecord};
pub use landlord::{Landlord, NewLandlord};
pub use payment::{
    month_label, parse_month_label, Payment, PaymentType, PaymentUpdate, RecordPayment,
};
pub use property::{Property, PropertyInput, Unit, UnitInput};
pub use tenant::{NewTenant, Tenant, TenantUpdate};
pub(crate) use tenant::blank_email_as_none;

use validator::ValidationError;

/// Phone numbers are exactly ten digits
pub(crate) fn validate_phone(phone: &str) -> Result<(), ValidationError> {
    if phone.len() == 10 && phone.chars().all(|c| c.is_ascii_digit()) {
        Ok(())
    } else {
        let mut err = ValidationError::new("phone");
        err.message = Some("Phone number must be exactly 10 digits.".into());
        Err(err)
    }
}

/// Rejects strings that are empty after trimming
pub(crate) fn validate_not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        let mut err = ValidationError::new("blank");
        err.message = Some("Value must not be blank.".into());
        Err(err)
    } else {
        Ok(())
    }
}
