//! Customer and user account aggregates

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use crate::domain::value_objects::{CustomerId, UserId};

/// A platform account. Customers hang off users one to one.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct User {
    pub id: UserId,
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub is_staff: bool,
    pub date_joined: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub password_hash: String,
    pub is_staff: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Customer {
    pub id: CustomerId,
    pub user_id: UserId,
    pub phone: String,
    pub birth_date: Option<NaiveDate>,
    pub membership: Membership,
}

/// The editable part of a customer record.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CustomerProfile {
    pub phone: String,
    pub birth_date: Option<NaiveDate>,
    pub membership: Membership,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Membership {
    #[default]
    #[serde(rename = "B")]
    Bronze,
    #[serde(rename = "S")]
    Silver,
    #[serde(rename = "G")]
    Gold,
}

impl Membership {
    pub fn code(&self) -> &'static str {
        match self { Self::Bronze => "B", Self::Silver => "S", Self::Gold => "G" }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code { "B" => Some(Self::Bronze), "S" => Some(Self::Silver), "G" => Some(Self::Gold), _ => None }
    }
}

impl Customer {
    /// Orders keep their customer alive.
    pub fn ensure_deletable(order_count: i64) -> Result<(), CustomerError> {
        if order_count > 0 { return Err(CustomerError::HasOrders); }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CustomerError {
    #[error("customer cannot be deleted, associated with orders")]
    HasOrders,
    #[error("No registration found for the user with this user id.")]
    UnknownUser,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_membership_order_and_default() {
        assert_eq!(Membership::default(), Membership::Bronze);
        assert!(Membership::Bronze < Membership::Silver && Membership::Silver < Membership::Gold);
        assert_eq!(Membership::from_code(Membership::Gold.code()), Some(Membership::Gold));
        assert_eq!(serde_json::to_string(&Membership::Silver).unwrap(), "\"S\"");
    }

    #[test]
    fn test_customer_delete_rule() {
        assert!(Customer::ensure_deletable(0).is_ok());
        assert_eq!(Customer::ensure_deletable(2), Err(CustomerError::HasOrders));
    }
}
