use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::storage::{Document, Patch, Result};

/// Lifecycle state of an account.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountStatus {
    #[default]
    Active,
    Inactive,
    Pending,
    Suspended,
    Banned,
    Deleted,
    Archived,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    #[default]
    User,
    Guest,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub status: AccountStatus,
    pub role: Role,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    pub street: String,
    pub city: String,
    pub state: String,
    pub zip: String,
    pub country: String,
}

/// A reader of the aggregator.
///
/// Credentials live with the authentication service and are not part of
/// the cached document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub firstname: String,
    pub lastname: String,
    pub email: String,
    #[serde(default)]
    pub account: Account,
    pub address: Option<Address>,
    /// Tags the user follows.
    #[serde(default)]
    pub preferences: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn new(
        firstname: impl Into<String>,
        lastname: impl Into<String>,
        email: impl Into<String>,
    ) -> Self {
        Self {
            id: None,
            firstname: firstname.into(),
            lastname: lastname.into(),
            email: email.into(),
            account: Account::default(),
            address: None,
            preferences: Vec::new(),
            created_at: Utc::now(),
        }
    }

    /// Sets a specific ID (useful for testing).
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_preferences<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.preferences = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self
    }

    pub fn display_name(&self) -> String {
        format!("{} {}", self.firstname, self.lastname)
    }
}

impl Document for User {
    const COLLECTION: &'static str = "users";
    const KIND: &'static str = "User";

    fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    fn set_id(&mut self, id: String) {
        self.id = Some(id);
    }
}

/// Editable profile fields.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileUpdate {
    pub firstname: Option<String>,
    pub lastname: Option<String>,
    pub address: Option<Address>,
}

impl ProfileUpdate {
    pub fn into_patch(self) -> Result<Patch> {
        let mut patch = Patch::new();
        if let Some(firstname) = self.firstname {
            patch = patch.set("firstname", firstname);
        }
        if let Some(lastname) = self.lastname {
            patch = patch.set("lastname", lastname);
        }
        if let Some(address) = self.address {
            patch = patch.set_serialized("address", &address)?;
        }
        Ok(patch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_user_account_defaults() {
        let user = User::new("Ada", "Lovelace", "ada@example.com");
        assert_eq!(user.account.status, AccountStatus::Active);
        assert_eq!(user.account.role, Role::User);
        assert!(user.preferences.is_empty());
    }

    #[test]
    fn test_account_serializes_lowercase() {
        let account = Account {
            status: AccountStatus::Suspended,
            role: Role::Admin,
        };
        assert_eq!(
            serde_json::to_string(&account).unwrap(),
            r#"{"status":"suspended","role":"admin"}"#
        );
    }

    #[test]
    fn test_missing_account_deserializes_to_default() {
        let json = r#"{
            "firstname": "Ada",
            "lastname": "Lovelace",
            "email": "ada@example.com",
            "address": null,
            "created_at": "2024-06-15T10:30:00Z"
        }"#;
        let user: User = serde_json::from_str(json).unwrap();
        assert_eq!(user.account, Account::default());
    }

    #[test]
    fn test_display_name() {
        assert_eq!(
            User::new("Ada", "Lovelace", "ada@example.com").display_name(),
            "Ada Lovelace"
        );
    }

    #[test]
    fn test_empty_profile_update_is_empty_patch() {
        assert!(ProfileUpdate::default().into_patch().unwrap().is_empty());
    }
}
