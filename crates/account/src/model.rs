use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Identity and timestamps shared by every stored record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Model {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A grant on one kind of object, e.g. `product-list` on `product`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Permission {
    #[serde(flatten)]
    pub model: Model,
    pub name: String,
    pub content_type: String,
    #[serde(rename = "codeName")]
    pub codename: String,
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} | {}", self.name, self.content_type)
    }
}

/// A label for users; members get every permission of the group.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Group {
    #[serde(flatten)]
    pub model: Model,
    pub name: String,
    pub permissions: Vec<Permission>,
}

impl fmt::Display for Group {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// An account. Secrets (password digest and one-time tokens) are never serialized.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct User {
    #[serde(flatten)]
    pub model: Model,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub username: String,
    pub note: String,
    /// Unset instead of deleting the account.
    pub is_active: bool,
    /// May log into the admin site.
    pub is_staff: bool,
    /// Holds every permission without explicit grants.
    #[serde(rename = "isSuperUser")]
    pub is_superuser: bool,
    pub groups: Vec<Group>,
    pub permissions: Vec<Permission>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confirmed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confirmation_sent_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub invited_at: Option<DateTime<Utc>>,
    #[serde(rename = "newEmail", skip_serializing_if = "String::is_empty")]
    pub email_change: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email_change_sent_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recovery_sent_at: Option<DateTime<Utc>>,
    pub last_sign_in_at: Option<DateTime<Utc>>,
    #[serde(skip)]
    pub password_hash: String,
    #[serde(skip)]
    pub confirmation_token: String,
    #[serde(skip)]
    pub email_change_token: String,
    #[serde(skip)]
    pub recovery_token: String,
}

impl User {
    pub fn id(&self) -> Uuid {
        self.model.id
    }

    pub fn is_confirmed(&self) -> bool {
        self.confirmed_at.is_some()
    }

    /// First and last name, falling back to the email when both are empty.
    pub fn full_name(&self) -> String {
        if self.first_name.is_empty() && self.last_name.is_empty() {
            return self.email.clone();
        }
        format!("{} {}", self.first_name, self.last_name).trim().to_owned()
    }

    pub fn short_name(&self) -> &str {
        &self.email
    }

    /// Permissions granted to the user directly.
    pub fn permissions(&self) -> impl Iterator<Item = &Permission> {
        self.permissions.iter()
    }

    /// Permissions the user has through their groups.
    pub fn group_permissions(&self) -> impl Iterator<Item = &Permission> {
        self.groups.iter().flat_map(|group| group.permissions.iter())
    }

    pub fn all_permissions(&self) -> impl Iterator<Item = &Permission> {
        self.permissions().chain(self.group_permissions())
    }

    /// Whether the user holds the permission with codename `perm`. Active superusers hold all.
    pub fn has_perm(&self, perm: &str) -> bool {
        if self.is_active && self.is_superuser {
            return true;
        }
        self.all_permissions().any(|permission| permission.codename == perm)
    }
}
