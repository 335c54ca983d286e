use serde::{Deserialize, Serialize};

/// Role carried in the access token issued by the account service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UserRole {
    SuperAdmin,
    Admin,
    #[default]
    User,
}

impl UserRole {
    pub fn is_super_admin(self) -> bool {
        matches!(self, UserRole::SuperAdmin)
    }
}
