use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone)]
pub struct User {
    pub id: u64,
    pub name: Option<String>,
    pub email: String,
    /// `None` until the account holder sets a password.
    pub password: Option<String>,
    pub is_first_login: bool,
}

/// Shape returned by the mapped users queries; the flag comes back as an integer
/// because CRM tables rarely use a real boolean column.
#[derive(Debug, sqlx::FromRow)]
pub struct UserRow {
    pub id: u64,
    pub name: Option<String>,
    pub email: String,
    pub password: Option<String>,
    pub is_first_login: i64,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            email: row.email,
            password: row.password.filter(|p| !p.is_empty()),
            is_first_login: row.is_first_login != 0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
pub struct UserSummary {
    #[schema(example = 1)]
    pub id: u64,
    #[schema(example = "Asha Rao")]
    pub name: Option<String>,
    #[schema(example = "asha@company.com")]
    pub email: String,
}

impl User {
    pub fn summary(&self) -> UserSummary {
        UserSummary {
            id: self.id,
            name: self.name.clone(),
            email: self.email.clone(),
        }
    }
}
