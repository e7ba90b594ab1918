use serde::{Deserialize, Serialize};

use crate::models::UserId;

/// Contents of the encrypted session cookie: `{ "user": { "id": .. } }`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionData {
    pub user: SessionUser,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionUser {
    pub id: UserId,
}

impl SessionData {
    pub fn new(id: UserId) -> Self {
        Self {
            user: SessionUser { id },
        }
    }

    pub fn user_id(&self) -> UserId {
        self.user.id
    }
}
