//! Authorship records

use serde::{Deserialize, Serialize};

use crate::{AuthorshipId, PublicationId};

/// A user's authorship of a publication
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Authorship {
    pub id: AuthorshipId,
    pub publication_id: PublicationId,
    pub user_id: i64,
    pub author_number: i32,
    pub confirmed: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewAuthorship {
    pub user_id: i64,
    pub author_number: i32,
    #[serde(default)]
    pub confirmed: bool,
}

impl NewAuthorship {
    pub fn new(user_id: i64, author_number: i32) -> Self {
        Self {
            user_id,
            author_number,
            confirmed: false,
        }
    }

    pub fn confirmed(mut self) -> Self {
        self.confirmed = true;
        self
    }
}
