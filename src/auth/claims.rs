use serde::{Deserialize, Serialize};

/// JWT payload used for authentication.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Claims {
    pub sub: String,  // user ID, decimal encoded
    pub name: String, // display name (username)
    pub admin: bool,  // always false, no elevation path exists
    pub iat: i64,     // issued at (unix timestamp)
    pub exp: i64,     // expires at (unix timestamp)
}

impl Claims {
    /// Numeric user id carried in `sub`. `None` when the subject is not an integer.
    pub fn user_id(&self) -> Option<i64> {
        self.sub.parse::<i64>().ok()
    }
}
