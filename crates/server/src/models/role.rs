/// Longest description a role can carry.
pub const MAX_ROLE_DESCRIPTION_LEN: usize = 50;

/// A named role users can be members of.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Role {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
}

impl Role {
    pub fn new(name: &str, description: Option<&str>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.trim().to_string(),
            description: description.map(str::to_string),
        }
    }
}
