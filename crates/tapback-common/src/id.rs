use serde::{Deserialize, Serialize};
use std::fmt;

pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Identifies one connected viewer in the broadcast registry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ViewerId(String);

impl ViewerId {
    pub fn new() -> Self {
        Self(new_id())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ViewerId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ViewerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_id_is_valid_uuid() {
        let id = new_id();
        let parsed = uuid::Uuid::parse_str(&id);
        assert!(parsed.is_ok());
        assert_eq!(parsed.unwrap().get_version_num(), 4);
    }

    #[test]
    fn viewer_id_is_unique() {
        assert_ne!(ViewerId::new(), ViewerId::new());
    }

    #[test]
    fn viewer_id_display() {
        let vid = ViewerId::new();
        assert_eq!(vid.to_string(), vid.as_str());
    }

    #[test]
    fn viewer_id_hash() {
        use std::collections::HashSet;
        let mut set = HashSet::new();
        let v1 = ViewerId::new();
        set.insert(v1.clone());
        set.insert(v1);
        assert_eq!(set.len(), 1);
    }
}
