use serde::{Deserialize, Serialize};

use super::repo_types::Permission;
use crate::pagination::Page;

pub const DEFAULT_GUARD: &str = "web";

/// Fields a permission is created or replaced from.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PermissionPayload {
    pub name: String,
    #[serde(default)]
    pub guard_name: Option<String>,
}

impl PermissionPayload {
    pub fn guard(&self) -> &str {
        self.guard_name
            .as_deref()
            .map(str::trim)
            .filter(|g| !g.is_empty())
            .unwrap_or(DEFAULT_GUARD)
    }

    pub fn name(&self) -> &str {
        self.name.trim()
    }
}

#[derive(Debug, Serialize)]
pub struct PermissionList {
    pub permissions: Page<Permission>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guard_defaults_to_web() {
        let p: PermissionPayload = serde_json::from_str(r#"{"name":" edit "}"#).unwrap();
        assert_eq!(p.guard(), "web");
        assert_eq!(p.name(), "edit");

        let p: PermissionPayload =
            serde_json::from_str(r#"{"name":"edit","guard_name":"api"}"#).unwrap();
        assert_eq!(p.guard(), "api");

        let p: PermissionPayload =
            serde_json::from_str(r#"{"name":"edit","guard_name":""}"#).unwrap();
        assert_eq!(p.guard(), "web");
    }
}
