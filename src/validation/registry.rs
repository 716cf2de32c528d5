use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use anyhow::Context;
use tracing::info;

use super::{EntityValidator, RuleSet};

pub const PERMISSION_CREATE: &str = "permission.create";
pub const PERMISSION_UPDATE: &str = "permission.update";
pub const USER_PROFILE: &str = "user_profile";
pub const AUTH_REGISTER: &str = "auth.register";

const DEFAULTS: &[(&str, &[(&str, &str)])] = &[
    (
        PERMISSION_CREATE,
        &[
            ("name", "required|string|max:255"),
            ("guard_name", "nullable|string|max:255"),
        ],
    ),
    (
        PERMISSION_UPDATE,
        &[
            ("name", "required|string|max:255"),
            ("guard_name", "nullable|string|max:255"),
        ],
    ),
    (
        USER_PROFILE,
        &[
            ("name", "sometimes|string|max:255"),
            ("email", "sometimes|email|max:255"),
        ],
    ),
    (
        AUTH_REGISTER,
        &[
            ("name", "required|string|max:255"),
            ("email", "required|email|max:255"),
            ("password", "required|string|min:8"),
            ("agree", "accepted"),
        ],
    ),
];

/// Named rule sets, built-in defaults optionally overridden from a JSON file.
#[derive(Debug, Clone)]
pub struct RuleRegistry {
    sets: HashMap<String, RuleSet>,
}

impl RuleRegistry {
    pub fn builtin() -> anyhow::Result<Self> {
        let mut sets = HashMap::new();
        for (name, entries) in DEFAULTS {
            let set = RuleSet::parse(entries.iter().copied())
                .with_context(|| format!("built-in rule set `{name}`"))?;
            sets.insert((*name).to_string(), set);
        }
        Ok(Self { sets })
    }

    /// Built-ins, with any set named in `path` replacing the built-in one.
    pub fn load(path: Option<&str>) -> anyhow::Result<Self> {
        let mut registry = Self::builtin()?;
        if let Some(path) = path {
            let raw = std::fs::read_to_string(Path::new(path))
                .with_context(|| format!("read validation rules from {path}"))?;
            let count = registry.merge_json(&raw)?;
            info!(path, sets = count, "validation rules loaded");
        }
        Ok(registry)
    }

    /// Merges `{"set": {"field": "rule|rule"}}` documents. Returns the number of sets read.
    pub fn merge_json(&mut self, raw: &str) -> anyhow::Result<usize> {
        let doc: BTreeMap<String, BTreeMap<String, String>> =
            serde_json::from_str(raw).context("parse validation rules json")?;
        let count = doc.len();
        for (name, fields) in doc {
            let set = RuleSet::parse(fields.iter().map(|(f, r)| (f.as_str(), r.as_str())))
                .with_context(|| format!("rule set `{name}`"))?;
            self.sets.insert(name, set);
        }
        Ok(count)
    }

    pub fn get(&self, name: &str) -> anyhow::Result<&RuleSet> {
        self.sets
            .get(name)
            .ok_or_else(|| anyhow::anyhow!("no validation rule set named `{name}`"))
    }

    pub fn entity(&self, create: &str, update: &str) -> anyhow::Result<EntityValidator> {
        Ok(EntityValidator::new(
            self.get(create)?.clone(),
            self.get(update)?.clone(),
        ))
    }
}
