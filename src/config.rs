use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct Config {
    pub plan_path: String,
    /// Where to write the normalized plan, if anywhere.
    pub plan_out: Option<String>,
    /// Treat any coercion while loading as a failure.
    pub strict: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            plan_path: "./faults.json".to_string(),
            plan_out: None,
            strict: false,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|k| std::env::var(k).ok())
    }

    /// Build from an arbitrary key lookup; `from_env` passes the process env.
    pub fn from_lookup<F: Fn(&str) -> Option<String>>(get: F) -> Self {
        let defaults = Self::default();
        Self {
            plan_path: get("FAULT_PLAN_PATH").unwrap_or(defaults.plan_path),
            plan_out: get("FAULT_PLAN_OUT").filter(|v| !v.trim().is_empty()),
            strict: get("FAULT_STRICT")
                .map(|v| matches!(v.trim().to_lowercase().as_str(), "1" | "true" | "yes"))
                .unwrap_or(defaults.strict),
        }
    }
}
