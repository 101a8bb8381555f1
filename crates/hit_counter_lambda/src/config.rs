use hit_counter_core::contract::{DEFAULT_TABLE_NAME, TABLE_NAME_ENV};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandlerConfig {
    pub table_name: String,
}

impl HandlerConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// `TABLE_NAME` is injected by the stack; local runs fall back to the
    /// default table name.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let table_name = lookup(TABLE_NAME_ENV)
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .unwrap_or_else(|| DEFAULT_TABLE_NAME.to_string());

        Self { table_name }
    }
}
