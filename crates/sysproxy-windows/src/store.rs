use sysproxy_backend::BackendError;

/// A registry value of one of the two types Internet Settings uses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegValue {
    Dword(u32),
    String(String),
}

impl RegValue {
    /// Numeric view; string values holding a number are accepted too.
    #[must_use]
    pub fn as_u32(&self) -> Option<u32> {
        match self {
            Self::Dword(value) => Some(*value),
            Self::String(value) => value.trim().parse().ok(),
        }
    }

    #[must_use]
    pub fn to_text(&self) -> String {
        match self {
            Self::Dword(value) => value.to_string(),
            Self::String(value) => value.clone(),
        }
    }

    /// Converts `self` to the type of `existing` where the content allows it.
    #[must_use]
    pub fn coerce_to(self, existing: &RegValue) -> RegValue {
        match (existing, self) {
            (Self::String(_), Self::Dword(value)) => Self::String(value.to_string()),
            (Self::Dword(_), Self::String(value)) => match value.trim().parse() {
                Ok(number) => Self::Dword(number),
                Err(_) => Self::String(value),
            },
            (_, value) => value,
        }
    }
}

/// Named values under one key.
pub trait SettingsStore: Send {
    fn get(&self, name: &str) -> Result<Option<RegValue>, BackendError>;

    fn set(&mut self, name: &str, value: RegValue) -> Result<(), BackendError>;
}

#[cfg(any(test, feature = "testing"))]
mod memory {
    use std::collections::HashMap;

    use super::{RegValue, SettingsStore};
    use sysproxy_backend::BackendError;

    #[derive(Debug, Clone, Default)]
    pub struct MemoryStore {
        values: HashMap<String, RegValue>,
    }

    impl MemoryStore {
        #[must_use]
        pub fn new() -> Self {
            Self::default()
        }

        #[must_use]
        pub fn with_value(mut self, name: &str, value: RegValue) -> Self {
            self.values.insert(name.to_string(), value);
            self
        }
    }

    impl SettingsStore for MemoryStore {
        fn get(&self, name: &str) -> Result<Option<RegValue>, BackendError> {
            Ok(self.values.get(name).cloned())
        }

        fn set(&mut self, name: &str, value: RegValue) -> Result<(), BackendError> {
            self.values.insert(name.to_string(), value);
            Ok(())
        }
    }
}

#[cfg(any(test, feature = "testing"))]
pub use memory::MemoryStore;
