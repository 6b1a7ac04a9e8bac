//! App Registration: shared-secret keys mapped to permissions.

use std::collections::HashMap;

use framecast_settings::{AppPermission, AuthSettings};

/// One registered application key.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AppKey {
    /// Application name.
    pub name: String,
    /// Granted permissions.
    pub permissions: Vec<AppPermission>,
}

impl AppKey {
    /// Whether the key grants `permission`.
    pub fn allows(&self, permission: AppPermission) -> bool {
        self.permissions.contains(&permission)
    }
}

/// Result of checking a supplied key.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum KeyCheck<'a> {
    /// No key was supplied, or no table is configured.
    Unchecked,
    /// The key is registered.
    Known(&'a AppKey),
    /// The key is not registered.
    Unknown,
}

/// Configured key table.
#[derive(Clone, Debug, Default)]
pub struct AppRegistry {
    keys: HashMap<String, AppKey>,
}

impl AppRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from settings; `None` when the table is empty (checks disabled).
    pub fn from_settings(settings: &AuthSettings) -> Option<Self> {
        if settings.keys.is_empty() {
            return None;
        }
        let mut registry = Self::new();
        for (key, entry) in &settings.keys {
            registry.insert(key.clone(), entry.name.clone(), entry.permissions.clone());
        }
        Some(registry)
    }

    /// Register a key.
    pub fn insert(
        &mut self,
        key: impl Into<String>,
        name: impl Into<String>,
        permissions: Vec<AppPermission>,
    ) {
        let _ = self.keys.insert(
            key.into(),
            AppKey {
                name: name.into(),
                permissions,
            },
        );
    }

    /// Look up a key.
    pub fn get(&self, key: &str) -> Option<&AppKey> {
        self.keys.get(key)
    }

    /// Number of registered keys.
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Whether no keys are registered.
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

/// Check an optional key against an optional registry.
pub fn check_key<'a>(registry: Option<&'a AppRegistry>, key: Option<&str>) -> KeyCheck<'a> {
    match (registry, key) {
        (Some(registry), Some(key)) => registry
            .get(key)
            .map_or(KeyCheck::Unknown, KeyCheck::Known),
        _ => KeyCheck::Unchecked,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use framecast_settings::AppKeySettings;

    fn registry() -> AppRegistry {
        let mut r = AppRegistry::new();
        r.insert("pub-key", "orders-app", vec![AppPermission::Publish]);
        r.insert("sub-key", "dashboard", vec![AppPermission::Subscribe]);
        r
    }

    #[test]
    fn empty_settings_disable_checks() {
        assert!(AppRegistry::from_settings(&AuthSettings::default()).is_none());
    }

    #[test]
    fn from_settings_copies_entries() {
        let mut settings = AuthSettings::default();
        let _ = settings.keys.insert(
            "k".into(),
            AppKeySettings {
                name: "inventory-app".into(),
                permissions: vec![AppPermission::Publish, AppPermission::Subscribe],
            },
        );
        let reg = AppRegistry::from_settings(&settings).unwrap();
        assert_eq!(reg.len(), 1);
        assert!(reg.get("k").unwrap().allows(AppPermission::Subscribe));
    }

    #[test]
    fn check_known_and_unknown() {
        let reg = registry();
        assert!(matches!(
            check_key(Some(&reg), Some("pub-key")),
            KeyCheck::Known(k) if k.name == "orders-app"
        ));
        assert_eq!(check_key(Some(&reg), Some("nope")), KeyCheck::Unknown);
    }

    #[test]
    fn check_without_key_or_table_is_unchecked() {
        let reg = registry();
        assert_eq!(check_key(Some(&reg), None), KeyCheck::Unchecked);
        assert_eq!(check_key(None, Some("pub-key")), KeyCheck::Unchecked);
    }

    #[test]
    fn permissions() {
        let reg = registry();
        let sub = reg.get("sub-key").unwrap();
        assert!(sub.allows(AppPermission::Subscribe));
        assert!(!sub.allows(AppPermission::Publish));
    }
}
