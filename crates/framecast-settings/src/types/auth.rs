//! App Registration table: shared-secret keys and what they may do.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Something an app key may be allowed to do.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AppPermission {
    /// Publish notifications (connection event or `POST /notifications`).
    Publish,
    /// Receive broadcasts and read history.
    Subscribe,
}

/// One registered application key.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AppKeySettings {
    /// Display name of the application owning the key.
    pub name: String,
    /// Granted permissions.
    pub permissions: Vec<AppPermission>,
}

impl Default for AppKeySettings {
    fn default() -> Self {
        Self {
            name: String::new(),
            permissions: vec![AppPermission::Publish, AppPermission::Subscribe],
        }
    }
}

/// Shared-secret settings. An empty key table disables key checks.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AuthSettings {
    /// Key → registration.
    pub keys: BTreeMap<String, AppKeySettings>,
}
