//! Device context captured alongside each stored attempt.

use serde::{Deserialize, Serialize};

use super::platform::{platform_string, user_agent_string};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DeviceSnapshot {
    pub platform: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
}

impl DeviceSnapshot {
    pub fn capture() -> Self {
        Self {
            platform: platform_string(),
            user_agent: user_agent_string(),
        }
    }
}

impl Default for DeviceSnapshot {
    fn default() -> Self {
        Self::capture()
    }
}
