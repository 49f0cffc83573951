//! Session environment descriptor.
//!
//! Detection (browser/OS sniffing, connection type) happens in the host. The
//! governor only consumes the resolved descriptor and treats it as constant
//! for its lifetime.

use serde::{Deserialize, Serialize};

/// Network class used to pick a threshold set.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum NetworkClass {
    Wifi,
    Cellular,
}

/// Platform capabilities resolved once per session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EnvironmentDescriptor {
    /// Platform whose native pipeline fails past a fixed buffer ceiling
    pub is_constrained_platform: bool,
    pub is_cellular: bool,
    pub browser_label: String,
}

impl EnvironmentDescriptor {
    pub fn new(
        is_constrained_platform: bool,
        is_cellular: bool,
        browser_label: impl Into<String>,
    ) -> Self {
        Self {
            is_constrained_platform,
            is_cellular,
            browser_label: browser_label.into(),
        }
    }

    /// Descriptor for a platform that needs no governance.
    pub fn unconstrained(browser_label: impl Into<String>) -> Self {
        Self::new(false, false, browser_label)
    }

    pub fn network_class(&self) -> NetworkClass {
        if self.is_cellular {
            NetworkClass::Cellular
        } else {
            NetworkClass::Wifi
        }
    }
}

/// Supplier of the session environment.
pub trait EnvironmentSource {
    fn descriptor(&self) -> EnvironmentDescriptor;
}

/// Environment source returning a fixed descriptor.
#[derive(Debug, Clone)]
pub struct StaticEnvironment {
    descriptor: EnvironmentDescriptor,
}

impl StaticEnvironment {
    pub fn new(descriptor: EnvironmentDescriptor) -> Self {
        Self { descriptor }
    }
}

impl EnvironmentSource for StaticEnvironment {
    fn descriptor(&self) -> EnvironmentDescriptor {
        self.descriptor.clone()
    }
}
