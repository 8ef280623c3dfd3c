//! Install manager configuration

use std::time::Duration;

use modforge_errors::{Error, SetupError};

/// Installer configuration
#[derive(Clone, Debug)]
pub struct InstallConfig {
    /// Maximum concurrent dependency installs (default: 4)
    pub dependency_concurrency: usize,
    /// Timeout for acquiring a dependency download (default: 5 minutes)
    pub download_timeout: Duration,
    /// Automatically install dependencies of a just-installed mod when the
    /// request asks for dependency processing. Off by default; dependency
    /// installation is normally an explicit operation.
    pub auto_install_dependencies: bool,
}

impl Default for InstallConfig {
    fn default() -> Self {
        Self {
            dependency_concurrency: 4,
            download_timeout: Duration::from_secs(300),
            auto_install_dependencies: false,
        }
    }
}

impl InstallConfig {
    /// Create config with custom dependency concurrency
    #[must_use]
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.dependency_concurrency = concurrency;
        self
    }

    /// Set download timeout
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.download_timeout = timeout;
        self
    }

    /// Enable/disable automatic dependency installation
    #[must_use]
    pub fn with_auto_dependencies(mut self, auto: bool) -> Self {
        self.auto_install_dependencies = auto;
        self
    }

    /// Validate the configuration
    ///
    /// # Errors
    ///
    /// Returns an error when the concurrency limit is zero.
    pub fn validate(&self) -> Result<(), Error> {
        if self.dependency_concurrency == 0 {
            return Err(SetupError::InvalidConfig {
                message: "dependency concurrency must be at least 1".to_string(),
            }
            .into());
        }
        Ok(())
    }
}
