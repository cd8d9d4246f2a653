//! Configuration validation implementation

use common::config::ConfigValidation;
use common::error::ConfigurationError;

use super::MonitorConfig;

fn invalid(key: &str, value: impl ToString, reason: &str) -> ConfigurationError {
    ConfigurationError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

impl ConfigValidation for MonitorConfig {
    type Error = ConfigurationError;

    fn validate(&self) -> Result<(), Self::Error> {
        if self.timeout_duration == 0 {
            return Err(invalid(
                "timeout_duration",
                self.timeout_duration,
                "must be greater than 0",
            ));
        }

        if self.ssh_user.is_empty() {
            return Err(invalid("ssh_user", &self.ssh_user, "cannot be empty"));
        }

        // The name is the second token of every status line the monitor emits
        // about itself.
        if self.check_name.is_empty() || self.check_name.contains(char::is_whitespace) {
            return Err(invalid(
                "check_name",
                &self.check_name,
                "must be a single non-empty word",
            ));
        }

        if self.check_dir.is_empty() {
            return Err(invalid("check_dir", &self.check_dir, "cannot be empty"));
        }

        self.logging.validate()?;

        Ok(())
    }

    fn warnings(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        let identity = self.ssh_identity_path();
        if !identity.exists() {
            warnings.push(format!(
                "SSH identity {} does not exist; every check will fail",
                identity.display()
            ));
        }

        if !self.check_dir.starts_with('/') {
            warnings.push(format!(
                "check_dir {} is relative and resolves against the remote login directory",
                self.check_dir
            ));
        }

        warnings
    }
}
