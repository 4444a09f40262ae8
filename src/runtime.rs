//! Runtime configuration of a Cloud Run service or job.

use std::path::Path;

use crate::Configurable;

/// Service version baked in at compile time through `ENVBIND_SERVICE_VERSION`.
pub const BUILD_SERVICE_VERSION: Option<&str> = option_env!("ENVBIND_SERVICE_VERSION");

/// Values the Cloud Run platform injects into every container.
#[derive(Debug, Clone, Default, PartialEq, Eq, Configurable)]
pub struct RuntimeConfig {
    /// Port the service listens on.
    #[config(env = "PORT", default = "8080")]
    pub port: u16,
    /// Name of the Cloud Run service.
    #[config(env = "K_SERVICE")]
    pub service: String,
    /// Name of the running revision.
    #[config(env = "K_REVISION")]
    pub revision: String,
    /// Name of the configuration that created the revision.
    #[config(env = "K_CONFIGURATION")]
    pub configuration: String,
    /// Name of the Cloud Run job, set only for jobs.
    #[config(env = "CLOUD_RUN_JOB")]
    pub job: String,
    /// Name of the job execution.
    #[config(env = "CLOUD_RUN_EXECUTION")]
    pub execution: String,
    /// Zero-based index of this task within the execution.
    #[config(env = "CLOUD_RUN_TASK_INDEX")]
    pub task_index: u32,
    /// Number of times this task has been retried, starting at 0.
    #[config(env = "CLOUD_RUN_TASK_ATTEMPT")]
    pub task_attempt: u32,
    /// Number of tasks in the execution.
    #[config(env = "CLOUD_RUN_TASK_COUNT")]
    pub task_count: u32,
    /// Google Cloud project the workload runs in.
    #[config(env = "GOOGLE_CLOUD_PROJECT")]
    pub project_id: String,
    /// Service account the workload acts as, keyed under the config prefix.
    pub service_account: String,
    /// Version reported by the service; see [`RuntimeConfig::version`].
    #[config(env = "SERVICE_VERSION")]
    pub service_version: String,
}

impl RuntimeConfig {
    /// The service name, falling back to the executable's file name.
    pub fn service_name(&self) -> String {
        if !self.service.is_empty() {
            return self.service.clone();
        }
        std::env::args_os()
            .next()
            .as_deref()
            .map(Path::new)
            .and_then(Path::file_name)
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// The service version: `SERVICE_VERSION`, then the compile-time
    /// version, then the revision.
    pub fn version(&self) -> &str {
        if !self.service_version.is_empty() {
            return &self.service_version;
        }
        match BUILD_SERVICE_VERSION {
            Some(version) if !version.is_empty() => version,
            _ => &self.revision,
        }
    }

    /// Whether the process runs as a job task rather than a service.
    pub fn is_job(&self) -> bool {
        !self.job.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Environment;
    use crate::Config;

    fn resolve(env: Environment) -> RuntimeConfig {
        let mut runtime = RuntimeConfig::default();
        let mut config = Config::builder("runtime", &mut runtime)
            .with_prefix("")
            .with_environment(env)
            .with_platform(false)
            .build()
            .unwrap();
        config.load().unwrap();
        drop(config);
        runtime
    }

    #[test]
    fn test_defaults() {
        let runtime = resolve(Environment::new());
        assert_eq!(runtime.port, 8080);
        assert!(!runtime.is_job());
        assert!(!runtime.service_name().is_empty());
    }

    #[test]
    fn test_job_values() {
        let runtime = resolve(
            Environment::new()
                .with("CLOUD_RUN_JOB", "nightly")
                .with("CLOUD_RUN_TASK_INDEX", "3")
                .with("CLOUD_RUN_TASK_COUNT", "10")
                .with("K_REVISION", "nightly-00042"),
        );
        assert!(runtime.is_job());
        assert_eq!(runtime.task_index, 3);
        assert_eq!(runtime.task_count, 10);
        if BUILD_SERVICE_VERSION.is_none() {
            assert_eq!(runtime.version(), "nightly-00042");
        }
    }

    #[test]
    fn test_service_name_prefers_k_service() {
        let runtime = resolve(
            Environment::new()
                .with("K_SERVICE", "checkout")
                .with("SERVICE_VERSION", "v1.2.3"),
        );
        assert_eq!(runtime.service_name(), "checkout");
        assert_eq!(runtime.version(), "v1.2.3");
    }

    #[test]
    fn test_service_account_uses_prefix() {
        let mut runtime = RuntimeConfig::default();
        let config = Config::builder("runtime", &mut runtime)
            .with_prefix("app")
            .build()
            .unwrap();
        let keys: Vec<_> = config.groups()[0].fields().iter().map(|f| f.key()).collect();
        assert!(keys.contains(&"APP_SERVICE_ACCOUNT"));
        assert!(keys.contains(&"PORT"));
    }
}
