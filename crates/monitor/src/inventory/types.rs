//! Container inventory types
//!
//! Field names follow the supervisor's persisted format, hence the renames.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};

/// Dependency consulted for alerting settings
pub const MONITORING_DEP: &str = "cmk";

/// Key inside the monitoring dependency naming the contact group
pub const CONTACT_GROUP_KEY: &str = "contact_group";

/// Contact group for containers that do not declare one
pub const DEFAULT_CONTACT_GROUP: &str = "atlantis_orphan_apps";

/// Host used when a container record carries none
pub const DEFAULT_HOST: &str = "localhost";

/// Containers keyed by container id
pub type Inventory = BTreeMap<String, Container>;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Container {
    #[serde(rename = "ID")]
    pub id: String,
    #[serde(rename = "DockerID", default, deserialize_with = "null_as_default")]
    pub docker_id: String,
    #[serde(rename = "IP", default, deserialize_with = "null_as_default")]
    pub ip: String,
    #[serde(rename = "Host", default, deserialize_with = "null_as_default")]
    pub host: String,
    #[serde(rename = "PrimaryPort", default)]
    pub primary_port: u16,
    #[serde(rename = "SecondaryPorts", default, deserialize_with = "null_as_default")]
    pub secondary_ports: Vec<u16>,
    #[serde(rename = "SSHPort", default)]
    pub ssh_port: u16,
    #[serde(rename = "App", default, deserialize_with = "null_as_default")]
    pub app: String,
    #[serde(rename = "Sha", default, deserialize_with = "null_as_default")]
    pub sha: String,
    #[serde(rename = "Env", default, deserialize_with = "null_as_default")]
    pub env: String,
    #[serde(rename = "Manifest", default)]
    pub manifest: Option<Manifest>,
}

impl Container {
    /// Host to ssh into; records without one live on the local machine.
    pub fn ssh_host(&self) -> &str {
        if self.host.is_empty() {
            DEFAULT_HOST
        } else {
            &self.host
        }
    }

    /// Alerting contact group from `Deps["cmk"].DataMap["contact_group"]`.
    ///
    /// Falls back to [`DEFAULT_CONTACT_GROUP`] when the dependency or the key
    /// is missing, or the value is not a string.
    pub fn contact_group(&self) -> &str {
        self.manifest
            .as_ref()
            .and_then(|manifest| manifest.deps.get(MONITORING_DEP))
            .and_then(|dep| dep.data_map.get(CONTACT_GROUP_KEY))
            .and_then(Value::as_str)
            .unwrap_or(DEFAULT_CONTACT_GROUP)
    }

    /// Service reported for `script`: the part before the first `.`,
    /// suffixed with `_<container id>`.
    pub fn service_name(&self, script: &str) -> String {
        let base = script.split('.').next().unwrap_or(script);
        format!("{}_{}", base, self.id)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    #[serde(rename = "Name", default, deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(rename = "Description", default, deserialize_with = "null_as_default")]
    pub description: String,
    #[serde(rename = "Instances", default)]
    pub instances: u32,
    #[serde(rename = "CPUShares", default)]
    pub cpu_shares: u32,
    #[serde(rename = "MemoryLimit", default)]
    pub memory_limit: u32,
    #[serde(rename = "Image", default, deserialize_with = "null_as_default")]
    pub image: String,
    #[serde(rename = "AppType", default, deserialize_with = "null_as_default")]
    pub app_type: String,
    #[serde(rename = "RunCommands", default, deserialize_with = "run_commands")]
    pub run_commands: Vec<String>,
    #[serde(rename = "Deps", default, deserialize_with = "deps")]
    pub deps: HashMap<String, AppDep>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppDep {
    #[serde(rename = "SecurityGroup", default, deserialize_with = "null_as_default")]
    pub security_group: Vec<String>,
    #[serde(rename = "DataMap", default, deserialize_with = "null_as_default")]
    pub data_map: HashMap<String, Value>,
    #[serde(rename = "EncryptedData", default, deserialize_with = "null_as_default")]
    pub encrypted_data: String,
}

/// Run command as written by manifest authors: one command or several.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged, expecting = "a run command string or a list of strings")]
pub enum RunCommandSpec {
    Single(String),
    List(Vec<String>),
}

impl RunCommandSpec {
    pub fn into_commands(self) -> Vec<String> {
        match self {
            RunCommandSpec::Single(cmd) => vec![cmd],
            RunCommandSpec::List(cmds) => cmds,
        }
    }
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn run_commands<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<RunCommandSpec>::deserialize(deserializer)?
        .map(RunCommandSpec::into_commands)
        .unwrap_or_default())
}

fn deps<'de, D>(deserializer: D) -> Result<HashMap<String, AppDep>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<HashMap<String, Option<AppDep>>> = Option::deserialize(deserializer)?;
    Ok(raw
        .unwrap_or_default()
        .into_iter()
        .map(|(name, dep)| (name, dep.unwrap_or_default()))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn container_with_deps(deps: Value) -> Container {
        serde_json::from_value(json!({
            "ID": "c1",
            "Host": "h1",
            "SSHPort": 22,
            "PrimaryPort": 8080,
            "Manifest": { "Name": "app", "Deps": deps }
        }))
        .unwrap()
    }

    #[test]
    fn test_contact_group_from_cmk_dep() {
        let container = container_with_deps(json!({
            "cmk": { "DataMap": { "contact_group": "payments_oncall" } }
        }));
        assert_eq!(container.contact_group(), "payments_oncall");
    }

    #[test]
    fn test_contact_group_defaults() {
        let no_cmk = container_with_deps(json!({ "mysql": { "DataMap": {} } }));
        assert_eq!(no_cmk.contact_group(), DEFAULT_CONTACT_GROUP);

        let no_key = container_with_deps(json!({ "cmk": { "DataMap": null } }));
        assert_eq!(no_key.contact_group(), DEFAULT_CONTACT_GROUP);

        let not_a_string = container_with_deps(json!({
            "cmk": { "DataMap": { "contact_group": 7 } }
        }));
        assert_eq!(not_a_string.contact_group(), DEFAULT_CONTACT_GROUP);

        let null_dep = container_with_deps(json!({ "cmk": null }));
        assert_eq!(null_dep.contact_group(), DEFAULT_CONTACT_GROUP);

        let no_manifest = Container {
            id: "c2".to_string(),
            ..Default::default()
        };
        assert_eq!(no_manifest.contact_group(), DEFAULT_CONTACT_GROUP);
    }

    #[test]
    fn test_service_name_strips_extension() {
        let container = Container {
            id: "c1".to_string(),
            ..Default::default()
        };
        assert_eq!(container.service_name("cpu.sh"), "cpu_c1");
        assert_eq!(container.service_name("disk.check.py"), "disk_c1");
        assert_eq!(container.service_name("uptime"), "uptime_c1");
    }

    #[test]
    fn test_ssh_host_defaults_to_localhost() {
        let mut container = Container::default();
        assert_eq!(container.ssh_host(), "localhost");
        container.host = "h1".to_string();
        assert_eq!(container.ssh_host(), "h1");
    }

    #[test]
    fn test_run_commands_accepts_string_or_list() {
        let single: Manifest =
            serde_json::from_value(json!({ "RunCommands": "bin/start" })).unwrap();
        assert_eq!(single.run_commands, vec!["bin/start"]);

        let many: Manifest =
            serde_json::from_value(json!({ "RunCommands": ["migrate", "serve"] })).unwrap();
        assert_eq!(many.run_commands, vec!["migrate", "serve"]);

        let none: Manifest = serde_json::from_value(json!({ "RunCommands": null })).unwrap();
        assert!(none.run_commands.is_empty());
    }

    #[test]
    fn test_run_commands_rejects_other_shapes() {
        assert!(serde_json::from_value::<Manifest>(json!({ "RunCommands": ["ok", 3] })).is_err());
        assert!(serde_json::from_value::<Manifest>(json!({ "RunCommands": { "a": 1 } })).is_err());
        assert!(serde_json::from_value::<Manifest>(json!({ "RunCommands": 7 })).is_err());
    }
}
