//! Service-manager config file
//!
//! The service manager reads a JSON file describing how to launch the
//! client. The installer compares the file on disk with
//! [`ServiceManagerConfig::to_canonical_json`] byte for byte, so field order
//! and formatting here are part of the contract.

use std::path::Path;

use craftnet_settings::{ClientSettings, ServiceSettings};
use serde::{Deserialize, Serialize};

use crate::Result;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ServiceManagerConfig {
    pub name: String,
    pub display_name: String,
    pub description: String,
    pub directory: String,
    pub executable: String,
    pub port: u16,
    pub arguments: Vec<String>,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct LoggingConfig {
    pub stderr: String,
    pub stdout: String,
}

fn path_str(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

impl ServiceManagerConfig {
    pub fn from_settings(client: &ClientSettings, service: &ServiceSettings) -> Self {
        Self {
            name: service.name.clone(),
            display_name: service.display_name.clone(),
            description: service.description.clone(),
            directory: path_str(&service.manager_dir),
            executable: path_str(&client.client_bin),
            port: client.api_port,
            arguments: client_arguments(client),
            logging: LoggingConfig {
                stderr: path_str(&client.stderr_log_path()),
                stdout: path_str(&client.stdout_log_path()),
            },
        }
    }

    /// Compact JSON in declaration order
    pub fn to_canonical_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Command line the service passes to the client; order matters
pub fn client_arguments(client: &ClientSettings) -> Vec<String> {
    vec![
        format!("--config-dir={}", path_str(&client.config_dir)),
        format!("--data-dir={}", path_str(&client.data_dir)),
        format!("--runtime-dir={}", path_str(&client.runtime_dir)),
        format!("--openvpn.binary={}", path_str(&client.openvpn_bin)),
        format!("--api.port={}", client.api_port),
        "daemon".to_string(),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn client() -> ClientSettings {
        ClientSettings {
            client_bin: PathBuf::from("/tmp/clientbin"),
            config_dir: PathBuf::from("/tmp/config"),
            data_dir: PathBuf::from("/tmp/data"),
            runtime_dir: PathBuf::from("/tmp/runtime"),
            log_dir: PathBuf::from("/tmp/logs"),
            openvpn_bin: PathBuf::from("/tmp/ovpnbin"),
            api_port: 4050,
            ..ClientSettings::default()
        }
    }

    fn service() -> ServiceSettings {
        ServiceSettings {
            manager_dir: PathBuf::from("/service-manager/bin"),
            ..ServiceSettings::default()
        }
    }

    #[test]
    fn test_canonical_json_layout() {
        let json = ServiceManagerConfig::from_settings(&client(), &service())
            .to_canonical_json()
            .unwrap();

        let expected = concat!(
            r#"{"Name":"CraftNetClient","DisplayName":"CraftNet Client","#,
            r#""Description":"CraftNet Client service","Directory":"/service-manager/bin","#,
            r#""Executable":"/tmp/clientbin","Port":4050,"Arguments":["#,
            r#""--config-dir=/tmp/config","--data-dir=/tmp/data","--runtime-dir=/tmp/runtime","#,
            r#""--openvpn.binary=/tmp/ovpnbin","--api.port=4050","daemon"],"#,
            r#""Logging":{"Stderr":"/tmp/logs/stderr.log","Stdout":"/tmp/logs/stdout.log"}}"#,
        );
        assert_eq!(json, expected);
    }

    #[test]
    fn test_arguments_follow_port() {
        let client = ClientSettings {
            api_port: 5123,
            ..client()
        };
        let args = client_arguments(&client);
        assert_eq!(args[4], "--api.port=5123");
        assert_eq!(args.last().map(String::as_str), Some("daemon"));
    }
}
