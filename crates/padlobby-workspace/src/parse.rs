use serde::Deserialize;

use crate::{v1::ConfigV1, ProfileError, WorkspaceConfig};

/// Parse the yaml workspace file.
pub fn parse_config(input: &str) -> Result<WorkspaceConfig, ProfileError> {
    let version = parse_version(input)?;
    match version {
        1 => {
            let raw: ConfigV1 = serde_yaml::from_str(input)?;
            Ok(raw.parse()?)
        }
        _ => Err(ProfileError::UnsupportedVersion(version)),
    }
}

/// A workspace file with a version.
#[derive(Debug, Clone, Deserialize)]
struct VersionedConfig {
    version: u8,
}

/// Parse the version of the yaml workspace file.
fn parse_version(input: &str) -> Result<u8, ProfileError> {
    let raw: VersionedConfig = serde_yaml::from_str(input)?;
    Ok(raw.version)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_config_yaml_error_when_version_missing() {
        let yaml = "combos: []\n";
        assert!(matches!(
            parse_config(yaml),
            Err(ProfileError::YamlDeserializeError(_))
        ));
    }

    #[test]
    fn parse_config_rejects_future_version() {
        assert!(matches!(
            parse_config("version: 2\n"),
            Err(ProfileError::UnsupportedVersion(2))
        ));
    }

    #[test]
    fn example_file_parses() {
        let config = parse_config(include_str!("../../../padlobby.example.yaml"))
            .expect("example should parse");
        assert_eq!(config.combos.len(), 2);
        assert_eq!(config.type_defaults.len(), 2);
        assert_eq!(config.profiles.len(), 2);
    }

    #[test]
    fn parse_config_surfaces_v1_errors() {
        let yaml = "version: 1\ncombos:\n  - \"tl +\"\n";
        assert!(matches!(parse_config(yaml), Err(ProfileError::V1(_))));
    }
}
