//! Helm `Chart.yaml` metadata

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{PullError, Result};

/// File name of the chart metadata at the chart root
pub const CHART_FILE: &str = "Chart.yaml";

/// Subset of `Chart.yaml` the puller reads
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartMetadata {
    #[serde(default)]
    pub api_version: String,

    pub name: String,

    #[serde(default)]
    pub version: String,

    #[serde(default)]
    pub app_version: Option<String>,

    #[serde(default)]
    pub description: Option<String>,

    /// `application` or `library`
    #[serde(default, rename = "type")]
    pub chart_type: Option<String>,
}

impl ChartMetadata {
    /// Load `Chart.yaml` from a chart directory
    pub fn load(chart_dir: &Path) -> Result<Self> {
        let path = chart_dir.join(CHART_FILE);
        let content = std::fs::read_to_string(&path).map_err(|e| PullError::InvalidArtifact {
            message: format!("cannot read {}: {}", path.display(), e),
        })?;
        Ok(serde_yaml::from_str(&content)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_load_chart() {
        let temp = TempDir::new().unwrap();
        std::fs::write(
            temp.path().join(CHART_FILE),
            "apiVersion: v2\nname: nginx\nversion: 15.1.0\nappVersion: \"1.25.0\"\ntype: application\nkeywords: [web]\n",
        )
        .unwrap();

        let chart = ChartMetadata::load(temp.path()).unwrap();
        assert_eq!(chart.name, "nginx");
        assert_eq!(chart.version, "15.1.0");
        assert_eq!(chart.app_version.as_deref(), Some("1.25.0"));
        assert_eq!(chart.chart_type.as_deref(), Some("application"));
    }

    #[test]
    fn test_missing_chart_file() {
        let temp = TempDir::new().unwrap();
        let err = ChartMetadata::load(temp.path()).unwrap_err();
        assert!(matches!(err, PullError::InvalidArtifact { .. }));
    }
}
