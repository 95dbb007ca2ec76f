//! ExifTool integration.
//!
//! [ExifTool] is used twice per run: to read the sensor
//! metadata of every band image (`exiftool -j -n`) and,
//! once all calibrated images are written, to copy GPS and
//! XMP tags from the raw images onto them.
//!
//! Tag propagation sits behind [`MetadataPropagator`] so that
//! runs can be exercised without the external binary.
//!
//! [ExifTool]: //exiftool.org

use std::{
    path::{Path, PathBuf},
    process::Command,
};

use serde_derive::*;
use tracing::debug;

use crate::{
    error::{Error, Result},
    metadata::{read_exiftool_json, SourcedMetadata},
};

/// Number of files passed to a single exiftool invocation.
const FILES_PER_CALL: usize = 256;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct ExifToolConfig {
    pub program: String,
    /// Optional `-config` file defining custom tags.
    pub config_file: Option<PathBuf>,
    /// Tag groups copied onto calibrated images.
    pub tags: Vec<String>,
}

impl Default for ExifToolConfig {
    fn default() -> Self {
        ExifToolConfig {
            program: "exiftool".into(),
            config_file: None,
            tags: vec!["-xmp:all".into(), "-gps:all".into()],
        }
    }
}

/// What to copy, from where, to where.
#[derive(Debug, Clone)]
pub struct PropagationRequest<'a> {
    /// Source file name pattern in exiftool syntax; `%f` and
    /// `%e` expand to the destination's name and extension.
    pub source_pattern: String,
    pub destination: &'a Path,
    pub tags: &'a [String],
    pub config_file: Option<&'a Path>,
}

pub trait MetadataPropagator {
    fn propagate(&self, request: &PropagationRequest<'_>) -> Result<()>;
}

#[derive(Debug, Clone)]
pub struct ExifTool {
    program: String,
}

impl ExifTool {
    pub fn new<S: Into<String>>(program: S) -> Self {
        ExifTool {
            program: program.into(),
        }
    }

    fn failure(&self, reason: String) -> Error {
        Error::ExternalToolFailure {
            tool: self.program.clone(),
            reason,
        }
    }

    /// Read sensor metadata of `paths` (numeric values, JSON).
    pub fn read_metadata(&self, paths: &[PathBuf]) -> Result<Vec<SourcedMetadata>> {
        let mut entries = Vec::with_capacity(paths.len());
        for chunk in paths.chunks(FILES_PER_CALL) {
            debug!("reading metadata of {} images", chunk.len());
            let output = Command::new(&self.program)
                .args(&["-j", "-n"])
                .args(chunk)
                .output()
                .map_err(|e| self.failure(e.to_string()))?;
            if !output.status.success() {
                return Err(self.failure(format!(
                    "{}: {}",
                    output.status,
                    String::from_utf8_lossy(&output.stderr).trim()
                )));
            }
            entries.extend(read_exiftool_json(&output.stdout[..])?);
        }
        Ok(entries)
    }
}

impl MetadataPropagator for ExifTool {
    fn propagate(&self, request: &PropagationRequest<'_>) -> Result<()> {
        let mut cmd = Command::new(&self.program);
        // `-config` is only honoured as the first argument
        if let Some(config) = request.config_file {
            cmd.arg("-config").arg(config);
        }
        cmd.arg("-tagsfromfile")
            .arg(&request.source_pattern)
            .arg(request.destination)
            .args(request.tags)
            .arg("-overwrite_original");
        debug!("running {:?}", cmd);

        let status = cmd.status().map_err(|e| self.failure(e.to_string()))?;
        if !status.success() {
            return Err(self.failure(format!("exited with {}", status)));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_program_is_a_tool_failure() {
        let tool = ExifTool::new("exiftool-that-does-not-exist");
        let request = PropagationRequest {
            source_pattern: "flight/%f.%e".into(),
            destination: Path::new("flight/calibrated"),
            tags: &["-gps:all".to_string()],
            config_file: None,
        };
        assert!(matches!(
            tool.propagate(&request),
            Err(Error::ExternalToolFailure { .. })
        ));
        assert!(matches!(
            tool.read_metadata(&[PathBuf::from("IMG_0000_1.tif")]),
            Err(Error::ExternalToolFailure { .. })
        ));
    }

    #[test]
    fn config_defaults_copy_gps_and_xmp() -> Result<()> {
        let config: ExifToolConfig = serde_json::from_str(r#"{"config_file": "altum.cfg"}"#)?;
        assert_eq!(config.program, "exiftool");
        assert_eq!(config.config_file, Some(PathBuf::from("altum.cfg")));
        assert_eq!(config.tags, vec!["-xmp:all", "-gps:all"]);
        Ok(())
    }
}
