use crate::{error::Error, options::CompilerOption};
use serde::{Deserialize, Serialize};
use std::{fs::File, io::BufReader, path::Path, path::PathBuf};

/// Build settings read from a YAML file; command line flags add to them.
///
/// ```yaml
/// options: [generate-relocation-information, local-labels-supported]
/// output: out.bin
/// self-relocating: true
/// rewrite-addresses: true
/// root: main.rk
/// include-dirs: [lib]
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct BuildConfig {
    pub options: Vec<CompilerOption>,
    pub output: Option<PathBuf>,
    pub self_relocating: bool,
    pub rewrite_addresses: bool,
    pub root: Option<PathBuf>,
    pub stop_after: Option<String>,
    pub include_dirs: Vec<PathBuf>,
}

impl BuildConfig {
    pub fn load(path: &Path) -> Result<Self, Error> {
        let file = File::open(path)
            .map_err(|e| Error::ResourceRead(path.display().to_string(), e))?;
        Ok(serde_yaml::from_reader(BufReader::new(file))?)
    }

    pub fn parse(text: &str) -> Result<Self, Error> {
        Ok(serde_yaml::from_str(text)?)
    }
}
