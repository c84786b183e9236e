use std::{
    ffi::OsString,
    path::{Path, PathBuf},
};

use json::JsonValue;
use tracing::debug;

use crate::error::BemError;

pub const SUBJECTS_DIR_KEY: &str = "SUBJECTS_DIR";

/// Overrides the home directory used to locate the config file
pub const FAKE_HOME_KEY: &str = "_MNE_FAKE_HOME_DIR";

/// Resolves the subjects directory from the command line, the environment or
/// the JSON config file, in that order
///
/// # Arguments
/// * `explicit` - The directory given on the command line, if any
///
/// # Returns
/// An existing directory
pub fn get_subjects_dir(explicit: Option<&Path>) -> Result<PathBuf, BemError> {
    resolve_subjects_dir(explicit, |key| std::env::var_os(key))
}

/// Resolves the subjects directory using `env` to look up environment variables
pub fn resolve_subjects_dir<F>(explicit: Option<&Path>, env: F) -> Result<PathBuf, BemError>
where
    F: Fn(&str) -> Option<OsString>,
{
    let home = home_dir(&env);

    let raw: PathBuf = if let Some(path) = explicit {
        debug!("using subjects directory from the command line");
        path.to_path_buf()
    } else if let Some(value) = env(SUBJECTS_DIR_KEY).filter(|v| !v.is_empty()) {
        debug!("using subjects directory from the {SUBJECTS_DIR_KEY} environment variable");
        PathBuf::from(value)
    } else {
        let config_value = match &home {
            Some(home) => read_config_value(&config_path(home), SUBJECTS_DIR_KEY)?,
            None => None,
        };
        match config_value {
            Some(value) => {
                debug!("using subjects directory from the config file");
                PathBuf::from(value)
            }
            None => {
                return Err(BemError::Config(
                    "Subjects directory not specified. Use --subjects-dir or set the SUBJECTS_DIR environment variable".to_owned(),
                ))
            }
        }
    };

    let subjects_dir = expand_home(&raw, home.as_deref());

    if !subjects_dir.is_dir() {
        return Err(BemError::Config(format!(
            "Subjects directory {} does not exist or is not a directory",
            subjects_dir.display()
        )));
    }

    Ok(subjects_dir)
}

fn home_dir<F>(env: &F) -> Option<PathBuf>
where
    F: Fn(&str) -> Option<OsString>,
{
    [FAKE_HOME_KEY, "HOME", "USERPROFILE"]
        .iter()
        .filter_map(|key| env(*key))
        .find(|v| !v.is_empty())
        .map(PathBuf::from)
}

/// Location of the JSON config file for a home directory
pub fn config_path(home: &Path) -> PathBuf {
    home.join(".mne").join("mne-python.json")
}

/// Reads a string value from the JSON config file
///
/// # Returns
/// `None` when the file or the key does not exist
pub fn read_config_value(path: &Path, key: &str) -> Result<Option<String>, BemError> {
    if !path.is_file() {
        return Ok(None);
    }

    let file_string = match std::fs::read_to_string(path) {
        Ok(f) => f,
        Err(err) => {
            return Err(BemError::Config(format!(
                "Unable to open config file {}: {err}",
                path.display()
            )))
        }
    };

    let config_json: JsonValue = match json::parse(&file_string) {
        Ok(c) => c,
        Err(err) => {
            return Err(BemError::Config(format!(
                "Error in config file {} json: {err}",
                path.display()
            )))
        }
    };

    if !config_json.is_object() {
        return Err(BemError::Config(format!(
            "Config file {} must contain a json object",
            path.display()
        )));
    }

    Ok(config_json[key].as_str().map(|s| s.to_owned()))
}

fn expand_home(path: &Path, home: Option<&Path>) -> PathBuf {
    match (path.strip_prefix("~"), home) {
        (Ok(rest), Some(home)) => home.join(rest),
        _ => path.to_path_buf(),
    }
}
