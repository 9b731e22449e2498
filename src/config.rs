/**
 * Where the question banks, the mnemonics table and the progress file live.
 */
use std::env;
use std::path::{Path, PathBuf};

const APP_DIR_NAME: &str = "drivedrill";

#[derive(Clone, Debug)]
pub struct Config {
    /// Directory holding one `{vtype}_subject{n}.json` file per question bank.
    pub data_dir: PathBuf,
    pub progress_file: PathBuf,
    pub mnemonics_file: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        let app_dir = get_app_dir_path();
        let data_dir = app_dir.join("data");
        Self {
            mnemonics_file: data_dir.join("mnemonics.json"),
            progress_file: app_dir.join("progress.json"),
            data_dir,
        }
    }
}

impl Config {
    /// A configuration that keeps everything under `root`.
    pub fn new(root: &Path) -> Self {
        let data_dir = root.join("data");
        Self {
            mnemonics_file: data_dir.join("mnemonics.json"),
            progress_file: root.join("progress.json"),
            data_dir,
        }
    }

    /// Start from the defaults and apply the `DRIVEDRILL_*` environment variables.
    pub fn from_env() -> Self {
        let default = Self::default();
        let data_dir = env::var_os("DRIVEDRILL_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or(default.data_dir);
        let mnemonics_file = env::var_os("DRIVEDRILL_MNEMONICS_FILE")
            .map(PathBuf::from)
            .unwrap_or_else(|| data_dir.join("mnemonics.json"));
        Self {
            progress_file: env::var_os("DRIVEDRILL_PROGRESS_FILE")
                .map(PathBuf::from)
                .unwrap_or(default.progress_file),
            mnemonics_file,
            data_dir,
        }
    }

    /// Point the configuration at a different data directory. The mnemonics file moves
    /// with it.
    pub fn with_data_dir(mut self, data_dir: PathBuf) -> Self {
        self.mnemonics_file = data_dir.join("mnemonics.json");
        self.data_dir = data_dir;
        self
    }

    pub fn with_progress_file(mut self, progress_file: PathBuf) -> Self {
        self.progress_file = progress_file;
        self
    }
}

/// Return the path to the application directory.
fn get_app_dir_path() -> PathBuf {
    let mut dirpath = dirs::data_dir()
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."));
    dirpath.push(APP_DIR_NAME);
    dirpath
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paths_are_derived_from_root() {
        let config = Config::new(Path::new("/tmp/drill"));
        assert_eq!(config.data_dir, Path::new("/tmp/drill/data"));
        assert_eq!(config.progress_file, Path::new("/tmp/drill/progress.json"));
        assert_eq!(config.mnemonics_file, Path::new("/tmp/drill/data/mnemonics.json"));
    }

    #[test]
    fn overriding_data_dir_moves_mnemonics() {
        let config = Config::new(Path::new("/tmp/drill")).with_data_dir(PathBuf::from("/srv/banks"));
        assert_eq!(config.mnemonics_file, Path::new("/srv/banks/mnemonics.json"));
        assert_eq!(config.progress_file, Path::new("/tmp/drill/progress.json"));
    }
}
