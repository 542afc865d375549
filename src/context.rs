use std::{
    fs::{self, create_dir_all, remove_dir_all},
    path::{Path, PathBuf},
    str::FromStr,
};

use anyhow::anyhow;
use serde::{Deserialize, Serialize};
use url::Url;

pub const LOCAL_PORT: u16 = 1111;

pub struct Context {
    pub home: PathBuf,
    pub output_dir: PathBuf,
    pub config: Config,
}

impl Context {
    pub fn new(home: PathBuf, output_dir: PathBuf, local: bool) -> anyhow::Result<Self> {
        let config_file = home.join("config.toml");
        let config_text = fs::read_to_string(&config_file)
            .map_err(|e| anyhow!("reading {}: {e}", config_file.display()))?;
        let mut config: Config = toml::from_str(&config_text)?;

        if local {
            config.base_url = Url::from_str(&format!("http://127.0.0.1:{LOCAL_PORT}"))?;
        }

        Ok(Self {
            home,
            output_dir,
            config,
        })
    }

    pub fn clean_output_dir(&self) -> anyhow::Result<()> {
        if self.output_dir.exists() {
            let home = self.home.canonicalize()?;
            let output = self.output_dir.canonicalize()?;

            // the output dir is removed wholesale, it must not hold the sources
            if home.starts_with(&output) {
                return Err(anyhow!(
                    "refusing to clean {}: it contains the site sources in {}",
                    output.display(),
                    home.display()
                ));
            }

            remove_dir_all(&self.output_dir)?;
        }
        create_dir_all(&self.output_dir)?;
        Ok(())
    }

    pub fn absolute<P: AsRef<Path>>(&self, path: P) -> PathBuf {
        self.home.join(path.as_ref())
    }

    pub fn relative(&self, path: &Path) -> anyhow::Result<PathBuf> {
        Ok(path.strip_prefix(&self.home)?.into())
    }

    fn create_output_dir(&self, path: &Path) -> anyhow::Result<()> {
        let output = self.output_dir.join(path);
        Ok(fs::create_dir_all(output)?)
    }

    pub fn copy_to_output(&self, file: &Path, path: &Path) -> anyhow::Result<()> {
        path.parent()
            .map(|p| self.create_output_dir(p))
            .transpose()?;

        let output = self.output_dir.join(path);

        fs::copy(file, output)?;

        Ok(())
    }

    pub fn write_to_output(&self, path: &Path, contents: &str) -> anyhow::Result<()> {
        path.parent()
            .map(|p| self.create_output_dir(p))
            .transpose()?;

        let output = self.output_dir.join(path);

        fs::write(output, contents)?;

        Ok(())
    }
}

#[derive(Deserialize, Serialize, Clone, Debug)]
pub struct MenuItem {
    pub name: String,
    pub url: String,
}

fn default_highlight_theme() -> String {
    "base16-ocean.dark".to_string()
}

#[derive(Deserialize, Serialize)]
pub struct Config {
    pub title: String,
    pub subtitle: String,
    pub base_url: Url,
    #[serde(default)]
    pub footer: String,
    #[serde(default = "default_highlight_theme")]
    pub highlight_theme: String,
    #[serde(default)]
    pub menu: Vec<MenuItem>,
}

impl Config {
    pub fn make_permalink(&self, path: &str) -> anyhow::Result<Url> {
        let escaped = path.strip_suffix("index.html").unwrap_or(path);
        Ok(self.base_url.join(escaped)?)
    }
}

#[cfg(test)]
pub mod test_util {
    use std::path::PathBuf;

    use env_logger::Env;
    use tempfile::TempDir;

    use super::Context;

    pub fn init_logging() {
        let _ = env_logger::Builder::from_env(Env::default().default_filter_or("debug"))
            .is_test(true)
            .try_init();
    }

    pub fn site_dir() -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("site")
    }

    pub fn context(local: bool) -> (Context, TempDir) {
        init_logging();
        let out = tempfile::tempdir().unwrap();
        let context = Context::new(site_dir(), out.path().join("public"), local).unwrap();
        (context, out)
    }
}
