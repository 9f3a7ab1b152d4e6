use anyhow::{anyhow, Result};
use log::debug;
use once_cell::sync::OnceCell;
use std::env;
use std::path::{Path, PathBuf};

/// Locations of the external binaries the CLI shells out to.
/// Each lookup runs at most once; later calls reuse the first successful
/// result for the lifetime of the cache.
#[derive(Debug, Default)]
pub struct ToolCache {
    gcloud: OnceCell<PathBuf>,
    psql: OnceCell<PathBuf>,
    kubectl: OnceCell<PathBuf>,
}

impl ToolCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn gcloud(&self) -> Result<&Path> {
        Self::acquire(&self.gcloud, "gcloud")
    }

    pub fn psql(&self) -> Result<&Path> {
        Self::acquire(&self.psql, "psql")
    }

    pub fn kubectl(&self) -> Result<&Path> {
        Self::acquire(&self.kubectl, "kubectl")
    }

    /// Check every command the current run needs before doing any work.
    pub fn ensure_available(&self, names: &[&str]) -> Result<()> {
        for name in names {
            match *name {
                "gcloud" => self.gcloud().map(|_| ())?,
                "psql" => self.psql().map(|_| ())?,
                "kubectl" => self.kubectl().map(|_| ())?,
                other => {
                    find_in_path(other)
                        .map(|_| ())
                        .ok_or_else(|| not_found(other))?;
                }
            }
        }
        Ok(())
    }

    fn acquire<'a>(cell: &'a OnceCell<PathBuf>, name: &str) -> Result<&'a Path> {
        let path = cell.get_or_try_init(|| find_in_path(name).ok_or_else(|| not_found(name)))?;
        Ok(path.as_path())
    }
}

fn not_found(name: &str) -> anyhow::Error {
    anyhow!("`{}` not found in PATH, install it and retry", name)
}

/// Search PATH for an executable file with the given name.
fn find_in_path(name: &str) -> Option<PathBuf> {
    let path_var = env::var_os("PATH")?;
    for dir in env::split_paths(&path_var) {
        let candidate = dir.join(name);
        if candidate.is_file() {
            debug!("Found `{}` at {}", name, candidate.display());
            return Some(candidate);
        }
    }
    None
}
