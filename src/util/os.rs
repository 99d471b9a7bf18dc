/// This module is for "real" OS-dependent features.
/// wasm builds will not be able to access this module, period,
/// since they cannot use the std::os module, or filesystem directly.

use std::{fs, io, path::{Path, PathBuf}};

use super::sys::env_var_opt;

pub type Error = String;

pub const CACHE_DIR_ENV_VAR: &str = "CAPGAINS_CACHE_DIR";
const HOME_CACHE_DIR_NAME: &str = ".capgains";

pub fn mk_writable_dir(dirpath: &Path) -> io::Result<()> {
    fs::create_dir_all(dirpath)?;

    let mut perms = fs::metadata(dirpath)?.permissions();
    #[cfg(unix)]
    {
        // Does not apply to Windows
        use std::os::unix::fs::PermissionsExt;
        perms.set_mode(0o700);
    }
    #[cfg(not(unix))]
    perms.set_readonly(false);
    fs::set_permissions(dirpath, perms)
}

// Returns a path like $HOME/.capgains/ (or $CAPGAINS_CACHE_DIR, if set),
// and ensures that it exists and is writable.
pub fn cache_dir_path() -> Result<PathBuf, Error> {
    let dir_path = match env_var_opt(CACHE_DIR_ENV_VAR) {
        Some(d) => PathBuf::from(d),
        None => {
            let home_dir = dirs::home_dir()
                .ok_or_else(|| Error::from("Unable to determine home directory"))?;
            home_dir.join(HOME_CACHE_DIR_NAME)
        }
    };

    mk_writable_dir(&dir_path).map_err(
        |e| format!("Unable to create {}: {}", dir_path.display(), e))?;
    Ok(dir_path)
}
