use std::{fs, path::PathBuf};

use capgains::util::sys::env_var_non_empty;

const KEEP_ON_FAIL_ENV_VAR: &str = "SKIP_TEMP_DIR_CLEANUP_ON_FAIL";

/// A fresh, not yet created, path under the system temp dir. Whatever gets
/// created there is removed on drop (unless a test failed and
/// SKIP_TEMP_DIR_CLEANUP_ON_FAIL is set).
pub struct NonAutoCreatingTestDir {
    pub path: PathBuf,
}

impl NonAutoCreatingTestDir {
    pub fn new() -> NonAutoCreatingTestDir {
        let tmpdir = std::env::temp_dir();
        let pid = std::process::id();
        let path = (0..)
            .map(|i: u32| tmpdir.join(format!("capgains-test-{pid}-{i}")))
            .find(|p| !p.exists())
            .unwrap();
        NonAutoCreatingTestDir { path }
    }
}

impl Drop for NonAutoCreatingTestDir {
    fn drop(&mut self) {
        if !self.path.exists() {
            return;
        }
        if std::thread::panicking() && env_var_non_empty(KEEP_ON_FAIL_ENV_VAR) {
            println!("Keeping {} for inspection", self.path.display());
            return;
        }
        let _ = fs::remove_dir_all(&self.path);
    }
}
