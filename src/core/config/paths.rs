use std::env;
use std::fs;
use std::path::PathBuf;

/// Where the service reads its documents from and keeps its own files.
///
/// `project_root` holds `config.yml`, the policy documents and the audit
/// suite. `user_data_dir` holds edits, secrets, the session token and logs.
#[derive(Debug, Clone)]
pub struct AppPaths {
    pub project_root: PathBuf,
    pub user_data_dir: PathBuf,
    pub log_dir: PathBuf,
    pub secrets_path: PathBuf,
}

impl AppPaths {
    /// Honors `POLICYQA_ROOT` and `POLICYQA_DATA_DIR`.
    pub fn new() -> Self {
        let project_root = env::var_os("POLICYQA_ROOT")
            .map(PathBuf::from)
            .unwrap_or_else(default_project_root);
        let user_data_dir = env::var_os("POLICYQA_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| default_data_dir(&project_root));
        Self::with_dirs(project_root, user_data_dir)
    }

    /// Everything under one directory; used by tests and `policyqa-eval --root`.
    pub fn rooted_at(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self::with_dirs(root.clone(), root)
    }

    fn with_dirs(project_root: PathBuf, user_data_dir: PathBuf) -> Self {
        let log_dir = user_data_dir.join("logs");
        if let Err(err) = fs::create_dir_all(&log_dir) {
            eprintln!("cannot create {}: {}", log_dir.display(), err);
        }
        Self {
            secrets_path: user_data_dir.join("secrets.yaml"),
            project_root,
            user_data_dir,
            log_dir,
        }
    }

    /// Relative paths are taken from the project root.
    pub fn resolve(&self, path: &str) -> PathBuf {
        let path = PathBuf::from(path);
        if path.is_absolute() {
            path
        } else {
            self.project_root.join(path)
        }
    }
}

impl Default for AppPaths {
    fn default() -> Self {
        Self::new()
    }
}

/// The crate directory when it carries a `config.yml` (development runs),
/// otherwise the working directory.
fn default_project_root() -> PathBuf {
    let manifest_dir = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    if manifest_dir.join("config.yml").exists() {
        manifest_dir
    } else {
        env::current_dir().unwrap_or(manifest_dir)
    }
}

/// Debug builds keep state next to the project; release builds use the
/// platform data directory.
fn default_data_dir(project_root: &std::path::Path) -> PathBuf {
    if cfg!(debug_assertions) {
        return project_root.join(".policyqa");
    }
    let home = env::var_os("HOME")
        .or_else(|| env::var_os("USERPROFILE"))
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."));
    match env::var_os("XDG_DATA_HOME") {
        Some(xdg) => PathBuf::from(xdg).join("policyqa"),
        None if cfg!(target_os = "macos") => home.join("Library/Application Support/PolicyQA"),
        None => home.join(".local/share/policyqa"),
    }
}
