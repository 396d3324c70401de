#![allow(dead_code)]

use std::{
    fs,
    os::unix::fs::PermissionsExt,
    path::{Path, PathBuf},
};

use framestat::config::DashboardConfig;
use tempfile::TempDir;

/// Scratch appliance layout: an app root with `ops_tools/` and `config/`,
/// a sync log and a `bin/` directory for fake service-manager binaries.
pub struct Fixture {
    pub dir: TempDir,
}

impl Fixture {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("failed to create tempdir");
        for sub in ["app/ops_tools", "app/config", "bin", "logs"] {
            fs::create_dir_all(dir.path().join(sub)).expect("failed to create fixture dir");
        }
        Self { dir }
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn app_root(&self) -> PathBuf {
        self.root().join("app")
    }

    pub fn log_file(&self) -> PathBuf {
        self.root().join("logs/frame_sync.log")
    }

    /// Writes an executable `/bin/sh` script at `relative` under the root.
    pub fn script(&self, relative: &str, body: &str) -> PathBuf {
        let path = self.root().join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("failed to create script dir");
        }
        fs::write(&path, format!("#!/bin/sh\n{body}\n")).expect("failed to write script");
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755))
            .expect("failed to chmod script");
        path
    }

    /// Quick-check script printing `body` verbatim and exiting with `code`.
    pub fn check_script(&self, body: &str, code: i32) -> PathBuf {
        self.script(
            "app/ops_tools/chk_sync.sh",
            &format!("cat <<'EOF'\n{body}\nEOF\nexit {code}"),
        )
    }

    /// Fake `systemctl` answering every query with `state`.
    pub fn systemctl(&self, state: &str) -> PathBuf {
        self.script("bin/systemctl", &format!("echo {state}"))
    }

    pub fn write(&self, relative: &str, content: impl AsRef<[u8]>) -> PathBuf {
        let path = self.root().join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("failed to create parent dir");
        }
        fs::write(&path, content).expect("failed to write file");
        path
    }

    /// Config rooted in the fixture, with service-manager binaries pointing at
    /// `bin/` (absent until a test writes them).
    pub fn config(&self) -> DashboardConfig {
        let mut config = DashboardConfig::default();
        config.paths.app_root = self.app_root();
        config.paths.log_file = self.log_file();
        config.services.systemctl = self.root().join("bin/systemctl").display().to_string();
        config.services.loginctl = self.root().join("bin/loginctl").display().to_string();
        config.services.frame_user = "framestat-no-such-user".to_string();
        config.services.pf_process_name = "framestat-no-such-process".to_string();
        config.timeouts.quick_check = 10;
        config.timeouts.service_query = 5;
        config
    }

    /// YAML equivalent of [`Fixture::config`], for the binary.
    pub fn config_file(&self) -> PathBuf {
        let root = self.root().display();
        self.write(
            "framestat.yaml",
            format!(
                "paths:\n  app_root: {root}/app\n  log_file: {root}/logs/frame_sync.log\n\
                 services:\n  systemctl: {root}/bin/systemctl\n  loginctl: {root}/bin/loginctl\n  \
                 frame_user: framestat-no-such-user\n  pf_process_name: framestat-no-such-process\n\
                 timeouts:\n  quick_check: 10\n  service_query: 5\n"
            ),
        )
    }
}
