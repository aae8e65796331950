//! Integration tests for precache

mod cli_tests {
    use assert_cmd::{cargo::cargo_bin_cmd, Command};
    use predicates::prelude::*;
    use tempfile::TempDir;

    /// Isolated config file and state directory per test
    struct Sandbox {
        home: TempDir,
    }

    impl Sandbox {
        fn new() -> Self {
            Self {
                home: TempDir::new().unwrap(),
            }
        }

        fn config_path(&self) -> std::path::PathBuf {
            self.home.path().join("config").join("precache.toml")
        }

        fn write_config(&self, toml: &str) {
            let path = self.config_path();
            std::fs::create_dir_all(path.parent().unwrap()).unwrap();
            std::fs::write(path, toml).unwrap();
        }

        fn precache(&self) -> Command {
            let mut cmd = cargo_bin_cmd!("precache");
            cmd.env("HOME", self.home.path())
                .env("XDG_CONFIG_HOME", self.home.path().join("config"))
                .env("XDG_STATE_HOME", self.home.path().join("state"))
                .env("XDG_DATA_HOME", self.home.path().join("data"))
                .env("PRECACHE_CONFIG", self.config_path())
                .env_remove("RUST_LOG");
            cmd
        }
    }

    #[test]
    fn help_displays() {
        Sandbox::new()
            .precache()
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("offline cache proxy"));
    }

    #[test]
    fn version_displays() {
        Sandbox::new()
            .precache()
            .arg("--version")
            .assert()
            .success()
            .stdout(predicate::str::contains("precache"));
    }

    #[test]
    fn config_path_honours_env() {
        let sandbox = Sandbox::new();
        sandbox
            .precache()
            .args(["config", "path"])
            .assert()
            .success()
            .stdout(predicate::str::contains("precache.toml"));
    }

    #[test]
    fn config_show_defaults() {
        Sandbox::new()
            .precache()
            .args(["config", "show"])
            .assert()
            .success()
            .stdout(predicate::str::contains("[worker]"))
            .stdout(predicate::str::contains("generation = \"precache-v1\""));
    }

    #[test]
    fn config_set_persists() {
        let sandbox = Sandbox::new();
        sandbox.precache().args(["config", "init"]).assert().success();
        sandbox
            .precache()
            .args(["config", "set", "worker.generation", "simple-hours-v10"])
            .assert()
            .success();

        sandbox
            .precache()
            .args(["config", "show"])
            .assert()
            .success()
            .stdout(predicate::str::contains("generation = \"simple-hours-v10\""));
    }

    #[test]
    fn config_set_unknown_key_fails() {
        Sandbox::new()
            .precache()
            .args(["config", "set", "worker.color", "blue"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Unknown config key"));
    }

    #[test]
    fn status_without_registration() {
        Sandbox::new()
            .precache()
            .arg("status")
            .assert()
            .success()
            .stdout(predicate::str::contains("No worker registered"));
    }

    #[test]
    fn fetch_without_registration_fails() {
        Sandbox::new()
            .precache()
            .args(["fetch", "http://localhost:8080/index.html"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("No worker registered"))
            .stderr(predicate::str::contains("Hint:"));
    }

    #[test]
    fn activate_without_registration_fails() {
        Sandbox::new()
            .precache()
            .arg("activate")
            .assert()
            .failure()
            .stderr(predicate::str::contains("No worker registered"));
    }

    #[test]
    fn cache_list_empty() {
        Sandbox::new()
            .precache()
            .args(["cache", "list"])
            .assert()
            .success()
            .stdout(predicate::str::contains("No caches found"));
    }

    #[test]
    fn failed_install_leaves_worker_redundant() {
        let sandbox = Sandbox::new();
        sandbox.write_config(
            r#"
[general]
audit_log = false

[worker]
generation = "v1"
scope = "http://127.0.0.1:9/app/"
assets = ["index.html"]
offline_page = "index.html"

[network]
timeout_secs = 2
"#,
        );

        sandbox
            .precache()
            .arg("install")
            .assert()
            .failure()
            .stderr(predicate::str::contains("Failed to precache"));

        sandbox
            .precache()
            .arg("status")
            .assert()
            .success()
            .stdout(predicate::str::contains("redundant"));

        sandbox
            .precache()
            .args(["cache", "list", "--format", "plain"])
            .assert()
            .success()
            .stdout(predicate::str::is_empty());
    }
}
