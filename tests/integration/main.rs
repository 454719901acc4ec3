//! Integration tests for Berth

mod cli_tests {
    use assert_cmd::{cargo::cargo_bin_cmd, Command};
    use predicates::prelude::*;
    use std::path::Path;
    use tempfile::TempDir;

    /// Temp dir holding a config that keeps all state inside it
    struct Sandbox {
        temp: TempDir,
    }

    impl Sandbox {
        fn new() -> Self {
            let temp = TempDir::new().unwrap();
            let config = format!(
                "[app]\ndata_dir = \"{}\"\n",
                temp.path().join("data").display()
            );
            std::fs::write(temp.path().join("config.toml"), config).unwrap();
            std::fs::create_dir_all(temp.path().join("work")).unwrap();
            Self { temp }
        }

        fn work(&self) -> &Path {
            self.temp.path()
        }

        fn write_app(&self, content: &str) {
            std::fs::write(self.work().join("work/.berth.toml"), content).unwrap();
        }

        fn berth(&self) -> Command {
            let mut cmd = cargo_bin_cmd!("berth");
            cmd.current_dir(self.work().join("work"))
                .env("BERTH_CONFIG", self.work().join("config.toml"))
                .env("CI", "true");
            cmd
        }
    }

    #[test]
    fn help_displays() {
        cargo_bin_cmd!("berth")
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("local development environments"));
    }

    #[test]
    fn version_displays() {
        cargo_bin_cmd!("berth")
            .arg("--version")
            .assert()
            .success()
            .stdout(predicate::str::contains("berth"));
    }

    #[test]
    fn cache_path_follows_config() {
        let sandbox = Sandbox::new();
        sandbox
            .berth()
            .args(["cache", "path"])
            .assert()
            .success()
            .stdout(predicate::str::contains("data/cache"));
    }

    #[test]
    fn cache_clear_succeeds_without_app() {
        let sandbox = Sandbox::new();
        sandbox
            .berth()
            .args(["cache", "clear"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Cleared"));
    }

    #[test]
    fn start_without_app_fails_with_hint() {
        let sandbox = Sandbox::new();
        sandbox
            .berth()
            .arg("start")
            .assert()
            .failure()
            .stderr(predicate::str::contains("No app found"))
            .stderr(predicate::str::contains(".berth.toml"));
    }

    #[test]
    fn task_lists_builtins_and_tooling() {
        let sandbox = Sandbox::new();
        sandbox.write_app(
            r#"
name = "demo"

[services.web]
image = "nginx:1.27"

[tooling.composer]
service = "web"
cmd = "composer"
description = "Run composer"
"#,
        );
        sandbox
            .berth()
            .arg("task")
            .assert()
            .success()
            .stdout(predicate::str::contains("poweroff"))
            .stdout(predicate::str::contains("Run composer"));

        assert!(sandbox.work().join("data/cache/_.tasks.cache.json").is_file());
    }

    #[test]
    fn invalid_app_file_is_reported() {
        let sandbox = Sandbox::new();
        sandbox.write_app("name = \"demo\"\n[services.web\n");
        sandbox
            .berth()
            .arg("task")
            .assert()
            .failure()
            .stderr(predicate::str::contains("Invalid configuration"));
    }

    #[test]
    fn exec_requires_command() {
        cargo_bin_cmd!("berth")
            .args(["exec", "web"])
            .assert()
            .failure();
    }
}
