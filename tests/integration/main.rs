//! Integration tests for Kamaji

mod cli_tests {
    use assert_cmd::{cargo::cargo_bin_cmd, Command};
    use predicates::prelude::*;
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    /// Command isolated from the user's settings and temp root
    fn kamaji(temp: &Path) -> Command {
        let mut cmd = cargo_bin_cmd!("kamaji");
        cmd.env("KAMAJI_CONFIG", temp.join("no-config.toml"))
            .env("KAMAJI_TMP_DIR", temp.join("rt"))
            .env_remove("KAMAJI_WORKSPACE");
        cmd
    }

    /// Workspace with a bash rule at `rules/echo/run.sh` and an `app/` caller dir
    fn workspace(temp: &Path, rule: &str, build: &str) {
        fs::write(
            temp.join("kamaji.workspace.yaml"),
            "rules_directory: //rules\ninterpreter: bash\nworkspace_vars:\n  - org_domain: example.com\n",
        )
        .unwrap();
        fs::create_dir_all(temp.join("rules/echo")).unwrap();
        fs::create_dir_all(temp.join("rules/common")).unwrap();
        fs::write(temp.join("rules/echo/run.sh"), rule).unwrap();
        fs::create_dir_all(temp.join("app")).unwrap();
        fs::write(temp.join("app/BUILD.yaml"), build).unwrap();
    }

    const BUILD: &str = "targets:\n  - name: hello\n    rule: echo/run.sh\n    config:\n      greeting: hi\n      loud: true\n      opts: { level: 2 }\n";

    #[test]
    fn help_displays() {
        let temp = TempDir::new().unwrap();
        kamaji(temp.path())
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("build target executor"));
    }

    #[test]
    fn version_displays() {
        let temp = TempDir::new().unwrap();
        kamaji(temp.path())
            .arg("--version")
            .assert()
            .success()
            .stdout(predicate::str::contains("kamaji"));
    }

    #[test]
    fn target_is_required() {
        let temp = TempDir::new().unwrap();
        kamaji(temp.path()).assert().failure();
    }

    #[test]
    fn cleanup_removes_runtime_dirs() {
        let temp = TempDir::new().unwrap();
        let rt = temp.path().join("rt");
        fs::create_dir_all(rt.join("cache/abc")).unwrap();
        fs::create_dir_all(rt.join("sandbox/t-abcdef")).unwrap();

        kamaji(temp.path())
            .arg("--cleanup")
            .assert()
            .success()
            .stdout(predicate::str::contains("removed 2"));
        assert!(!rt.join("cache").exists());
        assert!(!rt.join("sandbox").exists());
    }

    #[test]
    fn missing_workspace_fails_with_hint() {
        let temp = TempDir::new().unwrap();
        kamaji(temp.path())
            .current_dir(temp.path())
            .arg("hello")
            .assert()
            .failure()
            .stderr(predicate::str::contains("Configuration file not found"))
            .stderr(predicate::str::contains("Hint:"));
    }

    #[test]
    fn unknown_target_fails() {
        let temp = TempDir::new().unwrap();
        workspace(temp.path(), "#!/bin/bash\n", BUILD);
        kamaji(temp.path())
            .current_dir(temp.path().join("app"))
            .arg("nope")
            .assert()
            .failure()
            .stderr(predicate::str::contains("Target nope not found"));
    }

    #[test]
    fn runs_rule_with_synthesized_flags() {
        let temp = TempDir::new().unwrap();
        let rule = "#!/bin/bash\nprintf '%s\\n' \"$@\" > args.txt\nprintf '%s' \"$KAMAJI_ORGANIZATION_DOMAIN\" > domain.txt\n";
        workspace(temp.path(), rule, BUILD);

        kamaji(temp.path())
            .current_dir(temp.path().join("app"))
            .args(["hello", "--", "extra"])
            .assert()
            .success();

        let args = fs::read_to_string(temp.path().join("app/args.txt")).unwrap();
        assert_eq!(args, "--greeting=hi\n--loud=true\n--opts={\"level\":2}\nextra\n");
        assert_eq!(
            fs::read_to_string(temp.path().join("app/domain.txt")).unwrap(),
            "example.com"
        );

        let execroot = temp.path().join("rt/execroot");
        assert_eq!(fs::read_dir(execroot).unwrap().count(), 0);
    }

    #[test]
    fn alternate_build_file() {
        let temp = TempDir::new().unwrap();
        workspace(temp.path(), "#!/bin/bash\ntouch ran.txt\n", BUILD);
        fs::rename(
            temp.path().join("app/BUILD.yaml"),
            temp.path().join("app/targets.yaml"),
        )
        .unwrap();

        kamaji(temp.path())
            .current_dir(temp.path().join("app"))
            .args(["-b", "targets.yaml", "hello"])
            .assert()
            .success();
        assert!(temp.path().join("app/ran.txt").is_file());
    }

    #[test]
    fn failing_rule_reports_exit_code() {
        let temp = TempDir::new().unwrap();
        workspace(temp.path(), "#!/bin/bash\nexit 4\n", BUILD);

        kamaji(temp.path())
            .current_dir(temp.path().join("app"))
            .arg("hello")
            .assert()
            .failure()
            .stderr(predicate::str::contains("exit code 4"));
        assert_eq!(
            fs::read_dir(temp.path().join("rt/execroot")).unwrap().count(),
            0
        );
    }

    #[test]
    fn undeclared_dependency_is_reported() {
        let temp = TempDir::new().unwrap();
        let build = "targets:\n  - name: hello\n    rule: echo/run.sh\n    config:\n      bin: \"@@missing\"\n";
        workspace(temp.path(), "#!/bin/bash\ntouch ran.txt\n", build);

        kamaji(temp.path())
            .current_dir(temp.path().join("app"))
            .arg("hello")
            .assert()
            .failure()
            .stderr(predicate::str::contains("Unresolved dependency: missing"));
        assert!(!temp.path().join("app/ran.txt").exists());
    }

    #[test]
    fn isolated_run_uses_origin_mirror() {
        let temp = TempDir::new().unwrap();
        let rule = "#!/bin/bash\npwd > out/pwd.txt\n";
        workspace(temp.path(), rule, BUILD);
        fs::create_dir_all(temp.path().join("app/out")).unwrap();

        kamaji(temp.path())
            .current_dir(temp.path().join("app"))
            .args(["-i", "hello"])
            .assert()
            .success();

        let pwd = fs::read_to_string(temp.path().join("app/out/pwd.txt")).unwrap();
        assert!(pwd.contains("/sandbox/hello-"), "{}", pwd);
        assert!(pwd.trim().ends_with("/origin"), "{}", pwd);
    }

    #[test]
    fn relative_tmp_dir_is_resolved_against_caller() {
        let temp = TempDir::new().unwrap();
        let rule = "#!/bin/bash\nprintf '%s' \"$KAMAJI_EXECROOT\" > root.txt\n";
        workspace(temp.path(), rule, BUILD);

        kamaji(temp.path())
            .current_dir(temp.path().join("app"))
            .args(["--tmp-dir", "rel-rt", "hello"])
            .assert()
            .success();

        let root = fs::read_to_string(temp.path().join("app/root.txt")).unwrap();
        assert!(Path::new(&root).is_absolute(), "{}", root);
        assert!(root.contains("/app/rel-rt/execroot/hello-"), "{}", root);
        assert!(temp.path().join("app/rel-rt/cache").is_dir());
    }
}
