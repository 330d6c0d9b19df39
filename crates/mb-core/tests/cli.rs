//! CLI tests for the mailbatch binary.

use std::fs;
use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;

/// Get a Command for the mailbatch binary with a clean environment.
fn mailbatch() -> Command {
    let mut cmd = Command::cargo_bin("mailbatch").expect("mailbatch binary should exist");
    cmd.env_remove("MAILBATCH_CONFIG")
        .env_remove("MAILBATCH_SMTP_CONFIG")
        .env_remove("MAILBATCH_LOG")
        .env_remove("RUST_LOG");
    cmd
}

fn write_config(dir: &Path, body: &str) -> std::path::PathBuf {
    let path = dir.join("mailbatch.toml");
    fs::write(&path, body).unwrap();
    path
}

fn maildrop_config(dir: &Path) -> std::path::PathBuf {
    let drop_dir = dir.join("drop");
    write_config(
        dir,
        &format!(
            r#"
holddown_secs = 3600
pre_trigger_depth = 2
addressing = "file:{}"
subject_template = "%events{{triggering}} of %events{{total}} (lost %events{{lost}})"

[mail]
to = ["ops@example.com"]
"#,
            drop_dir.display()
        ),
    )
}

mod invalid_usage {
    use super::*;

    #[test]
    fn unknown_command_fails() {
        mailbatch()
            .arg("nonexistent-command")
            .assert()
            .failure()
            .stderr(predicate::str::contains("error"));
    }

    #[test]
    fn invalid_log_level_fails() {
        mailbatch()
            .args(["--log-level", "loud", "check"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("invalid value 'loud'"));
    }

    #[test]
    fn help_lists_subcommands() {
        mailbatch()
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("run"))
            .stdout(predicate::str::contains("check"))
            .stdout(predicate::str::contains("format"));
    }
}

mod check {
    use super::*;

    #[test]
    fn valid_config_prints_json() {
        let dir = tempfile::tempdir().unwrap();
        let config = maildrop_config(dir.path());
        mailbatch()
            .arg("--config")
            .arg(&config)
            .arg("check")
            .assert()
            .success()
            .stdout(predicate::str::contains("\"status\": \"ok\""))
            .stdout(predicate::str::contains("CLI argument"))
            .stdout(predicate::str::contains("\"holddown_secs\": 3600"));
    }

    #[test]
    fn config_from_environment() {
        let dir = tempfile::tempdir().unwrap();
        let config = maildrop_config(dir.path());
        mailbatch()
            .env("MAILBATCH_CONFIG", &config)
            .arg("check")
            .assert()
            .success()
            .stdout(predicate::str::contains("environment variable"));
    }

    #[test]
    fn missing_recipients_exit_10() {
        let dir = tempfile::tempdir().unwrap();
        let config = write_config(dir.path(), "addressing = \"file:/tmp/mailbatch\"\n");
        mailbatch()
            .arg("--config")
            .arg(&config)
            .arg("check")
            .assert()
            .code(10)
            .stdout(predicate::str::contains("mail.to"));
    }

    #[test]
    fn smtps_is_accepted() {
        let dir = tempfile::tempdir().unwrap();
        let config = write_config(
            dir.path(),
            "addressing = \"smtps://mail.example.com\"\n[mail]\nto = [\"ops@example.com\"]\n",
        );
        mailbatch()
            .arg("--config")
            .arg(&config)
            .arg("check")
            .assert()
            .success()
            .stdout(predicate::str::contains("smtps://mail.example.com:465"));
    }

    #[test]
    fn smtp_env_overrides_file_addressing() {
        let dir = tempfile::tempdir().unwrap();
        let config = maildrop_config(dir.path());
        mailbatch()
            .env("MAILBATCH_SMTP_CONFIG", "smtp://relay.example.com?submission")
            .arg("--config")
            .arg(&config)
            .arg("check")
            .assert()
            .success()
            .stdout(predicate::str::contains("smtp://relay.example.com:587"));
    }

    #[test]
    fn missing_config_file_exit_10() {
        mailbatch()
            .args(["--config", "/nonexistent/mailbatch.toml", "check"])
            .assert()
            .code(10)
            .stdout(predicate::str::contains("\"status\": \"error\""));
    }
}

mod run {
    use super::*;

    #[test]
    fn batches_stdin_into_maildrop() {
        let dir = tempfile::tempdir().unwrap();
        let config = maildrop_config(dir.path());
        let input = [
            r#"{"level":"DEBUG","message":"heartbeat 1"}"#,
            r#"{"level":"DEBUG","message":"heartbeat 2"}"#,
            "",
            "not json",
            r#"{"level":"ERROR","message":"disk full","logger":"app.disk"}"#,
        ]
        .join("\n");

        mailbatch()
            .arg("--config")
            .arg(&config)
            .arg("run")
            .write_stdin(input)
            .assert()
            .success()
            .stdout(predicate::str::contains("\"submitted\": 3"))
            .stdout(predicate::str::contains("\"skipped\": 1"))
            .stdout(predicate::str::contains("\"flushes\": 1"))
            .stdout(predicate::str::contains("\"completed\": true"));

        let drop_dir = dir.path().join("drop");
        let files: Vec<_> = fs::read_dir(&drop_dir).unwrap().collect();
        assert_eq!(files.len(), 1);
        let mail = fs::read_to_string(files[0].as_ref().unwrap().path()).unwrap();
        assert!(mail.contains("Subject: 1 of 3 (lost 0)\r\n"));
        assert!(mail.contains("To: <ops@example.com>\r\n"));
    }

    #[test]
    fn stuck_delivery_exits_22() {
        // Connections queue in the backlog and never see a greeting.
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let dir = tempfile::tempdir().unwrap();
        let config = write_config(
            dir.path(),
            &format!(
                "holddown_secs = 3600\nshutdown_timeout_secs = 1\naddressing = \"smtp://127.0.0.1:{}\"\n[mail]\nto = [\"ops@example.com\"]\n",
                port
            ),
        );

        mailbatch()
            .arg("--config")
            .arg(&config)
            .arg("run")
            .write_stdin("{\"level\":\"ERROR\",\"message\":\"disk full\"}\n")
            .timeout(std::time::Duration::from_secs(20))
            .assert()
            .code(22)
            .stdout(predicate::str::contains("\"completed\": false"));
        drop(listener);
    }

    #[test]
    fn context_only_input_sends_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let config = maildrop_config(dir.path());
        mailbatch()
            .arg("--config")
            .arg(&config)
            .arg("run")
            .write_stdin("{\"level\":\"INFO\",\"message\":\"fine\"}\n")
            .assert()
            .success()
            .stdout(predicate::str::contains("\"flushes\": 0"))
            .stdout(predicate::str::contains("\"discarded_context\": 1"));
        assert!(!dir.path().join("drop").exists());
    }
}

mod format {
    use super::*;

    #[test]
    fn escapes_and_counts() {
        mailbatch()
            .args(["format", "100%% of %events{total}, lost %events{lost}", "--lost", "3"])
            .assert()
            .success()
            .stdout("100% of 0, lost 3\n");
    }

    #[test]
    fn counts_records_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let records = dir.path().join("records.jsonl");
        fs::write(
            &records,
            [
                r#"{"level":"DEBUG","message":"a"}"#,
                r#"{"level":"INFO","message":"b"}"#,
                r#"{"level":"FATAL","message":"c"}"#,
            ]
            .join("\n"),
        )
        .unwrap();

        mailbatch()
            .arg("format")
            .arg("%events{triggering}/%events{total} d=%events{class.debug} f=%events{FATAL}")
            .arg("--records")
            .arg(&records)
            .assert()
            .success()
            .stdout("1/3 d=1 f=1\n");
    }

    #[test]
    fn unknown_directive_renders_empty() {
        mailbatch()
            .args(["format", "[%nope]"])
            .assert()
            .success()
            .stdout("[]\n");
    }

    #[test]
    fn env_directive_reads_environment() {
        mailbatch()
            .env("MAILBATCH_TEST_HOST", "build01")
            .args(["format", "host=%env{MAILBATCH_TEST_HOST}"])
            .assert()
            .success()
            .stdout("host=build01\n");
    }

    #[test]
    fn missing_records_file_exit_21() {
        mailbatch()
            .args(["format", "x", "--records", "/nonexistent/records.jsonl"])
            .assert()
            .code(21);
    }
}
