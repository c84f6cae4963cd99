use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tempfile::TempDir;

struct CliTestEnv {
    _temp_dir: TempDir,
    home: PathBuf,
    xdg_config: PathBuf,
    xdg_state: PathBuf,
}

impl CliTestEnv {
    fn new() -> Self {
        let temp_dir = TempDir::new().expect("failed to create temp dir");
        let base = temp_dir.path().to_path_buf();
        let home = base.join("home");
        let xdg_config = base.join("xdg-config");
        let xdg_state = base.join("xdg-state");

        fs::create_dir_all(&home).expect("failed to create HOME");
        fs::create_dir_all(&xdg_config).expect("failed to create XDG_CONFIG_HOME");
        fs::create_dir_all(&xdg_state).expect("failed to create XDG_STATE_HOME");

        Self {
            _temp_dir: temp_dir,
            home,
            xdg_config,
            xdg_state,
        }
    }

    fn with_claude_fixture() -> Self {
        let env = Self::new();
        seed_claude_fixture(&env.home);
        env
    }

    fn write_config(&self, contents: &str) {
        let dir = self.xdg_config.join("usagegrid");
        fs::create_dir_all(&dir).expect("failed to create config dir");
        fs::write(dir.join("config.toml"), contents).expect("failed to write config");
    }

    fn log_dir(&self) -> PathBuf {
        self.xdg_state.join("usagegrid")
    }
}

fn copy_dir(source: &Path, target: &Path) {
    fs::create_dir_all(target).expect("failed to create fixture directory");
    for entry in fs::read_dir(source).expect("failed to read fixture directory") {
        let entry = entry.expect("bad fixture entry");
        let path = entry.path();
        let dest = target.join(entry.file_name());
        if path.is_dir() {
            copy_dir(&path, &dest);
        } else {
            fs::copy(&path, &dest).expect("failed to copy fixture");
        }
    }
}

fn seed_claude_fixture(home: &Path) {
    let fixtures = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../usagegrid-core/tests/fixtures");
    let claude = home.join(".claude");
    copy_dir(&fixtures.join("projects"), &claude.join("projects"));
    fs::copy(
        fixtures.join("stats-cache.json"),
        claude.join("stats-cache.json"),
    )
    .expect("failed to copy stats cache fixture");
}

fn run_bin(env: &CliTestEnv, args: &[&str]) -> Output {
    let bin_path = PathBuf::from(assert_cmd::cargo::cargo_bin!("usagegrid"));

    Command::new(bin_path)
        .args(args)
        .env("HOME", &env.home)
        .env("XDG_CONFIG_HOME", &env.xdg_config)
        .env("XDG_STATE_HOME", &env.xdg_state)
        .env("TZ", "UTC")
        .env_remove("RUST_LOG")
        .output()
        .unwrap_or_else(|e| panic!("failed to execute usagegrid: {e}"))
}

fn assert_success(args: &[&str], output: &Output) {
    if output.status.success() {
        return;
    }

    let rendered_args = args
        .iter()
        .map(|arg| OsString::from(arg).to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join(" ");
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    panic!(
        "usagegrid {rendered_args} failed\nstatus: {}\nstdout:\n{}\nstderr:\n{}",
        output.status, stdout, stderr
    );
}

fn stdout_json(output: &Output) -> serde_json::Value {
    serde_json::from_slice(&output.stdout).unwrap_or_else(|e| {
        panic!(
            "stdout is not JSON ({e}):\n{}",
            String::from_utf8_lossy(&output.stdout)
        )
    })
}

#[test]
fn show_json_merges_cache_with_gap_days() {
    let env = CliTestEnv::with_claude_fixture();
    let args = ["show", "--json"];

    let output = run_bin(&env, &args);
    assert_success(&args, &output);

    let snapshot = stdout_json(&output);
    // Cache covers 2024-06-03..05; every later fixture record is a gap-day record.
    assert_eq!(snapshot["totals"]["total_messages"], 506);
    assert_eq!(snapshot["totals"]["total_sessions"], 33);
    assert_eq!(snapshot["today_messages"], 0);
    assert_eq!(snapshot["last_computed_date"], "2024-06-05");
    assert_eq!(snapshot["grid"]["weeks"].as_array().map(Vec::len), Some(16));
    assert_eq!(snapshot["window_limit"], 900);
}

#[test]
fn show_renders_text_grid_by_default() {
    let env = CliTestEnv::with_claude_fixture();

    let output = run_bin(&env, &[]);
    assert_success(&[], &output);

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(
        stdout.contains("Total: 506 messages, 33 sessions"),
        "expected totals in stdout, got:\n{stdout}"
    );
    assert!(stdout.contains("Today: 0 messages, 0 sessions"));
    for day in ["Mon", "Tue", "Wed", "Thu", "Fri"] {
        assert!(
            stdout.lines().any(|l| l.starts_with(day)),
            "missing {day} row"
        );
    }
    assert!(!stdout.lines().any(|l| l.starts_with("Sat")));
    assert!(stdout.contains("Less"));

    assert!(env.log_dir().exists(), "log directory should be created");
}

#[test]
fn show_weeks_flag_and_config_override() {
    let env = CliTestEnv::with_claude_fixture();
    env.write_config("[grid]\nweeks = 8\n");

    let output = run_bin(&env, &["show", "--json"]);
    assert_success(&["show", "--json"], &output);
    assert_eq!(
        stdout_json(&output)["grid"]["weeks"].as_array().map(Vec::len),
        Some(8)
    );

    let args = ["show", "--json", "--weeks", "4"];
    let output = run_bin(&env, &args);
    assert_success(&args, &output);
    assert_eq!(
        stdout_json(&output)["grid"]["weeks"].as_array().map(Vec::len),
        Some(4)
    );

    let output = run_bin(&env, &["show", "--weeks", "0"]);
    assert!(!output.status.success(), "weeks = 0 should be rejected");
}

#[test]
fn show_without_claude_data_is_empty_not_an_error() {
    let env = CliTestEnv::new();
    let args = ["show", "--json"];

    let output = run_bin(&env, &args);
    assert_success(&args, &output);

    let snapshot = stdout_json(&output);
    assert_eq!(snapshot["totals"]["total_messages"], 0);
    assert_eq!(snapshot["rolling_window"]["message_count"], 0);
    assert!(snapshot["last_computed_date"].is_null());
}

#[test]
fn quota_respects_disabled_config() {
    let env = CliTestEnv::new();
    env.write_config("[quota]\nenabled = false\n");

    let output = run_bin(&env, &["quota"]);
    assert_success(&["quota"], &output);
    assert!(String::from_utf8_lossy(&output.stdout).contains("disabled"));
}

#[test]
fn quota_failure_is_reported_not_fatal() {
    let env = CliTestEnv::new();
    env.write_config(
        "[quota]\nendpoint = \"http://127.0.0.1:9/api/oauth/usage\"\ntimeout_secs = 2\nkeychain_service = \"usagegrid-acceptance-missing\"\n",
    );

    let output = run_bin(&env, &["quota"]);
    assert_success(&["quota"], &output);
    assert!(String::from_utf8_lossy(&output.stdout).contains("Quota unavailable"));

    let args = ["quota", "--json"];
    let output = run_bin(&env, &args);
    assert_success(&args, &output);
    assert!(stdout_json(&output).is_null());
}
