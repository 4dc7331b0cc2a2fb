//! Shared fixture for CLI specs: a temp project with an initialised
//! store and, when needed, a shell-script agent driven by plan files.

use assert_cmd::Command;
use std::path::Path;

/// The script agent: dumps its prompt for assertions, then replays the
/// plan file matching its kenning and wake kind. `__SELF__` in a plan
/// line is replaced with the agent's session id.
const AGENT_SCRIPT: &str = r####"#!/bin/sh
prompt=$(cat)
mkdir -p prompts
printf '%s' "$prompt" > "prompts/$KEN_SESSION_ID.txt"

ken_key=$(printf '%s' "$KEN_KEN_PATH" | tr '/' '_')
case "$prompt" in
  *"## Dependency Results"*) plan="plans/$ken_key.deps.json" ;;
  *"## Recovery Context"*) plan="plans/$ken_key.recover.json" ;;
  *) plan="plans/$ken_key.json" ;;
esac
[ -f "$plan" ] || plan="plans/$ken_key.json"

if [ -f "$plan" ]; then
  sed "s/__SELF__/$KEN_SESSION_ID/g" "$plan" | while IFS= read -r line; do
    [ -n "$line" ] || continue
    "$KEN_BIN" request "$line" >> requests.log 2>&1
  done
else
  "$KEN_BIN" request "{\"type\":\"complete\",\"session_id\":\"$KEN_SESSION_ID\",\"result\":\"done\"}" >> requests.log 2>&1
fi
"####;

pub struct TestProject {
    dir: tempfile::TempDir,
}

impl TestProject {
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().unwrap(),
        }
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    /// A ken invocation rooted in this project.
    pub fn ken(&self) -> Command {
        let mut cmd = Command::cargo_bin("ken").unwrap();
        cmd.current_dir(self.root());
        cmd.env("KEN_BIN", assert_cmd::cargo::cargo_bin("ken"));
        cmd
    }

    pub fn init(&self) -> &Self {
        self.ken().arg("init").assert().success();
        self
    }

    /// Run a ken command expecting success; return its stdout.
    pub fn stdout(&self, args: &[&str]) -> String {
        let output = self.ken().args(args).assert().success();
        String::from_utf8_lossy(&output.get_output().stdout).into_owned()
    }

    /// `ken wake` returning the new session id.
    pub fn wake(&self, ken_path: &str, task: &str) -> String {
        self.stdout(&["wake", ken_path, "--task", task])
            .trim()
            .to_string()
    }

    pub fn write_kenning(&self, ken_path: &str, body: &str) {
        let dir = self.root().join("kens").join(ken_path);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("kenning.md"), body).unwrap();
    }

    /// Install the script agent and point the engine config at it.
    pub fn install_script_agent(&self) {
        let script_path = self.root().join("agent.sh");
        std::fs::write(&script_path, AGENT_SCRIPT).unwrap();
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&script_path, std::fs::Permissions::from_mode(0o755))
                .unwrap();
        }
        std::fs::write(
            self.root().join(".ken/config.toml"),
            "max_active = 4\ntick_interval_ms = 50\n\n[agent]\ncommand = \"./agent.sh\"\nargs = []\n",
        )
        .unwrap();
    }

    /// Write a plan file keyed by kenning (slashes become underscores;
    /// append `.deps` / `.recover` before `.json` for later wakes).
    pub fn write_plan(&self, plan_name: &str, lines: &[&str]) {
        let plans = self.root().join("plans");
        std::fs::create_dir_all(&plans).unwrap();
        std::fs::write(
            plans.join(format!("{plan_name}.json")),
            lines.join("\n") + "\n",
        )
        .unwrap();
    }

    /// The prompt most recently delivered to a session's agent.
    pub fn prompt_for(&self, session_id: &str) -> String {
        std::fs::read_to_string(self.root().join("prompts").join(format!("{session_id}.txt")))
            .unwrap_or_default()
    }

    /// Session status as reported by `ken session`.
    pub fn status_of(&self, session_id: &str) -> String {
        let detail = self.stdout(&["session", session_id]);
        detail
            .lines()
            .find_map(|line| line.strip_prefix("status:"))
            .map(|s| s.trim().to_string())
            .unwrap_or_default()
    }
}
