use crate::config::{BootConfig, BROWSERS_PATH_VAR};
use crate::environment::Environment;
use std::io::Write;
use std::os::unix::ffi::OsStrExt;
use std::path::Path;

const STARTUP_HEADER: &str = "=== Container Startup ===";
const STARTUP_FOOTER: &str = "=========================";
const ENV_HEADER: &str = "=== Environment Variables ===";
const ENV_FOOTER: &str = "=============================";

/// Startup report printed before setup runs.
///
/// Values are written as raw bytes. Quotes, backslashes and `$` in the
/// environment come out exactly as they are stored.
pub struct Diagnostics<'a> {
    config: &'a BootConfig,
    working_dir: &'a Path,
    env: &'a Environment,
}

impl<'a> Diagnostics<'a> {
    pub fn new(config: &'a BootConfig, working_dir: &'a Path, env: &'a Environment) -> Self {
        Self {
            config,
            working_dir,
            env,
        }
    }

    pub fn write_to<W: Write>(&self, out: &mut W) -> std::io::Result<()> {
        writeln!(out, "{}", STARTUP_HEADER)?;
        writeln!(out, "Working directory: {}", self.working_dir.display())?;
        write!(out, "WORKFLOW_ID: ")?;
        out.write_all(self.config.workflow_id.as_bytes())?;
        writeln!(out)?;
        writeln!(out, "SHUT_DOWN: {}", self.config.shut_down)?;
        writeln!(out, "DISPLAY: {}", self.config.display)?;
        writeln!(
            out,
            "{}: {}",
            BROWSERS_PATH_VAR,
            self.config.browsers_path.as_deref().unwrap_or("")
        )?;
        writeln!(out, "{}", STARTUP_FOOTER)?;

        writeln!(out, "{}", ENV_HEADER)?;
        out.write_all(&self.env.render())?;
        writeln!(out, "{}", ENV_FOOTER)?;
        out.flush()
    }

    pub fn to_json(&self) -> serde_json::Value {
        let environment: Vec<String> = self
            .env
            .sorted_lines()
            .iter()
            .map(|line| String::from_utf8_lossy(line).into_owned())
            .collect();

        serde_json::json!({
            "working_dir": self.working_dir.display().to_string(),
            "workflow_id": self.config.workflow_id.to_string_lossy(),
            "shut_down": self.config.shut_down,
            "mode": self.config.mode(),
            "display": self.config.display,
            "browsers_path": self.config.browsers_path,
            "environment": environment,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::OsString;
    use std::os::unix::ffi::OsStringExt;

    fn render(config: &BootConfig, env: &Environment) -> String {
        let mut out = Vec::new();
        Diagnostics::new(config, Path::new("/workspace"), env)
            .write_to(&mut out)
            .unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_report_layout() {
        let config = BootConfig {
            workflow_id: OsString::from("abc123"),
            browsers_path: Some("/ms-playwright".to_string()),
            ..BootConfig::default()
        };
        let env = Environment::from_vars([("B", "2"), ("A", "1")]);

        let expected = "\
=== Container Startup ===
Working directory: /workspace
WORKFLOW_ID: abc123
SHUT_DOWN: 0
DISPLAY: :1
PLAYWRIGHT_BROWSERS_PATH: /ms-playwright
=========================
=== Environment Variables ===
A=1
B=2
=============================
";
        assert_eq!(render(&config, &env), expected);
    }

    #[test]
    fn test_special_characters_render_literally() {
        let value = r#"it's "quoted" \t \\ $(whoami) %s {}"#;
        let env = Environment::from_vars([("TRICKY", value)]);

        let report = render(&BootConfig::default(), &env);
        assert!(report.contains(&format!("TRICKY={}\n", value)));
    }

    #[test]
    fn test_non_utf8_workflow_id_written_as_bytes() {
        let config = BootConfig {
            workflow_id: OsString::from_vec(vec![b'w', 0xff, b'f']),
            ..BootConfig::default()
        };

        let env = Environment::from_vars([("A", "1")]);

        let mut out = Vec::new();
        Diagnostics::new(&config, Path::new("/workspace"), &env)
            .write_to(&mut out)
            .unwrap();
        let line = out
            .split(|b| *b == b'\n')
            .find(|line| line.starts_with(b"WORKFLOW_ID: "))
            .unwrap();
        assert_eq!(line, b"WORKFLOW_ID: w\xfff");
    }

    #[test]
    fn test_json_report() {
        let config = BootConfig {
            shut_down: "1".to_string(),
            workflow_id: OsString::from("wf"),
            ..BootConfig::default()
        };
        let env = Environment::from_vars([("X", "y")]);

        let json = Diagnostics::new(&config, Path::new("/w"), &env).to_json();
        assert_eq!(json["working_dir"], "/w");
        assert_eq!(json["workflow_id"], "wf");
        assert_eq!(json["mode"], "shut_down_after_run");
        assert_eq!(json["browsers_path"], serde_json::Value::Null);
        assert_eq!(json["environment"][0], "X=y");
    }
}
