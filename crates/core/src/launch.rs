//! Turning an [`ApiEvent::ExecuteLaunch`](crate::ApiEvent::ExecuteLaunch) into a process.

use std::{
    env,
    path::{Path, PathBuf},
    process::{ExitStatus, Stdio},
};

use anyhow::{Context, Result};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use thiserror::Error;
use tokio::process::Command;
use tracing::info;

use crate::models::{Game, PlatformInfo};

static PLACEHOLDER_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\{(file\.path|file\.name|file\.basename|file\.dir|env\.[A-Za-z_][A-Za-z0-9_]*)\}")
        .expect("invalid placeholder regex")
});

/// Why a launch command could not be built.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LaunchError {
    /// Neither the game nor its platform defines a launch command.
    #[error("no launch command configured for `{0}`")]
    NoCommand(String),
    /// The command expanded to nothing.
    #[error("launch command for `{0}` is empty")]
    EmptyCommand(String),
    /// A double quote was opened but never closed.
    #[error("unterminated quote in launch command for `{0}`")]
    UnterminatedQuote(String),
}

/// A fully expanded command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchCommand {
    /// Executable to run.
    pub program: String,
    /// Arguments.
    pub args: Vec<String>,
    /// Working directory, if any.
    pub workdir: Option<PathBuf>,
}

impl LaunchCommand {
    /// Build the command for `game`.
    ///
    /// The game's own command wins over the platform template. Supported
    /// placeholders: `{file.path}`, `{file.name}`, `{file.basename}`,
    /// `{file.dir}` and `{env.NAME}`.
    pub fn resolve(platform: &PlatformInfo, game: &Game) -> Result<Self, LaunchError> {
        let template = game
            .metadata
            .launch
            .as_deref()
            .or(platform.launch.as_deref())
            .ok_or_else(|| LaunchError::NoCommand(game.title().to_string()))?;

        let file = game.primary_file();
        let mut parts = split_command(template)
            .ok_or_else(|| LaunchError::UnterminatedQuote(game.title().to_string()))?
            .into_iter()
            .map(|part| expand_placeholders(&part, file));
        let program = parts
            .next()
            .ok_or_else(|| LaunchError::EmptyCommand(game.title().to_string()))?;

        let workdir = game
            .metadata
            .workdir
            .clone()
            .or_else(|| game.primary_file().and_then(Path::parent).map(Path::to_path_buf));

        Ok(Self {
            program,
            args: parts.collect(),
            workdir,
        })
    }
}

/// Expand the placeholders of one already split argument; values are
/// inserted verbatim, spaces included.
fn expand_placeholders(template: &str, file: Option<&Path>) -> String {
    PLACEHOLDER_RE
        .replace_all(template, |caps: &Captures<'_>| {
            let name = &caps[1];
            if let Some(var) = name.strip_prefix("env.") {
                return env::var(var).unwrap_or_default();
            }
            let Some(file) = file else {
                return String::new();
            };
            let value = match name {
                "file.path" => Some(file.as_os_str()),
                "file.name" => file.file_name(),
                "file.basename" => file.file_stem(),
                "file.dir" => file.parent().map(Path::as_os_str),
                _ => None,
            };
            value.map(|v| v.to_string_lossy().into_owned()).unwrap_or_default()
        })
        .into_owned()
}

/// Split on whitespace, keeping double-quoted sections together.
/// Returns `None` on an unterminated quote.
fn split_command(command: &str) -> Option<Vec<String>> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut has_token = false;

    for ch in command.chars() {
        match ch {
            '"' => {
                in_quotes = !in_quotes;
                has_token = true;
            }
            c if c.is_whitespace() && !in_quotes => {
                if has_token {
                    parts.push(std::mem::take(&mut current));
                    has_token = false;
                }
            }
            c => {
                current.push(c);
                has_token = true;
            }
        }
    }
    if in_quotes {
        return None;
    }
    if has_token {
        parts.push(current);
    }
    Some(parts)
}

/// Default process collaborator: runs the command and waits for it to exit.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessLauncher;

impl ProcessLauncher {
    /// Run `command` to completion, inheriting stdio.
    pub async fn run(&self, command: &LaunchCommand) -> Result<ExitStatus> {
        info!(program = %command.program, args = ?command.args, "launching game");
        let mut process = Command::new(&command.program);
        process
            .args(&command.args)
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit());
        if let Some(dir) = &command.workdir {
            process.current_dir(dir);
        }

        let status = process
            .status()
            .await
            .with_context(|| format!("failed to execute {}", command.program))?;
        info!(%status, "game exited");
        Ok(status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn platform(launch: Option<&str>) -> PlatformInfo {
        PlatformInfo {
            short_name: "arcade".to_string(),
            name: None,
            launch: launch.map(str::to_string),
        }
    }

    fn game_with_file(path: &str) -> Game {
        let mut game = Game::new(path);
        game.add_file(path);
        game
    }

    #[test]
    fn expands_platform_template() {
        let game = game_with_file("/roms/arcade/pac man.zip");
        let command =
            LaunchCommand::resolve(&platform(Some("mame -rompath {file.dir} {file.basename}")), &game)
                .unwrap();
        assert_eq!(command.program, "mame");
        assert_eq!(command.args, ["-rompath", "/roms/arcade", "pac man"]);
        assert_eq!(command.workdir, Some(PathBuf::from("/roms/arcade")));
    }

    #[test]
    fn game_command_overrides_platform() {
        let mut game = game_with_file("/roms/nes/smb.nes");
        game.metadata.launch = Some("\"/opt/my emu/run\" {file.name}".to_string());
        game.metadata.workdir = Some(PathBuf::from("/opt"));
        let command = LaunchCommand::resolve(&platform(Some("other {file.path}")), &game).unwrap();
        assert_eq!(command.program, "/opt/my emu/run");
        assert_eq!(command.args, ["smb.nes"]);
        assert_eq!(command.workdir, Some(PathBuf::from("/opt")));
    }

    #[test]
    fn reports_missing_and_broken_commands() {
        let game = game_with_file("/roms/x.bin");
        assert!(matches!(
            LaunchCommand::resolve(&platform(None), &game),
            Err(LaunchError::NoCommand(_))
        ));
        assert!(matches!(
            LaunchCommand::resolve(&platform(Some("   ")), &game),
            Err(LaunchError::EmptyCommand(_))
        ));
        assert!(matches!(
            LaunchCommand::resolve(&platform(Some("emu \"{file.path}")), &game),
            Err(LaunchError::UnterminatedQuote(_))
        ));
    }

    #[test]
    fn quoted_placeholder_with_spaces_stays_one_argument() {
        let game = game_with_file("/roms/arcade/pac man.zip");
        let command =
            LaunchCommand::resolve(&platform(Some("emu \"{file.path}\" --name {file.name}")), &game)
                .unwrap();
        assert_eq!(command.program, "emu");
        assert_eq!(command.args, ["/roms/arcade/pac man.zip", "--name", "pac man.zip"]);
    }

    #[test]
    fn env_values_are_not_split() {
        std::env::set_var("GAMEDECK_TEST_EMU_FLAGS", "--full screen");
        let game = game_with_file("/roms/x.bin");
        let command =
            LaunchCommand::resolve(&platform(Some("emu {env.GAMEDECK_TEST_EMU_FLAGS}")), &game).unwrap();
        assert_eq!(command.args, ["--full screen"]);
    }

    #[test]
    fn keeps_empty_quoted_arguments() {
        assert_eq!(
            split_command(r#"emu "" --flag"#),
            Some(vec!["emu".to_string(), String::new(), "--flag".to_string()])
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn runs_process_and_reports_status() -> Result<()> {
        let command = LaunchCommand {
            program: "sh".to_string(),
            args: vec!["-c".to_string(), "exit 3".to_string()],
            workdir: None,
        };
        let status = ProcessLauncher.run(&command).await?;
        assert_eq!(status.code(), Some(3));
        Ok(())
    }
}
