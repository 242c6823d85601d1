//! Line-oriented control console.
//!
//! Accepts short commands (`toggle clock off`) or a raw JSON command object
//! and prints every answer as pretty JSON.

use crate::stats::StatsSampler;
use nxui_engine::{Command, CommandRouter};
use serde_json::Value;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};

const HELP: &str = "\
Commands:
  list                              List loaded widgets
  toggle <id> on|off                Enable or disable a widget
  drag <id>                         Flip drag mode
  opacity <id> <0.1-1.0>            Set opacity
  reload <id>                       Reload from disk
  get <id> <key>                    Read a setting
  set <id> <key> <json>             Write a setting
  profiles                          List saved profiles
  profile save|apply|delete|show <name>
  hide-all | show-all | toggle-all  Batch visibility
  themes | theme <id>               List or switch themes
  registry                          Browse the widget store
  install <id> | uninstall <id>     Manage store widgets
  stats                             Host CPU/RAM/uptime
  help | exit
A JSON object such as {\"command\": \"list\"} is also accepted.";

#[derive(Debug, Clone, PartialEq)]
pub enum ConsoleInput {
    Command(Command),
    Stats,
    Help,
    Exit,
    Empty,
}

fn arg<'a>(args: &[&'a str], index: usize, usage: &str) -> Result<&'a str, String> {
    args.get(index)
        .copied()
        .ok_or_else(|| format!("usage: {usage}"))
}

pub fn parse_line(line: &str) -> Result<ConsoleInput, String> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(ConsoleInput::Empty);
    }
    if line.starts_with('{') {
        return serde_json::from_str::<Command>(line)
            .map(ConsoleInput::Command)
            .map_err(|e| format!("Invalid command: {e}"));
    }

    let words: Vec<&str> = line.split_whitespace().collect();
    let (head, args) = (words[0], &words[1..]);
    let id = |usage: &str| arg(args, 0, usage).map(str::to_string);

    let command = match head {
        "exit" | "quit" => return Ok(ConsoleInput::Exit),
        "help" => return Ok(ConsoleInput::Help),
        "stats" => return Ok(ConsoleInput::Stats),
        "list" => Command::List,
        "toggle" => {
            let usage = "toggle <id> on|off";
            let enabled = match arg(args, 1, usage)? {
                "on" | "true" => true,
                "off" | "false" => false,
                other => return Err(format!("expected on or off, got \"{other}\"")),
            };
            Command::Toggle {
                id: id(usage)?,
                enabled,
            }
        }
        "drag" => Command::ToggleDrag { id: id("drag <id>")? },
        "opacity" => {
            let usage = "opacity <id> <value>";
            let opacity = arg(args, 1, usage)?
                .parse::<f64>()
                .map_err(|e| format!("invalid opacity: {e}"))?;
            Command::SetOpacity {
                id: id(usage)?,
                opacity,
            }
        }
        "reload" => Command::Reload { id: id("reload <id>")? },
        "get" => {
            let usage = "get <id> <key>";
            Command::GetSetting {
                id: id(usage)?,
                key: arg(args, 1, usage)?.to_string(),
            }
        }
        "set" => {
            let usage = "set <id> <key> <json>";
            let raw = args.get(2..).map(|rest| rest.join(" ")).unwrap_or_default();
            if raw.is_empty() {
                return Err(format!("usage: {usage}"));
            }
            // Bare words are taken as strings.
            let value = serde_json::from_str(&raw).unwrap_or(Value::String(raw));
            Command::SetSetting {
                id: id(usage)?,
                key: arg(args, 1, usage)?.to_string(),
                value,
            }
        }
        "profiles" => Command::ListProfiles,
        "profile" => {
            let usage = "profile save|apply|delete|show <name>";
            let name = arg(args, 1, usage)?.to_string();
            match arg(args, 0, usage)? {
                "save" => Command::SaveProfile { name },
                "apply" => Command::ApplyProfile { name },
                "delete" => Command::DeleteProfile { name },
                "show" => Command::GetProfile { name },
                _ => return Err(format!("usage: {usage}")),
            }
        }
        "hide-all" => Command::HideAll,
        "show-all" => Command::ShowAll,
        "toggle-all" => Command::ToggleAll,
        "themes" => Command::ListThemes,
        "theme" => Command::SetTheme { id: id("theme <id>")? },
        "registry" => Command::Registry,
        "install" => Command::Install { id: id("install <id>")? },
        "uninstall" => Command::Uninstall { id: id("uninstall <id>")? },
        other => return Err(format!("unknown command \"{other}\" (try help)")),
    };
    Ok(ConsoleInput::Command(command))
}

fn pretty(value: &impl serde::Serialize) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|e| format!("{{\"error\": \"{e}\"}}"))
}

pub struct Console {
    router: CommandRouter,
    sampler: StatsSampler,
}

impl Console {
    pub fn new(router: CommandRouter) -> Self {
        Self {
            router,
            sampler: StatsSampler::new(),
        }
    }

    pub fn router(&self) -> &CommandRouter {
        &self.router
    }

    /// Handle one line. Returns `None` when the console should exit.
    pub async fn handle_line(&mut self, line: &str) -> Option<String> {
        match parse_line(line) {
            Ok(ConsoleInput::Exit) => None,
            Ok(ConsoleInput::Empty) => Some(String::new()),
            Ok(ConsoleInput::Help) => Some(HELP.to_string()),
            Ok(ConsoleInput::Stats) => Some(pretty(&self.sampler.sample().await)),
            Ok(ConsoleInput::Command(command)) => Some(pretty(&self.router.execute(command).await)),
            Err(message) => Some(pretty(&serde_json::json!({
                "success": false,
                "error": message,
            }))),
        }
    }

    /// Read lines until `exit` or end of input.
    pub async fn run<R: AsyncBufRead + Unpin>(&mut self, input: R) -> std::io::Result<()> {
        let mut lines = input.lines();
        while let Some(line) = lines.next_line().await? {
            match self.handle_line(&line).await {
                Some(output) if output.is_empty() => {}
                Some(output) => println!("{output}"),
                None => break,
            }
        }
        Ok(())
    }
}
