//! Line-oriented event script read by `steady run`.
//!
//! Each non-empty line is one command; `#` starts a comment.
//!
//! ```text
//! key ctrl down
//! mouse left down
//! wait 250
//! mouse left up
//! ```

use std::str::FromStr;
use std::time::Duration;

use steady_core::{InputEvent, PointerButton};

#[derive(Debug, Clone, PartialEq)]
pub enum ScriptCommand {
    /// Publish an input event on the bus.
    Input(InputEvent),
    Enable(bool),
    Wait(Duration),
    IntervalMs(f64),
    Reduction(u8),
    Modifier(String),
    Load(String),
}

fn parse_edge(word: Option<&str>) -> Result<bool, String> {
    match word {
        Some("down" | "press" | "pressed") => Ok(true),
        Some("up" | "release" | "released") => Ok(false),
        Some(other) => Err(format!("expected 'down' or 'up', got '{other}'")),
        None => Err("missing 'down' or 'up'".to_string()),
    }
}

fn parse_arg<T: FromStr>(word: Option<&str>, what: &str) -> Result<T, String> {
    let word = word.ok_or_else(|| format!("missing {what}"))?;
    word.parse().map_err(|_| format!("invalid {what} '{word}'"))
}

impl FromStr for ScriptCommand {
    type Err = String;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut words = line.split_whitespace();
        let verb = words.next().ok_or("empty command")?;
        let cmd = match verb.to_ascii_lowercase().as_str() {
            "mouse" => {
                let button: PointerButton = words.next().ok_or("missing button")?.parse()?;
                let pressed = parse_edge(words.next())?;
                ScriptCommand::Input(InputEvent::Button { button, pressed })
            }
            "key" => {
                let key = words.next().ok_or("missing key name")?.to_string();
                let pressed = parse_edge(words.next())?;
                ScriptCommand::Input(InputEvent::Key { key, pressed })
            }
            "enable" => ScriptCommand::Enable(true),
            "disable" => ScriptCommand::Enable(false),
            "wait" => {
                let ms: u64 = parse_arg(words.next(), "milliseconds")?;
                ScriptCommand::Wait(Duration::from_millis(ms))
            }
            "interval" => ScriptCommand::IntervalMs(parse_arg(words.next(), "interval")?),
            "reduction" => ScriptCommand::Reduction(parse_arg(words.next(), "percentage")?),
            // no argument clears the modifier
            "modifier" => ScriptCommand::Modifier(words.next().unwrap_or("").to_string()),
            "load" => ScriptCommand::Load(words.next().ok_or("missing profile name")?.to_string()),
            other => return Err(format!("unknown command '{other}'")),
        };
        if let Some(extra) = words.next() {
            return Err(format!("unexpected '{extra}'"));
        }
        Ok(cmd)
    }
}

/// Parse one script line. `Ok(None)` for blank lines and comments.
pub fn parse_line(line: &str) -> Result<Option<ScriptCommand>, String> {
    let line = line.split('#').next().unwrap_or("").trim();
    if line.is_empty() {
        return Ok(None);
    }
    line.parse().map(Some)
}
