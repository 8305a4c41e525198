use thiserror::Error;

/// Команда интерактивной консоли.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    Subscribe {
        name: String,
        channel: Option<String>,
    },
    Unsubscribe {
        name: String,
        channel: Option<String>,
    },
    Publish {
        channel: Option<String>,
        text: String,
    },
    Stop {
        channel: Option<String>,
    },
    Stats,
    Help,
    Quit,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CommandParseError {
    #[error("unknown command '{0}', type 'help'")]
    Unknown(String),
    #[error("usage: {0}")]
    Usage(&'static str),
}

pub const HELP: &str = "\
Commands:
  sub <name> [channel]      subscribe named subscriber (creates it on first use)
  unsub <name> [channel]    unsubscribe named subscriber
  pub <channel|/> <text>    publish text; '/' is the root channel
  stop <channel>            stop channel node with its subtree
  stats                     hub counters
  help                      this text
  quit                      shut down and exit";

/// Разбирает строку ввода. Пустая строка даёт `Ok(None)`.
pub fn parse_command(line: &str) -> Result<Option<ConsoleCommand>, CommandParseError> {
    let Some((word, rest)) = next_token(line) else {
        return Ok(None);
    };

    let cmd = match word.to_ascii_lowercase().as_str() {
        "sub" | "subscribe" => {
            let (name, channel) =
                name_and_channel(rest).ok_or(CommandParseError::Usage("sub <name> [channel]"))?;
            ConsoleCommand::Subscribe { name, channel }
        }
        "unsub" | "unsubscribe" => {
            let (name, channel) = name_and_channel(rest)
                .ok_or(CommandParseError::Usage("unsub <name> [channel]"))?;
            ConsoleCommand::Unsubscribe { name, channel }
        }
        "pub" | "publish" => {
            let usage = CommandParseError::Usage("pub <channel|/> <text>");
            let (channel, text) = next_token(rest).ok_or(usage.clone())?;
            let text = text.trim();
            if text.is_empty() {
                return Err(usage);
            }
            ConsoleCommand::Publish {
                channel: channel_arg(channel),
                text: text.to_string(),
            }
        }
        "stop" => {
            let (channel, tail) =
                next_token(rest).ok_or(CommandParseError::Usage("stop <channel>"))?;
            if !tail.trim().is_empty() {
                return Err(CommandParseError::Usage("stop <channel>"));
            }
            ConsoleCommand::Stop {
                channel: channel_arg(channel),
            }
        }
        "stats" => ConsoleCommand::Stats,
        "help" | "?" => ConsoleCommand::Help,
        "quit" | "exit" => ConsoleCommand::Quit,
        other => return Err(CommandParseError::Unknown(other.to_string())),
    };

    Ok(Some(cmd))
}

fn next_token(input: &str) -> Option<(&str, &str)> {
    let input = input.trim_start();
    if input.is_empty() {
        return None;
    }
    match input.find(char::is_whitespace) {
        Some(i) => Some((&input[..i], &input[i..])),
        None => Some((input, "")),
    }
}

fn name_and_channel(rest: &str) -> Option<(String, Option<String>)> {
    let (name, rest) = next_token(rest)?;
    let channel = match next_token(rest) {
        Some((channel, tail)) if tail.trim().is_empty() => channel_arg(channel),
        Some(_) => return None,
        None => None,
    };
    Some((name.to_string(), channel))
}

/// `/` в консоли обозначает корень.
fn channel_arg(raw: &str) -> Option<String> {
    if raw == "/" {
        None
    } else {
        Some(raw.to_string())
    }
}
