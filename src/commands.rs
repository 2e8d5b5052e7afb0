//! Available console commands, autocomplete and parsing
use color_eyre::{eyre::eyre, Result};

use crate::query::QueryKey;

#[derive(Debug, Clone)]
pub struct Command {
  pub name: &'static str,
  pub aliases: &'static [&'static str],
  pub usage: &'static str,
  pub description: &'static str,
}

/// All available commands
pub const COMMANDS: &[Command] = &[
  Command {
    name: "hover-show",
    aliases: &["show", "hs"],
    usage: "hover-show <slug>",
    description: "Prefetch a show page as if its link was hovered",
  },
  Command {
    name: "hover-page",
    aliases: &["page", "hp"],
    usage: "hover-page <page>",
    description: "Prefetch CMS copy for a page",
  },
  Command {
    name: "preload",
    aliases: &["img", "image"],
    usage: "preload <url>...",
    description: "Preload one or more images",
  },
  Command {
    name: "invalidate",
    aliases: &["inv", "stale"],
    usage: "invalidate <segment>...",
    description: "Mark cached entries under a key prefix stale",
  },
  Command {
    name: "refetch",
    aliases: &["rf"],
    usage: "refetch <segment>...",
    description: "Invalidate a key prefix and refetch it now",
  },
  Command {
    name: "clear",
    aliases: &["reset"],
    usage: "clear",
    description: "Forget every cached response and preloaded image",
  },
  Command {
    name: "sync",
    aliases: &["sync-courses"],
    usage: "sync",
    description: "Trigger the course catalogue sync gate",
  },
  Command {
    name: "status",
    aliases: &["st", "ls"],
    usage: "status",
    description: "Show cache, scheduler and gate state",
  },
  Command {
    name: "help",
    aliases: &["h", "?"],
    usage: "help",
    description: "List commands",
  },
  Command {
    name: "quit",
    aliases: &["q", "exit"],
    usage: "quit",
    description: "Exit limelight",
  },
];

/// A parsed console line
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
  HoverShow(String),
  HoverPage(String),
  Preload(Vec<String>),
  Invalidate { prefix: QueryKey, refetch: bool },
  Clear,
  Sync,
  Status,
  Help,
  Quit,
}

/// How closely `cmd` matches a lowercased `input`. Lower ranks match better;
/// names beat aliases at each level.
fn match_rank(cmd: &Command, input: &str) -> Option<u8> {
  let levels: [fn(&str, &str) -> bool; 3] = [
    |word, input| word == input,
    |word, input| word.starts_with(input),
    |word, input| word.contains(input),
  ];

  levels.iter().zip((0u8..).step_by(2)).find_map(|(matches, rank)| {
    if matches(cmd.name, input) {
      Some(rank)
    } else if cmd.aliases.iter().any(|alias| matches(alias, input)) {
      Some(rank + 1)
    } else {
      None
    }
  })
}

/// Commands matching `input`, best match first. Empty input lists them all.
pub fn get_suggestions(input: &str) -> Vec<&'static Command> {
  let input = input.to_lowercase();
  let mut ranked: Vec<(u8, &'static Command)> = COMMANDS
    .iter()
    .filter_map(|cmd| match_rank(cmd, &input).map(|rank| (rank, cmd)))
    .collect();

  ranked.sort_by_key(|(rank, _)| *rank);
  ranked.into_iter().map(|(_, cmd)| cmd).collect()
}

/// Parse one console line, resolving the command word through autocomplete.
pub fn parse(line: &str) -> Result<Action> {
  let mut words = line.split_whitespace();
  let word = words.next().ok_or_else(|| eyre!("Empty command"))?;
  let args: Vec<String> = words.map(str::to_string).collect();

  let cmd = get_suggestions(word)
    .into_iter()
    .next()
    .ok_or_else(|| eyre!("Unknown command: {} (try help)", word))?;

  let single = |args: Vec<String>| -> Result<String> {
    match args.as_slice() {
      [one] => Ok(one.clone()),
      _ => Err(eyre!("Usage: {}", cmd.usage)),
    }
  };

  match cmd.name {
    "hover-show" => single(args).map(Action::HoverShow),
    "hover-page" => single(args).map(Action::HoverPage),
    "preload" if !args.is_empty() => Ok(Action::Preload(args)),
    "invalidate" | "refetch" if !args.is_empty() => Ok(Action::Invalidate {
      prefix: QueryKey::new(args),
      refetch: cmd.name == "refetch",
    }),
    "clear" => Ok(Action::Clear),
    "sync" => Ok(Action::Sync),
    "status" => Ok(Action::Status),
    "help" => Ok(Action::Help),
    "quit" => Ok(Action::Quit),
    _ => Err(eyre!("Usage: {}", cmd.usage)),
  }
}
