//! Dashboard command palette and autocomplete.

#[derive(Debug, Clone)]
pub struct Command {
  pub name: &'static str,
  pub aliases: &'static [&'static str],
  pub description: &'static str,
}

pub const COMMANDS: &[Command] = &[
  Command {
    name: "pending",
    aliases: &["p", "queue"],
    description: "Entries waiting to sync",
  },
  Command {
    name: "entries",
    aliases: &["e", "recent"],
    description: "Recent entries on the server",
  },
  Command {
    name: "sync",
    aliases: &["s", "drain"],
    description: "Send pending entries now",
  },
  Command {
    name: "quit",
    aliases: &["q", "exit"],
    description: "Exit billable",
  },
];

/// Rank of `cmd` against `input`; lower is better, `None` is no match.
fn rank(cmd: &Command, input: &str) -> Option<u8> {
  let aliases = || cmd.aliases.iter();

  if cmd.name == input {
    Some(0)
  } else if aliases().any(|a| *a == input) {
    Some(1)
  } else if cmd.name.starts_with(input) {
    Some(2)
  } else if aliases().any(|a| a.starts_with(input)) {
    Some(3)
  } else if cmd.name.contains(input) {
    Some(4)
  } else if aliases().any(|a| a.contains(input)) {
    Some(5)
  } else {
    None
  }
}

/// Commands matching `input`, best match first.
pub fn get_suggestions(input: &str) -> Vec<&'static Command> {
  let input = input.trim().to_lowercase();
  if input.is_empty() {
    return COMMANDS.iter().collect();
  }

  let mut matches: Vec<_> = COMMANDS
    .iter()
    .filter_map(|cmd| rank(cmd, &input).map(|r| (cmd, r)))
    .collect();
  matches.sort_by_key(|(_, r)| *r);
  matches.into_iter().map(|(cmd, _)| cmd).collect()
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_empty_input_returns_all() {
    assert_eq!(get_suggestions("").len(), COMMANDS.len());
  }

  #[test]
  fn test_exact_and_alias_match() {
    assert_eq!(get_suggestions("sync")[0].name, "sync");
    assert_eq!(get_suggestions("drain")[0].name, "sync");
    assert_eq!(get_suggestions("q")[0].name, "quit");
  }

  #[test]
  fn test_prefix_beats_substring() {
    let suggestions = get_suggestions("en");
    assert_eq!(suggestions[0].name, "entries");
    assert!(suggestions.iter().any(|c| c.name == "pending"));
  }

  #[test]
  fn test_no_match() {
    assert!(get_suggestions("zzz").is_empty());
  }
}
