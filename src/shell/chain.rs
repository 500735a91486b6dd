//! Locating a command within a top-level chain and splitting its
//! surroundings, used by rules that rewrite part of a RUN instruction.

use super::ast::{parse, CmdNode};
use super::{basename, Variant};

/// Where a matched command sits within a `&&`/`;` chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainPosition {
    /// Source text of the commands before the match, trimmed. Empty when
    /// the match leads the chain.
    pub preceding_commands: String,
    /// Source text of the commands after the match, trimmed.
    pub remaining_commands: String,
    /// True when the match is the only command in the script.
    pub is_standalone: bool,
}

/// Finds the first top-level command matching `predicate` (called with the
/// path-stripped name and the argument words) and splits the chain around
/// it. Returns `None` when nothing matches or the script does not parse.
pub fn find_command_in_chain<F>(script: &str, variant: Variant, predicate: F) -> Option<ChainPosition>
where
    F: Fn(&str, &[String]) -> bool,
{
    let parsed = parse(script, variant).ok()?;
    let items = &parsed.items;

    for (i, item) in items.iter().enumerate() {
        let matched = item.pipeline.segments.iter().any(|seg| match seg {
            CmdNode::Simple(cmd) => cmd.name().is_some_and(|name| {
                let args: Vec<String> =
                    cmd.words.iter().skip(1).map(|w| w.text.clone()).collect();
                predicate(basename(name), &args)
            }),
            _ => false,
        });
        if !matched {
            continue;
        }

        let preceding = if i == 0 {
            String::new()
        } else {
            script[items[0].start_byte..items[i - 1].end_byte]
                .trim()
                .to_string()
        };
        let remaining = if i + 1 >= items.len() {
            String::new()
        } else {
            script[items[i + 1].start_byte..items[items.len() - 1].end_byte]
                .trim()
                .to_string()
        };

        return Some(ChainPosition {
            is_standalone: items.len() == 1,
            preceding_commands: preceding,
            remaining_commands: remaining,
        });
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ln_predicate(name: &str, args: &[String]) -> bool {
        name == "ln" && args.iter().any(|a| a == "/bin/sh")
    }

    #[test]
    fn test_standalone() {
        let pos =
            find_command_in_chain("ln -sf /bin/bash /bin/sh", Variant::Bash, ln_predicate)
                .expect("expected match");
        assert!(pos.is_standalone);
        assert_eq!(pos.preceding_commands, "");
        assert_eq!(pos.remaining_commands, "");
    }

    #[test]
    fn test_at_end() {
        let pos = find_command_in_chain(
            "apt-get update && ln -sf /bin/bash /bin/sh",
            Variant::Bash,
            ln_predicate,
        )
        .expect("expected match");
        assert!(!pos.is_standalone);
        assert_eq!(pos.preceding_commands, "apt-get update");
        assert_eq!(pos.remaining_commands, "");
    }

    #[test]
    fn test_at_start() {
        let pos = find_command_in_chain(
            "ln -sf /bin/bash /bin/sh && echo done",
            Variant::Bash,
            ln_predicate,
        )
        .expect("expected match");
        assert_eq!(pos.preceding_commands, "");
        assert_eq!(pos.remaining_commands, "echo done");
    }

    #[test]
    fn test_in_middle() {
        let pos = find_command_in_chain(
            "apt-get update && ln -sf /bin/bash /bin/sh && echo done",
            Variant::Bash,
            ln_predicate,
        )
        .expect("expected match");
        assert_eq!(pos.preceding_commands, "apt-get update");
        assert_eq!(pos.remaining_commands, "echo done");
    }

    #[test]
    fn test_no_match() {
        assert!(find_command_in_chain("echo hi", Variant::Bash, ln_predicate).is_none());
    }
}
