//! Structured view of a single command invocation found in a script.

/// A command invocation extracted by `find_commands`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandInfo {
    /// Program name, path-stripped (`/usr/bin/wget` → `wget`).
    pub name: String,
    /// Arguments after the program name.
    pub args: Vec<String>,
    /// First non-flag argument (`apt-get install …` → `install`).
    pub subcommand: Option<String>,
    /// Index of the subcommand within `args`.
    pub subcommand_position: Option<usize>,
    /// 1-based line within the script where the command starts.
    pub start_line: usize,
    /// 0-based column within that line.
    pub start_col: usize,
}

impl CommandInfo {
    /// Checks for a flag in any of its spellings: long (`--yes`, also
    /// matching `--yes=value`), short (`-y`, also matching combined short
    /// runs like `-yq`), or a bare letter (`y`, treated as short).
    pub fn has_flag(&self, flag: &str) -> bool {
        if let Some(long) = flag.strip_prefix("--") {
            return self.args.iter().any(|a| {
                a.strip_prefix("--")
                    .map(|rest| rest == long || rest.strip_prefix(long).is_some_and(|r| r.starts_with('=')))
                    .unwrap_or(false)
            });
        }
        let short = flag.strip_prefix('-').unwrap_or(flag);
        if short.len() != 1 {
            return false;
        }
        let c = short.chars().next().unwrap();
        self.args
            .iter()
            .any(|a| a.starts_with('-') && !a.starts_with("--") && a[1..].contains(c))
    }

    /// True when any of the given flags is present.
    pub fn has_any_flag(&self, flags: &[&str]) -> bool {
        flags.iter().any(|f| self.has_flag(f))
    }

    /// Counts flag occurrences. Combined short runs count per character:
    /// `-qq` counts twice for `-q`.
    pub fn count_flag(&self, flag: &str) -> usize {
        if let Some(long) = flag.strip_prefix("--") {
            return self
                .args
                .iter()
                .filter(|a| {
                    a.strip_prefix("--")
                        .map(|rest| rest == long)
                        .unwrap_or(false)
                })
                .count();
        }
        let short = flag.strip_prefix('-').unwrap_or(flag);
        if short.len() != 1 {
            return 0;
        }
        let c = short.chars().next().unwrap();
        self.args
            .iter()
            .filter(|a| a.starts_with('-') && !a.starts_with("--"))
            .map(|a| a[1..].chars().filter(|&x| x == c).count())
            .sum()
    }

    /// Returns the value of `--flag=value`, `--flag value`, or `-f value`.
    pub fn get_arg_value(&self, flag: &str) -> Option<&str> {
        if let Some(long) = flag.strip_prefix("--") {
            let eq_prefix = format!("--{long}=");
            for (i, arg) in self.args.iter().enumerate() {
                if let Some(v) = arg.strip_prefix(&eq_prefix) {
                    return Some(v);
                }
                if arg == flag {
                    return self.args.get(i + 1).map(|s| s.as_str());
                }
            }
            return None;
        }
        for (i, arg) in self.args.iter().enumerate() {
            if arg == flag {
                return self.args.get(i + 1).map(|s| s.as_str());
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cmd(args: &[&str]) -> CommandInfo {
        CommandInfo {
            name: "test".to_string(),
            args: args.iter().map(|s| s.to_string()).collect(),
            ..CommandInfo::default()
        }
    }

    #[test]
    fn test_has_flag_short() {
        let c = cmd(&["-y", "install", "curl"]);
        assert!(c.has_flag("-y"));
        assert!(c.has_flag("y"));
        assert!(!c.has_flag("-q"));
    }

    #[test]
    fn test_has_flag_combined_short() {
        let c = cmd(&["-yq", "install", "curl"]);
        assert!(c.has_flag("-y"));
        assert!(c.has_flag("-q"));
        assert!(!c.has_flag("-z"));
    }

    #[test]
    fn test_has_flag_long() {
        let c = cmd(&["--yes", "install"]);
        assert!(c.has_flag("--yes"));
        assert!(!c.has_flag("-y"));

        let c = cmd(&["--assume-yes", "install"]);
        assert!(c.has_flag("--assume-yes"));
    }

    #[test]
    fn test_has_flag_long_with_value() {
        let c = cmd(&["--quiet=2", "install"]);
        assert!(c.has_flag("--quiet"));
        assert!(!c.has_flag("--qui"));
    }

    #[test]
    fn test_has_any_flag() {
        let c = cmd(&["--yes", "install"]);
        assert!(c.has_any_flag(&["-y", "--yes"]));
        assert!(!cmd(&["install"]).has_any_flag(&["-y", "--yes"]));
        // -qq is a CountFlag concern, not HasAnyFlag.
        assert!(!cmd(&["-qq", "install"]).has_any_flag(&["-y", "--yes"]));
    }

    #[test]
    fn test_count_flag() {
        assert_eq!(cmd(&["-q", "install"]).count_flag("-q"), 1);
        assert_eq!(cmd(&["-q", "-q", "install"]).count_flag("-q"), 2);
        assert_eq!(cmd(&["-qq", "install"]).count_flag("-q"), 2);
        assert_eq!(cmd(&["install"]).count_flag("-q"), 0);
        assert_eq!(cmd(&["--quiet", "--quiet"]).count_flag("--quiet"), 2);
    }

    #[test]
    fn test_get_arg_value() {
        let c = cmd(&["-o", "out.tar", "http://x"]);
        assert_eq!(c.get_arg_value("-o"), Some("out.tar"));

        let c = cmd(&["--output", "out.tar"]);
        assert_eq!(c.get_arg_value("--output"), Some("out.tar"));

        let c = cmd(&["--output=out.tar"]);
        assert_eq!(c.get_arg_value("--output"), Some("out.tar"));

        assert_eq!(cmd(&["install"]).get_arg_value("-o"), None);
    }
}
