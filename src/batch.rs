/*!
 * Batch command parsing for `bagrouter run`
 *
 * One command per line; blank lines are skipped and a token starting with
 * `#` begins a comment.
 *
 * ```text
 * scan BAG1 G1            # regular lane
 * scan BAG2 G1 priority   # priority lane
 * scan BAG3 -             # no gate tag
 * next G1
 * count G1
 * view G1
 * manual
 * buffer
 * gates
 * stats
 * ```
 */

use thiserror::Error;

/// A single parsed batch command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchCommand {
    Scan {
        bag_id: String,
        gate: Option<String>,
        priority: bool,
    },
    Next {
        gate: String,
    },
    Count {
        gate: String,
    },
    View {
        gate: String,
    },
    Manual,
    Buffer,
    Gates,
    Stats,
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum BatchParseError {
    #[error("unknown command '{0}'")]
    UnknownCommand(String),

    #[error("'{command}' expects {expected}")]
    Arity {
        command: &'static str,
        expected: &'static str,
    },

    #[error("unrecognized scan flag '{0}' (expected 'priority')")]
    BadFlag(String),
}

/// Marker for a missing gate tag in batch input
pub const MISSING_GATE: &str = "-";

impl BatchCommand {
    /// Parse one line. Returns `Ok(None)` for blank lines and comments.
    pub fn parse(line: &str) -> Result<Option<Self>, BatchParseError> {
        // `#` opens a comment only at the start of a token; bag IDs may contain it
        let tokens: Vec<&str> = line
            .split_whitespace()
            .take_while(|token| !token.starts_with('#'))
            .collect();
        let Some((&command, args)) = tokens.split_first() else {
            return Ok(None);
        };

        let gate_arg = |name: &'static str| match args {
            [gate] => Ok(gate.to_string()),
            _ => Err(BatchParseError::Arity {
                command: name,
                expected: "exactly one gate",
            }),
        };
        let no_args = |name: &'static str| {
            if args.is_empty() {
                Ok(())
            } else {
                Err(BatchParseError::Arity {
                    command: name,
                    expected: "no arguments",
                })
            }
        };

        let parsed = match command.to_ascii_lowercase().as_str() {
            "scan" => Self::parse_scan(args)?,
            "next" => BatchCommand::Next {
                gate: gate_arg("next")?,
            },
            "count" => BatchCommand::Count {
                gate: gate_arg("count")?,
            },
            "view" => BatchCommand::View {
                gate: gate_arg("view")?,
            },
            "manual" => {
                no_args("manual")?;
                BatchCommand::Manual
            }
            "buffer" => {
                no_args("buffer")?;
                BatchCommand::Buffer
            }
            "gates" => {
                no_args("gates")?;
                BatchCommand::Gates
            }
            "stats" => {
                no_args("stats")?;
                BatchCommand::Stats
            }
            _ => return Err(BatchParseError::UnknownCommand(command.to_string())),
        };

        Ok(Some(parsed))
    }

    fn parse_scan(args: &[&str]) -> Result<Self, BatchParseError> {
        let (bag_id, rest) = args.split_first().ok_or(BatchParseError::Arity {
            command: "scan",
            expected: "a bag ID, optional gate and optional 'priority'",
        })?;

        let gate = rest
            .first()
            .filter(|g| **g != MISSING_GATE)
            .map(|g| g.to_string());

        let priority = match rest.get(1..).unwrap_or_default() {
            [] => false,
            [flag] if flag.eq_ignore_ascii_case("priority") || *flag == "-p" => true,
            [flag] => return Err(BatchParseError::BadFlag(flag.to_string())),
            _ => {
                return Err(BatchParseError::Arity {
                    command: "scan",
                    expected: "at most a gate and a 'priority' flag",
                })
            }
        };

        Ok(BatchCommand::Scan {
            bag_id: bag_id.to_string(),
            gate,
            priority,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scan(bag: &str, gate: Option<&str>, priority: bool) -> BatchCommand {
        BatchCommand::Scan {
            bag_id: bag.to_string(),
            gate: gate.map(str::to_string),
            priority,
        }
    }

    #[test]
    fn test_blank_and_comment_lines() {
        assert_eq!(BatchCommand::parse("").unwrap(), None);
        assert_eq!(BatchCommand::parse("   ").unwrap(), None);
        assert_eq!(BatchCommand::parse("# just a comment").unwrap(), None);
    }

    #[test]
    fn test_scan_forms() {
        assert_eq!(
            BatchCommand::parse("scan BAG1 G1").unwrap(),
            Some(scan("BAG1", Some("G1"), false))
        );
        assert_eq!(
            BatchCommand::parse("scan BAG2 G1 priority").unwrap(),
            Some(scan("BAG2", Some("G1"), true))
        );
        assert_eq!(
            BatchCommand::parse("SCAN BAG3 - PRIORITY  # no tag").unwrap(),
            Some(scan("BAG3", None, true))
        );
        assert_eq!(
            BatchCommand::parse("scan BAG4").unwrap(),
            Some(scan("BAG4", None, false))
        );
    }

    #[test]
    fn test_hash_inside_bag_id() {
        assert_eq!(
            BatchCommand::parse("scan BAG#1 G1").unwrap(),
            Some(scan("BAG#1", Some("G1"), false))
        );
        assert_eq!(
            BatchCommand::parse("scan BAG#2 G#2 priority #rush").unwrap(),
            Some(scan("BAG#2", Some("G#2"), true))
        );
        assert_eq!(
            BatchCommand::parse("next G1 #drain").unwrap(),
            Some(BatchCommand::Next {
                gate: "G1".to_string()
            })
        );
    }

    #[test]
    fn test_scan_errors() {
        assert!(matches!(
            BatchCommand::parse("scan"),
            Err(BatchParseError::Arity { command: "scan", .. })
        ));
        assert_eq!(
            BatchCommand::parse("scan BAG1 G1 urgent"),
            Err(BatchParseError::BadFlag("urgent".to_string()))
        );
        assert!(BatchCommand::parse("scan BAG1 G1 priority extra").is_err());
    }

    #[test]
    fn test_gate_commands() {
        assert_eq!(
            BatchCommand::parse("next G1").unwrap(),
            Some(BatchCommand::Next {
                gate: "G1".to_string()
            })
        );
        assert_eq!(
            BatchCommand::parse("view G2").unwrap(),
            Some(BatchCommand::View {
                gate: "G2".to_string()
            })
        );
        assert!(BatchCommand::parse("count").is_err());
        assert!(BatchCommand::parse("next G1 G2").is_err());
    }

    #[test]
    fn test_listing_commands() {
        assert_eq!(BatchCommand::parse("manual").unwrap(), Some(BatchCommand::Manual));
        assert_eq!(BatchCommand::parse("buffer").unwrap(), Some(BatchCommand::Buffer));
        assert_eq!(BatchCommand::parse("gates").unwrap(), Some(BatchCommand::Gates));
        assert_eq!(BatchCommand::parse("stats").unwrap(), Some(BatchCommand::Stats));
        assert!(BatchCommand::parse("manual now").is_err());
    }

    #[test]
    fn test_unknown_command() {
        assert_eq!(
            BatchCommand::parse("teleport BAG1"),
            Err(BatchParseError::UnknownCommand("teleport".to_string()))
        );
    }
}
