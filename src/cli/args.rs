//! Command-line argument parsing for forumkit.

use crate::error::{ForumError, Result};
use crate::forum::{NodeId, StickyScope, UserId};

/// Command-line interface commands
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    NewForum {
        title: String,
        parent: Option<NodeId>,
        category: bool,
    },
    NewTopic {
        forum: NodeId,
        title: String,
        content: String,
        tags: Vec<String>,
    },
    NewReply {
        topic: NodeId,
        content: String,
        reply_to: Option<NodeId>,
    },
    Trash {
        id: NodeId,
    },
    Untrash {
        id: NodeId,
    },
    Spam {
        id: NodeId,
    },
    Unspam {
        id: NodeId,
    },
    Delete {
        id: NodeId,
    },
    Close {
        id: NodeId,
    },
    Open {
        id: NodeId,
    },
    Stick {
        id: NodeId,
        scope: StickyScope,
    },
    Unstick {
        id: NodeId,
    },
    Move {
        topic: NodeId,
        forum: NodeId,
    },
    MoveForum {
        forum: NodeId,
        parent: Option<NodeId>,
    },
    Merge {
        source: NodeId,
        dest: NodeId,
        convert_original_post: bool,
        merge_tags: bool,
    },
    Split {
        topic: NodeId,
        pivot: NodeId,
        title: Option<String>,
        into: Option<NodeId>,
    },
    Show {
        id: NodeId,
    },
    Topics {
        forum: NodeId,
        cursor: Option<String>,
        limit: usize,
    },
    Recount,
    Help,
}

/// A parsed command line: global options plus the command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    /// `--as <user>`; falls back to `FORUMKIT_ACTOR` when absent.
    pub actor: Option<UserId>,
    pub command: Command,
}

fn usage_error(msg: impl Into<String>) -> ForumError {
    ForumError::invalid_input(msg.into())
}

fn parse_id(raw: &str, what: &str) -> Result<NodeId> {
    raw.trim_start_matches('#')
        .parse::<u64>()
        .map(NodeId)
        .map_err(|_| usage_error(format!("{} must be a numeric id, got '{}'", what, raw)))
}

/// Splits `--flag value` options from positional arguments.
struct Parsed {
    positional: Vec<String>,
    options: Vec<(String, Option<String>)>,
}

impl Parsed {
    fn flag(&self, name: &str) -> bool {
        self.options.iter().any(|(k, _)| k == name)
    }

    fn value(&self, name: &str) -> Option<&str> {
        self.options
            .iter()
            .rev()
            .find(|(k, _)| k == name)
            .and_then(|(_, v)| v.as_deref())
    }

    fn values(&self, name: &str) -> Vec<String> {
        self.options
            .iter()
            .filter(|(k, _)| k == name)
            .filter_map(|(_, v)| v.clone())
            .collect()
    }

    fn require(&self, index: usize, usage: &str) -> Result<&str> {
        self.positional
            .get(index)
            .map(String::as_str)
            .ok_or_else(|| usage_error(format!("Usage: forumkit {}", usage)))
    }
}

/// Options that take no value.
const SWITCHES: &[&str] = &["--category", "--no-convert", "--no-tags"];

fn split_options(args: &[String]) -> Result<Parsed> {
    let mut positional = Vec::new();
    let mut options = Vec::new();
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        if arg.starts_with("--") {
            if SWITCHES.contains(&arg.as_str()) {
                options.push((arg.clone(), None));
            } else {
                let value = iter
                    .next()
                    .ok_or_else(|| usage_error(format!("{} requires a value", arg)))?;
                options.push((arg.clone(), Some(value.clone())));
            }
        } else {
            positional.push(arg.clone());
        }
    }
    Ok(Parsed {
        positional,
        options,
    })
}

/// Parse the process arguments into an Invocation
pub fn parse_args() -> Result<Invocation> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    parse_from(&args)
}

/// Parse arguments (without the program name) into an Invocation
pub fn parse_from(args: &[String]) -> Result<Invocation> {
    let Some((name, rest)) = args.split_first() else {
        return Ok(Invocation {
            actor: None,
            command: Command::Help,
        });
    };
    let p = split_options(rest)?;

    let actor = match p.value("--as") {
        Some(raw) => Some(UserId(raw.parse().map_err(|_| {
            usage_error(format!("--as must be a numeric user id, got '{}'", raw))
        })?)),
        None => None,
    };

    let command = match name.as_str() {
        "new-forum" => Command::NewForum {
            title: p.require(0, "new-forum <title> [--parent <id>] [--category]")?.to_string(),
            parent: p.value("--parent").map(|v| parse_id(v, "parent")).transpose()?,
            category: p.flag("--category"),
        },
        "new-topic" => Command::NewTopic {
            forum: parse_id(p.require(0, "new-topic <forum> <title> <content> [--tag <t>]...")?, "forum")?,
            title: p.require(1, "new-topic <forum> <title> <content>")?.to_string(),
            content: p.require(2, "new-topic <forum> <title> <content>")?.to_string(),
            tags: p.values("--tag"),
        },
        "new-reply" => Command::NewReply {
            topic: parse_id(p.require(0, "new-reply <topic> <content> [--to <reply>]")?, "topic")?,
            content: p.require(1, "new-reply <topic> <content>")?.to_string(),
            reply_to: p.value("--to").map(|v| parse_id(v, "reply")).transpose()?,
        },
        "trash" | "untrash" | "spam" | "unspam" | "delete" | "close" | "open" | "unstick"
        | "show" => {
            let id = parse_id(p.require(0, &format!("{} <id>", name))?, "id")?;
            match name.as_str() {
                "trash" => Command::Trash { id },
                "untrash" => Command::Untrash { id },
                "spam" => Command::Spam { id },
                "unspam" => Command::Unspam { id },
                "delete" => Command::Delete { id },
                "close" => Command::Close { id },
                "open" => Command::Open { id },
                "unstick" => Command::Unstick { id },
                _ => Command::Show { id },
            }
        }
        "stick" => {
            let id = parse_id(p.require(0, "stick <topic> [--scope forum|global]")?, "topic")?;
            let scope = match p.value("--scope").unwrap_or("forum") {
                "forum" => StickyScope::Forum,
                "global" => StickyScope::Global,
                other => return Err(usage_error(format!("Unknown sticky scope '{}'", other))),
            };
            Command::Stick { id, scope }
        }
        "move" => Command::Move {
            topic: parse_id(p.require(0, "move <topic> <forum>")?, "topic")?,
            forum: parse_id(p.require(1, "move <topic> <forum>")?, "forum")?,
        },
        "move-forum" => {
            let forum = parse_id(p.require(0, "move-forum <forum> <parent|root>")?, "forum")?;
            let parent = match p.require(1, "move-forum <forum> <parent|root>")? {
                "root" => None,
                raw => Some(parse_id(raw, "parent")?),
            };
            Command::MoveForum { forum, parent }
        }
        "merge" => Command::Merge {
            source: parse_id(p.require(0, "merge <source> <dest>")?, "source")?,
            dest: parse_id(p.require(1, "merge <source> <dest>")?, "dest")?,
            convert_original_post: !p.flag("--no-convert"),
            merge_tags: !p.flag("--no-tags"),
        },
        "split" => Command::Split {
            topic: parse_id(p.require(0, "split <topic> <pivot> [--title <t>] [--into <topic>]")?, "topic")?,
            pivot: parse_id(p.require(1, "split <topic> <pivot>")?, "pivot")?,
            title: p.value("--title").map(str::to_string),
            into: p.value("--into").map(|v| parse_id(v, "into")).transpose()?,
        },
        "topics" => Command::Topics {
            forum: parse_id(p.require(0, "topics <forum> [--cursor <c>] [--limit <n>]")?, "forum")?,
            cursor: p.value("--cursor").map(str::to_string),
            limit: match p.value("--limit") {
                Some(raw) => raw
                    .parse()
                    .map_err(|_| usage_error(format!("--limit must be a number, got '{}'", raw)))?,
                None => 0,
            },
        },
        "recount" => Command::Recount,
        "help" | "--help" | "-h" => Command::Help,
        other => return Err(usage_error(format!("Unknown command '{}'", other))),
    };

    Ok(Invocation { actor, command })
}

/// Print usage information
pub fn print_usage() {
    println!("forumkit - forum/topic/reply lifecycle manager");
    println!("==============================================");
    println!();
    println!("Usage: forumkit <command> [args...] [--as <user>]");
    println!();
    println!("Commands:");
    println!("  new-forum <title> [--parent <id>] [--category]     Create a forum");
    println!("  new-topic <forum> <title> <content> [--tag <t>]... Create a topic");
    println!("  new-reply <topic> <content> [--to <reply>]         Reply to a topic");
    println!("  trash | untrash <id>                               Soft-delete or restore");
    println!("  spam | unspam <id>                                 Mark or clear spam");
    println!("  delete <id>                                        Permanently delete a subtree");
    println!("  close | open <topic>                               Close or reopen a topic");
    println!("  stick <topic> [--scope forum|global]               Pin a topic");
    println!("  unstick <topic>                                    Unpin a topic");
    println!("  move <topic> <forum>                               Move a topic");
    println!("  move-forum <forum> <parent|root>                   Reparent a forum");
    println!("  merge <source> <dest> [--no-convert] [--no-tags]   Merge two topics");
    println!("  split <topic> <pivot> [--title <t>] [--into <id>]  Split a topic at a reply");
    println!("  show <id>                                          Print a node as JSON");
    println!("  topics <forum> [--cursor <c>] [--limit <n>]        List a forum's topics");
    println!("  recount                                            Rebuild all aggregates");
    println!();
    println!("Environment:");
    println!("  FORUMKIT_DATA     data directory (default: forumkit_data)");
    println!("  FORUMKIT_ACTOR    acting user id when --as is absent");
    println!("  RUST_LOG          log filter (default: forumkit=info)");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_parse_new_topic_with_tags_and_actor() {
        let inv = parse_from(&args(&[
            "new-topic", "3", "Title", "Body", "--tag", "rust", "--as", "7", "--tag", "async",
        ]))
        .unwrap();
        assert_eq!(inv.actor, Some(UserId(7)));
        assert_eq!(
            inv.command,
            Command::NewTopic {
                forum: NodeId(3),
                title: "Title".into(),
                content: "Body".into(),
                tags: vec!["rust".into(), "async".into()],
            }
        );
    }

    #[test]
    fn test_parse_merge_switches() {
        let inv = parse_from(&args(&["merge", "#4", "5", "--no-convert"])).unwrap();
        assert_eq!(
            inv.command,
            Command::Merge {
                source: NodeId(4),
                dest: NodeId(5),
                convert_original_post: false,
                merge_tags: true,
            }
        );
    }

    #[test]
    fn test_parse_errors() {
        assert!(parse_from(&args(&["trash"])).is_err());
        assert!(parse_from(&args(&["trash", "abc"])).is_err());
        assert!(parse_from(&args(&["frobnicate"])).is_err());
        assert!(parse_from(&args(&["move", "1", "2", "--as"])).is_err());
        assert_eq!(parse_from(&[]).unwrap().command, Command::Help);
    }

    #[test]
    fn test_parse_move_forum_to_root() {
        let inv = parse_from(&args(&["move-forum", "9", "root"])).unwrap();
        assert_eq!(
            inv.command,
            Command::MoveForum {
                forum: NodeId(9),
                parent: None
            }
        );
    }
}
