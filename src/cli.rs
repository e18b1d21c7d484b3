//! CLI assembly.
//!
//! Commands register by dotted name with metadata; [`CommandTree`] nests
//! them into a tree keyed on the dots (`logs.tail` hangs under `logs`).
//! The core owns registration and lookup only — binding the tree to a
//! flag-parsing library is the embedding application's concern.

use foundation_core::{AttributeMap, Result};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Conventional process exit codes for command execution.
pub mod exit_code {
    /// The command succeeded.
    pub const SUCCESS: i32 = 0;
    /// The command failed.
    pub const ERROR: i32 = 1;
    /// The command was invoked incorrectly.
    pub const MISUSE: i32 = 2;
    /// The command was cancelled (SIGINT semantics).
    pub const INTERRUPTED: i32 = 130;
}

/// The callable behind a command. Receives the positional arguments and
/// returns an exit code.
pub type CommandAction = Arc<dyn Fn(&[String]) -> i32 + Send + Sync>;

/// Presentation metadata attached at registration.
#[derive(Debug, Clone, Default)]
pub struct CommandInfo {
    /// One-line description shown in listings.
    pub description: String,
    /// Alternate names resolving to this command.
    pub aliases: Vec<String>,
    /// Grouping category for listings.
    pub category: Option<String>,
    /// Hidden commands are invocable but left out of listings.
    pub hidden: bool,
}

impl CommandInfo {
    /// Metadata with just a description.
    pub fn new(description: impl Into<String>) -> Self {
        CommandInfo {
            description: description.into(),
            ..Default::default()
        }
    }

    /// Adds an alias.
    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.aliases.push(alias.into());
        self
    }

    /// Sets the category.
    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    /// Hides the command from listings.
    pub fn hidden(mut self) -> Self {
        self.hidden = true;
        self
    }

    /// The registry metadata map for this command.
    pub fn to_metadata(&self) -> AttributeMap {
        let mut metadata = AttributeMap::new();
        metadata.insert("description", self.description.as_str());
        if let Some(category) = &self.category {
            metadata.insert("category", category.as_str());
        }
        metadata.insert("hidden", self.hidden);
        metadata
    }
}

/// A command as stored in the command registry.
#[derive(Clone)]
pub struct RegisteredCommand {
    /// The full dotted name.
    pub name: String,
    /// Presentation metadata.
    pub info: CommandInfo,
    /// The callable.
    pub action: CommandAction,
}

impl RegisteredCommand {
    /// Invokes the command.
    pub fn run(&self, args: &[String]) -> i32 {
        (self.action)(args)
    }
}

impl fmt::Debug for RegisteredCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegisteredCommand")
            .field("name", &self.name)
            .field("aliases", &self.info.aliases)
            .field("hidden", &self.info.hidden)
            .finish()
    }
}

/// One node of the command tree: possibly a command itself, possibly a
/// group of children, often both.
#[derive(Debug, Default)]
pub struct CommandNode {
    command: Option<RegisteredCommand>,
    children: BTreeMap<String, CommandNode>,
}

impl CommandNode {
    /// The command at this node, if one is registered here.
    pub fn command(&self) -> Option<&RegisteredCommand> {
        self.command.as_ref()
    }

    /// Child nodes, sorted by segment name.
    pub fn children(&self) -> impl Iterator<Item = (&str, &CommandNode)> {
        self.children.iter().map(|(name, node)| (name.as_str(), node))
    }
}

/// The assembled command tree for one binary.
#[derive(Debug)]
pub struct CommandTree {
    name: String,
    version: String,
    root: CommandNode,
    aliases: BTreeMap<String, String>,
}

impl CommandTree {
    /// Builds a tree from registered commands, nesting on dots.
    pub fn build(
        name: impl Into<String>,
        version: impl Into<String>,
        commands: impl IntoIterator<Item = RegisteredCommand>,
    ) -> Self {
        let mut root = CommandNode::default();
        let mut aliases = BTreeMap::new();
        for command in commands {
            for alias in &command.info.aliases {
                aliases.insert(alias.clone(), command.name.clone());
            }
            let mut node = &mut root;
            for segment in command.name.split('.') {
                node = node.children.entry(segment.to_owned()).or_default();
            }
            node.command = Some(command);
        }
        CommandTree {
            name: name.into(),
            version: version.into(),
            root,
            aliases,
        }
    }

    /// The binary name the tree was built for.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The binary version the tree was built for.
    pub fn version(&self) -> &str {
        &self.version
    }

    /// The root node.
    pub fn root(&self) -> &CommandNode {
        &self.root
    }

    /// Looks up a command by full dotted path or alias.
    pub fn lookup(&self, path: &str) -> Option<&RegisteredCommand> {
        let canonical = self.aliases.get(path).map(String::as_str).unwrap_or(path);
        let mut node = &self.root;
        for segment in canonical.split('.') {
            node = node.children.get(segment)?;
        }
        node.command.as_ref()
    }

    /// Every visible command, depth-first, with hidden ones skipped.
    pub fn visible_commands(&self) -> Vec<&RegisteredCommand> {
        let mut out = Vec::new();
        collect_visible(&self.root, &mut out);
        out
    }
}

fn collect_visible<'a>(node: &'a CommandNode, out: &mut Vec<&'a RegisteredCommand>) {
    if let Some(command) = &node.command {
        if !command.info.hidden {
            out.push(command);
        }
    }
    for child in node.children.values() {
        collect_visible(child, out);
    }
}

/// Validates a command name: non-empty dotted segments.
pub fn validate_command_name(name: &str) -> Result<()> {
    let valid = !name.is_empty()
        && name
            .split('.')
            .all(|segment| !segment.is_empty() && segment.chars().all(is_name_char));
    if valid {
        Ok(())
    } else {
        Err(
            foundation_core::FoundationError::validation(format!(
                "invalid command name {:?}; expected dotted segments of [a-z0-9_-]",
                name
            ))
            .with_context("cli.command", name),
        )
    }
}

fn is_name_char(c: char) -> bool {
    c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-'
}

#[cfg(test)]
mod tests {
    use super::*;

    fn command(name: &str, info: CommandInfo) -> RegisteredCommand {
        RegisteredCommand {
            name: name.to_owned(),
            info,
            action: Arc::new(|_| exit_code::SUCCESS),
        }
    }

    fn tree() -> CommandTree {
        CommandTree::build(
            "provide",
            "1.0.0",
            vec![
                command("logs.tail", CommandInfo::new("follow logs").alias("tail")),
                command("logs.grep", CommandInfo::new("search logs")),
                command("status", CommandInfo::new("show status")),
                command("debug.dump", CommandInfo::new("dump internals").hidden()),
            ],
        )
    }

    #[test]
    fn dotted_names_nest() {
        let tree = tree();
        assert!(tree.lookup("logs.tail").is_some());
        assert!(tree.lookup("logs.grep").is_some());
        assert!(tree.lookup("logs").is_none());
        let logs = tree.root().children().find(|(name, _)| *name == "logs");
        assert_eq!(logs.unwrap().1.children().count(), 2);
    }

    #[test]
    fn aliases_resolve_to_the_canonical_command() {
        let tree = tree();
        let by_alias = tree.lookup("tail").unwrap();
        assert_eq!(by_alias.name, "logs.tail");
    }

    #[test]
    fn hidden_commands_are_invocable_but_unlisted() {
        let tree = tree();
        assert!(tree.lookup("debug.dump").is_some());
        let visible: Vec<_> = tree
            .visible_commands()
            .iter()
            .map(|c| c.name.as_str())
            .collect();
        assert!(!visible.contains(&"debug.dump"));
        assert!(visible.contains(&"logs.tail"));
    }

    #[test]
    fn actions_return_exit_codes() {
        let failing = RegisteredCommand {
            name: "fail".to_owned(),
            info: CommandInfo::new("always fails"),
            action: Arc::new(|_| exit_code::ERROR),
        };
        assert_eq!(failing.run(&[]), exit_code::ERROR);
    }

    #[test]
    fn command_names_are_validated() {
        assert!(validate_command_name("logs.tail").is_ok());
        assert!(validate_command_name("logs-v2.tail_all").is_ok());
        assert!(validate_command_name("").is_err());
        assert!(validate_command_name("logs..tail").is_err());
        assert!(validate_command_name("Logs.Tail").is_err());
    }
}
