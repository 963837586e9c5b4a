use std::{collections::BTreeMap, env, fmt};

use serde::Serialize;

/// Value of a single parsed command-line argument.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ArgValue {
    Flag(bool),
    Single(String),
    Many(Vec<String>),
    /// Declared but neither given nor defaulted.
    Absent,
}

impl fmt::Display for ArgValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgValue::Flag(b) => write!(f, "{b}"),
            ArgValue::Single(s) => f.write_str(s),
            ArgValue::Many(values) => f.write_str(&values.join(", ")),
            ArgValue::Absent => f.write_str("None"),
        }
    }
}

/// Parsed command-line arguments, keyed by argument name.
///
/// Values are recorded as given: nothing is redacted, so secrets passed on
/// the command line end up in the log header.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ArgumentSnapshot {
    values: BTreeMap<String, ArgValue>,
}

impl ArgumentSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, value: ArgValue) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: ArgValue) {
        self.values.insert(name.into(), value);
    }

    pub fn get(&self, name: &str) -> Option<&ArgValue> {
        self.values.get(name)
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ArgValue)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Snapshots every argument `command` declares, as parsed into `matches`.
    ///
    /// Defaults count as given. Arguments of the selected subcommand are
    /// recorded as `<subcommand>.<argument>`.
    ///
    /// # Examples
    /// ```
    /// use clap::{Arg, ArgAction, Command};
    /// use fancylog::{ArgValue, ArgumentSnapshot};
    ///
    /// let cmd = Command::new("train")
    ///     .arg(Arg::new("epochs").long("epochs").default_value("10"))
    ///     .arg(Arg::new("dry_run").long("dry-run").action(ArgAction::SetTrue));
    /// let matches = cmd.clone().get_matches_from(["train", "--dry-run"]);
    ///
    /// let snapshot = ArgumentSnapshot::from_matches(&cmd, &matches);
    /// assert_eq!(snapshot.get("epochs"), Some(&ArgValue::Single("10".into())));
    /// assert_eq!(snapshot.get("dry_run"), Some(&ArgValue::Flag(true)));
    /// ```
    #[cfg(feature = "clap")]
    pub fn from_matches(command: &clap::Command, matches: &clap::ArgMatches) -> Self {
        let mut snapshot = Self::new();
        let mut command = command.clone();
        command.build();
        snapshot.collect(&command, matches, "");
        snapshot
    }

    #[cfg(feature = "clap")]
    fn collect(&mut self, command: &clap::Command, matches: &clap::ArgMatches, prefix: &str) {
        use clap::ArgAction;

        for arg in command.get_arguments() {
            let id = arg.get_id().as_str();
            if matches!(
                arg.get_action(),
                ArgAction::Help | ArgAction::HelpShort | ArgAction::HelpLong | ArgAction::Version
            ) {
                continue;
            }

            let raw: Vec<String> = match matches.try_get_raw(id) {
                Ok(Some(values)) => values.map(|v| v.to_string_lossy().into_owned()).collect(),
                Ok(None) => {
                    self.insert(format!("{prefix}{id}"), ArgValue::Absent);
                    continue;
                }
                Err(_) => continue,
            };

            let many = matches!(arg.get_action(), ArgAction::Append)
                || arg.get_num_args().is_some_and(|range| range.max_values() > 1);
            let value = match arg.get_action() {
                ArgAction::SetTrue | ArgAction::SetFalse => {
                    ArgValue::Flag(raw.first().is_some_and(|v| v == "true"))
                }
                _ if many => ArgValue::Many(raw),
                _ => match raw.into_iter().next() {
                    Some(value) => ArgValue::Single(value),
                    None => ArgValue::Absent,
                },
            };
            self.insert(format!("{prefix}{id}"), value);
        }

        if let Some((name, sub_matches)) = matches.subcommand() {
            self.insert(format!("{prefix}subcommand"), ArgValue::Single(name.to_string()));
            if let Some(sub) = command.find_subcommand(name) {
                self.collect(sub, sub_matches, &format!("{prefix}{name}."));
            }
        }
    }
}

/// Renders one `name: value` line per argument, alphabetically.
/// Collections are comma-joined. No trailing newline.
pub fn format_arguments(snapshot: &ArgumentSnapshot) -> String {
    snapshot
        .iter()
        .map(|(name, value)| format!("{name}: {value}"))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Raw command line of the running process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandLine {
    command: String,
    arguments: Vec<String>,
}

impl CommandLine {
    /// Captures the current process arguments (lossily converted to UTF-8).
    pub fn capture() -> Self {
        Self::from_args(env::args_os().map(|arg| arg.to_string_lossy().into_owned()))
    }

    pub fn from_args<I, S>(args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut args = args.into_iter().map(Into::into);
        Self {
            command: args.next().unwrap_or_default(),
            arguments: args.collect(),
        }
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    pub fn arguments(&self) -> &[String] {
        &self.arguments
    }

    /// `Command: <argv0>` and `Input arguments: [..]` lines.
    pub fn render(&self) -> String {
        format!(
            "Command: {}\nInput arguments: {:?}",
            self.command, self.arguments
        )
    }
}
