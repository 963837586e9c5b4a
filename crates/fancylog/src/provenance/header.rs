use std::{env, path::Path};

use time::{OffsetDateTime, macros::format_description};

use crate::{
    logger::LogConfiguration,
    provenance::{
        arguments::{ArgumentSnapshot, CommandLine, format_arguments},
        attributes::{Attributes, format_attributes},
        git::RepositoryStatus,
    },
};

const LATERAL_SEPARATOR: &str = "**************";

/// Everything recorded at the top of a log file.
pub(crate) struct Provenance<'a> {
    pub config: &'a LogConfiguration,
    pub output_dir: &'a Path,
    pub started: OffsetDateTime,
    pub repository: Option<&'a RepositoryStatus>,
    pub command_line: &'a CommandLine,
    pub arguments: Option<&'a ArgumentSnapshot>,
    pub variables: &'a [Attributes],
}

impl Provenance<'_> {
    /// Renders the header block, or an empty string when every section is off.
    pub(crate) fn render(&self) -> String {
        let cfg = self.config;
        let mut sections: Vec<(&str, String)> = Vec::new();

        if cfg.write_header {
            sections.push((cfg.log_header.as_str(), self.run_section()));
        }
        if cfg.log_git_info {
            let body = self.repository.map(ToString::to_string).unwrap_or_default();
            sections.push(("GIT INFO", body));
        }
        if cfg.log_arguments {
            let mut body = self.command_line.render();
            if let Some(arguments) = self.arguments.filter(|a| !a.is_empty()) {
                body.push_str("\n\n");
                body.push_str(&format_arguments(arguments));
            }
            sections.push(("COMMAND LINE ARGUMENTS", body));
        }
        if cfg.log_variables && !self.variables.is_empty() {
            let body = self
                .variables
                .iter()
                .map(|attrs| format!("{}:\n{}", attrs.name(), format_attributes(attrs, &[])))
                .collect::<Vec<_>>()
                .join("\n\n");
            sections.push(("VARIABLES", body));
        }

        if sections.is_empty() {
            return String::new();
        }

        let mut out = String::new();
        for (index, (title, body)) in sections.iter().enumerate() {
            if index > 0 {
                out.push_str("\n\n");
            }
            out.push_str(&section_title(title));
            out.push_str("\n\n");
            out.push_str(body);
        }
        out.push_str("\n\n");
        out.push_str(&section_title("LOGGING"));
        out.push_str("\n\n");
        out
    }

    fn run_section(&self) -> String {
        let cfg = self.config;
        let ran_at = format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");
        let mut lines = vec![
            format!(
                "Ran at: {}",
                self.started.format(&ran_at).unwrap_or_default()
            ),
            format!("Output directory: {}", self.output_dir.display()),
            format!(
                "Current directory: {}",
                env::current_dir()
                    .map(|dir| dir.display().to_string())
                    .unwrap_or_default()
            ),
            format!("Time zone: {}", cfg.tz.describe(self.started)),
        ];
        if let Some(version) = &cfg.version {
            lines.push(format!("Version: {version}"));
        }
        lines.join("\n")
    }
}

fn section_title(title: &str) -> String {
    format!("{LATERAL_SEPARATOR}  {title}  {LATERAL_SEPARATOR}")
}
