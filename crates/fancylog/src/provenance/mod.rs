mod arguments;
mod attributes;
mod git;
pub(crate) mod header;

pub use arguments::{ArgValue, ArgumentSnapshot, CommandLine, format_arguments};
pub use attributes::{Attributes, format_attributes};
pub use git::{GitProbe, HeadCommit, RepositoryInfo, RepositoryStatus, describe_repository};
