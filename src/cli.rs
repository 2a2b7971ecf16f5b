use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Clone, Parser)]
#[command(name = "class-index")]
#[command(about = "Index the Java classes on a classpath and answer prefix queries")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Classpath to index. Defaults to $CLASSPATH.
    #[arg(long, global = true, value_name = "PATH")]
    pub classpath: Option<String>,

    /// Directory relative classpath entries resolve against.
    #[arg(long, global = true, value_name = "DIR")]
    pub root: Option<PathBuf>,

    #[arg(long, global = true, value_name = "FILE")]
    pub javap: Option<PathBuf>,

    /// Load constructors, methods and fields, not just class names.
    #[arg(long, global = true)]
    pub members: bool,

    /// Recover parameter names (implies verbose javap output).
    #[arg(long, global = true)]
    pub parameter_names: bool,

    /// Skip the Java system library.
    #[arg(long, global = true)]
    pub no_system: bool,

    #[arg(long, global = true)]
    pub include_inner: bool,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Commands {
    /// Classes whose qualified or simple name starts with PREFIX.
    Classes {
        #[arg(default_value = "")]
        prefix: String,

        #[arg(long, value_name = "N", default_value_t = 50)]
        limit: usize,
    },
    /// Members of CLASS_NAME whose name starts with PREFIX.
    Members {
        class_name: String,

        #[arg(default_value = "")]
        prefix: String,
    },
    Superclass {
        class_name: String,
    },
    Stats,
}

impl Cli {
    /// Member and superclass queries always need member detail.
    pub fn wants_members(&self) -> bool {
        self.members
            || self.parameter_names
            || matches!(
                self.command,
                Commands::Members { .. } | Commands::Superclass { .. }
            )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn members_subcommand_implies_member_loading() {
        let cli = Cli::parse_from(["class-index", "members", "java.util.List", "ad"]);
        assert!(cli.wants_members());

        let cli = Cli::parse_from(["class-index", "classes", "Str", "--limit", "5"]);
        assert!(!cli.wants_members());
        assert!(matches!(cli.command, Commands::Classes { ref prefix, limit: 5 } if prefix == "Str"));
    }
}
