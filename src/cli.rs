use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::choices::{ChoiceKind, ChoiceValue};

/// Default project file when `-j` is not given
pub const DEFAULT_PROJECT_FILE: &str = "stepcvt.json";

/// stepcvt - resolve build choices into CAD part selections
#[derive(Parser)]
#[command(name = "stepcvt")]
#[command(about = "Apply build choices to the parts of a CAD project")]
#[command(version)]
pub struct Cli {
    /// Project file to operate on
    #[arg(short = 'j', long = "json", global = true, default_value = DEFAULT_PROJECT_FILE)]
    pub json: PathBuf,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create a new, empty project file
    Make {
        /// Project name
        #[arg(default_value = "proj")]
        name: String,
    },
    /// Rename the project
    Name {
        /// New project name
        name: String,
    },
    /// List or edit the project's choices
    Choices {
        #[command(subcommand)]
        action: Option<ChoicesCommand>,
    },
    /// Register a CAD file with the project
    #[command(name = "addsource")]
    AddSource {
        /// Source name
        name: String,
        /// Path to the CAD file
        path: PathBuf,
    },
    /// Track parts of a source
    #[command(name = "addpart")]
    AddPart {
        /// Part identifiers to add
        #[arg(required_unless_present = "from")]
        ids: Vec<String>,

        /// Add every part listed in this file, one identifier per line
        #[arg(long, value_name = "LIST")]
        from: Option<PathBuf>,

        /// Source to add to (default: the first source)
        #[arg(short, long)]
        source: Option<String>,
    },
    /// Stop tracking parts of a source
    #[command(name = "rmpart")]
    RemovePart {
        #[arg(required = true)]
        ids: Vec<String>,

        #[arg(short, long)]
        source: Option<String>,
    },
    /// Change the baseline attributes of a part
    #[command(name = "editpart")]
    EditPart {
        id: String,

        /// Baseline count before effects apply
        #[arg(short, long, allow_negative_numbers = true)]
        count: i64,

        #[arg(short, long)]
        source: Option<String>,
    },
    /// Check answers against the project's choices without changing anything
    Validate {
        /// Answers as KEY=VALUE or KEY=V1,V2
        answers: Vec<String>,
    },
    /// Apply answers to every part and save the derived attributes
    Apply {
        /// Answers as KEY=VALUE or KEY=V1,V2
        answers: Vec<String>,

        /// Show the resulting attributes without writing the project file
        #[arg(long)]
        dry_run: bool,
    },
    /// Show every part with its derived attributes
    Parts,
}

#[derive(Subcommand)]
pub enum ChoicesCommand {
    /// List choices in dependency order with their values
    List,
    /// Declare a new choice
    #[command(alias = "add-chooser")]
    Add {
        /// single, multi or boolean
        #[arg(long = "choice-type", default_value = "single")]
        choice_type: ChoiceKind,

        /// Question shown to the user
        text: String,

        /// Variable the answer is stored under
        varname: String,

        /// Values as text:value[:condition]; a boolean choice takes the
        /// selected value and optionally the unselected one
        #[arg(required = true)]
        values: Vec<ChoiceValue>,
    },
    /// Remove a choice, one of its values, or a value's condition
    Remove {
        varname: String,

        /// Remove only this value
        #[arg(long = "choice-value")]
        choice_value: Option<String>,

        /// Keep the value and drop its condition
        #[arg(long, requires = "choice_value")]
        cond: bool,
    },
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parse_choices_default_file() {
        let cli = Cli::try_parse_from(["stepcvt", "choices"]).unwrap();
        assert_eq!(cli.json, PathBuf::from(DEFAULT_PROJECT_FILE));
        assert!(matches!(cli.command, Commands::Choices { action: None }));

        let cli = Cli::try_parse_from(["stepcvt", "choices", "list"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Choices {
                action: Some(ChoicesCommand::List)
            }
        ));
    }

    #[test]
    fn test_cli_choices_add() {
        let cli = Cli::try_parse_from([
            "stepcvt",
            "choices",
            "add-chooser",
            "--choice-type",
            "multi",
            "Printer Options",
            "PrinterOptions",
            "HEPA filter:Filter",
            "Build area lights:Lights:NevermoreModel == 'V6'",
        ])
        .unwrap();
        match cli.command {
            Commands::Choices {
                action:
                    Some(ChoicesCommand::Add {
                        choice_type,
                        text,
                        varname,
                        values,
                    }),
            } => {
                assert_eq!(choice_type, ChoiceKind::Multi);
                assert_eq!(text, "Printer Options");
                assert_eq!(varname, "PrinterOptions");
                assert_eq!(values.len(), 2);
                assert_eq!(values[0], ChoiceValue::new("HEPA filter", "Filter"));
                assert!(values[1].precondition.is_some());
            }
            _ => panic!("Expected Choices Add command"),
        }

        let cli =
            Cli::try_parse_from(["stepcvt", "choices", "add", "Model", "Model", "V4:V4"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Choices {
                action: Some(ChoicesCommand::Add {
                    choice_type: ChoiceKind::Single,
                    ..
                })
            }
        ));
    }

    #[test]
    fn test_cli_choices_add_rejects_bad_input() {
        // no values
        assert!(Cli::try_parse_from(["stepcvt", "choices", "add", "Model", "Model"]).is_err());
        // value without an identifier
        assert!(Cli::try_parse_from(["stepcvt", "choices", "add", "Model", "Model", "V4"]).is_err());
        // condition outside the grammar
        assert!(Cli::try_parse_from([
            "stepcvt", "choices", "add", "Model", "Model", "V4:V4:__import__('os')"
        ])
        .is_err());
        assert!(Cli::try_parse_from([
            "stepcvt", "choices", "add", "--choice-type", "slider", "Model", "Model", "V4:V4"
        ])
        .is_err());
    }

    #[test]
    fn test_cli_choices_remove() {
        let cli = Cli::try_parse_from([
            "stepcvt",
            "choices",
            "remove",
            "PrinterOptions",
            "--choice-value",
            "Lights",
            "--cond",
        ])
        .unwrap();
        match cli.command {
            Commands::Choices {
                action:
                    Some(ChoicesCommand::Remove {
                        varname,
                        choice_value,
                        cond,
                    }),
            } => {
                assert_eq!(varname, "PrinterOptions");
                assert_eq!(choice_value.as_deref(), Some("Lights"));
                assert!(cond);
            }
            _ => panic!("Expected Choices Remove command"),
        }

        // --cond names a value's condition
        assert!(Cli::try_parse_from(["stepcvt", "choices", "remove", "PrinterOptions", "--cond"])
            .is_err());
    }

    #[test]
    fn test_cli_part_commands() {
        let cli = Cli::try_parse_from(["stepcvt", "addpart", "duct", "lid", "-s", "body"]).unwrap();
        match cli.command {
            Commands::AddPart { ids, from, source } => {
                assert_eq!(ids, vec!["duct", "lid"]);
                assert!(from.is_none());
                assert_eq!(source.as_deref(), Some("body"));
            }
            _ => panic!("Expected AddPart command"),
        }

        let cli = Cli::try_parse_from(["stepcvt", "addpart", "--from", "parts.txt"]).unwrap();
        assert!(matches!(cli.command, Commands::AddPart { ref ids, from: Some(_), .. } if ids.is_empty()));
        assert!(Cli::try_parse_from(["stepcvt", "addpart"]).is_err());

        assert!(Cli::try_parse_from(["stepcvt", "rmpart"]).is_err());
        let cli = Cli::try_parse_from(["stepcvt", "rmpart", "duct"]).unwrap();
        assert!(matches!(cli.command, Commands::RemovePart { ref ids, source: None } if ids == &["duct"]));

        let cli = Cli::try_parse_from(["stepcvt", "editpart", "clip", "-c", "-2"]).unwrap();
        match cli.command {
            Commands::EditPart { id, count, source } => {
                assert_eq!(id, "clip");
                assert_eq!(count, -2);
                assert!(source.is_none());
            }
            _ => panic!("Expected EditPart command"),
        }
        assert!(Cli::try_parse_from(["stepcvt", "editpart", "clip"]).is_err());
        assert!(Cli::try_parse_from(["stepcvt", "editpart", "clip", "--count", "many"]).is_err());

        let cli = Cli::try_parse_from(["stepcvt", "addsource", "body", "cad/body.step"]).unwrap();
        assert!(matches!(cli.command, Commands::AddSource { ref name, .. } if name == "body"));
    }

    #[test]
    fn test_cli_requires_command() {
        assert!(Cli::try_parse_from(["stepcvt"]).is_err());
    }

    #[test]
    fn test_cli_json_flag() {
        let cli = Cli::try_parse_from(["stepcvt", "-j", "/tmp/p.json", "parts"]).unwrap();
        assert_eq!(cli.json.to_str().unwrap(), "/tmp/p.json");

        // global flag may follow the subcommand
        let cli = Cli::try_parse_from(["stepcvt", "parts", "--json", "q.json"]).unwrap();
        assert_eq!(cli.json.to_str().unwrap(), "q.json");
    }

    #[test]
    fn test_cli_validate_answers() {
        let cli = Cli::try_parse_from([
            "stepcvt",
            "validate",
            "NevermoreModel=V6",
            "PrinterOptions=Filter,Lights",
        ])
        .unwrap();
        match cli.command {
            Commands::Validate { answers } => {
                assert_eq!(answers, vec!["NevermoreModel=V6", "PrinterOptions=Filter,Lights"]);
            }
            _ => panic!("Expected Validate command"),
        }
    }

    #[test]
    fn test_cli_apply_dry_run() {
        let cli = Cli::try_parse_from(["stepcvt", "apply", "--dry-run", "NevermoreModel=V4"]).unwrap();
        match cli.command {
            Commands::Apply { answers, dry_run } => {
                assert!(dry_run);
                assert_eq!(answers, vec!["NevermoreModel=V4"]);
            }
            _ => panic!("Expected Apply command"),
        }
    }

    #[test]
    fn test_cli_make_default_name() {
        let cli = Cli::try_parse_from(["stepcvt", "make"]).unwrap();
        match cli.command {
            Commands::Make { name } => assert_eq!(name, "proj"),
            _ => panic!("Expected Make command"),
        }
    }

    #[test]
    fn test_cli_name_requires_value() {
        assert!(Cli::try_parse_from(["stepcvt", "name"]).is_err());
        assert!(Cli::try_parse_from(["stepcvt", "name", "Nevermore"]).is_ok());
    }
}
