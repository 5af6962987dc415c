//! Command-line interface for the template compiler.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(name = "twostage")]
#[command(about = "Two-stage template compiler", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Args)]
pub struct Input {
    /// Template source file
    pub file: PathBuf,

    /// Environment manifest (JSON) layered over the standard environment
    #[arg(long)]
    pub env: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Show the stage of every piece of template text
    Classify {
        #[command(flatten)]
        input: Input,
    },
    /// Print the generator program of every template
    Compile {
        #[command(flatten)]
        input: Input,
    },
    /// Expand a template against a target method and print the body
    Expand {
        #[command(flatten)]
        input: Input,

        /// Template to expand; defaults to the only one in the file
        #[arg(long)]
        template: Option<String>,

        /// Name of the target method
        #[arg(long, default_value = "Target")]
        method: String,

        /// Return type of the target method
        #[arg(long, default_value = "void")]
        returns: String,

        /// Target parameter as `name:type`, in declaration order
        #[arg(long = "param", value_parser = parse_pair::<':'>)]
        params: Vec<(String, String)>,

        /// Template argument as `name=value`; the value is read as JSON and
        /// falls back to a plain string
        #[arg(long = "arg", value_parser = parse_pair::<'='>)]
        args: Vec<(String, String)>,
    },
}

impl Command {
    pub fn input(&self) -> &Input {
        match self {
            Command::Classify { input } | Command::Compile { input } | Command::Expand { input, .. } => {
                input
            }
        }
    }
}

fn parse_pair<const SEP: char>(text: &str) -> Result<(String, String), String> {
    match text.split_once(SEP) {
        Some((name, value)) if !name.trim().is_empty() => {
            Ok((name.trim().to_owned(), value.trim().to_owned()))
        }
        _ => Err(format!("expected `name{SEP}value`, got `{text}`")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_expand() {
        let cli = Cli::try_parse_from([
            "twostage",
            "expand",
            "log.tpl",
            "--env",
            "env.json",
            "--method",
            "Save",
            "--returns",
            "Task<bool>",
            "--param",
            "path:string",
            "--arg",
            "n=3",
        ])
        .unwrap();
        let Command::Expand {
            input,
            template,
            method,
            returns,
            params,
            args,
        } = cli.command
        else {
            panic!("expected expand");
        };
        assert_eq!(input.file, PathBuf::from("log.tpl"));
        assert_eq!(input.env, Some(PathBuf::from("env.json")));
        assert_eq!(template, None);
        assert_eq!(method, "Save");
        assert_eq!(returns, "Task<bool>");
        assert_eq!(params, [("path".to_owned(), "string".to_owned())]);
        assert_eq!(args, [("n".to_owned(), "3".to_owned())]);
    }

    #[test]
    fn test_malformed_pair_is_rejected() {
        assert!(Cli::try_parse_from(["twostage", "expand", "t.tpl", "--param", "path"]).is_err());
        assert_eq!(parse_pair::<'='>("n = 1"), Ok(("n".to_owned(), "1".to_owned())));
    }
}
