use clap::{Parser as ClapParser, Subcommand, ValueEnum};
use std::io::{self, Read};
use symql::PlaceholderStyle;
use symql::cli::{self, CliError};

#[derive(ClapParser)]
#[command(name = "symql")]
#[command(about = "symql - evaluate JSON query expressions in memory or compile them to SQL")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum Placeholder {
    /// $1, $2, ...
    Dollar,
    /// ?
    Question,
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate an expression against in-memory data
    Run {
        /// The expression, as JSON
        expr: String,

        /// Context JSON (reads from stdin if not provided)
        #[arg(short, long)]
        input: Option<String>,

        /// Pretty-print the output
        #[arg(short, long)]
        pretty: bool,
    },

    /// Compile an expression to a parameterized SQL statement
    Compile {
        /// The expression, as JSON
        expr: String,

        /// Context JSON (reads from stdin if not provided)
        #[arg(short, long)]
        input: Option<String>,

        /// Pretty-print the output
        #[arg(short, long)]
        pretty: bool,

        /// Placeholder syntax
        #[arg(long, value_enum, default_value = "dollar")]
        placeholder: Placeholder,
    },
}

fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Run {
            expr,
            input,
            pretty,
        } => read_input(input).and_then(|input| {
            let output = cli::execute_run(&cli::RunOptions { expr, input })?;
            print_json(&output, pretty)
        }),
        Commands::Compile {
            expr,
            input,
            pretty,
            placeholder,
        } => read_input(input).and_then(|input| {
            let placeholder = match placeholder {
                Placeholder::Dollar => PlaceholderStyle::Dollar,
                Placeholder::Question => PlaceholderStyle::Question,
            };
            let output = cli::execute_compile(&cli::CompileOptions {
                expr,
                input,
                placeholder,
            })?;
            print_json(&output, pretty)
        }),
    };

    if let Err(e) = result {
        eprintln!("{}", e);
        std::process::exit(1);
    }
}

fn read_input(input: Option<String>) -> Result<Option<String>, CliError> {
    match input {
        Some(s) => Ok(Some(s)),
        None if !atty::is(atty::Stream::Stdin) => {
            let mut buffer = String::new();
            io::stdin().read_to_string(&mut buffer)?;
            Ok(Some(buffer))
        }
        None => Ok(None),
    }
}

fn print_json(output: &serde_json::Value, pretty: bool) -> Result<(), CliError> {
    let json = if pretty {
        serde_json::to_string_pretty(output)
    } else {
        serde_json::to_string(output)
    }?;
    println!("{}", json);
    Ok(())
}
