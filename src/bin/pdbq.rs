use std::io::{self, Read};

use clap::Parser as ClapParser;
use log::error;
use puppetdb_query::{parse, Mode};

/// Compile a PuppetDB inventory query into its native AST form and print the result as JSON.
#[derive(ClapParser, Debug)]
#[command(author, version, about)]
struct Cli {
    /// The query source. Reads from stdin when omitted.
    #[arg(index = 1)]
    query: Option<String>,

    /// Target PuppetDB endpoint mode.
    #[arg(short, long, value_enum, default_value = "nodes")]
    mode: CliMode,

    /// Enable debug logging.
    #[arg(short, long)]
    verbose: bool,
}

#[derive(clap::ValueEnum, Debug, Clone, Copy)]
enum CliMode {
    Nodes,
    Facts,
    Resources,
    None,
}

impl From<CliMode> for Mode {
    fn from(m: CliMode) -> Self {
        match m {
            CliMode::Nodes => Mode::Nodes,
            CliMode::Facts => Mode::Facts,
            CliMode::Resources => Mode::Resources,
            CliMode::None => Mode::None,
        }
    }
}

fn main() {
    let args = Cli::parse();

    let level = if args.verbose { log::Level::Debug } else { log::Level::Warn };
    simple_logger::init_with_level(level).expect("logger can only be initialised once");

    let source = match args.query {
        Some(q) => q,
        None => {
            let mut buf = String::new();
            io::stdin()
                .read_to_string(&mut buf)
                .expect("failed to read query from stdin");
            buf
        }
    };

    match parse(&source, args.mode.into(), true) {
        Ok(output) => println!("{}", render(output)),
        Err(e) => {
            error!("{e}");
            std::process::exit(1);
        }
    }
}

fn render(output: puppetdb_query::Output) -> String {
    match output {
        puppetdb_query::Output::Json(text) => text,
        puppetdb_query::Output::Null => "null".to_string(),
        puppetdb_query::Output::Value(_) => {
            unreachable!("the CLI always asks for json=true")
        }
    }
}
