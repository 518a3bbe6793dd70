use std::error::Error;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use pagedb::{
    node,
    statement::{self, ExecuteResult, MetaCommand},
    InsertOutcome, Table, TableOptions, TABLE_MAX_PAGES,
};
use tracing::error;
use tracing_subscriber::EnvFilter;

/// Interactive shell over a single pagedb table file
#[derive(Parser, Debug)]
#[command(name = "pagedb", version, about)]
struct Cli {
    /// Database file, created if it does not exist
    #[arg(value_name = "FILE")]
    file: PathBuf,

    /// Upper bound on the number of pages the file may use
    #[arg(long, default_value_t = TABLE_MAX_PAGES)]
    max_pages: u32,

    /// Enable debug logging on stderr
    #[arg(short = 'v', long)]
    verbose: bool,
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("pagedb=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("pagedb=warn"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .without_time()
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<(), Box<dyn Error>> {
    let options = TableOptions {
        max_pages: cli.max_pages,
    };
    let mut table = Table::open_with(&cli.file, options)?;

    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();
    let mut stdout = io::stdout();
    loop {
        print!("db > ");
        stdout.flush()?;

        let Some(line) = lines.next() else {
            //  end of input behaves like .exit
            break;
        };
        let line = line?;
        let input = line.trim();

        if input.starts_with('.') {
            match input.parse::<MetaCommand>() {
                Ok(MetaCommand::Exit) => break,
                Ok(MetaCommand::BTree) => {
                    println!("Tree:");
                    print!("{}", table.print_tree()?);
                }
                Ok(MetaCommand::Constants) => {
                    println!("Constants:");
                    print!("{}", constants_report());
                }
                Err(e) => println!("{e}"),
            }
            continue;
        }

        let statement = match statement::prepare(input) {
            Ok(statement) => statement,
            Err(e) => {
                println!("{e}");
                continue;
            }
        };

        match statement::execute(&statement, &mut table)? {
            ExecuteResult::Inserted(InsertOutcome::Success) => println!("Executed."),
            ExecuteResult::Inserted(InsertOutcome::DuplicateKey) => {
                println!("Error: Duplicate key.")
            }
            ExecuteResult::Inserted(InsertOutcome::TableFull) => println!("Error: Table full."),
            ExecuteResult::Rows(rows) => {
                for row in rows {
                    println!("{row}");
                }
                println!("Executed.");
            }
        }
    }

    table.close()?;
    Ok(())
}

fn constants_report() -> String {
    let mut result = String::new();
    for (name, value) in node::constants() {
        result.push_str(&format!("{name}: {value}\n"));
    }
    result
}
