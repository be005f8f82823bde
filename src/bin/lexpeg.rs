//! lexpeg CLI tool - inspect how MiniC sources are lexed and parsed
//!
//! Usage:
//!   lexpeg tokens <file>                          - Dump the token stream with trivia
//!   lexpeg parse <file> [--recover] [--no-memo]   - Print the syntax tree as XML
//!   lexpeg xpath <query> <file> [--recover]       - Print the nodes selected by an XPath query
//!   lexpeg program                                - Print the compiled MiniC program
//!
//! Logging goes to stderr and is controlled by `RUST_LOG` (e.g. `RUST_LOG=lexpeg=debug`).

use clap::{Parser as ClapParser, Subcommand};
use lexpeg::{cfamily, minic, Config, Error, Parser, TriviaKind, XPathQuery};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[derive(ClapParser)]
#[command(name = "lexpeg")]
#[command(version, about = "Lex and parse MiniC sources with the lexpeg engine")]
struct Cli {
    /// JSON configuration file with `lexer` and `parser` sections
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Dump the token stream
    Tokens {
        file: PathBuf,
    },
    /// Parse a file and print its syntax tree as XML
    Parse {
        file: PathBuf,
        /// Skip unparsable top-level input instead of failing
        #[arg(long)]
        recover: bool,
        /// Disable packrat memoization
        #[arg(long)]
        no_memo: bool,
        /// Log parse statistics at debug level
        #[arg(long)]
        stats: bool,
    },
    /// Evaluate an XPath query against the syntax tree of a file
    Xpath {
        query: String,
        file: PathBuf,
        #[arg(long)]
        recover: bool,
    },
    /// Print the compiled instructions of the MiniC grammar
    Program {
        #[arg(long)]
        recover: bool,
    },
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => match Config::load(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Error: {}", e);
                return ExitCode::FAILURE;
            }
        },
        None => Config::default(),
    };

    let result = match cli.command {
        Commands::Tokens { file } => handle_tokens(&file, &config),
        Commands::Parse {
            file,
            recover,
            no_memo,
            stats,
        } => {
            let mut config = config;
            if no_memo {
                config.parser.memoize = false;
            }
            if stats {
                config.parser.collect_stats = true;
            }
            handle_parse(&file, recover, &config)
        }
        Commands::Xpath {
            query,
            file,
            recover,
        } => handle_xpath(&query, &file, recover, &config),
        Commands::Program { recover } => handle_program(recover),
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn build_parser(recover: bool, config: &Config) -> Result<Parser, Error> {
    let grammar = minic::grammar(recover)?.compile()?;
    Ok(Parser::new(cfamily::standard_lexer(&config.lexer), grammar).with_config(config.parser.clone()))
}

/// Handle the tokens command
fn handle_tokens(file: &Path, config: &Config) -> Result<ExitCode, Error> {
    let tokens = cfamily::standard_lexer(&config.lexer).lex_file(file)?;
    for token in tokens.as_slice() {
        for trivia in token.trivia() {
            let kind = match trivia.kind() {
                TriviaKind::Comment if trivia.is_doc_comment() => "doc comment",
                TriviaKind::Comment => "comment",
                TriviaKind::Skipped => "skipped",
                TriviaKind::Preprocessor => "preprocessor",
            };
            println!("    [{}] {:?}", kind, trivia.text());
        }
        println!(
            "{:>4}:{:<4} {:<14} {:?}",
            token.line(),
            token.column(),
            token.token_type().name(),
            token.original_value()
        );
    }
    Ok(ExitCode::SUCCESS)
}

/// Handle the parse command
fn handle_parse(file: &Path, recover: bool, config: &Config) -> Result<ExitCode, Error> {
    let parser = build_parser(recover, config)?;
    let tokens = parser.lexer().lex_file(file)?;
    let outcome = match parser.parse(&tokens) {
        Ok(outcome) => outcome,
        Err(failure) => {
            eprintln!("{}", failure.format_with_context(tokens.as_slice()));
            return Ok(ExitCode::FAILURE);
        }
    };

    print!("{}", outcome.ast.to_xml());
    for diagnostic in &outcome.diagnostics {
        eprintln!("{}: {}", file.display(), diagnostic);
    }
    Ok(if outcome.has_errors() {
        ExitCode::from(2)
    } else {
        ExitCode::SUCCESS
    })
}

/// Handle the xpath command
fn handle_xpath(query: &str, file: &Path, recover: bool, config: &Config) -> Result<ExitCode, Error> {
    let query = XPathQuery::compile(query)?;
    let outcome = build_parser(recover, config)?.parse_file(file)?;
    let nodes = query.select_nodes(outcome.ast.root());
    if nodes.is_empty() {
        println!("{}", query.evaluate_string(outcome.ast.root()));
    }
    for node in nodes {
        println!("{}", node);
    }
    Ok(ExitCode::SUCCESS)
}

/// Handle the program command
fn handle_program(recover: bool) -> Result<ExitCode, Error> {
    let grammar = minic::grammar(recover)?.compile()?;
    print!("{}", grammar);
    Ok(ExitCode::SUCCESS)
}
