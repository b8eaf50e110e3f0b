//! Entrypoint for CLI
use std::{env, path::PathBuf};

use jack::{driver, prelude::*, IMPL_VERSION};
use log::{error, info};

static USAGE: &str = r#"
usage: jackc CMD PATH [OUT_DIR]

commands:
    build   Compile a source file, or every source file in a directory, to VM code
    lex     Write the tokens of a source file as XML, next to it

examples:
    jackc build Main.jack
    jackc build Square/ build/
    jackc lex Main.jack
"#;

/// FreeBSD EX_USAGE
const EXIT_USAGE: i32 = 64;
const EXIT_FAILURE: i32 = 1;

fn run_build(path: PathBuf, out_dir: Option<PathBuf>) -> JackResult<Report> {
    let conf = CompilerConf {
        out_dir,
        ..CompilerConf::default()
    };

    info!("compiling {}", path.display());
    driver::compile_path(&path, &conf)
}

fn run_lex(path: PathBuf) -> JackResult<()> {
    let output = driver::tokenize_file(&path)?;
    println!("{}", output.display());
    Ok(())
}

fn main() {
    if let Err(err) = simple_logger::SimpleLogger::new().env().init() {
        eprintln!("failed to initialise logger: {err}");
    }

    let result = match parse_args() {
        Some(Cmd::Build { path, out_dir }) => run_build(path, out_dir).map(|report| {
            for output in &report.compiled {
                println!("{}", output.display());
            }
            report.is_success()
        }),
        Some(Cmd::Lex { path }) => run_lex(path).map(|_| true),
        None => {
            print_usage();
            std::process::exit(EXIT_USAGE)
        }
    };

    match result {
        Ok(true) => {}
        // Failed files have already been logged by the driver.
        Ok(false) => std::process::exit(EXIT_FAILURE),
        Err(err) => {
            error!("{err}");
            std::process::exit(EXIT_FAILURE)
        }
    }
}

fn parse_args() -> Option<Cmd> {
    let mut args = env::args().skip(1);
    let cmd = args.next()?;

    let cmd = match cmd.as_str() {
        "build" => Cmd::Build {
            path: consume_arg(&mut args)?,
            out_dir: args.next().map(PathBuf::from),
        },
        "lex" => Cmd::Lex {
            path: consume_arg(&mut args)?,
        },
        _ => return None,
    };

    // Trailing arguments are a usage error.
    match args.next() {
        Some(_) => None,
        None => Some(cmd),
    }
}

/// Consumes the next argument as a path.
fn consume_arg(args: &mut impl Iterator<Item = String>) -> Option<PathBuf> {
    args.next().map(PathBuf::from)
}

fn print_usage() {
    println!("Jack compiler v{IMPL_VERSION}");
    println!("{USAGE}");
}

enum Cmd {
    /// Compile file or directory
    Build { path: PathBuf, out_dir: Option<PathBuf> },
    /// Dump tokens
    Lex { path: PathBuf },
}
