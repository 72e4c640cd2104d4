/// abacus CLI: flag handling, startup resource files, and the REPL loop.
use abacus::errors::CalcError;
use abacus::{Engine, ParseError};
use clap::{ArgAction, Parser as ClapParser};
use colored::Colorize;
use miette::{IntoDiagnostic, Result};
use std::io::{BufRead, Write};

#[derive(ClapParser)]
#[command(
    name = "abacus",
    version,
    about = "An interactive arbitrary-precision calculator",
    disable_version_flag = true
)]
struct Cli {
    /// Evaluate the remaining arguments as expressions
    #[arg(short = 'e')]
    expressions: bool,

    /// Do not execute startup resource files
    #[arg(short = 'q')]
    no_startup: bool,

    /// Suppress the leading banner
    #[arg(short = 'd')]
    no_banner: bool,

    /// Pipe mode: no prompts, no banner
    #[arg(short = 'p')]
    pipe: bool,

    /// Stay interactive after -e expressions or script files
    #[arg(short = 'i')]
    interactive: bool,

    /// Continue after errors in scripts and -e expression lists
    #[arg(short = 'c')]
    continue_on_error: bool,

    /// Treat remaining arguments as strings bound to argv, not expressions
    #[arg(short = 's')]
    strings: bool,

    /// Unbuffered output: flush after every statement
    #[arg(short = 'u')]
    unbuffered: bool,

    /// Permit custom (native-extension) builtins
    #[arg(short = 'C')]
    custom: bool,

    /// File-access mode bits (0..7): 1 read, 2 write, 4 run scripts
    #[arg(short = 'm', default_value_t = 7, value_parser = clap::value_parser!(u32).range(0..=7))]
    mode: u32,

    /// Print version and exit
    #[arg(short = 'v', long = "version", action = ArgAction::SetTrue)]
    version: bool,

    /// Expression, string, or script-file arguments
    args: Vec<String>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    if cli.version {
        println!("abacus {}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }
    let mut engine = Engine::new();
    engine.file_perm = cli.mode;
    engine.allow_custom = cli.custom;

    if !cli.no_startup {
        run_startup_files(&mut engine);
    }

    let mut failed = false;

    if cli.strings {
        let argv: Vec<abacus::Value> = cli
            .args
            .iter()
            .map(|s| abacus::Value::from_str_bytes(s.as_bytes()))
            .collect();
        engine.globals.insert(
            "argv".into(),
            abacus::Value::List(std::rc::Rc::new(abacus::core::list::List::from_vec(argv))),
        );
    } else if cli.expressions {
        for expr in &cli.args {
            if let Err(e) = engine.run_source(expr, true) {
                report_error(&e);
                failed = true;
                if !cli.continue_on_error {
                    std::process::exit(1);
                }
            }
            flush_if(cli.unbuffered);
        }
        if !cli.interactive {
            std::process::exit(if failed { 1 } else { 0 });
        }
    } else if !cli.args.is_empty() {
        for path in &cli.args {
            let src = std::fs::read_to_string(path)
                .map_err(|e| miette::miette!("cannot read '{}': {}", path, e))?;
            if let Err(e) = engine.run_source(&src, false) {
                report_error(&e);
                failed = true;
                if !cli.continue_on_error {
                    std::process::exit(1);
                }
            }
            flush_if(cli.unbuffered);
        }
        if !cli.interactive {
            std::process::exit(if failed { 1 } else { 0 });
        }
    }

    if !cli.no_banner && !cli.pipe {
        println!("abacus {} — exact rational calculator", env!("CARGO_PKG_VERSION"));
        println!("statements end with ';'  (#, /* */ comments; // is integer division)");
    }
    repl(&mut engine, &cli)?;
    Ok(())
}

/// ABACUSRC (colon-separated paths) wins over ~/.abacusrc.
fn run_startup_files(engine: &mut Engine) {
    let mut paths = Vec::new();
    if let Ok(list) = std::env::var("ABACUSRC") {
        paths.extend(list.split(':').map(|s| s.to_string()));
    } else if let Some(home) = dirs::home_dir() {
        let rc = home.join(".abacusrc");
        if rc.exists() {
            paths.push(rc.display().to_string());
        }
    }
    for path in paths {
        match std::fs::read_to_string(&path) {
            Ok(src) => {
                if let Err(e) = engine.run_source(&src, false) {
                    eprintln!("{} startup file '{}': {}", "warning:".yellow(), path, e);
                }
            }
            Err(e) => eprintln!("{} cannot read '{}': {}", "warning:".yellow(), path, e),
        }
    }
}

fn repl(engine: &mut Engine, cli: &Cli) -> Result<()> {
    let stdin = std::io::stdin();
    let mut pending = String::new();
    loop {
        if !cli.pipe {
            let prompt = if pending.is_empty() {
                engine.conf.prompt.clone()
            } else {
                engine.conf.more.clone()
            };
            print!("{}", prompt);
            std::io::stdout().flush().into_diagnostic()?;
        }
        let mut line = String::new();
        let n = stdin.lock().read_line(&mut line).into_diagnostic()?;
        if n == 0 {
            // EOF: run whatever is pending, then leave.
            if !pending.trim().is_empty() {
                if let Err(e) = engine.run_source(&pending, true) {
                    report_error(&e);
                    std::process::exit(1);
                }
            }
            return Ok(());
        }
        pending.push_str(&line);
        if pending.trim().is_empty() {
            pending.clear();
            continue;
        }
        match engine.run_source(&pending, true) {
            Ok(_) => pending.clear(),
            Err(e) if needs_more_input(&e) => {
                // Unfinished statement: keep reading under the more prompt.
            }
            Err(e) => {
                report_error(&e);
                pending.clear();
            }
        }
        flush_if(cli.unbuffered);
    }
}

fn needs_more_input(e: &CalcError) -> bool {
    matches!(
        e,
        CalcError::Parse(ParseError::UnexpectedEof { .. })
            | CalcError::Parse(ParseError::Lex(
                abacus::errors::LexError::UnterminatedComment { .. }
            ))
    )
}

fn report_error(e: &CalcError) {
    match e {
        CalcError::Parse(p) => {
            let span = p.span();
            eprintln!("{} {} (line {})", "syntax error:".red(), p, span.line);
        }
        CalcError::Uncaught(err) => {
            eprintln!("{} {}", "error:".red(), err.describe());
        }
        CalcError::Io(err) => {
            eprintln!("{} {}", "io error:".red(), err);
        }
    }
}

fn flush_if(unbuffered: bool) {
    if unbuffered {
        let _ = std::io::stdout().flush();
    }
}
