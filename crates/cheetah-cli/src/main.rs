//! Command-line front end for the Cheetah template compiler.

use std::fs;
use std::io::{self, Read, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use cheetah_compiler::{CompileOptions, compile_with_diagnostics};

#[derive(Parser)]
#[command(name = "cheetah", version, about = "Compile Cheetah templates to host-language source modules")]
struct Cli {
    /// Increase logging verbosity (-v, -vv); overridden by RUST_LOG if set.
    #[arg(short = 'v', long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Compile a template file (or stdin) to generated module source.
    Compile {
        /// Template source file; omit or pass `-` to read stdin.
        input: Option<PathBuf>,

        /// Write generated source here instead of stdout.
        #[arg(short = 'o', long)]
        output: Option<PathBuf>,

        /// Name of the generated class.
        #[arg(long, default_value = "DynamicallyCompiledCheetahTemplate")]
        main_class_name: String,

        /// Import path substituted for the runtime's `Template` et al.
        #[arg(long, default_value = "Cheetah.Template")]
        runtime_module: String,

        /// A `key=value` compiler-settings override; may be repeated.
        #[arg(long = "setting", value_name = "KEY=VALUE")]
        setting: Vec<String>,

        /// Force colored diagnostic output.
        #[arg(long)]
        colored: bool,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    install_tracing(cli.verbose);

    match cli.command {
        Command::Compile {
            input,
            output,
            main_class_name,
            runtime_module,
            setting,
            colored,
        } => run_compile(input, output, main_class_name, runtime_module, setting, colored),
    }
}

fn install_tracing(verbose: u8) {
    use tracing_subscriber::EnvFilter;

    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();
}

fn run_compile(
    input: Option<PathBuf>,
    output: Option<PathBuf>,
    main_class_name: String,
    runtime_module: String,
    raw_settings: Vec<String>,
    colored: bool,
) -> ExitCode {
    let (source, filename) = match read_source(input.as_deref()) {
        Ok(pair) => pair,
        Err(err) => {
            eprintln!("error: {err}");
            return ExitCode::FAILURE;
        }
    };
    tracing::info!(filename = filename.as_deref().unwrap_or("<stdin>"), bytes = source.len(), "read template source");

    let mut options = CompileOptions {
        main_class_name,
        runtime_module,
        filename,
        ..CompileOptions::default()
    };

    for raw in &raw_settings {
        let Some((key, value)) = raw.split_once('=') else {
            eprintln!("error: --setting expects KEY=VALUE, got '{raw}'");
            return ExitCode::FAILURE;
        };
        if let Err(detail) = options.settings.set_by_name(key.trim(), value.trim()) {
            eprintln!("error: {detail}");
            return ExitCode::FAILURE;
        }
    }

    let (generated, diagnostics) = compile_with_diagnostics(&source, options);

    match generated {
        Some(text) => {
            tracing::info!(bytes = text.len(), "compiled template");
            if let Err(err) = write_output(output.as_deref(), &text) {
                eprintln!("error: {err}");
                return ExitCode::FAILURE;
            }
            ExitCode::SUCCESS
        }
        None => {
            tracing::warn!(errors = diagnostics.error_count(), "compile failed");
            let printer = diagnostics.printer(&source).colored(colored);
            eprint!("{}", printer.render());
            ExitCode::FAILURE
        }
    }
}

fn read_source(input: Option<&std::path::Path>) -> io::Result<(String, Option<String>)> {
    match input {
        None => {
            let mut buf = String::new();
            io::stdin().read_to_string(&mut buf)?;
            Ok((buf, None))
        }
        Some(path) if path == std::path::Path::new("-") => {
            let mut buf = String::new();
            io::stdin().read_to_string(&mut buf)?;
            Ok((buf, None))
        }
        Some(path) => {
            let source = fs::read_to_string(path)?;
            Ok((source, Some(path.display().to_string())))
        }
    }
}

fn write_output(output: Option<&std::path::Path>, text: &str) -> io::Result<()> {
    match output {
        Some(path) => fs::write(path, text),
        None => io::stdout().write_all(text.as_bytes()),
    }
}
