use clap::Parser;
use color_print::{cformat, cprintln};
use log::LevelFilter;
use rkasm::{
    compiler::LogListener,
    config::BuildConfig,
    deps::{ByCompilationRoot, ByStartAddress, RootSelector},
    diag, dump,
    resource::{FileResolver, IdentifierMatcher},
    writer::MemoryWriterFactory,
    CompiledCode, Compiler, CompilerOption, Error, Linker, Options, Program, Resource,
};
use simplelog::{ColorChoice, Config, TermLogger, TerminalMode};
use std::{path::PathBuf, process::ExitCode};

const HELP_TEMPLATE: &str = "\
{before-help}{bin} {version}
  {author}
  {about}

{usage-heading}
{tab}{usage}

{all-args}{after-help}";

#[derive(Debug, clap::Parser)]
#[clap(author, version, about, help_template = HELP_TEMPLATE)]
struct Args {
    /// Source files
    #[clap(required = true)]
    input: Vec<PathBuf>,

    /// Output file
    #[clap(short, long)]
    output: Option<PathBuf>,

    /// Prefix the image with a relocation stub and table
    #[clap(long)]
    self_relocating: bool,

    /// Shift resolved addresses past the relocation header
    #[clap(long)]
    rewrite_addresses: bool,

    /// File whose include tree is compiled when several roots exist
    #[clap(long)]
    root: Option<PathBuf>,

    /// Compiler option, repeatable
    #[clap(short = 'O', long = "option")]
    option: Vec<CompilerOption>,

    /// YAML build file
    #[clap(long)]
    config: Option<PathBuf>,

    /// Extra include search directory, repeatable
    #[clap(short = 'I', long = "include")]
    include: Vec<PathBuf>,

    /// Stop after the named phase
    #[clap(long)]
    stop_after: Option<String>,

    /// Print an address listing
    #[clap(short, long)]
    dump: bool,

    /// Write the symbol map as YAML
    #[clap(long)]
    symbols: Option<PathBuf>,

    /// More log output
    #[clap(short, long)]
    verbose: bool,

    /// Only warnings and errors
    #[clap(short, long)]
    quiet: bool,
}

fn configure_logging(level: LevelFilter) -> Result<(), log::SetLoggerError> {
    TermLogger::init(level, Config::default(), TerminalMode::Stderr, ColorChoice::Auto)
}

fn main() -> ExitCode {
    let args = Args::parse();
    let level = match (args.verbose, args.quiet) {
        (true, _) => LevelFilter::Debug,
        (_, true) => LevelFilter::Warn,
        _ => LevelFilter::Info,
    };
    if let Err(e) = configure_logging(level) {
        eprintln!("{}", e);
    }

    match run(args) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            cprintln!("<red,bold>error</>: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> Result<bool, Error> {
    println!("RK16 Assembler by kanade-k-1228");

    // 1. Settings: build file, then flags
    let mut config = match &args.config {
        Some(path) => BuildConfig::load(path)?,
        None => BuildConfig::default(),
    };
    config.options.extend(args.option.iter().copied());
    config.include_dirs.extend(args.include.iter().cloned());
    config.output = args.output.clone().or(config.output);
    config.root = args.root.clone().or(config.root);
    config.stop_after = args.stop_after.clone().or(config.stop_after);
    config.self_relocating |= args.self_relocating;
    config.rewrite_addresses |= args.rewrite_addresses;

    let options: Options = config.options.iter().copied().collect();
    let mut compiler = Compiler::new()
        .with_options(options)
        .with_writers(Box::new(MemoryWriterFactory))
        .with_resolver(Box::new(FileResolver::new(config.include_dirs.clone())))
        .with_matcher(Box::new(IdentifierMatcher));
    if let Some(phase) = &config.stop_after {
        compiler.stop_after(phase)?;
    }

    // 2. Order
    println!("1. Determine Compilation Order");
    let mut program = Program::new();
    for path in &args.input {
        println!("  < {}", path.display());
        program.add(Resource::file(path));
    }
    let selector: Box<dyn RootSelector> = match &config.root {
        Some(root) => Box::new(ByCompilationRoot::new(Resource::file(root))),
        None => Box::new(ByStartAddress),
    };
    program.order_units(compiler.resolver(), compiler.matcher(), selector.as_ref())?;

    // 3. Compile
    println!("2. Compile");
    let success = compiler.compile(&mut program, &mut LogListener);
    let errors = diag::report(&program.units);
    if !success {
        cprintln!("<red,bold>Compilation failed</>: {} error(s)", errors);
        return Ok(false);
    }
    if config.stop_after.is_some() {
        return Ok(true);
    }

    // 4. Link
    let modules = CompiledCode::collect(&program.units)?;
    let output = config.output.clone().unwrap_or_else(|| default_output(&args.input));
    println!("3. Link");
    println!("  > {}", output.display());
    let mut image = Vec::new();
    let linked = Linker::new()
        .self_relocating(config.self_relocating)
        .rewrite_addresses(config.rewrite_addresses)
        .link(&mut program, &modules, &mut image)?;
    std::fs::write(&output, image)
        .map_err(|e| Error::ResourceWrite(output.display().to_string(), e))?;
    println!(
        "{}",
        cformat!(
            "  <green>{}</> byte(s), header {} byte(s), {} relocation(s)",
            linked.image_len,
            linked.header_len,
            linked.relocation.len()
        )
    );

    // 5. Reports
    if args.dump {
        for unit in program.units.iter() {
            for line in dump::listing(unit)? {
                println!("{}", line);
            }
        }
    }
    if let Some(path) = &args.symbols {
        std::fs::write(path, dump::symbol_map_yaml(&program)?)
            .map_err(|e| Error::ResourceWrite(path.display().to_string(), e))?;
    }
    Ok(true)
}

fn default_output(input: &[PathBuf]) -> PathBuf {
    let mut path = input.first().cloned().unwrap_or_else(|| PathBuf::from("main.rk"));
    path.set_extension("bin");
    path
}
