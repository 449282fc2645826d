use std::error::Error;
use std::fs;
use std::path::PathBuf;
use std::process;
use std::rc::Rc;

use clap::{Parser, Subcommand};

use symbolic_jvm::config::EngineConfig;
use symbolic_jvm::engine::decision::FixedOracle;
use symbolic_jvm::engine::Engine;
use symbolic_jvm::logging::SimpleLogger;
use symbolic_jvm::model::class_file::access_flags::method_access_flags;
use symbolic_jvm::model::class_file::{ClassFileBuilder, Code, MethodInfo};
use symbolic_jvm::parser::class_file;
use symbolic_jvm::vm::bytecode::opcode;
use symbolic_jvm::vm::{ClassHierarchy, ClassLoader, Signature, State};

/// The class of the frame `init` starts from, so that thrown exceptions have somewhere to go.
const DRIVER_CLASS: &str = "symjvm/Driver";

#[derive(Parser)]
#[command(name = "symjvm")]
#[command(about = "Symbolic execution of Java bytecode")]
#[command(version)]
struct Cli {
    /// YAML configuration file
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Directory to load classes from, in addition to those in the configuration
    #[arg(long = "classpath", value_name = "DIR", global = true)]
    classpath: Vec<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse class files and print them
    Parse {
        #[arg(value_name = "FILE", required = true)]
        files: Vec<PathBuf>,
    },

    /// Initialize a class and print the resulting state
    Init {
        /// Binary name of the class, e.g. com/example/Main
        #[arg(value_name = "CLASS")]
        class: String,

        /// Take the branch where classes were initialized before the execution started
        #[arg(long)]
        assume_initialized: bool,
    },
}

fn main() {
    let cli = Cli::parse();
    let mut config = match cli.config {
        Some(ref path) => match EngineConfig::load(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("error: {}", e);
                process::exit(1);
            },
        },
        None => EngineConfig::default(),
    };
    config.classpath.extend(cli.classpath.iter().cloned());
    if let Err(e) = SimpleLogger::init(config.log_level) {
        eprintln!("warning: {}", e);
    }

    let result = match cli.command {
        Commands::Parse { ref files } => parse_files(files),
        Commands::Init { ref class, assume_initialized } => init(config, class, assume_initialized),
    };
    if let Err(e) = result {
        eprintln!("error: {}", e);
        process::exit(1);
    }
}

fn parse_files(files: &[PathBuf]) -> Result<(), Box<dyn Error>> {
    for file in files {
        let bytes = fs::read(file)?;
        let class = class_file::parse_class_file(&bytes)?;
        println!("{:#?}", class);
    }
    Ok(())
}

fn init(config: EngineConfig, class: &str, assume_initialized: bool)
        -> Result<(), Box<dyn Error>> {
    let mut hierarchy = ClassHierarchy::bootstrap();
    let mut loader = ClassLoader::new(config.classpath.clone());
    loader.load_class(&mut hierarchy, class)?;

    let root = Signature::new(DRIVER_CLASS, "run", "()V");
    let flags = method_access_flags::ACC_PUBLIC | method_access_flags::ACC_STATIC;
    hierarchy.add(ClassFileBuilder::new(DRIVER_CLASS)
        .method(MethodInfo::new(flags, &root.name, &root.descriptor,
                                Some(Code::new(1, 0, vec![opcode::NOP, opcode::RETURN]))))
        .build());

    let mut engine = Engine::new(config, FixedOracle(assume_initialized));
    let mut state = engine.initial_state(Rc::new(hierarchy), &root, vec![])?;
    let pushed = engine.ensure_klass(&mut state, class)?;
    println!("ensure_klass({}) = {}", class, pushed);
    print_state(&state);
    Ok(())
}

fn print_state(state: &State) {
    println!("thread stack (top first):");
    for frame in state.thread_stack().iter().rev() {
        println!("  {} pc={}", frame.signature(), frame.pc());
    }
    if let Some(reference) = state.uncaught() {
        let class = state.class_of(reference).unwrap_or_default();
        println!("  terminated by uncaught {} {}", class, reference);
    }
    println!("static store:");
    for (name, klass) in state.static_store() {
        println!("  {} {:?}", name, klass.status());
        for (field, value) in klass.fields() {
            println!("    {} = {}", field, value);
        }
    }
    println!("path condition:");
    for clause in state.path_condition().clauses() {
        println!("  {}", clause);
    }
}
