use std::{fs::File, io::Write, path::PathBuf};

use anyhow::{bail, Result};
use structopt::StructOpt;

use novum::cfg::Cfg;
use novum::emitter::Emit;
use novum::parser::Parser;
use novum::{compile, lexer::Lexer, Config};

fn main() {
    let opts = Opt::from_args();
    if let Err(e) = run(&opts) {
        eprintln!("novum: {}", e);
        std::process::exit(1);
    }
}

fn run(opts: &Opt) -> Result<()> {
    if opts.path.extension().map_or(true, |ext| ext != "nv") {
        bail!("{} is not a .nv source file", opts.path.display());
    }
    let src = std::fs::read_to_string(&opts.path)?;

    let mut config = Config::from_env();
    config.strict |= opts.strict;
    if opts.no_div_check {
        config.div_guard = false;
    }
    if opts.no_opt || opts.ir {
        config.optimize = false;
    }

    if opts.lex {
        println!("{:?}", Lexer::new(src.as_str()).strict(config.strict).tokens()?);
        return Ok(());
    }

    if opts.parse {
        let items = Parser::new(Lexer::new(src.as_str()).strict(config.strict)).parse()?;
        println!("{:#?}", items);
        return Ok(());
    }

    let name = opts
        .path
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| "main".to_owned());
    let module = compile(&src, &name, &config)?;

    if opts.ir {
        module.emit(&mut std::io::stdout())?;
        return Ok(());
    }

    if opts.cfg {
        for function in &module.functions {
            if let Some(body) = &function.body {
                print!("{}", Cfg::new(body).to_graphviz(function));
            }
        }
        return Ok(());
    }

    match &opts.output {
        Some(output) => {
            let mut f = File::create(output)?;
            module.emit(&mut f)?;
            f.flush()?;
        }
        None => module.emit(&mut std::io::stdout())?,
    }

    Ok(())
}

#[derive(Debug, StructOpt)]
#[structopt(name = "novum", about = "Compiles .nv sources to textual SSA IR")]
struct Opt {
    path: PathBuf,

    /// Print the token stream and stop
    #[structopt(name = "lex", long)]
    lex: bool,

    /// Print the syntax tree and stop
    #[structopt(name = "parse", long)]
    parse: bool,

    /// Print the unoptimized IR and stop
    #[structopt(name = "ir", long)]
    ir: bool,

    /// Print each function's control-flow graph in dot format and stop
    #[structopt(name = "cfg", long)]
    cfg: bool,

    #[structopt(name = "no-opt", long)]
    no_opt: bool,

    /// Emit float divisions without the zero-divisor guard
    #[structopt(name = "no-div-check", long)]
    no_div_check: bool,

    /// Treat unterminated strings and comments as errors
    #[structopt(name = "strict", long)]
    strict: bool,

    /// Write the IR here instead of stdout
    #[structopt(name = "output", short, long, parse(from_os_str))]
    output: Option<PathBuf>,
}
