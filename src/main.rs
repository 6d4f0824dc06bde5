// ----------------------------
// File: src/main.rs
// ----------------------------

use std::env;
use std::fs;
use std::process;

use dolme::back;
use dolme::color;
use dolme::interp::Interpreter;

struct Options {
    verbose: bool,
    interpret: bool,
    compile_native: bool,
    no_color: bool,
    target_arch: String,
    output_file: String,
    source_file: Option<String>,
}

fn usage(program: &str) {
    println!("Usage: {program} [options] <file>");
    println!("Options:");
    println!("  -h            Show help");
    println!("  -v            Verbose mode (dump generated three-address code)");
    println!("  -r            Run with interpreter");
    println!("  -c            Compile to binary");
    println!("  -n            No color");
    println!("  -a <arch>     Target architecture (default arm64-macos)");
    println!("  -o <file>     Output binary name (default a.out)");
}

fn parse_args(program: &str, args: Vec<String>) -> Options {
    let mut opts = Options {
        verbose: false,
        interpret: false,
        compile_native: false,
        no_color: false,
        target_arch: "arm64-macos".to_string(),
        output_file: "a.out".to_string(),
        source_file: None,
    };

    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "-h" => {
                usage(program);
                process::exit(0);
            }
            "-v" => {
                opts.verbose = true;
                i += 1;
            }
            "-r" => {
                opts.interpret = true;
                i += 1;
            }
            "-c" => {
                opts.compile_native = true;
                i += 1;
            }
            "-n" => {
                opts.no_color = true;
                i += 1;
            }
            "-a" => {
                if i + 1 >= args.len() {
                    eprintln!("{program}: error: -a requires a value");
                    process::exit(1);
                }
                opts.target_arch = args[i + 1].clone();
                i += 2;
            }
            "-o" => {
                if i + 1 >= args.len() {
                    eprintln!("{program}: error: -o requires a value");
                    process::exit(1);
                }
                opts.output_file = args[i + 1].clone();
                i += 2;
            }
            s if s.starts_with('-') => {
                eprintln!("{program}: error: unknown option: {s}");
                process::exit(1);
            }
            s => {
                if opts.source_file.is_some() {
                    eprintln!("{program}: error: multiple input files not supported");
                    process::exit(1);
                }
                opts.source_file = Some(s.to_string());
                i += 1;
            }
        }
    }

    opts
}

fn render(d: &dolme::Diagnostic) -> String {
    format!(
        "{} at {}",
        color::red(&d.message),
        color::yellow(&format!("Line: {}, Column {}", d.pos.line, d.pos.col))
    )
}

fn main() {
    let mut args: Vec<String> = env::args().collect();
    let program = args.remove(0);

    let opts = parse_args(&program, args);
    if opts.no_color {
        color::set_enabled(false);
    }

    let Some(source_file) = opts.source_file.as_deref() else {
        eprintln!("{program}: error: no input file provided (see {program} -h)");
        process::exit(1);
    };

    let source = match fs::read_to_string(source_file) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("{program}: error: could not read {source_file}: {e}");
            process::exit(1);
        }
    };

    let compilation = dolme::compile(&source);

    if !compilation.syntax_errors.is_empty() {
        println!("{}", color::bright_red("=== Syntax Errors ==="));
        println!("{}", render(&compilation.syntax_errors[0]));
        process::exit(1);
    }

    if !compilation.semantic_errors.is_empty() {
        println!("{}", color::bright_red("=== Semantic Errors ==="));
        println!("{}", render(&compilation.semantic_errors[0]));
        process::exit(1);
    }

    if opts.verbose {
        println!("{}", color::green("\n=== Generated Three-Address Code ==="));
        if compilation.instructions.is_empty() {
            println!("{}", color::gray("No code generated."));
        } else {
            for (i, ins) in compilation.instructions.iter().enumerate() {
                let part = |a: &Option<dolme::Operand>| {
                    a.as_ref().map(|o| o.to_string()).unwrap_or_default()
                };
                println!(
                    "{}: ({}, {}, {}, {})",
                    color::cyan(&i.to_string()),
                    color::yellow(&ins.op.to_string()),
                    color::blue(&part(&ins.arg1)),
                    color::blue(&part(&ins.arg2)),
                    color::blue(&part(&ins.arg3)),
                );
            }
        }
    }

    if opts.compile_native {
        let mut arch = match back::for_target(
            &opts.target_arch,
            &compilation.instructions,
            &compilation.types,
            &opts.output_file,
        ) {
            Ok(a) => a,
            Err(e) => {
                eprintln!("{program}: error: {e}");
                process::exit(1);
            }
        };

        if let Err(e) = arch.generate() {
            eprintln!("{program}: error: assembly generation failed: {e}");
            process::exit(1);
        }

        if opts.verbose {
            println!("{}", color::green("\nGenerated Assembly code"));
            println!("{}", arch.code());
        }

        if let Err(e) = arch.build() {
            eprintln!("{program}: error: assembly build failed: {e}");
            process::exit(1);
        }
    }

    if opts.interpret {
        println!("{}", color::green("\n=== Program Output ==="));
        let mut it = Interpreter::new(&compilation.instructions);
        if let Err(e) = it.run() {
            eprintln!("{program}: error: interpretation failed: {e}");
            process::exit(1);
        }
    }
}
