// nala - A bytecode compiler and virtual machine for the Nala programming language
// Copyright (c) 2025 Tom Waddington. MIT licensed.

use std::env;
use std::fs;
use std::io::{self, Write};
use std::path::Path;
use std::process;

use nala_core::BUILTINS;
use nala_parser::{Lexer, Parser, Program};
use nala_vm::{Compiler, SymbolTable, VM};

const PROMPT: &str = "=> ";

fn main() {
    let args: Vec<String> = env::args().collect();

    // Handle --version flag
    if args.len() == 2 && (args[1] == "--version" || args[1] == "-v") {
        println!("Nala v0.1.0");
        return;
    }

    if args.len() > 1 {
        run_files(&args[1..]);
    } else {
        run_repl();
    }
}

/// Compile and run a sequence of source files.
fn run_files(files: &[String]) {
    for file_path in files {
        if let Err(e) = run_file(file_path) {
            eprintln!("{}", e);
            process::exit(1);
        }
    }
}

/// Compile and run a single source file.
fn run_file(file_path: &str) -> Result<(), String> {
    let path = Path::new(file_path);

    // Validate file extension
    match path.extension().and_then(|e| e.to_str()) {
        Some("nl") => {}
        Some(ext) => {
            return Err(format!(
                "Error: unsupported file extension '.{}' for '{}'",
                ext, file_path
            ));
        }
        None => {
            return Err(format!(
                "Error: file '{}' has no extension (expected .nl)",
                file_path
            ));
        }
    }

    let source =
        fs::read_to_string(path).map_err(|e| format!("Error reading '{}': {}", file_path, e))?;

    let program = parse_source(&source).map_err(|errors| {
        format!(
            "Parse errors in '{}':\n\t{}",
            file_path,
            errors.join("\n\t")
        )
    })?;

    let mut compiler = Compiler::new();
    compiler
        .compile(&program)
        .map_err(|e| format!("compiler error: {}", e))?;

    let mut machine = VM::new(compiler.byte_code());
    machine.run().map_err(|e| format!("vm error: {}", e))?;
    Ok(())
}

/// Run the interactive REPL, accumulating definitions across inputs by
/// carrying the symbol table, constant pool and globals between runs.
fn run_repl() {
    println!("Nala v0.1.0");

    let mut symbol_table = SymbolTable::new();
    for (index, builtin) in BUILTINS.iter().enumerate() {
        symbol_table.define_builtin(index, builtin.name);
    }
    let mut constants = Vec::new();
    let mut globals = VM::new_globals();

    loop {
        print!("{}", PROMPT);
        if io::stdout().flush().is_err() {
            break;
        }

        let mut input = String::new();
        match io::stdin().read_line(&mut input) {
            Ok(0) => {
                println!();
                break;
            }
            Ok(_) => {
                let input = input.trim();
                if input.is_empty() {
                    continue;
                }
                if input == ".q" {
                    break;
                }
                if input == ".sb" {
                    for builtin in BUILTINS {
                        println!("{}: {}", builtin.name, builtin.desc);
                    }
                    continue;
                }

                let program = match parse_source(input) {
                    Ok(program) => program,
                    Err(errors) => {
                        eprintln!(" parser errors:");
                        for error in errors {
                            eprintln!("\t{}", error);
                        }
                        continue;
                    }
                };

                let mut compiler = Compiler::new_with_state(symbol_table, constants);
                let compiled = compiler.compile(&program);
                let byte_code = compiler.byte_code();
                (symbol_table, constants) = compiler.into_state();

                if let Err(e) = compiled {
                    eprintln!("compiler error: {}", e);
                    continue;
                }

                let mut machine = VM::new_with_globals(byte_code, globals);
                match machine.run() {
                    Ok(()) => println!("{}", machine.last_popped_element()),
                    Err(e) => eprintln!("vm error: {}", e),
                }
                globals = machine.into_globals();
            }
            Err(e) => {
                eprintln!("Read error: {}", e);
                break;
            }
        }
    }
}

fn parse_source(source: &str) -> Result<Program, Vec<String>> {
    let mut parser = Parser::new(Lexer::new(source));
    let program = parser.parse_program();
    if parser.errors().is_empty() {
        Ok(program)
    } else {
        Err(parser.errors().to_vec())
    }
}
