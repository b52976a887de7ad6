use clap::Parser;
use std::fs::File;
use std::io::BufWriter;
use std::process::exit;
use triangle::codegen::writer::ObjectWriter;
use triangle::Error;

#[derive(Debug, clap::Parser)]
#[clap(author, version, about)]
struct Args {
    /// Triangle source file
    input: String,

    /// Output object file
    #[clap(short, long, default_value = "obj.tam")]
    output: String,

    /// Print the final instruction listing
    #[clap(short, long)]
    verbose: bool,
}

fn main() {
    let args = Args::parse();

    let source = match std::fs::read_to_string(&args.input) {
        Ok(source) => source,
        Err(e) => {
            eprintln!("failed to read {}: {}", args.input, e);
            exit(1);
        }
    };

    let instructions = match triangle::compile(&source) {
        Ok(instructions) => instructions,
        Err(Error::Semantic(errors)) => {
            for error in &errors {
                eprintln!("error: {error}");
            }
            exit(1);
        }
        Err(e) => {
            eprintln!("error: {e}");
            exit(1);
        }
    };

    if args.verbose {
        for (index, instruction) in instructions.iter().enumerate() {
            println!("{index:4}: {instruction}");
        }
    }

    let file = match File::create(&args.output) {
        Ok(file) => file,
        Err(e) => {
            eprintln!("failed to create {}: {}", args.output, e);
            exit(1);
        }
    };
    if let Err(e) = ObjectWriter::new(BufWriter::new(file)).write(&instructions) {
        eprintln!("failed to write {}: {}", args.output, e);
        exit(1);
    }
}
