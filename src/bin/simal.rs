//! Command-line interface for SiMAL.
//!
//! Parses a `.simal`/`.siml` schema file and writes its JSON lowerings
//! next to it. With no flags both the full and the simple form are
//! emitted; each flag restricts output to one form.
//!
//! Usage:
//!   simal <path>                - write `<name>.json` and `<name>_simple.json`
//!   simal <path> --json         - write `<name>.json` only
//!   simal <path> --simple       - write `<name>_simple.json` only
//!   simal <path> --max-simple   - write `<name>_max_simple.json` only

use clap::{Arg, ArgAction, Command};
use simal_core::analyze;
use std::path::Path;

fn main() {
    let matches = Command::new("simal")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Parse SiMAL schemas and convert them to JSON formats")
        .arg(
            Arg::new("path")
                .help("Path to a .simal/.siml schema file")
                .required(true)
                .index(1),
        )
        .arg(
            Arg::new("json")
                .long("json")
                .help("Emit full JSON only (<name>.json)")
                .action(ArgAction::SetTrue)
                .conflicts_with_all(["simple", "max-simple"]),
        )
        .arg(
            Arg::new("simple")
                .long("simple")
                .help("Emit simplified JSON only (<name>_simple.json)")
                .action(ArgAction::SetTrue)
                .conflicts_with("max-simple"),
        )
        .arg(
            Arg::new("max-simple")
                .long("max-simple")
                .help("Emit max-simplified JSON only (<name>_max_simple.json)")
                .action(ArgAction::SetTrue),
        )
        .get_matches();

    let path = matches.get_one::<String>("path").expect("path is required");
    let content = std::fs::read_to_string(path).unwrap_or_else(|e| {
        eprintln!("Cannot read {path}: {e}");
        std::process::exit(1);
    });

    let analysis = match analyze(&content, path) {
        Ok(analysis) => analysis,
        Err(err) => {
            eprintln!("{:?}", miette::Report::new(err));
            std::process::exit(1);
        }
    };

    let base = Path::new(path).with_extension("");
    let base = base.to_string_lossy();

    let full = matches.get_flag("json");
    let simple = matches.get_flag("simple");
    let max_simple = matches.get_flag("max-simple");
    let any_flag = full || simple || max_simple;

    if full || !any_flag {
        write_output(&format!("{base}.json"), analysis.to_json());
    }
    if simple || !any_flag {
        write_output(&format!("{base}_simple.json"), analysis.to_simple_json());
    }
    if max_simple {
        write_output(
            &format!("{base}_max_simple.json"),
            analysis.to_max_simple_json(),
        );
    }
}

fn write_output(path: &str, rendered: Result<String, serde_json::Error>) {
    let contents = rendered.unwrap_or_else(|e| {
        eprintln!("Serialization error: {e}");
        std::process::exit(1);
    });
    std::fs::write(path, contents).unwrap_or_else(|e| {
        eprintln!("Cannot write {path}: {e}");
        std::process::exit(1);
    });
    println!("wrote {path}");
}
