//! usd-io CLI - inspect stages saved as JSON.

use std::env;

use tracing_subscriber::EnvFilter;
use usd_io::core::TimeCode;
use usd_io::stage::{MemoryStage, SceneBackend};
use usd_io::SdfPath;

fn init_logging(level: &str) {
    // RUST_LOG wins over the flags when set.
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();
}

fn main() {
    let args: Vec<String> = env::args().collect();

    let mut level = "info";
    let mut filtered_args: Vec<&str> = Vec::new();
    for arg in &args[1..] {
        match arg.as_str() {
            "-v" | "--verbose" => level = "debug",
            "-vv" | "--trace" => level = "trace",
            "-q" | "--quiet" => level = "error",
            _ => filtered_args.push(arg),
        }
    }
    init_logging(level);

    if filtered_args.is_empty() {
        print_help();
        return;
    }

    match filtered_args[0] {
        "info" | "i" => {
            let Some(file) = filtered_args.get(1) else {
                usage("info <stage.json>");
            };
            cmd_info(file);
        }
        "tree" | "t" => {
            let Some(file) = filtered_args.get(1) else {
                usage("tree <stage.json>");
            };
            cmd_tree(file);
        }
        "dump" | "d" => {
            let Some(file) = filtered_args.get(1) else {
                usage("dump <stage.json> [path-pattern]");
            };
            cmd_dump(file, filtered_args.get(2).copied());
        }
        "help" | "h" | "-h" | "--help" => print_help(),
        other if other.ends_with(".json") => cmd_info(other),
        other => {
            eprintln!("Unknown command: {other}");
            print_help();
            std::process::exit(1);
        }
    }
}

fn usage(args: &str) -> ! {
    eprintln!("Error: missing file argument");
    eprintln!("Usage: usd-io {args}");
    std::process::exit(1);
}

fn print_help() {
    println!("usd-io - inspect serialized stages");
    println!();
    println!("USAGE:");
    println!("    usd-io [OPTIONS] <COMMAND> [ARGS]");
    println!();
    println!("COMMANDS:");
    println!("    i, info  <file>              Show layer settings and prim count");
    println!("    t, tree  <file>              Show the prim hierarchy with types");
    println!("    d, dump  <file> [pattern]    Dump attributes, defaults and time samples");
    println!("    h, help                      Show this help");
    println!();
    println!("OPTIONS:");
    println!("    -v, --verbose    Show debug output");
    println!("    -vv, --trace     Show trace output (very verbose)");
    println!("    -q, --quiet      Only show errors");
    println!();
    println!("NOTES:");
    println!("    - Passing a .json file directly is equivalent to 'info'");
    println!("    - RUST_LOG overrides the verbosity flags");
}

fn open(path: &str) -> MemoryStage {
    tracing::debug!("opening stage: {path}");
    match MemoryStage::open(path) {
        Ok(stage) => stage,
        Err(e) => {
            eprintln!("Failed to open {path}: {e}");
            std::process::exit(1);
        }
    }
}

fn cmd_info(path: &str) {
    let stage = open(path);
    let layer = stage.layer();

    println!("Stage: {path}");
    println!("Time range:      {} .. {}", layer.start_time_code, layer.end_time_code);
    println!("Frames/second:   {}", layer.frames_per_second);
    println!("Up axis:         {:?}", layer.up_axis);
    println!("Meters per unit: {}", layer.meters_per_unit);
    println!("Interpolation:   {:?}", layer.interpolation);
    println!();

    let paths = stage.prim_paths();
    let typed = paths.iter().filter(|p| stage.prim_type_name(p).is_some()).count();
    let attributes: usize = paths.iter().map(|p| stage.attribute_names(p).len()).sum();
    println!("Prims:      {} ({typed} typed)", stage.prim_count());
    println!("Attributes: {attributes}");
}

fn cmd_tree(path: &str) {
    let stage = open(path);
    println!("/");
    for prim in stage.prim_paths() {
        let depth = prim.prefixes().len();
        let indent = "  ".repeat(depth);
        match stage.prim_type_name(&prim) {
            Some(type_name) => println!("{indent}{} [{type_name}]", prim.name()),
            None => println!("{indent}{}", prim.name()),
        }
    }
}

fn cmd_dump(path: &str, pattern: Option<&str>) {
    let stage = open(path);
    for prim in stage.prim_paths() {
        if pattern.is_some_and(|p| !prim.as_str().contains(p)) {
            continue;
        }
        println!("{prim}");
        dump_prim(&stage, &prim);
        println!();
    }
}

fn dump_prim(stage: &MemoryStage, prim: &SdfPath) {
    for name in stage.attribute_names(prim) {
        let Some(attr) = stage.get_attribute(prim, &name) else {
            continue;
        };
        let type_name = stage
            .attribute_type_name(&attr)
            .map(|t| t.name().to_string())
            .unwrap_or_default();
        println!("  {type_name} {name}");

        if let Ok(Some(value)) = stage.get_value(&attr, TimeCode::Default) {
            println!("    default: {value:?}");
        }
        for time in stage.time_samples(&attr) {
            if let Ok(Some(value)) = stage.get_value(&attr, TimeCode::Time(time)) {
                println!("    {time}: {value:?}");
            }
        }
        let connections = stage.get_connections(&attr);
        if !connections.is_empty() {
            let sources: Vec<&str> = connections.iter().map(|c| c.as_str()).collect();
            println!("    connected: {}", sources.join(", "));
        }
    }
    for name in stage.relationship_names(prim) {
        let Some(rel) = stage.get_relationship(prim, &name) else {
            continue;
        };
        let targets: Vec<String> = stage.get_targets(&rel).iter().map(|t| t.to_string()).collect();
        println!("  rel {name} = [{}]", targets.join(", "));
    }
}
