//! Routine dispatcher for the snow simulator.
//!
//! Usage: `snow <routine> [args...]`. Unknown routines exit with status 1.

use std::process::exit;

use snow::scenes;

const ROUTINES: &[&str] = &[
    "info",
    "sim-gen-snowball",
    "sim-gen-slab",
    "sim-scene0",
    "sim-scene1",
];

fn usage() {
    println!("Usage: snow <routine> [args...]");
    println!("Available routines:");
    for routine in ROUTINES {
        println!("* {routine}");
    }
}

fn main() {
    env_logger::init();

    let args: Vec<String> = std::env::args().collect();
    let Some(routine) = args.get(1) else {
        usage();
        exit(1);
    };
    let rest = &args[2..];

    let result = match routine.as_str() {
        "info" => scenes::info(rest),
        "sim-gen-snowball" => scenes::gen_snowball(rest),
        "sim-gen-slab" => scenes::gen_slab(rest),
        "sim-scene0" => scenes::sim_scene0(rest),
        "sim-scene1" => scenes::sim_scene1(rest),
        _ => {
            println!("Routine {routine} not found");
            usage();
            exit(1);
        }
    };

    if let Err(err) = result {
        eprintln!("{routine}: {err}");
        exit(1);
    }
}
