use fuzzeval::run_main;

fn main() {
    if let Err(e) = run_main() {
        eprintln!("ERROR: {e}");
        std::process::exit(1);
    }
}
