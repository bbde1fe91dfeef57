fn main() {
    if let Err(err) = store_lookup::run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}
