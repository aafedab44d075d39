fn main() {
    if let Err(err) = eventdesk::cli::run() {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}
