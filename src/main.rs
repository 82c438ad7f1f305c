fn main() {
    if let Err(e) = clinic_ops_lib::run() {
        eprintln!("{e}");
        std::process::exit(1);
    }
}
