fn main() {
    let exit_code = match redo::run::run() {
        Ok(code) => code,
        Err(err) => {
            eprintln!("redo: error: {:#}", err);
            1
        }
    };
    if exit_code != 0 {
        std::process::exit(exit_code);
    }
}
