fn main() {
    let cli = dep_tree::cli::parse();
    let code = dep_tree::app::run_cli(cli);
    if code != 0 {
        std::process::exit(code);
    }
}
