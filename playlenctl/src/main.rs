use clap::Parser;

fn main() {
    let cli = playlenctl::Cli::parse();
    if let Err(err) = playlenctl::run(cli) {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}
