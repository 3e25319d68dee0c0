use clap::Parser;

mod cli;
pub mod exit_codes;

use cli::args::Cli;

#[tokio::main(flavor = "multi_thread")]
async fn main() {
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "info");
    }
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let code = match cli::run::run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("fatal: {e:?}");
            exit_codes::CONFIG_ERROR
        }
    };
    std::process::exit(code);
}
