mod cli;

use clap::{Parser, Subcommand};
use cli::{args::Args, op::Op, Bootstrap, Fetch, Init, Register, Revoke, Serve, Version};

command_enum! {
    (Init, Init),
    (Serve, Serve),
    (Register, Register),
    (Bootstrap, Bootstrap),
    (Revoke, Revoke),
    (Fetch, Fetch),
    (Version, Version),
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    let ctx = cli::op::OpContext::new(args.config_path);

    match args.command.execute(&ctx).await {
        Ok(output) => {
            println!("{}", output);
            std::process::exit(0);
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }
}
