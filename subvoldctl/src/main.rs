use clap::Clap;
use commands::{command_dispatch, CliOptions};

mod client;
mod commands;
mod ui;
mod wire;

fn main() {
    match CliOptions::try_parse() {
        Ok(options) => {
            let vcount = options.verbose as usize;
            subvold_app::run(|_| command_dispatch(options), vcount);
        }
        Err(e) => {
            let message = e.to_string();
            println!("{}", message.replace("error:", "ERRO:"));
            println!();
        }
    }
}
