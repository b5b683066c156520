use std::env;
use std::process::exit;

#[tokio::main]
async fn main() {
    let exit_code = glacier_purge::main_rs(env::args_os()).await;

    exit(exit_code);
}
