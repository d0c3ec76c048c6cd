use clap::Parser;
use colored::Colorize;

use grab12306::cli::Args;
use grab12306::run;
use grab12306::schema::StationMap;

fn show_cities(args: &Args) {
    match StationMap::load(&args.cities) {
        Ok(stations) => {
            for (i, name) in stations.names().into_iter().enumerate() {
                println!("{}: {} ({})", i + 1, name, stations.code(name).unwrap_or(""));
            }
        }
        Err(err) => eprintln!("{} {err:#}", "[X]".red()),
    }
}

#[tokio::main]
async fn main() {
    env_logger::init();
    let args = Args::parse();

    if args.list_cities {
        show_cities(&args);
        return;
    }

    tokio::spawn(async {
        if tokio::signal::ctrl_c().await.is_ok() {
            println!("\n{} 用户强制中断程序。", "[!]".yellow());
            std::process::exit(130);
        }
    });

    if let Err(err) = run(args).await {
        eprintln!("{} {err:#}", "[X]".red());
        std::process::exit(1);
    }
}
