use std::path::PathBuf;

use clap::Parser;

/// A CLI tool that watches 12306 for leftover tickets and books one.
/// Run the program without flags to be guided through the whole flow.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Args {
    /// Path to the YAML credentials/config file
    #[arg(long, short = 'c', value_name = "FILE", default_value = "config.yml")]
    pub config: PathBuf,

    /// Path to the city -> station-code JSON table
    #[arg(long, value_name = "FILE", default_value = "cities.json")]
    pub cities: PathBuf,

    /// Travel date (YYYY-MM-DD)
    #[arg(long, short = 'd', value_name = "DATE")]
    pub date: Option<String>,

    /// Origin city name (as written in the city table)
    #[arg(long, short = 'f', value_name = "CITY")]
    pub from: Option<String>,

    /// Destination city name (as written in the city table)
    #[arg(long, short = 't', value_name = "CITY")]
    pub to: Option<String>,

    /// 1-based row number of the train to buy, as shown in the query table
    #[arg(long, short = 'n', value_name = "NUMBER")]
    pub train: Option<usize>,

    /// WebDriver endpoint of a running chromedriver
    #[arg(long, value_name = "URL", default_value = "http://localhost:9515")]
    pub webdriver: String,

    /// Attach to an already-running Chrome via its remote debugging address
    /// (e.g. 127.0.0.1:9333) instead of letting chromedriver launch one
    #[arg(long, value_name = "HOST:PORT")]
    pub attach: Option<String>,

    /// Run the browser headless
    #[arg(long)]
    pub headless: bool,

    /// List the cities known to the city table
    #[arg(long)]
    pub list_cities: bool,
}
