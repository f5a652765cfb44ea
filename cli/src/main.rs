mod commands;
mod config;
mod logging;
mod server;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process;

use crate::commands::{
    cmd_dict_check, cmd_dict_list, cmd_dict_set, cmd_log_set, cmd_log_show, cmd_nutrition_list,
    cmd_nutrition_set, cmd_nutrition_show, cmd_report, json_error,
};
use crate::config::Config;
use nibble_core::service::NibbleService;

#[derive(Parser)]
#[command(
    name = "nibble",
    version,
    about = "A small nutrition tracker: log food, describe it, chart a nutrient"
)]
struct Cli {
    /// User token (looked up in users.json)
    #[arg(short, long, global = true, env = "NIBBLE_USER")]
    user: Option<String>,
    /// Data directory (default: platform data dir)
    #[arg(long, global = true, env = "NIBBLE_DATA_DIR", value_name = "PATH")]
    data_dir: Option<PathBuf>,
    /// Users file mapping tokens to names (default: <data-dir>/users.json)
    #[arg(long, global = true, value_name = "PATH")]
    users: Option<PathBuf>,
    /// Debug logging on stderr
    #[arg(short, long, global = true)]
    verbose: bool,
    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show or replace the food log of a day
    Log {
        #[command(subcommand)]
        command: LogCommands,
    },
    /// Show or replace nutrition rows of a food
    Nutrition {
        #[command(subcommand)]
        command: NutritionCommands,
    },
    /// Manage the food and nutrient dictionary
    Dict {
        #[command(subcommand)]
        command: DictCommands,
    },
    /// Amount of one nutrient per day and per food over a date range
    Report {
        /// First day (YYYY-MM-DD or today/yesterday; default: 30 days ago)
        #[arg(long)]
        from: Option<String>,
        /// Last day, inclusive (default: today)
        #[arg(long)]
        to: Option<String>,
        /// Nutrient to report on (anything but 'mass')
        #[arg(short, long)]
        nutrient: String,
    },
    /// Start the REST API server
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "8080")]
        port: u16,
        /// Address to bind to (default: 127.0.0.1, use 0.0.0.0 to expose to network)
        #[arg(short, long, default_value = "127.0.0.1")]
        bind: String,
    },
}

#[derive(Subcommand)]
enum LogCommands {
    /// Show the entries of a day
    Show {
        /// Date (YYYY-MM-DD or today/yesterday/tomorrow, default: today)
        #[arg(long)]
        date: Option<String>,
    },
    /// Replace the entries of a day (no entries clears it)
    Set {
        /// Date (YYYY-MM-DD or today/yesterday/tomorrow, default: today)
        #[arg(long)]
        date: Option<String>,
        /// Entries as food=grams (e.g. apple=150 "peanut butter=30g")
        entries: Vec<String>,
    },
}

#[derive(Subcommand)]
enum NutritionCommands {
    /// Show the rows of one food
    Show {
        /// Food name
        food: String,
    },
    /// Show the whole nutrition table
    List,
    /// Replace the rows of one food (include mass=<grams> as the reference)
    Set {
        /// Food name
        food: String,
        /// Rows as type=value (e.g. mass=100 calories=52)
        rows: Vec<String>,
    },
}

#[derive(Subcommand)]
enum DictCommands {
    /// List items of a type, or the whole dictionary
    List {
        /// food or nutrient (default: both)
        kind: Option<String>,
    },
    /// Replace every item of a type
    Set {
        /// food or nutrient
        kind: String,
        /// Item names
        items: Vec<String>,
    },
    /// List logged foods and nutrition types missing from the dictionary
    Check,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let json = cli.json;

    if let Err(e) = logging::init_tracing(cli.verbose) {
        eprintln!("Warning: {e:#}");
    }

    if let Err(e) = run(cli).await {
        if json {
            println!("{}", json_error(&format!("{e:#}")));
        } else {
            eprintln!("Error: {e:#}");
        }
        process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = Config::load(cli.data_dir, cli.users)?;
    let users = config.load_users()?;
    let json = cli.json;
    let open = || NibbleService::for_user(&config.data_dir, &users, cli.user.as_deref());

    match cli.command {
        Commands::Serve { port, bind } => {
            server::start_server(config.data_dir.clone(), users.clone(), port, &bind).await
        }
        Commands::Log { command } => {
            let svc = open()?;
            match command {
                LogCommands::Show { date } => cmd_log_show(&svc, date.as_deref(), json),
                LogCommands::Set { date, entries } => {
                    cmd_log_set(&svc, date.as_deref(), &entries, json)
                }
            }
        }
        Commands::Nutrition { command } => {
            let svc = open()?;
            match command {
                NutritionCommands::Show { food } => cmd_nutrition_show(&svc, &food, json),
                NutritionCommands::List => cmd_nutrition_list(&svc, json),
                NutritionCommands::Set { food, rows } => {
                    cmd_nutrition_set(&svc, &food, &rows, json)
                }
            }
        }
        Commands::Dict { command } => {
            let svc = open()?;
            match command {
                DictCommands::List { kind } => cmd_dict_list(&svc, kind.as_deref(), json),
                DictCommands::Set { kind, items } => cmd_dict_set(&svc, &kind, &items, json),
                DictCommands::Check => cmd_dict_check(&svc, json),
            }
        }
        Commands::Report { from, to, nutrient } => {
            let svc = open()?;
            cmd_report(&svc, from.as_deref(), to.as_deref(), &nutrient, json)
        }
    }
}
