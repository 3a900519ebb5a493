//! SlotDB CLI
//!
//! Command-line interface for a store of `Country` records.

use std::time::{SystemTime, UNIX_EPOCH};

use clap::{Args as ClapArgs, Parser, Subcommand};
use slotdb::{Config, Country, Record, RecordStore, Result};
use tracing_subscriber::{fmt, EnvFilter};

/// SlotDB CLI
#[derive(Parser, Debug)]
#[command(name = "slotdb-cli")]
#[command(about = "CLI for a SlotDB record store of countries")]
#[command(version)]
struct Args {
    /// Data directory
    #[arg(short, long, default_value = "./slotdb_data")]
    data_dir: String,

    /// Store name (base name of the .db/.idx files)
    #[arg(short, long, default_value = "countries")]
    name: String,

    /// fsync after every write
    #[arg(long)]
    sync: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create a country and print its id
    Create(CountryFields),

    /// Get a country by id
    Get {
        /// The id to read
        id: i32,
    },

    /// Update fields of an existing country
    Update {
        /// The id to update
        id: i32,

        #[command(flatten)]
        fields: CountryPatch,
    },

    /// Delete a country by id
    Delete {
        /// The id to delete
        id: i32,
    },

    /// List every live country in file order
    List,

    /// List countries whose name contains a substring (case-insensitive)
    Search {
        /// Substring to look for
        pattern: String,
    },

    /// Show the free list
    FreeList,

    /// Rebuild the index from the data file
    Reindex,
}

#[derive(ClapArgs, Debug)]
struct CountryFields {
    /// Country name
    #[arg(long)]
    name: String,

    /// Population
    #[arg(long)]
    population: i64,

    /// Ranking by population
    #[arg(long, default_value = "0")]
    rank: i32,

    /// Inhabitants per km²
    #[arg(long, default_value = "0")]
    density: f32,

    /// Area in km²
    #[arg(long, default_value = "0")]
    area: f32,

    /// Comma-separated list of the largest cities
    #[arg(long, value_delimiter = ',')]
    cities: Vec<String>,
}

#[derive(ClapArgs, Debug)]
struct CountryPatch {
    #[arg(long)]
    name: Option<String>,

    #[arg(long)]
    population: Option<i64>,

    #[arg(long)]
    rank: Option<i32>,

    #[arg(long)]
    density: Option<f32>,

    #[arg(long)]
    area: Option<f32>,

    /// Comma-separated list replacing the largest cities
    #[arg(long, value_delimiter = ',')]
    cities: Option<Vec<String>>,
}

fn main() {
    // Initialize tracing/logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,slotdb=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let config = Config::builder()
        .data_dir(&args.data_dir)
        .name(&args.name)
        .sync_writes(args.sync)
        .build();

    let mut store = match RecordStore::<Country>::open(config) {
        Ok(s) => s,
        Err(e) => {
            tracing::error!("Failed to open store: {}", e);
            std::process::exit(1);
        }
    };

    let outcome = run(&mut store, args.command);
    let closed = store.close();

    if let Err(e) = outcome.and(closed) {
        tracing::error!("Command failed: {}", e);
        std::process::exit(1);
    }
}

fn run(store: &mut RecordStore<Country>, command: Commands) -> Result<()> {
    match command {
        Commands::Create(fields) => {
            let mut country = Country {
                id: 0,
                rank: fields.rank,
                name: fields.name,
                population: fields.population,
                density: fields.density,
                area: fields.area,
                updated_at: now_secs(),
                largest_cities: fields.cities,
            };
            let id = store.create(&mut country)?;
            println!("{}", id);
        }
        Commands::Get { id } => match store.read(id)? {
            Some(country) => print_country(&country),
            None => println!("(not found)"),
        },
        Commands::Update { id, fields } => {
            let Some(mut country) = store.read(id)? else {
                println!("(not found)");
                return Ok(());
            };
            apply_patch(&mut country, fields);
            country.updated_at = now_secs();
            if store.update(&country)? {
                println!("OK");
            } else {
                println!("(not found)");
            }
        }
        Commands::Delete { id } => {
            if store.delete(id)? {
                println!("OK");
            } else {
                println!("(not found)");
            }
        }
        Commands::List => {
            for country in store.scan_all()? {
                print_country(&country);
            }
        }
        Commands::Search { pattern } => {
            let needle = pattern.to_lowercase();
            for country in store.find(|c| c.name.to_lowercase().contains(&needle))? {
                print_country(&country);
            }
        }
        Commands::FreeList => {
            for slot in store.free_list()? {
                println!("offset={} capacity={}", slot.offset, slot.capacity);
            }
        }
        Commands::Reindex => {
            let count = store.rebuild_index()?;
            println!("Indexed {} records", count);
        }
    }
    Ok(())
}

fn apply_patch(country: &mut Country, patch: CountryPatch) {
    if let Some(name) = patch.name {
        country.name = name;
    }
    if let Some(population) = patch.population {
        country.population = population;
    }
    if let Some(rank) = patch.rank {
        country.rank = rank;
    }
    if let Some(density) = patch.density {
        country.density = density;
    }
    if let Some(area) = patch.area {
        country.area = area;
    }
    if let Some(cities) = patch.cities {
        country.largest_cities = cities;
    }
}

fn print_country(country: &Country) {
    println!(
        "#{} {} (rank {}) population={} density={} area={} updated_at={} cities=[{}]",
        country.id(),
        country.name,
        country.rank,
        country.population,
        country.density,
        country.area,
        country.updated_at,
        country.largest_cities.join(", ")
    );
}

fn now_secs() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}
