//! Writes a synthetic event ticket CSV with the full input column set,
//! including a sprinkling of blanks, bad dates, duplicates and price outliers
//! so every cleaning rule has something to do.
use std::path::PathBuf;

use anyhow::Context;
use chrono::{Duration, NaiveDate};
use clap::Parser;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

use event_insights::constants::REQUIRED_COLUMNS;

const EVENTS: [(&str, &str, &str, f64); 8] = [
    ("Colombo Jazz Night", "Jazz", "Ceylon Live", 3.0),
    ("Galle Rock Fest", "Rock", "Island Beats", 6.0),
    ("Kandy Pop Parade", "Pop", "Island Beats", 4.0),
    ("Negombo Beach EDM", "EDM", "Sunset Events", 8.0),
    ("Classical Evenings", "Classical", "Heritage Arts", 2.5),
    ("Jaffna Folk Gathering", "Folk", "Heritage Arts", 3.5),
    ("Rock the Fort", "Rock", "Ceylon Live", 5.0),
    ("Summer Pop Splash", "Pop", "Sunset Events", 4.5),
];
const LOCATIONS: [&str; 6] = ["Colombo", "Kandy", "Galle", "Negombo", "Jaffna", "Matara"];
const TICKET_TYPES: [(&str, f64); 3] = [("General", 1.0), ("Early Bird", 0.8), ("VIP", 2.5)];
const FIRST_NAMES: [&str; 10] = [
    "Amal", "Nimali", "Kasun", "Dilini", "Ruwan", "Sanduni", "Tharindu", "Ishara", "Chamara", "Nadeesha",
];
const LAST_NAMES: [&str; 6] = ["Perera", "Silva", "Fernando", "Jayasinghe", "Bandara", "Wickramasinghe"];

#[derive(Parser)]
#[command(name = "generate-sample-data")]
#[command(about = "Generate a synthetic event ticket CSV")]
struct Args {
    /// Output CSV path
    #[arg(long, default_value = "data/event.csv")]
    output: PathBuf,

    /// Number of ticket rows
    #[arg(long, default_value_t = 1000)]
    rows: usize,

    /// RNG seed for reproducible output
    #[arg(long, default_value_t = 42)]
    seed: u64,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let mut rng = StdRng::seed_from_u64(args.seed);

    if let Some(parent) = args.output.parent() {
        std::fs::create_dir_all(parent).with_context(|| format!("creating {}", parent.display()))?;
    }
    let mut writer = csv::Writer::from_path(&args.output)
        .with_context(|| format!("opening {}", args.output.display()))?;
    writer.write_record(REQUIRED_COLUMNS)?;

    let season_start = NaiveDate::from_ymd_opt(2024, 8, 1).context("invalid season start")?;
    let mut previous: Option<Vec<String>> = None;

    for i in 0..args.rows {
        // Occasionally repeat the previous row verbatim.
        if let Some(row) = previous.as_ref().filter(|_| rng.gen_bool(0.01)) {
            writer.write_record(row)?;
            continue;
        }

        let (event, event_type, organizer, duration) = *EVENTS.choose(&mut rng).context("no events")?;
        let (ticket_type, multiplier) = *TICKET_TYPES.choose(&mut rng).context("no ticket types")?;
        let first = FIRST_NAMES.choose(&mut rng).context("no names")?;
        let last = LAST_NAMES.choose(&mut rng).context("no names")?;

        let date = if rng.gen_bool(0.005) {
            "not-a-date".to_string()
        } else {
            (season_start + Duration::days(rng.gen_range(0..61))).format("%Y-%m-%d").to_string()
        };
        let age = if rng.gen_bool(0.03) {
            String::new()
        } else {
            rng.gen_range(14..90).to_string()
        };
        let gender = match rng.gen_range(0..100) {
            0..=47 => "Male",
            48..=95 => "Female",
            _ => "Other",
        };
        let contact = if rng.gen_bool(0.05) {
            String::new()
        } else {
            format!("{}.{}@example.com", first.to_lowercase(), last.to_lowercase())
        };
        let base_price = rng.gen_range(1500.0..5000.0) * multiplier;
        let price = if rng.gen_bool(0.01) { base_price * 20.0 } else { base_price };

        let row = vec![
            event.to_string(),
            event_type.to_string(),
            organizer.to_string(),
            date,
            format!("{first} {last}"),
            age,
            gender.to_string(),
            contact,
            LOCATIONS.choose(&mut rng).context("no locations")?.to_string(),
            format!("TKT-{:06}", i + 1),
            ticket_type.to_string(),
            format!("{:.2}", price),
            format!("{:.1}", duration),
        ];
        writer.write_record(&row)?;
        previous = Some(row);
    }

    writer.flush()?;
    println!("✅ Wrote {} rows to {}", args.rows, args.output.display());
    Ok(())
}
