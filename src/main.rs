//! storesql - command-line SQL runner
//!
//! Executes SQL against a named database, either from the remaining
//! command-line arguments or line by line from stdin.
//!
//! ```text
//! storesql -d ./data -D app "CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT)"
//! echo "CREATE TABLE t (a INTEGER)" | storesql -D app
//! ```

use std::io::{self, BufRead};
use std::path::PathBuf;

use log::{error, info};

use storesql::{Config, Connection, Driver, ParserConfig, StorageEngine};

async fn run_sql(conn: &mut Connection<StorageEngine>, sql: &str) {
    match conn.query(sql).await {
        Ok(mut result) => {
            while let Some(row) = result.next_row() {
                println!("{}", row);
            }
            println!("OK (version {})", conn.version().unwrap_or(0));
        }
        Err(e) => {
            error!("{}", e);
            eprintln!("{}", e);
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or("info")
    ).init();

    let args: Vec<String> = std::env::args().collect();

    let mut config = Config::default();
    let mut database = String::from("main");
    let mut statements = Vec::new();

    // Simple argument parsing
    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--data-dir" | "-d" => {
                if i + 1 < args.len() {
                    config.data_dir = Some(PathBuf::from(&args[i + 1]));
                    i += 1;
                }
            }
            "--database" | "-D" => {
                if i + 1 < args.len() {
                    database = args[i + 1].clone();
                    i += 1;
                }
            }
            "--mysql" => {
                config.parser = ParserConfig::mysql();
            }
            "--help" | "-h" => {
                println!("storesql - SQL on a versioned object store");
                println!();
                println!("Usage: storesql [OPTIONS] [SQL]...");
                println!();
                println!("Options:");
                println!("  -d, --data-dir DIR    Persist databases in DIR (default: in memory)");
                println!("  -D, --database NAME   Database to open (default: main)");
                println!("      --mysql           Treat \"...\" as string literals");
                println!("  -h, --help            Show this help");
                println!();
                println!("Without SQL arguments, statements are read from stdin, one per line.");
                return Ok(());
            }
            sql => statements.push(sql.to_string()),
        }
        i += 1;
    }

    let driver = Driver::new(config)?;
    let mut conn = driver.create_connection(&database)?;
    conn.connect().await?;

    if statements.is_empty() {
        info!("reading SQL from stdin");
        for line in io::stdin().lock().lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            run_sql(&mut conn, &line).await;
        }
    } else {
        for sql in &statements {
            run_sql(&mut conn, sql).await;
        }
    }

    conn.close();
    Ok(())
}
