use std::path::PathBuf;
use std::process::exit;

use clap::{Parser, Subcommand};
use log::{error, info, warn, LevelFilter};

use gleaner::db::Db;
use gleaner::{extract, fetch, rss, Result};

const DEFAULT_DB_PATH: &str = "./db";

#[derive(Parser)]
#[command(author, version, about)]
struct Args {
    /// Verbosity (-v, -vv, ...). Default is warnings and errors only.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Seed a crawl from an RSS feed URL, inserting each unseen item link.
    Crawl {
        #[arg(long)]
        feed: String,
        #[arg(long)]
        db: Option<PathBuf>,
    },
    /// Fetch and insert a single URL.
    Insert {
        #[arg(long)]
        url: String,
        #[arg(long)]
        db: Option<PathBuf>,
    },
    /// Search for documents matching all of the given terms.
    Search {
        terms: Vec<String>,
        #[arg(long)]
        db: Option<PathBuf>,
    },
    /// List words within edit distance 2 of a prefix.
    Complete {
        prefix: String,
        #[arg(long)]
        db: Option<PathBuf>,
    },
}

fn db_path(explicit: Option<PathBuf>) -> PathBuf {
    explicit
        .or_else(|| std::env::var_os("GLEANER_DB").map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_DB_PATH))
}

fn main() {
    let args = Args::parse();

    let level = match args.verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        _ => LevelFilter::Debug,
    };
    stderrlog::new().verbosity(level).init().expect("logger already initialized");

    if let Err(e) = run(args.command) {
        error!("{e}");
        exit(1);
    }
}

fn run(command: Commands) -> Result<()> {
    match command {
        Commands::Crawl { feed, db } => crawl(&feed, db_path(db)),
        Commands::Insert { url, db } => insert_one(&url, db_path(db)),
        Commands::Search { terms, db } => search(&terms, db_path(db)),
        Commands::Complete { prefix, db } => complete(&prefix, db_path(db)),
    }
}

fn crawl(feed_url: &str, db_path: PathBuf) -> Result<()> {
    let feed = match fetch::get(feed_url) {
        Ok(page) => page,
        Err(e) => {
            warn!("unable to fetch feed {feed_url}: {e}");
            return Ok(());
        }
    };

    let items = match rss::parse(&feed.body) {
        Ok(items) => items,
        Err(e) => {
            warn!("unable to parse feed {feed_url}: {e}");
            return Ok(());
        }
    };

    info!("crawl: {} items in {feed_url}", items.len());
    for item in items {
        if item.link.is_empty() {
            continue;
        }
        if let Err(e) = insert_one(&item.link, db_path.clone()) {
            warn!("skipping {}: {e}", item.link);
        }
    }
    Ok(())
}

fn insert_one(url: &str, db_path: PathBuf) -> Result<()> {
    let mut db = Db::open(&db_path)?;

    let page = match fetch::get(url) {
        Ok(page) => page,
        Err(e) => {
            warn!("unable to fetch {url}: {e}");
            return Ok(());
        }
    };
    if !page.content_type.starts_with("text/html") {
        warn!("unable to parse {url}: unsupported content-type {}", page.content_type);
        return Ok(());
    }

    let fragments = extract::extract_text(&page.body);
    match db.insert(url, &fragments)? {
        Some(doc_id) => info!("inserted {url} as doc {doc_id}"),
        None => info!("{url} already indexed"),
    }
    Ok(())
}

fn search(terms: &[String], db_path: PathBuf) -> Result<()> {
    let db = Db::open(&db_path)?;
    let refs: Vec<&str> = terms.iter().map(String::as_str).collect();
    for hit in db.search(&refs)? {
        println!("{}\n\t{}\n", hit.url, hit.snippet);
    }
    Ok(())
}

fn complete(prefix: &str, db_path: PathBuf) -> Result<()> {
    let db = Db::open(&db_path)?;
    for word in db.complete(prefix)? {
        println!("{word}");
    }
    Ok(())
}
