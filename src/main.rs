//! Alist Gallery CLI
//!
//! Small operating shell over the library: resolves configuration from the
//! environment, wires store, cache, client and gallery together explicitly,
//! and runs one subcommand against a live Alist instance.

use std::env;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use alist_gallery::alist::{AlistClient, HttpAlistApi};
use alist_gallery::cache::{DurableStore, MemoryStore, RedisStore, TieredCache};
use alist_gallery::config::Config;
use alist_gallery::gallery::Gallery;

/// CLI command
#[derive(Debug)]
enum Command {
    /// Print one page of the album catalog
    Albums {
        page: usize,
        page_size: Option<usize>,
    },
    /// Print a directory listing
    List { path: String },
    /// Print one file's detail
    File { path: String },
    /// Upload a local file into a remote directory
    Upload { local: PathBuf, remote_dir: String },
    /// Delete a remote file
    Delete { path: String },
    /// Show help
    Help,
}

fn print_help() {
    eprintln!(
        r#"Alist Gallery - tiered-cache backend for an Alist photo gallery

USAGE:
    alist-gallery albums [page] [page-size]
    alist-gallery list <path>
    alist-gallery file <path>
    alist-gallery upload <local-file> <remote-dir>
    alist-gallery delete <path>
    alist-gallery help

COMMANDS:
    albums  Print one page of the album catalog
    list    Print a directory listing from the file host
    file    Print one file's detail, including its download URL
    upload  Upload a local file into a remote directory
    delete  Delete a remote file
    help    Show this help message

EXAMPLES:
    # First page of the catalog
    alist-gallery albums

    # Third page, 24 albums per page
    alist-gallery albums 3 24

    # Inspect a directory and a file
    alist-gallery list /photos/Summer
    alist-gallery file /photos/Summer/beach.jpg

ENVIRONMENT:
    ALIST_BASE_URL             Alist server URL (required)
    ALIST_USERNAME             Login user (default: guest)
    ALIST_PASSWORD             Login password (default: guest)
    ALIST_MAX_LOGIN_ATTEMPTS   Login failure ceiling (default: 3)
    REDIS_URL                  Durable cache tier; unset keeps it in-process
    CACHE_MEMORY_TTL_SECS      Default memory TTL (default: 7200)
    CACHE_DURABLE_TTL_SECS     Durable-tier TTL (default: 43200)
    CACHE_LISTING_TTL_SECS     Directory-listing TTL (default: 60)
    ALBUMS_BASE_PATH           Catalog root on the file host (default: /)
    ALBUMS_PAGE_TTL_SECS       Album-page cache TTL (default: 60)
    ALBUMS_PAGE_SIZE           Default catalog page size (default: 10)
    RUST_LOG                   Log filter (trace, debug, info, warn, error)
"#
    );
}

fn parse_args() -> Result<Command> {
    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        return Ok(Command::Help);
    }

    match args[1].as_str() {
        "albums" => {
            let page = match args.get(2) {
                Some(raw) => raw.parse().context("page must be a number")?,
                None => 1,
            };
            let page_size = args
                .get(3)
                .map(|raw| raw.parse())
                .transpose()
                .context("page-size must be a number")?;
            Ok(Command::Albums { page, page_size })
        }
        "list" => {
            if args.len() < 3 {
                return Err(anyhow!("Usage: alist-gallery list <path>"));
            }
            Ok(Command::List {
                path: args[2].clone(),
            })
        }
        "file" => {
            if args.len() < 3 {
                return Err(anyhow!("Usage: alist-gallery file <path>"));
            }
            Ok(Command::File {
                path: args[2].clone(),
            })
        }
        "upload" => {
            if args.len() < 4 {
                return Err(anyhow!(
                    "Usage: alist-gallery upload <local-file> <remote-dir>"
                ));
            }
            Ok(Command::Upload {
                local: PathBuf::from(&args[2]),
                remote_dir: args[3].clone(),
            })
        }
        "delete" => {
            if args.len() < 3 {
                return Err(anyhow!("Usage: alist-gallery delete <path>"));
            }
            Ok(Command::Delete {
                path: args[2].clone(),
            })
        }
        "help" | "--help" | "-h" => Ok(Command::Help),
        _ => {
            eprintln!("Unknown command: {}", args[1]);
            Ok(Command::Help)
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    // Parse command
    let command = match parse_args() {
        Ok(cmd) => cmd,
        Err(e) => {
            eprintln!("Error: {}", e);
            print_help();
            std::process::exit(1);
        }
    };

    // Help must work without any environment set up
    if matches!(command, Command::Help) {
        print_help();
        return Ok(());
    }

    let config = Config::from_env().context("configuration error")?;

    // Durable tier: Redis when configured, in-process otherwise
    let store: Arc<dyn DurableStore> = match &config.cache.redis_url {
        Some(url) => match RedisStore::connect(url).await {
            Ok(store) => Arc::new(store),
            Err(e) => {
                error!(error = %e, "Failed to connect to Redis");
                return Err(anyhow!("failed to connect to Redis: {}", e));
            }
        },
        None => {
            info!("REDIS_URL not set, durable tier kept in-process");
            Arc::new(MemoryStore::new())
        }
    };

    let cache = Arc::new(TieredCache::new(
        store,
        config.cache.memory_ttl,
        config.cache.durable_ttl,
    ));

    let client = AlistClient::new(
        Arc::new(HttpAlistApi::new(&config.alist.base_url)),
        Arc::clone(&cache),
        config.alist.username.as_str(),
        config.alist.password.as_str(),
        config.alist.max_login_attempts,
        config.cache.listing_ttl,
    );

    let gallery = Gallery::new(
        client.clone(),
        Arc::clone(&cache),
        config.albums.base_path.as_str(),
        config.albums.page_ttl,
    );

    match command {
        Command::Albums { page, page_size } => {
            let size = page_size.unwrap_or(config.albums.page_size);
            match gallery.albums(page, size).await {
                Ok(album_page) => {
                    println!(
                        "Albums (page {} of {}, {} total):",
                        album_page.pagination.current,
                        album_page.pagination.total_pages,
                        album_page.pagination.total
                    );
                    for album in &album_page.items {
                        match &album.cover {
                            Some(cover) => println!(
                                "  {} ({} photos, cover {})",
                                album.name, album.photo_count, cover
                            ),
                            None => println!("  {} ({} photos)", album.name, album.photo_count),
                        }
                    }
                }
                Err(e) => {
                    error!(error = %e, "Failed to assemble album page");
                    return Err(e.into());
                }
            }
        }
        Command::List { path } => match client.list_directory(&path).await {
            Ok(listing) => {
                println!(
                    "{} ({} entries, provider {}):",
                    path,
                    listing.content.len(),
                    listing.provider
                );
                for entry in &listing.content {
                    let marker = if entry.is_dir { "/" } else { "" };
                    println!("  {}{}  {} bytes  {}", entry.name, marker, entry.size, entry.modified);
                }
            }
            Err(e) => {
                error!(error = %e, path = %path, "Failed to list directory");
                return Err(e.into());
            }
        },
        Command::File { path } => match client.read_file(&path).await {
            Ok(info) => {
                println!("{}:", info.name);
                println!("  size:     {} bytes", info.size);
                println!("  modified: {}", info.modified);
                println!("  provider: {}", info.provider);
                println!("  raw_url:  {}", info.raw_url);
            }
            Err(e) => {
                error!(error = %e, path = %path, "Failed to fetch file detail");
                return Err(e.into());
            }
        },
        Command::Upload { local, remote_dir } => {
            let content = tokio::fs::read(&local)
                .await
                .with_context(|| format!("failed to read {}", local.display()))?;
            let file_name = local
                .file_name()
                .and_then(|n| n.to_str())
                .ok_or_else(|| anyhow!("local file has no usable name"))?;

            match client.upload_file(&remote_dir, file_name, content).await {
                Ok(()) => println!("Uploaded {} to {}", file_name, remote_dir),
                Err(e) => {
                    error!(error = %e, file = %file_name, "Upload failed");
                    return Err(e.into());
                }
            }
        }
        Command::Delete { path } => match client.delete_file(&path).await {
            Ok(()) => println!("Deleted {}", path),
            Err(e) => {
                error!(error = %e, path = %path, "Delete failed");
                return Err(e.into());
            }
        },
        // Handled before construction so help needs no environment
        Command::Help => {}
    }

    Ok(())
}
