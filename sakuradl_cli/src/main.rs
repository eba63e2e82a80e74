use std::{
    collections::BTreeSet,
    io::{self, Write},
    path::PathBuf,
};

use clap::{Parser, Subcommand};
use reqwest::Client;
use sakuradl::{
    chapter::{self, ChapterSource},
    config::{self, SiteConfig},
    series,
};

/// Sakura Mangas download tool
#[derive(Debug, Parser)]
#[command(author, version, about)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Download chapters from reader URLs or links_caps.json manifests
    Chapter {
        /// Comma-separated chapter URLs and/or manifest paths
        inputs: Vec<String>,
    },
    /// Archive complete series: metadata, chapter listing and link manifest
    Manga {
        /// Series page URLs
        urls: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    env_logger::init();
    let cli = Cli::parse();
    let client = config::build_client()?;
    let config = SiteConfig::default();

    match cli.command {
        Some(Command::Chapter { inputs }) if !inputs.is_empty() => {
            process_chapter_inputs(&client, &config, &inputs.join(",")).await;
        }
        Some(Command::Chapter { .. }) => chapter_menu(&client, &config).await?,
        Some(Command::Manga { urls }) if !urls.is_empty() => {
            archive_all(&client, &config, urls.iter().map(String::as_str)).await;
        }
        Some(Command::Manga { .. }) => {
            match prompt("Series URLs (comma-separated): ")? {
                Some(input) if !input.is_empty() => {
                    archive_all(&client, &config, input.split(',').map(str::trim)).await;
                }
                _ => println!("No links given."),
            };
        }
        None => main_menu(&client, &config).await?,
    }
    Ok(())
}

async fn main_menu(client: &Client, config: &SiteConfig) -> io::Result<()> {
    print_banner();
    loop {
        println!();
        println!("1 - Download chapters");
        println!("2 - Download complete series");
        println!("3 - Quit");
        let choice = match prompt("Choose an option: ")? {
            Some(choice) => choice,
            None => break,
        };
        match choice.as_str() {
            "1" => {
                let input = match prompt("Chapter URLs or manifest paths (comma-separated): ")? {
                    Some(input) if !input.is_empty() => input,
                    Some(_) => {
                        println!("No links given.");
                        continue;
                    }
                    None => break,
                };
                process_chapter_inputs(client, config, &input).await;
            }
            "2" => {
                let input = match prompt("Series URLs (comma-separated): ")? {
                    Some(input) if !input.is_empty() => input,
                    Some(_) => {
                        println!("No links given.");
                        continue;
                    }
                    None => break,
                };
                let manifests = archive_all(client, config, input.split(',').map(str::trim)).await;
                if manifests.is_empty() {
                    continue;
                }
                println!("Generated manifests:");
                for path in &manifests {
                    println!("- {}", path.display());
                }
                match prompt("Download all chapters now? [y/N]: ")? {
                    Some(answer) if answer.eq_ignore_ascii_case("y") => {
                        for path in &manifests {
                            run_manifest(client, config, path).await;
                        }
                    }
                    Some(_) => {}
                    None => break,
                }
            }
            "3" => break,
            _ => println!("Invalid option, choose 1, 2 or 3."),
        }
    }
    Ok(())
}

/// Fallback menu of the `chapter` subcommand when no inputs were given.
async fn chapter_menu(client: &Client, config: &SiteConfig) -> io::Result<()> {
    loop {
        println!();
        println!("1 - Download by URL");
        println!("2 - Download by chapter id and token");
        println!("3 - Process a manifest file");
        println!("4 - Quit");
        let choice = match prompt("Choose an option: ")? {
            Some(choice) => choice,
            None => break,
        };
        match choice.as_str() {
            "1" => {
                if let Some(url) = prompt("Chapter URL: ")? {
                    run_chapter(client, config, ChapterSource::Url(url)).await;
                }
            }
            "2" => {
                let chapter_id = match prompt("Chapter id: ")? {
                    Some(id) => id,
                    None => break,
                };
                let token = match prompt("Token: ")? {
                    Some(token) => token,
                    None => break,
                };
                run_chapter(client, config, ChapterSource::Token { chapter_id, token }).await;
            }
            "3" => {
                if let Some(path) = prompt("Manifest path: ")? {
                    run_manifest(client, config, &PathBuf::from(path)).await;
                }
            }
            "4" => break,
            _ => println!("Invalid option, choose 1 to 4."),
        }
    }
    Ok(())
}

/// Splits the comma-joined argument list and dispatches each entry on its
/// shape: `.json` suffix means manifest, `http` prefix means chapter URL.
async fn process_chapter_inputs(client: &Client, config: &SiteConfig, joined: &str) {
    for input in joined.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        if input.to_lowercase().ends_with(".json") {
            println!("Processing manifest: {input}");
            run_manifest(client, config, &PathBuf::from(input)).await;
        } else if input.starts_with("http") {
            println!("Processing chapter: {input}");
            run_chapter(client, config, ChapterSource::Url(input.to_string())).await;
        } else {
            eprintln!("Unrecognized input: {input}");
        }
    }
}

async fn archive_all<'a>(
    client: &Client,
    config: &SiteConfig,
    urls: impl Iterator<Item = &'a str>,
) -> BTreeSet<PathBuf> {
    let mut manifests = BTreeSet::new();
    for url in urls.filter(|url| !url.is_empty()) {
        if !url.starts_with("http") {
            eprintln!("Skipping invalid URL: {url}");
            continue;
        }
        println!("Processing series: {url}");
        match series::archive_series(client, config, url).await {
            Ok(archive) => {
                println!(
                    "Archived '{}' ({} chapters) -> {}",
                    archive.title,
                    archive.chapter_count,
                    archive.manifest_path.display()
                );
                manifests.insert(archive.manifest_path);
            }
            Err(e) => eprintln!("Failed to archive {url}: {e}"),
        }
    }
    manifests
}

async fn run_chapter(client: &Client, config: &SiteConfig, source: ChapterSource) {
    match chapter::download_chapter(client, config, source).await {
        Ok(dir) => println!("Downloaded to '{}'", dir.display()),
        Err(e) => eprintln!("Download failed: {e}"),
    }
}

async fn run_manifest(client: &Client, config: &SiteConfig, path: &PathBuf) {
    if let Err(e) = chapter::download_from_manifest(client, config, path).await {
        eprintln!("Failed to process manifest {}: {e}", path.display());
    }
}

fn print_banner() {
    println!("Sakura Mangas Downloader");
    println!("========================");
}

/// Reads one trimmed line from stdin. `None` means stdin is closed, which the
/// menus treat as a clean exit.
fn prompt(message: &str) -> io::Result<Option<String>> {
    print!("{message}");
    io::stdout().flush()?;
    let mut line = String::new();
    if io::stdin().read_line(&mut line)? == 0 {
        return Ok(None);
    }
    Ok(Some(line.trim().to_string()))
}
