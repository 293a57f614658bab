//! Headless commands for inspecting a catalog
//!
//! Usage:
//!   osu-catalog summary                       Show what was loaded
//!   osu-catalog scores <md5> [--sort <m>]     List scores of a beatmap
//!   osu-catalog stats [player]                Weighted pp, accuracy and level
//!   osu-catalog collections                   List collections
//!   osu-catalog export-scores <path>          Write every score to CSV
//!   osu-catalog rename-scores <from> <to>     Move scores to another player
//!
//! Options:
//!   --osu-folder <path>  osu!stable folder to read
//!   --json               Output in JSON format

use std::path::PathBuf;

use osu_catalog_core::{Config, Database, Md5Hash, SortMethod};

/// CLI command to execute
#[derive(Debug, Clone, PartialEq)]
pub enum CliCommand {
    Summary,
    Scores {
        md5: Md5Hash,
        sort: Option<SortMethod>,
    },
    Stats {
        player: Option<String>,
    },
    Collections,
    ExportScores {
        path: PathBuf,
    },
    RenameScores {
        from: String,
        to: String,
    },
}

/// CLI options
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CliOptions {
    pub json: bool,
    pub verbose: bool,
    pub osu_folder: Option<PathBuf>,
}

fn take_value<'a>(args: &'a [String], i: &mut usize, what: &str) -> Result<&'a str, String> {
    *i += 1;
    args.get(*i)
        .map(String::as_str)
        .ok_or_else(|| format!("{} requires a value", what))
}

/// Parse CLI arguments and return command + options
pub fn parse_args(args: &[String]) -> Result<(CliCommand, CliOptions), String> {
    let mut options = CliOptions::default();
    let mut sort: Option<SortMethod> = None;
    let mut positional: Vec<&str> = Vec::new();

    let mut i = 0;
    while i < args.len() {
        let arg = args[i].as_str();
        match arg {
            "--json" => options.json = true,
            "--verbose" | "-v" => options.verbose = true,
            "--osu-folder" => {
                options.osu_folder = Some(PathBuf::from(take_value(args, &mut i, arg)?));
            }
            "--sort" => sort = Some(take_value(args, &mut i, arg)?.parse()?),
            _ if arg.starts_with('-') => return Err(format!("Unknown option: {}", arg)),
            _ => positional.push(arg),
        }
        i += 1;
    }

    let Some((&name, rest)) = positional.split_first() else {
        return Err(
            "No command specified. Use: summary, scores, stats, collections, export-scores or rename-scores"
                .to_string(),
        );
    };

    let command = match (name, rest) {
        ("summary", []) => CliCommand::Summary,
        ("scores", [md5]) => CliCommand::Scores {
            md5: parse_md5(md5)?,
            sort,
        },
        ("stats", []) => CliCommand::Stats { player: None },
        ("stats", [player]) => CliCommand::Stats {
            player: Some(player.to_string()),
        },
        ("collections", []) => CliCommand::Collections,
        ("export-scores", [path]) => CliCommand::ExportScores {
            path: PathBuf::from(*path),
        },
        ("rename-scores", [from, to]) => CliCommand::RenameScores {
            from: from.to_string(),
            to: to.to_string(),
        },
        ("summary" | "scores" | "stats" | "collections" | "export-scores" | "rename-scores", _) => {
            return Err(format!("Wrong number of arguments for '{}'", name));
        }
        _ => return Err(format!("Unknown command: {}", name)),
    };

    Ok((command, options))
}

fn parse_md5(s: &str) -> Result<Md5Hash, String> {
    if s.len() != 32 || !s.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(format!("Invalid beatmap hash '{}', expected 32 hex characters", s));
    }
    Ok(Md5Hash::from(s.to_ascii_lowercase().as_str()))
}

/// Load everything, ticking the database until it is done
fn load_database(options: &CliOptions) -> Database {
    let mut config = Config::load();
    if let Some(folder) = &options.osu_folder {
        config.osu_folder = Some(folder.clone());
    }

    let mut db = Database::new(config);
    db.load();
    while db.is_loading() {
        db.update();
    }

    if !options.json {
        for warning in db.warnings() {
            eprintln!("Warning: {}", warning);
        }
    }
    db
}

/// Run CLI command
pub fn run(command: CliCommand, options: CliOptions) -> anyhow::Result<()> {
    let mut db = load_database(&options);

    match command {
        CliCommand::Summary => print_summary(&db, &options),
        CliCommand::Scores { md5, sort } => {
            if let Some(sort) = sort {
                db.set_sort_method(sort);
            }
            print_scores(&db, &md5, &options)
        }
        CliCommand::Stats { player } => {
            let player = player.unwrap_or_else(|| db.config().player_name.clone());
            let stats = db.player_stats(&player);
            if options.json {
                println!("{}", serde_json::to_string_pretty(&stats)?);
            } else {
                println!("Player:    {}", stats.name);
                println!("pp:        {:.2}", stats.pp);
                println!("Accuracy:  {:.2}%", stats.accuracy * 100.0);
                println!("Scores:    {}", stats.num_scores_with_pp);
                println!(
                    "Level:     {} ({:.1}% to next)",
                    stats.level,
                    stats.percent_to_next_level * 100.0
                );
                println!("Total:     {}", stats.total_score);
            }
            Ok(())
        }
        CliCommand::Collections => print_collections(&db, &options),
        CliCommand::ExportScores { path } => {
            let count = db.scores().export_csv(&path, db.catalog())?;
            println!("Exported {} scores to {}", count, path.display());
            Ok(())
        }
        CliCommand::RenameScores { from, to } => {
            let renamed = db.rename_player_scores(&from, &to);
            db.save()?;
            println!("Renamed {} scores from '{}' to '{}'", renamed, from, to);
            Ok(())
        }
    }
}

fn print_summary(db: &Database, options: &CliOptions) -> anyhow::Result<()> {
    let catalog = db.catalog();
    let scores = db.scores();
    let warnings: Vec<String> = db.warnings().iter().map(ToString::to_string).collect();

    if options.json {
        println!(
            "{}",
            serde_json::json!({
                "osu_folder": db.config().osu_folder,
                "db_version": db.db_version(),
                "beatmap_sets": catalog.set_count(),
                "difficulties": catalog.difficulty_count(),
                "scores": scores.score_count(),
                "scored_beatmaps": scores.beatmap_count(),
                "collections": db.collections().len(),
                "stars_cached": db.stars().len(),
                "players": db.player_names(),
                "warnings": warnings,
            })
        );
        return Ok(());
    }

    println!("osu-catalog summary:");
    println!();
    match &db.config().osu_folder {
        Some(path) => println!("osu! folder:   {}", path.display()),
        None => println!("osu! folder:   Not configured or not found"),
    }
    match db.db_version() {
        Some(version) => println!("osu!.db:       version {}", version),
        None => println!("osu!.db:       not used"),
    }
    println!(
        "Beatmaps:      {} sets, {} difficulties",
        catalog.set_count(),
        catalog.difficulty_count()
    );
    println!(
        "Scores:        {} on {} beatmaps",
        scores.score_count(),
        scores.beatmap_count()
    );
    println!("Collections:   {}", db.collections().len());
    println!("Stars cached:  {}", db.stars().len());
    println!("Players:       {}", db.player_names().join(", "));
    Ok(())
}

fn print_scores(db: &Database, md5: &Md5Hash, options: &CliOptions) -> anyhow::Result<()> {
    let scores = db.scores_for(md5);

    if options.json {
        println!("{}", serde_json::to_string_pretty(scores)?);
        return Ok(());
    }

    match db.difficulty(md5) {
        Some(diff) => println!(
            "{} - {} [{}] ({:.2}*)",
            diff.artist, diff.title, diff.difficulty_name, diff.stars
        ),
        None => println!("{} (not in catalog)", md5),
    }
    println!("Sorted by {}", db.scores().sort_method());
    println!();

    if scores.is_empty() {
        println!("No scores.");
        return Ok(());
    }

    for (rank, score) in scores.iter().enumerate() {
        let played = score
            .played_at()
            .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_default();
        println!(
            "{:>3}. {:<16} {:>10} {:>6.2}% {:>5}x {:>4}m {:>8.2}pp  {}",
            rank + 1,
            score.player_name,
            score.score,
            score.accuracy() * 100.0,
            score.max_combo,
            score.count_miss,
            score.pp,
            played
        );
    }
    Ok(())
}

fn print_collections(db: &Database, options: &CliOptions) -> anyhow::Result<()> {
    let collections: Vec<_> = db.collections().visible().collect();

    if options.json {
        println!("{}", serde_json::to_string_pretty(&collections)?);
        return Ok(());
    }

    if collections.is_empty() {
        println!("No collections.");
        return Ok(());
    }

    for collection in collections {
        let missing = collection
            .maps
            .iter()
            .filter(|md5| !db.catalog().contains(md5))
            .count();
        if missing > 0 {
            println!(
                "{} ({} maps, {} not installed)",
                collection.name,
                collection.len(),
                missing
            );
        } else {
            println!("{} ({} maps)", collection.name, collection.len());
        }
    }
    Ok(())
}

/// Print CLI help
pub fn print_help() {
    println!("osu-catalog v{}", env!("CARGO_PKG_VERSION"));
    println!("Inspect an osu! beatmap catalog, its scores and collections");
    println!();
    println!("USAGE:");
    println!("    osu-catalog <command> [options]");
    println!();
    println!("COMMANDS:");
    println!("    summary                     Show what was loaded");
    println!("    scores <md5>                List the scores of a beatmap");
    println!("    stats [player]              Show weighted pp, accuracy and level");
    println!("    collections                 List collections");
    println!("    export-scores <path>        Write every score to a CSV file");
    println!("    rename-scores <from> <to>   Move scores to another player name");
    println!();
    println!("OPTIONS:");
    println!("    --osu-folder <path>         osu!stable folder to read");
    println!("    --sort <method>             accuracy, combo, date, misses, pp, score");
    println!("    --json                      Output in JSON format");
    println!("    --verbose, -v               Log debug output to stderr");
    println!("    --help                      Show this help message");
    println!();
    println!("EXAMPLES:");
    println!("    osu-catalog summary --osu-folder ~/.wine/drive_c/osu!");
    println!("    osu-catalog scores 0123456789abcdef0123456789abcdef --sort pp");
    println!("    osu-catalog stats --json");
}
