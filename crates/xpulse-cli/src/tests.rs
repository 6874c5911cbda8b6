use super::*;

#[test]
fn parses_db_ping_command() {
    let cli = Cli::try_parse_from(["xpulse", "db", "ping"]).expect("expected valid cli args");

    assert!(matches!(
        cli.command,
        Commands::Db {
            command: DbCommands::Ping
        }
    ));
}

#[test]
fn parses_db_migrate_command() {
    let cli = Cli::try_parse_from(["xpulse", "db", "migrate"]).expect("expected valid cli args");

    assert!(matches!(
        cli.command,
        Commands::Db {
            command: DbCommands::Migrate
        }
    ));
}

#[test]
fn missing_command_is_an_error() {
    assert!(Cli::try_parse_from(["xpulse"]).is_err());
}

#[test]
fn parse_defaults_to_text_report() {
    let cli = Cli::try_parse_from(["xpulse", "parse", "urls.csv"]).unwrap();
    assert!(matches!(
        cli.command,
        Commands::Parse {
            ref file,
            max_urls: None,
            json: false,
        } if file == &PathBuf::from("urls.csv")
    ));
}

#[test]
fn authors_uses_default_fetch_options() {
    let cli = Cli::try_parse_from(["xpulse", "authors", "alice, bob"]).unwrap();
    let Commands::Authors { authors, fetch } = cli.command else {
        panic!("expected authors command");
    };
    assert_eq!(authors, "alice, bob");
    assert_eq!(fetch.max_items(), 50);
    assert!(!fetch.include_replies);
    assert!(fetch.since.is_none());
}

#[test]
fn authors_accepts_filters() {
    let cli = Cli::try_parse_from([
        "xpulse",
        "authors",
        "alice",
        "--max-items",
        "200",
        "--include-replies",
        "--since",
        "2024-01-01",
        "--until",
        "2024-02-01",
        "--min-impressions",
        "1000",
    ])
    .unwrap();
    let Commands::Authors { fetch, .. } = cli.command else {
        panic!("expected authors command");
    };
    let filters = fetch.filters().unwrap();
    assert_eq!(fetch.max_items(), 200);
    assert!(filters.include_replies);
    assert_eq!(filters.min_impressions, Some(1000));
    assert_eq!(filters.since.map(|d| d.to_string()).as_deref(), Some("2024-01-01"));
}

#[test]
fn max_items_above_200_is_rejected() {
    assert!(Cli::try_parse_from(["xpulse", "authors", "alice", "--max-items", "201"]).is_err());
    assert!(Cli::try_parse_from(["xpulse", "authors", "alice", "--max-items", "0"]).is_err());
}

#[test]
fn inverted_date_range_is_rejected() {
    let cli = Cli::try_parse_from([
        "xpulse",
        "authors",
        "alice",
        "--since",
        "2024-03-01",
        "--until",
        "2024-02-01",
    ])
    .unwrap();
    let Commands::Authors { fetch, .. } = cli.command else {
        panic!("expected authors command");
    };
    assert!(fetch.filters().is_err());
}

#[test]
fn negative_engagement_rate_is_rejected() {
    let cli = Cli::try_parse_from([
        "xpulse",
        "authors",
        "alice",
        "--min-engagement-rate=-1",
    ])
    .unwrap();
    let Commands::Authors { fetch, .. } = cli.command else {
        panic!("expected authors command");
    };
    assert!(fetch.filters().is_err());
}

#[test]
fn search_takes_several_keyword_groups() {
    let cli = Cli::try_parse_from(["xpulse", "search", "rust async", "tokio", "--concurrency", "3"])
        .unwrap();
    let Commands::Search {
        keywords,
        concurrency,
        ..
    } = cli.command
    else {
        panic!("expected search command");
    };
    assert_eq!(keywords, vec!["rust async".to_owned(), "tokio".to_owned()]);
    assert_eq!(concurrency, 3);
}

#[test]
fn search_requires_keywords() {
    assert!(Cli::try_parse_from(["xpulse", "search"]).is_err());
}

#[test]
fn status_requires_a_uuid() {
    assert!(Cli::try_parse_from(["xpulse", "status", "not-a-uuid"]).is_err());

    let id = Uuid::new_v4();
    let cli = Cli::try_parse_from(["xpulse", "status", &id.to_string()]).unwrap();
    assert!(matches!(cli.command, Commands::Status { id: got, json: false } if got == id));
}
