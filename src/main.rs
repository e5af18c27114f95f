use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use catalog_discovery::api::HttpCatalogApi;
use catalog_discovery::config::Settings;
use catalog_discovery::models::SortKey;
use catalog_discovery::session::{Session, SessionInput};
use catalog_discovery::storage::JsonFileStore;
use catalog_discovery::view::{Dropdown, RenderModel};

// One line of user input, already interpreted
#[derive(Debug, PartialEq)]
enum Line {
    Input(SessionInput),
    ShowPresets,
    Quit,
}

fn optional(arg: Option<&str>) -> Option<String> {
    arg.filter(|a| *a != "-").map(str::to_string)
}

fn parse_price(arg: Option<&str>) -> Result<Option<u64>, String> {
    match optional(arg) {
        Some(value) => value
            .parse()
            .map(Some)
            .map_err(|_| format!("'{}' is not a price", value)),
        None => Ok(None),
    }
}

fn parse_line(line: &str) -> Result<Line, String> {
    let Some(command) = line.strip_prefix(':') else {
        return Ok(Line::Input(SessionInput::QueryEdited(line.to_string())));
    };
    let mut parts = command.split_whitespace();
    let name = parts.next().unwrap_or_default();
    let rest: Vec<&str> = parts.collect();
    let first = rest.first().copied();
    let joined = rest.join(" ");

    let input = match name {
        "sort" => {
            let sort: SortKey = first.unwrap_or_default().parse().map_err(|e| format!("{}", e))?;
            SessionInput::SetSort(sort)
        }
        "price" => SessionInput::SetPriceRange {
            min: parse_price(first)?,
            max: parse_price(rest.get(1).copied())?,
        },
        "set" => match (first, rest.get(1)) {
            (Some(key), Some(_)) => SessionInput::SetAttribute {
                key: key.to_string(),
                value: Some(rest[1..].join(" ")),
            },
            _ => return Err("usage: :set <key> <value>".into()),
        },
        "unset" => match first {
            Some(key) => SessionInput::SetAttribute {
                key: key.to_string(),
                value: None,
            },
            None => return Err("usage: :unset <key>".into()),
        },
        "condition" => SessionInput::SetCondition(optional(first)),
        "sub" => SessionInput::SetSubcategory(optional(first)),
        "clear" => SessionInput::ClearFilters,
        "more" => SessionInput::LoadMore,
        "retry" => SessionInput::Retry,
        "save" => {
            let is_default = first == Some("--default");
            let name = if is_default { rest[1..].join(" ") } else { joined };
            SessionInput::SavePreset { name, is_default }
        }
        "presets" => return Ok(Line::ShowPresets),
        "apply" | "delete" | "fav" => {
            let Some(id) = first else {
                return Err(format!("usage: :{} <id>", name));
            };
            let id = id.to_string();
            match name {
                "apply" => SessionInput::ApplyPreset(id),
                "delete" => SessionInput::DeletePreset(id),
                _ => SessionInput::ToggleFavorite(id),
            }
        }
        "forget" => SessionInput::RemoveRecent(joined),
        "forget-all" => SessionInput::ClearRecent,
        "focus" => SessionInput::QueryFocus(true),
        "blur" => SessionInput::QueryFocus(false),
        "wide" => SessionInput::SetLayout { wide: true },
        "compact" => SessionInput::SetLayout { wide: false },
        "quit" | "q" => return Ok(Line::Quit),
        other => return Err(format!("unknown command ':{}'", other)),
    };
    Ok(Line::Input(input))
}

fn print_model(model: &RenderModel) {
    let chips: Vec<&str> = model.chips.iter().map(|c| c.label.as_str()).collect();
    println!(
        "== {} | query '{}' | {} filter(s) [{}] | sort {} | {} result(s){}{}",
        model.category_name,
        model.filters.normalized_query(),
        model.filter_count,
        chips.join(", "),
        model.sort,
        model.total_count,
        if model.loading { " | loading" } else { "" },
        if model.has_more { " | :more" } else { "" },
    );
    for row in model.rows() {
        let cells: Vec<String> = row
            .iter()
            .map(|card| {
                let price = card
                    .listing
                    .price
                    .map(|p| format!("{:.0} {}", p, card.listing.currency.as_deref().unwrap_or("")))
                    .unwrap_or_else(|| "n/a".to_string());
                let star = if card.is_favorite { "*" } else { " " };
                format!("{}[{}] {} ({})", star, card.listing.id, card.listing.title, price.trim())
            })
            .collect();
        println!("  {}", cells.join("  |  "));
    }
    match &model.dropdown {
        Dropdown::None => {}
        Dropdown::Suggestions(entries) => {
            let items: Vec<String> = entries
                .iter()
                .map(|e| format!("{} ({})", e.query, e.count))
                .collect();
            println!("  suggestions: {}", items.join(", "));
        }
        Dropdown::Recent(texts) => println!("  recent: {}", texts.join(", ")),
        Dropdown::Popular(popular) => println!(
            "  popular: {} | in category: {}",
            popular.global.join(", "),
            popular.category.join(", ")
        ),
    }
    if let Some(error) = &model.error {
        if model.retryable {
            println!("  ! {} (type :retry)", error);
        } else {
            println!("  ! {}", error);
        }
    }
    if let Some(notice) = &model.notice {
        println!("  ~ {}", notice);
    }
}

fn print_presets(model: &RenderModel) {
    if model.presets.is_empty() {
        println!("  no saved filters");
    }
    for preset in &model.presets {
        let marker = if preset.is_default { " (default)" } else { "" };
        println!("  {}: {}{}", preset.id, preset.name, marker);
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file first. Ignore errors (e.g., file not found)
    dotenv::dotenv().ok();

    // Logs go to stderr so they do not interleave with the listing output
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "catalog_discovery=info".into()))
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();

    let settings = match Settings::new() {
        Ok(s) => {
            tracing::info!(category_id = %s.category_id, api = %s.api_base_url, "Configuration loaded");
            s
        }
        Err(e) => {
            tracing::error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    let client = HttpCatalogApi::build_client().context("Failed to build HTTP client")?;
    let api = Arc::new(HttpCatalogApi::new(client, &settings));
    let storage = Arc::new(JsonFileStore::new(settings.storage_dir.clone()));

    let handle = Session::start(api, storage, &settings);

    let mut view = handle.view();
    let printer = tokio::spawn(async move {
        while view.changed().await.is_ok() {
            let model = view.borrow_and_update().clone();
            print_model(&model);
        }
    });

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await.context("Failed to read stdin")? {
        match parse_line(line.trim_end()) {
            Ok(Line::Input(input)) => {
                if !handle.send(input) {
                    break;
                }
            }
            Ok(Line::ShowPresets) => print_presets(&handle.current()),
            Ok(Line::Quit) => break,
            Err(message) => eprintln!("{}", message),
        }
    }

    handle.shutdown().await;
    printer.await.context("Printer task failed")?;
    Ok(())
}
