use std::io::{self, Write};
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;

use marketview_rs::config::{AppConfig, Cli, TransportKind};
use marketview_rs::dashboard::{DashboardView, SelectOptions, Session, SessionHandle};
use marketview_rs::display;
use marketview_rs::market_data::adapters::rest::RestClient;
use marketview_rs::market_data::adapters::sse::SseTransport;
use marketview_rs::market_data::adapters::ws::WsTransport;
use marketview_rs::market_data::adapters::{FeedTransport, MarketDataApi};
use marketview_rs::market_data::feed::LiveFeed;
use marketview_rs::market_data::normaliser::{canonical, exchange_of, fetch_symbol, seed_stock, supports_toggle};
use marketview_rs::market_data::types::{Exchange, Period, Stock};
use marketview_rs::telemetry;

// How long `search` waits before printing, on top of the debounce
const SEARCH_GRACE: Duration = Duration::from_millis(600);

fn print_help() {
    println!("Available commands:");
    println!("  show                  - Selected stock, chart, indices, movers and stats");
    println!("  indices               - Index levels");
    println!("  movers                - Top gainers and losers");
    println!("  stats [NSE|BSE]       - Market breadth (optionally switch exchange)");
    println!("  search <query>        - Search stocks");
    println!("  results               - Show the current search results");
    println!("  pick <n>              - Select the n-th search result");
    println!("  select <SYM> [EX]     - Select a stock by symbol");
    println!("  exchange <NSE|BSE>    - Show the selected stock on the other exchange");
    println!("  period <1d|1m|3m|1y|3y> - Chart period");
    println!("  chart                 - Price chart of the selection");
    println!("  quit, q               - Exit");
}

// Look the symbol up in what is on screen, else start from a bare seed stock
fn find_on_screen(view: &DashboardView, symbol: &str) -> Stock {
    let wanted = symbol.trim().to_uppercase();
    let base = canonical(&seed_stock(&wanted));
    let on_screen: Vec<&Stock> = view
        .indices
        .iter()
        .chain(&view.gainers)
        .chain(&view.losers)
        .chain(&view.search.results)
        .collect();

    on_screen
        .iter()
        .find(|s| fetch_symbol(s) == wanted)
        .or_else(|| on_screen.iter().find(|s| canonical(s) == base))
        .map(|s| (*s).clone())
        .unwrap_or_else(|| seed_stock(&wanted))
}

fn build_transport(config: &AppConfig) -> anyhow::Result<Option<Arc<dyn FeedTransport>>> {
    let Some(url) = config.feed.resolved_stream_url(&config.api) else {
        return Ok(None);
    };
    let transport: Arc<dyn FeedTransport> = match config.feed.transport {
        TransportKind::Sse => Arc::new(SseTransport::new(&config.api, &url)?),
        TransportKind::Ws => {
            // http(s)://.../live -> ws(s)://.../live
            let url = if url.starts_with("http") { url.replacen("http", "ws", 1) } else { url };
            Arc::new(WsTransport::new(&url))
        }
        TransportKind::None => return Ok(None),
    };
    Ok(Some(transport))
}

async fn current_view(session: &SessionHandle) -> anyhow::Result<DashboardView> {
    session
        .view()
        .await
        .ok_or_else(|| anyhow::anyhow!("dashboard session stopped"))
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok(); // load .env

    let cli = Cli::parse();
    let config = AppConfig::load(&cli)?;
    telemetry::init_tracing(&config.log.filter);
    telemetry::init_metrics(config.log.metrics_addr);

    let api: Arc<dyn MarketDataApi> = Arc::new(RestClient::new(&config.api)?);
    let transport = build_transport(&config)?;
    info!(base_url = %config.api.base_url, transport = ?config.feed.transport, "Starting dashboard");

    let feed = LiveFeed::new(transport, Arc::clone(&api));
    let session = Session::new(api, &config.search).spawn(feed);

    if let Some(symbol) = cli.stock.as_deref() {
        session.select_symbol(symbol, cli.exchange);
    }

    let debounce = config.search.debounce();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    // CLI loop
    loop {
        print!("\nmarketview> ");
        io::stdout().flush()?;

        let Some(input) = lines.next_line().await? else {
            break;
        };
        let mut parts = input.split_whitespace();
        let command = parts.next().unwrap_or("").to_lowercase();
        let args: Vec<&str> = parts.collect();

        match command.as_str() {
            "" => {}
            "help" | "h" => print_help(),
            "show" => print!("{}", display::render_view(&current_view(&session).await?)),
            "indices" => print!("{}", display::render_list("Indices", &current_view(&session).await?.indices)),
            "movers" => {
                let view = current_view(&session).await?;
                print!("{}", display::render_list("Top gainers", &view.gainers));
                print!("{}", display::render_list("Top losers", &view.losers));
            }
            "stats" => {
                if let Some(arg) = args.first() {
                    match arg.parse::<Exchange>() {
                        Ok(exchange) => {
                            session.set_stats_exchange(exchange);
                        }
                        Err(e) => {
                            println!("{}", e);
                            continue;
                        }
                    }
                }
                print!("{}", display::render_stats(&current_view(&session).await?));
            }
            "search" | "s" => {
                let query = args.join(" ");
                session.search(query.clone());
                if query.trim().chars().count() < config.search.min_query_len {
                    println!("Type at least {} characters", config.search.min_query_len);
                    continue;
                }
                tokio::time::sleep(debounce + SEARCH_GRACE).await;
                print!("{}", display::render_search(&current_view(&session).await?));
            }
            "results" => print!("{}", display::render_search(&current_view(&session).await?)),
            "pick" => {
                let view = current_view(&session).await?;
                match args.first().and_then(|n| n.parse::<usize>().ok()) {
                    Some(n) if n >= 1 && n <= view.search.results.len() => {
                        let stock = view.search.results[n - 1].clone();
                        let exchange = exchange_of(&stock);
                        session.select(stock, exchange, SelectOptions { reset_period: true, close_search: true });
                        println!("Selected result {}", n);
                    }
                    _ => println!("Usage: pick <n> (1..={})", view.search.results.len()),
                }
            }
            "select" => {
                let Some(symbol) = args.first() else {
                    println!("Usage: select <SYMBOL> [NSE|BSE]");
                    continue;
                };
                let view = current_view(&session).await?;
                let stock = find_on_screen(&view, symbol);
                let exchange = match args.get(1) {
                    Some(ex) => match ex.parse::<Exchange>() {
                        Ok(exchange) => exchange,
                        Err(e) => {
                            println!("{}", e);
                            continue;
                        }
                    },
                    None => exchange_of(&stock),
                };
                session.select(stock, exchange, SelectOptions { reset_period: true, close_search: true });
                println!("Selecting {} on {}", symbol.to_uppercase(), exchange);
            }
            "exchange" => {
                let view = current_view(&session).await?;
                let Some(stock) = view.selected else {
                    println!("No stock selected");
                    continue;
                };
                if !supports_toggle(&stock) {
                    println!("{} trades on one exchange only", fetch_symbol(&stock));
                    continue;
                }
                match args.first().map(|ex| ex.parse::<Exchange>()) {
                    Some(Ok(exchange)) => {
                        session.select(stock, exchange, SelectOptions { reset_period: false, close_search: false });
                    }
                    Some(Err(e)) => println!("{}", e),
                    None => println!("Usage: exchange <NSE|BSE>"),
                }
            }
            "period" => match args.first().map(|p| p.parse::<Period>()) {
                Some(Ok(period)) => {
                    session.set_period(period);
                }
                Some(Err(e)) => println!("{}", e),
                None => println!("Usage: period <1d|1m|3m|1y|3y>"),
            },
            "chart" => {
                let view = current_view(&session).await?;
                print!("{}", display::render_chart(view.chart.as_ref(), view.chart_updating));
            }
            "quit" | "q" | "exit" => break,
            other => println!("Unknown command: {}. Type 'help' for commands.", other),
        }
    }

    session.dispose().await;
    println!("Goodbye!");
    Ok(())
}
