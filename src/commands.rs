//! Command handlers for the biblion CLI.

use std::process::ExitCode;

use crate::catalog::CatalogStore;
use crate::errors::Error;
use crate::output::*;
use crate::types::{NewTitle, Role, TitlePatch};

/// Requester identity shared by every command.
pub struct Requester {
    pub member_id: i64,
    pub role: Role,
}

/// Commands supported by the biblion CLI.
#[derive(clap::Subcommand)]
pub enum Commands {
    /// Manage catalog titles
    #[command(subcommand)]
    Title(TitleCommands),

    /// Manage inventory records (staff only)
    #[command(subcommand)]
    Inventory(InventoryCommands),

    /// Borrow one copy of a title
    Borrow {
        /// Title ID
        title_id: i64,
    },

    /// Return a borrowed title
    Return {
        /// Title ID
        title_id: i64,
    },

    /// List the requester's open loans
    Loans,

    /// List the requester's full loan history
    History,

    /// Aggregate catalog statistics (staff only)
    Stats,

    /// Search the catalog by meaning
    Search {
        /// Search query text
        query: String,

        /// Maximum number of results (default: 10)
        #[arg(short = 'l', long, default_value = "10")]
        limit: usize,
    },

    Version,
}

#[derive(clap::Subcommand)]
pub enum TitleCommands {
    Add {
        /// Title name
        name: String,

        /// Creator (author)
        creator: String,

        #[arg(long)]
        publisher: Option<String>,

        #[arg(long)]
        summary: Option<String>,

        #[arg(long)]
        category: Option<String>,

        #[arg(long)]
        year: Option<i64>,

        /// Hide the title from ordinary members
        #[arg(long)]
        hidden: bool,
    },
    Get {
        /// Title ID
        id: i64,
    },
    List {
        /// Filter by category
        #[arg(long)]
        category: Option<String>,

        /// Maximum number of results (default: 20)
        #[arg(short = 'l', long, default_value = "20")]
        limit: usize,

        /// Number of results to skip
        #[arg(long, default_value = "0")]
        offset: usize,
    },
    Update {
        /// Title ID
        id: i64,

        #[arg(long)]
        name: Option<String>,

        #[arg(long)]
        creator: Option<String>,

        #[arg(long)]
        publisher: Option<String>,

        #[arg(long)]
        summary: Option<String>,

        #[arg(long)]
        category: Option<String>,

        #[arg(long)]
        year: Option<i64>,

        #[arg(long)]
        circulating: Option<bool>,
    },
    Delete {
        /// Title ID
        id: i64,
    },
}

#[derive(clap::Subcommand)]
pub enum InventoryCommands {
    /// Create the inventory record for a title
    Set {
        /// Title ID
        title_id: i64,

        /// Total copies owned
        total: i64,

        /// Copies currently on loan
        #[arg(long, default_value = "0")]
        borrowed: i64,
    },
    /// Adjust an inventory record by signed deltas
    Adjust {
        /// Title ID
        title_id: i64,

        /// Change to total copies
        #[arg(long, default_value = "0")]
        total: i64,

        /// Change to borrowed copies
        #[arg(long, default_value = "0")]
        borrowed: i64,
    },
    Get {
        /// Title ID
        title_id: i64,
    },
    List {
        /// Maximum number of results (default: 20)
        #[arg(short = 'l', long, default_value = "20")]
        limit: usize,

        /// Number of results to skip
        #[arg(long, default_value = "0")]
        offset: usize,
    },
    Delete {
        /// Title ID
        title_id: i64,
    },
}

/// Execute a CLI command.
pub fn execute(
    command: &Commands,
    store: &mut CatalogStore,
    requester: &Requester,
    json: bool,
) -> Result<ExitCode, Error> {
    match command {
        Commands::Title(cmd) => execute_title(cmd, store, requester, json),
        Commands::Inventory(cmd) => execute_inventory(cmd, store, requester, json),
        Commands::Borrow { title_id } => handle_borrow(store, requester, *title_id, json),
        Commands::Return { title_id } => handle_return(store, requester, *title_id, json),
        Commands::Loans => handle_loans(store, requester, json),
        Commands::History => handle_history(store, requester, json),
        Commands::Stats => handle_stats(store, requester, json),
        Commands::Search { query, limit } => handle_search(store, requester, query, *limit, json),
        Commands::Version => handle_version(json),
    }
}

fn execute_title(
    command: &TitleCommands,
    store: &mut CatalogStore,
    requester: &Requester,
    json: bool,
) -> Result<ExitCode, Error> {
    match command {
        TitleCommands::Add {
            name,
            creator,
            publisher,
            summary,
            category,
            year,
            hidden,
        } => {
            let new = NewTitle {
                name: name.clone(),
                creator: creator.clone(),
                publisher: publisher.clone(),
                summary: summary.clone(),
                category: category.clone(),
                year: *year,
                circulating: !hidden,
            };
            let view = store.create_title(requester.role, &new)?;
            if json {
                print_json(&TitleResponse {
                    status: "created".to_string(),
                    title: view,
                });
            } else {
                println!("Added title: {}", view.id);
            }
            Ok(ExitCode::SUCCESS)
        }
        TitleCommands::Get { id } => {
            let view = store.get_title(requester.role, requester.member_id, *id)?;
            if json {
                print_json(&view);
            } else {
                print_title(&view);
            }
            Ok(ExitCode::SUCCESS)
        }
        TitleCommands::List {
            category,
            limit,
            offset,
        } => {
            let titles = store.list_titles(
                requester.role,
                requester.member_id,
                category.as_deref(),
                *limit,
                *offset,
            )?;
            if json {
                print_json(&TitleListResponse { titles });
            } else {
                for view in titles {
                    let availability = match view.available_copies {
                        Some(n) => format!("{} available", n),
                        None => "no inventory".to_string(),
                    };
                    println!("{}: {} by {} [{}]", view.id, view.name, view.creator, availability);
                }
            }
            Ok(ExitCode::SUCCESS)
        }
        TitleCommands::Update {
            id,
            name,
            creator,
            publisher,
            summary,
            category,
            year,
            circulating,
        } => {
            let patch = TitlePatch {
                name: name.clone(),
                creator: creator.clone(),
                publisher: publisher.clone(),
                summary: summary.clone(),
                category: category.clone(),
                year: *year,
                circulating: *circulating,
            };
            if patch.is_empty() {
                return Err(Error::InvalidInput(
                    "no fields to update; pass at least one --flag".to_string(),
                ));
            }
            let view = store.update_title(requester.role, *id, &patch)?;
            if json {
                print_json(&TitleResponse {
                    status: "updated".to_string(),
                    title: view,
                });
            } else {
                println!("Updated title: {}", view.id);
            }
            Ok(ExitCode::SUCCESS)
        }
        TitleCommands::Delete { id } => {
            store.delete_title(requester.role, *id)?;
            if json {
                print_json(&DeleteResponse {
                    status: "deleted".to_string(),
                    id: *id,
                });
            } else {
                println!("Deleted title: {}", id);
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn execute_inventory(
    command: &InventoryCommands,
    store: &mut CatalogStore,
    requester: &Requester,
    json: bool,
) -> Result<ExitCode, Error> {
    match command {
        InventoryCommands::Set {
            title_id,
            total,
            borrowed,
        } => {
            let record = store.set_inventory(requester.role, *title_id, *total, *borrowed)?;
            print_inventory(record, "created", json);
            Ok(ExitCode::SUCCESS)
        }
        InventoryCommands::Adjust {
            title_id,
            total,
            borrowed,
        } => {
            let record = store.update_inventory(requester.role, *title_id, *total, *borrowed)?;
            print_inventory(record, "updated", json);
            Ok(ExitCode::SUCCESS)
        }
        InventoryCommands::Get { title_id } => {
            let record = store.get_inventory(requester.role, *title_id)?;
            print_inventory(record, "ok", json);
            Ok(ExitCode::SUCCESS)
        }
        InventoryCommands::List { limit, offset } => {
            let records = store.list_inventory(requester.role, *limit, *offset)?;
            if json {
                print_json(&InventoryListResponse { records });
            } else {
                for record in records {
                    println!(
                        "title {}: {} of {} available",
                        record.title_id,
                        record.available_copies(),
                        record.total_copies
                    );
                }
            }
            Ok(ExitCode::SUCCESS)
        }
        InventoryCommands::Delete { title_id } => {
            store.delete_inventory(requester.role, *title_id)?;
            if json {
                print_json(&DeleteResponse {
                    status: "deleted".to_string(),
                    id: *title_id,
                });
            } else {
                println!("Deleted inventory for title: {}", title_id);
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn handle_borrow(
    store: &mut CatalogStore,
    requester: &Requester,
    title_id: i64,
    json: bool,
) -> Result<ExitCode, Error> {
    let loan = store.borrow(requester.member_id, title_id)?;
    if json {
        print_json(&LoanResponse {
            status: "borrowed".to_string(),
            loan,
        });
    } else {
        println!(
            "Borrowed title {} (loan {}, times borrowed: {})",
            loan.title_id, loan.id, loan.repeat_count
        );
    }
    Ok(ExitCode::SUCCESS)
}

fn handle_return(
    store: &mut CatalogStore,
    requester: &Requester,
    title_id: i64,
    json: bool,
) -> Result<ExitCode, Error> {
    let loan = store.return_title(requester.member_id, title_id)?;
    if json {
        print_json(&LoanResponse {
            status: "returned".to_string(),
            loan,
        });
    } else {
        println!("Returned title {} (loan {})", loan.title_id, loan.id);
    }
    Ok(ExitCode::SUCCESS)
}

fn handle_loans(
    store: &mut CatalogStore,
    requester: &Requester,
    json: bool,
) -> Result<ExitCode, Error> {
    let loans = store.active_loans(requester.member_id)?;
    if json {
        print_json(&LoanListResponse { loans });
    } else {
        for loan in loans {
            println!(
                "title {}: borrowed {} (times borrowed: {})",
                loan.title_id, loan.created_at, loan.repeat_count
            );
        }
    }
    Ok(ExitCode::SUCCESS)
}

fn handle_history(
    store: &mut CatalogStore,
    requester: &Requester,
    json: bool,
) -> Result<ExitCode, Error> {
    let loans = store.loan_history(requester.member_id)?;
    if json {
        print_json(&LoanListResponse { loans });
    } else {
        for loan in loans {
            let state = if loan.closed { "closed" } else { "active" };
            println!(
                "title {}: {} since {} (times borrowed: {})",
                loan.title_id, state, loan.created_at, loan.repeat_count
            );
        }
    }
    Ok(ExitCode::SUCCESS)
}

fn handle_stats(
    store: &mut CatalogStore,
    requester: &Requester,
    json: bool,
) -> Result<ExitCode, Error> {
    let stats = store.stats(requester.role)?;
    if json {
        print_json(&StatsResponse {
            total_titles: stats.total_titles,
            total_borrowed: stats.total_borrowed,
            open_loans: stats.open_loans,
        });
    } else {
        println!("Titles: {}", stats.total_titles);
        println!("Copies on loan: {}", stats.total_borrowed);
        println!("Open loans: {}", stats.open_loans);
    }
    Ok(ExitCode::SUCCESS)
}

fn handle_search(
    store: &mut CatalogStore,
    requester: &Requester,
    query: &str,
    limit: usize,
    json: bool,
) -> Result<ExitCode, Error> {
    let hits = store.semantic_search(requester.role, requester.member_id, query, limit)?;
    if json {
        print_json(&SearchResponse { results: hits });
    } else {
        for hit in hits {
            println!(
                "{} [score: {:.2}]\n  {} by {}\n",
                hit.title.id, hit.similarity_score, hit.title.name, hit.title.creator
            );
        }
    }
    Ok(ExitCode::SUCCESS)
}

fn handle_version(json: bool) -> Result<ExitCode, Error> {
    if json {
        print_json(&serde_json::json!({
            "version": env!("CARGO_PKG_VERSION"),
            "name": env!("CARGO_PKG_NAME")
        }));
    } else {
        println!("{} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));
    }
    Ok(ExitCode::SUCCESS)
}

fn print_title(view: &crate::types::TitleView) {
    println!("ID: {}", view.id);
    println!("Name: {}", view.name);
    println!("Creator: {}", view.creator);
    if let Some(publisher) = &view.publisher {
        println!("Publisher: {}", publisher);
    }
    if let Some(category) = &view.category {
        println!("Category: {}", category);
    }
    if let Some(year) = view.year {
        println!("Year: {}", year);
    }
    if let Some(summary) = &view.summary {
        println!("Summary: {}", summary);
    }
    println!("Circulating: {}", view.circulating);
    match view.available_copies {
        Some(n) => println!("Available copies: {}", n),
        None => println!("Available copies: no inventory record"),
    }
    if view.is_borrowed_by_requester {
        println!("On loan to you");
    }
}

fn print_inventory(record: crate::sqlite::InventoryRecord, status: &str, json: bool) {
    if json {
        let available = record.available_copies();
        print_json(&InventoryResponse {
            status: status.to_string(),
            inventory: record,
            available_copies: available,
        });
    } else {
        println!(
            "title {}: {} total, {} borrowed, {} available",
            record.title_id,
            record.total_copies,
            record.borrowed_copies,
            record.available_copies()
        );
    }
}
