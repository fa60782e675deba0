#![cfg(not(tarpaulin_include))]

use sheet_ledger::budget::{BudgetBook, template};
use sheet_ledger::cache::MemoryCache;
use sheet_ledger::config::Settings;
use sheet_ledger::layout::LedgerKind;
use sheet_ledger::record::Record;
use sheet_ledger::{downloader, loader, saving};
use std::env;
use std::fs;
use std::time::Instant;

fn usage(program: &str) {
    eprintln!("Usage: {} [-w <workbook.bin.gz>] <command> [args]", program);
    eprintln!("The workbook defaults to SHEET_LEDGER_WORKBOOK or the settings file.");
    eprintln!("Commands:");
    eprintln!("  init                          Create an empty budget workbook");
    eprintln!("  upsert <ledger> <file.json>   Save a JSON array of entries");
    eprintln!("  delete <ledger> <id>          Clear the row holding <id>");
    eprintln!("  list <ledger>                 Print every entry of a ledger");
    eprintln!("  budget [YYYY-MM-DD]           Print the monthly summary");
    eprintln!("  export <sheet> <out.csv>      Write one sheet as CSV");
    eprintln!("  import <sheet> <in.csv>       Replace one sheet from CSV");
    eprintln!("Ledgers: expense, income, recurring");
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let s = Instant::now();
    let args: Vec<String> = env::args().collect();

    let settings = Settings::load()?;
    let (path, args_start) = match args.get(1).map(String::as_str) {
        Some("-w") if args.len() > 2 => (args[2].clone(), 3),
        _ => (settings.workbook_path.display().to_string(), 1),
    };

    if args.len() <= args_start {
        usage(&args[0]);
        return Ok(());
    }

    let path = &path;
    let command = args[args_start].as_str();
    let rest = &args[args_start + 1..];

    if command == "init" {
        saving::save_workbook(&template()?, path)?;
        println!("Created {}", path);
        return Ok(());
    }

    let workbook = saving::load_or_create(path, template)?;
    let mut book = BudgetBook::new(workbook, MemoryCache::new());
    let mut dirty = false;

    match (command, rest) {
        ("upsert", [ledger, file]) => {
            let kind: LedgerKind = ledger.parse()?;
            let records: Vec<Record> = serde_json::from_str(&fs::read_to_string(file)?)?;
            let result = book.save_entries(kind, &records)?;
            for assignment in &result.assignments {
                println!(
                    "{:>6}  {:?}  {}",
                    assignment.row, assignment.placement, assignment.id
                );
            }
            println!(
                "updated: {}, inserted: {}, reused: {}, dropped: {}",
                result.updated, result.inserted, result.reused, result.dropped
            );
            dirty = true;
        }
        ("delete", [ledger, id]) => {
            let kind: LedgerKind = ledger.parse()?;
            let row = book.delete_entry(kind, id)?;
            println!("Cleared row {}", row);
            dirty = true;
        }
        ("list", [ledger]) => {
            let kind: LedgerKind = ledger.parse()?;
            for entry in book.list_entries(kind)? {
                println!("{}", entry);
            }
        }
        ("budget", day) if day.len() <= 1 => {
            let day = day.first().map(|d| d.parse::<chrono::NaiveDate>()).transpose()?;
            let summary = book.budget_summary(day)?;
            println!("{} {}", summary.month_name, summary.year);
            println!("  Income:        {:>12.2}", summary.income);
            println!("  Spent:         {:>12.2}", summary.spent);
            println!("  Left to spend: {:>12.2}", summary.left_to_spend);
            for category in &summary.categories {
                println!(
                    "  {:<20} {:>10.2} / {:>10.2}",
                    category.name, category.actual, category.budgeted
                );
            }
        }
        ("export", [sheet, out]) => {
            let csv = downloader::to_csv(book.workbook().sheet(sheet)?)?;
            fs::write(out, csv)?;
            println!("Wrote {}", out);
        }
        ("import", [sheet, input]) => {
            let mut workbook = book.workbook().clone();
            workbook
                .sheets
                .insert(sheet.to_string(), loader::from_csv(input, sheet)?);
            book.replace_workbook(workbook)?;
            println!("Imported {} into {}", input, sheet);
            dirty = true;
        }
        _ => {
            usage(&args[0]);
            return Ok(());
        }
    }

    if dirty {
        saving::save_workbook(book.workbook(), path)?;
    }

    log::info!("Total elapsed time: {:.1} seconds", s.elapsed().as_secs_f64());
    Ok(())
}
