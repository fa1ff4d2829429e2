use anyhow::{Context, Result};
use clap::Parser;
use std::io::{self, BufRead, Write};
use sysrev_etl::core::dataset_pipeline::{
    compose_report, detail_section, file_analysis_section, filtered_section, head_table_section,
    key_columns_section, summary_section, RecordFilter,
};
use sysrev_etl::core::Storage;
use sysrev_etl::domain::dataset::Dataset;
use sysrev_etl::domain::table::render_table;
use sysrev_etl::utils::logger;
use sysrev_etl::LocalStorage;

#[derive(Parser)]
#[command(name = "review-shell")]
#[command(about = "Interactive explorer for publication screening datasets")]
struct Args {
    /// 要瀏覽的出版品 CSV 檔案路徑
    dataset: String,

    /// Output directory for exported files
    #[arg(short, long, default_value = "./output")]
    output_path: String,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    // 初始化日誌
    logger::init_cli_logger(args.verbose);

    // 載入資料集；失敗時輸出友善訊息後離開
    let dataset = match Dataset::from_path(&args.dataset) {
        Ok(dataset) => dataset,
        Err(e) => {
            eprintln!("❌ {}", e.user_friendly_message());
            eprintln!("💡 建議: {}", e.recovery_suggestion());
            std::process::exit(1);
        }
    };
    let storage = LocalStorage::new(args.output_path.clone());

    println!("📚 PUBLICATION DATASET EXPLORER");
    println!(
        "Loaded {} rows ({} typed records) from {}",
        dataset.raw.row_count(),
        dataset.publications.len(),
        args.dataset
    );

    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();

    loop {
        print_menu();
        let Some(choice) = read_line(&mut lines)? else {
            // EOF：視同離開
            println!();
            break;
        };

        match choice.trim() {
            "1" => println!(
                "{}",
                compose_report(&[
                    file_analysis_section(&dataset),
                    head_table_section(&dataset, 5),
                    key_columns_section(&dataset, 10),
                ])
            ),
            "2" => show_details(&dataset, &mut lines)?,
            "3" => println!("{}", summary_section(&dataset)),
            "4" => show_filtered(&dataset, &mut lines)?,
            "5" => export_clean_csv(&dataset, &storage, &args.output_path, &mut lines)?,
            "6" => show_custom_columns(&dataset, &mut lines)?,
            "0" => {
                println!("Goodbye!");
                break;
            }
            "" => continue,
            other => println!("❌ Unknown choice: {}", other),
        }
    }

    Ok(())
}

fn print_menu() {
    println!();
    println!("==============================");
    println!(" PUBLICATION DATASET EXPLORER");
    println!("==============================");
    println!("1) File overview");
    println!("2) Record details");
    println!("3) Dataset summary");
    println!("4) Filtered views");
    println!("5) Export cleaned CSV");
    println!("6) Custom column view");
    println!("0) Exit");
    print!("Select an option: ");
}

/// 讀取一行輸入；EOF 時回傳 None
fn read_line(lines: &mut impl Iterator<Item = io::Result<String>>) -> Result<Option<String>> {
    io::stdout().flush().context("Failed to flush stdout")?;
    match lines.next() {
        Some(line) => Ok(Some(line.context("Failed to read from stdin")?)),
        None => Ok(None),
    }
}

fn prompt(
    lines: &mut impl Iterator<Item = io::Result<String>>,
    message: &str,
) -> Result<Option<String>> {
    print!("{}", message);
    read_line(lines)
}

fn show_details(
    dataset: &Dataset,
    lines: &mut impl Iterator<Item = io::Result<String>>,
) -> Result<()> {
    let Some(answer) = prompt(lines, "How many records? [3]: ")? else {
        return Ok(());
    };
    let count = match answer.trim() {
        "" => 3,
        text => match text.parse::<usize>() {
            Ok(count) if count >= 1 => count,
            _ => {
                println!("❌ Enter a positive number");
                return Ok(());
            }
        },
    };
    println!("{}", detail_section(dataset, count));
    Ok(())
}

fn show_filtered(
    dataset: &Dataset,
    lines: &mut impl Iterator<Item = io::Result<String>>,
) -> Result<()> {
    println!("1) Included records");
    println!("2) Excluded records");
    println!("3) Published 2020 or later");
    let Some(answer) = prompt(lines, "Select a filter: ")? else {
        return Ok(());
    };
    let filter = match answer.trim() {
        "1" => RecordFilter::Included,
        "2" => RecordFilter::Excluded,
        "3" => RecordFilter::Recent,
        other => {
            println!("❌ Unknown filter: {}", other);
            return Ok(());
        }
    };
    println!("{}", filtered_section(dataset, filter, 10));
    Ok(())
}

fn export_clean_csv(
    dataset: &Dataset,
    storage: &LocalStorage,
    output_path: &str,
    lines: &mut impl Iterator<Item = io::Result<String>>,
) -> Result<()> {
    let Some(answer) = prompt(lines, "File name [cleaned_publications.csv]: ")? else {
        return Ok(());
    };
    let name = match answer.trim() {
        "" => "cleaned_publications.csv",
        text => text,
    };

    // 匯出失敗不應結束互動模式
    let outcome = dataset
        .clean_csv_bytes()
        .and_then(|bytes| storage.write_file(name, &bytes));
    match outcome {
        Ok(()) => println!(
            "✅ Exported {} records to {}/{}",
            dataset.publications.len(),
            output_path,
            name
        ),
        Err(e) => {
            println!("❌ {}", e.user_friendly_message());
            println!("💡 建議: {}", e.recovery_suggestion());
        }
    }
    Ok(())
}

fn show_custom_columns(
    dataset: &Dataset,
    lines: &mut impl Iterator<Item = io::Result<String>>,
) -> Result<()> {
    println!("Available columns:");
    for (idx, name) in dataset.raw.columns.iter().enumerate() {
        println!("  {:>2}. {}", idx + 1, name);
    }
    let Some(answer) = prompt(lines, "Column numbers (comma separated, e.g. 1,3,7): ")? else {
        return Ok(());
    };

    let parsed: std::result::Result<Vec<usize>, _> = answer
        .split(',')
        .map(|part| part.trim().parse::<usize>())
        .collect();
    match parsed {
        Ok(numbers) if !numbers.is_empty() && numbers.iter().all(|&n| n >= 1) => {
            let indices: Vec<usize> = numbers.iter().map(|&n| n - 1).collect();
            match dataset.raw.select_columns(&indices) {
                Some(table) => println!("{}", render_table(&table.columns, table.head(10), 30)),
                None => println!(
                    "❌ Column numbers must be between 1 and {}",
                    dataset.raw.column_count()
                ),
            }
        }
        _ => println!("❌ Enter comma separated column numbers, e.g. 1,3,7"),
    }
    Ok(())
}
