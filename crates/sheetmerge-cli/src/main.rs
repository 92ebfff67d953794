//! sheetmerge CLI
//!
//! Command-line tool for merging, grouping, filtering and exporting sheets.

use clap::{Parser, Subcommand};
use sheetmerge_core::{
    common_columns, export_table, record_export, scan_paths, to_tsv, Aggregate, BatchFile, Error,
    ExportFormat, Filter, HistoryFile, MergeMode, Recipe, RunReport, SortSpec, SourceTable, Table,
    Workspace,
};
use std::path::{Path, PathBuf};

#[derive(Parser, Debug)]
#[command(name = "sheetmerge")]
#[command(about = "Merge, group and export tabular sheets", long_about = None)]
#[command(version)]
struct Cli {
    /// Enable debug logging (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List the sheets found in the inputs
    Sheets {
        /// Sheet files, workbooks or directories
        #[arg(short, long, required = true)]
        input: Vec<PathBuf>,

        /// Print the sheet list as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show the columns every selected sheet has (join key options)
    Keys {
        /// Sheet files, workbooks or directories
        #[arg(short, long, required = true)]
        input: Vec<PathBuf>,

        /// Sheet or file names to leave out
        #[arg(short = 'x', long)]
        exclude: Vec<String>,
    },

    /// Merge sheets, optionally group, then show or export the view
    Merge {
        /// Sheet files, workbooks or directories
        #[arg(short, long, required = true)]
        input: Vec<PathBuf>,

        /// Sheet or file names to leave out
        #[arg(short = 'x', long)]
        exclude: Vec<String>,

        /// Merge mode (append, auto or join)
        #[arg(short, long, default_value = "append")]
        mode: MergeMode,

        /// Join key column (join mode, repeatable)
        #[arg(short, long)]
        key: Vec<String>,

        /// Group-by column (repeatable)
        #[arg(short, long)]
        group_by: Vec<String>,

        /// Aggregate for the group-by (count, sum, avg, min or max)
        #[arg(short, long, default_value = "count")]
        aggregate: Aggregate,

        /// Column to aggregate (repeatable)
        #[arg(long)]
        agg_column: Vec<String>,

        /// Row filter as column=keyword (repeatable, all must match)
        #[arg(short, long, value_parser = parse_filter)]
        filter: Vec<Filter>,

        /// Sort column, optionally suffixed with :desc
        #[arg(short, long, value_parser = parse_sort)]
        sort: Option<SortSpec>,

        /// Columns to display, in order (comma-separated)
        #[arg(short, long)]
        columns: Option<String>,

        /// Maximum number of rows to display
        #[arg(short, long)]
        limit: Option<usize>,

        /// Print the whole active table as tab-separated text, ignoring the view
        #[arg(long, conflicts_with = "output")]
        copy: bool,

        /// Export to this file instead of printing
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Export format (csv, tsv, json or xlsx); guessed from the extension if omitted
        #[arg(long)]
        format: Option<ExportFormat>,

        /// History file to record exports in
        #[arg(long)]
        history: Option<PathBuf>,
    },

    /// Run a recipe file
    Run {
        /// Path to recipe file (JSON)
        #[arg(short, long)]
        recipe: PathBuf,

        /// History file to record the export in
        #[arg(long)]
        history: Option<PathBuf>,
    },

    /// Run a batch of recipe files
    Batch {
        /// Path to batch file (JSON)
        #[arg(short, long)]
        batch: PathBuf,
    },

    /// Create a recipe file template
    CreateRecipe {
        /// Output path for the recipe file
        #[arg(short, long)]
        output: PathBuf,

        /// Inputs to include in the recipe
        #[arg(short, long)]
        input: Vec<PathBuf>,

        /// Export destination the recipe writes to
        #[arg(long, default_value = "merged.csv")]
        export: PathBuf,
    },

    /// Create a batch file template
    CreateBatch {
        /// Output path for the batch file
        #[arg(short, long)]
        output: PathBuf,

        /// Recipe files to include
        #[arg(short, long)]
        recipe: Vec<PathBuf>,
    },

    /// List recorded exports
    History {
        /// History file to read
        #[arg(long, default_value = sheetmerge_core::history::DEFAULT_HISTORY_FILE)]
        history: PathBuf,
    },
}

fn main() {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "warn" };
    env_logger::init_from_env(env_logger::Env::new().default_filter_or(default_level));

    if let Err(e) = run(cli) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> sheetmerge_core::Result<()> {
    match cli.command {
        Commands::Sheets { input, json } => cmd_sheets(&input, json),
        Commands::Keys { input, exclude } => cmd_keys(&input, &exclude),
        Commands::Merge {
            input,
            exclude,
            mode,
            key,
            group_by,
            aggregate,
            agg_column,
            filter,
            sort,
            columns,
            limit,
            copy,
            output,
            format,
            history,
        } => {
            let options = MergeOptions {
                mode,
                keys: key,
                group_by,
                aggregate,
                agg_columns: agg_column,
                filters: filter,
                sort: sort.unwrap_or_default(),
                columns: columns.map(|c| split_columns(&c)),
            };
            let workspace = build_workspace(load_sources(&input, &exclude)?, &options)?;
            if copy {
                println!("{}", copy_text(&workspace)?);
                return Ok(());
            }
            match output {
                Some(output) => {
                    let format = format.unwrap_or_else(|| ExportFormat::from_path(&output));
                    cmd_export(&workspace, &output, format, history.as_deref())
                }
                None => {
                    let view = workspace.view()?;
                    print_table(&view.table, limit);
                    Ok(())
                }
            }
        }
        Commands::Run { recipe, history } => cmd_run(&recipe, history.as_deref()),
        Commands::Batch { batch } => cmd_batch(&batch),
        Commands::CreateRecipe {
            output,
            input,
            export,
        } => cmd_create_recipe(&output, input, &export),
        Commands::CreateBatch { output, recipe } => cmd_create_batch(&output, recipe),
        Commands::History { history } => cmd_history(&history),
    }
}

/// Everything the merge command applies after loading
#[derive(Debug, Clone, Default)]
struct MergeOptions {
    mode: MergeMode,
    keys: Vec<String>,
    group_by: Vec<String>,
    aggregate: Aggregate,
    agg_columns: Vec<String>,
    filters: Vec<Filter>,
    sort: SortSpec,
    columns: Option<Vec<String>>,
}

fn load_sources(inputs: &[PathBuf], exclude: &[String]) -> sheetmerge_core::Result<Vec<SourceTable>> {
    let scan = scan_paths(inputs)?;
    for (path, reason) in &scan.skipped {
        eprintln!("Warning: skipped {}: {}", path.display(), reason);
    }

    let mut sheets = scan.sheets;
    for sheet in &mut sheets {
        if exclude
            .iter()
            .any(|name| *name == sheet.sheet_name || *name == sheet.file_name)
        {
            sheet.included = false;
        }
    }
    Ok(sheets)
}

fn build_workspace(sources: Vec<SourceTable>, options: &MergeOptions) -> sheetmerge_core::Result<Workspace> {
    let mut workspace = Workspace::new(sources);
    workspace.merge(options.mode, &options.keys)?;

    if !options.group_by.is_empty() {
        workspace.group_by(&options.group_by, &options.agg_columns, options.aggregate)?;
    }

    workspace.set_filters(options.filters.clone());
    workspace.set_sort(options.sort.clone());
    if let Some(columns) = &options.columns {
        workspace.show_columns_by_name(columns.as_slice())?;
    }
    Ok(workspace)
}

/// The active table as clipboard text, before any filter, sort or projection
fn copy_text(workspace: &Workspace) -> sheetmerge_core::Result<String> {
    let table = workspace.active_table().ok_or(Error::NoActiveTable)?;
    Ok(to_tsv(table))
}

fn cmd_sheets(inputs: &[PathBuf], json: bool) -> sheetmerge_core::Result<()> {
    let scan = scan_paths(inputs)?;

    if json {
        let listing: Vec<serde_json::Value> = scan
            .sheets
            .iter()
            .map(|s| {
                serde_json::json!({
                    "file": s.file_name,
                    "sheet": s.sheet_name,
                    "columns": s.table.header,
                    "rows": s.table.row_count(),
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&listing)?);
        return Ok(());
    }

    println!("Sheets ({}):", scan.sheets.len());
    println!();
    for sheet in &scan.sheets {
        println!(
            "  {} ({} columns, {} rows)",
            sheet.label(),
            sheet.table.column_count(),
            sheet.table.row_count()
        );
        println!("    {}", sheet.table.header.join(", "));
    }

    if !scan.skipped.is_empty() {
        println!();
        println!("Skipped ({}):", scan.skipped.len());
        for (path, reason) in &scan.skipped {
            println!("  {}: {}", path.display(), reason);
        }
    }

    Ok(())
}

fn cmd_keys(inputs: &[PathBuf], exclude: &[String]) -> sheetmerge_core::Result<()> {
    let sheets = load_sources(inputs, exclude)?;
    let tables: Vec<&Table> = sheets.iter().filter(|s| s.included).map(|s| &s.table).collect();

    let keys = common_columns(&tables);
    if keys.is_empty() {
        println!("No column is shared by all {} selected sheets.", tables.len());
    } else {
        println!("Join key options ({} sheets):", tables.len());
        for key in keys {
            println!("  {}", key);
        }
    }

    Ok(())
}

fn cmd_export(
    workspace: &Workspace,
    output: &Path,
    format: ExportFormat,
    history: Option<&Path>,
) -> sheetmerge_core::Result<()> {
    let view = workspace.view()?;
    let rows = export_table(&view.table, output, format)?;

    let report = RunReport {
        output: output.to_path_buf(),
        format,
        rows,
        columns: view.table.column_count(),
        sources: workspace.included_sources().iter().map(|s| s.label()).collect(),
    };
    record_history(&report, history)?;

    println!("Exported {} rows to {}", rows, output.display());
    Ok(())
}

fn record_history(report: &RunReport, history: Option<&Path>) -> sheetmerge_core::Result<()> {
    let path = history
        .map(Path::to_path_buf)
        .unwrap_or_else(|| HistoryFile::default_path_for(&report.output));
    record_export(&path, report)?;
    log::debug!("recorded export in {}", path.display());
    Ok(())
}

fn cmd_run(recipe_path: &Path, history: Option<&Path>) -> sheetmerge_core::Result<()> {
    let recipe = Recipe::load(recipe_path)?;
    println!(
        "Loaded recipe with {} input(s), {} merge",
        recipe.inputs.len(),
        recipe.merge.mode
    );

    let report = recipe.run()?;
    record_history(&report, history)?;

    println!(
        "Exported {} rows x {} columns to {}",
        report.rows,
        report.columns,
        report.output.display()
    );
    for source in &report.sources {
        println!("  - {}", source);
    }

    Ok(())
}

fn cmd_batch(batch_path: &Path) -> sheetmerge_core::Result<()> {
    let batch = BatchFile::load(batch_path)?;
    println!("Running batch with {} recipe files", batch.recipes.len());
    println!();

    let result = batch.run();

    for report in &result.reports {
        if let Err(e) = record_history(report, None) {
            eprintln!("Warning: could not record history: {}", e);
        }
        println!("  {} rows -> {}", report.rows, report.output.display());
    }

    println!();
    println!("Batch complete:");
    println!("  {} recipes succeeded", result.reports.len());

    if !result.errors.is_empty() {
        println!("\nErrors ({}):", result.errors.len());
        for (path, err) in &result.errors {
            println!("  {}: {}", path.display(), err);
        }
    }

    Ok(())
}

fn cmd_create_recipe(output: &Path, inputs: Vec<PathBuf>, export: &Path) -> sheetmerge_core::Result<()> {
    let inputs = if inputs.is_empty() {
        vec![PathBuf::from("sheets")]
    } else {
        inputs
    };
    let mut recipe = Recipe::new(inputs, export);
    recipe.merge.mode = MergeMode::Auto;

    recipe.save(output)?;
    println!("Created recipe file: {}", output.display());
    println!();
    println!("Edit the file to configure merge, group, filters and sort, then run:");
    println!("  sheetmerge run --recipe {}", output.display());

    Ok(())
}

fn cmd_create_batch(output: &Path, recipes: Vec<PathBuf>) -> sheetmerge_core::Result<()> {
    let recipes = if recipes.is_empty() {
        vec![PathBuf::from("recipe1.json"), PathBuf::from("recipe2.json")]
    } else {
        recipes
    };
    let batch = BatchFile { recipes };

    batch.save(output)?;
    println!("Created batch file: {}", output.display());
    println!();
    println!("Edit the file to list your recipes, then run:");
    println!("  sheetmerge batch --batch {}", output.display());

    Ok(())
}

fn cmd_history(path: &Path) -> sheetmerge_core::Result<()> {
    let history = HistoryFile::load(path)?;

    if history.total_entries() == 0 {
        println!("No exports recorded in {}", path.display());
        return Ok(());
    }

    println!("Exports ({}):", history.total_entries());
    for entry in &history.entries {
        println!(
            "  {}  {} ({}, {} rows x {} columns) from {}",
            entry.timestamp.format("%Y-%m-%d %H:%M:%S"),
            entry.output.display(),
            entry.format,
            entry.rows,
            entry.columns,
            entry.sources.join(", ")
        );
    }

    Ok(())
}

fn print_table(table: &Table, limit: Option<usize>) {
    println!("{}", table.header.join("\t"));
    println!("{}", "-".repeat(table.header.len() * 12));

    let row_limit = limit.unwrap_or(table.row_count());
    for row in table.rows.iter().take(row_limit) {
        println!("{}", row.join("\t"));
    }

    if table.row_count() > row_limit {
        println!("... ({} more rows)", table.row_count() - row_limit);
    }
}

fn split_columns(arg: &str) -> Vec<String> {
    arg.split(',')
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(str::to_string)
        .collect()
}

/// Parse "column=keyword"
fn parse_filter(arg: &str) -> Result<Filter, String> {
    let (column, keyword) = arg
        .split_once('=')
        .ok_or_else(|| format!("invalid filter '{}', expected column=keyword", arg))?;
    if column.is_empty() {
        return Err(format!("invalid filter '{}': empty column name", arg));
    }
    Ok(Filter::new(column, keyword))
}

/// Parse "column", "column:asc" or "column:desc"
fn parse_sort(arg: &str) -> Result<SortSpec, String> {
    let sort = match arg.rsplit_once(':') {
        Some((column, dir)) if dir.eq_ignore_ascii_case("desc") => SortSpec::descending(column),
        Some((column, dir)) if dir.eq_ignore_ascii_case("asc") => SortSpec::ascending(column),
        _ => SortSpec::ascending(arg),
    };
    match sort.column.as_deref() {
        Some("") | None => Err(format!("invalid sort '{}': empty column name", arg)),
        Some(_) => Ok(sort),
    }
}
