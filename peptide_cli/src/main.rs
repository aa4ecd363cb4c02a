use chrono::{Datelike, Local, NaiveDate, Utc};
use clap::{Parser, Subcommand};
use peptide_core::adherence::CycleProgress;
use peptide_core::*;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "ptrack")]
#[command(about = "Peptide cycle tracker", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Override data directory
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Load configuration from this file instead of the default location
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Pretend today is this date (for testing)
    #[arg(long, global = true, hide = true)]
    today: Option<NaiveDate>,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage cycles
    Cycle {
        #[command(subcommand)]
        command: CycleCommand,
    },

    /// Browse and apply protocol templates
    Protocol {
        #[command(subcommand)]
        command: ProtocolCommand,
    },

    /// List doses in a date range (default: today)
    Doses {
        #[arg(long)]
        from: Option<NaiveDate>,

        #[arg(long)]
        to: Option<NaiveDate>,
    },

    /// Mark a dose as taken
    Log { dose_id: DoseId },

    /// Mark a dose as missed
    Skip { dose_id: DoseId },

    /// Remove a dose from the schedule for good
    Delete { dose_id: DoseId },

    /// Return a dose to scheduled
    Reset { dose_id: DoseId },

    /// Show a month grid (default: current month)
    Calendar {
        #[arg(long)]
        year: Option<i32>,

        #[arg(long)]
        month: Option<u32>,
    },

    /// Show adherence per cycle
    Progress {
        /// Recount from dose history instead of the stored counters
        #[arg(long)]
        from_doses: bool,
    },

    /// Delete every cycle and all dose history
    Clear {
        /// Confirm the deletion
        #[arg(long)]
        yes: bool,
    },

    /// Fold the dose log down to one line per dose
    Compact,
}

#[derive(Subcommand)]
enum CycleCommand {
    /// Start tracking a new cycle
    Add {
        #[arg(long)]
        substance: String,

        /// Dose per administration, e.g. "250 mcg"
        #[arg(long)]
        dose: String,

        /// daily, daily:2, weekly:mon,thu, weekly:3, monthly:1,15
        #[arg(long)]
        frequency: Frequency,

        #[arg(long)]
        start: NaiveDate,

        #[arg(long)]
        end: NaiveDate,

        #[arg(long)]
        route: Option<String>,

        #[arg(long)]
        notes: Option<String>,
    },

    /// List all cycles
    List,

    Pause { id: String },

    Resume { id: String },

    /// Mark a cycle finished. This cannot be undone.
    Complete { id: String },

    /// Change a cycle's fields
    Edit {
        id: String,

        #[arg(long)]
        substance: Option<String>,

        #[arg(long)]
        dose: Option<String>,

        #[arg(long)]
        frequency: Option<Frequency>,

        #[arg(long)]
        start: Option<NaiveDate>,

        #[arg(long)]
        end: Option<NaiveDate>,

        #[arg(long)]
        notes: Option<String>,
    },
}

#[derive(Subcommand)]
enum ProtocolCommand {
    /// List built-in protocols
    List,

    /// Create one cycle per substance in a protocol
    Apply {
        id: String,

        #[arg(long)]
        start: NaiveDate,
    },
}

fn main() -> Result<()> {
    // Keep stdout clean; engine info logs only with RUST_LOG
    peptide_core::logging::init_with_level("warn");

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    let data_dir = cli
        .data_dir
        .clone()
        .unwrap_or_else(|| config.data.data_dir.clone());
    let today = cli.today.unwrap_or_else(|| Local::now().date_naive());
    tracing::debug!("Data dir {:?}, today {}", data_dir, today);

    let mut tracker = Tracker::new(JsonStore::new(data_dir), config);

    match cli.command {
        Some(Commands::Cycle { command }) => cmd_cycle(&mut tracker, command),
        Some(Commands::Protocol { command }) => cmd_protocol(&mut tracker, command),
        Some(Commands::Doses { from, to }) => {
            let from = from.unwrap_or(today);
            let to = to.unwrap_or(from);
            cmd_doses(&tracker, from, to, today)
        }
        Some(Commands::Log { dose_id }) => cmd_action(&mut tracker, &dose_id, DoseAction::Log, today),
        Some(Commands::Skip { dose_id }) => cmd_action(&mut tracker, &dose_id, DoseAction::Skip, today),
        Some(Commands::Delete { dose_id }) => {
            cmd_action(&mut tracker, &dose_id, DoseAction::Delete, today)
        }
        Some(Commands::Reset { dose_id }) => cmd_action(&mut tracker, &dose_id, DoseAction::Reset, today),
        Some(Commands::Calendar { year, month }) => cmd_calendar(
            &tracker,
            year.unwrap_or(today.year()),
            month.unwrap_or(today.month()),
            today,
        ),
        Some(Commands::Progress { from_doses }) => cmd_progress(&tracker, from_doses, today),
        Some(Commands::Clear { yes }) => cmd_clear(&mut tracker, yes),
        Some(Commands::Compact) => cmd_compact(&mut tracker),
        None => {
            // Default to today's doses
            cmd_doses(&tracker, today, today, today)
        }
    }
}

fn cmd_cycle(tracker: &mut Tracker<JsonStore>, command: CycleCommand) -> Result<()> {
    match command {
        CycleCommand::Add {
            substance,
            dose,
            frequency,
            start,
            end,
            route,
            notes,
        } => {
            let draft = NewCycle {
                substance,
                dose_amount: dose,
                frequency,
                start_date: start,
                end_date: end,
                route,
                notes,
                protocol_id: None,
            };
            let (cycle, warnings) = tracker.add_cycle(draft, Utc::now())?;
            print_warnings(&warnings);
            println!("✓ Added cycle {}", cycle.id);
            print_cycle(&cycle);
        }

        CycleCommand::List => {
            let cycles = tracker.cycles()?;
            if cycles.is_empty() {
                println!("No cycles yet.");
            }
            for cycle in &cycles {
                print_cycle(cycle);
            }
        }

        CycleCommand::Pause { id } => {
            let id = tracker.resolve_cycle(&id)?;
            let cycle = tracker.pause_cycle(id)?;
            println!("✓ Paused {} ({})", cycle.substance, short_id(&cycle));
        }

        CycleCommand::Resume { id } => {
            let id = tracker.resolve_cycle(&id)?;
            let cycle = tracker.resume_cycle(id)?;
            println!("✓ Resumed {} ({})", cycle.substance, short_id(&cycle));
        }

        CycleCommand::Complete { id } => {
            let id = tracker.resolve_cycle(&id)?;
            let cycle = tracker.complete_cycle(id, Utc::now())?;
            println!("✓ Completed {} ({})", cycle.substance, short_id(&cycle));
        }

        CycleCommand::Edit {
            id,
            substance,
            dose,
            frequency,
            start,
            end,
            notes,
        } => {
            let edit = CycleEdit {
                substance,
                dose_amount: dose,
                frequency,
                start_date: start,
                end_date: end,
                notes,
            };
            let id = tracker.resolve_cycle(&id)?;
            let (cycle, warnings) = tracker.edit_cycle(id, edit)?;
            print_warnings(&warnings);
            println!("✓ Updated cycle {}", cycle.id);
            print_cycle(&cycle);
        }
    }

    Ok(())
}

fn cmd_protocol(tracker: &mut Tracker<JsonStore>, command: ProtocolCommand) -> Result<()> {
    match command {
        ProtocolCommand::List => {
            for protocol in default_protocols() {
                println!(
                    "{:<16} {} ({} weeks)",
                    protocol.id, protocol.name, protocol.duration_weeks
                );
                println!("  {}", protocol.description);
                for item in &protocol.items {
                    println!("  → {} {} {}", item.substance, item.dose_amount, item.frequency);
                }
            }
        }

        ProtocolCommand::Apply { id, start } => {
            let cycles = tracker.apply_protocol(&id, start, Utc::now())?;
            println!("✓ Applied protocol {} ({} cycles)", id, cycles.len());
            for cycle in &cycles {
                print_cycle(cycle);
            }
        }
    }

    Ok(())
}

fn cmd_doses(
    tracker: &Tracker<JsonStore>,
    from: NaiveDate,
    to: NaiveDate,
    today: NaiveDate,
) -> Result<()> {
    let doses = tracker.schedule(from, to, today)?;
    if doses.is_empty() {
        println!("No doses between {} and {}.", from, to);
        return Ok(());
    }

    for dose in &doses {
        println!(
            "{} {}  {:<20} {:<10} {:<14} {:<9}  {}",
            dose.date,
            dose.time_label(),
            dose.substance,
            dose.dose_amount,
            dose.route,
            dose.status,
            dose.id
        );
    }

    Ok(())
}

fn cmd_action(
    tracker: &mut Tracker<JsonStore>,
    id: &DoseId,
    action: DoseAction,
    today: NaiveDate,
) -> Result<()> {
    let outcome = tracker.apply_action(id, action, today)?;
    if outcome.changed {
        println!("✓ {} {}", past_tense(action), outcome.id);
    } else {
        println!("Dose {} is already {:?}, nothing to do.", outcome.id, outcome.status);
    }
    Ok(())
}

fn past_tense(action: DoseAction) -> &'static str {
    match action {
        DoseAction::Log => "Logged",
        DoseAction::Skip => "Skipped",
        DoseAction::Delete => "Deleted",
        DoseAction::Reset => "Reset",
    }
}

fn cmd_calendar(
    tracker: &Tracker<JsonStore>,
    year: i32,
    month: u32,
    today: NaiveDate,
) -> Result<()> {
    let cells = tracker.month_view(year, month, today)?;
    let first = NaiveDate::from_ymd_opt(year, month, 1)
        .ok_or_else(|| Error::InvalidDate(format!("no such month {}-{:02}", year, month)))?;

    println!("{}", first.format("%B %Y"));
    println!("Mon  Tue  Wed  Thu  Fri  Sat  Sun");

    for week in cells.chunks(7) {
        let row: Vec<String> = week.iter().map(format_cell).collect();
        println!("{}", row.join(" "));
    }

    println!();
    println!("* today  . outside {}  digit = doses that day", first.format("%B"));
    Ok(())
}

fn format_cell(cell: &CalendarCell) -> String {
    let marker = if cell.is_today {
        '*'
    } else if !cell.is_current_month {
        '.'
    } else {
        ' '
    };
    let count = match cell.doses.len() {
        0 => ' ',
        n if n > 9 => '+',
        n => char::from_digit(n as u32, 10).unwrap_or('+'),
    };

    format!("{:>2}{}{}", cell.date.day(), marker, count)
}

fn cmd_progress(tracker: &Tracker<JsonStore>, from_doses: bool, today: NaiveDate) -> Result<()> {
    let progress = if from_doses {
        tracker.progress_from_history(today)?
    } else {
        tracker.progress(today)?
    };

    if progress.is_empty() {
        println!("No cycles yet.");
    }
    for p in &progress {
        print_progress(p);
    }

    Ok(())
}

fn cmd_clear(tracker: &mut Tracker<JsonStore>, yes: bool) -> Result<()> {
    if !yes {
        eprintln!("This deletes every cycle and all dose history. Re-run with --yes to confirm.");
        std::process::exit(1);
    }

    tracker.clear_all()?;
    println!("✓ Cleared all cycles and dose history");
    Ok(())
}

fn cmd_compact(tracker: &mut Tracker<JsonStore>) -> Result<()> {
    let (before, after) = tracker.store_mut().compact()?;
    println!("✓ Compacted dose log: {} → {} lines", before, after);
    Ok(())
}

fn short_id(cycle: &Cycle) -> String {
    cycle.id.to_string().chars().take(8).collect()
}

fn print_cycle(cycle: &Cycle) {
    println!(
        "{}  {:<20} {:<10} {:<24} {} → {}  {:<9} {}/{}",
        short_id(cycle),
        cycle.substance,
        cycle.dose_amount,
        cycle.frequency.to_string(),
        cycle.start_date,
        cycle.end_date,
        cycle.status,
        cycle.doses_logged,
        cycle.total_expected_doses
    );
}

fn print_progress(p: &CycleProgress) {
    let bar: String = p
        .segments
        .iter()
        .map(|filled| if *filled { '█' } else { '░' })
        .collect();
    println!(
        "{:<20} {} {:>5.1}%  {}/{} doses  week {}/{}",
        p.substance, bar, p.percent, p.doses_logged, p.total_expected, p.current_week, p.total_weeks
    );
}

fn print_warnings(warnings: &[FrequencyWarning]) {
    for warning in warnings {
        println!("  ℹ {}", warning);
    }
}
