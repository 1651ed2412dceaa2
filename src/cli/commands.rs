use std::fmt::Write as _;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Args, Subcommand};
use strum::IntoEnumIterator;
use time::macros::format_description;
use time::{Date, Duration, OffsetDateTime};

use crate::app::App;
use crate::calendar;
use crate::config::{AppConfig, ConfigPaths};
use crate::countdown::{frame_for, CountdownStyle, UNAVAILABLE_SHORT_LABEL};
use crate::deadline::{parse_deadline, Deadline, MonthStyle};
use crate::feed::{into_records, load_feed};
use crate::model::{DeadlineRecord, RenderItem};
use crate::pipeline::{facet_counts, render_list, upcoming, venue_names};
use crate::search::{FilterCategory, FilterCriteria};

#[derive(Args, Debug, Clone, Default)]
pub struct ListArgs {
    /// Free-text search across every field
    #[arg(long)]
    pub search: Option<String>,
    /// Keep deadlines tagged with this topic (repeatable)
    #[arg(long)]
    pub topic: Vec<String>,
    /// Keep deadlines of this submission type (repeatable)
    #[arg(long)]
    pub submission_type: Vec<String>,
    /// Keep deadlines of this venue type (repeatable)
    #[arg(long)]
    pub venue_type: Vec<String>,
    /// Keep deadlines with this archival status (repeatable)
    #[arg(long)]
    pub archival: Vec<String>,
    /// Include deadlines that have already passed
    #[arg(long)]
    pub show_past: bool,
    /// Print the render list as JSON
    #[arg(long, conflicts_with = "short")]
    pub json: bool,
    /// One line per deadline: name, date and countdown only
    #[arg(long)]
    pub short: bool,
}

impl ListArgs {
    fn criteria(&self) -> FilterCriteria {
        FilterCriteria {
            query: self.search.clone().unwrap_or_default(),
            show_past: self.show_past,
            topics: self.topic.iter().cloned().collect(),
            submission_types: self.submission_type.iter().cloned().collect(),
            venue_types: self.venue_type.iter().cloned().collect(),
            archival: self.archival.iter().cloned().collect(),
        }
    }
}

#[derive(Args, Debug, Clone, Default)]
pub struct UpcomingArgs {
    /// Only deadlines within the next N days
    #[arg(long, conflicts_with = "date")]
    pub days: Option<u32>,
    /// Only deadlines on or before this date (YYYY-MM-DD)
    #[arg(long, value_parser = parse_date)]
    pub date: Option<Date>,
}

#[derive(Args, Debug, Clone, Default)]
pub struct FacetsArgs {
    /// topics, submission-type, venue-type or archival (all when omitted)
    #[arg(long)]
    pub category: Option<FilterCategory>,
    /// Values printed per category (defaults to the configured visible limit)
    #[arg(long)]
    pub limit: Option<usize>,
}

#[derive(Args, Debug, Clone, Default)]
pub struct NamesArgs {
    /// Write the names to a file instead of stdout
    #[arg(long)]
    pub output: Option<PathBuf>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum CalendarCommand {
    /// Write an .ics event for a deadline
    Ics(IcsArgs),
    /// Print a Google Calendar "add event" link for a deadline
    Google(GoogleArgs),
}

#[derive(Args, Debug, Clone)]
pub struct IcsArgs {
    /// Deadline identifier as printed by `list`
    pub id: usize,
    /// Target directory (defaults to the export directory)
    #[arg(long)]
    pub out: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
pub struct GoogleArgs {
    /// Deadline identifier as printed by `list`
    pub id: usize,
}

#[derive(Args, Debug, Clone)]
pub struct CalendarArgs {
    #[command(subcommand)]
    pub command: CalendarCommand,
}

fn parse_date(value: &str) -> Result<Date, String> {
    Date::parse(value.trim(), format_description!("[year]-[month]-[day]"))
        .map_err(|err| format!("expected YYYY-MM-DD: {err}"))
}

pub fn run_tui(config: Arc<AppConfig>, paths: ConfigPaths) -> Result<()> {
    let source = config.feed_source();
    let mut app = App::new(config, paths, source);
    app.run()
}

fn fetch_records(config: &AppConfig) -> Result<Vec<DeadlineRecord>> {
    let source = config.feed_source().context("resolving feed source")?;
    let entries = load_feed(&source, config.feed.timeout())
        .with_context(|| format!("loading deadlines from {source}"))?;
    Ok(into_records(entries))
}

pub fn list_deadlines(config: Arc<AppConfig>, args: ListArgs) -> Result<()> {
    let records = fetch_records(&config)?;
    let now = OffsetDateTime::now_utc();
    let items = render_list(&records, &args.criteria(), now);
    if args.json {
        let json = serde_json::to_string_pretty(&items).context("serializing render list")?;
        println!("{json}");
    } else {
        print!("{}", format_list(&items, now, args.short));
    }
    Ok(())
}

pub fn upcoming_deadlines(config: Arc<AppConfig>, args: UpcomingArgs) -> Result<()> {
    let records = fetch_records(&config)?;
    let today = OffsetDateTime::now_utc().date();
    let cutoff = cutoff_for(&args, today)?;
    let hits = upcoming(&records, today, cutoff);
    print!("{}", format_upcoming(&hits, today, cutoff));
    Ok(())
}

fn cutoff_for(args: &UpcomingArgs, today: Date) -> Result<Option<Date>> {
    match (args.days, args.date) {
        (Some(_), Some(_)) => bail!("--days and --date cannot be combined"),
        (Some(days), None) => today
            .checked_add(Duration::days(i64::from(days)))
            .map(Some)
            .context("--days reaches past the supported calendar range"),
        (None, Some(date)) => Ok(Some(date)),
        (None, None) => Ok(None),
    }
}

pub fn list_facets(config: Arc<AppConfig>, args: FacetsArgs) -> Result<()> {
    let records = fetch_records(&config)?;
    let limit = args.limit.unwrap_or(config.display.facet_visible_limit);
    let categories: Vec<FilterCategory> = match args.category {
        Some(category) => vec![category],
        None => FilterCategory::iter().collect(),
    };
    print!("{}", format_facets(&records, &categories, limit));
    Ok(())
}

pub fn list_names(config: Arc<AppConfig>, args: NamesArgs) -> Result<()> {
    let records = fetch_records(&config)?;
    let names = venue_names(&records);
    let mut out = String::new();
    for name in &names {
        let _ = writeln!(&mut out, "{name}");
    }
    match args.output {
        Some(path) => {
            fs::write(&path, out).with_context(|| format!("writing {}", path.display()))?;
            println!("Wrote {} venue names to {}", names.len(), path.display());
        }
        None => print!("{out}"),
    }
    Ok(())
}

pub fn handle_calendar_command(
    config: Arc<AppConfig>,
    paths: &ConfigPaths,
    args: CalendarArgs,
) -> Result<()> {
    let records = fetch_records(&config)?;
    match args.command {
        CalendarCommand::Ics(args) => {
            let record = find_record(&records, args.id)?;
            let dir = args.out.unwrap_or_else(|| paths.export_dir.clone());
            match calendar::write_ics(record, &dir)? {
                Some(path) => println!("Saved {}", path.display()),
                None => bail!(
                    "{} has no concrete deadline ({}); nothing to export",
                    record.name_display(),
                    record.deadline_raw()
                ),
            }
        }
        CalendarCommand::Google(args) => {
            let record = find_record(&records, args.id)?;
            match calendar::google_calendar_url(record)? {
                Some(url) => println!("{url}"),
                None => bail!(
                    "{} has no concrete deadline ({}); no calendar link",
                    record.name_display(),
                    record.deadline_raw()
                ),
            }
        }
    }
    Ok(())
}

fn find_record(records: &[DeadlineRecord], id: usize) -> Result<&DeadlineRecord> {
    match records.get(id) {
        Some(record) => Ok(record),
        None => bail!("deadline #{id} not found ({} loaded)", records.len()),
    }
}

fn countdown_text(record: &DeadlineRecord, now: OffsetDateTime) -> String {
    match record.due {
        Deadline::Concrete(at) => frame_for(CountdownStyle::Compact, at, now).text,
        _ => UNAVAILABLE_SHORT_LABEL.to_string(),
    }
}

fn format_list(items: &[RenderItem<'_>], now: OffsetDateTime, short: bool) -> String {
    if items.is_empty() {
        return "No deadlines match.\n".to_string();
    }
    let mut out = String::new();
    for item in items {
        match item {
            RenderItem::Single(record) => {
                let date = parse_deadline(record, MonthStyle::Short).display;
                let countdown = countdown_text(record, now);
                if short {
                    let _ = writeln!(
                        &mut out,
                        "#{:<4} {}  {date}  {countdown}",
                        record.id,
                        record.name_display()
                    );
                    continue;
                }
                let _ = writeln!(
                    &mut out,
                    "#{}  {}  [{}]",
                    record.id,
                    record.name_display(),
                    record.submission_type()
                );
                let _ = writeln!(&mut out, "    deadline  {date} ({countdown})");
                write_details(&mut out, record);
            }
            RenderItem::Group(group) => {
                if short {
                    for record in &group.entries {
                        let stage = record.submission_stage().unwrap_or("Deadline");
                        let _ = writeln!(
                            &mut out,
                            "#{:<4} {} ({stage})  {}  {}",
                            record.id,
                            group.name_display,
                            parse_deadline(record, MonthStyle::Short).display,
                            countdown_text(record, now)
                        );
                    }
                    continue;
                }
                let _ = writeln!(
                    &mut out,
                    "{}  [{}]  {} stages",
                    group.name_display,
                    group.submission_type,
                    group.entries.len()
                );
                for record in &group.entries {
                    let stage = record.submission_stage().unwrap_or("Deadline");
                    let _ = writeln!(
                        &mut out,
                        "    #{}  {stage}  {} ({})",
                        record.id,
                        parse_deadline(record, MonthStyle::Short).display,
                        countdown_text(record, now)
                    );
                }
                if let Some(first) = group.entries.first() {
                    write_details(&mut out, first);
                }
            }
        }
        if !short {
            out.push('\n');
        }
    }
    out
}

fn write_details(out: &mut String, record: &DeadlineRecord) {
    let location = record.location();
    if !location.trim_matches([',', ' ']).is_empty() {
        let _ = writeln!(out, "    where     {location}");
    }
    if !record.event_dates().trim().is_empty() {
        let _ = writeln!(out, "    when      {}", record.event_dates());
    }
    if !record.topics().is_empty() {
        let _ = writeln!(out, "    topics    {}", record.topics().join(", "));
    }
}

fn format_upcoming(hits: &[(Date, &DeadlineRecord)], today: Date, cutoff: Option<Date>) -> String {
    let mut out = String::new();
    let title = match cutoff {
        Some(cutoff) => format!("Upcoming deadlines as of {today} through {cutoff}"),
        None => format!("Upcoming deadlines as of {today}"),
    };
    let _ = writeln!(&mut out, "{title}");
    let _ = writeln!(&mut out, "{}", "=".repeat(title.len()));
    if hits.is_empty() {
        out.push_str("No deadlines found.\n");
        return out;
    }
    let _ = writeln!(&mut out, "{:<12} {:<20} {:<18} Link", "Deadline", "Name", "Type");
    for (date, record) in hits {
        let _ = writeln!(
            &mut out,
            "{:<12} {:<20} {:<18} {}",
            date.to_string(),
            record.name_display(),
            record.submission_type(),
            record.link()
        );
    }
    out
}

fn format_facets(records: &[DeadlineRecord], categories: &[FilterCategory], limit: usize) -> String {
    let mut out = String::new();
    for &category in categories {
        let list = facet_counts(records, category);
        let (visible, hidden) = list.split(limit);
        let _ = writeln!(&mut out, "{}", category.label());
        for facet in visible {
            let _ = writeln!(&mut out, "  {:>4}  {}", facet.count, facet.value);
        }
        if !hidden.is_empty() {
            let _ = writeln!(&mut out, "  ... {} more", hidden.len());
        }
    }
    out
}
