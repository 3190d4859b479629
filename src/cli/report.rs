//! `prebox status` and `prebox report`: read-only dashboard views.

use clap::Args;
use jiff::Zoned;
use jiff::civil::Date;
use serde::Serialize;

use crate::config::Config;
use crate::model::{Bay, BayStats, ShiftSummary};
use crate::report::{TripFilter, TripStats, bay_stats, shift_summary, trip_stats};
use crate::store::Store;

use super::format::{format_bay_stats, format_grid};
use super::parse_date_arg;

/// Date range and field filters shared by `report`, `trip list` and `trip export`.
#[derive(Debug, Clone, Default, Args)]
pub struct FilterArgs {
    /// First trip date to include.
    #[arg(long, value_parser = parse_date_arg)]
    from: Option<Date>,

    /// Last trip date to include.
    #[arg(long, value_parser = parse_date_arg)]
    to: Option<Date>,

    /// `field=value`, matched case-insensitively as a substring. Repeatable.
    #[arg(long = "filter", value_name = "FIELD=VALUE")]
    terms: Vec<String>,
}

impl FilterArgs {
    pub(super) fn to_filter(&self) -> Result<TripFilter, String> {
        let fields = self
            .terms
            .iter()
            .map(|t| TripFilter::parse_term(t))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(TripFilter {
            from: self.from,
            to: self.to,
            fields,
        })
    }
}

#[derive(Debug, Args)]
pub struct ReportArgs {
    #[command(flatten)]
    filter: FilterArgs,

    /// Print JSON.
    #[arg(long)]
    json: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StatusView<'a> {
    company_name: &'a str,
    shift: Option<&'a str>,
    today: ShiftSummary,
    bays: &'a [Bay],
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ReportView {
    bays: BayStats,
    trips: TripStats,
}

pub(super) fn cmd_status(store: &Store, config: &Config, json: bool) -> Result<(), String> {
    let now = Zoned::now();
    let shift = config.current_shift(now.time()).map(|s| s.name.as_str());
    let today = shift_summary(
        store.bays(),
        store.trips(),
        now.date(),
        shift.map(String::from),
    );

    if json {
        let view = StatusView {
            company_name: &config.general.company_name,
            shift,
            today,
            bays: store.bays(),
        };
        let out = serde_json::to_string_pretty(&view)
            .map_err(|e| format!("failed to serialize status: {e}"))?;
        println!("{out}");
        return Ok(());
    }

    match shift {
        Some(name) => println!("{} · {name}", config.general.company_name),
        None => println!("{}", config.general.company_name),
    }
    println!();
    if store.bays().is_empty() {
        println!("No bays. Add some with `prebox bay add` or `prebox bay seed`.");
    } else {
        println!("{}", format_grid(store.bays()));
    }
    println!();
    println!("{}", format_bay_stats(&today.bays));
    println!(
        "Today: {} trips, {} released, {} pending",
        today.total_trips, today.completed_trips, today.pending_trips
    );
    Ok(())
}

pub(super) fn cmd_report(store: &Store, args: &ReportArgs) -> Result<(), String> {
    let filter = args.filter.to_filter()?;
    let trips = filter.apply(store.trips());
    let view = ReportView {
        bays: bay_stats(store.bays()),
        trips: trip_stats(&trips),
    };

    if args.json {
        let out = serde_json::to_string_pretty(&view)
            .map_err(|e| format!("failed to serialize report: {e}"))?;
        println!("{out}");
        return Ok(());
    }

    println!("{}", format_bay_stats(&view.bays));
    println!();

    let stats = &view.trips;
    if filter.is_empty() {
        println!("Trips: {}", stats.total);
    } else {
        println!("Trips: {} of {} (filtered)", stats.total, store.trips().len());
    }
    println!("  released   {}", stats.released);
    println!("  pending    {}", stats.pending);
    println!("  avg qty    {:.1}", stats.average_quantity);

    if !stats.by_region.is_empty() {
        println!();
        println!("By region:");
        for (region, count) in &stats.by_region {
            println!("  {region:<12} {count}");
        }
    }

    if stats.total > 0 {
        println!();
        println!("By shift:");
        for (i, count) in stats.by_shift.iter().enumerate() {
            println!("  {}  {count}", i + 1);
        }
    }
    Ok(())
}
