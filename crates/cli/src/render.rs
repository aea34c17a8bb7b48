//! Terminal output: tables on stdout, colored outcome lines

use chrono::Local;
use colored::Colorize;
use tabled::{Table, Tabled};
use upnext_core::application::{ActiveQueueView, CommandOutcome, RosterEntry, StatsRow};
use upnext_core::domain::{HistoryEvent, RepStatus};

#[derive(Tabled)]
struct QueueRow {
    #[tabled(rename = "#")]
    position: usize,
    #[tabled(rename = "Rep")]
    name: String,
    #[tabled(rename = "Id")]
    id: i64,
    #[tabled(rename = "")]
    marker: String,
}

#[derive(Tabled)]
struct RosterRow {
    #[tabled(rename = "Id")]
    id: i64,
    #[tabled(rename = "Rep")]
    name: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Position")]
    position: String,
}

#[derive(Tabled)]
struct StatsTableRow {
    #[tabled(rename = "Rank")]
    rank: usize,
    #[tabled(rename = "Rep")]
    name: String,
    #[tabled(rename = "Customer events")]
    customer_events: usize,
    #[tabled(rename = "Status")]
    status: String,
}

#[derive(Tabled)]
struct HistoryRow {
    #[tabled(rename = "Time")]
    time: String,
    #[tabled(rename = "Rep")]
    name: String,
    #[tabled(rename = "Action")]
    action: String,
}

fn status_label(status: RepStatus) -> &'static str {
    match status {
        RepStatus::NotCheckedIn => "Not checked in",
        RepStatus::Queued => "Queued",
        RepStatus::UpNow => "Up now",
        RepStatus::SteppedAway => "Stepped away",
        RepStatus::WithCustomer => "With customer",
    }
}

pub fn print_outcome(command: &str, outcome: &CommandOutcome) {
    match outcome {
        CommandOutcome::Applied {
            event: Some(event),
            version,
        } => {
            println!(
                "{} {}: {} {}",
                "✓".green().bold(),
                event.rep_name.bold(),
                event.action.label(),
                format!("(v{})", version).dimmed()
            );
        }
        CommandOutcome::Applied {
            event: None,
            version,
        } => {
            println!(
                "{} {} {}",
                "✓".green().bold(),
                command,
                format!("(v{})", version).dimmed()
            );
        }
        CommandOutcome::Reset => {
            println!("{}", "✓ Store reset, run `upnext setup` to start over".green().bold());
        }
        CommandOutcome::NoOp(reason) => {
            println!("{} No change: {}", "○".yellow(), reason);
        }
    }
}

pub fn print_queue(view: &ActiveQueueView) {
    if view.is_empty() {
        println!("{}", "Nobody is checked in".yellow());
        return;
    }

    println!("{}", "Active queue".cyan().bold());
    if view.entries.is_empty() {
        println!("  {}", "(empty)".dimmed());
    } else {
        let rows: Vec<QueueRow> = view
            .entries
            .iter()
            .map(|entry| QueueRow {
                position: entry.position,
                name: entry.rep.name.clone(),
                id: entry.rep.id,
                marker: if entry.designated {
                    "UP NOW".to_string()
                } else {
                    String::new()
                },
            })
            .collect();
        println!("{}", Table::new(rows));
    }

    if !view.with_customer.is_empty() {
        println!();
        println!("{}", "With customer".cyan().bold());
        for rep in &view.with_customer {
            println!("  {} {}", rep.avatar, rep.name);
        }
    }

    if !view.stepped_away.is_empty() {
        println!();
        println!("{}", "Stepped away".cyan().bold());
        for rep in &view.stepped_away {
            println!("  {} {}", rep.avatar, rep.name);
        }
    }
}

pub fn print_roster(roster: &[RosterEntry]) {
    if roster.is_empty() {
        println!("{}", "No reps yet, run `upnext setup <names..>`".yellow());
        return;
    }

    let rows: Vec<RosterRow> = roster
        .iter()
        .map(|entry| RosterRow {
            id: entry.rep.id,
            name: entry.rep.name.clone(),
            status: status_label(entry.status).to_string(),
            position: entry.position.map(|p| p.to_string()).unwrap_or_default(),
        })
        .collect();
    println!("{}", Table::new(rows));
}

pub fn print_stats(stats: &[StatsRow]) {
    let rows: Vec<StatsTableRow> = stats
        .iter()
        .map(|row| StatsTableRow {
            rank: row.rank,
            name: row.rep.name.clone(),
            customer_events: row.customer_events,
            status: row.status.to_string(),
        })
        .collect();
    println!("{}", Table::new(rows));
}

pub fn print_history(history: &[HistoryEvent]) {
    if history.is_empty() {
        println!("{}", "No activity yet".yellow());
        return;
    }

    let rows: Vec<HistoryRow> = history
        .iter()
        .map(|event| HistoryRow {
            time: event
                .timestamp
                .with_timezone(&Local)
                .format("%Y-%m-%d %H:%M:%S")
                .to_string(),
            name: event.rep_name.clone(),
            action: event.action.label().to_string(),
        })
        .collect();
    println!("{}", Table::new(rows));
}
