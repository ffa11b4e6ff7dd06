//! Plain-text rendering of query results.

use std::io::{self, Write};

use epgenius_core::eligibility::StatusMessage;
use epgenius_core::lookup::LookupOutcome;
use epgenius_core::registry::RegistryEntry;
use epgenius_core::status::StatusOutcome;

fn write_entry(out: &mut impl Write, entry: &RegistryEntry, score: Option<u8>) -> io::Result<()> {
    match score {
        Some(score) => writeln!(
            out,
            "#{} - {} (score {score})",
            entry.id,
            entry.owner_display()
        )?,
        None => writeln!(out, "#{} - {}", entry.id, entry.owner_display())?,
    }
    writeln!(out, "  Provider: {}", entry.provider_name)?;
    writeln!(out, "  EPG: {}", entry.epg_display())
}

pub fn render_lookup(out: &mut impl Write, outcome: &LookupOutcome) -> io::Result<()> {
    match outcome {
        LookupOutcome::Listing(entries) => {
            writeln!(out, "All playlists ({})", entries.len())?;
            for entry in entries {
                write_entry(out, entry, None)?;
            }
        }
        LookupOutcome::Owners(owners) if owners.is_empty() => {
            writeln!(out, "No owners found.")?;
        }
        LookupOutcome::Owners(owners) => {
            writeln!(out, "Owners:")?;
            for owner in owners {
                writeln!(out, "  {owner}")?;
            }
        }
        LookupOutcome::Entry(entry) => {
            writeln!(out, "Playlist #{} EPG info", entry.id)?;
            writeln!(out, "  Owner: {}", entry.owner_display())?;
            writeln!(out, "  Provider: {}", entry.provider_name)?;
            writeln!(out, "  EPG URL: {}", entry.epg_display())?;
        }
        LookupOutcome::NotFound(id) => writeln!(out, "No playlist found for #{id}.")?,
        LookupOutcome::Matches(matches) => {
            for m in matches {
                for entry in &m.entries {
                    write_entry(out, entry, Some(m.score))?;
                }
            }
        }
        LookupOutcome::NoConfidentMatch { query, owners } => {
            writeln!(
                out,
                "No close matches found for '{query}'. Known owners:"
            )?;
            for owner in owners {
                writeln!(out, "  {owner}")?;
            }
        }
        LookupOutcome::Unavailable => writeln!(
            out,
            "Registry data is unavailable right now. Please try again later."
        )?,
    }
    Ok(())
}

fn write_messages(out: &mut impl Write, messages: &[StatusMessage]) -> io::Result<()> {
    for message in messages {
        let marker = if message.is_error() { "!" } else { "-" };
        writeln!(out, "  {marker} {message}")?;
    }
    Ok(())
}

pub fn render_status(out: &mut impl Write, outcome: &StatusOutcome) -> io::Result<()> {
    let StatusOutcome::Report {
        record,
        entry,
        report,
    } = outcome
    else {
        return writeln!(out, "{outcome}");
    };

    writeln!(out, "{outcome}")?;
    writeln!(out, "  List: #{}", record.registry_entry_id)?;
    if let Some(entry) = entry {
        writeln!(
            out,
            "  Owner: {}  Provider: {}",
            entry.owner_display(),
            entry.provider_name
        )?;
    }
    let on_off = |enabled: bool| if enabled { "enabled" } else { "disabled" };
    writeln!(out, "Free updates: {}", on_off(report.free_enabled))?;
    write_messages(out, &report.free_messages)?;
    writeln!(out, "Supporter updates: {}", on_off(report.supporter_enabled))?;
    write_messages(out, &report.supporter_messages)?;
    writeln!(out, "Timestamps:")?;
    for (label, value) in report.formatted_timestamps.iter() {
        writeln!(out, "  {label}: {value}")?;
    }
    Ok(())
}
