//! Home and alarm commands

use anyhow::{Context, Result};

use crate::app::App;
use crate::store::SharedState;
use crate::sync::StatusView;

/// List homes, marking the selected one
pub async fn list_homes(app: &App) -> Result<()> {
    let sync = app.status_sync()?;
    let homes = sync.list_resources().await?;
    let selected = sync.cached().map(|c| c.resource_id).unwrap_or_default();

    if homes.is_empty() {
        println!("No homes on this account.");
        return Ok(());
    }

    println!("\nHomes:");
    for home in homes {
        let marker = if home.home_id == selected { "*" } else { " " };
        match home.timezone {
            Some(tz) => println!(" {} {}  {}  ({})", marker, home.home_id, home.name, tz),
            None => println!(" {} {}  {}", marker, home.home_id, home.name),
        }
    }
    Ok(())
}

pub async fn select(app: &App, home_id: &str) -> Result<()> {
    let home = app
        .status_sync()?
        .select_by_id(home_id)
        .await
        .with_context(|| format!("Failed to select home {}", home_id))?;
    println!("Selected {} ({}).", home.name, home.home_id);
    Ok(())
}

/// Fetch live status, falling back to the cache
pub async fn show_status(app: &App) -> Result<()> {
    let sync = app.status_sync()?;
    let view = sync.fetch_status().await;
    print_view(&view, sync.lifecycle().now());
    Ok(())
}

pub async fn set_armed(app: &App, armed: bool) -> Result<()> {
    app.status_sync()?
        .set_armed(armed)
        .await
        .context("Failed to change alarm status")?;
    println!("Alarm {}.", if armed { "armed" } else { "disarmed" });
    Ok(())
}

/// Background unit of work: bounded fetch-and-cache
pub async fn sync_once(app: &App) -> Result<()> {
    let sync = app.status_sync()?;
    let view = sync.run_background_cycle(app.settings.sync_budget()).await;
    print_view(&view, sync.lifecycle().now());
    Ok(())
}

/// Print the shared cache without touching the network
pub fn show_cached(app: &App) -> Result<()> {
    let cache = app.shared_state().load()?;
    if !cache.has_selection() {
        println!("{}", StatusView::NoResourceSelected);
        return Ok(());
    }

    println!("Home:        {} ({})", cache.resource_name, cache.resource_id);
    println!(
        "Last known:  {}",
        if cache.last_known_armed { "armed" } else { "disarmed" }
    );
    match cache.last_update_time {
        Some(t) => println!("Updated:     {}", t.to_rfc3339()),
        None => println!("Updated:     never"),
    }
    Ok(())
}

fn print_view(view: &StatusView, now: chrono::DateTime<chrono::Utc>) {
    println!("{}", view);
    if let Some(remaining) = view.grace_remaining(now) {
        println!("  {}s left in grace period", remaining.num_seconds());
    }
    if view.is_stale(now, chrono::Duration::minutes(15)) {
        println!("  (stale)");
    }
}
