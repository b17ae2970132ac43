use anyhow::Result;
use chrono::{DateTime, Local, Utc};

use super::Session;
use crate::brightness::BrightnessBucket;
use crate::desktop;
use crate::timeprofile::{self, SunCrossing, SunTimes};

pub fn cmd_status(session: &Session) -> Result<()> {
    let cache = &session.cache;

    println!(
        "Wallpaper directory: {}{}",
        session.wallpaper_dir.display(),
        if session.recursive { " (recursive)" } else { "" }
    );

    match session.target() {
        Some((target, mode)) => println!(
            "Target brightness:   {} ({}, by {})",
            target,
            target.period_name(),
            mode
        ),
        None => println!("Target brightness:   any (time fitting is off)"),
    }

    if let Some(location) = session.time.location() {
        let now = timeprofile::local_now();
        let sun = SunTimes::for_date(now.date_naive(), location);
        println!("Sun at {}:", location);
        println!("  Daylight:        {}", describe(sun.daylight));
        println!("  Civil twilight:  {}", describe(sun.civil));
    } else {
        println!(
            "Clock bands:         dawn {}h, day {}h, dusk {}h, night {}h",
            session.time.dawn_start,
            session.time.day_start,
            session.time.dusk_start,
            session.time.night_start
        );
    }

    // The desktop may be unavailable (e.g. over ssh); that is not an error here.
    if let Ok(desktop) = desktop::detect(session.desktop_backend) {
        if let Ok(Some(current)) = desktop.current_background() {
            let bucket = cache
                .get_record(&current)
                .ok()
                .flatten()
                .and_then(|record| record.bucket());
            match bucket {
                Some(bucket) => println!("Current wallpaper:   {} ({})", current.display(), bucket),
                None => println!("Current wallpaper:   {}", current.display()),
            }
        }
    }

    let root = std::fs::canonicalize(&session.wallpaper_dir)
        .unwrap_or_else(|_| session.wallpaper_dir.clone());
    let stats = cache.stats(&root)?;
    let version = cache.schema_version()?.unwrap_or_else(|| "?".into());
    println!();
    println!("Database {} (v{}):", cache.path().display(), version);
    println!("  Known:     {}", stats.total);
    println!("  Measured:  {}", stats.measured);
    println!("  Overrides: {}", stats.overridden);
    for bucket in BrightnessBucket::ALL {
        println!("  {:<10} {}", format!("{}:", bucket), stats.in_bucket(bucket));
    }
    if stats.unknown > 0 {
        println!("  Unknown:   {}", stats.unknown);
    }
    println!("Measured with: {}", cache.meter().name());

    Ok(())
}

fn describe(crossing: SunCrossing) -> String {
    match crossing {
        SunCrossing::Times { rise, set } => format!("{} - {}", local_hm(rise), local_hm(set)),
        SunCrossing::AlwaysAbove => "all day".into(),
        SunCrossing::AlwaysBelow => "none today".into(),
    }
}

fn local_hm(time: DateTime<Utc>) -> String {
    time.with_timezone(&Local).format("%H:%M").to_string()
}
