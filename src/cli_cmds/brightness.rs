use anyhow::Result;

use super::{absolute_path, Session};
use crate::brightness::classify;
use crate::BrightnessAction;

pub fn cmd_brightness(action: BrightnessAction, session: &Session) -> Result<()> {
    let cache = &session.cache;

    match action {
        BrightnessAction::Set { path, value } => {
            let path = absolute_path(&path);
            if !path.is_file() {
                anyhow::bail!("No such file: {}", path.display());
            }
            cache.set_override(&path, value)?;
            println!("{} is now {}", path.display(), value);
        }
        BrightnessAction::Clear { path } => {
            let path = absolute_path(&path);
            let previous = cache.get_override(&path)?;
            if cache.clear_override(&path)? {
                match previous {
                    Some(bucket) => println!("Cleared {} override for {}", bucket, path.display()),
                    None => println!("{} had no override", path.display()),
                }
            } else {
                println!("{} is not in the database", path.display());
            }
        }
        BrightnessAction::Show { path } => {
            let path = absolute_path(&path);
            let Some(record) = cache.get_record(&path)? else {
                println!("{} is not in the database", path.display());
                println!("Run 'nextwall scan' to measure it.");
                return Ok(());
            };

            println!("{}", record.path.display());
            match record.kurtosis {
                Some(k) => println!("  Kurtosis:  {:.4} ({})", k, classify(k)),
                None => println!("  Kurtosis:  not measured"),
            }
            match record.defined_brightness {
                Some(bucket) => println!("  Override:  {}", bucket),
                None => println!("  Override:  none"),
            }
            match record.bucket() {
                Some(bucket) => println!(
                    "  Effective: {} (shown at {})",
                    bucket,
                    bucket.period_name()
                ),
                None => println!("  Effective: unknown"),
            }
        }
    }

    Ok(())
}
