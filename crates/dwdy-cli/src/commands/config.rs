//! Config command handlers

use std::path::Path;

use anyhow::Result;

use dwdy_core::{Config, Journal};

use crate::output::{Output, OutputFormat};

/// Show the effective configuration and the stored app settings
pub fn show(config: &Config, config_path: &Path, journal: &Journal, output: &Output) -> Result<()> {
    let app = journal.app_config();

    match output.format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::json!({
                    "data_dir": config.data_dir,
                    "log_filter": config.log_filter,
                    "neighbor_scan_limit": config.neighbor_scan_limit,
                    "thumbnail_width": config.thumbnail_width,
                    "enabled_features": app.enabled_features,
                    "default_layout": app.default_layout,
                })
            );
        }
        OutputFormat::Quiet => {
            println!("{}", config.data_dir.display());
        }
        OutputFormat::Human => {
            let features: Vec<&str> = app.enabled_features.iter().map(|f| f.tag()).collect();
            println!("Configuration:");
            println!("  data_dir:            {}", config.data_dir.display());
            println!("  log_filter:          {}", config.log_filter);
            println!("  neighbor_scan_limit: {}", config.neighbor_scan_limit);
            println!("  thumbnail_width:     {}", config.thumbnail_width);
            println!();
            println!("Stored settings:");
            println!("  enabled_features:    {}", features.join(", "));
            println!("  default_layout:      {}", app.default_layout);
            println!();
            println!("Config file: {}", config_path.display());
            println!("Database:    {}", config.sqlite_path().display());
        }
    }

    Ok(())
}
