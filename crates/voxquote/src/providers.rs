// SPDX-FileCopyrightText: 2026 Voxquote Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `voxquote providers` command implementation.

use voxquote_config::VoxquoteConfig;
use voxquote_providers::{ProviderInfo, build_registry};

use crate::error::CliError;

pub fn run_providers(config: &VoxquoteConfig, json: bool) -> Result<(), CliError> {
    let registry = build_registry(config)?;
    let listing = registry.providers();
    if json {
        println!("{}", serde_json::to_string_pretty(&listing)?);
    } else {
        print!("{}", render_table(&listing));
    }
    Ok(())
}

fn render_table(listing: &[ProviderInfo]) -> String {
    if listing.is_empty() {
        return "no providers enabled\n".to_string();
    }
    let mut out = format!("{:<10} {:<24} {}\n", "PROVIDER", "WEBHOOK PATH", "PRIMARY");
    for info in listing {
        out.push_str(&format!(
            "{:<10} {:<24} {}\n",
            info.name.to_string(),
            info.webhook_path,
            if info.primary { "yes" } else { "" }
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_marks_primary() {
        let config = voxquote_config::load_config_from_str(
            r#"
            [providers]
            primary = "retell"

            [providers.bland]
            enabled = true

            [providers.retell]
            enabled = true
            "#,
        )
        .unwrap();
        let registry = build_registry(&config).unwrap();
        let table = render_table(&registry.providers());

        let retell = table.lines().find(|l| l.starts_with("retell")).unwrap();
        assert!(retell.contains("/webhooks/retell"));
        assert!(retell.trim_end().ends_with("yes"));
        assert!(!table.contains("custom"));
    }

    #[test]
    fn empty_listing() {
        assert_eq!(render_table(&[]), "no providers enabled\n");
    }
}
