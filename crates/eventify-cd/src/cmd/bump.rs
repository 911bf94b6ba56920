use crate::output::print_json;
use eventify_cd_core::config::Config;
use eventify_cd_core::rewrite::{rewrite_metadata, rewrite_metadata_file};
use std::path::Path;

pub fn run(
    config_path: Option<&Path>,
    file: &Path,
    package: Option<&str>,
    dry_run: bool,
    json: bool,
) -> anyhow::Result<()> {
    let package = match package {
        Some(p) => p.to_string(),
        None => Config::load_or_default(config_path)?.package.name,
    };

    let rewrite = if dry_run {
        let text = std::fs::read_to_string(file)?;
        rewrite_metadata(&text, &package)?
    } else {
        rewrite_metadata_file(file, &package)?
    };

    if json {
        return print_json(&serde_json::json!({
            "file": file,
            "previous": rewrite.previous.to_string(),
            "next": rewrite.next.to_string(),
            "urls_updated": rewrite.urls_updated,
            "written": !dry_run,
        }));
    }

    if dry_run {
        print!("{}", rewrite.text);
    } else {
        println!(
            "{}: {} -> {} ({} download URL(s) updated)",
            file.display(),
            rewrite.previous,
            rewrite.next,
            rewrite.urls_updated
        );
    }
    Ok(())
}
