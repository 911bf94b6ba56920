use crate::output::{print_json, print_table};
use eventify_cd_core::config::Config;
use eventify_cd_core::pipeline::{Pipeline, ProcessRunner};
use std::path::Path;
use std::sync::Arc;

pub fn run(config_path: Option<&Path>, json: bool) -> anyhow::Result<()> {
    let config = Config::load_or_default(config_path)?;
    let report = Pipeline::new(config, Arc::new(ProcessRunner)).run()?;

    if json {
        return print_json(&report);
    }

    println!(
        "Deployed {} -> {} (run {})",
        report.previous_version, report.new_version, report.run_id
    );
    let rows = report
        .steps
        .iter()
        .map(|s| {
            vec![
                s.step.to_string(),
                s.exit_code.map(|c| c.to_string()).unwrap_or_else(|| "-".into()),
                format!("{}ms", s.duration_ms),
            ]
        })
        .collect();
    print_table(&["STEP", "EXIT", "TIME"], rows);
    Ok(())
}
