//! ---
//! eb_section: "05-external-interfaces"
//! eb_subsection: "binary"
//! eb_type: "source"
//! eb_scope: "code"
//! eb_description: "Command-line entrypoint for capacity sweeps and encoder probes."
//! eb_version: "v0.1.0"
//! eb_owner: "tbd"
//! ---
use std::time::Duration;

use anyhow::Result;
use clap::Args;
use encbench_common::config::AppConfig;
use encbench_encoder::EncoderProbe;

#[derive(Debug, Args)]
pub struct ProbeArgs {
    /// Run only the named probe (for example `gpu`).
    #[arg(long, value_name = "NAME")]
    only: Option<String>,

    /// Seconds of synthetic video to encode.
    #[arg(long, value_name = "SECS")]
    duration: Option<u64>,
}

pub fn run(mut config: AppConfig, args: ProbeArgs) -> Result<bool> {
    if let Some(secs) = args.duration {
        config.encoder.duration = Duration::from_secs(secs);
    }
    config.encoder.validate()?;
    let encoder = &config.encoder;
    let probes = match args.only.as_deref() {
        Some(name) => vec![EncoderProbe::find(encoder, name)?],
        None => EncoderProbe::all(encoder),
    };

    let rule = "=".repeat(60);
    let mut reports = Vec::with_capacity(probes.len());
    for probe in &probes {
        println!("\n{rule}\n{}\n{rule}", probe.title());
        println!(
            "Command: {} {}",
            encoder.binary.display(),
            probe.args().join(" ")
        );
        let report = probe.run();
        print!("{}", report.render());
        reports.push(report);
    }

    println!("\n{rule}\nSUMMARY\n{rule}");
    for report in &reports {
        println!(
            "{:<6} {}  ({:.2}x)",
            report.name,
            report.status_label(),
            report.progress.speed
        );
    }
    Ok(!reports.is_empty() && reports.iter().all(|report| report.passed))
}
