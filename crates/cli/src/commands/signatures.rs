//! Print the active suspicion policy

use anyhow::Result;
use colored::Colorize;
use doctor_lib::{DetectorSource, SuspicionPolicy};
use tabled::{settings::Style, Table, Tabled};

use crate::output::{color_source, OutputFormat};

/// Row for signatures table
#[derive(Tabled)]
struct SignatureRow {
    #[tabled(rename = "Detector")]
    detector_label: String,
    #[tabled(skip)]
    detector: DetectorSource,
    #[tabled(rename = "Signature")]
    signature: String,
    #[tabled(rename = "Values")]
    values: String,
}

fn rows(policy: &SuspicionPolicy) -> Vec<SignatureRow> {
    let entry = |detector: DetectorSource, signature: &str, values: String| SignatureRow {
        detector_label: color_source(detector),
        detector,
        signature: signature.to_string(),
        values,
    };

    vec![
        entry(
            DetectorSource::PodPhase,
            "healthy phases",
            policy.healthy_phases.join(", "),
        ),
        entry(
            DetectorSource::ContainerStatus,
            "waiting reasons",
            policy.waiting_reasons.join(", "),
        ),
        entry(
            DetectorSource::ContainerStatus,
            "terminated",
            "exit code != 0".to_string(),
        ),
        entry(
            DetectorSource::ContainerStatus,
            "container selection",
            format!("{:?}", policy.container_selection).to_lowercase(),
        ),
        entry(
            DetectorSource::ContainerStatus,
            "init containers",
            policy.include_init_containers.to_string(),
        ),
        entry(
            DetectorSource::PodCondition,
            "scheduling",
            format!(
                "PodScheduled=False ({})",
                policy.unschedulable_reasons.join(", ")
            ),
        ),
        entry(
            DetectorSource::PodCondition,
            "readiness",
            format!(
                "{} in [{}]",
                policy.readiness_condition_types.join(", "),
                policy.failing_condition_statuses.join(", ")
            ),
        ),
        entry(
            DetectorSource::EventChecker,
            "warning reasons",
            policy.warning_event_reasons.join(", "),
        ),
    ]
}

pub fn show_signatures(policy: &SuspicionPolicy, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(policy)?;
            println!("{}", json);
        }
        OutputFormat::Table => {
            println!("{}", "Suspicion Signatures".bold());
            let table = Table::new(rows(policy)).with(Style::rounded()).to_string();
            println!("{}", table);
        }
    }
    Ok(())
}
